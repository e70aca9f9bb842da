//! Recording session management
//!
//! This module provides the session coordinator: the state machine that
//! drives capture acquisition, audio mixing, the chunked recorder and the
//! countdown/elapsed timers for one recording session, plus the settings
//! and snapshot types the presentation layer works with.

mod coordinator;
mod settings;
mod state;

pub use coordinator::{CoordinatorConfig, EncoderFactory, SessionCoordinator, SessionHandle};
pub use settings::{RecordingSettings, SettingsUpdate};
pub use state::{SessionEvent, SessionSnapshot, SessionState};
