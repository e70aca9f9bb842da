//! Session state machine types and the read-only view served to the
//! presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::settings::RecordingSettings;
use crate::recorder::RecordingInfo;

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// No recording in progress
    Idle,
    /// Countdown pre-roll running
    CountingDown,
    /// Currently recording
    Recording,
    /// Recording suspended
    Paused,
    /// Recording finished, result blob available
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Events published while a session runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// Countdown advanced; payload is the remaining seconds
    CountdownTick { remaining: u32 },
    Started,
    Paused,
    Resumed,
    Stopped,
    Reset,
    Failed { message: String },
}

/// Read-only session view for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub elapsed_secs: u64,
    pub countdown_remaining: u32,
    pub is_counting_down: bool,
    pub settings: RecordingSettings,
    pub last_error: Option<String>,
    /// Present exactly when the session is stopped
    pub recording: Option<RecordingInfo>,
    pub embedded_context: bool,
    /// When the current/last recording began capturing
    pub started_at: Option<DateTime<Utc>>,
}
