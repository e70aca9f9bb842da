use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::session::SessionHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one recording session this process hosts
    pub session: SessionHandle,
    /// Directory exports are written to
    pub output_dir: PathBuf,
    /// An alternate-format conversion is in flight
    pub converting: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(session: SessionHandle, output_dir: PathBuf) -> Self {
        Self {
            session,
            output_dir,
            converting: Arc::new(AtomicBool::new(false)),
        }
    }
}
