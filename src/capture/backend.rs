use async_trait::async_trait;
use thiserror::Error;

use super::quality::VideoConstraints;
use super::stream::{MicStream, ScreenStream};

/// Errors produced while acquiring capture streams.
///
/// Screen failures are fatal to the recording attempt; microphone failures
/// are not (the session proceeds with whatever sources succeeded).
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Screen capture denied: {0}")]
    Denied(String),

    #[error("Screen capture blocked by the embedding context's permissions policy")]
    PolicyRestricted,

    #[error("Microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    #[error("Capture backend error: {0}")]
    Backend(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Platform capture backend.
///
/// Implementations own the actual display/microphone plumbing and hand out
/// tracks as frame channels. The crate ships `SyntheticBackend`; OS-level
/// backends implement this trait per deployment.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request a screen stream honoring the given constraints, with system
    /// audio included when `system_audio` is set and the platform grants it.
    async fn acquire_screen(
        &self,
        constraints: VideoConstraints,
        system_audio: bool,
    ) -> CaptureResult<ScreenStream>;

    /// Request a microphone stream.
    async fn acquire_microphone(&self) -> CaptureResult<MicStream>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
