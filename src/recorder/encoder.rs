use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::chunk::Chunk;
use crate::capture::{AudioSpec, VideoConstraints};

/// Errors that can occur while recording or packaging
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recorder is not running")]
    NotRunning,
}

pub type RecorderResult<T> = Result<T, RecorderError>;

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Webm,
    Mp4,
}

impl ContainerFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContainerFormat::Webm => "video/webm",
            ContainerFormat::Mp4 => "video/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContainerFormat::Webm => "webm",
            ContainerFormat::Mp4 => "mp4",
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// The platform encoding and packaging primitive.
///
/// Implementations turn the recorder's ordered chunk buffer into one
/// finished container blob. The recorder itself never touches codec or
/// container internals.
#[async_trait]
pub trait ContainerEncoder: Send + Sync {
    fn format(&self) -> ContainerFormat;

    /// Encode and package the buffered chunks, in emission order, into a
    /// single container blob.
    async fn assemble(
        &self,
        chunks: &[Chunk],
        video: &VideoConstraints,
        audio: Option<&AudioSpec>,
    ) -> RecorderResult<Vec<u8>>;
}
