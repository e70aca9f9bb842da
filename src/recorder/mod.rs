pub mod chunk;
pub mod encoder;
pub mod ffmpeg;

pub use chunk::{Chunk, ChunkedRecorder, Recording, RecorderConfig, RecorderHandle, RecordingInfo};
pub use encoder::{ContainerEncoder, ContainerFormat, RecorderError, RecorderResult};
pub use ffmpeg::FfmpegEncoder;
