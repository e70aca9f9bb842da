//! Capture acquisition: quality presets, the stream/track model, and the
//! backend trait with its synthetic in-tree implementation.

pub mod backend;
pub mod quality;
pub mod stream;
pub mod synthetic;

pub use backend::{CaptureBackend, CaptureError, CaptureResult};
pub use quality::{VideoConstraints, VideoQuality};
pub use stream::{
    AudioFrame, AudioSpec, AudioStreamSource, AudioTrack, CompositeStream, MediaFeed, MicStream,
    ScreenStream, StreamGuard, TrackHandle, TrackKind, VideoFrame, VideoTrack,
};
pub use synthetic::{SyntheticBackend, SyntheticTuning};
