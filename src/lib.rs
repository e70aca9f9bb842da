pub mod audio;
pub mod capture;
pub mod config;
pub mod export;
pub mod http;
pub mod recorder;
pub mod session;
pub mod timer;

pub use audio::{build_mixed_stream, AudioSourceMode, MixerSettings};
pub use capture::{
    AudioFrame, AudioSpec, AudioStreamSource, CaptureBackend, CaptureError, CompositeStream,
    MediaFeed, MicStream, ScreenStream, StreamGuard, SyntheticBackend, SyntheticTuning,
    VideoConstraints, VideoFrame, VideoQuality,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use recorder::{
    ChunkedRecorder, ContainerEncoder, ContainerFormat, FfmpegEncoder, Recording, RecorderConfig,
    RecorderError, RecorderHandle, RecordingInfo,
};
pub use session::{
    CoordinatorConfig, EncoderFactory, RecordingSettings, SessionCoordinator, SessionEvent,
    SessionHandle, SessionSnapshot, SessionState, SettingsUpdate,
};
pub use timer::Ticker;
