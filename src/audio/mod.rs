pub mod mixer;

pub use mixer::{build_mixed_stream, AudioSourceMode, MixerSettings};
