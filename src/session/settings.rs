use serde::{Deserialize, Serialize};

use crate::audio::AudioSourceMode;
use crate::capture::VideoQuality;

/// Configuration for a recording attempt.
///
/// Immutable while a session is counting down, recording or paused;
/// updates outside Idle are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub audio_source: AudioSourceMode,
    /// Microphone gain as a percentage (0-100)
    pub microphone_volume: u8,
    /// System audio gain as a percentage (0-100)
    pub system_volume: u8,
    pub video_quality: VideoQuality,
    /// Seconds of pre-roll countdown; 0 starts recording immediately
    pub countdown_secs: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            audio_source: AudioSourceMode::Microphone,
            microphone_volume: 80,
            system_volume: 80,
            video_quality: VideoQuality::Medium,
            countdown_secs: 3,
        }
    }
}

/// Partial settings update issued by the presentation layer
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SettingsUpdate {
    pub audio_source: Option<AudioSourceMode>,
    pub microphone_volume: Option<u8>,
    pub system_volume: Option<u8>,
    pub video_quality: Option<VideoQuality>,
    pub countdown_secs: Option<u32>,
}

impl RecordingSettings {
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(source) = update.audio_source {
            self.audio_source = source;
        }
        if let Some(volume) = update.microphone_volume {
            self.microphone_volume = volume.min(100);
        }
        if let Some(volume) = update.system_volume {
            self.system_volume = volume.min(100);
        }
        if let Some(quality) = update.video_quality {
            self.video_quality = quality;
        }
        if let Some(secs) = update.countdown_secs {
            self.countdown_secs = secs;
        }
    }
}
