use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::AudioSourceMode;
use crate::capture::VideoQuality;
use crate::session::RecordingSettings;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Set by a wrapping host when the recorder is served inside a
    /// restrictive embedding context. Affects error messaging only.
    #[serde(default)]
    pub embedded: bool,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    pub output_dir: PathBuf,
    #[serde(default = "default_audio_source")]
    pub audio_source: AudioSourceMode,
    #[serde(default = "default_volume")]
    pub microphone_volume: u8,
    #[serde(default = "default_volume")]
    pub system_volume: u8,
    #[serde(default)]
    pub video_quality: VideoQuality,
    #[serde(default = "default_countdown")]
    pub countdown_secs: u32,
}

fn default_audio_source() -> AudioSourceMode {
    AudioSourceMode::Microphone
}

fn default_volume() -> u8 {
    80
}

fn default_countdown() -> u32 {
    3
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Initial session settings derived from the `[recording]` section.
    pub fn initial_settings(&self) -> RecordingSettings {
        RecordingSettings {
            audio_source: self.recording.audio_source,
            microphone_volume: self.recording.microphone_volume.min(100),
            system_volume: self.recording.system_volume.min(100),
            video_quality: self.recording.video_quality,
            countdown_secs: self.recording.countdown_secs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "captura".to_string(),
                embedded: false,
                http: HttpConfig {
                    bind: "127.0.0.1".to_string(),
                    port: 8745,
                },
            },
            recording: RecordingConfig {
                output_dir: PathBuf::from("recordings"),
                audio_source: default_audio_source(),
                microphone_volume: default_volume(),
                system_volume: default_volume(),
                video_quality: VideoQuality::default(),
                countdown_secs: default_countdown(),
            },
        }
    }
}
