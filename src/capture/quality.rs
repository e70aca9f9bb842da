use serde::{Deserialize, Serialize};

/// Named video quality preset selectable from the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Resolution and frame-rate constraints applied to the screen capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl VideoQuality {
    /// Fixed preset table: low 720p15, medium 1080p30, high 1440p60.
    pub fn constraints(self) -> VideoConstraints {
        match self {
            VideoQuality::Low => VideoConstraints {
                width: 1280,
                height: 720,
                frame_rate: 15,
            },
            VideoQuality::Medium => VideoConstraints {
                width: 1920,
                height: 1080,
                frame_rate: 30,
            },
            VideoQuality::High => VideoConstraints {
                width: 2560,
                height: 1440,
                frame_rate: 60,
            },
        }
    }
}

impl VideoConstraints {
    /// Milliseconds between frames at the requested rate.
    pub fn frame_interval_ms(&self) -> u64 {
        1000 / self.frame_rate.max(1) as u64
    }
}
