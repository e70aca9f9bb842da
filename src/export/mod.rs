//! Export collaborators: writing the finished recording to disk and
//! converting it to an alternate container format.
//!
//! These consume the session's result blob and are not part of the state
//! machine. Conversion is a real re-encode through the ffmpeg encoder, not
//! a relabeling of the same bytes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::recorder::{ContainerFormat, FfmpegEncoder, Recording};

/// Write the recording to `dir` under a timestamped filename.
pub async fn save_recording(recording: &Recording, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(recording_filename(recording));
    tokio::fs::write(&path, &recording.data)
        .await
        .with_context(|| format!("Failed to write recording to {}", path.display()))?;

    info!(
        "Recording saved: {} ({} bytes)",
        path.display(),
        recording.data.len()
    );
    Ok(path)
}

/// Re-encode the recording into `target` and return it as a new recording.
pub async fn convert_recording(
    recording: &Recording,
    target: ContainerFormat,
    encoder: &FfmpegEncoder,
) -> Result<Recording> {
    info!(
        "Converting recording {} from {} to {}",
        recording.id, recording.mime_type, target
    );
    let data = encoder
        .transcode(recording, target)
        .await
        .context("Format conversion failed")?;

    Ok(Recording {
        id: Uuid::new_v4(),
        data,
        mime_type: target.mime_type().to_string(),
        duration_ms: recording.duration_ms,
        chunk_count: recording.chunk_count,
        created_at: Utc::now(),
    })
}

/// Timestamped export filename, e.g.
/// `captura-recording-2026-08-07T12-30-05.webm`.
pub fn recording_filename(recording: &Recording) -> String {
    let extension = match recording.mime_type.as_str() {
        "video/mp4" => "mp4",
        _ => "webm",
    };
    format!(
        "captura-recording-{}.{}",
        recording.created_at.format("%Y-%m-%dT%H-%M-%S"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn recording_with(mime_type: &str, created_at: DateTime<Utc>) -> Recording {
        Recording {
            id: Uuid::new_v4(),
            data: Vec::new(),
            mime_type: mime_type.to_string(),
            duration_ms: 0,
            chunk_count: 0,
            created_at,
        }
    }

    #[test]
    fn test_recording_filename() {
        let created = Utc.with_ymd_and_hms(2026, 8, 7, 12, 30, 5).unwrap();
        assert_eq!(
            recording_filename(&recording_with("video/webm", created)),
            "captura-recording-2026-08-07T12-30-05.webm"
        );
        assert_eq!(
            recording_filename(&recording_with("video/mp4", created)),
            "captura-recording-2026-08-07T12-30-05.mp4"
        );
    }

    #[tokio::test]
    async fn test_save_recording_writes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let recording = Recording {
            id: Uuid::new_v4(),
            data: vec![1, 2, 3, 4],
            mime_type: "video/webm".to_string(),
            duration_ms: 1000,
            chunk_count: 1,
            created_at: Utc::now(),
        };

        let path = save_recording(&recording, dir.path()).await.unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("captura-recording-"));
    }
}
