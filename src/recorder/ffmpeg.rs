//! ffmpeg-backed container encoder.
//!
//! Encoding and packaging are delegated to an external `ffmpeg` binary:
//! buffered media is staged in a temporary directory (raw BGRA video plus a
//! WAV for the mixed audio track) and muxed into the target container in
//! one invocation. The staging directory is removed when the value drops.

use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use super::chunk::{Chunk, Recording};
use super::encoder::{ContainerEncoder, ContainerFormat, RecorderError, RecorderResult};
use crate::capture::{AudioSpec, VideoConstraints};

pub struct FfmpegEncoder {
    binary: PathBuf,
    format: ContainerFormat,
}

impl FfmpegEncoder {
    pub fn new(format: ContainerFormat) -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            format,
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>, format: ContainerFormat) -> Self {
        Self {
            binary: binary.into(),
            format,
        }
    }

    /// Probe the binary once, e.g. at service startup.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Re-encode an existing recording into `target`.
    pub async fn transcode(
        &self,
        recording: &Recording,
        target: ContainerFormat,
    ) -> RecorderResult<Vec<u8>> {
        let staging = tempfile::tempdir()?;
        let source_ext = extension_for_mime(&recording.mime_type);
        let input = staging.path().join(format!("input.{source_ext}"));
        let output = staging.path().join(format!("output.{}", target.extension()));

        std::fs::write(&input, &recording.data)?;

        let args = transcode_args(&input, target, &output);
        self.run(&args).await?;

        Ok(std::fs::read(&output)?)
    }

    async fn run(&self, args: &[String]) -> RecorderResult<()> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                RecorderError::EncoderUnavailable(format!(
                    "{}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RecorderError::Encoding(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerEncoder for FfmpegEncoder {
    fn format(&self) -> ContainerFormat {
        self.format
    }

    async fn assemble(
        &self,
        chunks: &[Chunk],
        video: &VideoConstraints,
        audio: Option<&AudioSpec>,
    ) -> RecorderResult<Vec<u8>> {
        let staging = tempfile::tempdir()?;
        let video_path = staging.path().join("video.raw");
        stage_video(&video_path, chunks, video)?;

        let audio_path = match audio {
            Some(spec) if chunks.iter().any(|c| !c.audio_frames.is_empty()) => {
                let path = staging.path().join("audio.wav");
                stage_audio(&path, chunks, spec)?;
                Some(path)
            }
            _ => None,
        };

        let output = staging.path().join(format!("output.{}", self.format.extension()));
        let args = encode_args(&video_path, audio_path.as_deref(), video, self.format, &output);
        self.run(&args).await?;

        Ok(std::fs::read(&output)?)
    }
}

/// Concatenate the buffered frames into one raw BGRA stream.
fn stage_video(path: &Path, chunks: &[Chunk], video: &VideoConstraints) -> RecorderResult<()> {
    let expected = (video.width * video.height * 4) as usize;
    let mut writer = BufWriter::new(File::create(path)?);
    for chunk in chunks {
        for frame in &chunk.video_frames {
            if frame.data.len() != expected {
                return Err(RecorderError::Encoding(format!(
                    "unexpected frame size: {} bytes for {}x{}",
                    frame.data.len(),
                    video.width,
                    video.height
                )));
            }
            writer.write_all(&frame.data)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write the mixed PCM track as a WAV file.
fn stage_audio(path: &Path, chunks: &[Chunk], spec: &AudioSpec) -> RecorderResult<()> {
    let wav_spec = hound::WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, wav_spec)
        .map_err(|e| RecorderError::Encoding(format!("WAV staging failed: {e}")))?;
    for chunk in chunks {
        for frame in &chunk.audio_frames {
            if frame.sample_rate != spec.sample_rate || frame.channels != spec.channels {
                warn!(
                    "Skipping audio frame with mismatched format at {}ms",
                    frame.timestamp_ms
                );
                continue;
            }
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| RecorderError::Encoding(format!("WAV staging failed: {e}")))?;
            }
        }
    }
    writer
        .finalize()
        .map_err(|e| RecorderError::Encoding(format!("WAV staging failed: {e}")))?;
    Ok(())
}

fn codec_args(format: ContainerFormat) -> Vec<String> {
    match format {
        ContainerFormat::Webm => vec![
            "-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "33", "-c:a", "libopus",
        ],
        ContainerFormat::Mp4 => vec![
            "-c:v", "libx264", "-preset", "veryfast", "-pix_fmt", "yuv420p", "-c:a", "aac",
            "-movflags", "+faststart",
        ],
    }
    .into_iter()
    .map(String::from)
    .collect()
}

fn encode_args(
    video_path: &Path,
    audio_path: Option<&Path>,
    video: &VideoConstraints,
    format: ContainerFormat,
    output: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "bgra".into(),
        "-video_size".into(),
        format!("{}x{}", video.width, video.height),
        "-framerate".into(),
        video.frame_rate.to_string(),
        "-i".into(),
        video_path.display().to_string(),
    ];
    if let Some(audio) = audio_path {
        args.push("-i".into());
        args.push(audio.display().to_string());
    }
    args.extend(codec_args(format));
    args.push(output.display().to_string());
    args
}

fn transcode_args(input: &Path, target: ContainerFormat, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), input.display().to_string()];
    args.extend(codec_args(target));
    args.push(output.display().to_string());
    args
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "video/mp4" => "mp4",
        _ => "webm",
    }
}
