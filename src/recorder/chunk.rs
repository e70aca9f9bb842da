//! Chunked recording over a composite stream.
//!
//! The recorder consumes the composite stream's frame channels, seals the
//! buffered media into fixed-cadence chunks, and on stop hands the ordered
//! chunk list to the container encoder to produce the final blob. Chunks
//! live in memory for the duration of one session; nothing is persisted
//! unless the user exports the result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::encoder::{ContainerEncoder, RecorderError, RecorderResult};
use crate::capture::{AudioFrame, MediaFeed, VideoFrame};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Cadence at which buffered media is sealed into chunks
    pub chunk_duration: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(1),
        }
    }
}

/// One sealed span of buffered media
#[derive(Debug, Default)]
pub struct Chunk {
    /// Chunk number (0-indexed, emission order)
    pub index: usize,
    /// Start of the chunk in media milliseconds
    pub start_ms: u64,
    /// End of the chunk in media milliseconds
    pub end_ms: u64,
    pub video_frames: Vec<VideoFrame>,
    pub audio_frames: Vec<AudioFrame>,
}

impl Chunk {
    fn is_empty(&self) -> bool {
        self.video_frames.is_empty() && self.audio_frames.is_empty()
    }

    pub fn span_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// A finished recording: the container blob plus its metadata
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: Uuid,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub duration_ms: u64,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    pub fn info(&self) -> RecordingInfo {
        RecordingInfo {
            id: self.id,
            mime_type: self.mime_type.clone(),
            size_bytes: self.data.len(),
            duration_ms: self.duration_ms,
            chunk_count: self.chunk_count,
            created_at: self.created_at,
        }
    }
}

/// Metadata view of a recording, safe to serialize to the UI
#[derive(Debug, Clone, Serialize)]
pub struct RecordingInfo {
    pub id: Uuid,
    pub mime_type: String,
    pub size_bytes: usize,
    pub duration_ms: u64,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

enum RecorderCommand {
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Stop(oneshot::Sender<RecorderResult<Recording>>),
}

/// Control handle for a running recorder task
pub struct RecorderHandle {
    cmd_tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    /// Suspend chunk production. Already-buffered chunks are untouched.
    pub async fn pause(&self) -> RecorderResult<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RecorderCommand::Pause(tx))
            .await
            .map_err(|_| RecorderError::NotRunning)?;
        rx.await.map_err(|_| RecorderError::NotRunning)
    }

    /// Continue chunk production after a pause.
    pub async fn resume(&self) -> RecorderResult<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RecorderCommand::Resume(tx))
            .await
            .map_err(|_| RecorderError::NotRunning)?;
        rx.await.map_err(|_| RecorderError::NotRunning)
    }

    /// Flush the pending chunk, assemble the final container blob and shut
    /// the recorder down. The chunk buffer is cleared; a fresh recorder is
    /// needed for the next session.
    pub async fn stop(self) -> RecorderResult<Recording> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RecorderCommand::Stop(tx))
            .await
            .map_err(|_| RecorderError::NotRunning)?;
        rx.await.map_err(|_| RecorderError::NotRunning)?
    }
}

/// Chunked recorder bound to one composite stream
pub struct ChunkedRecorder {
    config: RecorderConfig,
    encoder: Box<dyn ContainerEncoder>,
    current: Option<Chunk>,
    chunks: Vec<Chunk>,
    chunk_index: usize,
    paused: bool,
}

impl ChunkedRecorder {
    /// Bind a recorder to the composite stream's frame feed and start it.
    pub fn start(
        feed: MediaFeed,
        encoder: Box<dyn ContainerEncoder>,
        config: RecorderConfig,
    ) -> RecorderHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let recorder = Self {
            config,
            encoder,
            current: None,
            chunks: Vec::new(),
            chunk_index: 0,
            paused: false,
        };
        tokio::spawn(recorder.run(feed, cmd_rx));
        RecorderHandle { cmd_tx }
    }

    async fn run(mut self, feed: MediaFeed, mut cmd_rx: mpsc::Receiver<RecorderCommand>) {
        info!(
            "Recorder started: {}x{}@{}, audio: {}, chunk cadence {:?}",
            feed.video_constraints.width,
            feed.video_constraints.height,
            feed.video_constraints.frame_rate,
            feed.audio_spec.is_some(),
            self.config.chunk_duration
        );

        let MediaFeed {
            video_constraints,
            audio_spec,
            mut video_rx,
            mut audio_rx,
        } = feed;
        let mut video_open = true;
        let mut audio_open = audio_rx.is_some();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(RecorderCommand::Pause(reply)) => {
                        self.seal_current();
                        self.paused = true;
                        debug!("Recorder paused with {} chunks buffered", self.chunks.len());
                        let _ = reply.send(());
                    }
                    Some(RecorderCommand::Resume(reply)) => {
                        self.paused = false;
                        debug!("Recorder resumed");
                        let _ = reply.send(());
                    }
                    Some(RecorderCommand::Stop(reply)) => {
                        self.seal_current();
                        let result = self
                            .assemble(&video_constraints, audio_spec.as_ref())
                            .await;
                        let _ = reply.send(result);
                        return;
                    }
                    // Handle dropped without stop: discard the buffer
                    None => {
                        warn!("Recorder handle dropped; discarding {} chunks", self.chunks.len());
                        return;
                    }
                },
                frame = video_rx.recv(), if video_open => match frame {
                    Some(frame) => self.on_video_frame(frame),
                    None => video_open = false,
                },
                frame = recv_audio(&mut audio_rx), if audio_open => match frame {
                    Some(frame) => self.on_audio_frame(frame),
                    None => audio_open = false,
                },
            }
        }
    }

    fn on_video_frame(&mut self, frame: VideoFrame) {
        if self.paused {
            return;
        }
        self.roll_chunk(frame.timestamp_ms);
        let chunk = self.current.as_mut().expect("chunk opened by roll_chunk");
        chunk.end_ms = chunk.end_ms.max(frame.timestamp_ms);
        chunk.video_frames.push(frame);
    }

    fn on_audio_frame(&mut self, frame: AudioFrame) {
        if self.paused {
            return;
        }
        self.roll_chunk(frame.timestamp_ms);
        let chunk = self.current.as_mut().expect("chunk opened by roll_chunk");
        chunk.end_ms = chunk.end_ms.max(frame.timestamp_ms);
        chunk.audio_frames.push(frame);
    }

    /// Open the first chunk, or seal the current one when the incoming
    /// timestamp crosses the cadence boundary.
    fn roll_chunk(&mut self, timestamp_ms: u64) {
        let cadence_ms = self.config.chunk_duration.as_millis() as u64;
        let needs_new = match &self.current {
            None => true,
            Some(chunk) => timestamp_ms.saturating_sub(chunk.start_ms) >= cadence_ms,
        };
        if !needs_new {
            return;
        }

        self.seal_current();
        self.current = Some(Chunk {
            index: self.chunk_index,
            start_ms: timestamp_ms,
            end_ms: timestamp_ms,
            ..Chunk::default()
        });
        self.chunk_index += 1;
    }

    fn seal_current(&mut self) {
        if let Some(chunk) = self.current.take() {
            if chunk.is_empty() {
                return;
            }
            debug!(
                "Chunk {} sealed: {}ms - {}ms ({} video frames, {} audio frames)",
                chunk.index,
                chunk.start_ms,
                chunk.end_ms,
                chunk.video_frames.len(),
                chunk.audio_frames.len()
            );
            self.chunks.push(chunk);
        }
    }

    async fn assemble(
        &mut self,
        video: &crate::capture::VideoConstraints,
        audio: Option<&crate::capture::AudioSpec>,
    ) -> RecorderResult<Recording> {
        let chunks = std::mem::take(&mut self.chunks);
        let duration_ms: u64 = chunks.iter().map(|c| c.span_ms()).sum();

        let data = self.encoder.assemble(&chunks, video, audio).await?;

        info!(
            "Recording assembled: {} chunks, {}ms, {} bytes ({})",
            chunks.len(),
            duration_ms,
            data.len(),
            self.encoder.format().mime_type()
        );

        Ok(Recording {
            id: Uuid::new_v4(),
            data,
            mime_type: self.encoder.format().mime_type().to_string(),
            duration_ms,
            chunk_count: chunks.len(),
            created_at: Utc::now(),
        })
    }
}

async fn recv_audio(rx: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
