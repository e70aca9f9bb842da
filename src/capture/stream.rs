//! Stream and track model shared by capture, mixing and recording.
//!
//! Acquired media is represented as tracks: a frame channel on one side and
//! a `TrackHandle` on the other. Stopping the handle signals the producing
//! task to shut down and marks the track released, so a session can prove
//! that every acquired resource was let go.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::quality::VideoConstraints;

/// Audio stream source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioStreamSource {
    /// System audio carried on the screen stream
    System,
    /// Microphone input
    Microphone,
    /// Output of the mixing graph
    Mixed,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    /// Audio stream source
    pub source: AudioStreamSource,
}

/// Captured video frame (BGRA pixel data)
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw pixel data, 4 bytes per pixel
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// PCM format of an audio track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Kind of acquired track, for logging and release accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    SystemAudio,
    Microphone,
    /// Output of the mixing graph
    Mixed,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::SystemAudio => write!(f, "system-audio"),
            TrackKind::Microphone => write!(f, "microphone"),
            TrackKind::Mixed => write!(f, "mixed"),
        }
    }
}

/// Stop/release control for one acquired track.
///
/// `stop()` signals the producing task over a watch channel. Every call is
/// counted so tests can assert that a session released each track exactly
/// once.
#[derive(Debug)]
pub struct TrackHandle {
    pub id: Uuid,
    pub kind: TrackKind,
    stop_tx: watch::Sender<bool>,
    stop_calls: Arc<AtomicUsize>,
}

impl TrackHandle {
    /// Create a handle plus the stop signal observed by the producer task.
    pub fn new(kind: TrackKind) -> (Self, watch::Receiver<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Self {
            id: Uuid::new_v4(),
            kind,
            stop_tx,
            stop_calls: Arc::new(AtomicUsize::new(0)),
        };
        (handle, stop_rx)
    }

    /// Signal the producer to stop and mark the track released.
    pub fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
        tracing::debug!("Track {} ({}) released", self.id, self.kind);
    }

    pub fn is_released(&self) -> bool {
        self.stop_calls.load(Ordering::SeqCst) > 0
    }

    /// Shared release counter, used by capture backends to expose release
    /// accounting to tests.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.stop_calls)
    }
}

/// A video track: capture constraints plus the frame channel and its handle
#[derive(Debug)]
pub struct VideoTrack {
    pub handle: TrackHandle,
    pub constraints: VideoConstraints,
    pub frames: mpsc::Receiver<VideoFrame>,
}

/// An audio track: PCM format plus the frame channel and its handle
#[derive(Debug)]
pub struct AudioTrack {
    pub handle: TrackHandle,
    pub spec: AudioSpec,
    pub source: AudioStreamSource,
    pub frames: mpsc::Receiver<AudioFrame>,
}

/// Result of a screen capture request: one video track, system audio when
/// it was requested and granted, and the ended signal fired when the user
/// revokes capture from outside the session.
#[derive(Debug)]
pub struct ScreenStream {
    pub video: VideoTrack,
    pub system_audio: Option<AudioTrack>,
    pub ended: watch::Receiver<bool>,
}

impl ScreenStream {
    /// Stop every track without recording anything (discard path).
    pub fn release(self) {
        self.video.handle.stop();
        if let Some(track) = self.system_audio {
            track.handle.stop();
        }
    }
}

/// Result of a microphone capture request
#[derive(Debug)]
pub struct MicStream {
    pub audio: AudioTrack,
}

impl MicStream {
    pub fn release(self) {
        self.audio.handle.stop();
    }
}

/// A single media stream bundling one video track and at most one mixed
/// audio track. This is the unit the recorder consumes.
#[derive(Debug)]
pub struct CompositeStream {
    pub video: VideoTrack,
    pub audio: Option<AudioTrack>,
    /// Handles of the source tracks whose frame channels were consumed by
    /// the mixing graph; stopped together with the composite's own tracks.
    pub source_handles: Vec<TrackHandle>,
    /// Mixing graph tasks, aborted on release (the audio context close)
    pub graph_tasks: Vec<JoinHandle<()>>,
    pub ended: watch::Receiver<bool>,
}

impl CompositeStream {
    /// Split into the frame feed the recorder consumes and the guard the
    /// session keeps for release.
    pub fn split(self) -> (MediaFeed, StreamGuard) {
        let mut handles = self.source_handles;
        let video_constraints = self.video.constraints;
        handles.push(self.video.handle);

        let (audio_spec, audio_rx) = match self.audio {
            Some(track) => {
                let spec = track.spec;
                handles.push(track.handle);
                (Some(spec), Some(track.frames))
            }
            None => (None, None),
        };

        let feed = MediaFeed {
            video_constraints,
            audio_spec,
            video_rx: self.video.frames,
            audio_rx,
        };
        let guard = StreamGuard {
            handles,
            graph_tasks: self.graph_tasks,
            ended: self.ended,
        };
        (feed, guard)
    }
}

/// Frame receivers handed to the recorder
#[derive(Debug)]
pub struct MediaFeed {
    pub video_constraints: VideoConstraints,
    pub audio_spec: Option<AudioSpec>,
    pub video_rx: mpsc::Receiver<VideoFrame>,
    pub audio_rx: Option<mpsc::Receiver<AudioFrame>>,
}

/// Owns every platform resource acquired for one session: track handles
/// and mixing graph tasks. Releasing is atomic with the state transition
/// that triggers it and leaves nothing dangling.
#[derive(Debug)]
pub struct StreamGuard {
    handles: Vec<TrackHandle>,
    graph_tasks: Vec<JoinHandle<()>>,
    ended: watch::Receiver<bool>,
}

impl StreamGuard {
    /// Signal fired when the underlying screen capture ends externally.
    pub fn ended_signal(&self) -> watch::Receiver<bool> {
        self.ended.clone()
    }

    /// Stop all tracks and close the mixing graph.
    pub fn release(&mut self) {
        for handle in self.handles.drain(..) {
            handle.stop();
        }
        for task in self.graph_tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.release();
    }
}
