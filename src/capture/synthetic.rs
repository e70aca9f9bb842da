//! Synthetic capture backend.
//!
//! Generates test-pattern video frames and sine-tone PCM with logical media
//! timestamps. Serves as the in-tree backend for demos and as the capture
//! source for integration tests: pacing is tunable so tests run on
//! millisecond clocks, faults can be injected, and screen revocation can be
//! triggered on demand.

use async_trait::async_trait;
use std::f32::consts::TAU;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::backend::{CaptureBackend, CaptureError, CaptureResult};
use super::quality::VideoConstraints;
use super::stream::{
    AudioFrame, AudioSpec, AudioStreamSource, AudioTrack, MicStream, ScreenStream, TrackHandle,
    TrackKind, VideoFrame, VideoTrack,
};

/// Media milliseconds of PCM carried by one generated audio frame
const AUDIO_FRAME_MS: u64 = 100;

/// Behavior knobs for the synthetic backend
#[derive(Debug, Clone)]
pub struct SyntheticTuning {
    /// Wall-clock pacing between generated frames. `None` paces video at
    /// the preset's frame interval and audio at 100 ms, i.e. real time.
    pub pace: Option<Duration>,
    /// Wall-clock delay before an acquisition resolves, to model the
    /// platform permission prompt.
    pub acquire_delay: Option<Duration>,
    /// Refuse screen capture as a plain denial
    pub deny_screen: bool,
    /// Refuse screen capture the way a restrictive embedding context does
    pub deny_policy: bool,
    /// Refuse microphone capture
    pub fail_microphone: bool,
    /// PCM format of generated audio tracks
    pub audio_spec: AudioSpec,
}

impl Default for SyntheticTuning {
    fn default() -> Self {
        Self {
            pace: None,
            acquire_delay: None,
            deny_screen: false,
            deny_policy: false,
            fail_microphone: false,
            audio_spec: AudioSpec::default(),
        }
    }
}

pub struct SyntheticBackend {
    tuning: SyntheticTuning,
    /// Ended signal of the most recent screen acquisition
    revoke_tx: Mutex<Option<watch::Sender<bool>>>,
    /// Release counters of every track handed out, for test assertions
    releases: Mutex<Vec<(TrackKind, Arc<AtomicUsize>)>>,
}

impl SyntheticBackend {
    pub fn new(tuning: SyntheticTuning) -> Self {
        Self {
            tuning,
            revoke_tx: Mutex::new(None),
            releases: Mutex::new(Vec::new()),
        }
    }

    /// Fire the ended signal of the active screen stream, as if the user
    /// revoked capture permission outside the session.
    pub fn revoke_screen(&self) {
        if let Some(tx) = self.revoke_tx.lock().unwrap().as_ref() {
            debug!("Synthetic screen capture revoked");
            let _ = tx.send(true);
        }
    }

    /// Release-call counts of every track handed out so far, in
    /// acquisition order.
    pub fn release_counts(&self) -> Vec<(TrackKind, usize)> {
        self.releases
            .lock()
            .unwrap()
            .iter()
            .map(|(kind, count)| (*kind, count.load(std::sync::atomic::Ordering::SeqCst)))
            .collect()
    }

    fn track_handle(&self, kind: TrackKind) -> (TrackHandle, watch::Receiver<bool>) {
        let (handle, stop_rx) = TrackHandle::new(kind);
        self.releases
            .lock()
            .unwrap()
            .push((kind, handle.release_counter()));
        (handle, stop_rx)
    }

    fn spawn_video_producer(
        &self,
        constraints: VideoConstraints,
        stop_rx: watch::Receiver<bool>,
        ended_rx: watch::Receiver<bool>,
    ) -> mpsc::Receiver<VideoFrame> {
        // Shallow queue: raw frames are large, a slow consumer drops frames
        // rather than buffering seconds of video
        let (tx, rx) = mpsc::channel(16);
        let pace = self
            .tuning
            .pace
            .unwrap_or_else(|| Duration::from_millis(constraints.frame_interval_ms()));
        tokio::spawn(produce_video(constraints, pace, tx, stop_rx, ended_rx));
        rx
    }

    fn spawn_audio_producer(
        &self,
        source: AudioStreamSource,
        tone_hz: f32,
        stop_rx: watch::Receiver<bool>,
        ended_rx: Option<watch::Receiver<bool>>,
    ) -> mpsc::Receiver<AudioFrame> {
        let (tx, rx) = mpsc::channel(100);
        let pace = self
            .tuning
            .pace
            .unwrap_or(Duration::from_millis(AUDIO_FRAME_MS));
        let spec = self.tuning.audio_spec;
        tokio::spawn(produce_audio(spec, source, tone_hz, pace, tx, stop_rx, ended_rx));
        rx
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticTuning::default())
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn acquire_screen(
        &self,
        constraints: VideoConstraints,
        system_audio: bool,
    ) -> CaptureResult<ScreenStream> {
        if let Some(delay) = self.tuning.acquire_delay {
            tokio::time::sleep(delay).await;
        }
        if self.tuning.deny_policy {
            return Err(CaptureError::PolicyRestricted);
        }
        if self.tuning.deny_screen {
            return Err(CaptureError::Denied("capture request dismissed".into()));
        }

        let (ended_tx, ended_rx) = watch::channel(false);
        *self.revoke_tx.lock().unwrap() = Some(ended_tx);

        let (video_handle, video_stop) = self.track_handle(TrackKind::Video);
        let video_rx = self.spawn_video_producer(constraints, video_stop, ended_rx.clone());
        let video = VideoTrack {
            handle: video_handle,
            constraints,
            frames: video_rx,
        };

        let system = if system_audio {
            let (handle, stop_rx) = self.track_handle(TrackKind::SystemAudio);
            let frames =
                self.spawn_audio_producer(AudioStreamSource::System, 440.0, stop_rx, Some(ended_rx.clone()));
            Some(AudioTrack {
                handle,
                spec: self.tuning.audio_spec,
                source: AudioStreamSource::System,
                frames,
            })
        } else {
            None
        };

        debug!(
            "Synthetic screen stream acquired: {}x{}@{} (system audio: {})",
            constraints.width,
            constraints.height,
            constraints.frame_rate,
            system.is_some()
        );

        Ok(ScreenStream {
            video,
            system_audio: system,
            ended: ended_rx,
        })
    }

    async fn acquire_microphone(&self) -> CaptureResult<MicStream> {
        if let Some(delay) = self.tuning.acquire_delay {
            tokio::time::sleep(delay).await;
        }
        if self.tuning.fail_microphone {
            return Err(CaptureError::MicrophoneUnavailable(
                "no input device".into(),
            ));
        }

        let (handle, stop_rx) = self.track_handle(TrackKind::Microphone);
        let frames = self.spawn_audio_producer(AudioStreamSource::Microphone, 880.0, stop_rx, None);
        Ok(MicStream {
            audio: AudioTrack {
                handle,
                spec: self.tuning.audio_spec,
                source: AudioStreamSource::Microphone,
                frames,
            },
        })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

async fn produce_video(
    constraints: VideoConstraints,
    pace: Duration,
    tx: mpsc::Sender<VideoFrame>,
    mut stop_rx: watch::Receiver<bool>,
    mut ended_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(pace);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let step_ms = constraints.frame_interval_ms();
    let mut timestamp_ms = 0u64;
    let mut index = 0u32;
    let mut dropped = 0u64;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ended_rx.changed() => break,
            _ = ticker.tick() => {
                let frame = test_pattern_frame(constraints, index, timestamp_ms);
                match tx.try_send(frame) {
                    Ok(()) => {}
                    // Consumer is behind; drop the frame, never block capture
                    Err(mpsc::error::TrySendError::Full(_)) => dropped += 1,
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
                timestamp_ms += step_ms;
                index = index.wrapping_add(1);
            }
        }
    }
    if dropped > 0 {
        debug!("Synthetic video producer dropped {} frames", dropped);
    }
    debug!("Synthetic video producer stopped at {}ms", timestamp_ms);
}

async fn produce_audio(
    spec: AudioSpec,
    source: AudioStreamSource,
    tone_hz: f32,
    pace: Duration,
    tx: mpsc::Sender<AudioFrame>,
    mut stop_rx: watch::Receiver<bool>,
    ended_rx: Option<watch::Receiver<bool>>,
) {
    let mut ticker = tokio::time::interval(pace);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut ended_rx = ended_rx;
    let mut timestamp_ms = 0u64;
    let mut phase = 0u64;

    loop {
        let revoked = async {
            match ended_rx.as_mut() {
                Some(rx) => {
                    let _ = rx.changed().await;
                }
                // Microphone tracks have no external ended signal
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = revoked => break,
            _ = ticker.tick() => {
                let frame = tone_frame(spec, source, tone_hz, timestamp_ms, &mut phase);
                match tx.try_send(frame) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("Audio queue full; dropping {:?} frame at {}ms", source, timestamp_ms);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
                timestamp_ms += AUDIO_FRAME_MS;
            }
        }
    }
    debug!("Synthetic {:?} audio producer stopped at {}ms", source, timestamp_ms);
}

/// Mostly-black BGRA frame with a moving marker, cheap to generate at any
/// resolution.
fn test_pattern_frame(constraints: VideoConstraints, index: u32, timestamp_ms: u64) -> VideoFrame {
    let len = (constraints.width * constraints.height * 4) as usize;
    let mut data = vec![0u8; len];
    let marker = ((index as usize * 4) % len.max(4)) & !3;
    if marker + 4 <= len {
        // BGRA white pixel
        data[marker..marker + 4].copy_from_slice(&[255, 255, 255, 255]);
    }
    VideoFrame {
        data,
        width: constraints.width,
        height: constraints.height,
        timestamp_ms,
    }
}

fn tone_frame(
    spec: AudioSpec,
    source: AudioStreamSource,
    tone_hz: f32,
    timestamp_ms: u64,
    phase: &mut u64,
) -> AudioFrame {
    let frames_per_chunk = (spec.sample_rate as u64 * AUDIO_FRAME_MS / 1000) as usize;
    let mut samples = Vec::with_capacity(frames_per_chunk * spec.channels as usize);
    for _ in 0..frames_per_chunk {
        let t = *phase as f32 / spec.sample_rate as f32;
        let value = ((t * tone_hz * TAU).sin() * 8000.0) as i16;
        for _ in 0..spec.channels {
            samples.push(value);
        }
        *phase += 1;
    }
    AudioFrame {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        timestamp_ms,
        source,
    }
}
