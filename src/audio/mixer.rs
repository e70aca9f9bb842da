// Audio mixing graph for combining system audio and microphone streams
//
// Builds the composite stream the recorder consumes: the screen's video
// track plus at most one mixed audio track. Each enabled source passes
// through a gain stage (volume / 100) before being summed with clipping.
//
// Mixing is best effort: a missing source degrades the mix to fewer
// inputs, and a construction failure falls back to the unmixed screen
// stream so recording can still proceed.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capture::{
    AudioFrame, AudioSpec, AudioStreamSource, AudioTrack, CompositeStream, MicStream,
    ScreenStream, TrackHandle, TrackKind,
};

/// Which audio sources feed the mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSourceMode {
    None,
    Microphone,
    System,
    Both,
}

impl AudioSourceMode {
    pub fn wants_microphone(self) -> bool {
        matches!(self, AudioSourceMode::Microphone | AudioSourceMode::Both)
    }

    pub fn wants_system(self) -> bool {
        matches!(self, AudioSourceMode::System | AudioSourceMode::Both)
    }
}

/// Volume and routing settings for one mixing graph
#[derive(Debug, Clone, Copy)]
pub struct MixerSettings {
    pub mode: AudioSourceMode,
    /// Microphone gain as a percentage (0-100)
    pub microphone_volume: u8,
    /// System audio gain as a percentage (0-100)
    pub system_volume: u8,
    /// Frames older than this are dropped to prevent unbounded buffering
    pub max_buffer_delay_ms: u64,
}

impl MixerSettings {
    pub fn new(mode: AudioSourceMode, microphone_volume: u8, system_volume: u8) -> Self {
        Self {
            mode,
            microphone_volume,
            system_volume,
            max_buffer_delay_ms: 200,
        }
    }
}

fn gain(volume: u8) -> f32 {
    volume.min(100) as f32 / 100.0
}

/// Build the composite stream for a recording attempt.
///
/// Consumes the acquired streams and returns one stream carrying exactly
/// one video track and zero-or-one mixed audio track. Never fails: on any
/// internal construction problem the unmixed screen stream is forwarded
/// instead.
pub fn build_mixed_stream(
    screen: ScreenStream,
    mic: Option<MicStream>,
    settings: &MixerSettings,
) -> CompositeStream {
    let ScreenStream {
        video,
        system_audio,
        ended,
    } = screen;

    if settings.mode == AudioSourceMode::None {
        // Video only: any audio track on the screen stream is dropped from
        // the mix, its handle retained for release.
        let mut source_handles = Vec::new();
        if let Some(track) = system_audio {
            source_handles.push(track.handle);
        }
        if let Some(m) = mic {
            source_handles.push(m.audio.handle);
        }
        return CompositeStream {
            video,
            audio: None,
            source_handles,
            graph_tasks: Vec::new(),
            ended,
        };
    }

    if let Err(e) = validate_sources(&system_audio, &mic) {
        warn!("Audio mixing setup failed: {e}; continuing with unmixed stream");
        let mut source_handles = Vec::new();
        if let Some(m) = mic {
            source_handles.push(m.audio.handle);
        }
        let audio = system_audio.filter(|_| settings.mode.wants_system());
        return CompositeStream {
            video,
            audio,
            source_handles,
            graph_tasks: Vec::new(),
            ended,
        };
    }

    let mut source_handles = Vec::new();
    let mut inputs: Vec<AudioTrack> = Vec::new();
    let mut gains: HashMap<AudioStreamSource, f32> = HashMap::new();

    match system_audio {
        Some(track) if settings.mode.wants_system() => {
            gains.insert(AudioStreamSource::System, gain(settings.system_volume));
            inputs.push(track);
        }
        Some(track) => source_handles.push(track.handle),
        None => {}
    }

    match mic {
        Some(m) if settings.mode.wants_microphone() => {
            gains.insert(
                AudioStreamSource::Microphone,
                gain(settings.microphone_volume),
            );
            inputs.push(m.audio);
        }
        Some(m) => source_handles.push(m.audio.handle),
        None => {
            if settings.mode.wants_microphone() {
                debug!("Microphone requested but absent; mixing degrades to remaining sources");
            }
        }
    }

    if inputs.is_empty() {
        // Every requested source failed to acquire; record video-only.
        return CompositeStream {
            video,
            audio: None,
            source_handles,
            graph_tasks: Vec::new(),
            ended,
        };
    }

    let spec = inputs[0].spec;
    let mut graph_tasks = Vec::new();

    // Route every input through one merged channel; the graph task buffers
    // frames per source and sums them.
    let (merged_tx, merged_rx) = mpsc::channel::<AudioFrame>(100);
    for track in inputs {
        source_handles.push(track.handle);
        let mut rx = track.frames;
        let tx = merged_tx.clone();
        graph_tasks.push(tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(merged_tx);

    let (out_tx, out_rx) = mpsc::channel::<AudioFrame>(100);
    let source_count = gains.len();
    let graph = MixGraph::new(spec, gains, settings.max_buffer_delay_ms);
    graph_tasks.push(tokio::spawn(graph.run(merged_rx, out_tx)));

    let (mixed_handle, _mixed_stop) = TrackHandle::new(TrackKind::Mixed);
    let audio = AudioTrack {
        handle: mixed_handle,
        spec,
        source: AudioStreamSource::Mixed,
        frames: out_rx,
    };

    info!(
        "Audio mixing graph started: {:?}, {} Hz, {} channels, {} sources",
        settings.mode,
        spec.sample_rate,
        spec.channels,
        source_count
    );

    CompositeStream {
        video,
        audio: Some(audio),
        source_handles,
        graph_tasks,
        ended,
    }
}

fn validate_sources(system: &Option<AudioTrack>, mic: &Option<MicStream>) -> Result<()> {
    let specs: Vec<AudioSpec> = system
        .iter()
        .map(|t| t.spec)
        .chain(mic.iter().map(|m| m.audio.spec))
        .collect();

    for spec in &specs {
        if spec.sample_rate == 0 || spec.channels == 0 {
            bail!(
                "invalid audio format: {} Hz, {} channels",
                spec.sample_rate,
                spec.channels
            );
        }
    }
    if let [a, b] = specs[..] {
        if a != b {
            bail!(
                "source format mismatch: {} Hz/{}ch vs {} Hz/{}ch",
                a.sample_rate,
                a.channels,
                b.sample_rate,
                b.channels
            );
        }
    }
    Ok(())
}

/// The summation node: buffers gain-adjusted frames per source, aligns them
/// loosely by arrival, and emits one mixed output frame at a time.
struct MixGraph {
    spec: AudioSpec,
    gains: HashMap<AudioStreamSource, f32>,
    buffers: HashMap<AudioStreamSource, VecDeque<AudioFrame>>,
    current_position_ms: u64,
    max_buffer_delay_ms: u64,
}

impl MixGraph {
    fn new(spec: AudioSpec, gains: HashMap<AudioStreamSource, f32>, max_buffer_delay_ms: u64) -> Self {
        let buffers = gains.keys().map(|s| (*s, VecDeque::new())).collect();
        Self {
            spec,
            gains,
            buffers,
            current_position_ms: 0,
            max_buffer_delay_ms,
        }
    }

    async fn run(mut self, mut merged_rx: mpsc::Receiver<AudioFrame>, out_tx: mpsc::Sender<AudioFrame>) {
        while let Some(frame) = merged_rx.recv().await {
            self.buffer_frame(frame);
            if let Some(mixed) = self.mix_next_chunk() {
                if out_tx.send(mixed).await.is_err() {
                    return;
                }
            }
        }

        // Flush remaining buffered frames
        while let Some(mixed) = self.mix_next_chunk() {
            if out_tx.send(mixed).await.is_err() {
                return;
            }
        }
        debug!("Audio mixing graph drained at {}ms", self.current_position_ms);
    }

    /// Apply the source's gain and queue the frame for mixing.
    fn buffer_frame(&mut self, mut frame: AudioFrame) {
        let Some(&gain) = self.gains.get(&frame.source) else {
            debug!("Skipping frame from unrouted source: {:?}", frame.source);
            return;
        };

        if frame.sample_rate != self.spec.sample_rate || frame.channels != self.spec.channels {
            warn!(
                "Frame format mismatch: expected {} Hz/{}ch, got {} Hz/{}ch. Dropping frame.",
                self.spec.sample_rate, self.spec.channels, frame.sample_rate, frame.channels
            );
            return;
        }

        if (gain - 1.0).abs() > f32::EPSILON {
            for sample in &mut frame.samples {
                *sample = (*sample as f32 * gain)
                    .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            }
        }

        if let Some(buffer) = self.buffers.get_mut(&frame.source) {
            buffer.push_back(frame);
        }
        self.cleanup_old_frames();
    }

    /// Remove frames that are too old (beyond max buffer delay)
    fn cleanup_old_frames(&mut self) {
        let cutoff = self
            .current_position_ms
            .saturating_sub(self.max_buffer_delay_ms);
        for (source, buffer) in &mut self.buffers {
            while let Some(frame) = buffer.front() {
                if frame.timestamp_ms < cutoff {
                    warn!(
                        "Dropping stale {:?} frame at {}ms (position {}ms)",
                        source, frame.timestamp_ms, self.current_position_ms
                    );
                    buffer.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Pop one frame per source with data available and sum them.
    fn mix_next_chunk(&mut self) -> Option<AudioFrame> {
        let mut frames: Vec<AudioFrame> = Vec::new();
        for buffer in self.buffers.values_mut() {
            if let Some(frame) = buffer.pop_front() {
                frames.push(frame);
            }
        }

        match frames.len() {
            0 => None,
            1 => {
                let mut frame = frames.pop().unwrap();
                self.current_position_ms = frame.timestamp_ms;
                frame.source = AudioStreamSource::Mixed;
                Some(frame)
            }
            _ => {
                let mixed = self.sum_frames(&frames);
                self.current_position_ms = mixed.timestamp_ms;
                Some(mixed)
            }
        }
    }

    /// Sum pre-gained frames sample-wise, clipping to the i16 range.
    fn sum_frames(&self, frames: &[AudioFrame]) -> AudioFrame {
        let timestamp_ms = frames.iter().map(|f| f.timestamp_ms).min().unwrap_or(0);
        let max_len = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);
        let mut samples = Vec::with_capacity(max_len);

        for i in 0..max_len {
            let mut sum: i32 = 0;
            for frame in frames {
                sum += frame.samples.get(i).copied().unwrap_or(0) as i32;
            }
            samples.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }

        AudioFrame {
            samples,
            sample_rate: self.spec.sample_rate,
            channels: self.spec.channels,
            timestamp_ms,
            source: AudioStreamSource::Mixed,
        }
    }
}
