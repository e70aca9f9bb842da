// Integration tests for chunked recording
//
// These tests feed synthetic frames through the recorder's media feed and
// verify chunk sealing at the configured cadence, pause/resume behavior,
// and final assembly through a stub container encoder.

use async_trait::async_trait;
use captura::capture::{AudioFrame, AudioSpec, AudioStreamSource, MediaFeed, VideoFrame};
use captura::recorder::{
    Chunk, ChunkedRecorder, ContainerEncoder, ContainerFormat, RecorderConfig, RecorderError,
    RecorderResult,
};
use captura::VideoConstraints;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
struct ChunkSummary {
    index: usize,
    start_ms: u64,
    end_ms: u64,
    video_frames: usize,
    audio_frames: usize,
}

#[derive(Clone, Default)]
struct StubEncoder {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<ChunkSummary>>>,
}

#[async_trait]
impl ContainerEncoder for StubEncoder {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Webm
    }

    async fn assemble(
        &self,
        chunks: &[Chunk],
        _video: &VideoConstraints,
        _audio: Option<&AudioSpec>,
    ) -> RecorderResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut seen = self.seen.lock().unwrap();
        let mut bytes = 0;
        for chunk in chunks {
            seen.push(ChunkSummary {
                index: chunk.index,
                start_ms: chunk.start_ms,
                end_ms: chunk.end_ms,
                video_frames: chunk.video_frames.len(),
                audio_frames: chunk.audio_frames.len(),
            });
            bytes += chunk.video_frames.len() + chunk.audio_frames.len();
        }
        Ok(vec![0u8; bytes])
    }
}

struct FailingEncoder;

#[async_trait]
impl ContainerEncoder for FailingEncoder {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Webm
    }

    async fn assemble(
        &self,
        _chunks: &[Chunk],
        _video: &VideoConstraints,
        _audio: Option<&AudioSpec>,
    ) -> RecorderResult<Vec<u8>> {
        Err(RecorderError::Encoding("codec exploded".to_string()))
    }
}

fn one_second_cadence() -> RecorderConfig {
    RecorderConfig {
        chunk_duration: Duration::from_secs(1),
    }
}

type Feed = (
    mpsc::Sender<VideoFrame>,
    Option<mpsc::Sender<AudioFrame>>,
    MediaFeed,
);

fn make_feed(with_audio: bool) -> Feed {
    let constraints = VideoConstraints {
        width: 4,
        height: 1,
        frame_rate: 10,
    };
    let (video_tx, video_rx) = mpsc::channel(100);
    let (audio_tx, audio_rx) = if with_audio {
        let (tx, rx) = mpsc::channel(100);
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };
    let feed = MediaFeed {
        video_constraints: constraints,
        audio_spec: with_audio.then(AudioSpec::default),
        video_rx,
        audio_rx,
    };
    (video_tx, audio_tx, feed)
}

fn video_frame(timestamp_ms: u64) -> VideoFrame {
    VideoFrame {
        data: vec![0u8; 16],
        width: 4,
        height: 1,
        timestamp_ms,
    }
}

fn audio_frame(timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![0i16; 96],
        sample_rate: 48000,
        channels: 2,
        timestamp_ms,
        source: AudioStreamSource::Mixed,
    }
}

/// Let the recorder task drain frames already queued on its channels.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_single_chunk_within_cadence() {
    let encoder = StubEncoder::default();
    let (video_tx, _audio_tx, feed) = make_feed(false);
    let handle = ChunkedRecorder::start(feed, Box::new(encoder.clone()), one_second_cadence());

    for ts in (0..=400).step_by(100) {
        video_tx.send(video_frame(ts)).await.unwrap();
    }
    settle().await;

    let recording = handle.stop().await.unwrap();
    assert_eq!(recording.chunk_count, 1);
    assert_eq!(recording.duration_ms, 400);
    assert_eq!(recording.mime_type, "video/webm");
    assert_eq!(recording.data.len(), 5);

    let seen = encoder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].start_ms, 0);
    assert_eq!(seen[0].end_ms, 400);
    assert_eq!(seen[0].video_frames, 5);
}

#[tokio::test]
async fn test_chunks_sealed_at_cadence_boundaries() {
    let encoder = StubEncoder::default();
    let (video_tx, _audio_tx, feed) = make_feed(false);
    let handle = ChunkedRecorder::start(feed, Box::new(encoder.clone()), one_second_cadence());

    for ts in (0..=2500).step_by(250) {
        video_tx.send(video_frame(ts)).await.unwrap();
    }
    settle().await;

    let recording = handle.stop().await.unwrap();
    assert_eq!(recording.chunk_count, 3);
    // 750 + 750 + 500 of media time
    assert_eq!(recording.duration_ms, 2000);

    let seen = encoder.seen.lock().unwrap();
    let bounds: Vec<(usize, u64, u64)> = seen.iter().map(|c| (c.index, c.start_ms, c.end_ms)).collect();
    assert_eq!(bounds, vec![(0, 0, 750), (1, 1000, 1750), (2, 2000, 2500)]);
}

#[tokio::test]
async fn test_pause_discards_frames_without_corrupting_buffer() {
    let encoder = StubEncoder::default();
    let (video_tx, _audio_tx, feed) = make_feed(false);
    let handle = ChunkedRecorder::start(feed, Box::new(encoder.clone()), one_second_cadence());

    for ts in (0..=900).step_by(100) {
        video_tx.send(video_frame(ts)).await.unwrap();
    }
    settle().await;
    handle.pause().await.unwrap();

    // Sources keep producing while paused; these frames are dropped
    for ts in (1000..=1900).step_by(100) {
        video_tx.send(video_frame(ts)).await.unwrap();
    }
    settle().await;
    handle.resume().await.unwrap();

    for ts in (2000..=2900).step_by(100) {
        video_tx.send(video_frame(ts)).await.unwrap();
    }
    settle().await;

    let recording = handle.stop().await.unwrap();
    assert_eq!(recording.chunk_count, 2);

    let seen = encoder.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    // Everything buffered before the pause survives untouched
    assert_eq!((seen[0].start_ms, seen[0].end_ms, seen[0].video_frames), (0, 900, 10));
    // The paused second never entered the buffer
    assert_eq!((seen[1].start_ms, seen[1].end_ms, seen[1].video_frames), (2000, 2900, 10));
}

#[tokio::test]
async fn test_audio_and_video_buffered_together() {
    let encoder = StubEncoder::default();
    let (video_tx, audio_tx, feed) = make_feed(true);
    let audio_tx = audio_tx.unwrap();
    let handle = ChunkedRecorder::start(feed, Box::new(encoder.clone()), one_second_cadence());

    for ts in (0..=900).step_by(100) {
        video_tx.send(video_frame(ts)).await.unwrap();
        audio_tx.send(audio_frame(ts)).await.unwrap();
    }
    settle().await;

    let recording = handle.stop().await.unwrap();
    assert_eq!(recording.chunk_count, 1);
    assert_eq!(recording.data.len(), 20);

    let seen = encoder.seen.lock().unwrap();
    assert_eq!(seen[0].video_frames, 10);
    assert_eq!(seen[0].audio_frames, 10);
}

#[tokio::test]
async fn test_stop_with_nothing_buffered_still_assembles() {
    let encoder = StubEncoder::default();
    let (_video_tx, _audio_tx, feed) = make_feed(false);
    let handle = ChunkedRecorder::start(feed, Box::new(encoder.clone()), one_second_cadence());

    let recording = handle.stop().await.unwrap();
    assert_eq!(recording.chunk_count, 0);
    assert!(recording.data.is_empty());
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_handle_discards_buffer() {
    let encoder = StubEncoder::default();
    let (video_tx, _audio_tx, feed) = make_feed(false);
    let handle = ChunkedRecorder::start(feed, Box::new(encoder.clone()), one_second_cadence());

    for ts in (0..=400).step_by(100) {
        video_tx.send(video_frame(ts)).await.unwrap();
    }
    settle().await;

    drop(handle);
    settle().await;

    // No assembly happened; the buffer is gone with the task
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_encoder_failure_surfaces_on_stop() {
    let (video_tx, _audio_tx, feed) = make_feed(false);
    let handle = ChunkedRecorder::start(feed, Box::new(FailingEncoder), one_second_cadence());

    video_tx.send(video_frame(0)).await.unwrap();
    settle().await;

    let result = handle.stop().await;
    assert!(matches!(result, Err(RecorderError::Encoding(_))));
}
