// Integration tests for the audio mixing graph at the stream level
//
// Covers the mode policies from the mixer contract: video passthrough for
// `none`, gain staging for single sources, summation for `both`, and
// graceful degradation when a requested source is absent.

use captura::audio::{build_mixed_stream, AudioSourceMode, MixerSettings};
use captura::capture::{AudioStreamSource, CaptureBackend};
use captura::{SyntheticBackend, SyntheticTuning, VideoQuality};
use std::time::Duration;

fn fast_tuning() -> SyntheticTuning {
    SyntheticTuning {
        pace: Some(Duration::from_millis(2)),
        ..SyntheticTuning::default()
    }
}

async fn recv_mixed_frames(
    composite: &mut captura::CompositeStream,
    count: usize,
) -> Vec<captura::AudioFrame> {
    let audio = composite.audio.as_mut().expect("mixed audio track");
    let mut frames = Vec::new();
    for _ in 0..count {
        let frame = tokio::time::timeout(Duration::from_secs(2), audio.frames.recv())
            .await
            .expect("mixed frame arrived")
            .expect("mix output open");
        frames.push(frame);
    }
    frames
}

fn peak(frame: &captura::AudioFrame) -> i16 {
    frame
        .samples
        .iter()
        .map(|s| s.saturating_abs())
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_none_mode_passes_video_through() {
    let backend = SyntheticBackend::new(fast_tuning());
    let screen = backend
        .acquire_screen(VideoQuality::Low.constraints(), false)
        .await
        .unwrap();
    let video_id = screen.video.handle.id;

    let mut composite = build_mixed_stream(
        screen,
        None,
        &MixerSettings::new(AudioSourceMode::None, 80, 80),
    );

    assert!(composite.audio.is_none());
    assert_eq!(composite.video.handle.id, video_id);

    // Video keeps flowing
    let frame = tokio::time::timeout(Duration::from_secs(1), composite.video.frames.recv())
        .await
        .expect("frame arrived")
        .expect("channel open");
    assert_eq!(frame.width, 1280);

    let (_, mut guard) = composite.split();
    guard.release();
}

#[tokio::test]
async fn test_system_mode_applies_gain() {
    let backend = SyntheticBackend::new(fast_tuning());
    let screen = backend
        .acquire_screen(VideoQuality::Low.constraints(), true)
        .await
        .unwrap();

    let mut composite = build_mixed_stream(
        screen,
        None,
        &MixerSettings::new(AudioSourceMode::System, 80, 50),
    );

    let frames = recv_mixed_frames(&mut composite, 5).await;
    let max_peak = frames.iter().map(peak).max().unwrap();
    // The synthetic tone peaks at 8000; half gain caps it near 4000
    assert!(max_peak <= 4000, "gain not applied: peak {max_peak}");
    assert!(max_peak >= 3000, "signal lost: peak {max_peak}");
    assert!(frames.iter().all(|f| f.source == AudioStreamSource::Mixed));

    let (_, mut guard) = composite.split();
    guard.release();
}

#[tokio::test]
async fn test_both_mode_sums_sources() {
    let backend = SyntheticBackend::new(fast_tuning());
    let screen = backend
        .acquire_screen(VideoQuality::Low.constraints(), true)
        .await
        .unwrap();
    let mic = backend.acquire_microphone().await.unwrap();

    let mut composite = build_mixed_stream(
        screen,
        Some(mic),
        &MixerSettings::new(AudioSourceMode::Both, 100, 100),
    );

    // Two full-gain tones sum above a single source's 8000 peak once both
    // buffers are flowing.
    let frames = recv_mixed_frames(&mut composite, 20).await;
    let max_peak = frames.iter().map(peak).max().unwrap();
    assert!(max_peak > 9000, "sources were not summed: peak {max_peak}");

    let (_, mut guard) = composite.split();
    guard.release();
}

#[tokio::test]
async fn test_both_mode_degrades_without_microphone() {
    let backend = SyntheticBackend::new(fast_tuning());
    let screen = backend
        .acquire_screen(VideoQuality::Low.constraints(), true)
        .await
        .unwrap();

    // Microphone acquisition failed upstream: mic stream absent
    let mut composite = build_mixed_stream(
        screen,
        None,
        &MixerSettings::new(AudioSourceMode::Both, 80, 80),
    );

    // Still exactly one video track and one (system-only) audio track
    assert!(composite.audio.is_some());
    let frames = recv_mixed_frames(&mut composite, 3).await;
    assert!(frames.iter().all(|f| f.source == AudioStreamSource::Mixed));

    let (_, mut guard) = composite.split();
    guard.release();
}

#[tokio::test]
async fn test_microphone_mode_without_microphone_is_video_only() {
    let backend = SyntheticBackend::new(fast_tuning());
    let screen = backend
        .acquire_screen(VideoQuality::Low.constraints(), false)
        .await
        .unwrap();

    let composite = build_mixed_stream(
        screen,
        None,
        &MixerSettings::new(AudioSourceMode::Microphone, 80, 80),
    );

    assert!(composite.audio.is_none());

    let (feed, mut guard) = composite.split();
    assert!(feed.audio_rx.is_none());
    guard.release();
}
