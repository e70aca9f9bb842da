// Integration tests for the synthetic capture backend
//
// These tests verify that acquired tracks honor the requested constraints,
// that failures are reported with the right taxonomy, and that release and
// revocation signals behave the way the session relies on.

use captura::capture::{CaptureBackend, CaptureError, TrackKind};
use captura::{SyntheticBackend, SyntheticTuning, VideoQuality};
use std::time::Duration;

fn fast_tuning() -> SyntheticTuning {
    SyntheticTuning {
        pace: Some(Duration::from_millis(2)),
        ..SyntheticTuning::default()
    }
}

#[tokio::test]
async fn test_screen_stream_honors_constraints() {
    let backend = SyntheticBackend::new(fast_tuning());
    let constraints = VideoQuality::Low.constraints();

    let mut stream = backend.acquire_screen(constraints, false).await.unwrap();
    assert_eq!(stream.video.constraints, constraints);
    assert!(stream.system_audio.is_none());

    let frame = tokio::time::timeout(Duration::from_secs(1), stream.video.frames.recv())
        .await
        .expect("frame arrived")
        .expect("channel open");
    assert_eq!(frame.width, 1280);
    assert_eq!(frame.height, 720);
    assert_eq!(frame.data.len(), 1280 * 720 * 4);

    stream.release();
}

#[tokio::test]
async fn test_system_audio_included_when_requested() {
    let backend = SyntheticBackend::new(fast_tuning());
    let constraints = VideoQuality::Low.constraints();

    let stream = backend.acquire_screen(constraints, true).await.unwrap();
    let mut audio = stream.system_audio.expect("system audio track");

    let frame = tokio::time::timeout(Duration::from_secs(1), audio.frames.recv())
        .await
        .expect("frame arrived")
        .expect("channel open");
    assert_eq!(frame.sample_rate, audio.spec.sample_rate);
    assert_eq!(frame.channels, audio.spec.channels);
    assert!(!frame.samples.is_empty());

    audio.handle.stop();
    stream.video.handle.stop();
}

#[tokio::test]
async fn test_denied_screen_capture() {
    let backend = SyntheticBackend::new(SyntheticTuning {
        deny_screen: true,
        ..fast_tuning()
    });

    let result = backend
        .acquire_screen(VideoQuality::Medium.constraints(), false)
        .await;
    assert!(matches!(result, Err(CaptureError::Denied(_))));
}

#[tokio::test]
async fn test_policy_restricted_screen_capture() {
    let backend = SyntheticBackend::new(SyntheticTuning {
        deny_policy: true,
        ..fast_tuning()
    });

    let result = backend
        .acquire_screen(VideoQuality::Medium.constraints(), false)
        .await;
    assert!(matches!(result, Err(CaptureError::PolicyRestricted)));
}

#[tokio::test]
async fn test_microphone_failure() {
    let backend = SyntheticBackend::new(SyntheticTuning {
        fail_microphone: true,
        ..fast_tuning()
    });

    let result = backend.acquire_microphone().await;
    assert!(matches!(result, Err(CaptureError::MicrophoneUnavailable(_))));
}

#[tokio::test]
async fn test_stop_halts_producer_and_counts_release() {
    let backend = SyntheticBackend::new(fast_tuning());
    let mut stream = backend
        .acquire_screen(VideoQuality::Low.constraints(), false)
        .await
        .unwrap();

    stream.video.handle.stop();

    // Producer winds down: the frame channel drains and closes
    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        while stream.video.frames.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "video channel should close after stop");

    let counts = backend.release_counts();
    assert_eq!(counts, vec![(TrackKind::Video, 1)]);
}

#[tokio::test]
async fn test_revoke_fires_ended_signal() {
    let backend = SyntheticBackend::new(fast_tuning());
    let mut stream = backend
        .acquire_screen(VideoQuality::Low.constraints(), true)
        .await
        .unwrap();

    let mut ended = stream.ended.clone();
    assert!(!*ended.borrow());

    backend.revoke_screen();

    tokio::time::timeout(Duration::from_secs(1), ended.changed())
        .await
        .expect("ended signal fired")
        .expect("sender alive");
    assert!(*ended.borrow());

    // Revocation also ends frame production
    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        while stream.video.frames.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "video channel should close after revoke");

    stream.release();
}
