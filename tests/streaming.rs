//! Frame streaming through a session: ordering, newest-frame collapse,
//! overruns and waiting.

mod common;

use common::{next_frame, open_camera, open_device, sequence};
use olive::prelude::*;
use olive_driver_mock::{MockDeviceConfig, MockMode};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_next_drains_oldest_first() {
    let (camera, session) = open_camera(64, 64);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    camera.produce_frames(1);
    let first = next_frame(&session, ExtractMode::Next).await;
    assert_eq!(sequence(&first), 1);
    assert_eq!(first.index, 0);

    camera.produce_frames(3);
    let mut indices = Vec::new();
    let mut sequences = Vec::new();
    for _ in 0..3 {
        let frame = next_frame(&session, ExtractMode::Next).await;
        assert_eq!(frame.dropped, 0);
        indices.push(frame.index);
        sequences.push(sequence(&frame));
    }
    assert_eq!(indices, [1, 2, 3]);
    assert_eq!(sequences, [2, 3, 4]);

    // Wraps back to slot 0.
    camera.produce_frames(1);
    let wrapped = next_frame(&session, ExtractMode::Next).await;
    assert_eq!((wrapped.index, sequence(&wrapped)), (0, 5));
    assert_eq!(session.stats().unwrap().frames_delivered, 5);
}

#[tokio::test]
async fn test_latest_skips_to_newest() {
    let (camera, session) = open_camera(64, 64);
    session.configure(8, true).unwrap();
    session.start().unwrap();

    camera.produce_frames(1);
    next_frame(&session, ExtractMode::Next).await;

    camera.produce_frames(5);
    let latest = next_frame(&session, ExtractMode::Latest).await;
    assert_eq!(sequence(&latest), 6);
    assert_eq!(latest.dropped, 4);

    let stats = session.stats().unwrap();
    assert_eq!(stats.frames_delivered, 2);
    assert_eq!(stats.frames_dropped, 4);
}

#[tokio::test]
async fn test_first_extraction_starts_at_newest() {
    let (camera, session) = open_camera(64, 64);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    camera.produce_frames(3);
    let frame = next_frame(&session, ExtractMode::Next).await;
    assert_eq!(sequence(&frame), 3);
    assert_eq!(session.stats().unwrap().frames_dropped, 2);
}

#[tokio::test]
async fn test_full_wrap_is_an_overrun() {
    let (camera, session) = open_camera(64, 64);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    camera.produce_frames(1);
    next_frame(&session, ExtractMode::Next).await;

    camera.produce_frames(4);
    let err = session.extract(ExtractMode::Next).await.unwrap_err();
    assert!(matches!(
        err,
        HalError::BufferOverrun {
            produced: 4,
            capacity: 4,
            latest_index: 0
        }
    ));
    assert!(err.is_recoverable());
    assert_eq!(session.state(), AcquisitionState::Running);

    // The ring resynchronized on the newest slot and keeps streaming.
    camera.produce_frames(1);
    let frame = next_frame(&session, ExtractMode::Next).await;
    assert_eq!((frame.index, sequence(&frame)), (1, 6));

    let stats = session.stats().unwrap();
    assert_eq!(stats.overruns, 1);
    assert_eq!(stats.frames_lost, 4);
}

#[tokio::test]
async fn test_backlog_overflow_is_an_overrun() {
    let (camera, session) = open_camera(64, 64);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    camera.produce_frames(1);
    next_frame(&session, ExtractMode::Next).await;
    camera.produce_frames(3);
    next_frame(&session, ExtractMode::Next).await;

    // Two frames still pending; three more overwrite the oldest.
    camera.produce_frames(3);
    assert!(matches!(
        session.extract(ExtractMode::Next).await,
        Err(HalError::BufferOverrun { .. })
    ));
}

#[tokio::test]
async fn test_extract_waits_for_production() {
    let (camera, session) = open_camera(64, 64);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    let producer = camera.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.produce_frames(1);
    });

    let extraction = tokio::time::timeout(Duration::from_secs(2), session.extract(ExtractMode::Next))
        .await
        .unwrap()
        .unwrap();
    let frame = extraction.into_frame().unwrap();
    assert_eq!(sequence(&frame), 1);
}

#[tokio::test]
async fn test_stop_unblocks_waiting_extract() {
    let (_camera, session) = open_camera(64, 64);
    let session = Arc::new(session);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    let waiter = {
        let session = session.clone();
        tokio::spawn(async move { session.extract(ExtractMode::Next).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.stop().await.unwrap();

    let extraction = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(extraction.is_aborted());
    assert_eq!(session.state(), AcquisitionState::Configured);
}

#[tokio::test]
async fn test_extract_timeout() {
    let (_camera, session) = open_camera(64, 64);
    session.configure(4, true).unwrap();
    session.start().unwrap();

    let err = session
        .extract_timeout(ExtractMode::Next, Some(Duration::from_millis(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, HalError::Timeout(d) if d == Duration::from_millis(30)));
    assert_eq!(session.state(), AcquisitionState::Running);
}

#[tokio::test]
async fn test_snap_completes_after_one_pass() {
    let (camera, session) = open_camera(64, 64);
    session.configure(3, false).unwrap();
    session.start().unwrap();

    camera.produce_frames(1);
    assert_eq!(sequence(&next_frame(&session, ExtractMode::Next).await), 1);

    // The device stops by itself once the ring is full.
    assert_eq!(camera.produce_frames(5), 2);
    assert!(!camera.is_capturing());
    assert_eq!(sequence(&next_frame(&session, ExtractMode::Next).await), 2);
    assert_eq!(sequence(&next_frame(&session, ExtractMode::Next).await), 3);
    assert!(matches!(
        session.extract(ExtractMode::Next).await.unwrap(),
        Extraction::Complete
    ));

    session.stop().await.unwrap();
    assert_eq!(session.state(), AcquisitionState::Configured);
}

#[tokio::test]
async fn test_single_frame_snap_delivers_its_frame() {
    let (camera, session) = open_camera(64, 64);
    session.configure(1, false).unwrap();
    session.start().unwrap();

    assert_eq!(camera.produce_frames(1), 1);
    assert!(!camera.is_capturing());
    let frame = next_frame(&session, ExtractMode::Next).await;
    assert_eq!((frame.index, sequence(&frame)), (0, 1));
    assert!(matches!(
        session.extract(ExtractMode::Next).await.unwrap(),
        Extraction::Complete
    ));

    let stats = session.stats().unwrap();
    assert_eq!(stats.frames_delivered, 1);
    assert_eq!(stats.overruns, 0);
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_frames_carry_their_format() {
    let (camera, session) = open_camera(64, 32);
    session.configure(2, true).unwrap();
    session.start().unwrap();
    camera.produce_frames(1);

    let frame = next_frame(&session, ExtractMode::Next).await;
    assert_eq!(frame.format, FrameFormat::new(64, 32, PixelType::Mono16));
    assert_eq!(frame.len(), 64 * 32 * 2);
    assert_eq!(frame.sequence, 1);
}

#[tokio::test]
async fn test_realistic_camera_streams() {
    let (_camera, session) = open_device(MockDevice::new(
        MockDeviceConfig::camera("cam0")
            .with_sensor(32, 32)
            .with_mode(MockMode::Realistic)
            .with_exposure(0.005),
    ));
    session.configure(16, true).unwrap();
    session.start().unwrap();

    let mut last = 0;
    for _ in 0..3 {
        let frame = tokio::time::timeout(Duration::from_secs(2), session.extract(ExtractMode::Next))
            .await
            .unwrap()
            .unwrap()
            .into_frame()
            .unwrap();
        let seq = sequence(&frame);
        assert!(seq > last);
        last = seq;
    }
    session.stop().await.unwrap();
}
