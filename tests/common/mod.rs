//! Shared fixtures for integration tests.
#![allow(dead_code)]

use olive::prelude::*;
use olive_driver_mock::{pattern::frame_sequence, MockDeviceConfig};
use std::sync::Arc;

/// Open a single simulated camera with a `width` x `height` sensor.
pub fn open_camera(width: u32, height: u32) -> (MockDevice, DeviceSession) {
    open_device(MockDevice::new(
        MockDeviceConfig::camera("cam0").with_sensor(width, height),
    ))
}

pub fn open_device(device: MockDevice) -> (MockDevice, DeviceSession) {
    let manager = DeviceManager::new(
        Arc::new(MockDriver::new(vec![device.clone()])),
        SessionConfig::default(),
    )
    .unwrap();
    let session = manager.open(&device.id()).unwrap();
    (device, session)
}

/// Sequence number the mock stamped into a frame.
pub fn sequence(frame: &FrameSlot) -> u64 {
    frame_sequence(&frame.data).unwrap()
}

pub async fn next_frame(session: &DeviceSession, mode: ExtractMode) -> FrameSlot {
    session
        .extract(mode)
        .await
        .unwrap()
        .into_frame()
        .unwrap()
}
