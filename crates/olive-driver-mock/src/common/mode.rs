//! Operational modes for mock devices.
//!
//! - **Instant**: frames appear only when the test calls
//!   [`MockDevice::produce_frames`](crate::MockDevice::produce_frames)
//! - **Realistic**: a background task produces one frame per exposure period

use serde::{Deserialize, Serialize};

/// Operational modes for mock devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Manual, deterministic frame production - for unit tests
    #[default]
    Instant,
    /// Frames produced on a timer - for integration tests and demos
    Realistic,
}
