//! Simulated native layer for olive.
//!
//! Provides a [`MockDriver`] implementing
//! [`NativeDriver`](olive_core::native::NativeDriver) over simulated devices,
//! so sessions, streaming and sub-window handling can be exercised without
//! hardware.
//!
//! # Profiles
//!
//! - **Camera**: DCAM-style property table (enumerated modes with non-zero
//!   minimum, read-only temperature, write-only software trigger, text name,
//!   array-valued trigger delay), frame streaming and sub-window support.
//! - **Stage**: single-axis controller properties, no streaming.
//!
//! # Frame production
//!
//! In [`MockMode::Instant`] frames appear only when the test calls
//! [`MockDevice::produce_frames`]. In [`MockMode::Realistic`] a tokio task
//! produces one frame per exposure period while capture is armed.
//!
//! ```rust,ignore
//! use olive_driver_mock::{MockDevice, MockDriver};
//!
//! let camera = MockDevice::camera("cam0");
//! let driver = MockDriver::new(vec![camera.clone()]);
//! // ... open a session through the driver, configure, start ...
//! camera.produce_frames(3);
//! ```

pub mod common;
mod device;
mod driver;
pub mod pattern;
pub mod profile;
mod signal;

pub use common::{FaultConfig, FaultScenario, MockMode, INJECTED_FAULT_CODE};
pub use device::{MockConnection, MockDevice};
pub use driver::{MockDriver, MockDriverConfig};
pub use profile::{MockDeviceConfig, MockProfile};
pub use signal::MockSignal;
