//! Prelude module for convenient imports
//!
//! ```rust,ignore
//! use olive::prelude::*;
//! ```

// =============================================================================
// Configuration
// =============================================================================

pub use crate::config::OliveConfig;
pub use olive_core::SessionConfig;

// =============================================================================
// Errors
// =============================================================================

pub use olive_core::{HalError, HalResult, NativeError, NativeErrorKind};

// =============================================================================
// Sessions & Acquisition
// =============================================================================

pub use olive_core::{
    AcquisitionState, Capability, DeviceId, DeviceInfo, DeviceManager, DeviceSession,
    ExtractMode, Extraction, FrameFormat, FrameSlot, PixelType, PropertyValue, RingStats,
    RoiRect,
};

// =============================================================================
// Driver Traits
// =============================================================================

pub use olive_core::{NativeDevice, NativeDriver};

#[cfg(feature = "mock")]
pub use olive_driver_mock::{MockDevice, MockDriver};
