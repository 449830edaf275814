//! # olive-core
//!
//! Device model for laboratory cameras and stages.
//!
//! A vendor SDK is plugged in by implementing the traits in [`native`]. On top
//! of them this crate provides:
//!
//! - [`property`]: discovery of typed, named properties and value access.
//! - [`acquisition`]: the frame ring and the acquisition state machine.
//! - [`roi`]: transactional sensor sub-window changes.
//! - [`session`]: single-owner device sessions tying the above together.
//!
//! Errors are reported through [`HalError`]; see [`error`] for how they are
//! grouped.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod native;
pub mod property;
pub mod retry;
pub mod roi;
pub mod session;

pub use acquisition::{
    AcquisitionEngine, AcquisitionState, ExtractMode, Extraction, FrameFormat, FrameRing,
    FrameSlot, PixelType, RingStats,
};
pub use config::SessionConfig;
pub use error::{HalError, HalResult, NativeError, NativeErrorKind};
pub use native::{
    Capability, CaptureMode, CompletionSignal, DeviceDescriptor, DeviceId, DeviceInfo,
    NativeDevice, NativeDriver, PropertyId, RawAttributes, RawKind, SignalEvent, TransferStatus,
};
pub use property::{PropertyAccessor, PropertyCatalog, PropertyDescriptor, PropertyKind, PropertyValue};
pub use roi::{RegionOfInterestManager, RoiRect};
pub use session::{DeviceManager, DeviceSession};
