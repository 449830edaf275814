//! Native collaborator traits.
//!
//! These traits are the seam between the session layer and a vendor SDK. A
//! driver crate implements [`NativeDriver`] to enumerate and open devices, and
//! [`NativeDevice`] for every opened handle. Everything above this module
//! (catalog, accessor, frame ring, acquisition engine, ROI manager) is written
//! against these traits only.
//!
//! Property and capture calls are synchronous and non-reentrant: the session
//! never issues two commands on the same handle at once. The only suspending
//! call is [`CompletionSignal::wait`].

use crate::error::NativeError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Native numeric property identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

impl PropertyId {
    /// Sentinel passed to [`NativeDevice::next_property_id`] to start a walk.
    pub const BEFORE_FIRST: PropertyId = PropertyId(0);
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Value domain as reported by the native attribute query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawKind {
    /// Whole numbers
    Integer,
    /// Floating point
    Real,
    /// Labelled choices over contiguous integers
    Enumerated,
    /// Read-only string
    Text,
}

/// Attribute record returned by the native layer for one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAttributes {
    /// Value can be read
    pub readable: bool,
    /// Value can be written
    pub writable: bool,
    /// Value domain
    pub kind: RawKind,
    /// Holds several elements
    pub is_array: bool,
    /// Elements when `is_array` is set
    pub element_count: u32,
    /// Lower bound; first value of an enumeration
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

/// Runtime capability flags a device advertises.
///
/// A single session type serves cameras and motion controllers; the flags
/// decide which session operations are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Produces frames into a hardware ring buffer (cameras)
    FrameStreaming,
    /// Supports a configurable sensor sub-window
    RegionOfInterest,
    /// Shares one physical connection with other controllers
    DaisyChain,
    /// Exposes individually addressable motion axes
    AxisEnumeration,
}

/// Capture arming mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Continuous capture that keeps overwriting the ring
    Sequence,
    /// One pass over the ring, then the device stops by itself
    Snap,
}

/// Native transfer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStatus {
    /// Slot the most recent frame was written to. Meaningless while
    /// `total_frames` is zero.
    pub current_index: usize,
    /// Frames produced since capture was armed (monotonic).
    pub total_frames: u64,
}

/// Named events a [`CompletionSignal`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalEvent {
    /// At least one new frame is in the ring
    FrameReady,
    /// Capture has halted after a stop request
    CaptureStopped,
}

/// Wait-able completion events supplied by the native layer.
///
/// `wait` has no timeout of its own. Callers that need bounded waits layer a
/// deadline on top.
#[async_trait]
pub trait CompletionSignal: Send + Sync {
    /// Resolve once `event` fires.
    async fn wait(&self, event: SignalEvent) -> Result<(), NativeError>;
}

/// Identity and version information for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Manufacturer
    pub vendor: String,
    /// Model name
    pub model: String,
    /// Firmware or SDK version, when reported
    pub version: Option<String>,
    /// Serial number
    pub serial_number: String,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (s/n {})", self.vendor, self.model, self.serial_number)?;
        if let Some(version) = &self.version {
            write!(f, ", version {}", version)?;
        }
        Ok(())
    }
}

/// Driver-scoped identifier for an enumerated device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        DeviceId(value.to_string())
    }
}

/// An enumerated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Id to pass to [`NativeDriver::open`]
    pub id: DeviceId,
    /// Identity and version
    pub info: DeviceInfo,
}

/// An opened native device handle.
pub trait NativeDevice: Send + Sync {
    /// Capabilities fixed for the lifetime of the handle.
    fn capabilities(&self) -> &[Capability];

    // --- Property query surface ---

    /// Next valid property id after `after`, or `None` once the walk is done.
    fn next_property_id(&self, after: PropertyId) -> Result<Option<PropertyId>, NativeError>;

    /// Display name of a property. Fails with `BufferTooSmall` when the name
    /// does not fit in `buf_len` bytes.
    fn display_name(&self, id: PropertyId, buf_len: usize) -> Result<String, NativeError>;

    /// Access flags, kind and limits of a property.
    fn raw_attributes(&self, id: PropertyId) -> Result<RawAttributes, NativeError>;

    /// Current numeric value. Array properties report their first element.
    fn get_value(&self, id: PropertyId) -> Result<f64, NativeError>;

    /// String value of a text property. Fails with `BufferTooSmall` when the value does not fit in `buf_len` bytes.
    fn get_text(&self, id: PropertyId, buf_len: usize) -> Result<String, NativeError>;

    /// Label the device uses for one enumerated value.
    fn value_label(&self, id: PropertyId, value: f64, buf_len: usize)
        -> Result<String, NativeError>;

    /// Write a numeric value. Enumerated choices are written as their native value.
    fn set_value(&self, id: PropertyId, value: f64) -> Result<(), NativeError>;

    // --- Capture surface ---

    /// Allocate a ring of `count` frame slots sized for the current format.
    fn allocate_frames(&self, count: usize) -> Result<(), NativeError>;

    /// Free the ring allocated by `allocate_frames`.
    fn release_frames(&self) -> Result<(), NativeError>;

    /// Arm capture into the allocated ring.
    fn start_capture(&self, mode: CaptureMode) -> Result<(), NativeError>;

    /// Ask the device to halt. Completion is reported through
    /// [`SignalEvent::CaptureStopped`].
    fn request_stop(&self) -> Result<(), NativeError>;

    /// Whether the device is currently producing frames.
    fn is_capturing(&self) -> Result<bool, NativeError>;

    /// Position of the newest frame and the running frame count.
    fn transfer_status(&self) -> Result<TransferStatus, NativeError>;

    /// Copy a slot out of the ring.
    fn read_frame(&self, index: usize) -> Result<Bytes, NativeError>;

    /// Events for the waiting side of the session.
    fn completion_signal(&self) -> Arc<dyn CompletionSignal>;

    /// Invalidate the handle. Called exactly once by the owning session.
    fn close(&self) -> Result<(), NativeError>;
}

/// Vendor SDK entry point.
pub trait NativeDriver: Send + Sync {
    /// Short driver name used in logs.
    fn name(&self) -> &str;

    /// Devices currently reachable through this driver.
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, NativeError>;

    /// Open a handle. A device may only be opened once at a time.
    fn open(&self, id: &DeviceId) -> Result<Box<dyn NativeDevice>, NativeError>;
}
