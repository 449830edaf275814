//! Error types for device sessions and frame acquisition.
//!
//! This module defines the primary error type, `HalError`, used across the
//! session, property and acquisition layers. Using the `thiserror` crate, it
//! provides a single, consistent way to report everything from caller contract
//! violations to failures reported by the native vendor layer.
//!
//! ## Error Hierarchy
//!
//! `HalError` falls into four groups:
//!
//! - **Contract violations**: `InvalidState`, `InvalidArgument`,
//!   `UnknownProperty`, `PropertyNotReadable`, `PropertyNotWritable`,
//!   `UnknownEnumLabel`, `Unsupported`. These are caller bugs. They are never
//!   retried.
//! - **Recoverable ROI errors**: `RoiOutOfBounds`, `RoiUnsupported`. The ROI
//!   manager has already restored the previous sub-window when these surface,
//!   so the caller may retry with different values.
//! - **Data loss notifications**: `BufferOverrun`. The acquisition keeps
//!   running; the error carries how many frames were produced past the ring.
//! - **Native layer failures**: `DeviceCommunication`, `DeviceUnavailable`,
//!   `DeviceBusy`. Only the "response buffer too small" case of a
//!   communication error is retried, see [`crate::retry`].
//!
//! Native drivers report failures with the structured [`NativeError`], which
//! mirrors the categories a vendor SDK distinguishes.

use crate::native::Capability;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Native Errors
// =============================================================================

/// Failure categories a vendor layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeErrorKind {
    /// The command channel failed or the device returned an error code.
    Communication,
    /// The caller-supplied response buffer was too small for the reply.
    BufferTooSmall,
    /// The device refused a value or command.
    Rejected,
    /// The device is capturing or otherwise occupied.
    Busy,
    /// The handle could not be opened or is no longer valid.
    Unavailable,
    /// The device answered with something that could not be interpreted.
    Protocol,
}

impl std::fmt::Display for NativeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NativeErrorKind::Communication => "communication",
            NativeErrorKind::BufferTooSmall => "buffer_too_small",
            NativeErrorKind::Rejected => "rejected",
            NativeErrorKind::Busy => "busy",
            NativeErrorKind::Unavailable => "unavailable",
            NativeErrorKind::Protocol => "protocol",
        };
        write!(f, "{}", label)
    }
}

/// Error reported by a native vendor layer.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("native {kind} error{}: {message}", .code.map(|c| format!(" {c:#x}")).unwrap_or_default())]
pub struct NativeError {
    /// Failure category
    pub kind: NativeErrorKind,
    /// Vendor error code, when the SDK provides one
    pub code: Option<i32>,
    /// Human-readable detail
    pub message: String,
}

impl NativeError {
    /// Error of `kind` without a vendor code.
    pub fn new(kind: NativeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Attach the vendor error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Command channel failure.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::new(NativeErrorKind::Communication, message)
    }

    /// Value or command refused by the device.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(NativeErrorKind::Rejected, message)
    }

    /// Reply did not fit the supplied buffer.
    pub fn buffer_too_small(message: impl Into<String>) -> Self {
        Self::new(NativeErrorKind::BufferTooSmall, message)
    }
}

// =============================================================================
// HalError
// =============================================================================

/// Convenience alias for results using the session error type.
pub type HalResult<T> = std::result::Result<T, HalError>;

/// Primary error type for device sessions.
///
/// # Example
///
/// ```rust
/// use olive_core::error::HalError;
///
/// fn validate_frame_count(frame_count: usize) -> Result<(), HalError> {
///     if frame_count == 0 {
///         return Err(HalError::InvalidArgument(
///             "frame_count must be at least 1".into(),
///         ));
///     }
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum HalError {
    /// An operation was called from a state that does not allow it.
    ///
    /// **Error Type**: Permanent - this is a programming error in the caller.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// What the caller tried to do
        operation: &'static str,
        /// State the engine was in
        state: String,
    },

    /// A value was malformed or outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No property with this name was discovered.
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    /// The property cannot be read.
    #[error("Property '{0}' is not readable")]
    PropertyNotReadable(String),

    /// The property cannot be written.
    #[error("Property '{0}' is not writable")]
    PropertyNotWritable(String),

    /// The label is not one of the property's choices.
    #[error("Property '{property}' has no choice labelled '{label}'")]
    UnknownEnumLabel {
        /// Catalog name
        property: String,
        /// Label that was asked for
        label: String,
    },

    /// The device does not advertise the capability the operation needs.
    #[error("Device does not support {0:?}")]
    Unsupported(Capability),

    /// The sub-window origin was rejected by the device.
    ///
    /// **Error Type**: Recoverable - the previous ROI has been restored.
    #[error("ROI origin {origin:?} is out of bounds")]
    RoiOutOfBounds {
        /// Requested `(row, col)`
        origin: (u32, u32),
    },

    /// The sub-window size was rejected by the device.
    ///
    /// **Error Type**: Recoverable - the previous ROI has been restored.
    #[error("ROI {origin:?}..{opposite_corner:?} is not supported by the device")]
    RoiUnsupported {
        /// Requested `(row, col)`
        origin: (u32, u32),
        /// One past the bottom-right pixel of the requested window
        opposite_corner: (u32, u32),
    },

    /// The device wrote a full ring's worth of frames before they were drained.
    ///
    /// **Error Type**: Non-fatal - acquisition continues from the newest frame.
    #[error("Frame ring overrun: {produced} frames produced into {capacity} slots since last drain")]
    BufferOverrun {
        /// Frames produced since the previous observation
        produced: u64,
        /// Ring slots
        capacity: usize,
        /// Slot of the newest frame, where the ring resumes
        latest_index: usize,
    },

    /// The native layer failed or refused a command.
    #[error("Device communication error: {0}")]
    DeviceCommunication(#[from] NativeError),

    /// The device is unknown, already open, or could not be opened.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device is capturing or otherwise occupied.
    #[error("Device busy: {0}")]
    DeviceBusy(String),

    /// A caller-layered deadline elapsed before the operation completed.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration values failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl HalError {
    pub(crate) fn invalid_state(operation: &'static str, state: impl std::fmt::Display) -> Self {
        HalError::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Whether the error is a caller contract violation that must not be retried.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            HalError::InvalidState { .. }
                | HalError::InvalidArgument(_)
                | HalError::UnknownProperty(_)
                | HalError::PropertyNotReadable(_)
                | HalError::PropertyNotWritable(_)
                | HalError::UnknownEnumLabel { .. }
                | HalError::Unsupported(_)
        )
    }

    /// Whether the session remains usable and the caller may carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HalError::RoiOutOfBounds { .. }
                | HalError::RoiUnsupported { .. }
                | HalError::BufferOverrun { .. }
                | HalError::Timeout(_)
        )
    }

    /// The underlying native error when the device rejected or failed a command.
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            HalError::DeviceCommunication(err) => Some(err),
            _ => None,
        }
    }
}

/// Map a native failure raised while opening, closing or arming a device.
pub(crate) fn map_lifecycle_error(err: NativeError) -> HalError {
    match err.kind {
        NativeErrorKind::Busy => HalError::DeviceBusy(err.message),
        NativeErrorKind::Unavailable => HalError::DeviceUnavailable(err.message),
        _ => HalError::DeviceCommunication(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HalError::PropertyNotWritable("sensor_temperature".to_string());
        assert_eq!(
            err.to_string(),
            "Property 'sensor_temperature' is not writable"
        );
    }

    #[test]
    fn test_native_error_display_with_code() {
        let err = NativeError::rejected("value out of range").with_code(0x8000_0822u32 as i32);
        assert_eq!(
            err.to_string(),
            "native rejected error 0x80000822: value out of range"
        );
        let plain = NativeError::communication("timeout");
        assert_eq!(plain.to_string(), "native communication error: timeout");
    }

    #[test]
    fn test_classification() {
        assert!(HalError::invalid_state("start", "Running").is_contract_violation());
        assert!(!HalError::invalid_state("start", "Running").is_recoverable());
        assert!(HalError::RoiOutOfBounds { origin: (1, 2) }.is_recoverable());
        let overrun = HalError::BufferOverrun {
            produced: 9,
            capacity: 4,
            latest_index: 0,
        };
        assert!(overrun.is_recoverable());
        assert!(!overrun.is_contract_violation());
    }

    #[test]
    fn test_lifecycle_mapping() {
        let busy = map_lifecycle_error(NativeError::new(NativeErrorKind::Busy, "capturing"));
        assert!(matches!(busy, HalError::DeviceBusy(_)));
        let gone = map_lifecycle_error(NativeError::new(NativeErrorKind::Unavailable, "unplugged"));
        assert!(matches!(gone, HalError::DeviceUnavailable(_)));
        let other = map_lifecycle_error(NativeError::communication("crc"));
        assert!(other.native().is_some());
    }
}
