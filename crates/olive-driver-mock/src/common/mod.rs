//! Common infrastructure for mock devices.
//!
//! - **mode**: Operational modes (Instant, Realistic)
//! - **errors**: Fault injection

pub mod errors;
pub mod mode;

pub use errors::{FaultConfig, FaultScenario, INJECTED_FAULT_CODE};
pub use mode::MockMode;
