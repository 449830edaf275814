//! Streaming frame acquisition.
//!
//! - [`ring`]: backlog and overrun bookkeeping over the driver's frame ring.
//! - [`engine`]: the configure/start/extract/stop state machine.
//! - [`frame`]: frame formats and delivered frames.

pub mod engine;
pub mod frame;
pub mod ring;

pub use engine::{AcquisitionEngine, AcquisitionState};
pub use frame::{Extraction, FrameFormat, FrameSlot, PixelType};
pub use ring::{ExtractMode, FrameRing, RingPick, RingStats};
