//! # olive
//!
//! Hardware-abstraction layer for laboratory cameras and motion controllers,
//! with a streaming frame-acquisition engine.
//!
//! **Use [`prelude`] for convenient imports:**
//!
//! ```rust,ignore
//! use olive::prelude::*;
//! ```
//!
//! ## Crate Structure
//!
//! - **`config`**: Application configuration loaded with figment from a TOML
//!   file and `OLIVE_`-prefixed environment variables.
//! - **`tracing_setup`**: Subscriber installation for applications.
//! - **`core`**: Re-exported from `olive-core`. Native driver traits, property
//!   catalog and accessor, frame ring, acquisition engine, sub-window manager
//!   and device sessions.
//! - **`mock`**: Re-exported from `olive-driver-mock` (requires the `mock`
//!   feature). Simulated cameras and stages.
//!
//! ## Example
//!
//! ```rust,no_run
//! use olive::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = OliveConfig::load()?;
//! config.validate()?;
//! olive::tracing_setup::init_from_config(&config).map_err(anyhow::Error::msg)?;
//!
//! let manager = DeviceManager::new(Arc::new(config.mock_driver()?), config.session.clone())?;
//! let camera = manager.open(&DeviceId::from("cam0"))?;
//! camera.set_roi(None, Some((512, 512)))?;
//! camera.configure(16, true)?;
//! camera.start()?;
//! if let Some(frame) = camera.extract(ExtractMode::Latest).await?.into_frame() {
//!     println!("{} bytes, {} dropped", frame.len(), frame.dropped);
//! }
//! camera.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod prelude;
pub mod tracing_setup;

pub use olive_core as core;

#[cfg(feature = "mock")]
pub use olive_driver_mock as mock;
