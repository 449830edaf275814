//! Device sessions.
//!
//! A [`DeviceManager`] wraps one [`NativeDriver`] and hands out at most one
//! [`DeviceSession`] per device. The session owns the native handle and closes
//! it when dropped, after aborting any capture still in progress. Cameras and
//! stages share the session type; the advertised [`Capability`] set decides
//! which operations are allowed.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = DeviceManager::new(driver, SessionConfig::default())?;
//! let session = manager.open(&"cam0".into())?;
//! session.set_roi(None, Some((512, 512)))?;
//! session.configure(16, true)?;
//! session.start()?;
//! let frame = session.extract(ExtractMode::Next).await?;
//! session.stop().await?;
//! session.unconfigure()?;
//! ```

use crate::acquisition::{
    AcquisitionEngine, AcquisitionState, Extraction, ExtractMode, FrameFormat, PixelType,
    RingStats,
};
use crate::config::SessionConfig;
use crate::error::{HalError, HalResult, NativeError, NativeErrorKind};
use crate::native::{Capability, DeviceDescriptor, DeviceId, DeviceInfo, NativeDevice, NativeDriver};
use crate::property::{PropertyAccessor, PropertyCatalog, PropertyDescriptor, PropertyValue};
use crate::roi::{RegionOfInterestManager, RoiRect};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

type Registry = Arc<Mutex<HashSet<DeviceId>>>;

/// Single-owner registry over one native driver.
pub struct DeviceManager {
    driver: Arc<dyn NativeDriver>,
    active: Registry,
    config: SessionConfig,
}

impl DeviceManager {
    /// Manager over `driver`. Fails if `config` is invalid.
    pub fn new(driver: Arc<dyn NativeDriver>, config: SessionConfig) -> HalResult<Self> {
        config.validate()?;
        Ok(Self {
            driver,
            active: Arc::new(Mutex::new(HashSet::new())),
            config,
        })
    }

    /// Name of the underlying driver.
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Configuration every session inherits.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Devices the driver reports.
    pub fn enumerate(&self) -> HalResult<Vec<DeviceDescriptor>> {
        let devices = self.driver.enumerate()?;
        tracing::debug!(driver = self.driver_name(), count = devices.len(), "devices enumerated");
        Ok(devices)
    }

    /// Whether a session currently holds `id`.
    pub fn is_open(&self, id: &DeviceId) -> bool {
        self.active.lock().contains(id)
    }

    /// Open a device and discover its properties.
    ///
    /// Fails with [`HalError::DeviceUnavailable`] if the device is unknown,
    /// already held by another session, or refuses to open.
    pub fn open(&self, id: &DeviceId) -> HalResult<DeviceSession> {
        let claim = Claim::acquire(&self.active, id)?;

        let info = self
            .enumerate()?
            .into_iter()
            .find(|d| &d.id == id)
            .map(|d| d.info)
            .ok_or_else(|| HalError::DeviceUnavailable(format!("no device '{id}'")))?;

        let device = self
            .driver
            .open(id)
            .map_err(|err| HalError::DeviceUnavailable(format!("{id}: {err}")))?;
        let handle = DeviceHandle {
            id: id.clone(),
            device,
            open: true,
        };

        let capabilities = handle.device().capabilities().to_vec();
        let mut catalog = PropertyCatalog::new(self.config.response_buffer);
        catalog.discover(handle.device())?;

        tracing::info!(
            driver = self.driver_name(),
            device = %id,
            model = %info.model,
            properties = catalog.len(),
            ?capabilities,
            "device opened"
        );
        Ok(DeviceSession {
            engine: AcquisitionEngine::new(),
            catalog,
            roi: RegionOfInterestManager::new(self.config.roi.clone()),
            config: self.config.clone(),
            info,
            capabilities,
            handle,
            _claim: claim,
        })
    }
}

/// Marks a device as held until dropped.
struct Claim {
    id: DeviceId,
    registry: Registry,
}

impl Claim {
    fn acquire(registry: &Registry, id: &DeviceId) -> HalResult<Self> {
        if !registry.lock().insert(id.clone()) {
            return Err(HalError::DeviceUnavailable(format!(
                "device '{id}' is already open"
            )));
        }
        Ok(Self {
            id: id.clone(),
            registry: registry.clone(),
        })
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
    }
}

/// Owned native handle, closed exactly once.
struct DeviceHandle {
    id: DeviceId,
    device: Box<dyn NativeDevice>,
    open: bool,
}

impl DeviceHandle {
    fn device(&self) -> &dyn NativeDevice {
        self.device.as_ref()
    }

    fn close(&mut self) -> HalResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.device
            .close()
            .map_err(|err| HalError::DeviceUnavailable(format!("{}: {err}", self.id)))?;
        tracing::info!(device = %self.id, "device closed");
        Ok(())
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close device");
        }
    }
}

/// An open device.
///
/// Property and ROI calls are synchronous. [`extract`](Self::extract) is the
/// only call that waits, and [`stop`](Self::stop) may be issued from another
/// task while it does (share the session through an `Arc`).
pub struct DeviceSession {
    engine: AcquisitionEngine,
    catalog: PropertyCatalog,
    roi: RegionOfInterestManager,
    config: SessionConfig,
    info: DeviceInfo,
    capabilities: Vec<Capability>,
    // Closed before the claim is released.
    handle: DeviceHandle,
    _claim: Claim,
}

impl DeviceSession {
    /// Id the session was opened with.
    pub fn id(&self) -> &DeviceId {
        &self.handle.id
    }

    /// Identity reported at enumeration.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Capabilities the device advertises.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Whether the device advertises `capability`.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn require(&self, capability: Capability) -> HalResult<()> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(HalError::Unsupported(capability))
        }
    }

    fn device(&self) -> &dyn NativeDevice {
        self.handle.device()
    }

    // --- Properties ---

    /// Walk the device's properties again, replacing the catalog.
    pub fn rediscover(&mut self) -> HalResult<Vec<String>> {
        let state = self.engine.state();
        if matches!(state, AcquisitionState::Running | AcquisitionState::Stopping) {
            return Err(HalError::invalid_state("rediscover properties", state));
        }
        let names = self.catalog.discover(self.handle.device())?;
        tracing::info!(device = %self.handle.id, properties = names.len(), "properties rediscovered");
        Ok(names)
    }

    /// Discovered property names.
    pub fn property_names(&self) -> &[String] {
        self.catalog.names()
    }

    /// Descriptor of one property.
    pub fn attributes(&self, name: &str) -> HalResult<&PropertyDescriptor> {
        self.catalog.attributes(name)
    }

    /// Typed access to the discovered properties.
    pub fn accessor(&self) -> PropertyAccessor<'_> {
        PropertyAccessor::new(self.device(), &self.catalog)
    }

    /// Read a property.
    pub fn get(&self, name: &str) -> HalResult<PropertyValue> {
        self.accessor().get(name)
    }

    /// Write a property.
    pub fn set(&self, name: &str, value: impl Into<PropertyValue>) -> HalResult<()> {
        self.accessor().set(name, value)
    }

    // --- Region of interest ---

    /// Apply a sub-window. Only allowed while no capture is running.
    pub fn set_roi(
        &self,
        origin: Option<(u32, u32)>,
        shape: Option<(u32, u32)>,
    ) -> HalResult<RoiRect> {
        self.require(Capability::RegionOfInterest)?;
        let state = self.engine.state();
        if matches!(state, AcquisitionState::Running | AcquisitionState::Stopping) {
            return Err(HalError::invalid_state("change the ROI", state));
        }
        self.roi.set_roi(&self.accessor(), origin, shape)
    }

    /// Active sub-window.
    pub fn roi(&self) -> HalResult<RoiRect> {
        self.require(Capability::RegionOfInterest)?;
        self.roi.current(&self.accessor())
    }

    /// Full sensor size as `(height, width)`, read from the limits of the
    /// sub-window size properties.
    pub fn sensor_extent(&self) -> HalResult<(u32, u32)> {
        self.roi.max_extent(&self.accessor())
    }

    /// Layout frames will have if capture started now.
    ///
    /// Devices without a configurable sub-window always deliver the full
    /// sensor.
    pub fn frame_format(&self) -> HalResult<FrameFormat> {
        self.require(Capability::FrameStreaming)?;
        let (height, width) = if self.has_capability(Capability::RegionOfInterest) {
            self.roi()?.shape
        } else {
            self.sensor_extent()?
        };
        let props = self.accessor();
        let pixel_property = &self.config.format.pixel_type_property;
        let pixel = if self.catalog.contains(pixel_property) {
            let label = props.get_label(pixel_property)?;
            PixelType::from_label(&label).ok_or_else(|| {
                HalError::from(NativeError::new(
                    NativeErrorKind::Protocol,
                    format!("unrecognized pixel type '{label}'"),
                ))
            })?
        } else {
            self.config.format.default_pixel
        };
        Ok(FrameFormat::new(width, height, pixel))
    }

    // --- Acquisition ---

    /// Allocate a ring of `frame_count` frames. `continuous` selects sequence capture over a single pass.
    pub fn configure(&self, frame_count: usize, continuous: bool) -> HalResult<()> {
        self.require(Capability::FrameStreaming)?;
        if let Ok(format) = self.frame_format() {
            let bytes = format.ring_bytes(frame_count)?;
            tracing::debug!(frame_count, %format, bytes, "allocating frame ring");
        }
        self.engine.configure(self.device(), frame_count, continuous)
    }

    /// [`configure`](Self::configure) with the configured defaults.
    pub fn configure_default(&self) -> HalResult<()> {
        let acquisition = &self.config.acquisition;
        self.configure(acquisition.default_frame_count, acquisition.continuous)
    }

    /// Arm capture with the current frame format.
    pub fn start(&self) -> HalResult<()> {
        self.require(Capability::FrameStreaming)?;
        let format = self.frame_format()?;
        self.engine.start(self.device(), format)
    }

    /// Next frame according to `mode`. Waits without a deadline.
    pub async fn extract(&self, mode: ExtractMode) -> HalResult<Extraction> {
        self.engine.extract(self.device(), mode).await
    }

    /// [`extract`](Self::extract) bounded by `timeout`, or by the configured
    /// default when `None`.
    pub async fn extract_timeout(
        &self,
        mode: ExtractMode,
        timeout: Option<Duration>,
    ) -> HalResult<Extraction> {
        match timeout.or_else(|| self.config.acquisition.extract_timeout()) {
            Some(deadline) => tokio::time::timeout(deadline, self.extract(mode))
                .await
                .map_err(|_| HalError::Timeout(deadline))?,
            None => self.extract(mode).await,
        }
    }

    /// Halt capture. Frames not yet extracted are discarded.
    pub async fn stop(&self) -> HalResult<()> {
        self.engine.stop(self.device()).await
    }

    /// Release the ring.
    pub fn unconfigure(&self) -> HalResult<()> {
        self.engine.unconfigure(self.device())
    }

    /// Current acquisition state.
    pub fn state(&self) -> AcquisitionState {
        self.engine.state()
    }

    /// Ring counters of the current or last acquisition.
    pub fn stats(&self) -> Option<RingStats> {
        self.engine.stats()
    }

    /// Close the device now instead of on drop, surfacing close failures.
    pub fn close(mut self) -> HalResult<()> {
        self.engine.abort(self.handle.device());
        self.handle.close()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.engine.state() != AcquisitionState::Idle {
            tracing::warn!(device = %self.handle.id, state = %self.engine.state(), "session dropped while acquiring");
            self.engine.abort(self.handle.device());
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.handle.id)
            .field("info", &self.info)
            .field("capabilities", &self.capabilities)
            .field("state", &self.engine.state())
            .finish()
    }
}
