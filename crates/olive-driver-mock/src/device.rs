//! Simulated device state and its native handle.
//!
//! A [`MockDevice`] is the control side: tests keep a clone to produce frames,
//! inject faults and inspect what the session wrote. Opening it through the
//! driver yields a [`MockConnection`], the [`NativeDevice`] the session owns.
//! Both share one state block.

use crate::common::errors::injected_rejection;
use crate::common::{FaultConfig, MockMode};
use crate::pattern::render_frame;
use crate::profile::{self, MockDeviceConfig, MockProperty};
use crate::signal::MockSignal;
use bytes::Bytes;
use olive_core::acquisition::{FrameFormat, PixelType};
use olive_core::error::{NativeError, NativeErrorKind};
use olive_core::native::{
    Capability, CaptureMode, CompletionSignal, DeviceDescriptor, DeviceId, NativeDevice,
    PropertyId, RawAttributes, RawKind, SignalEvent, TransferStatus,
};
use olive_core::property::normalize_name;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// DCAM-style vendor codes.
const ERR_OUT_OF_RANGE: i32 = 0x8000_0822_u32 as i32;
const ERR_NOT_WRITABLE: i32 = 0x8000_0825_u32 as i32;
const ERR_BUSY: i32 = 0x8000_0101_u32 as i32;

struct DeviceState {
    props: Vec<MockProperty>,
    open: bool,
    capturing: bool,
    capture_mode: CaptureMode,
    slots: Vec<Bytes>,
    layout: Option<FrameFormat>,
    total: u64,
    writes: Vec<(String, f64)>,
}

impl DeviceState {
    fn prop(&self, id: PropertyId) -> Result<&MockProperty, NativeError> {
        self.props
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| NativeError::rejected(format!("no property {id}")))
    }

    fn prop_value(&self, id: PropertyId) -> Option<f64> {
        self.props.iter().find(|p| p.id == id).map(|p| p.value)
    }

    fn subarray_enabled(&self) -> bool {
        self.prop_value(profile::SUBARRAY_MODE) == Some(profile::MODE_ON)
    }

    /// Frame layout implied by the current sub-window and pixel type.
    fn frame_format(&self, sensor_width: u32, sensor_height: u32) -> FrameFormat {
        let (width, height) = if self.subarray_enabled() {
            let size = |id| self.prop_value(id).map(|v| v as u32);
            (
                size(profile::SUBARRAY_HSIZE).unwrap_or(sensor_width),
                size(profile::SUBARRAY_VSIZE).unwrap_or(sensor_height),
            )
        } else {
            (sensor_width, sensor_height)
        };
        let pixel = self
            .props
            .iter()
            .find(|p| p.id == profile::IMAGE_PIXELTYPE)
            .and_then(|p| p.label(p.value))
            .and_then(PixelType::from_label)
            .unwrap_or(PixelType::Mono16);
        FrameFormat::new(width, height, pixel)
    }
}

struct Shared {
    config: MockDeviceConfig,
    capabilities: Vec<Capability>,
    state: Mutex<DeviceState>,
    signal: Arc<MockSignal>,
    faults: FaultConfig,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Write up to `n` frames into the ring. Returns how many were written.
    fn produce(&self, n: u64) -> u64 {
        let mut produced = 0;
        let mut finished = false;
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(format) = state.layout else {
                return 0;
            };
            let capacity = state.slots.len() as u64;
            if capacity == 0 {
                return 0;
            }
            while produced < n && state.capturing {
                state.total += 1;
                let index = ((state.total - 1) % capacity) as usize;
                state.slots[index] = render_frame(&format, state.total);
                produced += 1;
                if state.capture_mode == CaptureMode::Snap && state.total >= capacity {
                    state.capturing = false;
                    finished = true;
                }
            }
        }

        if produced > 0 {
            tracing::trace!(device = %self.config.id, produced, "frames produced");
            self.signal.notify(SignalEvent::FrameReady);
        }
        if finished {
            tracing::debug!(device = %self.config.id, "snap capture complete");
            self.signal.notify(SignalEvent::CaptureStopped);
        }
        produced
    }

    fn stop_producer(&self) {
        if let Some(task) = self.producer.lock().take() {
            task.abort();
        }
    }
}

/// Control handle for one simulated device.
#[derive(Clone)]
pub struct MockDevice {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDevice")
            .field("id", &self.shared.config.id)
            .field("profile", &self.shared.config.profile)
            .field("open", &self.is_open())
            .finish()
    }
}

impl MockDevice {
    /// Closed device built from `config`.
    pub fn new(config: MockDeviceConfig) -> Self {
        let faults = FaultConfig::scenarios(config.faults.clone());
        let state = DeviceState {
            props: profile::properties(&config),
            open: false,
            capturing: false,
            capture_mode: CaptureMode::Sequence,
            slots: Vec::new(),
            layout: None,
            total: 0,
            writes: Vec::new(),
        };
        Self {
            shared: Arc::new(Shared {
                capabilities: config.capabilities(),
                config,
                state: Mutex::new(state),
                signal: Arc::new(MockSignal::default()),
                faults,
                producer: Mutex::new(None),
            }),
        }
    }

    /// Camera with default settings.
    pub fn camera(id: &str) -> Self {
        Self::new(MockDeviceConfig::camera(id))
    }

    /// Stage with default settings.
    pub fn stage(id: &str) -> Self {
        Self::new(MockDeviceConfig::stage(id))
    }

    /// Id used to open the device.
    pub fn id(&self) -> DeviceId {
        DeviceId(self.shared.config.id.clone())
    }

    /// Configuration the device was built from.
    pub fn config(&self) -> &MockDeviceConfig {
        &self.shared.config
    }

    /// Enumeration record.
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            id: self.id(),
            info: self.shared.config.info(),
        }
    }

    /// Fault injection shared with any open connection.
    pub fn faults(&self) -> &FaultConfig {
        &self.shared.faults
    }

    /// Whether a connection currently holds the device.
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().open
    }

    /// Whether frames are being produced.
    pub fn is_capturing(&self) -> bool {
        self.shared.state.lock().capturing
    }

    /// Frames produced since capture was last armed.
    pub fn total_frames(&self) -> u64 {
        self.shared.state.lock().total
    }

    /// Slots in the current ring, 0 when released.
    pub fn allocated_frames(&self) -> usize {
        self.shared.state.lock().slots.len()
    }

    /// Produce `n` frames now. Only frames produced while capturing count;
    /// a snap capture stops producing once the ring has been filled.
    pub fn produce_frames(&self, n: u64) -> u64 {
        self.shared.produce(n)
    }

    /// Stored value of a property, by catalog name.
    pub fn value(&self, name: &str) -> Option<f64> {
        let state = self.shared.state.lock();
        state
            .props
            .iter()
            .find(|p| normalize_name(p.display_name) == name)
            .map(|p| p.value)
    }

    /// Overwrite a stored value without any device-side checks.
    pub fn set_raw(&self, name: &str, value: f64) -> bool {
        let mut state = self.shared.state.lock();
        match state
            .props
            .iter_mut()
            .find(|p| normalize_name(p.display_name) == name)
        {
            Some(prop) => {
                prop.value = value;
                true
            }
            None => false,
        }
    }

    /// Accepted writes in order, as `(catalog name, value)`.
    pub fn writes(&self) -> Vec<(String, f64)> {
        self.shared.state.lock().writes.clone()
    }

    /// Forget the recorded writes.
    pub fn clear_writes(&self) {
        self.shared.state.lock().writes.clear();
    }

    /// Hand out a native handle. Fails when already open or when a
    /// `FailOpen` fault is active.
    pub(crate) fn connect(&self) -> Result<MockConnection, NativeError> {
        if self.shared.faults.fails_open() {
            return Err(NativeError::new(
                NativeErrorKind::Unavailable,
                format!("device '{}' did not respond", self.shared.config.id),
            ));
        }
        let mut state = self.shared.state.lock();
        if state.open {
            return Err(NativeError::new(
                NativeErrorKind::Unavailable,
                format!("device '{}' is in use", self.shared.config.id),
            ));
        }
        state.open = true;
        tracing::debug!(device = %self.shared.config.id, "mock device connected");
        Ok(MockConnection {
            shared: self.shared.clone(),
        })
    }
}

/// Native handle for an open [`MockDevice`].
pub struct MockConnection {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("id", &self.shared.config.id)
            .finish_non_exhaustive()
    }
}

impl MockConnection {
    /// Lock the state after checking the handle is still open and the
    /// operation is not failed by an injected fault.
    fn state(
        &self,
        operation: &str,
    ) -> Result<parking_lot::MutexGuard<'_, DeviceState>, NativeError> {
        self.shared.faults.check_operation(operation)?;
        let state = self.shared.state.lock();
        if !state.open {
            return Err(NativeError::new(
                NativeErrorKind::Unavailable,
                "handle is closed",
            ));
        }
        Ok(state)
    }

    fn check_buffer(&self, text: &str, buf_len: usize) -> Result<(), NativeError> {
        let required = (text.len() + 1).max(self.shared.faults.min_buffer());
        if buf_len < required {
            return Err(NativeError::buffer_too_small(format!(
                "{required} bytes required, {buf_len} given"
            )));
        }
        Ok(())
    }

    fn spawn_producer(&self, period: Duration) -> Result<(), NativeError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            NativeError::new(
                NativeErrorKind::Unavailable,
                "realistic mode requires a tokio runtime",
            )
        })?;
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if shared.produce(1) == 0 {
                    break;
                }
            }
        });
        if let Some(previous) = self.shared.producer.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.shared.stop_producer();
        let mut state = self.shared.state.lock();
        state.open = false;
        state.capturing = false;
    }
}

fn validate_write(prop: &MockProperty, value: f64) -> Result<(), NativeError> {
    let attrs: &RawAttributes = &prop.attributes;
    if !attrs.writable {
        return Err(NativeError::rejected(format!("{} is read-only", prop.display_name))
            .with_code(ERR_NOT_WRITABLE));
    }
    if attrs.kind == RawKind::Text {
        return Err(NativeError::rejected(format!(
            "{} does not take numeric values",
            prop.display_name
        )));
    }
    if !value.is_finite() || value < attrs.min || value > attrs.max {
        return Err(NativeError::rejected(format!(
            "{value} outside {}..={} for {}",
            attrs.min, attrs.max, prop.display_name
        ))
        .with_code(ERR_OUT_OF_RANGE));
    }
    if matches!(attrs.kind, RawKind::Integer | RawKind::Enumerated) && value.fract() != 0.0 {
        return Err(NativeError::rejected(format!(
            "{value} is not a valid choice for {}",
            prop.display_name
        ))
        .with_code(ERR_OUT_OF_RANGE));
    }
    Ok(())
}

fn affects_frame_layout(id: PropertyId) -> bool {
    [
        profile::SUBARRAY_MODE,
        profile::SUBARRAY_HPOS,
        profile::SUBARRAY_HSIZE,
        profile::SUBARRAY_VPOS,
        profile::SUBARRAY_VSIZE,
        profile::IMAGE_PIXELTYPE,
    ]
    .contains(&id)
}

impl NativeDevice for MockConnection {
    fn capabilities(&self) -> &[Capability] {
        &self.shared.capabilities
    }

    fn next_property_id(&self, after: PropertyId) -> Result<Option<PropertyId>, NativeError> {
        let state = self.state("next_property_id")?;
        if let Some(next) = state.props.iter().map(|p| p.id).find(|id| *id > after) {
            return Ok(Some(next));
        }
        if self.shared.faults.repeats_property_ids() {
            return Ok(state.props.first().map(|p| p.id));
        }
        Ok(None)
    }

    fn display_name(&self, id: PropertyId, buf_len: usize) -> Result<String, NativeError> {
        let state = self.state("display_name")?;
        let name = state.prop(id)?.display_name;
        self.check_buffer(name, buf_len)?;
        Ok(name.to_string())
    }

    fn raw_attributes(&self, id: PropertyId) -> Result<RawAttributes, NativeError> {
        let state = self.state("raw_attributes")?;
        Ok(state.prop(id)?.attributes.clone())
    }

    fn get_value(&self, id: PropertyId) -> Result<f64, NativeError> {
        let state = self.state("get_value")?;
        let prop = state.prop(id)?;
        if !prop.attributes.readable {
            return Err(NativeError::rejected(format!(
                "{} is write-only",
                prop.display_name
            )));
        }
        Ok(prop.value)
    }

    fn get_text(&self, id: PropertyId, buf_len: usize) -> Result<String, NativeError> {
        let state = self.state("get_text")?;
        let prop = state.prop(id)?;
        if prop.attributes.kind != RawKind::Text {
            return Err(NativeError::rejected(format!(
                "{} has no text value",
                prop.display_name
            )));
        }
        self.check_buffer(&prop.text, buf_len)?;
        Ok(prop.text.clone())
    }

    fn value_label(&self, id: PropertyId, value: f64, buf_len: usize) -> Result<String, NativeError> {
        let state = self.state("value_label")?;
        let prop = state.prop(id)?;
        let label = prop.label(value).ok_or_else(|| {
            NativeError::rejected(format!("{} has no label for {value}", prop.display_name))
                .with_code(ERR_OUT_OF_RANGE)
        })?;
        self.check_buffer(label, buf_len)?;
        Ok(label.to_string())
    }

    fn set_value(&self, id: PropertyId, value: f64) -> Result<(), NativeError> {
        let mut guard = self.state("set_value")?;
        let state = &mut *guard;
        let prop = state.prop(id)?;
        if self.shared.faults.rejects_write(prop.display_name) {
            return Err(injected_rejection(&normalize_name(prop.display_name)));
        }
        validate_write(prop, value)?;
        if state.capturing && affects_frame_layout(id) {
            return Err(NativeError::new(
                NativeErrorKind::Busy,
                format!("{} cannot change while capturing", prop.display_name),
            )
            .with_code(ERR_BUSY));
        }

        // With the sub-window active the rectangle must stay on the sensor.
        let enabling = id == profile::SUBARRAY_MODE && value == profile::MODE_ON;
        let resizing = state.subarray_enabled()
            && [
                profile::SUBARRAY_HPOS,
                profile::SUBARRAY_HSIZE,
                profile::SUBARRAY_VPOS,
                profile::SUBARRAY_VSIZE,
            ]
            .contains(&id);
        if enabling || resizing {
            let get = |pid| {
                if pid == id {
                    value
                } else {
                    state.prop_value(pid).unwrap_or(0.0)
                }
            };
            let fits_h = get(profile::SUBARRAY_HPOS) + get(profile::SUBARRAY_HSIZE)
                <= f64::from(self.shared.config.sensor_width);
            let fits_v = get(profile::SUBARRAY_VPOS) + get(profile::SUBARRAY_VSIZE)
                <= f64::from(self.shared.config.sensor_height);
            if !(fits_h && fits_v) {
                return Err(NativeError::rejected(format!(
                    "sub-window does not fit the {}x{} sensor",
                    self.shared.config.sensor_width, self.shared.config.sensor_height
                ))
                .with_code(ERR_OUT_OF_RANGE));
            }
        }

        let name = normalize_name(prop.display_name);
        let triggered = id == profile::SOFTWARE_TRIGGER && value == 1.0 && state.capturing;
        if let Some(prop) = state.props.iter_mut().find(|p| p.id == id) {
            // Triggers are edge commands, not stored settings.
            if id != profile::SOFTWARE_TRIGGER {
                prop.value = value;
            }
        }
        tracing::trace!(device = %self.shared.config.id, property = %name, value, "property written");
        state.writes.push((name, value));
        drop(guard);

        if triggered {
            self.shared.produce(1);
        }
        Ok(())
    }

    fn allocate_frames(&self, count: usize) -> Result<(), NativeError> {
        let mut state = self.state("allocate_frames")?;
        if state.capturing {
            return Err(NativeError::new(NativeErrorKind::Busy, "capture in progress").with_code(ERR_BUSY));
        }
        if count == 0 {
            return Err(NativeError::rejected("frame count must be positive"));
        }
        let format = state.frame_format(self.shared.config.sensor_width, self.shared.config.sensor_height);
        format
            .ring_bytes(count)
            .map_err(|err| NativeError::rejected(err.to_string()))?;

        state.slots = vec![Bytes::new(); count];
        state.layout = Some(format);
        state.total = 0;
        tracing::debug!(device = %self.shared.config.id, count, %format, "frames allocated");
        Ok(())
    }

    fn release_frames(&self) -> Result<(), NativeError> {
        let mut state = self.state("release_frames")?;
        if state.capturing {
            return Err(NativeError::new(NativeErrorKind::Busy, "capture in progress").with_code(ERR_BUSY));
        }
        state.slots.clear();
        state.layout = None;
        Ok(())
    }

    fn start_capture(&self, mode: CaptureMode) -> Result<(), NativeError> {
        let mut state = self.state("start_capture")?;
        if state.capturing || self.shared.faults.busy_on_start() {
            return Err(NativeError::new(NativeErrorKind::Busy, "device busy").with_code(ERR_BUSY));
        }
        if state.slots.is_empty() {
            return Err(NativeError::rejected("no frame buffers allocated"));
        }
        // Frames follow the layout at the time capture is armed.
        let format = state.frame_format(self.shared.config.sensor_width, self.shared.config.sensor_height);
        state.layout = Some(format);
        state.capture_mode = mode;
        state.total = 0;

        let realistic = self.shared.config.mode == MockMode::Realistic;
        let exposure = state
            .prop_value(profile::EXPOSURE_TIME)
            .unwrap_or(self.shared.config.exposure_s);
        if realistic {
            let period = Duration::from_secs_f64(exposure.max(0.0001));
            drop(state);
            self.spawn_producer(period)?;
            self.shared.state.lock().capturing = true;
        } else {
            state.capturing = true;
        }
        tracing::debug!(device = %self.shared.config.id, ?mode, %format, realistic, "capture started");
        Ok(())
    }

    fn request_stop(&self) -> Result<(), NativeError> {
        {
            let mut state = self.state("request_stop")?;
            state.capturing = false;
        }
        self.shared.stop_producer();
        self.shared.signal.notify(SignalEvent::CaptureStopped);
        Ok(())
    }

    fn is_capturing(&self) -> Result<bool, NativeError> {
        Ok(self.state("is_capturing")?.capturing)
    }

    fn transfer_status(&self) -> Result<TransferStatus, NativeError> {
        let state = self.state("transfer_status")?;
        let capacity = state.slots.len() as u64;
        let current_index = if state.total == 0 || capacity == 0 {
            0
        } else {
            ((state.total - 1) % capacity) as usize
        };
        Ok(TransferStatus {
            current_index,
            total_frames: state.total,
        })
    }

    fn read_frame(&self, index: usize) -> Result<Bytes, NativeError> {
        let state = self.state("read_frame")?;
        state
            .slots
            .get(index)
            .cloned()
            .ok_or_else(|| NativeError::rejected(format!("frame index {index} out of range")))
    }

    fn completion_signal(&self) -> Arc<dyn CompletionSignal> {
        self.shared.signal.clone()
    }

    fn close(&self) -> Result<(), NativeError> {
        {
            let mut state = self.state("close")?;
            state.open = false;
            state.capturing = false;
            state.slots.clear();
            state.layout = None;
        }
        self.shared.stop_producer();
        tracing::debug!(device = %self.shared.config.id, "mock device closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FaultScenario;

    fn small_camera() -> MockDevice {
        MockDevice::new(MockDeviceConfig::camera("cam0").with_sensor(64, 32))
    }

    #[test]
    fn test_property_walk_ends() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        let mut after = PropertyId::BEFORE_FIRST;
        let mut seen = 0;
        while let Some(id) = conn.next_property_id(after).unwrap() {
            after = id;
            seen += 1;
        }
        assert_eq!(seen, profile::properties(device.config()).len());
    }

    #[test]
    fn test_connect_twice_fails() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        assert_eq!(device.connect().unwrap_err().kind, NativeErrorKind::Unavailable);
        drop(conn);
        assert!(!device.is_open());
        assert!(device.connect().is_ok());
    }

    #[test]
    fn test_short_buffer() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        let err = conn.display_name(profile::EXPOSURE_TIME, 4).unwrap_err();
        assert_eq!(err.kind, NativeErrorKind::BufferTooSmall);
        assert_eq!(conn.display_name(profile::EXPOSURE_TIME, 64).unwrap(), "EXPOSURE TIME");

        device.faults().inject(FaultScenario::ShortNameBuffer { min_bytes: 128 });
        assert!(conn.display_name(profile::EXPOSURE_TIME, 64).is_err());
        assert!(conn.display_name(profile::EXPOSURE_TIME, 128).is_ok());
    }

    #[test]
    fn test_write_checks() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        assert_eq!(
            conn.set_value(profile::EXPOSURE_TIME, 11.0).unwrap_err().code,
            Some(ERR_OUT_OF_RANGE)
        );
        assert!(conn.set_value(profile::SENSOR_TEMPERATURE, 0.0).is_err());
        assert!(conn.set_value(profile::SUBARRAY_MODE, 1.5).is_err());
        conn.set_value(profile::EXPOSURE_TIME, 0.5).unwrap();
        assert_eq!(device.value("exposure_time"), Some(0.5));
        assert_eq!(device.writes(), vec![("exposure_time".to_string(), 0.5)]);
    }

    #[test]
    fn test_subarray_must_fit_when_enabled() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        conn.set_value(profile::SUBARRAY_HPOS, 40.0).unwrap();
        // HSIZE is still the full 64 columns.
        assert!(conn.set_value(profile::SUBARRAY_MODE, profile::MODE_ON).is_err());
        conn.set_value(profile::SUBARRAY_HSIZE, 16.0).unwrap();
        conn.set_value(profile::SUBARRAY_MODE, profile::MODE_ON).unwrap();
        assert!(conn.set_value(profile::SUBARRAY_HSIZE, 32.0).is_err());
    }

    #[test]
    fn test_frames_follow_the_ring() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        conn.allocate_frames(3).unwrap();
        conn.start_capture(CaptureMode::Sequence).unwrap();
        assert_eq!(device.produce_frames(4), 4);

        let status = conn.transfer_status().unwrap();
        assert_eq!(status.total_frames, 4);
        assert_eq!(status.current_index, 0);
        let frame = conn.read_frame(0).unwrap();
        assert_eq!(crate::pattern::frame_sequence(&frame), Some(4));
        assert_eq!(frame.len(), 64 * 32 * 2);
    }

    #[test]
    fn test_snap_stops_after_one_pass() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        conn.allocate_frames(2).unwrap();
        conn.start_capture(CaptureMode::Snap).unwrap();
        assert_eq!(device.produce_frames(5), 2);
        assert!(!conn.is_capturing().unwrap());
    }

    #[test]
    fn test_start_needs_frames() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        assert!(conn.start_capture(CaptureMode::Sequence).is_err());
        device.faults().inject(FaultScenario::BusyOnStart);
        conn.allocate_frames(1).unwrap();
        assert_eq!(
            conn.start_capture(CaptureMode::Sequence).unwrap_err().kind,
            NativeErrorKind::Busy
        );
    }

    #[test]
    fn test_closed_handle_is_unavailable() {
        let device = small_camera();
        let conn = device.connect().unwrap();
        conn.close().unwrap();
        assert_eq!(
            conn.get_value(profile::EXPOSURE_TIME).unwrap_err().kind,
            NativeErrorKind::Unavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_realistic_mode_produces_on_its_own() {
        let device = MockDevice::new(
            MockDeviceConfig::camera("cam0")
                .with_sensor(16, 16)
                .with_mode(MockMode::Realistic)
                .with_exposure(0.01),
        );
        let conn = device.connect().unwrap();
        conn.allocate_frames(4).unwrap();
        conn.start_capture(CaptureMode::Sequence).unwrap();
        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(device.total_frames() >= 4);
        conn.request_stop().unwrap();
        let stopped_at = device.total_frames();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(device.total_frames(), stopped_at);
    }
}
