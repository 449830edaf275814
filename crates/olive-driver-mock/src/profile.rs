//! Device profiles and their property tables.
//!
//! Camera property ids and names follow the DCAM layout: upper-case display
//! names with spaces, offset-by-one enumerations for mode switches.

use crate::common::{FaultScenario, MockMode};
use olive_core::native::{Capability, DeviceInfo, PropertyId, RawAttributes, RawKind};
use serde::{Deserialize, Serialize};

/// `EXPOSURE TIME`, seconds
pub const EXPOSURE_TIME: PropertyId = PropertyId(0x001F_0110);
/// `SUBARRAY HPOS`, column offset
pub const SUBARRAY_HPOS: PropertyId = PropertyId(0x0040_2110);
/// `SUBARRAY HSIZE`, width
pub const SUBARRAY_HSIZE: PropertyId = PropertyId(0x0040_2120);
/// `SUBARRAY VPOS`, row offset
pub const SUBARRAY_VPOS: PropertyId = PropertyId(0x0040_2130);
/// `SUBARRAY VSIZE`, height
pub const SUBARRAY_VSIZE: PropertyId = PropertyId(0x0040_2140);
/// `SUBARRAY MODE`, off or on
pub const SUBARRAY_MODE: PropertyId = PropertyId(0x0040_2150);
/// `IMAGE PIXELTYPE`
pub const IMAGE_PIXELTYPE: PropertyId = PropertyId(0x0042_0270);
/// `DEFECT CORRECT MODE`, enumerated from zero
pub const DEFECT_CORRECT_MODE: PropertyId = PropertyId(0x0047_0010);
/// `SENSOR TEMPERATURE`, read only
pub const SENSOR_TEMPERATURE: PropertyId = PropertyId(0x0020_0310);
/// `SOFTWARE TRIGGER`, write only
pub const SOFTWARE_TRIGGER: PropertyId = PropertyId(0x0010_1201);
/// `CAMERA NAME`, text
pub const CAMERA_NAME: PropertyId = PropertyId(0x0042_0010);
/// `OUTPUT TRIGGER DELAY`, three-element array
pub const OUTPUT_TRIGGER_DELAY: PropertyId = PropertyId(0x001C_0120);

/// Stage `POSITION`, millimetres
pub const STAGE_POSITION: PropertyId = PropertyId(0x0100_0001);
/// Stage `VELOCITY`
pub const STAGE_VELOCITY: PropertyId = PropertyId(0x0100_0002);
/// Stage `SERVO MODE`
pub const STAGE_SERVO_MODE: PropertyId = PropertyId(0x0100_0003);
/// Stage `AXIS NAME`, text
pub const STAGE_AXIS_NAME: PropertyId = PropertyId(0x0100_0004);

/// Smallest sub-window extent per axis, in pixels.
pub const MIN_SUBARRAY_SIZE: u32 = 4;

/// `SUBARRAY MODE` native value for off
pub const MODE_OFF: f64 = 1.0;
/// `SUBARRAY MODE` native value for on
pub const MODE_ON: f64 = 2.0;

/// Which property table a simulated device carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockProfile {
    /// Scientific camera with sub-window and streaming
    #[default]
    Camera,
    /// Single-axis motion controller on a daisy chain
    Stage,
}

/// One simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockDeviceConfig {
    /// Device id used for enumeration and `open`
    pub id: String,
    /// Property table and capabilities
    #[serde(default)]
    pub profile: MockProfile,
    /// Reported manufacturer
    #[serde(default = "default_vendor")]
    pub vendor: String,
    /// Defaults to a name derived from the profile
    #[serde(default)]
    pub model: Option<String>,
    /// Reported serial number
    #[serde(default = "default_serial")]
    pub serial_number: String,
    /// Sensor columns (cameras)
    #[serde(default = "default_sensor_size")]
    pub sensor_width: u32,
    /// Sensor rows (cameras)
    #[serde(default = "default_sensor_size")]
    pub sensor_height: u32,
    /// Initial exposure; also the frame period in realistic mode
    #[serde(default = "default_exposure")]
    pub exposure_s: f64,
    /// Manual or timed frame production
    #[serde(default)]
    pub mode: MockMode,
    /// Faults active from the start
    #[serde(default)]
    pub faults: Vec<FaultScenario>,
    /// Replaces the profile's capability set
    #[serde(default)]
    pub capabilities: Option<Vec<Capability>>,
}

fn default_vendor() -> String {
    "Olive Simulation".to_string()
}

fn default_serial() -> String {
    "SIM-0000".to_string()
}

fn default_sensor_size() -> u32 {
    2048
}

fn default_exposure() -> f64 {
    0.01
}

impl MockDeviceConfig {
    /// Camera with a 2048x2048 sensor.
    pub fn camera(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            profile: MockProfile::Camera,
            vendor: default_vendor(),
            model: None,
            serial_number: default_serial(),
            sensor_width: default_sensor_size(),
            sensor_height: default_sensor_size(),
            exposure_s: default_exposure(),
            mode: MockMode::Instant,
            faults: Vec::new(),
            capabilities: None,
        }
    }

    /// Single-axis stage.
    pub fn stage(id: impl Into<String>) -> Self {
        Self {
            profile: MockProfile::Stage,
            ..Self::camera(id)
        }
    }

    /// Set the sensor size in pixels.
    pub fn with_sensor(mut self, width: u32, height: u32) -> Self {
        self.sensor_width = width;
        self.sensor_height = height;
        self
    }

    /// Set the frame production mode.
    pub fn with_mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the initial exposure in seconds.
    pub fn with_exposure(mut self, exposure_s: f64) -> Self {
        self.exposure_s = exposure_s;
        self
    }

    /// Advertise `capabilities` instead of the profile's defaults.
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = Some(capabilities.to_vec());
        self
    }

    /// Activate `fault` from the start.
    pub fn with_fault(mut self, fault: FaultScenario) -> Self {
        self.faults.push(fault);
        self
    }

    /// Reject empty ids, tiny sensors and impossible exposures.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.id.is_empty(), "mock device id must not be empty");
        if self.profile == MockProfile::Camera {
            anyhow::ensure!(
                self.sensor_width >= MIN_SUBARRAY_SIZE && self.sensor_height >= MIN_SUBARRAY_SIZE,
                "mock camera '{}': sensor must be at least {MIN_SUBARRAY_SIZE}x{MIN_SUBARRAY_SIZE}",
                self.id
            );
            anyhow::ensure!(
                self.exposure_s > 0.0 && self.exposure_s <= 10.0,
                "mock camera '{}': exposure_s must be in (0, 10]",
                self.id
            );
        }
        Ok(())
    }

    /// Identity reported at enumeration.
    pub fn info(&self) -> DeviceInfo {
        let model = self.model.clone().unwrap_or_else(|| match self.profile {
            MockProfile::Camera => format!("SimCam {}x{}", self.sensor_width, self.sensor_height),
            MockProfile::Stage => "SimStage L-25".to_string(),
        });
        DeviceInfo {
            vendor: self.vendor.clone(),
            model,
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            serial_number: self.serial_number.clone(),
        }
    }

    /// Advertised capabilities.
    pub fn capabilities(&self) -> Vec<Capability> {
        if let Some(capabilities) = &self.capabilities {
            return capabilities.clone();
        }
        match self.profile {
            MockProfile::Camera => vec![Capability::FrameStreaming, Capability::RegionOfInterest],
            MockProfile::Stage => vec![Capability::AxisEnumeration, Capability::DaisyChain],
        }
    }
}

/// A property as the simulated firmware stores it.
#[derive(Debug, Clone)]
pub struct MockProperty {
    /// Native id
    pub id: PropertyId,
    /// Name as the firmware reports it
    pub display_name: &'static str,
    /// Attributes reported to the session
    pub attributes: RawAttributes,
    /// Labels for `min..=max` of enumerated properties
    pub labels: Vec<&'static str>,
    /// Stored numeric value
    pub value: f64,
    /// Stored string for text properties
    pub text: String,
}

impl MockProperty {
    fn new(id: PropertyId, display_name: &'static str, kind: RawKind, min: f64, max: f64, value: f64) -> Self {
        Self {
            id,
            display_name,
            attributes: RawAttributes {
                readable: true,
                writable: true,
                kind,
                is_array: false,
                element_count: 1,
                min,
                max,
            },
            labels: Vec::new(),
            value,
            text: String::new(),
        }
    }

    fn integer(id: PropertyId, name: &'static str, min: u32, max: u32, value: u32) -> Self {
        Self::new(id, name, RawKind::Integer, min.into(), max.into(), value.into())
    }

    fn real(id: PropertyId, name: &'static str, min: f64, max: f64, value: f64) -> Self {
        Self::new(id, name, RawKind::Real, min, max, value)
    }

    fn enumerated(id: PropertyId, name: &'static str, min: f64, labels: &[&'static str], value: f64) -> Self {
        let max = min + labels.len() as f64 - 1.0;
        let mut prop = Self::new(id, name, RawKind::Enumerated, min, max, value);
        prop.labels = labels.to_vec();
        prop
    }

    fn text(id: PropertyId, name: &'static str, text: String) -> Self {
        let mut prop = Self::new(id, name, RawKind::Text, 0.0, 0.0, 0.0);
        prop.attributes.writable = false;
        prop.text = text;
        prop
    }

    fn read_only(mut self) -> Self {
        self.attributes.writable = false;
        self
    }

    fn write_only(mut self) -> Self {
        self.attributes.readable = false;
        self
    }

    fn array(mut self, element_count: u32) -> Self {
        self.attributes.is_array = true;
        self.attributes.element_count = element_count;
        self
    }

    /// Label of an enumerated native value.
    pub fn label(&self, value: f64) -> Option<&'static str> {
        let offset = value - self.attributes.min;
        if offset < 0.0 || offset.fract() != 0.0 {
            return None;
        }
        self.labels.get(offset as usize).copied()
    }
}

/// Property table for a profile, ordered by id.
pub fn properties(config: &MockDeviceConfig) -> Vec<MockProperty> {
    let mut props = match config.profile {
        MockProfile::Camera => camera_properties(config),
        MockProfile::Stage => stage_properties(config),
    };
    props.sort_by_key(|p| p.id);
    props
}

fn camera_properties(config: &MockDeviceConfig) -> Vec<MockProperty> {
    let (w, h) = (config.sensor_width, config.sensor_height);
    vec![
        MockProperty::real(EXPOSURE_TIME, "EXPOSURE TIME", 0.0001, 10.0, config.exposure_s),
        MockProperty::enumerated(SUBARRAY_MODE, "SUBARRAY MODE", MODE_OFF, &["off", "on"], MODE_OFF),
        MockProperty::integer(SUBARRAY_HPOS, "SUBARRAY HPOS", 0, w.saturating_sub(MIN_SUBARRAY_SIZE), 0),
        MockProperty::integer(SUBARRAY_HSIZE, "SUBARRAY HSIZE", MIN_SUBARRAY_SIZE, w, w),
        MockProperty::integer(SUBARRAY_VPOS, "SUBARRAY VPOS", 0, h.saturating_sub(MIN_SUBARRAY_SIZE), 0),
        MockProperty::integer(SUBARRAY_VSIZE, "SUBARRAY VSIZE", MIN_SUBARRAY_SIZE, h, h),
        MockProperty::enumerated(IMAGE_PIXELTYPE, "IMAGE PIXELTYPE", 1.0, &["mono8", "mono16", "mono12"], 2.0),
        MockProperty::enumerated(DEFECT_CORRECT_MODE, "DEFECT CORRECT MODE", 0.0, &["off", "on"], 1.0),
        MockProperty::real(SENSOR_TEMPERATURE, "SENSOR TEMPERATURE", -50.0, 50.0, -10.0).read_only(),
        MockProperty::integer(SOFTWARE_TRIGGER, "SOFTWARE TRIGGER", 0, 1, 0).write_only(),
        MockProperty::text(CAMERA_NAME, "CAMERA NAME", config.info().model),
        MockProperty::real(OUTPUT_TRIGGER_DELAY, "OUTPUT TRIGGER DELAY", 0.0, 10.0, 0.0).array(3),
    ]
}

fn stage_properties(config: &MockDeviceConfig) -> Vec<MockProperty> {
    vec![
        MockProperty::real(STAGE_POSITION, "POSITION", 0.0, 25.0, 0.0),
        MockProperty::real(STAGE_VELOCITY, "VELOCITY", 0.001, 10.0, 1.0),
        MockProperty::enumerated(STAGE_SERVO_MODE, "SERVO MODE", 0.0, &["off", "on"], 0.0),
        MockProperty::text(STAGE_AXIS_NAME, "AXIS NAME", format!("{}-1", config.id)),
    ]
}
