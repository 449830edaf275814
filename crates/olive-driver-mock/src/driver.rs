//! Mock driver over a fixed set of simulated devices.

use crate::device::MockDevice;
use crate::profile::MockDeviceConfig;
use anyhow::Context;
use olive_core::error::{NativeError, NativeErrorKind};
use olive_core::native::{DeviceDescriptor, DeviceId, NativeDevice, NativeDriver};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Device list as written in configuration:
///
/// ```toml
/// [[devices]]
/// id = "cam0"
/// sensor_width = 512
/// sensor_height = 512
///
/// [[devices]]
/// id = "stage0"
/// profile = "stage"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockDriverConfig {
    /// Devices in enumeration order
    #[serde(default)]
    pub devices: Vec<MockDeviceConfig>,
}

impl MockDriverConfig {
    /// Check every device and reject duplicate ids.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            device.validate()?;
            anyhow::ensure!(
                seen.insert(device.id.as_str()),
                "duplicate mock device id '{}'",
                device.id
            );
        }
        Ok(())
    }
}

/// [`NativeDriver`] over a fixed set of simulated devices.
pub struct MockDriver {
    devices: Vec<MockDevice>,
}

impl Default for MockDriver {
    /// One 2048x2048 camera (`cam0`) and one stage (`stage0`).
    fn default() -> Self {
        Self::new(vec![MockDevice::camera("cam0"), MockDevice::stage("stage0")])
    }
}

impl MockDriver {
    /// Driver over existing device handles.
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self { devices }
    }

    /// Validated driver built from `config`.
    pub fn from_config(config: MockDriverConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.devices.into_iter().map(MockDevice::new).collect(),
        ))
    }

    /// Parse a `[[devices]]` table list.
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config: MockDriverConfig =
            toml::from_str(source).context("failed to parse mock driver configuration")?;
        Self::from_config(config)
    }

    /// Build from an already parsed table, such as the `mock` section of an
    /// application config.
    pub fn from_value(value: toml::Value) -> anyhow::Result<Self> {
        let config: MockDriverConfig = value
            .try_into()
            .context("invalid mock driver configuration")?;
        Self::from_config(config)
    }

    /// Control handle for a device, for producing frames and injecting faults.
    pub fn device(&self, id: &str) -> Option<MockDevice> {
        self.devices
            .iter()
            .find(|d| d.config().id == id)
            .cloned()
    }

    /// All devices in enumeration order.
    pub fn devices(&self) -> &[MockDevice] {
        &self.devices
    }
}

impl NativeDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, NativeError> {
        Ok(self.devices.iter().map(MockDevice::descriptor).collect())
    }

    fn open(&self, id: &DeviceId) -> Result<Box<dyn NativeDevice>, NativeError> {
        let device = self.device(&id.0).ok_or_else(|| {
            NativeError::new(NativeErrorKind::Unavailable, format!("no mock device '{id}'"))
        })?;
        Ok(Box::new(device.connect()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::MockProfile;

    #[test]
    fn test_default_devices() {
        let driver = MockDriver::default();
        let ids: Vec<_> = driver.enumerate().unwrap().into_iter().map(|d| d.id.0).collect();
        assert_eq!(ids, ["cam0", "stage0"]);
    }

    #[test]
    fn test_from_toml() {
        let driver = MockDriver::from_toml(
            r#"
            [[devices]]
            id = "cam1"
            sensor_width = 256
            sensor_height = 128

            [[devices]]
            id = "stage1"
            profile = "stage"
            "#,
        )
        .unwrap();
        let cam = driver.device("cam1").unwrap();
        assert_eq!(cam.config().sensor_width, 256);
        assert_eq!(driver.device("stage1").unwrap().config().profile, MockProfile::Stage);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = MockDriver::from_toml(
            r#"
            [[devices]]
            id = "cam0"
            [[devices]]
            id = "cam0"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_open_unknown_device() {
        let driver = MockDriver::default();
        let err = driver.open(&DeviceId::from("nope")).err().unwrap();
        assert_eq!(err.kind, NativeErrorKind::Unavailable);
    }
}
