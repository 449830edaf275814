//! Session configuration.
//!
//! Every field has a default, so an empty TOML table is a valid
//! configuration. Property names refer to normalized catalog keys.

use crate::acquisition::PixelType;
use crate::error::{HalError, HalResult};
use crate::retry::ResponseBufferPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Settings applied to every session a [`DeviceManager`](crate::session::DeviceManager) opens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Ring and capture defaults
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Sub-window property names
    #[serde(default)]
    pub roi: RoiConfig,
    /// Pixel type source
    #[serde(default)]
    pub format: FormatConfig,
    /// String buffer sizing for native queries
    #[serde(default)]
    pub response_buffer: ResponseBufferPolicy,
}

/// Defaults for [`DeviceSession::configure_default`](crate::session::DeviceSession::configure_default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Ring size used by [`DeviceSession::configure_default`](crate::session::DeviceSession::configure_default)
    #[serde(default = "default_frame_count")]
    pub default_frame_count: usize,
    /// Sequence capture when true, single pass otherwise
    #[serde(default = "default_continuous")]
    pub continuous: bool,
    /// Deadline for [`DeviceSession::extract_timeout`](crate::session::DeviceSession::extract_timeout)
    /// when none is passed; `None` waits indefinitely.
    #[serde(default)]
    pub extract_timeout_ms: Option<u64>,
}

/// Property names that make up the sensor sub-window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiConfig {
    /// Enumerated on/off switch
    #[serde(default = "default_mode_property")]
    pub mode_property: String,
    /// Label that disables the sub-window
    #[serde(default = "default_mode_off")]
    pub mode_off: String,
    /// Label that enables the sub-window
    #[serde(default = "default_mode_on")]
    pub mode_on: String,
    /// Column offset
    #[serde(default = "default_hpos")]
    pub hpos_property: String,
    /// Row offset
    #[serde(default = "default_vpos")]
    pub vpos_property: String,
    /// Width
    #[serde(default = "default_hsize")]
    pub hsize_property: String,
    /// Height
    #[serde(default = "default_vsize")]
    pub vsize_property: String,
}

/// Where the frame pixel type comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Enumerated property whose label names the pixel type
    #[serde(default = "default_pixel_type_property")]
    pub pixel_type_property: String,
    /// Used when the device has no pixel-type property.
    #[serde(default = "default_pixel")]
    pub default_pixel: PixelType,
}

fn default_frame_count() -> usize {
    10
}

fn default_continuous() -> bool {
    true
}

fn default_mode_property() -> String {
    "subarray_mode".to_string()
}

fn default_mode_off() -> String {
    "off".to_string()
}

fn default_mode_on() -> String {
    "on".to_string()
}

fn default_hpos() -> String {
    "subarray_hpos".to_string()
}

fn default_vpos() -> String {
    "subarray_vpos".to_string()
}

fn default_hsize() -> String {
    "subarray_hsize".to_string()
}

fn default_vsize() -> String {
    "subarray_vsize".to_string()
}

fn default_pixel_type_property() -> String {
    "image_pixeltype".to_string()
}

fn default_pixel() -> PixelType {
    PixelType::Mono16
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            default_frame_count: default_frame_count(),
            continuous: default_continuous(),
            extract_timeout_ms: None,
        }
    }
}

impl AcquisitionConfig {
    /// Default extraction deadline, if any.
    pub fn extract_timeout(&self) -> Option<Duration> {
        self.extract_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            mode_property: default_mode_property(),
            mode_off: default_mode_off(),
            mode_on: default_mode_on(),
            hpos_property: default_hpos(),
            vpos_property: default_vpos(),
            hsize_property: default_hsize(),
            vsize_property: default_vsize(),
        }
    }
}

impl RoiConfig {
    fn property_names(&self) -> [&str; 5] {
        [
            &self.mode_property,
            &self.hpos_property,
            &self.vpos_property,
            &self.hsize_property,
            &self.vsize_property,
        ]
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            pixel_type_property: default_pixel_type_property(),
            default_pixel: default_pixel(),
        }
    }
}

impl SessionConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> HalResult<()> {
        if self.acquisition.default_frame_count == 0 {
            return Err(HalError::Configuration(
                "acquisition.default_frame_count must be at least 1".into(),
            ));
        }
        if self.acquisition.extract_timeout_ms == Some(0) {
            return Err(HalError::Configuration(
                "acquisition.extract_timeout_ms must be positive when set".into(),
            ));
        }

        let buffer = &self.response_buffer;
        if buffer.initial_bytes == 0 || buffer.initial_bytes > buffer.max_bytes {
            return Err(HalError::Configuration(format!(
                "response_buffer: initial_bytes ({}) must be in 1..=max_bytes ({})",
                buffer.initial_bytes, buffer.max_bytes
            )));
        }

        let mut seen = HashSet::new();
        for name in self.roi.property_names() {
            if name.is_empty() {
                return Err(HalError::Configuration(
                    "roi property names must not be empty".into(),
                ));
            }
            if !seen.insert(name) {
                return Err(HalError::Configuration(format!(
                    "roi property '{name}' is used twice"
                )));
            }
        }
        if self.roi.mode_off == self.roi.mode_on {
            return Err(HalError::Configuration(
                "roi.mode_off and roi.mode_on must differ".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.acquisition.default_frame_count, 10);
        assert_eq!(config.roi.hpos_property, "subarray_hpos");
        assert_eq!(config.acquisition.extract_timeout(), None);
    }

    #[test]
    fn test_partial_toml() {
        let config: SessionConfig = toml::from_str(
            r#"
            [acquisition]
            default_frame_count = 32
            extract_timeout_ms = 250

            [format]
            default_pixel = "mono8"
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.acquisition.default_frame_count, 32);
        assert!(config.acquisition.continuous);
        assert_eq!(
            config.acquisition.extract_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.format.default_pixel, PixelType::Mono8);
        assert_eq!(config.roi, RoiConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = SessionConfig::default();
        config.acquisition.default_frame_count = 0;
        assert!(matches!(config.validate(), Err(HalError::Configuration(_))));

        let mut config = SessionConfig::default();
        config.roi.vsize_property = config.roi.hsize_property.clone();
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.response_buffer.initial_bytes = config.response_buffer.max_bytes + 1;
        assert!(config.validate().is_err());
    }
}
