//! Transactional sensor sub-window configuration.
//!
//! The sub-window is described by five properties: an enumerated mode switch
//! and four integers for the offset and size per axis. [`set_roi`] rewrites
//! them in the order vendors require (mode off, offsets, sizes, mode on) and
//! restores the previous window if the device refuses any step.
//!
//! Coordinates are `(row, col)` for origins and `(height, width)` for shapes.
//!
//! [`set_roi`]: RegionOfInterestManager::set_roi

use crate::config::RoiConfig;
use crate::error::{HalError, HalResult, NativeError, NativeErrorKind};
use crate::property::{PropertyAccessor, PropertyCatalog};
use serde::{Deserialize, Serialize};

/// A rectangle on the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRect {
    /// `(row, col)` of the top-left pixel
    pub origin: (u32, u32),
    /// `(height, width)`
    pub shape: (u32, u32),
}

impl RoiRect {
    /// Rectangle from `(row, col)` and `(height, width)`.
    pub fn new(origin: (u32, u32), shape: (u32, u32)) -> Self {
        Self { origin, shape }
    }

    /// One past the bottom-right pixel.
    pub fn opposite_corner(&self) -> (u32, u32) {
        (
            self.origin.0.saturating_add(self.shape.0),
            self.origin.1.saturating_add(self.shape.1),
        )
    }
}

/// Raw sub-window state used for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    enabled: bool,
    rect: RoiRect,
}

/// Applies and reports the sensor sub-window through a [`PropertyAccessor`].
#[derive(Debug, Clone)]
pub struct RegionOfInterestManager {
    names: RoiConfig,
}

impl RegionOfInterestManager {
    /// Manager for the sub-window properties named in `names`.
    pub fn new(names: RoiConfig) -> Self {
        Self { names }
    }

    /// Whether the catalog holds every sub-window property.
    pub fn is_available(&self, catalog: &PropertyCatalog) -> bool {
        [
            &self.names.mode_property,
            &self.names.hpos_property,
            &self.names.vpos_property,
            &self.names.hsize_property,
            &self.names.vsize_property,
        ]
        .iter()
        .all(|name| catalog.contains(name))
    }

    /// Full sensor size as `(height, width)`.
    pub fn max_extent(&self, props: &PropertyAccessor<'_>) -> HalResult<(u32, u32)> {
        let height = props.descriptor(&self.names.vsize_property)?.max;
        let width = props.descriptor(&self.names.hsize_property)?.max;
        Ok((to_pixels(height)?, to_pixels(width)?))
    }

    /// Whether sub-window mode is on.
    pub fn is_enabled(&self, props: &PropertyAccessor<'_>) -> HalResult<bool> {
        Ok(props.get_label(&self.names.mode_property)? == self.names.mode_on)
    }

    /// The active window; the full sensor while sub-window mode is off.
    pub fn current(&self, props: &PropertyAccessor<'_>) -> HalResult<RoiRect> {
        let snapshot = self.snapshot(props)?;
        if snapshot.enabled {
            Ok(snapshot.rect)
        } else {
            Ok(RoiRect::new((0, 0), self.max_extent(props)?))
        }
    }

    /// Origin of the active window.
    pub fn origin(&self, props: &PropertyAccessor<'_>) -> HalResult<(u32, u32)> {
        Ok(self.current(props)?.origin)
    }

    /// Shape of the active window.
    pub fn shape(&self, props: &PropertyAccessor<'_>) -> HalResult<(u32, u32)> {
        Ok(self.current(props)?.shape)
    }

    /// Apply a new sub-window.
    ///
    /// With neither argument the sub-window is switched off and the full
    /// sensor is used. A missing origin centres the shape on the sensor; a
    /// missing shape extends from the origin to the sensor edge.
    ///
    /// A refused offset fails with [`HalError::RoiOutOfBounds`], a refused
    /// size with [`HalError::RoiUnsupported`]. In both cases the previous
    /// window is restored before the error is returned.
    pub fn set_roi(
        &self,
        props: &PropertyAccessor<'_>,
        origin: Option<(u32, u32)>,
        shape: Option<(u32, u32)>,
    ) -> HalResult<RoiRect> {
        if let Some((height, width)) = shape {
            if height == 0 || width == 0 {
                return Err(HalError::InvalidArgument(format!(
                    "ROI shape ({height}, {width}) must be non-empty"
                )));
            }
        }

        let snapshot = self.snapshot(props)?;
        let extent = self.max_extent(props)?;
        props.set(&self.names.mode_property, self.names.mode_off.as_str())?;

        let (origin, shape) = match (origin, shape) {
            (None, None) => {
                tracing::info!("sub-window disabled");
                return Ok(RoiRect::new((0, 0), extent));
            }
            (Some(origin), shape) => (origin, shape),
            (None, Some(shape)) => (centered_origin(extent, shape), Some(shape)),
        };

        match self.write_window(props, extent, origin, shape) {
            Ok(rect) => {
                tracing::info!(origin = ?rect.origin, shape = ?rect.shape, "sub-window applied");
                Ok(rect)
            }
            Err(err) => {
                tracing::warn!(error = %err, "sub-window rejected, restoring previous window");
                if let Err(rollback) = self.apply(props, &snapshot) {
                    tracing::error!(
                        error = %rollback,
                        origin = ?snapshot.rect.origin,
                        shape = ?snapshot.rect.shape,
                        "failed to restore previous sub-window"
                    );
                }
                Err(err)
            }
        }
    }

    fn write_window(
        &self,
        props: &PropertyAccessor<'_>,
        extent: (u32, u32),
        origin: (u32, u32),
        shape: Option<(u32, u32)>,
    ) -> HalResult<RoiRect> {
        let out_of_bounds = |err: HalError| {
            if is_rejection(&err) {
                HalError::RoiOutOfBounds { origin }
            } else {
                err
            }
        };
        props
            .set(&self.names.vpos_property, origin.0)
            .map_err(out_of_bounds)?;
        props
            .set(&self.names.hpos_property, origin.1)
            .map_err(out_of_bounds)?;

        let shape = shape.unwrap_or((
            extent.0.saturating_sub(origin.0),
            extent.1.saturating_sub(origin.1),
        ));
        let rect = RoiRect::new(origin, shape);
        let unsupported = |err: HalError| {
            if is_rejection(&err) {
                HalError::RoiUnsupported {
                    origin,
                    opposite_corner: rect.opposite_corner(),
                }
            } else {
                err
            }
        };
        props
            .set(&self.names.hsize_property, shape.1)
            .map_err(unsupported)?;
        props
            .set(&self.names.vsize_property, shape.0)
            .map_err(unsupported)?;
        props
            .set(&self.names.mode_property, self.names.mode_on.as_str())
            .map_err(unsupported)?;
        Ok(rect)
    }

    fn snapshot(&self, props: &PropertyAccessor<'_>) -> HalResult<Snapshot> {
        let read = |name: &str| -> HalResult<u32> {
            let value = props.get_integer(name)?;
            u32::try_from(value).map_err(|_| {
                NativeError::new(
                    NativeErrorKind::Protocol,
                    format!("'{name}' reported {value}"),
                )
                .into()
            })
        };
        Ok(Snapshot {
            enabled: self.is_enabled(props)?,
            rect: RoiRect::new(
                (
                    read(&self.names.vpos_property)?,
                    read(&self.names.hpos_property)?,
                ),
                (
                    read(&self.names.vsize_property)?,
                    read(&self.names.hsize_property)?,
                ),
            ),
        })
    }

    /// Write a snapshot back. Properties already holding the target value are
    /// left alone; every step is attempted and the first failure returned.
    fn apply(&self, props: &PropertyAccessor<'_>, target: &Snapshot) -> HalResult<()> {
        let mut first_error = None;
        let mut record = |result: HalResult<()>| {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        };
        let restore = |name: &str, value: u32| -> HalResult<()> {
            if props.get_integer(name)? != i64::from(value) {
                props.set(name, value)?;
            }
            Ok(())
        };

        record(props.set(&self.names.mode_property, self.names.mode_off.as_str()));
        record(restore(&self.names.vpos_property, target.rect.origin.0));
        record(restore(&self.names.hpos_property, target.rect.origin.1));
        record(restore(&self.names.hsize_property, target.rect.shape.1));
        record(restore(&self.names.vsize_property, target.rect.shape.0));
        if target.enabled {
            record(props.set(&self.names.mode_property, self.names.mode_on.as_str()));
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// `(extent - shape) / 2` per axis, clamped to the sensor.
fn centered_origin(extent: (u32, u32), shape: (u32, u32)) -> (u32, u32) {
    (
        extent.0.saturating_sub(shape.0) / 2,
        extent.1.saturating_sub(shape.1) / 2,
    )
}

/// Refused by the device, or outside the range it advertised.
fn is_rejection(err: &HalError) -> bool {
    matches!(
        err,
        HalError::InvalidArgument(_)
            | HalError::DeviceCommunication(NativeError {
                kind: NativeErrorKind::Rejected,
                ..
            })
    )
}

fn to_pixels(value: f64) -> HalResult<u32> {
    if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) {
        Ok(value as u32)
    } else {
        Err(NativeError::new(NativeErrorKind::Protocol, format!("sensor extent {value}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::PropertyId;
    use crate::property::testing::FakeDevice;

    fn sensor(max: f64) -> FakeDevice {
        FakeDevice::default()
            .enumerated(1, "Subarray Mode", 1.0, &["off", "on"], 1.0)
            .integer(2, "Subarray HPos", 0.0, max - 4.0, 0.0)
            .integer(3, "Subarray VPos", 0.0, max - 4.0, 0.0)
            .integer(4, "Subarray HSize", 4.0, max, max)
            .integer(5, "Subarray VSize", 4.0, max, max)
    }

    fn open(device: &FakeDevice) -> PropertyCatalog {
        let mut catalog = PropertyCatalog::default();
        catalog.discover(device).unwrap();
        catalog
    }

    #[test]
    fn test_centered_origin() {
        assert_eq!(centered_origin((2048, 2048), (512, 512)), (768, 768));
        assert_eq!(centered_origin((2048, 2048), (513, 511)), (767, 768));
        assert_eq!(centered_origin((100, 100), (200, 50)), (0, 25));
    }

    #[test]
    fn test_shape_only_centres_window() {
        let device = sensor(2048.0);
        let catalog = open(&device);
        let props = PropertyAccessor::new(&device, &catalog);
        let roi = RegionOfInterestManager::new(RoiConfig::default());
        assert!(roi.is_available(&catalog));

        let rect = roi.set_roi(&props, None, Some((512, 512))).unwrap();
        assert_eq!(rect.origin, (768, 768));
        assert_eq!(roi.current(&props).unwrap(), rect);
    }

    #[test]
    fn test_origin_only_extends_to_edge() {
        let device = sensor(2048.0);
        let catalog = open(&device);
        let props = PropertyAccessor::new(&device, &catalog);
        let roi = RegionOfInterestManager::new(RoiConfig::default());
        let rect = roi.set_roi(&props, Some((48, 1000)), None).unwrap();
        assert_eq!(rect.shape, (2000, 1048));
        assert_eq!(rect.opposite_corner(), (2048, 2048));
    }

    #[test]
    fn test_disable_reports_full_sensor() {
        let device = sensor(1024.0);
        let catalog = open(&device);
        let props = PropertyAccessor::new(&device, &catalog);
        let roi = RegionOfInterestManager::new(RoiConfig::default());
        roi.set_roi(&props, Some((0, 0)), Some((64, 64))).unwrap();
        let rect = roi.set_roi(&props, None, None).unwrap();
        assert_eq!(rect, RoiRect::new((0, 0), (1024, 1024)));
        assert!(!roi.is_enabled(&props).unwrap());
        assert_eq!(roi.shape(&props).unwrap(), (1024, 1024));
    }

    #[test]
    fn test_rejected_size_restores_previous_window() {
        let device = sensor(2048.0);
        let catalog = open(&device);
        let props = PropertyAccessor::new(&device, &catalog);
        let roi = RegionOfInterestManager::new(RoiConfig::default());
        let before = roi.set_roi(&props, Some((100, 200)), Some((256, 256))).unwrap();

        device.reject.lock().push(PropertyId(4));
        let err = roi
            .set_roi(&props, Some((10, 20)), Some((128, 64)))
            .unwrap_err();
        assert!(matches!(
            err,
            HalError::RoiUnsupported {
                origin: (10, 20),
                opposite_corner: (138, 84)
            }
        ));
        assert!(roi.is_enabled(&props).unwrap());
        assert_eq!(roi.current(&props).unwrap(), before);
    }

    #[test]
    fn test_rejected_origin_is_out_of_bounds() {
        let device = sensor(512.0);
        let catalog = open(&device);
        let props = PropertyAccessor::new(&device, &catalog);
        let roi = RegionOfInterestManager::new(RoiConfig::default());
        let err = roi.set_roi(&props, Some((600, 0)), Some((8, 8))).unwrap_err();
        assert!(matches!(err, HalError::RoiOutOfBounds { origin: (600, 0) }));
        assert!(err.is_recoverable());
        assert_eq!(roi.current(&props).unwrap(), RoiRect::new((0, 0), (512, 512)));
        assert_eq!(device.value_of(1), 1.0);
    }

    #[test]
    fn test_empty_shape_is_invalid() {
        let device = sensor(512.0);
        let catalog = open(&device);
        let props = PropertyAccessor::new(&device, &catalog);
        let roi = RegionOfInterestManager::new(RoiConfig::default());
        assert!(matches!(
            roi.set_roi(&props, None, Some((0, 8))),
            Err(HalError::InvalidArgument(_))
        ));
        assert!(device.writes.lock().is_empty());
    }
}
