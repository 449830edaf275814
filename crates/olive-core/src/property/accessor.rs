//! Reading and writing property values.

use crate::error::{HalError, HalResult, NativeError, NativeErrorKind};
use crate::native::NativeDevice;
use crate::property::catalog::PropertyCatalog;
use crate::property::descriptor::{NumericType, PropertyDescriptor, PropertyKind, PropertyValue};
use crate::retry::retrieve_large_response;

/// Value access over a discovered catalog.
///
/// Borrowed view; the accessor holds no state of its own.
///
/// Numeric writes outside the discovered `min..=max` are refused before they
/// reach the device. Array properties are read through their first element
/// only. A warning is logged whenever a multi-element array is read.
#[derive(Clone, Copy)]
pub struct PropertyAccessor<'a> {
    device: &'a dyn NativeDevice,
    catalog: &'a PropertyCatalog,
}

impl<'a> PropertyAccessor<'a> {
    /// View `catalog` through the handle it was discovered on.
    pub fn new(device: &'a dyn NativeDevice, catalog: &'a PropertyCatalog) -> Self {
        Self { device, catalog }
    }

    /// Descriptor for `name`.
    pub fn descriptor(&self, name: &str) -> HalResult<&'a PropertyDescriptor> {
        self.catalog.attributes(name)
    }

    /// Read and decode the current value.
    pub fn get(&self, name: &str) -> HalResult<PropertyValue> {
        let desc = self.catalog.attributes(name)?;
        if !desc.readable {
            return Err(HalError::PropertyNotReadable(name.to_string()));
        }
        if desc.is_multi_element() {
            tracing::warn!(
                property = name,
                element_count = desc.element_count,
                "array property read returns only the first element"
            );
        }

        if desc.kind == PropertyKind::Text {
            let policy = self.catalog.policy();
            let text = retrieve_large_response(policy, |n| self.device.get_text(desc.id, n))?;
            return Ok(PropertyValue::Text(text));
        }

        let raw = self.device.get_value(desc.id)?;
        decode(desc, raw)
    }

    /// Encode and write a value. Enumerated properties take a label.
    pub fn set(&self, name: &str, value: impl Into<PropertyValue>) -> HalResult<()> {
        let desc = self.catalog.attributes(name)?;
        if !desc.writable {
            return Err(HalError::PropertyNotWritable(name.to_string()));
        }
        let value = value.into();
        let raw = encode(desc, &value)?;
        if matches!(desc.kind, PropertyKind::Numeric(_)) && !desc.in_range(raw) {
            return Err(HalError::InvalidArgument(format!(
                "{raw} is outside the range {}..={} of '{name}'",
                desc.min, desc.max
            )));
        }
        self.device.set_value(desc.id, raw)?;
        tracing::debug!(property = name, %value, raw, "property written");
        Ok(())
    }

    /// Read a numeric property as an integer.
    pub fn get_integer(&self, name: &str) -> HalResult<i64> {
        let value = self.get(name)?;
        value
            .as_i64()
            .ok_or_else(|| HalError::InvalidArgument(format!("property '{name}' is not numeric")))
    }

    /// Read a numeric property as a float.
    pub fn get_real(&self, name: &str) -> HalResult<f64> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| HalError::InvalidArgument(format!("property '{name}' is not numeric")))
    }

    /// Read the label of an enumerated property.
    pub fn get_label(&self, name: &str) -> HalResult<String> {
        match self.get(name)? {
            PropertyValue::Label(label) => Ok(label),
            _ => Err(HalError::InvalidArgument(format!(
                "property '{name}' is not enumerated"
            ))),
        }
    }
}

fn decode(desc: &PropertyDescriptor, raw: f64) -> HalResult<PropertyValue> {
    match desc.kind {
        PropertyKind::Enumerated => desc
            .label_for(raw)
            .map(|label| PropertyValue::Label(label.to_string()))
            .ok_or_else(|| {
                NativeError::new(
                    NativeErrorKind::Protocol,
                    format!("value {raw} of '{}' has no label", desc.name),
                )
                .into()
            }),
        PropertyKind::Numeric(NumericType::Integer) => Ok(PropertyValue::Integer(raw.trunc() as i64)),
        PropertyKind::Numeric(NumericType::Real) => Ok(PropertyValue::Real(raw)),
        PropertyKind::Text => Err(HalError::InvalidArgument(format!(
            "property '{}' holds text",
            desc.name
        ))),
    }
}

fn encode(desc: &PropertyDescriptor, value: &PropertyValue) -> HalResult<f64> {
    match (desc.kind, value) {
        (PropertyKind::Enumerated, PropertyValue::Label(label) | PropertyValue::Text(label)) => desc
            .value_for(label)
            .ok_or_else(|| HalError::UnknownEnumLabel {
                property: desc.name.clone(),
                label: label.clone(),
            }),
        (PropertyKind::Enumerated, _) => Err(HalError::InvalidArgument(format!(
            "property '{}' takes one of: {}",
            desc.name,
            desc.labels().collect::<Vec<_>>().join(", ")
        ))),
        (PropertyKind::Numeric(NumericType::Integer), v) => v
            .as_f64()
            .map(f64::trunc)
            .ok_or_else(|| numeric_expected(desc)),
        (PropertyKind::Numeric(NumericType::Real), v) => {
            v.as_f64().ok_or_else(|| numeric_expected(desc))
        }
        (PropertyKind::Text, _) => Err(HalError::InvalidArgument(format!(
            "property '{}' holds text and cannot be written",
            desc.name
        ))),
    }
}

fn numeric_expected(desc: &PropertyDescriptor) -> HalError {
    HalError::InvalidArgument(format!("property '{}' takes a number", desc.name))
}
