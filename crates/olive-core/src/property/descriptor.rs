//! Property metadata and values.

use crate::native::{PropertyId, RawAttributes, RawKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage of a numeric property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericType {
    /// Truncated to whole numbers on read and write
    Integer,
    /// Kept as floating point
    Real,
}

/// Value domain of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Free numeric value within `min..=max`
    Numeric(NumericType),
    /// One of the enumerated labels
    Enumerated,
    /// String, read only
    Text,
}

impl From<RawKind> for PropertyKind {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Integer => PropertyKind::Numeric(NumericType::Integer),
            RawKind::Real => PropertyKind::Numeric(NumericType::Real),
            RawKind::Enumerated => PropertyKind::Enumerated,
            RawKind::Text => PropertyKind::Text,
        }
    }
}

/// Discovered metadata for one device property.
///
/// Immutable for the lifetime of a session. Enumerated labels are contiguous:
/// `enumerated_labels[i]` belongs to native value `min + i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Native id
    pub id: PropertyId,
    /// Normalized catalog key
    pub name: String,
    /// Value can be read
    pub readable: bool,
    /// Value can be written
    pub writable: bool,
    /// Value domain
    pub kind: PropertyKind,
    /// Holds several elements
    pub is_array: bool,
    /// Elements when `is_array` is set
    pub element_count: u32,
    /// Lowest accepted value
    pub min: f64,
    /// Highest accepted value
    pub max: f64,
    /// `(native value, label)` pairs for enumerated properties
    pub enumerated_labels: Vec<(i64, String)>,
}

impl PropertyDescriptor {
    /// Build from the native attribute record.
    pub fn from_raw(
        id: PropertyId,
        name: impl Into<String>,
        raw: &RawAttributes,
        enumerated_labels: Vec<(i64, String)>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            readable: raw.readable,
            writable: raw.writable,
            kind: raw.kind.into(),
            is_array: raw.is_array,
            element_count: raw.element_count,
            min: raw.min,
            max: raw.max,
            enumerated_labels,
        }
    }

    /// True for arrays the accessor can only partially read.
    pub fn is_multi_element(&self) -> bool {
        self.is_array && self.element_count > 1
    }

    /// Whether `value` lies within `min..=max`.
    pub fn in_range(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Label for a native enumerated value.
    pub fn label_for(&self, raw: f64) -> Option<&str> {
        let offset = raw - self.min;
        if offset < 0.0 || offset.fract() != 0.0 {
            return None;
        }
        self.enumerated_labels
            .get(offset as usize)
            .map(|(_, label)| label.as_str())
    }

    /// Native value for an enumerated label.
    pub fn value_for(&self, label: &str) -> Option<f64> {
        self.enumerated_labels
            .iter()
            .position(|(_, l)| l == label)
            .map(|index| index as f64 + self.min)
    }

    /// Enumerated labels in native value order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.enumerated_labels.iter().map(|(_, l)| l.as_str())
    }
}

/// Decoded property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Integer property value
    Integer(i64),
    /// Real property value
    Real(f64),
    /// Label of an enumerated choice
    Label(String),
    /// Text read from a string property
    Text(String),
}

impl PropertyValue {
    /// Numeric value as an integer, truncating reals.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            PropertyValue::Real(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Numeric value as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Integer(v) => Some(*v as f64),
            PropertyValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Label or text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Label(s) | PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Real(v) => write!(f, "{}", v),
            PropertyValue::Label(s) | PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Integer(value.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Real(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Label(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Label(value)
    }
}

/// Catalog key for a native display name: lower-cased, whitespace replaced
/// with underscores.
pub fn normalize_name(display_name: &str) -> String {
    display_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() {
                '_'
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}
