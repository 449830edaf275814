//! Typed device properties.
//!
//! [`PropertyCatalog`] walks the native id space once per session and owns
//! the resulting descriptors. [`PropertyAccessor`] reads and writes values
//! through those descriptors, decoding enumerated choices to labels.

pub mod accessor;
pub mod catalog;
pub mod descriptor;

pub use accessor::PropertyAccessor;
pub use catalog::PropertyCatalog;
pub use descriptor::{normalize_name, NumericType, PropertyDescriptor, PropertyKind, PropertyValue};
