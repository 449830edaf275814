//! Property discovery.

use crate::error::{HalError, HalResult, NativeError, NativeErrorKind};
use crate::native::{NativeDevice, PropertyId, RawKind};
use crate::property::descriptor::{normalize_name, PropertyDescriptor};
use crate::retry::{retrieve_large_response, ResponseBufferPolicy};
use std::collections::{HashMap, HashSet};

/// Upper bound on enumerated choices read per property.
const MAX_ENUM_CHOICES: i64 = 4096;

/// Descriptor set of one open device, keyed by normalized display name.
///
/// Built by [`discover`](Self::discover) while the session opens. Calling it
/// again replaces the previous result wholesale.
#[derive(Debug, Default)]
pub struct PropertyCatalog {
    policy: ResponseBufferPolicy,
    names: Vec<String>,
    descriptors: HashMap<String, PropertyDescriptor>,
}

impl PropertyCatalog {
    /// Empty catalog that reads strings with `policy`.
    pub fn new(policy: ResponseBufferPolicy) -> Self {
        Self {
            policy,
            names: Vec::new(),
            descriptors: HashMap::new(),
        }
    }

    /// Buffer policy used for display names and labels.
    pub fn policy(&self) -> &ResponseBufferPolicy {
        &self.policy
    }

    /// Walk the native property ids and rebuild the catalog.
    ///
    /// The walk ends when the device reports no further id or returns an id
    /// already seen. Returns the discovered names in walk order.
    pub fn discover(&mut self, device: &dyn NativeDevice) -> HalResult<Vec<String>> {
        let mut names = Vec::new();
        let mut descriptors = HashMap::new();
        let mut seen = HashSet::new();
        let mut cursor = PropertyId::BEFORE_FIRST;

        while let Some(id) = device.next_property_id(cursor)? {
            if !seen.insert(id) {
                tracing::debug!(property_id = %id, "property walk returned a repeated id");
                break;
            }
            cursor = id;

            let display = retrieve_large_response(&self.policy, |n| device.display_name(id, n))?;
            let name = normalize_name(&display);
            let descriptor = self.describe(device, id, &name)?;
            tracing::debug!(
                property = %name,
                property_id = %id,
                kind = ?descriptor.kind,
                "discovered property"
            );
            if descriptors.insert(name.clone(), descriptor).is_none() {
                names.push(name);
            }
        }

        tracing::debug!(count = names.len(), "property discovery complete");
        self.names = names.clone();
        self.descriptors = descriptors;
        Ok(names)
    }

    fn describe(
        &self,
        device: &dyn NativeDevice,
        id: PropertyId,
        name: &str,
    ) -> HalResult<PropertyDescriptor> {
        let raw = device.raw_attributes(id)?;
        let mut labels = Vec::new();
        if raw.kind == RawKind::Enumerated {
            let (lo, hi) = (raw.min.ceil() as i64, raw.max.floor() as i64);
            if hi.saturating_sub(lo) >= MAX_ENUM_CHOICES {
                return Err(NativeError::new(
                    NativeErrorKind::Protocol,
                    format!("enumerated property '{name}' spans {lo}..={hi}"),
                )
                .into());
            }
            for value in lo..=hi {
                let label = retrieve_large_response(&self.policy, |n| {
                    device.value_label(id, value as f64, n)
                })?;
                labels.push((value, label));
            }
        }
        Ok(PropertyDescriptor::from_raw(id, name, &raw, labels))
    }

    /// Descriptor for a property name.
    pub fn attributes(&self, name: &str) -> HalResult<&PropertyDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| HalError::UnknownProperty(name.to_string()))
    }

    /// Whether `name` was discovered.
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Names in discovery order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of discovered properties.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether discovery found nothing.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Forget every descriptor.
    pub fn clear(&mut self) {
        self.names.clear();
        self.descriptors.clear();
    }
}
