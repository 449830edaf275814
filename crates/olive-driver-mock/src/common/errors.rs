//! Fault injection for mock devices.
//!
//! Scenarios can be given up front through configuration or injected while a
//! session is open, since the configuration is shared between the control
//! handle and the opened device.

use olive_core::error::{NativeError, NativeErrorKind};
use olive_core::property::normalize_name;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Vendor code attached to injected failures.
pub const INJECTED_FAULT_CODE: i32 = 0x0F00_0001;

/// A failure a mock device can be told to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultScenario {
    /// Refuse every write to a property (catalog name, e.g. `subarray_hsize`)
    RejectWrites {
        /// Catalog name
        property: String,
    },
    /// Restart the id walk instead of ending it
    RepeatPropertyIds,
    /// Require string buffers of at least this many bytes
    ShortNameBuffer {
        /// Smallest accepted buffer
        min_bytes: usize,
    },
    /// Report busy when capture is armed
    BusyOnStart,
    /// Refuse to open
    FailOpen,
    /// Communication failure on `operation` after `count` successful calls
    FailAfterN {
        /// Native method name, e.g. `get_value`
        operation: String,
        /// Calls that succeed before the failures start
        count: u32,
    },
}

/// Fault injection configuration for mock devices
#[derive(Clone, Debug, Default)]
pub struct FaultConfig {
    scenarios: Arc<Mutex<Vec<FaultScenario>>>,
    counts: Arc<Mutex<HashMap<String, u32>>>,
}

impl FaultConfig {
    /// No faults (default)
    pub fn none() -> Self {
        Self::default()
    }

    /// Start with `scenarios` active.
    pub fn scenarios(scenarios: Vec<FaultScenario>) -> Self {
        Self {
            scenarios: Arc::new(Mutex::new(scenarios)),
            counts: Arc::default(),
        }
    }

    /// Add a scenario at runtime.
    pub fn inject(&self, scenario: FaultScenario) {
        tracing::debug!(?scenario, "fault injected");
        self.scenarios.lock().push(scenario);
    }

    /// Remove every scenario and reset counters.
    pub fn clear(&self) {
        self.scenarios.lock().clear();
        self.counts.lock().clear();
    }

    /// Snapshot of the active scenarios.
    pub fn active(&self) -> Vec<FaultScenario> {
        self.scenarios.lock().clone()
    }

    fn any(&self, predicate: impl Fn(&FaultScenario) -> bool) -> bool {
        self.scenarios.lock().iter().any(predicate)
    }

    /// Whether writes to the property with this display name are refused.
    pub fn rejects_write(&self, display_name: &str) -> bool {
        let key = normalize_name(display_name);
        self.any(|s| matches!(s, FaultScenario::RejectWrites { property } if *property == key))
    }

    /// Whether the id walk should loop back to the first id.
    pub fn repeats_property_ids(&self) -> bool {
        self.any(|s| matches!(s, FaultScenario::RepeatPropertyIds))
    }

    /// Smallest string buffer the device accepts.
    pub fn min_buffer(&self) -> usize {
        self.scenarios
            .lock()
            .iter()
            .filter_map(|s| match s {
                FaultScenario::ShortNameBuffer { min_bytes } => Some(*min_bytes),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Whether arming capture should report busy.
    pub fn busy_on_start(&self) -> bool {
        self.any(|s| matches!(s, FaultScenario::BusyOnStart))
    }

    /// Whether opening should fail.
    pub fn fails_open(&self) -> bool {
        self.any(|s| matches!(s, FaultScenario::FailOpen))
    }

    /// Count a call to `operation` and fail it once its budget is spent.
    pub fn check_operation(&self, operation: &str) -> Result<(), NativeError> {
        let limit = self.scenarios.lock().iter().find_map(|s| match s {
            FaultScenario::FailAfterN {
                operation: op,
                count,
            } if op == operation => Some(*count),
            _ => None,
        });
        let Some(limit) = limit else {
            return Ok(());
        };

        let mut counts = self.counts.lock();
        let current = counts.entry(operation.to_string()).or_insert(0);
        *current += 1;
        if *current > limit {
            return Err(NativeError::communication(format!(
                "injected failure on '{operation}' after {limit} calls"
            ))
            .with_code(INJECTED_FAULT_CODE));
        }
        Ok(())
    }
}

/// Refusal returned for injected write rejections.
pub(crate) fn injected_rejection(property: &str) -> NativeError {
    NativeError::new(
        NativeErrorKind::Rejected,
        format!("write to '{property}' refused"),
    )
    .with_code(INJECTED_FAULT_CODE)
}
