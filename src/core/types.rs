//! Common types used across the application

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier for a hardware component (e.g. "cpu0", "gpu0", "motherboard")
pub type ComponentId = String;

/// Hardware component category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Cpu,
    Gpu,
    Ram,
    Storage,
    Motherboard,
    Other,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Cpu => "cpu",
            ComponentKind::Gpu => "gpu",
            ComponentKind::Ram => "ram",
            ComponentKind::Storage => "storage",
            ComponentKind::Motherboard => "motherboard",
            ComponentKind::Other => "other",
        }
    }
}

/// A detected hardware component
///
/// Created at detection time and immutable afterwards; a re-detection
/// produces a fresh set of components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Stable id within one process run
    pub id: ComponentId,
    pub kind: ComponentKind,
    /// Human-readable name (model string where detected)
    pub name: String,
    /// Nominal TDP in watts, if known at detection time
    pub tdp_watts: Option<f64>,
    /// Free-form detected specification metadata
    pub specs: HashMap<String, String>,
}

impl Component {
    pub fn new(id: &str, kind: ComponentKind, name: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            tdp_watts: None,
            specs: HashMap::new(),
        }
    }

    pub fn with_tdp(mut self, watts: f64) -> Self {
        self.tdp_watts = Some(watts);
        self
    }

    pub fn with_spec(mut self, key: &str, value: impl ToString) -> Self {
        self.specs.insert(key.to_string(), value.to_string());
        self
    }
}

/// One raw sample for a single component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryReading {
    /// Measured electrical draw in watts
    DirectPower(f64),
    /// Utilization percentage plus a short note on where it came from
    Utilization { percent: f64, context: String },
}

/// One sampling tick worth of raw telemetry
///
/// The timestamp is captured at sampling time so the estimation engine can
/// stay a pure function of its inputs. Snapshots are consumed immediately
/// and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Unix timestamp (seconds) of the sampling tick
    pub timestamp: i64,
    /// Raw reading per component id
    pub readings: HashMap<ComponentId, TelemetryReading>,
}

impl TelemetrySnapshot {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            readings: HashMap::new(),
        }
    }

    pub fn insert_direct(&mut self, id: &str, watts: f64) {
        self.readings
            .insert(id.to_string(), TelemetryReading::DirectPower(watts));
    }

    pub fn insert_utilization(&mut self, id: &str, percent: f64, context: &str) {
        self.readings.insert(
            id.to_string(),
            TelemetryReading::Utilization {
                percent,
                context: context.to_string(),
            },
        );
    }
}

/// How a per-component power figure was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Measured by a sensor capable of reading actual draw
    Direct,
    /// Derived from utilization and TDP constants
    Estimated,
}

/// Engine output for one component on one tick
///
/// Invariants: `watts >= 0`; `method` is `Direct` only if the originating
/// snapshot carried a `DirectPower` sample for this component on this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerReading {
    pub component_id: ComponentId,
    pub watts: f64,
    pub method: Method,
    /// Set when the component is known to the catalog but was absent from
    /// the snapshot (sensor disappeared mid-run); kept at 0 W rather than
    /// dropped so historical totals remain component-complete.
    pub stale: bool,
    pub timestamp: i64,
}

/// Unified machine-wide reading for one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePowerReading {
    /// Unix timestamp (seconds) of the tick
    pub timestamp: i64,
    /// Sum of all per-component watts
    pub total_watts: f64,
    /// Per-component breakdown, in catalog order
    pub readings: Vec<PowerReading>,
}

impl AggregatePowerReading {
    /// Per-component watts as a mapping
    pub fn per_component(&self) -> HashMap<&str, f64> {
        self.readings
            .iter()
            .map(|r| (r.component_id.as_str(), r.watts))
            .collect()
    }

    pub fn get(&self, component_id: &str) -> Option<&PowerReading> {
        self.readings.iter().find(|r| r.component_id == component_id)
    }
}
