//! Telemetry source adapters
//!
//! A telemetry source produces one `TelemetrySnapshot` per sampling tick.
//! Two variants exist: `DirectSource` wraps a platform power probe and emits
//! measured watts for every component the probe covers, falling back to
//! utilization for the rest of the snapshot; `EstimationSource` emits
//! utilization for everything and is the degraded mode used when no probe
//! is available. Which components a probe covers is resolved once at
//! construction, not re-queried per tick.

#[cfg(target_os = "linux")]
pub mod rapl;

use crate::catalog::Catalog;
use crate::core::{ComponentId, ComponentKind, Result, TelemetrySnapshot};
use std::collections::HashSet;
use std::sync::Mutex;
use sysinfo::System;

/// GPU utilization assumed when no measurement channel exists
const ASSUMED_GPU_UTILIZATION: f64 = 30.0;

/// A source of per-component telemetry snapshots
pub trait TelemetrySource: Send + Sync {
    /// Take one snapshot. May block up to the underlying sensor's latency;
    /// the sampling loop bounds the call with a timeout.
    fn sample(&self) -> Result<TelemetrySnapshot>;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Whether readings from this source are estimates rather than measurements
    fn is_estimated(&self) -> bool;
}

/// Platform collaborator capable of measuring actual electrical draw
///
/// Implementations are injected into `DirectSource`; their absence at startup
/// selects the estimation-only variant instead of being branched on
/// throughout the codebase.
pub trait PowerProbe: Send + Sync {
    fn name(&self) -> &str;

    /// Component ids this probe can read directly. Queried once at adapter
    /// construction.
    fn direct_components(&self) -> Vec<ComponentId>;

    /// Read the current draw in watts for one supported component
    fn read_watts(&self, component_id: &str) -> Result<f64>;
}

/// Utilization-only telemetry backed by sysinfo
///
/// CPU load is the average over all logical cores; RAM is used/total;
/// GPU utilization is assumed at a fixed fraction when unmeasurable;
/// storage and motherboard report 0% and are carried by their idle floors.
pub struct EstimationSource {
    sys: Mutex<System>,
    components: Vec<(ComponentId, ComponentKind)>,
}

impl EstimationSource {
    pub fn new(catalog: &Catalog) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let components = catalog
            .components()
            .iter()
            .map(|c| (c.id.clone(), c.kind))
            .collect();

        Self {
            sys: Mutex::new(sys),
            components,
        }
    }

    fn utilization(&self, sys: &System, kind: ComponentKind) -> (f64, &'static str) {
        match kind {
            ComponentKind::Cpu => {
                let cpus = sys.cpus();
                if cpus.is_empty() {
                    return (0.0, "cpu load unavailable");
                }
                let avg =
                    cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32;
                (avg as f64, "sysinfo cpu load")
            }
            ComponentKind::Ram => {
                let total = sys.total_memory();
                if total == 0 {
                    return (0.0, "memory unavailable");
                }
                let percent = sys.used_memory() as f64 / total as f64 * 100.0;
                (percent, "sysinfo memory")
            }
            ComponentKind::Gpu => (ASSUMED_GPU_UTILIZATION, "assumed, no gpu sensor"),
            ComponentKind::Storage => (0.0, "idle floor"),
            ComponentKind::Motherboard => (0.0, "constant draw"),
            ComponentKind::Other => (0.0, "unknown"),
        }
    }
}

impl TelemetrySource for EstimationSource {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        let mut sys = self.sys.lock().unwrap();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let mut snapshot = TelemetrySnapshot::new(chrono::Utc::now().timestamp());
        for (id, kind) in &self.components {
            let (percent, context) = self.utilization(&sys, *kind);
            snapshot.insert_utilization(id, percent, context);
        }

        Ok(snapshot)
    }

    fn name(&self) -> &str {
        "Estimation (no hardware sensor)"
    }

    fn is_estimated(&self) -> bool {
        true
    }
}

/// Telemetry adapter backed by a direct power probe
///
/// Emits `DirectPower` for probe-covered components and utilization samples
/// for the rest of the catalog in the same snapshot. Mixed snapshots are
/// expected and normal.
pub struct DirectSource {
    probe: Box<dyn PowerProbe>,
    fallback: EstimationSource,
    capabilities: HashSet<ComponentId>,
    name: String,
}

impl DirectSource {
    pub fn new(probe: Box<dyn PowerProbe>, catalog: &Catalog) -> Self {
        let capabilities: HashSet<ComponentId> = probe.direct_components().into_iter().collect();
        let name = probe.name().to_string();

        Self {
            probe,
            fallback: EstimationSource::new(catalog),
            capabilities,
            name,
        }
    }
}

impl TelemetrySource for DirectSource {
    fn sample(&self) -> Result<TelemetrySnapshot> {
        let mut snapshot = self.fallback.sample()?;

        for id in &self.capabilities {
            let watts = self.probe.read_watts(id)?;
            snapshot.insert_direct(id, watts);
        }

        Ok(snapshot)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_estimated(&self) -> bool {
        false
    }
}

/// The telemetry source picked at startup
pub struct SelectedSource {
    pub source: Box<dyn TelemetrySource>,
    /// True when no direct-power collaborator is available and every reading
    /// is utilization-based
    pub degraded: bool,
}

/// Pick the best available telemetry source for this machine
///
/// Probe initialization failure is non-fatal: the estimation-only variant is
/// selected and the degradation is logged once, here, not per tick.
pub fn select_source(catalog: &Catalog) -> SelectedSource {
    #[cfg(target_os = "linux")]
    {
        match rapl::RaplProbe::new(catalog) {
            Ok(probe) => {
                log::info!("Using {} for direct power readings", probe.name());
                return SelectedSource {
                    source: Box::new(DirectSource::new(Box::new(probe), catalog)),
                    degraded: false,
                };
            }
            Err(e) => {
                log::warn!("Direct power probe unavailable: {}", e);
            }
        }
    }

    log::warn!("No direct power collaborator available, all readings will be estimated");
    SelectedSource {
        source: Box::new(EstimationSource::new(catalog)),
        degraded: true,
    }
}
