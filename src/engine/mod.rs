//! Power estimation engine
//!
//! Reconciles one telemetry snapshot against the component catalog into a
//! unified per-component and machine-wide power figure. This is a pure,
//! stateless function: identical inputs yield bit-identical output, which is
//! what makes the engine independently testable.

use crate::catalog::Catalog;
use crate::core::{AggregatePowerReading, Method, PowerReading, TelemetryReading, TelemetrySnapshot};

/// Resolve a snapshot into an aggregate power reading.
///
/// Per-component rules, applied independently in catalog order:
/// 1. `DirectPower(w)` -> `w` watts, method `Direct`.
/// 2. `Utilization(p)` -> `idle_floor + (tdp - idle_floor) * clamp(p, 0, 100) / 100`,
///    method `Estimated`. Scaling from the idle floor instead of zero matters
///    because idle draw is materially non-zero for CPU/GPU/storage.
/// 3. Catalog components missing from the snapshot are kept at 0 W and
///    flagged stale rather than dropped.
///
/// Snapshot readings for ids unknown to the catalog are ignored; the catalog
/// defines the component universe for the tick.
pub fn estimate(snapshot: &TelemetrySnapshot, catalog: &Catalog) -> AggregatePowerReading {
    let mut readings = Vec::with_capacity(catalog.components().len());
    let mut total_watts = 0.0;

    for component in catalog.components() {
        let (watts, method, stale) = match snapshot.readings.get(&component.id) {
            Some(TelemetryReading::DirectPower(w)) => (w.max(0.0), Method::Direct, false),
            Some(TelemetryReading::Utilization { percent, .. }) => {
                let tdp = catalog.lookup_tdp(component);
                let floor = catalog.idle_floor(component);
                // Upstream sources may transiently report >100%
                let p = percent.clamp(0.0, 100.0);
                let watts = floor + (tdp - floor) * p / 100.0;
                (watts, Method::Estimated, false)
            }
            None => (0.0, Method::Estimated, true),
        };

        total_watts += watts;
        readings.push(PowerReading {
            component_id: component.id.clone(),
            watts,
            method,
            stale,
            timestamp: snapshot.timestamp,
        });
    }

    AggregatePowerReading {
        timestamp: snapshot.timestamp,
        total_watts,
        readings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Component, ComponentKind};

    fn test_catalog() -> Catalog {
        Catalog::new(vec![
            Component::new("cpu0", ComponentKind::Cpu, "Test CPU"),
            Component::new("gpu0", ComponentKind::Gpu, "Test GPU").with_tdp(200.0),
            Component::new("ram0", ComponentKind::Ram, "Test RAM").with_tdp(10.0),
        ])
    }

    #[test]
    fn test_mixed_snapshot_scenario() {
        // CPU direct 65 W, GPU at 50% of a 200 W TDP with a 20 W idle floor,
        // RAM absent from the snapshot entirely.
        let catalog = test_catalog();
        let mut snapshot = TelemetrySnapshot::new(1_700_000_000);
        snapshot.insert_direct("cpu0", 65.0);
        snapshot.insert_utilization("gpu0", 50.0, "test");

        let result = estimate(&snapshot, &catalog);

        let cpu = result.get("cpu0").unwrap();
        assert_eq!(cpu.watts, 65.0);
        assert_eq!(cpu.method, Method::Direct);
        assert!(!cpu.stale);

        // 20 + (200 - 20) * 0.5 = 110
        let gpu = result.get("gpu0").unwrap();
        assert!((gpu.watts - 110.0).abs() < 1e-9);
        assert_eq!(gpu.method, Method::Estimated);

        let ram = result.get("ram0").unwrap();
        assert_eq!(ram.watts, 0.0);
        assert_eq!(ram.method, Method::Estimated);
        assert!(ram.stale);

        assert!((result.total_watts - 175.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_equals_component_sum() {
        let catalog = test_catalog();
        let mut snapshot = TelemetrySnapshot::new(100);
        snapshot.insert_direct("cpu0", 42.5);
        snapshot.insert_utilization("gpu0", 73.0, "test");
        snapshot.insert_utilization("ram0", 31.0, "test");

        let result = estimate(&snapshot, &catalog);
        let sum: f64 = result.readings.iter().map(|r| r.watts).sum();
        assert!((result.total_watts - sum).abs() < 1e-6);
    }

    #[test]
    fn test_utilization_clamped() {
        let catalog = test_catalog();

        let mut over = TelemetrySnapshot::new(100);
        over.insert_utilization("gpu0", 140.0, "test");
        let mut full = TelemetrySnapshot::new(100);
        full.insert_utilization("gpu0", 100.0, "test");

        let over_watts = estimate(&over, &catalog).get("gpu0").unwrap().watts;
        let full_watts = estimate(&full, &catalog).get("gpu0").unwrap().watts;
        assert_eq!(over_watts, full_watts);
        assert_eq!(full_watts, 200.0);

        let mut negative = TelemetrySnapshot::new(100);
        negative.insert_utilization("gpu0", -5.0, "test");
        let floor_watts = estimate(&negative, &catalog).get("gpu0").unwrap().watts;
        assert_eq!(floor_watts, 20.0);
    }

    #[test]
    fn test_monotonic_in_utilization() {
        let catalog = test_catalog();
        let mut last = f64::NEG_INFINITY;

        for p in (0..=100).step_by(5) {
            let mut snapshot = TelemetrySnapshot::new(100);
            snapshot.insert_utilization("gpu0", p as f64, "test");
            let watts = estimate(&snapshot, &catalog).get("gpu0").unwrap().watts;
            assert!(watts >= last, "watts decreased at p={}", p);
            last = watts;
        }
    }

    #[test]
    fn test_idempotent() {
        let catalog = test_catalog();
        let mut snapshot = TelemetrySnapshot::new(1_700_000_123);
        snapshot.insert_direct("cpu0", 33.3);
        snapshot.insert_utilization("gpu0", 66.6, "test");

        let a = estimate(&snapshot, &catalog);
        let b = estimate(&snapshot, &catalog);

        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(a.total_watts.to_bits(), b.total_watts.to_bits());
        for (ra, rb) in a.readings.iter().zip(b.readings.iter()) {
            assert_eq!(ra.component_id, rb.component_id);
            assert_eq!(ra.watts.to_bits(), rb.watts.to_bits());
            assert_eq!(ra.method, rb.method);
            assert_eq!(ra.stale, rb.stale);
        }
    }

    #[test]
    fn test_negative_direct_reading_clamped() {
        let catalog = test_catalog();
        let mut snapshot = TelemetrySnapshot::new(100);
        snapshot.insert_direct("cpu0", -3.0);

        let result = estimate(&snapshot, &catalog);
        let cpu = result.get("cpu0").unwrap();
        assert_eq!(cpu.watts, 0.0);
        assert_eq!(cpu.method, Method::Direct);
    }

    #[test]
    fn test_unknown_snapshot_ids_ignored() {
        let catalog = test_catalog();
        let mut snapshot = TelemetrySnapshot::new(100);
        snapshot.insert_direct("cpu0", 50.0);
        snapshot.insert_direct("phantom", 999.0);

        let result = estimate(&snapshot, &catalog);
        assert!(result.get("phantom").is_none());
        assert_eq!(result.readings.len(), catalog.components().len());
    }
}
