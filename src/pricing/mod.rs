//! Electricity cost calculation
//!
//! Pure arithmetic over energy totals and a user-supplied flat rate, plus
//! projections extrapolated from recorded history.

use crate::core::Result;
use crate::history::HistoryStore;
use serde::{Deserialize, Serialize};

/// Projected costs at the observed consumption level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostProjection {
    pub daily: f64,
    pub monthly: f64,
}

/// Cost of the given energy at the given rate
///
/// `energy_wh / 1000 * rate_per_kwh`
pub fn cost(energy_wh: f64, rate_per_kwh: f64) -> f64 {
    energy_wh / 1000.0 * rate_per_kwh
}

/// Project daily and monthly cost from recorded history
///
/// Uses the rolling last 24 hours ending at `now` (not the calendar day):
/// the daily estimate is the cost of the energy recorded in that window,
/// and the monthly estimate extrapolates it over 30 days. A machine that
/// ran for only part of the window is projected from what it actually
/// consumed, so partial uptime lowers the estimate rather than skewing it.
pub fn project(store: &HistoryStore, rate_per_kwh: f64, now: i64) -> Result<CostProjection> {
    let energy_wh = store.energy_since(now - 24 * 3600)?;
    let daily = cost(energy_wh, rate_per_kwh);

    Ok(CostProjection {
        daily,
        monthly: daily * 30.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AggregatePowerReading;

    #[test]
    fn test_cost_round_trip() {
        // 1 kWh at 0.20/kWh costs exactly 0.20
        assert!((cost(1000.0, 0.20) - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_zero_energy_costs_nothing() {
        assert_eq!(cost(0.0, 0.20), 0.0);
        assert_eq!(cost(0.0, 123.45), 0.0);
    }

    #[test]
    fn test_projection_from_last_24h() {
        let mut store = HistoryStore::open_in_memory(3600).unwrap();
        let now = 1_700_100_000;

        // Outside the window: must not count
        store
            .append(&AggregatePowerReading {
                timestamp: now - 30 * 3600,
                total_watts: 500.0,
                readings: Vec::new(),
            })
            .unwrap();

        // Inside the window: two records adding up to 2000 Wh
        for (offset, watts) in [(10 * 3600, 100.0), (5 * 3600, 200.0)] {
            store
                .append(&AggregatePowerReading {
                    timestamp: now - offset,
                    total_watts: watts,
                    readings: Vec::new(),
                })
                .unwrap();
        }

        // (now-30h) -> (now-10h): 20h at 100 W = 2000 Wh
        // (now-10h) -> (now-5h):   5h at 200 W = 1000 Wh
        let projection = project(&store, 0.10, now).unwrap();
        assert!((projection.daily - cost(3000.0, 0.10)).abs() < 1e-9);
        assert!((projection.monthly - projection.daily * 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_with_empty_history() {
        let store = HistoryStore::open_in_memory(5).unwrap();
        let projection = project(&store, 0.20, 1_700_000_000).unwrap();
        assert_eq!(projection.daily, 0.0);
        assert_eq!(projection.monthly, 0.0);
    }
}
