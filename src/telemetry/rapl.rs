//! Intel RAPL power probe (Linux)
//!
//! Reads the CPU package energy counter from /sys/class/powercap and derives
//! watts from consecutive energy deltas, handling counter wrap-around.

use crate::catalog::Catalog;
use crate::core::{ComponentId, ComponentKind, Error, Result};
use crate::telemetry::PowerProbe;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

pub struct RaplProbe {
    energy_path: PathBuf,
    max_energy: u64,
    last_energy: Mutex<u64>,
    last_time: Mutex<Instant>,
    cpu_id: ComponentId,
}

impl RaplProbe {
    pub fn new(catalog: &Catalog) -> Result<Self> {
        let cpu_id = catalog
            .components()
            .iter()
            .find(|c| c.kind == ComponentKind::Cpu)
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::Telemetry("No CPU component in catalog".to_string()))?;

        let rapl_base = Path::new("/sys/class/powercap/intel-rapl");
        if !rapl_base.exists() {
            return Err(Error::AdapterUnavailable("RAPL not available".to_string()));
        }

        let package_path = rapl_base.join("intel-rapl:0");
        if !package_path.exists() {
            return Err(Error::AdapterUnavailable("RAPL package not found".to_string()));
        }

        let energy_path = package_path.join("energy_uj");
        let initial_energy: u64 = fs::read_to_string(&energy_path)
            .map_err(|_| {
                Error::AdapterUnavailable(
                    "Cannot read RAPL energy (requires elevated permissions)".to_string(),
                )
            })?
            .trim()
            .parse()
            .map_err(|_| Error::Telemetry("Failed to parse energy value".to_string()))?;

        let max_energy: u64 = fs::read_to_string(package_path.join("max_energy_range_uj"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(u64::MAX);

        Ok(Self {
            energy_path,
            max_energy,
            last_energy: Mutex::new(initial_energy),
            last_time: Mutex::new(Instant::now()),
            cpu_id,
        })
    }

    fn read_energy(&self) -> Result<u64> {
        fs::read_to_string(&self.energy_path)?
            .trim()
            .parse()
            .map_err(|_| Error::Telemetry("Failed to parse energy value".to_string()))
    }

    fn power_watts(&self) -> Result<f64> {
        let current_energy = self.read_energy()?;
        let current_time = Instant::now();

        let mut last_energy = self.last_energy.lock().unwrap();
        let mut last_time = self.last_time.lock().unwrap();

        let energy_diff = energy_delta(current_energy, *last_energy, self.max_energy);
        let time_diff = current_time.duration_since(*last_time);
        *last_energy = current_energy;
        *last_time = current_time;

        if time_diff.as_secs_f64() > 0.0 {
            Ok(energy_diff as f64 / time_diff.as_secs_f64() / 1_000_000.0)
        } else {
            Ok(0.0)
        }
    }
}

/// Microjoule delta between two counter readings, accounting for wrap-around
/// at `max_energy`
fn energy_delta(current: u64, last: u64, max_energy: u64) -> u64 {
    if current >= last {
        current - last
    } else {
        (max_energy - last) + current
    }
}

impl PowerProbe for RaplProbe {
    fn name(&self) -> &str {
        "Intel RAPL"
    }

    fn direct_components(&self) -> Vec<ComponentId> {
        vec![self.cpu_id.clone()]
    }

    fn read_watts(&self, component_id: &str) -> Result<f64> {
        if component_id != self.cpu_id {
            return Err(Error::Telemetry(format!(
                "RAPL probe cannot read component {}",
                component_id
            )));
        }
        self.power_watts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_delta_monotonic_counter() {
        assert_eq!(energy_delta(1_500_000, 1_000_000, u64::MAX), 500_000);
    }

    #[test]
    fn test_energy_delta_wraps_around() {
        // Counter wrapped: last near max, current small again
        let max = 262_143_328_850;
        assert_eq!(energy_delta(100, max - 50, max), 150);
    }
}
