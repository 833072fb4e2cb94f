//! Component catalog - hardware detection and TDP resolution
//!
//! Detects the machine's components once at startup (re-runnable on request)
//! and resolves a nominal TDP plus idle floor for each of them. Resolution
//! never fails: unknown models fall back to conservative per-kind defaults.

use crate::core::{Component, ComponentKind};
use std::collections::HashMap;
use sysinfo::System;

/// Conservative per-kind TDP defaults in watts, used when a model is
/// unrecognized. Values match common desktop hardware.
pub const DEFAULT_CPU_TDP: f64 = 65.0;
pub const DEFAULT_GPU_TDP: f64 = 150.0;
pub const DEFAULT_RAM_STICK_WATTS: f64 = 5.0;
pub const DEFAULT_SSD_WATTS: f64 = 3.0;
pub const DEFAULT_HDD_WATTS: f64 = 7.0;
pub const DEFAULT_MOTHERBOARD_WATTS: f64 = 30.0;
pub const DEFAULT_OTHER_WATTS: f64 = 10.0;

/// Idle floors in watts: the draw a component keeps even at 0% utilization.
/// The motherboard has no meaningful utilization, so its floor equals its
/// TDP and it contributes a constant draw.
const CPU_IDLE_FLOOR: f64 = 10.0;
const GPU_IDLE_FLOOR: f64 = 20.0;
const RAM_IDLE_FLOOR: f64 = 4.0;
const STORAGE_IDLE_FLOOR: f64 = 2.0;

/// Known model substrings and their TDP, checked against the lowercased
/// component name. First match wins; entries are ordered most specific first.
const CPU_TDP_TABLE: &[(&str, f64)] = &[
    ("i9", 125.0),
    ("i7", 95.0),
    ("i5", 65.0),
    ("i3", 58.0),
    ("ryzen 9", 105.0),
    ("ryzen 7", 95.0),
    ("ryzen 5", 65.0),
    ("ryzen 3", 65.0),
    ("threadripper", 280.0),
    ("xeon", 150.0),
    ("epyc", 200.0),
];

const GPU_TDP_TABLE: &[(&str, f64)] = &[
    ("rtx 4090", 450.0),
    ("rtx 4080", 320.0),
    ("rtx 4070", 200.0),
    ("rtx 3090", 350.0),
    ("rtx 3080", 320.0),
    ("rtx 3070", 220.0),
    ("rtx 3060", 170.0),
    ("gtx 1660", 125.0),
    ("gtx 1650", 75.0),
    ("rx 7900", 355.0),
    ("rx 6800", 250.0),
    ("rx 6600", 132.0),
    ("arc a7", 225.0),
];

/// Registry of detected hardware components
#[derive(Debug, Clone)]
pub struct Catalog {
    components: Vec<Component>,
}

impl Catalog {
    /// Build a catalog from an explicit component list
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Detect the machine's components
    ///
    /// Never fails: anything sysinfo cannot report is filled with defaults.
    /// Safe to call again for a re-detection refresh.
    pub fn detect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let mut components = Vec::new();

        components.push(detect_cpu(&sys));
        if let Some(gpu) = detect_gpu() {
            components.push(gpu);
        }
        components.push(detect_ram(&sys));
        components.extend(detect_storage());
        components.push(
            Component::new("motherboard", ComponentKind::Motherboard, "Motherboard")
                .with_tdp(DEFAULT_MOTHERBOARD_WATTS),
        );

        log::info!("Detected {} hardware components", components.len());
        Self { components }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn get(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Resolve the nominal TDP for a component in watts
    ///
    /// Order: the component's own detected TDP, then the built-in model
    /// table, then the per-kind default. Deterministic and total.
    pub fn lookup_tdp(&self, component: &Component) -> f64 {
        if let Some(tdp) = component.tdp_watts {
            return tdp;
        }

        let name = component.name.to_lowercase();
        let table = match component.kind {
            ComponentKind::Cpu => CPU_TDP_TABLE,
            ComponentKind::Gpu => GPU_TDP_TABLE,
            _ => &[],
        };
        for (model, watts) in table {
            if name.contains(model) {
                return *watts;
            }
        }

        match component.kind {
            ComponentKind::Cpu => DEFAULT_CPU_TDP,
            ComponentKind::Gpu => DEFAULT_GPU_TDP,
            ComponentKind::Ram => DEFAULT_RAM_STICK_WATTS * 2.0,
            ComponentKind::Storage => DEFAULT_HDD_WATTS,
            ComponentKind::Motherboard => DEFAULT_MOTHERBOARD_WATTS,
            ComponentKind::Other => DEFAULT_OTHER_WATTS,
        }
    }

    /// Idle floor in watts for a component, capped at its resolved TDP
    pub fn idle_floor(&self, component: &Component) -> f64 {
        let tdp = self.lookup_tdp(component);
        let floor = match component.kind {
            ComponentKind::Cpu => CPU_IDLE_FLOOR,
            ComponentKind::Gpu => GPU_IDLE_FLOOR,
            ComponentKind::Ram => RAM_IDLE_FLOOR,
            ComponentKind::Storage => STORAGE_IDLE_FLOOR,
            ComponentKind::Motherboard => tdp,
            ComponentKind::Other => 0.0,
        };
        floor.min(tdp)
    }
}

fn detect_cpu(sys: &System) -> Component {
    let name = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown CPU".to_string());

    let mut specs = HashMap::new();
    if let Some(cores) = sys.physical_core_count() {
        specs.insert("cores".to_string(), cores.to_string());
    }
    specs.insert("threads".to_string(), sys.cpus().len().to_string());
    if let Some(cpu) = sys.cpus().first() {
        specs.insert("frequency_mhz".to_string(), cpu.frequency().to_string());
    }

    Component {
        id: "cpu0".to_string(),
        kind: ComponentKind::Cpu,
        name,
        tdp_watts: None,
        specs,
    }
}

fn detect_ram(sys: &System) -> Component {
    let total_bytes = sys.total_memory();
    let total_gib = total_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    // Stick count is not exposed by sysinfo; assume 8 GiB sticks
    let sticks = ((total_gib / 8.0).round() as u32).max(1);

    Component::new("ram0", ComponentKind::Ram, "System Memory")
        .with_tdp(DEFAULT_RAM_STICK_WATTS * sticks as f64)
        .with_spec("total_bytes", total_bytes)
        .with_spec("estimated_sticks", sticks)
}

fn detect_storage() -> Vec<Component> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let mut components = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for disk in disks.list() {
        let name = disk.name().to_string_lossy().to_string();
        if !seen.insert(name.clone()) {
            continue;
        }

        let (tdp, media) = match disk.kind() {
            sysinfo::DiskKind::SSD => (DEFAULT_SSD_WATTS, "ssd"),
            sysinfo::DiskKind::HDD => (DEFAULT_HDD_WATTS, "hdd"),
            sysinfo::DiskKind::Unknown(_) => (DEFAULT_HDD_WATTS, "unknown"),
        };

        let id = format!("disk{}", components.len());
        components.push(
            Component::new(&id, ComponentKind::Storage, &name)
                .with_tdp(tdp)
                .with_spec("media", media),
        );
    }

    if components.is_empty() {
        components.push(
            Component::new("disk0", ComponentKind::Storage, "Storage")
                .with_tdp(DEFAULT_HDD_WATTS),
        );
    }

    components
}

/// GPU presence check via DRM on Linux; sysinfo does not report GPUs.
/// On other platforms the GPU only enters the catalog when a power probe
/// or the user supplies it.
fn detect_gpu() -> Option<Component> {
    #[cfg(target_os = "linux")]
    {
        let card = std::path::Path::new("/sys/class/drm/card0/device");
        if card.exists() {
            return Some(Component::new("gpu0", ComponentKind::Gpu, "GPU"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(component: Component) -> (Catalog, Component) {
        let catalog = Catalog::new(vec![component.clone()]);
        (catalog, component)
    }

    #[test]
    fn test_detected_tdp_wins() {
        let (catalog, cpu) =
            catalog_with(Component::new("cpu0", ComponentKind::Cpu, "Core i9-13900K").with_tdp(253.0));
        assert_eq!(catalog.lookup_tdp(&cpu), 253.0);
    }

    #[test]
    fn test_model_table_match() {
        let (catalog, cpu) =
            catalog_with(Component::new("cpu0", ComponentKind::Cpu, "AMD Ryzen 7 5800X"));
        assert_eq!(catalog.lookup_tdp(&cpu), 95.0);

        let (catalog, gpu) =
            catalog_with(Component::new("gpu0", ComponentKind::Gpu, "NVIDIA GeForce RTX 3060"));
        assert_eq!(catalog.lookup_tdp(&gpu), 170.0);
    }

    #[test]
    fn test_unknown_model_falls_back_deterministically() {
        let (catalog, cpu) =
            catalog_with(Component::new("cpu0", ComponentKind::Cpu, "Quantum Core 9000"));
        assert_eq!(catalog.lookup_tdp(&cpu), DEFAULT_CPU_TDP);
        // Same input, same output
        assert_eq!(catalog.lookup_tdp(&cpu), catalog.lookup_tdp(&cpu));

        let (catalog, mb) =
            catalog_with(Component::new("motherboard", ComponentKind::Motherboard, "Board"));
        assert_eq!(catalog.lookup_tdp(&mb), DEFAULT_MOTHERBOARD_WATTS);
    }

    #[test]
    fn test_idle_floor_capped_at_tdp() {
        let (catalog, tiny_gpu) =
            catalog_with(Component::new("gpu0", ComponentKind::Gpu, "Tiny GPU").with_tdp(15.0));
        // Kind floor is 20 W but TDP is only 15 W
        assert_eq!(catalog.idle_floor(&tiny_gpu), 15.0);
    }

    #[test]
    fn test_motherboard_floor_equals_tdp() {
        let (catalog, mb) =
            catalog_with(Component::new("motherboard", ComponentKind::Motherboard, "Board"));
        assert_eq!(catalog.idle_floor(&mb), catalog.lookup_tdp(&mb));
    }
}
