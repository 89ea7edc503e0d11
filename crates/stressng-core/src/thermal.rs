//! Thermal zone model and ordering
//!
//! Zones are discovered in directory order, which is arbitrary. Each zone
//! gets a `type_instance` (how many zones of the same type were seen before
//! it), then the list is sorted by `(type_name, type_instance)` so `index`
//! is stable across runs and can address the fixed `thermal` array in every
//! worker's stats block.

use std::collections::HashMap;
use std::path::PathBuf;
use crate::constants::{MAX_THERMAL_ZONES, THERMAL_BOGUS_MILLI_C};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalZone {
    /// Zone directory (holds `type` and `temp`)
    pub path: PathBuf,
    /// Zone type, e.g. "x86_pkg_temp"
    pub type_name: String,
    /// Nth zone of this type in discovery order
    pub type_instance: u32,
    /// Position in sorted order; index into `WorkerStats::thermal`
    pub index: usize,
}

impl ThermalZone {
    /// Machine-readable key, unique per zone
    pub fn yaml_key(&self) -> String {
        format!(
            "{}_{}",
            self.type_name.to_lowercase().replace(' ', "_"),
            self.type_instance
        )
    }
}

/// Order discovered `(path, type)` pairs and assign instances and indices
///
/// Zones beyond `MAX_THERMAL_ZONES` (after sorting) are dropped.
pub fn order_zones(discovered: Vec<(PathBuf, String)>) -> Vec<ThermalZone> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut zones: Vec<ThermalZone> = discovered
        .into_iter()
        .map(|(path, type_name)| {
            let instance = seen.entry(type_name.clone()).or_insert(0);
            let type_instance = *instance;
            *instance += 1;
            ThermalZone { path, type_name, type_instance, index: 0 }
        })
        .collect();

    zones.sort_by(|a, b| {
        a.type_name
            .cmp(&b.type_name)
            .then(a.type_instance.cmp(&b.type_instance))
    });
    zones.truncate(MAX_THERMAL_ZONES);
    for (index, zone) in zones.iter_mut().enumerate() {
        zone.index = index;
    }
    zones
}

/// Parse a sysfs `temp` file (millidegrees C)
///
/// Negative, unparsable and implausibly hot readings become `None`.
pub fn parse_temperature(text: &str) -> Option<u64> {
    let milli: u64 = text.trim().parse().ok()?;
    (milli <= THERMAL_BOGUS_MILLI_C).then_some(milli)
}
