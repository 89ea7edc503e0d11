//! Thermal zone sampler
//!
//! Zones are discovered once in the coordinator, before any fork; workers
//! inherit the ordered list and only read the `temp` files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use stressng_core::thermal::parse_temperature;
use stressng_core::constants::MAX_THERMAL_ZONES;
use stressng_core::{order_zones, ThermalZone, WorkerStats};
use tracing::debug;

use crate::report::{ReportLine, StressorRun};

pub const SYSFS_THERMAL: &str = "/sys/class/thermal";

#[derive(Debug, Clone, Default)]
pub struct ThermalSampler {
    zones: Vec<ThermalZone>,
}

impl ThermalSampler {
    /// Discover zones under `/sys/class/thermal`
    pub fn discover() -> Self {
        Self::discover_in(SYSFS_THERMAL)
    }

    /// Discover `thermal_zone*` directories that have a readable `type`
    ///
    /// A missing root yields an empty sampler.
    pub fn discover_in(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("no thermal zones at {}: {}", root.display(), e);
                return Self::default();
            }
        };

        let discovered: Vec<(PathBuf, String)> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("thermal_zone"))
            .filter_map(|e| {
                let path = e.path();
                let type_name = fs::read_to_string(path.join("type")).ok()?;
                Some((path, type_name.trim().to_string()))
            })
            .collect();

        let zones = order_zones(discovered);
        debug!("discovered {} thermal zones", zones.len());
        Self { zones }
    }

    /// Adopt an already ordered zone list
    ///
    /// Zones whose index does not fit the stats block are dropped.
    pub fn from_zones(zones: Vec<ThermalZone>) -> Self {
        let (zones, dropped): (Vec<_>, Vec<_>) =
            zones.into_iter().partition(|z| z.index < MAX_THERMAL_ZONES);
        for zone in &dropped {
            debug!("ignoring thermal zone {} at index {}", zone.type_name, zone.index);
        }
        Self { zones }
    }

    pub fn zones(&self) -> &[ThermalZone] {
        &self.zones
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Millidegrees C, or 0 when unreadable or bogus
    fn read_temp(zone: &ThermalZone) -> u64 {
        fs::read_to_string(zone.path.join("temp"))
            .ok()
            .and_then(|t| parse_temperature(&t))
            .unwrap_or(0)
    }

    pub fn record_start(&self, stats: &WorkerStats) {
        for zone in &self.zones {
            let Some(stat) = stats.thermal.get(zone.index) else { continue };
            let temp = Self::read_temp(zone);
            stat.temp_start.store(temp, Ordering::Relaxed);
            stat.temp_stop.store(temp, Ordering::Relaxed);
        }
    }

    pub fn record_stop(&self, stats: &WorkerStats) {
        for zone in &self.zones {
            let Some(stat) = stats.thermal.get(zone.index) else { continue };
            stat.temp_stop.store(Self::read_temp(zone), Ordering::Relaxed);
        }
    }

    /// Mean stop temperature per zone over instances that got a reading
    pub fn dump_report(&self, runs: &[StressorRun<'_>]) -> Vec<ReportLine> {
        let mut lines = Vec::new();
        for run in runs.iter().filter(|r| r.did_run()) {
            for zone in &self.zones {
                let (total, count) = run
                    .ran()
                    .filter_map(|s| s.thermal.get(zone.index).map(|t| t.stop()))
                    .filter(|&t| t > 0)
                    .fold((0u64, 0u64), |(t, c), v| (t + v, c + 1));
                if count == 0 {
                    continue;
                }
                let celsius = total as f64 / count as f64 / 1000.0;
                lines.push(ReportLine {
                    stressor: run.name.to_string(),
                    text: format!("{:.2} C ({})", celsius, zone.type_name),
                    yaml_key: zone.yaml_key(),
                    yaml_value: format!("{:.2}", celsius),
                });
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stressng_core::ExitStatus;
    use tempfile::TempDir;

    fn add_zone(root: &Path, n: u32, ty: &str, temp: &str) {
        let dir = root.join(format!("thermal_zone{}", n));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), format!("{}\n", ty)).unwrap();
        fs::write(dir.join("temp"), format!("{}\n", temp)).unwrap();
    }

    fn sysfs() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        add_zone(dir.path(), 0, "x86_pkg_temp", "48000");
        add_zone(dir.path(), 1, "acpitz", "30000");
        add_zone(dir.path(), 2, "acpitz", "999999");
        fs::create_dir_all(dir.path().join("cooling_device0")).unwrap();
        dir
    }

    #[test]
    fn test_discover_sorted() {
        let dir = sysfs();
        let sampler = ThermalSampler::discover_in(dir.path());
        let types: Vec<_> = sampler.zones().iter().map(|z| z.type_name.as_str()).collect();
        assert_eq!(types, ["acpitz", "acpitz", "x86_pkg_temp"]);
        let indices: Vec<_> = sampler.zones().iter().map(|z| z.index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn test_discover_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ThermalSampler::discover_in(dir.path().join("nope")).is_empty());
    }

    #[test]
    fn test_from_zones_out_of_range_index() {
        let dir = sysfs();
        let zone = |n: u32, index: usize| ThermalZone {
            path: dir.path().join(format!("thermal_zone{}", n)),
            type_name: "acpitz".to_string(),
            type_instance: n,
            index,
        };
        let sampler = ThermalSampler::from_zones(vec![zone(1, 0), zone(2, MAX_THERMAL_ZONES + 9)]);
        assert_eq!(sampler.zones().len(), 1);

        let stats = WorkerStats::new();
        sampler.record_start(&stats);
        sampler.record_stop(&stats);
        stats.finish(ExitStatus::Success, 1);
        assert_eq!(stats.thermal[0].stop(), 30000);
        assert_eq!(sampler.dump_report(&[StressorRun::new("cpu", std::slice::from_ref(&stats))]).len(), 1);

        // Zones built by hand skip the bounds filter; recording still must not panic
        let unchecked = ThermalSampler { zones: vec![zone(1, MAX_THERMAL_ZONES)] };
        unchecked.record_start(&stats);
        unchecked.record_stop(&stats);
        assert!(unchecked.dump_report(&[StressorRun::new("cpu", std::slice::from_ref(&stats))]).is_empty());
    }

    #[test]
    fn test_record_and_report() {
        let dir = sysfs();
        let sampler = ThermalSampler::discover_in(dir.path());
        let stats: Vec<WorkerStats> = (0..2).map(|_| WorkerStats::new()).collect();
        for s in &stats {
            sampler.record_start(s);
            s.finish(ExitStatus::Success, 1);
        }
        add_zone(dir.path(), 0, "x86_pkg_temp", "52000");
        sampler.record_stop(&stats[0]);

        let pkg = sampler.zones().iter().find(|z| z.type_name == "x86_pkg_temp").unwrap();
        assert_eq!(stats[0].thermal[pkg.index].start(), 48000);
        assert_eq!(stats[0].thermal[pkg.index].stop(), 52000);
        assert_eq!(stats[1].thermal[pkg.index].stop(), 48000);

        let lines = sampler.dump_report(&[StressorRun::new("cpu", &stats)]);
        let yaml: Vec<String> = lines.iter().map(ReportLine::yaml).collect();
        // The bogus acpitz reading never makes it into the report
        assert_eq!(yaml.len(), 2);
        assert!(yaml[0].starts_with("acpitz_") && yaml[0].ends_with(": 30.00"));
        assert_eq!(yaml[1], "x86_pkg_temp_0: 50.00");
    }
}
