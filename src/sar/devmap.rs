//! Resolution of sar's `devMAJOR-MINOR` disk identifiers to device names.

use ahash::AHashMap as HashMap;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, warn};

use crate::workload::{WorkloadMetric, WorkloadTable};

pub const DISK_STATS_PATH: &str = "/proc/diskstats";

/// `devMAJOR-MINOR` key to kernel device name.
#[derive(Debug, Clone, Default)]
pub struct DeviceNumberMap {
    names: HashMap<String, String>,
}

impl DeviceNumberMap {
    /// Builds the map from `/proc/diskstats`-formatted text. Lines with
    /// fewer than three fields are skipped.
    pub fn parse(content: &str) -> Self {
        let mut names = HashMap::new();
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }
            if parts.len() < 3 {
                warn!("invalid line: {}, skip it", parts.join(" "));
                continue;
            }
            names.insert(device_key(parts[0], parts[1]), parts[2].to_string());
        }
        Self { names }
    }

    /// Reads and parses a diskstats file. A read failure is fatal for disk
    /// collection.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "failed to transfer dev number to dev name, cannot read {}",
                path.display()
            )
        })?;
        Ok(Self::parse(&content))
    }

    pub fn name(&self, key: &str) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    fn is_device_name(&self, name: &str) -> bool {
        self.names.values().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rewrites every disk entity of `table` from device number to device
    /// name, dropping entries that cannot be resolved.
    ///
    /// Entities that already carry a known device name (`sar -p`) are kept.
    pub fn resolve_table(&self, table: &mut WorkloadTable) {
        table.remap_entities(|entity, metric| {
            let WorkloadMetric::Disk(mut disk) = metric else {
                error!("invalid data type for disk entity {}, skip it", entity);
                return None;
            };
            let name = match self.name(&entity) {
                Some(name) => name.to_string(),
                None if self.is_device_name(&entity) => entity,
                None => {
                    warn!("can not find dev name by dev number: {}, skip it", entity);
                    return None;
                }
            };
            disk.dev = name.clone();
            Some((name, WorkloadMetric::Disk(disk)))
        });
    }
}

/// Formats the identifier sar prints for a block device.
pub fn device_key(major: &str, minor: &str) -> String {
    format!("dev{}-{}", major, minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{CpuUsage, DiskIo};

    const DISKSTATS: &str = "\
   8       0 sda 1234 0 56789 100 5678 0 98765 200 0 150 300 0 0 0 0

   8       1 sda1 1000 0 50000 80 5000 0 90000 180 0 130 260 0 0 0 0
 259       0 nvme0n1 9999 0 123456 500 8888 0 654321 400 5 1000 2000 0 0 0 0
 7 0
";

    fn disk(dev: &str, tps: f64) -> WorkloadMetric {
        WorkloadMetric::Disk(DiskIo {
            dev: dev.to_string(),
            tps,
            ..Default::default()
        })
    }

    #[test]
    fn test_parse_diskstats_keys() {
        let map = DeviceNumberMap::parse(DISKSTATS);
        assert_eq!(map.len(), 3);
        assert_eq!(map.name("dev8-0"), Some("sda"));
        assert_eq!(map.name("dev8-1"), Some("sda1"));
        assert_eq!(map.name("dev259-0"), Some("nvme0n1"));
        assert_eq!(map.name("dev7-0"), None);
    }

    #[test]
    fn test_resolve_table_renames_and_drops() {
        let map = DeviceNumberMap::parse(DISKSTATS);
        let mut table = WorkloadTable::new();
        table.insert(100, "dev8-0", disk("dev8-0", 1.0));
        table.insert(100, "dev253-9", disk("dev253-9", 2.0));
        table.insert(100, "nvme0n1", disk("nvme0n1", 3.0));
        table.insert(100, "all", WorkloadMetric::Cpu(CpuUsage::default()));

        map.resolve_table(&mut table);

        let item = table.get(100).unwrap();
        assert_eq!(item.len(), 2);
        assert_eq!(item.get("sda"), Some(&disk("sda", 1.0)));
        assert_eq!(item.get("nvme0n1"), Some(&disk("nvme0n1", 3.0)));
        assert!(item.keys().all(|k| !k.starts_with("dev")));
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeviceNumberMap::read(&dir.path().join("diskstats")).unwrap_err();
        assert!(err.to_string().contains("dev number"));
    }
}
