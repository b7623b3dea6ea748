//! Mapping of named sar columns onto workload records.

use tracing::{error, warn};

use super::profile::{ColumnLayout, PlatformProfile, RealMemSource, TIME_PREFIX_FIELDS};
use crate::workload::{
    CpuUsage, DiskIo, MemoryUsage, NetworkIo, WorkloadKind, WorkloadMetric, MEMORY_ENTITY,
};

/// Turns the fields of one data line into an entity and its measurement.
pub type Extractor = fn(&PlatformProfile, &ColumnLayout, &[&str]) -> Option<(String, WorkloadMetric)>;

/// A record that can be filled column by column.
trait SarRecord: Default {
    /// Stores one raw column value. Unknown column names are ignored.
    fn assign(&mut self, column: &str, raw: &str) -> Result<(), String>;

    fn entity(&self) -> String;

    fn finish(&mut self, _profile: &PlatformProfile) {}

    fn into_metric(self) -> WorkloadMetric;
}

fn float(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>().map_err(|e| e.to_string())
}

fn int(raw: &str) -> Result<i64, String> {
    raw.parse::<i64>().map_err(|e| e.to_string())
}

impl SarRecord for CpuUsage {
    fn assign(&mut self, column: &str, raw: &str) -> Result<(), String> {
        match column {
            "cpu" => self.cpu = raw.to_string(),
            "user" => self.user = float(raw)?,
            "nice" => self.nice = float(raw)?,
            "system" => self.system = float(raw)?,
            "iowait" => self.iowait = float(raw)?,
            "steal" => self.steal = float(raw)?,
            "idle" => self.idle = float(raw)?,
            _ => {}
        }
        Ok(())
    }

    fn entity(&self) -> String {
        self.cpu.clone()
    }

    fn into_metric(self) -> WorkloadMetric {
        WorkloadMetric::Cpu(self)
    }
}

impl SarRecord for NetworkIo {
    fn assign(&mut self, column: &str, raw: &str) -> Result<(), String> {
        match column {
            "iface" => self.iface = raw.to_string(),
            "rxpck" => self.rxpck = float(raw)?,
            "txpck" => self.txpck = float(raw)?,
            "rxkb" => self.rxkb = float(raw)?,
            "txkb" => self.txkb = float(raw)?,
            "rxcmp" => self.rxcmp = float(raw)?,
            "txcmp" => self.txcmp = float(raw)?,
            "rxmcst" => self.rxmcst = float(raw)?,
            "ifutil" => self.ifutil = float(raw)?,
            _ => {}
        }
        Ok(())
    }

    fn entity(&self) -> String {
        self.iface.clone()
    }

    fn into_metric(self) -> WorkloadMetric {
        WorkloadMetric::Network(self)
    }
}

impl SarRecord for DiskIo {
    fn assign(&mut self, column: &str, raw: &str) -> Result<(), String> {
        match column {
            "dev" => self.dev = raw.to_string(),
            "tps" => self.tps = float(raw)?,
            "rd_sec" => self.rd_sec = float(raw)?,
            "wr_sec" => self.wr_sec = float(raw)?,
            "avgrq_sz" => self.avgrq_sz = float(raw)?,
            "avgqu_sz" => self.avgqu_sz = float(raw)?,
            "await" => self.await_ms = float(raw)?,
            "svctm" => self.svctm = float(raw)?,
            "util" => self.util = float(raw)?,
            "rkb" => self.rkb = float(raw)?,
            "wkb" => self.wkb = float(raw)?,
            "dkb" => self.dkb = float(raw)?,
            _ => {}
        }
        Ok(())
    }

    fn entity(&self) -> String {
        self.dev.clone()
    }

    fn into_metric(self) -> WorkloadMetric {
        WorkloadMetric::Disk(self)
    }
}

impl SarRecord for MemoryUsage {
    fn assign(&mut self, column: &str, raw: &str) -> Result<(), String> {
        match column {
            "kbmemfree" => self.kb_mem_free = int(raw)?,
            "kbavail" => self.kb_avail = int(raw)?,
            "kbmemused" => self.kb_mem_used = int(raw)?,
            "memused" => self.mem_used = float(raw)?,
            "kbbuffers" => self.kb_buffers = int(raw)?,
            "kbcached" => self.kb_cached = int(raw)?,
            "kbcommit" => self.kb_commit = int(raw)?,
            "commit" => self.commit = float(raw)?,
            "kbactive" => self.kb_active = int(raw)?,
            "kbinact" => self.kb_inact = int(raw)?,
            "kbdirty" => self.kb_dirty = int(raw)?,
            _ => {}
        }
        Ok(())
    }

    fn entity(&self) -> String {
        MEMORY_ENTITY.to_string()
    }

    fn finish(&mut self, profile: &PlatformProfile) {
        self.real_mem_used = match profile.real_mem {
            RealMemSource::Derived => self.derived_real_mem_used(),
            RealMemSource::MemUsed => self.mem_used,
        };
    }

    fn into_metric(self) -> WorkloadMetric {
        WorkloadMetric::Memory(self)
    }
}

fn extract<R: SarRecord>(
    profile: &PlatformProfile,
    layout: &ColumnLayout,
    values: &[&str],
) -> Option<(String, WorkloadMetric)> {
    if values.len() < layout.min_fields() {
        warn!("not enough data, skip line: {}", values.join(" "));
        return None;
    }

    let mut record = R::default();
    for (offset, column) in layout.columns.iter().enumerate() {
        let raw = values[TIME_PREFIX_FIELDS + offset];
        if let Err(e) = record.assign(column, raw) {
            // Keep the zero value and carry on with the rest of the line.
            error!("Failed to parse {} value '{}': {}", column, raw, e);
        }
    }
    record.finish(profile);

    Some((record.entity(), record.into_metric()))
}

/// Selects the extraction routine for a kind.
pub fn extractor(kind: WorkloadKind) -> Extractor {
    match kind {
        WorkloadKind::Cpu => extract::<CpuUsage> as Extractor,
        WorkloadKind::Network => extract::<NetworkIo> as Extractor,
        WorkloadKind::Memory => extract::<MemoryUsage> as Extractor,
        WorkloadKind::Disk => extract::<DiskIo> as Extractor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osinfo::OsFamily;
    use crate::sar::profile::profile_for;

    fn run(family: OsFamily, kind: WorkloadKind, line: &str) -> Option<(String, WorkloadMetric)> {
        let profile = profile_for(family);
        let layout = profile.metric(kind).unwrap().layout;
        let values: Vec<&str> = line.split_whitespace().collect();
        extractor(kind)(profile, &layout, &values)
    }

    #[test]
    fn test_extract_network_kylin_ifutil() {
        let (entity, metric) = run(
            OsFamily::Kylin,
            WorkloadKind::Network,
            "10:00:01 AM eth0 12.00 8.00 1.50 0.75 0.00 0.00 0.10 0.02",
        )
        .unwrap();
        assert_eq!(entity, "eth0");
        match metric {
            WorkloadMetric::Network(n) => {
                assert_eq!(n.rxpck, 12.0);
                assert_eq!(n.txkb, 0.75);
                assert_eq!(n.rxmcst, 0.10);
                assert_eq!(n.ifutil, 0.02);
            }
            other => panic!("unexpected metric {:?}", other),
        }
    }

    #[test]
    fn test_extract_disk_ubuntu_kb_columns() {
        let (entity, metric) = run(
            OsFamily::Ubuntu,
            WorkloadKind::Disk,
            "10:00:01 AM dev8-0 3.00 10.00 20.00 10.00 0.01 1.50 0.40 0.12",
        )
        .unwrap();
        assert_eq!(entity, "dev8-0");
        match metric {
            WorkloadMetric::Disk(d) => {
                assert_eq!(d.rkb, 10.0);
                assert_eq!(d.wkb, 20.0);
                assert_eq!(d.rd_sec, 0.0);
                assert_eq!(d.svctm, 0.40);
                assert_eq!(d.util, 0.12);
            }
            other => panic!("unexpected metric {:?}", other),
        }
    }

    #[test]
    fn test_extract_memory_kylin_uses_memused() {
        let (entity, metric) = run(
            OsFamily::Kylin,
            WorkloadKind::Memory,
            "10:00:01 AM 1000 2000 3000 75.00 100 400 5000 60.00 700 800 9",
        )
        .unwrap();
        assert_eq!(entity, MEMORY_ENTITY);
        match metric {
            WorkloadMetric::Memory(m) => {
                assert_eq!(m.kb_avail, 2000);
                assert_eq!(m.kb_mem_used, 3000);
                assert_eq!(m.real_mem_used, 75.0);
                assert_eq!(m.kb_dirty, 9);
            }
            other => panic!("unexpected metric {:?}", other),
        }
    }

    #[test]
    fn test_bad_number_keeps_zero() {
        let (_, metric) = run(
            OsFamily::Base,
            WorkloadKind::Cpu,
            "10:00:01 AM all 1.00 n/a 3.00 4.00 5.00 85.00",
        )
        .unwrap();
        match metric {
            WorkloadMetric::Cpu(c) => {
                assert_eq!(c.user, 1.0);
                assert_eq!(c.nice, 0.0);
                assert_eq!(c.idle, 85.0);
            }
            other => panic!("unexpected metric {:?}", other),
        }
    }

    #[test]
    fn test_short_line_is_rejected() {
        assert!(run(OsFamily::Base, WorkloadKind::Cpu, "10:00:01 AM all 1.00").is_none());
    }
}
