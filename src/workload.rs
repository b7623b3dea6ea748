//! Workload records shared by the sar parser and the procfs fallback sampler.
//!
//! Both collectors produce a [`WorkloadTable`]: a mapping from a UTC epoch
//! second to the per-entity measurements taken at that instant. Entities are
//! CPU names, interface names, device names, or the fixed [`MEMORY_ENTITY`]
//! key for memory usage.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity key used for the single memory record per timestamp.
pub const MEMORY_ENTITY: &str = "mem";

/// The four resource kinds a workload collector can sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Cpu,
    Network,
    Memory,
    Disk,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Cpu,
        WorkloadKind::Network,
        WorkloadKind::Memory,
        WorkloadKind::Disk,
    ];

    /// Arguments selecting this report from `sar`.
    pub fn sar_args(&self) -> &'static [&'static str] {
        match self {
            WorkloadKind::Cpu => &["-u"],
            WorkloadKind::Disk => &["-d"],
            WorkloadKind::Memory => &["-r"],
            WorkloadKind::Network => &["-n", "DEV"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Cpu => "cpu",
            WorkloadKind::Network => "network",
            WorkloadKind::Memory => "memory",
            WorkloadKind::Disk => "disk",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(WorkloadKind::Cpu),
            "network" | "net" => Ok(WorkloadKind::Network),
            "memory" | "mem" => Ok(WorkloadKind::Memory),
            "disk" => Ok(WorkloadKind::Disk),
            other => Err(format!("unknown workload kind '{}'", other)),
        }
    }
}

/// CPU utilisation percentages (`sar -u`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub cpu: String,
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub iowait: f64,
    pub steal: f64,
    pub idle: f64,
}

/// Per-interface network rates (`sar -n DEV`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub iface: String,
    pub rxpck: f64,
    pub txpck: f64,
    pub rxkb: f64,
    pub txkb: f64,
    pub rxcmp: f64,
    pub txcmp: f64,
    pub rxmcst: f64,
    /// %ifutil, only reported by newer sysstat.
    pub ifutil: f64,
    // Error and drop rates are only available from procfs counters.
    pub errin: f64,
    pub errout: f64,
    pub dropin: f64,
    pub dropout: f64,
}

/// Per-device block IO statistics (`sar -d`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskIo {
    pub dev: String,
    pub tps: f64,
    /// Sectors read per second (older sysstat).
    pub rd_sec: f64,
    /// Sectors written per second (older sysstat).
    pub wr_sec: f64,
    pub avgrq_sz: f64,
    pub avgqu_sz: f64,
    pub await_ms: f64,
    pub svctm: f64,
    pub util: f64,
    pub rkb: f64,
    pub wkb: f64,
    pub dkb: f64,
}

/// System memory usage (`sar -r`). Sizes are in KiB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub kb_mem_free: i64,
    pub kb_avail: i64,
    pub kb_mem_used: i64,
    pub mem_used: f64,
    pub kb_buffers: i64,
    pub kb_cached: i64,
    pub kb_commit: i64,
    pub commit: f64,
    pub kb_active: i64,
    pub kb_inact: i64,
    pub kb_dirty: i64,
    pub real_mem_used: f64,
}

impl MemoryUsage {
    /// Ratio of reclaimable-or-free memory to total memory:
    /// `(free + buffers + cached) / (free + used)`.
    ///
    /// The result is a fraction, not a percentage like `mem_used`.
    pub fn derived_real_mem_used(&self) -> f64 {
        let total = self.kb_mem_free + self.kb_mem_used;
        if total == 0 {
            return 0.0;
        }
        (self.kb_mem_free + self.kb_buffers + self.kb_cached) as f64 / total as f64
    }
}

/// One measurement payload; the variant matches the [`WorkloadKind`] sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkloadMetric {
    Cpu(CpuUsage),
    Network(NetworkIo),
    Disk(DiskIo),
    Memory(MemoryUsage),
}


/// Entity name to measurement, for one timestamp.
pub type WorkloadItem = HashMap<String, WorkloadMetric>;

/// Timestamp (UTC epoch seconds) to entity measurements.
///
/// Iteration order is unspecified; use [`WorkloadTable::sorted_timestamps`]
/// when chronological order matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadTable {
    samples: HashMap<i64, WorkloadItem>,
}

impl WorkloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a measurement, replacing any earlier one for the same
    /// timestamp and entity.
    pub fn insert(&mut self, timestamp: i64, entity: impl Into<String>, metric: WorkloadMetric) {
        self.samples
            .entry(timestamp)
            .or_default()
            .insert(entity.into(), metric);
    }

    pub fn get(&self, timestamp: i64) -> Option<&WorkloadItem> {
        self.samples.get(&timestamp)
    }

    pub fn sample(&self, timestamp: i64, entity: &str) -> Option<&WorkloadMetric> {
        self.samples.get(&timestamp)?.get(entity)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &WorkloadItem)> {
        self.samples.iter()
    }

    pub fn sorted_timestamps(&self) -> Vec<i64> {
        let mut ts: Vec<i64> = self.samples.keys().copied().collect();
        ts.sort_unstable();
        ts
    }

    /// Moves every timestamp of `other` into `self`; entries of `other` win.
    pub fn merge(&mut self, other: WorkloadTable) {
        for (ts, item) in other.samples {
            self.samples.insert(ts, item);
        }
    }

    /// Rebuilds every entity map through `f`, which may rename or drop
    /// entries. Timestamps left without entities are kept.
    pub fn remap_entities<F>(&mut self, mut f: F)
    where
        F: FnMut(String, WorkloadMetric) -> Option<(String, WorkloadMetric)>,
    {
        for item in self.samples.values_mut() {
            let old = std::mem::take(item);
            for (entity, metric) in old {
                if let Some((name, metric)) = f(entity, metric) {
                    item.insert(name, metric);
                }
            }
        }
    }
}
