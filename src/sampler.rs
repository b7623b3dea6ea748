//! Workload sampling from procfs counters when `sar` is unavailable.
//!
//! CPU and memory are sampled as point-in-time snapshots. Network and disk
//! counters are cumulative, so one extra baseline snapshot is taken and each
//! following snapshot is turned into per-second rates against its
//! predecessor. Entities that only appear in the newer snapshot are skipped.

use ahash::AHashMap as HashMap;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::sar::devmap::DISK_STATS_PATH;
use crate::system::{self, CpuStat, DiskCounters, MemInfo, NetDevCounters};
use crate::workload::{
    CpuUsage, DiskIo, MemoryUsage, NetworkIo, WorkloadKind, WorkloadMetric, WorkloadTable,
    MEMORY_ENTITY,
};

/// Entity name sar uses for the all-CPU aggregate.
pub const CPU_AGGREGATE: &str = "all";

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Provider of cumulative system counters.
pub trait CounterSource {
    fn cpu_times(&self) -> Result<HashMap<String, CpuStat>>;
    fn memory(&self) -> Result<MemInfo>;
    fn net_counters(&self) -> Result<HashMap<String, NetDevCounters>>;
    fn disk_counters(&self) -> Result<HashMap<String, DiskCounters>>;
}

/// Reads counters from a proc filesystem tree.
#[derive(Debug, Clone)]
pub struct ProcSource {
    root: PathBuf,
    diskstats: PathBuf,
}

impl ProcSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let diskstats = root.join("diskstats");
        Self { root, diskstats }
    }

    pub fn with_diskstats(mut self, path: impl Into<PathBuf>) -> Self {
        self.diskstats = path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for ProcSource {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT).with_diskstats(DISK_STATS_PATH)
    }
}

impl CounterSource for ProcSource {
    fn cpu_times(&self) -> Result<HashMap<String, CpuStat>> {
        system::read_cpu_stats(&self.root).map_err(anyhow::Error::msg)
    }

    fn memory(&self) -> Result<MemInfo> {
        system::read_meminfo(&self.root).map_err(anyhow::Error::msg)
    }

    fn net_counters(&self) -> Result<HashMap<String, NetDevCounters>> {
        system::read_net_dev(&self.root).map_err(anyhow::Error::msg)
    }

    fn disk_counters(&self) -> Result<HashMap<String, DiskCounters>> {
        system::read_diskstats(&self.diskstats).map_err(anyhow::Error::msg)
    }
}

/// Wall clock and sleeping, swappable in tests.
pub trait Clock {
    /// Current UTC epoch second.
    fn now(&self) -> i64;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub struct FallbackSampler<S, C = SystemClock> {
    source: S,
    clock: C,
}

impl FallbackSampler<ProcSource, SystemClock> {
    /// Sampler over the given proc root and diskstats file.
    pub fn from_proc(root: impl Into<PathBuf>, diskstats: impl Into<PathBuf>) -> Self {
        Self::new(ProcSource::new(root).with_diskstats(diskstats), SystemClock)
    }
}

impl<S: CounterSource, C: Clock> FallbackSampler<S, C> {
    pub fn new(source: S, clock: C) -> Self {
        Self { source, clock }
    }

    /// Takes `count` samples `interval` seconds apart.
    pub fn collect(&self, kind: WorkloadKind, interval: u64, count: u64) -> Result<WorkloadTable> {
        if interval == 0 {
            bail!("sampling interval must be greater than 0");
        }
        if count == 0 {
            bail!("sample count must be greater than 0");
        }
        debug!("Sampling {} from procfs: interval={}s count={}", kind, interval, count);

        match kind {
            WorkloadKind::Cpu => self.snapshots(interval, count, |s| {
                Ok(s.cpu_times()?
                    .into_iter()
                    .map(|(name, stat)| {
                        let entity = cpu_entity(&name);
                        let usage = cpu_usage(&entity, &stat);
                        (entity, WorkloadMetric::Cpu(usage))
                    })
                    .collect())
            }),
            WorkloadKind::Memory => self.snapshots(interval, count, |s| {
                let usage = memory_usage(&s.memory()?);
                Ok(vec![(MEMORY_ENTITY.to_string(), WorkloadMetric::Memory(usage))])
            }),
            WorkloadKind::Network => self.rates(
                interval,
                count,
                |s| s.net_counters(),
                |iface, old, new, secs| WorkloadMetric::Network(net_rates(iface, old, new, secs)),
            ),
            WorkloadKind::Disk => self.rates(
                interval,
                count,
                |s| s.disk_counters(),
                |dev, old, new, secs| WorkloadMetric::Disk(disk_rates(dev, old, new, secs)),
            ),
        }
    }

    fn snapshots<F>(&self, interval: u64, count: u64, take: F) -> Result<WorkloadTable>
    where
        F: Fn(&S) -> Result<Vec<(String, WorkloadMetric)>>,
    {
        let mut table = WorkloadTable::new();
        for i in 0..count {
            if i > 0 {
                self.clock.sleep(Duration::from_secs(interval));
            }
            let timestamp = self.clock.now();
            for (entity, metric) in take(&self.source)? {
                table.insert(timestamp, entity, metric);
            }
        }
        Ok(table)
    }

    fn rates<T, R, D>(&self, interval: u64, count: u64, read: R, delta: D) -> Result<WorkloadTable>
    where
        R: Fn(&S) -> Result<HashMap<String, T>>,
        D: Fn(&str, &T, &T, f64) -> WorkloadMetric,
    {
        let secs = interval as f64;
        let mut table = WorkloadTable::new();
        let mut previous = read(&self.source)?;

        for _ in 0..count {
            self.clock.sleep(Duration::from_secs(interval));
            let current = read(&self.source)?;
            let timestamp = self.clock.now();
            for (entity, new) in &current {
                match previous.get(entity) {
                    Some(old) => table.insert(timestamp, entity.clone(), delta(entity, old, new, secs)),
                    None => warn!("{} missing from previous sample, skip it", entity),
                }
            }
            previous = current;
        }
        Ok(table)
    }
}

fn cpu_entity(name: &str) -> String {
    if name == "cpu" {
        CPU_AGGREGATE.to_string()
    } else {
        name.to_string()
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}

/// Share of CPU time since boot, in percent.
pub fn cpu_usage(entity: &str, stat: &CpuStat) -> CpuUsage {
    let total = stat.total();
    CpuUsage {
        cpu: entity.to_string(),
        user: percent(stat.user, total),
        nice: percent(stat.nice, total),
        system: percent(stat.system, total),
        iowait: percent(stat.iowait, total),
        steal: percent(stat.steal, total),
        idle: percent(stat.idle, total),
    }
}

pub fn memory_usage(info: &MemInfo) -> MemoryUsage {
    let used = info.mem_total.saturating_sub(info.mem_free);
    let mut usage = MemoryUsage {
        kb_mem_free: info.mem_free as i64,
        kb_avail: info.mem_available as i64,
        kb_mem_used: used as i64,
        mem_used: percent(used, info.mem_total),
        kb_buffers: info.buffers as i64,
        kb_cached: info.cached as i64,
        kb_commit: info.committed_as as i64,
        commit: percent(info.committed_as, info.mem_total + info.swap_total),
        kb_active: info.active as i64,
        kb_inact: info.inactive as i64,
        kb_dirty: info.dirty as i64,
        real_mem_used: 0.0,
    };
    usage.real_mem_used = usage.derived_real_mem_used();
    usage
}

fn per_sec(old: u64, new: u64, secs: f64) -> f64 {
    new.saturating_sub(old) as f64 / secs
}

pub fn net_rates(iface: &str, old: &NetDevCounters, new: &NetDevCounters, secs: f64) -> NetworkIo {
    NetworkIo {
        iface: iface.to_string(),
        rxpck: per_sec(old.rx_packets, new.rx_packets, secs),
        txpck: per_sec(old.tx_packets, new.tx_packets, secs),
        rxkb: per_sec(old.rx_bytes, new.rx_bytes, secs) / 1024.0,
        txkb: per_sec(old.tx_bytes, new.tx_bytes, secs) / 1024.0,
        rxcmp: per_sec(old.rx_compressed, new.rx_compressed, secs),
        txcmp: per_sec(old.tx_compressed, new.tx_compressed, secs),
        rxmcst: per_sec(old.rx_multicast, new.rx_multicast, secs),
        ifutil: 0.0,
        errin: per_sec(old.rx_errs, new.rx_errs, secs),
        errout: per_sec(old.tx_errs, new.tx_errs, secs),
        dropin: per_sec(old.rx_drop, new.rx_drop, secs),
        dropout: per_sec(old.tx_drop, new.tx_drop, secs),
    }
}

/// sar -d style statistics over one interval. Sectors are 512 bytes.
pub fn disk_rates(dev: &str, old: &DiskCounters, new: &DiskCounters, secs: f64) -> DiskIo {
    let ios = (new.reads + new.writes).saturating_sub(old.reads + old.writes) as f64;
    let rd_sectors = new.read_sectors.saturating_sub(old.read_sectors) as f64;
    let wr_sectors = new.write_sectors.saturating_sub(old.write_sectors) as f64;
    let ticks = (new.read_ticks + new.write_ticks).saturating_sub(old.read_ticks + old.write_ticks) as f64;
    let io_ticks = new.io_ticks.saturating_sub(old.io_ticks) as f64;
    let per_io = |v: f64| if ios > 0.0 { v / ios } else { 0.0 };

    DiskIo {
        dev: dev.to_string(),
        tps: ios / secs,
        rd_sec: rd_sectors / secs,
        wr_sec: wr_sectors / secs,
        avgrq_sz: per_io(rd_sectors + wr_sectors),
        avgqu_sz: per_sec(old.weighted_ticks, new.weighted_ticks, secs) / 1000.0,
        await_ms: per_io(ticks),
        svctm: per_io(io_ticks),
        util: (io_ticks / (secs * 10.0)).min(100.0),
        rkb: rd_sectors / 2.0 / secs,
        wkb: wr_sectors / 2.0 / secs,
        dkb: per_sec(old.discard_sectors, new.discard_sectors, secs) / 2.0,
    }
}
