//! Raw counters from the /proc filesystem.
//!
//! This module reads the cumulative counters the fallback sampler turns into
//! sar-like records: CPU times from `stat`, memory sizes from `meminfo`,
//! interface counters from `net/dev` and block device counters from
//! `diskstats`. Every reader takes the proc root so tests can point it at a
//! fixture tree.

use ahash::AHashMap as HashMap;
use std::fs;
use std::path::Path;

/// Cumulative CPU time in clock ticks for one `cpu` line of /proc/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (all fields).
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq + self.steal
    }
}

/// Memory sizes from /proc/meminfo, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub committed_as: u64,
    pub active: u64,
    pub inactive: u64,
    pub dirty: u64,
}

/// Cumulative counters of one interface from /proc/net/dev.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetDevCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errs: u64,
    pub rx_drop: u64,
    pub rx_compressed: u64,
    pub rx_multicast: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errs: u64,
    pub tx_drop: u64,
    pub tx_compressed: u64,
}

/// Cumulative counters of one block device from /proc/diskstats.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskCounters {
    pub reads: u64,
    pub read_sectors: u64,
    pub read_ticks: u64,
    pub writes: u64,
    pub write_sectors: u64,
    pub write_ticks: u64,
    pub io_ticks: u64,
    pub weighted_ticks: u64,
    /// Only present on kernels with discard accounting (4.18+).
    pub discard_sectors: u64,
}

fn read_proc_file(root: &Path, name: &str) -> Result<String, String> {
    let path = root.join(name);
    fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn field(parts: &[&str], idx: usize) -> u64 {
    parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// Reads CPU statistics from `<root>/stat`.
///
/// "cpu" represents total across all cores, "cpu0", "cpu1", etc. are
/// individual cores.
pub fn read_cpu_stats(root: &Path) -> Result<HashMap<String, CpuStat>, String> {
    parse_cpu_stats(&read_proc_file(root, "stat")?)
}

pub fn parse_cpu_stats(content: &str) -> Result<HashMap<String, CpuStat>, String> {
    let mut stats = HashMap::new();

    for line in content.lines() {
        if !line.starts_with("cpu") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        stats.insert(
            parts[0].to_string(),
            CpuStat {
                user: field(&parts, 1),
                nice: field(&parts, 2),
                system: field(&parts, 3),
                idle: field(&parts, 4),
                iowait: field(&parts, 5),
                irq: field(&parts, 6),
                softirq: field(&parts, 7),
                steal: field(&parts, 8),
            },
        );
    }

    if stats.is_empty() {
        return Err("No CPU statistics found in stat".to_string());
    }

    Ok(stats)
}

/// Reads memory sizes from `<root>/meminfo`.
pub fn read_meminfo(root: &Path) -> Result<MemInfo, String> {
    parse_meminfo(&read_proc_file(root, "meminfo")?)
}

/// Parses meminfo content. `MemTotal` is required; other keys default to 0.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, String> {
    let mut info = MemInfo::default();
    let mut has_total = false;

    for line in content.lines() {
        // Format: "MemTotal:       16384000 kB"
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let Ok(kb) = parts[1].parse::<u64>() else {
            continue;
        };
        match parts[0] {
            "MemTotal:" => {
                info.mem_total = kb;
                has_total = true;
            }
            "MemFree:" => info.mem_free = kb,
            "MemAvailable:" => info.mem_available = kb,
            "Buffers:" => info.buffers = kb,
            "Cached:" => info.cached = kb,
            "SwapTotal:" => info.swap_total = kb,
            "Committed_AS:" => info.committed_as = kb,
            "Active:" => info.active = kb,
            "Inactive:" => info.inactive = kb,
            "Dirty:" => info.dirty = kb,
            _ => {}
        }
    }

    if !has_total {
        return Err("Failed to parse MemTotal from meminfo".to_string());
    }
    Ok(info)
}

/// Reads interface counters from `<root>/net/dev`.
pub fn read_net_dev(root: &Path) -> Result<HashMap<String, NetDevCounters>, String> {
    Ok(parse_net_dev(&read_proc_file(root, "net/dev")?))
}

/// Parses net/dev content, skipping the two header lines.
pub fn parse_net_dev(content: &str) -> HashMap<String, NetDevCounters> {
    let mut result = HashMap::new();

    for line in content.lines().skip(2) {
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() < 16 {
            continue;
        }

        result.insert(
            name.trim().to_string(),
            NetDevCounters {
                rx_bytes: field(&parts, 0),
                rx_packets: field(&parts, 1),
                rx_errs: field(&parts, 2),
                rx_drop: field(&parts, 3),
                rx_compressed: field(&parts, 6),
                rx_multicast: field(&parts, 7),
                tx_bytes: field(&parts, 8),
                tx_packets: field(&parts, 9),
                tx_errs: field(&parts, 10),
                tx_drop: field(&parts, 11),
                tx_compressed: field(&parts, 15),
            },
        );
    }

    result
}

/// Reads block device counters from a diskstats file.
pub fn read_diskstats(path: &Path) -> Result<HashMap<String, DiskCounters>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(parse_diskstats(&content))
}

/// Parses diskstats content keyed by device name.
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskCounters> {
    let mut result = HashMap::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }

        result.insert(
            parts[2].to_string(),
            DiskCounters {
                reads: field(&parts, 3),
                read_sectors: field(&parts, 5),
                read_ticks: field(&parts, 6),
                writes: field(&parts, 7),
                write_sectors: field(&parts, 9),
                write_ticks: field(&parts, 10),
                io_ticks: field(&parts, 12),
                weighted_ticks: field(&parts, 13),
                discard_sectors: field(&parts, 16),
            },
        );
    }

    result
}
