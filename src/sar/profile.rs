//! Per-distribution sar column layouts.
//!
//! sysstat changed its report columns between releases, and distributions
//! ship different releases. A [`PlatformProfile`] records, for every
//! [`WorkloadKind`], which column sits at which position of a data line and
//! how to recognise the report's title line. Profiles are static data; pick
//! one with [`profile_for`] and pass it to the parser.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::osinfo::OsFamily;
use crate::workload::WorkloadKind;

/// Every data line starts with `HH:MM:SS AM|PM`.
pub const TIME_PREFIX_FIELDS: usize = 2;

/// Ordered column names following the time prefix of a data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub columns: &'static [&'static str],
}

impl ColumnLayout {
    /// Lines with fewer fields cannot be mapped and are skipped.
    pub fn min_fields(&self) -> usize {
        TIME_PREFIX_FIELDS + self.columns.len()
    }
}

/// How a report title line is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    Contains(&'static str),
    ContainsAll(&'static [&'static str]),
}

impl TitleRule {
    pub fn matches(&self, line: &str) -> bool {
        match self {
            TitleRule::Contains(token) => line.contains(token),
            TitleRule::ContainsAll(tokens) => tokens.iter().all(|t| line.contains(t)),
        }
    }
}

/// Where `real_mem_used` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealMemSource {
    /// `(free + buffers + cached) / (free + used)`
    Derived,
    /// Copy of `%memused`.
    MemUsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricProfile {
    pub kind: WorkloadKind,
    pub layout: ColumnLayout,
    pub title: TitleRule,
}

/// Column layouts, title rules and sysstat locations for one OS family.
#[derive(Debug)]
pub struct PlatformProfile {
    pub family: OsFamily,
    pub metrics: [MetricProfile; 4],
    pub real_mem: RealMemSource,
    /// sysstat configuration file that may override the archive directory.
    pub sysstat_config: &'static str,
    /// Key in `sysstat_config` holding the archive directory.
    pub sar_dir_key: &'static str,
    /// Archive directory when the config does not name one.
    pub default_sar_dir: &'static str,
}

const CPU_TITLE: TitleRule = TitleRule::Contains("CPU");
const NETWORK_TITLE: TitleRule = TitleRule::Contains("IFACE");
const MEMORY_TITLE: TitleRule = TitleRule::Contains("kbmemfree");
const DISK_TITLE: TitleRule = TitleRule::ContainsAll(&["DEV", "tps"]);

// %user %nice %system %iowait %steal %idle
const CPU_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &["cpu", "user", "nice", "system", "iowait", "steal", "idle"],
};

// IFACE rxpck/s txpck/s rxkB/s txkB/s rxcmp/s txcmp/s rxmcst/s
const NETWORK_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "iface", "rxpck", "txpck", "rxkb", "txkb", "rxcmp", "txcmp", "rxmcst",
    ],
};

// IFACE rxpck/s txpck/s rxkB/s txkB/s rxcmp/s txcmp/s rxmcst/s %ifutil
const NETWORK_IFUTIL_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "iface", "rxpck", "txpck", "rxkb", "txkb", "rxcmp", "txcmp", "rxmcst", "ifutil",
    ],
};

// kbmemfree kbmemused %memused kbbuffers kbcached kbcommit %commit kbactive kbinact kbdirty
const MEMORY_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "kbmemfree", "kbmemused", "memused", "kbbuffers", "kbcached", "kbcommit", "commit",
        "kbactive", "kbinact", "kbdirty",
    ],
};

// kbmemfree kbavail kbmemused %memused kbbuffers kbcached kbcommit %commit kbactive kbinact kbdirty
const MEMORY_AVAIL_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "kbmemfree", "kbavail", "kbmemused", "memused", "kbbuffers", "kbcached", "kbcommit",
        "commit", "kbactive", "kbinact", "kbdirty",
    ],
};

// DEV tps rd_sec/s wr_sec/s avgrq-sz avgqu-sz await svctm %util
const DISK_SECTOR_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "dev", "tps", "rd_sec", "wr_sec", "avgrq_sz", "avgqu_sz", "await", "svctm", "util",
    ],
};

// DEV tps rkB/s wkB/s areq-sz aqu-sz await svctm %util
const DISK_KB_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "dev", "tps", "rkb", "wkb", "avgrq_sz", "avgqu_sz", "await", "svctm", "util",
    ],
};

// DEV tps rkB/s wkB/s dkB/s areq-sz aqu-sz await %util
const DISK_DISCARD_COLUMNS: ColumnLayout = ColumnLayout {
    columns: &[
        "dev", "tps", "rkb", "wkb", "dkb", "avgrq_sz", "avgqu_sz", "await", "util",
    ],
};

static BASE_PROFILE: PlatformProfile = PlatformProfile {
    family: OsFamily::Base,
    metrics: [
        MetricProfile {
            kind: WorkloadKind::Cpu,
            layout: CPU_COLUMNS,
            title: CPU_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Network,
            layout: NETWORK_COLUMNS,
            title: NETWORK_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Memory,
            layout: MEMORY_COLUMNS,
            title: MEMORY_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Disk,
            layout: DISK_SECTOR_COLUMNS,
            title: DISK_TITLE,
        },
    ],
    real_mem: RealMemSource::Derived,
    sysstat_config: "/etc/sysconfig/sysstat",
    sar_dir_key: "SAR_DIR",
    default_sar_dir: "/var/log/sa",
};

static UBUNTU_PROFILE: PlatformProfile = PlatformProfile {
    family: OsFamily::Ubuntu,
    metrics: [
        MetricProfile {
            kind: WorkloadKind::Cpu,
            layout: CPU_COLUMNS,
            title: CPU_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Network,
            layout: NETWORK_COLUMNS,
            title: NETWORK_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Memory,
            layout: MEMORY_AVAIL_COLUMNS,
            title: MEMORY_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Disk,
            layout: DISK_KB_COLUMNS,
            title: DISK_TITLE,
        },
    ],
    real_mem: RealMemSource::Derived,
    sysstat_config: "/etc/sysstat/sysstat",
    sar_dir_key: "SA_DIR",
    default_sar_dir: "/var/log/sysstat",
};

static KYLIN_PROFILE: PlatformProfile = PlatformProfile {
    family: OsFamily::Kylin,
    metrics: [
        MetricProfile {
            kind: WorkloadKind::Cpu,
            layout: CPU_COLUMNS,
            title: CPU_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Network,
            layout: NETWORK_IFUTIL_COLUMNS,
            title: NETWORK_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Memory,
            layout: MEMORY_AVAIL_COLUMNS,
            title: MEMORY_TITLE,
        },
        MetricProfile {
            kind: WorkloadKind::Disk,
            layout: DISK_DISCARD_COLUMNS,
            title: DISK_TITLE,
        },
    ],
    real_mem: RealMemSource::MemUsed,
    sysstat_config: "/etc/sysconfig/sysstat",
    sar_dir_key: "SAR_DIR",
    default_sar_dir: "/var/log/sa",
};

/// Returns the static profile for an OS family.
pub fn profile_for(family: OsFamily) -> &'static PlatformProfile {
    match family {
        OsFamily::Base => &BASE_PROFILE,
        OsFamily::Ubuntu => &UBUNTU_PROFILE,
        OsFamily::Kylin => &KYLIN_PROFILE,
    }
}

impl PlatformProfile {
    /// Layout and title rule for a kind; `None` means the kind is not
    /// supported by this profile.
    pub fn metric(&self, kind: WorkloadKind) -> Option<&MetricProfile> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    /// Resolves the sar archive directory: an explicit override, then the
    /// sysstat config, then the profile default.
    pub fn sar_dir(&self, override_dir: Option<&str>) -> PathBuf {
        if let Some(dir) = override_dir.filter(|d| !d.trim().is_empty()) {
            return PathBuf::from(dir);
        }
        self.sar_dir_from_config(Path::new(self.sysstat_config))
    }

    /// Same as [`PlatformProfile::sar_dir`] without override, reading the
    /// given config file instead of the profile's.
    pub fn sar_dir_from_config(&self, config: &Path) -> PathBuf {
        match read_config_value(config, self.sar_dir_key) {
            Some(dir) if !dir.is_empty() => {
                debug!("sar dir {} from {}", dir, config.display());
                PathBuf::from(dir)
            }
            _ => PathBuf::from(self.default_sar_dir),
        }
    }
}

/// Looks up `key` in a shell-style `KEY=value` file. Missing or unreadable
/// files yield `None`.
fn read_config_value(path: &Path, key: &str) -> Option<String> {
    if !path.exists() {
        return None;
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to open {}: {}", path.display(), e);
            return None;
        }
    };

    let mut value = None;
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key {
                // Later assignments win, as when the file is sourced.
                value = Some(v.trim().trim_matches('"').to_string());
            }
        }
    }
    value
}
