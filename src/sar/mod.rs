//! Parsing of `sar` text reports into [`WorkloadTable`]s.
//!
//! A sar report is a sequence of sections, each starting with a banner line
//! (`Linux 3.10.0 (host) 08/10/2023 _x86_64_ (4 CPU)`) followed by a title
//! line, data lines and an `Average:` summary. Data lines start with a
//! 12-hour clock time; the banner supplies the date. The column layout of the
//! data lines depends on the sysstat release, see [`profile`].

pub mod devmap;
pub mod history;
pub mod profile;
mod record;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, warn};

use crate::workload::{WorkloadKind, WorkloadTable};
use devmap::{DeviceNumberMap, DISK_STATS_PATH};
use profile::PlatformProfile;

pub use history::{history_args, HistoryResult};

pub const LINUX_PREFIX: &str = "Linux";
pub const AVERAGE_PREFIX: &str = "Average";
pub const DAY_PERIOD_AM: &str = "AM";
pub const DAY_PERIOD_PM: &str = "PM";
pub const DEFAULT_SAR_BINARY: &str = "sar";

/// Locale forcing 12-hour times and `MM/DD/YYYY` banner dates.
const SAR_ENVS: [(&str, &str); 2] = [("LANG", "en_US.UTF-8"), ("LC_TIME", "en_US.UTF-8")];

/// Parses a sar report, anchoring times to today's local date until a
/// banner line names another date.
pub fn parse_output(raw: &str, kind: WorkloadKind, profile: &PlatformProfile) -> WorkloadTable {
    parse_output_on(raw, kind, profile, Local::now().date_naive())
}

/// Parses a sar report with an explicit default date.
///
/// Banner, blank, `Average` and title lines are skipped. Data lines that
/// cannot be mapped are logged and dropped; the rest of the report is still
/// parsed. Disk entities are left as sar printed them, see
/// [`DeviceNumberMap::resolve_table`].
pub fn parse_output_on(
    raw: &str,
    kind: WorkloadKind,
    profile: &PlatformProfile,
    default_date: NaiveDate,
) -> WorkloadTable {
    let mut table = WorkloadTable::new();
    let Some(metric) = profile.metric(kind) else {
        warn!("no sar layout for {} in {:?} profile", kind, profile.family);
        return table;
    };
    let extract = record::extractor(kind);

    let mut date = default_date;
    let output = raw.replace("\n\n", "\n");
    for raw_line in output.split('\n') {
        let values: Vec<&str> = raw_line.split_whitespace().collect();
        let line = values.join(" ");

        if line.starts_with(LINUX_PREFIX) {
            match header_date(&values) {
                Some(d) => date = d,
                None => error!("invalid head line: {}, could not get date from the line", line),
            }
            continue;
        }
        if line.is_empty() || line.starts_with(AVERAGE_PREFIX) || metric.title.matches(&line) {
            continue;
        }
        if values.len() < 2 {
            warn!("not enough data, skip line: {}", line);
            continue;
        }

        let timestamp = match sar_timestamp(date, values[0], values[1]) {
            Ok(ts) => ts,
            Err(e) => {
                error!("skip line: {}, err: {}", line, e);
                continue;
            }
        };
        if let Some((entity, sample)) = extract(profile, &metric.layout, &values) {
            table.insert(timestamp, entity, sample);
        }
    }

    table
}

/// Extracts the date from the fourth field of a banner line.
///
/// sar prints `MM/DD/YYYY` (or `MM/DD/YY`) under the en_US locale and
/// `YYYY-MM-DD` under others.
fn header_date(values: &[&str]) -> Option<NaiveDate> {
    let field = values.get(3)?;
    if let Ok(date) = NaiveDate::parse_from_str(field, "%Y-%m-%d") {
        return Some(date);
    }

    let parts: Vec<&str> = field.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    if parts[2].len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Combines a date with a sar clock time (`11:52:42` + `AM`/`PM`) in the
/// local timezone and returns UTC epoch seconds.
pub fn sar_timestamp(date: NaiveDate, time: &str, day_period: &str) -> Result<i64, String> {
    let parsed = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .map_err(|e| format!("invalid time '{}': {}", time, e))?;

    let hour = match (day_period, parsed.hour()) {
        (DAY_PERIOD_PM, h) if h < 12 => h + 12,
        (DAY_PERIOD_AM, 12) => 0,
        (_, h) => h,
    };
    let parsed = parsed
        .with_hour(hour)
        .ok_or_else(|| format!("invalid hour {} in '{}'", hour, time))?;

    Local
        .from_local_datetime(&date.and_time(parsed))
        .earliest()
        .map(|t| t.timestamp())
        .ok_or_else(|| format!("{} {} does not exist in the local timezone", date, time))
}

/// Runs `sar` and parses its output with a fixed platform profile.
#[derive(Debug, Clone)]
pub struct Sar {
    binary: PathBuf,
    diskstats: PathBuf,
    profile: &'static PlatformProfile,
}

impl Sar {
    pub fn new(profile: &'static PlatformProfile) -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_SAR_BINARY),
            diskstats: PathBuf::from(DISK_STATS_PATH),
            profile,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_diskstats(mut self, path: impl Into<PathBuf>) -> Self {
        self.diskstats = path.into();
        self
    }

    pub fn profile(&self) -> &'static PlatformProfile {
        self.profile
    }

    /// Runs `sar <kind flags> <args>` and parses stdout.
    ///
    /// A failing command is an error carrying its stderr.
    pub fn collect<S: AsRef<str>>(&self, kind: WorkloadKind, args: &[S]) -> Result<WorkloadTable> {
        if self.profile.metric(kind).is_none() {
            bail!("unsupported workload kind {} for {:?}", kind, self.profile.family);
        }

        let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
        debug!("running {} {:?} {:?}", self.binary.display(), kind.sar_args(), args);

        let output = Command::new(&self.binary)
            .args(kind.sar_args())
            .args(&args)
            .envs(SAR_ENVS)
            .output()
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse(kind, &stdout)
    }

    /// Samples the current workload: `count` reports `interval` seconds apart.
    pub fn collect_current(
        &self,
        kind: WorkloadKind,
        interval: u64,
        count: u64,
    ) -> Result<WorkloadTable> {
        self.collect(kind, &[interval.to_string(), count.to_string()])
    }

    /// Parses captured sar output; disk reports get device names resolved.
    pub fn parse(&self, kind: WorkloadKind, raw: &str) -> Result<WorkloadTable> {
        let mut table = parse_output(raw, kind, self.profile);
        if kind == WorkloadKind::Disk {
            let map = DeviceNumberMap::read(&self.diskstats)?;
            map.resolve_table(&mut table);
        }
        Ok(table)
    }

    pub fn is_available(&self) -> bool {
        find_in_path(&self.binary).is_some()
    }
}

/// Locates an executable the way a shell would, honouring `PATH` for bare
/// names.
pub fn find_in_path(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return binary.is_file().then(|| binary.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osinfo::OsFamily;
    use crate::workload::{WorkloadMetric, MEMORY_ENTITY};
    use profile::profile_for;
    use std::fs;

    fn local_epoch(date: &str, time: &str) -> i64 {
        let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let t = NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap();
        Local
            .from_local_datetime(&d.and_time(t))
            .earliest()
            .unwrap()
            .timestamp()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    const CPU_REPORT: &str = "\
Linux 3.10.0-1160.el7.x86_64 (mg_4) \t08/10/2023 \t_x86_64_\t(4 CPU)

12:00:01 AM     CPU     %user     %nice   %system   %iowait    %steal     %idle
12:10:01 AM     all      1.25      0.00      0.62      0.05      0.00     98.08
12:20:01 AM     all      1.30      0.00      0.60      0.04      0.00     98.06

01:00:01 PM     all      5.00      0.10      2.00      1.00      0.00     91.90
Average:        all      2.52      0.03      1.07      0.36      0.00     96.02
";

    #[test]
    fn test_cpu_report_one_timestamp_per_data_line() {
        let profile = profile_for(OsFamily::Base);
        let table = parse_output_on(CPU_REPORT, WorkloadKind::Cpu, profile, day("2000-01-01"));
        assert_eq!(table.len(), 3);

        let ts = local_epoch("2023-08-10", "00:10:01");
        match table.sample(ts, "all") {
            Some(WorkloadMetric::Cpu(c)) => {
                assert_eq!(c.user, 1.25);
                assert_eq!(c.idle, 98.08);
            }
            other => panic!("unexpected sample {:?}", other),
        }
        assert!(table.get(local_epoch("2023-08-10", "13:00:01")).is_some());
    }

    #[test]
    fn test_single_pm_line_round_trip() {
        let profile = profile_for(OsFamily::Base);
        let table = parse_output_on(
            "02:00:01 PM all 1.00 2.00 3.00 4.00 5.00 85.00",
            WorkloadKind::Cpu,
            profile,
            day("2024-01-10"),
        );
        assert_eq!(table.len(), 1);
        let ts = local_epoch("2024-01-10", "14:00:01");
        match table.sample(ts, "all") {
            Some(WorkloadMetric::Cpu(c)) => {
                assert_eq!(c.idle, 85.0);
                assert_eq!(c.steal, 5.0);
            }
            other => panic!("unexpected sample {:?}", other),
        }
    }

    #[test]
    fn test_twelve_oclock_periods() {
        let d = day("2024-01-10");
        assert_eq!(
            sar_timestamp(d, "12:30:00", "PM").unwrap(),
            local_epoch("2024-01-10", "12:30:00")
        );
        assert_eq!(
            sar_timestamp(d, "12:30:00", "AM").unwrap(),
            local_epoch("2024-01-10", "00:30:00")
        );
        assert!(sar_timestamp(d, "not-a-time", "AM").is_err());
    }

    #[test]
    fn test_short_and_garbage_lines_do_not_disturb_others() {
        let raw = "\
02:00:01 PM all 1.00 2.00
x
02:10:01 PM all 1.00 2.00 3.00 4.00 5.00 85.00
garbage line here
";
        let profile = profile_for(OsFamily::Base);
        let table = parse_output_on(raw, WorkloadKind::Cpu, profile, day("2024-01-10"));
        assert_eq!(table.len(), 1);
        assert!(table.get(local_epoch("2024-01-10", "14:10:01")).is_some());
    }

    #[test]
    fn test_banner_updates_rolling_date() {
        let raw = "\
Linux 5.15.0 (db01) 01/31/24 _x86_64_ (8 CPU)
11:50:01 PM all 1.00 0.00 1.00 0.00 0.00 98.00
Linux 5.15.0 (db01) 2024-02-01 _x86_64_ (8 CPU)
12:00:01 AM all 2.00 0.00 1.00 0.00 0.00 97.00
Linux broken banner
12:10:01 AM all 3.00 0.00 1.00 0.00 0.00 96.00
";
        let profile = profile_for(OsFamily::Base);
        let table = parse_output_on(raw, WorkloadKind::Cpu, profile, day("2000-01-01"));
        assert_eq!(
            table.sorted_timestamps(),
            vec![
                local_epoch("2024-01-31", "23:50:01"),
                local_epoch("2024-02-01", "00:00:01"),
                local_epoch("2024-02-01", "00:10:01"),
            ]
        );
    }

    #[test]
    fn test_memory_report_base_profile() {
        let raw = "\
Linux 3.10.0 (mg_4) 08/10/2023 _x86_64_ (4 CPU)

10:00:01 AM kbmemfree kbmemused  %memused kbbuffers  kbcached  kbcommit   %commit  kbactive   kbinact   kbdirty
10:10:01 AM    100000    300000     75.00     50000     50000    200000     40.00    150000     80000        12
Average:       100000    300000     75.00     50000     50000    200000     40.00    150000     80000        12
";
        let profile = profile_for(OsFamily::Base);
        let table = parse_output_on(raw, WorkloadKind::Memory, profile, day("2000-01-01"));
        let ts = local_epoch("2023-08-10", "10:10:01");
        match table.sample(ts, MEMORY_ENTITY) {
            Some(WorkloadMetric::Memory(m)) => {
                assert_eq!(m.kb_mem_free, 100000);
                assert_eq!(m.kb_commit, 200000);
                assert_eq!(m.commit, 40.0);
                assert!((m.real_mem_used - 0.5).abs() < 1e-9);
            }
            other => panic!("unexpected sample {:?}", other),
        }
    }

    #[test]
    fn test_network_report_multiple_interfaces() {
        let raw = "\
10:00:01 AM     IFACE   rxpck/s   txpck/s    rxkB/s    txkB/s   rxcmp/s   txcmp/s  rxmcst/s
10:10:01 AM        lo      2.00      2.00      0.10      0.10      0.00      0.00      0.00
10:10:01 AM      eth0     15.00     10.00      1.20      0.80      0.00      0.00      0.05
";
        let profile = profile_for(OsFamily::Base);
        let table = parse_output_on(raw, WorkloadKind::Network, profile, day("2024-03-01"));
        assert_eq!(table.len(), 1);
        let item = table.get(local_epoch("2024-03-01", "10:10:01")).unwrap();
        assert_eq!(item.len(), 2);
        assert!(item.contains_key("lo"));
        assert!(item.contains_key("eth0"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let profile = profile_for(OsFamily::Base);
        let a = parse_output_on(CPU_REPORT, WorkloadKind::Cpu, profile, day("2000-01-01"));
        let b = parse_output_on(CPU_REPORT, WorkloadKind::Cpu, profile, day("2000-01-01"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_disk_parse_resolves_device_names() {
        let dir = tempfile::tempdir().unwrap();
        let diskstats = dir.path().join("diskstats");
        fs::write(&diskstats, "   8       0 sda 1 0 2 3 4 0 5 6 0 7 8\n").unwrap();

        let raw = "\
10:00:01 AM       DEV       tps  rd_sec/s  wr_sec/s  avgrq-sz  avgqu-sz     await     svctm     %util
10:10:01 AM    dev8-0      4.00      8.00     16.00      6.00      0.01      2.50      0.50      0.20
10:10:01 AM  dev253-0      1.00      0.00      8.00      8.00      0.00      1.00      1.00      0.10
";
        let sar = Sar::new(profile_for(OsFamily::Base)).with_diskstats(&diskstats);
        let table = sar.parse(WorkloadKind::Disk, raw).unwrap();
        assert_eq!(table.len(), 1);
        let (_, item) = table.iter().next().unwrap();
        assert_eq!(item.len(), 1);
        match item.get("sda") {
            Some(WorkloadMetric::Disk(d)) => {
                assert_eq!(d.dev, "sda");
                assert_eq!(d.wr_sec, 16.0);
                assert_eq!(d.await_ms, 2.5);
            }
            other => panic!("unexpected sample {:?}", other),
        }
    }

    #[test]
    fn test_disk_parse_without_diskstats_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sar = Sar::new(profile_for(OsFamily::Base)).with_diskstats(dir.path().join("none"));
        assert!(sar.parse(WorkloadKind::Disk, "").is_err());
        assert!(sar.parse(WorkloadKind::Cpu, "").unwrap().is_empty());
    }

    #[test]
    fn test_collect_reports_failing_command() {
        let sar = Sar::new(profile_for(OsFamily::Base)).with_binary("false");
        assert!(sar.collect_current(WorkloadKind::Cpu, 1, 1).is_err());

        let missing = Sar::new(profile_for(OsFamily::Base))
            .with_binary("/nonexistent/herakles/sar");
        assert!(missing.collect_current(WorkloadKind::Cpu, 1, 1).is_err());
        assert!(!missing.is_available());
    }

    #[test]
    fn test_find_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        fs::write(&tool, "").unwrap();
        assert_eq!(find_in_path(&tool), Some(tool.clone()));
        assert_eq!(find_in_path(&dir.path().join("missing")), None);
    }
}
