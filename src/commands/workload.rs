//! Workload commands: current sampling, sar history and offline parsing.

use chrono::{Local, NaiveDate};
use herakles_host_diag::config::{Config, DEFAULT_SCRAPE_INTERVAL, DEFAULT_SCRAPE_TIMES};
use herakles_host_diag::osinfo::OsFamily;
use herakles_host_diag::sampler::FallbackSampler;
use herakles_host_diag::sar::devmap::DeviceNumberMap;
use herakles_host_diag::sar::profile::profile_for;
use herakles_host_diag::sar::{parse_output_on, Sar};
use herakles_host_diag::workload::{WorkloadKind, WorkloadTable};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{detect_profile, parse_cli_time, print_output};
use crate::cli::OutputFormat;

fn selected_kinds(kind: Option<WorkloadKind>) -> Vec<WorkloadKind> {
    match kind {
        Some(k) => vec![k],
        None => WorkloadKind::ALL.to_vec(),
    }
}

fn configured_sar(config: &Config) -> Sar {
    Sar::new(detect_profile(config))
        .with_binary(config.sar_binary())
        .with_diskstats(config.diskstats_path())
}

/// Samples the current workload of every selected kind concurrently.
///
/// sar is used when enabled and installed; otherwise, or when a sar run
/// fails, the procfs sampler takes over.
pub fn command_workload(
    kind: Option<WorkloadKind>,
    interval: Option<u64>,
    count: Option<u64>,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let interval = interval
        .or(config.scrape_interval)
        .unwrap_or(DEFAULT_SCRAPE_INTERVAL);
    let count = count.or(config.scrape_times).unwrap_or(DEFAULT_SCRAPE_TIMES);

    let sar = configured_sar(config);
    let use_sar = config.use_sar.unwrap_or(true) && sar.is_available();
    if !use_sar {
        info!("sar not used, sampling {}", config.proc_root().display());
    }
    let sampler = FallbackSampler::from_proc(config.proc_root(), config.diskstats_path());

    let results: Vec<(WorkloadKind, anyhow::Result<WorkloadTable>)> = selected_kinds(kind)
        .into_par_iter()
        .map(|kind| {
            if use_sar {
                match sar.collect_current(kind, interval, count) {
                    Ok(table) => return (kind, Ok(table)),
                    Err(e) => warn!("sar failed for {}: {:#}, sampling /proc instead", kind, e),
                }
            }
            (kind, sampler.collect(kind, interval, count))
        })
        .collect();

    let mut output = BTreeMap::new();
    for (kind, result) in results {
        output.insert(kind.as_str(), result?);
    }
    print_output(&output, format)
}

/// Reads sar archives for `[start, end]`.
pub fn command_history(
    kind: Option<WorkloadKind>,
    start: &str,
    end: &str,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = parse_cli_time(start)?;
    let end = parse_cli_time(end)?;
    if start > end {
        return Err(format!("start {} is after end {}", start, end).into());
    }

    let sar = configured_sar(config);
    let sar_dir = sar.profile().sar_dir(config.sar_dir.as_deref());
    debug!("Reading sar archives from {}", sar_dir.display());

    let mut output = BTreeMap::new();
    for kind in selected_kinds(kind) {
        let result = sar.collect_history(kind, start, end, &sar_dir);
        if !result.errors.is_empty() {
            warn!(
                "{} of the {} archives could not be read",
                result.errors.len(),
                kind
            );
        }
        output.insert(kind.as_str(), result.table);
    }
    print_output(&output, format)
}

/// Parses sar output captured elsewhere.
pub fn command_parse_sar(
    kind: WorkloadKind,
    input: &Path,
    os: Option<OsFamily>,
    date: Option<&str>,
    diskstats: Option<PathBuf>,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(input)?
    };

    let profile = match os {
        Some(family) => profile_for(family),
        None => detect_profile(config),
    };
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{}': {}", d, e))?,
        None => Local::now().date_naive(),
    };

    let mut table = parse_output_on(&raw, kind, profile, date);
    if kind == WorkloadKind::Disk {
        let path = diskstats.unwrap_or_else(|| config.diskstats_path());
        DeviceNumberMap::read(&path)?.resolve_table(&mut table);
    }
    info!("Parsed {} timestamps of {} data", table.len(), kind);
    print_output(&table, format)
}
