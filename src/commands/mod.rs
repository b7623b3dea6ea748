//! CLI command implementations for herakles-host-diag.
//!
//! This module provides implementations for all CLI subcommands:
//! - `workload`, `history`, `parse-sar`: workload tables
//! - `logs`, `tail`: log window extraction
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `generate-testdata`: synthetic sar output

pub mod check;
pub mod config;
pub mod generate;
pub mod logs;
pub mod workload;

// Re-export command functions
pub use check::command_check;
pub use config::{command_config, show_config};
pub use generate::command_generate_testdata;
pub use logs::{command_logs, command_tail};
pub use workload::{command_history, command_parse_sar, command_workload};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use herakles_host_diag::config::Config;
use herakles_host_diag::osinfo::{read_os_release, OsFamily};
use herakles_host_diag::sar::profile::{profile_for, PlatformProfile};
use serde::Serialize;
use tracing::warn;

use crate::cli::OutputFormat;

/// Picks the sar column profile for this host from os-release.
pub fn detect_profile(config: &Config) -> &'static PlatformProfile {
    match read_os_release(&config.os_release_path()) {
        Ok(release) => profile_for(release.family()),
        Err(e) => {
            warn!("{:#}, using base sar layout", e);
            profile_for(OsFamily::Base)
        }
    }
}

/// Parses `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD`.
pub fn parse_cli_time(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| format!("invalid time '{}', expected YYYY-MM-DD HH:MM[:SS]", s))
}

pub fn parse_cli_local_time(s: &str) -> Result<DateTime<Local>, String> {
    let naive = parse_cli_time(s)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{} does not exist in the local timezone", naive))
}

pub fn print_output<T: Serialize>(
    value: &T,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{output}");
    Ok(())
}
