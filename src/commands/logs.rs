//! Log window commands.

use chrono::Local;
use herakles_host_diag::config::Config;
use herakles_host_diag::logwindow::{
    collect_forward, collect_reverse, find_system_log, tail, HostLogCollector, LogFormat,
    TimeWindow,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::parse_cli_local_time;
use crate::cli::LogMode;

/// Scan strategy for a format when the user did not pick one.
pub fn effective_mode(mode: LogMode, format: LogFormat) -> LogMode {
    match (mode, format) {
        (LogMode::Auto, LogFormat::Syslog) => LogMode::Host,
        (LogMode::Auto, _) => LogMode::Forward,
        (mode, _) => mode,
    }
}

/// Appends the lines of `[start, end]` from a log to `dest`.
pub fn command_logs(
    source: Option<PathBuf>,
    dest: &Path,
    start: &str,
    end: &str,
    format: LogFormat,
    mode: LogMode,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let window = TimeWindow::new(parse_cli_local_time(start)?, parse_cli_local_time(end)?)?;
    let source = match source {
        Some(path) => path,
        None => find_system_log().ok_or("no system log found in /var/log")?,
    };
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mode = effective_mode(mode, format);
    debug!("Collecting {} with {:?} scan as {:?}", source.display(), mode, format);

    let written = match mode {
        LogMode::Host => HostLogCollector::new(window)
            .with_chunk_size(config.chunk_size())
            .with_logrotate_config(config.logrotate_config())
            .collect(&source, dest)?,
        LogMode::Reverse => collect_reverse(
            &source,
            dest,
            &window,
            Local::now(),
            &format,
            config.chunk_size(),
        )?,
        LogMode::Forward | LogMode::Auto => {
            collect_forward(&source, dest, &window, Local::now(), &format)?
        }
    };

    info!("Collected {} lines from {}", written, source.display());
    println!("✅ {} lines written to: {}", written, dest.display());
    Ok(())
}

/// Prints the last `lines` lines of a file.
pub fn command_tail(file: &Path, lines: usize) -> Result<(), Box<dyn std::error::Error>> {
    for line in tail(file, lines)? {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_mode() {
        assert_eq!(effective_mode(LogMode::Auto, LogFormat::Syslog), LogMode::Host);
        assert_eq!(effective_mode(LogMode::Auto, LogFormat::Runlog), LogMode::Forward);
        assert_eq!(effective_mode(LogMode::Reverse, LogFormat::Syslog), LogMode::Reverse);
    }

    #[test]
    fn test_command_logs_reverse_runlog() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("run.log");
        fs::write(
            &src,
            "2024-03-05 10:00:00.000 a\n2024-03-05 11:00:00.000 b\n2024-03-05 12:00:00.000 c\n",
        )
        .unwrap();
        let dest = dir.path().join("out/run.log");

        command_logs(
            Some(src),
            &dest,
            "2024-03-05 10:30",
            "2024-03-05 12:00",
            LogFormat::Runlog,
            LogMode::Reverse,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "2024-03-05 11:00:00.000 b\n2024-03-05 12:00:00.000 c\n"
        );
    }
}
