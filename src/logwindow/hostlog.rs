//! Rotation-aware extraction of the host system log.
//!
//! With logrotate's `dateext` option rotated files are named
//! `messages-YYYYMMDD`, so every rotated file can be dated and skipped or
//! scanned forward from the start. Without it the rotated names carry no
//! date and only the live file is read, backwards, anchored at its
//! modification time.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::reverse::{tail, DEFAULT_CHUNK_SIZE};
use super::timeparse::syslog_time;
use super::window::{collect_forward, collect_reverse, TimeWindow};

pub const LOGROTATE_CONFIG: &str = "/etc/logrotate.conf";

/// Candidate system log locations, in lookup order.
pub const SYSTEM_LOG_CANDIDATES: [&str; 2] = ["/var/log/messages", "/var/log/syslog"];

/// Lines read from the end of a rotated file to refine its end time.
const END_TIME_PROBE_LINES: usize = 3;

/// Reports whether a logrotate config enables `dateext`.
pub fn has_dateext(config: &Path) -> Result<bool> {
    let file = File::open(config).with_context(|| format!("Failed to open {}", config.display()))?;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read {}", config.display()))?;
        if line.trim().starts_with("dateext") {
            return Ok(true);
        }
    }
    Ok(false)
}

/// First existing path of `candidates`.
pub fn find_system_log_in<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

pub fn find_system_log() -> Option<PathBuf> {
    find_system_log_in(&SYSTEM_LOG_CANDIDATES)
}

/// Regular files in `dir` whose name starts with `prefix`, sorted by name,
/// with `current` moved to the end.
pub fn rotated_log_files(dir: &Path, prefix: &str, current: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();

    if let Some(pos) = files.iter().position(|f| f == current) {
        let live = files.remove(pos);
        files.push(live);
    }
    Ok(files)
}

/// End time of a rotated file: the `-YYYYMMDD` date in its name, refined by
/// the timestamps of its last few lines.
pub fn rotated_end_time(path: &Path) -> Result<DateTime<Local>, String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = name
        .split('-')
        .nth(1)
        .ok_or_else(|| format!("failed to get log end time from {}", name))?;
    let date = NaiveDate::parse_from_str(stamp, "%Y%m%d")
        .map_err(|e| format!("failed to get date from {}: {}", name, e))?;
    let mut end = Local
        .from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| format!("{} does not exist in the local timezone", date))?;

    match tail(path, END_TIME_PROBE_LINES) {
        Ok(lines) => {
            for line in lines.iter().filter(|l| !l.trim().is_empty()) {
                match syslog_time(end, line) {
                    Ok(t) => end = t,
                    Err(e) => error!("failed to parse time from line: {}, err: {}", line, e),
                }
            }
        }
        Err(e) => error!(
            "failed to read file {} last {} line, err: {}",
            path.display(),
            END_TIME_PROBE_LINES,
            e
        ),
    }
    Ok(end)
}

/// Extracts a time window from a syslog-format host log and its rotations.
#[derive(Debug, Clone)]
pub struct HostLogCollector {
    window: TimeWindow,
    reference: DateTime<Local>,
    chunk_size: usize,
    logrotate_config: PathBuf,
}

impl HostLogCollector {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            reference: Local::now(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            logrotate_config: PathBuf::from(LOGROTATE_CONFIG),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_logrotate_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.logrotate_config = path.into();
        self
    }

    /// Year context for the live log file's timestamps.
    pub fn with_reference(mut self, reference: DateTime<Local>) -> Self {
        self.reference = reference;
        self
    }

    /// Appends the in-window lines of `src` (and its dated rotations) to
    /// `dest`. Returns the number of lines written.
    pub fn collect(&self, src: &Path, dest: &Path) -> Result<usize> {
        let dateext = match has_dateext(&self.logrotate_config) {
            Ok(v) => v,
            Err(e) => {
                warn!("{:#}, assuming rotated logs have no date suffix", e);
                false
            }
        };
        if dateext {
            self.collect_rotated(src, dest)
        } else {
            self.collect_by_mtime(src, dest)
        }
    }

    /// Scans the dated rotations of `src` oldest first, then `src` itself.
    /// Rotations that end before the window are skipped; per-file failures
    /// are logged and the next file is tried.
    pub fn collect_rotated(&self, src: &Path, dest: &Path) -> Result<usize> {
        let dir = src
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let prefix = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut written = 0;
        for file in rotated_log_files(dir, &prefix, src)? {
            debug!("try to collect {}", file.display());
            let reference = if file == src {
                self.reference
            } else {
                match rotated_end_time(&file) {
                    Ok(end) if end < self.window.start => {
                        info!(
                            "skip to collect log {}, log file end date: {}, collect start date {}",
                            file.display(),
                            end,
                            self.window.start
                        );
                        continue;
                    }
                    Ok(end) => end,
                    Err(e) => {
                        error!("{}, skip", e);
                        continue;
                    }
                }
            };

            match collect_forward(&file, dest, &self.window, reference, &syslog_time) {
                Ok(n) => written += n,
                Err(e) => error!("failed to collect from: {}, err: {:#}", file.display(), e),
            }
        }
        Ok(written)
    }

    /// Reads `src` backwards, using its modification time as the year
    /// context. A file last written before the window is skipped.
    pub fn collect_by_mtime(&self, src: &Path, dest: &Path) -> Result<usize> {
        let modified = fs::metadata(src)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", src.display()))?;
        let modified: DateTime<Local> = modified.into();
        if modified < self.window.start {
            info!("log {} last modify time is {}, skip", src.display(), modified);
            return Ok(0);
        }
        collect_reverse(src, dest, &self.window, modified, &syslog_time, self.chunk_size)
    }
}
