//! Extraction of the lines of a log that fall inside a time window.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::reverse::ReverseLineReader;

/// Inclusive `[start, end]` interval in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Local>, end: DateTime<Local>) -> Result<Self> {
        if start > end {
            bail!("invalid time window: start {} is after end {}", start, end);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, t: DateTime<Local>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Extracts the timestamp of a log line.
///
/// `reference` supplies context the line may lack, typically the year.
pub trait LineTimeParser {
    fn parse_time(&self, reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String>;
}

impl<F> LineTimeParser for F
where
    F: Fn(DateTime<Local>, &str) -> Result<DateTime<Local>, String>,
{
    fn parse_time(&self, reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String> {
        self(reference, line)
    }
}

impl LineTimeParser for super::timeparse::LogFormat {
    fn parse_time(&self, reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String> {
        self.parse(reference, line)
    }
}

/// Collapses runs of whitespace so column-aligned lines parse uniformly.
fn normalize(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn open_append(dest: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dest)
        .with_context(|| format!("Failed to open {}", dest.display()))?;
    Ok(BufWriter::new(file))
}

/// Writes a line's original bytes followed by `\n`.
fn write_line<W: Write>(out: &mut W, raw: &[u8]) -> std::io::Result<()> {
    out.write_all(raw)?;
    out.write_all(b"\n")
}

/// Appends the in-window lines of `src` to `dest`, scanning from the end.
///
/// Lines newer than the window are skipped and the scan stops at the first
/// line older than it, so only the tail of a large log is read. Matching
/// lines are staged in a temporary file next to `dest` and reversed back into
/// file order on the way out. Returns the number of lines written.
pub fn collect_reverse<P: LineTimeParser + ?Sized>(
    src: &Path,
    dest: &Path,
    window: &TimeWindow,
    reference: DateTime<Local>,
    parser: &P,
    chunk_size: usize,
) -> Result<usize> {
    let staging_dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staging = NamedTempFile::new_in(staging_dir)
        .with_context(|| format!("Failed to create temp file in {}", staging_dir.display()))?;

    let mut reader = ReverseLineReader::with_chunk_size(src, chunk_size)
        .with_context(|| format!("Failed to open {}", src.display()))?;
    {
        let mut writer = BufWriter::new(staging.as_file());
        while let Some(raw) = reader
            .read_previous_line_bytes()
            .with_context(|| format!("Failed to read {}", src.display()))?
        {
            let text = String::from_utf8_lossy(&raw);
            let t = match parser.parse_time(reference, &normalize(&text)) {
                Ok(t) => t,
                Err(e) => {
                    warn!("skip line: {}, err: {}", text, e);
                    continue;
                }
            };
            if t > window.end {
                continue;
            }
            if t < window.start {
                break;
            }
            write_line(&mut writer, &raw)?;
        }
        writer.flush()?;
    }

    let mut staged = ReverseLineReader::with_chunk_size(staging.path(), chunk_size)
        .with_context(|| format!("Failed to open {}", staging.path().display()))?;
    let mut out = open_append(dest)?;
    let mut written = 0;
    while let Some(raw) = staged.read_previous_line_bytes()? {
        write_line(&mut out, &raw)?;
        written += 1;
    }
    out.flush()?;

    debug!("wrote {} lines of {} to {}", written, src.display(), dest.display());
    Ok(written)
}

/// Appends the in-window lines of `src` to `dest`, scanning from the start.
///
/// Lines before the window are skipped and the scan stops at the first line
/// after it. Blank and unparseable lines are skipped. Returns the number of
/// lines written.
pub fn collect_forward<P: LineTimeParser + ?Sized>(
    src: &Path,
    dest: &Path,
    window: &TimeWindow,
    reference: DateTime<Local>,
    parser: &P,
) -> Result<usize> {
    let file = File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;
    let mut reader = BufReader::new(file);
    let mut out = open_append(dest)?;

    let mut written = 0;
    let mut raw = Vec::new();
    loop {
        raw.clear();
        let n = reader
            .read_until(b'\n', &mut raw)
            .with_context(|| format!("Failed to read {}", src.display()))?;
        if n == 0 {
            break;
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        let text = String::from_utf8_lossy(&raw);
        let line = normalize(&text);
        if line.is_empty() {
            continue;
        }

        let t = match parser.parse_time(reference, &line) {
            Ok(t) => t,
            Err(e) => {
                warn!("skip line: {}, err: {}", text, e);
                continue;
            }
        };
        if t < window.start {
            continue;
        }
        if t > window.end {
            break;
        }
        write_line(&mut out, &raw)?;
        written += 1;
    }
    out.flush()?;

    debug!("wrote {} lines of {} to {}", written, src.display(), dest.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logwindow::timeparse::{runlog_time, LogFormat};
    use chrono::{Duration, NaiveDateTime, TimeZone};
    use std::fs;

    fn local(s: &str) -> DateTime<Local> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    /// One runlog line per minute starting at 2024-03-05 00:00:00.
    fn runlog_lines(count: i64) -> Vec<String> {
        let base = local("2024-03-05 00:00:00");
        (0..count)
            .map(|i| {
                let t = base + Duration::minutes(i);
                format!("{}.000 {:>6} [INFO] event number {}", t.format("%Y-%m-%d %H:%M:%S"), i, i)
            })
            .collect()
    }

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow::new(local(start), local(end)).unwrap()
    }

    #[test]
    fn test_reverse_extracts_ascending_in_window_lines() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("run.log");
        let dest = dir.path().join("out.log");
        let lines = runlog_lines(600);
        fs::write(&src, lines.join("\n") + "\n").unwrap();

        let w = window("2024-03-05 02:00:00", "2024-03-05 03:30:00");
        let written = collect_reverse(&src, &dest, &w, Local::now(), &runlog_time, 256).unwrap();

        let expected: Vec<String> = lines[120..=210].to_vec();
        assert_eq!(written, expected.len());
        let out = fs::read_to_string(&dest).unwrap();
        assert_eq!(out.lines().collect::<Vec<_>>(), expected);

        // Staging files are cleaned up.
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 2);
    }

    #[test]
    fn test_reverse_and_forward_agree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("run.log");
        let mut lines = runlog_lines(50);
        lines.insert(20, "   continuation line without a timestamp".to_string());
        lines.insert(30, String::new());
        fs::write(&src, lines.join("\n")).unwrap();

        let w = window("2024-03-05 00:10:00", "2024-03-05 00:40:00");
        let rev = dir.path().join("rev.log");
        let fwd = dir.path().join("fwd.log");
        collect_reverse(&src, &rev, &w, Local::now(), &LogFormat::Runlog, 64).unwrap();
        collect_forward(&src, &fwd, &w, Local::now(), &LogFormat::Runlog).unwrap();

        let rev = fs::read_to_string(&rev).unwrap();
        let fwd = fs::read_to_string(&fwd).unwrap();
        assert_eq!(rev, fwd);
        assert_eq!(rev.lines().count(), 31);
    }

    #[test]
    fn test_collect_appends_to_existing_dest() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("run.log");
        let dest = dir.path().join("out.log");
        fs::write(&src, runlog_lines(10).join("\n")).unwrap();
        fs::write(&dest, "existing\n").unwrap();

        let w = window("2024-03-05 00:08:00", "2024-03-05 01:00:00");
        let written = collect_forward(&src, &dest, &w, Local::now(), &runlog_time).unwrap();
        assert_eq!(written, 2);
        let out = fs::read_to_string(&dest).unwrap();
        assert!(out.starts_with("existing\n"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_window_outside_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("run.log");
        let dest = dir.path().join("out.log");
        fs::write(&src, runlog_lines(10).join("\n")).unwrap();

        let w = window("2024-03-06 00:00:00", "2024-03-07 00:00:00");
        assert_eq!(collect_reverse(&src, &dest, &w, Local::now(), &runlog_time, 4096).unwrap(), 0);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "");
    }

    #[test]
    fn test_missing_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let w = window("2024-03-06 00:00:00", "2024-03-07 00:00:00");
        let src = dir.path().join("missing.log");
        let dest = dir.path().join("out.log");
        assert!(collect_reverse(&src, &dest, &w, Local::now(), &runlog_time, 4096).is_err());
        assert!(collect_forward(&src, &dest, &w, Local::now(), &runlog_time).is_err());
    }

    #[test]
    fn test_non_utf8_lines_are_copied_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("run.log");
        let content: &[u8] = b"2024-03-05 09:00:00.000 early\n\
2024-03-05 10:00:00.000 a \xb4\xc5\xc5\xcc\n\
2024-03-05 10:30:00.000 \xff\xfe b\n\
2024-03-05 12:00:00.000 late\n";
        fs::write(&src, content).unwrap();
        let expected: &[u8] =
            b"2024-03-05 10:00:00.000 a \xb4\xc5\xc5\xcc\n2024-03-05 10:30:00.000 \xff\xfe b\n";

        let w = window("2024-03-05 10:00:00", "2024-03-05 11:00:00");
        let fwd = dir.path().join("fwd.log");
        let rev = dir.path().join("rev.log");
        assert_eq!(collect_forward(&src, &fwd, &w, Local::now(), &runlog_time).unwrap(), 2);
        assert_eq!(collect_reverse(&src, &rev, &w, Local::now(), &runlog_time, 16).unwrap(), 2);
        assert_eq!(fs::read(&fwd).unwrap(), expected);
        assert_eq!(fs::read(&rev).unwrap(), expected);
    }

    #[test]
    fn test_time_window() {
        assert!(TimeWindow::new(local("2024-03-06 00:00:00"), local("2024-03-05 00:00:00")).is_err());
        let w = window("2024-03-05 00:00:00", "2024-03-05 01:00:00");
        assert!(w.contains(local("2024-03-05 00:00:00")));
        assert!(w.contains(local("2024-03-05 01:00:00")));
        assert!(!w.contains(local("2024-03-05 01:00:01")));
    }
}
