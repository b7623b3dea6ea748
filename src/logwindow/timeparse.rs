//! Timestamp extraction for the log formats the collector understands.
//!
//! Every parser has the shape `fn(reference, line) -> Result<DateTime<Local>, String>`
//! so it can be used wherever a [`LineTimeParser`](super::window::LineTimeParser)
//! is expected. The reference time only matters for formats that omit the
//! year.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// `2024-03-05 10:15:30.123`, fraction optional.
pub const RUNLOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

static MONTHS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .enumerate()
    .map(|(i, m)| (*m, i as u32 + 1))
    .collect()
});

/// Log line formats with a known timestamp layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `Mar  5 10:15:30 host proc[pid]: msg`
    Syslog,
    /// `2024-03-05 10:15:30.123 ...`
    Runlog,
    /// `2024-03-05 10:15:30.123|...`
    Alertlog,
}

impl LogFormat {
    pub fn parse(&self, reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String> {
        match self {
            LogFormat::Syslog => syslog_time(reference, line),
            LogFormat::Runlog => runlog_time(reference, line),
            LogFormat::Alertlog => alertlog_time(reference, line),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "syslog" | "messages" => Ok(LogFormat::Syslog),
            "runlog" | "run" => Ok(LogFormat::Runlog),
            "alertlog" | "alert" => Ok(LogFormat::Alertlog),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
    let key = name.get(..3)?.to_ascii_lowercase();
    MONTHS.get(key.as_str()).copied()
}

fn to_local(naive: NaiveDateTime) -> Result<DateTime<Local>, String> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{} does not exist in the local timezone", naive))
}

/// Parses the `Mon DD HH:MM:SS` prefix of a syslog line.
///
/// The year is taken from `reference`; a month later in the year than the
/// reference month belongs to the previous year.
pub fn syslog_time(reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(format!("invalid line: {}, skip", line));
    }

    let month = month_number(fields[0]).ok_or_else(|| format!("invalid month '{}'", fields[0]))?;
    let day: u32 = fields[1]
        .parse()
        .map_err(|e| format!("invalid day '{}': {}", fields[1], e))?;
    let time = NaiveTime::parse_from_str(fields[2], "%H:%M:%S")
        .map_err(|e| format!("invalid time '{}': {}", fields[2], e))?;

    let mut year = reference.year();
    if reference.month() < month {
        year -= 1;
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("invalid date {}-{}-{}", year, month, day))?;
    to_local(date.and_time(time))
}

/// Parses the date and time in the first two fields of a run log line.
pub fn runlog_time(_reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String> {
    let mut fields = line.split_whitespace();
    let (Some(date), Some(time)) = (fields.next(), fields.next()) else {
        return Err(format!("invalid line: {}, skip", line));
    };
    let stamp = format!("{} {}", date, time);
    let naive = NaiveDateTime::parse_from_str(&stamp, RUNLOG_TIME_FORMAT)
        .map_err(|e| format!("invalid time '{}': {}", stamp, e))?;
    to_local(naive)
}

/// Parses the timestamp preceding the first `|` of an alert log line.
pub fn alertlog_time(_reference: DateTime<Local>, line: &str) -> Result<DateTime<Local>, String> {
    let stamp = line.split('|').next().unwrap_or_default().trim();
    let naive = NaiveDateTime::parse_from_str(stamp, RUNLOG_TIME_FORMAT)
        .map_err(|e| format!("invalid time '{}': {}", stamp, e))?;
    to_local(naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(s: &str) -> DateTime<Local> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    #[test]
    fn test_syslog_year_from_reference() {
        let reference = local("2024-03-10 12:00:00");
        let t = syslog_time(reference, "Mar  5 10:15:30 db01 kernel: oom").unwrap();
        assert_eq!(t, local("2024-03-05 10:15:30"));
    }

    #[test]
    fn test_syslog_later_month_is_previous_year() {
        let reference = local("2024-01-02 08:00:00");
        let t = syslog_time(reference, "Dec 31 23:59:59 db01 systemd[1]: stop").unwrap();
        assert_eq!(t, local("2023-12-31 23:59:59"));
    }

    #[test]
    fn test_syslog_invalid_lines() {
        let reference = local("2024-01-02 08:00:00");
        assert!(syslog_time(reference, "Dec 31").is_err());
        assert!(syslog_time(reference, "Foo 31 23:59:59 x").is_err());
        assert!(syslog_time(reference, "Dec xx 23:59:59 x").is_err());
        assert!(syslog_time(reference, "Feb 30 10:00:00 x").is_err());
        assert!(syslog_time(reference, "").is_err());
    }

    #[test]
    fn test_runlog_time() {
        let reference = local("2000-01-01 00:00:00");
        let t = runlog_time(reference, "2024-03-05 10:15:30.123 12345 [INFO] started").unwrap();
        assert_eq!(t.timestamp(), local("2024-03-05 10:15:30").timestamp());
        assert_eq!(t.timestamp_subsec_millis(), 123);
        assert!(runlog_time(reference, "2024-03-05").is_err());
        assert!(runlog_time(reference, "not a time at all").is_err());
    }

    #[test]
    fn test_alertlog_time() {
        let reference = local("2000-01-01 00:00:00");
        let t = alertlog_time(reference, "2024-03-05 10:15:30.000|ERROR|disk full").unwrap();
        assert_eq!(t, local("2024-03-05 10:15:30"));
        assert!(alertlog_time(reference, "|ERROR|x").is_err());
    }

    #[test]
    fn test_log_format_dispatch() {
        let reference = local("2024-03-10 12:00:00");
        let format: LogFormat = "alert".parse().unwrap();
        assert_eq!(format, LogFormat::Alertlog);
        assert!(format.parse(reference, "2024-03-05 10:15:30.000|x").is_ok());
        assert!("json".parse::<LogFormat>().is_err());
    }
}
