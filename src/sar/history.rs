//! Workload history from the daily sar archives (`saDD` files).

use chrono::{Duration, NaiveDateTime, NaiveTime};
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, error, info};

use super::Sar;
use crate::workload::{WorkloadKind, WorkloadTable};

/// Merged history plus the per-day failures that were skipped.
#[derive(Debug, Default)]
pub struct HistoryResult {
    pub table: WorkloadTable,
    pub errors: Vec<String>,
}

/// Builds one sar argument list per calendar day in `[start, end]`.
///
/// Each list reads `sar_dir/saDD`; the first day is bounded with `-s` unless
/// the window starts at midnight, and the last with `-e`. A window ending
/// exactly at midnight does not read the final day's archive.
pub fn history_args(start: NaiveDateTime, end: NaiveDateTime, sar_dir: &Path) -> Vec<Vec<String>> {
    let mut arg_sets = Vec::new();
    if start > end {
        return arg_sets;
    }

    let first = start.date();
    let last = end.date();
    let mut day = first;
    while day <= last {
        let mut args = vec![
            "-f".to_string(),
            sar_dir
                .join(format!("sa{}", day.format("%d")))
                .to_string_lossy()
                .into_owned(),
        ];
        if day == first && start.time() != NaiveTime::MIN {
            args.push("-s".to_string());
            args.push(start.format("%H:%M:%S").to_string());
        }
        if day == last {
            if end.time() == NaiveTime::MIN {
                break;
            }
            args.push("-e".to_string());
            args.push(end.format("%H:%M:%S").to_string());
        }
        arg_sets.push(args);
        day += Duration::days(1);
    }

    arg_sets
}

impl Sar {
    /// Reads every daily archive covering `[start, end]` in parallel and
    /// merges the results. Days whose archive cannot be read are logged and
    /// reported in [`HistoryResult::errors`].
    pub fn collect_history(
        &self,
        kind: WorkloadKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
        sar_dir: &Path,
    ) -> HistoryResult {
        let arg_sets = history_args(start, end, sar_dir);
        info!(
            "Collecting {} history from {} to {} ({} archive(s))",
            kind,
            start,
            end,
            arg_sets.len()
        );

        let outcomes: Vec<_> = arg_sets
            .par_iter()
            .map(|args| (args, self.collect(kind, args)))
            .collect();

        let mut result = HistoryResult::default();
        for (args, outcome) in outcomes {
            match outcome {
                Ok(table) => {
                    debug!("{} timestamps from {:?}", table.len(), args);
                    result.table.merge(table);
                }
                Err(e) => {
                    error!("Failed to collect {} history with {:?}: {:#}", kind, args, e);
                    result.errors.push(format!("{:#}", e));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osinfo::OsFamily;
    use crate::sar::profile::profile_for;
    use chrono::NaiveDate;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_single_day_window() {
        let args = history_args(at("2024-03-05 08:00:00"), at("2024-03-05 10:30:00"), Path::new("/var/log/sa"));
        assert_eq!(
            args,
            vec![vec!["-f", "/var/log/sa/sa05", "-s", "08:00:00", "-e", "10:30:00"]]
        );
    }

    #[test]
    fn test_multi_day_window_bounds_first_and_last() {
        let args = history_args(at("2024-02-28 22:00:00"), at("2024-03-01 01:00:00"), Path::new("/sa"));
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], vec!["-f", "/sa/sa28", "-s", "22:00:00"]);
        assert_eq!(args[1], vec!["-f", "/sa/sa29"]);
        assert_eq!(args[2], vec!["-f", "/sa/sa01", "-e", "01:00:00"]);
    }

    #[test]
    fn test_window_ending_at_midnight_skips_last_day() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 6)
            .unwrap()
            .and_time(NaiveTime::MIN);
        let args = history_args(at("2024-03-05 12:00:00"), end, Path::new("/sa"));
        assert_eq!(args, vec![vec!["-f", "/sa/sa05", "-s", "12:00:00"]]);
    }

    #[test]
    fn test_window_starting_at_midnight_reads_whole_first_day() {
        let args = history_args(at("2024-03-05 00:00:00"), at("2024-03-05 06:00:00"), Path::new("/sa"));
        assert_eq!(args, vec![vec!["-f", "/sa/sa05", "-e", "06:00:00"]]);
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let args = history_args(at("2024-03-06 00:00:00"), at("2024-03-05 00:00:00"), Path::new("/sa"));
        assert!(args.is_empty());
    }

    #[test]
    fn test_collect_history_reports_failed_days() {
        let sar = Sar::new(profile_for(OsFamily::Base)).with_binary("/nonexistent/herakles/sar");
        let result = sar.collect_history(
            WorkloadKind::Cpu,
            at("2024-03-04 12:00:00"),
            at("2024-03-05 12:00:00"),
            Path::new("/sa"),
        );
        assert!(result.table.is_empty());
        assert_eq!(result.errors.len(), 2);
    }
}
