//! Generate testdata command implementation.
//!
//! Writes synthetic sar reports in the column layout of a chosen
//! distribution, for exercising the parser without sysstat installed.

use chrono::{Local, NaiveDate, NaiveTime};
use herakles_host_diag::osinfo::OsFamily;
use herakles_host_diag::sar::profile::{profile_for, PlatformProfile};
use herakles_host_diag::workload::WorkloadKind;
use rand::Rng;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const SECONDS_PER_DAY: u32 = 24 * 3600;

/// Title text sar prints for a column.
fn column_label(column: &str) -> String {
    match column {
        "cpu" => "CPU".to_string(),
        "iface" => "IFACE".to_string(),
        "dev" => "DEV".to_string(),
        "avgrq_sz" => "avgrq-sz".to_string(),
        "avgqu_sz" => "avgqu-sz".to_string(),
        "await" | "svctm" | "tps" => column.to_string(),
        "rkb" => "rkB/s".to_string(),
        "wkb" => "wkB/s".to_string(),
        "dkb" => "dkB/s".to_string(),
        "rxkb" => "rxkB/s".to_string(),
        "txkb" => "txkB/s".to_string(),
        "rd_sec" | "wr_sec" | "rxpck" | "txpck" | "rxcmp" | "txcmp" | "rxmcst" => {
            format!("{}/s", column)
        }
        c if c.starts_with("kb") => c.to_string(),
        other => format!("%{}", other),
    }
}

fn entities(kind: WorkloadKind) -> &'static [&'static str] {
    match kind {
        WorkloadKind::Cpu => &["all"],
        WorkloadKind::Network => &["lo", "eth0"],
        WorkloadKind::Memory => &[""],
        WorkloadKind::Disk => &["dev8-0", "dev8-16"],
    }
}

fn random_value(rng: &mut impl Rng, column: &str) -> String {
    if column.starts_with("kb") {
        rng.gen_range(1_000..16_000_000u64).to_string()
    } else {
        format!("{:.2}", rng.gen_range(0.0..100.0f64))
    }
}

/// Renders a sar report with `count` data lines per entity, `interval`
/// seconds apart, starting just after midnight of `date`.
pub fn render_sar_report(
    rng: &mut impl Rng,
    profile: &PlatformProfile,
    kind: WorkloadKind,
    date: NaiveDate,
    count: u32,
    interval: u32,
) -> Result<String, String> {
    let metric = profile
        .metric(kind)
        .ok_or_else(|| format!("no sar layout for {}", kind))?;
    if interval == 0 || count == 0 {
        return Err("count and interval must be greater than 0".to_string());
    }
    if count.saturating_mul(interval) >= SECONDS_PER_DAY {
        return Err("report must fit in one day".to_string());
    }

    let columns = metric.layout.columns;
    let mut out = String::new();
    writeln!(
        out,
        "Linux 5.14.0-herakles (testhost) \t{} \t_x86_64_\t(4 CPU)\n",
        date.format("%m/%d/%Y")
    )
    .ok();

    let start = NaiveTime::from_hms_opt(0, 0, 1).unwrap_or(NaiveTime::MIN);
    let title: Vec<String> = columns.iter().map(|c| column_label(c)).collect();
    writeln!(out, "{}  {}", start.format("%I:%M:%S %p"), title.join("  ")).ok();

    for i in 0..count {
        let time = start + chrono::Duration::seconds(i64::from(i * interval));
        for entity in entities(kind) {
            let mut fields = vec![time.format("%I:%M:%S %p").to_string()];
            for column in columns {
                if matches!(*column, "cpu" | "iface" | "dev") {
                    fields.push(entity.to_string());
                } else {
                    fields.push(random_value(rng, column));
                }
            }
            writeln!(out, "{}", fields.join("  ")).ok();
        }
    }

    let mut average = vec!["Average:".to_string()];
    for column in columns {
        if matches!(*column, "cpu" | "iface" | "dev") {
            average.push(entities(kind)[0].to_string());
        } else {
            average.push(random_value(rng, column));
        }
    }
    writeln!(out, "{}", average.join("  ")).ok();

    Ok(out)
}

/// Generates synthetic sar output for parser testing.
pub fn command_generate_testdata(
    kind: WorkloadKind,
    output: PathBuf,
    os: OsFamily,
    count: u32,
    interval: u32,
    date: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{}': {}", d, e))?,
        None => Local::now().date_naive(),
    };
    debug!(
        "Generating {} sar report: os={:?} count={} interval={}s date={}",
        kind, os, count, interval, date
    );

    let mut rng = rand::thread_rng();
    let report = render_sar_report(&mut rng, profile_for(os), kind, date, count, interval)?;

    if output.to_string_lossy() == "-" {
        print!("{}", report);
    } else {
        fs::write(&output, &report)?;
        println!("✅ Generated {} sar report in {}", kind, output.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_host_diag::sar::parse_output_on;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_generated_reports_parse_for_every_layout() {
        let mut rng = rand::thread_rng();
        for family in [OsFamily::Base, OsFamily::Ubuntu, OsFamily::Kylin] {
            let profile = profile_for(family);
            for kind in WorkloadKind::ALL {
                let report = render_sar_report(&mut rng, profile, kind, day(), 6, 600).unwrap();
                let table = parse_output_on(&report, kind, profile, NaiveDate::MIN);
                assert_eq!(table.len(), 6, "{:?} {:?}", family, kind);
                let (_, item) = table.iter().next().unwrap();
                assert_eq!(item.len(), entities(kind).len());
            }
        }
    }

    #[test]
    fn test_render_rejects_oversized_reports() {
        let mut rng = rand::thread_rng();
        let profile = profile_for(OsFamily::Base);
        assert!(render_sar_report(&mut rng, profile, WorkloadKind::Cpu, day(), 200, 600).is_err());
        assert!(render_sar_report(&mut rng, profile, WorkloadKind::Cpu, day(), 0, 600).is_err());
    }

    #[test]
    fn test_column_labels_match_sar_titles() {
        assert_eq!(column_label("user"), "%user");
        assert_eq!(column_label("rd_sec"), "rd_sec/s");
        assert_eq!(column_label("kbmemfree"), "kbmemfree");
        assert_eq!(column_label("dev"), "DEV");
    }
}
