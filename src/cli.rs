//! CLI arguments and subcommands for herakles-host-diag.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_host_diag::logwindow::LogFormat;
use herakles_host_diag::osinfo::OsFamily;
use herakles_host_diag::workload::WorkloadKind;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for collected data
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// How `logs` scans the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogMode {
    /// host for syslog, forward otherwise
    Auto,
    /// Scan from the first line
    Forward,
    /// Scan from the last line
    Reverse,
    /// Rotation-aware system log collection
    Host,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-host-diag",
    about = "Host workload history and log window collection",
    long_about = "Host workload history and log window collection.\n\n\
                  Collects CPU, network, memory and disk workload from sar (or /proc when \
                  sar is unavailable), reads historical sar archives, and extracts \
                  time windows from large log files without reading them whole.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// sar executable
    #[arg(long, global = true)]
    pub sar_binary: Option<String>,

    /// sar archive directory
    #[arg(long, global = true)]
    pub sar_dir: Option<String>,

    /// Never run sar, sample /proc instead
    #[arg(long, global = true)]
    pub no_sar: bool,

    /// Root of the proc filesystem
    #[arg(long, global = true)]
    pub proc_root: Option<PathBuf>,

    /// Bytes read per step when scanning logs backwards
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Parallel processing threads (0 = auto)
    #[arg(long, global = true)]
    pub parallelism: Option<usize>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample the current workload
    Workload {
        /// cpu, network, memory or disk (default: all)
        #[arg(short = 'k', long)]
        kind: Option<WorkloadKind>,

        /// Seconds between samples
        #[arg(short = 'i', long)]
        interval: Option<u64>,

        /// Number of samples
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Read workload history from the sar archives
    History {
        /// cpu, network, memory or disk (default: all)
        #[arg(short = 'k', long)]
        kind: Option<WorkloadKind>,

        /// Window start, "YYYY-MM-DD HH:MM[:SS]"
        #[arg(long)]
        start: String,

        /// Window end, "YYYY-MM-DD HH:MM[:SS]"
        #[arg(long)]
        end: String,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Parse captured sar output
    ParseSar {
        #[arg(short = 'k', long)]
        kind: WorkloadKind,

        /// File with sar output ("-" for stdin)
        #[arg(short = 'f', long, default_value = "-")]
        input: PathBuf,

        /// Column layout: base, ubuntu or kylin (default: detect)
        #[arg(long)]
        os: Option<OsFamily>,

        /// Date for reports without a banner line, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,

        /// diskstats file used to resolve disk device numbers
        #[arg(long)]
        diskstats: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Copy the lines of a time window from a log file
    Logs {
        /// Source log (default: system log)
        #[arg(short = 's', long)]
        source: Option<PathBuf>,

        /// Destination file, appended to
        #[arg(short = 'o', long)]
        dest: PathBuf,

        /// Window start, "YYYY-MM-DD HH:MM[:SS]"
        #[arg(long)]
        start: String,

        /// Window end, "YYYY-MM-DD HH:MM[:SS]"
        #[arg(long)]
        end: String,

        /// Line format: syslog, runlog or alertlog
        #[arg(long, default_value = "syslog")]
        format: LogFormat,

        #[arg(long, value_enum, default_value = "auto")]
        mode: LogMode,
    },

    /// Print the last lines of a file
    Tail {
        #[arg(short = 'f', long)]
        file: PathBuf,

        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,
    },

    /// Validate configuration and system requirements
    Check {
        /// Check sar availability and archive directory
        #[arg(long)]
        sar: bool,

        /// Check /proc counters
        #[arg(long)]
        proc: bool,

        /// Check system log access
        #[arg(long)]
        logs: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Generate synthetic sar output for parser testing
    GenerateTestdata {
        #[arg(short = 'k', long)]
        kind: WorkloadKind,

        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long, default_value = "-")]
        output: PathBuf,

        /// Column layout: base, ubuntu or kylin
        #[arg(long, default_value = "base")]
        os: OsFamily,

        /// Number of report lines
        #[arg(short = 'n', long, default_value_t = 12)]
        count: u32,

        /// Seconds between report lines
        #[arg(long, default_value_t = 600)]
        interval: u32,

        /// Report date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}
