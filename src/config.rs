//! Configuration for herakles-host-diag.
//!
//! Every field is optional so a partial file only overrides what it names.
//! Files are read as YAML, JSON or TOML depending on their extension; the
//! binary layers CLI flags over the loaded file, which is layered over
//! [`Config::default`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::logwindow::hostlog::LOGROTATE_CONFIG;
use crate::logwindow::DEFAULT_CHUNK_SIZE;
use crate::osinfo::OS_RELEASE_PATH;
use crate::sampler::DEFAULT_PROC_ROOT;
use crate::sar::devmap::DISK_STATS_PATH;
use crate::sar::DEFAULT_SAR_BINARY;

pub const DEFAULT_SCRAPE_INTERVAL: u64 = 1;
pub const DEFAULT_SCRAPE_TIMES: u64 = 5;

pub const DEFAULT_CONFIG_PATHS: [&str; 8] = [
    "/etc/herakles/host-diag.yaml",
    "/etc/herakles/host-diag.yml",
    "/etc/herakles/host-diag.json",
    "/etc/herakles/host-diag.toml",
    "./herakles-host-diag.yaml",
    "./herakles-host-diag.yml",
    "./herakles-host-diag.json",
    "./herakles-host-diag.toml",
];

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Logging
    pub log_level: Option<String>,

    // Current workload sampling
    /// Seconds between samples.
    #[serde(alias = "scrape-interval")]
    pub scrape_interval: Option<u64>,
    /// Number of samples per collection.
    #[serde(alias = "scrape-times")]
    pub scrape_times: Option<u64>,

    // sar
    pub sar_binary: Option<String>,
    /// Archive directory override; null reads the sysstat config.
    pub sar_dir: Option<String>,
    /// Set to false to always use the procfs sampler.
    pub use_sar: Option<bool>,

    // Log windowing
    pub chunk_size: Option<usize>,
    pub logrotate_config: Option<PathBuf>,

    // Host paths
    pub proc_root: Option<PathBuf>,
    pub diskstats_path: Option<PathBuf>,
    pub os_release_path: Option<PathBuf>,

    /// Threads for parallel sar archive reads (null = auto).
    pub parallelism: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            scrape_interval: Some(DEFAULT_SCRAPE_INTERVAL),
            scrape_times: Some(DEFAULT_SCRAPE_TIMES),
            sar_binary: Some(DEFAULT_SAR_BINARY.into()),
            sar_dir: None,
            use_sar: Some(true),
            chunk_size: Some(DEFAULT_CHUNK_SIZE),
            logrotate_config: Some(PathBuf::from(LOGROTATE_CONFIG)),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            diskstats_path: Some(PathBuf::from(DISK_STATS_PATH)),
            os_release_path: Some(PathBuf::from(OS_RELEASE_PATH)),
            parallelism: None,
        }
    }
}

impl Config {
    pub fn sar_binary(&self) -> &str {
        self.sar_binary.as_deref().unwrap_or(DEFAULT_SAR_BINARY)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn diskstats_path(&self) -> PathBuf {
        self.diskstats_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DISK_STATS_PATH))
    }

    pub fn os_release_path(&self) -> PathBuf {
        self.os_release_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(OS_RELEASE_PATH))
    }

    pub fn logrotate_config(&self) -> PathBuf {
        self.logrotate_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(LOGROTATE_CONFIG))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if cfg.scrape_interval == Some(0) {
        bail!("scrape_interval must be greater than 0");
    }
    if cfg.scrape_times == Some(0) {
        bail!("scrape_times must be greater than 0");
    }
    if cfg.chunk_size == Some(0) {
        bail!("chunk_size must be greater than 0");
    }
    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            bail!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            );
        }
    }
    if cfg.sar_binary.as_deref().map_or(false, |b| b.trim().is_empty()) {
        bail!("sar_binary must not be empty");
    }
    Ok(())
}

/// Loads a configuration file, or the first existing default location when
/// `path` is `None`. No file at all yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                bail!("Config file {} does not exist", p.display());
            }
            p.to_path_buf()
        }
        None => match DEFAULT_CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            Some(p) => p.to_path_buf(),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&path, &content)
}

fn parse_config(path: &Path, content: &str) -> Result<Config> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Adds comments to YAML configuration
pub fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Host Diagnostics Configuration
# =======================================
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Current Workload Sampling
# -------------------------
# scrape_interval: 1           # Seconds between samples
# scrape_times: 5              # Samples per collection
#
# sar
# ---
# sar_binary: "sar"            # sar executable (looked up on PATH)
# sar_dir: null                # Archive directory (null = from sysstat config)
# use_sar: true                # false = always sample /proc directly
#
# Log Windowing
# -------------
# chunk_size: 4096             # Bytes read per step when scanning backwards
# logrotate_config: "/etc/logrotate.conf"
#
# Host Paths
# ----------
# proc_root: "/proc"
# diskstats_path: "/proc/diskstats"
# os_release_path: "/etc/os-release"
#
# parallelism: null            # Threads for archive reads (null = auto)
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cfg = Config {
            scrape_interval: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            chunk_size: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_load_yaml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host-diag.yaml");
        fs::write(&path, "scrape-interval: 10\nuse_sar: false\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.scrape_interval, Some(10));
        assert_eq!(cfg.use_sar, Some(false));
        assert_eq!(cfg.chunk_size, None);
        assert_eq!(cfg.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("c.json");
        fs::write(&json, r#"{"sar_dir": "/data/sa", "chunk_size": 512}"#).unwrap();
        let cfg = load_config(Some(&json)).unwrap();
        assert_eq!(cfg.sar_dir.as_deref(), Some("/data/sa"));
        assert_eq!(cfg.chunk_size(), 512);

        let toml_path = dir.path().join("c.toml");
        fs::write(&toml_path, "scrape_times = 3\nproc_root = \"/host/proc\"\n").unwrap();
        let cfg = load_config(Some(&toml_path)).unwrap();
        assert_eq!(cfg.scrape_times, Some(3));
        assert_eq!(cfg.proc_root(), PathBuf::from("/host/proc"));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{not json").unwrap();
        assert!(load_config(Some(&bad)).is_err());
    }

    #[test]
    fn test_default_serializes_in_every_format() {
        let cfg = Config::default();
        let yaml = add_config_comments(serde_yaml::to_string(&cfg).unwrap());
        assert!(yaml.starts_with("# Herakles Host Diagnostics"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cfg);
        assert!(serde_json::to_string_pretty(&cfg).is_ok());
        assert!(toml::to_string_pretty(&cfg).is_ok());
    }
}
