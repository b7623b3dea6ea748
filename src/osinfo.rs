//! Operating system identification from `/etc/os-release`.
//!
//! The detected [`OsFamily`] selects which sar column profile applies.
//! Detection runs once per collection run and the result is passed down
//! explicitly; nothing here is cached globally.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Distribution families with distinct sysstat output layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// CentOS / RHEL style sysstat, also used for unknown distributions.
    Base,
    Ubuntu,
    Kylin,
}

impl OsFamily {
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "ubuntu" => OsFamily::Ubuntu,
            "kylin" => OsFamily::Kylin,
            _ => OsFamily::Base,
        }
    }
}

impl std::str::FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" | "centos" | "rhel" => Ok(OsFamily::Base),
            "ubuntu" => Ok(OsFamily::Ubuntu),
            "kylin" => Ok(OsFamily::Kylin),
            other => Err(format!("unknown os family '{}'", other)),
        }
    }
}

/// Selected fields of os-release(5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsRelease {
    pub name: String,
    pub version: String,
    pub id: String,
    pub pretty_name: String,
    pub version_id: String,
}

impl OsRelease {
    pub fn family(&self) -> OsFamily {
        OsFamily::from_id(&self.id)
    }
}

/// Parses os-release content (`KEY=value`, optionally quoted, `#` comments).
pub fn parse_os_release(content: &str) -> OsRelease {
    let mut release = OsRelease::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        match key.trim() {
            "NAME" => release.name = value,
            "VERSION" => release.version = value,
            "ID" => release.id = value,
            "PRETTY_NAME" => release.pretty_name = value,
            "VERSION_ID" => release.version_id = value,
            _ => {}
        }
    }

    release
}

/// Reads and parses an os-release file.
pub fn read_os_release(path: &Path) -> Result<OsRelease> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let release = parse_os_release(&content);
    debug!(
        "Detected OS id={} version_id={} family={:?}",
        release.id,
        release.version_id,
        release.family()
    );
    Ok(release)
}
