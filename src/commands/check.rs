//! Check command implementation.
//!
//! Validates configuration and the host facilities the collectors rely on.

use herakles_host_diag::config::{validate_effective_config, Config};
use herakles_host_diag::logwindow::find_system_log;
use herakles_host_diag::logwindow::hostlog::has_dateext;
use herakles_host_diag::sar::devmap::DeviceNumberMap;
use herakles_host_diag::sar::find_in_path;
use herakles_host_diag::system;
use std::fs::File;
use std::path::Path;

use super::detect_profile;

fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Validates system requirements and configuration
pub fn command_check(
    sar: bool,
    proc: bool,
    logs: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Host Diagnostics - System Check");
    println!("===========================================");

    let mut all_ok = true;

    println!("\n👤 Checking privileges...");
    if is_root() {
        println!("   ✅ Running as root");
    } else {
        println!("   ⚠️  Not running as root, sar archives and system logs may be unreadable");
    }

    if sar || all {
        println!("\n📈 Checking sar...");
        let profile = detect_profile(config);
        println!("   ✅ Column layout: {:?}", profile.family);

        match find_in_path(Path::new(config.sar_binary())) {
            Some(path) => println!("   ✅ sar found at {}", path.display()),
            None => {
                if config.use_sar.unwrap_or(true) {
                    println!("   ⚠️  sar not found, /proc sampling will be used");
                } else {
                    println!("   ✅ sar disabled, /proc sampling will be used");
                }
            }
        }

        let sar_dir = profile.sar_dir(config.sar_dir.as_deref());
        if sar_dir.is_dir() {
            println!("   ✅ sar archives in {}", sar_dir.display());
        } else {
            println!("   ⚠️  sar archive directory {} not found", sar_dir.display());
        }
    }

    if proc || all {
        let root = config.proc_root();
        println!("\n📁 Checking {} counters...", root.display());

        let checks: [(&str, Result<usize, String>); 3] = [
            ("stat", system::read_cpu_stats(&root).map(|s| s.len())),
            ("meminfo", system::read_meminfo(&root).map(|_| 1)),
            ("net/dev", system::read_net_dev(&root).map(|d| d.len())),
        ];
        for (name, result) in checks {
            match result {
                Ok(n) => println!("   ✅ {} readable ({} entries)", name, n),
                Err(e) => {
                    println!("   ❌ {}", e);
                    all_ok = false;
                }
            }
        }

        match DeviceNumberMap::read(&config.diskstats_path()) {
            Ok(map) => println!("   ✅ diskstats readable ({} devices)", map.len()),
            Err(e) => {
                println!("   ❌ {:#}", e);
                all_ok = false;
            }
        }
    }

    if logs || all {
        println!("\n📜 Checking system log...");
        match find_system_log() {
            Some(path) => match File::open(&path) {
                Ok(_) => println!("   ✅ {} readable", path.display()),
                Err(e) => {
                    println!("   ❌ {}: {}", path.display(), e);
                    all_ok = false;
                }
            },
            None => {
                println!("   ❌ No system log found");
                all_ok = false;
            }
        }

        let logrotate = config.logrotate_config();
        match has_dateext(&logrotate) {
            Ok(true) => println!("   ✅ dateext enabled, rotated logs are dated"),
            Ok(false) => println!("   ✅ dateext disabled, only the live log is scanned"),
            Err(e) => println!("   ⚠️  {:#}", e),
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
