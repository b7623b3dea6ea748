// herakles-host-diag - version 0.1.0
// Host workload and log window collector with tracing logging
use clap::{CommandFactory, Parser};
use herakles_host_diag::config::{load_config, validate_effective_config, Config};
use herakles_host_diag::sar::devmap::DISK_STATS_PATH;
use std::path::Path;
use tracing::{debug, info, Level};

mod cli;
mod commands;

use cli::{Args, Commands};

/// Resolves configuration from CLI args, config file, and defaults
/// This enforces precedence: CLI (if provided) > config file > default.
fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }
    if let Some(binary) = &args.sar_binary {
        config.sar_binary = Some(binary.clone());
    }
    if let Some(dir) = &args.sar_dir {
        config.sar_dir = Some(dir.clone());
    }
    if args.no_sar {
        config.use_sar = Some(false);
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
        // diskstats follows the proc root unless the config file names another path
        if config.diskstats_path() == Path::new(DISK_STATS_PATH) {
            config.diskstats_path = Some(root.join("diskstats"));
        }
    }
    if args.chunk_size.is_some() {
        config.chunk_size = args.chunk_size;
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }

    Ok(config)
}

fn log_level(config: &Config) -> Option<Level> {
    match config.log_level.as_deref().unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => None,
        "error" => Some(Level::ERROR),
        "warn" => Some(Level::WARN),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => Some(Level::INFO),
    }
}

/// Initializes tracing logging subsystem with configured log level.
/// Logs go to stderr so stdout only carries command output.
fn setup_logging(config: &Config) {
    let Some(level) = log_level(config) else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {}", level);
}

fn setup_thread_pool(config: &Config) {
    let threads = config.parallelism.unwrap_or(0);
    if threads == 0 {
        return;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        Ok(()) => debug!("Using {} worker threads", threads),
        Err(e) => eprintln!("Failed to configure thread pool: {}", e),
    }
}

/// -------------------------------------------------------------------
/// MAIN APPLICATION ENTRY POINT
/// -------------------------------------------------------------------
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return commands::show_config(&config, args.config_format);
    }

    let Some(command) = &args.command else {
        Args::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&config);
    setup_thread_pool(&config);
    info!("Starting herakles-host-diag");

    match command {
        Commands::Workload {
            kind,
            interval,
            count,
            format,
        } => commands::command_workload(*kind, *interval, *count, *format, &config),
        Commands::History {
            kind,
            start,
            end,
            format,
        } => commands::command_history(*kind, start, end, *format, &config),
        Commands::ParseSar {
            kind,
            input,
            os,
            date,
            diskstats,
            format,
        } => commands::command_parse_sar(
            *kind,
            input,
            *os,
            date.as_deref(),
            diskstats.clone(),
            *format,
            &config,
        ),
        Commands::Logs {
            source,
            dest,
            start,
            end,
            format,
            mode,
        } => commands::command_logs(source.clone(), dest, start, end, *format, *mode, &config),
        Commands::Tail { file, lines } => commands::command_tail(file, *lines),
        Commands::Check {
            sar,
            proc,
            logs,
            all,
        } => commands::command_check(*sar, *proc, *logs, *all, &config),
        Commands::Config {
            output,
            format,
            commented,
        } => commands::command_config(output.clone(), *format, *commented),
        Commands::GenerateTestdata {
            kind,
            output,
            os,
            count,
            interval,
            date,
        } => commands::command_generate_testdata(
            *kind,
            output.clone(),
            *os,
            *count,
            *interval,
            date.as_deref(),
        ),
    }
}
