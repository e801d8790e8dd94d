//! WolfLog - Multi-Process Safe Rotating Log Files
//!
//! Command line front end for writing to, archiving and inspecting a
//! rotating log directory.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolflog::config::WolfLogConfig;
use wolflog::dispatch::{Dispatcher, Level};
use wolflog::error::Result;
use wolflog::logfile::{ArchivedFile, RotatingLogWriter};

/// WolfLog - Multi-Process Safe Rotating Log Files
#[derive(Parser)]
#[command(name = "wolflog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolflog.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append lines from stdin to the log
    Write {
        /// Append lines verbatim instead of formatting them as records
        #[arg(long)]
        raw: bool,

        /// Record tag (defaults to dispatch.tag)
        #[arg(short, long)]
        tag: Option<String>,

        /// Record level
        #[arg(short = 'L', long, default_value = "info")]
        level: Level,
    },

    /// Archive all active segments
    Archive {
        /// Concatenate the archived segments into this file, oldest first
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Delete archived segments after they were copied to --output
        #[arg(long, requires = "output")]
        purge: bool,

        /// Print the archived segments as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show active and archived segments
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolflog.toml")]
        output: PathBuf,

        /// Log directory
        #[arg(long, default_value = "/var/log/wolflog")]
        directory: PathBuf,

        /// Log name
        #[arg(long, default_value = "app")]
        name: String,
    },

    /// Validate configuration file
    Validate,

    /// Show configuration information
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output, directory, name } => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "pretty");
            run_init(output, directory, name)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "pretty");
            run_validate(cli.config)
        }
        command => {
            let config = WolfLogConfig::from_file(&cli.config)?;
            let level = cli.log_level.as_deref().unwrap_or(config.logging.level.as_str());
            init_logging(level, &config.logging.format);

            match command {
                Commands::Write { raw, tag, level } => run_write(config, raw, tag, level),
                Commands::Archive { output, purge, json } => run_archive(config, output, purge, json),
                Commands::Status { json } => run_status(config, json),
                Commands::Info => run_info(config),
                Commands::Init { .. } | Commands::Validate => Ok(()),
            }
        }
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(io::stderr))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
    }
}

/// Append stdin to the log
fn run_write(config: WolfLogConfig, raw: bool, tag: Option<String>, level: Level) -> Result<()> {
    let writer = RotatingLogWriter::new(config.log.clone())?;
    let stdin = io::stdin();

    if raw {
        for line in stdin.lock().lines() {
            let mut line = line?;
            line.push('\n');
            writer.write(line.as_bytes())?;
        }
        return writer.close();
    }

    let tag = tag.unwrap_or_else(|| config.dispatch.tag.clone());
    let dispatcher = Dispatcher::new(writer, config.dispatch)?;
    for line in stdin.lock().lines() {
        dispatcher.log(level, &tag, &line?)?;
    }
    dispatcher.shutdown()
}

/// Archive the log and optionally hand the segments off to a file
fn run_archive(config: WolfLogConfig, output: Option<PathBuf>, purge: bool, json: bool) -> Result<()> {
    let writer = RotatingLogWriter::new(config.log)?;
    let archived = writer.archive()?;
    writer.close()?;

    if let Some(output) = output {
        copy_archived(&archived, &output)?;
        tracing::info!(
            segments = archived.len(),
            output = %output.display(),
            "Copied archived segments"
        );

        if purge {
            for file in &archived {
                file.remove()?;
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&archived)?);
    } else {
        for file in &archived {
            println!("{:>8}  {:>12}  {}", file.index, file.size, file.path.display());
        }
    }
    Ok(())
}

fn copy_archived(archived: &[ArchivedFile], output: &Path) -> Result<()> {
    let mut out = File::create(output)?;
    for file in archived {
        let mut segment = File::open(&file.path)?;
        io::copy(&mut segment, &mut out)?;
    }
    out.sync_all()?;
    Ok(())
}

/// Show the log directory
fn run_status(config: WolfLogConfig, json: bool) -> Result<()> {
    let writer = RotatingLogWriter::new(config.log)?;
    let status = writer.status()?;
    writer.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Active segments ({} bytes):", status.active_bytes());
    for file in &status.active {
        println!("  {:>8}  {:>12}  {}", file.index, file.size, file.path.display());
    }
    println!("Archived segments ({} bytes):", status.archived_bytes());
    for file in &status.archived {
        println!("  {:>8}  {:>12}  {}", file.index, file.size, file.path.display());
    }
    Ok(())
}

/// Write a configuration template
fn run_init(output: PathBuf, directory: PathBuf, name: String) -> Result<()> {
    let config_content = format!(r#"# WolfLog Configuration
# Generated configuration file

[log]
directory = "{directory}"
name = "{name}"
max_size = 1048576       # bytes per segment, 0 = unbounded
max_count = 8            # segments kept per namespace
fsync = false

[dispatch]
tag = "{name}"
level = "debug"          # verbose, debug, info, warn, error
console = false

[logging]
level = "info"
format = "pretty"        # pretty, compact
"#, directory = directory.display(), name = name);

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("Then write with: wolflog --config {} write < input.txt", output.display());

    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: PathBuf) -> Result<()> {
    match WolfLogConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Directory: {}", config.log.directory.display());
            println!("  Name: {}", config.log.name);
            println!("  Max Size: {}", describe_size(config.log.max_size));
            println!("  Max Count: {}", config.log.max_count);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show configuration information
fn run_info(config: WolfLogConfig) -> Result<()> {
    let mut out = io::stdout().lock();

    writeln!(out, "WolfLog Information")?;
    writeln!(out, "===================")?;
    writeln!(out)?;
    writeln!(out, "Log Configuration:")?;
    writeln!(out, "  Directory:      {}", config.log.directory.display())?;
    writeln!(out, "  Name:           {}", config.log.name)?;
    writeln!(out, "  Lock File:      {}", config.lock_path().display())?;
    writeln!(out, "  Max Size:       {}", describe_size(config.log.max_size))?;
    writeln!(out, "  Max Count:      {}", config.log.max_count)?;
    writeln!(out, "  Fsync:          {}", config.log.fsync)?;
    writeln!(out)?;
    writeln!(out, "Dispatch Configuration:")?;
    writeln!(out, "  Tag:            {}", config.dispatch.tag)?;
    writeln!(out, "  Level:          {}", config.dispatch.level)?;
    writeln!(out, "  Console:        {}", config.dispatch.console)?;

    Ok(())
}

fn describe_size(max_size: u64) -> String {
    if max_size == 0 {
        "unbounded".to_string()
    } else {
        format!("{} bytes", max_size)
    }
}
