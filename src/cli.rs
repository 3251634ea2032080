//! Command-line interface components.

use crate::config::WsnConfig;
use crate::constants::DATE_TOKEN_FORMAT;
use crate::ledger::ProcessedFileLedger;
use crate::mirror::mirror;
use crate::models::ProcessingStats;
use crate::processor::Pipeline;
use crate::schema::generate_columns;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Preprocess wireless sensor network logger dumps into long-format tables
#[derive(Parser, Debug)]
#[command(name = "wsn_preprocess")]
#[command(about = "Rescale and reshape WSN logger dumps into long-format CSV and Parquet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Configuration file (default: ./setting/config.json, then the user config dir)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transform every unprocessed dump and rebuild the latest-readings workbook
    Run {
        /// Date treated as today, YYYYMMDD (default: local date)
        #[arg(long, value_parser = parse_date, value_name = "YYYYMMDD")]
        run_date: Option<NaiveDate>,

        /// Override LOGGING_DATA_PATH
        #[arg(short, long, value_name = "DIR")]
        input: Option<PathBuf>,

        /// Override OUTPUT_FOLDER_PATH
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// List the files a run would transform and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Copy node directories and recent dumps from a share to a local root
    Mirror {
        #[arg(long, value_name = "DIR")]
        source: PathBuf,

        #[arg(long, value_name = "DIR")]
        dest: PathBuf,

        /// First date to copy, YYYYMMDD (default: seven days before --until)
        #[arg(long, value_parser = parse_date, value_name = "YYYYMMDD")]
        since: Option<NaiveDate>,

        /// Last date to copy, YYYYMMDD (default: local date)
        #[arg(long, value_parser = parse_date, value_name = "YYYYMMDD")]
        until: Option<NaiveDate>,

        /// Glob selecting dumps inside each node directory
        #[arg(long, default_value = crate::constants::DEFAULT_SOURCE_PATTERN)]
        pattern: String,
    },

    /// Rewrite path prefixes recorded in the processed-file ledger
    RebaseLedger {
        #[arg(long, value_name = "PREFIX")]
        from_prefix: String,

        #[arg(long, value_name = "PREFIX")]
        to_prefix: String,

        /// Ledger to read (default: the configured ledger)
        #[arg(long, value_name = "PATH")]
        ledger: Option<PathBuf>,

        /// Write the result here instead of in place
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Print the column schema generated for a node range
    Schema {
        #[arg(long)]
        start: u32,

        #[arg(long)]
        end: u32,
    },
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_TOKEN_FORMAT)
        .map_err(|e| format!("expected YYYYMMDD, got {:?}: {}", value, e))
}

/// Print top-level help
pub fn print_help() {
    let mut command = Args::command();
    let _ = command.print_help();
    println!();
}

/// Dispatch the parsed command
pub fn run(args: Args) -> Result<()> {
    setup_logging(&args);
    debug!("Command line arguments: {:?}", args);

    let Some(command) = args.command else {
        print_help();
        return Ok(());
    };

    match command {
        Commands::Run {
            run_date,
            input,
            output,
            dry_run,
        } => run_pipeline(
            args.config,
            args.quiet,
            run_date,
            input,
            output,
            dry_run,
        ),
        Commands::Mirror {
            source,
            dest,
            since,
            until,
            pattern,
        } => run_mirror(source, dest, since, until, &pattern),
        Commands::RebaseLedger {
            from_prefix,
            to_prefix,
            ledger,
            output,
        } => run_rebase(args.config, &from_prefix, &to_prefix, ledger, output),
        Commands::Schema { start, end } => {
            let columns = generate_columns(start, end)
                .with_context(|| format!("Cannot generate schema for {}-{}", start, end))?;
            for column in columns {
                println!("{}", column);
            }
            Ok(())
        }
    }
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wsn_preprocess={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

fn load_config(explicit: Option<PathBuf>) -> Result<WsnConfig> {
    let path = WsnConfig::locate(explicit.as_deref()).context("Failed to locate configuration")?;
    info!("Using config file: {}", path.display());
    WsnConfig::from_file(&path)
        .with_context(|| format!("Failed to read configuration {}", path.display()))
}

fn run_pipeline(
    config_path: Option<PathBuf>,
    quiet: bool,
    run_date: Option<NaiveDate>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(input) = input {
        config = config.with_logging_data_path(input);
    }
    if let Some(output) = output {
        config = config.with_output_folder_path(output);
    }
    if quiet {
        config = config.with_show_progress(false);
    }
    config.validate().context("Invalid configuration")?;

    let run_date = run_date.unwrap_or_else(|| Local::now().date_naive());
    let mut pipeline =
        Pipeline::new(config, run_date).context("Failed to load lookup tables")?;

    if dry_run {
        let pending = pipeline.plan().context("Failed to list pending files")?;
        println!(
            "{} {} files pending for run date {}",
            "Dry run:".bright_yellow().bold(),
            pending.len().to_string().bright_white().bold(),
            pipeline.run_date_token()
        );
        for path in pending {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    let stats = pipeline.run().context("Preprocessing run failed")?;
    print_summary(&stats);
    Ok(())
}

fn print_summary(stats: &ProcessingStats) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {} ({} failed)",
        "Directories:".bright_cyan(),
        stats.directories_scanned.to_string().bright_white(),
        stats.directories_failed
    );
    println!(
        "  {} {} seen, {} skipped, {} empty",
        "Files:".bright_cyan(),
        stats.files_seen,
        stats.files_skipped,
        stats.files_empty
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Rows written:".bright_cyan(),
        stats.rows_written.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Latest samples:".bright_cyan(),
        stats.latest_samples.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        stats.output_path.display()
    );
}

fn run_mirror(
    source: PathBuf,
    dest: PathBuf,
    since: Option<NaiveDate>,
    until: Option<NaiveDate>,
    pattern: &str,
) -> Result<()> {
    let until = until.unwrap_or_else(|| Local::now().date_naive());
    let since = since.unwrap_or(until - Duration::days(7));
    if since > until {
        anyhow::bail!("--since {} is after --until {}", since, until);
    }

    let stats = mirror(&source, &dest, since, until, pattern).with_context(|| {
        format!(
            "Failed to mirror {} into {}",
            source.display(),
            dest.display()
        )
    })?;

    println!("{}", "Mirror complete".bright_green().bold());
    println!(
        "  {} {} new, {} existing",
        "Directories:".bright_cyan(),
        stats.directories_created,
        stats.directories_existing
    );
    println!(
        "  {} {} copied, {} outside {}..{}, {} undated",
        "Files:".bright_cyan(),
        stats.files_copied.to_string().bright_white().bold(),
        stats.files_out_of_window,
        since.format(DATE_TOKEN_FORMAT),
        until.format(DATE_TOKEN_FORMAT),
        stats.files_unparsable
    );
    Ok(())
}

fn run_rebase(
    config_path: Option<PathBuf>,
    from_prefix: &str,
    to_prefix: &str,
    ledger: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let ledger_path = match ledger {
        Some(path) => path,
        None => load_config(config_path)?.ledger_path(),
    };

    let ledger = ProcessedFileLedger::new(&ledger_path);
    let rewritten = ledger
        .rebase(from_prefix, to_prefix, output.as_deref())
        .with_context(|| format!("Failed to rebase ledger {}", ledger_path.display()))?;

    println!(
        "{} {} entries rewritten",
        "Ledger rebased:".bright_green().bold(),
        rewritten.to_string().bright_white().bold()
    );
    Ok(())
}
