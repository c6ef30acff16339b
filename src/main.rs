//! catsplit: split delimited datasets into one file per category value.

use anyhow::{Context, Result};
use catsplit::{InputSpec, MalformedPolicy, OutputFormat, Runner, Separator, SplitConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Split a dataset into multiple files based on a category column.
#[derive(Parser, Debug)]
#[command(name = "catsplit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file, or a directory to scan with --pattern.
    #[arg(long)]
    input_path: PathBuf,

    /// Glob pattern applied inside a directory input.
    #[arg(long, default_value = "*.csv")]
    pattern: String,

    /// Root directory for the per-category output folders.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Column whose values partition the records.
    #[arg(long)]
    category_column: Option<String>,

    /// Output format: csv, txt, tsv, parquet or xlsx.
    #[arg(long)]
    output_format: Option<String>,

    /// Keep the category column in the output files.
    #[arg(long)]
    keep_column: bool,

    /// Input field separator (a single character, a longer string, or "tab").
    #[arg(long)]
    sep: Option<String>,

    /// Output field separator for delimited output.
    #[arg(long)]
    output_sep: Option<String>,

    /// What to do with malformed records: skip or abort.
    #[arg(long)]
    on_malformed: Option<String>,

    /// Number of input files processed concurrently.
    #[arg(long)]
    threads: Option<usize>,

    /// JSON configuration file; flags given on the command line override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the run summary as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&args)?;
    info!(
        column = %config.category_column,
        output = %config.output_directory.display(),
        format = ?config.output_format,
        "catsplit starting"
    );

    let runner = Runner::new(config).context("invalid configuration")?;
    let spec = InputSpec::from_path(&args.input_path, Some(&args.pattern));
    let stats = runner.run_spec(&spec)?;

    stats.print();
    if let Some(report) = &args.report {
        stats.save_to_file(report)?;
        info!(path = %report.display(), "report written");
    }

    std::process::exit(stats.status().exit_code());
}

/// Build configuration from the optional file, then apply flags on top.
fn build_config(args: &Args) -> Result<SplitConfig> {
    let mut config = match &args.config {
        Some(path) => SplitConfig::from_json_file(path)?,
        None => SplitConfig::default(),
    };
    if let Some(column) = &args.category_column {
        config.category_column.clone_from(column);
    }
    if let Some(dir) = &args.output_dir {
        config.output_directory.clone_from(dir);
    }
    if let Some(name) = &args.output_format {
        let (format, extension) = OutputFormat::parse_with_extension(name)?;
        config.output_format = format;
        if config.output_extension.is_none() && extension != format.default_extension() {
            config.output_extension = Some(extension.to_string());
        }
    }
    if args.keep_column {
        config.keep_category_column = true;
    }
    if let Some(sep) = &args.sep {
        config.input_separator = sep.parse::<Separator>().context("--sep")?;
    }
    if let Some(sep) = &args.output_sep {
        config.output_separator = sep.parse::<Separator>().context("--output-sep")?;
    }
    if let Some(policy) = &args.on_malformed {
        config.malformed_policy = policy.parse::<MalformedPolicy>()?;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    Ok(config)
}
