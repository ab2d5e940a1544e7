// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unmark — batch highlight removal for PDF documents
//
// Entry point. Parses arguments, initialises logging, resolves configuration,
// discovers jobs and runs them through the selected engine.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use unmark_batch::{Discovery, Orchestrator, RasterEngine, RewriteEngine};
use unmark_core::error::Result;
use unmark_core::{BatchReport, Mode, Rgb, UnmarkConfig};
use unmark_document::PdfiumRasterizer;

/// Remove highlight colors from PDF documents.
#[derive(Debug, Parser)]
#[command(name = "unmark", version, about)]
struct Cli {
    /// Document or directory to process
    path: PathBuf,

    /// Engine: "fast" rewrites content streams, "slow" rasterizes and filters
    #[arg(short, long)]
    mode: Option<String>,

    /// Descend into subdirectories and mirror the tree in the output
    #[arg(short, long)]
    recursive: bool,

    /// Output root (default: <input dir>/processed_PDFs)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rasterization resolution for slow mode
    #[arg(long)]
    dpi: Option<u32>,

    /// Distance from black above which slow mode whitens a pixel
    #[arg(long)]
    threshold: Option<f64>,

    /// Highlight color fast mode replaces (#RRGGBB or r,g,b)
    #[arg(long)]
    target: Option<String>,

    /// Color written in place of the highlight
    #[arg(long)]
    replacement: Option<String>,

    /// Parallel jobs (fast mode only)
    #[arg(long)]
    workers: Option<usize>,

    /// Leave existing output files untouched
    #[arg(long)]
    skip_existing: bool,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!("Unmark starting");

    match run(&cli) {
        Ok(batch_report) => {
            report::print_report(&batch_report, cli.json);
            if batch_report.failed() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            tracing::error!(stage = %err.stage(), "Run aborted: {}", err);
            report::print_error(&err, cli.json);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<BatchReport> {
    let config = resolve_config(cli)?;
    let batch = Discovery::from_config(&config).discover(
        &cli.path,
        cli.output.as_deref(),
        cli.recursive,
    )?;
    let orchestrator = Orchestrator::new(&config);

    let batch_report = match config.mode {
        Mode::Fast => {
            let engine = RewriteEngine::from_config(&config);
            orchestrator.run_parallel(&batch, &engine, config.workers)
        }
        Mode::Slow => {
            if config.workers > 1 {
                tracing::warn!(workers = config.workers, "Slow mode runs jobs sequentially");
            }
            let rasterizer = PdfiumRasterizer::bind(config.pdfium_library_dir.as_deref())?;
            let engine = RasterEngine::from_config(rasterizer, &config);
            orchestrator.run(&batch, &engine)
        }
    };
    Ok(batch_report)
}

/// Defaults, then the config file, then flags; validated as a whole.
fn resolve_config(cli: &Cli) -> Result<UnmarkConfig> {
    let mut config = match &cli.config {
        Some(path) => UnmarkConfig::load(path)?,
        None => UnmarkConfig::default(),
    };

    if let Some(mode) = &cli.mode {
        config.mode = mode.parse::<Mode>()?;
    }
    if let Some(dpi) = cli.dpi {
        config.dpi = dpi;
    }
    if let Some(threshold) = cli.threshold {
        config.black_threshold = threshold;
    }
    if let Some(target) = &cli.target {
        config.target_color = target.parse::<Rgb>()?;
    }
    if let Some(replacement) = &cli.replacement {
        config.replacement_color = replacement.parse::<Rgb>()?;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if cli.skip_existing {
        config.overwrite = unmark_core::OverwritePolicy::Skip;
    }

    config.validate()?;
    Ok(config)
}
