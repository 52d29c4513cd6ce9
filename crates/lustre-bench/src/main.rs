//! lustre-bench: CLI tool for running the enhancement pipeline on image files.
//!
//! Decodes an image, runs it through the pipeline in preview or final
//! mode with the given settings, optionally writes the result, and
//! prints per-stage diagnostics. Useful for:
//!
//! - Comparing preview and final output for the same settings
//! - Measuring per-stage durations to find the expensive filters
//! - Checking thread pool sizing with `--threads`
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin lustre-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); use
//! `RUST_LOG=lustre_pipeline=debug` to see every stage's parameters.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use lustre_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use lustre_pipeline::{
    FilterSettings, Output, OutputFormat, PipelineConfig, ProcessingResult, Validation,
};

/// Enhancement pipeline runner and diagnostics for lustre.
///
/// Runs the enhancement pipeline on a given image with configurable
/// settings and prints per-stage timing and parameter diagnostics.
#[derive(Parser)]
#[command(name = "lustre-bench", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Pipeline mode.
    #[arg(long, value_enum, default_value_t = Mode::Preview)]
    mode: Mode,

    /// Unsharp mask strength (0-100).
    #[arg(long, default_value_t = 0.0)]
    sharpening: f64,

    /// Bilateral denoise strength (0-100).
    #[arg(long, default_value_t = 0.0)]
    denoising: f64,

    /// Brightness (-50 to 50).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    brightness: f64,

    /// Contrast (-50 to 50).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    contrast: f64,

    /// Saturation (-50 to 50).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    saturation: f64,

    /// Run the fixed enhancement chain.
    #[arg(long)]
    ai_enhance: bool,

    /// Filter settings as a JSON string (camelCase keys).
    ///
    /// When provided, the individual setting flags are ignored.
    #[arg(long)]
    settings_json: Option<String>,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--threads`, `--strict` and `--raw` are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Run inside a dedicated thread pool of this size.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    threads: Option<usize>,

    /// Reject out-of-range settings instead of clamping them.
    #[arg(long)]
    strict: bool,

    /// Produce a raw raster (written as PNG) instead of JPEG bytes.
    #[arg(long)]
    raw: bool,

    /// Write the enhanced image to this file (first run only).
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Print the source image metadata as JSON and exit.
    #[arg(long)]
    info: bool,
}

/// Pipeline mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Downscaled interactive preview.
    Preview,
    /// Full-quality output.
    Final,
}

impl From<Mode> for lustre_pipeline::Mode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Preview => Self::Preview,
            Mode::Final => Self::Final,
        }
    }
}

/// Build [`FilterSettings`] from CLI arguments.
///
/// If `--settings-json` is provided, the JSON is parsed directly and the
/// individual setting flags are ignored.
fn settings_from_cli(cli: &Cli) -> Result<FilterSettings, String> {
    if let Some(ref json) = cli.settings_json {
        return serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --settings-json: {e}"));
    }

    Ok(FilterSettings {
        sharpening: cli.sharpening,
        denoising: cli.denoising,
        brightness: cli.brightness,
        contrast: cli.contrast,
        saturation: cli.saturation,
        ai_enhance: cli.ai_enhance,
    })
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        output: if cli.raw {
            OutputFormat::Raw
        } else {
            OutputFormat::Jpeg
        },
        validation: if cli.strict {
            Validation::Strict
        } else {
            Validation::Clamp
        },
        threads: cli.threads,
        ..PipelineConfig::default()
    })
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    if cli.info {
        return print_metadata(&image_bytes);
    }

    let settings = match settings_from_cli(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match lustre_pipeline::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let mode = lustre_pipeline::Mode::from(cli.mode);
    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        image.width(),
        image.height(),
    );
    eprintln!("Mode: {mode}");
    eprintln!("Settings: {settings:#?}");
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match lustre_pipeline::diagnostics::process_with_diagnostics(
            image.clone(),
            &settings,
            mode,
            &config,
            &StdClock,
        ) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the image on the first run only.
                if run == 0
                    && let Some(ref path) = cli.output
                    && let Err(msg) = write_output(&result, path)
                {
                    eprintln!("{msg}");
                    return ExitCode::FAILURE;
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn print_metadata(image_bytes: &[u8]) -> ExitCode {
    let metadata = match lustre_pipeline::image_metadata(image_bytes) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error reading image metadata: {e}");
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&metadata) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing metadata: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Write encoded bytes verbatim, or a raw raster as PNG.
fn write_output(result: &ProcessingResult, path: &Path) -> Result<(), String> {
    let written = match &result.output {
        Output::Encoded { bytes, .. } => std::fs::write(path, bytes)
            .map(|()| bytes.len())
            .map_err(|e| e.to_string()),
        Output::Raw(image) => image
            .save_with_format(path, image::ImageFormat::Png)
            .map(|()| image.as_raw().len())
            .map_err(|e| e.to_string()),
    }
    .map_err(|e| format!("Error writing {}: {e}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        width = result.dimensions.width,
        height = result.dimensions.height,
        bytes = written,
        "output written",
    );
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means. Every run has the same plan, so the first run's
    // stage order is used for all of them.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in &all_diagnostics[0].stages {
        let name = stage.name.as_str();
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(name))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
