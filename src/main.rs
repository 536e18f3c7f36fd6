use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use imposer::config::PressConfig;
use imposer::layout::{load_layout, validate_layout};
use imposer::pipeline::{
    generate_spread, persist_outputs, render_many, BatchJob, RenderOptions,
};
use imposer::print_effects::apply_chain;
use imposer::qa::{placed_from_layout, run_qa};
use imposer::report::ValidationReport;

#[derive(Debug, Parser)]
#[command(name = "imposer")]
#[command(about = "Print-spread imposition engine", version = &*version_string().leak())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a layout and print its report. Exit 1 when errors exist.
    Validate {
        layout: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render one or more spreads. With several layouts, --output is a
    /// directory and each spread lands as <stem>.png beside its report.
    Render {
        #[arg(required = true)]
        layouts: Vec<PathBuf>,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "assets/generated")]
        asset_root: PathBuf,
        /// Skip the press-artifact chain (faster proofing renders).
        #[arg(long)]
        skip_effects: bool,
        /// Write the JSON report here instead of beside the raster
        /// (single-layout renders only).
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Audit an already-rendered raster against its layout.
    Qa {
        raster: PathBuf,
        layout: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Apply the press-artifact chain to an existing raster.
    Postfx {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Validate { layout, config } => run_validate(&layout, config.as_deref()),
        Commands::Render {
            layouts,
            output,
            config,
            asset_root,
            skip_effects,
            report,
            workers,
        } => run_render(
            &layouts,
            &output,
            config.as_deref(),
            &asset_root,
            skip_effects,
            report.as_deref(),
            workers,
        ),
        Commands::Qa {
            raster,
            layout,
            config,
        } => run_qa_command(&raster, &layout, config.as_deref()),
        Commands::Postfx {
            input,
            output,
            config,
        } => run_postfx(&input, &output, config.as_deref()),
    };

    match outcome {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PressConfig> {
    match path {
        Some(path) => PressConfig::load(path),
        None => {
            let config = PressConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn print_report(report: &ValidationReport, score: Option<f64>) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.envelope(score))?;
    println!("{json}");
    Ok(())
}

fn run_validate(layout_path: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let doc = load_layout(layout_path)?;

    match validate_layout(&doc, &config) {
        Ok(layout) => {
            let report = ValidationReport::new();
            print_report(&report, None)?;
            eprintln!(
                "OK: {} ({} elements, paper '{}')",
                layout_path.display(),
                layout.elements.len(),
                layout.paper
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(report) => {
            print_report(&report, None)?;
            eprintln!(
                "FAIL: {} ({} errors)",
                layout_path.display(),
                report.error_count()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_render(
    layouts: &[PathBuf],
    output: &Path,
    config_path: Option<&Path>,
    asset_root: &Path,
    skip_effects: bool,
    report_path: Option<&Path>,
    workers: usize,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let options = RenderOptions {
        asset_root: asset_root.to_path_buf(),
        apply_effects: !skip_effects,
    };

    if layouts.len() == 1 && output.extension().is_some() {
        let outcome = generate_spread(&config, &layouts[0], &options)?;
        persist_outputs(&outcome, output, report_path)?;
        print_report(&outcome.report, outcome.score)?;
        return Ok(if outcome.raster.is_some() {
            eprintln!("Wrote {}", output.display());
            ExitCode::SUCCESS
        } else {
            eprintln!("FAIL: {} not rendered", layouts[0].display());
            ExitCode::FAILURE
        });
    }

    if report_path.is_some() {
        bail!("--report applies to single-layout renders; batch reports land beside each raster");
    }

    let jobs: Vec<BatchJob> = layouts
        .iter()
        .map(|layout| {
            let stem = layout
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "spread".to_owned());
            BatchJob {
                layout: layout.clone(),
                output: output.join(format!("{stem}.png")),
            }
        })
        .collect();

    let results = render_many(&config, &jobs, &options, workers)?;
    let mut failed = 0_usize;
    for (layout, outcome) in &results {
        if outcome.raster.is_some() {
            eprintln!(
                "rendered {} ({} warnings)",
                layout.display(),
                outcome.report.warning_count()
            );
        } else {
            failed += 1;
            eprintln!(
                "failed {} ({} errors)",
                layout.display(),
                outcome.report.error_count()
            );
        }
    }
    eprintln!("{}/{} spreads rendered", results.len() - failed, results.len());

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_qa_command(
    raster_path: &Path,
    layout_path: &Path,
    config_path: Option<&Path>,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let doc = load_layout(layout_path)?;
    let layout = match validate_layout(&doc, &config) {
        Ok(layout) => layout,
        Err(report) => {
            print_report(&report, None)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let raster = image::open(raster_path)
        .with_context(|| format!("failed to read raster {}", raster_path.display()))?
        .to_rgba8();
    if raster.width() != config.canvas.width || raster.height() != config.canvas.height {
        bail!(
            "raster is {}x{}, canvas expects {}x{}",
            raster.width(),
            raster.height(),
            config.canvas.width,
            config.canvas.height
        );
    }

    let placed = placed_from_layout(&layout);
    let outcome = run_qa(
        raster.as_raw(),
        raster.width(),
        raster.height(),
        &placed,
        &config,
    );
    print_report(&outcome.report, Some(outcome.score))?;
    eprintln!(
        "score {:.2} ({} findings)",
        outcome.score,
        outcome.report.findings().len()
    );
    // QA findings are advisories: they gate acceptance downstream, not here.
    Ok(ExitCode::SUCCESS)
}

fn run_postfx(input: &Path, output: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let raster = image::open(input)
        .with_context(|| format!("failed to read raster {}", input.display()))?
        .to_rgba8();
    let (width, height) = (raster.width(), raster.height());

    let mut rgba = raster.into_raw();
    // Scale the spine columns when the raster is not at canvas size, so a
    // proof at half resolution still shades the right region.
    let scale = width as f64 / config.canvas.width as f64;
    let spine = (
        (config.canvas.spine_start() as f64 * scale) as u32,
        (config.canvas.spine_end() as f64 * scale) as u32,
    );
    apply_chain(&mut rgba, width, height, spine, &config.effects);

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let buffer: image::RgbaImage = image::ImageBuffer::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("raster buffer does not match its declared dimensions"))?;
    buffer
        .save(output)
        .with_context(|| format!("failed to write raster {}", output.display()))?;

    eprintln!("Wrote {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn version_string() -> String {
    match option_env!("IMPOSER_GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{} ({hash})", env!("CARGO_PKG_VERSION")),
        _ => env!("CARGO_PKG_VERSION").to_owned(),
    }
}
