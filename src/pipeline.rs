//! Spread generation pipeline: validate, estimate, composite, post-process,
//! QA. Stages run strictly forward; output is persisted only after the full
//! pipeline completes, so an abort between stages leaves nothing on disk.
//!
//! Spreads are independent units of work. `render_many` fans a batch out
//! over worker threads with no shared mutable state; each worker owns its
//! font library, and the configuration is read-only.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context, Result};

use crate::compositor::Compositor;
use crate::config::PressConfig;
use crate::layout::{load_layout, validate_layout, Layout};
use crate::print_effects::apply_chain;
use crate::qa::run_qa;
use crate::report::{Finding, ValidationReport};
use crate::typeset::{estimate_fit, FitClass, FontLibrary};

pub struct RasterOutput {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Everything one spread run produces: the full report, the QA score when
/// QA ran, and the raster when no fatal finding stopped the compositor.
pub struct SpreadOutcome {
    pub report: ValidationReport,
    pub score: Option<f64>,
    pub raster: Option<RasterOutput>,
}

pub struct RenderOptions {
    pub asset_root: PathBuf,
    pub apply_effects: bool,
}

/// Run the whole pipeline for one layout file. Infrastructure failures
/// (unreadable files, broken YAML) come back as `Err`; domain findings are
/// always inside the returned report.
pub fn generate_spread(
    config: &PressConfig,
    layout_path: &Path,
    options: &RenderOptions,
) -> Result<SpreadOutcome> {
    let doc = load_layout(layout_path)?;
    let layout = match validate_layout(&doc, config) {
        Ok(layout) => layout,
        Err(report) => {
            return Ok(SpreadOutcome {
                report,
                score: None,
                raster: None,
            })
        }
    };

    let mut report = ValidationReport::new();
    let mut fonts = FontLibrary::new(&config.typography.font_dir);
    estimate_typography(&layout, config, &mut fonts, &mut report);

    let mut compositor = Compositor::new(config, &mut fonts, &options.asset_root);
    let Some(mut spread) = compositor.compose(&layout, &mut report)? else {
        return Ok(SpreadOutcome {
            report,
            score: None,
            raster: None,
        });
    };

    if options.apply_effects {
        apply_chain(
            &mut spread.rgba,
            spread.width,
            spread.height,
            (config.canvas.spine_start(), config.canvas.spine_end()),
            &config.effects,
        );
    }

    let qa = run_qa(&spread.rgba, spread.width, spread.height, &spread.placed, config);
    report.merge(qa.report);

    Ok(SpreadOutcome {
        report,
        score: Some(qa.score),
        raster: Some(RasterOutput {
            width: spread.width,
            height: spread.height,
            rgba: spread.rgba,
        }),
    })
}

/// Cheap rejection before any pixel work: flag containers whose text is
/// close to, or past, capacity. Missing fonts are left for the compositor,
/// which reports them as unresolved assets.
fn estimate_typography(
    layout: &Layout,
    config: &PressConfig,
    fonts: &mut FontLibrary,
    report: &mut ValidationReport,
) {
    let pad = config.typography.wrap_padding;
    for element in &layout.elements {
        let Some(spec) = &element.text else {
            continue;
        };
        let Ok(font) = fonts.get(&spec.font) else {
            continue;
        };
        let padded = element.base_rect().inset(pad, pad);
        let estimate = estimate_fit(font, spec, padded, &config.typography);
        match estimate.class {
            FitClass::Ok => {}
            FitClass::Warn => report.push(Finding::overflow(
                &element.tag_id,
                format!(
                    "text is nearing capacity: estimated {:.0}% of the padded container",
                    estimate.used_fraction * 100.0
                ),
            )),
            FitClass::OverflowRisk => report.push(Finding::overflow(
                &element.tag_id,
                format!(
                    "text will likely overflow: estimated {:.0}% of the padded container",
                    estimate.used_fraction * 100.0
                ),
            )),
        }
    }
}

/// Persist the raster and its machine-readable report. Nothing is written
/// unless the raster exists; the report lands next to it unless an explicit
/// path overrides that.
pub fn persist_outputs(
    outcome: &SpreadOutcome,
    raster_path: &Path,
    report_path: Option<&Path>,
) -> Result<()> {
    let Some(raster) = &outcome.raster else {
        return Ok(());
    };

    if let Some(parent) = raster_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let buffer: image::RgbaImage =
        image::ImageBuffer::from_raw(raster.width, raster.height, raster.rgba.clone())
            .ok_or_else(|| anyhow!("raster buffer does not match its declared dimensions"))?;
    buffer
        .save(raster_path)
        .with_context(|| format!("failed to write raster {}", raster_path.display()))?;

    let report_path = report_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| report_path_for(raster_path));
    let json = serde_json::to_string_pretty(&outcome.report.envelope(outcome.score))?;
    std::fs::write(&report_path, json)
        .with_context(|| format!("failed to write report {}", report_path.display()))?;

    Ok(())
}

pub fn report_path_for(raster_path: &Path) -> PathBuf {
    let mut name = raster_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spread".to_owned());
    name.push_str(".report.json");
    raster_path.with_file_name(name)
}

pub struct BatchJob {
    pub layout: PathBuf,
    pub output: PathBuf,
}

/// Render a batch of independent spreads across a bounded worker pool.
/// Results come back in job order.
pub fn render_many(
    config: &PressConfig,
    jobs: &[BatchJob],
    options: &RenderOptions,
    workers: usize,
) -> Result<Vec<(PathBuf, SpreadOutcome)>> {
    let workers = workers.max(1).min(jobs.len().max(1));
    let chunk_size = jobs.len().div_ceil(workers);

    let results = thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in jobs.chunks(chunk_size.max(1)) {
            handles.push(scope.spawn(move || {
                let mut outcomes = Vec::with_capacity(chunk.len());
                for job in chunk {
                    let outcome = generate_spread(config, &job.layout, options)
                        .and_then(|outcome| {
                            persist_outputs(&outcome, &job.output, None)?;
                            Ok(outcome)
                        });
                    outcomes.push((job.layout.clone(), outcome));
                }
                outcomes
            }));
        }

        let mut collected = Vec::with_capacity(jobs.len());
        for handle in handles {
            match handle.join() {
                Ok(outcomes) => collected.extend(outcomes),
                Err(_) => collected.push((
                    PathBuf::new(),
                    Err(anyhow!("render worker thread panicked")),
                )),
            }
        }
        collected
    });

    results
        .into_iter()
        .map(|(path, outcome)| outcome.map(|outcome| (path, outcome)))
        .collect()
}
