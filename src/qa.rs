//! Post-render quality assurance.
//!
//! Re-derives the geometric checks from the boxes the compositor actually
//! painted (defense in depth against the pre-flight pass), measures text
//! contrast against the local background, audits the palette share budget,
//! and flags smooth gradient bands a period press could not have printed.
//! Every finding here is advisory: QA gates downstream acceptance, never
//! the render that already happened.

use crate::compositor::PlacedElement;
use crate::config::PressConfig;
use crate::geometry::{PageHalf, Rect};
use crate::layout::Layout;
use crate::report::{Finding, ValidationReport};
use crate::schema::{ElementKind, Rgb};

pub struct QaOutcome {
    pub report: ValidationReport,
    /// Mean of the per-check scores, 0.0-1.0.
    pub score: f64,
}

/// Derive screen-space boxes from a layout alone, for auditing a raster
/// without compositor placement records.
pub fn placed_from_layout(layout: &Layout) -> Vec<PlacedElement> {
    layout
        .elements
        .iter()
        .map(|element| PlacedElement {
            tag_id: element.tag_id.clone(),
            kind: element.kind,
            bounds: element.painted_bounds(),
            content_key: None,
        })
        .collect()
}

pub fn run_qa(
    rgba: &[u8],
    width: u32,
    height: u32,
    placed: &[PlacedElement],
    config: &PressConfig,
) -> QaOutcome {
    let mut report = ValidationReport::new();
    let mut scores = Vec::with_capacity(4);

    scores.push(check_geometry(placed, config, &mut report));
    scores.push(check_text_contrast(rgba, width, height, placed, config, &mut report));
    scores.push(check_color_budget(rgba, config, &mut report));
    scores.push(check_gradient_bands(rgba, width, height, config, &mut report));

    let score = scores.iter().sum::<f64>() / scores.len() as f64;
    QaOutcome { report, score }
}

/// Spine exclusivity and safe-zone containment, recomputed from rendered
/// boxes.
fn check_geometry(
    placed: &[PlacedElement],
    config: &PressConfig,
    report: &mut ValidationReport,
) -> f64 {
    let spine = config.canvas.spine_rect();
    let mut clean = true;

    for element in placed {
        if element.kind == ElementKind::SpiralBinding {
            continue;
        }
        if element.bounds.intersects(&spine) {
            clean = false;
            report.push(Finding::qa(
                Some(&element.tag_id),
                format!(
                    "rendered box x={:.0}..{:.0} intersects the spine dead zone",
                    element.bounds.left(),
                    element.bounds.right()
                ),
            ));
        }

        let Some(half) = PageHalf::from_tag(&element.tag_id) else {
            continue;
        };
        let critical = if element.kind.is_text() {
            let pad = config.typography.wrap_padding;
            element.bounds.inset(pad, pad)
        } else {
            element.bounds
        };
        if !config.safe_rect(half).contains_rect(&critical) {
            clean = false;
            report.push(Finding::qa(
                Some(&element.tag_id),
                "rendered content-critical region escapes the safe zone",
            ));
        }
    }

    if clean {
        1.0
    } else {
        0.5
    }
}

/// RMS contrast of each text region, converted to a rough WCAG-style ratio
/// and held against the configured floor.
fn check_text_contrast(
    rgba: &[u8],
    width: u32,
    height: u32,
    placed: &[PlacedElement],
    config: &PressConfig,
    report: &mut ValidationReport,
) -> f64 {
    let mut clean = true;

    for element in placed {
        if !element.kind.is_text() {
            continue;
        }
        let Some(ratio) = region_contrast(rgba, width, height, &element.bounds) else {
            continue;
        };
        if ratio < config.color_budget.contrast_floor {
            clean = false;
            report.push(Finding::qa(
                Some(&element.tag_id),
                format!(
                    "text contrast {ratio:.2} is below the {:.1} floor",
                    config.color_budget.contrast_floor
                ),
            ));
        }
    }

    if clean {
        1.0
    } else {
        0.6
    }
}

fn region_contrast(rgba: &[u8], width: u32, height: u32, region: &Rect) -> Option<f64> {
    let x0 = region.left().max(0.0) as u32;
    let y0 = region.top().max(0.0) as u32;
    let x1 = (region.right().min(width as f32)) as u32;
    let y1 = (region.bottom().min(height as f32)) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let mut sum = 0.0_f64;
    let mut sum_sq = 0.0_f64;
    let mut count = 0_u64;
    for y in (y0..y1).step_by(2) {
        for x in (x0..x1).step_by(2) {
            let idx = ((y * width + x) * 4) as usize;
            let luma = f64::from(bt709_luma(rgba[idx], rgba[idx + 1], rgba[idx + 2]));
            sum += luma;
            sum_sq += luma * luma;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    if mean <= 0.0 {
        return Some(0.0);
    }
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    let rms = variance.sqrt() / mean;
    Some((1.0 + rms * 10.0).min(21.0))
}

/// 70/20/10 rule: accent and acid shares against their ceilings, the
/// primary remainder against its floor. Every tenth pixel is sampled.
fn check_color_budget(rgba: &[u8], config: &PressConfig, report: &mut ValidationReport) -> f64 {
    let budget = &config.color_budget;
    let accent = config.palette.accent;
    let acid = config.palette.acid;

    let mut accent_hits = 0_u64;
    let mut acid_hits = 0_u64;
    let mut sampled = 0_u64;

    for pixel in rgba.chunks_exact(4).step_by(10) {
        sampled += 1;
        if color_distance(pixel, accent) < budget.match_distance {
            accent_hits += 1;
        } else if color_distance(pixel, acid) < budget.match_distance {
            acid_hits += 1;
        }
    }
    if sampled == 0 {
        return 1.0;
    }

    let accent_ratio = accent_hits as f64 / sampled as f64;
    let acid_ratio = acid_hits as f64 / sampled as f64;
    let primary_ratio = 1.0 - accent_ratio - acid_ratio;
    let mut clean = true;

    if accent_ratio > budget.accent_max {
        clean = false;
        report.push(Finding::qa(
            None,
            format!(
                "accent share {:.1}% exceeds the {:.0}% ceiling",
                accent_ratio * 100.0,
                budget.accent_max * 100.0
            ),
        ));
    }
    if acid_ratio > budget.acid_max {
        clean = false;
        report.push(Finding::qa(
            None,
            format!(
                "acid-green share {:.1}% exceeds the {:.0}% ceiling",
                acid_ratio * 100.0,
                budget.acid_max * 100.0
            ),
        ));
    }
    if primary_ratio < budget.primary_min {
        clean = false;
        report.push(Finding::qa(
            None,
            format!(
                "primary palette share {:.1}% is under the {:.0}% floor",
                primary_ratio * 100.0,
                budget.primary_min * 100.0
            ),
        ));
    }

    if clean {
        1.0
    } else {
        0.5
    }
}

/// Bucket-count ceiling per sampled row. Quantization at 32 levels per
/// channel keeps paper grain, vignette, and spine shadow well under the
/// ceiling; multi-channel design gradients sail past it.
const GRADIENT_TONE_CEILING: usize = 80;

/// Color ramps read as modern artwork. Rows are sampled and quantized so
/// print texture does not trip the detector; the spine dead zone is
/// excluded because the binding art and its shadow legitimately ramp.
fn check_gradient_bands(
    rgba: &[u8],
    width: u32,
    height: u32,
    config: &PressConfig,
    report: &mut ValidationReport,
) -> f64 {
    let spine_start = config.canvas.spine_start();
    let spine_end = config.canvas.spine_end();
    let mut worst: Option<(u32, usize)> = None;

    for y in (0..height).step_by(20) {
        let mut buckets = std::collections::BTreeSet::new();
        for x in 0..width {
            if x >= spine_start && x < spine_end {
                continue;
            }
            let idx = ((y * width + x) * 4) as usize;
            // 32 levels per channel.
            let key = (u32::from(rgba[idx] >> 3) << 10)
                | (u32::from(rgba[idx + 1] >> 3) << 5)
                | u32::from(rgba[idx + 2] >> 3);
            buckets.insert(key);
        }
        if buckets.len() > GRADIENT_TONE_CEILING
            && worst.map_or(true, |(_, count)| buckets.len() > count)
        {
            worst = Some((y, buckets.len()));
        }
    }

    match worst {
        Some((row, count)) => {
            report.push(Finding::qa(
                None,
                format!("gradient band at row {row}: {count} distinct tones"),
            ));
            0.4
        }
        None => 1.0,
    }
}

fn color_distance(pixel: &[u8], reference: Rgb) -> f64 {
    let dr = f64::from(pixel[0]) - f64::from(reference.r());
    let dg = f64::from(pixel[1]) - f64::from(reference.g());
    let db = f64::from(pixel[2]) - f64::from(reference.b());
    (dr * dr + dg * dg + db * db).sqrt()
}

#[inline(always)]
fn bt709_luma(r: u8, g: u8, b: u8) -> u8 {
    ((u16::from(r) * 54 + u16::from(g) * 183 + u16::from(b) * 19) >> 8) as u8
}
