//! Typography: pre-render fit estimation and programmatic text rasterization.
//!
//! Fit estimation runs before any pixel work and uses real font metrics
//! (advance widths, line metrics) to flag containers whose text will not
//! fit. The [`TextMeasure`] seam keeps the estimator testable without font
//! files on disk; production code feeds it a fontdue [`Font`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};

use crate::config::TypographyConfig;
use crate::geometry::Rect;
use crate::schema::{Justify, TextSpec};

/// Metric queries the estimator needs. Implemented by fontdue fonts and by
/// fixed-width doubles in tests.
pub trait TextMeasure {
    fn advance(&self, ch: char, px: f32) -> f32;
    /// Baseline-to-baseline height before leading is added.
    fn line_height(&self, px: f32) -> f32;
}

impl TextMeasure for Font {
    fn advance(&self, ch: char, px: f32) -> f32 {
        self.metrics(ch, px).advance_width
    }

    fn line_height(&self, px: f32) -> f32 {
        self.horizontal_line_metrics(px)
            .map(|metrics| metrics.new_line_size)
            .unwrap_or(px * 1.2)
    }
}

/// Lazily-loaded fonts resolved as `<font_dir>/<family>.ttf`. Font files
/// are read-only shared state; each worker thread owns its own library.
pub struct FontLibrary {
    dir: PathBuf,
    fonts: HashMap<String, Font>,
}

impl FontLibrary {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fonts: HashMap::new(),
        }
    }

    pub fn get(&mut self, family: &str) -> Result<&Font> {
        match self.fonts.entry(family.to_owned()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let path = self.dir.join(format!("{family}.ttf"));
                let bytes = fs::read(&path)
                    .with_context(|| format!("failed to read font file {}", path.display()))?;
                let font = Font::from_bytes(bytes, FontSettings::default())
                    .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))?;
                Ok(slot.insert(font))
            }
        }
    }
}

/// Greedy word wrap at `max_width`. Hard newlines and blank lines are
/// preserved; a word wider than the container gets its own line and is
/// caught later by the width check.
pub fn wrap_text(measure: &dyn TextMeasure, content: &str, px: f32, max_width: f32) -> Vec<String> {
    let space = measure.advance(' ', px);
    let mut wrapped = Vec::new();

    for raw_line in content.trim_end().split('\n') {
        if raw_line.trim().is_empty() {
            wrapped.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_width = 0.0_f32;
        for word in raw_line.split_whitespace() {
            let word_width: f32 = word.chars().map(|ch| measure.advance(ch, px)).sum();
            let candidate = if current.is_empty() {
                word_width
            } else {
                current_width + space + word_width
            };
            if candidate <= max_width || current.is_empty() {
                if !current.is_empty() {
                    current.push(' ');
                    current_width += space;
                }
                current.push_str(word);
                current_width += word_width;
            } else {
                wrapped.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            }
        }
        if !current.is_empty() {
            wrapped.push(current);
        }
    }

    wrapped
}

pub fn line_width(measure: &dyn TextMeasure, line: &str, px: f32) -> f32 {
    line.chars().map(|ch| measure.advance(ch, px)).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitClass {
    Ok,
    Warn,
    OverflowRisk,
}

#[derive(Debug, Clone)]
pub struct FitEstimate {
    pub lines: usize,
    pub line_height: f32,
    pub est_height: f32,
    /// Estimated text area over padded container area.
    pub used_fraction: f32,
    pub class: FitClass,
}

/// Estimate how much of the padded container the text will occupy. Pure
/// measurement: no pixels are produced here.
pub fn estimate_fit(
    measure: &dyn TextMeasure,
    spec: &TextSpec,
    padded: Rect,
    typography: &TypographyConfig,
) -> FitEstimate {
    let leading = spec.leading.unwrap_or(typography.default_leading);
    let line_height = measure.line_height(spec.size) + leading;
    let lines = wrap_text(measure, &spec.content, spec.size, padded.w);
    let est_height = lines.len() as f32 * line_height;
    let used_fraction = if padded.area() > 0.0 {
        (est_height * padded.w) / padded.area()
    } else {
        f32::INFINITY
    };

    let class = if used_fraction <= typography.warn_fraction {
        FitClass::Ok
    } else if used_fraction <= typography.overflow_fraction {
        FitClass::Warn
    } else {
        FitClass::OverflowRisk
    };

    FitEstimate {
        lines: lines.len(),
        line_height,
        est_height,
        used_fraction,
        class,
    }
}

/// Rendered text block, straight-alpha RGBA, transparent background.
pub struct TextBlock {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Rasterize the wrapped text into a block exactly `padded_width` wide.
///
/// A line wider than the container is a hard error: silent clipping would
/// hide content loss on the printed page.
pub fn render_text(
    font: &Font,
    spec: &TextSpec,
    padded_width: f32,
    typography: &TypographyConfig,
) -> Result<TextBlock> {
    let leading = spec.leading.unwrap_or(typography.default_leading);
    let line_height = TextMeasure::line_height(font, spec.size) + leading;
    let lines = wrap_text(font, &spec.content, spec.size, padded_width);

    for line in &lines {
        let width = line_width(font, line, spec.size);
        if width > padded_width + 0.5 {
            bail!(
                "line '{line}' measures {width:.0}px, wider than the {padded_width:.0}px container"
            );
        }
    }

    let block_width = padded_width.ceil().max(1.0) as u32;
    let block_height = ((lines.len() as f32 * line_height).ceil().max(1.0)) as u32;
    let mut rgba = vec![0u8; (block_width * block_height * 4) as usize];

    let mut glyph_cache: HashMap<fontdue::layout::GlyphRasterConfig, GlyphBitmap> = HashMap::new();
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);

    for (index, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let x = match spec.justify {
            Justify::Left => 0.0,
            Justify::Center => ((padded_width - line_width(font, line, spec.size)) / 2.0).max(0.0),
        };
        let y = index as f32 * line_height;

        layout.reset(&LayoutSettings {
            x,
            y,
            max_width: None,
            max_height: None,
            horizontal_align: fontdue::layout::HorizontalAlign::Left,
            vertical_align: fontdue::layout::VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: fontdue::layout::WrapStyle::Word,
            wrap_hard_breaks: false,
        });
        layout.append(&[font], &TextStyle::new(line, spec.size, 0));

        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let bitmap = glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, mask) = font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    mask,
                }
            });
            stamp_glyph(
                &mut rgba,
                block_width,
                block_height,
                glyph.x.round() as i32,
                glyph.y.round() as i32,
                bitmap,
                [spec.color.r(), spec.color.g(), spec.color.b()],
            );
        }
    }

    Ok(TextBlock {
        width: block_width,
        height: block_height,
        rgba,
    })
}

struct GlyphBitmap {
    width: usize,
    height: usize,
    mask: Vec<u8>,
}

/// Stamp a coverage mask into a transparent block: color channels are the
/// text color, alpha accumulates with max so overlapping glyph edges do
/// not double-darken.
fn stamp_glyph(
    rgba: &mut [u8],
    block_width: u32,
    block_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 3],
) {
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= block_height as i32 {
            continue;
        }
        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= block_width as i32 {
                continue;
            }
            let mask = glyph.mask[row * glyph.width + col];
            if mask == 0 {
                continue;
            }
            let idx = ((py as u32 * block_width + px as u32) * 4) as usize;
            rgba[idx] = color[0];
            rgba[idx + 1] = color[1];
            rgba[idx + 2] = color[2];
            rgba[idx + 3] = rgba[idx + 3].max(mask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Rgb;

    /// Every glyph advances the same amount; line height is fixed. Enough
    /// to drive the wrap and fit logic without a real font.
    struct FixedAdvance {
        advance: f32,
        line: f32,
    }

    impl TextMeasure for FixedAdvance {
        fn advance(&self, _ch: char, _px: f32) -> f32 {
            self.advance
        }

        fn line_height(&self, _px: f32) -> f32 {
            self.line
        }
    }

    fn spec(content: &str) -> TextSpec {
        TextSpec {
            content: content.to_owned(),
            font: "helvetica".to_owned(),
            size: 24.0,
            leading: Some(0.0),
            color: Rgb::BLACK,
            justify: Justify::Left,
        }
    }

    #[test]
    fn wrap_breaks_at_word_boundaries() {
        let measure = FixedAdvance {
            advance: 10.0,
            line: 20.0,
        };
        // Each word is 40px, a space 10px; 3 words + 2 spaces = 140px.
        let lines = wrap_text(&measure, "abcd efgh ijkl mnop", 24.0, 145.0);
        assert_eq!(lines, vec!["abcd efgh ijkl", "mnop"]);
    }

    #[test]
    fn wrap_preserves_blank_lines() {
        let measure = FixedAdvance {
            advance: 10.0,
            line: 20.0,
        };
        let lines = wrap_text(&measure, "alpha\n\nbeta", 24.0, 500.0);
        assert_eq!(lines, vec!["alpha", "", "beta"]);
    }

    #[test]
    fn oversized_word_still_gets_a_line() {
        let measure = FixedAdvance {
            advance: 10.0,
            line: 20.0,
        };
        let lines = wrap_text(&measure, "supercalifragilistic ok", 24.0, 100.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "supercalifragilistic");
    }

    #[test]
    fn fit_classes_match_area_thresholds() {
        // Padded container 500x200 = 100,000 px². Words are 40px + 10px
        // space, so ten words fill a 500px line; line height 20px makes
        // each line 10,000 px² of estimated usage.
        let measure = FixedAdvance {
            advance: 10.0,
            line: 20.0,
        };
        let padded = Rect::new(0.0, 0.0, 500.0, 200.0);
        let typography = TypographyConfig::default();

        let words = |count: usize| {
            std::iter::repeat("abcd")
                .take(count)
                .collect::<Vec<_>>()
                .join(" ")
        };

        let ok = estimate_fit(&measure, &spec(&words(60)), padded, &typography);
        assert_eq!(ok.lines, 6);
        assert_eq!(ok.class, FitClass::Ok);
        assert!((ok.used_fraction - 0.6).abs() < 1e-3);

        let warn = estimate_fit(&measure, &spec(&words(80)), padded, &typography);
        assert_eq!(warn.class, FitClass::Warn);

        let overflow = estimate_fit(&measure, &spec(&words(100)), padded, &typography);
        assert_eq!(overflow.class, FitClass::OverflowRisk);
        assert!(overflow.used_fraction > 0.9);
    }

    #[test]
    fn estimate_uses_leading_override() {
        let measure = FixedAdvance {
            advance: 10.0,
            line: 20.0,
        };
        let padded = Rect::new(0.0, 0.0, 500.0, 200.0);
        let typography = TypographyConfig::default();
        let mut loose = spec("one line");
        loose.leading = Some(30.0);
        let estimate = estimate_fit(&measure, &loose, padded, &typography);
        assert_eq!(estimate.lines, 1);
        assert!((estimate.line_height - 50.0).abs() < 1e-3);
    }
}
