//! Process-wide press configuration.
//!
//! One immutable [`PressConfig`] value is constructed at startup (defaults
//! or a YAML file) and passed by reference into every stage. No component
//! reads ambient global state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::geometry::{PageHalf, Rect};
use crate::print_effects::EffectParams;
use crate::schema::{ElementKind, Rgb};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct PressConfig {
    pub canvas: CanvasSpec,
    pub binding: BindingSpec,
    pub safe_zone: SafeZoneMargins,
    pub rotation_limits: RotationLimits,
    pub typography: TypographyConfig,
    pub palette: Palette,
    pub effects: EffectParams,
    pub color_budget: ColorBudget,
}

impl PressConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PressConfig = serde_yaml::from_str(&contents).map_err(|error| {
            let location = error
                .location()
                .map(|location| format!("line {}, column {}", location.line(), location.column()))
                .unwrap_or_else(|| "unknown location".to_owned());
            anyhow!(
                "failed to parse yaml in {} at {}: {}",
                path.display(),
                location,
                error
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.canvas.validate()?;
        self.binding.validate()?;
        self.typography.validate()?;
        self.palette.validate()?;
        self.effects.validate()?;
        self.color_budget.validate()?;

        let usable_half = self.canvas.page_width() as f32;
        if self.safe_zone.left as f32 >= usable_half || self.safe_zone.right as f32 >= usable_half {
            bail!("safe-zone margins leave no usable page width");
        }
        if (self.safe_zone.top + self.safe_zone.bottom) as f32 >= self.canvas.height as f32 {
            bail!("safe-zone margins leave no usable page height");
        }
        Ok(())
    }

    /// Safe zone for one page half: outer margins on three sides, the spine
    /// dead zone as the inner bound.
    pub fn safe_rect(&self, half: PageHalf) -> Rect {
        let top = self.safe_zone.top as f32;
        let height = self.canvas.height as f32 - top - self.safe_zone.bottom as f32;
        match half {
            PageHalf::Left => {
                let left = self.safe_zone.left as f32;
                Rect::new(left, top, self.canvas.spine_start() as f32 - left, height)
            }
            PageHalf::Right => {
                let left = self.canvas.spine_end() as f32;
                let right = self.canvas.width as f32 - self.safe_zone.right as f32;
                Rect::new(left, top, right - left, height)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub spine_width: u32,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            width: 3400,
            height: 2200,
            spine_width: 462,
        }
    }
}

impl CanvasSpec {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("canvas must be positive, got {}x{}", self.width, self.height);
        }
        if self.spine_width >= self.width {
            bail!(
                "spine width {} exceeds canvas width {}",
                self.spine_width,
                self.width
            );
        }
        Ok(())
    }

    pub fn spine_center(&self) -> u32 {
        self.width / 2
    }

    pub fn spine_start(&self) -> u32 {
        self.spine_center() - self.spine_width / 2
    }

    pub fn spine_end(&self) -> u32 {
        self.spine_center() + self.spine_width / 2
    }

    pub fn spine_rect(&self) -> Rect {
        Rect::new(
            self.spine_start() as f32,
            0.0,
            (self.spine_end() - self.spine_start()) as f32,
            self.height as f32,
        )
    }

    /// Width of one page half outside the spine dead zone.
    pub fn page_width(&self) -> u32 {
        self.spine_start()
    }
}

/// 4:1 pitch spiral binding geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BindingSpec {
    pub hole_diameter: u32,
    pub hole_gap: u32,
    pub coil_color: Rgb,
}

impl Default for BindingSpec {
    fn default() -> Self {
        Self {
            hole_diameter: 57,
            hole_gap: 18,
            coil_color: Rgb([0x1A, 0x1A, 0x1A]),
        }
    }
}

impl BindingSpec {
    fn validate(&self) -> Result<()> {
        if self.hole_diameter == 0 {
            bail!("binding hole diameter must be > 0");
        }
        Ok(())
    }

    pub fn pitch(&self) -> u32 {
        self.hole_diameter + self.hole_gap
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SafeZoneMargins {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Default for SafeZoneMargins {
    fn default() -> Self {
        Self {
            left: 100,
            right: 100,
            top: 100,
            bottom: 100,
        }
    }
}

/// Maximum absolute rotation per element category, degrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RotationLimits {
    pub text: f32,
    pub containers: f32,
    pub graphics: f32,
}

impl Default for RotationLimits {
    fn default() -> Self {
        Self {
            text: 5.0,
            containers: 15.0,
            graphics: 10.0,
        }
    }
}

impl RotationLimits {
    pub fn limit_for(&self, kind: ElementKind) -> f32 {
        if kind.is_text() {
            self.text
        } else if kind.is_container() {
            self.containers
        } else if kind.is_graphic() {
            self.graphics
        } else {
            // The binding never rotates.
            0.0
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TypographyConfig {
    pub font_dir: PathBuf,
    /// Padding inside a text container, pixels per side.
    pub wrap_padding: f32,
    /// Extra pixels between lines when the text spec does not override.
    pub default_leading: f32,
    /// Fit fractions: at or below `warn_fraction` is ok, above
    /// `overflow_fraction` is overflow-risk.
    pub warn_fraction: f32,
    pub overflow_fraction: f32,
}

impl Default for TypographyConfig {
    fn default() -> Self {
        Self {
            font_dir: PathBuf::from("assets/fonts"),
            wrap_padding: 20.0,
            default_leading: 4.0,
            warn_fraction: 0.70,
            overflow_fraction: 0.90,
        }
    }
}

impl TypographyConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0 < self.warn_fraction && self.warn_fraction < self.overflow_fraction) {
            bail!(
                "fit thresholds must satisfy 0 < warn < overflow, got {} / {}",
                self.warn_fraction,
                self.overflow_fraction
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Palette {
    /// Paper template name -> base color.
    pub paper: BTreeMap<String, Rgb>,
    /// Accent color with a hard usage ceiling.
    pub accent: Rgb,
    /// Acid-green theme color with a tighter ceiling.
    pub acid: Rgb,
    /// Base-canvas fiber noise blended over the paper color, 0-1. Separate
    /// from the post-chain grain, which runs over the finished composite.
    pub base_grain_opacity: f32,
}

impl Default for Palette {
    fn default() -> Self {
        let mut paper = BTreeMap::new();
        paper.insert("aged_newsprint".to_owned(), Rgb([0xF8, 0xF3, 0xE5]));
        paper.insert("white".to_owned(), Rgb([0xFF, 0xFF, 0xFF]));
        paper.insert("kraft".to_owned(), Rgb([0xC8, 0xA1, 0x65]));
        Self {
            paper,
            accent: Rgb([0xF5, 0x7D, 0x0D]),
            acid: Rgb([0x95, 0xC1, 0x20]),
            base_grain_opacity: 0.05,
        }
    }
}

impl Palette {
    fn validate(&self) -> Result<()> {
        if self.paper.is_empty() {
            bail!("palette must define at least one paper template");
        }
        if !(0.0..=1.0).contains(&self.base_grain_opacity) {
            bail!(
                "base_grain_opacity must be within [0, 1], got {}",
                self.base_grain_opacity
            );
        }
        Ok(())
    }

    pub fn paper_color(&self, template: &str) -> Option<Rgb> {
        self.paper.get(template).copied()
    }

    pub fn default_paper(&self) -> &str {
        "aged_newsprint"
    }
}

/// 70/20/10 color rule plus the contrast floor for text regions.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ColorBudget {
    pub accent_max: f64,
    pub acid_max: f64,
    pub primary_min: f64,
    /// Euclidean RGB distance under which a pixel counts as a palette hit.
    pub match_distance: f64,
    pub contrast_floor: f64,
}

impl Default for ColorBudget {
    fn default() -> Self {
        Self {
            accent_max: 0.30,
            acid_max: 0.10,
            primary_min: 0.70,
            match_distance: 30.0,
            contrast_floor: 4.5,
        }
    }
}

impl ColorBudget {
    fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("accent_max", self.accent_max),
            ("acid_max", self.acid_max),
            ("primary_min", self.primary_min),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{label} must be within [0, 1], got {value}");
            }
        }
        if self.match_distance <= 0.0 {
            bail!("match_distance must be > 0");
        }
        Ok(())
    }
}
