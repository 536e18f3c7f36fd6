//! Typed layout document.
//!
//! Every struct is `deny_unknown_fields`: an unrecognized appearance key is
//! a schema error at parse time, never silently ignored. Domain-range checks
//! live in `layout::validate_layout`, which collects findings instead of
//! failing fast.

use std::fmt;
use std::path::PathBuf;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw spread description as authored in YAML. Element order is paint order
/// unless an element carries an explicit `z_index`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutDoc {
    /// Paper template name, resolved against the configured palette.
    #[serde(default)]
    pub canvas: Option<String>,
    /// Palette name recorded into the report; the color budget comes from
    /// process configuration.
    #[serde(default)]
    pub palette: Option<String>,
    pub elements: Vec<ElementDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementDoc {
    pub tag_id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub position: [f32; 2],
    pub dimensions: [f32; 2],
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub z_index: Option<i32>,
    #[serde(default)]
    pub appearance: Appearance,
    /// Pre-generated raster for graphic and container kinds, relative to
    /// the asset root.
    #[serde(default)]
    pub asset: Option<PathBuf>,
    /// Literal text plus font spec for text containers.
    #[serde(default)]
    pub text: Option<TextSpec>,
}

/// Closed set of element kinds. Serde rejects anything else at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    PhotoInstructional,
    PixelArt,
    GuiRecreation,
    Doodle,
    FeatureBox,
    Text,
    SpiralBinding,
    DieCut,
    SplatFrame,
    Embossed,
}

impl ElementKind {
    pub fn is_text(self) -> bool {
        matches!(self, Self::Text)
    }

    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::FeatureBox | Self::DieCut | Self::SplatFrame | Self::Embossed
        )
    }

    pub fn is_graphic(self) -> bool {
        matches!(
            self,
            Self::PhotoInstructional | Self::PixelArt | Self::GuiRecreation | Self::Doodle
        )
    }

    /// Pixel art and GUI recreations must stay crisp when resized; photos
    /// and everything else resample smoothly.
    pub fn crisp_resize(self) -> bool {
        matches!(self, Self::PixelArt | Self::GuiRecreation)
    }

    pub fn requires_asset(self) -> bool {
        self.is_graphic() || self.is_container()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PhotoInstructional => "photo_instructional",
            Self::PixelArt => "pixel_art",
            Self::GuiRecreation => "gui_recreation",
            Self::Doodle => "doodle",
            Self::FeatureBox => "feature_box",
            Self::Text => "text",
            Self::SpiralBinding => "spiral_binding",
            Self::DieCut => "die_cut",
            Self::SplatFrame => "splat_frame",
            Self::Embossed => "embossed",
        }
    }
}

/// Closed bag of visual options. No free-form properties: adding a new
/// option means adding a field here and teaching the compositor its effect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Appearance {
    #[serde(default)]
    pub border: Option<BorderSpec>,
    #[serde(default)]
    pub shadow: Option<ShadowSpec>,
    /// Background texture id from the configured palette (containers only).
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub palette_ref: Option<String>,
    /// Organic placement: deterministic jitter instead of exact coordinates.
    #[serde(default)]
    pub organic: Option<OrganicSpec>,
    /// Percent, 0-100.
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BorderSpec {
    pub width: u32,
    pub color: Rgb,
}

/// Hard-edged drop shadow. Offset is fixed pixels, zero blur; soft shadows
/// are a stylistic violation and have no representation here.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShadowSpec {
    #[serde(default = "default_shadow_offset")]
    pub offset: [i32; 2],
    /// Percent, 0-100.
    #[serde(default = "default_shadow_opacity")]
    pub opacity: f32,
}

impl Default for ShadowSpec {
    fn default() -> Self {
        Self {
            offset: default_shadow_offset(),
            opacity: default_shadow_opacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganicSpec {
    /// Degrees of deterministic micro-rotation, applied on top of the
    /// declared rotation.
    #[serde(default)]
    pub max_rotation: f32,
    /// Pixels of deterministic position jitter per axis.
    #[serde(default)]
    pub max_jitter: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSpec {
    pub content: String,
    /// Font family, resolved as `<font_dir>/<family>.ttf`.
    pub font: String,
    /// Pixel size.
    pub size: f32,
    /// Extra pixels between lines; falls back to the configured default.
    #[serde(default)]
    pub leading: Option<f32>,
    #[serde(default = "default_text_color")]
    pub color: Rgb,
    #[serde(default)]
    pub justify: Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Justify {
    #[default]
    Left,
    Center,
}

/// `#RRGGBB` color. Serializes back to the same hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub fn parse(raw: &str) -> Option<Self> {
        let hex = raw.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self([r, g, b]))
    }

    pub fn r(&self) -> u8 {
        self.0[0]
    }

    pub fn g(&self) -> u8 {
        self.0[1]
    }

    pub fn b(&self) -> u8 {
        self.0[2]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Rgb::parse(&raw)
            .ok_or_else(|| D::Error::custom(format!("expected #RRGGBB color, got '{raw}'")))
    }
}

impl Serialize for Rgb {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

fn default_opacity() -> f32 {
    100.0
}

fn default_shadow_offset() -> [i32; 2] {
    [3, 3]
}

fn default_shadow_opacity() -> f32 {
    60.0
}

fn default_text_color() -> Rgb {
    Rgb::BLACK
}
