//! Layout loading and pre-flight validation.
//!
//! `validate_layout` never short-circuits: every violation in the document
//! is collected so authoring tools see complete diagnostics in one pass.
//! A layout with any fatal finding yields no `Layout` at all — there is no
//! partially-validated state for the compositor to trip over.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;

use crate::chaos;
use crate::config::PressConfig;
use crate::geometry::{rotated_bounds, PageHalf, Rect};
use crate::report::{Finding, ValidationReport};
use crate::schema::{Appearance, ElementDoc, ElementKind, LayoutDoc, TextSpec};

/// Tag grammar: page prefix, kind token, description (one or more tokens),
/// two-digit index. Example: `L_photo_mouse_01`.
fn tag_grammar() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"^[LR]_[a-z][a-z0-9]*_[a-z0-9]+(?:_[a-z0-9]+)*_[0-9]{2}$")
            .expect("tag grammar regex is valid")
    })
}

/// A validated, immutable element. Geometry accessors fold in the
/// deterministic organic jitter so every stage sees the same effective
/// placement.
#[derive(Debug, Clone)]
pub struct Element {
    pub tag_id: String,
    pub kind: ElementKind,
    pub position: [f32; 2],
    pub dimensions: [f32; 2],
    pub rotation: f32,
    pub appearance: Appearance,
    pub asset: Option<std::path::PathBuf>,
    pub text: Option<TextSpec>,
    pub half: PageHalf,
}

impl Element {
    /// Declared rotation plus deterministic micro-rotation, relative to the
    /// canvas. Rotation never compounds through other elements.
    pub fn effective_rotation(&self) -> f32 {
        match &self.appearance.organic {
            Some(organic) if organic.max_rotation > 0.0 => {
                self.rotation + chaos::rotation_jitter(&self.tag_id, organic.max_rotation)
            }
            _ => self.rotation,
        }
    }

    /// Declared position plus deterministic jitter.
    pub fn effective_origin(&self) -> (f32, f32) {
        match &self.appearance.organic {
            Some(organic) if organic.max_jitter > 0.0 => {
                let (dx, dy) = chaos::position_jitter(&self.tag_id, organic.max_jitter);
                (self.position[0] + dx, self.position[1] + dy)
            }
            _ => (self.position[0], self.position[1]),
        }
    }

    /// Unrotated rect at the effective origin.
    pub fn base_rect(&self) -> Rect {
        let (x, y) = self.effective_origin();
        Rect::new(x, y, self.dimensions[0], self.dimensions[1])
    }

    /// Axis-aligned bounds after rotation about the element's own center.
    pub fn painted_bounds(&self) -> Rect {
        rotated_bounds(self.base_rect(), self.effective_rotation())
    }

    /// The region that must sit inside the safe zone. Text keeps its padded
    /// interior critical; for everything else the whole painted box counts.
    pub fn content_critical(&self, config: &PressConfig) -> Rect {
        let bounds = self.painted_bounds();
        if self.kind.is_text() {
            let pad = config.typography.wrap_padding;
            bounds.inset(pad, pad)
        } else {
            bounds
        }
    }
}

/// Validated spread: elements already normalized into paint order.
#[derive(Debug, Clone)]
pub struct Layout {
    pub paper: String,
    pub palette: Option<String>,
    pub elements: Vec<Element>,
}

pub fn load_layout(path: &Path) -> Result<LayoutDoc> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read layout {}", path.display()))?;
    serde_yaml::from_str(&contents).map_err(|error| {
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
    })
}

/// Run every pre-render check and either hand back a fully validated layout
/// or the complete list of fatal findings.
pub fn validate_layout(doc: &LayoutDoc, config: &PressConfig) -> Result<Layout, ValidationReport> {
    let mut report = ValidationReport::new();

    let paper = doc
        .canvas
        .clone()
        .unwrap_or_else(|| config.palette.default_paper().to_owned());
    if config.palette.paper_color(&paper).is_none() {
        report.push(Finding::schema(
            None,
            format!("unknown paper template '{paper}'"),
        ));
    }

    if doc.elements.is_empty() {
        report.push(Finding::schema(None, "layout defines no elements"));
    }

    let mut tag_indices: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut elements = Vec::with_capacity(doc.elements.len());

    for (index, element) in doc.elements.iter().enumerate() {
        tag_indices.entry(&element.tag_id).or_default().push(index);
        check_fields(index, element, &mut report);
        check_domains(index, element, &mut report);

        let Some(half) = PageHalf::from_tag(&element.tag_id) else {
            // Grammar finding already covers the malformed tag.
            continue;
        };

        let validated = Element {
            tag_id: element.tag_id.clone(),
            kind: element.kind,
            position: element.position,
            dimensions: element.dimensions,
            rotation: element.rotation,
            appearance: element.appearance.clone(),
            asset: element.asset.clone(),
            text: element.text.clone(),
            half,
        };
        check_rotation_limit(&validated, config, &mut report);
        check_placement(&validated, config, &mut report);
        elements.push((element.z_index.unwrap_or(0), index, validated));
    }

    for (tag, indices) in &tag_indices {
        if indices.len() > 1 {
            let listed = indices
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            report.push(Finding::constraint(
                tag,
                format!("duplicate tag_id at element indices {listed}"),
            ));
        }
    }

    if report.has_errors() {
        return Err(report);
    }

    // Insertion order is paint order; an explicit z_index overrides it.
    // The sort is stable, so equal keys keep their declared order.
    elements.sort_by_key(|(z, index, _)| (*z, *index));

    Ok(Layout {
        paper,
        palette: doc.palette.clone(),
        elements: elements
            .into_iter()
            .map(|(_, _, element)| element)
            .collect(),
    })
}

fn check_fields(index: usize, element: &ElementDoc, report: &mut ValidationReport) {
    let tag = element.tag_id.as_str();

    if !tag_grammar().is_match(tag) {
        report.push(Finding::schema(
            Some(tag),
            format!(
                "element {index}: tag_id '{tag}' does not match naming grammar \
                 (expected e.g. 'L_photo_mouse_01')"
            ),
        ));
    }

    if element.kind.requires_asset() && element.asset.is_none() {
        report.push(Finding::schema(
            Some(tag),
            format!(
                "element {index}: kind '{}' requires an asset reference",
                element.kind.label()
            ),
        ));
    }
    if element.kind.is_text() {
        if element.text.is_none() {
            report.push(Finding::schema(
                Some(tag),
                format!("element {index}: text containers require a text spec"),
            ));
        }
        if element.asset.is_some() {
            report.push(Finding::schema(
                Some(tag),
                format!("element {index}: text containers take literal text, not an asset"),
            ));
        }
    } else if element.text.is_some() {
        report.push(Finding::schema(
            Some(tag),
            format!(
                "element {index}: kind '{}' does not accept a text spec",
                element.kind.label()
            ),
        ));
    }
    if element.kind == ElementKind::SpiralBinding && element.asset.is_some() {
        report.push(Finding::schema(
            Some(tag),
            format!("element {index}: the binding graphic is drawn by the compositor, drop the asset"),
        ));
    }
}

fn check_domains(index: usize, element: &ElementDoc, report: &mut ValidationReport) {
    let tag = element.tag_id.as_str();
    let mut schema_error = |message: String| {
        report.push(Finding::schema(Some(tag), message));
    };

    for (label, value) in [
        ("position.x", element.position[0]),
        ("position.y", element.position[1]),
    ] {
        if !value.is_finite() {
            schema_error(format!("element {index}: {label} must be finite"));
        }
    }
    for (label, value) in [
        ("dimensions.w", element.dimensions[0]),
        ("dimensions.h", element.dimensions[1]),
    ] {
        if !value.is_finite() || value <= 0.0 {
            schema_error(format!("element {index}: {label} must be positive, got {value}"));
        }
    }
    if !element.rotation.is_finite() || element.rotation < -180.0 || element.rotation > 180.0 {
        schema_error(format!(
            "element {index}: rotation must be within [-180, 180], got {}",
            element.rotation
        ));
    }
    let opacity = element.appearance.opacity;
    if !opacity.is_finite() || opacity < 0.0 || opacity > 100.0 {
        schema_error(format!(
            "element {index}: opacity must be within [0, 100], got {opacity}"
        ));
    }
    if let Some(shadow) = &element.appearance.shadow {
        if !shadow.opacity.is_finite() || shadow.opacity < 0.0 || shadow.opacity > 100.0 {
            schema_error(format!(
                "element {index}: shadow opacity must be within [0, 100], got {}",
                shadow.opacity
            ));
        }
    }
    if let Some(organic) = &element.appearance.organic {
        if organic.max_rotation < 0.0 || organic.max_jitter < 0.0 {
            schema_error(format!(
                "element {index}: organic jitter bounds must be non-negative"
            ));
        }
    }
    if let Some(text) = &element.text {
        if !text.size.is_finite() || text.size <= 0.0 {
            schema_error(format!(
                "element {index}: font size must be positive, got {}",
                text.size
            ));
        }
        if text.content.trim().is_empty() {
            schema_error(format!("element {index}: text content is empty"));
        }
    }
}

fn check_rotation_limit(element: &Element, config: &PressConfig, report: &mut ValidationReport) {
    let limit = config.rotation_limits.limit_for(element.kind);
    let effective = element.effective_rotation();
    if effective.abs() > limit {
        report.push(Finding::constraint(
            &element.tag_id,
            format!(
                "effective rotation {effective:.2} exceeds the {limit}-degree limit for {}",
                element.kind.label()
            ),
        ));
    }
}

fn check_placement(element: &Element, config: &PressConfig, report: &mut ValidationReport) {
    // The binding graphic owns the dead zone and skips both checks.
    if element.kind == ElementKind::SpiralBinding {
        return;
    }

    let bounds = element.painted_bounds();
    let spine = config.canvas.spine_rect();
    if bounds.intersects(&spine) {
        report.push(Finding::constraint(
            &element.tag_id,
            format!(
                "bounding box x={:.0}..{:.0} intrudes into the spine dead zone columns {}..{}",
                bounds.left(),
                bounds.right(),
                config.canvas.spine_start(),
                config.canvas.spine_end()
            ),
        ));
    }

    let safe = config.safe_rect(element.half);
    let critical = element.content_critical(config);
    if !safe.contains_rect(&critical) {
        report.push(Finding::constraint(
            &element.tag_id,
            format!(
                "content-critical region ({:.0},{:.0})-({:.0},{:.0}) escapes the safe zone \
                 ({:.0},{:.0})-({:.0},{:.0})",
                critical.left(),
                critical.top(),
                critical.right(),
                critical.bottom(),
                safe.left(),
                safe.top(),
                safe.right(),
                safe.bottom()
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FindingCode;

    fn doc_from_yaml(yaml: &str) -> LayoutDoc {
        serde_yaml::from_str(yaml).expect("layout yaml should parse")
    }

    fn photo(tag: &str, x: f32, y: f32, w: f32, h: f32) -> String {
        format!(
            "  - tag_id: {tag}\n    type: photo_instructional\n    position: [{x}, {y}]\n    dimensions: [{w}, {h}]\n    asset: photo.png\n"
        )
    }

    #[test]
    fn clean_layout_validates_in_paint_order() {
        let yaml = format!(
            "elements:\n{}{}",
            photo("L_photo_mouse_01", 200.0, 300.0, 600.0, 450.0),
            photo("R_photo_hand_02", 2100.0, 300.0, 600.0, 450.0),
        );
        let layout = validate_layout(&doc_from_yaml(&yaml), &PressConfig::default())
            .expect("layout should validate");
        assert_eq!(layout.elements.len(), 2);
        assert_eq!(layout.elements[0].tag_id, "L_photo_mouse_01");
        assert_eq!(layout.paper, "aged_newsprint");
    }

    #[test]
    fn explicit_z_index_overrides_insertion_order() {
        let yaml = "\
elements:
  - tag_id: L_photo_top_01
    type: photo_instructional
    position: [200, 300]
    dimensions: [400, 300]
    asset: a.png
    z_index: 5
  - tag_id: L_photo_under_01
    type: photo_instructional
    position: [700, 300]
    dimensions: [400, 300]
    asset: b.png
";
        let layout = validate_layout(&doc_from_yaml(yaml), &PressConfig::default())
            .expect("layout should validate");
        assert_eq!(layout.elements[0].tag_id, "L_photo_under_01");
        assert_eq!(layout.elements[1].tag_id, "L_photo_top_01");
    }

    #[test]
    fn duplicate_tags_name_both_indices() {
        let yaml = format!(
            "elements:\n{}{}{}",
            photo("L_photo_mouse_01", 200.0, 300.0, 400.0, 300.0),
            photo("R_photo_hand_01", 2100.0, 300.0, 400.0, 300.0),
            photo("L_photo_mouse_01", 200.0, 700.0, 400.0, 300.0),
        );
        let report = validate_layout(&doc_from_yaml(&yaml), &PressConfig::default())
            .expect_err("duplicate tags must fail");
        let duplicate = report
            .findings()
            .iter()
            .find(|finding| finding.code == FindingCode::ConstraintError)
            .expect("a constraint finding");
        assert_eq!(duplicate.tag_id.as_deref(), Some("L_photo_mouse_01"));
        assert!(duplicate.message.contains("0, 2"), "{}", duplicate.message);
    }

    #[test]
    fn spine_intrusion_is_fatal_and_references_the_tag() {
        let yaml = format!(
            "elements:\n{}",
            photo("L_photo_mouse_01", 1600.0, 300.0, 200.0, 300.0)
        );
        let report = validate_layout(&doc_from_yaml(&yaml), &PressConfig::default())
            .expect_err("spine intrusion must fail");
        assert!(report.has_errors());
        let spine = report
            .findings()
            .iter()
            .find(|finding| finding.message.contains("spine dead zone"))
            .expect("a spine finding");
        assert_eq!(spine.tag_id.as_deref(), Some("L_photo_mouse_01"));
    }

    #[test]
    fn all_violations_collected_in_one_pass() {
        let yaml = "\
elements:
  - tag_id: badtag
    type: photo_instructional
    position: [200, 300]
    dimensions: [0, 300]
    rotation: 250
    asset: a.png
";
        let report = validate_layout(&doc_from_yaml(yaml), &PressConfig::default())
            .expect_err("multiple violations must fail");
        // Grammar, zero width, rotation out of domain.
        assert!(report.error_count() >= 3, "{:?}", report.findings());
    }

    #[test]
    fn rotation_limit_accounts_for_organic_jitter() {
        let yaml = "\
elements:
  - tag_id: L_text_intro_01
    type: text
    position: [200, 300]
    dimensions: [600, 400]
    rotation: 4.5
    appearance:
      organic: { max_rotation: 5.0 }
    text:
      content: Hello
      font: helvetica
      size: 24
";
        let config = PressConfig::default();
        let doc = doc_from_yaml(yaml);
        let outcome = validate_layout(&doc, &config);
        // Jitter is deterministic for the tag, so the verdict is stable:
        // compute the same effective rotation the validator sees.
        let effective = 4.5 + crate::chaos::rotation_jitter("L_text_intro_01", 5.0);
        if effective.abs() > config.rotation_limits.text {
            let report = outcome.expect_err("limit exceeded must fail");
            assert!(report.has_errors());
        } else {
            outcome.expect("within limit should validate");
        }
    }

    #[test]
    fn safe_zone_escape_is_fatal() {
        // y=20 puts the box above the 100px top margin.
        let yaml = format!(
            "elements:\n{}",
            photo("L_photo_mouse_01", 200.0, 20.0, 400.0, 300.0)
        );
        let report = validate_layout(&doc_from_yaml(&yaml), &PressConfig::default())
            .expect_err("safe-zone escape must fail");
        assert!(report
            .findings()
            .iter()
            .any(|finding| finding.message.contains("safe zone")));
    }

    #[test]
    fn binding_graphic_is_exempt_from_spine_exclusivity() {
        let yaml = "\
elements:
  - tag_id: L_binding_coil_01
    type: spiral_binding
    position: [1469, 0]
    dimensions: [462, 2200]
";
        validate_layout(&doc_from_yaml(yaml), &PressConfig::default())
            .expect("binding in the dead zone should validate");
    }
}
