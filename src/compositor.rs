//! Spread compositing: base canvas, spiral binding, element layering.
//!
//! The compositor reads validated elements and never mutates their
//! geometry. Per element it applies rotation about the element's own
//! center (relative to the canvas, never a parent), border, hard-edged
//! shadow, and alpha compositing, then records the final screen-space box
//! for the QA pass. Fatal conditions (spine intrusion after rotation,
//! unresolved assets, text overflow) become report findings and suppress
//! the output raster; they are never thrown away as bare errors.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use sha2::{Digest, Sha256};

use crate::chaos::XorShift64;
use crate::config::PressConfig;
use crate::geometry::Rect;
use crate::layout::{Element, Layout};
use crate::report::{Finding, ValidationReport};
use crate::schema::{ElementKind, Rgb};
use crate::typeset::{render_text, FontLibrary};

/// Seed for the base-canvas fiber noise. Fixed: the paper must be
/// byte-identical across runs.
const PAPER_SEED: u64 = 0x0B1B_B00C_5EED_0001;

/// Final screen-space placement of one element, for QA cross-checking.
#[derive(Debug, Clone)]
pub struct PlacedElement {
    pub tag_id: String,
    pub kind: ElementKind,
    pub bounds: Rect,
    /// SHA-256 of the source asset bytes, when the element had one. Stable
    /// content key for caching and cross-run diffing.
    pub content_key: Option<String>,
}

/// Composed spread raster plus the placement records QA consumes.
pub struct ComposedSpread {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub placed: Vec<PlacedElement>,
}

pub struct Compositor<'a> {
    config: &'a PressConfig,
    fonts: &'a mut FontLibrary,
    asset_root: PathBuf,
}

impl<'a> Compositor<'a> {
    pub fn new(config: &'a PressConfig, fonts: &'a mut FontLibrary, asset_root: &Path) -> Self {
        Self {
            config,
            fonts,
            asset_root: asset_root.to_path_buf(),
        }
    }

    /// Compose the full spread. Returns `None` when any fatal finding was
    /// recorded; all elements are still processed first so the report is
    /// complete.
    pub fn compose(
        &mut self,
        layout: &Layout,
        report: &mut ValidationReport,
    ) -> Result<Option<ComposedSpread>> {
        let width = self.config.canvas.width;
        let height = self.config.canvas.height;
        let paper = self
            .config
            .palette
            .paper_color(&layout.paper)
            .ok_or_else(|| anyhow!("paper template '{}' missing from palette", layout.paper))?;

        let mut rgba = base_canvas(width, height, paper, self.config.palette.base_grain_opacity);
        self.draw_binding(&mut rgba, paper);

        let errors_before = report.error_count();
        let mut placed = Vec::with_capacity(layout.elements.len());

        for element in &layout.elements {
            match self.place_element(&mut rgba, element, report)? {
                Some(record) => placed.push(record),
                None => continue,
            }
        }

        if report.error_count() > errors_before {
            return Ok(None);
        }

        Ok(Some(ComposedSpread {
            width,
            height,
            rgba,
            placed,
        }))
    }

    fn place_element(
        &mut self,
        canvas: &mut [u8],
        element: &Element,
        report: &mut ValidationReport,
    ) -> Result<Option<PlacedElement>> {
        // The binding art is painted by the compositor itself; the element
        // just marks the dead zone as claimed.
        if element.kind == ElementKind::SpiralBinding {
            return Ok(Some(PlacedElement {
                tag_id: element.tag_id.clone(),
                kind: element.kind,
                bounds: self.config.canvas.spine_rect(),
                content_key: None,
            }));
        }

        // Defense in depth: validation already rejected these, but the
        // compositor re-checks the rotated box it is actually about to paint.
        let bounds = element.painted_bounds();
        if bounds.intersects(&self.config.canvas.spine_rect()) {
            report.push(Finding::constraint(
                &element.tag_id,
                "post-rotation bounding box intersects the spine dead zone",
            ));
            return Ok(None);
        }

        let sprite = if element.kind.is_text() {
            match self.text_sprite(element, report) {
                Some(sprite) => sprite,
                None => return Ok(None),
            }
        } else {
            match self.asset_sprite(element, report)? {
                Some(sprite) => sprite,
                None => return Ok(None),
            }
        };

        let content_key = sprite.content_key.clone();
        let mut sprite = sprite;

        if let Some(border) = &element.appearance.border {
            sprite = add_border(sprite, border.width, border.color);
        }

        let rotation = element.effective_rotation();
        if rotation != 0.0 {
            sprite = rotate_sprite(sprite, rotation);
        }

        let opacity = element.appearance.opacity / 100.0;
        if opacity < 1.0 {
            scale_alpha(&mut sprite.rgba, opacity);
        }

        // Final placement keeps the element's center where the unrotated
        // rect put it.
        let base = element.base_rect();
        let (cx, cy) = base.center();
        let origin_x = (cx - sprite.width as f32 / 2.0).round() as i64;
        let origin_y = (cy - sprite.height as f32 / 2.0).round() as i64;

        if let Some(shadow) = &element.appearance.shadow {
            stamp_hard_shadow(
                canvas,
                self.config.canvas.width,
                self.config.canvas.height,
                &sprite,
                origin_x + shadow.offset[0] as i64,
                origin_y + shadow.offset[1] as i64,
                shadow.opacity / 100.0,
            );
        }

        blend_sprite(
            canvas,
            self.config.canvas.width,
            self.config.canvas.height,
            &sprite,
            origin_x,
            origin_y,
        );

        Ok(Some(PlacedElement {
            tag_id: element.tag_id.clone(),
            kind: element.kind,
            bounds: Rect::new(
                origin_x as f32,
                origin_y as f32,
                sprite.width as f32,
                sprite.height as f32,
            ),
            content_key,
        }))
    }

    fn asset_sprite(
        &mut self,
        element: &Element,
        report: &mut ValidationReport,
    ) -> Result<Option<Sprite>> {
        let Some(relative) = &element.asset else {
            // Validation guarantees the reference exists; guard anyway.
            report.push(Finding::asset_missing(
                &element.tag_id,
                "element has no asset reference",
            ));
            return Ok(None);
        };
        let path = self.asset_root.join(relative);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) => {
                report.push(Finding::asset_missing(
                    &element.tag_id,
                    format!("asset {} unresolved: {error}", path.display()),
                ));
                return Ok(None);
            }
        };
        let content_key = sha256_hex(&bytes);

        let decoded = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(error) => {
                report.push(Finding::asset_missing(
                    &element.tag_id,
                    format!("asset {} failed to decode: {error}", path.display()),
                ));
                return Ok(None);
            }
        };

        let target_w = element.dimensions[0].round().max(1.0) as u32;
        let target_h = element.dimensions[1].round().max(1.0) as u32;
        let resized = if decoded.width() == target_w && decoded.height() == target_h {
            decoded
        } else {
            let filter = if element.kind.crisp_resize() {
                FilterType::Nearest
            } else {
                FilterType::Lanczos3
            };
            image::imageops::resize(&decoded, target_w, target_h, filter)
        };

        Ok(Some(Sprite {
            width: target_w,
            height: target_h,
            rgba: resized.into_raw(),
            content_key: Some(content_key),
        }))
    }

    fn text_sprite(&mut self, element: &Element, report: &mut ValidationReport) -> Option<Sprite> {
        let spec = element.text.as_ref()?;
        let pad = self.config.typography.wrap_padding;
        let padded = element.base_rect().inset(pad, pad);

        let font = match self.fonts.get(&spec.font) {
            Ok(font) => font,
            Err(error) => {
                report.push(Finding::asset_missing(
                    &element.tag_id,
                    format!("font '{}' unresolved: {error:#}", spec.font),
                ));
                return None;
            }
        };

        let block = match render_text(font, spec, padded.w, &self.config.typography) {
            Ok(block) => block,
            Err(error) => {
                report.push(Finding::constraint(&element.tag_id, format!("{error:#}")));
                return None;
            }
        };

        // Overflow past the padded interior is content loss, never a clip.
        if block.height as f32 > padded.h + 0.5 {
            report.push(Finding::constraint(
                &element.tag_id,
                format!(
                    "rendered text is {}px tall, exceeding the {:.0}px padded interior",
                    block.height, padded.h
                ),
            ));
            return None;
        }

        // Center the padded block inside the full container rect so the
        // sprite covers the declared dimensions.
        let width = element.dimensions[0].round().max(1.0) as u32;
        let height = element.dimensions[1].round().max(1.0) as u32;
        let mut rgba = vec![0u8; (width * height * 4) as usize];

        if let Some(background) = &element.appearance.background {
            if let Some(color) = self.config.palette.paper_color(background) {
                for pixel in rgba.chunks_exact_mut(4) {
                    pixel[0] = color.r();
                    pixel[1] = color.g();
                    pixel[2] = color.b();
                    pixel[3] = 255;
                }
            } else {
                report.push(Finding::schema(
                    Some(&element.tag_id),
                    format!("unknown background texture '{background}'"),
                ));
                return None;
            }
        }

        let pad_px = pad.round() as i64;
        overlay_block(
            &mut rgba,
            width,
            height,
            &block.rgba,
            block.width,
            block.height,
            pad_px,
            pad_px,
        );

        Some(Sprite {
            width,
            height,
            rgba,
            content_key: None,
        })
    }

    /// Photoreal spiral binding: punched holes with an inner shadow and a
    /// plastic coil segment, on a precise 4:1 pitch down the spine center.
    fn draw_binding(&self, canvas: &mut [u8], paper: Rgb) {
        use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

        let spine_w = self.config.canvas.spine_end() - self.config.canvas.spine_start();
        let height = self.config.canvas.height;
        let Some(mut pixmap) = Pixmap::new(spine_w, height) else {
            return;
        };

        let binding = &self.config.binding;
        let pitch = binding.pitch();
        let num_holes = height / pitch;
        if num_holes == 0 {
            return;
        }
        let start_y = (height - num_holes * pitch + binding.hole_gap) / 2;
        let center_x = spine_w as f32 / 2.0;
        let radius = binding.hole_diameter as f32 / 2.0;

        let mut hole_paint = Paint::default();
        // Punched hole reads slightly darker than the surrounding paper.
        hole_paint.set_color_rgba8(
            (paper.r() as f32 * 0.92) as u8,
            (paper.g() as f32 * 0.92) as u8,
            (paper.b() as f32 * 0.92) as u8,
            255,
        );
        hole_paint.anti_alias = true;

        let mut shadow_paint = Paint::default();
        shadow_paint.set_color_rgba8(180, 180, 180, 200);
        shadow_paint.anti_alias = true;

        let mut coil_paint = Paint::default();
        let coil = binding.coil_color;
        coil_paint.set_color_rgba8(coil.r(), coil.g(), coil.b(), 255);
        coil_paint.anti_alias = true;

        for hole in 0..num_holes {
            let cy = (start_y + hole * pitch) as f32 + radius;

            if let Some(circle) = PathBuilder::from_circle(center_x, cy, radius) {
                pixmap.fill_path(
                    &circle,
                    &hole_paint,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }

            // Inner shadow along the lower-left rim gives the hole depth.
            if let Some(rim) = arc_path(center_x, cy, radius - 1.5, 135.0, 180.0) {
                let stroke = Stroke {
                    width: 3.0,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&rim, &shadow_paint, &stroke, Transform::identity(), None);
            }

            // Plastic coil segment threading through the hole.
            if let Some(segment) = arc_path(center_x, cy, radius - 5.0, 45.0, 180.0) {
                let stroke = Stroke {
                    width: 10.0,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&segment, &coil_paint, &stroke, Transform::identity(), None);
            }
        }

        // Demultiply the pixmap and blend it over the canvas.
        let offset_x = self.config.canvas.spine_start() as usize;
        let canvas_w = self.config.canvas.width as usize;
        for (index, pixel) in pixmap.pixels().iter().enumerate() {
            let demul = pixel.demultiply();
            if demul.alpha() == 0 {
                continue;
            }
            let local_x = index % spine_w as usize;
            let local_y = index / spine_w as usize;
            let idx = (local_y * canvas_w + offset_x + local_x) * 4;
            blend_pixel(
                canvas,
                idx,
                [demul.red(), demul.green(), demul.blue(), demul.alpha()],
            );
        }
    }
}

struct Sprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    content_key: Option<String>,
}

/// Paper-colored canvas with deterministic fiber noise.
fn base_canvas(width: u32, height: u32, paper: Rgb, grain_opacity: f32) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        rgba.extend_from_slice(&[paper.r(), paper.g(), paper.b(), 255]);
    }
    if grain_opacity > 0.0 {
        let mut rng = XorShift64::from_seed(PAPER_SEED);
        let blend = (grain_opacity.min(1.0) * 256.0) as u32;
        let keep = 256 - blend;
        for pixel in rgba.chunks_exact_mut(4) {
            let noise = 88 + (rng.next_byte() as u32 % 81);
            for channel in 0..3 {
                let src = u32::from(pixel[channel]);
                pixel[channel] = ((src * keep + noise * blend) >> 8) as u8;
            }
        }
    }
    rgba
}

/// Cubic-Bézier approximation of a circular arc, split into <=90° legs.
fn arc_path(
    cx: f32,
    cy: f32,
    radius: f32,
    start_deg: f32,
    sweep_deg: f32,
) -> Option<tiny_skia::Path> {
    if radius <= 0.0 || sweep_deg == 0.0 {
        return None;
    }
    let mut builder = tiny_skia::PathBuilder::new();
    let segments = (sweep_deg.abs() / 90.0).ceil().max(1.0) as u32;
    let step = (sweep_deg / segments as f32).to_radians();
    let mut angle = start_deg.to_radians();
    let k = 4.0 / 3.0 * (step / 4.0).tan();

    let point = |theta: f32| (cx + radius * theta.cos(), cy + radius * theta.sin());
    let (x0, y0) = point(angle);
    builder.move_to(x0, y0);

    for _ in 0..segments {
        let next = angle + step;
        let (x1, y1) = point(angle);
        let (x4, y4) = point(next);
        // Tangent directions at the endpoints.
        let c1 = (x1 - k * radius * angle.sin(), y1 + k * radius * angle.cos());
        let c2 = (x4 + k * radius * next.sin(), y4 - k * radius * next.cos());
        builder.cubic_to(c1.0, c1.1, c2.0, c2.1, x4, y4);
        angle = next;
    }

    builder.finish()
}

/// Expand the sprite with a solid frame, hard edges all round.
fn add_border(sprite: Sprite, width: u32, color: Rgb) -> Sprite {
    let new_w = sprite.width + width * 2;
    let new_h = sprite.height + width * 2;
    let mut rgba = Vec::with_capacity((new_w * new_h * 4) as usize);
    for _ in 0..new_w * new_h {
        rgba.extend_from_slice(&[color.r(), color.g(), color.b(), 255]);
    }
    let mut bordered = Sprite {
        width: new_w,
        height: new_h,
        rgba,
        content_key: sprite.content_key.clone(),
    };
    overlay_block(
        &mut bordered.rgba,
        new_w,
        new_h,
        &sprite.rgba,
        sprite.width,
        sprite.height,
        width as i64,
        width as i64,
    );
    bordered
}

/// Rotate about the sprite center, expanding the bounds. Inverse-mapped
/// bilinear sampling over premultiplied values keeps edges clean.
fn rotate_sprite(sprite: Sprite, degrees: f32) -> Sprite {
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();
    let src_w = sprite.width as f32;
    let src_h = sprite.height as f32;
    let new_w = (src_w * cos.abs() + src_h * sin.abs()).ceil().max(1.0) as u32;
    let new_h = (src_w * sin.abs() + src_h * cos.abs()).ceil().max(1.0) as u32;

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = new_w as f32 / 2.0;
    let dst_cy = new_h as f32 / 2.0;

    let sample = |x: i64, y: i64| -> [f32; 4] {
        if x < 0 || y < 0 || x >= sprite.width as i64 || y >= sprite.height as i64 {
            return [0.0; 4];
        }
        let idx = ((y as u32 * sprite.width + x as u32) * 4) as usize;
        let alpha = sprite.rgba[idx + 3] as f32 / 255.0;
        [
            sprite.rgba[idx] as f32 * alpha,
            sprite.rgba[idx + 1] as f32 * alpha,
            sprite.rgba[idx + 2] as f32 * alpha,
            sprite.rgba[idx + 3] as f32,
        ]
    };

    let mut rgba = vec![0u8; (new_w * new_h * 4) as usize];
    for dy in 0..new_h {
        for dx in 0..new_w {
            let rel_x = dx as f32 + 0.5 - dst_cx;
            let rel_y = dy as f32 + 0.5 - dst_cy;
            // Inverse rotation back into source space.
            let src_x = rel_x * cos + rel_y * sin + src_cx - 0.5;
            let src_y = -rel_x * sin + rel_y * cos + src_cy - 0.5;

            let x0 = src_x.floor() as i64;
            let y0 = src_y.floor() as i64;
            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let mut accum = [0.0_f32; 4];
            for (ox, oy, weight) in [
                (0, 0, (1.0 - fx) * (1.0 - fy)),
                (1, 0, fx * (1.0 - fy)),
                (0, 1, (1.0 - fx) * fy),
                (1, 1, fx * fy),
            ] {
                let value = sample(x0 + ox, y0 + oy);
                for channel in 0..4 {
                    accum[channel] += value[channel] * weight;
                }
            }

            let idx = ((dy * new_w + dx) * 4) as usize;
            let alpha = accum[3].clamp(0.0, 255.0);
            if alpha > 0.0 {
                let unpremul = 255.0 / alpha.max(1.0);
                rgba[idx] = (accum[0] * unpremul).clamp(0.0, 255.0) as u8;
                rgba[idx + 1] = (accum[1] * unpremul).clamp(0.0, 255.0) as u8;
                rgba[idx + 2] = (accum[2] * unpremul).clamp(0.0, 255.0) as u8;
                rgba[idx + 3] = alpha as u8;
            }
        }
    }

    Sprite {
        width: new_w,
        height: new_h,
        rgba,
        content_key: sprite.content_key,
    }
}

fn scale_alpha(rgba: &mut [u8], factor: f32) {
    let scale = (factor.clamp(0.0, 1.0) * 256.0) as u32;
    for pixel in rgba.chunks_exact_mut(4) {
        pixel[3] = ((u32::from(pixel[3]) * scale) >> 8) as u8;
    }
}

/// Hard-edged drop shadow: the sprite's thresholded silhouette in black at
/// a fixed offset. No feathering, ever.
fn stamp_hard_shadow(
    canvas: &mut [u8],
    canvas_w: u32,
    canvas_h: u32,
    sprite: &Sprite,
    origin_x: i64,
    origin_y: i64,
    opacity: f32,
) {
    let shadow_alpha = (opacity.clamp(0.0, 1.0) * 255.0) as u8;
    if shadow_alpha == 0 {
        return;
    }
    for sy in 0..sprite.height {
        let py = origin_y + sy as i64;
        if py < 0 || py >= canvas_h as i64 {
            continue;
        }
        for sx in 0..sprite.width {
            let px = origin_x + sx as i64;
            if px < 0 || px >= canvas_w as i64 {
                continue;
            }
            let src = ((sy * sprite.width + sx) * 4) as usize;
            if sprite.rgba[src + 3] < 128 {
                continue;
            }
            let idx = ((py as u32 * canvas_w + px as u32) * 4) as usize;
            blend_pixel(canvas, idx, [0, 0, 0, shadow_alpha]);
        }
    }
}

fn blend_sprite(
    canvas: &mut [u8],
    canvas_w: u32,
    canvas_h: u32,
    sprite: &Sprite,
    origin_x: i64,
    origin_y: i64,
) {
    for sy in 0..sprite.height {
        let py = origin_y + sy as i64;
        if py < 0 || py >= canvas_h as i64 {
            continue;
        }
        for sx in 0..sprite.width {
            let px = origin_x + sx as i64;
            if px < 0 || px >= canvas_w as i64 {
                continue;
            }
            let src = ((sy * sprite.width + sx) * 4) as usize;
            let idx = ((py as u32 * canvas_w + px as u32) * 4) as usize;
            blend_pixel(
                canvas,
                idx,
                [
                    sprite.rgba[src],
                    sprite.rgba[src + 1],
                    sprite.rgba[src + 2],
                    sprite.rgba[src + 3],
                ],
            );
        }
    }
}

/// Straight-alpha over an opaque canvas.
pub fn blend_pixel(canvas: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255_u16.saturating_sub(alpha);
    for channel in 0..3 {
        let dst = u16::from(canvas[idx + channel]);
        let src_c = u16::from(src[channel]);
        canvas[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    canvas[idx + 3] = 255;
}

/// Copy a straight-alpha block over a destination buffer at an offset,
/// blending where the block is translucent.
fn overlay_block(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    offset_x: i64,
    offset_y: i64,
) {
    for sy in 0..src_h {
        let py = offset_y + sy as i64;
        if py < 0 || py >= dst_h as i64 {
            continue;
        }
        for sx in 0..src_w {
            let px = offset_x + sx as i64;
            if px < 0 || px >= dst_w as i64 {
                continue;
            }
            let src_idx = ((sy * src_w + sx) * 4) as usize;
            let alpha = src[src_idx + 3];
            if alpha == 0 {
                continue;
            }
            let dst_idx = ((py as u32 * dst_w + px as u32) * 4) as usize;
            if alpha == 255 || dst[dst_idx + 3] == 0 {
                dst[dst_idx..dst_idx + 4].copy_from_slice(&src[src_idx..src_idx + 4]);
            } else {
                blend_pixel(
                    dst,
                    dst_idx,
                    [src[src_idx], src[src_idx + 1], src[src_idx + 2], alpha],
                );
            }
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque_sprite(width: u32, height: u32, color: [u8; 3]) -> Sprite {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            rgba.extend_from_slice(&[color[0], color[1], color[2], 255]);
        }
        Sprite {
            width,
            height,
            rgba,
            content_key: None,
        }
    }

    #[test]
    fn base_canvas_is_deterministic() {
        let paper = Rgb([0xF8, 0xF3, 0xE5]);
        let a = base_canvas(64, 32, paper, 0.05);
        let b = base_canvas(64, 32, paper, 0.05);
        assert_eq!(a, b);
    }

    #[test]
    fn base_canvas_without_grain_is_flat_paper() {
        let paper = Rgb([0xC8, 0xA1, 0x65]);
        let canvas = base_canvas(4, 4, paper, 0.0);
        for pixel in canvas.chunks_exact(4) {
            assert_eq!(pixel, [0xC8, 0xA1, 0x65, 0xFF]);
        }
    }

    #[test]
    fn border_expands_sprite_on_all_sides() {
        let sprite = opaque_sprite(10, 6, [50, 60, 70]);
        let bordered = add_border(sprite, 4, Rgb([255, 102, 0]));
        assert_eq!(bordered.width, 18);
        assert_eq!(bordered.height, 14);
        // Corner is border color, center is content.
        assert_eq!(&bordered.rgba[0..3], &[255, 102, 0]);
        let center = (((7 * 18) + 9) * 4) as usize;
        assert_eq!(&bordered.rgba[center..center + 3], &[50, 60, 70]);
    }

    #[test]
    fn rotation_expands_bounds_and_preserves_center_content() {
        let sprite = opaque_sprite(40, 20, [10, 200, 30]);
        let rotated = rotate_sprite(sprite, 90.0);
        assert!(rotated.width >= 20 && rotated.width <= 22);
        assert!(rotated.height >= 40 && rotated.height <= 42);
        let cx = rotated.width / 2;
        let cy = rotated.height / 2;
        let idx = ((cy * rotated.width + cx) * 4) as usize;
        assert_eq!(rotated.rgba[idx + 3], 255);
        assert_eq!(&rotated.rgba[idx..idx + 3], &[10, 200, 30]);
    }

    #[test]
    fn diagonal_rotation_fills_corners_with_transparency() {
        let sprite = opaque_sprite(10, 10, [1, 2, 3]);
        let rotated = rotate_sprite(sprite, 45.0);
        // 10px square rotated 45° spans ~14.14px.
        assert!(rotated.width >= 14 && rotated.width <= 16);
        assert!(rotated.height >= 14 && rotated.height <= 16);
        // The expanded corners are outside the source and stay transparent.
        assert_eq!(rotated.rgba[3], 0);
        let last = rotated.rgba.len() - 1;
        assert_eq!(rotated.rgba[last], 0);
    }

    #[test]
    fn hard_shadow_has_no_soft_edge() {
        let mut canvas = vec![200u8; 32 * 32 * 4];
        for pixel in canvas.chunks_exact_mut(4) {
            pixel[3] = 255;
        }
        let sprite = opaque_sprite(8, 8, [0, 0, 255]);
        stamp_hard_shadow(&mut canvas, 32, 32, &sprite, 4, 4, 0.6);

        // Inside the silhouette: darkened uniformly.
        let inside = ((6 * 32 + 6) * 4) as usize;
        let outside = ((6 * 32 + 14) * 4) as usize;
        let edge_in = ((4 * 32 + 4) * 4) as usize;
        assert!(canvas[inside] < 200);
        assert_eq!(canvas[inside], canvas[edge_in], "shadow must be flat");
        assert_eq!(canvas[outside], 200, "no spill past the silhouette");
    }

    #[test]
    fn blend_pixel_is_opaque_over_opaque() {
        let mut canvas = vec![100, 100, 100, 255];
        blend_pixel(&mut canvas, 0, [200, 0, 0, 255]);
        assert_eq!(canvas, vec![200, 0, 0, 255]);
    }

    #[test]
    fn arc_path_produces_a_curve() {
        let path = arc_path(50.0, 50.0, 20.0, 45.0, 180.0).expect("arc should build");
        let bounds = path.bounds();
        assert!(bounds.width() > 0.0 && bounds.height() > 0.0);
    }
}
