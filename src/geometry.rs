//! Canvas-space rectangle math: rotated bounding boxes, spine intersection,
//! and safe-zone containment.
//!
//! Rotation here is always relative to the canvas, never to a parent. The
//! element list is flat, so a rotated container does not compound rotation
//! onto anything placed over it.

/// Axis-aligned rectangle in canvas pixels. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// Shrink the rectangle by `dx`/`dy` on each side. Collapses to a
    /// zero-size rect at the center rather than inverting.
    pub fn inset(&self, dx: f32, dy: f32) -> Self {
        let w = (self.w - 2.0 * dx).max(0.0);
        let h = (self.h - 2.0 * dy).max(0.0);
        let (cx, cy) = self.center();
        Self {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }

    /// Strict overlap: rectangles that merely share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }

    /// True when `inner` lies entirely within `self` (edges may touch).
    pub fn contains_rect(&self, inner: &Rect) -> bool {
        inner.left() >= self.left()
            && inner.right() <= self.right()
            && inner.top() >= self.top()
            && inner.bottom() <= self.bottom()
    }
}

/// Bounding box of `rect` rotated `degrees` about its own center.
///
/// The box is axis-aligned and centered where the original was, which is
/// exactly how the compositor expands a sprite when it rotates it.
pub fn rotated_bounds(rect: Rect, degrees: f32) -> Rect {
    if degrees == 0.0 {
        return rect;
    }
    let radians = degrees.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let w = rect.w * cos + rect.h * sin;
    let h = rect.w * sin + rect.h * cos;
    let (cx, cy) = rect.center();
    Rect {
        x: cx - w / 2.0,
        y: cy - h / 2.0,
        w,
        h,
    }
}

/// Which half of the spread a tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageHalf {
    Left,
    Right,
}

impl PageHalf {
    /// Derived from the leading `L_`/`R_` of a tag id. Tags that fail the
    /// naming grammar never reach this point.
    pub fn from_tag(tag_id: &str) -> Option<Self> {
        match tag_id.as_bytes().first() {
            Some(b'L') => Some(Self::Left),
            Some(b'R') => Some(Self::Right),
            _ => None,
        }
    }
}
