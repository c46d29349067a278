//! Shared geometry utilities.
//!
//! Coordinates follow the screen convention: +Y points downward.
//! Rectangles use the "empty" convention below so that unions over an
//! arbitrary collection of boxes need no special casing.

use kurbo::{Point, Rect, TranslateScale, Vec2};

/// The empty rectangle, honoring:
///   - `union(EMPTY_RECT, r) == union(r, EMPTY_RECT) == r`
///   - `enlarge(EMPTY_RECT, p) == {p, p}`
pub const EMPTY_RECT: Rect = Rect {
    x0: f64::INFINITY,
    y0: f64::INFINITY,
    x1: f64::NEG_INFINITY,
    y1: f64::NEG_INFINITY,
};

/// Whether `r` encloses no point at all.
pub fn is_empty(r: Rect) -> bool {
    r.x0 > r.x1 || r.y0 > r.y1
}

/// Closed-interval point containment. The empty rectangle contains nothing.
pub fn contains(r: Rect, p: Point) -> bool {
    r.x0 <= p.x && p.x <= r.x1 && r.y0 <= p.y && p.y <= r.y1
}

/// Grow `r` to include `p`.
pub fn enlarge(r: &mut Rect, p: Point) {
    r.x0 = r.x0.min(p.x);
    r.y0 = r.y0.min(p.y);
    r.x1 = r.x1.max(p.x);
    r.y1 = r.y1.max(p.y);
}

/// Smallest rectangle enclosing both operands.
pub fn union(a: Rect, b: Rect) -> Rect {
    Rect {
        x0: a.x0.min(b.x0),
        y0: a.y0.min(b.y0),
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
    }
}

/// Intersection, or [`EMPTY_RECT`] when the operands are disjoint.
pub fn intersection(a: Rect, b: Rect) -> Rect {
    let x0 = a.x0.max(b.x0);
    let y0 = a.y0.max(b.y0);
    let x1 = a.x1.min(b.x1);
    let y1 = a.y1.min(b.y1);
    if x0 > x1 || y0 > y1 {
        return EMPTY_RECT;
    }
    Rect { x0, y0, x1, y1 }
}

/// Width clamped to zero, so degenerate boxes never go negative.
pub fn width(r: Rect) -> f64 {
    (r.x1 - r.x0).max(0.0)
}

/// Height clamped to zero.
pub fn height(r: Rect) -> f64 {
    (r.y1 - r.y0).max(0.0)
}

pub fn area(r: Rect) -> f64 {
    width(r) * height(r)
}

pub fn mid_x(r: Rect) -> f64 {
    (r.x0 + r.x1) / 2.0
}

/// Bounding box of a point cloud; [`EMPTY_RECT`] for an empty slice.
pub fn bounding_box(points: &[Point]) -> Rect {
    let mut out = EMPTY_RECT;
    for &p in points {
        enlarge(&mut out, p);
    }
    out
}

/// Signed angle from `u` to `v`, in degrees, in (-180, 180].
pub fn angle_deg(u: Vec2, v: Vec2) -> f64 {
    let dot = u.dot(v);
    let det = u.cross(v);
    det.atan2(dot).to_degrees()
}

/// Distance between two angles in degrees, accounting for the
/// discontinuity of the principal measure at ±180.
pub fn angle_diff_deg(a1: f64, a2: f64) -> f64 {
    if a1 >= 0.0 && a2 < 0.0 {
        (a1 - a2).abs().min((a1 - a2 - 360.0).abs())
    } else if a1 < 0.0 && a2 > 0.0 {
        (a1 - a2).abs().min((a1 - a2 + 360.0).abs())
    } else {
        (a1 - a2).abs()
    }
}

/// Fixed vertical reference of a writing area: the Y band it covers and
/// the baseline the glyphs sit on.
///
/// Used both to place child scopes and to separate upper from lower
/// case by size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightGrid {
    pub y_min: f64,
    pub y_max: f64,
    /// Y coordinate with `y_min <= baseline <= y_max`.
    pub baseline: f64,
}

impl HeightGrid {
    /// Grid of the given height whose baseline sits at `baseline`, with
    /// the standard share of the band above it.
    pub fn from_baseline(baseline: f64, height: f64) -> HeightGrid {
        let y_min = baseline - height * crate::config::EM_BASELINE_RATIO;
        HeightGrid {
            y_min,
            y_max: y_min + height,
            baseline,
        }
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// The uniform-scale + translation transform sending `src` onto `dst`.
///
/// A uniform scale cannot map an arbitrary box onto another exactly; the
/// scale is taken from the dominant dimensions (floored at 1 so bars and
/// dots survive) and the centers are aligned.
pub fn map_from_to(src: Rect, dst: Rect) -> TranslateScale {
    if is_empty(src) || is_empty(dst) {
        return TranslateScale::new(Vec2::ZERO, 1.0);
    }
    let scale = width(dst).max(height(dst)).max(1.0) / width(src).max(height(src)).max(1.0);
    let src_center = Point::new((src.x0 + src.x1) / 2.0, (src.y0 + src.y1) / 2.0);
    let dst_center = Point::new((dst.x0 + dst.x1) / 2.0, (dst.y0 + dst.y1) / 2.0);
    let translation = dst_center - Point::new(src_center.x * scale, src_center.y * scale);
    TranslateScale::new(translation, scale)
}
