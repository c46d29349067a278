//! Cubic Bézier operations used by the fitter and the matcher.
//!
//! Everything is built on [`kurbo::CubicBez`]; this module adds the
//! sampled measures (arc length, point clouds, boxes), the normalized
//! frame used by the shape predicates, and the artifact detectors the
//! fitter relies on.
//!
//! A single pen sample is encoded as a degenerate cubic with all four
//! control points equal; every operation here tolerates it without
//! dividing by a zero chord.

use kurbo::{CubicBez, ParamCurve, Point, Rect, TranslateScale, Vec2};

use crate::geom;

/// Samples for the arc-length Riemann sum.
const ARC_LENGTH_SAMPLES: usize = 100;

/// Samples for point-cloud conversions and the linearity test.
const TO_POINTS_SAMPLES: usize = 40;

/// Mean |y| threshold (in the unit-chord frame) under which a curve is
/// considered linear.
const LINEAR_DIFF_THRESHOLD: f64 = 0.1;

/// Normalized end-curvature above which a terminal angle is an artifact
/// of the fit rather than a drawn feature.
const ROUGH_END_CURVATURE: f64 = 1000.0;

/// Normalized curvature above which control-point back-travel at a
/// stroke end is spurious.
const SPURIOUS_CURVATURE: f64 = 2000.0;

/// Combined arc length under which two subdivided curves are considered
/// intersecting.
const INTERSECT_ARC_FLOOR: f64 = 0.1;

/// The degenerate cubic covering a single point.
pub fn point_bez(p: Point) -> CubicBez {
    CubicBez::new(p, p, p, p)
}

/// The straight segment from `p0` to `p1`, with both inner control
/// points at the midpoint.
pub fn segment_bez(p0: Point, p1: Point) -> CubicBez {
    let mid = p0.midpoint(p1);
    CubicBez::new(p0, mid, mid, p1)
}

/// Outgoing tangent direction at the start, falling back across the
/// control polygon when leading control points coincide.
pub fn start_tangent(b: &CubicBez) -> Vec2 {
    for q in [b.p1, b.p2, b.p3] {
        let v = q - b.p0;
        if v.hypot2() > 1e-24 {
            return v;
        }
    }
    Vec2::ZERO
}

/// Incoming tangent direction at the end.
pub fn end_tangent(b: &CubicBez) -> Vec2 {
    for q in [b.p2, b.p1, b.p0] {
        let v = b.p3 - q;
        if v.hypot2() > 1e-24 {
            return v;
        }
    }
    Vec2::ZERO
}

/// Unsigned angle (degrees) between the end tangent of `a` and the
/// start tangent of `b`, i.e. how sharply the pen turns at the junction.
pub fn junction_angle_deg(a: &CubicBez, b: &CubicBez) -> f64 {
    geom::angle_deg(end_tangent(a), start_tangent(b)).abs()
}

pub trait CubicExt {
    fn point_at(&self, t: f64) -> Point;
    fn derivative_at(&self, t: f64) -> Vec2;
    fn second_derivative_at(&self, t: f64) -> Vec2;
    /// Signed curvature; zero on degenerate (point-like) parameters.
    fn curvature_at(&self, t: f64) -> f64;
    fn split_at(&self, t: f64) -> (CubicBez, CubicBez);
    fn split_between(&self, t0: f64, t1: f64) -> CubicBez;
    /// Polyline length over a fixed Riemann subdivision.
    fn arc_length(&self) -> f64;
    fn to_points(&self) -> Vec<Point>;
    /// Box of the sampled points (tight enough for layout purposes).
    fn bounding_box(&self) -> Rect;
    /// Box of the four control points.
    fn control_box(&self) -> Rect;
    fn is_point(&self) -> Option<Point>;
    /// Mean |y| over the unit-chord frame; infinite when the curve
    /// cannot be a line at all.
    fn diff_with_line(&self) -> f64;
    fn is_roughly_linear(&self) -> bool;
    /// Angle (degrees) between start and end tangents.
    fn internal_turn_deg(&self) -> f64;
    /// Translate/rotate so that P0 = 0 and P3 lies on +X.
    fn normalized(&self) -> CubicBez;
    /// Parameters in [0, 1] where dy/dt vanishes.
    fn critical_points_y(&self) -> Vec<f64>;
    /// Parameters in [0, 1] where dx/dt vanishes.
    fn critical_points_x(&self) -> Vec<f64>;
    /// If the curve ends in a high-curvature hook that the fit injected,
    /// returns the parameter to split it away at.
    fn rough_end_angle(&self) -> Option<f64>;
    /// (start, end) flags for control-point back-travel with excessive
    /// curvature at the matching critical point.
    fn spurious_curvature(&self) -> (bool, bool);
    fn transform(&self, tr: TranslateScale) -> CubicBez;
    /// Recursive control-box subdivision intersection test.
    fn intersects(&self, other: &CubicBez) -> bool;
}

impl CubicExt for CubicBez {
    fn point_at(&self, t: f64) -> Point {
        self.eval(t)
    }

    fn derivative_at(&self, t: f64) -> Vec2 {
        let q0 = self.p1 - self.p0;
        let q1 = self.p2 - self.p1;
        let q2 = self.p3 - self.p2;
        let s = 1.0 - t;
        q0 * (3.0 * s * s) + q1 * (6.0 * t * s) + q2 * (3.0 * t * t)
    }

    fn second_derivative_at(&self, t: f64) -> Vec2 {
        let q0 = self.p1 - self.p0;
        let q1 = self.p2 - self.p1;
        let q2 = self.p3 - self.p2;
        let r0 = q1 - q0;
        let r1 = q2 - q1;
        r0 * (6.0 * (1.0 - t)) + r1 * (6.0 * t)
    }

    fn curvature_at(&self, t: f64) -> f64 {
        let d1 = self.derivative_at(t);
        let d2 = self.second_derivative_at(t);
        let speed = d1.hypot();
        let denom = speed * speed * speed;
        if denom < 1e-12 {
            return 0.0;
        }
        d1.cross(d2) / denom
    }

    fn split_at(&self, t: f64) -> (CubicBez, CubicBez) {
        if t <= 0.0 {
            return (point_bez(self.p0), *self);
        }
        if t >= 1.0 {
            return (*self, point_bez(self.p3));
        }
        (self.subsegment(0.0..t), self.subsegment(t..1.0))
    }

    fn split_between(&self, t0: f64, t1: f64) -> CubicBez {
        self.subsegment(t0..t1)
    }

    fn arc_length(&self) -> f64 {
        let mut prev = self.p0;
        let mut length = 0.0;
        for i in 1..=ARC_LENGTH_SAMPLES {
            let p = self.eval(i as f64 / ARC_LENGTH_SAMPLES as f64);
            length += prev.distance(p);
            prev = p;
        }
        length
    }

    fn to_points(&self) -> Vec<Point> {
        (0..=TO_POINTS_SAMPLES)
            .map(|i| self.eval(i as f64 / TO_POINTS_SAMPLES as f64))
            .collect()
    }

    fn bounding_box(&self) -> Rect {
        geom::bounding_box(&self.to_points())
    }

    fn control_box(&self) -> Rect {
        let mut out = Rect::new(self.p0.x, self.p0.y, self.p0.x, self.p0.y);
        geom::enlarge(&mut out, self.p1);
        geom::enlarge(&mut out, self.p2);
        geom::enlarge(&mut out, self.p3);
        out
    }

    fn is_point(&self) -> Option<Point> {
        (self.p0 == self.p1 && self.p1 == self.p2 && self.p2 == self.p3).then_some(self.p0)
    }

    fn diff_with_line(&self) -> f64 {
        let n = self.normalized();
        let dx = n.p3.x;
        if dx < 1e-9 {
            return f64::INFINITY;
        }
        // control points outside the chord span cannot belong to a line
        if n.p1.x < 0.0 || n.p2.x > n.p3.x {
            return f64::INFINITY;
        }
        let unit = n.transform(TranslateScale::scale(1.0 / dx));
        let points = unit.to_points();
        let area: f64 = points.iter().map(|p| p.y.abs()).sum();
        area / points.len() as f64
    }

    fn is_roughly_linear(&self) -> bool {
        self.diff_with_line() < LINEAR_DIFF_THRESHOLD
    }

    fn internal_turn_deg(&self) -> f64 {
        geom::angle_deg(self.derivative_at(0.0), self.derivative_at(1.0))
    }

    fn normalized(&self) -> CubicBez {
        let origin = self.p0;
        let chord = self.p3 - origin;
        let theta = chord.y.atan2(chord.x);
        let (sin, cos) = (-theta).sin_cos();
        let rotate = |p: Point| {
            let v = p - origin;
            Point::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
        };
        CubicBez::new(Point::ZERO, rotate(self.p1), rotate(self.p2), rotate(self.p3))
    }

    fn critical_points_y(&self) -> Vec<f64> {
        let (a, b, c) = derivative_coefficients(self);
        quadratic_roots_in_unit(a.y, b.y, c.y)
    }

    fn critical_points_x(&self) -> Vec<f64> {
        let (a, b, c) = derivative_coefficients(self);
        quadratic_roots_in_unit(a.x, b.x, c.x)
    }

    fn rough_end_angle(&self) -> Option<f64> {
        let n = self.normalized();

        // controls must be opposite, with P2 overshooting past P3
        if !(n.p2.x > n.p3.x && n.p1.y * n.p2.y < 0.0) {
            return None;
        }

        let ts = n.critical_points_y();
        let t = ts.iter().copied().fold(f64::NAN, f64::max);
        if !t.is_finite() {
            return None;
        }

        // curvature evolves as 1/length², normalize by the squared chord
        let chord2 = n.p3.to_vec2().hypot2();
        let curvature = n.curvature_at(t).abs() * chord2;
        (curvature > ROUGH_END_CURVATURE).then_some(t)
    }

    fn spurious_curvature(&self) -> (bool, bool) {
        let n = self.normalized();
        let chord2 = n.p3.to_vec2().hypot2();
        if chord2 < 1e-12 {
            return (false, false);
        }
        let excessive = |ts: &[f64]| {
            ts.iter()
                .any(|&t| n.curvature_at(t).abs() * chord2 > SPURIOUS_CURVATURE)
        };
        let ts = n.critical_points_x();
        // back-travel: the curve first runs against the chord direction
        let start = n.p1.x < 0.0 && excessive(&ts);
        let end = n.p2.x > n.p3.x && excessive(&ts);
        (start, end)
    }

    fn transform(&self, tr: TranslateScale) -> CubicBez {
        CubicBez::new(tr * self.p0, tr * self.p1, tr * self.p2, tr * self.p3)
    }

    fn intersects(&self, other: &CubicBez) -> bool {
        let boxes = geom::intersection(self.control_box(), other.control_box());
        if geom::is_empty(boxes) {
            return false;
        }
        if self.arc_length() + other.arc_length() < INTERSECT_ARC_FLOOR {
            return true;
        }
        let (a1, a2) = self.split_at(0.5);
        let (b1, b2) = other.split_at(0.5);
        a1.intersects(&b1) || a1.intersects(&b2) || a2.intersects(&b1) || a2.intersects(&b2)
    }
}

/// Coefficients (A, B, C) of the derivative B'(t) = 3(At² + Bt + C).
fn derivative_coefficients(b: &CubicBez) -> (Vec2, Vec2, Vec2) {
    let q0 = b.p1 - b.p0;
    let q1 = b.p2 - b.p1;
    let q2 = b.p3 - b.p2;
    let a = q0 - q1 * 2.0 + q2;
    let bb = (q1 - q0) * 2.0;
    (a, bb, q0)
}

/// Real roots of `at² + bt + c` restricted to [0, 1].
fn quadratic_roots_in_unit(a: f64, b: f64, c: f64) -> Vec<f64> {
    let mut out = Vec::new();
    if a.abs() < 1e-12 {
        if b.abs() < 1e-12 {
            return out;
        }
        let t = -c / b;
        if (0.0..=1.0).contains(&t) {
            out.push(t);
        }
        return out;
    }
    let delta = b * b - 4.0 * a * c;
    if delta < 0.0 {
        return out;
    }
    let sd = delta.sqrt();
    let t1 = (-b + sd) / (2.0 * a);
    let t2 = (-b - sd) / (2.0 * a);
    if (0.0..=1.0).contains(&t1) {
        out.push(t1);
    }
    if (0.0..=1.0).contains(&t2) && t2 != t1 {
        out.push(t2);
    }
    out
}
