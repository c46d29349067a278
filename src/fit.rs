//! Curve fitting: pen polylines → unions of cubic Béziers.
//!
//! Per shape:
//! 1. Strip capture artifacts (duplicated samples, parasitic hooks at
//!    both ends, sensor jitter on the final samples)
//! 2. Recursive cubic fitting (Schneider) with Newton-Raphson
//!    reparameterization
//! 3. Merge pass: collapse retraced openings, fuse aligned neighbors
//!    into segments or single cubics, strip injected end curvature

use kurbo::{CubicBez, Point, Vec2};
use log::debug;

use crate::bezier::{junction_angle_deg, point_bez, segment_bez, CubicExt};
use crate::geom;

// ── Named constants ──────────────────────────────────────

/// Max squared sample deviation under which a single cubic is accepted.
const FIT_INLIER_SQ: f64 = 5.0;

/// Max squared deviation under which reparameterization is attempted
/// before splitting.
const FIT_ITERATION_SQ: f64 = 50.0;

/// Newton-Raphson reparameterization rounds. Tuned experimentally.
const MAX_NEWTON_STEPS: usize = 8;

/// Tangent estimates whose spread exceeds this are averaged.
const TANGENT_SPREAD_DEG: f64 = 30.0;

/// Local turn under which the two center tangents at a split point are
/// replaced by their common chord direction.
const CENTER_TANGENT_TURN_DEG: f64 = 45.0;

/// Junction angle under which two neighbors may fuse into one segment.
const MERGE_LINE_JUNCTION_DEG: f64 = 10.0;

/// Mean squared line-regression residual for the segment fusion.
const MERGE_LINE_ERROR: f64 = 1.1;

/// Junction angle under which two neighbors may fuse into one cubic.
const MERGE_CURVE_JUNCTION_DEG: f64 = 5.0;

/// Max squared refit deviation for the cubic fusion.
const MERGE_CURVE_ERROR: f64 = 12.0;

/// Tangent continuity with the surrounding curves required to accept a
/// cubic fusion.
const MERGE_CONTINUITY_DEG: f64 = 20.0;

/// Junction turn above which an opening segment pair counts as a
/// retrace of the same line.
const RETRACE_TURN_DEG: f64 = 160.0;

/// Max distance from the first curve's start to the second curve's
/// chord for the retrace collapse.
const RETRACE_CHORD_DIST: f64 = 2.0;

/// Gradient-descent budget for the cubic refit used by the merge pass.
const REFIT_MAX_ITERATIONS: usize = 50;
const REFIT_STEP: f64 = -0.1;

/// Fit a polyline with a minimal union of cubic Béziers.
///
/// Returns an empty list for an empty shape and a degenerate point
/// curve for a shape that never leaves one spot.
pub fn fit_curves(samples: &[Point]) -> Vec<CubicBez> {
    let mut points: Vec<Point> = samples.to_vec();
    points.dedup();

    if points.is_empty() {
        return Vec::new();
    }
    if points.len() == 1 || diameter(&points) <= 1.0 {
        return vec![point_bez(points[0])];
    }

    remove_side_artifacts(&mut points);

    if points.len() == 1 || diameter(&points) <= 1.0 {
        return vec![point_bez(points[0])];
    }
    if points.len() <= 3 {
        return vec![segment_bez(points[0], *points.last().unwrap())];
    }

    let t_start = stroke_start_tangent(&points);
    let t_end = stroke_end_tangent(&points);
    let fitted = fit_or_split(&points, t_start, t_end);
    let merged = merge_curves(fitted);
    debug!(
        "fit: {} samples -> {} curves ({} after merge)",
        samples.len(),
        points.len(),
        merged.len()
    );
    merged
}

// ── Artifact removal ─────────────────────────────────────

/// Strip capture artifacts from both ends of the polyline.
///
/// Pen-down and pen-up inject non-moving samples, retraced prefixes and
/// jittery tails; all of them derail the tangent estimation below.
fn remove_side_artifacts(points: &mut Vec<Point>) {
    if let Some(cut) = spurious_repetition_start(points) {
        points.drain(..cut);
    }

    if points.len() >= 4 && points[0].distance(points[3]) <= 1.0 {
        points.remove(0);
    }
    if points.len() >= 3 && points[2] == points[0] {
        // the pen came back over its own start: extrapolate a fresh one
        points[0] = points[1] + (points[1] - points[2]);
    }

    let n = points.len();
    if n >= 5 && diameter(&points[n - 5..]) <= 3.0 {
        points.truncate(n - 3);
    } else if let Some(cut) = spurious_repetition_end(points) {
        points.truncate(cut);
    }

    // smooth the last interior samples as neighbor midpoints
    if points.len() > 5 {
        let last = points.len() - 1;
        for i in (1..=4).rev() {
            points[last - i] = points[last - i - 1].midpoint(points[last - i + 1]);
        }
    }
}

/// A repeated point among the first samples marks a parasitic prefix;
/// returns the index to cut before.
fn spurious_repetition_start(points: &[Point]) -> Option<usize> {
    let scan = points.len().min(10);
    for j in 1..scan {
        for i in 0..j {
            if points[i] == points[j] {
                return Some(i);
            }
        }
    }
    None
}

/// A repeated point among the last six samples; returns the index to
/// truncate at.
fn spurious_repetition_end(points: &[Point]) -> Option<usize> {
    let start = points.len().saturating_sub(6);
    for j in start + 1..points.len() {
        for i in start..j {
            if points[i] == points[j] {
                return Some(j);
            }
        }
    }
    None
}

/// Max pairwise distance.
fn diameter(points: &[Point]) -> f64 {
    let mut max_sq = 0.0_f64;
    for p in points {
        for q in points {
            max_sq = max_sq.max((*p - *q).hypot2());
        }
    }
    max_sq.sqrt()
}

// ── Tangent estimation ───────────────────────────────────

fn stroke_start_tangent(d: &[Point]) -> Vec2 {
    let t1 = d[1] - d[0];
    let (t2, t3) = if d.len() >= 4 {
        (d[2] - d[0], d[3] - d[0])
    } else {
        (t1, t1)
    };
    robust_tangent(t1, t2, t3)
}

fn stroke_end_tangent(d: &[Point]) -> Vec2 {
    let end = d.len() - 1;
    let t1 = d[end - 1] - d[end];
    let (t2, t3) = if d.len() >= 4 {
        (d[end - 2] - d[end], d[end - 3] - d[end])
    } else {
        (t1, t1)
    };
    robust_tangent(t1, t2, t3)
}

/// Average several tangent candidates when their spread is large.
fn robust_tangent(t1: Vec2, t2: Vec2, t3: Vec2) -> Vec2 {
    let mut t = t1;
    if geom::angle_deg(t1, t3).abs() > TANGENT_SPREAD_DEG {
        t = (t1 + t2 + t3) / 3.0;
    }
    normalize_or_x(t)
}

fn normalize_or_x(v: Vec2) -> Vec2 {
    let len = v.hypot();
    if len < 1e-12 {
        return Vec2::new(1.0, 0.0);
    }
    v / len
}

/// Tangents on both sides of a split point, averaged over a small
/// window when the local turn is gentle.
fn center_tangents(d: &[Point], center: usize) -> (Vec2, Vec2) {
    let mut left = stroke_end_tangent(&d[..=center]);
    let mut right = stroke_start_tangent(&d[center..]);

    if center >= 2 && center + 2 < d.len() {
        let u = d[center] - d[center - 2];
        let v = d[center + 2] - d[center];
        if geom::angle_deg(u, v).abs() < CENTER_TANGENT_TURN_DEG {
            let mean = (u + v) / 2.0;
            left = normalize_or_x(mean * -1.0);
            right = normalize_or_x(mean);
        }
    }

    (left, right)
}

// ── Recursive cubic fit (Schneider) ──────────────────────

/// Fit one cubic if the error allows, else split at the worst sample
/// and recurse.
///
/// `t_start` points into the curve from its first sample, `t_end`
/// points into the curve from its last sample.
fn fit_or_split(points: &[Point], t_start: Vec2, t_end: Vec2) -> Vec<CubicBez> {
    // two points: heuristic placement on the chord thirds
    if points.len() <= 2 {
        let (first, last) = (points[0], *points.last().unwrap());
        let dist = first.distance(last) / 3.0;
        return vec![CubicBez::new(
            first,
            first + t_start * dist,
            last + t_end * dist,
            last,
        )];
    }

    let mut u = path_length_indices(points);
    let mut bez = infer_bezier(points, &u, t_start, t_end);
    let (first_error, mut split) = bezier_error(points, &bez, &u);

    if first_error < FIT_ITERATION_SQ {
        let mut best_error = first_error;
        let mut best = bez;
        for _ in 0..MAX_NEWTON_STEPS {
            u = reparameterize(points, &u, &bez);
            bez = infer_bezier(points, &u, t_start, t_end);
            let (err, s) = bezier_error(points, &bez, &u);
            if err < best_error {
                best_error = err;
                best = bez;
                split = s;
            }
        }

        if best_error < FIT_INLIER_SQ {
            return vec![best];
        }
    }

    // fitting failed: split at the max error sample and fit each half
    let split = split.clamp(1, points.len() - 2);
    let (tc_left, tc_right) = center_tangents(points, split);

    let mut out = fit_or_split(&points[..=split], t_start, tc_left);
    out.extend(fit_or_split(&points[split..], tc_right, t_end));
    out
}

/// Least-squares placement of the two tangent-aligned control points
/// (Schneider's A/C/X system), with the Wu/Barsky fallback on a
/// degenerate or non-positive solution.
fn infer_bezier(d: &[Point], u: &[f64], t_start: Vec2, t_end: Vec2) -> CubicBez {
    let first = d[0];
    let last = *d.last().unwrap();

    let mut c = [[0.0_f64; 2]; 2];
    let mut x = [0.0_f64; 2];

    for (i, &ui) in u.iter().enumerate() {
        let s = 1.0 - ui;
        let a0 = t_start * (3.0 * ui * s * s);
        let a1 = t_end * (3.0 * ui * ui * s);

        c[0][0] += a0.dot(a0);
        c[0][1] += a0.dot(a1);
        c[1][0] = c[0][1];
        c[1][1] += a1.dot(a1);

        let base = CubicBez::new(first, first, last, last).point_at(ui);
        let tmp = d[i] - base;

        x[0] += a0.dot(tmp);
        x[1] += a1.dot(tmp);
    }

    let det_c0_c1 = c[0][0] * c[1][1] - c[1][0] * c[0][1];
    let det_c0_x = c[0][0] * x[1] - c[1][0] * x[0];
    let det_x_c1 = x[0] * c[1][1] - x[1] * c[0][1];

    let alpha_l = if det_c0_c1 != 0.0 { det_x_c1 / det_c0_c1 } else { 0.0 };
    let alpha_r = if det_c0_c1 != 0.0 { det_c0_x / det_c0_c1 } else { 0.0 };

    // Non-positive alphas produce coincident control points which break
    // the Newton step; fall back to chord thirds.
    let chord = first.distance(last);
    let epsilon = 1.0e-6 * chord;
    if alpha_l < epsilon || alpha_r < epsilon {
        let dist = chord / 3.0;
        return CubicBez::new(first, first + t_start * dist, last + t_end * dist, last);
    }

    CubicBez::new(
        first,
        first + t_start * alpha_l,
        last + t_end * alpha_r,
        last,
    )
}

/// One Newton-Raphson refinement of every sample parameter.
fn reparameterize(d: &[Point], u: &[f64], bez: &CubicBez) -> Vec<f64> {
    d.iter()
        .zip(u)
        .map(|(&p, &ui)| newton_raphson_step(bez, p, ui))
        .collect()
}

/// Move `u` toward the parameter whose curve point is closest to `p`.
fn newton_raphson_step(q: &CubicBez, p: Point, u: f64) -> f64 {
    let q_u = q.point_at(u);
    let q1_u = q.derivative_at(u);
    let q2_u = q.second_derivative_at(u);

    let diff = q_u - p;
    let numerator = diff.dot(q1_u);
    let denominator = q1_u.dot(q1_u) + diff.dot(q2_u);
    if denominator == 0.0 {
        return u;
    }
    u - numerator / denominator
}

/// Normalized cumulative path-length parameter for every sample.
pub fn path_length_indices(points: &[Point]) -> Vec<f64> {
    let mut out = vec![0.0; points.len()];
    let mut total = 0.0;
    for i in 1..points.len() {
        total += points[i].distance(points[i - 1]);
        out[i] = total;
    }
    if total <= 1e-12 {
        // all samples coincide: spread parameters evenly
        for (i, v) in out.iter_mut().enumerate() {
            *v = i as f64 / (points.len() - 1).max(1) as f64;
        }
        return out;
    }
    for v in &mut out {
        *v /= total;
    }
    out
}

/// Max squared distance from the samples to the fitted curve, and the
/// index of the worst sample.
fn bezier_error(d: &[Point], bez: &CubicBez, u: &[f64]) -> (f64, usize) {
    let mut max_dist = 0.0;
    let mut max_index = 0;
    for (i, (&p, &ui)) in d.iter().zip(u).enumerate() {
        let dist = (bez.point_at(ui) - p).hypot2();
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }
    (max_dist, max_index)
}

// ── Line fit ─────────────────────────────────────────────

/// Least-squares line through the points, clipped to their extent.
/// Returns the segment and the mean squared residual.
fn fit_segment(points: &[Point]) -> (CubicBez, f64) {
    if points.len() < 3 {
        let p0 = points.first().copied().unwrap_or(Point::ZERO);
        let p1 = points.last().copied().unwrap_or(p0);
        return (segment_bez(p0, p1), 0.0);
    }

    let n = (points.len() - 2) as f64;
    let (mut sx, mut sy, mut sxy, mut sx2) = (0.0, 0.0, 0.0, 0.0);
    for p in &points[1..points.len() - 1] {
        sx += p.x;
        sy += p.y;
        sxy += p.x * p.y;
        sx2 += p.x * p.x;
    }
    sx /= n;
    sy /= n;
    sxy /= n;
    sx2 /= n;

    let denom = sx2 - sx * sx;
    let (u, a) = if denom.abs() < 1e-4 {
        // vertical line
        (Vec2::new(0.0, 1.0), Point::new(points[0].x, 0.0))
    } else {
        let m = (sxy - sx * sy) / denom;
        let b = sy - m * sx;
        (Vec2::new(1.0, m), Point::new(0.0, b))
    };
    let nu = u.hypot2();

    let mut min_t = f64::INFINITY;
    let mut max_t = f64::NEG_INFINITY;
    let (mut start, mut end) = (a, a);
    let mut err = 0.0;
    for &p in points {
        let t = u.dot(p - a) / nu;
        let h = a + u * t;
        err += (p - h).hypot2();
        if t < min_t {
            min_t = t;
            start = h;
        }
        if t > max_t {
            max_t = t;
            end = h;
        }
    }

    (segment_bez(start, end), err / n)
}

// ── Single-cubic refit (gradient descent) ────────────────

/// Fit one cubic to the points by gradient descent on the two inner
/// control points, returning the max squared deviation.
fn fit_cubic(points: &[Point]) -> (CubicBez, f64) {
    if points.len() < 2 {
        let p = points.first().copied().unwrap_or(Point::ZERO);
        return (point_bez(p), 0.0);
    }

    let u = path_length_indices(points);
    let start = points[0];
    let end = *points.last().unwrap();
    let third = (end - start) / 3.0;
    let mut bez = CubicBez::new(start, start + third, end - third, end);

    let mut err = f64::INFINITY;
    for _ in 0..REFIT_MAX_ITERATIONS {
        let grad = energy_gradient(points, &u, &bez);
        bez.p1 += Vec2::new(REFIT_STEP * grad[0], REFIT_STEP * grad[1]);
        bez.p2 += Vec2::new(REFIT_STEP * grad[2], REFIT_STEP * grad[3]);

        let (new_err, _) = bezier_error(points, &bez, &u);
        if (new_err - err).abs() < 0.1 {
            err = new_err;
            break;
        }
        err = new_err;
    }

    (bez, err)
}

/// Gradient of the sample-to-curve energy with respect to P1 and P2.
fn energy_gradient(points: &[Point], u: &[f64], bez: &CubicBez) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (&p, &ti) in points.iter().zip(u) {
        let diff = bez.point_at(ti) - p;
        let s = 1.0 - ti;
        let b1 = 3.0 * s * s * ti;
        let b2 = 3.0 * s * ti * ti;
        out[0] += diff.x * b1;
        out[1] += diff.y * b1;
        out[2] += diff.x * b2;
        out[3] += diff.y * b2;
    }
    out
}

// ── Merge pass ───────────────────────────────────────────

/// Post-process a fit: collapse a retraced opening, fuse aligned
/// neighbors into segments or single cubics, split off injected end
/// angles, and mirror away spurious curvature at both stroke ends.
fn merge_curves(mut curves: Vec<CubicBez>) -> Vec<CubicBez> {
    if curves.is_empty() {
        return curves;
    }

    if curves.len() >= 2 && is_retraced_opening(&curves[0], &curves[1]) {
        debug!("merge: dropping retraced opening segment");
        curves.remove(0);
    }

    let mut out = vec![curves[0]];
    for i in 1..curves.len() {
        let prev = *out.last().unwrap();
        let cur = curves[i];
        let junction = junction_angle_deg(&prev, &cur);

        let mut points = prev.to_points();
        points.extend(cur.to_points());

        if junction < MERGE_LINE_JUNCTION_DEG {
            let (_, err_segment) = fit_segment(&points);
            if err_segment < MERGE_LINE_ERROR {
                *out.last_mut().unwrap() = segment_bez(prev.p0, cur.p3);
                continue;
            }
        }

        if junction < MERGE_CURVE_JUNCTION_DEG {
            let (merged, err_curve) = fit_cubic(&points);
            if err_curve < MERGE_CURVE_ERROR
                && continuity_holds(&merged, out.len().checked_sub(2).map(|j| &out[j]), curves.get(i + 1))
            {
                *out.last_mut().unwrap() = merged;
                continue;
            }

            // an end angle injected by the fit: split it off the first
            // curve and refit the remainder together with the next one
            if let Some(t) = prev.rough_end_angle() {
                let (left, right) = prev.split_at(t);
                let mut tail = right.to_points();
                tail.extend(cur.to_points());
                let (refit, _) = fit_cubic(&tail);
                *out.last_mut().unwrap() = left;
                out.push(refit);
                continue;
            }
        }

        out.push(cur);
    }

    strip_end_curvature(&mut out);
    out
}

/// Two near-linear opening segments retracing the same chord; the first
/// carries no information.
fn is_retraced_opening(c0: &CubicBez, c1: &CubicBez) -> bool {
    if !(c0.is_roughly_linear() && c1.is_roughly_linear()) {
        return false;
    }
    if junction_angle_deg(c0, c1) <= RETRACE_TURN_DEG {
        return false;
    }
    point_segment_distance(c0.p0, c1.p0, c1.p3) <= RETRACE_CHORD_DIST
}

fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 < 1e-12 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// A fused cubic must stay tangent-continuous with both surrounding
/// curves.
fn continuity_holds(
    merged: &CubicBez,
    before: Option<&CubicBez>,
    after: Option<&CubicBez>,
) -> bool {
    if let Some(b) = before {
        if junction_angle_deg(b, merged) >= MERGE_CONTINUITY_DEG {
            return false;
        }
    }
    if let Some(a) = after {
        if junction_angle_deg(merged, a) >= MERGE_CONTINUITY_DEG {
            return false;
        }
    }
    true
}

/// Mirror away control points that make the pen back-travel with
/// excessive curvature at either end of the stroke.
fn strip_end_curvature(curves: &mut [CubicBez]) {
    if let Some(first) = curves.first_mut() {
        let (start, _) = first.spurious_curvature();
        if start {
            first.p1 = mirror(first.p1, first.p0);
        }
    }
    if let Some(last) = curves.last_mut() {
        let (_, end) = last.spurious_curvature();
        if end {
            last.p2 = mirror(last.p2, last.p3);
        }
    }
}

fn mirror(p: Point, about: Point) -> Point {
    Point::new(2.0 * about.x - p.x, 2.0 * about.y - p.y)
}
