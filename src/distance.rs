//! Similarity measures between strokes and footprints.
//!
//! Two strokes are compared by aligning their arc-length parametrizations
//! (splitting curves on both sides until the subdivisions agree), then
//! averaging a per-curve metric blending point distance, derivative
//! direction, curvature and control-point displacement. Topological
//! mismatches (straight opening, circular arc) multiply the score.

use kurbo::{CubicBez, Point, TranslateScale, Vec2};

use crate::bezier::{junction_angle_deg, CubicExt};
use crate::config::MATCH_RESCALE_SIDE;
use crate::footprint::{Footprint, Stroke};
use crate::geom;

// ── Named constants ──────────────────────────────────────

/// Arc-length agreement under which two subdivision boundaries are the
/// same boundary.
const ALIGN_TOLERANCE: f64 = 0.05;

/// Internal-turn difference above which a curve pair is penalized.
const TURN_PENALTY_DEG: f64 = 120.0;

/// Line-likeness scores: below the first a curve clearly is a line,
/// above the second it clearly is not.
const LINE_LIKE_MAX: f64 = 0.1;
const NOT_LINE_MIN: f64 = 0.2;

/// Junction turn above which an opening line counts as a structural
/// "straight start" feature.
const STRAIGHT_START_TURN_DEG: f64 = 45.0;

/// Junction turn above which adjacent curves cannot belong to one
/// circular arc.
const CIRCLE_JUNCTION_DEG: f64 = 90.0;

/// Polar sweep a span must exceed to count as a circular arc.
const CIRCLE_MIN_SWEEP_DEG: f64 = 250.0;

/// Sweep difference above which the circle feature mismatches.
const CIRCLE_SWEEP_DIFF_DEG: f64 = 30.0;

/// Internal turn at the junction of a two-curve stroke above which it
/// cannot match a single-curve stroke at all.
const QUICK_REJECT_TURN_DEG: f64 = 135.0;

// ── Per-curve distance ───────────────────────────────────

/// How similar two aligned cubics are. Zero for identical curves.
pub fn curve_distance(u: &CubicBez, v: &CubicBez) -> f64 {
    match (u.is_point(), v.is_point()) {
        (Some(pu), Some(pv)) => return pu.distance(pv),
        (Some(_), None) | (None, Some(_)) => return f64::INFINITY,
        (None, None) => {}
    }

    let mut point_diff = 0.0;
    let mut curvature_diff = 0.0;
    let mut derivative_diff = 0.0;
    for t in 1..20 {
        let t = t as f64 / 20.0;

        point_diff += (u.point_at(t) - v.point_at(t)).hypot2();
        curvature_diff += (u.curvature_at(t) - v.curvature_at(t)).abs();

        let du = unit(u.derivative_at(t));
        let dv = unit(v.derivative_at(t));
        derivative_diff += (du - dv).hypot2();
    }

    let turn_u = u.internal_turn_deg();
    let turn_v = v.internal_turn_deg();

    let mut penalty_ratio = 1.0;
    if geom::angle_diff_deg(turn_u, turn_v) > TURN_PENALTY_DEG {
        penalty_ratio += 0.5;
    }
    let (lu, lv) = (u.diff_with_line(), v.diff_with_line());
    if (lu < LINE_LIKE_MAX && lv > NOT_LINE_MIN) || (lv < LINE_LIKE_MAX && lu > NOT_LINE_MIN) {
        penalty_ratio += 0.5;
    }

    // rescale the terms so each weighs comparably
    point_diff /= 200.0;
    curvature_diff *= 10.0;

    let control_diff = ((u.p0 - v.p0).hypot2()
        + (u.p3 - v.p3).hypot2()
        + 0.05 * ((u.p1 - v.p1).hypot2() + (u.p2 - v.p2).hypot2()))
        / 16.0;

    (derivative_diff * 10.0 + curvature_diff + point_diff + control_diff) * penalty_ratio
}

fn unit(v: Vec2) -> Vec2 {
    let len = v.hypot();
    if len < 1e-12 {
        return Vec2::ZERO;
    }
    v / len
}

// ── Arc-length alignment ─────────────────────────────────

/// Refine both subdivisions until they agree curve-wise: whenever the
/// two cumulative arc lengths disagree by more than the tolerance, the
/// larger interval is split at the smaller boundary.
fn align(u: &Stroke, v: &Stroke) -> Vec<(CubicBez, CubicBez)> {
    let mut out = Vec::new();

    let (mut iu, mut iv) = (0usize, 0usize);
    let mut cur_u = u.curves[0];
    let mut cur_v = v.curves[0];
    // global arc parameter where the current sub-curves start
    let (mut from_u, mut from_v) = (0.0, 0.0);

    loop {
        let au = u.arc_lengths[iu];
        let av = v.arc_lengths[iv];

        if (au - av).abs() < ALIGN_TOLERANCE {
            out.push((cur_u, cur_v));
            iu += 1;
            iv += 1;
            if iu >= u.curves.len() || iv >= v.curves.len() {
                break;
            }
            cur_u = u.curves[iu];
            cur_v = v.curves[iv];
            from_u = au;
            from_v = av;
        } else if au < av {
            // U ends a curve first: split V's current one there
            let t = (au - from_v) / (av - from_v);
            let (left, right) = cur_v.split_at(t);
            out.push((cur_u, left));
            cur_v = right;
            from_v = au;
            iu += 1;
            if iu >= u.curves.len() {
                break;
            }
            cur_u = u.curves[iu];
            from_u = au;
        } else {
            let t = (av - from_u) / (au - from_u);
            let (left, right) = cur_u.split_at(t);
            out.push((left, cur_v));
            cur_u = right;
            from_u = av;
            iv += 1;
            if iv >= v.curves.len() {
                break;
            }
            cur_v = v.curves[iv];
            from_v = av;
        }
    }

    out
}

// ── Stroke distance ──────────────────────────────────────

/// Distance between two strokes assumed to live in the same frame
/// (the caller aligns the reference onto the input beforehand).
pub fn stroke_distance(u: &Stroke, v: &Stroke) -> f64 {
    let (nu, nv) = (u.curves.len(), v.curves.len());
    if nu == 0 || nv == 0 {
        return f64::INFINITY;
    }

    // structural quick rejects
    if (nu == 1 && nv >= 3) || (nv == 1 && nu >= 3) {
        return f64::INFINITY;
    }
    if nu == 1 && nv == 2 && junction_angle_deg(&v.curves[0], &v.curves[1]) >= QUICK_REJECT_TURN_DEG
    {
        return f64::INFINITY;
    }
    if nv == 1 && nu == 2 && junction_angle_deg(&u.curves[0], &u.curves[1]) >= QUICK_REJECT_TURN_DEG
    {
        return f64::INFINITY;
    }

    // rescale so scores are comparable across glyph sizes
    let joint = geom::union(u.control_box(), v.control_box());
    let side = geom::width(joint).max(geom::height(joint)).max(1.0);
    let tr = TranslateScale::scale(MATCH_RESCALE_SIDE / side);
    let u = u.transform(tr);
    let v = v.transform(tr);

    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (cu, cv) in align(&u, &v) {
        let weight = (cu.arc_length() + cv.arc_length()) / 2.0;
        total += curve_distance(&cu, &cv) * weight;
        weight_sum += weight;
    }
    let mut score = if weight_sum > 1e-12 {
        total / weight_sum
    } else {
        // degenerate point strokes: compare their single curves directly
        curve_distance(&u.curves[0], &v.curves[0])
    };

    let mut penalty = 1.0;
    if straight_start(&u) != straight_start(&v) {
        penalty += 1.0;
    }
    let (sweep_u, sweep_v) = (circle_sweep(&u), circle_sweep(&v));
    if (sweep_u - sweep_v).abs() > CIRCLE_SWEEP_DIFF_DEG {
        penalty += 1.0;
    }
    score *= penalty;

    score
}

/// Whether the stroke opens with a straight segment followed by a
/// sharp turn (the shape of `7`, `√`, ...).
fn straight_start(s: &Stroke) -> bool {
    s.curves.len() >= 2
        && s.curves[0].is_roughly_linear()
        && junction_angle_deg(&s.curves[0], &s.curves[1]) >= STRAIGHT_START_TURN_DEG
}

/// Largest polar sweep (degrees, capped at 360) of any span of up to
/// three adjacent curves forming a circular arc; zero when none does.
pub fn circle_sweep(s: &Stroke) -> f64 {
    let n = s.curves.len();
    let mut best = 0.0_f64;
    for span_len in 1..=3.min(n) {
        for start in 0..=n - span_len {
            let span = &s.curves[start..start + span_len];
            if span
                .windows(2)
                .any(|w| junction_angle_deg(&w[0], &w[1]) >= CIRCLE_JUNCTION_DEG)
            {
                continue;
            }
            if span.iter().filter(|c| c.is_roughly_linear()).count() > 1 {
                continue;
            }
            let sweep = polar_sweep(span);
            if sweep > CIRCLE_MIN_SWEEP_DEG {
                best = best.max(sweep.min(360.0));
            }
        }
    }
    best
}

/// Total angle swept by the span's points around their centroid.
fn polar_sweep(span: &[CubicBez]) -> f64 {
    let mut points: Vec<Point> = Vec::new();
    for c in span {
        points.extend(c.to_points());
    }
    if points.len() < 3 {
        return 0.0;
    }
    let centroid = {
        let sum = points
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        (sum / points.len() as f64).to_point()
    };

    let mut total = 0.0;
    let mut prev: Option<Vec2> = None;
    for p in &points {
        let v = *p - centroid;
        if v.hypot2() < 1e-12 {
            continue;
        }
        if let Some(pv) = prev {
            total += geom::angle_deg(pv, v);
        }
        prev = Some(v);
    }
    total.abs()
}

// ── Footprint distance ───────────────────────────────────

/// Distance between a reference footprint and an input footprint with
/// the same number of strokes.
///
/// The reference is first mapped onto the input's control box (one
/// transform for all strokes, preserving their relative placement);
/// each stroke pair is compared both as drawn and reversed, and
/// two-stroke symbols made of single curves also try the swapped
/// pairing.
pub fn footprint_distance(entry: &Footprint, input: &Footprint) -> f64 {
    let n = entry.strokes.len();
    if n == 0 || n != input.strokes.len() {
        return f64::INFINITY;
    }

    let tr = geom::map_from_to(entry.control_box(), input.control_box());
    let entry = entry.transform(tr);

    let pair = |e: &Stroke, i: &Stroke| stroke_distance(e, i).min(stroke_distance(&e.reversed(), i));

    let direct: f64 = entry
        .strokes
        .iter()
        .zip(&input.strokes)
        .map(|(e, i)| pair(e, i))
        .sum::<f64>()
        / n as f64;

    // two single-curve strokes may have been drawn in either order
    let single_curves = entry.strokes.iter().chain(&input.strokes).all(|s| s.curves.len() == 1);
    if n == 2 && single_curves {
        let swapped = (pair(&entry.strokes[0], &input.strokes[1])
            + pair(&entry.strokes[1], &input.strokes[0]))
            / 2.0;
        return direct.min(swapped);
    }

    direct
}
