//! Stroke and footprint representations.
//!
//! A [`Shape`] is the raw polyline captured between pen-down and pen-up.
//! Fitting it produces a [`Stroke`], a union of cubic Béziers indexed by
//! normalized cumulative arc length. A [`Footprint`] groups the strokes
//! of one grapheme, parallel to the shapes of its symbol.

use kurbo::{CubicBez, Point, Rect, TranslateScale};

use crate::bezier::CubicExt;
use crate::fit;
use crate::geom;

/// The points of one shape, drawn without lifting the pen.
///
/// Samples are temporally ordered; adjacent duplicates may occur and are
/// tolerated by every consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape(pub Vec<Point>);

impl Shape {
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, p: Point) {
        self.0.push(p);
    }

    /// Rectangle enclosing the shape; [`geom::EMPTY_RECT`] when empty.
    pub fn bounding_box(&self) -> Rect {
        geom::bounding_box(&self.0)
    }
}

impl FromIterator<Point> for Shape {
    fn from_iter<T: IntoIterator<Item = Point>>(iter: T) -> Self {
        Shape(iter.into_iter().collect())
    }
}

/// A group of shapes forming one grapheme (the two strokes of `x`, the
/// three of `Σ`, ...).
pub type Symbol = Vec<Shape>;

/// The fitted representation of one shape: a union of cubic Béziers
/// with their normalized cumulative arc lengths.
///
/// `arc_lengths[i]` is the fraction of the total length covered once
/// `curves[i]` ends; the sequence is strictly increasing and ends at 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    pub curves: Vec<CubicBez>,
    pub arc_lengths: Vec<f64>,
}

impl Stroke {
    /// Build a stroke from curves, deriving the arc-length index.
    pub fn from_curves(curves: Vec<CubicBez>) -> Stroke {
        let arc_lengths = arc_length_index(&curves);
        Stroke {
            curves,
            arc_lengths,
        }
    }

    /// Fit a raw shape (artifact removal, recursive cubic fit, merge pass).
    pub fn fit(shape: &Shape) -> Stroke {
        Stroke::from_curves(fit::fit_curves(shape.points()))
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// The same trajectory drawn in the opposite direction.
    pub fn reversed(&self) -> Stroke {
        let curves = self
            .curves
            .iter()
            .rev()
            .map(|c| CubicBez::new(c.p3, c.p2, c.p1, c.p0))
            .collect();
        Stroke::from_curves(curves)
    }

    pub fn bounding_box(&self) -> Rect {
        self.curves
            .iter()
            .fold(geom::EMPTY_RECT, |acc, c| geom::union(acc, c.bounding_box()))
    }

    pub fn control_box(&self) -> Rect {
        self.curves
            .iter()
            .fold(geom::EMPTY_RECT, |acc, c| geom::union(acc, c.control_box()))
    }

    pub fn transform(&self, tr: TranslateScale) -> Stroke {
        Stroke {
            curves: self.curves.iter().map(|c| c.transform(tr)).collect(),
            arc_lengths: self.arc_lengths.clone(),
        }
    }

    /// A single roughly-linear curve: the footprint of a bar glyph.
    pub fn is_line(&self) -> bool {
        self.curves.len() == 1 && self.curves[0].is_roughly_linear()
    }

    /// Template for the radical glyph: a V (two lines meeting at a sharp
    /// bottom angle) or a U, followed by a roughly linear tail.
    pub fn is_sqrt(&self) -> bool {
        let n = self.curves.len();
        if !(n == 2 || n == 3) {
            return false;
        }

        let last = &self.curves[n - 1];
        if !last.is_roughly_linear() {
            return false;
        }

        let s1 = &self.curves[0];
        if n == 3 {
            // a V: two lines whose opening angle stays under 45°
            let s2 = &self.curves[1];
            if !(s1.is_roughly_linear() && s2.is_roughly_linear()) {
                return false;
            }
            let opening = geom::angle_deg(s1.p0 - s1.p3, s2.p3 - s2.p0);
            return (0.0..=45.0).contains(&opening);
        }
        // ... or a U (+Y points downward)
        let (start_x, end_x) = (s1.p0.x, s1.p3.x);
        start_x < end_x
            && start_x <= s1.p1.x
            && s1.p2.x <= end_x
            && s1.p1.y > s1.p0.y
            && s1.p2.y > s1.p3.y
    }
}

/// Normalized cumulative arc lengths, one entry per curve.
fn arc_length_index(curves: &[CubicBez]) -> Vec<f64> {
    let lengths: Vec<f64> = curves.iter().map(|c| c.arc_length()).collect();
    let total: f64 = lengths.iter().sum();
    if total <= 1e-12 {
        // degenerate (point) strokes still get a well-formed index
        return (1..=curves.len())
            .map(|i| i as f64 / curves.len() as f64)
            .collect();
    }
    let mut acc = 0.0;
    let mut out: Vec<f64> = lengths
        .iter()
        .map(|l| {
            acc += l;
            acc / total
        })
        .collect();
    if let Some(last) = out.last_mut() {
        *last = 1.0;
    }
    out
}

/// The fitted strokes of one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    pub strokes: Vec<Stroke>,
}

impl Footprint {
    /// Fit every shape of a symbol, skipping empty ones.
    pub fn fit(symbol: &[Shape]) -> Footprint {
        Footprint {
            strokes: symbol
                .iter()
                .filter(|sh| !sh.is_empty())
                .map(Stroke::fit)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(Stroke::is_empty)
    }

    pub fn bounding_box(&self) -> Rect {
        self.strokes
            .iter()
            .fold(geom::EMPTY_RECT, |acc, s| geom::union(acc, s.bounding_box()))
    }

    pub fn control_box(&self) -> Rect {
        self.strokes
            .iter()
            .fold(geom::EMPTY_RECT, |acc, s| geom::union(acc, s.control_box()))
    }

    pub fn transform(&self, tr: TranslateScale) -> Footprint {
        Footprint {
            strokes: self.strokes.iter().map(|s| s.transform(tr)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bezier::{point_bez, segment_bez};

    fn wave() -> Stroke {
        Stroke::from_curves(vec![
            CubicBez::new(
                Point::new(0.0, 0.0),
                Point::new(5.0, 10.0),
                Point::new(10.0, 10.0),
                Point::new(15.0, 0.0),
            ),
            CubicBez::new(
                Point::new(15.0, 0.0),
                Point::new(20.0, -10.0),
                Point::new(25.0, -10.0),
                Point::new(30.0, 0.0),
            ),
        ])
    }

    #[test]
    fn arc_lengths_are_increasing_and_end_at_one() {
        let s = wave();
        assert_eq!(s.arc_lengths.len(), s.curves.len());
        let mut prev = 0.0;
        for &a in &s.arc_lengths {
            assert!(a > prev);
            prev = a;
        }
        assert_eq!(*s.arc_lengths.last().unwrap(), 1.0);
    }

    #[test]
    fn reversal_is_an_involution() {
        let s = wave();
        let back = s.reversed().reversed();
        assert_eq!(back.curves.len(), s.curves.len());
        for (a, b) in back.curves.iter().zip(&s.curves) {
            assert!(a.p0.distance(b.p0) < 1e-9);
            assert!(a.p1.distance(b.p1) < 1e-9);
            assert!(a.p2.distance(b.p2) < 1e-9);
            assert!(a.p3.distance(b.p3) < 1e-9);
        }
        for (a, b) in back.arc_lengths.iter().zip(&s.arc_lengths) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn reversed_swaps_endpoints() {
        let s = wave();
        let r = s.reversed();
        assert_eq!(r.curves[0].p0, Point::new(30.0, 0.0));
        assert_eq!(r.curves[1].p3, Point::new(0.0, 0.0));
    }

    #[test]
    fn point_stroke_has_a_valid_index() {
        let s = Stroke::from_curves(vec![point_bez(Point::new(2.0, 3.0))]);
        assert_eq!(s.arc_lengths, vec![1.0]);
    }

    #[test]
    fn sqrt_template_matches_a_v_with_tail() {
        // V: down-right then up-right, then a long horizontal tail
        let v = Stroke::from_curves(vec![
            segment_bez(Point::new(0.0, 0.0), Point::new(5.0, 20.0)),
            segment_bez(Point::new(5.0, 20.0), Point::new(12.0, -5.0)),
            segment_bez(Point::new(12.0, -5.0), Point::new(40.0, -5.0)),
        ]);
        assert!(v.is_sqrt());

        let bar = Stroke::from_curves(vec![segment_bez(
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
        )]);
        assert!(!bar.is_sqrt());
        assert!(bar.is_line());
    }
}
