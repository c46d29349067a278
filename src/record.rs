//! Pen input accumulation and the identification policy.
//!
//! The [`Recorder`] buffers the polyline of the shape being drawn and
//! appends completed shapes to its [`Record`]. On every pen-up the
//! record is identified against the store: the policy decides whether
//! the last stroke extends the previous compound symbol, replaces it,
//! or starts a fresh grapheme, and tells the caller what to do with the
//! buffered strokes.

use kurbo::Point;
use log::debug;

use crate::bezier::CubicExt;
use crate::footprint::{Footprint, Shape, Stroke};
use crate::geom::{self, HeightGrid};
use crate::store::Store;

/// X-gap above which the last stroke clearly starts a new symbol.
const SPLIT_WIDTH: f64 = 5.0;

/// Max x-distance between a point stroke and the previous compound for
/// the point to belong to it (the dot of an `i`, `j`, ...).
const POINT_ATTACH_DX: f64 = 2.0;

/// Separate matches must beat the whole-record match by this factor to
/// be preferred; matching separate parts is always easier.
const AMBIGUOUS_RATIO: f64 = 2.0;

/// What the caller should do with the buffered strokes after an
/// identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    /// The user may extend the whole compound: keep every stroke.
    KeepAll,
    /// The last stroke starts a symbol the user may extend: keep it only.
    KeepLast,
    /// The symbol is final: clear the record.
    RemoveAll,
}

/// Outcome of identifying a record.
#[derive(Debug, Clone)]
pub struct Identification {
    /// Recognized rune, `'\0'` when nothing matched.
    pub r: char,
    pub action: RecordAction,
    /// The match consumed the whole record; the resulting block replaces
    /// the previously inserted one instead of being appended.
    pub compound: bool,
    /// Footprint of the matched symbol (whole record or last stroke).
    pub footprint: Footprint,
    /// Distance reported by the winning lookup.
    pub error: f64,
}

impl Identification {
    fn neutral() -> Identification {
        Identification {
            r: '\0',
            action: RecordAction::RemoveAll,
            compound: false,
            footprint: Footprint::default(),
            error: f64::INFINITY,
        }
    }
}

/// The shapes captured since the last reset. The final entry is the
/// current stroke; everything before it is the previous compound.
#[derive(Debug, Clone, Default)]
pub struct Record(Vec<Shape>);

impl Record {
    pub fn shapes(&self) -> &[Shape] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The last shape drawn, if any.
    pub fn last_shape(&self) -> Option<&Shape> {
        self.0.last()
    }
}

impl From<Vec<Shape>> for Record {
    fn from(shapes: Vec<Shape>) -> Record {
        Record(shapes)
    }
}

/// Captures the shapes drawn by the user.
#[derive(Debug, Default)]
pub struct Recorder {
    record: Record,
    current: Shape,
    in_shape: bool,
}

impl Recorder {
    /// Start recording a new shape (pointer down).
    pub fn start_shape(&mut self) {
        self.in_shape = true;
        self.current = Shape::default();
    }

    /// Append a sample to the current shape, if one has started.
    pub fn add_point(&mut self, p: Point) {
        if self.in_shape {
            self.current.push(p);
        }
    }

    /// Finish the current shape (pointer up). Empty shapes are dropped;
    /// returns whether a shape was actually committed.
    pub fn end_shape(&mut self) -> bool {
        self.in_shape = false;
        let shape = std::mem::take(&mut self.current);
        if shape.is_empty() {
            return false;
        }
        self.record.0.push(shape);
        true
    }

    /// Clear everything.
    pub fn reset(&mut self) {
        self.in_shape = false;
        self.record.0.clear();
        self.current = Shape::default();
    }

    /// Keep only the last captured shape.
    pub fn drop_but_last(&mut self) {
        let len = self.record.0.len();
        if len > 1 {
            self.record.0.drain(..len - 1);
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Apply the triage outcome of an identification.
    pub fn apply(&mut self, action: RecordAction) {
        match action {
            RecordAction::KeepAll => {}
            RecordAction::KeepLast => self.drop_but_last(),
            RecordAction::RemoveAll => self.reset(),
        }
    }
}

/// Identify the current record against the store.
///
/// `context` is the height grid of the area the strokes were drawn in,
/// used for upper/lower case decisions.
pub fn identify(record: &Record, store: &Store, context: HeightGrid) -> Identification {
    let whole = Footprint::fit(record.shapes());
    let strokes = &whole.strokes;
    let Some(last) = strokes.last() else {
        return Identification::neutral();
    };

    let previous = &strokes[..strokes.len() - 1];
    let last_fp = Footprint {
        strokes: vec![last.clone()],
    };

    // the radical glyph has a variable width: match it by template
    if last.is_sqrt() {
        debug!("identify: sqrt template");
        return Identification {
            r: '√',
            action: RecordAction::RemoveAll,
            compound: false,
            footprint: last_fp,
            error: 0.0,
        };
    }

    // a point either dots the previous compound or stands alone
    if last.curves.len() == 1 {
        if let Some(point) = last.curves[0].is_point() {
            let previous_box = Footprint {
                strokes: previous.to_vec(),
            }
            .bounding_box();
            if previous_box.x1 + POINT_ATTACH_DX >= point.x {
                debug!("identify: point attaches to the compound");
                let lookup = store.lookup(&whole, context);
                return Identification {
                    r: lookup.r,
                    action: RecordAction::KeepAll,
                    compound: true,
                    footprint: whole,
                    error: lookup.error,
                };
            }
            debug!("identify: lone point");
            return Identification {
                r: '.',
                action: RecordAction::RemoveAll,
                compound: false,
                footprint: last_fp,
                error: 0.0,
            };
        }
    }

    // clearly separated: only the last stroke is a candidate
    if strokes.len() == 1 || is_separated(previous, last) {
        debug!("identify: separated, matching the last stroke");
        let lookup = store.lookup(&last_fp, context);
        let action = if lookup.has_compatible {
            RecordAction::KeepLast
        } else {
            RecordAction::RemoveAll
        };
        return Identification {
            r: lookup.r,
            action,
            compound: false,
            footprint: last_fp,
            error: lookup.error,
        };
    }

    // clearly merged: the last stroke crosses the previous compound
    if is_merged(previous, last) {
        debug!("identify: merged, matching the whole record");
        let lookup = store.lookup(&whole, context);
        let action = if lookup.has_compatible {
            RecordAction::KeepAll
        } else {
            RecordAction::RemoveAll
        };
        return Identification {
            r: lookup.r,
            action,
            compound: true,
            footprint: whole,
            error: lookup.error,
        };
    }

    // ambiguous: compare both readings and keep the better one
    let previous_fp = Footprint {
        strokes: previous.to_vec(),
    };
    let whole_lookup = store.lookup(&whole, context);
    let previous_lookup = store.lookup(&previous_fp, context);
    let last_lookup = store.lookup(&last_fp, context);

    if AMBIGUOUS_RATIO * previous_lookup.error.max(last_lookup.error) < whole_lookup.error {
        debug!("identify: ambiguous, separate reading wins");
        let action = if last_lookup.has_compatible {
            RecordAction::KeepLast
        } else {
            RecordAction::RemoveAll
        };
        return Identification {
            r: last_lookup.r,
            action,
            compound: false,
            footprint: last_fp,
            error: last_lookup.error,
        };
    }

    debug!("identify: ambiguous, whole reading wins");
    let action = if whole_lookup.has_compatible {
        RecordAction::KeepAll
    } else {
        RecordAction::RemoveAll
    };
    Identification {
        r: whole_lookup.r,
        action,
        compound: true,
        footprint: whole,
        error: whole_lookup.error,
    }
}

/// Compound symbols always have strokes with overlapping X ranges.
fn is_separated(previous: &[Stroke], last: &Stroke) -> bool {
    let previous_box = previous
        .iter()
        .fold(geom::EMPTY_RECT, |acc, s| geom::union(acc, s.bounding_box()));
    let last_box = last.bounding_box();
    previous_box.x1 + SPLIT_WIDTH < last_box.x0 || last_box.x1 + SPLIT_WIDTH < previous_box.x0
}

/// Whether the last stroke is a line crossing the previous compound
/// (the second bar of `x`, `t`, `=` ...).
fn is_merged(previous: &[Stroke], last: &Stroke) -> bool {
    if last.curves.len() != 1 {
        return false;
    }
    let seg = &last.curves[0];
    if !seg.is_roughly_linear() {
        return false;
    }
    previous
        .iter()
        .flat_map(|stroke| &stroke.curves)
        .any(|c| c.intersects(seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_of(points: Vec<(f64, f64)>) -> Shape {
        points.into_iter().map(|(x, y)| Point::new(x, y)).collect()
    }

    fn sampled(from: (f64, f64), to: (f64, f64), n: usize) -> Shape {
        (0..=n)
            .map(|i| {
                let t = i as f64 / n as f64;
                Point::new(
                    from.0 + (to.0 - from.0) * t,
                    from.1 + (to.1 - from.1) * t,
                )
            })
            .collect()
    }

    fn grid() -> HeightGrid {
        HeightGrid {
            y_min: 0.0,
            y_max: 60.0,
            baseline: 42.0,
        }
    }

    #[test]
    fn recorder_discards_empty_shapes() {
        let mut rec = Recorder::default();
        rec.start_shape();
        rec.end_shape();
        assert!(rec.record().is_empty());

        rec.start_shape();
        rec.add_point(Point::new(1.0, 2.0));
        rec.end_shape();
        assert_eq!(rec.record().len(), 1);

        // points outside a shape are ignored
        rec.add_point(Point::new(9.0, 9.0));
        assert_eq!(rec.record().shapes()[0].points().len(), 1);
    }

    #[test]
    fn drop_but_last_keeps_one_shape() {
        let mut rec = Recorder::default();
        for x in [0.0, 10.0, 20.0] {
            rec.start_shape();
            rec.add_point(Point::new(x, 0.0));
            rec.add_point(Point::new(x, 10.0));
            rec.end_shape();
        }
        assert_eq!(rec.record().len(), 3);
        rec.apply(RecordAction::KeepLast);
        assert_eq!(rec.record().len(), 1);
        assert_eq!(rec.record().shapes()[0].points()[0].x, 20.0);
        rec.apply(RecordAction::RemoveAll);
        assert!(rec.record().is_empty());
    }

    #[test]
    fn empty_record_identifies_to_nothing() {
        let got = identify(&Record::default(), &Store::default(), grid());
        assert_eq!(got.r, '\0');
        assert_eq!(got.action, RecordAction::RemoveAll);
    }

    #[test]
    fn sqrt_template_is_recognized_without_a_store() {
        // V down then up, followed by a long flat tail
        let mut points = Vec::new();
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            points.push((6.0 * t, 20.0 * t));
        }
        for i in 1..=20 {
            let t = i as f64 / 20.0;
            points.push((6.0 + 6.0 * t, 20.0 - 24.0 * t));
        }
        for i in 1..=30 {
            let t = i as f64 / 30.0;
            points.push((12.0 + 33.0 * t, -4.0));
        }
        let record = Record::from(vec![shape_of(points)]);
        let got = identify(&record, &Store::default(), grid());
        assert_eq!(got.r, '√');
        assert_eq!(got.action, RecordAction::RemoveAll);
        assert!(!got.compound);
    }

    #[test]
    fn detached_point_is_a_period() {
        let bar = sampled((10.0, 10.0), (10.0, 40.0), 20);
        let dot = shape_of(vec![(30.0, 40.0)]);
        let record = Record::from(vec![bar, dot]);
        let got = identify(&record, &Store::default(), grid());
        assert_eq!(got.r, '.');
        assert_eq!(got.action, RecordAction::RemoveAll);
    }

    #[test]
    fn crossing_line_reads_as_merged() {
        // two diagonals of an x
        let down = sampled((0.0, 0.0), (20.0, 30.0), 25);
        let up = sampled((20.0, 0.0), (0.0, 30.0), 25);
        let record = Record::from(vec![down, up]);

        let got = identify(&record, &Store::default(), grid());
        // merged path matches the whole record; with an empty store the
        // rune is unknown but the compound reading must win
        assert!(got.compound);
        assert_eq!(got.action, RecordAction::RemoveAll);
    }

    #[test]
    fn overlapping_curved_strokes_fall_back_to_the_whole_reading() {
        // two parallel arcs sharing their x-range: neither separated nor
        // merged, and with an empty store the whole reading is kept
        let arc = |dy: f64| -> Shape {
            (0..=30)
                .map(|i| {
                    let t = i as f64 / 30.0;
                    Point::new(20.0 * t, dy + 12.0 * (std::f64::consts::PI * t).sin())
                })
                .collect()
        };
        let record = Record::from(vec![arc(10.0), arc(26.0)]);
        let got = identify(&record, &Store::default(), grid());
        assert!(got.compound);
        assert_eq!(got.footprint.strokes.len(), 2);
    }

    #[test]
    fn distant_strokes_read_as_separated() {
        let left = sampled((0.0, 10.0), (8.0, 40.0), 20);
        let right = sampled((30.0, 10.0), (38.0, 40.0), 20);
        let record = Record::from(vec![left, right]);
        let got = identify(&record, &Store::default(), grid());
        assert!(!got.compound);
        assert_eq!(got.footprint.strokes.len(), 1);
    }
}
