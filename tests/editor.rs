//! End-to-end recognition scenarios: synthetic pen input, a seeded
//! store, and the LaTeX the line should spell afterwards.

use ink2tex::{
    identify, Footprint, HeightGrid, Record, RecordAction, Session, Shape, Store, Stroke,
};
use kurbo::Point;

fn grid() -> HeightGrid {
    HeightGrid {
        y_min: 0.0,
        y_max: 60.0,
        baseline: 42.0,
    }
}

fn session(store: Store) -> Session {
    Session::new(store, grid())
}

fn draw(session: &mut Session, points: &[Point]) -> Option<char> {
    session.start_shape();
    for p in points {
        session.add_point(p.x, p.y);
    }
    session.end_shape()
}

fn footprint_of(shapes: &[Vec<Point>]) -> Footprint {
    let shapes: Vec<Shape> = shapes.iter().map(|s| Shape(s.clone())).collect();
    Footprint::fit(&shapes)
}

// ── Synthetic glyphs ─────────────────────────────────────

/// An `a`: a closed loop followed by a descent on its right side.
fn a_points(dx: f64) -> Vec<Point> {
    let (cx, cy, r) = (dx + 8.0, 32.0, 7.0);
    let mut out: Vec<Point> = (0..=40)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / 40.0;
            Point::new(cx + r * angle.cos(), cy - r * angle.sin())
        })
        .collect();
    // stem down to the baseline
    for i in 1..=10 {
        let t = i as f64 / 10.0;
        out.push(Point::new(cx + r, cy + 10.0 * t));
    }
    out
}

/// A `b`: a tall stem, then a bump curling from its bottom back up.
fn b_points(dx: f64) -> Vec<Point> {
    let mut out: Vec<Point> = (0..=25)
        .map(|i| {
            let t = i as f64 / 25.0;
            Point::new(dx + 2.0, 12.0 + 30.0 * t)
        })
        .collect();
    for i in 1..=24 {
        let angle = -std::f64::consts::FRAC_PI_2 + std::f64::consts::PI * i as f64 / 24.0;
        out.push(Point::new(
            dx + 2.0 + 6.0 * angle.cos(),
            36.0 - 6.0 * angle.sin(),
        ));
    }
    out
}

/// A `2`: an arc over the top, a diagonal down to the left, a base.
fn two_points(x0: f64, y0: f64) -> Vec<Point> {
    let mut out: Vec<Point> = (0..=16)
        .map(|i| {
            let angle = std::f64::consts::PI * (1.0 - i as f64 / 16.0);
            Point::new(
                x0 + 2.5 + 2.5 * angle.cos(),
                y0 + 2.5 - 2.5 * angle.sin(),
            )
        })
        .collect();
    for i in 1..=14 {
        let t = i as f64 / 14.0;
        out.push(Point::new(x0 + 5.0 - 5.0 * t, y0 + 2.5 + 7.5 * t));
    }
    for i in 1..=12 {
        let t = i as f64 / 12.0;
        out.push(Point::new(x0 + 8.0 * t, y0 + 10.0));
    }
    out
}

/// An `s`: a small sine wave drawn top to bottom.
fn s_points(dx: f64) -> Vec<Point> {
    (0..=40)
        .map(|i| {
            let t = i as f64 / 40.0;
            Point::new(
                dx + 4.0 + 3.5 * (std::f64::consts::TAU * t).sin(),
                27.0 + 15.0 * t,
            )
        })
        .collect()
}

fn line_points(from: Point, to: Point, n: usize) -> Vec<Point> {
    (0..=n)
        .map(|i| from.lerp(to, i as f64 / n as f64))
        .collect()
}

// ── Scenarios ────────────────────────────────────────────

#[test]
fn single_a_is_recognized() {
    let mut store = Store::default();
    store.set('a', footprint_of(&[a_points(40.0)]));

    let mut editor = session(store);
    assert_eq!(draw(&mut editor, &a_points(0.0)), Some('a'));
    assert_eq!(editor.latex(), "a");
}

#[test]
fn x_squared_lands_in_the_exponent() {
    let down = line_points(Point::new(0.0, 20.0), Point::new(16.0, 42.0), 25);
    let up = line_points(Point::new(16.0, 20.0), Point::new(0.0, 42.0), 25);

    let mut store = Store::default();
    store.set('x', footprint_of(&[down.clone(), up.clone()]));
    store.set('2', footprint_of(&[two_points(60.0, 20.0)]));

    let mut editor = session(store);
    draw(&mut editor, &down);
    assert_eq!(draw(&mut editor, &up), Some('x'));
    assert_eq!(editor.latex(), "x");

    // a small 2 in the upper-right scope of the x
    assert_eq!(draw(&mut editor, &two_points(18.0, 4.0)), Some('2'));
    assert_eq!(editor.latex(), "x^{2}");
}

#[test]
fn bar_then_dot_compound_into_i() {
    let bar = line_points(Point::new(10.0, 10.0), Point::new(10.0, 40.0), 25);
    let dot = vec![Point::new(11.0, 6.0)];

    let mut store = Store::default();
    // the dotless variant is seeded slightly slanted so the upcoming
    // vertical bar is a near miss for it and an exact prefix of the i
    store.set(
        'ı',
        footprint_of(&[line_points(Point::new(10.0, 10.0), Point::new(13.0, 40.0), 25)]),
    );
    store.set('i', footprint_of(&[bar.clone(), dot.clone()]));

    // the policy itself: the dot extends the compound
    let record = Record::from(vec![Shape(bar.clone()), Shape(dot.clone())]);
    let ident = identify(&record, &store, grid());
    assert_eq!(ident.r, 'i');
    assert_eq!(ident.action, RecordAction::KeepAll);

    // full pipeline: one block, spelled i
    let mut editor = session(store);
    assert_eq!(draw(&mut editor, &bar), Some('ı'));
    assert_eq!(draw(&mut editor, &dot), Some('i'));
    assert_eq!(editor.latex(), "i");
    assert_eq!(editor.line().root().blocks().len(), 1);
}

#[test]
fn separated_glyphs_spell_ab() {
    let mut store = Store::default();
    store.set('a', footprint_of(&[a_points(60.0)]));
    store.set('b', footprint_of(&[b_points(90.0)]));

    let mut editor = session(store);
    assert_eq!(draw(&mut editor, &a_points(0.0)), Some('a'));
    assert_eq!(draw(&mut editor, &b_points(35.0)), Some('b'));
    assert_eq!(editor.latex(), "ab");

    // blocks stay ordered by x-midpoint
    let blocks = editor.line().root().blocks();
    assert_eq!(blocks.len(), 2);
    let mid = |r: kurbo::Rect| (r.x0 + r.x1) / 2.0;
    assert!(mid(blocks[0].inner_box()) < mid(blocks[1].inner_box()));
}

#[test]
fn fraction_of_one_over_two() {
    let bar = line_points(Point::new(10.0, 30.0), Point::new(40.0, 30.0), 25);
    let one = |dx: f64, dy: f64| line_points(Point::new(dx, dy), Point::new(dx, dy + 18.0), 20);

    let mut store = Store::default();
    store.set('_', footprint_of(&[bar.clone()]));
    store.set('1', footprint_of(&[one(60.0, 10.0)]));
    store.set('2', footprint_of(&[two_points(80.0, 10.0)]));

    let mut editor = session(store);
    assert_eq!(draw(&mut editor, &bar), Some('_'));

    // numerator above the bar, denominator below
    assert_eq!(draw(&mut editor, &one(22.0, 8.0)), Some('1'));
    assert_eq!(draw(&mut editor, &two_points(20.0, 34.0)), Some('2'));

    assert_eq!(editor.latex(), "\\frac{1}{2}");
}

#[test]
fn reversed_stroke_still_matches() {
    let mut store = Store::default();
    store.set('s', footprint_of(&[s_points(40.0)]));

    let mut editor = session(store);
    let mut backwards = s_points(0.0);
    backwards.reverse();
    assert_eq!(draw(&mut editor, &backwards), Some('s'));
    assert_eq!(editor.latex(), "s");
}

#[test]
fn reversal_is_what_makes_the_match() {
    let forward = Stroke::fit(&Shape(s_points(0.0)));
    let mut backwards_points = s_points(0.0);
    backwards_points.reverse();
    let backwards = Stroke::fit(&Shape(backwards_points));

    let direct = ink2tex::stroke_distance(&forward, &backwards);
    let reversed = ink2tex::stroke_distance(&forward.reversed(), &backwards);
    assert!(
        reversed < direct,
        "the reversed comparison should win: {reversed} vs {direct}"
    );
}

#[test]
fn lone_dot_is_a_period() {
    let mut editor = session(Store::default());
    assert_eq!(draw(&mut editor, &[Point::new(20.0, 40.0)]), Some('.'));
    assert_eq!(editor.latex(), ".");
}
