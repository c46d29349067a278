//! The reference database mapping footprints to runes.
//!
//! The store is an ordered list of `(rune, footprint)` entries built by
//! the user in the editor view, loaded from disk on startup and saved on
//! shutdown. Lookup finds the nearest entry with the same stroke count
//! and also reports whether a longer entry could still absorb the input
//! as a compound in progress.

use std::fs;
use std::path::Path;

use kurbo::{CubicBez, Point};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{COMPAT_RATIO, REQUIRED_RUNES};
use crate::distance::footprint_distance;
use crate::error::Error;
use crate::footprint::{Footprint, Stroke};
use crate::geom::{self, HeightGrid};

/// One database entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RuneFootprint {
    pub footprint: Footprint,
    pub r: char,
}

/// Ordered list of reference footprints, sorted by rune for stable
/// iteration and serialization.
#[derive(Debug, Clone, Default)]
pub struct Store {
    entries: Vec<RuneFootprint>,
}

/// Result of a nearest-match query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    /// Best-matching rune, `'\0'` when nothing matches.
    pub r: char,
    /// Distance to the best entry with the same stroke count.
    pub error: f64,
    /// Whether a longer entry matches the input as a prefix well enough
    /// that the user may still be drawing a compound symbol.
    pub has_compatible: bool,
}

impl Lookup {
    fn none() -> Lookup {
        Lookup {
            r: '\0',
            error: f64::INFINITY,
            has_compatible: false,
        }
    }
}

impl Store {
    pub fn new(mut entries: Vec<RuneFootprint>) -> Store {
        entries.sort_by_key(|e| e.r);
        Store { entries }
    }

    pub fn entries(&self) -> &[RuneFootprint] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert or replace the footprint for `r`, keeping the order.
    pub fn set(&mut self, r: char, footprint: Footprint) {
        match self.entries.binary_search_by_key(&r, |e| e.r) {
            Ok(i) => self.entries[i].footprint = footprint,
            Err(i) => self.entries.insert(i, RuneFootprint { footprint, r }),
        }
    }

    pub fn remove(&mut self, r: char) {
        if let Ok(i) = self.entries.binary_search_by_key(&r, |e| e.r) {
            self.entries.remove(i);
        }
    }

    /// Runes a complete database should cover but this one does not.
    pub fn missing_runes(&self) -> Vec<char> {
        REQUIRED_RUNES
            .chars()
            .filter(|&r| self.entries.binary_search_by_key(&r, |e| e.r).is_err())
            .collect()
    }

    /// Nearest-match query.
    ///
    /// Exact candidates have the same stroke count as the input; the
    /// compatibility scan compares longer entries truncated to the
    /// input's stroke count, flagging a possible compound in progress.
    /// The winning rune is then adjusted for upper/lower case by the
    /// size of the input within `context`.
    pub fn lookup(&self, input: &Footprint, context: HeightGrid) -> Lookup {
        let n = input.strokes.len();
        if self.entries.is_empty() || n == 0 {
            return Lookup::none();
        }

        let mut best_r = '\0';
        let mut best = f64::INFINITY;
        for entry in &self.entries {
            if entry.footprint.strokes.len() != n {
                continue;
            }
            let d = footprint_distance(&entry.footprint, input);
            if d < best {
                best = d;
                best_r = entry.r;
            }
        }

        let mut compat = f64::INFINITY;
        for entry in &self.entries {
            if entry.footprint.strokes.len() <= n {
                continue;
            }
            let truncated = Footprint {
                strokes: entry.footprint.strokes[..n].to_vec(),
            };
            compat = compat.min(footprint_distance(&truncated, input));
        }

        let has_compatible = compat.is_finite() && compat < COMPAT_RATIO * best;
        let r = distinguish_by_context(input, context, best_r);
        debug!("lookup: {n} strokes -> {r:?} (err {best:.3}, compat {compat:.3})");

        Lookup {
            r,
            error: best,
            has_compatible,
        }
    }

    // ── Persistence ──────────────────────────────────────

    /// Load a store previously written by [`Store::save`].
    pub fn load(path: &Path) -> Result<Store, Error> {
        let data = fs::read_to_string(path).map_err(|source| Error::StoreOpen {
            path: path.to_owned(),
            source,
        })?;
        let repr: Vec<EntryRepr> =
            serde_json::from_str(&data).map_err(|source| Error::StoreFormat {
                path: path.to_owned(),
                source,
            })?;
        Ok(Store::new(repr.into_iter().map(EntryRepr::into_entry).collect()))
    }

    /// Serialize to `path`, pretty-printed with single-space indent.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let wrap = |source: serde_json::Error| Error::StoreWrite {
            path: path.to_owned(),
            source,
        };

        let repr: Vec<EntryRepr> = self.entries.iter().map(EntryRepr::from_entry).collect();
        let file = fs::File::create(path)
            .map_err(|e| wrap(serde_json::Error::io(e)))?;
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(file, formatter);
        repr.serialize(&mut ser).map_err(wrap)?;
        Ok(())
    }
}

// ── On-disk representation ───────────────────────────────

#[derive(Serialize, Deserialize)]
struct EntryRepr {
    s: Vec<StrokeRepr>,
    /// Unicode code point.
    r: u32,
}

#[derive(Serialize, Deserialize)]
struct StrokeRepr {
    /// Curves as `[P0, P1, P2, P3]` of `[x, y]`.
    c: Vec<[[f64; 2]; 4]>,
    /// Normalized cumulative arc lengths, one per curve. Re-derived on
    /// load when absent.
    #[serde(default)]
    a: Vec<f64>,
}

impl EntryRepr {
    fn from_entry(entry: &RuneFootprint) -> EntryRepr {
        EntryRepr {
            s: entry
                .footprint
                .strokes
                .iter()
                .map(|stroke| StrokeRepr {
                    c: stroke
                        .curves
                        .iter()
                        .map(|b| {
                            [
                                [b.p0.x, b.p0.y],
                                [b.p1.x, b.p1.y],
                                [b.p2.x, b.p2.y],
                                [b.p3.x, b.p3.y],
                            ]
                        })
                        .collect(),
                    a: stroke.arc_lengths.clone(),
                })
                .collect(),
            r: entry.r as u32,
        }
    }

    fn into_entry(self) -> RuneFootprint {
        let strokes = self
            .s
            .into_iter()
            .map(|stroke| {
                let curves: Vec<CubicBez> = stroke
                    .c
                    .iter()
                    .map(|q| {
                        CubicBez::new(
                            Point::new(q[0][0], q[0][1]),
                            Point::new(q[1][0], q[1][1]),
                            Point::new(q[2][0], q[2][1]),
                            Point::new(q[3][0], q[3][1]),
                        )
                    })
                    .collect();
                if stroke.a.len() == curves.len() && !curves.is_empty() {
                    Stroke {
                        curves,
                        arc_lengths: stroke.a,
                    }
                } else {
                    Stroke::from_curves(curves)
                }
            })
            .collect();
        RuneFootprint {
            footprint: Footprint { strokes },
            r: char::from_u32(self.r).unwrap_or('\0'),
        }
    }
}

// ── Case disambiguation ──────────────────────────────────

/// Glyphs whose upper and lower case only differ by size or placement;
/// the grid decides which one was meant.
fn distinguish_by_context(fp: &Footprint, context: HeightGrid, r: char) -> char {
    match r {
        'j' | 'J' => {
            if is_over_baseline(fp, context) {
                'J'
            } else {
                'j'
            }
        }
        'o' | 'O' => by_size(fp, context, 'o', 'O'),
        'p' | 'P' => by_size(fp, context, 'p', 'P'),
        's' | 'S' => by_size(fp, context, 's', 'S'),
        'u' | 'U' => by_size(fp, context, 'u', 'U'),
        'v' | 'V' => by_size(fp, context, 'v', 'V'),
        'w' | 'W' => by_size(fp, context, 'w', 'W'),
        'z' | 'Z' => by_size(fp, context, 'z', 'Z'),
        'π' | 'Π' => by_size(fp, context, 'π', 'Π'),
        _ => r,
    }
}

fn by_size(fp: &Footprint, context: HeightGrid, lower: char, upper: char) -> char {
    if is_upper_size(fp, context) {
        upper
    } else {
        lower
    }
}

/// Whether the symbol sits entirely at or above the baseline.
fn is_over_baseline(fp: &Footprint, context: HeightGrid) -> bool {
    let bottom = fp.bounding_box().y1;
    bottom <= context.baseline + context.height() * 0.1
}

/// Whether the symbol spans at least half the ascent band.
fn is_upper_size(fp: &Footprint, context: HeightGrid) -> bool {
    let h = (context.y_min - context.baseline).abs();
    let bbox = fp.bounding_box();
    geom::height(bbox) / h >= 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bezier::segment_bez;
    use crate::fit;

    fn grid() -> HeightGrid {
        HeightGrid {
            y_min: 0.0,
            y_max: 60.0,
            baseline: 42.0,
        }
    }

    fn loop_glyph(cx: f64, cy: f64, r: f64) -> Footprint {
        let points: Vec<Point> = (0..=50)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / 50.0;
                Point::new(cx + r * a.cos(), cy + r * a.sin())
            })
            .collect();
        Footprint {
            strokes: vec![Stroke::from_curves(fit::fit_curves(&points))],
        }
    }

    fn bar_glyph(x: f64, y0: f64, y1: f64) -> Footprint {
        Footprint {
            strokes: vec![Stroke::from_curves(vec![segment_bez(
                Point::new(x, y0),
                Point::new(x, y1),
            )])],
        }
    }

    #[test]
    fn empty_store_matches_nothing() {
        let store = Store::default();
        let got = store.lookup(&loop_glyph(10.0, 30.0, 8.0), grid());
        assert_eq!(got.r, '\0');
        assert!(got.error.is_infinite());
        assert!(!got.has_compatible);
    }

    #[test]
    fn self_match_is_exact() {
        let fp = loop_glyph(10.0, 34.0, 7.0);
        let mut store = Store::default();
        store.set('a', fp.clone());
        let got = store.lookup(&fp, grid());
        assert_eq!(got.r, 'a');
        assert!(got.error < 1e-9, "got {}", got.error);
    }

    #[test]
    fn nearest_of_two_entries_wins() {
        let mut store = Store::default();
        store.set('o', loop_glyph(10.0, 36.0, 5.0));
        store.set('l', bar_glyph(10.0, 12.0, 42.0));
        let got = store.lookup(&bar_glyph(20.0, 14.0, 42.0), grid());
        assert_eq!(got.r, 'l');
    }

    #[test]
    fn case_is_decided_by_size() {
        let mut store = Store::default();
        store.set('o', loop_glyph(10.0, 36.0, 5.0));

        // small loop sitting on the baseline: lower case
        let small = store.lookup(&loop_glyph(30.0, 36.0, 5.0), grid());
        assert_eq!(small.r, 'o');

        // loop filling the ascent band: upper case
        let big = store.lookup(&loop_glyph(30.0, 26.0, 15.0), grid());
        assert_eq!(big.r, 'O');
    }

    #[test]
    fn compatibility_flags_a_possible_compound() {
        let bar = bar_glyph(10.0, 10.0, 40.0);
        let mut dotted = bar.clone();
        dotted
            .strokes
            .push(Stroke::from_curves(vec![crate::bezier::point_bez(
                Point::new(10.0, 4.0),
            )]));

        let mut store = Store::default();
        // a slightly slanted single bar, plus the two-stroke symbol
        store.set(
            'l',
            Footprint {
                strokes: vec![Stroke::from_curves(vec![segment_bez(
                    Point::new(10.0, 8.0),
                    Point::new(14.0, 44.0),
                )])],
            },
        );
        store.set('i', dotted);

        let got = store.lookup(&bar, grid());
        assert_eq!(got.r, 'l');
        assert!(
            got.has_compatible,
            "the two-stroke entry should flag a compound (err {})",
            got.error
        );
    }

    #[test]
    fn json_round_trip() {
        let mut store = Store::default();
        store.set('a', loop_glyph(10.0, 34.0, 7.0));
        store.set('l', bar_glyph(22.0, 12.0, 42.0));

        let path = std::env::temp_dir().join("ink2tex_store_roundtrip.json");
        store.save(&path).unwrap();
        let back = Store::load(&path).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back.entries()[0].r, 'a');
        assert_eq!(back.entries()[1].r, 'l');
        assert_eq!(back.entries()[0].footprint, store.entries()[0].footprint);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn store_files_use_single_space_indentation() {
        let mut store = Store::default();
        store.set('l', bar_glyph(10.0, 12.0, 42.0));

        let path = std::env::temp_dir().join("ink2tex_store_format.json");
        store.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(
            text.starts_with("[\n {\n  \"s\""),
            "expected one-space indentation, got: {}",
            &text[..text.len().min(20)]
        );
    }

    #[test]
    fn arc_lengths_are_rederived_when_missing() {
        let json = r#"[
 {
  "s": [
   {
    "c": [
     [[0.0, 0.0], [5.0, 10.0], [10.0, 10.0], [15.0, 0.0]],
     [[15.0, 0.0], [20.0, -10.0], [25.0, -10.0], [30.0, 0.0]]
    ]
   }
  ],
  "r": 119
 }
]"#;
        let path = std::env::temp_dir().join("ink2tex_store_noarcs.json");
        std::fs::write(&path, json).unwrap();
        let store = Store::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let stroke = &store.entries()[0].footprint.strokes[0];
        assert_eq!(store.entries()[0].r, 'w');
        assert_eq!(stroke.arc_lengths.len(), 2);
        assert_eq!(*stroke.arc_lengths.last().unwrap(), 1.0);
        assert!(stroke.arc_lengths[0] > 0.0 && stroke.arc_lengths[0] < 1.0);
    }

    #[test]
    fn missing_runes_reports_uncovered_entries() {
        let mut store = Store::default();
        store.set('a', loop_glyph(10.0, 34.0, 7.0));
        let missing = store.missing_runes();
        assert!(!missing.contains(&'a'));
        assert!(missing.contains(&'b'));
    }
}
