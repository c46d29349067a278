//! Top-level editing session: the pen input API wired to a line and a
//! reference store.
//!
//! The UI forwards pointer events as `start_shape` / `add_point` /
//! `end_shape`; pen-up runs the whole pipeline (fit, identify, place)
//! and updates the line. Everything else is read access for rendering.

use std::path::Path;

use kurbo::{Point, Rect};
use log::debug;

use crate::error::Error;
use crate::geom::HeightGrid;
use crate::layout::Line;
use crate::record::Recorder;
use crate::store::Store;

pub struct Session {
    store: Store,
    line: Line,
    recorder: Recorder,
}

impl Session {
    pub fn new(store: Store, grid: HeightGrid) -> Session {
        Session {
            store,
            line: Line::new(grid),
            recorder: Recorder::default(),
        }
    }

    /// Open a session over the store at `path`.
    ///
    /// I/O and format failures surface to the caller; it may decide to
    /// start over with an empty store, the session never does silently.
    pub fn open(path: &Path, grid: HeightGrid) -> Result<Session, Error> {
        Ok(Session::new(Store::load(path)?, grid))
    }

    // ── Pen input ────────────────────────────────────────

    /// Pointer down.
    pub fn start_shape(&mut self) {
        self.recorder.start_shape();
    }

    /// Pointer move while down.
    pub fn add_point(&mut self, x: f64, y: f64) {
        self.recorder.add_point(Point::new(x, y));
    }

    /// Pointer up: fit the shape, identify the record, place the result.
    /// Returns the recognized rune, if any.
    pub fn end_shape(&mut self) -> Option<char> {
        if !self.recorder.end_shape() {
            return None;
        }
        let ident = self.line.insert(self.recorder.record(), &self.store)?;
        debug!("end_shape: {:?} -> {:?}", ident.r, ident.action);
        self.recorder.apply(ident.action);
        Some(ident.r)
    }

    // ── Read access ──────────────────────────────────────

    pub fn latex(&self) -> String {
        self.line.to_latex()
    }

    pub fn line(&self) -> &Line {
        &self.line
    }

    /// Area and grid a stroke at `p` would land in, for the live overlay.
    pub fn find_context(&self, p: Point) -> (Rect, HeightGrid) {
        self.line.find_context(p)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The store editor view mutates entries through this.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn save_store(&self, path: &Path) -> Result<(), Error> {
        self.store.save(path)
    }

    /// Drop the line content and any pending strokes.
    pub fn clear(&mut self) {
        self.recorder.reset();
        self.line.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pen_up_is_a_no_op() {
        let mut session = Session::new(
            Store::default(),
            HeightGrid {
                y_min: 0.0,
                y_max: 60.0,
                baseline: 42.0,
            },
        );
        session.start_shape();
        assert_eq!(session.end_shape(), None);
        assert_eq!(session.latex(), "");
    }
}
