//! ink2tex: pen strokes → structured LaTeX math.
//!
//! Fits handwritten polylines with cubic bezier curves, recognizes them
//! against a user-built reference store, and maintains an expression
//! tree (exponents, indices, fractions) that serializes to LaTeX.
//!
//! # Example
//!
//! ```no_run
//! use ink2tex::{Session, Store, HeightGrid};
//! use std::path::Path;
//!
//! let store = Store::load(Path::new("store.json"))?;
//! let grid = HeightGrid { y_min: 0.0, y_max: 60.0, baseline: 42.0 };
//! let mut session = Session::new(store, grid);
//!
//! session.start_shape();
//! session.add_point(10.0, 40.0);
//! session.add_point(10.0, 12.0);
//! session.end_shape();
//! println!("{}", session.latex());
//! # Ok::<(), ink2tex::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod bezier;
pub mod config;
mod distance;
mod fit;
mod footprint;
mod geom;
mod layout;
mod record;
mod session;
mod store;

pub mod error;

// Re-export kurbo so downstream users share the version the geometry
// types are built on.
pub use kurbo;

pub use distance::{curve_distance, footprint_distance, stroke_distance};
pub use error::Error;
pub use footprint::{Footprint, Shape, Stroke, Symbol};
pub use geom::HeightGrid;
pub use layout::{Block, CharBlock, FracBlock, Grapheme, Line, Node};
pub use record::{identify, Identification, Record, RecordAction, Recorder};
pub use session::Session;
pub use store::{Lookup, RuneFootprint, Store};
