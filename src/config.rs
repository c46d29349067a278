//! Design constants shared across the pipeline.
//!
//! These are geometric invariants of the recognizer, not user-tunable
//! parameters: the EM square fixes the layout scale, and the matching
//! constants fix the frame every distance score is computed in.

/// Width of the EM square, the reference advance of one glyph.
pub const EM_WIDTH: f64 = 30.0;

/// Height of the EM square.
pub const EM_HEIGHT: f64 = 60.0;

/// Fraction of a scope's height sitting above its baseline.
pub const EM_BASELINE_RATIO: f64 = 0.7;

/// Side of the square every stroke pair is rescaled into before
/// computing a distance, so scores are comparable across glyph sizes.
pub const MATCH_RESCALE_SIDE: f64 = 20.0;

/// A lookup flags a possible compound extension when the best
/// truncated-entry distance is below this multiple of the best
/// exact distance.
pub const COMPAT_RATIO: f64 = 2.0;

/// Runes a usable reference store should cover; the store editor
/// surfaces the missing ones.
pub const REQUIRED_RUNES: &str = "abcdefxy()12+-_=";
