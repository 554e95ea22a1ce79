//! Distance-to-confidence mappings.
//!
//! [`confidence_from_distance`] is the canonical score: it does not depend on
//! the match threshold, so confidences stay comparable across callers running
//! with different threshold configurations, and ranking by confidence is
//! exactly ranking by ascending distance. [`display_confidence`] is a linear
//! "percentage" transform for UI surfaces only: it reaches zero at the
//! threshold and must never feed ranking or threshold decisions.

/// Canonical confidence score: `1 / (1 + distance)`.
///
/// Strictly monotonically decreasing over `[0, ∞)` and bounded in `(0, 1]`.
/// A true L2 norm cannot be negative, but callers are not trusted to have
/// validated that upstream; negative inputs are treated as zero distance.
pub fn confidence_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance.clamp(0.0, f64::INFINITY))
}

/// Display-only linear score: `max(0, 1 - distance / threshold)`.
///
/// Hits zero exactly at the threshold. The threshold must be positive (see
/// [`crate::config::MatchConfig`], which enforces this at construction).
pub fn display_confidence(distance: f64, threshold: f64) -> f64 {
    (1.0 - distance / threshold).max(0.0)
}
