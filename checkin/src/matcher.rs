//! Closest-match identity lookup over an embedding gallery.

use std::collections::HashSet;

use crate::gallery::IdentityGallery;

/// Cosine-distance acceptance threshold. A probe matches a gallery entry
/// only when the distance is strictly below this value.
pub const MATCH_THRESHOLD: f64 = 0.32;

/// A gallery entry selected as the closest candidate for a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchHit {
    pub subject_id: i64,
    pub distance: f64,
}

impl MatchHit {
    pub fn similarity(&self) -> f64 {
        similarity_percent(self.distance)
    }
}

/// Cosine distance `1 - (a·b)/(‖a‖‖b‖)`. Degenerate inputs (zero vector,
/// length mismatch) map to 1.0 so they never match anything.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - dot / denom
}

/// Similarity reported to callers: `(1 - distance) * 100`, rounded to
/// two decimals.
pub fn similarity_percent(distance: f64) -> f64 {
    ((1.0 - distance) * 100.0 * 100.0).round() / 100.0
}

/// The gallery entry at minimum distance from the probe, skipping
/// `exclude`, regardless of threshold. Ties keep the first entry
/// encountered; exact float ties carry no meaning and are vanishingly
/// rare, so iteration order is an acceptable tie-break.
pub fn closest(
    probe: &[f64],
    gallery: &IdentityGallery,
    exclude: &HashSet<i64>,
) -> Option<MatchHit> {
    let mut best: Option<MatchHit> = None;
    for entry in gallery.iter() {
        if exclude.contains(&entry.subject_id) {
            continue;
        }
        let distance = cosine_distance(probe, &entry.embedding);
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(MatchHit {
                subject_id: entry.subject_id,
                distance,
            });
        }
    }
    best
}

/// Closest entry if and only if it clears the acceptance threshold.
///
/// `None` is a valid negative result (no gallery identity is close
/// enough), distinct from upstream extraction failures.
pub fn match_probe(
    probe: &[f64],
    gallery: &IdentityGallery,
    exclude: &HashSet<i64>,
) -> Option<MatchHit> {
    closest(probe, gallery, exclude).filter(|hit| hit.distance < MATCH_THRESHOLD)
}
