//! Greedy face-to-roster assignment for group-photo roll call.

use std::collections::HashSet;

use crate::gallery::IdentityGallery;
use crate::matcher::{self, MatchHit};

/// Assign each detected face, in detection order, to the closest
/// still-available gallery member under the acceptance threshold.
///
/// A matched subject is removed from the available set so two faces in
/// the same photo can never claim the same identity. Faces with no
/// qualifying candidate are skipped silently: a group photo legitimately
/// contains non-roster faces.
///
/// The assignment is greedy and order-dependent, not a globally optimal
/// bipartite matching: an earlier face can consume a subject that a later
/// face matches more closely, leaving the later face mismatched or
/// unmatched. That approximation is intentional and kept for
/// compatibility; a minimum-cost assignment would be a behavior change.
pub fn assign(faces: &[Vec<f64>], gallery: &IdentityGallery) -> Vec<MatchHit> {
    let mut taken: HashSet<i64> = HashSet::new();
    let mut matched = Vec::new();
    for probe in faces {
        if let Some(hit) = matcher::match_probe(probe, gallery, &taken) {
            taken.insert(hit.subject_id);
            matched.push(hit);
        }
    }
    matched
}
