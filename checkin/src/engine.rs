//! Verification engine: one entry point per incoming attempt, dispatching
//! over the session's mode configuration.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::error::VerifyError;
use crate::extract::{EmbeddingExtractor, ExtractError};
use crate::gallery::IdentityGallery;
use crate::geofence;
use crate::group_photo;
use crate::liveness::LivenessClaim;
use crate::matcher::{self, MatchHit};
use crate::session::{ModeConfig, RecordStatus, SessionView};

/// Evidence submitted with a single-subject check-in attempt. Group-photo
/// roll call is not per-subject and goes through
/// [`VerificationEngine::verify_group_photo`] instead.
#[derive(Debug, Clone)]
pub enum Evidence {
    Code {
        code: String,
    },
    Gesture {
        digit: u8,
        image: Vec<u8>,
        liveness: LivenessClaim,
    },
    Location {
        lat: f64,
        lng: f64,
    },
    Face {
        image: Vec<u8>,
        liveness: LivenessClaim,
    },
}

/// Everything the engine needs to know about the attempting subject.
/// Loaded by the caller; the engine itself never touches storage.
#[derive(Debug, Clone)]
pub struct SubjectContext {
    pub subject_id: i64,
    /// The subject's enrolled embedding, if any. Self-match modes reject
    /// with `NotEnrolled` when this is absent.
    pub enrolled: Option<Vec<f64>>,
    /// Whether a record for (session, subject) already exists. The
    /// persistence layer re-checks this atomically at insert; this flag
    /// only lets the engine fail fast with the right reason.
    pub already_checked: bool,
}

/// A successful verification, ready to be persisted as one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub status: RecordStatus,
    pub similarity: Option<f64>,
    pub distance_m: Option<f64>,
    pub detected_gesture: Option<u8>,
}

impl Verdict {
    fn bare(status: RecordStatus) -> Self {
        Self {
            status,
            similarity: None,
            distance_m: None,
            detected_gesture: None,
        }
    }
}

/// One identified roster member in a group photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollCallMatch {
    pub subject_id: i64,
    pub similarity: f64,
}

/// Outcome of a group-photo roll call: fan-out material for the caller to
/// persist one record per matched subject.
#[derive(Debug, Clone, Serialize)]
pub struct GroupVerdict {
    pub status: RecordStatus,
    pub detected_faces: usize,
    pub matched: Vec<RollCallMatch>,
}

/// Orchestrates the five verification strategies. Holds only the
/// embedding-extractor collaborator; sessions, galleries and the clock
/// are passed in per call.
#[derive(Clone)]
pub struct VerificationEngine {
    extractor: Arc<dyn EmbeddingExtractor>,
}

impl VerificationEngine {
    pub fn new(extractor: Arc<dyn EmbeddingExtractor>) -> Self {
        Self { extractor }
    }

    /// Verify a single-subject attempt. Shared preconditions first
    /// (effective activity, idempotence), then the mode strategy; the
    /// late/on-time classification applies uniformly at the end.
    pub async fn verify(
        &self,
        session: &SessionView,
        subject: &SubjectContext,
        evidence: Evidence,
        now: DateTime<Utc>,
    ) -> Result<Verdict, VerifyError> {
        if !session.is_effectively_active(now) {
            return Err(VerifyError::SessionInactive);
        }
        if subject.already_checked {
            return Err(VerifyError::AlreadyCheckedIn);
        }

        let status = session.classify(now);

        match (&session.config, evidence) {
            (ModeConfig::Code { code }, Evidence::Code { code: submitted }) => {
                if !submitted.trim().eq_ignore_ascii_case(code) {
                    return Err(VerifyError::CodeMismatch);
                }
                Ok(Verdict::bare(status))
            }

            (
                ModeConfig::Gesture { digit },
                Evidence::Gesture {
                    digit: detected,
                    image,
                    liveness,
                },
            ) => {
                if detected != *digit {
                    return Err(VerifyError::GestureMismatch { expected: *digit });
                }
                let similarity = self.self_match(subject, &image, liveness).await?;
                Ok(Verdict {
                    status,
                    similarity: Some(similarity),
                    distance_m: None,
                    detected_gesture: Some(detected),
                })
            }

            (
                ModeConfig::Location {
                    lat,
                    lng,
                    radius_m,
                },
                Evidence::Location {
                    lat: user_lat,
                    lng: user_lng,
                },
            ) => {
                let (ok, d) = geofence::within_range(user_lat, user_lng, *lat, *lng, *radius_m);
                let d = geofence::round_distance(d);
                if !ok {
                    return Err(VerifyError::OutOfRange {
                        distance_m: d,
                        allowed_m: *radius_m,
                    });
                }
                Ok(Verdict {
                    status,
                    similarity: None,
                    distance_m: Some(d),
                    detected_gesture: None,
                })
            }

            (ModeConfig::Face, Evidence::Face { image, liveness }) => {
                let similarity = self.self_match(subject, &image, liveness).await?;
                Ok(Verdict {
                    status,
                    similarity: Some(similarity),
                    distance_m: None,
                    detected_gesture: None,
                })
            }

            // Group-photo sessions take no per-subject evidence, and any
            // other pairing is a client error.
            _ => Err(VerifyError::ModeMismatch),
        }
    }

    /// Roll call from one photograph, run by the session creator.
    ///
    /// `gallery` must already be scoped to roster members who are
    /// enrolled and have no record for this session; the still-available
    /// exclusion set during matching is local to this call.
    pub async fn verify_group_photo(
        &self,
        session: &SessionView,
        caller_id: i64,
        gallery: &IdentityGallery,
        photo: &[u8],
        now: DateTime<Utc>,
    ) -> Result<GroupVerdict, VerifyError> {
        if caller_id != session.creator_id {
            return Err(VerifyError::PermissionDenied);
        }
        if !matches!(session.config, ModeConfig::GroupPhoto) {
            return Err(VerifyError::ModeMismatch);
        }
        if !session.is_effectively_active(now) {
            return Err(VerifyError::SessionInactive);
        }

        let faces = match self.extractor.extract_all(photo).await {
            Ok(faces) => faces,
            Err(ExtractError::NoFace) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if faces.is_empty() {
            return Err(VerifyError::NoFacesDetected);
        }
        debug!(
            "roll call: session {} photo has {} face(s), {} eligible member(s)",
            session.id,
            faces.len(),
            gallery.len()
        );

        let matched = group_photo::assign(&faces, gallery)
            .into_iter()
            .map(|hit: MatchHit| RollCallMatch {
                subject_id: hit.subject_id,
                similarity: hit.similarity(),
            })
            .collect();

        Ok(GroupVerdict {
            status: session.classify(now),
            detected_faces: faces.len(),
            matched,
        })
    }

    /// Liveness-gated single-face match against the subject's own
    /// enrollment (gallery of one). The liveness gate runs before any
    /// extraction so a failed claim never produces a similarity score.
    async fn self_match(
        &self,
        subject: &SubjectContext,
        image: &[u8],
        liveness: LivenessClaim,
    ) -> Result<f64, VerifyError> {
        let enrolled = subject.enrolled.as_ref().ok_or(VerifyError::NotEnrolled)?;
        liveness.require()?;

        let probe = self.extractor.extract(image).await?;
        let gallery: IdentityGallery =
            [(subject.subject_id, enrolled.clone())].into_iter().collect();

        match matcher::match_probe(&probe, &gallery, &HashSet::new()) {
            Some(hit) => Ok(hit.similarity()),
            None => {
                let distance = matcher::cosine_distance(&probe, enrolled);
                Err(VerifyError::BelowThreshold {
                    similarity: matcher::similarity_percent(distance),
                })
            }
        }
    }
}
