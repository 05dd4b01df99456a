use thiserror::Error;

/// Terminal, caller-visible outcomes of a verification attempt.
///
/// None of these are retried internally. `ExtractionFailed` is the only
/// class a caller should treat as transient; everything else means the
/// attempt was judged and rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    #[error("attendance session not found")]
    SessionNotFound,

    /// Expired or explicitly ended. Time expiry wins over the stored
    /// status flag: a session past its `end_time` is inactive even if the
    /// row still says `active`.
    #[error("attendance session has ended")]
    SessionInactive,

    #[error("attendance already recorded for this session")]
    AlreadyCheckedIn,

    #[error("no face enrolled; register a face before checking in")]
    NotEnrolled,

    #[error("no face detected in the submitted image")]
    NoFaceDetected,

    #[error("no faces detected in the group photo")]
    NoFacesDetected,

    #[error("face service error: {0}")]
    ExtractionFailed(String),

    #[error("liveness check failed: {signal} not detected")]
    LivenessFailed { signal: &'static str },

    #[error("face match below threshold (similarity {similarity:.1}%)")]
    BelowThreshold { similarity: f64 },

    #[error("too far from the check-in point ({distance_m:.0} m, allowed {allowed_m:.0} m)")]
    OutOfRange { distance_m: f64, allowed_m: f64 },

    #[error("incorrect check-in code")]
    CodeMismatch,

    #[error("wrong gesture; show the number {expected}")]
    GestureMismatch { expected: u8 },

    #[error("only the session creator may do this")]
    PermissionDenied,

    #[error("check-in location not configured")]
    TargetUnset,

    #[error("submitted evidence does not match the session mode")]
    ModeMismatch,
}

impl VerifyError {
    /// Similarity percentage carried by the rejection, if any, so the
    /// caller can report how close the attempt was.
    pub fn similarity(&self) -> Option<f64> {
        match self {
            VerifyError::BelowThreshold { similarity } => Some(*similarity),
            _ => None,
        }
    }

    /// Geofence distance carried by the rejection, if any.
    pub fn distance_m(&self) -> Option<f64> {
        match self {
            VerifyError::OutOfRange { distance_m, .. } => Some(*distance_m),
            _ => None,
        }
    }

    /// Whether a retry could plausibly succeed without any change on the
    /// caller's side (upstream service fault).
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyError::ExtractionFailed(_))
    }
}
