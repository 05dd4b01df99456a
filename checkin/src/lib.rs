//! Attendance verification core.
//!
//! Pure check-in logic: identity matching over an embedding gallery,
//! liveness gating, geofencing, greedy group-photo roll call, and the
//! session state machine that ties the five verification modes together.
//! Persistence and transport live elsewhere; the external face service is
//! reached through the traits in [`extract`] so tests can substitute fakes.

pub mod engine;
pub mod error;
pub mod extract;
pub mod gallery;
pub mod geofence;
pub mod group_photo;
pub mod liveness;
pub mod matcher;
pub mod session;

pub use engine::{Evidence, GroupVerdict, RollCallMatch, SubjectContext, Verdict, VerificationEngine};
pub use error::VerifyError;
pub use extract::{EmbeddingExtractor, ExtractError, FaceLandmarks, LandmarkDetector, Point};
pub use gallery::{GalleryEntry, IdentityGallery};
pub use liveness::LivenessClaim;
pub use matcher::MatchHit;
pub use session::{ModeConfig, RecordStatus, SessionStatus, SessionView};
