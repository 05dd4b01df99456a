//! Session state machine: mode configuration, lazy expiry, and the
//! late/on-time classification shared by every verification mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-mode verification parameters. Exactly one variant applies to a
/// session; dispatch is an exhaustive match so adding a mode cannot be
/// missed at a call site.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeConfig {
    /// Shared secret, compared case-insensitively after trimming.
    Code { code: String },
    /// Numeric hand gesture in 1..=5, verified together with a self face
    /// match and liveness.
    Gesture { digit: u8 },
    /// Geofenced check-in around a target position.
    Location {
        lat: f64,
        lng: f64,
        radius_m: f64,
    },
    /// Self face match gated by liveness.
    Face,
    /// Creator-driven roll call from one multi-face photograph.
    GroupPhoto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Outcome classification of a successful check-in. Absence is never
/// materialized; it is computed at read time as roster minus records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Checked,
    Late,
}

/// What the verification engine needs to know about a session. Built by
/// the persistence layer from the stored row; pure data, no connection
/// handle.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub id: i64,
    pub creator_id: i64,
    pub group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub config: ModeConfig,
}

impl SessionView {
    /// Whether the session accepts attempts at `now`.
    ///
    /// The stored status flag is necessary but not sufficient: expiry is
    /// lazy, so a session past `end_time` is closed even while the row
    /// still says active. Every write path calls this instead of trusting
    /// the stored enum.
    pub fn is_effectively_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now <= self.end_time
    }

    /// Late/on-time rule, uniform across all modes: an attempt past the
    /// halfway point of the session window is late.
    pub fn classify(&self, now: DateTime<Utc>) -> RecordStatus {
        let total = (self.end_time - self.created_at).num_milliseconds() as f64;
        let elapsed = (now - self.created_at).num_milliseconds() as f64;
        if total > 0.0 && elapsed > total * 0.5 {
            RecordStatus::Late
        } else {
            RecordStatus::Checked
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session(minutes: i64) -> SessionView {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        SessionView {
            id: 1,
            creator_id: 10,
            group_id: Some(5),
            created_at: created,
            end_time: created + Duration::minutes(minutes),
            status: SessionStatus::Active,
            config: ModeConfig::Face,
        }
    }

    #[test]
    fn active_until_end_time_inclusive() {
        let s = session(10);
        assert!(s.is_effectively_active(s.created_at));
        assert!(s.is_effectively_active(s.end_time));
        assert!(!s.is_effectively_active(s.end_time + Duration::seconds(1)));
    }

    #[test]
    fn expired_wins_over_stored_status() {
        let s = session(10);
        // Stored status still says active; time says otherwise.
        assert_eq!(s.status, SessionStatus::Active);
        assert!(!s.is_effectively_active(s.end_time + Duration::minutes(5)));
    }

    #[test]
    fn ended_status_closes_even_before_end_time() {
        let mut s = session(10);
        s.status = SessionStatus::Ended;
        assert!(!s.is_effectively_active(s.created_at + Duration::minutes(1)));
    }

    #[test]
    fn halfway_rule_classifies_late() {
        let s = session(10);
        let at = |secs: i64| s.created_at + Duration::seconds(secs);

        assert_eq!(s.classify(at(4 * 60 + 59)), RecordStatus::Checked);
        assert_eq!(s.classify(at(5 * 60)), RecordStatus::Checked); // exactly half is on time
        assert_eq!(s.classify(at(5 * 60 + 1)), RecordStatus::Late);
    }
}
