//! Liveness evidence: blink and head-turn analysis from facial landmarks,
//! and the claim gate applied before any face matching.

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;
use crate::extract::{FaceLandmarks, Point};

/// Eye aspect ratio below which the eye counts as closed.
pub const EAR_THRESHOLD: f64 = 0.21;

/// Normalized nose-tip offset beyond which the head counts as turned.
pub const HEAD_TURN_THRESHOLD: f64 = 0.15;

/// Caller-assembled liveness evidence. Aggregating per-frame observations
/// into these two booleans (e.g. "a blink happened at some point during
/// capture") is the caller's responsibility.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LivenessClaim {
    pub blink_detected: bool,
    pub head_turn_detected: bool,
}

impl LivenessClaim {
    /// Both signals must be present or face verification is refused
    /// before any embedding comparison happens.
    pub fn require(&self) -> Result<(), VerifyError> {
        if !self.blink_detected {
            return Err(VerifyError::LivenessFailed { signal: "blink" });
        }
        if !self.head_turn_detected {
            return Err(VerifyError::LivenessFailed { signal: "head turn" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadDirection {
    Left,
    Right,
    Center,
}

/// Per-frame blink observation. Stateless: one frame in, one answer out.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlinkObservation {
    pub ear: f64,
    pub is_blink: bool,
}

/// Per-frame head-pose observation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HeadPoseObservation {
    pub direction: HeadDirection,
    pub offset: f64,
}

fn dist(a: Point, b: Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Eye aspect ratio over six landmarks: averaged vertical lid openings
/// divided by the horizontal eye width. Ordering: outer corner, two upper
/// lid points, inner corner, two lower lid points.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f64 {
    let v1 = dist(eye[1], eye[5]);
    let v2 = dist(eye[2], eye[4]);
    let h = dist(eye[0], eye[3]);
    if h > 0.0 { (v1 + v2) / (2.0 * h) } else { 0.0 }
}

/// Blink test for one frame: average EAR of both eyes against the
/// threshold.
pub fn analyze_blink(landmarks: &FaceLandmarks) -> BlinkObservation {
    let left = eye_aspect_ratio(&landmarks.left_eye);
    let right = eye_aspect_ratio(&landmarks.right_eye);
    let ear = (left + right) / 2.0;
    BlinkObservation {
        ear,
        is_blink: ear < EAR_THRESHOLD,
    }
}

/// Head-pose test for one frame: horizontal nose-tip offset from the
/// cheek midpoint, in normalized image coordinates.
pub fn analyze_head_pose(landmarks: &FaceLandmarks) -> HeadPoseObservation {
    let center_x = (landmarks.left_cheek.x + landmarks.right_cheek.x) / 2.0;
    let offset = landmarks.nose_tip.x - center_x;
    let direction = if offset < -HEAD_TURN_THRESHOLD {
        HeadDirection::Left
    } else if offset > HEAD_TURN_THRESHOLD {
        HeadDirection::Right
    } else {
        HeadDirection::Center
    };
    HeadPoseObservation { direction, offset }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    // Eye of width 1.0 with both lid openings equal to `opening`.
    fn eye(opening: f64) -> [Point; 6] {
        [
            p(0.0, 0.5),
            p(0.3, 0.5 - opening / 2.0),
            p(0.7, 0.5 - opening / 2.0),
            p(1.0, 0.5),
            p(0.7, 0.5 + opening / 2.0),
            p(0.3, 0.5 + opening / 2.0),
        ]
    }

    fn face(opening: f64, nose_x: f64) -> FaceLandmarks {
        FaceLandmarks {
            left_eye: eye(opening),
            right_eye: eye(opening),
            nose_tip: p(nose_x, 0.6),
            left_cheek: p(0.2, 0.6),
            right_cheek: p(0.8, 0.6),
        }
    }

    #[test]
    fn ear_is_opening_over_width() {
        assert!((eye_aspect_ratio(&eye(0.4)) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn zero_width_eye_yields_zero_ear() {
        let collapsed = [p(0.5, 0.5); 6];
        assert_eq!(eye_aspect_ratio(&collapsed), 0.0);
    }

    #[test]
    fn closed_eyes_read_as_blink() {
        let obs = analyze_blink(&face(0.1, 0.5));
        assert!(obs.is_blink);
        assert!((obs.ear - 0.1).abs() < 1e-12);

        let open = analyze_blink(&face(0.35, 0.5));
        assert!(!open.is_blink);
    }

    #[test]
    fn head_pose_direction_thresholds() {
        // Cheek midpoint sits at x = 0.5.
        assert_eq!(
            analyze_head_pose(&face(0.3, 0.30)).direction,
            HeadDirection::Left
        );
        assert_eq!(
            analyze_head_pose(&face(0.3, 0.70)).direction,
            HeadDirection::Right
        );
        assert_eq!(
            analyze_head_pose(&face(0.3, 0.55)).direction,
            HeadDirection::Center
        );
        // Just inside the threshold is still center.
        assert_eq!(
            analyze_head_pose(&face(0.3, 0.64)).direction,
            HeadDirection::Center
        );
        assert_eq!(
            analyze_head_pose(&face(0.3, 0.36)).direction,
            HeadDirection::Center
        );
    }

    #[test]
    fn claim_gate_requires_both_signals() {
        let ok = LivenessClaim {
            blink_detected: true,
            head_turn_detected: true,
        };
        assert!(ok.require().is_ok());

        let no_blink = LivenessClaim {
            blink_detected: false,
            head_turn_detected: true,
        };
        assert_eq!(
            no_blink.require(),
            Err(VerifyError::LivenessFailed { signal: "blink" })
        );

        let no_turn = LivenessClaim {
            blink_detected: true,
            head_turn_detected: false,
        };
        assert_eq!(
            no_turn.require(),
            Err(VerifyError::LivenessFailed { signal: "head turn" })
        );
    }
}
