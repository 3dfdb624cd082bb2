//! Hand-pose landmark model and wire decoding.

use serde::Deserialize;
use thiserror::Error;

/// Landmarks per pose as delivered by the vision engine.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const MIDDLE_BASE: usize = 9;
/// Index, middle, ring, pinky tips.
pub const FINGERTIPS: [usize; 4] = [8, 12, 16, 20];

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Error)]
pub enum PoseError {
    #[error("pose has {0} landmarks, need at least {LANDMARK_COUNT}")]
    TooFewLandmarks(usize),
    #[error("undecodable landmark payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One decoded hand pose. Valid by construction: at least 21 landmarks.
#[derive(Debug, Clone)]
pub struct HandPose {
    landmarks: Vec<Landmark>,
}

impl HandPose {
    pub fn new(landmarks: Vec<Landmark>) -> Result<Self, PoseError> {
        if landmarks.len() < LANDMARK_COUNT {
            return Err(PoseError::TooFewLandmarks(landmarks.len()));
        }
        Ok(Self { landmarks })
    }

    /// Mean Euclidean wrist->fingertip distance over the four tips.
    /// Large when the palm is open, small when curled into a fist.
    pub fn avg_fingertip_distance(&self) -> f32 {
        let wrist = &self.landmarks[WRIST];
        let total: f32 = FINGERTIPS
            .iter()
            .map(|&i| self.landmarks[i].distance_to(wrist))
            .sum();
        total / FINGERTIPS.len() as f32
    }

    /// x of the middle-finger base, the steering coordinate.
    pub fn steer_x(&self) -> f32 {
        self.landmarks[MIDDLE_BASE].x
    }
}

/// Decode a pose from the JSON the engine sends over IPC:
/// an array of `{"x": .., "y": ..}` objects (optional `z`).
pub fn decode_pose(value: &serde_json::Value) -> Result<HandPose, PoseError> {
    let landmarks: Vec<Landmark> = serde_json::from_value(value.clone())?;
    HandPose::new(landmarks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_pose(fill: Landmark) -> Vec<Landmark> {
        vec![fill; LANDMARK_COUNT]
    }

    #[test]
    fn rejects_short_pose() {
        let lms = vec![Landmark::new(0.5, 0.5); 20];
        assert!(HandPose::new(lms).is_err());
    }

    #[test]
    fn avg_distance_of_degenerate_pose_is_zero() {
        let pose = HandPose::new(flat_pose(Landmark::new(0.5, 0.5))).unwrap();
        assert_eq!(pose.avg_fingertip_distance(), 0.0);
    }

    #[test]
    fn avg_distance_spread_tips() {
        // wrist at origin, all four tips at the same spot 0.5 to the right
        let mut lms = flat_pose(Landmark::new(0.0, 0.0));
        for i in FINGERTIPS {
            lms[i] = Landmark::new(0.5, 0.0);
        }
        let pose = HandPose::new(lms).unwrap();
        assert_eq!(pose.avg_fingertip_distance(), 0.5);
    }

    #[test]
    fn steer_reads_middle_base() {
        let mut lms = flat_pose(Landmark::new(0.0, 0.0));
        lms[MIDDLE_BASE] = Landmark::new(0.75, 0.2);
        let pose = HandPose::new(lms).unwrap();
        assert_eq!(pose.steer_x(), 0.75);
    }

    #[test]
    fn decodes_engine_json() {
        let one = r#"{"x": 0.1, "y": 0.2, "z": 0.0}"#;
        let json = format!("[{}]", vec![one; LANDMARK_COUNT].join(","));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let pose = decode_pose(&value).unwrap();
        assert_eq!(pose.steer_x(), 0.1);
    }

    #[test]
    fn decode_rejects_garbage() {
        let value = serde_json::json!({"not": "landmarks"});
        assert!(decode_pose(&value).is_err());
    }
}
