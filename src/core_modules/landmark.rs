// THEORY:
// The `landmark` module holds the raw material of the whole system: the per-hand
// skeleton produced by the external hand-landmark model. The model itself is an
// opaque collaborator; by the time data reaches this crate it is a plain list of
// normalized points.
//
// A `LandmarkSet` is a "dumb" container. It is read-only input: nothing in the
// crate mutates it after construction. Its one guarantee is structural: it always
// holds exactly `LANDMARK_COUNT` points, so every consumer may index it freely.
// Anything that cannot meet that guarantee is rejected at the boundary.

use crate::error::{OracleError, Result};
use serde::{Deserialize, Serialize};

/// Number of keypoints the hand model reports per hand.
pub const LANDMARK_COUNT: usize = 21;

/// Hand landmark indices (MediaPipe hand landmark convention).
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Bone pairs used to draw the hand skeleton.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (5, 9), (9, 10), (10, 11), (11, 12),
    (9, 13), (13, 14), (14, 15), (15, 16),
    (13, 17), (0, 17), (17, 18), (18, 19), (19, 20),
];

/// A single landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position (0.0 left edge, 1.0 right edge).
    pub x: f32,
    /// Vertical position (0.0 top edge, 1.0 bottom edge). Smaller is higher.
    pub y: f32,
    /// Depth relative to the wrist. Unused by the classifier.
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// The full skeleton of one hand for one video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Builds a set from an arbitrary list, rejecting anything that is not a full hand.
    pub fn from_points(points: &[Landmark]) -> Result<Self> {
        let points: [Landmark; LANDMARK_COUNT] =
            points.try_into().map_err(|_| OracleError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            })?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_accepts_a_full_hand() {
        let points: Vec<Landmark> = (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(i as f32 / 20.0, 1.0 - i as f32 / 20.0))
            .collect();
        let set = LandmarkSet::from_points(&points).expect("full hand");

        assert_eq!(set[index::WRIST], points[0]);
        assert_eq!(set[index::PINKY_TIP], points[20]);
        assert!(set.get(LANDMARK_COUNT).is_none());
    }

    #[test]
    fn from_points_rejects_partial_hand() {
        let points = vec![Landmark::default(); 13];
        match LandmarkSet::from_points(&points) {
            Err(OracleError::LandmarkCount { expected, actual }) => {
                assert_eq!(expected, 21);
                assert_eq!(actual, 13);
            }
            other => panic!("expected LandmarkCount error, got {:?}", other),
        }
    }

    #[test]
    fn connections_stay_inside_the_skeleton() {
        for (a, b) in HAND_CONNECTIONS {
            assert!(a < LANDMARK_COUNT && b < LANDMARK_COUNT);
        }
    }

    #[test]
    fn landmark_depth_is_optional_in_json() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.25,"y":0.75}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.25, 0.75));
    }
}
