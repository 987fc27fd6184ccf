// THEORY:
// The gesture classifier is the only "vision" logic this crate owns, and it is
// deliberately tiny. A pointing hand is one where the index finger is extended
// and the middle finger is folded. In screen coordinates (y grows downward):
//
//   index extended  <=> tip(8)  is above its PIP joint(6)  <=> y8  < y6
//   middle folded   <=> tip(12) is below its PIP joint(10) <=> y12 > y10
//
// The classifier is a pure function. It keeps no history and has no thresholds;
// temporal behavior (debouncing, cooldown) lives in the trigger, not here.

use crate::core_modules::landmark::{index, Landmark, LandmarkSet};
use crate::error::{OracleError, Result};

/// Highest landmark index the classifier reads.
const REQUIRED_POINTS: usize = index::MIDDLE_FINGER_TIP + 1;

/// Returns true if the hand shows an extended index finger and a folded middle finger.
pub fn is_pointing(hand: &LandmarkSet) -> bool {
    pointing_rule(hand.points())
}

/// Classifies a raw point list. Fails if indices 0..=12 are not all present.
pub fn classify_points(points: &[Landmark]) -> Result<bool> {
    if points.len() < REQUIRED_POINTS {
        return Err(OracleError::LandmarkCount {
            expected: REQUIRED_POINTS,
            actual: points.len(),
        });
    }
    Ok(pointing_rule(points))
}

// NaN never compares true, so non-finite coordinates classify as "no gesture".
fn pointing_rule(points: &[Landmark]) -> bool {
    let index_tip = points[index::INDEX_FINGER_TIP].y;
    let index_pip = points[index::INDEX_FINGER_PIP].y;
    let middle_tip = points[index::MIDDLE_FINGER_TIP].y;
    let middle_pip = points[index::MIDDLE_FINGER_PIP].y;

    index_tip < index_pip && middle_tip > middle_pip
}

#[cfg(test)]
pub(crate) fn hand_with(verticals: &[(usize, f32)]) -> LandmarkSet {
    let mut points = [Landmark::new(0.5, 0.5); crate::core_modules::landmark::LANDMARK_COUNT];
    for &(i, y) in verticals {
        points[i].y = y;
    }
    LandmarkSet::new(points)
}

#[cfg(test)]
pub(crate) fn pointing_hand() -> LandmarkSet {
    hand_with(&[(6, 0.5), (8, 0.3), (10, 0.4), (12, 0.6)])
}
