use crate::config::GeometryConfig;
use crate::landmarks::{
    HandLandmark, INDEX_MCP, INDEX_TIP, LANDMARK_COUNT, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP,
    PINKY_TIP, RING_MCP, RING_TIP, THUMB_TIP,
};
use serde::Serialize;

/// A sign recognized from landmark geometry alone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometricMatch {
    pub gesture: String,
    pub confidence: f32,
}

impl GeometricMatch {
    fn new(gesture: impl Into<String>, confidence: f32) -> Self {
        Self {
            gesture: gesture.into(),
            confidence,
        }
    }
}

/// Extension state of each digit. Image y grows downward, so a finger is
/// extended when its tip sits above its MCP joint.
#[derive(Debug, Clone, Copy)]
struct FingerState {
    thumb: bool,
    index: bool,
    middle: bool,
    ring: bool,
    pinky: bool,
}

impl FingerState {
    fn from_landmarks(landmarks: &[HandLandmark], config: &GeometryConfig) -> Self {
        let raised = |tip: usize, mcp: usize| landmarks[tip].y < landmarks[mcp].y;

        Self {
            thumb: landmarks[THUMB_TIP].planar_distance(&landmarks[INDEX_MCP])
                > config.thumb_extension_threshold,
            index: raised(INDEX_TIP, INDEX_MCP),
            middle: raised(MIDDLE_TIP, MIDDLE_MCP),
            ring: raised(RING_TIP, RING_MCP),
            pinky: raised(PINKY_TIP, PINKY_MCP),
        }
    }

    fn fingers(&self) -> [bool; 4] {
        [self.index, self.middle, self.ring, self.pinky]
    }

    fn none_raised(&self) -> bool {
        self.fingers().iter().all(|raised| !raised)
    }

    fn all_raised(&self) -> bool {
        self.fingers().iter().all(|raised| *raised)
    }
}

/// Index and middle fingers up and apart, ring finger folded
pub fn detect_two_finger_sign(
    landmarks: &[HandLandmark],
    config: &GeometryConfig,
) -> Option<GeometricMatch> {
    if landmarks.len() < LANDMARK_COUNT {
        return None;
    }

    let margin = config.two_finger_extension_margin;
    let index_up = landmarks[INDEX_TIP].y < landmarks[INDEX_MCP].y - margin;
    let middle_up = landmarks[MIDDLE_TIP].y < landmarks[MIDDLE_MCP].y - margin;
    let ring_down = landmarks[RING_TIP].y > landmarks[RING_MCP].y;
    let separated = landmarks[INDEX_TIP].planar_distance(&landmarks[MIDDLE_TIP])
        > config.two_finger_min_separation;

    (index_up && middle_up && ring_down && separated)
        .then(|| GeometricMatch::new(config.two_finger_label.clone(), config.two_finger_confidence))
}

/// Recognize the numerals 0, 1, 2, 3, 4, 5 and 8. The first matching
/// pattern wins.
pub fn detect_number_from_landmarks(
    landmarks: &[HandLandmark],
    config: &GeometryConfig,
) -> Option<GeometricMatch> {
    if landmarks.len() < LANDMARK_COUNT {
        return None;
    }

    let state = FingerState::from_landmarks(landmarks, config);
    let pinched = |a: usize, b: usize| landmarks[a].planar_distance(&landmarks[b]) < config.pinch_threshold;

    if pinched(THUMB_TIP, INDEX_TIP) && state.none_raised() {
        return Some(GeometricMatch::new("0", config.zero_confidence));
    }

    if !state.middle && state.index && state.ring && state.pinky && pinched(THUMB_TIP, MIDDLE_TIP) {
        return Some(GeometricMatch::new("8", config.eight_confidence));
    }

    match (state.thumb, state.fingers()) {
        (false, [true, false, false, false]) => Some(GeometricMatch::new("1", config.one_confidence)),
        (false, [true, true, false, false]) => Some(GeometricMatch::new("2", config.two_confidence)),
        (true, [true, true, false, false]) => Some(GeometricMatch::new("3", config.three_confidence)),
        (false, _) if state.all_raised() => Some(GeometricMatch::new("4", config.four_confidence)),
        (true, _) if state.all_raised() && fingertip_spread(landmarks) >= config.five_min_spread => {
            Some(GeometricMatch::new("5", config.five_confidence))
        }
        _ => None,
    }
}

/// Mean planar distance between neighbouring fingertips, thumb to pinky
fn fingertip_spread(landmarks: &[HandLandmark]) -> f32 {
    let tips = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
    let total: f32 = tips
        .windows(2)
        .map(|pair| landmarks[pair[0]].planar_distance(&landmarks[pair[1]]))
        .sum();
    total / (tips.len() - 1) as f32
}
