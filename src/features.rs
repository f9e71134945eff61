use crate::landmarks::{HandDetectionResult, HandLandmark, FINGERTIPS, LANDMARK_COUNT, WRIST};

/// Length of the classifier input vector: 63 coordinates and 5 distances
pub const FEATURE_LEN: usize = 68;

const COORDINATE_LEN: usize = LANDMARK_COUNT * 3;
const DEPTH_MIN: f32 = -0.1;
const DEPTH_RANGE: f32 = 0.2;

/// Flatten landmarks to x,y,z triples followed by wrist-to-fingertip
/// distances. Distances are only appended for a complete skeleton.
pub fn extract_feature_vector(landmarks: &[HandLandmark]) -> Vec<f32> {
    let mut features = Vec::with_capacity(FEATURE_LEN);

    for landmark in landmarks {
        features.extend_from_slice(&[landmark.x, landmark.y, landmark.z]);
    }

    if landmarks.len() >= LANDMARK_COUNT {
        let wrist = &landmarks[WRIST];
        features.extend(FINGERTIPS.iter().map(|&tip| wrist.distance(&landmarks[tip])));
    }

    features
}

/// Rescale depth values of the coordinate block from (-0.1, 0.1) to (0, 1).
/// x, y and the distance tail are left untouched.
pub fn normalize_features(mut features: Vec<f32>) -> Vec<f32> {
    let coordinates = features.len().min(COORDINATE_LEN);

    for triple in features[..coordinates].chunks_exact_mut(3) {
        triple[2] = (triple[2] - DEPTH_MIN) / DEPTH_RANGE;
    }

    features
}

/// Zero-pad or truncate to [`FEATURE_LEN`]
pub fn to_model_input(mut features: Vec<f32>) -> Vec<f32> {
    features.resize(FEATURE_LEN, 0.0);
    features
}

/// Model-ready features for one detected hand
pub fn feature_vector(result: &HandDetectionResult) -> Vec<f32> {
    to_model_input(normalize_features(extract_feature_vector(result.landmarks())))
}
