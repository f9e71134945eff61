use serde::{Deserialize, Serialize};

/// Number of points in the standard hand skeleton
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_MCP: usize = 2;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

/// Fingertip indices, thumb first
pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Normalized 3D coordinate of one hand point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HandLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl HandLandmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &HandLandmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance in the image plane, ignoring depth
    pub fn planar_distance(&self, other: &HandLandmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Handedness {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Handedness {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Handedness::Left,
            "right" => Handedness::Right,
            _ => Handedness::Unknown,
        }
    }
}

/// Unvalidated output of a hand detector, before the provider applies its
/// confidence floor and landmark count check
#[derive(Debug, Clone)]
pub struct RawHandDetection {
    pub landmarks: Vec<HandLandmark>,
    pub handedness: Handedness,
    pub score: f32,
}

/// One detected hand with exactly 21 landmarks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandDetectionResult {
    landmarks: Vec<HandLandmark>,
    pub handedness: Handedness,
    pub confidence: f32,
}

impl HandDetectionResult {
    /// Returns `None` unless exactly 21 landmarks are supplied. Confidence is
    /// clamped to [0, 1].
    pub fn new(landmarks: Vec<HandLandmark>, handedness: Handedness, confidence: f32) -> Option<Self> {
        if landmarks.len() != LANDMARK_COUNT {
            return None;
        }

        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Some(Self {
            landmarks,
            handedness,
            confidence,
        })
    }

    pub fn landmarks(&self) -> &[HandLandmark] {
        &self.landmarks
    }
}
