use crate::confidence::clamp_unit;
use crate::landmarks::HandLandmark;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Which strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    RemoteLandmarks,
    TwoFingerGeometry,
    LocalLandmarks,
    RemoteImage,
    LocalImage,
    NumeralGeometry,
    /// No strategy accepted the frame
    None,
    /// Dropped because another run was in flight
    Busy,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::RemoteLandmarks => "remote_landmarks",
            Method::TwoFingerGeometry => "two_finger_geometry",
            Method::LocalLandmarks => "local_landmarks",
            Method::RemoteImage => "remote_image",
            Method::LocalImage => "local_image",
            Method::NumeralGeometry => "numeral_geometry",
            Method::None => "none",
            Method::Busy => "busy",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Backend,
    Client,
}

/// Outcome of one pipeline run. Confidence is always within [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Empty when nothing was recognized
    pub gesture: String,
    pub confidence: f32,
    pub landmarks: Option<Vec<HandLandmark>>,
    /// Milliseconds from the start of landmark detection to the result,
    /// excluding the one-time model load. Zero for busy drops.
    #[serde(rename = "processingTime")]
    pub processing_time_ms: f64,
    pub method: Method,
    pub source: Source,
}

impl DetectionResult {
    pub fn new(
        gesture: impl Into<String>,
        confidence: f32,
        landmarks: Option<Vec<HandLandmark>>,
        started: Instant,
        method: Method,
        source: Source,
    ) -> Self {
        Self {
            gesture: gesture.into(),
            confidence: clamp_unit(confidence),
            landmarks,
            processing_time_ms: elapsed_ms(started),
            method,
            source,
        }
    }

    /// Nothing recognized; landmarks are kept when a hand was found
    pub fn empty(landmarks: Option<Vec<HandLandmark>>, started: Instant) -> Self {
        Self::new("", 0.0, landmarks, started, Method::None, Source::Client)
    }

    pub fn busy() -> Self {
        Self {
            gesture: String::new(),
            confidence: 0.0,
            landmarks: None,
            processing_time_ms: 0.0,
            method: Method::Busy,
            source: Source::Client,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gesture.is_empty()
    }

    pub fn has_hand(&self) -> bool {
        self.landmarks.is_some()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
