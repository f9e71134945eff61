use crate::landmarks::{HandLandmark, Handedness, LANDMARK_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /app/api/detect-sign/`
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<&'a [HandLandmark]>,

    /// Base64 JPEG without a data-URL prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,

    pub use_landmarks: bool,
}

impl<'a> DetectionRequest<'a> {
    pub fn landmarks(landmarks: &'a [HandLandmark]) -> Self {
        Self {
            landmarks: Some(landmarks),
            image_data: None,
            use_landmarks: true,
        }
    }

    pub fn image(image_data: String) -> Self {
        Self {
            landmarks: None,
            image_data: Some(image_data),
            use_landmarks: false,
        }
    }
}

/// Reply of the remote sign classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteDetection {
    #[serde(default)]
    pub letter: String,

    #[serde(default)]
    pub confidence: f32,

    /// Server-side processing time in seconds
    #[serde(default)]
    pub processing_time: f64,

    /// "landmarks" or "image"
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub landmarks_detected: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteDetection {
    /// True when the reply names an actual sign
    pub fn has_sign(&self) -> bool {
        self.error.is_none() && !self.letter.trim().is_empty() && self.letter.trim() != "?"
    }
}

/// Reply of `POST /app/api/extract-landmarks/`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractLandmarksResponse {
    #[serde(default)]
    pub landmarks: Option<Vec<[f32; 3]>>,

    #[serde(default)]
    pub count: usize,

    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub handedness: Option<String>,

    #[serde(default)]
    pub score: Option<f32>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl ExtractLandmarksResponse {
    /// Landmarks of a successful extraction; `None` when no hand was found or
    /// the skeleton is incomplete
    pub fn hand_landmarks(&self) -> Option<Vec<HandLandmark>> {
        if !self.success {
            return None;
        }

        let points = self.landmarks.as_ref()?;
        if points.len() != LANDMARK_COUNT {
            return None;
        }

        Some(points.iter().map(|[x, y, z]| HandLandmark::new(*x, *y, *z)).collect())
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
            .as_deref()
            .map(Handedness::from_label)
            .unwrap_or_default()
    }
}

/// Snapshot of the remote client for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub enabled: bool,
    pub is_available: bool,
    pub base_url: String,
    pub last_health_check: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_request_shape() {
        let points = vec![HandLandmark::new(0.1, 0.2, 0.3); 2];
        let json = serde_json::to_value(DetectionRequest::landmarks(&points)).unwrap();

        assert_eq!(json["use_landmarks"], true);
        assert_eq!(json["landmarks"][1]["y"].as_f64().map(|v| (v * 10.0).round()), Some(2.0));
        assert!(json.get("image_data").is_none());
    }

    #[test]
    fn test_image_request_shape() {
        let json = serde_json::to_value(DetectionRequest::image("abc".to_string())).unwrap();
        assert_eq!(json["use_landmarks"], false);
        assert_eq!(json["image_data"], "abc");
        assert!(json.get("landmarks").is_none());
    }

    #[test]
    fn test_detection_reply_parsing() {
        let reply: RemoteDetection = serde_json::from_str(
            r#"{"letter":"A","confidence":0.91,"processing_time":0.02,"method":"landmarks","landmarks_detected":true}"#,
        )
        .unwrap();
        assert!(reply.has_sign());
        assert!((reply.confidence - 0.91).abs() < 1e-6);

        let failed: RemoteDetection = serde_json::from_str(r#"{"error":"model not loaded"}"#).unwrap();
        assert!(!failed.has_sign());

        let unknown: RemoteDetection = serde_json::from_str(r#"{"letter":"?","confidence":0.2}"#).unwrap();
        assert!(!unknown.has_sign());
    }

    #[test]
    fn test_extract_reply_parsing() {
        let points: Vec<[f32; 3]> = (0..21).map(|i| [i as f32 / 21.0, 0.5, 0.0]).collect();
        let body = serde_json::json!({"landmarks": points, "count": 21, "success": true, "handedness": "Left"});
        let reply: ExtractLandmarksResponse = serde_json::from_value(body).unwrap();

        assert_eq!(reply.hand_landmarks().map(|l| l.len()), Some(LANDMARK_COUNT));
        assert_eq!(reply.handedness(), Handedness::Left);

        let none: ExtractLandmarksResponse = serde_json::from_str(
            r#"{"landmarks":null,"count":0,"success":false,"message":"No hand landmarks detected"}"#,
        )
        .unwrap();
        assert!(none.hand_landmarks().is_none());
        assert_eq!(none.handedness(), Handedness::Unknown);
    }
}
