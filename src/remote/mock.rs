use crate::error::RemoteError;
use crate::frame::Frame;
use crate::landmarks::HandLandmark;
use crate::remote::client::RemoteClassifier;
use crate::remote::types::{RemoteDetection, RemoteStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Scripted remote classifier for tests and offline demos
pub struct MockRemoteClassifier {
    available: AtomicBool,
    landmark_reply: Mutex<Result<RemoteDetection, RemoteError>>,
    image_reply: Mutex<Result<RemoteDetection, RemoteError>>,
    landmark_calls: AtomicUsize,
    image_calls: AtomicUsize,
}

impl MockRemoteClassifier {
    pub fn available() -> Self {
        Self {
            available: AtomicBool::new(true),
            landmark_reply: Mutex::new(Ok(RemoteDetection::default())),
            image_reply: Mutex::new(Ok(RemoteDetection::default())),
            landmark_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        let mock = Self::available();
        mock.set_available(false);
        mock
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn set_landmark_reply(&self, reply: Result<RemoteDetection, RemoteError>) {
        *self.landmark_reply.lock() = reply;
    }

    pub fn set_image_reply(&self, reply: Result<RemoteDetection, RemoteError>) {
        *self.image_reply.lock() = reply;
    }

    pub fn landmark_calls(&self) -> usize {
        self.landmark_calls.load(Ordering::Relaxed)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::Relaxed)
    }

    /// Reply naming `letter` with the given confidence
    pub fn reply(letter: &str, confidence: f32, method: &str) -> RemoteDetection {
        RemoteDetection {
            letter: letter.to_string(),
            confidence,
            processing_time: 0.01,
            method: method.to_string(),
            landmarks_detected: method == "landmarks",
            error: None,
        }
    }

    fn ensure_available(&self) -> Result<(), RemoteError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable {
                url: "mock://remote".to_string(),
            })
        }
    }
}

#[async_trait]
impl RemoteClassifier for MockRemoteClassifier {
    async fn check_health(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    async fn classify_landmarks(&self, _landmarks: &[HandLandmark]) -> Result<RemoteDetection, RemoteError> {
        self.landmark_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_available()?;
        self.landmark_reply.lock().clone()
    }

    async fn classify_image(&self, _frame: &Frame) -> Result<RemoteDetection, RemoteError> {
        self.image_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_available()?;
        self.image_reply.lock().clone()
    }

    async fn model_info(&self) -> Result<serde_json::Value, RemoteError> {
        self.ensure_available()?;
        Ok(serde_json::json!({
            "model_info": {"name": "mock"},
            "available_methods": ["landmarks", "image"],
            "output_classes": 26,
        }))
    }

    fn status(&self) -> RemoteStatus {
        RemoteStatus {
            enabled: true,
            is_available: self.available.load(Ordering::Relaxed),
            base_url: "mock://remote".to_string(),
            last_health_check: None,
        }
    }
}
