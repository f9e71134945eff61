use crate::config::LandmarkConfig;
use crate::error::LandmarkError;
use crate::frame::Frame;
use crate::landmarks::types::{HandLandmark, Handedness, RawHandDetection, LANDMARK_COUNT};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Options pushed into a primary detector right after it is created
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOptions {
    pub max_num_hands: u32,
    pub model_complexity: u8,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl From<&LandmarkConfig> for DetectorOptions {
    fn from(config: &LandmarkConfig) -> Self {
        Self {
            max_num_hands: config.max_num_hands,
            model_complexity: config.model_complexity,
            min_detection_confidence: config.detector_min_detection_confidence,
            min_tracking_confidence: config.detector_min_tracking_confidence,
        }
    }
}

/// A learned hand-landmark detector
#[async_trait]
pub trait HandDetector: Send + Sync {
    fn name(&self) -> &str;

    fn configure(&self, options: &DetectorOptions) -> Result<(), LandmarkError>;

    /// False once the instance has lost a capability it needs to detect
    fn is_operational(&self) -> bool;

    async fn detect(&self, frame: &Frame) -> Result<Option<RawHandDetection>, LandmarkError>;
}

/// Builds primary detector instances for the landmark provider
#[async_trait]
pub trait HandDetectorFactory: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self) -> Result<Arc<dyn HandDetector>, LandmarkError>;
}

/// Deterministic open-hand pose, palm facing the camera
pub fn synthetic_landmarks() -> Vec<HandLandmark> {
    let mut landmarks = Vec::with_capacity(LANDMARK_COUNT);
    landmarks.push(HandLandmark::new(0.5, 0.85, 0.0));

    // Thumb sweeps out to the side, the four fingers point up
    let finger_bases = [0.35f32, 0.44, 0.5, 0.56, 0.62];
    for (finger, base_x) in finger_bases.iter().enumerate() {
        for joint in 1..=4 {
            let t = joint as f32;
            let (x, y) = if finger == 0 {
                (base_x - 0.04 * t, 0.78 - 0.06 * t)
            } else {
                (*base_x + (base_x - 0.5) * 0.1 * t, 0.65 - 0.08 * t)
            };
            landmarks.push(HandLandmark::new(x, y, -0.01 * t));
        }
    }

    landmarks
}

/// What a [`MockHandDetector`] answers with
#[derive(Debug, Clone)]
pub enum MockResponse {
    Hand(RawHandDetection),
    NoHand,
    Fail(String),
}

/// Scripted detector for tests and demos without a real landmark model
pub struct MockHandDetector {
    response: parking_lot::Mutex<MockResponse>,
    delay: Option<Duration>,
    operational: AtomicBool,
    calls: AtomicUsize,
    options: parking_lot::Mutex<Option<DetectorOptions>>,
}

impl MockHandDetector {
    pub fn new(response: MockResponse) -> Self {
        Self {
            response: parking_lot::Mutex::new(response),
            delay: None,
            operational: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            options: parking_lot::Mutex::new(None),
        }
    }

    /// Detector that always reports the synthetic open hand
    pub fn with_synthetic_hand(score: f32) -> Self {
        Self::new(MockResponse::Hand(RawHandDetection {
            landmarks: synthetic_landmarks(),
            handedness: Handedness::Right,
            score,
        }))
    }

    /// Detector that always reports the given landmarks
    pub fn with_landmarks(landmarks: Vec<HandLandmark>, score: f32) -> Self {
        Self::new(MockResponse::Hand(RawHandDetection {
            landmarks,
            handedness: Handedness::Right,
            score,
        }))
    }

    /// Delay every detection, simulating a slow model
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_response(&self, response: MockResponse) {
        *self.response.lock() = response;
    }

    pub fn set_operational(&self, operational: bool) {
        self.operational.store(operational, Ordering::Relaxed);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn options(&self) -> Option<DetectorOptions> {
        self.options.lock().clone()
    }
}

#[async_trait]
impl HandDetector for MockHandDetector {
    fn name(&self) -> &str {
        "mock"
    }

    fn configure(&self, options: &DetectorOptions) -> Result<(), LandmarkError> {
        *self.options.lock() = Some(options.clone());
        Ok(())
    }

    fn is_operational(&self) -> bool {
        self.operational.load(Ordering::Relaxed)
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<RawHandDetection>, LandmarkError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!("Mock detector invoked for frame {}", frame.id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.response.lock().clone();
        match response {
            MockResponse::Hand(raw) => Ok(Some(raw)),
            MockResponse::NoHand => Ok(None),
            MockResponse::Fail(details) => Err(LandmarkError::Detection { details }),
        }
    }
}

/// Factory handing out a shared mock detector, or failing on demand
pub struct MockDetectorFactory {
    detector: Option<Arc<MockHandDetector>>,
    failure: Option<LandmarkError>,
    creations: AtomicUsize,
}

impl MockDetectorFactory {
    pub fn succeeding(detector: Arc<MockHandDetector>) -> Self {
        Self {
            detector: Some(detector),
            failure: None,
            creations: AtomicUsize::new(0),
        }
    }

    pub fn failing(failure: LandmarkError) -> Self {
        Self {
            detector: None,
            failure: Some(failure),
            creations: AtomicUsize::new(0),
        }
    }

    /// Number of times `create` has been called
    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HandDetectorFactory for MockDetectorFactory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(&self) -> Result<Arc<dyn HandDetector>, LandmarkError> {
        self.creations.fetch_add(1, Ordering::Relaxed);

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        match &self.detector {
            Some(detector) => Ok(Arc::clone(detector) as Arc<dyn HandDetector>),
            None => Err(LandmarkError::Initialization {
                details: "mock factory has no detector".to_string(),
            }),
        }
    }
}
