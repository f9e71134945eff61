use crate::config::{HeuristicConfig, LandmarkConfig};
use crate::error::LandmarkError;
use crate::frame::Frame;
use crate::landmarks::detector::{DetectorOptions, HandDetector, HandDetectorFactory};
use crate::landmarks::heuristic::SkinColorDetector;
use crate::landmarks::status::{ProviderError, ProviderState, ServiceStatus};
use crate::landmarks::types::{HandDetectionResult, RawHandDetection, LANDMARK_COUNT};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Outcome of [`LandmarkProvider::self_test`]
#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub success: bool,
    pub message: String,
}

/// Produces 21-point hand landmarks from frames.
///
/// Wraps a primary learned detector built by a [`HandDetectorFactory`] and a
/// skin-colour backup. After `max_attempts` failed initializations the
/// provider stays in fallback mode, where only the backup runs, until
/// [`retry_initialization`](Self::retry_initialization) is called. No method
/// returns an error; failures are recorded in the status instead.
pub struct LandmarkProvider {
    config: LandmarkConfig,
    factory: Arc<dyn HandDetectorFactory>,
    backup: SkinColorDetector,
    detector: parking_lot::Mutex<Option<Arc<dyn HandDetector>>>,
    state: parking_lot::Mutex<ProviderState>,
    init_gate: tokio::sync::Mutex<()>,
}

impl LandmarkProvider {
    pub fn new(
        config: LandmarkConfig,
        heuristic: HeuristicConfig,
        factory: Arc<dyn HandDetectorFactory>,
    ) -> Self {
        let max_attempts = config.max_attempts;
        Self {
            config,
            factory,
            backup: SkinColorDetector::new(heuristic),
            detector: parking_lot::Mutex::new(None),
            state: parking_lot::Mutex::new(ProviderState::new(max_attempts)),
            init_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Try to bring up the primary detector. Resolves to whether it is ready.
    pub async fn initialize(&self) -> bool {
        if self.is_ready() {
            return true;
        }

        let _gate = match self.init_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                // Another caller is mid-attempt; report its outcome
                let _waited = self.init_gate.lock().await;
                return self.is_ready();
            }
        };

        if self.is_ready() {
            return true;
        }

        let attempt = {
            let mut state = self.state.lock();
            if state.attempts_exhausted() {
                state.enter_fallback();
                info!("Landmark detector initialization skipped after maximum attempts - using fallback mode");
                return false;
            }
            state.begin_attempt()
        };

        info!(
            "Landmark detector initialization attempt {}/{} using {}",
            attempt,
            self.config.max_attempts,
            self.factory.name()
        );

        match self.create_detector().await {
            Ok(detector) => {
                info!("Landmark detector '{}' initialized successfully", detector.name());
                *self.detector.lock() = Some(detector);
                self.state.lock().attempt_succeeded();
                true
            }
            Err(e) => {
                let error = ProviderError::from_initialization(&e, attempt);
                debug!("{}", error.message);

                let exhausted = self.state.lock().attempt_failed(error);
                if exhausted {
                    info!("Landmark fallback mode activated - skin colour heuristic will be used");
                } else {
                    debug!("Landmark initialization attempt {} failed, will retry", attempt);
                }
                false
            }
        }
    }

    async fn create_detector(&self) -> Result<Arc<dyn HandDetector>, LandmarkError> {
        let detector = self.factory.create().await?;
        detector.configure(&DetectorOptions::from(&self.config))?;

        if !detector.is_operational() {
            return Err(LandmarkError::Initialization {
                details: format!("detector '{}' is not properly initialized", detector.name()),
            });
        }

        Ok(detector)
    }

    fn is_ready(&self) -> bool {
        self.state.lock().is_initialized() && self.detector.lock().is_some()
    }

    /// Detect one hand in the frame. `None` covers "no hand" and every
    /// failure path.
    pub async fn detect_hand_landmarks(&self, frame: &Frame) -> Option<HandDetectionResult> {
        if self.is_in_fallback_mode() {
            trace!("Landmark provider in fallback mode - using skin colour heuristic");
            return self.detect_with_backup(frame);
        }

        self.ensure_health().await;

        if self.is_in_fallback_mode() {
            return self.detect_with_backup(frame);
        }

        let detector = match self.detector.lock().clone() {
            Some(detector) => detector,
            None => {
                debug!("Primary landmark detector unavailable, no hand detection possible");
                return None;
            }
        };

        let timeout = self.config.detection_timeout();
        match tokio::time::timeout(timeout, detector.detect(frame)).await {
            Ok(Ok(Some(raw))) => self.accept(raw),
            Ok(Ok(None)) => {
                trace!("No hand landmarks detected in frame {}", frame.id);
                None
            }
            Ok(Err(e)) => self.handle_detection_failure(frame, e),
            Err(_) => self.handle_detection_failure(frame, LandmarkError::Timeout { timeout }),
        }
    }

    fn accept(&self, raw: RawHandDetection) -> Option<HandDetectionResult> {
        if raw.landmarks.len() != LANDMARK_COUNT {
            debug!(
                "Discarding detection with {} landmarks (expected {})",
                raw.landmarks.len(),
                LANDMARK_COUNT
            );
            return None;
        }

        if !(raw.score > self.config.min_detection_confidence) {
            debug!("Hand detection confidence too low: {:.3}", raw.score);
            return None;
        }

        let confidence = raw.score.max(self.config.confidence_minimum);
        let result = HandDetectionResult::new(raw.landmarks, raw.handedness, confidence)?;
        debug!(
            "Hand detected: confidence {:.2}, handedness {:?}",
            result.confidence, result.handedness
        );
        Some(result)
    }

    fn handle_detection_failure(&self, frame: &Frame, error: LandmarkError) -> Option<HandDetectionResult> {
        debug!("Primary landmark detection failed on frame {}: {}", frame.id, error);
        self.state
            .lock()
            .record_detection_error(ProviderError::from_detection(&error), Instant::now());

        let result = self.detect_with_backup(frame);
        if result.is_some() {
            debug!("Skin colour heuristic recovered a hand for frame {}", frame.id);
        }
        result
    }

    fn detect_with_backup(&self, frame: &Frame) -> Option<HandDetectionResult> {
        self.backup.detect(frame)
    }

    /// Re-initialize when the detector is missing, broken, or failing in bursts
    async fn ensure_health(&self) {
        let detector = self.detector.lock().clone();

        match detector {
            None => {
                debug!("Landmark detector not initialized, attempting initialization");
                self.initialize().await;
                return;
            }
            Some(detector) if !detector.is_operational() => {
                warn!(
                    "Landmark detector '{}' appears broken, resetting",
                    detector.name()
                );
                self.reset_detector();
                self.initialize().await;
                return;
            }
            Some(_) => {}
        }

        let recent = self
            .state
            .lock()
            .recent_error_count(self.config.error_window(), Instant::now());
        if recent > self.config.error_burst_threshold {
            warn!(
                "{} landmark errors within {:?}, resetting detector",
                recent,
                self.config.error_window()
            );
            self.reset_detector();
            self.initialize().await;
        }
    }

    fn reset_detector(&self) {
        *self.detector.lock() = None;
        self.state.lock().mark_uninitialized();
    }

    /// Clear attempts, errors and fallback mode, then initialize again
    pub async fn retry_initialization(&self) -> bool {
        info!("Retrying landmark detector initialization");
        {
            let _gate = self.init_gate.lock().await;
            *self.detector.lock() = None;
            self.state.lock().reset();
        }
        self.initialize().await
    }

    pub fn status(&self) -> ServiceStatus {
        self.state.lock().snapshot()
    }

    pub fn last_error(&self) -> Option<ProviderError> {
        self.state.lock().last_error().cloned()
    }

    pub fn is_in_fallback_mode(&self) -> bool {
        self.state.lock().is_fallback()
    }

    pub fn initialization_attempts(&self) -> u32 {
        self.state.lock().attempts()
    }

    /// Check that a working primary detector can be obtained
    pub async fn self_test(&self) -> SelfTestReport {
        if self.is_in_fallback_mode() {
            return SelfTestReport {
                success: false,
                message: "Landmark provider is in fallback mode".to_string(),
            };
        }

        if !self.is_ready() && !self.initialize().await {
            return SelfTestReport {
                success: false,
                message: "Landmark detector initialization failed".to_string(),
            };
        }

        match self.detector.lock().as_ref() {
            Some(detector) if detector.is_operational() => SelfTestReport {
                success: true,
                message: format!("Landmark detector '{}' is working correctly", detector.name()),
            },
            Some(detector) => SelfTestReport {
                success: false,
                message: format!("Landmark detector '{}' is not operational", detector.name()),
            },
            None => SelfTestReport {
                success: false,
                message: "Landmark detector instance not created".to_string(),
            },
        }
    }
}
