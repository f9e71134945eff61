use crate::error::{LandmarkError, RemoteError};
use crate::frame::Frame;
use crate::landmarks::{DetectorOptions, HandDetector, HandDetectorFactory, RawHandDetection};
use crate::remote::client::{HttpRemoteClassifier, RemoteClassifier};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Score reported when the service finds a hand but sends no score
const DEFAULT_REMOTE_SCORE: f32 = 1.0;

/// Primary hand detector backed by the remote landmark extraction endpoint
pub struct RemoteLandmarkDetector {
    client: Arc<HttpRemoteClassifier>,
    options: Mutex<Option<DetectorOptions>>,
    operational: AtomicBool,
}

impl RemoteLandmarkDetector {
    pub fn new(client: Arc<HttpRemoteClassifier>) -> Self {
        Self {
            client,
            options: Mutex::new(None),
            operational: AtomicBool::new(true),
        }
    }

    pub fn options(&self) -> Option<DetectorOptions> {
        self.options.lock().clone()
    }
}

#[async_trait]
impl HandDetector for RemoteLandmarkDetector {
    fn name(&self) -> &str {
        "remote"
    }

    fn configure(&self, options: &DetectorOptions) -> Result<(), LandmarkError> {
        if options.max_num_hands == 0 {
            return Err(LandmarkError::Initialization {
                details: "max_num_hands must be at least 1".to_string(),
            });
        }
        *self.options.lock() = Some(options.clone());
        Ok(())
    }

    fn is_operational(&self) -> bool {
        self.operational.load(Ordering::Relaxed)
    }

    async fn detect(&self, frame: &Frame) -> Result<Option<RawHandDetection>, LandmarkError> {
        let reply = match self.client.extract_landmarks(frame).await {
            Ok(reply) => reply,
            Err(e @ (RemoteError::Unavailable { .. } | RemoteError::Disabled)) => {
                warn!("Remote landmark service lost: {}", e);
                self.operational.store(false, Ordering::Relaxed);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let Some(landmarks) = reply.hand_landmarks() else {
            debug!(
                "Remote extraction found no hand in frame {}: {}",
                frame.id,
                reply.message.as_deref().unwrap_or("no landmarks")
            );
            return Ok(None);
        };

        Ok(Some(RawHandDetection {
            handedness: reply.handedness(),
            score: reply.score.unwrap_or(DEFAULT_REMOTE_SCORE),
            landmarks,
        }))
    }
}

/// Creates [`RemoteLandmarkDetector`]s after confirming the service is up
pub struct RemoteLandmarkDetectorFactory {
    client: Arc<HttpRemoteClassifier>,
}

impl RemoteLandmarkDetectorFactory {
    pub fn new(client: Arc<HttpRemoteClassifier>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HandDetectorFactory for RemoteLandmarkDetectorFactory {
    fn name(&self) -> &str {
        "remote"
    }

    async fn create(&self) -> Result<Arc<dyn HandDetector>, LandmarkError> {
        if !self.client.config().enabled {
            return Err(LandmarkError::Initialization {
                details: "remote landmark service is disabled".to_string(),
            });
        }

        if !self.client.check_health().await {
            return Err(LandmarkError::Network {
                details: format!(
                    "remote landmark service unreachable at {}",
                    self.client.base_url()
                ),
            });
        }

        Ok(Arc::new(RemoteLandmarkDetector::new(Arc::clone(&self.client))))
    }
}
