use crate::config::SignConfig;
use crate::error::{Result, SignError};
use crate::events::{EventBus, PipelineEvent};
use crate::frame::Frame;
use crate::health::{HealthCheckResult, StatusReport};
use crate::landmarks::{HandDetectionResult, LandmarkProvider};
use crate::models::{LoadedModels, ModelManager};
use crate::pipeline::result::{DetectionResult, Method};
use crate::pipeline::strategy::{default_cascade, DetectionContext, DetectionStrategy};
use crate::remote::{HttpRemoteClassifier, RemoteClassifier, RemoteLandmarkDetectorFactory};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, trace, warn};

/// Holds the single-flight flag for the duration of one run
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs frames through the landmark stage and the strategy cascade.
///
/// At most one run is in flight per orchestrator; a frame arriving while
/// busy is dropped with a [`Method::Busy`] result. `detect` never fails.
pub struct DetectionOrchestrator {
    config: SignConfig,
    provider: Arc<LandmarkProvider>,
    models: Arc<ModelManager>,
    remote: Arc<dyn RemoteClassifier>,
    strategies: Vec<Box<dyn DetectionStrategy>>,
    event_bus: Option<EventBus>,
    busy: AtomicBool,
    frames_processed: AtomicU64,
    busy_drops: AtomicU64,
}

impl DetectionOrchestrator {
    /// Wire the production pipeline: HTTP remote classifier, remote landmark
    /// detector and skin-colour backup
    pub fn from_config(config: SignConfig, event_bus: Option<EventBus>) -> Result<Self> {
        let client = Arc::new(HttpRemoteClassifier::new(config.remote.clone()));
        let factory = Arc::new(RemoteLandmarkDetectorFactory::new(Arc::clone(&client)));
        let provider = Arc::new(LandmarkProvider::new(
            config.landmarks.clone(),
            config.heuristic.clone(),
            factory,
        ));
        let remote: Arc<dyn RemoteClassifier> = client;

        let mut builder = DetectionOrchestratorBuilder::new()
            .config(config)
            .provider(provider)
            .remote(remote);
        if let Some(bus) = event_bus {
            builder = builder.event_bus(bus);
        }

        builder.build()
    }

    pub fn builder() -> DetectionOrchestratorBuilder {
        DetectionOrchestratorBuilder::new()
    }

    /// Classify one frame
    pub async fn detect(&self, frame: &Frame) -> DetectionResult {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            self.busy_drops.fetch_add(1, Ordering::Relaxed);
            trace!("Detection in progress, dropping frame {}", frame.id);
            return DetectionResult::busy();
        };

        let models = self.models.ensure_loaded().await;
        let started = Instant::now();

        let hand = self.provider.detect_hand_landmarks(frame).await;
        let result = self.run_cascade(frame, hand, models, started).await;

        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.publish(frame.id, &result);
        result
    }

    async fn run_cascade(
        &self,
        frame: &Frame,
        hand: Option<HandDetectionResult>,
        models: &LoadedModels,
        started: Instant,
    ) -> DetectionResult {
        match &hand {
            None if !self.config.pipeline.image_fallback_without_landmarks => {
                trace!("No hand in frame {}", frame.id);
                return DetectionResult::empty(None, started);
            }
            Some(hand) if hand.confidence < self.config.pipeline.hand_confidence_floor => {
                debug!(
                    "Hand confidence {:.3} below floor, skipping classification",
                    hand.confidence
                );
                return DetectionResult::empty(Some(hand.landmarks().to_vec()), started);
            }
            _ => {}
        }

        let landmarks = hand.as_ref().map(|h| h.landmarks().to_vec());
        let ctx = DetectionContext {
            frame,
            hand: hand.as_ref(),
            models,
        };

        for strategy in &self.strategies {
            if !strategy.requirement().satisfied(ctx.hand.is_some()) {
                continue;
            }

            match strategy.attempt(&ctx).await {
                Ok(Some(candidate)) if strategy.accepts(&candidate) => {
                    debug!(
                        "Frame {}: '{}' ({:.3}) via {}",
                        frame.id,
                        candidate.gesture,
                        candidate.confidence,
                        strategy.method()
                    );
                    return DetectionResult::new(
                        candidate.gesture,
                        candidate.confidence,
                        landmarks,
                        started,
                        strategy.method(),
                        strategy.source(),
                    );
                }
                Ok(Some(candidate)) => {
                    debug!(
                        "{} declined '{}' at {:.3}",
                        strategy.method(),
                        candidate.gesture,
                        candidate.confidence
                    );
                }
                Ok(None) => trace!("{} produced nothing", strategy.method()),
                Err(SignError::Remote(e)) => debug!("{} declined: {}", strategy.method(), e),
                Err(e) => {
                    warn!("{} failed on frame {}: {}", strategy.method(), frame.id, e);
                    self.emit(PipelineEvent::SystemError {
                        component: strategy.method().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        DetectionResult::empty(landmarks, started)
    }

    fn publish(&self, frame_id: u64, result: &DetectionResult) {
        if !self.event_bus.as_ref().is_some_and(EventBus::has_subscribers) {
            return;
        }

        self.emit(PipelineEvent::DetectionCompleted {
            frame_id,
            result: result.clone(),
            timestamp: SystemTime::now(),
        });
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            if let Err(e) = bus.publish(event) {
                debug!("Pipeline event not delivered: {}", e);
            }
        }
    }

    /// Methods usable right now; loads models if needed
    pub async fn available_methods(&self) -> Vec<Method> {
        self.models.ensure_loaded().await.available_methods()
    }

    pub fn provider(&self) -> &Arc<LandmarkProvider> {
        &self.provider
    }

    pub fn models(&self) -> &Arc<ModelManager> {
        &self.models
    }

    pub fn remote(&self) -> &Arc<dyn RemoteClassifier> {
        &self.remote
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn busy_drops(&self) -> u64 {
        self.busy_drops.load(Ordering::Relaxed)
    }

    pub fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::evaluate(
            &self.provider.status(),
            &self.remote.status(),
            self.models.get(),
        )
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            health: self.health_check(),
            provider: self.provider.status(),
            remote: self.remote.status(),
            models: self.models.get().map(LoadedModels::summary),
        }
    }
}

/// Builder for [`DetectionOrchestrator`]
pub struct DetectionOrchestratorBuilder {
    config: Option<SignConfig>,
    provider: Option<Arc<LandmarkProvider>>,
    remote: Option<Arc<dyn RemoteClassifier>>,
    strategies: Option<Vec<Box<dyn DetectionStrategy>>>,
    event_bus: Option<EventBus>,
}

impl DetectionOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            provider: None,
            remote: None,
            strategies: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: SignConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn provider(mut self, provider: Arc<LandmarkProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteClassifier>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Replace the default cascade
    pub fn strategies(mut self, strategies: Vec<Box<dyn DetectionStrategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<DetectionOrchestrator> {
        let config = self.config.unwrap_or_default();
        let provider = self
            .provider
            .ok_or_else(|| SignError::component("orchestrator", "Landmark provider is required"))?;
        let remote = self
            .remote
            .ok_or_else(|| SignError::component("orchestrator", "Remote classifier is required"))?;

        let strategies = self.strategies.unwrap_or_else(|| {
            default_cascade(
                &config.pipeline,
                &config.geometry,
                config.models.image_input_size,
                Arc::clone(&remote),
            )
        });
        if strategies.is_empty() {
            warn!("Detection cascade has no strategies, every frame will come back empty");
        }

        let mut models = ModelManager::new(
            config.models.clone(),
            Arc::clone(&provider),
            Arc::clone(&remote),
            config.remote.enabled,
            config.remote.discovery_budget(),
        );
        if let Some(bus) = &self.event_bus {
            models = models.with_event_bus(bus.clone());
        }

        info!(
            "Detection orchestrator ready with {} strategies",
            strategies.len()
        );

        Ok(DetectionOrchestrator {
            config,
            provider,
            models: Arc::new(models),
            remote,
            strategies,
            event_bus: self.event_bus,
            busy: AtomicBool::new(false),
            frames_processed: AtomicU64::new(0),
            busy_drops: AtomicU64::new(0),
        })
    }
}

impl Default for DetectionOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
