use crate::classifier::{
    emergency_architecture, image_architecture, landmark_architecture, DenseNetwork,
    NetworkClassifier, SignClassifier,
};
use crate::config::ModelConfig;
use crate::error::ClassifierError;
use crate::events::{EventBus, PipelineEvent};
use crate::landmarks::LandmarkProvider;
use crate::pipeline::Method;
use crate::remote::RemoteClassifier;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// The only compute backend this build supports
pub const DEFAULT_BACKEND: &str = "ndarray";

const EMERGENCY_LABELS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Everything the orchestrator needs after loading
pub struct LoadedModels {
    pub backend: String,
    pub provider_ready: bool,
    pub remote_available: bool,
    landmark_classifier: Option<Arc<dyn SignClassifier>>,
    image_classifier: Option<Arc<dyn SignClassifier>>,
    emergency: bool,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedModels {
    /// Landmark classifier, or the emergency classifier standing in for it
    pub fn landmark_classifier(&self) -> Option<&Arc<dyn SignClassifier>> {
        self.landmark_classifier.as_ref()
    }

    pub fn image_classifier(&self) -> Option<&Arc<dyn SignClassifier>> {
        self.image_classifier.as_ref()
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Methods the cascade can currently use; geometry is always available
    pub fn available_methods(&self) -> Vec<Method> {
        let mut methods = Vec::new();
        if self.remote_available {
            methods.push(Method::RemoteLandmarks);
        }
        methods.push(Method::TwoFingerGeometry);
        if self.landmark_classifier.is_some() {
            methods.push(Method::LocalLandmarks);
        }
        if self.remote_available {
            methods.push(Method::RemoteImage);
        }
        if self.image_classifier.is_some() {
            methods.push(Method::LocalImage);
        }
        methods.push(Method::NumeralGeometry);
        methods
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            backend: self.backend.clone(),
            provider_ready: self.provider_ready,
            remote_available: self.remote_available,
            landmark_classifier: self.landmark_classifier.as_ref().map(|c| describe(c.as_ref())),
            image_classifier: self.image_classifier.as_ref().map(|c| describe(c.as_ref())),
            emergency: self.emergency,
            available_methods: self
                .available_methods()
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            loaded_at: self.loaded_at,
        }
    }
}

/// Serializable view of [`LoadedModels`]
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub backend: String,
    pub provider_ready: bool,
    pub remote_available: bool,
    pub landmark_classifier: Option<ClassifierSummary>,
    pub image_classifier: Option<ClassifierSummary>,
    pub emergency: bool,
    pub available_methods: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifierSummary {
    pub name: String,
    pub input_len: usize,
    pub pretrained: bool,
}

fn describe(classifier: &dyn SignClassifier) -> ClassifierSummary {
    ClassifierSummary {
        name: classifier.name().to_string(),
        input_len: classifier.input_len(),
        pretrained: classifier.is_pretrained(),
    }
}

/// Loads the backend, landmark provider and classifiers exactly once
pub struct ModelManager {
    config: ModelConfig,
    provider: Arc<LandmarkProvider>,
    remote: Arc<dyn RemoteClassifier>,
    remote_enabled: bool,
    remote_timeout: Duration,
    event_bus: Option<EventBus>,
    loaded: OnceCell<LoadedModels>,
}

impl ModelManager {
    pub fn new(
        config: ModelConfig,
        provider: Arc<LandmarkProvider>,
        remote: Arc<dyn RemoteClassifier>,
        remote_enabled: bool,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            config,
            provider,
            remote,
            remote_enabled,
            remote_timeout,
            event_bus: None,
            loaded: OnceCell::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    pub fn get(&self) -> Option<&LoadedModels> {
        self.loaded.get()
    }

    /// Load everything on first call; concurrent callers share that load
    pub async fn ensure_loaded(&self) -> &LoadedModels {
        self.loaded.get_or_init(|| self.load()).await
    }

    async fn load(&self) -> LoadedModels {
        info!("Loading sign detection models");

        let backend = select_backend(&self.config.backend);

        let provider_ready = self.provider.initialize().await;
        if provider_ready {
            info!("Landmark provider ready");
        } else {
            warn!("Landmark provider unavailable, continuing without primary detector");
            if self.provider.is_in_fallback_mode() {
                self.emit(PipelineEvent::FallbackModeEntered {
                    attempts: self.provider.initialization_attempts(),
                });
            }
        }

        let remote_available = self.probe_remote().await;

        let labels = self.config.label_list();
        let landmark_classifier = load_classifier(
            "landmark",
            &self.config.landmark_model_path,
            landmark_architecture(labels.len()),
            labels.clone(),
        )
        .await;
        let image_classifier = load_classifier(
            "image",
            &self.config.image_model_path,
            image_architecture(self.config.image_input_size, labels.len()),
            labels,
        )
        .await;

        let emergency = landmark_classifier.is_none() && image_classifier.is_none();
        let landmark_classifier = if emergency {
            warn!("No classifier could be loaded, building emergency classifier");
            build_emergency()
        } else {
            landmark_classifier
        };

        let models = LoadedModels {
            backend,
            provider_ready,
            remote_available,
            landmark_classifier,
            image_classifier,
            emergency,
            loaded_at: Utc::now(),
        };

        self.emit(PipelineEvent::ModelsLoaded {
            backend: models.backend.clone(),
            remote_available,
            methods: models.summary().available_methods,
        });

        models
    }

    async fn probe_remote(&self) -> bool {
        if !self.remote_enabled {
            debug!("Remote classifier disabled");
            return false;
        }

        match tokio::time::timeout(self.remote_timeout, self.remote.discover()).await {
            Ok(true) => {
                info!("Remote classifier available");
                true
            }
            Ok(false) => {
                info!("Remote classifier not available, using local classifiers");
                false
            }
            Err(_) => {
                warn!("Remote classifier discovery timed out after {:?}", self.remote_timeout);
                false
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.event_bus {
            if let Err(e) = bus.publish(event) {
                debug!("Model event not delivered: {}", e);
            }
        }
    }
}

/// Pick the compute backend and warm it up with a tiny product
fn select_backend(requested: &str) -> String {
    if !requested.eq_ignore_ascii_case(DEFAULT_BACKEND) {
        warn!(
            "Compute backend '{}' is not supported, using {}",
            requested, DEFAULT_BACKEND
        );
    }

    let identity = Array2::<f32>::eye(4);
    let product = identity.dot(&Array2::<f32>::ones((4, 4)));
    if (product.sum() - 16.0).abs() > f32::EPSILON {
        warn!("Compute backend warm-up produced an unexpected result");
    } else {
        debug!("Compute backend {} warmed up", DEFAULT_BACKEND);
    }

    DEFAULT_BACKEND.to_string()
}

/// Load pretrained weights, or construct an untrained network of the same
/// shape. `None` only when even construction fails.
async fn load_classifier(
    name: &str,
    path: &str,
    architecture: Vec<usize>,
    labels: Vec<String>,
) -> Option<Arc<dyn SignClassifier>> {
    if Path::new(path).exists() {
        match read_pretrained(name, path, &architecture, labels.clone()).await {
            Ok(classifier) => {
                info!("Loaded pretrained {} classifier from {}", name, path);
                return Some(Arc::new(classifier));
            }
            Err(e) => warn!("Failed to load {} classifier from {}: {}", name, path, e),
        }
    } else {
        info!("No {} classifier weights at {}, constructing untrained network", name, path);
    }

    match construct_untrained(name, &architecture, labels) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            warn!("Could not construct {} classifier: {}", name, e);
            None
        }
    }
}

async fn read_pretrained(
    name: &str,
    path: &str,
    architecture: &[usize],
    labels: Vec<String>,
) -> Result<NetworkClassifier, ClassifierError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ClassifierError::InvalidWeights {
            details: e.to_string(),
        })?;
    let network = DenseNetwork::from_json(&json)?;

    let expected_inputs = architecture.first().copied().unwrap_or(0);
    if network.input_len() != expected_inputs {
        return Err(ClassifierError::ShapeMismatch {
            expected: expected_inputs,
            actual: network.input_len(),
        });
    }

    NetworkClassifier::new(name, network, labels, true)
}

fn construct_untrained(
    name: &str,
    architecture: &[usize],
    labels: Vec<String>,
) -> Result<NetworkClassifier, ClassifierError> {
    let network = DenseNetwork::glorot(architecture, &mut rand::thread_rng())?;
    NetworkClassifier::new(name, network, labels, false)
}

fn build_emergency() -> Option<Arc<dyn SignClassifier>> {
    let labels: Vec<String> = EMERGENCY_LABELS.chars().map(|c| c.to_string()).collect();
    match construct_untrained("emergency", &emergency_architecture(labels.len()), labels) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            warn!("Emergency classifier construction failed: {}", e);
            None
        }
    }
}
