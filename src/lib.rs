pub mod classifier;
pub mod confidence;
pub mod config;
pub mod error;
pub mod events;
pub mod features;
pub mod frame;
pub mod geometry;
pub mod health;
pub mod landmarks;
pub mod models;
pub mod pipeline;
pub mod remote;

pub use classifier::{DenseNetwork, NetworkClassifier, Prediction, SignClassifier};
pub use confidence::normalize_confidence;
pub use config::SignConfig;
pub use error::{ClassifierError, LandmarkError, RemoteError, Result, SignError};
pub use events::{EventBus, EventFilter, EventReceiver, PipelineEvent};
pub use features::{extract_feature_vector, normalize_features};
pub use frame::Frame;
pub use geometry::{detect_number_from_landmarks, detect_two_finger_sign, GeometricMatch};
pub use health::{HealthCheckResult, HealthStatus, StatusReport};
pub use landmarks::{HandDetectionResult, HandLandmark, LandmarkProvider, ServiceStatus};
pub use models::{LoadedModels, ModelManager};
pub use pipeline::{DetectionLoop, DetectionOrchestrator, DetectionResult, Method, Source};
pub use remote::{HttpRemoteClassifier, RemoteClassifier, RemoteDetection};
