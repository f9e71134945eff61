use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Landmark error: {0}")]
    Landmark(#[from] LandmarkError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SignError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by hand-landmark detectors and their factories
#[derive(Error, Debug, Clone)]
pub enum LandmarkError {
    #[error("Detector initialization failed: {details}")]
    Initialization { details: String },

    #[error("Detector loading failed: {details}")]
    Loading { details: String },

    #[error("Detection failed: {details}")]
    Detection { details: String },

    #[error("Detection timed out after {timeout:?}")]
    Timeout { timeout: std::time::Duration },

    #[error("Network error: {details}")]
    Network { details: String },

    #[error("Detector is not operational")]
    NotOperational,
}

/// Errors raised by the local learned classifiers
#[derive(Error, Debug, Clone)]
pub enum ClassifierError {
    #[error("Input length mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Invalid model weights: {details}")]
    InvalidWeights { details: String },

    #[error("Model has no output classes")]
    EmptyOutput,
}

/// Errors raised while talking to the remote inference service
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    #[error("Remote service unavailable at {url}")]
    Unavailable { url: String },

    #[error("Request to {url} failed: {details}")]
    Request { url: String, details: String },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout {
        url: String,
        timeout: std::time::Duration,
    },

    #[error("Unexpected response from {url}: {details}")]
    InvalidResponse { url: String, details: String },

    #[error("Remote classifier reported an error: {message}")]
    Rejected { message: String },

    #[error("Remote service disabled")]
    Disabled,
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

impl From<RemoteError> for LandmarkError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Timeout { timeout, .. } => LandmarkError::Timeout { timeout },
            RemoteError::Unavailable { url } => LandmarkError::Network {
                details: format!("remote landmark service unavailable at {}", url),
            },
            RemoteError::Request { details, .. } => LandmarkError::Network { details },
            other => LandmarkError::Detection {
                details: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SignError>;
