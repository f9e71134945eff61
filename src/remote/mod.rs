mod client;
mod detector;
mod mock;
mod types;

pub use client::{HttpRemoteClassifier, RemoteClassifier};
pub use detector::{RemoteLandmarkDetector, RemoteLandmarkDetectorFactory};
pub use mock::MockRemoteClassifier;
pub use types::{DetectionRequest, ExtractLandmarksResponse, RemoteDetection, RemoteStatus};
