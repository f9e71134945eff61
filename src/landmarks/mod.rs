mod detector;
mod heuristic;
mod provider;
mod status;
mod types;

pub use detector::{
    synthetic_landmarks, DetectorOptions, HandDetector, HandDetectorFactory, MockDetectorFactory,
    MockHandDetector, MockResponse,
};
pub use heuristic::{SkinColorDetector, SkinScan};
pub use provider::{LandmarkProvider, SelfTestReport};
pub use status::{ProviderError, ProviderErrorKind, ServiceStatus};
pub use types::*;
