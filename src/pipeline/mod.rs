mod orchestrator;
mod result;
mod runner;
mod strategy;
#[cfg(test)]
mod tests;

pub use orchestrator::{DetectionOrchestrator, DetectionOrchestratorBuilder};
pub use result::{DetectionResult, Method, Source};
pub use runner::{DetectionLoop, LoopStats};
pub use strategy::{
    default_cascade, Candidate, DetectionContext, DetectionStrategy, LocalImageStrategy,
    LocalLandmarkStrategy, NumeralStrategy, RemoteImageStrategy, RemoteLandmarkStrategy,
    Requirement, TwoFingerStrategy,
};
