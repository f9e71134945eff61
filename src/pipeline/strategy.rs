use crate::classifier::preprocess_image;
use crate::confidence::normalize_confidence;
use crate::config::{GeometryConfig, PipelineConfig};
use crate::error::{ClassifierError, SignError};
use crate::features::feature_vector;
use crate::frame::Frame;
use crate::geometry::{detect_number_from_landmarks, detect_two_finger_sign};
use crate::landmarks::HandDetectionResult;
use crate::models::LoadedModels;
use crate::pipeline::result::{Method, Source};
use crate::remote::{RemoteClassifier, RemoteDetection};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// What a strategy needs from the landmark stage before it can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Landmarks,
    NoLandmarks,
}

impl Requirement {
    pub fn satisfied(&self, has_landmarks: bool) -> bool {
        match self {
            Requirement::Landmarks => has_landmarks,
            Requirement::NoLandmarks => !has_landmarks,
        }
    }
}

/// Inputs shared by every strategy for one frame
pub struct DetectionContext<'a> {
    pub frame: &'a Frame,
    pub hand: Option<&'a HandDetectionResult>,
    pub models: &'a LoadedModels,
}

impl<'a> DetectionContext<'a> {
    fn hand(&self) -> Result<&'a HandDetectionResult, SignError> {
        self.hand
            .ok_or_else(|| SignError::component("pipeline", "strategy requires landmarks"))
    }
}

/// A proposed sign before the orchestrator applies the floor
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub gesture: String,
    pub confidence: f32,
}

impl Candidate {
    pub fn new(gesture: impl Into<String>, confidence: f32) -> Self {
        Self {
            gesture: gesture.into(),
            confidence,
        }
    }
}

/// One step of the detection cascade
#[async_trait]
pub trait DetectionStrategy: Send + Sync {
    fn method(&self) -> Method;

    fn source(&self) -> Source {
        Source::Client
    }

    /// Candidates must exceed this confidence; `None` accepts any candidate
    fn floor(&self) -> Option<f32>;

    fn requirement(&self) -> Requirement;

    /// `Ok(None)` means the strategy had nothing to say about the frame
    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError>;

    fn accepts(&self, candidate: &Candidate) -> bool {
        match self.floor() {
            Some(floor) => candidate.confidence > floor,
            None => true,
        }
    }
}

fn remote_candidate(reply: RemoteDetection) -> Option<Candidate> {
    if reply.has_sign() {
        Some(Candidate::new(reply.letter.trim(), reply.confidence))
    } else {
        debug!("Remote classifier returned no usable sign");
        None
    }
}

pub struct RemoteLandmarkStrategy {
    remote: Arc<dyn RemoteClassifier>,
    floor: f32,
}

impl RemoteLandmarkStrategy {
    pub fn new(remote: Arc<dyn RemoteClassifier>, floor: f32) -> Self {
        Self { remote, floor }
    }
}

#[async_trait]
impl DetectionStrategy for RemoteLandmarkStrategy {
    fn method(&self) -> Method {
        Method::RemoteLandmarks
    }

    fn source(&self) -> Source {
        Source::Backend
    }

    fn floor(&self) -> Option<f32> {
        Some(self.floor)
    }

    fn requirement(&self) -> Requirement {
        Requirement::Landmarks
    }

    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        if !ctx.models.remote_available {
            return Ok(None);
        }
        let reply = self.remote.classify_landmarks(ctx.hand()?.landmarks()).await?;
        Ok(remote_candidate(reply))
    }
}

pub struct TwoFingerStrategy {
    config: GeometryConfig,
}

impl TwoFingerStrategy {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DetectionStrategy for TwoFingerStrategy {
    fn method(&self) -> Method {
        Method::TwoFingerGeometry
    }

    fn floor(&self) -> Option<f32> {
        None
    }

    fn requirement(&self) -> Requirement {
        Requirement::Landmarks
    }

    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        Ok(detect_two_finger_sign(ctx.hand()?.landmarks(), &self.config)
            .map(|m| Candidate::new(m.gesture, m.confidence)))
    }
}

/// Local landmark classifier with boosted confidence
pub struct LocalLandmarkStrategy {
    floor: f32,
}

impl LocalLandmarkStrategy {
    pub fn new(floor: f32) -> Self {
        Self { floor }
    }
}

#[async_trait]
impl DetectionStrategy for LocalLandmarkStrategy {
    fn method(&self) -> Method {
        Method::LocalLandmarks
    }

    fn floor(&self) -> Option<f32> {
        Some(self.floor)
    }

    fn requirement(&self) -> Requirement {
        Requirement::Landmarks
    }

    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        let Some(classifier) = ctx.models.landmark_classifier() else {
            return Ok(None);
        };

        let prediction = classifier.predict(&feature_vector(ctx.hand()?))?;
        Ok(Some(Candidate::new(
            prediction.label,
            normalize_confidence(prediction.confidence),
        )))
    }
}

pub struct RemoteImageStrategy {
    remote: Arc<dyn RemoteClassifier>,
    floor: f32,
}

impl RemoteImageStrategy {
    pub fn new(remote: Arc<dyn RemoteClassifier>, floor: f32) -> Self {
        Self { remote, floor }
    }
}

#[async_trait]
impl DetectionStrategy for RemoteImageStrategy {
    fn method(&self) -> Method {
        Method::RemoteImage
    }

    fn source(&self) -> Source {
        Source::Backend
    }

    fn floor(&self) -> Option<f32> {
        Some(self.floor)
    }

    fn requirement(&self) -> Requirement {
        Requirement::NoLandmarks
    }

    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        if !ctx.models.remote_available {
            return Ok(None);
        }
        let reply = self.remote.classify_image(ctx.frame).await?;
        Ok(remote_candidate(reply))
    }
}

pub struct LocalImageStrategy {
    input_size: u32,
    floor: f32,
}

impl LocalImageStrategy {
    pub fn new(input_size: u32, floor: f32) -> Self {
        Self { input_size, floor }
    }
}

#[async_trait]
impl DetectionStrategy for LocalImageStrategy {
    fn method(&self) -> Method {
        Method::LocalImage
    }

    fn floor(&self) -> Option<f32> {
        Some(self.floor)
    }

    fn requirement(&self) -> Requirement {
        Requirement::NoLandmarks
    }

    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        let Some(classifier) = ctx.models.image_classifier() else {
            return Ok(None);
        };
        if ctx.frame.is_empty() {
            return Err(ClassifierError::ShapeMismatch {
                expected: classifier.input_len(),
                actual: 0,
            }
            .into());
        }

        let prediction = classifier.predict(&preprocess_image(ctx.frame, self.input_size))?;
        Ok(Some(Candidate::new(prediction.label, prediction.confidence)))
    }
}

pub struct NumeralStrategy {
    config: GeometryConfig,
    floor: f32,
}

impl NumeralStrategy {
    pub fn new(config: GeometryConfig, floor: f32) -> Self {
        Self { config, floor }
    }
}

#[async_trait]
impl DetectionStrategy for NumeralStrategy {
    fn method(&self) -> Method {
        Method::NumeralGeometry
    }

    fn floor(&self) -> Option<f32> {
        Some(self.floor)
    }

    fn requirement(&self) -> Requirement {
        Requirement::Landmarks
    }

    async fn attempt(&self, ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        Ok(detect_number_from_landmarks(ctx.hand()?.landmarks(), &self.config)
            .map(|m| Candidate::new(m.gesture, m.confidence)))
    }
}

/// The cascade in its fixed order.
///
/// Boosting lifts almost any local landmark score over its 0.1 floor, so the
/// numeral step is mostly reached when no landmark classifier is loaded.
pub fn default_cascade(
    pipeline: &PipelineConfig,
    geometry: &GeometryConfig,
    image_input_size: u32,
    remote: Arc<dyn RemoteClassifier>,
) -> Vec<Box<dyn DetectionStrategy>> {
    vec![
        Box::new(RemoteLandmarkStrategy::new(
            Arc::clone(&remote),
            pipeline.remote_landmark_floor,
        )),
        Box::new(TwoFingerStrategy::new(geometry.clone())),
        Box::new(LocalLandmarkStrategy::new(pipeline.local_landmark_floor)),
        Box::new(RemoteImageStrategy::new(remote, pipeline.remote_image_floor)),
        Box::new(LocalImageStrategy::new(image_input_size, pipeline.local_image_floor)),
        Box::new(NumeralStrategy::new(geometry.clone(), pipeline.numeral_floor)),
    ]
}
