use super::*;
use crate::classifier::{Activation, LayerWeights, NetworkWeights};
use crate::config::{GeometryConfig, ModelConfig, SignConfig};
use crate::error::{ClassifierError, RemoteError, SignError};
use crate::features::FEATURE_LEN;
use crate::events::{EventBus, PipelineEvent};
use crate::frame::Frame;
use crate::landmarks::{
    synthetic_landmarks, HandLandmark, LandmarkProvider, MockDetectorFactory, MockHandDetector,
    MockResponse, INDEX_MCP, INDEX_TIP, LANDMARK_COUNT, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP,
    PINKY_TIP, RING_MCP, RING_TIP, THUMB_MCP, THUMB_TIP, WRIST,
};
use crate::remote::{MockRemoteClassifier, RemoteClassifier};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Harness {
    orchestrator: Arc<DetectionOrchestrator>,
    detector: Arc<MockHandDetector>,
    remote: Arc<MockRemoteClassifier>,
    _models_dir: TempDir,
}

fn test_config(models_dir: &TempDir) -> SignConfig {
    let mut config = SignConfig::default();
    config.models = ModelConfig {
        landmark_model_path: models_dir.path().join("missing_landmark.json").display().to_string(),
        image_model_path: models_dir.path().join("missing_image.json").display().to_string(),
        ..ModelConfig::default()
    };
    config
}

fn harness_with(
    detector: MockHandDetector,
    remote: MockRemoteClassifier,
    customize: impl FnOnce(&mut SignConfig),
    strategies: Option<Vec<Box<dyn DetectionStrategy>>>,
    event_bus: Option<EventBus>,
) -> Harness {
    let models_dir = TempDir::new().unwrap();
    let mut config = test_config(&models_dir);
    customize(&mut config);

    let detector = Arc::new(detector);
    let factory = Arc::new(MockDetectorFactory::succeeding(Arc::clone(&detector)));
    let provider = Arc::new(LandmarkProvider::new(
        config.landmarks.clone(),
        config.heuristic.clone(),
        factory,
    ));
    let remote = Arc::new(remote);

    let mut builder = DetectionOrchestrator::builder()
        .config(config)
        .provider(provider)
        .remote(Arc::clone(&remote) as Arc<dyn RemoteClassifier>);
    if let Some(strategies) = strategies {
        builder = builder.strategies(strategies);
    }
    if let Some(bus) = event_bus {
        builder = builder.event_bus(bus);
    }

    Harness {
        orchestrator: Arc::new(builder.build().unwrap()),
        detector,
        remote,
        _models_dir: models_dir,
    }
}

fn harness(detector: MockHandDetector, remote: MockRemoteClassifier) -> Harness {
    harness_with(detector, remote, |_| {}, None, None)
}

fn frame(id: u64) -> Frame {
    Frame::solid(id, 64, 64, [30, 30, 30])
}

/// Index and middle raised and apart, the rest folded
fn v_sign() -> Vec<HandLandmark> {
    let mut hand = vec![HandLandmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT];
    hand[WRIST] = HandLandmark::new(0.5, 0.8, 0.0);
    hand[THUMB_MCP] = HandLandmark::new(0.4, 0.6, 0.0);
    hand[THUMB_TIP] = HandLandmark::new(0.44, 0.5, 0.0);
    hand[INDEX_MCP] = HandLandmark::new(0.42, 0.35, 0.0);
    hand[INDEX_TIP] = HandLandmark::new(0.45, 0.2, 0.0);
    hand[MIDDLE_MCP] = HandLandmark::new(0.5, 0.35, 0.0);
    hand[MIDDLE_TIP] = HandLandmark::new(0.5, 0.2, 0.0);
    hand[RING_MCP] = HandLandmark::new(0.58, 0.45, 0.0);
    hand[RING_TIP] = HandLandmark::new(0.58, 0.5, 0.0);
    hand[PINKY_MCP] = HandLandmark::new(0.66, 0.45, 0.0);
    hand[PINKY_TIP] = HandLandmark::new(0.66, 0.5, 0.0);
    hand
}

/// Single softmax layer that ignores its input and puts about 0.9 on "A"
fn write_confident_landmark_model(path: &Path) {
    let mut bias = vec![0.0f32; 26];
    bias[0] = 5.4;
    let weights = NetworkWeights {
        layers: vec![LayerWeights {
            weights: vec![vec![0.0; 26]; FEATURE_LEN],
            bias,
            activation: Activation::Softmax,
        }],
    };
    std::fs::write(path, serde_json::to_string(&weights).unwrap()).unwrap();
}

fn with_confident_local_model(config: &mut SignConfig) {
    write_confident_landmark_model(Path::new(&config.models.landmark_model_path));
}

/// Always fails with a local classifier error
struct BrokenClassifierStrategy;

#[async_trait]
impl DetectionStrategy for BrokenClassifierStrategy {
    fn method(&self) -> Method {
        Method::LocalLandmarks
    }

    fn floor(&self) -> Option<f32> {
        Some(0.1)
    }

    fn requirement(&self) -> Requirement {
        Requirement::Landmarks
    }

    async fn attempt(&self, _ctx: &DetectionContext<'_>) -> Result<Option<Candidate>, SignError> {
        Err(ClassifierError::EmptyOutput.into())
    }
}

#[tokio::test]
async fn test_remote_landmarks_win_when_available() {
    let remote = MockRemoteClassifier::available();
    remote.set_landmark_reply(Ok(MockRemoteClassifier::reply("A", 0.92, "landmarks")));
    let h = harness(MockHandDetector::with_synthetic_hand(0.9), remote);

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.gesture, "A");
    assert!((result.confidence - 0.92).abs() < 1e-6);
    assert_eq!(result.method, Method::RemoteLandmarks);
    assert_eq!(result.source, Source::Backend);
    assert_eq!(result.landmarks.as_ref().map(Vec::len), Some(LANDMARK_COUNT));
    assert_eq!(h.remote.landmark_calls(), 1);
    assert_eq!(h.detector.call_count(), 1);
}

#[tokio::test]
async fn test_confident_local_classifier_answers_without_remote() {
    let h = harness_with(
        MockHandDetector::with_synthetic_hand(0.9),
        MockRemoteClassifier::unavailable(),
        with_confident_local_model,
        None,
        None,
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.gesture, "A");
    assert!((result.confidence - 0.8985).abs() < 1e-3);
    assert_eq!(result.method, Method::LocalLandmarks);
    assert_eq!(result.source, Source::Client);
    let models = h.orchestrator.models().get().unwrap();
    assert!(models.landmark_classifier().unwrap().is_pretrained());
}

#[tokio::test]
async fn test_remote_reply_above_floor_beats_stronger_local_classifier() {
    let remote = MockRemoteClassifier::available();
    remote.set_landmark_reply(Ok(MockRemoteClassifier::reply("B", 0.5, "landmarks")));
    let h = harness_with(
        MockHandDetector::with_synthetic_hand(0.9),
        remote,
        with_confident_local_model,
        None,
        None,
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.gesture, "B");
    assert!((result.confidence - 0.5).abs() < 1e-6);
    assert_eq!(result.method, Method::RemoteLandmarks);
    assert_eq!(result.source, Source::Backend);
    assert_eq!(h.remote.landmark_calls(), 1);
}

#[tokio::test]
async fn test_strategy_failure_publishes_system_error() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let remote = MockRemoteClassifier::available();
    remote.set_landmark_reply(Err(RemoteError::Timeout {
        url: "mock://remote".to_string(),
        timeout: Duration::from_millis(10),
    }));
    let remote = Arc::new(remote);
    let strategies: Vec<Box<dyn DetectionStrategy>> = vec![
        Box::new(RemoteLandmarkStrategy::new(
            Arc::clone(&remote) as Arc<dyn RemoteClassifier>,
            0.3,
        )),
        Box::new(BrokenClassifierStrategy),
        Box::new(TwoFingerStrategy::new(GeometryConfig::default())),
    ];

    let models_dir = TempDir::new().unwrap();
    let config = test_config(&models_dir);
    let detector = Arc::new(MockHandDetector::with_landmarks(v_sign(), 0.8));
    let provider = Arc::new(LandmarkProvider::new(
        config.landmarks.clone(),
        config.heuristic.clone(),
        Arc::new(MockDetectorFactory::succeeding(detector)),
    ));
    let orchestrator = DetectionOrchestrator::builder()
        .config(config)
        .provider(provider)
        .remote(Arc::clone(&remote) as Arc<dyn RemoteClassifier>)
        .strategies(strategies)
        .event_bus(bus)
        .build()
        .unwrap();

    let result = orchestrator.detect(&frame(9)).await;
    assert_eq!(result.method, Method::TwoFingerGeometry);
    assert_eq!(remote.landmark_calls(), 1);

    let mut errors = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::SystemError { component, error } = event {
            errors.push((component, error));
        }
    }
    // The remote timeout is a decline, only the classifier failure is reported
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "local_landmarks");
    assert!(errors[0].1.contains("no output classes"));
}

#[tokio::test]
async fn test_two_finger_sign_when_remote_unavailable() {
    let h = harness(
        MockHandDetector::with_landmarks(v_sign(), 0.8),
        MockRemoteClassifier::unavailable(),
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.gesture, "V");
    assert!((result.confidence - 0.85).abs() < 1e-6);
    assert_eq!(result.method, Method::TwoFingerGeometry);
    assert_eq!(result.source, Source::Client);
    // Unavailable at load time, so the remote is never asked per frame
    assert_eq!(h.remote.landmark_calls(), 0);
}

#[tokio::test]
async fn test_low_confidence_remote_reply_falls_through() {
    let remote = MockRemoteClassifier::available();
    remote.set_landmark_reply(Ok(MockRemoteClassifier::reply("A", 0.3, "landmarks")));
    let h = harness(MockHandDetector::with_landmarks(v_sign(), 0.8), remote);

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(h.remote.landmark_calls(), 1);
    assert_eq!(result.gesture, "V");
    assert_eq!(result.method, Method::TwoFingerGeometry);
}

#[tokio::test]
async fn test_unknown_remote_letter_and_errors_fall_through() {
    let remote = MockRemoteClassifier::available();
    remote.set_landmark_reply(Ok(MockRemoteClassifier::reply("?", 0.95, "landmarks")));
    let h = harness(MockHandDetector::with_landmarks(v_sign(), 0.8), remote);

    let result = h.orchestrator.detect(&frame(1)).await;
    assert_eq!(result.method, Method::TwoFingerGeometry);

    h.remote.set_landmark_reply(Err(RemoteError::Timeout {
        url: "mock://remote".to_string(),
        timeout: Duration::from_millis(10),
    }));
    let result = h.orchestrator.detect(&frame(2)).await;
    assert_eq!(result.gesture, "V");
    assert_eq!(h.remote.landmark_calls(), 2);
}

#[tokio::test]
async fn test_numeral_geometry_after_other_strategies() {
    let geometry = GeometryConfig::default();
    let strategies: Vec<Box<dyn DetectionStrategy>> = vec![
        Box::new(TwoFingerStrategy::new(geometry.clone())),
        Box::new(NumeralStrategy::new(geometry, 0.3)),
    ];
    let h = harness_with(
        MockHandDetector::with_synthetic_hand(0.9),
        MockRemoteClassifier::unavailable(),
        |_| {},
        Some(strategies),
        None,
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.gesture, "5");
    assert!((result.confidence - 0.85).abs() < 1e-6);
    assert_eq!(result.method, Method::NumeralGeometry);
}

#[tokio::test]
async fn test_no_hand_returns_empty_result() {
    let h = harness(
        MockHandDetector::new(MockResponse::NoHand),
        MockRemoteClassifier::available(),
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert!(result.is_empty());
    assert!(!result.has_hand());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.method, Method::None);
    assert_eq!(h.remote.image_calls(), 0);
    assert_eq!(h.remote.landmark_calls(), 0);
}

#[tokio::test]
async fn test_image_strategies_when_fallback_enabled() {
    let remote = MockRemoteClassifier::available();
    remote.set_image_reply(Ok(MockRemoteClassifier::reply("B", 0.7, "image")));
    let h = harness_with(
        MockHandDetector::new(MockResponse::NoHand),
        remote,
        |config| config.pipeline.image_fallback_without_landmarks = true,
        None,
        None,
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.gesture, "B");
    assert_eq!(result.method, Method::RemoteImage);
    assert_eq!(result.source, Source::Backend);
    assert!(!result.has_hand());
    assert_eq!(h.remote.image_calls(), 1);
}

#[tokio::test]
async fn test_hand_below_floor_keeps_landmarks() {
    let h = harness_with(
        MockHandDetector::with_synthetic_hand(0.3),
        MockRemoteClassifier::available(),
        |config| config.pipeline.hand_confidence_floor = 0.5,
        None,
        None,
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert!(result.is_empty());
    assert!(result.has_hand());
    assert_eq!(h.remote.landmark_calls(), 0);
}

#[tokio::test]
async fn test_processing_time_includes_landmark_detection() {
    let h = harness(
        MockHandDetector::with_landmarks(v_sign(), 0.8).with_delay(Duration::from_millis(50)),
        MockRemoteClassifier::unavailable(),
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    assert_eq!(result.method, Method::TwoFingerGeometry);
    assert!(result.processing_time_ms >= 50.0);
}

#[tokio::test]
async fn test_concurrent_detect_is_single_flight() {
    let h = harness(
        MockHandDetector::with_landmarks(v_sign(), 0.8).with_delay(Duration::from_millis(100)),
        MockRemoteClassifier::unavailable(),
    );
    let first_frame = frame(1);
    let second_frame = frame(2);

    let (first, second) = tokio::join!(
        h.orchestrator.detect(&first_frame),
        h.orchestrator.detect(&second_frame)
    );

    assert_eq!(first.gesture, "V");
    assert_eq!(second.method, Method::Busy);
    assert!(second.is_empty());
    assert_eq!(h.orchestrator.busy_drops(), 1);
    assert_eq!(h.orchestrator.frames_processed(), 1);
    assert_eq!(h.detector.call_count(), 1);
    assert!(!h.orchestrator.is_busy());

    // The guard is released, so the next frame runs normally
    let third = h.orchestrator.detect(&frame(3)).await;
    assert_eq!(third.method, Method::TwoFingerGeometry);
}

#[tokio::test]
async fn test_confidence_stays_within_unit_interval() {
    let remote = MockRemoteClassifier::available();
    remote.set_landmark_reply(Ok(MockRemoteClassifier::reply("C", 1.7, "landmarks")));
    let h = harness(MockHandDetector::with_synthetic_hand(0.9), remote);

    let result = h.orchestrator.detect(&frame(1)).await;
    assert_eq!(result.gesture, "C");
    assert_eq!(result.confidence, 1.0);

    h.remote.set_available(false);
    h.remote.set_landmark_reply(Ok(MockRemoteClassifier::reply("C", 0.1, "landmarks")));
    for id in 2..6 {
        let result = h.orchestrator.detect(&frame(id)).await;
        assert!((0.0..=1.0).contains(&result.confidence));
        assert!(result.processing_time_ms >= 0.0);
    }
}

#[tokio::test]
async fn test_detection_events_published() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let h = harness_with(
        MockHandDetector::with_landmarks(v_sign(), 0.8),
        MockRemoteClassifier::unavailable(),
        |_| {},
        None,
        Some(bus),
    );

    h.orchestrator.detect(&frame(42)).await;

    match rx.recv().await.unwrap() {
        PipelineEvent::ModelsLoaded {
            remote_available, ..
        } => assert!(!remote_available),
        other => panic!("unexpected event {:?}", other),
    }
    match rx.recv().await.unwrap() {
        PipelineEvent::DetectionCompleted { frame_id, result, .. } => {
            assert_eq!(frame_id, 42);
            assert_eq!(result.gesture, "V");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_available_methods_follow_remote() {
    let h = harness(
        MockHandDetector::with_synthetic_hand(0.9),
        MockRemoteClassifier::unavailable(),
    );

    let methods = h.orchestrator.available_methods().await;
    assert!(methods.contains(&Method::TwoFingerGeometry));
    assert!(methods.contains(&Method::LocalLandmarks));
    assert!(!methods.contains(&Method::RemoteLandmarks));

    let h = harness(
        MockHandDetector::with_synthetic_hand(0.9),
        MockRemoteClassifier::available(),
    );
    assert!(h
        .orchestrator
        .available_methods()
        .await
        .contains(&Method::RemoteLandmarks));
}

#[tokio::test]
async fn test_status_report_after_load() {
    let h = harness(
        MockHandDetector::with_synthetic_hand(0.9),
        MockRemoteClassifier::available(),
    );

    let before = h.orchestrator.status_report();
    assert!(before.models.is_none());

    h.orchestrator.detect(&frame(1)).await;

    let report = h.orchestrator.status_report();
    let models = report.models.unwrap();
    assert!(models.provider_ready);
    assert!(models.remote_available);
    assert!(report.provider.is_initialized);
    // Classifiers are untrained without weight files
    assert!(report
        .health
        .warnings
        .iter()
        .any(|w| w.contains("untrained")));
    assert!(report.health.issues.is_empty());
}

#[test]
fn test_builder_requires_provider_and_remote() {
    assert!(DetectionOrchestrator::builder().build().is_err());

    let remote: Arc<dyn RemoteClassifier> = Arc::new(MockRemoteClassifier::available());
    assert!(DetectionOrchestrator::builder().remote(remote).build().is_err());
}

#[test]
fn test_default_cascade_order() {
    let config = SignConfig::default();
    let remote: Arc<dyn RemoteClassifier> = Arc::new(MockRemoteClassifier::available());
    let cascade = default_cascade(&config.pipeline, &config.geometry, 32, remote);

    let methods: Vec<Method> = cascade.iter().map(|s| s.method()).collect();
    assert_eq!(
        methods,
        vec![
            Method::RemoteLandmarks,
            Method::TwoFingerGeometry,
            Method::LocalLandmarks,
            Method::RemoteImage,
            Method::LocalImage,
            Method::NumeralGeometry,
        ]
    );
    assert_eq!(cascade[1].floor(), None);
    assert!(cascade[0].accepts(&Candidate::new("A", 0.31)));
    assert!(!cascade[0].accepts(&Candidate::new("A", 0.3)));
}

#[tokio::test]
async fn test_detection_loop_processes_until_closed() {
    let h = harness(
        MockHandDetector::with_landmarks(v_sign(), 0.8),
        MockRemoteClassifier::unavailable(),
    );
    let detection_loop = DetectionLoop::new(Arc::clone(&h.orchestrator), 0);
    let (tx, rx) = mpsc::channel(8);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let handle = detection_loop.spawn(rx, move |frame, result| {
        let _ = seen_tx.send((frame.id, result.gesture.clone()));
    });

    for id in 0..3 {
        tx.send(frame(id)).await.unwrap();
    }
    drop(tx);

    let stats = handle.await.unwrap();
    assert_eq!(stats.frames_received, 3);
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.signs_detected, 3);
    assert_eq!(stats.frames_skipped, 0);

    let mut seen = Vec::new();
    while let Ok(item) = seen_rx.try_recv() {
        seen.push(item);
    }
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(_, gesture)| gesture == "V"));
}

#[tokio::test]
async fn test_detection_loop_samples_and_cancels() {
    let bus = EventBus::new(32);
    let mut rx_events = bus.subscribe();
    let h = harness_with(
        MockHandDetector::new(MockResponse::NoHand),
        MockRemoteClassifier::unavailable(),
        |_| {},
        None,
        Some(bus),
    );
    // One frame per second: the burst after the first frame is skipped
    let detection_loop = DetectionLoop::new(Arc::clone(&h.orchestrator), 1);
    let token = detection_loop.cancellation_token();
    let session_id = detection_loop.session_id().to_string();
    let (tx, rx) = mpsc::channel(8);
    let handle = detection_loop.spawn(rx, |_, _| {});

    for id in 0..4 {
        tx.send(frame(id)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let stats = handle.await.unwrap();
    assert_eq!(stats.session_id, session_id);
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.frames_processed, 1);
    assert_eq!(stats.frames_skipped, 3);
    assert_eq!(stats.signs_detected, 0);

    let mut started = false;
    let mut stopped = false;
    while let Ok(event) = rx_events.try_recv() {
        match event {
            PipelineEvent::SessionStarted { session_id: id } => started = id == session_id,
            PipelineEvent::SessionStopped {
                session_id: id,
                frames_processed,
            } => stopped = id == session_id && frames_processed == 1,
            _ => {}
        }
    }
    assert!(started);
    assert!(stopped);
}

#[tokio::test]
async fn test_open_hand_with_unreliable_classifier_is_bounded() {
    let h = harness(
        MockHandDetector::with_landmarks(synthetic_landmarks(), 0.9),
        MockRemoteClassifier::unavailable(),
    );

    let result = h.orchestrator.detect(&frame(1)).await;

    // Either the untrained local classifier or the numeral fallback answers
    assert!(result.has_hand());
    assert!((0.0..=1.0).contains(&result.confidence));
    if !result.is_empty() {
        assert!(matches!(
            result.method,
            Method::LocalLandmarks | Method::NumeralGeometry
        ));
    }
}
