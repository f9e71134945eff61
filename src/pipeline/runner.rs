use crate::events::PipelineEvent;
use crate::frame::Frame;
use crate::pipeline::orchestrator::DetectionOrchestrator;
use crate::pipeline::result::{DetectionResult, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Counters reported when a detection loop stops
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopStats {
    pub session_id: String,
    pub frames_received: u64,
    pub frames_processed: u64,
    /// Frames skipped by the sampling interval or the busy guard
    pub frames_skipped: u64,
    pub signs_detected: u64,
}

/// Feeds a stream of frames through the orchestrator at a sampled rate
pub struct DetectionLoop {
    orchestrator: Arc<DetectionOrchestrator>,
    sample_interval: Duration,
    cancellation_token: CancellationToken,
    session_id: String,
}

impl DetectionLoop {
    /// `sample_fps` of zero processes every frame
    pub fn new(orchestrator: Arc<DetectionOrchestrator>, sample_fps: u32) -> Self {
        let sample_interval = if sample_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / sample_fps as f64)
        };

        Self {
            orchestrator,
            sample_interval,
            cancellation_token: CancellationToken::new(),
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn spawn<F>(self, frames: mpsc::Receiver<Frame>, on_result: F) -> JoinHandle<LoopStats>
    where
        F: FnMut(&Frame, &DetectionResult) + Send + 'static,
    {
        tokio::spawn(self.run(frames, on_result))
    }

    /// Consume frames until the channel closes or the token is cancelled
    pub async fn run<F>(self, mut frames: mpsc::Receiver<Frame>, mut on_result: F) -> LoopStats
    where
        F: FnMut(&Frame, &DetectionResult) + Send,
    {
        let mut stats = LoopStats {
            session_id: self.session_id.clone(),
            ..LoopStats::default()
        };
        let mut last_processed: Option<Instant> = None;

        info!("Detection session {} started", self.session_id);
        self.emit(PipelineEvent::SessionStarted {
            session_id: self.session_id.clone(),
        });

        loop {
            let frame = tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    debug!("Detection session {} cancelled", self.session_id);
                    break;
                }
                frame = frames.recv() => match frame {
                    Some(frame) => frame,
                    None => {
                        debug!("Frame source closed for session {}", self.session_id);
                        break;
                    }
                },
            };
            stats.frames_received += 1;

            if let Some(last) = last_processed {
                if last.elapsed() < self.sample_interval {
                    stats.frames_skipped += 1;
                    continue;
                }
            }
            last_processed = Some(Instant::now());

            let result = self.orchestrator.detect(&frame).await;
            if result.method == Method::Busy {
                stats.frames_skipped += 1;
                continue;
            }

            stats.frames_processed += 1;
            if !result.is_empty() {
                stats.signs_detected += 1;
            }
            on_result(&frame, &result);
        }

        info!(
            "Detection session {} stopped: {} processed, {} skipped, {} signs",
            self.session_id, stats.frames_processed, stats.frames_skipped, stats.signs_detected
        );
        self.emit(PipelineEvent::SessionStopped {
            session_id: self.session_id.clone(),
            frames_processed: stats.frames_processed,
        });

        stats
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = self.orchestrator.event_bus() {
            if let Err(e) = bus.publish(event) {
                debug!("Session event not delivered: {}", e);
            }
        }
    }
}
