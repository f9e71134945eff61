use crate::error::EventBusError;
use crate::pipeline::DetectionResult;
use serde::Serialize;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted by the detection pipeline
#[derive(Debug, Clone, Serialize)]
pub enum PipelineEvent {
    /// A frame went through the strategy cascade
    DetectionCompleted {
        frame_id: u64,
        result: DetectionResult,
        timestamp: SystemTime,
    },
    /// Model loading finished
    ModelsLoaded {
        backend: String,
        remote_available: bool,
        methods: Vec<String>,
    },
    /// The landmark provider gave up on its primary detector
    FallbackModeEntered { attempts: u32 },
    /// A detection loop started consuming frames
    SessionStarted { session_id: String },
    /// A detection loop stopped
    SessionStopped {
        session_id: String,
        frames_processed: u64,
    },
    /// A cascade strategy failed with something other than a remote decline
    SystemError { component: String, error: String },
}

impl PipelineEvent {
    pub fn description(&self) -> String {
        match self {
            PipelineEvent::DetectionCompleted {
                frame_id, result, ..
            } => {
                if result.is_empty() {
                    format!("Frame {}: no sign ({})", frame_id, result.method)
                } else {
                    format!(
                        "Frame {}: '{}' at {:.2} via {}",
                        frame_id, result.gesture, result.confidence, result.method
                    )
                }
            }
            PipelineEvent::ModelsLoaded {
                backend, methods, ..
            } => {
                format!("Models loaded on {} backend: {}", backend, methods.join(", "))
            }
            PipelineEvent::FallbackModeEntered { attempts } => {
                format!("Landmark fallback mode after {} attempts", attempts)
            }
            PipelineEvent::SessionStarted { session_id } => {
                format!("Detection session {} started", session_id)
            }
            PipelineEvent::SessionStopped {
                session_id,
                frames_processed,
            } => format!(
                "Detection session {} stopped after {} frames",
                session_id, frames_processed
            ),
            PipelineEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::DetectionCompleted { .. } => "detection_completed",
            PipelineEvent::ModelsLoaded { .. } => "models_loaded",
            PipelineEvent::FallbackModeEntered { .. } => "fallback_mode_entered",
            PipelineEvent::SessionStarted { .. } => "session_started",
            PipelineEvent::SessionStopped { .. } => "session_stopped",
            PipelineEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Broadcast bus for pipeline events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish to all subscribers, returning how many received it
    pub fn publish(&self, event: PipelineEvent) -> Result<usize, EventBusError> {
        match &event {
            PipelineEvent::ModelsLoaded { .. } | PipelineEvent::SessionStarted { .. } => {
                info!("{}", event.description());
            }
            PipelineEvent::FallbackModeEntered { .. } => warn!("{}", event.description()),
            PipelineEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    /// Only detections that recognized a sign
    RecognizedSigns,
}

impl EventFilter {
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::RecognizedSigns => matches!(
                event,
                PipelineEvent::DetectionCompleted { result, .. } if !result.is_empty()
            ),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<PipelineEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(bus: &EventBus, filter: EventFilter, name: impl Into<String>) -> Self {
        Self {
            receiver: bus.subscribe(),
            filter,
            name: name.into(),
        }
    }

    /// Receive the next event passing the filter. Lagging skips the lost
    /// events and keeps receiving.
    pub async fn recv(&mut self) -> Result<PipelineEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Ok(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
