use crate::error::LandmarkError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorKind {
    InitializationFailed,
    LoadingFailed,
    DetectionFailed,
    NetworkError,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderErrorKind::InitializationFailed => "INITIALIZATION_FAILED",
            ProviderErrorKind::LoadingFailed => "LOADING_FAILED",
            ProviderErrorKind::DetectionFailed => "DETECTION_FAILED",
            ProviderErrorKind::NetworkError => "NETWORK_ERROR",
        };
        f.write_str(name)
    }
}

/// Failure recorded by the landmark provider, kept for status consumers
#[derive(Debug, Clone, Serialize)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Rendered originating error
    pub cause: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: String, cause: Option<&LandmarkError>) -> Self {
        Self {
            kind,
            message,
            cause: cause.map(|e| e.to_string()),
            timestamp: Utc::now(),
        }
    }

    /// Classify an initialization failure by what went wrong
    pub fn from_initialization(error: &LandmarkError, attempt: u32) -> Self {
        let kind = match error {
            LandmarkError::Loading { .. } => ProviderErrorKind::LoadingFailed,
            LandmarkError::Network { .. } | LandmarkError::Timeout { .. } => {
                ProviderErrorKind::NetworkError
            }
            _ => ProviderErrorKind::InitializationFailed,
        };

        Self::new(
            kind,
            format!(
                "Landmark detector initialization failed (attempt {}): {}",
                attempt, error
            ),
            Some(error),
        )
    }

    pub fn from_detection(error: &LandmarkError) -> Self {
        Self::new(
            ProviderErrorKind::DetectionFailed,
            format!("Landmark detection failed: {}", error),
            Some(error),
        )
    }
}

/// Snapshot of the provider lifecycle for health and UI consumers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub is_initialized: bool,
    pub is_loading: bool,
    pub fallback_mode: bool,
    pub initialization_attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<ProviderError>,
}

/// Mutable lifecycle state owned by one provider instance.
///
/// Every mutation goes through a named transition so the attempt counter,
/// error window and mode flags stay consistent.
#[derive(Debug)]
pub(crate) struct ProviderState {
    initialized: bool,
    loading: bool,
    fallback_mode: bool,
    attempts: u32,
    max_attempts: u32,
    last_error: Option<ProviderError>,
    recent_errors: VecDeque<Instant>,
}

impl ProviderState {
    pub(crate) fn new(max_attempts: u32) -> Self {
        Self {
            initialized: false,
            loading: false,
            fallback_mode: false,
            attempts: 0,
            max_attempts,
            last_error: None,
            recent_errors: VecDeque::new(),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn is_fallback(&self) -> bool {
        self.fallback_mode
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub(crate) fn last_error(&self) -> Option<&ProviderError> {
        self.last_error.as_ref()
    }

    /// Starts a new initialization attempt and returns its 1-based number
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.loading = true;
        self.attempts
    }

    pub(crate) fn attempt_succeeded(&mut self) {
        self.loading = false;
        self.initialized = true;
        self.last_error = None;
        self.recent_errors.clear();
    }

    /// Records the failure; returns true when this exhausted the attempts
    pub(crate) fn attempt_failed(&mut self, error: ProviderError) -> bool {
        self.loading = false;
        self.initialized = false;
        self.last_error = Some(error);
        if self.attempts_exhausted() {
            self.fallback_mode = true;
        }
        self.fallback_mode
    }

    pub(crate) fn enter_fallback(&mut self) {
        self.fallback_mode = true;
        self.loading = false;
    }

    pub(crate) fn record_detection_error(&mut self, error: ProviderError, now: Instant) {
        self.last_error = Some(error);
        self.recent_errors.push_back(now);
    }

    /// Number of detection errors within `window` of `now`, pruning older ones
    pub(crate) fn recent_error_count(&mut self, window: Duration, now: Instant) -> usize {
        while let Some(oldest) = self.recent_errors.front() {
            if now.duration_since(*oldest) > window {
                self.recent_errors.pop_front();
            } else {
                break;
            }
        }
        self.recent_errors.len()
    }

    /// Drops the detector binding so the next use re-initializes
    pub(crate) fn mark_uninitialized(&mut self) {
        self.initialized = false;
        self.recent_errors.clear();
    }

    /// Full reset used by explicit retry
    pub(crate) fn reset(&mut self) {
        self.initialized = false;
        self.loading = false;
        self.fallback_mode = false;
        self.attempts = 0;
        self.last_error = None;
        self.recent_errors.clear();
    }

    pub(crate) fn snapshot(&self) -> ServiceStatus {
        ServiceStatus {
            is_initialized: self.initialized,
            is_loading: self.loading,
            fallback_mode: self.fallback_mode,
            initialization_attempts: self.attempts,
            max_attempts: self.max_attempts,
            last_error: self.last_error.clone(),
        }
    }
}
