use crate::landmarks::ServiceStatus;
use crate::models::{LoadedModels, ModelSummary};
use crate::remote::RemoteStatus;
use serde::Serialize;

/// Health status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

/// Health check result
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl HealthCheckResult {
    /// Judge the pipeline from its component snapshots. Degraded paths are
    /// warnings; only a pipeline with no classifier at all is unhealthy.
    pub fn evaluate(
        provider: &ServiceStatus,
        remote: &RemoteStatus,
        models: Option<&LoadedModels>,
    ) -> Self {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if provider.fallback_mode {
            warnings.push(format!(
                "Landmark provider in fallback mode after {} attempts",
                provider.initialization_attempts
            ));
        } else if !provider.is_initialized && provider.initialization_attempts > 0 {
            warnings.push(format!(
                "Landmark detector not initialized ({}/{} attempts)",
                provider.initialization_attempts, provider.max_attempts
            ));
        }

        if let Some(error) = &provider.last_error {
            warnings.push(format!("Last landmark error: {} ({})", error.message, error.kind));
        }

        if remote.enabled && !remote.is_available {
            warnings.push(format!("Remote classifier unavailable at {}", remote.base_url));
        }

        match models {
            None => warnings.push("Models not loaded yet".to_string()),
            Some(models) => {
                if models.landmark_classifier().is_none() && models.image_classifier().is_none() {
                    issues.push("No local classifier available".to_string());
                } else if models.is_emergency() {
                    warnings.push("Running on the emergency classifier".to_string());
                }
                for (name, classifier) in [
                    ("Landmark", models.landmark_classifier()),
                    ("Image", models.image_classifier()),
                ] {
                    if let Some(classifier) = classifier {
                        if !classifier.is_pretrained() {
                            warnings.push(format!("{} classifier is untrained", name));
                        }
                    }
                }
            }
        }

        let status = if !issues.is_empty() {
            HealthStatus::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            issues,
            warnings,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Everything `--status` prints
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub health: HealthCheckResult,
    pub provider: ServiceStatus,
    pub remote: RemoteStatus,
    pub models: Option<ModelSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_status(initialized: bool, fallback: bool) -> ServiceStatus {
        ServiceStatus {
            is_initialized: initialized,
            is_loading: false,
            fallback_mode: fallback,
            initialization_attempts: if initialized { 1 } else { 3 },
            max_attempts: 3,
            last_error: None,
        }
    }

    fn remote_status(enabled: bool, available: bool) -> RemoteStatus {
        RemoteStatus {
            enabled,
            is_available: available,
            base_url: "http://localhost:8000".to_string(),
            last_health_check: None,
        }
    }

    #[test]
    fn test_healthy_before_issues() {
        let result = HealthCheckResult::evaluate(
            &provider_status(true, false),
            &remote_status(false, false),
            None,
        );
        // Unloaded models only warn
        assert_eq!(result.status, HealthStatus::Warning);
        assert!(result.issues.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_fallback_and_remote_warnings() {
        let result = HealthCheckResult::evaluate(
            &provider_status(false, true),
            &remote_status(true, false),
            None,
        );
        assert_eq!(result.status, HealthStatus::Warning);
        assert!(result.warnings.iter().any(|w| w.contains("fallback")));
        assert!(result.warnings.iter().any(|w| w.contains("Remote")));
        assert!(!result.is_healthy());
    }
}
