use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::frame::Frame;
use crate::landmarks::HandLandmark;
use crate::remote::types::{DetectionRequest, ExtractLandmarksResponse, RemoteDetection, RemoteStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Black-box sign classifier reachable over the network
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    /// Whether the service is reachable; positive answers may be cached
    async fn check_health(&self) -> bool;

    /// Locate a reachable service, switching endpoints if the client knows
    /// several. Resolves to whether one was found.
    async fn discover(&self) -> bool {
        self.check_health().await
    }

    async fn classify_landmarks(&self, landmarks: &[HandLandmark]) -> Result<RemoteDetection, RemoteError>;

    async fn classify_image(&self, frame: &Frame) -> Result<RemoteDetection, RemoteError>;

    async fn model_info(&self) -> Result<serde_json::Value, RemoteError>;

    fn status(&self) -> RemoteStatus;
}

#[derive(Debug, Default)]
struct HealthCache {
    available: bool,
    checked_at: Option<Instant>,
    checked_wall: Option<DateTime<Utc>>,
}

/// [`RemoteClassifier`] over HTTP. Requests run on the blocking pool and
/// are abandoned when their timeout expires.
pub struct HttpRemoteClassifier {
    config: RemoteConfig,
    agent: ureq::Agent,
    base_url: RwLock<String>,
    health: Mutex<HealthCache>,
}

impl HttpRemoteClassifier {
    pub fn new(config: RemoteConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            config,
            agent: ureq::AgentBuilder::new().build(),
            base_url: RwLock::new(base_url),
            health: Mutex::new(HealthCache::default()),
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        self.base_url.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.read(), path)
    }

    fn cached_health(&self) -> Option<bool> {
        let cache = self.health.lock();
        match cache.checked_at {
            Some(at) if cache.available && at.elapsed() < self.config.health_cache() => Some(true),
            _ => None,
        }
    }

    fn record_health(&self, available: bool) {
        let mut cache = self.health.lock();
        cache.available = available;
        cache.checked_at = Some(Instant::now());
        cache.checked_wall = Some(Utc::now());
    }

    async fn probe(&self, base_url: &str, timeout: Duration) -> bool {
        let url = format!("{}{}", base_url, self.config.health_path);
        let agent = self.agent.clone();
        let request_url = url.clone();

        let result = run_blocking(url.clone(), timeout, move || {
            agent
                .get(&request_url)
                .timeout(timeout)
                .call()
                .map(|response| response.status() == 200)
                .map_err(|e| transport_error(&request_url, e))
        })
        .await;

        match result {
            Ok(available) => available,
            Err(e) => {
                debug!("Health probe of {} failed: {}", url, e);
                false
            }
        }
    }

    /// Probe every candidate base URL in order and adopt the first healthy one
    pub async fn find_available_backend(&self) -> Option<String> {
        for candidate in &self.config.candidate_urls {
            let candidate = candidate.trim_end_matches('/');
            if self.probe(candidate, self.config.discovery_timeout()).await {
                info!("Found remote classifier at {}", candidate);
                *self.base_url.write() = candidate.to_string();
                self.record_health(true);
                return Some(candidate.to_string());
            }
        }

        warn!("No remote classifier found among {} candidates", self.config.candidate_urls.len());
        None
    }

    async fn ensure_available(&self) -> Result<(), RemoteError> {
        if !self.config.enabled {
            return Err(RemoteError::Disabled);
        }
        if !self.check_health().await {
            return Err(RemoteError::Unavailable {
                url: self.base_url(),
            });
        }
        Ok(())
    }

    async fn post_detection(
        &self,
        request: DetectionRequest<'_>,
        timeout: Duration,
    ) -> Result<RemoteDetection, RemoteError> {
        self.ensure_available().await?;

        let url = self.url(&self.config.detect_path);
        let body = serde_json::to_value(&request).map_err(|e| RemoteError::Request {
            url: url.clone(),
            details: e.to_string(),
        })?;
        let agent = self.agent.clone();
        let request_url = url.clone();

        let detection: RemoteDetection = run_blocking(url, timeout, move || {
            let response = agent
                .post(&request_url)
                .timeout(timeout)
                .set("Content-Type", "application/json")
                .send_json(body);
            read_json(&request_url, response)
        })
        .await?;

        match detection.error {
            Some(message) => Err(RemoteError::Rejected { message }),
            None => Ok(detection),
        }
    }

    /// Ask the service for the 21 landmarks of the hand in `frame`
    pub async fn extract_landmarks(&self, frame: &Frame) -> Result<ExtractLandmarksResponse, RemoteError> {
        self.ensure_available().await?;

        let url = self.url(&self.config.extract_landmarks_path);
        let image_data = encode_frame(frame, self.config.jpeg_quality, &url)?;
        let timeout = self.config.landmark_timeout();
        let agent = self.agent.clone();
        let request_url = url.clone();

        let reply: ExtractLandmarksResponse = run_blocking(url, timeout, move || {
            let response = agent
                .post(&request_url)
                .timeout(timeout)
                .set("Content-Type", "application/json")
                .send_json(serde_json::json!({ "image_data": image_data }));
            read_json(&request_url, response)
        })
        .await?;

        match reply.error.clone() {
            Some(message) => Err(RemoteError::Rejected { message }),
            None => Ok(reply),
        }
    }
}

#[async_trait]
impl RemoteClassifier for HttpRemoteClassifier {
    async fn check_health(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        if let Some(available) = self.cached_health() {
            return available;
        }

        let available = self.probe(&self.base_url(), self.config.health_timeout()).await;
        self.record_health(available);
        if available {
            debug!("Remote classifier at {} is available", self.base_url());
        } else {
            debug!("Remote classifier at {} is not available", self.base_url());
        }
        available
    }

    async fn discover(&self) -> bool {
        if self.check_health().await {
            return true;
        }
        if !self.config.enabled || self.config.candidate_urls.is_empty() {
            return false;
        }

        debug!("Remote classifier at {} unavailable, trying candidates", self.base_url());
        self.find_available_backend().await.is_some()
    }

    async fn classify_landmarks(&self, landmarks: &[HandLandmark]) -> Result<RemoteDetection, RemoteError> {
        self.post_detection(DetectionRequest::landmarks(landmarks), self.config.landmark_timeout())
            .await
    }

    async fn classify_image(&self, frame: &Frame) -> Result<RemoteDetection, RemoteError> {
        let url = self.url(&self.config.detect_path);
        let image_data = encode_frame(frame, self.config.jpeg_quality, &url)?;
        self.post_detection(DetectionRequest::image(image_data), self.config.image_timeout())
            .await
    }

    async fn model_info(&self) -> Result<serde_json::Value, RemoteError> {
        self.ensure_available().await?;

        let url = self.url(&self.config.model_info_path);
        let timeout = self.config.health_timeout();
        let agent = self.agent.clone();
        let request_url = url.clone();

        run_blocking(url, timeout, move || {
            let response = agent.get(&request_url).timeout(timeout).call();
            read_json(&request_url, response)
        })
        .await
    }

    fn status(&self) -> RemoteStatus {
        let cache = self.health.lock();
        RemoteStatus {
            enabled: self.config.enabled,
            is_available: cache.available,
            base_url: self.base_url(),
            last_health_check: cache.checked_wall,
        }
    }
}

fn encode_frame(frame: &Frame, quality: u8, url: &str) -> Result<String, RemoteError> {
    frame.to_base64_jpeg(quality).map_err(|e| RemoteError::Request {
        url: url.to_string(),
        details: format!("failed to encode frame {}: {}", frame.id, e),
    })
}

/// Run a blocking HTTP exchange under a deadline
async fn run_blocking<T, F>(url: String, timeout: Duration, call: F) -> Result<T, RemoteError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RemoteError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(RemoteError::Request {
            url,
            details: format!("request task failed: {}", join_error),
        }),
        Err(_) => Err(RemoteError::Timeout { url, timeout }),
    }
}

fn transport_error(url: &str, error: ureq::Error) -> RemoteError {
    match error {
        ureq::Error::Status(code, _) => RemoteError::InvalidResponse {
            url: url.to_string(),
            details: format!("HTTP status {}", code),
        },
        ureq::Error::Transport(transport) => RemoteError::Request {
            url: url.to_string(),
            details: transport.to_string(),
        },
    }
}

/// Decode a JSON body. Error statuses still carry a JSON body with an
/// `error` field, which is surfaced as a rejection.
fn read_json<T: serde::de::DeserializeOwned>(
    url: &str,
    response: Result<ureq::Response, ureq::Error>,
) -> Result<T, RemoteError> {
    let response = match response {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let message = response
                .into_json::<serde_json::Value>()
                .ok()
                .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP status {}", code));
            return Err(RemoteError::Rejected { message });
        }
        Err(e) => return Err(transport_error(url, e)),
    };

    response.into_json::<T>().map_err(|e| RemoteError::InvalidResponse {
        url: url.to_string(),
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const UNREACHABLE: &str = "http://192.0.2.1:9";

    /// Local server answering every request with 200 and a small JSON body
    async fn healthy_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 2048];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                          Content-Length: 15\r\nConnection: close\r\n\r\n{\"status\":\"ok\"}",
                    )
                    .await;
            }
        });
        format!("http://{}", addr)
    }

    fn unreachable_config() -> RemoteConfig {
        RemoteConfig {
            // Reserved TEST-NET address, never routable
            base_url: UNREACHABLE.to_string(),
            candidate_urls: vec![UNREACHABLE.to_string()],
            health_timeout_ms: 200,
            discovery_timeout_ms: 200,
            ..RemoteConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_client_never_requests() {
        let client = HttpRemoteClassifier::new(RemoteConfig {
            enabled: false,
            ..unreachable_config()
        });

        assert!(!client.check_health().await);
        let error = client.classify_landmarks(&[]).await.unwrap_err();
        assert!(matches!(error, RemoteError::Disabled));
        assert!(client.status().last_health_check.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client = HttpRemoteClassifier::new(unreachable_config());

        assert!(!client.check_health().await);
        let status = client.status();
        assert!(!status.is_available);
        assert!(status.last_health_check.is_some());

        let frame = Frame::solid(1, 16, 16, [10, 20, 30]);
        assert!(matches!(
            client.classify_image(&frame).await,
            Err(RemoteError::Unavailable { .. })
        ));
        assert!(client.find_available_backend().await.is_none());
    }

    #[tokio::test]
    async fn test_discover_falls_through_to_healthy_candidate() {
        let healthy = healthy_server().await;
        let client = HttpRemoteClassifier::new(RemoteConfig {
            candidate_urls: vec![UNREACHABLE.to_string(), format!("{}/", healthy)],
            ..unreachable_config()
        });

        assert!(client.discover().await);
        assert_eq!(client.base_url(), healthy);

        let status = client.status();
        assert!(status.is_available);
        assert_eq!(status.base_url, healthy);
        // Positive result is cached for the adopted backend
        assert!(client.check_health().await);
    }

    #[tokio::test]
    async fn test_discover_keeps_configured_backend_when_healthy() {
        let healthy = healthy_server().await;
        let client = HttpRemoteClassifier::new(RemoteConfig {
            base_url: healthy.clone(),
            candidate_urls: vec![UNREACHABLE.to_string()],
            ..unreachable_config()
        });

        assert!(client.discover().await);
        assert_eq!(client.base_url(), healthy);
    }

    #[tokio::test]
    async fn test_discover_without_any_backend() {
        let client = HttpRemoteClassifier::new(unreachable_config());
        assert!(!client.discover().await);
        assert_eq!(client.base_url(), UNREACHABLE);

        let disabled = HttpRemoteClassifier::new(RemoteConfig {
            enabled: false,
            ..unreachable_config()
        });
        assert!(!disabled.discover().await);
    }

    #[test]
    fn test_base_url_normalized() {
        let client = HttpRemoteClassifier::new(RemoteConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..RemoteConfig::default()
        });
        assert_eq!(client.url("/app/api/health/"), "http://localhost:8000/app/api/health/");
    }

    #[tokio::test]
    async fn test_blocking_call_timeout() {
        let result: Result<(), RemoteError> =
            run_blocking("http://slow".to_string(), Duration::from_millis(20), || {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RemoteError::Timeout { .. })));
    }
}
