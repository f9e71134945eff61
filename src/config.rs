use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SignConfig {
    #[serde(default)]
    pub landmarks: LandmarkConfig,
    #[serde(default)]
    pub heuristic: HeuristicConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Landmark provider lifecycle and primary detector options
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LandmarkConfig {
    /// Initialization attempts before switching to fallback mode
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound for a single primary detection, in milliseconds
    #[serde(default = "default_detection_timeout_ms")]
    pub detection_timeout_ms: u64,

    /// Hand scores at or below this value are treated as "no hand"
    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f32,

    /// Accepted hand scores are raised to at least this value
    #[serde(default = "default_confidence_minimum")]
    pub confidence_minimum: f32,

    /// Trailing window for counting detection errors, in milliseconds
    #[serde(default = "default_error_window_ms")]
    pub error_window_ms: u64,

    /// More errors than this inside the window forces a detector reset
    #[serde(default = "default_error_burst_threshold")]
    pub error_burst_threshold: usize,

    #[serde(default = "default_max_num_hands")]
    pub max_num_hands: u32,

    /// 0, 1 or 2
    #[serde(default = "default_model_complexity")]
    pub model_complexity: u8,

    #[serde(default = "default_detector_min_detection_confidence")]
    pub detector_min_detection_confidence: f32,

    #[serde(default = "default_detector_min_tracking_confidence")]
    pub detector_min_tracking_confidence: f32,
}

/// Skin-colour backup detector thresholds
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HeuristicConfig {
    /// Side of the square the frame is resampled to before scanning
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,

    #[serde(default = "default_min_skin_ratio")]
    pub min_skin_ratio: f32,

    #[serde(default = "default_min_skin_pixels")]
    pub min_skin_pixels: usize,

    /// Confidence is `min(ratio * confidence_scale, max_confidence)`
    #[serde(default = "default_confidence_scale")]
    pub confidence_scale: f32,

    #[serde(default = "default_heuristic_max_confidence")]
    pub max_confidence: f32,

    #[serde(default = "default_red_min")]
    pub red_min: u8,

    #[serde(default = "default_green_min")]
    pub green_min: u8,

    #[serde(default = "default_blue_min")]
    pub blue_min: u8,

    /// Minimum |r - g|
    #[serde(default = "default_channel_delta")]
    pub red_green_delta: u8,

    /// Minimum r - b
    #[serde(default = "default_channel_delta")]
    pub red_blue_delta: u8,
}

/// Thresholds for the geometric sign classifiers
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeometryConfig {
    #[serde(default = "default_two_finger_label")]
    pub two_finger_label: String,

    /// How far above the MCP joint the index and middle tips must sit
    #[serde(default = "default_two_finger_extension_margin")]
    pub two_finger_extension_margin: f32,

    /// Minimum index/middle fingertip separation
    #[serde(default = "default_two_finger_min_separation")]
    pub two_finger_min_separation: f32,

    #[serde(default = "default_two_finger_confidence")]
    pub two_finger_confidence: f32,

    /// Two fingertips closer than this are touching
    #[serde(default = "default_pinch_threshold")]
    pub pinch_threshold: f32,

    /// Thumb tip farther than this from the index MCP counts as extended
    #[serde(default = "default_thumb_extension_threshold")]
    pub thumb_extension_threshold: f32,

    /// Mean adjacent fingertip spread separating an open "5"
    #[serde(default = "default_five_min_spread")]
    pub five_min_spread: f32,

    #[serde(default = "default_zero_confidence")]
    pub zero_confidence: f32,

    #[serde(default = "default_one_confidence")]
    pub one_confidence: f32,

    #[serde(default = "default_numeral_confidence")]
    pub two_confidence: f32,

    #[serde(default = "default_numeral_confidence")]
    pub three_confidence: f32,

    #[serde(default = "default_numeral_confidence")]
    pub four_confidence: f32,

    #[serde(default = "default_five_confidence")]
    pub five_confidence: f32,

    #[serde(default = "default_eight_confidence")]
    pub eight_confidence: f32,
}

/// Remote inference service endpoints and timeouts
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_enabled")]
    pub enabled: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URLs probed by backend discovery
    #[serde(default = "default_candidate_urls")]
    pub candidate_urls: Vec<String>,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_detect_path")]
    pub detect_path: String,

    #[serde(default = "default_extract_path")]
    pub extract_landmarks_path: String,

    #[serde(default = "default_model_info_path")]
    pub model_info_path: String,

    /// Positive health checks are reused for this long
    #[serde(default = "default_health_cache_seconds")]
    pub health_cache_seconds: u64,

    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    #[serde(default = "default_landmark_timeout_ms")]
    pub landmark_timeout_ms: u64,

    #[serde(default = "default_image_timeout_ms")]
    pub image_timeout_ms: u64,

    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// JPEG quality (1-100) for image payloads
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

/// Local learned classifier configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// Numeric backend used for inference
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_landmark_model_path")]
    pub landmark_model_path: String,

    #[serde(default = "default_image_model_path")]
    pub image_model_path: String,

    /// Side of the square image fed to the image classifier
    #[serde(default = "default_image_input_size")]
    pub image_input_size: u32,

    /// Output class labels, one character per class
    #[serde(default = "default_labels")]
    pub labels: String,
}

/// Detection orchestrator floors and scheduling
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Hands detected below this confidence are not classified
    #[serde(default = "default_hand_confidence_floor")]
    pub hand_confidence_floor: f32,

    #[serde(default = "default_remote_landmark_floor")]
    pub remote_landmark_floor: f32,

    #[serde(default = "default_local_landmark_floor")]
    pub local_landmark_floor: f32,

    #[serde(default = "default_image_floor")]
    pub remote_image_floor: f32,

    #[serde(default = "default_image_floor")]
    pub local_image_floor: f32,

    #[serde(default = "default_numeral_floor")]
    pub numeral_floor: f32,

    /// Let the image strategies run when no landmarks were found
    #[serde(default)]
    pub image_fallback_without_landmarks: bool,

    /// Frame sampling rate of the detection loop
    #[serde(default = "default_sample_fps")]
    pub sample_fps: u32,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SignConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("signcascade.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&SignConfig::default())?)
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SIGNCASCADE__REMOTE__BASE_URL=... style overrides
            .add_source(
                Environment::with_prefix("SIGNCASCADE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: SignConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.landmarks.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Landmark max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.landmarks.detection_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Landmark detection_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.landmarks.model_complexity > 2 {
            return Err(ConfigError::Message(
                "Landmark model_complexity must be 0, 1 or 2".to_string(),
            ));
        }

        for (name, value) in [
            ("landmarks.min_detection_confidence", self.landmarks.min_detection_confidence),
            ("landmarks.confidence_minimum", self.landmarks.confidence_minimum),
            ("heuristic.min_skin_ratio", self.heuristic.min_skin_ratio),
            ("heuristic.max_confidence", self.heuristic.max_confidence),
            ("geometry.two_finger_confidence", self.geometry.two_finger_confidence),
            ("pipeline.hand_confidence_floor", self.pipeline.hand_confidence_floor),
            ("pipeline.remote_landmark_floor", self.pipeline.remote_landmark_floor),
            ("pipeline.local_landmark_floor", self.pipeline.local_landmark_floor),
            ("pipeline.remote_image_floor", self.pipeline.remote_image_floor),
            ("pipeline.local_image_floor", self.pipeline.local_image_floor),
            ("pipeline.numeral_floor", self.pipeline.numeral_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.heuristic.sample_size == 0 {
            return Err(ConfigError::Message(
                "Heuristic sample_size must be greater than 0".to_string(),
            ));
        }

        if self.remote.jpeg_quality == 0 || self.remote.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Remote jpeg_quality must be within 1..=100".to_string(),
            ));
        }

        if self.models.image_input_size == 0 {
            return Err(ConfigError::Message(
                "Model image_input_size must be greater than 0".to_string(),
            ));
        }

        if self.models.labels.chars().count() < 2 {
            return Err(ConfigError::Message(
                "Model labels must name at least two classes".to_string(),
            ));
        }

        if self.pipeline.sample_fps == 0 {
            return Err(ConfigError::Message(
                "Pipeline sample_fps must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl LandmarkConfig {
    pub fn detection_timeout(&self) -> Duration {
        Duration::from_millis(self.detection_timeout_ms)
    }

    pub fn error_window(&self) -> Duration {
        Duration::from_millis(self.error_window_ms)
    }
}

impl RemoteConfig {
    pub fn health_cache(&self) -> Duration {
        Duration::from_secs(self.health_cache_seconds)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn landmark_timeout(&self) -> Duration {
        Duration::from_millis(self.landmark_timeout_ms)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    /// Upper bound for a health check followed by probing every candidate
    pub fn discovery_budget(&self) -> Duration {
        self.health_timeout() + self.discovery_timeout() * self.candidate_urls.len() as u32
    }
}

impl ModelConfig {
    pub fn label_list(&self) -> Vec<String> {
        self.labels.chars().map(|c| c.to_string()).collect()
    }
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            detection_timeout_ms: default_detection_timeout_ms(),
            min_detection_confidence: default_min_detection_confidence(),
            confidence_minimum: default_confidence_minimum(),
            error_window_ms: default_error_window_ms(),
            error_burst_threshold: default_error_burst_threshold(),
            max_num_hands: default_max_num_hands(),
            model_complexity: default_model_complexity(),
            detector_min_detection_confidence: default_detector_min_detection_confidence(),
            detector_min_tracking_confidence: default_detector_min_tracking_confidence(),
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            min_skin_ratio: default_min_skin_ratio(),
            min_skin_pixels: default_min_skin_pixels(),
            confidence_scale: default_confidence_scale(),
            max_confidence: default_heuristic_max_confidence(),
            red_min: default_red_min(),
            green_min: default_green_min(),
            blue_min: default_blue_min(),
            red_green_delta: default_channel_delta(),
            red_blue_delta: default_channel_delta(),
        }
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            two_finger_label: default_two_finger_label(),
            two_finger_extension_margin: default_two_finger_extension_margin(),
            two_finger_min_separation: default_two_finger_min_separation(),
            two_finger_confidence: default_two_finger_confidence(),
            pinch_threshold: default_pinch_threshold(),
            thumb_extension_threshold: default_thumb_extension_threshold(),
            five_min_spread: default_five_min_spread(),
            zero_confidence: default_zero_confidence(),
            one_confidence: default_one_confidence(),
            two_confidence: default_numeral_confidence(),
            three_confidence: default_numeral_confidence(),
            four_confidence: default_numeral_confidence(),
            five_confidence: default_five_confidence(),
            eight_confidence: default_eight_confidence(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: default_remote_enabled(),
            base_url: default_base_url(),
            candidate_urls: default_candidate_urls(),
            health_path: default_health_path(),
            detect_path: default_detect_path(),
            extract_landmarks_path: default_extract_path(),
            model_info_path: default_model_info_path(),
            health_cache_seconds: default_health_cache_seconds(),
            health_timeout_ms: default_health_timeout_ms(),
            landmark_timeout_ms: default_landmark_timeout_ms(),
            image_timeout_ms: default_image_timeout_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            landmark_model_path: default_landmark_model_path(),
            image_model_path: default_image_model_path(),
            image_input_size: default_image_input_size(),
            labels: default_labels(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hand_confidence_floor: default_hand_confidence_floor(),
            remote_landmark_floor: default_remote_landmark_floor(),
            local_landmark_floor: default_local_landmark_floor(),
            remote_image_floor: default_image_floor(),
            local_image_floor: default_image_floor(),
            numeral_floor: default_numeral_floor(),
            image_fallback_without_landmarks: false,
            sample_fps: default_sample_fps(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

// Default value functions
fn default_max_attempts() -> u32 {
    3
}
fn default_detection_timeout_ms() -> u64 {
    5000
}
fn default_min_detection_confidence() -> f32 {
    0.05
}
fn default_confidence_minimum() -> f32 {
    0.1
}
fn default_error_window_ms() -> u64 {
    5000
}
fn default_error_burst_threshold() -> usize {
    5
}
fn default_max_num_hands() -> u32 {
    1
}
fn default_model_complexity() -> u8 {
    2
}
fn default_detector_min_detection_confidence() -> f32 {
    0.1
}
fn default_detector_min_tracking_confidence() -> f32 {
    0.05
}

fn default_sample_size() -> u32 {
    224
}
fn default_min_skin_ratio() -> f32 {
    0.05
}
fn default_min_skin_pixels() -> usize {
    100
}
fn default_confidence_scale() -> f32 {
    10.0
}
fn default_heuristic_max_confidence() -> f32 {
    0.9
}
fn default_red_min() -> u8 {
    95
}
fn default_green_min() -> u8 {
    40
}
fn default_blue_min() -> u8 {
    20
}
fn default_channel_delta() -> u8 {
    15
}

fn default_two_finger_label() -> String {
    "V".to_string()
}
fn default_two_finger_extension_margin() -> f32 {
    0.05
}
fn default_two_finger_min_separation() -> f32 {
    0.04
}
fn default_two_finger_confidence() -> f32 {
    0.85
}
fn default_pinch_threshold() -> f32 {
    0.05
}
fn default_thumb_extension_threshold() -> f32 {
    0.1
}
fn default_five_min_spread() -> f32 {
    0.06
}
fn default_zero_confidence() -> f32 {
    0.75
}
fn default_one_confidence() -> f32 {
    0.85
}
fn default_numeral_confidence() -> f32 {
    0.8
}
fn default_five_confidence() -> f32 {
    0.85
}
fn default_eight_confidence() -> f32 {
    0.75
}

fn default_remote_enabled() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_candidate_urls() -> Vec<String> {
    vec![
        "http://localhost:8000".to_string(),
        "http://127.0.0.1:8000".to_string(),
        "http://localhost:8080".to_string(),
        "http://127.0.0.1:8080".to_string(),
    ]
}
fn default_health_path() -> String {
    "/app/api/health/".to_string()
}
fn default_detect_path() -> String {
    "/app/api/detect-sign/".to_string()
}
fn default_extract_path() -> String {
    "/app/api/extract-landmarks/".to_string()
}
fn default_model_info_path() -> String {
    "/app/api/model-info/".to_string()
}
fn default_health_cache_seconds() -> u64 {
    30
}
fn default_health_timeout_ms() -> u64 {
    5000
}
fn default_landmark_timeout_ms() -> u64 {
    10000
}
fn default_image_timeout_ms() -> u64 {
    15000
}
fn default_discovery_timeout_ms() -> u64 {
    3000
}
fn default_jpeg_quality() -> u8 {
    80
}

fn default_backend() -> String {
    "ndarray".to_string()
}
fn default_landmark_model_path() -> String {
    "./models/landmark_classifier.json".to_string()
}
fn default_image_model_path() -> String {
    "./models/image_classifier.json".to_string()
}
fn default_image_input_size() -> u32 {
    32
}
fn default_labels() -> String {
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string()
}

fn default_hand_confidence_floor() -> f32 {
    0.01
}
fn default_remote_landmark_floor() -> f32 {
    0.3
}
fn default_local_landmark_floor() -> f32 {
    0.1
}
fn default_image_floor() -> f32 {
    0.4
}
fn default_numeral_floor() -> f32 {
    0.3
}
fn default_sample_fps() -> u32 {
    10
}
fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SignConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.landmarks.max_attempts, 3);
        assert_eq!(config.landmarks.detection_timeout(), Duration::from_secs(5));
        assert_eq!(config.remote.health_cache(), Duration::from_secs(30));
        assert_eq!(config.models.label_list().len(), 26);
        assert!(!config.pipeline.image_fallback_without_landmarks);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[remote]\nenabled = false\nbase_url = \"http://10.0.0.2:9000\"\n\n[pipeline]\nsample_fps = 4"
        )
        .unwrap();

        let config = SignConfig::load_from_file(file.path()).unwrap();

        assert!(!config.remote.enabled);
        assert_eq!(config.remote.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.pipeline.sample_fps, 4);
        // Untouched sections keep their defaults
        assert_eq!(config.landmarks.max_attempts, 3);
        assert_eq!(config.geometry.two_finger_label, "V");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = SignConfig::load_from_file("/nonexistent/signcascade.toml").unwrap();
        assert_eq!(config.pipeline.remote_landmark_floor, 0.3);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SignConfig::default();

        config.landmarks.max_attempts = 0;
        assert!(config.validate().is_err());
        config.landmarks.max_attempts = 3;

        config.pipeline.numeral_floor = 1.5;
        assert!(config.validate().is_err());
        config.pipeline.numeral_floor = 0.3;

        config.remote.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.remote.jpeg_quality = 80;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SignConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[landmarks]"));
        assert!(text.contains("[pipeline]"));

        let parsed: SignConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.remote.detect_path, config.remote.detect_path);
    }

    #[test]
    fn test_discovery_budget_covers_every_candidate() {
        let remote = RemoteConfig {
            health_timeout_ms: 500,
            discovery_timeout_ms: 200,
            candidate_urls: vec!["http://a".to_string(), "http://b".to_string()],
            ..RemoteConfig::default()
        };
        assert_eq!(remote.discovery_budget(), Duration::from_millis(900));
    }
}
