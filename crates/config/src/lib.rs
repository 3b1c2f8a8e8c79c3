//! Configuration loading and validation for Replyline.
//!
//! Loads configuration from `~/.replyline/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup so
//! a bad credential or model id never reaches the first run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.replyline/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Credential for the hosted endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Log level used when neither `RUST_LOG` nor `--verbose` is given
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub brand: BrandConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_log_level() -> String {
    "info".into()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MIN_CREDENTIAL_LEN: usize = 10;

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("log_level", &self.log_level)
            .field("models", &self.models)
            .field("brand", &self.brand)
            .field("pipeline", &self.pipeline)
            .field("client", &self.client)
            .field("server", &self.server)
            .finish()
    }
}

/// Model id, token limit and temperature for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageModelConfig {
    pub model: String,
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.1
}

impl StageModelConfig {
    fn new(model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            temperature,
        }
    }
}

/// Per-stage model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_guard_model")]
    pub guard: StageModelConfig,

    #[serde(default = "default_response_model")]
    pub response: StageModelConfig,

    #[serde(default = "default_tone_model")]
    pub tone: StageModelConfig,

    #[serde(default = "default_rewrite_model")]
    pub rewrite: StageModelConfig,
}

fn default_guard_model() -> StageModelConfig {
    StageModelConfig::new("meta-llama/Llama-Guard-4-12B", 128, 0.1)
}
fn default_response_model() -> StageModelConfig {
    StageModelConfig::new("meta-llama/llama-4-maverick-17b-128e-instruct", 400, 0.1)
}
fn default_tone_model() -> StageModelConfig {
    StageModelConfig::new("meta-llama/llama-4-scout-17b-16e-instruct", 150, 0.1)
}
fn default_rewrite_model() -> StageModelConfig {
    StageModelConfig::new("meta-llama/llama-4-maverick-17b-128e-instruct", 300, 0.2)
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            guard: default_guard_model(),
            response: default_response_model(),
            tone: default_tone_model(),
            rewrite: default_rewrite_model(),
        }
    }
}

impl ModelsConfig {
    /// Stage name and settings, in pipeline order.
    pub fn stages(&self) -> [(&'static str, &StageModelConfig); 4] {
        [
            ("guard", &self.guard),
            ("response", &self.response),
            ("tone", &self.tone),
            ("rewrite", &self.rewrite),
        ]
    }
}

/// Static brand voice handed to the response and rewrite prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    #[serde(default = "default_company_name")]
    pub company_name: String,

    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_voice")]
    pub voice: String,
}

fn default_company_name() -> String {
    "Your Company".into()
}
fn default_domain() -> String {
    "customer service".into()
}
fn default_voice() -> String {
    "professional and empathetic".into()
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            company_name: default_company_name(),
            domain: default_domain(),
            voice: default_voice(),
        }
    }
}

/// What to do with a pending review nobody answered in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewTimeoutPolicy {
    #[default]
    Reject,
    Approve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// AI latency budget per run; overruns are logged and counted
    #[serde(default = "default_max_pipeline_ms")]
    pub max_pipeline_ms: u64,

    /// Unset means a pending review waits indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_timeout_secs: Option<u64>,

    #[serde(default)]
    pub on_review_timeout: ReviewTimeoutPolicy,
}

fn default_max_pipeline_ms() -> u64 {
    200
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pipeline_ms: default_max_pipeline_ms(),
            review_timeout_secs: None,
            on_review_timeout: ReviewTimeoutPolicy::default(),
        }
    }
}

/// HTTP client behaviour for model calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout per attempt
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Additional attempts after the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, doubled on every retry
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_request_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl AppConfig {
    /// Load, apply environment overrides, and validate.
    ///
    /// `path` defaults to `~/.replyline/config.toml`. Credential lookup order:
    /// the config file, then `REPLYLINE_API_KEY`, then `GROQ_API_KEY`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load_unchecked(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`] but skips validation, so `doctor` can report
    /// every problem instead of stopping at the first.
    pub fn load_unchecked(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::resolve_path(path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// The file a load with `path` reads: `path` itself, or the default
    /// location when none is given.
    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        path.map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"))
    }

    /// Parse a config file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("REPLYLINE_API_KEY").or_else(|| lookup("GROQ_API_KEY"));
        }

        let strings: [(&str, &mut String); 9] = [
            ("REPLYLINE_API_URL", &mut self.api_url),
            ("REPLYLINE_GUARD_MODEL", &mut self.models.guard.model),
            ("REPLYLINE_RESPONSE_MODEL", &mut self.models.response.model),
            ("REPLYLINE_TONE_MODEL", &mut self.models.tone.model),
            ("REPLYLINE_REWRITE_MODEL", &mut self.models.rewrite.model),
            ("REPLYLINE_COMPANY_NAME", &mut self.brand.company_name),
            ("REPLYLINE_COMPANY_DOMAIN", &mut self.brand.domain),
            ("REPLYLINE_BRAND_VOICE", &mut self.brand.voice),
            ("REPLYLINE_LOG_LEVEL", &mut self.log_level),
        ];
        for (key, slot) in strings {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }

        if let Some(port) = parse_env(&lookup, "REPLYLINE_PORT")? {
            self.server.port = port;
        }
        if let Some(secs) = parse_env(&lookup, "REPLYLINE_REQUEST_TIMEOUT_SECS")? {
            self.client.request_timeout_secs = secs;
        }
        if let Some(retries) = parse_env(&lookup, "REPLYLINE_MAX_RETRIES")? {
            self.client.max_retries = retries;
        }
        if let Some(ms) = parse_env(&lookup, "REPLYLINE_MAX_PIPELINE_MS")? {
            self.pipeline.max_pipeline_ms = ms;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".replyline")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check_credential()?;

        if self.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("api_url must not be empty".into()));
        }

        for (stage, settings) in self.models.stages() {
            if settings.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "models.{stage}.model must not be empty"
                )));
            }
            if settings.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "models.{stage}.max_tokens must be > 0"
                )));
            }
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "models.{stage}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be > 0".into()));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if self.client.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "client.request_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Presence and minimal shape of the credential.
    pub fn check_credential(&self) -> Result<&str, ConfigError> {
        let key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential)?;
        if key.len() < MIN_CREDENTIAL_LEN {
            return Err(ConfigError::InvalidCredential);
        }
        Ok(key)
    }

    /// `host:port` for the review server.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            log_level: default_log_level(),
            models: ModelsConfig::default(),
            brand: BrandConfig::default(),
            pipeline: PipelineConfig::default(),
            client: ClientConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: key.to_string(),
                value,
            }),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("No API key configured (set REPLYLINE_API_KEY or GROQ_API_KEY)")]
    MissingCredential,

    #[error("API key is malformed (expected at least 10 characters)")]
    InvalidCredential,

    #[error("Environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for replyline_core::Error {
    fn from(e: ConfigError) -> Self {
        replyline_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_key() -> AppConfig {
        AppConfig {
            api_key: Some("gsk_test_key_0123456789".into()),
            ..AppConfig::default()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_template() {
        let config = AppConfig::default();
        assert_eq!(config.models.guard.model, "meta-llama/Llama-Guard-4-12B");
        assert_eq!(config.models.response.max_tokens, 400);
        assert_eq!(config.models.tone.max_tokens, 150);
        assert!((config.models.rewrite.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.pipeline.max_pipeline_ms, 200);
        assert_eq!(config.client.max_retries, 2);
        assert!(config.pipeline.review_timeout_secs.is_none());
        assert_eq!(config.pipeline.on_review_timeout, ReviewTimeoutPolicy::Reject);
    }

    #[test]
    fn keyed_default_config_is_valid() {
        assert!(with_key().validate().is_ok());
    }

    #[test]
    fn missing_credential_is_fatal() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential));
    }

    #[test]
    fn short_credential_rejected() {
        let config = AppConfig {
            api_key: Some("short".into()),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidCredential
        ));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = with_key();
        config.models.tone.temperature = 5.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("models.tone.temperature"));
    }

    #[test]
    fn empty_model_rejected() {
        let mut config = with_key();
        config.models.guard.model = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_log_level_rejected() {
        let mut config = with_key();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("GROQ_API_KEY", "gsk_from_env_123456"),
                ("REPLYLINE_TONE_MODEL", "tone-x"),
                ("REPLYLINE_COMPANY_NAME", "Acme Furniture"),
                ("REPLYLINE_PORT", "8080"),
                ("REPLYLINE_MAX_RETRIES", "0"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("gsk_from_env_123456"));
        assert_eq!(config.models.tone.model, "tone-x");
        assert_eq!(config.brand.company_name, "Acme Furniture");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.client.max_retries, 0);
    }

    #[test]
    fn replyline_key_wins_over_groq_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("REPLYLINE_API_KEY", "replyline_key_123"),
                ("GROQ_API_KEY", "groq_key_1234567"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("replyline_key_123"));
    }

    #[test]
    fn malformed_env_number_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("REPLYLINE_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn explicit_path_wins_over_default_location() {
        let explicit = Path::new("/etc/replyline/prod.toml");
        assert_eq!(AppConfig::resolve_path(Some(explicit)), explicit);
        assert_eq!(
            AppConfig::resolve_path(None),
            AppConfig::config_dir().join("config.toml")
        );
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.server.port, 5001);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_key = "gsk_file_key_987654"

[brand]
company_name = "Northwind"

[models.tone]
model = "scout"
max_tokens = 90

[pipeline]
review_timeout_secs = 120
on_review_timeout = "approve"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.brand.company_name, "Northwind");
        assert_eq!(config.brand.voice, "professional and empathetic");
        assert_eq!(config.models.tone.model, "scout");
        assert!((config.models.tone.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.models.guard.max_tokens, 128);
        assert_eq!(config.pipeline.review_timeout_secs, Some(120));
        assert_eq!(config.pipeline.on_review_timeout, ReviewTimeoutPolicy::Approve);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
    }

    #[test]
    fn debug_redacts_credential() {
        let rendered = format!("{:?}", with_key());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("gsk_test_key"));
    }

    #[test]
    fn config_error_converts_to_core_error() {
        let err: replyline_core::Error = ConfigError::MissingCredential.into();
        assert_eq!(err.kind(), "configuration_error");
    }
}
