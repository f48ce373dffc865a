use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FrontdeskError, Result};

/// Top-level configuration for the Frontdesk service.
///
/// Loaded from `~/.frontdesk/config.toml` by default. Each section corresponds
/// to one component of the routing engine or the process hosting it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl FrontdeskConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FrontdeskConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.quick_answer_threshold) {
            return Err(FrontdeskError::Config(format!(
                "retrieval.quick_answer_threshold must be within [0, 1], got {}",
                r.quick_answer_threshold
            )));
        }
        if r.default_k == 0 {
            return Err(FrontdeskError::Config(
                "retrieval.default_k must be greater than 0".to_string(),
            ));
        }
        if r.default_k > r.max_k {
            return Err(FrontdeskError::Config(format!(
                "retrieval.default_k ({}) exceeds retrieval.max_k ({})",
                r.default_k, r.max_k
            )));
        }
        if r.search_timeout_ms == 0 {
            return Err(FrontdeskError::Config(
                "retrieval.search_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.routing.min_semantic_score) {
            return Err(FrontdeskError::Config(format!(
                "routing.min_semantic_score must be within [0, 1], got {}",
                self.routing.min_semantic_score
            )));
        }
        if self.webhook.url.is_some() && self.webhook.timeout_ms == 0 {
            return Err(FrontdeskError::Config(
                "webhook.timeout_ms must be greater than 0 when a url is set".to_string(),
            ));
        }
        Ok(())
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.frontdesk/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Retrieval Router policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Quick answers must score strictly above this to skip semantic search.
    pub quick_answer_threshold: f64,
    /// Number of semantic results requested when the caller gives none.
    pub default_k: usize,
    /// Upper bound on caller-supplied `k`.
    pub max_k: usize,
    /// Deadline for one semantic search call.
    pub search_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            quick_answer_threshold: 0.8,
            default_k: 8,
            max_k: 50,
            search_timeout_ms: 5_000,
        }
    }
}

/// Outbound webhook listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Listener URL. Notification is disabled when unset.
    pub url: Option<String>,
    pub timeout_ms: u64,
    /// Sent as `Authorization: Bearer <secret>` when set.
    pub secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 3_000,
            secret: None,
        }
    }
}

/// Receptionist pipeline behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Answer inbound messages automatically.
    pub auto_reply: bool,
    /// Reply used when retrieval fails or finds nothing.
    pub fallback_reply: String,
    /// Inbound text longer than this is rejected.
    pub max_message_chars: usize,
    /// Semantic hits scoring below this are treated as no answer and escalated.
    pub min_semantic_score: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            auto_reply: true,
            fallback_reply: "I don't have an answer for that yet.".to_string(),
            max_message_chars: 4_000,
            min_semantic_score: 0.0,
        }
    }
}
