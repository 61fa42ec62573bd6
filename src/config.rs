//! Configuration types for the mask engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the mask engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Detection settings
    pub detection: DetectionConfig,

    /// Bot DNS verification settings
    pub verification: VerificationConfig,

    /// IP reputation provider settings
    pub reputation: ReputationConfig,

    /// Honeypot challenge settings
    pub honeypot: HoneypotConfig,

    /// Analytics settings
    pub analytics: AnalyticsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            verification: VerificationConfig::default(),
            reputation: ReputationConfig::default(),
            honeypot: HoneypotConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON or YAML file, by extension.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&raw)?
        } else {
            serde_yaml::from_str(&raw)?
        };
        Ok(config)
    }
}

/// Detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Enable user-agent pattern matching
    pub bot_patterns: bool,

    /// Enable DNS verification of claimed bot identities
    pub bot_verification: bool,

    /// Enable IP reputation lookup
    pub ip_reputation: bool,

    /// Optional path to a custom bot signature table (JSON)
    pub pattern_table_path: Option<String>,

    /// IPs exempt from classification entirely (operator/testing addresses).
    /// A matching visitor gets the page served untouched.
    pub ip_whitelist: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            bot_patterns: true,
            bot_verification: true,
            ip_reputation: true,
            pattern_table_path: None,
            ip_whitelist: Vec::new(),
        }
    }
}

/// Bot DNS verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Per-query DNS timeout in milliseconds
    pub dns_timeout_ms: u64,

    /// Verification cache capacity
    pub cache_size: u64,

    /// Verification cache TTL in seconds
    pub cache_ttl_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: 3_000,
            cache_size: 10_000,
            cache_ttl_secs: 86_400,
        }
    }
}

impl VerificationConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// IP reputation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Provider base URL (ip-api style JSON endpoint)
    pub provider_url: String,

    /// Per-lookup timeout in milliseconds
    pub lookup_timeout_ms: u64,

    /// Reputation cache capacity
    pub cache_size: u64,

    /// Reputation cache TTL in seconds
    pub cache_ttl_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://ip-api.com/json".to_string(),
            lookup_timeout_ms: 5_000,
            cache_size: 50_000,
            cache_ttl_secs: 21_600,
        }
    }
}

impl ReputationConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Honeypot challenge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoneypotConfig {
    /// Enable honeypot markup generation and validation
    pub enabled: bool,

    /// Server secret for field names and tokens. Must be overridden in
    /// production configs.
    pub secret: String,
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: "change-me".to_string(),
        }
    }
}

/// Analytics settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Enable event emission
    pub enabled: bool,

    /// Salt for IP hashing in stored events
    pub ip_salt: String,

    /// Batch flush interval in seconds
    pub flush_interval_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip_salt: "maskgate".to_string(),
            flush_interval_secs: 3_600,
        }
    }
}

impl AnalyticsConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}
