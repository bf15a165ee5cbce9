//! Configuration loading, validation, and management for Helix.
//!
//! Loads configuration from `~/.helix/config.toml` (or the file named by
//! `HELIX_CONFIG`) with environment variable overrides for credentials.
//! Validates all settings at startup; the result is immutable for the
//! lifetime of the process.

use helix_core::Tier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.helix/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sampling temperature sent to every backend
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Backend endpoint/credential pairs, keyed by backend name
    #[serde(default = "default_backends")]
    pub backends: BTreeMap<String, BackendConfig>,

    /// Tier → backend grants
    #[serde(default)]
    pub access: AccessConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Retry backoff settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Conversation budget settings
    #[serde(default)]
    pub budget: BudgetConfig,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

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
            .field("default_temperature", &self.default_temperature)
            .field("backends", &self.backends)
            .field("access", &self.access)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("budget", &self.budget)
            .finish()
    }
}

/// Which adapter speaks to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Any `/v1/chat/completions` endpoint
    OpenaiCompat,
    /// Anthropic Messages API
    Anthropic,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    pub model: String,

    /// Ascending = tried first; must be unique and >= 1
    pub priority: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_max_response_size")]
    pub max_response_size: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_backend_kind() -> BackendKind {
    BackendKind::OpenaiCompat
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_response_size() -> u32 {
    2048
}
fn default_timeout_secs() -> u64 {
    60
}

impl BackendConfig {
    pub fn new(kind: BackendKind, model: impl Into<String>, priority: u32) -> Self {
        Self {
            kind,
            api_key: None,
            api_url: None,
            model: model.into(),
            priority,
            max_retries: default_max_retries(),
            max_response_size: default_max_response_size(),
            timeout_secs: default_timeout_secs(),
            enabled: true,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("priority", &self.priority)
            .field("max_retries", &self.max_retries)
            .field("max_response_size", &self.max_response_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("enabled", &self.enabled)
            .finish()
    }
}

fn default_backends() -> BTreeMap<String, BackendConfig> {
    let mut backends = BTreeMap::new();
    backends.insert(
        "openai".to_string(),
        BackendConfig::new(BackendKind::OpenaiCompat, "gpt-4o-mini", 1),
    );
    backends.insert(
        "anthropic".to_string(),
        BackendConfig::new(BackendKind::Anthropic, "claude-3-5-haiku-latest", 2),
    );
    backends.insert(
        "deepseek".to_string(),
        BackendConfig {
            max_retries: 2,
            ..BackendConfig::new(BackendKind::OpenaiCompat, "deepseek-chat", 3)
        },
    );
    backends
}

/// Which backends each subscription tier may use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_free_access")]
    pub free: Vec<String>,

    #[serde(default = "default_premium_access")]
    pub premium: Vec<String>,

    #[serde(default = "default_enterprise_access")]
    pub enterprise: Vec<String>,
}

fn default_free_access() -> Vec<String> {
    vec!["openai".into()]
}
fn default_premium_access() -> Vec<String> {
    vec!["openai".into(), "anthropic".into()]
}
fn default_enterprise_access() -> Vec<String> {
    vec!["openai".into(), "anthropic".into(), "deepseek".into()]
}

impl AccessConfig {
    /// Backend names granted to a tier.
    pub fn allowed(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Free => &self.free,
            Tier::Premium => &self.premium,
            Tier::Enterprise => &self.enterprise,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            free: default_free_access(),
            premium: default_premium_access(),
            enterprise: default_enterprise_access(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of entries
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Query characters kept when fingerprinting
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cache_capacity() -> usize {
    100
}
fn default_max_query_chars() -> usize {
    512
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before attempt n+1 is `backoff_base_ms * 2^n`
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_backoff_base_ms() -> u64 {
    1000
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Conversation size budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Budget ceiling in estimated size units
    #[serde(default = "default_ceiling")]
    pub ceiling: u64,

    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,

    #[serde(default = "default_critical_ratio")]
    pub critical_ratio: f64,

    /// Size of the "optimal" band; critical conversations are truncated
    /// once usage passes twice this
    #[serde(default = "default_optimal_ratio")]
    pub optimal_ratio: f64,

    /// Inactivity after which a conversation's record is swept
    #[serde(default = "default_idle_ttl_hours")]
    pub idle_ttl_hours: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_word_weight")]
    pub word_weight: f64,

    #[serde(default = "default_char_weight")]
    pub char_weight: f64,
}

fn default_ceiling() -> u64 {
    128_000
}
fn default_warning_ratio() -> f64 {
    0.30
}
fn default_critical_ratio() -> f64 {
    0.75
}
fn default_optimal_ratio() -> f64 {
    0.30
}
fn default_idle_ttl_hours() -> u64 {
    24
}
fn default_sweep_interval_secs() -> u64 {
    3600
}
fn default_word_weight() -> f64 {
    1.3
}
fn default_char_weight() -> f64 {
    0.1
}

impl BudgetConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            ceiling: default_ceiling(),
            warning_ratio: default_warning_ratio(),
            critical_ratio: default_critical_ratio(),
            optimal_ratio: default_optimal_ratio(),
            idle_ttl_hours: default_idle_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
            word_weight: default_word_weight(),
            char_weight: default_char_weight(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `HELIX_CONFIG` or the default path
    /// (~/.helix/config.toml), then fill missing API keys from the
    /// environment:
    /// - `HELIX_<NAME>_API_KEY` (highest priority)
    /// - the provider's well-known variable (`OPENAI_API_KEY`, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("HELIX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Fill unset backend credentials using `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (name, backend) in self.backends.iter_mut() {
            if backend.api_key.is_some() {
                continue;
            }
            let scoped = format!(
                "HELIX_{}_API_KEY",
                name.to_ascii_uppercase().replace('-', "_")
            );
            backend.api_key = lookup(&scoped).or_else(|| {
                well_known_key_var(name).and_then(|var| lookup(var))
            });
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".helix")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let mut priorities = HashSet::new();
        for (name, backend) in &self.backends {
            if backend.priority == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{name}.priority must be >= 1"
                )));
            }
            if backend.max_retries == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{name}.max_retries must be >= 1"
                )));
            }
            if backend.enabled && !priorities.insert(backend.priority) {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{name}.priority {} is already taken",
                    backend.priority
                )));
            }
        }

        for tier in Tier::ALL {
            if let Some(unknown) = self
                .access
                .allowed(tier)
                .iter()
                .find(|name| !self.backends.contains_key(name.as_str()))
            {
                return Err(ConfigError::ValidationError(format!(
                    "access.{tier} names unknown backend '{unknown}'"
                )));
            }
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be >= 1".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be >= 1".into(),
            ));
        }

        let b = &self.budget;
        if b.ceiling == 0 {
            return Err(ConfigError::ValidationError(
                "budget.ceiling must be > 0".into(),
            ));
        }
        if !(0.0 < b.warning_ratio && b.warning_ratio < b.critical_ratio && b.critical_ratio < 1.0) {
            return Err(ConfigError::ValidationError(
                "budget ratios must satisfy 0 < warning_ratio < critical_ratio < 1".into(),
            ));
        }
        if b.optimal_ratio <= 0.0 {
            return Err(ConfigError::ValidationError(
                "budget.optimal_ratio must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Backends that are switched on.
    pub fn enabled_backends(&self) -> impl Iterator<Item = (&String, &BackendConfig)> {
        self.backends.iter().filter(|(_, b)| b.enabled)
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_temperature: default_temperature(),
            backends: default_backends(),
            access: AccessConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            budget: BudgetConfig::default(),
        }
    }
}

/// The environment variable a provider's own tooling uses for its key.
fn well_known_key_var(backend_name: &str) -> Option<&'static str> {
    match backend_name {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        _ => None,
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

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
