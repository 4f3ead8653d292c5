//! # Colloquy Config
//!
//! Unified single-file configuration for the Colloquy service.
//! A single `colloquy.yaml` configures the reasoning engine, runtime
//! behavior, storage, and the HTTP server.

mod loader;

pub use loader::{load_config, ConfigError};

use serde::Deserialize;

/// Top-level configuration schema
#[derive(Debug, Clone, Deserialize)]
pub struct ColloquyConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub stores: StoresConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for ColloquyConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            engine: EngineConfig::default(),
            runtime: RuntimeConfig::default(),
            stores: StoresConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Reasoning engine connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the process-wide default credential.
    /// Resolved once at startup; absence is not an error (a conversation
    /// may carry its own override).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Cycle behavior settings
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Max reasoning-engine rounds per response cycle
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Whether the pre-flight safety classifier gates the cycle
    #[serde(default)]
    pub enforce_safety: bool,
    /// Max persisted turns fed into the engine's context (0 = all)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            enforce_safety: false,
            history_limit: default_history_limit(),
        }
    }
}

fn default_max_tool_rounds() -> usize {
    4
}

fn default_history_limit() -> usize {
    50
}

/// Storage backend selection
#[derive(Debug, Clone, Deserialize)]
pub struct StoresConfig {
    /// `sqlite` (file database at `database_url`) or `memory`
    /// (in-memory sqlite, lost on restart)
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: default_database_url(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_database_url() -> String {
    "sqlite://colloquy.db?mode=rwc".to_string()
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}
