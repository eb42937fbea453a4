use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WhereaboutsConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

/// Settings for the OpenAI-compatible completion endpoint.
///
/// Extraction always runs at temperature 0; `temperature`, `max_tokens` and
/// `top_p` apply to response synthesis only.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub extraction_model: String,
    pub response_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub chat_top_k: usize,
    pub image_top_k: usize,
    /// Most recent conversation turns forwarded to synthesis.
    pub history_turns: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_whereabouts_dir()
            .join("index.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_whereabouts_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "clip-vit-base-patch32".into(),
            cache_dir,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.studio.nebius.ai/v1".into(),
            api_key_env: "NEBIUS_API_KEY".into(),
            extraction_model: "meta-llama/Meta-Llama-3.1-8B-Instruct-fast".into(),
            response_model: "meta-llama/Meta-Llama-3.1-70B-Instruct-fast".into(),
            temperature: 0.6,
            max_tokens: 512,
            top_p: 0.9,
            timeout_secs: 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chat_top_k: 3,
            image_top_k: 2,
            history_turns: 5,
        }
    }
}

/// Returns `~/.whereabouts/`
pub fn default_whereabouts_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".whereabouts")
}

/// Returns the default config file path: `~/.whereabouts/config.toml`
pub fn default_config_path() -> PathBuf {
    default_whereabouts_dir().join("config.toml")
}

impl WhereaboutsConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            WhereaboutsConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (WHEREABOUTS_DB, WHEREABOUTS_LOG_LEVEL,
    /// WHEREABOUTS_BASE_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WHEREABOUTS_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("WHEREABOUTS_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("WHEREABOUTS_BASE_URL") {
            self.generation.base_url = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Read the completion API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.generation.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = WhereaboutsConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.retrieval.chat_top_k, 3);
        assert_eq!(config.retrieval.image_top_k, 2);
        assert_eq!(config.retrieval.history_turns, 5);
        assert_eq!(config.embedding.provider, "local");
        assert!(config.storage.db_path.ends_with("index.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[generation]
base_url = "http://localhost:1234/v1"
max_tokens = 256

[retrieval]
chat_top_k = 5
"#;
        let config: WhereaboutsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.generation.base_url, "http://localhost:1234/v1");
        assert_eq!(config.generation.max_tokens, 256);
        assert_eq!(config.retrieval.chat_top_k, 5);
        // defaults still apply for unset fields
        assert_eq!(config.retrieval.image_top_k, 2);
        assert_eq!(config.generation.top_p, 0.9);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = WhereaboutsConfig::default();
        std::env::set_var("WHEREABOUTS_DB", "/tmp/override.db");
        std::env::set_var("WHEREABOUTS_LOG_LEVEL", "trace");
        std::env::set_var("WHEREABOUTS_BASE_URL", "http://127.0.0.1:9/v1");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.generation.base_url, "http://127.0.0.1:9/v1");

        // Clean up
        std::env::remove_var("WHEREABOUTS_DB");
        std::env::remove_var("WHEREABOUTS_LOG_LEVEL");
        std::env::remove_var("WHEREABOUTS_BASE_URL");
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = WhereaboutsConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.generation.api_key_env, "NEBIUS_API_KEY");
    }
}
