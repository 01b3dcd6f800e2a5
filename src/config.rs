use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::embeddings::EmbeddingProvider;
use crate::embeddings::FreshnessPolicy;
use crate::rag::RetrievalMethod;

/// Environment variables consulted (in order) for the API credential
pub const API_KEY_ENV_VARS: [&str; 2] = ["NEXUS_API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub backtrace: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            backtrace: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    /// Shared credential for both generation and embedding calls
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProvider,
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    /// Maximum number of in-flight embedding requests during a cache rebuild
    pub rebuild_concurrency: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "text-embedding-004".to_string(),
            dimension: 768,
            timeout_secs: 30,
            rebuild_concurrency: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub method: RetrievalMethod,
    pub lexical_top_k: usize,
    pub vector_top_k: usize,
    /// Documents returned when lexical terms are empty or the cache is empty
    pub fallback_top_k: usize,
    /// Similarity floor applied before truncation; unset keeps plain top-k
    pub min_similarity: Option<f32>,
    pub history_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            method: RetrievalMethod::Auto,
            lexical_top_k: 3,
            vector_top_k: 4,
            fallback_top_k: 3,
            min_similarity: None,
            history_turns: 6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub freshness: FreshnessPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    /// JSON file holding the document list; the built-in seed is used when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingsConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub knowledge_base: KnowledgeBaseConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            tracing::warn!("No config file found, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty())
        {
            self.llm.api_key = key;
        }
    }

    /// Reject settings that would make every call time out at once or
    /// retrieval return nothing
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: String| Err(crate::NexusError::ConfigError(msg));

        if self.llm.timeout_secs == 0 {
            return invalid("llm.timeout_secs must be greater than 0".to_string());
        }
        if self.embeddings.timeout_secs == 0 {
            return invalid("embeddings.timeout_secs must be greater than 0".to_string());
        }
        if self.embeddings.dimension == 0 {
            return invalid("embeddings.dimension must be greater than 0".to_string());
        }
        if self.embeddings.rebuild_concurrency == 0 {
            return invalid("embeddings.rebuild_concurrency must be greater than 0".to_string());
        }

        let retrieval = &self.retrieval;
        for (name, value) in [
            ("lexical_top_k", retrieval.lexical_top_k),
            ("vector_top_k", retrieval.vector_top_k),
            ("fallback_top_k", retrieval.fallback_top_k),
        ] {
            if value == 0 {
                return invalid(format!("retrieval.{name} must be greater than 0"));
            }
        }
        if let Some(floor) = retrieval.min_similarity {
            if !floor.is_finite() || !(-1.0..=1.0).contains(&floor) {
                return invalid(format!(
                    "retrieval.min_similarity must be within [-1, 1], got {floor}"
                ));
            }
        }
        Ok(())
    }

    /// The API credential, or the configuration error when it is absent
    pub fn api_key(&self) -> crate::Result<&str> {
        let key = self.llm.api_key.trim();
        if key.is_empty() {
            Err(crate::NexusError::MissingCredential)
        } else {
            Ok(key)
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_ok()
    }

    /// Credential with everything but the last four characters masked
    pub fn masked_api_key(&self) -> String {
        let key = self.llm.api_key.trim();
        if key.is_empty() {
            return "<not set>".to_string();
        }
        let visible: String = key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{visible}")
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embeddings.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_retrieval_settings() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.lexical_top_k, 3);
        assert_eq!(config.retrieval.vector_top_k, 4);
        assert_eq!(config.retrieval.fallback_top_k, 3);
        assert_eq!(config.retrieval.history_turns, 6);
        assert!(config.retrieval.min_similarity.is_none());
        assert_eq!(config.cache.freshness, FreshnessPolicy::DocumentCount);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = AppConfig::default();
        assert!(matches!(
            config.api_key(),
            Err(crate::NexusError::MissingCredential)
        ));
        assert_eq!(config.masked_api_key(), "<not set>");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[llm]
api_key = "abcd1234"

[retrieval]
method = "lexical"
min_similarity = 0.4

[cache]
freshness = "content_hash"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.retrieval.method, RetrievalMethod::Lexical);
        assert_eq!(config.retrieval.min_similarity, Some(0.4));
        assert_eq!(config.retrieval.vector_top_k, 4);
        assert_eq!(config.cache.freshness, FreshnessPolicy::ContentHash);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert!(config.has_api_key());
    }

    #[test]
    fn test_masked_api_key_shows_suffix_only() {
        let mut config = AppConfig::default();
        config.llm.api_key = "secret-key-9876".to_string();
        assert_eq!(config.masked_api_key(), "****9876");
    }

    #[test]
    fn test_zero_timeout_is_rejected_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm]\ntimeout_secs = 0").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(crate::NexusError::ConfigError(ref msg)) if msg.contains("llm.timeout_secs")
        ));
    }

    #[test]
    fn test_nan_similarity_floor_is_rejected_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval]\nmin_similarity = nan").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(crate::NexusError::ConfigError(ref msg)) if msg.contains("min_similarity")
        ));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.retrieval.min_similarity = Some(1.5);
        assert!(config.validate().is_err());
        config.retrieval.min_similarity = Some(-1.0);
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.embeddings.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retrieval.vector_top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(crate::NexusError::ConfigError(ref msg)) if msg.contains("vector_top_k")
        ));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval\nmethod = ").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(crate::NexusError::TomlParsing(_))
        ));
    }
}
