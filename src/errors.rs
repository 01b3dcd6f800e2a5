use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NexusError {
    #[error("API credential is not configured")]
    MissingCredential,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NexusError>;

/// Run an external call under a deadline, mapping expiry to `NexusError::Timeout`
pub async fn with_timeout<T, F>(what: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| NexusError::Timeout(format!("{what} after {}s", limit.as_secs_f32())))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_variants_display() {
        let errors = vec![
            NexusError::MissingCredential,
            NexusError::ConfigError("config".to_string()),
            NexusError::EmbeddingError("embedding".to_string()),
            NexusError::LlmError("llm".to_string()),
            NexusError::HttpError("http".to_string()),
            NexusError::Timeout("generate".to_string()),
            NexusError::KnowledgeBase("duplicate".to_string()),
        ];

        for error in &errors {
            let display = format!("{error}");
            assert!(!display.is_empty());
        }
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(NexusError::Timeout(msg)) if msg.contains("slow call")));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let value = with_timeout("fast call", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: NexusError = io_err.into();
        assert!(matches!(err, NexusError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: NexusError = json_err.into();
        assert!(matches!(err, NexusError::Serialization(_)));
    }
}
