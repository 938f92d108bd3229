//! Runtime configuration
//!
//! Built once at startup and handed to collaborator constructors.

use crate::error::{NlqError, Result};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ASTERIXDB_URL: &str = "http://localhost:19002/query/service";
pub const DEFAULT_HUGGINGFACE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/defog/sqlcoder-7b-2";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "sqlcoder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackendKind {
    HuggingFace,
    Ollama,
}

impl FromStr for LlmBackendKind {
    type Err = NlqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(LlmBackendKind::HuggingFace),
            "ollama" => Ok(LlmBackendKind::Ollama),
            other => Err(NlqError::Config(format!(
                "LLM_BACKEND must be huggingface or ollama, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for LlmBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmBackendKind::HuggingFace => write!(f, "huggingface"),
            LlmBackendKind::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// AsterixDB query service endpoint
    pub asterixdb_url: String,

    pub backend: LlmBackendKind,
    pub huggingface_api_key: Option<String>,
    pub huggingface_endpoint: String,
    pub ollama_url: String,
    pub ollama_model: String,

    /// Bound for metadata fetch and execution calls
    pub request_timeout: Duration,
    /// Bound for a single generation call
    pub generation_timeout: Duration,

    pub default_limit: NonZeroU32,

    /// Narrow prompt schema to the dataset the model names for the question
    pub narrow_schema: bool,
}

// Hand-written so the API key never reaches logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("asterixdb_url", &self.asterixdb_url)
            .field("backend", &self.backend)
            .field(
                "huggingface_api_key",
                &self.huggingface_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("huggingface_endpoint", &self.huggingface_endpoint)
            .field("ollama_url", &self.ollama_url)
            .field("ollama_model", &self.ollama_model)
            .field("request_timeout", &self.request_timeout)
            .field("generation_timeout", &self.generation_timeout)
            .field("default_limit", &self.default_limit)
            .field("narrow_schema", &self.narrow_schema)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asterixdb_url: DEFAULT_ASTERIXDB_URL.to_string(),
            backend: LlmBackendKind::HuggingFace,
            huggingface_api_key: None,
            huggingface_endpoint: DEFAULT_HUGGINGFACE_ENDPOINT.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            request_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(120),
            default_limit: NonZeroU32::new(50).unwrap_or(NonZeroU32::MIN),
            narrow_schema: false,
        }
    }
}

impl Config {
    /// Load from the process environment. The binary loads `.env` first.
    pub fn from_env() -> Result<Self> {
        let kv: HashMap<String, String> = std::env::vars().collect();
        Self::from_kv(&kv)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let backend = match non_empty(kv, "LLM_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.backend,
        };

        let default_limit = parse_u32(kv, "NLQ_DEFAULT_LIMIT", defaults.default_limit.get())?;
        let default_limit = NonZeroU32::new(default_limit).ok_or_else(|| {
            NlqError::Config("NLQ_DEFAULT_LIMIT must be greater than zero".to_string())
        })?;

        let narrow_schema = match non_empty(kv, "NLQ_NARROW_SCHEMA") {
            Some(v) => parse_bool(v).ok_or_else(|| {
                NlqError::Config("NLQ_NARROW_SCHEMA must be true or false".to_string())
            })?,
            None => defaults.narrow_schema,
        };

        let config = Self {
            asterixdb_url: non_empty(kv, "ASTERIXDB_URL")
                .map(str::to_string)
                .unwrap_or(defaults.asterixdb_url),
            backend,
            huggingface_api_key: non_empty(kv, "HUGGINGFACE_API_KEY").map(str::to_string),
            huggingface_endpoint: non_empty(kv, "HUGGINGFACE_MODEL_ENDPOINT")
                .map(str::to_string)
                .unwrap_or(defaults.huggingface_endpoint),
            ollama_url: non_empty(kv, "OLLAMA_URL")
                .map(str::to_string)
                .unwrap_or(defaults.ollama_url),
            ollama_model: non_empty(kv, "OLLAMA_MODEL")
                .map(str::to_string)
                .unwrap_or(defaults.ollama_model),
            request_timeout: Duration::from_secs(parse_u64(
                kv,
                "NLQ_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            generation_timeout: Duration::from_secs(parse_u64(
                kv,
                "NLQ_GENERATION_TIMEOUT_SECS",
                defaults.generation_timeout.as_secs(),
            )?),
            default_limit,
            narrow_schema,
        };
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks. Backend credentials are checked when the
    /// generator is built, so catalog-only commands run without them.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() || self.generation_timeout.is_zero() {
            return Err(NlqError::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn non_empty<'a>(kv: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    kv.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_u64(kv: &HashMap<String, String>, key: &'static str, default: u64) -> Result<u64> {
    match non_empty(kv, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| NlqError::Config(format!("{} must be an integer", key))),
    }
}

fn parse_u32(kv: &HashMap<String, String>, key: &'static str, default: u32) -> Result<u32> {
    match non_empty(kv, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<u32>()
            .map_err(|_| NlqError::Config(format!("{} must be an integer", key))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_with_api_key() {
        let config = Config::from_kv(&env(&[("HUGGINGFACE_API_KEY", "hf_test")])).unwrap();
        assert_eq!(config.asterixdb_url, DEFAULT_ASTERIXDB_URL);
        assert_eq!(config.backend, LlmBackendKind::HuggingFace);
        assert_eq!(config.default_limit.get(), 50);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.narrow_schema);
    }

    #[test]
    fn test_loads_without_backend_credentials() {
        let config = Config::from_kv(&env(&[("ASTERIXDB_URL", "http://cc:19002/query/service")])).unwrap();
        assert_eq!(config.backend, LlmBackendKind::HuggingFace);
        assert!(config.huggingface_api_key.is_none());
        assert_eq!(config.asterixdb_url, "http://cc:19002/query/service");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = Config::from_kv(&env(&[("NLQ_GENERATION_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, NlqError::Config(_)));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = Config::from_kv(&env(&[
            ("LLM_BACKEND", "ollama"),
            ("OLLAMA_MODEL", "codellama"),
            ("ASTERIXDB_URL", "http://cc:19002/query/service"),
        ]))
        .unwrap();
        assert_eq!(config.backend, LlmBackendKind::Ollama);
        assert_eq!(config.ollama_model, "codellama");
        assert_eq!(config.asterixdb_url, "http://cc:19002/query/service");
    }

    #[test]
    fn test_rejects_zero_limit_and_bad_numbers() {
        let zero = env(&[("LLM_BACKEND", "ollama"), ("NLQ_DEFAULT_LIMIT", "0")]);
        assert!(Config::from_kv(&zero).is_err());

        let bad = env(&[("LLM_BACKEND", "ollama"), ("NLQ_REQUEST_TIMEOUT_SECS", "soon")]);
        assert!(Config::from_kv(&bad).is_err());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = Config::from_kv(&env(&[("LLM_BACKEND", "openai")])).unwrap_err();
        assert!(err.to_string().contains("LLM_BACKEND"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config::from_kv(&env(&[("HUGGINGFACE_API_KEY", "hf_secret")])).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hf_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
