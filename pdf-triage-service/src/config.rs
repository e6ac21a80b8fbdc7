use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::local_model::SamplingParams;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Optional at startup; requests fail with an error record without it.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub local_model_url: String,
    pub local_model_timeout: Duration,
    pub sampling: SamplingParams,
    pub archive_root: PathBuf,
    pub max_upload_mb: usize,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            local_model_url: "http://127.0.0.1:8080".to_string(),
            local_model_timeout: Duration::from_secs(120),
            sampling: SamplingParams::default(),
            archive_root: PathBuf::from("."),
            max_upload_mb: 100,
            port: 5000,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            openai_api_key: text("OPENAI_API_KEY"),
            openai_model: text("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            local_model_url: text("LOCAL_MODEL_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.local_model_url),
            local_model_timeout: Duration::from_secs(parse_or(
                &lookup,
                "LOCAL_MODEL_TIMEOUT_SECS",
                defaults.local_model_timeout.as_secs(),
            )),
            sampling: SamplingParams {
                temperature: parse_or(&lookup, "CLASSIFIER_TEMPERATURE", defaults.sampling.temperature),
                top_p: parse_or(&lookup, "CLASSIFIER_TOP_P", defaults.sampling.top_p),
                max_new_tokens: parse_or(
                    &lookup,
                    "CLASSIFIER_MAX_NEW_TOKENS",
                    defaults.sampling.max_new_tokens,
                ),
            },
            archive_root: text("ARCHIVE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.archive_root),
            max_upload_mb: parse_or(&lookup, "MAX_UPLOAD_MB", defaults.max_upload_mb),
            port: parse_or(&lookup, "PORT", defaults.port),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_or<T: FromStr + Copy>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}
