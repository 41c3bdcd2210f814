//! Service configuration from command-line flags and environment variables.
//!
//! Every flag has an environment fallback, so the service can be configured
//! entirely through a `.env` file. Flags win over the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::cache::{CacheConfig, EvictionPolicy};
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("cache max size must be at least 1")]
    ZeroMaxSize,

    #[error("upstream timeout must be at least 1 second")]
    ZeroTimeout,
}

/// Loads `.env` from the working directory or one of its parents.
///
/// No file at all is `Ok(None)`. A file that exists but cannot be read or
/// parsed is an error for the caller to report.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    skip_missing(dotenvy::dotenv())
}

fn skip_missing<T>(result: Result<T, dotenvy::Error>) -> Result<Option<T>, dotenvy::Error> {
    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Runtime configuration for the `promptcache` binary.
#[derive(Clone, Parser)]
#[command(
    name = "promptcache",
    version,
    about = "Cache-fronted prompt relay to an OpenAI-compatible API"
)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "PROMPTCACHE_BIND", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// SQLite file holding request records. Created on first start.
    #[arg(long, env = "DATABASE_PATH", default_value = "promptcache.db")]
    pub database_path: PathBuf,

    /// Seconds a cached response stays fresh.
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 3600)]
    pub cache_ttl_seconds: u64,

    /// Entry count above which an insert sweeps expired entries.
    #[arg(long, env = "CACHE_MAX_SIZE", default_value_t = 1000)]
    pub cache_max_size: usize,

    /// Also evict the oldest fresh entries so the cache never stays above its max size.
    #[arg(long, env = "CACHE_STRICT_EVICTION")]
    pub strict_eviction: bool,

    /// API key for the upstream API.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Model name sent with every completion request.
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Per-call timeout for the upstream API, in seconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECONDS", default_value_t = 60)]
    pub upstream_timeout_seconds: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("database_path", &self.database_path)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("cache_max_size", &self.cache_max_size)
            .field("strict_eviction", &self.strict_eviction)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .finish()
    }
}

impl Config {
    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_max_size == 0 {
            return Err(ConfigError::ZeroMaxSize);
        }
        if self.upstream_timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        let eviction = if self.strict_eviction {
            EvictionPolicy::OldestFirst
        } else {
            EvictionPolicy::ExpiredOnly
        };
        CacheConfig::default()
            .ttl(Duration::from_secs(self.cache_ttl_seconds))
            .max_size(self.cache_max_size)
            .eviction(eviction)
    }

    /// Upstream client settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingApiKey`] when no non-empty key was given.
    pub fn openai_config(&self) -> Result<OpenAiConfig, ConfigError> {
        let api_key = self
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(OpenAiConfig {
            api_key: api_key.to_owned(),
            base_url: self.openai_base_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.upstream_timeout_seconds),
        })
    }
}
