//! Configuration management for Triad Control.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `ORCHESTRATOR_URL` - Optional. Base URL of the remote orchestration service.
//!   Defaults to `https://api.andiegogiap.com/v1`.
//! - `ORCHESTRATOR_TOKEN` - Optional. Bearer token sent with mission and ledger calls.
//! - `GEMINI_API_KEY` / `OPENAI_API_KEY` - Optional. Initial provider credentials;
//!   both can be replaced at runtime through the control API.
//! - `GEMINI_BASE_URL` / `GEMINI_MODEL` - Optional. Defaults to the public
//!   Generative Language API and `gemini-2.5-flash`.
//! - `OPENAI_BASE_URL` / `OPENAI_MODEL` - Optional. Defaults to `https://api.openai.com/v1`
//!   and `gpt-3.5-turbo`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Timeout for provider calls. Defaults to `120`.
//! - `DEFAULT_PERSONA` - Optional. Persona the conversation starts with. Defaults to `LYRA`.

use std::time::Duration;

use thiserror::Error;

use crate::llm::Credentials;

pub const DEFAULT_ORCHESTRATOR_URL: &str = "https://api.andiegogiap.com/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the provider clients send their requests.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub openai_base_url: String,
    pub openai_model: String,
    /// Timeout applied to every provider request
    pub request_timeout: Duration,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Remote orchestration service settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// Bearer token for mission and ledger calls
    pub token: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            token: None,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Remote orchestration service
    pub orchestrator: OrchestratorConfig,

    /// Provider endpoints and models
    pub endpoints: ProviderEndpoints,

    /// Credentials the service starts with
    pub credentials: Credentials,

    /// Persona selected at startup
    pub default_persona: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric or URL variable cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let orchestrator = OrchestratorConfig {
            base_url: base_url_var("ORCHESTRATOR_URL", DEFAULT_ORCHESTRATOR_URL)?,
            token: non_empty_var("ORCHESTRATOR_TOKEN"),
        };

        let request_timeout = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), format!("{}", e))
                })
            })
            .transpose()?
            .unwrap_or(120);

        let endpoints = ProviderEndpoints {
            gemini_base_url: base_url_var("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL)?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            openai_base_url: base_url_var("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            request_timeout: Duration::from_secs(request_timeout),
        };

        let credentials = Credentials {
            gemini: non_empty_var("GEMINI_API_KEY"),
            openai: non_empty_var("OPENAI_API_KEY"),
        };

        let default_persona =
            std::env::var("DEFAULT_PERSONA").unwrap_or_else(|_| "LYRA".to_string());

        Ok(Self {
            host,
            port,
            orchestrator,
            endpoints,
            credentials,
            default_persona,
        })
    }

    /// Create a config pointing at custom endpoints (useful for testing).
    pub fn new(orchestrator_url: &str, endpoints: ProviderEndpoints) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            orchestrator: OrchestratorConfig {
                base_url: orchestrator_url.trim_end_matches('/').to_string(),
                token: None,
            },
            endpoints,
            credentials: Credentials::default(),
            default_persona: "LYRA".to_string(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn base_url_var(name: &str, default: &str) -> Result<String, ConfigError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    parse_base_url(&raw).map_err(|e| ConfigError::InvalidValue(name.to_string(), e))
}

fn parse_base_url(value: &str) -> Result<String, String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(format!("expected an http(s) URL, got: {}", value))
    }
}
