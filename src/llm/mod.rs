//! LLM provider abstraction.
//!
//! Three providers are configured: Gemini and OpenAI are real network APIs,
//! Abacus is a precision-focused persona served through the Gemini transport
//! with its own system instruction. The conversation coordinator only sees
//! the [`LlmClient`] trait and the fixed [`ProviderId::ALL`] slot order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderEndpoints;

pub mod abacus;
pub mod gemini;
pub mod openai;

pub use abacus::AbacusClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Errors raised by a single provider call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Network(e.to_string())
    }
}

/// Identity of a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "abacus")]
    Abacus,
}

impl ProviderId {
    /// Slot order used for every turn and every set of log channels.
    pub const ALL: [ProviderId; 3] = [ProviderId::Gemini, ProviderId::OpenAi, ProviderId::Abacus];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
            ProviderId::Abacus => "abacus",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "Gemini",
            ProviderId::OpenAi => "OpenAI",
            ProviderId::Abacus => "Abacus",
        }
    }

    /// Placeholder returned instead of a network call when no key is configured.
    pub fn missing_key_notice(&self) -> &'static str {
        match self {
            ProviderId::Gemini => {
                "Gemini API Key not provided. Please set it in the Custom Instructions panel."
            }
            ProviderId::OpenAi => {
                "OpenAI API Key not provided. Please set it in the Custom Instructions panel."
            }
            ProviderId::Abacus => {
                "Gemini API Key (used for Abacus simulation) not provided. Please set it in the Custom Instructions panel."
            }
        }
    }

    /// Prefix for an inline per-provider error.
    pub fn error_prefix(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "Error from Gemini API",
            ProviderId::OpenAi => "Error from OpenAI API",
            ProviderId::Abacus => "Error from Abacus (simulated via Gemini)",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ProviderId::Gemini => 0,
            ProviderId::OpenAi => 1,
            ProviderId::Abacus => 2,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderId::Gemini),
            "openai" => Ok(ProviderId::OpenAi),
            "abacus" => Ok(ProviderId::Abacus),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Per-provider credentials supplied at runtime.
///
/// Abacus has no key of its own; it borrows the Gemini key.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub openai: Option<String>,
}

impl Credentials {
    /// The key a provider call should use, if one is configured.
    pub fn for_provider(&self, provider: ProviderId) -> Option<&str> {
        let key = match provider {
            ProviderId::Gemini | ProviderId::Abacus => self.gemini.as_deref(),
            ProviderId::OpenAi => self.openai.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        ProviderId::ALL
            .iter()
            .all(|p| self.for_provider(*p).is_none())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("gemini", &redact(&self.gemini))
            .field("openai", &redact(&self.openai))
            .finish()
    }
}

/// A provider backend: one prompt in, one text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> ProviderId;

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, LlmError>;
}

/// The three provider clients, addressable by [`ProviderId`].
#[derive(Clone)]
pub struct ProviderSet {
    clients: [Arc<dyn LlmClient>; 3],
}

impl ProviderSet {
    pub fn new(
        gemini: Arc<dyn LlmClient>,
        openai: Arc<dyn LlmClient>,
        abacus: Arc<dyn LlmClient>,
    ) -> Self {
        debug_assert_eq!(gemini.provider(), ProviderId::Gemini);
        debug_assert_eq!(openai.provider(), ProviderId::OpenAi);
        debug_assert_eq!(abacus.provider(), ProviderId::Abacus);
        Self {
            clients: [gemini, openai, abacus],
        }
    }

    /// Build the HTTP-backed clients. Gemini and Abacus share one transport.
    pub fn http(endpoints: &ProviderEndpoints) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(endpoints.request_timeout)
            .user_agent(concat!("triad-control/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let gemini = Arc::new(GeminiClient::new(
            http.clone(),
            &endpoints.gemini_base_url,
            &endpoints.gemini_model,
        ));
        let openai = Arc::new(OpenAiClient::new(
            http,
            &endpoints.openai_base_url,
            &endpoints.openai_model,
        ));
        let abacus = Arc::new(AbacusClient::new(Arc::clone(&gemini)));

        Ok(Self::new(gemini, openai, abacus))
    }

    pub fn get(&self, provider: ProviderId) -> &Arc<dyn LlmClient> {
        &self.clients[provider.index()]
    }
}

/// Pull the `error.message` field out of a JSON error body, if present.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
}
