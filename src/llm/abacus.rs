//! Abacus: a precision-focused provider served by the Gemini transport.

use std::sync::Arc;

use async_trait::async_trait;

use super::{GeminiClient, LlmClient, LlmError, ProviderId};

pub const ABACUS_SYSTEM_INSTRUCTION: &str = "You are Abacus, a highly precise and analytical AI. Your responses must be data-driven, quantitative, and logical. Avoid creative, speculative, or conversational language. Focus on facts, structured data, and direct, efficient answers to fulfill the user's prompt.";

pub struct AbacusClient {
    gemini: Arc<GeminiClient>,
}

impl AbacusClient {
    pub fn new(gemini: Arc<GeminiClient>) -> Self {
        Self { gemini }
    }
}

#[async_trait]
impl LlmClient for AbacusClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Abacus
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> Result<String, LlmError> {
        self.gemini
            .generate(api_key, prompt, Some(ABACUS_SYSTEM_INSTRUCTION))
            .await
    }
}
