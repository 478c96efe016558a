//! Conversation turns and per-provider replies.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use crate::llm::ProviderId;

/// Outcome of one provider for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum ProviderReply {
    /// Call still in flight
    Pending,
    /// The provider answered
    Text(String),
    /// No credential configured; no network call was made
    Unconfigured(String),
    /// The call failed; the message is rendered inline
    Failed(String),
}

impl ProviderReply {
    pub const PENDING_TEXT: &'static str = "Thinking...";
    pub const FETCH_FAILED_TEXT: &'static str = "Error fetching response.";

    pub fn text(&self) -> &str {
        match self {
            ProviderReply::Pending => Self::PENDING_TEXT,
            ProviderReply::Text(t) | ProviderReply::Unconfigured(t) | ProviderReply::Failed(t) => t,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ProviderReply::Pending)
    }
}

/// A turn's replies were already finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyFinal;

/// One user message plus every provider's reply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    user: String,
    replies: [ProviderReply; 3],
}

impl ConversationTurn {
    /// A fresh turn with every provider pending.
    pub fn pending(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            replies: [
                ProviderReply::Pending,
                ProviderReply::Pending,
                ProviderReply::Pending,
            ],
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn reply(&self, provider: ProviderId) -> &ProviderReply {
        &self.replies[provider.index()]
    }

    pub fn is_pending(&self) -> bool {
        self.replies.iter().any(ProviderReply::is_pending)
    }

    /// Replace every pending slot in one step. A turn is finalized once.
    pub fn finalize(&mut self, replies: [ProviderReply; 3]) -> Result<(), AlreadyFinal> {
        if !self.replies.iter().all(ProviderReply::is_pending) {
            return Err(AlreadyFinal);
        }
        self.replies = replies;
        Ok(())
    }

    /// Plain-text rendering of the whole turn, used by "copy thread".
    pub fn copy_text(&self) -> String {
        let mut text = format!("User: {}", self.user);
        for provider in ProviderId::ALL {
            text.push_str(&format!(
                "\n\n--- {} Response ---\n{}",
                provider.label(),
                self.reply(provider).text()
            ));
        }
        text.trim().to_string()
    }
}

struct RepliesView<'a>(&'a [ProviderReply; 3]);

impl Serialize for RepliesView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ProviderId::ALL.len()))?;
        for provider in ProviderId::ALL {
            map.serialize_entry(provider.as_str(), &self.0[provider.index()])?;
        }
        map.end()
    }
}

impl Serialize for ConversationTurn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut turn = serializer.serialize_struct("ConversationTurn", 2)?;
        turn.serialize_field("user", &self.user)?;
        turn.serialize_field("responses", &RepliesView(&self.replies))?;
        turn.end()
    }
}

/// Feedback on a turn. Absence of a vote is the third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Up,
    Down,
}
