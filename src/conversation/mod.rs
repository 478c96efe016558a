//! Multi-provider conversation coordinator.
//!
//! One user message becomes one composed prompt that is sent to every
//! provider at the same time. The turn is appended immediately with all
//! providers pending and finalized in a single step once every call has
//! settled, in the fixed Gemini, OpenAI, Abacus slot order.
//!
//! A provider without a key answers locally with a placeholder, a provider
//! that fails answers with an inline error string, and neither affects the
//! other slots. Only a prompt composition failure is surfaced globally, via
//! the [`Notifier`].

mod turn;

pub use turn::{AlreadyFinal, ConversationTurn, ProviderReply, Vote};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::llm::{Credentials, ProviderId, ProviderSet};
use crate::notify::{NoticeSource, Notifier};
use crate::persona::{compose_prompt, Persona};

const BOOKMARK_EXCERPT_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a response is already in progress")]
    Busy,

    #[error("turn {index} does not exist (history has {len} turns)")]
    TurnOutOfRange { index: usize, len: usize },
}

/// History plus its overlay annotations.
///
/// Bookmarks and votes are keyed by turn index. Turns are never removed, so
/// indices stay stable for the life of a persona session.
#[derive(Debug)]
struct Conversation {
    persona: Persona,
    turns: Vec<ConversationTurn>,
    bookmarks: BTreeSet<usize>,
    votes: BTreeMap<usize, Vote>,
    responding: bool,
    /// Bumped on persona switch so sends from the old session are discarded.
    epoch: u64,
}

impl Conversation {
    fn new(persona: Persona) -> Self {
        Self {
            persona,
            turns: Vec::new(),
            bookmarks: BTreeSet::new(),
            votes: BTreeMap::new(),
            responding: false,
            epoch: 0,
        }
    }

    fn check_index(&self, index: usize) -> Result<(), ChatError> {
        if index < self.turns.len() {
            Ok(())
        } else {
            Err(ChatError::TurnOutOfRange {
                index,
                len: self.turns.len(),
            })
        }
    }
}

/// Read-only projection of the conversation for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub persona: Persona,
    pub turns: Vec<ConversationTurn>,
    pub bookmarks: Vec<usize>,
    pub votes: BTreeMap<usize, Vote>,
    pub responding: bool,
}

/// Short form of a bookmarked turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkDigest {
    pub index: usize,
    pub excerpt: String,
}

/// A turn that has been appended but not yet answered.
#[derive(Debug)]
pub struct PendingSend {
    pub index: usize,
    epoch: u64,
    text: String,
    persona: Persona,
    credentials: Credentials,
}

#[derive(Clone)]
pub struct Coordinator {
    providers: ProviderSet,
    credentials: Arc<RwLock<Credentials>>,
    state: Arc<RwLock<Conversation>>,
    notifier: Notifier,
}

impl Coordinator {
    pub fn new(
        providers: ProviderSet,
        credentials: Credentials,
        persona: Persona,
        notifier: Notifier,
    ) -> Self {
        Self {
            providers,
            credentials: Arc::new(RwLock::new(credentials)),
            state: Arc::new(RwLock::new(Conversation::new(persona))),
            notifier,
        }
    }

    /// Replace the runtime credentials. Applies to sends started afterwards.
    pub async fn set_credentials(&self, credentials: Credentials) {
        tracing::info!(credentials = ?credentials, "Provider credentials updated");
        *self.credentials.write().await = credentials;
    }

    /// Start a fresh session with another persona. History and annotations are cleared.
    pub async fn switch_persona(&self, persona: Persona) {
        let mut state = self.state.write().await;
        let epoch = state.epoch + 1;
        tracing::info!(persona = %persona.name, epoch, "Switching persona");
        *state = Conversation::new(persona);
        state.epoch = epoch;
    }

    pub async fn is_responding(&self) -> bool {
        self.state.read().await.responding
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        let state = self.state.read().await;
        ConversationSnapshot {
            persona: state.persona.clone(),
            turns: state.turns.clone(),
            bookmarks: state.bookmarks.iter().copied().collect(),
            votes: state.votes.clone(),
            responding: state.responding,
        }
    }

    /// Send a message and wait until its turn is finalized. Returns the turn index.
    pub async fn send(&self, text: &str) -> Result<usize, ChatError> {
        let pending = self.begin_send(text).await?;
        Ok(self.complete_send(pending).await)
    }

    /// Append a pending turn and mark the coordinator as responding.
    ///
    /// Rejects empty messages and a second send while one is in flight.
    pub async fn begin_send(&self, text: &str) -> Result<PendingSend, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let credentials = self.credentials.read().await.clone();

        let mut state = self.state.write().await;
        if state.responding {
            return Err(ChatError::Busy);
        }
        state.responding = true;
        state.turns.push(ConversationTurn::pending(text));
        let index = state.turns.len() - 1;
        tracing::debug!(index, persona = %state.persona.name, "Turn appended");

        Ok(PendingSend {
            index,
            epoch: state.epoch,
            text: text.to_string(),
            persona: state.persona.clone(),
            credentials,
        })
    }

    /// Fan the prompt out to every provider and finalize the turn.
    pub async fn complete_send(&self, pending: PendingSend) -> usize {
        let prompt = match compose_prompt(&pending.persona, &pending.text) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.notifier.notify(
                    NoticeSource::Conversation,
                    format!("An error occurred while communicating with the LLMs: {}", e),
                );
                let failed = || ProviderReply::Failed(ProviderReply::FETCH_FAILED_TEXT.to_string());
                self.finish(&pending, [failed(), failed(), failed()]).await;
                return pending.index;
            }
        };

        let credentials = &pending.credentials;
        let (gemini, openai, abacus) = tokio::join!(
            self.call_provider(ProviderId::Gemini, credentials, &prompt),
            self.call_provider(ProviderId::OpenAi, credentials, &prompt),
            self.call_provider(ProviderId::Abacus, credentials, &prompt),
        );

        self.finish(&pending, [gemini, openai, abacus]).await;
        pending.index
    }

    async fn call_provider(
        &self,
        provider: ProviderId,
        credentials: &Credentials,
        prompt: &str,
    ) -> ProviderReply {
        let Some(api_key) = credentials.for_provider(provider) else {
            tracing::debug!(provider = %provider, "No credential configured; skipping call");
            return ProviderReply::Unconfigured(provider.missing_key_notice().to_string());
        };

        match self.providers.get(provider).complete(api_key, prompt).await {
            Ok(text) => {
                tracing::debug!(provider = %provider, len = text.len(), "Provider replied");
                ProviderReply::Text(text)
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Provider call failed");
                ProviderReply::Failed(format!("{}: {}", provider.error_prefix(), e))
            }
        }
    }

    async fn finish(&self, pending: &PendingSend, replies: [ProviderReply; 3]) {
        let mut state = self.state.write().await;
        if state.epoch != pending.epoch {
            tracing::debug!(
                index = pending.index,
                "Discarding replies for a conversation that was reset"
            );
            return;
        }
        match state.turns.get_mut(pending.index) {
            Some(turn) => {
                if turn.finalize(replies).is_err() {
                    tracing::error!(index = pending.index, "Turn was already finalized");
                }
            }
            None => tracing::error!(index = pending.index, "Pending turn vanished"),
        }
        state.responding = false;
    }

    /// Toggle a bookmark. Returns whether the turn is bookmarked afterwards.
    pub async fn toggle_bookmark(&self, index: usize) -> Result<bool, ChatError> {
        let mut state = self.state.write().await;
        state.check_index(index)?;
        if state.bookmarks.remove(&index) {
            Ok(false)
        } else {
            state.bookmarks.insert(index);
            Ok(true)
        }
    }

    /// Cast a vote. Repeating the current vote clears it. Returns the resulting vote.
    pub async fn vote(&self, index: usize, vote: Vote) -> Result<Option<Vote>, ChatError> {
        let mut state = self.state.write().await;
        state.check_index(index)?;
        if state.votes.get(&index) == Some(&vote) {
            state.votes.remove(&index);
            Ok(None)
        } else {
            state.votes.insert(index, vote);
            Ok(Some(vote))
        }
    }

    pub async fn copy_text(&self, index: usize) -> Result<String, ChatError> {
        let state = self.state.read().await;
        state.check_index(index)?;
        Ok(state.turns[index].copy_text())
    }

    /// Bookmarked turns in history order, with the user text shortened.
    pub async fn bookmarked_context(&self) -> Vec<BookmarkDigest> {
        let state = self.state.read().await;
        state
            .bookmarks
            .iter()
            .filter_map(|&index| {
                let turn = state.turns.get(index)?;
                Some(BookmarkDigest {
                    index,
                    excerpt: excerpt(turn.user(), BOOKMARK_EXCERPT_CHARS),
                })
            })
            .collect()
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmClient, LlmError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::assert_ok;

    struct ScriptedClient {
        provider: ProviderId,
        outcome: Result<String, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn ok(provider: ProviderId, text: &str) -> Arc<Self> {
            Self::with(provider, Ok(text.to_string()), Duration::ZERO)
        }

        fn failing(provider: ProviderId, message: &str) -> Arc<Self> {
            Self::with(provider, Err(message.to_string()), Duration::ZERO)
        }

        fn with(
            provider: ProviderId,
            outcome: Result<String, String>,
            delay: Duration,
        ) -> Arc<Self> {
            Arc::new(Self {
                provider,
                outcome,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn provider(&self) -> ProviderId {
            self.provider
        }

        async fn complete(&self, _api_key: &str, prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("From the perspective of the AI agent"));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone().map_err(LlmError::Network)
        }
    }

    fn keys() -> Credentials {
        Credentials {
            gemini: Some("g".to_string()),
            openai: Some("o".to_string()),
        }
    }

    fn coordinator(
        clients: [Arc<ScriptedClient>; 3],
        credentials: Credentials,
    ) -> (Coordinator, Notifier) {
        let [g, o, a] = clients;
        let notifier = Notifier::default();
        let providers = ProviderSet::new(g, o, a);
        let coordinator = Coordinator::new(
            providers,
            credentials,
            Persona::new("LYRA", "The Orchestration Architect"),
            notifier.clone(),
        );
        (coordinator, notifier)
    }

    fn healthy() -> [Arc<ScriptedClient>; 3] {
        [
            ScriptedClient::ok(ProviderId::Gemini, "gemini says"),
            ScriptedClient::ok(ProviderId::OpenAi, "openai says"),
            ScriptedClient::ok(ProviderId::Abacus, "abacus says"),
        ]
    }

    #[tokio::test]
    async fn send_fills_every_slot() {
        let (coordinator, _) = coordinator(healthy(), keys());
        let index = coordinator.send("  hello  ").await.unwrap();
        assert_eq!(index, 0);

        let snapshot = coordinator.snapshot().await;
        let turn = &snapshot.turns[0];
        assert_eq!(turn.user(), "hello");
        assert!(!turn.is_pending());
        assert_eq!(turn.reply(ProviderId::Gemini).text(), "gemini says");
        assert_eq!(turn.reply(ProviderId::OpenAi).text(), "openai says");
        assert_eq!(turn.reply(ProviderId::Abacus).text(), "abacus says");
        assert!(!snapshot.responding);
    }

    #[tokio::test]
    async fn no_credentials_means_no_network_calls() {
        let clients = healthy();
        let probes = clients.clone();
        let (coordinator, _) = coordinator(clients, Credentials::default());
        coordinator.send("hello").await.unwrap();

        assert!(probes.iter().all(|c| c.calls() == 0));
        let snapshot = coordinator.snapshot().await;
        let turn = &snapshot.turns[0];
        for provider in ProviderId::ALL {
            assert_eq!(
                turn.reply(provider),
                &ProviderReply::Unconfigured(provider.missing_key_notice().to_string())
            );
        }
    }

    #[tokio::test]
    async fn abacus_is_unconfigured_without_gemini_key() {
        let clients = healthy();
        let probes = clients.clone();
        let credentials = Credentials {
            gemini: None,
            openai: Some("o".to_string()),
        };
        let (coordinator, _) = coordinator(clients, credentials);
        coordinator.send("hello").await.unwrap();

        assert_eq!(probes[0].calls(), 0);
        assert_eq!(probes[1].calls(), 1);
        assert_eq!(probes[2].calls(), 0);
        let turn = coordinator.snapshot().await.turns[0].clone();
        assert!(matches!(turn.reply(ProviderId::Abacus), ProviderReply::Unconfigured(_)));
        assert_eq!(turn.reply(ProviderId::OpenAi).text(), "openai says");
    }

    #[tokio::test]
    async fn one_failure_leaves_other_slots_intact() {
        let clients = [
            ScriptedClient::ok(ProviderId::Gemini, "gemini says"),
            ScriptedClient::failing(ProviderId::OpenAi, "boom"),
            ScriptedClient::ok(ProviderId::Abacus, "abacus says"),
        ];
        let (coordinator, notifier) = coordinator(clients, keys());
        let mut notices = notifier.subscribe();
        coordinator.send("hello").await.unwrap();

        let turn = coordinator.snapshot().await.turns[0].clone();
        assert_eq!(turn.reply(ProviderId::Gemini).text(), "gemini says");
        assert_eq!(
            turn.reply(ProviderId::OpenAi),
            &ProviderReply::Failed("Error from OpenAI API: boom".to_string())
        );
        assert_eq!(turn.reply(ProviderId::Abacus).text(), "abacus says");
        assert!(notices.try_recv().is_err(), "provider failures stay local");
    }

    #[tokio::test]
    async fn slot_order_ignores_arrival_order() {
        let clients = [
            ScriptedClient::with(ProviderId::Gemini, Ok("slow".into()), Duration::from_millis(40)),
            ScriptedClient::with(
                ProviderId::OpenAi,
                Ok("medium".into()),
                Duration::from_millis(20),
            ),
            ScriptedClient::ok(ProviderId::Abacus, "fast"),
        ];
        let (coordinator, _) = coordinator(clients, keys());
        coordinator.send("race").await.unwrap();

        let turn = coordinator.snapshot().await.turns[0].clone();
        assert_eq!(turn.reply(ProviderId::Gemini).text(), "slow");
        assert_eq!(turn.reply(ProviderId::OpenAi).text(), "medium");
        assert_eq!(turn.reply(ProviderId::Abacus).text(), "fast");
    }

    #[tokio::test]
    async fn pending_turn_is_visible_before_completion() {
        let (coordinator, _) = coordinator(healthy(), keys());
        let pending = coordinator.begin_send("hello").await.unwrap();

        let snapshot = coordinator.snapshot().await;
        assert!(snapshot.responding);
        assert!(snapshot.turns[0].is_pending());
        assert_eq!(
            snapshot.turns[0].reply(ProviderId::Abacus).text(),
            ProviderReply::PENDING_TEXT
        );

        assert_eq!(coordinator.begin_send("again").await.unwrap_err(), ChatError::Busy);
        assert_eq!(coordinator.snapshot().await.turns.len(), 1);

        coordinator.complete_send(pending).await;
        assert!(!coordinator.is_responding().await);
        let next = assert_ok!(coordinator.begin_send("again").await);
        assert_eq!(next.index, 1);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_a_turn() {
        let (coordinator, _) = coordinator(healthy(), keys());
        assert_eq!(coordinator.send("   ").await.unwrap_err(), ChatError::EmptyMessage);
        assert!(coordinator.snapshot().await.turns.is_empty());
    }

    #[tokio::test]
    async fn compose_failure_marks_every_slot_and_notifies() {
        let clients = healthy();
        let probes = clients.clone();
        let (coordinator, notifier) = coordinator(clients, keys());
        coordinator.switch_persona(Persona::new("GHOST", "")).await;
        let mut notices = notifier.subscribe();

        coordinator.send("hello").await.unwrap();

        let turn = coordinator.snapshot().await.turns[0].clone();
        for provider in ProviderId::ALL {
            assert_eq!(turn.reply(provider).text(), ProviderReply::FETCH_FAILED_TEXT);
        }
        assert!(probes.iter().all(|c| c.calls() == 0));
        let notice = notices.recv().await.unwrap();
        assert!(notice
            .message
            .starts_with("An error occurred while communicating with the LLMs:"));
    }

    #[tokio::test]
    async fn persona_switch_discards_in_flight_replies() {
        let (coordinator, _) = coordinator(healthy(), keys());
        let pending = coordinator.begin_send("old question").await.unwrap();
        coordinator
            .switch_persona(Persona::new("DAN", "The Analyst"))
            .await;
        coordinator.complete_send(pending).await;

        let snapshot = coordinator.snapshot().await;
        assert_eq!(snapshot.persona.name, "DAN");
        assert!(snapshot.turns.is_empty());
        assert!(!snapshot.responding);
    }

    #[tokio::test]
    async fn double_bookmark_toggle_restores_membership() {
        let (coordinator, _) = coordinator(healthy(), keys());
        coordinator.send("one").await.unwrap();

        assert!(coordinator.toggle_bookmark(0).await.unwrap());
        assert_eq!(coordinator.snapshot().await.bookmarks, vec![0]);
        assert!(!coordinator.toggle_bookmark(0).await.unwrap());
        assert!(coordinator.snapshot().await.bookmarks.is_empty());
    }

    #[tokio::test]
    async fn repeated_vote_clears_it() {
        let (coordinator, _) = coordinator(healthy(), keys());
        coordinator.send("one").await.unwrap();

        assert_eq!(coordinator.vote(0, Vote::Up).await.unwrap(), Some(Vote::Up));
        assert_eq!(coordinator.vote(0, Vote::Up).await.unwrap(), None);
        assert_eq!(coordinator.vote(0, Vote::Up).await.unwrap(), Some(Vote::Up));
        assert_eq!(coordinator.vote(0, Vote::Down).await.unwrap(), Some(Vote::Down));
        assert_eq!(coordinator.snapshot().await.votes.get(&0), Some(&Vote::Down));
    }

    #[tokio::test]
    async fn annotations_reject_unknown_turns() {
        let (coordinator, _) = coordinator(healthy(), keys());
        assert_eq!(
            coordinator.toggle_bookmark(3).await.unwrap_err(),
            ChatError::TurnOutOfRange { index: 3, len: 0 }
        );
        assert!(coordinator.vote(0, Vote::Down).await.is_err());
        assert!(coordinator.copy_text(0).await.is_err());
    }

    #[tokio::test]
    async fn copy_text_renders_the_turn() {
        let (coordinator, _) = coordinator(healthy(), keys());
        coordinator.send("hello").await.unwrap();
        assert_eq!(
            coordinator.copy_text(0).await.unwrap(),
            "User: hello\n\n--- Gemini Response ---\ngemini says\n\n--- OpenAI Response ---\nopenai says\n\n--- Abacus Response ---\nabacus says"
        );
    }

    #[tokio::test]
    async fn bookmarked_context_shortens_long_messages() {
        let (coordinator, _) = coordinator(healthy(), keys());
        let long = "x".repeat(90);
        coordinator.send("short").await.unwrap();
        coordinator.send(&long).await.unwrap();
        coordinator.toggle_bookmark(1).await.unwrap();
        coordinator.toggle_bookmark(0).await.unwrap();

        let digest = coordinator.bookmarked_context().await;
        assert_eq!(digest.len(), 2);
        assert_eq!(digest[0].excerpt, "short");
        assert_eq!(digest[1].index, 1);
        assert_eq!(digest[1].excerpt, format!("{}...", "x".repeat(80)));
    }
}
