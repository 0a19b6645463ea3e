//! Handler rules and their predicates.
//!
//! A rule pairs a [`Predicate`] with a [`MessageHandler`]. Rules are kept
//! in registration order and every matching rule fires:
//! - `Always` → every message
//! - `FirstMessage` → the latest dialog holds exactly one message
//! - `Text` → case-insensitive equality with the whole message
//! - `TextContains` → case-insensitive whole-word match
//!
//! `FirstMessage` performs live API lookups each time it is evaluated, so
//! its answer reflects the dialog list at evaluation time, which may
//! already include messages newer than the one being dispatched.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::KworkApi;
use crate::pipeline::types::InboundMessage;

/// Characters trimmed from both ends of a word before `TextContains` compares it.
const WORD_PUNCTUATION: &[char] = &['.', ',', '!', '?', '-'];

/// When a rule fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every message.
    Always,
    /// The sender's first message in the most recent dialog.
    FirstMessage,
    /// Whole text equals the value, ignoring case.
    Text(String),
    /// Some whitespace-separated word equals the value, ignoring case and
    /// surrounding punctuation.
    TextContains(String),
}

impl Predicate {
    /// Evaluate against a message. May call the API (`FirstMessage`).
    pub async fn matches(&self, message: &InboundMessage, api: &dyn KworkApi) -> bool {
        match self {
            Self::Always => true,
            Self::FirstMessage => is_first_message(api).await,
            Self::Text(value) => text_equals(value, &message.text),
            Self::TextContains(value) => contains_word(value, &message.text),
        }
    }
}

/// Case-insensitive equality (Unicode lower-casing, so Cyrillic works).
pub fn text_equals(value: &str, text: &str) -> bool {
    value.to_lowercase() == text.to_lowercase()
}

/// Case-insensitive whole-word match with punctuation stripped from each word.
pub fn contains_word(word: &str, text: &str) -> bool {
    let needle = word.to_lowercase();
    text.to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(WORD_PUNCTUATION))
        .any(|token| token == needle)
}

/// True iff the most recently active dialog has exactly one message.
///
/// Lookup failures and an empty dialog list count as "not first".
pub async fn is_first_message(api: &dyn KworkApi) -> bool {
    let dialogs = match api.list_dialogs().await {
        Ok(dialogs) => dialogs,
        Err(e) => {
            warn!(error = %e, "First-message check: failed to list dialogs");
            return false;
        }
    };

    let Some(latest) = dialogs.first() else {
        return false;
    };

    match api.fetch_thread(&latest.username).await {
        Ok(thread) => {
            debug!(username = %latest.username, len = thread.len(), "First-message check");
            thread.len() == 1
        }
        Err(e) => {
            warn!(username = %latest.username, error = %e, "First-message check: failed to fetch thread");
            false
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// Action run for a matching message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: InboundMessage) -> anyhow::Result<()> {
        (self)(message).await
    }
}

/// A registered (predicate, handler) pair.
#[derive(Clone)]
pub struct Rule {
    pub predicate: Predicate,
    handler: Arc<dyn MessageHandler>,
}

impl Rule {
    pub fn new(predicate: Predicate, handler: impl MessageHandler + 'static) -> Self {
        Self {
            predicate,
            handler: Arc::new(handler),
        }
    }

    pub async fn handle(&self, message: InboundMessage) -> anyhow::Result<()> {
        self.handler.handle(message).await
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("predicate", &self.predicate)
            .finish_non_exhaustive()
    }
}
