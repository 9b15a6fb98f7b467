//! Context Window Management.
//!
//! This module handles the "scarce resource" of the LLM context window. The
//! `ConversationStore` owns the role-tagged history of one chat session and
//! keeps it inside the token budget before every request.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::provider::CompletionClient;
use super::tokens::TokenEstimator;
use super::types::{Message, Role, SamplingParams};
use crate::audit::{AuditEvent, AuditSink};
use crate::error::{ChatError, Result};

/// Messages kept from the start of the conversation (persona + task framing).
pub const KEEP_HEAD: usize = 2;
/// Messages kept from the end of the conversation.
pub const KEEP_TAIL: usize = 5;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const SUMMARY_PROMPT: &str = "Summarize the following conversation: ";

/// Static per-session token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBudget {
    /// The model's context window.
    pub token_limit: usize,
    /// Safety margin.
    pub buffer_tokens: usize,
    /// Tokens reserved for the reply.
    pub max_response_tokens: usize,
}

impl ModelBudget {
    pub fn new(token_limit: usize, buffer_tokens: usize, max_response_tokens: usize) -> Self {
        Self {
            token_limit,
            buffer_tokens,
            max_response_tokens,
        }
    }

    /// available = token_limit - buffer_tokens - max_response_tokens
    pub fn available(&self) -> usize {
        self.token_limit
            .saturating_sub(self.buffer_tokens)
            .saturating_sub(self.max_response_tokens)
    }
}

/// Strategy for shrinking the history when it exceeds the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Keep the first 2 and the last 5 messages, once.
    #[default]
    Window,
    /// Drop the oldest user message and have the model summarize the rest,
    /// until under budget or no user message is left. Costs extra requests.
    Summarize,
}

/// What a budget pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetReport {
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub removed: usize,
}

impl BudgetReport {
    fn untouched(tokens: usize) -> Self {
        Self {
            tokens_before: tokens,
            tokens_after: tokens,
            removed: 0,
        }
    }

    pub fn truncated(&self) -> bool {
        self.removed > 0
    }
}

/// Ordered conversation for one chat session.
///
/// Never empty, and the first message is always the `system` message.
pub struct ConversationStore {
    messages: Vec<Message>,
    estimator: TokenEstimator,
    audit: Arc<dyn AuditSink>,
}

impl ConversationStore {
    pub fn new(
        system_prompt: impl Into<String>,
        estimator: TokenEstimator,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            estimator,
            audit,
        }
    }

    /// Record a message at the end of the conversation.
    pub fn append(&mut self, message: Message) {
        self.audit.record(AuditEvent::MessageAppended {
            role: message.role(),
            content: message.content().to_string(),
        });
        self.messages.push(message);
    }

    /// Validate a loosely shaped message and append it.
    pub fn append_json(&mut self, value: &serde_json::Value) -> Result<()> {
        let message = Message::from_json(value)?;
        self.append(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Token count of all contents concatenated in order.
    ///
    /// Role markers and per-message framing of the wire format are not
    /// counted, so this under-counts the real prompt slightly.
    pub fn estimate_tokens(&self) -> Result<usize> {
        let text: String = self.messages.iter().map(|m| m.content()).collect();
        self.estimator.count(&text)
    }

    /// Windowed truncation: if over budget, keep the first 2 and the last 5
    /// messages and drop everything in between.
    ///
    /// Single pass. If the window is still over budget the overage is accepted.
    pub fn enforce_budget(&mut self, budget: &ModelBudget) -> Result<BudgetReport> {
        let available = budget.available();
        let tokens = self.estimate_tokens()?;
        self.audit.record(AuditEvent::TokenCount { tokens, available });

        if tokens <= available || self.messages.len() <= KEEP_HEAD + KEEP_TAIL {
            return Ok(BudgetReport::untouched(tokens));
        }

        let removed = self.messages.len() - KEEP_HEAD - KEEP_TAIL;
        self.messages.drain(KEEP_HEAD..KEEP_HEAD + removed);

        let tokens_after = self.estimate_tokens()?;
        self.audit.record(AuditEvent::Truncated {
            removed,
            tokens: tokens_after,
        });

        Ok(BudgetReport {
            tokens_before: tokens,
            tokens_after,
            removed,
        })
    }

    /// Iterative compaction: while over budget, drop the oldest user message
    /// and replace the history with a model-written summary.
    ///
    /// Stops when under budget or when no user message is left; a history of
    /// only system/assistant content is a valid end state.
    pub async fn compact_with_summary(
        &mut self,
        budget: &ModelBudget,
        client: &dyn CompletionClient,
        params: &SamplingParams,
    ) -> Result<BudgetReport> {
        let available = budget.available();
        let tokens_before = self.estimate_tokens()?;
        self.audit.record(AuditEvent::TokenCount {
            tokens: tokens_before,
            available,
        });

        let len_before = self.messages.len();
        let mut tokens = tokens_before;

        while tokens > available {
            let Some(oldest_user) = self.messages.iter().position(|m| m.role() == Role::User)
            else {
                break;
            };
            self.messages.remove(oldest_user);

            self.summarize(client, params).await?;

            tokens = self.estimate_tokens()?;
            self.audit.record(AuditEvent::Summarized { tokens });
        }

        Ok(BudgetReport {
            tokens_before,
            tokens_after: tokens,
            removed: len_before.saturating_sub(self.messages.len()),
        })
    }

    /// Shrink the history according to `policy`.
    pub async fn fit(
        &mut self,
        policy: TruncationPolicy,
        budget: &ModelBudget,
        client: &dyn CompletionClient,
        params: &SamplingParams,
    ) -> Result<BudgetReport> {
        match policy {
            TruncationPolicy::Window => self.enforce_budget(budget),
            TruncationPolicy::Summarize => self.compact_with_summary(budget, client, params).await,
        }
    }

    /// Replace the whole conversation with a single system message.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages = vec![Message::system(system_prompt)];
        self.audit.record(AuditEvent::Reset);
    }

    /// Replace the conversation with one system message holding its summary.
    async fn summarize(
        &mut self,
        client: &dyn CompletionClient,
        params: &SamplingParams,
    ) -> Result<()> {
        let conversation_text = self
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.role(), m.content()))
            .collect::<Vec<_>>()
            .join(" ");

        let request = [
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(format!("{}{}", SUMMARY_PROMPT, conversation_text)),
        ];

        let summary = client
            .complete(&request, params)
            .await
            .map_err(ChatError::Completion)?;

        self.messages = vec![Message::system(summary)];
        Ok(())
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("messages", &self.messages)
            .field("estimator", &self.estimator)
            .finish()
    }
}
