//! LLM Layer.
//!
//! This module handles all interactions with the chat model, including:
//! - Message and sampling types
//! - Token counting with the model's own tokenizer
//! - Conversation history and context window management
//! - The completion client abstraction and its OpenAI implementation

pub mod types;
pub mod tokens;
pub mod provider;
pub mod context;
pub mod openai;

// Re-export key types
pub use types::{Message, Role, SamplingParams};
pub use tokens::{count_tokens, TokenEstimator};
pub use provider::CompletionClient;
pub use context::{BudgetReport, ConversationStore, ModelBudget, TruncationPolicy};
pub use openai::OpenAIClient;
