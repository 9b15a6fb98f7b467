//! SmartGPT
//!
//! Multi-step prompting (chain of thought, self-reflection, final selection,
//! hint resolution) over a chat history kept inside the model's token budget.
//! Any front-end drives a [`Pipeline`] and renders the outputs it yields.

pub mod audit;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod transcript;

pub use audit::{AuditEvent, AuditSink, FanoutAudit, MemoryAudit, TracingAudit};
pub use config::Config;
pub use error::{ChatError, CompletionError};
pub use llm::{
    CompletionClient, ConversationStore, Message, ModelBudget, OpenAIClient, Role,
    SamplingParams, TokenEstimator, TruncationPolicy,
};
pub use pipeline::{Pipeline, PipelineRun, Stage, StageOutput, FALLBACK_TEXT};
pub use transcript::Transcript;
