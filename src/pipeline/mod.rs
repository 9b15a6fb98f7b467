//! Prompt Pipeline
//!
//! Drives one question through chain-of-thought sampling (x3), self-reflection,
//! final selection and hint resolution over a single growing conversation.
//!
//! A run is lazy and single-pass: each `StageOutput` is produced only when its
//! stage completes, and a finished run cannot be restarted.

pub mod prompts;
pub mod stage;

use futures::stream::{self, Stream};
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink};
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::llm::{
    CompletionClient, ConversationStore, Message, ModelBudget, SamplingParams, TokenEstimator,
    TruncationPolicy,
};

pub use stage::{PipelineState, Stage, StageOutput};

/// Text a stage yields when its completion call fails.
pub const FALLBACK_TEXT: &str =
    "Error: Unable to get response from ChatGPT. Please check the logs for more details.";

/// Owns the conversation and everything needed to talk to the model.
pub struct Pipeline {
    store: ConversationStore,
    client: Arc<dyn CompletionClient>,
    budget: ModelBudget,
    params: SamplingParams,
    policy: TruncationPolicy,
    audit: Arc<dyn AuditSink>,
}

impl Pipeline {
    pub fn new(
        store: ConversationStore,
        client: Arc<dyn CompletionClient>,
        budget: ModelBudget,
        params: SamplingParams,
        policy: TruncationPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            client,
            budget,
            params,
            policy,
            audit,
        }
    }

    /// Build from startup configuration.
    ///
    /// Resolves the tokenizer here so an unsupported model fails before any
    /// question is asked.
    pub fn from_config(
        config: &Config,
        client: Arc<dyn CompletionClient>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let estimator = TokenEstimator::resolve(&config.model, config.tokenizer_file.as_deref())?;
        let store = ConversationStore::new(config.system_prompt.clone(), estimator, audit.clone());

        Ok(Self::new(
            store,
            client,
            config.budget(),
            config.sampling(),
            config.truncation,
            audit,
        ))
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.store
    }

    /// Start over with a fresh single-system-message conversation.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.store.reset(system_prompt);
    }

    /// Begin a run for `user_input`, finishing with `hint`.
    pub fn process(&mut self, user_input: &str, hint: &str) -> PipelineRun<'_> {
        PipelineRun {
            pipeline: self,
            user_input: user_input.to_string(),
            hint: hint.to_string(),
            state: PipelineState::Idle,
        }
    }

    /// One request/response round trip on the shared conversation.
    ///
    /// Only local errors are returned; a failed completion becomes `None` and
    /// the caller substitutes the fallback text.
    async fn exchange(&mut self, content: String) -> Result<Option<String>> {
        self.store.append(Message::user(content));

        match self
            .store
            .fit(self.policy, &self.budget, self.client.as_ref(), &self.params)
            .await
        {
            Ok(_) => {}
            Err(ChatError::Completion(err)) => {
                self.audit.record(AuditEvent::CompletionFailed {
                    error: err.to_string(),
                });
                return Ok(None);
            }
            Err(err) => return Err(err),
        }

        match self.client.complete(self.store.messages(), &self.params).await {
            Ok(text) => {
                self.store.append(Message::assistant(text.clone()));
                Ok(Some(text))
            }
            Err(err) => {
                self.audit.record(AuditEvent::CompletionFailed {
                    error: err.to_string(),
                });
                Ok(None)
            }
        }
    }

    fn record_transcript(&self) {
        let dump = self
            .store
            .messages()
            .iter()
            .map(|m| format!("{}: {}", m.role(), m.content()))
            .collect::<Vec<_>>()
            .join("\n");
        self.audit.record(AuditEvent::Transcript {
            messages: self.store.len(),
            dump,
        });
    }
}

/// A single pass through the stages, borrowed from its `Pipeline`.
pub struct PipelineRun<'a> {
    pipeline: &'a mut Pipeline,
    user_input: String,
    hint: String,
    state: PipelineState,
}

impl<'a> PipelineRun<'a> {
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Advance one stage. `None` once the run is done.
    ///
    /// A local error ends the run after being returned once.
    pub async fn next(&mut self) -> Option<Result<StageOutput>> {
        let result = match self.state {
            PipelineState::Done => return None,
            PipelineState::Idle => {
                let prompt = prompts::chain_of_thought(&self.user_input);
                self.pipeline.audit.record(AuditEvent::StagePrompt {
                    stage: "chain_of_thought".to_string(),
                    prompt: prompt.clone(),
                });
                self.state = PipelineState::ChainOfThought(1);
                Ok(StageOutput::new(Stage::ChainOfThoughtPrompt, prompt))
            }
            PipelineState::ChainOfThought(i) => {
                let content = prompts::chain_of_thought_option(&self.user_input, i);
                let next = if i < prompts::CHAIN_OF_THOUGHT_OPTIONS {
                    PipelineState::ChainOfThought(i + 1)
                } else {
                    PipelineState::SelfReflection
                };
                self.step(Stage::ChainOfThought(i), content, next).await
            }
            PipelineState::SelfReflection => {
                self.step(
                    Stage::SelfReflection,
                    prompts::SELF_REFLECTION_PROMPT.to_string(),
                    PipelineState::FinalSelection,
                )
                .await
            }
            PipelineState::FinalSelection => {
                self.step(
                    Stage::FinalSelection,
                    prompts::FINAL_SELECTION_PROMPT.to_string(),
                    PipelineState::HintResolution,
                )
                .await
            }
            PipelineState::HintResolution => {
                let hint = self.hint.clone();
                let output = self.step(Stage::Resolution, hint, PipelineState::Done).await;
                if output.is_ok() {
                    self.pipeline.record_transcript();
                }
                output
            }
        };

        if result.is_err() {
            self.state = PipelineState::Done;
        }
        Some(result)
    }

    async fn step(
        &mut self,
        stage: Stage,
        content: String,
        next: PipelineState,
    ) -> Result<StageOutput> {
        let reply = self.pipeline.exchange(content).await?;
        self.state = next;
        Ok(match reply {
            Some(text) => StageOutput::new(stage, text),
            None => StageOutput::fallback(stage, FALLBACK_TEXT),
        })
    }

    /// Drain the run, stopping at the first local error.
    pub async fn collect(mut self) -> Result<Vec<StageOutput>> {
        let mut outputs = Vec::new();
        while let Some(item) = self.next().await {
            outputs.push(item?);
        }
        Ok(outputs)
    }

    /// The run as a `Stream`, for front-ends that render incrementally.
    pub fn into_stream(self) -> impl Stream<Item = Result<StageOutput>> + 'a {
        stream::unfold(self, |mut run| async move {
            let item = run.next().await?;
            Some((item, run))
        })
    }
}
