//! Stage labels and the output units a run produces.

use serde::Serialize;
use std::fmt;

/// Which step of the protocol produced an output unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "index", rename_all = "snake_case")]
pub enum Stage {
    /// The chain-of-thought prompt, announced before sampling.
    ChainOfThoughtPrompt,
    /// One of the sampled options, 1-based.
    ChainOfThought(u8),
    SelfReflection,
    FinalSelection,
    /// The terminal stage, answering the user's hint.
    Resolution,
}

impl Stage {
    pub fn label(&self) -> String {
        match self {
            Stage::ChainOfThoughtPrompt => "Chain_of_thought_prompt".to_string(),
            Stage::ChainOfThought(i) => format!("Option {}", i),
            Stage::SelfReflection => "Self-reflection".to_string(),
            Stage::FinalSelection => "Final Assistant".to_string(),
            Stage::Resolution => "resolution".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A labeled piece of output, produced as its stage completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutput {
    pub stage: Stage,
    pub text: String,
    /// True when `text` is the fallback for a failed completion.
    pub degraded: bool,
}

impl StageOutput {
    pub fn new(stage: Stage, text: impl Into<String>) -> Self {
        Self {
            stage,
            text: text.into(),
            degraded: false,
        }
    }

    pub fn fallback(stage: Stage, text: impl Into<String>) -> Self {
        Self {
            stage,
            text: text.into(),
            degraded: true,
        }
    }
}

impl fmt::Display for StageOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.text)
    }
}

/// Where a run is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ChainOfThought(u8),
    SelfReflection,
    FinalSelection,
    HintResolution,
    Done,
}
