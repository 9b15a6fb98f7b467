//! Token counting against the model's own tokenizer.
//!
//! Budget enforcement relies on these counts being exact: an approximation
//! that under-counts lets an oversized window through and the endpoint rejects
//! the request.

use std::fmt;
use std::path::Path;

use tiktoken_rs::CoreBPE;
use tokenizers::Tokenizer;

use crate::error::{ChatError, Result};

enum Backend {
    /// OpenAI byte-pair encodings (cl100k, o200k, ...)
    Tiktoken(CoreBPE),
    /// A HuggingFace `tokenizer.json`
    HuggingFace(Tokenizer),
}

/// Counts tokens for one model.
pub struct TokenEstimator {
    model: String,
    backend: Backend,
}

impl TokenEstimator {
    /// Resolve the wire tokenizer for an OpenAI model id.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            ChatError::UnsupportedModel(format!("no tokenizer mapping for '{}': {}", model, e))
        })?;

        Ok(Self {
            model: model.to_string(),
            backend: Backend::Tiktoken(bpe),
        })
    }

    /// Load a HuggingFace tokenizer file for a model tiktoken does not know.
    pub fn from_tokenizer_file(model: &str, path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ChatError::UnsupportedModel(format!(
                "failed to load tokenizer for '{}' from {:?}: {}",
                model, path, e
            ))
        })?;

        Ok(Self {
            model: model.to_string(),
            backend: Backend::HuggingFace(tokenizer),
        })
    }

    /// Pick the backend: an explicit tokenizer file wins over the model id.
    pub fn resolve(model: &str, tokenizer_file: Option<&Path>) -> Result<Self> {
        match tokenizer_file {
            Some(path) => Self::from_tokenizer_file(model, path),
            None => Self::for_model(model),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of tokens in `text`, without special tokens.
    pub fn count(&self, text: &str) -> Result<usize> {
        match &self.backend {
            Backend::Tiktoken(bpe) => Ok(bpe.encode_ordinary(text).len()),
            Backend::HuggingFace(tokenizer) => {
                let encoding = tokenizer.encode(text, false).map_err(|e| {
                    ChatError::UnsupportedModel(format!(
                        "tokenizer for '{}' failed to encode: {}",
                        self.model, e
                    ))
                })?;
                Ok(encoding.get_ids().len())
            }
        }
    }
}

impl fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.backend {
            Backend::Tiktoken(_) => "tiktoken",
            Backend::HuggingFace(_) => "huggingface",
        };
        f.debug_struct("TokenEstimator")
            .field("model", &self.model)
            .field("backend", &backend)
            .finish()
    }
}

/// One-shot count for `model`.
pub fn count_tokens(model: &str, text: &str) -> Result<usize> {
    TokenEstimator::for_model(model)?.count(text)
}
