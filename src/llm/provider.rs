//! The Provider Abstraction.
//!
//! This trait defines the single request/response call the pipeline makes to a
//! chat-completion backend.

use async_trait::async_trait;

use super::types::{Message, SamplingParams};
use crate::error::CompletionError;

/// Candidate texts joined into one reply.
///
/// Each candidate is trimmed; several candidates are separated by one space.
pub fn join_candidates<I, S>(candidates: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The core trait for completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the full ordered conversation and return the reply text.
    ///
    /// Implementations make exactly one attempt; retries are the caller's call.
    async fn complete(
        &self,
        messages: &[Message],
        params: &SamplingParams,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_single_candidate() {
        assert_eq!(join_candidates(["  Fill the 5 liter jug.\n"]), "Fill the 5 liter jug.");
    }

    #[test]
    fn test_join_multiple_candidates() {
        assert_eq!(join_candidates(vec!["one ", " two"]), "one two");
    }
}
