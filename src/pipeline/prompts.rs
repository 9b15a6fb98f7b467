//! Prompt templates for each stage.
//!
//! Templates are deterministic: they depend only on the user input and the
//! option index.

/// Number of chain-of-thought options sampled per run.
pub const CHAIN_OF_THOUGHT_OPTIONS: u8 = 3;

pub const SELF_REFLECTION_PROMPT: &str = "You are an expert researcher tasked with investigating the three answer options above. Analyze deeply the question and reason about each answer's assumptions, flaws and faulty logic in trying to answer it. Be detailed, thorough and very analytical. Let's think step by step through this investigation. Answer:";

pub const FINAL_SELECTION_PROMPT: &str = "You are now an expert resolver tasked with 1) Based on the analysis above, resolve which of the answer options is the best, 2) Improve that answer, and 3) You must respond with the improved answer in full. Let's work out this resolving process in a step by step way to be sure we have the right answer. Your improved answer is:";

/// Shown to the user before the options are sampled.
pub fn chain_of_thought(user_input: &str) -> String {
    format!(
        "Question: {}. Let's work this out in a step by step way to be sure we have the right answer. Answer ",
        user_input
    )
}

/// The request text for option `index` (1-based).
pub fn chain_of_thought_option(user_input: &str, index: u8) -> String {
    format!("{}{}:", chain_of_thought(user_input), index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_of_thought_template() {
        assert_eq!(
            chain_of_thought("2+2"),
            "Question: 2+2. Let's work this out in a step by step way to be sure we have the right answer. Answer "
        );
    }

    #[test]
    fn test_option_suffix() {
        let prompt = chain_of_thought_option("2+2", 3);
        assert!(prompt.ends_with("right answer. Answer 3:"));
        assert_eq!(prompt, chain_of_thought_option("2+2", 3));
    }
}
