//! Prompt construction.

/// Instruction wrapped around the user's sentence.
const INSTRUCTION: &str = "Improve the following sentence";

/// Builds the instruction sent to the model for a sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder {
    escape_quotes: bool,
}

impl PromptBuilder {
    /// Create a builder. With `escape_quotes` off the text is inserted verbatim.
    pub fn new(escape_quotes: bool) -> Self {
        Self { escape_quotes }
    }

    /// Build `Improve the following sentence: '<text>'`.
    pub fn build(&self, text: &str) -> String {
        if self.escape_quotes {
            format!("{}: '{}'", INSTRUCTION, text.replace('\'', "\\'"))
        } else {
            format!("{}: '{}'", INSTRUCTION, text)
        }
    }
}
