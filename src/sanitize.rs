//! Reasoning-trace removal for model output.
//!
//! Reasoning models wrap their chain of thought in `<think>...</think>`
//! before the answer. Everything inside those blocks is dropped, tags
//! included, and the remainder is trimmed.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK: Lazy<Sanitizer> = Lazy::new(|| Sanitizer::new("think"));

/// Strip `<think>` blocks using the default tag.
#[cfg(test)]
pub fn sanitize(raw: &str) -> String {
    THINK.clean(raw)
}

/// Removes delimited reasoning blocks for a configurable tag name.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    block: Regex,
}

impl Sanitizer {
    /// Build a sanitizer for `<tag>...</tag>` blocks.
    pub fn new(tag: &str) -> Self {
        let tag = regex::escape(tag);
        // Non-greedy so adjacent blocks are removed independently.
        let pattern = format!(r"(?s)<{tag}>.*?</{tag}>");
        let block = Regex::new(&pattern).expect("escaped tag is a valid pattern");
        Self { block }
    }

    /// Remove every reasoning block and trim the result.
    pub fn clean(&self, raw: &str) -> String {
        let mut text = raw.to_string();
        // Removing one block can join the halves of another; repeat until stable.
        while self.block.is_match(&text) {
            text = self.block.replace_all(&text, "").into_owned();
        }
        text.trim().to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        THINK.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_every_block() {
        assert_eq!(sanitize("a<think>x</think>b<think>y</think>c"), "abc");
    }

    #[test]
    fn test_plain_text_is_only_trimmed() {
        assert_eq!(sanitize("  hello  "), "hello");
        assert_eq!(sanitize("no tags here"), "no tags here");
    }

    #[test]
    fn test_multiline_block() {
        let raw = "<think>\nThe user wants a better sentence.\nLet me fix grammar.\n</think>\n\nHe and I go to the store.\n";
        assert_eq!(sanitize(raw), "He and I go to the store.");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize(" \n\t "), "");
        assert_eq!(sanitize("<think></think>"), "");
    }

    #[test]
    fn test_unclosed_block_is_kept() {
        assert_eq!(sanitize("<think>still thinking"), "<think>still thinking");
    }

    #[test]
    fn test_block_revealed_by_removal() {
        assert_eq!(sanitize("<thi<think>x</think>nk>y</think>z"), "z");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "  hello  ",
            "a<think>x</think>b<think>y</think>c",
            "<thi<think>x</think>nk>y</think>z",
            "<think>open only",
            "</think>close only<think>",
            "  <think>\n\n</think>  <think>q</think> answer \n",
        ];
        for s in samples {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_custom_tag() {
        let sanitizer = Sanitizer::new("reasoning");
        assert_eq!(
            sanitizer.clean("<reasoning>hmm</reasoning> Done. <think>kept</think>"),
            "Done. <think>kept</think>"
        );
    }

    #[test]
    fn test_tag_with_regex_metacharacters() {
        let sanitizer = Sanitizer::new("a.b");
        assert_eq!(sanitizer.clean("<a.b>x</a.b>ok<axb>y</axb>"), "ok<axb>y</axb>");
    }
}
