//! Augmented prompt assembly with a context budget

use crate::types::TextUnit;

/// Label introducing the user's question
pub const QUESTION_LABEL: &str = "Question";
/// Label introducing the retrieved passages
pub const CONTEXT_LABEL: &str = "Relevant context";

/// Prompt ready to send to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedPrompt {
    pub prompt: String,
    /// Passages that made it into the context block
    pub passages_used: usize,
    /// Whether lower-ranked passages were dropped to respect the budget
    pub truncated: bool,
}

/// Joins retrieved passages into a bounded context block
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_chars: usize,
}

impl ContextBuilder {
    /// `max_chars` bounds the context block in characters; 0 means no limit
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Builder without a budget
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Merge `query` and `passages` (best match first) into one prompt.
    ///
    /// Passages are kept whole, in rank order, until the next one would push
    /// the newline-joined block past the budget. No passages give an empty
    /// context block.
    pub fn build(&self, query: &str, passages: &[TextUnit]) -> AugmentedPrompt {
        let mut context = String::new();
        let mut used_chars = 0usize;
        let mut passages_used = 0usize;

        for passage in passages {
            let separator = usize::from(passages_used > 0);
            let length = passage.content.chars().count();
            if self.max_chars > 0 && used_chars + separator + length > self.max_chars {
                break;
            }
            if separator == 1 {
                context.push('\n');
            }
            context.push_str(&passage.content);
            used_chars += separator + length;
            passages_used += 1;
        }

        let truncated = passages_used < passages.len();
        if truncated {
            tracing::debug!(
                "Context budget of {} chars kept {} of {} passages",
                self.max_chars,
                passages_used,
                passages.len()
            );
        }

        AugmentedPrompt {
            prompt: format!(
                "{} : {}\n\n{} :\n{}",
                QUESTION_LABEL, query, CONTEXT_LABEL, context
            ),
            passages_used,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(items: &[&str]) -> Vec<TextUnit> {
        items
            .iter()
            .enumerate()
            .map(|(i, s)| TextUnit {
                ordinal: i as u64,
                content: s.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_prompt_layout() {
        let built = ContextBuilder::unbounded().build(
            "When should I change the oil?",
            &units(&["Oil change every 10,000 km.", "Use 5W-30."]),
        );

        assert_eq!(
            built.prompt,
            "Question : When should I change the oil?\n\nRelevant context :\nOil change every 10,000 km.\nUse 5W-30."
        );
        assert_eq!(built.passages_used, 2);
        assert!(!built.truncated);
    }

    #[test]
    fn test_no_passages_gives_empty_context() {
        let built = ContextBuilder::new(100).build("Strange noise when braking", &[]);
        assert_eq!(
            built.prompt,
            "Question : Strange noise when braking\n\nRelevant context :\n"
        );
        assert_eq!(built.passages_used, 0);
        assert!(!built.truncated);
    }

    #[test]
    fn test_budget_keeps_highest_ranked_whole_passages() {
        // "aaaa" + "\n" + "bbbb" = 9 chars fits; adding "\ncccc" would need 14
        let built = ContextBuilder::new(10).build("q", &units(&["aaaa", "bbbb", "cccc"]));
        assert!(built.prompt.ends_with(":\naaaa\nbbbb"));
        assert_eq!(built.passages_used, 2);
        assert!(built.truncated);
    }

    #[test]
    fn test_budget_counts_characters_not_bytes() {
        let built = ContextBuilder::new(5).build("q", &units(&["été é"]));
        assert_eq!(built.passages_used, 1);
    }

    #[test]
    fn test_first_passage_over_budget_is_dropped() {
        let built = ContextBuilder::new(3).build("q", &units(&["too long", "ok"]));
        assert_eq!(built.passages_used, 0);
        assert!(built.truncated);
        assert!(built.prompt.ends_with("Relevant context :\n"));
    }
}
