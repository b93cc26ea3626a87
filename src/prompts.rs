/// Header placed above the web context block.
pub const CONTEXT_HEADER: &str = "WEB CONTEXT:";

/// Label placed in front of the user's question.
pub const QUESTION_LABEL: &str = "USER QUESTION:";

/// Build the single prompt sent to the model for a turn.
///
/// The context is passed through untouched, however long it is; the
/// completion provider is the one that enforces any token limit.
pub fn assemble_prompt(context: &str, query: &str) -> String {
    format!("{CONTEXT_HEADER}\n{context}\n\n{QUESTION_LABEL} {query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_has_header_context_and_question() {
        let prompt = assemble_prompt("Paris is the capital of France.", "capital of France");
        assert_eq!(
            prompt,
            "WEB CONTEXT:\nParis is the capital of France.\n\nUSER QUESTION: capital of France"
        );
    }

    #[test]
    fn empty_context_keeps_the_shape() {
        let prompt = assemble_prompt("", "hello");
        assert_eq!(prompt, "WEB CONTEXT:\n\n\nUSER QUESTION: hello");
    }

    #[test]
    fn large_context_is_not_truncated() {
        let context = "x".repeat(100_000);
        let prompt = assemble_prompt(&context, "q");
        assert!(prompt.contains(&context));
        assert!(prompt.ends_with("USER QUESTION: q"));
    }
}
