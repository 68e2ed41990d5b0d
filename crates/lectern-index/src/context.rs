//! Formatting retrieved documents as prompt context.

use lectern_core::RetrievedDocument;

/// Characters of each document's content included in the context.
pub const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 1000;

/// Format retrieved documents with the default per-document budget.
#[must_use]
pub fn format_retrieved_context(retrieved: &[RetrievedDocument]) -> String {
    format_retrieved_context_with_budget(retrieved, DEFAULT_CONTEXT_CHAR_BUDGET)
}

/// Format retrieved documents as a block of title, relevance and content.
///
/// Content longer than `char_budget` characters is cut and suffixed with
/// `...`. An empty slice yields an empty string.
///
/// ```text
/// RELEVANT INFORMATION:
/// Title: Sky
/// Relevance: 0.83
/// Content: The sky is blue.
/// ----------------------------------------
/// ```
#[must_use]
pub fn format_retrieved_context_with_budget(
    retrieved: &[RetrievedDocument],
    char_budget: usize,
) -> String {
    if retrieved.is_empty() {
        return String::new();
    }

    let rule = "-".repeat(40);
    let mut parts = Vec::with_capacity(1 + retrieved.len() * 4);
    parts.push("RELEVANT INFORMATION:".to_string());

    for hit in retrieved {
        let doc = &hit.document;
        parts.push(format!("Title: {}", doc.title));
        parts.push(format!("Relevance: {:.2}", hit.score));
        parts.push(format!("Content: {}", truncate_chars(&doc.content, char_budget)));
        parts.push(rule.clone());
    }

    parts.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
