//! Prompt templates for the internal and web-search answer stages

use crate::models::Department;
use crate::rag::PromptContext;

/// Exact reply the model gives when the internal context cannot answer
pub const SEARCH_NEEDED: &str = "SEARCH_NEEDED";

/// Placeholder used when retrieval produced no documents
pub const NO_CONTEXT_NOTICE: &str = "No relevant files found in Drive.";

/// Opening sentence required of every web-search answer
pub const WEB_ANSWER_PREAMBLE: &str =
    "Tôi không tìm thấy thông tin này trong tài liệu nội bộ, nhưng đây là kết quả từ web:";

/// Build the prompt that must be answered from internal documents only
pub fn build_internal_prompt(question: &str, department: Department, context: &PromptContext) -> String {
    let documents = if context.documents.is_empty() {
        NO_CONTEXT_NOTICE
    } else {
        context.documents.as_str()
    };

    let mut prompt = format!(
        r#"You are an internal corporate assistant for "Nexus".
User Department: {department}.

"#
    );

    if !context.history.is_empty() {
        prompt.push_str(&format!(
            "Recent conversation:\n{}\n\n",
            context.history
        ));
    }

    prompt.push_str(&format!(
        r#"Question: "{question}"

Here is the context retrieved from the company Google Drive:
---
{documents}
---

INSTRUCTIONS:
1. Answer the question strictly using the provided Drive context.
2. Provide a professional response in Vietnamese.
3. If the context is NOT sufficient, output EXACTLY: "{SEARCH_NEEDED}"."#
    ));

    prompt
}

/// Build the prompt for the web-grounded fallback; carries no internal context
pub fn build_web_search_prompt(question: &str) -> String {
    format!(
        r#"Answer the following question utilizing Google Search in Vietnamese.
User Question: {question}

Begin your response by stating (in Vietnamese): "{WEB_ANSWER_PREAMBLE}""#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_prompt_with_empty_context() {
        let prompt = build_internal_prompt("giờ làm việc", Department::Hr, &PromptContext::default());
        assert!(prompt.contains(NO_CONTEXT_NOTICE));
        assert!(prompt.contains("User Department: Nhân sự."));
        assert!(prompt.contains(SEARCH_NEEDED));
        assert!(!prompt.contains("Recent conversation"));
    }

    #[test]
    fn test_internal_prompt_includes_documents_and_history() {
        let context = PromptContext {
            documents: "[File Name: a.pdf]".to_string(),
            history: "User: xin chào".to_string(),
        };
        let prompt = build_internal_prompt("q", Department::General, &context);
        assert!(prompt.contains("[File Name: a.pdf]"));
        assert!(prompt.contains("Recent conversation:\nUser: xin chào"));
        assert!(!prompt.contains(NO_CONTEXT_NOTICE));
    }

    #[test]
    fn test_web_prompt_has_no_internal_context() {
        let prompt = build_web_search_prompt("thời tiết hôm nay");
        assert!(prompt.contains("thời tiết hôm nay"));
        assert!(prompt.contains(WEB_ANSWER_PREAMBLE));
        assert!(!prompt.contains("Drive context"));
    }
}
