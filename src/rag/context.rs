//! Context assembly from retrieved documents and recent conversation

use crate::models::ChatTurn;
use crate::models::Document;
use crate::rag::SearchResult;

/// Default number of most recent conversation turns kept in the prompt
pub const DEFAULT_HISTORY_TURNS: usize = 6;

/// Generation payload built from one retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// Delimited document blocks, empty when nothing was retrieved
    pub documents: String,
    /// `Speaker: content` lines, oldest first
    pub history: String,
}

/// Assembler for creating prompt context from search results
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    history_turns: usize,
}

impl ContextAssembler {
    /// Create a new context assembler
    #[must_use]
    pub const fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    /// Assemble documents and history; document content is never truncated
    #[must_use]
    pub fn assemble(&self, results: &[SearchResult], history: &[ChatTurn]) -> PromptContext {
        PromptContext {
            documents: results
                .iter()
                .map(|result| Self::format_document(&result.document))
                .collect::<Vec<_>>()
                .join("\n\n"),
            history: self.format_history(history),
        }
    }

    fn format_document(document: &Document) -> String {
        format!(
            "[File Name: {}]\nDepartment: {}\nLink: {}\nContent: {}",
            document.name,
            document.department.label(),
            document.web_view_link,
            document.content
        )
    }

    fn format_history(&self, history: &[ChatTurn]) -> String {
        let start = history.len().saturating_sub(self.history_turns);
        history[start..]
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker, turn.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::MatchType;
    use crate::store::seed_documents;

    fn result(document: Document) -> SearchResult {
        SearchResult {
            document,
            score: 1.0,
            match_type: MatchType::Keyword,
        }
    }

    #[test]
    fn test_document_block_format() {
        let docs = seed_documents();
        let context = ContextAssembler::default().assemble(&[result(docs[0].clone())], &[]);

        assert!(context.documents.starts_with("[File Name: Noi_quy_cong_ty_2024.pdf]\n"));
        assert!(context.documents.contains("Department: Tài liệu chung\n"));
        assert!(context.documents.contains("Link: https://docs.google.com/document/d/mock-handbook\n"));
        assert!(context.documents.ends_with(&docs[0].content));
        assert!(context.history.is_empty());
    }

    #[test]
    fn test_blocks_keep_retrieval_order_and_full_content() {
        let mut long = seed_documents()[1].clone();
        long.content = "x".repeat(50_000);
        let first = seed_documents()[3].clone();

        let context =
            ContextAssembler::default().assemble(&[result(first), result(long)], &[]);

        let blocks: Vec<_> = context.documents.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("Nguyen_tac_pha_mau.pptx"));
        assert!(blocks[1].ends_with(&"x".repeat(50_000)));
    }

    #[test]
    fn test_history_keeps_last_six_oldest_first() {
        let history: Vec<_> = (1..=8)
            .map(|i| {
                if i % 2 == 1 {
                    ChatTurn::user(format!("q{i}"))
                } else {
                    ChatTurn::assistant(format!("a{i}"))
                }
            })
            .collect();

        let context = ContextAssembler::default().assemble(&[], &history);
        let lines: Vec<_> = context.history.lines().collect();

        assert!(context.documents.is_empty());
        assert_eq!(
            lines,
            vec!["User: q3", "Assistant: a4", "User: q5", "Assistant: a6", "User: q7", "Assistant: a8"]
        );
    }

    #[test]
    fn test_short_history_kept_whole() {
        let history = vec![ChatTurn::user("xin chào")];
        let context = ContextAssembler::new(6).assemble(&[], &history);
        assert_eq!(context.history, "User: xin chào");
    }
}
