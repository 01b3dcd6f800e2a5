use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::errors::NexusError;

/// Organisational unit that owns documents and that every requester belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    /// Shared unit, visible to everyone
    General,
    Executive,
    Hr,
    Sales,
    Marketing,
    Training,
    Accounting,
    ChessTeacher,
    ArtTeacher,
    CustomerCare,
    OnlineSales,
}

impl Department {
    /// The unit whose documents every requester may read
    pub const SHARED: Self = Self::General;

    pub const ALL: [Self; 11] = [
        Self::General,
        Self::Executive,
        Self::Hr,
        Self::Sales,
        Self::Marketing,
        Self::Training,
        Self::Accounting,
        Self::ChessTeacher,
        Self::ArtTeacher,
        Self::CustomerCare,
        Self::OnlineSales,
    ];

    /// Human-readable label used in prompts and output
    pub const fn label(self) -> &'static str {
        match self {
            Self::General => "Tài liệu chung",
            Self::Executive => "Điều hành",
            Self::Hr => "Nhân sự",
            Self::Sales => "Kinh doanh",
            Self::Marketing => "Marketing",
            Self::Training => "Đào tạo",
            Self::Accounting => "Kế toán",
            Self::ChessTeacher => "Giáo viên cờ vua",
            Self::ArtTeacher => "Giáo viên mỹ thuật",
            Self::CustomerCare => "Chăm sóc khách hàng",
            Self::OnlineSales => "Sale Online",
        }
    }

    /// Stable key, identical to the serde representation
    pub const fn key(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Executive => "EXECUTIVE",
            Self::Hr => "HR",
            Self::Sales => "SALES",
            Self::Marketing => "MARKETING",
            Self::Training => "TRAINING",
            Self::Accounting => "ACCOUNTING",
            Self::ChessTeacher => "CHESS_TEACHER",
            Self::ArtTeacher => "ART_TEACHER",
            Self::CustomerCare => "CUSTOMER_CARE",
            Self::OnlineSales => "ONLINE_SALES",
        }
    }

    pub fn is_shared(self) -> bool {
        self == Self::SHARED
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Department {
    type Err = NexusError;

    /// Accepts the key in any case (`hr`, `chess-teacher`) or the exact label
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let normalized = trimmed.to_uppercase().replace(['-', ' '], "_");

        Self::ALL
            .into_iter()
            .find(|d| d.key() == normalized || d.label() == trimmed)
            .ok_or_else(|| NexusError::ConfigError(format!("Unknown department: {trimmed}")))
    }
}

/// A document record as supplied by the ingestion side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    pub department: Department,
    pub web_view_link: String,
    pub mime_type: String,
}

impl Document {
    /// Text submitted to the embedding capability for this document
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.name, self.content)
    }

    pub fn citation(&self) -> Citation {
        Citation {
            title: self.name.clone(),
            link: self.web_view_link.clone(),
        }
    }
}

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("User"),
            Self::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One prior message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the pipeline needs to know about one incoming question
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub query: String,
    pub department: Department,
    pub history: Vec<ChatTurn>,
}

impl QueryContext {
    pub fn new(query: impl Into<String>, department: Department) -> Self {
        Self {
            query: query.into(),
            department,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Internal,
    External,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::External => f.write_str("external"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub link: String,
}

/// Final answer handed back to the chat surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub answer: String,
    pub source_type: SourceType,
    pub sources: Vec<Citation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_parse_key_and_label() {
        assert_eq!("hr".parse::<Department>().unwrap(), Department::Hr);
        assert_eq!(
            "chess-teacher".parse::<Department>().unwrap(),
            Department::ChessTeacher
        );
        assert_eq!(
            "Giáo viên mỹ thuật".parse::<Department>().unwrap(),
            Department::ArtTeacher
        );
        assert!("finance".parse::<Department>().is_err());
    }

    #[test]
    fn test_department_serde_uses_key() {
        let json = serde_json::to_string(&Department::OnlineSales).unwrap();
        assert_eq!(json, "\"ONLINE_SALES\"");

        for dept in Department::ALL {
            let encoded = serde_json::to_string(&dept).unwrap();
            assert_eq!(encoded, format!("\"{}\"", dept.key()));
        }
    }

    #[test]
    fn test_only_general_is_shared() {
        let shared: Vec<_> = Department::ALL.iter().filter(|d| d.is_shared()).collect();
        assert_eq!(shared, vec![&Department::General]);
    }

    #[test]
    fn test_document_deserializes_camel_case() {
        let doc: Document = serde_json::from_str(
            r#"{
                "id": "x-1",
                "name": "Handbook.pdf",
                "content": "text",
                "department": "HR",
                "webViewLink": "https://example.com/x-1",
                "mimeType": "application/pdf"
            }"#,
        )
        .unwrap();

        assert_eq!(doc.department, Department::Hr);
        assert_eq!(doc.citation().link, "https://example.com/x-1");
    }

    #[test]
    fn test_answer_result_wire_shape() {
        let result = AnswerResult {
            answer: "ok".to_string(),
            source_type: SourceType::External,
            sources: vec![],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["sourceType"], "external");
    }
}
