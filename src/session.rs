//! Session state for interactive chat

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::models::AnswerResult;
use crate::models::ChatTurn;
use crate::models::Department;
use crate::models::QueryContext;

/// Turns retained per session; older ones are dropped in pairs
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Idle time after which chat history no longer carries into new questions
pub const SESSION_IDLE_TIMEOUT_SECS: i64 = 30 * 60;

/// One employee's conversation with the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub department: Department,
    pub history: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub max_turns: usize,
}

impl ChatSession {
    #[must_use]
    pub fn new(department: Department) -> Self {
        Self::with_max_turns(department, DEFAULT_MAX_TURNS)
    }

    #[must_use]
    pub fn with_max_turns(department: Department, max_turns: usize) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            department,
            history: Vec::new(),
            created_at: now,
            last_activity: now,
            max_turns: max_turns.max(2),
        }
    }

    /// Query context for the next question, carrying the history so far
    #[must_use]
    pub fn query(&self, question: &str) -> QueryContext {
        QueryContext::new(question, self.department).with_history(self.history.clone())
    }

    /// Record a finished exchange
    pub fn record_exchange(&mut self, question: &str, answer: &AnswerResult) {
        self.push(ChatTurn::user(question));
        self.push(ChatTurn::assistant(answer.answer.clone()));
    }

    fn push(&mut self, turn: ChatTurn) {
        self.history.push(turn);
        self.last_activity = Utc::now();

        if self.history.len() > self.max_turns {
            let excess = self.history.len() - self.max_turns;
            self.history.drain(0..excess);
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.last_activity = Utc::now();
    }

    #[must_use]
    pub fn is_expired(&self, timeout_secs: i64) -> bool {
        (Utc::now() - self.last_activity).num_seconds() > timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use crate::models::Speaker;

    fn answer(text: &str) -> AnswerResult {
        AnswerResult {
            answer: text.to_string(),
            source_type: SourceType::Internal,
            sources: Vec::new(),
        }
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let mut session = ChatSession::with_max_turns(Department::Sales, 4);
        for i in 0..3 {
            session.record_exchange(&format!("q{i}"), &answer(&format!("a{i}")));
        }

        let contents: Vec<_> = session.history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(session.history[0].speaker, Speaker::User);
    }

    #[test]
    fn test_query_carries_department_and_history() {
        let mut session = ChatSession::new(Department::Hr);
        session.record_exchange("xin chào", &answer("Chào bạn"));

        let query = session.query("giờ làm việc");
        assert_eq!(query.department, Department::Hr);
        assert_eq!(query.history.len(), 2);
        assert_eq!(query.query, "giờ làm việc");
    }

    #[test]
    fn test_new_session_ids_are_unique() {
        let a = ChatSession::new(Department::General);
        let b = ChatSession::new(Department::General);
        assert_ne!(a.session_id, b.session_id);
        assert!(!a.is_expired(60));
    }

    #[test]
    fn test_idle_session_expires() {
        let mut session = ChatSession::new(Department::CustomerCare);
        session.record_exchange("mật khẩu wifi", &answer("Xem tài liệu IT"));
        assert!(!session.is_expired(SESSION_IDLE_TIMEOUT_SECS));

        session.last_activity = Utc::now() - chrono::Duration::seconds(SESSION_IDLE_TIMEOUT_SECS + 5);
        assert!(session.is_expired(SESSION_IDLE_TIMEOUT_SECS));

        session.clear();
        assert!(session.history.is_empty());
        assert!(!session.is_expired(SESSION_IDLE_TIMEOUT_SECS));
    }
}
