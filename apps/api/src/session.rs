//! In-process conversation state: the document currently being analysed and
//! the chat history sent to the model on every question.
//!
//! Shared across handlers as `Arc<Session>`; all access goes through one
//! `RwLock` so concurrent uploads and queries see a consistent pair.

use tokio::sync::RwLock;
use tracing::debug;

use crate::models::chat::ChatTurn;
use crate::models::document::DocumentInfo;

#[derive(Debug, Default)]
struct SessionState {
    current: Option<DocumentInfo>,
    history: Vec<ChatTurn>,
}

#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<SessionState>,
    history_limit: Option<usize>,
}

impl Session {
    pub fn new(history_limit: Option<usize>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            history_limit,
        }
    }

    pub async fn current_document(&self) -> Option<DocumentInfo> {
        self.state.read().await.current.clone()
    }

    /// Replaces the current document. History is kept.
    pub async fn set_document(&self, document: DocumentInfo) -> Option<DocumentInfo> {
        self.state.write().await.current.replace(document)
    }

    pub async fn history(&self) -> Vec<ChatTurn> {
        self.state.read().await.history.clone()
    }

    /// Stored history followed by the pending question, as sent to the model.
    pub async fn history_with(&self, question: &str) -> Vec<ChatTurn> {
        let state = self.state.read().await;
        let mut contents = Vec::with_capacity(state.history.len() + 1);
        contents.extend(state.history.iter().cloned());
        contents.push(ChatTurn::user(question));
        contents
    }

    /// Appends a completed question/answer pair.
    pub async fn record_exchange(&self, question: &str, answer: &str) {
        let mut state = self.state.write().await;
        state.history.push(ChatTurn::user(question));
        state.history.push(ChatTurn::model(answer));

        if let Some(limit) = self.history_limit {
            let excess = state.history.len().saturating_sub(limit);
            // Drop whole exchanges so history always starts with a user turn.
            let drop = excess + excess % 2;
            if drop > 0 {
                let end = drop.min(state.history.len());
                state.history.drain(..end);
                debug!("Trimmed {drop} messages from chat history");
            }
        }
    }

    pub async fn clear_history(&self) -> usize {
        let mut state = self.state.write().await;
        let cleared = state.history.len();
        state.history.clear();
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ChatRole;
    use chrono::Utc;
    use uuid::Uuid;

    fn document(name: &str) -> DocumentInfo {
        DocumentInfo {
            document_id: Uuid::new_v4(),
            file_name: name.to_string(),
            page_count: 1,
            chunk_count: 3,
            uploaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_set_document_replaces_previous() {
        let session = Session::new(None);
        assert!(session.current_document().await.is_none());

        let first = document("first.pdf");
        assert!(session.set_document(first.clone()).await.is_none());

        let previous = session.set_document(document("second.pdf")).await;
        assert_eq!(previous, Some(first));
        assert_eq!(
            session.current_document().await.map(|d| d.file_name),
            Some("second.pdf".to_string())
        );
    }

    #[tokio::test]
    async fn test_history_with_appends_pending_question() {
        let session = Session::new(None);
        session.record_exchange("Name?", "Jane Doe").await;

        let contents = session.history_with("Current role?").await;
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2], ChatTurn::user("Current role?"));
        // Pending question is not stored.
        assert_eq!(session.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unbounded_history_keeps_everything() {
        let session = Session::new(None);
        for i in 0..30 {
            session.record_exchange(&format!("q{i}"), &format!("a{i}")).await;
        }
        assert_eq!(session.history().await.len(), 60);
    }

    #[tokio::test]
    async fn test_history_limit_drops_oldest_exchanges() {
        let session = Session::new(Some(4));
        session.record_exchange("q1", "a1").await;
        session.record_exchange("q2", "a2").await;
        session.record_exchange("q3", "a3").await;

        let history = session.history().await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ChatTurn::user("q2"));
        assert_eq!(history[3], ChatTurn::model("a3"));
    }

    #[tokio::test]
    async fn test_odd_history_limit_starts_with_user_turn() {
        let session = Session::new(Some(3));
        session.record_exchange("q1", "a1").await;
        session.record_exchange("q2", "a2").await;

        let history = session.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0], ChatTurn::user("q2"));
    }

    #[tokio::test]
    async fn test_zero_history_limit_retains_nothing() {
        let session = Session::new(Some(0));
        session.record_exchange("q1", "a1").await;
        assert!(session.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_history_keeps_document() {
        let session = Session::new(None);
        session.set_document(document("cv.pdf")).await;
        session.record_exchange("q", "a").await;

        assert_eq!(session.clear_history().await, 2);
        assert!(session.history().await.is_empty());
        assert!(session.current_document().await.is_some());
    }
}
