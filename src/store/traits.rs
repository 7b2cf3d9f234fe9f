//! `Store` trait — single async interface for all persistence.
//!
//! The engine assumes, but does not implement, serialization of concurrent
//! writes to one session: implementations must scope a row lock or
//! serializable transaction to the session so that "latest answer per
//! question" races resolve consistently and a freeze, once durably visible,
//! is observed by every later answer attempt.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::model::{Answer, Flow, Questionnaire, Session};

/// Backend-agnostic storage covering questionnaires, sessions, and answers.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Questionnaires ──────────────────────────────────────────────

    /// Insert a new questionnaire (with its embedded graph).
    async fn insert_questionnaire(&self, questionnaire: &Questionnaire) -> Result<(), StoreError>;

    /// Get a questionnaire by ID.
    async fn get_questionnaire(&self, id: Uuid) -> Result<Option<Questionnaire>, StoreError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Insert a new session.
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Get a session by its public UUID.
    async fn get_session(&self, uuid: Uuid) -> Result<Option<Session>, StoreError>;

    /// Persist a session's mutated lifecycle fields (started_at, frozen,
    /// invalidated).
    async fn update_session(&self, session: &Session) -> Result<(), StoreError>;

    /// All sessions created for a complaint under the given flow.
    async fn sessions_for_complaint(
        &self,
        complaint_id: i64,
        flow: Flow,
    ) -> Result<Vec<Session>, StoreError>;

    // ── Answers ─────────────────────────────────────────────────────

    /// Append an answer. Answers are never updated or deleted.
    async fn insert_answer(&self, answer: &Answer) -> Result<(), StoreError>;

    /// All answers of a session, oldest first.
    async fn answers_for_session(&self, session_uuid: Uuid) -> Result<Vec<Answer>, StoreError>;

    /// Only the most recent answer per question, oldest first.
    async fn latest_answers_for_session(
        &self,
        session_uuid: Uuid,
    ) -> Result<Vec<Answer>, StoreError> {
        let all = self.answers_for_session(session_uuid).await?;
        let mut latest: HashMap<Uuid, Answer> = HashMap::new();
        for answer in all {
            latest.insert(answer.question_id, answer);
        }
        let mut result: Vec<Answer> = latest.into_values().collect();
        result.sort_by_key(|a| a.created_at);
        Ok(result)
    }
}
