//! In-process store backed by maps behind one async lock.
//!
//! The single `RwLock` doubles as the per-session serialization the engine
//! requires: writers take the lock exclusively, so answer/freeze races
//! resolve in lock-acquisition order. Used by tests and by embedders that do
//! not bring their own backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::model::{Answer, Flow, Questionnaire, Session};

use super::traits::Store;

#[derive(Default)]
struct Inner {
    questionnaires: HashMap<Uuid, Questionnaire>,
    sessions: HashMap<Uuid, Session>,
    answers: Vec<Answer>,
}

/// Map-backed [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_questionnaire(&self, questionnaire: &Questionnaire) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .questionnaires
            .insert(questionnaire.id, questionnaire.clone());
        Ok(())
    }

    async fn get_questionnaire(&self, id: Uuid) -> Result<Option<Questionnaire>, StoreError> {
        Ok(self.inner.read().await.questionnaires.get(&id).cloned())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(session.uuid, session.clone());
        Ok(())
    }

    async fn get_session(&self, uuid: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.inner.read().await.sessions.get(&uuid).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&session.uuid) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "session".to_string(),
                id: session.uuid.to_string(),
            }),
        }
    }

    async fn sessions_for_complaint(
        &self,
        complaint_id: i64,
        flow: Flow,
    ) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| {
                s.complaint
                    .as_ref()
                    .is_some_and(|c| c.complaint_id == complaint_id)
            })
            .filter(|s| {
                inner
                    .questionnaires
                    .get(&s.questionnaire_id)
                    .is_some_and(|q| q.flow == flow)
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&answer.session_uuid) {
            return Err(StoreError::NotFound {
                entity: "session".to_string(),
                id: answer.session_uuid.to_string(),
            });
        }
        inner.answers.push(answer.clone());
        Ok(())
    }

    async fn answers_for_session(&self, session_uuid: Uuid) -> Result<Vec<Answer>, StoreError> {
        let inner = self.inner.read().await;
        let mut answers: Vec<Answer> = inner
            .answers
            .iter()
            .filter(|a| a.session_uuid == session_uuid)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.created_at);
        Ok(answers)
    }
}
