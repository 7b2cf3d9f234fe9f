//! Engine — the external interface of the questionnaire core.
//!
//! Composes the store and status collaborators with the graph/session/answer
//! services. Each operation executes synchronously within one request; no
//! background work is scheduled here, and deadlines are evaluated lazily on
//! access.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::answer::validate_answer_payload;
use crate::config::EngineConfig;
use crate::error::{Error, GraphError, Result, SessionError, StoreError};
use crate::graph::{FieldType, GraphBuilder, Question, QuestionGraphService};
use crate::session::gate::AccessGate;
use crate::session::model::{Answer, Flow, Questionnaire, Session};
use crate::session::service::{SessionPath, SessionService};
use crate::status::StatusProvider;
use crate::store::Store;

/// The questionnaire engine.
pub struct Engine {
    store: Arc<dyn Store>,
    status: Arc<dyn StatusProvider>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, status: Arc<dyn StatusProvider>) -> Self {
        Self {
            store,
            status,
            config: EngineConfig::default(),
        }
    }

    /// Builder: override the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Store a questionnaire so sessions can be handed out for it.
    pub async fn publish_questionnaire(&self, questionnaire: &Questionnaire) -> Result<()> {
        // Materialize once to surface structural problems at publish time.
        QuestionGraphService::materialize(questionnaire.graph.clone(), self.config.max_questions)?;
        self.store.insert_questionnaire(questionnaire).await?;
        info!(
            questionnaire = %questionnaire.id,
            flow = %questionnaire.flow,
            "questionnaire published"
        );
        Ok(())
    }

    /// Create a session with the configured default duration and no deadline.
    pub async fn create_session(&self, questionnaire_id: Uuid) -> Result<Session> {
        self.create_session_with(questionnaire_id, None, None).await
    }

    /// Create a session with an explicit deadline and/or fill-out duration.
    pub async fn create_session_with(
        &self,
        questionnaire_id: Uuid,
        submit_before: Option<DateTime<Utc>>,
        duration_secs: Option<i64>,
    ) -> Result<Session> {
        let questionnaire = self.load_questionnaire(questionnaire_id).await?;

        let mut session = Session::new(questionnaire.id)
            .with_duration_secs(duration_secs.unwrap_or(self.config.session_duration_secs));
        if let Some(deadline) = submit_before {
            session = session.with_submit_before(deadline);
        }
        self.store.insert_session(&session).await?;
        debug!(session = %session.uuid, questionnaire = %questionnaire.id, "session created");
        Ok(session)
    }

    /// Flow trigger: pose the complaint's open question back to the original
    /// respondent. The complaint must currently be in the configured
    /// reaction-requested state; its status text becomes the single question.
    pub async fn create_session_for_reaction_request(&self, complaint_id: i64) -> Result<Session> {
        let status = self.status.current_status(complaint_id).await?;
        if status.state != self.config.reaction_requested_state {
            return Err(SessionError::WrongState { complaint_id }.into());
        }

        let mut builder = GraphBuilder::new("reaction-request");
        builder.question(
            Question::new(status.text.clone().unwrap_or_default(), FieldType::PlainText)
                .with_short_label("Requested reaction")
                .with_analysis_key("reaction")
                .required(),
        );
        let questionnaire = Questionnaire::new(
            "Reaction requested",
            builder.build(),
            Flow::ReactionRequest,
        );

        let session = Session::new(questionnaire.id)
            .with_complaint(complaint_id, status.state)
            .with_duration_secs(self.config.session_duration_secs)
            .with_submit_before(Utc::now() + Duration::days(self.config.reaction_request_days_open));

        self.store.insert_questionnaire(&questionnaire).await?;
        self.store.insert_session(&session).await?;
        info!(
            session = %session.uuid,
            complaint = complaint_id,
            "reaction-request session created"
        );
        Ok(session)
    }

    /// Flow trigger: ask an external party to report what was done about a
    /// forwarded complaint. Several such sessions may be open concurrently
    /// for one complaint.
    pub async fn create_session_for_forward_to_external(
        &self,
        complaint_id: i64,
    ) -> Result<Session> {
        let status = self.status.current_status(complaint_id).await?;
        if status.state != self.config.forwarded_to_external_state {
            return Err(SessionError::WrongState { complaint_id }.into());
        }

        let mut builder = GraphBuilder::new("forward-to-external");
        let reaction = builder.question(
            Question::new(status.text.clone().unwrap_or_default(), FieldType::PlainText)
                .with_short_label("Response after handling")
                .with_analysis_key("reaction")
                .required(),
        );
        let photos = builder.question(
            Question::new("Add photos", FieldType::Attachment).with_analysis_key("photos"),
        );
        builder.connect(reaction, photos);
        let questionnaire = Questionnaire::new(
            "Forwarded to external party",
            builder.build(),
            Flow::ForwardToExternal,
        );

        let session = Session::new(questionnaire.id)
            .with_complaint(complaint_id, status.state)
            .with_duration_secs(self.config.session_duration_secs)
            .with_submit_before(
                Utc::now() + Duration::days(self.config.forward_to_external_days_open),
            );

        self.store.insert_questionnaire(&questionnaire).await?;
        self.store.insert_session(&session).await?;
        info!(
            session = %session.uuid,
            complaint = complaint_id,
            "forward-to-external session created"
        );
        Ok(session)
    }

    /// Check whether a session may be served to a respondent; returns the
    /// session when it may.
    pub async fn check_accessible(&self, session_uuid: Uuid) -> Result<Session> {
        let session = self.load_session(session_uuid).await?;
        let questionnaire = self.load_questionnaire(session.questionnaire_id).await?;
        AccessGate::new(self.store.as_ref(), self.status.as_ref())
            .check(&session, questionnaire.flow)
            .await?;
        Ok(session)
    }

    /// Create a session implicitly with its first answer — how an anonymous
    /// respondent enters a questionnaire without an explicit flow trigger.
    pub async fn create_answer_new_session(
        &self,
        questionnaire_id: Uuid,
        question_id: Uuid,
        payload: Value,
    ) -> Result<(Session, Answer)> {
        let session = self.create_session(questionnaire_id).await?;
        let answer = self
            .create_answer(session.uuid, question_id, payload)
            .await?;
        let session = self.load_session(session.uuid).await?;
        Ok((session, answer))
    }

    /// Validate and append an answer to the session's current question set.
    ///
    /// The first answer starts the fill-out clock. Raises on a question
    /// outside the questionnaire, an inaccessible session, or an invalid
    /// payload.
    pub async fn create_answer(
        &self,
        session_uuid: Uuid,
        question_id: Uuid,
        payload: Value,
    ) -> Result<Answer> {
        let mut session = self.load_session(session_uuid).await?;
        let questionnaire = self.load_questionnaire(session.questionnaire_id).await?;
        let graph = QuestionGraphService::materialize(
            questionnaire.graph.clone(),
            self.config.max_questions,
        )?;

        let question = graph
            .question(question_id)
            .ok_or(GraphError::QuestionNotInGraph {
                question_id,
                questionnaire_id: questionnaire.id,
            })?;

        AccessGate::new(self.store.as_ref(), self.status.as_ref())
            .check(&session, questionnaire.flow)
            .await?;

        if session.started_at.is_none() {
            session.started_at = Some(Utc::now());
            self.store.update_session(&session).await?;
        }

        validate_answer_payload(&payload, question)?;

        let answer = Answer::new(session.uuid, question_id, payload);
        self.store.insert_answer(&answer).await?;
        debug!(session = %session.uuid, question = %question_id, "answer recorded");
        Ok(answer)
    }

    /// Answer several questions at once. Per-question validation problems are
    /// collected and returned keyed by question ID instead of aborting;
    /// lifecycle rejections (frozen, expired, invalidated) still abort.
    pub async fn create_answers(
        &self,
        session_uuid: Uuid,
        items: &[(Uuid, Value)],
    ) -> Result<HashMap<Uuid, String>> {
        let mut errors = HashMap::new();
        for (question_id, payload) in items {
            match self
                .create_answer(session_uuid, *question_id, payload.clone())
                .await
            {
                Ok(_) => {}
                Err(Error::Validation(e)) => {
                    errors.insert(*question_id, e.to_string());
                }
                Err(Error::Graph(e @ GraphError::QuestionNotInGraph { .. })) => {
                    errors.insert(*question_id, e.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(errors)
    }

    /// Resolve which question follows `question_id` when answered with
    /// `payload`; `None` means the question is terminal.
    pub async fn get_next_question(
        &self,
        session_uuid: Uuid,
        question_id: Uuid,
        payload: &Value,
    ) -> Result<Option<Question>> {
        let service = self.session_service(session_uuid).await?;
        Ok(service.next_question(question_id, payload).cloned())
    }

    /// The session's current path: reachable questions, the unanswered
    /// remainder, authoritative answers, and freeze-readiness.
    pub async fn session_state(&self, session_uuid: Uuid) -> Result<SessionPath> {
        let service = self.session_service(session_uuid).await?;
        Ok(service.path()?)
    }

    /// Freeze a session, making its answers final.
    ///
    /// No-op success when already frozen; otherwise the session must be
    /// accessible and fully answered. Persisting the frozen flag through the
    /// store makes it visible to every later answer attempt.
    pub async fn freeze(&self, session_uuid: Uuid) -> Result<Session> {
        let mut service = self.session_service(session_uuid).await?;
        if service.session().frozen {
            return Ok(service.session().clone());
        }

        let questionnaire = self
            .load_questionnaire(service.session().questionnaire_id)
            .await?;
        AccessGate::new(self.store.as_ref(), self.status.as_ref())
            .check(service.session(), questionnaire.flow)
            .await?;

        let frozen = service.freeze()?.clone();
        self.store.update_session(&frozen).await?;
        info!(session = %frozen.uuid, "session frozen");
        Ok(frozen)
    }

    /// Explicitly void a session. Idempotent; the respondent will see the
    /// same rejection as an expired link.
    pub async fn invalidate(&self, session_uuid: Uuid) -> Result<Session> {
        let mut session = self.load_session(session_uuid).await?;
        if !session.invalidated {
            session.invalidated = true;
            self.store.update_session(&session).await?;
            info!(session = %session.uuid, "session invalidated");
        }
        Ok(session)
    }

    /// Load a session with its materialized graph and answer snapshot.
    pub async fn session_service(&self, session_uuid: Uuid) -> Result<SessionService> {
        let session = self.load_session(session_uuid).await?;
        let questionnaire = self.load_questionnaire(session.questionnaire_id).await?;
        let graph = QuestionGraphService::materialize(
            questionnaire.graph,
            self.config.max_questions,
        )?;
        let answers = self.store.answers_for_session(session_uuid).await?;
        Ok(SessionService::new(session, graph, answers))
    }

    async fn load_session(&self, session_uuid: Uuid) -> Result<Session> {
        self.store
            .get_session(session_uuid)
            .await?
            .ok_or_else(|| SessionError::NotFound { uuid: session_uuid }.into())
    }

    async fn load_questionnaire(&self, id: Uuid) -> Result<Questionnaire> {
        self.store
            .get_questionnaire(id)
            .await?
            .ok_or_else(|| {
                Error::Store(StoreError::NotFound {
                    entity: "questionnaire".to_string(),
                    id: id.to_string(),
                })
            })
    }
}
