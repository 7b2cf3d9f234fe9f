//! Session data model — questionnaires, flows, sessions, and answers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::graph::QuestionGraph;

/// The enumerated purpose of a questionnaire; parametrizes session-validity
/// rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Open-ended information collection, not tied to a complaint's state.
    GeneralCollection,
    /// A reaction was requested from the original respondent; single-use and
    /// superseded by any newer request for the same complaint.
    ReactionRequest,
    /// The complaint was forwarded to an external party; several parties may
    /// answer concurrently.
    ForwardToExternal,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GeneralCollection => "general_collection",
            Self::ReactionRequest => "reaction_request",
            Self::ForwardToExternal => "forward_to_external",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Flow {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general_collection" => Ok(Self::GeneralCollection),
            "reaction_request" => Ok(Self::ReactionRequest),
            "forward_to_external" => Ok(Self::ForwardToExternal),
            _ => Err(format!("Unknown flow: {}", s)),
        }
    }
}

/// A question graph published under a flow, ready to hand out sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    /// Unique questionnaire ID.
    pub id: Uuid,
    /// Operator-facing name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The question graph sessions walk.
    pub graph: QuestionGraph,
    /// Purpose tag; selects the session-validity rules.
    pub flow: Flow,
}

impl Questionnaire {
    pub fn new(name: impl Into<String>, graph: QuestionGraph, flow: Flow) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            graph,
            flow,
        }
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Link from a session to the external complaint it was created for.
///
/// Records the complaint's status state at creation time; the
/// reaction-request gate compares it against the complaint's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintRef {
    pub complaint_id: i64,
    /// Status state of the complaint when this session was created.
    pub status_state: String,
}

/// One respondent's in-progress or completed walk through a questionnaire.
///
/// Mutated only by freeze and invalidate; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Public session identifier (the only handle respondents hold).
    pub uuid: Uuid,
    /// Questionnaire this session walks.
    pub questionnaire_id: Uuid,
    /// Complaint this session was created for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complaint: Option<ComplaintRef>,
    /// Whether the session's answers are final.
    pub frozen: bool,
    /// Whether the session was explicitly voided.
    pub invalidated: bool,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Set when the first answer arrives; starts the duration clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Maximum time allowed for filling out, counted from `started_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    /// Hard submission deadline. Not extended by `duration_secs`: starting
    /// five minutes before the deadline leaves five minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_before: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh session for a questionnaire. No deadline; duration is
    /// applied by the engine from configuration.
    pub fn new(questionnaire_id: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            questionnaire_id,
            complaint: None,
            frozen: false,
            invalidated: false,
            created_at: Utc::now(),
            started_at: None,
            duration_secs: None,
            submit_before: None,
        }
    }

    /// Builder: attach the complaint this session was created for.
    pub fn with_complaint(mut self, complaint_id: i64, status_state: impl Into<String>) -> Self {
        self.complaint = Some(ComplaintRef {
            complaint_id,
            status_state: status_state.into(),
        });
        self
    }

    /// Builder: set the hard submission deadline.
    pub fn with_submit_before(mut self, deadline: DateTime<Utc>) -> Self {
        self.submit_before = Some(deadline);
        self
    }

    /// Builder: set the fill-out duration in seconds.
    pub fn with_duration_secs(mut self, secs: i64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Whether the submission deadline or the fill-out duration has passed.
    ///
    /// Either bound may be absent; a session with neither never expires.
    /// Evaluated lazily on access — no timers run anywhere.
    pub fn is_expired(&self) -> bool {
        let now = Utc::now();
        if self.submit_before.is_some_and(|deadline| deadline < now) {
            return true;
        }
        match (self.started_at, self.duration_secs) {
            (Some(started), Some(secs)) => started + Duration::seconds(secs) < now,
            _ => false,
        }
    }

    /// Expired without ever being submitted.
    pub fn too_late(&self) -> bool {
        !self.frozen && self.is_expired()
    }
}

/// One submitted answer. Append-only: correcting an answer before freezing
/// appends a newer row, and the most recent answer per question is
/// authoritative for path resolution; all rows persist for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub session_uuid: Uuid,
    pub question_id: Uuid,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(session_uuid: Uuid, question_id: Uuid, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_uuid,
            question_id,
            payload,
            created_at: Utc::now(),
        }
    }
}
