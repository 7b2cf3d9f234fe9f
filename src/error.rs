//! Error types for the questionnaire engine.

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Status lookup error: {0}")]
    Status(#[from] StatusError),
}

/// Answer payload validation errors.
///
/// Raised before an answer is stored; validation never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Question {question_id} requires an answer")]
    Required { question_id: Uuid },

    #[error("Answer to question {question_id} does not match field type {field_type}")]
    WrongShape {
        question_id: Uuid,
        field_type: String,
    },

    #[error("Answer to question {question_id} is not one of the permitted choices")]
    NotAChoice { question_id: Uuid },
}

/// Session lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session was frozen — its answers are final and it cannot be
    /// accessed again.
    #[error("Session {uuid} already used")]
    Frozen { uuid: Uuid },

    /// The session's submission deadline or fill-out duration has passed.
    #[error("Session {uuid} expired")]
    Expired { uuid: Uuid },

    /// The session was invalidated, either explicitly or because a
    /// flow-specific rule (supersession, status mismatch) voided it.
    /// Carries the same message as `Expired`: callers are not told the
    /// difference.
    #[error("Session {uuid} expired")]
    Invalidated { uuid: Uuid },

    /// Freeze was requested while the answered path is incomplete.
    #[error("Session {uuid} is not fully answered")]
    CannotFreeze { uuid: Uuid },

    /// A flow trigger was invoked for a complaint in the wrong status state.
    #[error("Complaint {complaint_id} is not in the required state")]
    WrongState { complaint_id: i64 },

    #[error("Session {uuid} not found")]
    NotFound { uuid: Uuid },
}

/// Question graph structure errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Question graph {name} contains more than {max} questions")]
    TooManyQuestions { name: String, max: usize },

    #[error("Edge {edge_id} refers to unknown question {question_id}")]
    UnknownQuestion { edge_id: Uuid, question_id: Uuid },

    #[error("Edge {edge_id} refers to unknown choice {choice_id}")]
    UnknownChoice { edge_id: Uuid, choice_id: Uuid },

    #[error("Question {question_id} is not part of questionnaire {questionnaire_id}")]
    QuestionNotInGraph {
        question_id: Uuid,
        questionnaire_id: Uuid,
    },

    /// The answered path revisited a question. Only possible when a caller
    /// keeps resolving the same answers around a structural cycle.
    #[error("Cycle detected at question {question_id}")]
    CycleDetected { question_id: Uuid },
}

/// Persistence collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from the read-only complaint status collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Complaint {0} unknown to status provider")]
    UnknownComplaint(i64),

    #[error("Status lookup failed: {0}")]
    Lookup(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
