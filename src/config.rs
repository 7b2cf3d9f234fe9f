//! Configuration types.

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default time a respondent gets to fill out a questionnaire, counted
    /// from their first answer. Applied to sessions created without an
    /// explicit duration.
    pub session_duration_secs: i64,
    /// Days a reaction-request session stays open (sets `submit_before`).
    pub reaction_request_days_open: i64,
    /// Days a forward-to-external session stays open (sets `submit_before`).
    pub forward_to_external_days_open: i64,
    /// Maximum number of questions a graph may contain.
    pub max_questions: usize,
    /// Complaint status state that triggers the reaction-request flow.
    pub reaction_requested_state: String,
    /// Complaint status state that triggers the forward-to-external flow.
    pub forwarded_to_external_state: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: 2 * 60 * 60, // 2 hours
            reaction_request_days_open: 5,
            forward_to_external_days_open: 14,
            max_questions: 50,
            reaction_requested_state: "reaction_requested".to_string(),
            forwarded_to_external_state: "forwarded_to_external".to_string(),
        }
    }
}
