//! Read-only collaborator for the complaint/status domain.
//!
//! The engine never owns or advances a complaint's workflow; it only reads
//! the current status to gate reaction-request sessions and to seed their
//! questionnaires.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::StatusError;

/// Snapshot of a complaint's current status, as reported by the owning
/// domain. The state tag is opaque here and only compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Workflow state tag (e.g. "reaction_requested").
    pub state: String,
    /// Free-form text the operator attached to the status change. Becomes
    /// the question posed to the respondent in the reaction-request flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl StatusSnapshot {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            text: None,
        }
    }

    /// Builder: set the operator text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Read access to the complaint domain's current status per complaint.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Current status of a complaint.
    async fn current_status(&self, complaint_id: i64) -> Result<StatusSnapshot, StatusError>;
}

/// In-process provider backed by a map; for tests and embedders that push
/// status snapshots in rather than exposing their domain.
#[derive(Default)]
pub struct StaticStatusProvider {
    statuses: RwLock<HashMap<i64, StatusSnapshot>>,
}

impl StaticStatusProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current status for a complaint, replacing any previous one.
    pub async fn set_status(&self, complaint_id: i64, status: StatusSnapshot) {
        self.statuses.write().await.insert(complaint_id, status);
    }
}

#[async_trait]
impl StatusProvider for StaticStatusProvider {
    async fn current_status(&self, complaint_id: i64) -> Result<StatusSnapshot, StatusError> {
        self.statuses
            .read()
            .await
            .get(&complaint_id)
            .cloned()
            .ok_or(StatusError::UnknownComplaint(complaint_id))
    }
}
