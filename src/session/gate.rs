//! Accessibility gate — decides whether a session may still be served to a
//! respondent, per the questionnaire's flow.

use tracing::debug;

use crate::error::{Error, SessionError};
use crate::status::StatusProvider;
use crate::store::Store;

use super::model::{Flow, Session};

/// Lifecycle gate over one session. Checks common rules (frozen, deadline,
/// explicit invalidation) and then dispatches on the flow tag for the
/// flow-specific ones.
///
/// Invalidation — explicit or flow-derived — surfaces as
/// [`SessionError::Invalidated`], which presents the same message as
/// expiry: respondents are not told why a link stopped working.
pub struct AccessGate<'a> {
    store: &'a dyn Store,
    status: &'a dyn StatusProvider,
}

impl<'a> AccessGate<'a> {
    pub fn new(store: &'a dyn Store, status: &'a dyn StatusProvider) -> Self {
        Self { store, status }
    }

    /// Check whether the session may be accessed. Returns the first
    /// applicable rejection.
    pub async fn check(&self, session: &Session, flow: Flow) -> Result<(), Error> {
        // Answers were submitted and made final: the one-use link is spent.
        if session.frozen {
            debug!(session = %session.uuid, "rejected: frozen");
            return Err(SessionError::Frozen {
                uuid: session.uuid,
            }
            .into());
        }

        if session.is_expired() {
            debug!(session = %session.uuid, "rejected: expired");
            return Err(SessionError::Expired {
                uuid: session.uuid,
            }
            .into());
        }

        if session.invalidated {
            debug!(session = %session.uuid, "rejected: invalidated");
            return Err(SessionError::Invalidated {
                uuid: session.uuid,
            }
            .into());
        }

        match flow {
            Flow::GeneralCollection => Ok(()),
            // Several external parties may hold open sessions for the same
            // complaint concurrently; deadline/frozen checks suffice.
            Flow::ForwardToExternal => Ok(()),
            Flow::ReactionRequest => self.check_reaction_request(session).await,
        }
    }

    /// A reaction-request session is only valid while the complaint still
    /// waits for exactly this reaction: the complaint must exist, its status
    /// must not have moved on, and no newer request may have been issued.
    async fn check_reaction_request(&self, session: &Session) -> Result<(), Error> {
        let Some(complaint) = &session.complaint else {
            debug!(session = %session.uuid, "rejected: reaction request without complaint");
            return Err(SessionError::Invalidated {
                uuid: session.uuid,
            }
            .into());
        };

        let current = self.status.current_status(complaint.complaint_id).await?;
        if current.state != complaint.status_state {
            debug!(
                session = %session.uuid,
                complaint = complaint.complaint_id,
                recorded = %complaint.status_state,
                current = %current.state,
                "rejected: complaint status moved on"
            );
            return Err(SessionError::Invalidated {
                uuid: session.uuid,
            }
            .into());
        }

        // Supersession: a newer request voids this one; older sessions are
        // never explicitly flagged.
        let siblings = self
            .store
            .sessions_for_complaint(complaint.complaint_id, Flow::ReactionRequest)
            .await?;
        let superseded = siblings
            .iter()
            .any(|s| s.uuid != session.uuid && s.created_at > session.created_at);
        if superseded {
            debug!(
                session = %session.uuid,
                complaint = complaint.complaint_id,
                "rejected: superseded by newer reaction request"
            );
            return Err(SessionError::Invalidated {
                uuid: session.uuid,
            }
            .into());
        }

        Ok(())
    }
}
