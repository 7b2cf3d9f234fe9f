//! Sessions — one respondent's walk through a questionnaire's graph.

pub mod gate;
pub mod model;
pub mod service;

pub use gate::AccessGate;
pub use model::{Answer, ComplaintRef, Flow, Questionnaire, Session};
pub use service::{ResponseEntry, SessionPath, SessionService};
