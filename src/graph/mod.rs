//! Question graph — durable description of questions and transition edges.

pub mod model;
pub mod service;

pub use model::{Choice, Edge, FieldType, GraphBuilder, Question, QuestionGraph};
pub use service::QuestionGraphService;
