//! AnswerService — validates candidate answer payloads against a question's
//! declared type and choice constraints. Never mutates state.

use serde_json::Value;

use crate::error::ValidationError;
use crate::graph::{FieldType, Question};

/// Validate an answer payload against a question.
///
/// A non-required question accepts a JSON null payload unchanged (that is how
/// an optional question is skipped while still closing the path). Anything
/// else must satisfy the enforced choice set, if any, and the shape of the
/// question's field type.
pub fn validate_answer_payload(payload: &Value, question: &Question) -> Result<(), ValidationError> {
    if is_empty(payload) {
        if question.required {
            return Err(ValidationError::Required {
                question_id: question.id,
            });
        }
        return Ok(());
    }

    if question.enforce_choices && !question.choices.iter().any(|c| c.payload == *payload) {
        return Err(ValidationError::NotAChoice {
            question_id: question.id,
        });
    }

    if !shape_matches(payload, question.field_type) {
        return Err(ValidationError::WrongShape {
            question_id: question.id,
            field_type: question.field_type.to_string(),
        });
    }

    Ok(())
}

/// Null, or an all-whitespace string, counts as no answer.
fn is_empty(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn shape_matches(payload: &Value, field_type: FieldType) -> bool {
    match field_type {
        FieldType::PlainText => payload.is_string(),
        FieldType::Integer => payload.is_i64() || payload.is_u64(),
        FieldType::Boolean => payload.is_boolean(),
        // The stored file itself is an external collaborator's concern; the
        // payload records where it went and what it was called.
        FieldType::Attachment => {
            payload.get("original_filename").is_some_and(Value::is_string)
                && payload.get("location").is_some_and(Value::is_string)
        }
    }
}
