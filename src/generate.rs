//! Question-generation collaborator contract
//!
//! An external text-generation service fills the board: one bulk request
//! for all ten questions (the tenth understood to be the harder final-round
//! question) and a single-replacement request carrying the target slot and
//! an avoid-list of prior question texts. The service is treated as
//! unreliable by design - non-JSON or malformed output surfaces as a
//! recoverable [`GenerateError`] and never touches room state. Validation
//! is all-or-nothing: one bad item rejects the whole payload, so nine good
//! questions never sneak in alongside a broken one.

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    constants::{board, generate},
    room::{Question, Room},
};

/// Request payload asking the service for a full board
#[derive(Debug, Clone, Serialize)]
pub struct BulkRequest {
    /// How many questions to generate; always a full board
    pub count: usize,
    /// Whether the last generated question should be harder, suiting the
    /// final round
    pub harder_finale: bool,
}

impl BulkRequest {
    /// Creates the standard full-board request
    pub fn new() -> Self {
        Self {
            count: board::QUESTION_COUNT,
            harder_finale: true,
        }
    }
}

impl Default for BulkRequest {
    /// Same as [`BulkRequest::new`]
    fn default() -> Self {
        Self::new()
    }
}

/// Request payload asking the service to regenerate one slot
#[derive(Debug, Clone, Serialize)]
pub struct ReplacementRequest {
    /// The slot being replaced
    pub slot_index: usize,
    /// Question texts already on the board, to steer the service away from
    /// repeating itself
    pub avoid: Vec<String>,
}

/// Builds the replacement request for one slot of a room's board
///
/// The avoid-list carries every non-empty question text currently on the
/// board, including the slot being replaced.
pub fn replacement_request(room: &Room, slot_index: usize) -> ReplacementRequest {
    ReplacementRequest {
        slot_index,
        avoid: room
            .questions
            .iter()
            .map(|q| q.question.clone())
            .filter(|text| !text.trim().is_empty())
            .collect(),
    }
}

/// Validates that a generated field is non-empty after trimming
fn filled(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("empty after trimming"))
    } else {
        Ok(())
    }
}

/// One question as returned by the generation service
///
/// All three fields must survive trimming; anything else fails validation
/// and rejects the payload it arrived in.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GeneratedQuestion {
    /// The question text
    #[garde(custom(filled), length(chars, max = generate::MAX_FIELD_LENGTH))]
    pub question: String,
    /// The answer text
    #[garde(custom(filled), length(chars, max = generate::MAX_FIELD_LENGTH))]
    pub answer: String,
    /// Category label
    #[garde(custom(filled), length(chars, max = generate::MAX_FIELD_LENGTH))]
    pub category: String,
}

impl From<GeneratedQuestion> for Question {
    /// Trims the generated fields into a board question
    fn from(generated: GeneratedQuestion) -> Self {
        Question {
            question: generated.question.trim().to_owned(),
            answer: generated.answer.trim().to_owned(),
            category: generated.category.trim().to_owned(),
        }
    }
}

/// Bulk response shape: `{"questions": [...]}`
#[derive(Debug, Deserialize)]
struct BulkResponse {
    questions: Vec<GeneratedQuestion>,
}

/// Replacement response shape: `{"question": {...}}`
#[derive(Debug, Deserialize)]
struct ReplacementResponse {
    question: GeneratedQuestion,
}

/// Errors raised while parsing a generation payload
///
/// All of these are recoverable: the caller reports "generation failed" to
/// the host and may simply re-invoke generation.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// The payload was not the expected JSON shape
    #[error("malformed generation payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The bulk payload did not hold exactly one question per slot
    #[error("expected {expected} questions, got {got}")]
    WrongCount {
        /// The required number of questions
        expected: usize,
        /// How many the payload held
        got: usize,
    },
    /// A question failed field validation
    #[error("generated question {index} is invalid: {report}")]
    Invalid {
        /// Index of the offending question within the payload
        index: usize,
        /// The validation failures
        report: garde::Report,
    },
}

/// Parses and validates a bulk generation payload into a full board
///
/// # Errors
///
/// * [`GenerateError::Malformed`] - the payload is not the expected JSON
/// * [`GenerateError::WrongCount`] - not exactly one question per slot
/// * [`GenerateError::Invalid`] - any item has an empty or oversized field;
///   the whole batch is rejected, never partially accepted
pub fn parse_bulk(payload: &str) -> Result<Vec<Question>, GenerateError> {
    let response: BulkResponse = serde_json::from_str(payload)?;
    if response.questions.len() != board::QUESTION_COUNT {
        return Err(GenerateError::WrongCount {
            expected: board::QUESTION_COUNT,
            got: response.questions.len(),
        });
    }
    for (index, question) in response.questions.iter().enumerate() {
        question
            .validate()
            .map_err(|report| GenerateError::Invalid { index, report })?;
    }
    Ok(response.questions.into_iter().map(Question::from).collect())
}

/// Parses and validates a single-replacement payload
///
/// # Errors
///
/// * [`GenerateError::Malformed`] - the payload is not the expected JSON
/// * [`GenerateError::Invalid`] - the question has an empty or oversized
///   field
pub fn parse_replacement(payload: &str) -> Result<Question, GenerateError> {
    let response: ReplacementResponse = serde_json::from_str(payload)?;
    response
        .question
        .validate()
        .map_err(|report| GenerateError::Invalid { index: 0, report })?;
    Ok(response.question.into())
}
