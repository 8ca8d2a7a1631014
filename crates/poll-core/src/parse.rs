//! Structured answers from free-form model text.
//!
//! Models wrap their JSON in prose and code fences. The first JSON object
//! that carries the expected fields is taken; everything around it is
//! ignored.

use serde_json::{Map, Value};

/// Errors reading structured output from model text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,
    #[error("model output has no '{0}' field")]
    MissingField(&'static str),
    #[error("model output field '{field}' should be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("model gave {responses} responses and {reasonings} reasonings for {expected} questions")]
    LengthMismatch {
        expected: usize,
        responses: usize,
        reasonings: usize,
    },
}

/// Raw per-question answers, before type coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyAnswers {
    pub responses: Vec<Value>,
    pub reasonings: Vec<Value>,
}

/// Top-level JSON objects embedded in `text`, in text order.
fn json_objects(text: &str) -> impl Iterator<Item = Map<String, Value>> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        while let Some(pos) = text[offset..].find('{') {
            let start = offset + pos;
            let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(Value::Object(map))) => {
                    offset = start + stream.byte_offset();
                    return Some(map);
                }
                _ => offset = start + 1,
            }
        }
        None
    })
}

/// The first JSON object in `text` that has every key in `required`.
pub fn extract_json_object(text: &str, required: &[&str]) -> Option<Map<String, Value>> {
    json_objects(text).find(|map| required.iter().all(|key| map.contains_key(*key)))
}

/// Reads `responses` and `reasonings` arrays with one entry per question.
pub fn parse_survey_output(
    text: &str,
    question_count: usize,
) -> Result<SurveyAnswers, GenerationParseError> {
    let map = match extract_json_object(text, &["responses", "reasonings"]) {
        Some(map) => map,
        None => return Err(missing_field(text, &["responses", "reasonings"])),
    };

    let responses = array_field(&map, "responses")?;
    let reasonings = array_field(&map, "reasonings")?;

    if responses.len() != question_count || reasonings.len() != question_count {
        return Err(GenerationParseError::LengthMismatch {
            expected: question_count,
            responses: responses.len(),
            reasonings: reasonings.len(),
        });
    }

    Ok(SurveyAnswers {
        responses,
        reasonings,
    })
}

/// Reads the `utterance` string.
pub fn parse_utterance(text: &str) -> Result<String, GenerationParseError> {
    let map = match extract_json_object(text, &["utterance"]) {
        Some(map) => map,
        None => return Err(missing_field(text, &["utterance"])),
    };

    match map.get("utterance") {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(GenerationParseError::WrongType {
            field: "utterance",
            expected: "a string",
        }),
    }
}

fn array_field(map: &Map<String, Value>, field: &'static str) -> Result<Vec<Value>, GenerationParseError> {
    match map.get(field) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(GenerationParseError::WrongType {
            field,
            expected: "an array",
        }),
        None => Err(GenerationParseError::MissingField(field)),
    }
}

// Names the first field the first object lacks, or reports no object.
fn missing_field(text: &str, required: &[&'static str]) -> GenerationParseError {
    match json_objects(text).next() {
        Some(map) => required
            .iter()
            .find(|key| !map.contains_key(**key))
            .map(|key| GenerationParseError::MissingField(*key))
            .unwrap_or(GenerationParseError::NoJsonObject),
        None => GenerationParseError::NoJsonObject,
    }
}
