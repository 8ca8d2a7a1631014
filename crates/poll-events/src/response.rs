//! Agent Responses
//!
//! Per-agent answers produced by the query protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single structured answer.
///
/// Serializes untagged: `"Yes"`, `7`, `7.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Integer(i64),
    Float(f64),
    Choice(String),
}

impl AnswerValue {
    /// The chosen option, for categorical answers.
    pub fn as_choice(&self) -> Option<&str> {
        match self {
            AnswerValue::Choice(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric value, for numerical answers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Integer(n) => Some(*n as f64),
            AnswerValue::Float(x) => Some(*x),
            AnswerValue::Choice(_) => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Integer(n) => write!(f, "{}", n),
            AnswerValue::Float(x) => write!(f, "{}", x),
            AnswerValue::Choice(s) => write!(f, "{}", s),
        }
    }
}

/// One agent's answers to a question set.
///
/// `responses[i]` and `reasonings[i]` both belong to question `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub agent_id: String,
    pub responses: Vec<AnswerValue>,
    pub reasonings: Vec<String>,
}

impl QueryResult {
    pub fn new(
        agent_id: impl Into<String>,
        responses: Vec<AnswerValue>,
        reasonings: Vec<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            responses,
            reasonings,
        }
    }

    /// True when responses and reasonings line up with `question_count`.
    pub fn is_aligned(&self, question_count: usize) -> bool {
        self.responses.len() == question_count && self.reasonings.len() == question_count
    }
}

/// One agent's dialogue turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceResult {
    pub agent_id: String,
    pub utterance: String,
}

/// Any successful per-agent response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentResponse {
    Survey(QueryResult),
    Utterance(UtteranceResult),
}

impl AgentResponse {
    pub fn agent_id(&self) -> &str {
        match self {
            AgentResponse::Survey(r) => &r.agent_id,
            AgentResponse::Utterance(u) => &u.agent_id,
        }
    }

    pub fn as_survey(&self) -> Option<&QueryResult> {
        match self {
            AgentResponse::Survey(r) => Some(r),
            AgentResponse::Utterance(_) => None,
        }
    }
}

/// A line of dialogue, serialized as `["speaker", "text"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DialogueTurn {
    pub speaker: String,
    pub text: String,
}

impl DialogueTurn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

impl From<(String, String)> for DialogueTurn {
    fn from((speaker, text): (String, String)) -> Self {
        Self { speaker, text }
    }
}

impl From<DialogueTurn> for (String, String) {
    fn from(turn: DialogueTurn) -> Self {
        (turn.speaker, turn.text)
    }
}
