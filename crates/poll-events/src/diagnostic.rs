//! Run Diagnostics
//!
//! Every error that a run recovers from is recorded here, attributed to the
//! agent (and question, where one applies).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage where a recovered error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Generation,
    Parse,
    Coercion,
    Aggregation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Generation => write!(f, "generation"),
            Stage::Parse => write!(f, "parse"),
            Stage::Coercion => write!(f, "coercion"),
            Stage::Aggregation => write!(f, "aggregation"),
        }
    }
}

/// One recovered error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub stage: Stage,
    pub message: String,
}

impl Diagnostic {
    pub fn new(agent_id: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            question: None,
            stage,
            message: message.into(),
        }
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.question {
            Some(q) => write!(f, "[{}] agent {} / '{}': {}", self.stage, self.agent_id, q, self.message),
            None => write!(f, "[{}] agent {}: {}", self.stage, self.agent_id, self.message),
        }
    }
}
