//! Survey Requests
//!
//! The request envelope a host submits:
//!
//! ```json
//! {
//!   "func_name": "categorical",
//!   "func_input_data": { "Do you vote?": ["Yes", "No"] },
//!   "llm_config_name": "model_2",
//!   "agent_count": 10
//! }
//! ```
//!
//! `func_name` is a closed set; unknown names fail at parse time.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;

use crate::question::{categorical, numerical};
use crate::{DialogueTurn, QuestionSet, SelectionRequest};

/// Name of a request command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Single-choice survey. `func` is accepted for older envelopes.
    #[serde(alias = "func")]
    Categorical,
    Numerical,
    Utterance,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Categorical => write!(f, "categorical"),
            CommandKind::Numerical => write!(f, "numerical"),
            CommandKind::Utterance => write!(f, "utterance"),
        }
    }
}

/// What each selected agent is asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Categorical {
        questions: QuestionSet,
    },
    Numerical {
        questions: QuestionSet,
        /// Answers are floats when set, integers otherwise.
        float_resp: bool,
    },
    Utterance {
        dialogue: Vec<DialogueTurn>,
        context: String,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Categorical { .. } => CommandKind::Categorical,
            Command::Numerical { .. } => CommandKind::Numerical,
            Command::Utterance { .. } => CommandKind::Utterance,
        }
    }

    /// Question set for survey commands.
    pub fn questions(&self) -> Option<&QuestionSet> {
        match self {
            Command::Categorical { questions } | Command::Numerical { questions, .. } => {
                Some(questions)
            }
            Command::Utterance { .. } => None,
        }
    }
}

/// A complete survey request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSurveyRequest")]
pub struct SurveyRequest {
    pub command: Command,
    /// Named model configuration; the configured default applies when absent.
    pub llm_config_name: Option<String>,
    pub agent_count: SelectionRequest,
}

impl SurveyRequest {
    pub fn new(command: Command, agent_count: SelectionRequest) -> Self {
        Self {
            command,
            llm_config_name: None,
            agent_count,
        }
    }

    pub fn with_llm(mut self, name: impl Into<String>) -> Self {
        self.llm_config_name = Some(name.into());
        self
    }

    /// Parses a request from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// `func_input_data` stays raw until `func_name` is known, so question
// order survives (a `serde_json::Value` map would sort it).
#[derive(Deserialize)]
struct RawSurveyRequest {
    func_name: CommandKind,
    func_input_data: Box<RawValue>,
    #[serde(default)]
    llm_config_name: Option<String>,
    #[serde(default)]
    agent_count: SelectionRequest,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct CategoricalInput(#[serde(with = "categorical")] QuestionSet);

#[derive(Deserialize)]
struct NumericalInput {
    #[serde(with = "numerical")]
    questions: QuestionSet,
    #[serde(default)]
    float_resp: bool,
}

#[derive(Deserialize)]
struct UtteranceInput {
    dialogue: Vec<DialogueTurn>,
    #[serde(default)]
    context: String,
}

impl TryFrom<RawSurveyRequest> for SurveyRequest {
    type Error = serde_json::Error;

    fn try_from(raw: RawSurveyRequest) -> Result<Self, Self::Error> {
        let input = raw.func_input_data.get();
        let command = match raw.func_name {
            CommandKind::Categorical => {
                let CategoricalInput(questions) = serde_json::from_str(input)?;
                Command::Categorical { questions }
            }
            CommandKind::Numerical => {
                let NumericalInput { questions, float_resp } = serde_json::from_str(input)?;
                Command::Numerical { questions, float_resp }
            }
            CommandKind::Utterance => {
                let UtteranceInput { dialogue, context } = serde_json::from_str(input)?;
                Command::Utterance { dialogue, context }
            }
        };

        Ok(Self {
            command,
            llm_config_name: raw.llm_config_name,
            agent_count: raw.agent_count,
        })
    }
}

#[derive(Serialize)]
struct NumericalInputRef<'a> {
    questions: &'a QuestionSet,
    float_resp: bool,
}

#[derive(Serialize)]
struct UtteranceInputRef<'a> {
    dialogue: &'a [DialogueTurn],
    context: &'a str,
}

impl Serialize for SurveyRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("SurveyRequest", 4)?;
        s.serialize_field("func_name", &self.command.kind())?;
        match &self.command {
            Command::Categorical { questions } => s.serialize_field("func_input_data", questions)?,
            Command::Numerical { questions, float_resp } => s.serialize_field(
                "func_input_data",
                &NumericalInputRef {
                    questions,
                    float_resp: *float_resp,
                },
            )?,
            Command::Utterance { dialogue, context } => s.serialize_field(
                "func_input_data",
                &UtteranceInputRef { dialogue, context },
            )?,
        }
        s.serialize_field("llm_config_name", &self.llm_config_name)?;
        s.serialize_field("agent_count", &self.agent_count)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_categorical_envelope() {
        let json = r#"{
            "func_name": "categorical",
            "func_input_data": {"Zoo?": ["Yes", "No"], "Art?": ["Often", "Never"]},
            "llm_config_name": "model_2",
            "agent_count": "20%"
        }"#;

        let request = SurveyRequest::from_json(json).unwrap();
        assert_eq!(request.command.kind(), CommandKind::Categorical);
        assert_eq!(request.llm_config_name.as_deref(), Some("model_2"));
        assert_eq!(request.agent_count, SelectionRequest::Percent(20.0));

        let texts: Vec<&str> = request.command.questions().unwrap().texts().collect();
        assert_eq!(texts, vec!["Zoo?", "Art?"], "question order must follow the document");
    }

    #[test]
    fn test_legacy_func_name_is_categorical() {
        let json = r#"{"func_name": "func", "func_input_data": {"Q": ["A"]}, "agent_count": 1}"#;
        let request = SurveyRequest::from_json(json).unwrap();
        assert_eq!(request.command.kind(), CommandKind::Categorical);
        assert!(request.llm_config_name.is_none());
    }

    #[test]
    fn test_unknown_command_rejected() {
        let json = r#"{"func_name": "predict_election", "func_input_data": {}, "agent_count": 3}"#;
        assert!(SurveyRequest::from_json(json).is_err());
    }

    #[test]
    fn test_parse_numerical_and_utterance() {
        let numerical = r#"{
            "func_name": "numerical",
            "func_input_data": {"questions": {"Hours slept?": [0, 24]}, "float_resp": true},
            "agent_count": 5
        }"#;
        let request = SurveyRequest::from_json(numerical).unwrap();
        assert!(matches!(request.command, Command::Numerical { float_resp: true, .. }));

        let utterance = r#"{
            "func_name": "utterance",
            "func_input_data": {"dialogue": [["Interviewer", "How are you?"]]},
            "agent_count": 1
        }"#;
        let request = SurveyRequest::from_json(utterance).unwrap();
        match request.command {
            Command::Utterance { dialogue, context } => {
                assert_eq!(dialogue.len(), 1);
                assert!(context.is_empty());
            }
            other => panic!("expected utterance, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_option_list_rejected() {
        let json = r#"{"func_name": "categorical", "func_input_data": {"Q": []}, "agent_count": 2}"#;
        assert!(SurveyRequest::from_json(json).is_err());
    }

    #[test]
    fn test_request_serializes_back_to_envelope() {
        let questions = QuestionSet::categorical([("Q1", ["Yes", "No"])]).unwrap();
        let request = SurveyRequest::new(Command::Categorical { questions }, SelectionRequest::Count(3))
            .with_llm("model_2");

        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"func_name":"categorical","func_input_data":{"Q1":["Yes","No"]},"llm_config_name":"model_2","agent_count":3}"#
        );
        assert_eq!(SurveyRequest::from_json(&json).unwrap(), request);
    }
}
