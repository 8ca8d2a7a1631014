//! Per-agent query protocol.
//!
//! For one persona and one query:
//!
//! 1. build an anchor text from the questions or dialogue
//! 2. retrieve memories for the anchor into a grounded description
//! 3. render the template for the query mode
//! 4. generate, parse the first matching JSON object, coerce answers
//!
//! Failures are returned as [`AgentOutcome::NoAnswer`] and never abort
//! other agents.

use serde_json::Value;

use poll_events::{
    AgentResponse, AnswerValue, Command, DialogueTurn, QueryResult, QuestionSet, QuestionSpec,
    Stage, UtteranceResult,
};

use crate::gateway::{GenerationError, GenerationGateway};
use crate::parse::{parse_survey_output, parse_utterance, GenerationParseError};
use crate::persona::PersonaAgent;
use crate::prompt::TemplateId;

/// Memory nodes used for a grounded description by default.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 120;

/// What one agent is asked.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    Categorical(&'a QuestionSet),
    Numerical {
        questions: &'a QuestionSet,
        float_resp: bool,
    },
    Utterance {
        dialogue: &'a [DialogueTurn],
        context: &'a str,
    },
}

impl<'a> Query<'a> {
    pub fn from_command(command: &'a Command) -> Self {
        match command {
            Command::Categorical { questions } => Query::Categorical(questions),
            Command::Numerical {
                questions,
                float_resp,
            } => Query::Numerical {
                questions,
                float_resp: *float_resp,
            },
            Command::Utterance { dialogue, context } => Query::Utterance { dialogue, context },
        }
    }

    pub fn questions(&self) -> Option<&'a QuestionSet> {
        match *self {
            Query::Categorical(questions) | Query::Numerical { questions, .. } => Some(questions),
            Query::Utterance { .. } => None,
        }
    }

    pub fn template(&self) -> TemplateId {
        match self {
            Query::Categorical(q) if q.is_batch() => TemplateId::CategoricalBatch,
            Query::Categorical(_) => TemplateId::CategoricalSingular,
            Query::Numerical { questions, .. } if questions.is_batch() => TemplateId::NumericalBatch,
            Query::Numerical { .. } => TemplateId::NumericalSingular,
            Query::Utterance { .. } => TemplateId::Utterance,
        }
    }
}

/// A numerical answer that does not fit the question set's number type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot read {raw} as {expected} for question {index}")]
pub struct TypeCoercionError {
    pub index: usize,
    pub raw: String,
    pub expected: &'static str,
}

/// Why an agent produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Parse(#[from] GenerationParseError),
    #[error(transparent)]
    Coercion(#[from] TypeCoercionError),
}

impl QueryError {
    pub fn stage(&self) -> Stage {
        match self {
            QueryError::Generation(_) => Stage::Generation,
            QueryError::Parse(_) => Stage::Parse,
            QueryError::Coercion(_) => Stage::Coercion,
        }
    }
}

/// Result of querying one agent.
#[derive(Debug)]
pub enum AgentOutcome {
    Answered(AgentResponse),
    NoAnswer { agent_id: String, error: QueryError },
}

impl AgentOutcome {
    pub fn agent_id(&self) -> &str {
        match self {
            AgentOutcome::Answered(response) => response.agent_id(),
            AgentOutcome::NoAnswer { agent_id, .. } => agent_id,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, AgentOutcome::Answered(_))
    }
}

/// Asks persona agents questions through the generation gateway.
#[derive(Clone)]
pub struct QueryProtocol {
    gateway: GenerationGateway,
    retrieval_limit: usize,
    max_attempts: u32,
}

impl QueryProtocol {
    pub fn new(gateway: GenerationGateway) -> Self {
        Self {
            gateway,
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            max_attempts: 1,
        }
    }

    pub fn with_retrieval_limit(mut self, limit: usize) -> Self {
        self.retrieval_limit = limit.max(1);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn gateway(&self) -> &GenerationGateway {
        &self.gateway
    }

    /// Queries one agent.
    ///
    /// Each attempt is one model call followed by parsing; a failed parse
    /// uses up an attempt just like a failed call.
    pub fn answer(&self, agent: &PersonaAgent, query: &Query<'_>) -> AgentOutcome {
        let anchor = anchor(agent, query);
        let description = self.describe(agent, &anchor);
        let variables = variables(query, description, &anchor);
        let template = query.template();

        let mut attempt = 1;
        loop {
            match self.attempt(agent, query, template, &variables) {
                Ok(response) => return AgentOutcome::Answered(response),
                Err(error) => {
                    tracing::debug!(
                        agent_id = agent.id(),
                        attempt,
                        stage = %error.stage(),
                        error = %error,
                        "attempt failed"
                    );
                    if attempt >= self.max_attempts {
                        return AgentOutcome::NoAnswer {
                            agent_id: agent.id().to_string(),
                            error,
                        };
                    }
                }
            }
            attempt += 1;
        }
    }

    fn attempt(
        &self,
        agent: &PersonaAgent,
        query: &Query<'_>,
        template: TemplateId,
        variables: &[String],
    ) -> Result<AgentResponse, QueryError> {
        let text = self.gateway.generate(template, variables, 1, None)?;

        match *query {
            Query::Categorical(questions) => {
                let answers = parse_survey_output(&text, questions.len())?;
                let responses = answers.responses.iter().map(to_choice).collect();
                Ok(AgentResponse::Survey(QueryResult::new(
                    agent.id(),
                    responses,
                    reasonings(&answers.reasonings),
                )))
            }
            Query::Numerical {
                questions,
                float_resp,
            } => {
                let answers = parse_survey_output(&text, questions.len())?;
                let responses = answers
                    .responses
                    .iter()
                    .enumerate()
                    .map(|(i, v)| coerce_number(i, v, float_resp))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(AgentResponse::Survey(QueryResult::new(
                    agent.id(),
                    responses,
                    reasonings(&answers.reasonings),
                )))
            }
            Query::Utterance { .. } => {
                let utterance = parse_utterance(&text)?;
                Ok(AgentResponse::Utterance(UtteranceResult {
                    agent_id: agent.id().to_string(),
                    utterance,
                }))
            }
        }
    }

    /// Self-description followed by retrieved memories, one per line.
    pub fn describe(&self, agent: &PersonaAgent, anchor: &str) -> String {
        let nodes = agent
            .memory()
            .retrieve(&[anchor.to_string()], 0, self.retrieval_limit);

        let mut description = format!(
            "Self description: {}\n==\nOther observations about the subject:\n\n",
            agent.self_description()
        );
        for node in nodes {
            description.push_str(&node.content);
            description.push('\n');
        }
        description
    }
}

/// Anchor text for memory retrieval.
pub fn anchor(agent: &PersonaAgent, query: &Query<'_>) -> String {
    match *query {
        Query::Categorical(questions) | Query::Numerical { questions, .. } => {
            questions.texts().collect::<Vec<_>>().join(" ")
        }
        Query::Utterance { dialogue, .. } => render_transcript(dialogue, agent.full_name()),
    }
}

/// Dialogue as `[speaker]: text` lines, ending with an empty turn for
/// `speaker`.
pub fn render_transcript(dialogue: &[DialogueTurn], speaker: &str) -> String {
    let mut transcript = String::new();
    for turn in dialogue {
        transcript.push_str(&format!("[{}]: {}\n", turn.speaker, turn.text));
    }
    transcript.push_str(&format!("[{}]: [Fill in]\n", speaker));
    transcript
}

/// Question blocks as shown to the model.
pub fn render_questions(questions: &QuestionSet) -> String {
    let mut out = String::new();
    for question in questions {
        match &question.spec {
            QuestionSpec::Categorical(options) => {
                out.push_str(&format!("Q: {}\nOption: {}\n\n", question.text, option_list(options)));
            }
            QuestionSpec::Numerical(range) => {
                out.push_str(&format!("Q: {}\nRange: {}\n\n", question.text, range));
            }
        }
    }
    out.trim().to_string()
}

fn option_list(options: &[String]) -> String {
    let quoted: Vec<String> = options.iter().map(|o| format!("'{}'", o)).collect();
    format!("[{}]", quoted.join(", "))
}

fn variables(query: &Query<'_>, description: String, anchor: &str) -> Vec<String> {
    match *query {
        Query::Categorical(questions) => vec![description, render_questions(questions)],
        Query::Numerical {
            questions,
            float_resp,
        } => {
            let kind = if float_resp { "float" } else { "integer" };
            vec![description, render_questions(questions), kind.to_string()]
        }
        Query::Utterance { context, .. } => {
            vec![description, context.to_string(), anchor.to_string()]
        }
    }
}

fn to_choice(value: &Value) -> AnswerValue {
    match value {
        Value::String(s) => AnswerValue::Choice(s.clone()),
        other => AnswerValue::Choice(other.to_string()),
    }
}

fn reasonings(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Converts a raw answer to the set's number type.
///
/// Integer sets reject non-integral values such as `7.5` or `"7.5"`.
pub fn coerce_number(index: usize, value: &Value, float_resp: bool) -> Result<AnswerValue, TypeCoercionError> {
    let expected = if float_resp { "float" } else { "integer" };
    let fail = || TypeCoercionError {
        index,
        raw: value.to_string(),
        expected,
    };

    match value {
        Value::Number(n) if float_resp => n
            .as_f64()
            .filter(|x| x.is_finite())
            .map(AnswerValue::Float)
            .ok_or_else(fail),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(AnswerValue::Integer(i)),
            None => n
                .as_f64()
                .filter(|x| x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64)
                .map(|x| AnswerValue::Integer(x as i64))
                .ok_or_else(fail),
        },
        Value::String(s) if float_resp => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(AnswerValue::Float)
            .ok_or_else(fail),
        Value::String(s) => s.trim().parse::<i64>().map(AnswerValue::Integer).map_err(|_| fail()),
        _ => Err(fail()),
    }
}
