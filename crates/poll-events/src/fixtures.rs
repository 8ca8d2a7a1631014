//! Sample data fixtures for testing.
//!
//! This module provides ready-made test data for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // poll-events = { path = "../poll-events", features = ["test-fixtures"] }
//!
//! use poll_events::fixtures;
//!
//! let request = fixtures::sample_request();
//! let results = fixtures::sample_results();
//! ```

use crate::{AnswerValue, Command, QueryResult, QuestionSet, SurveyRequest};

/// Returns the sample survey request.
///
/// Two categorical questions (transit: 3 options, religious services:
/// 4 options), 4 agents, config `model_2`.
pub fn sample_request() -> SurveyRequest {
    let json = include_str!("../tests/fixtures/sample_request.json");
    SurveyRequest::from_json(json).expect("Failed to parse sample_request.json")
}

/// Returns the question set of [`sample_request`].
pub fn sample_questions() -> QuestionSet {
    match sample_request().command {
        Command::Categorical { questions } => questions,
        other => panic!("sample request should be categorical, got {:?}", other.kind()),
    }
}

/// Returns per-agent results for [`sample_questions`].
///
/// Contains 4 agents. `gss_0004` answers the second question with
/// `"Maybe"`, which is not a declared option.
pub fn sample_results() -> Vec<QueryResult> {
    let json = include_str!("../tests/fixtures/sample_results.json");
    serde_json::from_str(json).expect("Failed to parse sample_results.json")
}

/// Raw model text with prose around a fenced JSON answer for
/// [`sample_questions`].
pub fn sample_model_output() -> &'static str {
    include_str!("../tests/fixtures/sample_model_output.txt")
}

/// A single yes/no question `"Q1"`.
pub fn yes_no_questions() -> QuestionSet {
    QuestionSet::categorical([("Q1", ["Yes", "No"])]).expect("valid question set")
}

/// Results for [`yes_no_questions`]: `yes` agents answer Yes, `no` answer No.
///
/// Agent ids are `agent_00`, `agent_01`, ... with all Yes answers first.
pub fn yes_no_results(yes: usize, no: usize) -> Vec<QueryResult> {
    (0..yes + no)
        .map(|i| {
            let answer = if i < yes { "Yes" } else { "No" };
            QueryResult::new(
                format!("agent_{:02}", i),
                vec![AnswerValue::Choice(answer.to_string())],
                vec![format!("reason {}", i)],
            )
        })
        .collect()
}
