//! Shared data types for the survey simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod diagnostic;
pub mod ordered_map;
pub mod question;
pub mod report;
pub mod request;
pub mod response;
pub mod selection;
pub mod summary;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export question types
pub use question::{NumericRange, Question, QuestionError, QuestionKind, QuestionSet, QuestionSpec};

// Re-export selection types
pub use selection::{PopulationSelection, SelectionParseError, SelectionRequest};

// Re-export response types
pub use response::{AgentResponse, AnswerValue, DialogueTurn, QueryResult, UtteranceResult};

// Re-export summary and report types
pub use diagnostic::{Diagnostic, Stage};
pub use report::{generate_run_id, Report};
pub use request::{Command, CommandKind, SurveyRequest};
pub use summary::{NumericStats, QuestionSummary, Summary};
