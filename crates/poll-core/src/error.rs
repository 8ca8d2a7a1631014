//! Error types for the survey pipeline.
//!
//! Configuration and population errors stop a run. Load, generation,
//! parse and aggregation errors are recovered per agent and become
//! diagnostics in the report.

use std::path::PathBuf;

use poll_events::SelectionRequest;

use crate::gateway::ModelError;
use crate::prompt::PromptError;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no LLM configuration named '{0}'")]
    UnknownLlm(String),
    #[error("no LLM configurations defined")]
    NoLlm,
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors selecting agents from a population.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PopulationError {
    #[error("population at {} has no agents", root.display())]
    Empty { root: PathBuf },
    #[error("cannot select agents for request {0}")]
    InvalidRequest(SelectionRequest),
}

/// A persona that could not be loaded. The agent is excluded from the run.
#[derive(Debug, thiserror::Error)]
pub enum AgentLoadError {
    #[error("agent {agent_id}: no persona directory at {}", path.display())]
    NotFound { agent_id: String, path: PathBuf },
    #[error("agent {agent_id}: failed to read {}: {source}", path.display())]
    Io {
        agent_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("agent {agent_id}: malformed {}: {source}", path.display())]
    Json {
        agent_id: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("agent {agent_id}: {reason}")]
    Invalid { agent_id: String, reason: String },
}

impl AgentLoadError {
    pub fn agent_id(&self) -> &str {
        match self {
            AgentLoadError::NotFound { agent_id, .. }
            | AgentLoadError::Io { agent_id, .. }
            | AgentLoadError::Json { agent_id, .. }
            | AgentLoadError::Invalid { agent_id, .. } => agent_id,
        }
    }
}

/// Fatal errors from a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    AgentLoad(#[from] AgentLoadError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("failed to create model client: {0}")]
    Model(#[from] ModelError),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
