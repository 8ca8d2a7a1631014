//! Simulation Reports

use serde::{Deserialize, Serialize};

use crate::{AgentResponse, CommandKind, Diagnostic, Summary};

/// Generates a fresh run identifier.
pub fn generate_run_id() -> String {
    format!("run_{}", uuid::Uuid::new_v4().simple())
}

/// Combined output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub command: CommandKind,
    /// Raw per-agent results, in selection order.
    pub individual_responses: Vec<AgentResponse>,
    /// Per-question tallies. Empty for utterance runs.
    pub summary: Summary,
    /// Agents that produced an answer.
    pub num_agents: usize,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Diagnostics attributed to one agent.
    pub fn diagnostics_for<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.agent_id == agent_id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.starts_with("run_"));
        assert_ne!(a, b);
    }
}
