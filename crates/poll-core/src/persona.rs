//! Persona agents and their storage.
//!
//! # Directory layout
//!
//! ```text
//! <agent_dir>/
//!   meta.json                 profile record
//!   scratch.json              memory scratch: first_name, last_name, traits...
//!   memory_stream/nodes.json  optional memory nodes
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::config::PopulationConfig;
use crate::error::AgentLoadError;
use crate::memory::{LexicalMemory, MemoryNode, MemoryRetriever};
use crate::population::{is_agent_dir, PROFILE_FILE, SCRATCH_FILE};

/// Memory nodes file, relative to an agent directory.
pub const NODES_FILE: &str = "memory_stream/nodes.json";

/// A simulated survey respondent.
#[derive(Clone)]
pub struct PersonaAgent {
    id: String,
    full_name: String,
    self_description: String,
    memory: Arc<dyn MemoryRetriever>,
}

impl PersonaAgent {
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        self_description: impl Into<String>,
        memory: Arc<dyn MemoryRetriever>,
    ) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            self_description: self_description.into(),
            memory,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn self_description(&self) -> &str {
        &self.self_description
    }

    pub fn memory(&self) -> &dyn MemoryRetriever {
        self.memory.as_ref()
    }
}

impl fmt::Debug for PersonaAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonaAgent")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// Source of persona agents by id.
pub trait PersonaStore: Send + Sync {
    fn load(&self, agent_id: &str) -> Result<PersonaAgent, AgentLoadError>;
}

/// Loads personas from the agent bank on disk.
///
/// The baseline directory is checked first, then the population root.
#[derive(Debug, Clone)]
pub struct FsPersonaStore {
    population_root: PathBuf,
    baseline_dir: PathBuf,
}

impl FsPersonaStore {
    pub fn new(config: &PopulationConfig) -> Self {
        Self {
            population_root: config.root.clone(),
            baseline_dir: config.baseline_dir.clone(),
        }
    }

    /// Directory an id resolves to.
    pub fn agent_dir(&self, agent_id: &str) -> PathBuf {
        let baseline = self.baseline_dir.join(agent_id);
        if is_agent_dir(&baseline) {
            baseline
        } else {
            self.population_root.join(agent_id)
        }
    }
}

impl PersonaStore for FsPersonaStore {
    fn load(&self, agent_id: &str) -> Result<PersonaAgent, AgentLoadError> {
        let dir = self.agent_dir(agent_id);
        if !is_agent_dir(&dir) {
            return Err(AgentLoadError::NotFound {
                agent_id: agent_id.to_string(),
                path: dir,
            });
        }

        // Profile must be well-formed even though only scratch is used
        read_json::<Value>(agent_id, &dir.join(PROFILE_FILE))?;

        let scratch_path = dir.join(SCRATCH_FILE);
        let content = read_file(agent_id, &scratch_path)?;
        let scratch: Vec<(String, Value)> = {
            let mut de = serde_json::Deserializer::from_str(&content);
            poll_events::ordered_map::deserialize(&mut de).map_err(|source| {
                AgentLoadError::Json {
                    agent_id: agent_id.to_string(),
                    path: scratch_path.clone(),
                    source,
                }
            })?
        };

        let nodes_path = dir.join(NODES_FILE);
        let nodes: Vec<MemoryNode> = if nodes_path.is_file() {
            read_json(agent_id, &nodes_path)?
        } else {
            Vec::new()
        };

        let full_name = full_name(&scratch).unwrap_or_else(|| agent_id.to_string());
        tracing::debug!(agent_id, nodes = nodes.len(), "loaded persona");

        Ok(PersonaAgent::new(
            agent_id,
            full_name,
            describe_scratch(&scratch),
            Arc::new(LexicalMemory::new(nodes)),
        ))
    }
}

fn read_file(agent_id: &str, path: &Path) -> Result<String, AgentLoadError> {
    fs::read_to_string(path).map_err(|source| AgentLoadError::Io {
        agent_id: agent_id.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(
    agent_id: &str,
    path: &Path,
) -> Result<T, AgentLoadError> {
    let content = read_file(agent_id, path)?;
    serde_json::from_str(&content).map_err(|source| AgentLoadError::Json {
        agent_id: agent_id.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

fn scratch_str<'a>(scratch: &'a [(String, Value)], key: &str) -> Option<&'a str> {
    scratch
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn full_name(scratch: &[(String, Value)]) -> Option<String> {
    match (scratch_str(scratch, "first_name"), scratch_str(scratch, "last_name")) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// Renders scratch entries as `key: value` lines, in document order.
pub fn describe_scratch(scratch: &[(String, Value)]) -> String {
    scratch
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}: {}", k, s),
            other => format!("{}: {}", k, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_agent(dir: &Path, scratch: &str) {
        fs::create_dir_all(dir.join("memory_stream")).unwrap();
        fs::write(dir.join(PROFILE_FILE), r#"{"source": "test"}"#).unwrap();
        fs::write(dir.join(SCRATCH_FILE), scratch).unwrap();
    }

    fn store(root: &Path) -> FsPersonaStore {
        FsPersonaStore::new(&PopulationConfig {
            root: root.join("population"),
            baseline_dir: root.join("baseline"),
            baseline_id: "base".to_string(),
        })
    }

    #[test]
    fn test_load_persona() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("population/gss_0001");
        write_agent(
            &dir,
            r#"{"first_name": "Ada", "last_name": "Lowe", "age": 41, "occupation": "nurse"}"#,
        );
        fs::write(
            dir.join(NODES_FILE),
            r#"[{"node_id": 0, "content": "I ride the bus"}]"#,
        )
        .unwrap();

        let agent = store(tmp.path()).load("gss_0001").unwrap();
        assert_eq!(agent.id(), "gss_0001");
        assert_eq!(agent.full_name(), "Ada Lowe");
        assert_eq!(
            agent.self_description(),
            "first_name: Ada\nlast_name: Lowe\nage: 41\noccupation: nurse"
        );
        assert_eq!(agent.memory().retrieve(&["bus".to_string()], 0, 10).len(), 1);
    }

    #[test]
    fn test_baseline_dir_takes_precedence() {
        let tmp = tempdir().unwrap();
        write_agent(&tmp.path().join("baseline/base"), r#"{"first_name": "Base"}"#);
        write_agent(&tmp.path().join("population/base"), r#"{"first_name": "Other"}"#);

        let agent = store(tmp.path()).load("base").unwrap();
        assert_eq!(agent.full_name(), "Base");
    }

    #[test]
    fn test_missing_agent() {
        let tmp = tempdir().unwrap();
        let err = store(tmp.path()).load("ghost").unwrap_err();
        assert!(matches!(err, AgentLoadError::NotFound { .. }));
        assert_eq!(err.agent_id(), "ghost");
    }

    #[test]
    fn test_malformed_scratch() {
        let tmp = tempdir().unwrap();
        write_agent(&tmp.path().join("population/bad"), "{not json");

        let err = store(tmp.path()).load("bad").unwrap_err();
        assert!(matches!(err, AgentLoadError::Json { .. }));
    }

    #[test]
    fn test_name_falls_back_to_id() {
        let tmp = tempdir().unwrap();
        write_agent(&tmp.path().join("population/anon"), r#"{"age": 30}"#);

        let agent = store(tmp.path()).load("anon").unwrap();
        assert_eq!(agent.full_name(), "anon");
        assert!(agent.memory().retrieve(&[], 0, 10).is_empty());
    }
}
