//! In-memory fakes for the model, memory and persona store traits
//! (testing only)
//!
//! Provides `ScriptedModel`, `FnModel`, `StaticMemory`, `MemoryPersonaStore`
//! and `FixedModelProvider`, which satisfy the trait contracts without a
//! model server or an agent bank on disk.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::LlmConfig;
use crate::error::AgentLoadError;
use crate::gateway::{LanguageModel, ModelError};
use crate::llm::ModelProvider;
use crate::memory::{MemoryNode, MemoryRetriever};
use crate::persona::{PersonaAgent, PersonaStore};

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Replies from a fixed script, in call order. Records every prompt.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    /// A script of successful replies.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// A script mixing replies and failures; `Err(msg)` fails that call.
    pub fn from_results(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ModelError::Other(message)),
            None => Err(ModelError::Other("script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// FnModel
// ---------------------------------------------------------------------------

/// Replies computed from the prompt, so the answer does not depend on call
/// order. Suited to runs with a worker pool.
pub struct FnModel<F> {
    reply: F,
    calls: AtomicUsize,
}

impl<F> FnModel<F>
where
    F: Fn(&str) -> Result<String, ModelError> + Send + Sync,
{
    pub fn new(reply: F) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> LanguageModel for FnModel<F>
where
    F: Fn(&str) -> Result<String, ModelError> + Send + Sync,
{
    fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.reply)(prompt)
    }

    fn model_name(&self) -> &str {
        "fn"
    }
}

// ---------------------------------------------------------------------------
// StaticMemory
// ---------------------------------------------------------------------------

/// Returns its nodes in stored order and records every anchor list.
#[derive(Debug, Default)]
pub struct StaticMemory {
    nodes: Vec<MemoryNode>,
    anchors: Mutex<Vec<Vec<String>>>,
}

impl StaticMemory {
    pub fn new(nodes: Vec<MemoryNode>) -> Self {
        Self {
            nodes,
            anchors: Mutex::new(Vec::new()),
        }
    }

    pub fn anchors(&self) -> Vec<Vec<String>> {
        self.anchors.lock().unwrap().clone()
    }
}

impl MemoryRetriever for StaticMemory {
    fn retrieve(&self, anchors: &[String], _recency_offset: usize, limit: usize) -> Vec<MemoryNode> {
        self.anchors.lock().unwrap().push(anchors.to_vec());
        self.nodes.iter().take(limit).cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// MemoryPersonaStore
// ---------------------------------------------------------------------------

/// Persona store backed by a `HashMap<agent_id, PersonaAgent>`.
#[derive(Debug, Default)]
pub struct MemoryPersonaStore {
    agents: HashMap<String, PersonaAgent>,
}

impl MemoryPersonaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, agent: PersonaAgent) {
        self.agents.insert(agent.id().to_string(), agent);
    }

    /// Adds a persona with no memories.
    pub fn with_agent(mut self, id: &str, full_name: &str, self_description: &str) -> Self {
        self.insert(PersonaAgent::new(
            id,
            full_name,
            self_description,
            Arc::new(StaticMemory::default()),
        ));
        self
    }
}

impl PersonaStore for MemoryPersonaStore {
    fn load(&self, agent_id: &str) -> Result<PersonaAgent, AgentLoadError> {
        self.agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgentLoadError::Invalid {
                agent_id: agent_id.to_string(),
                reason: "not in store".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// FixedModelProvider
// ---------------------------------------------------------------------------

/// Hands out one model for every configuration, counting requests.
pub struct FixedModelProvider {
    model: Arc<dyn LanguageModel>,
    requested: Mutex<Vec<String>>,
}

impl FixedModelProvider {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Config names models were requested for.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl ModelProvider for FixedModelProvider {
    fn model_for(&self, config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, ModelError> {
        self.requested.lock().unwrap().push(config.config_name.clone());
        Ok(self.model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_model_plays_in_order() {
        let model = ScriptedModel::from_results(vec![Ok("a".into()), Err("b".into())]);
        assert_eq!(model.complete("p1").unwrap(), "a");
        assert_eq!(model.complete("p2").unwrap_err().to_string(), "b");
        assert!(model.complete("p3").is_err());
        assert_eq!(model.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_memory_store_missing_agent() {
        let store = MemoryPersonaStore::new().with_agent("a", "A", "");
        assert!(store.load("a").is_ok());
        assert_eq!(store.load("b").unwrap_err().agent_id(), "b");
    }
}
