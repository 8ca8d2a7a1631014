//! Persona memory retrieval.
//!
//! Each persona owns a stream of memory nodes. A retriever returns the
//! nodes most relevant to a set of anchor texts, best first.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Recency decay per step of age.
pub const RECENCY_DECAY: f64 = 0.99;

/// One remembered observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    #[serde(default)]
    pub node_id: u64,
    pub content: String,
    /// Creation step; larger is newer
    #[serde(default)]
    pub created: u64,
}

impl MemoryNode {
    pub fn new(node_id: u64, content: impl Into<String>) -> Self {
        Self {
            node_id,
            content: content.into(),
            created: node_id,
        }
    }
}

/// Read access to a persona's memory.
pub trait MemoryRetriever: Send + Sync {
    /// Returns up to `limit` nodes relevant to `anchors`, best first.
    ///
    /// `recency_offset` ages every node by that many extra steps.
    fn retrieve(&self, anchors: &[String], recency_offset: usize, limit: usize) -> Vec<MemoryNode>;
}

/// Scores nodes by term overlap with the anchors plus recency.
#[derive(Debug, Clone, Default)]
pub struct LexicalMemory {
    nodes: Vec<MemoryNode>,
}

impl LexicalMemory {
    pub fn new(mut nodes: Vec<MemoryNode>) -> Self {
        nodes.sort_by_key(|n| (n.created, n.node_id));
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl MemoryRetriever for LexicalMemory {
    fn retrieve(&self, anchors: &[String], recency_offset: usize, limit: usize) -> Vec<MemoryNode> {
        let anchor_terms: HashSet<String> = anchors.iter().flat_map(|a| terms(a)).collect();
        let newest = self.nodes.len().saturating_sub(1);

        let mut scored: Vec<(f64, usize)> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let age = (newest - i).saturating_add(recency_offset);
                let recency = RECENCY_DECAY.powi(i32::try_from(age).unwrap_or(i32::MAX));
                (relevance(&anchor_terms, &node.content) + recency, i)
            })
            .collect();

        // Best score first; ties go to the newer node
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1))
        });

        scored
            .into_iter()
            .take(limit)
            .map(|(_, i)| self.nodes[i].clone())
            .collect()
    }
}

/// Fraction of anchor terms present in `content`.
fn relevance(anchor_terms: &HashSet<String>, content: &str) -> f64 {
    if anchor_terms.is_empty() {
        return 0.0;
    }
    let node_terms: HashSet<String> = terms(content).collect();
    let shared = anchor_terms.intersection(&node_terms).count();
    shared as f64 / anchor_terms.len() as f64
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
}
