//! Population discovery and sampling.
//!
//! A population is every directory under a root that holds both a profile
//! record and a memory-scratch record. Agent ids are those directories'
//! paths relative to the root, sorted.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use walkdir::WalkDir;

use poll_events::{PopulationSelection, SelectionRequest};

use crate::error::PopulationError;

/// Profile record every persona directory must contain.
pub const PROFILE_FILE: &str = "meta.json";
/// Memory-scratch record every persona directory must contain.
pub const SCRATCH_FILE: &str = "scratch.json";
/// Persona used for single-agent requests.
pub const BASELINE_AGENT_ID: &str = "01fd7d2a-0357-4c1b-9f3e-8eade2d537ae";

/// True when `dir` holds both persona records.
pub fn is_agent_dir(dir: &Path) -> bool {
    dir.join(PROFILE_FILE).is_file() && dir.join(SCRATCH_FILE).is_file()
}

/// Ordered, deduplicated agent ids discovered under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    root: PathBuf,
    members: Vec<String>,
}

impl Population {
    /// Scans `root` recursively for persona directories.
    ///
    /// Symlinked directories are not followed. A missing or unreadable
    /// root yields an empty population.
    pub fn discover(root: &Path) -> Self {
        let mut members = Vec::new();

        if root.is_dir() {
            walk(root, &mut members);
        } else {
            tracing::warn!(root = %root.display(), "population root not found");
        }

        let population = Self::from_members(root, members);
        tracing::info!(
            root = %root.display(),
            agents = population.len(),
            "discovered population"
        );
        population
    }

    /// Builds a population from known ids.
    pub fn from_members<I, S>(root: &Path, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members: Vec<String> = members.into_iter().map(Into::into).collect();
        members.sort();
        members.dedup();
        Self {
            root: root.to_path_buf(),
            members,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.members.binary_search_by(|m| m.as_str().cmp(agent_id)).is_ok()
    }
}

fn walk(root: &Path, members: &mut Vec<String>) {
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_dir() || !is_agent_dir(entry.path()) {
            continue;
        }
        if let Some(id) = relative_id(root, entry.path()) {
            members.push(id);
        }
    }
}

fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Chooses which agents a run queries.
#[derive(Debug, Clone)]
pub struct PopulationSampler {
    baseline_id: String,
}

impl Default for PopulationSampler {
    fn default() -> Self {
        Self::new(BASELINE_AGENT_ID)
    }
}

impl PopulationSampler {
    pub fn new(baseline_id: impl Into<String>) -> Self {
        Self {
            baseline_id: baseline_id.into(),
        }
    }

    pub fn baseline_id(&self) -> &str {
        &self.baseline_id
    }

    /// Selects agents for `request`.
    ///
    /// A count of one returns the baseline persona without consulting the
    /// population or the rng. Anything else draws distinct members
    /// uniformly at random, in draw order.
    pub fn select<R: Rng + ?Sized>(
        &self,
        population: &Population,
        request: &SelectionRequest,
        rng: &mut R,
    ) -> Result<PopulationSelection, PopulationError> {
        match *request {
            SelectionRequest::Count(0) => return Err(PopulationError::InvalidRequest(*request)),
            SelectionRequest::Percent(p) if !(p > 0.0 && p <= 100.0) => {
                return Err(PopulationError::InvalidRequest(*request));
            }
            _ => {}
        }

        if request.is_baseline() {
            return Ok(PopulationSelection {
                agent_ids: vec![self.baseline_id.clone()],
                baseline: true,
            });
        }

        if population.is_empty() {
            return Err(PopulationError::Empty {
                root: population.root().to_path_buf(),
            });
        }

        let amount = request.resolve(population.len());
        let agent_ids: Vec<String> = population
            .members()
            .choose_multiple(rng, amount)
            .cloned()
            .collect();

        tracing::debug!(%request, selected = agent_ids.len(), "selected agents");
        Ok(PopulationSelection {
            agent_ids,
            baseline: false,
        })
    }
}
