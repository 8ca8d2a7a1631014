//! genpoll core
//!
//! Runs a survey against a population of persona agents backed by a
//! language model:
//!
//! ```text
//! SurveyRequest ──► PopulationSampler ──► PersonaStore ──► QueryProtocol ──► ResponseAggregator ──► Report
//!                   (seeded rng)          (scratch, memory)  (prompt, parse)   (tally crate)
//! ```
//!
//! Model access goes through the [`LanguageModel`] trait so runs can be
//! driven by [`HttpModel`] or by the scripted models in [`fakes`].

pub mod config;
pub mod error;
pub mod fakes;
pub mod gateway;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod parse;
pub mod persona;
pub mod population;
pub mod prompt;
pub mod protocol;

pub use config::{default_config_toml, ClientKind, LlmConfig, PollConfig};
pub use error::{AgentLoadError, ConfigError, PopulationError, RunError};
pub use gateway::{GenerationError, GenerationGateway, LanguageModel, ModelError};
pub use llm::{HttpModel, HttpModelProvider, ModelProvider};
pub use memory::{LexicalMemory, MemoryNode, MemoryRetriever};
pub use orchestrator::SimulationOrchestrator;
pub use parse::{extract_json_object, GenerationParseError, SurveyAnswers};
pub use persona::{FsPersonaStore, PersonaAgent, PersonaStore};
pub use population::{Population, PopulationSampler, BASELINE_AGENT_ID};
pub use prompt::{PromptError, PromptLibrary, TemplateId};
pub use protocol::{AgentOutcome, Query, QueryError, QueryProtocol, TypeCoercionError};
