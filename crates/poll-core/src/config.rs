//! Configuration loading for genpoll.
//!
//! All run settings are loaded from a TOML configuration file. Every
//! section is optional and falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::population::BASELINE_AGENT_ID;

/// Complete genpoll configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Where personas live
    pub population: PopulationConfig,
    /// Execution settings
    pub run: RunConfig,
    /// Prompt template overrides
    pub prompts: PromptConfig,
    /// Named model configurations, `[[llm]]` tables
    #[serde(rename = "llm")]
    pub llms: Vec<LlmConfig>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            run: RunConfig::default(),
            prompts: PromptConfig::default(),
            llms: vec![LlmConfig::default()],
        }
    }
}

impl PollConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.workers == 0 {
            return Err(ConfigError::Invalid("run.workers must be at least 1".into()));
        }
        if self.run.max_attempts == 0 {
            return Err(ConfigError::Invalid("run.max_attempts must be at least 1".into()));
        }
        if self.run.retrieval_limit == 0 {
            return Err(ConfigError::Invalid(
                "run.retrieval_limit must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for llm in &self.llms {
            if llm.config_name.trim().is_empty() {
                return Err(ConfigError::Invalid("llm.config_name must not be empty".into()));
            }
            if !seen.insert(llm.config_name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate llm config_name '{}'",
                    llm.config_name
                )));
            }
            if !(0.0..=2.0).contains(&llm.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "llm '{}': temperature {} is outside [0, 2]",
                    llm.config_name, llm.temperature
                )));
            }
        }

        if let Some(name) = &self.run.default_llm {
            if !seen.contains(name.as_str()) {
                return Err(ConfigError::UnknownLlm(name.clone()));
            }
        }
        Ok(())
    }

    /// Looks up a model configuration by name.
    ///
    /// Without a name, `run.default_llm` is used, then the first `[[llm]]`
    /// entry.
    pub fn llm(&self, name: Option<&str>) -> Result<&LlmConfig, ConfigError> {
        match name.or(self.run.default_llm.as_deref()) {
            Some(name) => self
                .llms
                .iter()
                .find(|llm| llm.config_name == name)
                .ok_or_else(|| ConfigError::UnknownLlm(name.to_string())),
            None => self.llms.first().ok_or(ConfigError::NoLlm),
        }
    }
}

/// Persona bank locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Directory scanned for persona agents
    pub root: PathBuf,
    /// Directory holding the baseline persona
    pub baseline_dir: PathBuf,
    /// Identifier returned for single-agent requests
    pub baseline_id: String,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("agent_bank/populations/gss_agents"),
            baseline_dir: PathBuf::from("agent_bank/populations/single_agent"),
            baseline_id: BASELINE_AGENT_ID.to_string(),
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Concurrent agent queries; 1 runs sequentially
    pub workers: usize,
    /// Model calls per agent before giving up
    pub max_attempts: u32,
    /// Memory nodes retrieved for a grounded description
    pub retrieval_limit: usize,
    /// LLM config used when a request names none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_llm: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_attempts: 1,
            retrieval_limit: 120,
            default_llm: None,
        }
    }
}

/// Prompt template settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Directory whose templates replace the built-in ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Model endpoint protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions
    #[serde(rename = "openai")]
    OpenAi,
}

/// One named model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub config_name: String,
    pub client: ClientKind,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_base: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            config_name: "model_2".to_string(),
            client: ClientKind::Ollama,
            model: "orca-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            api_base: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            api_key_env: None,
        }
    }
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# genpoll configuration

[population]
root = "agent_bank/populations/gss_agents"
baseline_dir = "agent_bank/populations/single_agent"
baseline_id = "01fd7d2a-0357-4c1b-9f3e-8eade2d537ae"

[run]
workers = 1
max_attempts = 1
retrieval_limit = 120
# default_llm = "model_2"

[prompts]
# dir = "prompts"

[[llm]]
config_name = "model_2"
client = "ollama"
model = "orca-mini"
temperature = 0.7
max_tokens = 1000
api_base = "http://localhost:11434"
timeout_secs = 120

# [[llm]]
# config_name = "gpt"
# client = "openai"
# model = "gpt-4o-mini"
# api_base = "https://api.openai.com/v1"
# api_key_env = "OPENAI_API_KEY"
"#
    .to_string()
}
