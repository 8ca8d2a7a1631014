//! HTTP model clients.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::{ClientKind, LlmConfig};
use crate::gateway::{LanguageModel, ModelError};

/// Builds a model for a named configuration.
pub trait ModelProvider: Send + Sync {
    fn model_for(&self, config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, ModelError>;
}

/// Provides [`HttpModel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpModelProvider;

impl ModelProvider for HttpModelProvider {
    fn model_for(&self, config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, ModelError> {
        Ok(Arc::new(HttpModel::from_config(config)?))
    }
}

/// Blocking client for an Ollama or OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpModel {
    client: reqwest::blocking::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl HttpModel {
    /// Creates a client. For OpenAI endpoints the key is read from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ModelError> {
        let api_key = match (&config.client, &config.api_key_env) {
            (_, Some(var)) => Some(
                std::env::var(var).map_err(|_| ModelError::MissingApiKey(var.clone()))?,
            ),
            (ClientKind::OpenAi, None) => {
                return Err(ModelError::MissingApiKey("api_key_env".to_string()))
            }
            (ClientKind::Ollama, None) => None,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn complete_ollama(&self, prompt: &str) -> Result<String, ModelError> {
        let request = ollama_request(&self.config, prompt);

        let response = self
            .client
            .post(self.endpoint("api/generate"))
            .json(&request)
            .send()?;
        let data = check_status(response)?;

        data["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ModelError::InvalidResponse("Missing response".to_string()))
    }

    fn complete_openai(&self, prompt: &str) -> Result<String, ModelError> {
        let request = openai_request(&self.config, prompt);

        let mut builder = self
            .client
            .post(self.endpoint("chat/completions"))
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let data = check_status(builder.send()?)?;

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ModelError::InvalidResponse("Missing content".to_string()))
    }
}

impl LanguageModel for HttpModel {
    fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        match self.config.client {
            ClientKind::Ollama => self.complete_ollama(prompt),
            ClientKind::OpenAi => self.complete_openai(prompt),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<Value, ModelError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text()?;
        return Err(ModelError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json()?)
}

fn ollama_request(config: &LlmConfig, prompt: &str) -> Value {
    json!({
        "model": config.model,
        "prompt": prompt,
        "stream": false,
        "options": {
            "temperature": config.temperature,
            "num_predict": config.max_tokens,
        }
    })
}

fn openai_request(config: &LlmConfig, prompt: &str) -> Value {
    json!({
        "model": config.model,
        "messages": [
            {
                "role": "user",
                "content": prompt
            }
        ],
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    })
}
