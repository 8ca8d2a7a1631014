//! Generation gateway.
//!
//! Renders a template, sends it to a [`LanguageModel`], and retries failed
//! calls up to a bounded number of attempts.

use std::sync::Arc;

use crate::prompt::{PromptError, PromptLibrary, TemplateId};

/// A text completion backend.
pub trait LanguageModel: Send + Sync {
    /// Completes `prompt`, returning the raw model text.
    fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Errors from model backends.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("environment variable {0} holding the API key is not set")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors from [`GenerationGateway::generate`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("generation failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: ModelError,
    },
}

/// Shared entry point to the model.
#[derive(Clone)]
pub struct GenerationGateway {
    model: Arc<dyn LanguageModel>,
    prompts: PromptLibrary,
}

impl GenerationGateway {
    pub fn new(model: Arc<dyn LanguageModel>, prompts: PromptLibrary) -> Self {
        Self { model, prompts }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Renders `template` with `variables` and asks the model for a
    /// completion.
    ///
    /// Makes at most `max_attempts` calls (at least one). When every call
    /// fails, `fallback` is returned if given, else
    /// [`GenerationError::Exhausted`] with the last failure.
    pub fn generate(
        &self,
        template: TemplateId,
        variables: &[String],
        max_attempts: u32,
        fallback: Option<&str>,
    ) -> Result<String, GenerationError> {
        let prompt = self.prompts.render(template, variables)?;
        let attempts = max_attempts.max(1);

        let mut last = None;
        for attempt in 1..=attempts {
            match self.model.complete(&prompt) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::debug!(%template, attempt, error = %e, "model call failed");
                    last = Some(e);
                }
            }
        }

        if let Some(fallback) = fallback {
            return Ok(fallback.to_string());
        }
        Err(GenerationError::Exhausted {
            attempts,
            last: last.unwrap_or_else(|| ModelError::Other("no attempt made".into())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedModel;

    fn gateway(model: ScriptedModel) -> (GenerationGateway, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        let gateway = GenerationGateway::new(model.clone(), PromptLibrary::builtin());
        (gateway, model)
    }

    fn vars() -> Vec<String> {
        vec!["desc".to_string(), "Q: Zoo?\nOption: ['Yes', 'No']".to_string()]
    }

    #[test]
    fn test_first_success_is_returned() {
        let (gateway, model) = gateway(ScriptedModel::new(["hello"]));
        let text = gateway
            .generate(TemplateId::CategoricalSingular, &vars(), 1, None)
            .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(model.calls(), 1);
        assert!(model.prompts()[0].contains("Q: Zoo?"));
    }

    #[test]
    fn test_retries_until_success() {
        let (gateway, model) =
            gateway(ScriptedModel::from_results(vec![Err("down".into()), Ok("ok".into())]));
        let text = gateway
            .generate(TemplateId::CategoricalSingular, &vars(), 3, None)
            .unwrap();
        assert_eq!(text, "ok");
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_exhausted_reports_last_failure() {
        let (gateway, model) = gateway(ScriptedModel::from_results(vec![
            Err("first".into()),
            Err("second".into()),
        ]));
        let err = gateway
            .generate(TemplateId::CategoricalSingular, &vars(), 2, None)
            .unwrap_err();

        match err {
            GenerationError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert_eq!(last.to_string(), "second");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_fallback_on_exhaustion() {
        let (gateway, _) = gateway(ScriptedModel::from_results(vec![Err("down".into())]));
        let text = gateway
            .generate(TemplateId::CategoricalSingular, &vars(), 1, Some("{}"))
            .unwrap();
        assert_eq!(text, "{}");
    }

    #[test]
    fn test_prompt_error_makes_no_call() {
        let (gateway, model) = gateway(ScriptedModel::new(["unused"]));
        let err = gateway
            .generate(TemplateId::NumericalBatch, &vars(), 1, None)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Prompt(_)));
        assert_eq!(model.calls(), 0);
    }
}
