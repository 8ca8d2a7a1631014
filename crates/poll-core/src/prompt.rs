//! Prompt templates.
//!
//! Templates are plain text with `!<INPUT n>!` placeholders filled from a
//! positional variable list. Anything before the comment block marker is
//! documentation and is dropped when rendering.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const COMMENT_MARKER: &str = "<commentblockmarker>###</commentblockmarker>";
const PLACEHOLDER_OPEN: &str = "!<INPUT ";
const PLACEHOLDER_CLOSE: &str = ">!";

/// Known prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    CategoricalSingular,
    CategoricalBatch,
    NumericalSingular,
    NumericalBatch,
    Utterance,
}

impl TemplateId {
    pub const ALL: [TemplateId; 5] = [
        TemplateId::CategoricalSingular,
        TemplateId::CategoricalBatch,
        TemplateId::NumericalSingular,
        TemplateId::NumericalBatch,
        TemplateId::Utterance,
    ];

    /// Path relative to a template directory.
    pub fn path(&self) -> &'static str {
        match self {
            TemplateId::CategoricalSingular => "categorical_resp/singular_v1.txt",
            TemplateId::CategoricalBatch => "categorical_resp/batch_v1.txt",
            TemplateId::NumericalSingular => "numerical_resp/singular_v1.txt",
            TemplateId::NumericalBatch => "numerical_resp/batch_v1.txt",
            TemplateId::Utterance => "utterance/utterance_v1.txt",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            TemplateId::CategoricalSingular => {
                include_str!("../prompts/categorical_resp/singular_v1.txt")
            }
            TemplateId::CategoricalBatch => include_str!("../prompts/categorical_resp/batch_v1.txt"),
            TemplateId::NumericalSingular => {
                include_str!("../prompts/numerical_resp/singular_v1.txt")
            }
            TemplateId::NumericalBatch => include_str!("../prompts/numerical_resp/batch_v1.txt"),
            TemplateId::Utterance => include_str!("../prompts/utterance/utterance_v1.txt"),
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path();
        write!(f, "{}", path.strip_suffix(".txt").unwrap_or(path))
    }
}

/// Errors loading or filling templates.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template {template} uses input {index} but only {given} were given")]
    MissingVariable {
        template: TemplateId,
        index: usize,
        given: usize,
    },
}

/// The set of templates a run renders prompts from.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<TemplateId, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    /// Templates compiled into the binary.
    pub fn builtin() -> Self {
        let templates = TemplateId::ALL
            .iter()
            .map(|id| (*id, id.builtin().to_string()))
            .collect();
        Self { templates }
    }

    /// Built-in templates, replaced by any found under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, PromptError> {
        let mut library = Self::builtin();
        for id in TemplateId::ALL {
            let path = dir.join(id.path());
            if !path.is_file() {
                continue;
            }
            let text = fs::read_to_string(&path).map_err(|source| PromptError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(template = %id, path = %path.display(), "template override");
            library.templates.insert(id, text);
        }
        Ok(library)
    }

    /// Replaces one template's text.
    pub fn with_template(mut self, id: TemplateId, text: impl Into<String>) -> Self {
        self.templates.insert(id, text.into());
        self
    }

    /// Fills `id` with `variables`, `!<INPUT i>!` taking `variables[i]`.
    pub fn render(&self, id: TemplateId, variables: &[String]) -> Result<String, PromptError> {
        let text = self
            .templates
            .get(&id)
            .map(String::as_str)
            .unwrap_or_else(|| id.builtin());
        let body = match text.split_once(COMMENT_MARKER) {
            Some((_, body)) => body,
            None => text,
        };
        Ok(fill(id, body, variables)?.trim().to_string())
    }
}

fn fill(template: TemplateId, body: &str, variables: &[String]) -> Result<String, PromptError> {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + PLACEHOLDER_OPEN.len()..];

        let placeholder = after
            .find(PLACEHOLDER_CLOSE)
            .and_then(|end| after[..end].trim().parse::<usize>().ok().map(|i| (i, end)));

        match placeholder {
            Some((index, end)) => {
                let value = variables.get(index).ok_or(PromptError::MissingVariable {
                    template,
                    index,
                    given: variables.len(),
                })?;
                out.push_str(value);
                rest = &after[end + PLACEHOLDER_CLOSE.len()..];
            }
            None => {
                out.push_str(PLACEHOLDER_OPEN);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}
