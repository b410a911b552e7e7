//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::domain::{Example, ExampleSet, TaskId};
use crate::feedback::RefinementContext;

/// Test examples shown in a prompt; the rest are left out to save tokens
const MAX_TEST_EXAMPLES: usize = 3;

/// Context for rendering prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub task_id: String,
    /// Train examples as pretty JSON
    pub train_examples: String,
    /// First few test examples as pretty JSON
    pub test_examples: String,
    pub entry_point: String,
    /// Present from the second attempt on
    pub refinement: Option<RefinementContext>,
}

impl PromptContext {
    pub fn new(examples: &ExampleSet, entry_point: &str, refinement: Option<&RefinementContext>) -> Result<Self> {
        debug!(task_id = %examples.task_id(), refined = refinement.is_some(), "PromptContext::new: called");
        let train_examples = serde_json::to_string_pretty(examples.train())?;
        let shown = examples.test().len().min(MAX_TEST_EXAMPLES);
        let test_examples = serde_json::to_string_pretty(&examples.test()[..shown])?;

        Ok(Self {
            task_id: examples.task_id().to_string(),
            train_examples,
            test_examples,
            entry_point: entry_point.to_string(),
            refinement: refinement.cloned(),
        })
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.selfverify/prompts/`)
    user_dir: Option<PathBuf>,
    /// Repo default directory (e.g., `prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader rooted at `base` (looks for `.selfverify/prompts/` and `prompts/`)
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        debug!(?base, "PromptLoader::new: called");
        let user_dir = base.join(".selfverify/prompts");
        let repo_dir = base.join("prompts");

        let user_dir_exists = user_dir.exists();
        let repo_dir_exists = repo_dir.exists();
        debug!(
            ?user_dir,
            %user_dir_exists,
            ?repo_dir,
            %repo_dir_exists,
            "PromptLoader::new: checking directories"
        );

        Self {
            hbs: Self::engine(),
            user_dir: user_dir_exists.then_some(user_dir),
            repo_dir: repo_dir_exists.then_some(repo_dir),
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
            repo_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts carry code and JSON; HTML escaping would mangle both
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.selfverify/prompts/{name}.pmt`
    /// 2. Repo default: `prompts/{name}.pmt`
    /// 3. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, task_id = %context.task_id, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// The system prompt, trimmed
    pub fn system_prompt(&self) -> Result<String> {
        debug!("PromptLoader::system_prompt: called");
        Ok(self.load_template("system")?.trim().to_string())
    }
}

/// Picks the initial or refinement template for an attempt and renders it
pub struct PromptBuilder {
    loader: PromptLoader,
    entry_point: String,
}

impl PromptBuilder {
    pub fn new(loader: PromptLoader, entry_point: impl Into<String>) -> Self {
        Self {
            loader,
            entry_point: entry_point.into(),
        }
    }

    pub fn build(&self, examples: &ExampleSet, refinement: Option<&RefinementContext>) -> Result<String> {
        debug!(task_id = %examples.task_id(), refined = refinement.is_some(), "PromptBuilder::build: called");
        let context = PromptContext::new(examples, &self.entry_point, refinement)?;
        let template = if refinement.is_some() { "refine" } else { "initial" };
        self.loader.render(template, &context)
    }

    /// Render `initial` and `refine` once against a placeholder task
    ///
    /// Run before the first oracle call so a broken template override fails the
    /// run up front instead of part way through a task.
    pub fn verify(&self) -> Result<()> {
        debug!("PromptBuilder::verify: called");
        let placeholder = ExampleSet::new(
            TaskId(0),
            vec![Example::new(serde_json::json!([[0]]), serde_json::json!([[0]]))],
            Vec::new(),
        )
        .ok_or_else(|| eyre!("placeholder task has no train examples"))?;
        let refinement = RefinementContext {
            attempt: 1,
            previous_source: format!("def {}(g):\n    return g", self.entry_point),
            failure: "Train example 1 produced the wrong output.".to_string(),
        };

        self.build(&placeholder, None)
            .map_err(|e| eyre!("initial prompt template failed to render: {}", e))?;
        self.build(&placeholder, Some(&refinement))
            .map_err(|e| eyre!("refine prompt template failed to render: {}", e))?;
        Ok(())
    }
}
