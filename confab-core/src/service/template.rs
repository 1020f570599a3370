use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("missing value for template variable `{0}`")]
    MissingVariable(String),
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Text with `{{name}}` placeholders. `{{it}}` is the value of the
/// single-argument form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        PLACEHOLDER
            .captures_iter(&self.template)
            .map(|c| c[1].to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    pub fn render(&self, variables: &HashMap<String, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self.variables().into_iter().find(|name| !variables.contains_key(name)) {
            return Err(TemplateError::MissingVariable(missing));
        }
        Ok(PLACEHOLDER
            .replace_all(&self.template, |c: &Captures| variables.get(&c[1]).cloned().unwrap_or_default())
            .into_owned())
    }

    /// Render with `it` bound to `value`, plus any extra variables
    pub fn render_it(&self, value: &str, variables: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut all = variables.clone();
        all.insert("it".to_string(), value.to_string());
        self.render(&all)
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for PromptTemplate {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}
