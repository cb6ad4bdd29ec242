//! Recipe Records
//!
//! A recipe is the executable payload (usually a notebook) a pattern runs
//! when triggered. The graph builder only ever checks that a referenced
//! recipe exists.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{MeowError, ValidationError};
use super::keywords::basename;
use super::validator::check_name;

/// File extensions accepted by [`Recipe::register`].
pub const NOTEBOOK_EXTENSIONS: &[&str] = &[".ipynb"];

/// An executable payload referenced by patterns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Unique recipe name
    pub name: String,
    /// Path of the artifact the payload was read from
    pub source: String,
    /// Opaque payload, e.g. a notebook document
    pub recipe: Value,
}

impl Recipe {
    /// Creates a validated recipe.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        recipe: Value,
    ) -> Result<Self, MeowError> {
        let recipe = Self {
            name: name.into(),
            source: source.into(),
            recipe,
        };
        recipe.validate()?;
        Ok(recipe)
    }

    /// Reads a notebook from disk and wraps it as a recipe.
    ///
    /// Without an explicit `name` the file stem is used.
    pub fn register(source: impl AsRef<Path>, name: Option<&str>) -> Result<Self, MeowError> {
        let path = source.as_ref();
        let source_str = path.to_string_lossy().to_string();

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let name = name.unwrap_or(stem).to_string();

        let has_notebook_extension = NOTEBOOK_EXTENSIONS
            .iter()
            .any(|ext| source_str.ends_with(ext));
        if !has_notebook_extension {
            return Err(ValidationError::InvalidSource {
                recipe: name,
                source_path: source_str,
                reason: format!("only {:?} files can be registered", NOTEBOOK_EXTENSIONS),
            }
            .into());
        }

        let content = fs::read_to_string(path)?;
        let notebook: Value = serde_json::from_str(&content)?;

        info!("Registered recipe '{}' from {}", name, source_str);
        Self::new(name, source_str, notebook)
    }

    /// Problems with this recipe's required fields.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Err(err) = check_name("recipe", &self.name) {
            errors.extend(err.validation_errors().iter().cloned());
        }

        if let Some(reason) = invalid_source_reason(&self.source) {
            errors.push(ValidationError::InvalidSource {
                recipe: self.name.clone(),
                source_path: self.source.clone(),
                reason,
            });
        }

        if self.recipe.is_null() {
            errors.push(ValidationError::MissingPayload(self.name.clone()));
        }

        errors
    }

    pub fn validate(&self) -> Result<(), MeowError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MeowError::Validation(errors))
        }
    }
}

/// A source must be a plain file path whose file name has exactly one
/// extension.
fn invalid_source_reason(source: &str) -> Option<String> {
    if source.is_empty() {
        return Some("source must not be empty".to_string());
    }

    if let Some(ch) = source
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Some(format!("invalid character '{}'", ch));
    }

    match basename(source).matches('.').count() {
        0 => Some("no file extension found".to_string()),
        1 => None,
        _ => Some("too many '.' characters, there should only be one".to_string()),
    }
}
