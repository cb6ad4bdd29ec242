//! Collection Validation
//!
//! Checks applied to whole collections of patterns and recipes before they
//! are used together:
//! - Name charset rules shared by every record
//! - Key/name consistency of name-keyed maps
//! - Structural validity of each pattern
//! - Recipe availability for a pattern

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{MeowError, ValidationError};
use super::pattern::Pattern;
use super::recipe::Recipe;

/// Characters allowed in pattern, recipe and variable names.
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Validates a record name. `kind` only feeds the error message.
pub fn check_name(kind: &'static str, name: &str) -> Result<(), MeowError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName { kind }.into());
    }

    if NAME_PATTERN.is_match(name) {
        return Ok(());
    }

    let ch = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        .unwrap_or(' ');

    Err(ValidationError::InvalidName {
        kind,
        name: name.to_string(),
        ch,
    }
    .into())
}

/// Validates a name-keyed pattern collection.
///
/// Every problem is reported at once so a caller can fix them in one pass.
pub fn check_patterns(patterns: &BTreeMap<String, Pattern>) -> Result<(), MeowError> {
    debug!("Checking {} patterns", patterns.len());

    let mut all_errors = Vec::new();
    for (key, pattern) in patterns {
        if key != pattern.name() {
            all_errors.push(ValidationError::MismatchedKey {
                kind: "Pattern",
                key: key.clone(),
                name: pattern.name().to_string(),
            });
        }

        all_errors.extend(pattern.structural_errors());

        if pattern.outputs().is_empty() {
            debug!("Pattern '{}' declares no outputs", pattern.name());
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(MeowError::Validation(all_errors))
    }
}

/// Validates a name-keyed recipe collection.
pub fn check_recipes(recipes: &BTreeMap<String, Recipe>) -> Result<(), MeowError> {
    let mut all_errors = Vec::new();

    for (key, recipe) in recipes {
        if *key != recipe.name {
            all_errors.push(ValidationError::MismatchedKey {
                kind: "Recipe",
                key: key.clone(),
                name: recipe.name.clone(),
            });
        }
        all_errors.extend(recipe.validation_errors());
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(MeowError::Validation(all_errors))
    }
}

/// Checks that every recipe a pattern references is registered.
pub fn pattern_has_recipes(
    pattern: &Pattern,
    recipes: &BTreeMap<String, Recipe>,
) -> Result<(), MeowError> {
    if recipes.is_empty() {
        return Err(ValidationError::NoRecipes.into());
    }

    check_recipes(recipes)?;

    let missing: Vec<ValidationError> = pattern
        .recipes()
        .iter()
        .filter(|name| !recipes.contains_key(name.as_str()))
        .map(|name| ValidationError::MissingRecipe {
            pattern: pattern.name().to_string(),
            recipe: name.clone(),
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        warn!(
            "Pattern '{}' references {} unregistered recipe(s)",
            pattern.name(),
            missing.len()
        );
        Err(MeowError::Validation(missing))
    }
}

/// How serious a [`CheckMessage`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The pattern still works but something is likely missing
    Warning,
    /// The pattern cannot be scheduled as-is
    Error,
}

/// One finding of [`quick_validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckMessage {
    /// Pattern the finding belongs to, `None` for collection-wide findings
    pub pattern: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl CheckMessage {
    fn for_pattern(pattern: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.to_string()),
            severity,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.pattern {
            Some(pattern) => write!(f, "Pattern '{}' {}: {}", pattern, label, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Quick report of every pattern's integrity and recipe availability.
///
/// Returns one entry per failure or warning. Useful for CLI feedback.
pub fn quick_validate(
    patterns: &BTreeMap<String, Pattern>,
    recipes: &BTreeMap<String, Recipe>,
) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if patterns.is_empty() {
        messages.push(CheckMessage {
            pattern: None,
            severity: Severity::Error,
            message: "No patterns defined".to_string(),
        });
        return messages;
    }

    for pattern in patterns.values() {
        let report = pattern.integrity_check();
        let severity = if report.passed {
            Severity::Warning
        } else {
            Severity::Error
        };
        messages.extend(
            report
                .messages
                .into_iter()
                .map(|message| CheckMessage::for_pattern(pattern.name(), severity, message)),
        );

        if !pattern.recipes().is_empty() {
            if let Err(err) = pattern_has_recipes(pattern, recipes) {
                messages.extend(err.validation_errors().iter().map(|e| {
                    CheckMessage::for_pattern(pattern.name(), Severity::Error, e.to_string())
                }));
            }
        }
    }

    info!("Integrity check produced {} message(s)", messages.len());
    messages
}
