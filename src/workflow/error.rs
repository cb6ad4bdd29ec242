//! Error Types
//!
//! Failures reported by pattern/recipe construction, parameter sweeps and
//! graph building. Every precondition violation is surfaced to the caller;
//! nothing here is recovered locally.

use std::fmt;

use thiserror::Error;

/// A record failed its required-field or charset checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("Invalid character '{ch}' in {kind} name '{name}'. Only [A-Za-z0-9_-] are allowed")]
    InvalidName {
        kind: &'static str,
        name: String,
        ch: char,
    },

    #[error("Pattern '{0}' has no trigger file defined")]
    MissingTriggerFile(String),

    #[error("Pattern '{0}' has no trigger paths defined")]
    MissingTriggerPaths(String),

    #[error("Pattern '{0}' has an empty trigger path")]
    EmptyTriggerPath(String),

    #[error("Pattern '{pattern}': trigger path '{path}' is not a valid expression: {reason}")]
    InvalidTriggerPath {
        pattern: String,
        path: String,
        reason: String,
    },

    #[error("{kind} '{name}' is stored under the mismatched key '{key}'")]
    MismatchedKey {
        kind: &'static str,
        key: String,
        name: String,
    },

    #[error("Duplicate {kind} name: '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Recipe '{recipe}' has an invalid source '{source_path}': {reason}")]
    InvalidSource {
        recipe: String,
        source_path: String,
        reason: String,
    },

    #[error("Recipe '{0}' has no payload")]
    MissingPayload(String),

    #[error("No recipes were provided")]
    NoRecipes,

    #[error("Pattern '{pattern}' requires recipe '{recipe}' which is not registered")]
    MissingRecipe { pattern: String, recipe: String },
}

/// All errors produced by this crate.
#[derive(Debug, Error)]
pub enum MeowError {
    #[error("{}", ValidationList(.0))]
    Validation(Vec<ValidationError>),

    #[error("Could not set {field} '{key}' on pattern '{pattern}': already defined")]
    DuplicateField {
        pattern: String,
        field: &'static str,
        key: String,
    },

    #[error("Invalid parameter sweep '{name}': {reason}")]
    Configuration { name: String, reason: String },

    #[error("Workflow contains cyclic dependencies between patterns: {0:?}")]
    CyclicWorkflow(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<ValidationError> for MeowError {
    fn from(err: ValidationError) -> Self {
        MeowError::Validation(vec![err])
    }
}

impl MeowError {
    /// Validation failures carried by this error, if any.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            MeowError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

struct ValidationList<'a>(&'a [ValidationError]);

impl fmt::Display for ValidationList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [single] => write!(f, "Validation error: {}", single),
            errors => {
                write!(f, "Validation failed ({} issues):", errors.len())?;
                for (i, err) in errors.iter().enumerate() {
                    write!(f, "\n  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_validation_display() {
        let err: MeowError = ValidationError::MissingTriggerFile("a".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Validation error: Pattern 'a' has no trigger file defined"
        );
    }

    #[test]
    fn test_multiple_validation_display() {
        let err = MeowError::Validation(vec![
            ValidationError::MissingTriggerFile("a".to_string()),
            ValidationError::MissingTriggerPaths("b".to_string()),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 issues"));
        assert!(text.contains("1. Pattern 'a'"));
        assert!(text.contains("2. Pattern 'b'"));
        assert_eq!(err.validation_errors().len(), 2);
    }

    #[test]
    fn test_duplicate_field_display() {
        let err = MeowError::DuplicateField {
            pattern: "p".to_string(),
            field: "output",
            key: "out".to_string(),
        };
        assert!(err.to_string().contains("already defined"));
        assert!(err.validation_errors().is_empty());
    }
}
