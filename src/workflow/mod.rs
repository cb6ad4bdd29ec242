//! Workflow Definition Module
//!
//! Patterns, recipes and the workflow graph that emerges from them.
//!
//! # Structure
//!
//! - [`pattern`]: Trigger-driven units of work
//! - [`recipe`]: Executable payloads referenced by patterns
//! - [`sweep`]: Parameter sweep ranges
//! - [`keywords`]: Magic keywords usable in paths and variables
//! - [`matcher`]: Output/trigger path matching
//! - [`graph`]: Emergent workflow graph construction and queries
//! - [`validator`]: Collection-level checks
//! - [`parser`]: YAML definition files
//! - [`error`]: Error taxonomy

pub mod error;
pub mod graph;
pub mod keywords;
pub mod matcher;
pub mod parser;
pub mod pattern;
pub mod recipe;
pub mod sweep;
pub mod validator;

pub use error::{MeowError, ValidationError};
pub use graph::{build_workflow, WorkflowGraph, WorkflowNode};
pub use matcher::{MatchDescriptor, MatchKind, TriggerMatcher};
pub use parser::{load_definition, save_definition, WorkflowDefinition};
pub use pattern::{IntegrityReport, Pattern, PatternRecord};
pub use recipe::Recipe;
pub use sweep::SweepRange;
pub use validator::{
    check_patterns, check_recipes, pattern_has_recipes, quick_validate, CheckMessage, Severity,
};
