//! MEOW - Managing Event-Oriented Workflows
//!
//! Workflows built from independent, trigger-driven patterns. No pattern
//! names its successor: a pattern whose output path would satisfy another
//! pattern's trigger becomes its ancestor, and the workflow graph emerges
//! from those path relationships alone.
//!
//! # Architecture
//!
//! Everything lives under the [`workflow`] module:
//!
//! - [`workflow::pattern`] and [`workflow::recipe`]: the records users define
//! - [`workflow::matcher`]: decides whether an output triggers a pattern
//! - [`workflow::graph`]: builds the emergent graph from a pattern collection
//! - [`workflow::parser`]: YAML definition files for the `meow` CLI
//!
//! # Example
//!
//! ```rust,no_run
//! use meow::load_definition;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let definition = load_definition("workflow.yaml")?;
//!     let graph = definition.graph()?;
//!
//!     for (upstream, downstream) in graph.edges() {
//!         println!("{} -> {}", upstream, downstream);
//!     }
//!     Ok(())
//! }
//! ```

pub mod workflow;

// Re-export commonly used types
pub use workflow::graph::{build_workflow, WorkflowGraph, WorkflowNode};
pub use workflow::parser::{load_definition, WorkflowDefinition};
pub use workflow::{MeowError, Pattern, Recipe};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "MEOW";
