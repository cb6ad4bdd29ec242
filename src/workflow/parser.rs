//! Definition File Parser
//!
//! Loads and saves pattern/recipe collections from a single YAML file.
//!
//! # Example YAML Format
//!
//! ```yaml
//! vgrid: test
//! patterns:
//!   - name: convert
//!     trigger_file: infile
//!     trigger_paths: [raw/.*\.csv]
//!     recipes: [converter]
//!     outputs:
//!       converted: mid/{PREFIX}.parquet
//!   - name: analyse
//!     trigger_file: infile
//!     trigger_paths: [mid/.*\.parquet]
//!     recipes: [analysis]
//! recipes:
//!   - name: converter
//!     source: converter.ipynb
//!     recipe: { cells: [] }
//!   - name: analysis
//!     source: analysis.ipynb
//!     recipe: { cells: [] }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::error::{MeowError, ValidationError};
use super::graph::{build_workflow, WorkflowGraph};
use super::pattern::Pattern;
use super::recipe::Recipe;
use super::validator::check_recipes;

/// On-disk layout. Records are lists so that names can be checked for
/// duplicates before they become map keys.
#[derive(Serialize, Deserialize, Debug, Default)]
struct DefinitionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vgrid: Option<String>,
    #[serde(default)]
    patterns: Vec<Pattern>,
    #[serde(default)]
    recipes: Vec<Recipe>,
}

/// A loaded pattern/recipe collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowDefinition {
    /// Vgrid the patterns live in, if known
    pub vgrid: Option<String>,
    pub patterns: BTreeMap<String, Pattern>,
    pub recipes: BTreeMap<String, Recipe>,
}

impl WorkflowDefinition {
    /// Builds the emergent workflow using this definition's vgrid.
    pub fn graph(&self) -> Result<WorkflowGraph, MeowError> {
        build_workflow(&self.patterns, self.vgrid.as_deref())
    }
}

/// Parses a definition from YAML text.
///
/// Patterns are checked while deserializing; recipes are checked once the
/// whole file is read. Duplicate names in either list are reported together.
pub fn parse_definition(yaml_content: &str) -> Result<WorkflowDefinition, MeowError> {
    let file: DefinitionFile = serde_yaml::from_str(yaml_content)?;

    debug!(
        "Parsed {} pattern records, {} recipe records",
        file.patterns.len(),
        file.recipes.len()
    );

    let mut duplicates = Vec::new();

    let mut patterns = BTreeMap::new();
    for pattern in file.patterns {
        let name = pattern.name().to_string();
        if patterns.contains_key(&name) {
            duplicates.push(ValidationError::DuplicateName {
                kind: "pattern",
                name,
            });
            continue;
        }
        patterns.insert(name, pattern);
    }

    let mut recipes = BTreeMap::new();
    for recipe in file.recipes {
        if recipes.contains_key(&recipe.name) {
            duplicates.push(ValidationError::DuplicateName {
                kind: "recipe",
                name: recipe.name,
            });
            continue;
        }
        recipes.insert(recipe.name.clone(), recipe);
    }

    if !duplicates.is_empty() {
        return Err(MeowError::Validation(duplicates));
    }

    check_recipes(&recipes)?;

    Ok(WorkflowDefinition {
        vgrid: file.vgrid.filter(|v| !v.trim().is_empty()),
        patterns,
        recipes,
    })
}

/// Loads a definition file.
///
/// # Example
///
/// ```rust,no_run
/// use meow::workflow::load_definition;
///
/// fn main() -> Result<(), meow::workflow::MeowError> {
///     let definition = load_definition("workflow.yaml")?;
///     let graph = definition.graph()?;
///     println!("{} patterns", graph.len());
///     Ok(())
/// }
/// ```
pub fn load_definition(path: impl AsRef<Path>) -> Result<WorkflowDefinition, MeowError> {
    let path = path.as_ref();
    info!("Loading definition from: {}", path.display());

    let yaml_content = fs::read_to_string(path)?;
    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let definition = parse_definition(&yaml_content)?;
    info!(
        "Loaded {} patterns, {} recipes",
        definition.patterns.len(),
        definition.recipes.len()
    );
    Ok(definition)
}

/// Saves a definition as YAML, patterns and recipes in name order.
pub fn save_definition(
    definition: &WorkflowDefinition,
    path: impl AsRef<Path>,
) -> Result<(), MeowError> {
    let file = DefinitionFile {
        vgrid: definition.vgrid.clone(),
        patterns: definition.patterns.values().cloned().collect(),
        recipes: definition.recipes.values().cloned().collect(),
    };

    let yaml_content = serde_yaml::to_string(&file)?;
    fs::write(path.as_ref(), yaml_content)?;
    info!("Definition saved to: {}", path.as_ref().display());
    Ok(())
}
