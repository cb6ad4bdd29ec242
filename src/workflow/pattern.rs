//! Pattern Records
//!
//! A pattern binds a trigger (one or more path expressions) to the recipes
//! that run when a matching file appears, plus the outputs those recipes
//! write back.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: analyse
//! trigger_file: infile
//! trigger_paths:
//!   - initial_data/.*\.hdf5
//! recipes:
//!   - analysis_notebook
//! outputs:
//!   result: results/{PREFIX}.csv
//! variables:
//!   threshold: 0.5
//! sweep:
//!   iterations: { start: 10, stop: 50, jump: 10 }
//! ```

use std::collections::BTreeMap;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{MeowError, ValidationError};
use super::sweep::SweepRange;
use super::validator::check_name;

/// Output name under which the executed job notebook is returned.
pub const DEFAULT_JOB_NAME: &str = "wf_job";

const NO_OUTPUT_WARNING: &str = "No output has been set, meaning no resulting data will be \
copied back into the vgrid. Any output will be lost.";

/// Serialized form of a [`Pattern`].
///
/// `recipes` is required but may be empty while a pattern is being drafted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PatternRecord {
    pub name: String,
    pub trigger_file: String,
    pub trigger_paths: Vec<String>,
    pub recipes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sweep: BTreeMap<String, SweepRange>,
}

/// Result of [`Pattern::integrity_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    /// False if the pattern cannot be scheduled as-is
    pub passed: bool,
    /// Failure reason or warnings
    pub messages: Vec<String>,
}

impl IntegrityReport {
    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            messages: vec![message.into()],
        }
    }
}

/// A single trigger-driven unit of work.
///
/// Fields are only reachable through the mutators so that set-once
/// fields stay set once.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "PatternRecord", into = "PatternRecord")]
pub struct Pattern {
    name: String,
    trigger_file: Option<String>,
    trigger_paths: Vec<String>,
    recipes: Vec<String>,
    outputs: BTreeMap<String, String>,
    variables: BTreeMap<String, Value>,
    sweep: BTreeMap<String, SweepRange>,
}

impl Pattern {
    /// Starts an empty pattern.
    ///
    /// # Example
    ///
    /// ```
    /// use meow::workflow::Pattern;
    ///
    /// let mut pattern = Pattern::new("analyse").unwrap();
    /// pattern.add_single_input("infile", r"in/.*\.txt", None).unwrap();
    /// pattern.add_output("result", "out/{FILENAME}").unwrap();
    /// pattern.add_recipe("analysis").unwrap();
    /// assert!(pattern.integrity_check().passed);
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, MeowError> {
        let name = name.into();
        check_name("pattern", &name)?;

        Ok(Self {
            name,
            trigger_file: None,
            trigger_paths: Vec::new(),
            recipes: Vec::new(),
            outputs: BTreeMap::new(),
            variables: BTreeMap::new(),
            sweep: BTreeMap::new(),
        })
    }

    /// Builds a complete pattern from its serialized form.
    ///
    /// Optional maps are applied through the regular mutators, so a loaded
    /// pattern obeys the same rules as one built by hand.
    pub fn from_record(record: PatternRecord) -> Result<Self, MeowError> {
        let mut pattern = Self::new(record.name)?;

        if record.trigger_file.trim().is_empty() {
            return Err(ValidationError::MissingTriggerFile(pattern.name).into());
        }
        if record.trigger_paths.is_empty() {
            return Err(ValidationError::MissingTriggerPaths(pattern.name).into());
        }
        let mut outputs = record.outputs;
        let input_copy = outputs.remove(&record.trigger_file);
        pattern.add_gathering_input(
            record.trigger_file,
            record.trigger_paths,
            input_copy.as_deref(),
        )?;

        for recipe in record.recipes {
            pattern.add_recipe(recipe)?;
        }
        for (name, path) in outputs {
            pattern.add_output(name, path)?;
        }
        // Recorded values replace the automatic input/output bindings.
        for (name, value) in record.variables {
            check_name("variable", &name)?;
            pattern.variables.insert(name, value);
        }
        for (name, range) in record.sweep {
            pattern.add_param_sweep(name, range)?;
        }

        Ok(pattern)
    }

    /// Serialized form of this pattern.
    pub fn to_record(&self) -> PatternRecord {
        PatternRecord {
            name: self.name.clone(),
            trigger_file: self.trigger_file.clone().unwrap_or_default(),
            trigger_paths: self.trigger_paths.clone(),
            recipes: self.recipes.clone(),
            outputs: self.outputs.clone(),
            variables: self.variables.clone(),
            sweep: self.sweep.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable name bound to the triggering file inside the recipe.
    pub fn trigger_file(&self) -> Option<&str> {
        self.trigger_file.as_deref()
    }

    pub fn trigger_paths(&self) -> &[String] {
        &self.trigger_paths
    }

    pub fn recipes(&self) -> &[String] {
        &self.recipes
    }

    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn sweep(&self) -> &BTreeMap<String, SweepRange> {
        &self.sweep
    }

    /// Defines a single triggering path.
    ///
    /// `regex_path` is a regular expression relative to the vgrid root. If
    /// `output_path` is given the triggering file is also copied there on
    /// job completion, under the output name `input_file`.
    pub fn add_single_input(
        &mut self,
        input_file: impl Into<String>,
        regex_path: impl Into<String>,
        output_path: Option<&str>,
    ) -> Result<(), MeowError> {
        self.add_gathering_input(input_file, vec![regex_path.into()], output_path)
    }

    /// Defines a trigger made of several paths.
    pub fn add_gathering_input(
        &mut self,
        input_file: impl Into<String>,
        paths: Vec<String>,
        output_path: Option<&str>,
    ) -> Result<(), MeowError> {
        let input_file = input_file.into();
        check_name("input file", &input_file)?;

        if !self.trigger_paths.is_empty() || self.trigger_file.is_some() {
            return Err(MeowError::DuplicateField {
                pattern: self.name.clone(),
                field: "input",
                key: input_file,
            });
        }

        if paths.is_empty() {
            return Err(ValidationError::MissingTriggerPaths(self.name.clone()).into());
        }

        let errors: Vec<ValidationError> = paths
            .iter()
            .filter_map(|path| self.check_trigger_path(path))
            .collect();
        if !errors.is_empty() {
            return Err(MeowError::Validation(errors));
        }

        if output_path.is_some() {
            self.ensure_free("output", &self.outputs, &input_file)?;
        }
        self.ensure_free("variable", &self.variables, &input_file)?;

        debug!(
            "Pattern '{}': input '{}' triggered by {:?}",
            self.name, input_file, paths
        );
        if let Some(output) = output_path {
            self.outputs.insert(input_file.clone(), output.to_string());
        }
        self.bind_variable(&input_file);
        self.trigger_file = Some(input_file);
        self.trigger_paths = paths;
        Ok(())
    }

    /// Registers a file copied back from the job on completion.
    ///
    /// `location` may use magic keywords or `*` for the triggering file name.
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<(), MeowError> {
        let name = name.into();
        check_name("output", &name)?;

        self.ensure_free("output", &self.outputs, &name)?;
        self.ensure_free("variable", &self.variables, &name)?;

        self.outputs.insert(name.clone(), location.into());
        self.bind_variable(&name);
        Ok(())
    }

    /// Returns the executed job notebook as an output.
    pub fn return_notebook(&mut self, location: impl Into<String>) -> Result<(), MeowError> {
        self.add_output(DEFAULT_JOB_NAME, location)
    }

    pub fn add_recipe(&mut self, recipe: impl Into<String>) -> Result<(), MeowError> {
        let recipe = recipe.into();
        check_name("recipe", &recipe)?;
        self.recipes.push(recipe);
        Ok(())
    }

    /// Adds a variable passed to the recipe as a parameter.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), MeowError> {
        let name = name.into();
        check_name("variable", &name)?;

        self.ensure_free("variable", &self.variables, &name)?;

        self.variables.insert(name, value.into());
        Ok(())
    }

    /// Adds a sweeping variable. The range is checked before it is stored.
    pub fn add_param_sweep(
        &mut self,
        name: impl Into<String>,
        range: SweepRange,
    ) -> Result<(), MeowError> {
        let name = name.into();
        check_name("sweep", &name)?;
        range.validate(&name)?;

        if self.sweep.contains_key(&name) {
            return Err(MeowError::DuplicateField {
                pattern: self.name.clone(),
                field: "sweep",
                key: name,
            });
        }

        self.sweep.insert(name, range);
        Ok(())
    }

    /// Expands every sweep into its concrete values.
    pub fn sweep_values(&self) -> Result<BTreeMap<String, Vec<f64>>, MeowError> {
        self.sweep
            .iter()
            .map(|(name, range)| Ok((name.clone(), range.values(name)?)))
            .collect()
    }

    /// Checks that the pattern is complete enough to be scheduled.
    ///
    /// Problems that make the pattern unusable fail the check; a missing
    /// output is only reported as a warning.
    pub fn integrity_check(&self) -> IntegrityReport {
        if self.name.is_empty() {
            return IntegrityReport::fail("A pattern name must be defined.");
        }
        if self.trigger_file.as_deref().map_or(true, str::is_empty) {
            return IntegrityReport::fail(
                "An input file must be defined. This is the variable the triggering file \
                 is bound to and can be set using 'add_single_input'.",
            );
        }
        if self.trigger_paths.is_empty() {
            return IntegrityReport::fail(
                "At least one input path must be defined. This is the path expression \
                 that triggers processing and can be set using 'add_single_input'.",
            );
        }
        if let Some(path) = self.trigger_paths.iter().find(|p| p.is_empty()) {
            return IntegrityReport::fail(format!(
                "Error for input path '{}'. Input paths must not be empty.",
                path
            ));
        }

        let mut warnings = Vec::new();
        if self.outputs.is_empty() {
            warnings.push(NO_OUTPUT_WARNING.to_string());
        }

        if self.recipes.is_empty() {
            return IntegrityReport::fail("No recipes have been defined.");
        }

        if let Some(trigger_file) = self.trigger_file.as_deref() {
            if !self.variables.contains_key(trigger_file) {
                return IntegrityReport::fail(format!(
                    "Trigger file '{}' is not accessible as a variable within the job. \
                     Add it to the variables if the trigger was set manually.",
                    trigger_file
                ));
            }
        }
        if let Some(output) = self.outputs.keys().find(|o| !self.variables.contains_key(*o)) {
            return IntegrityReport::fail(format!(
                "Output '{}' is not accessible as a variable within the job. \
                 Add it to the variables if the output was set manually.",
                output
            ));
        }

        IntegrityReport {
            passed: true,
            messages: warnings,
        }
    }

    /// Structural problems that keep this pattern out of graph construction.
    pub fn structural_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.trigger_file.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::MissingTriggerFile(self.name.clone()));
        }

        if self.trigger_paths.is_empty() {
            errors.push(ValidationError::MissingTriggerPaths(self.name.clone()));
        }

        errors.extend(
            self.trigger_paths
                .iter()
                .filter_map(|path| self.check_trigger_path(path)),
        );

        errors
    }

    pub fn validate_structure(&self) -> Result<(), MeowError> {
        let errors = self.structural_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(MeowError::Validation(errors))
        }
    }

    /// Multi-line summary used in graph listings.
    pub fn display_dag_str(&self) -> String {
        format!(
            "Name: {}\nInput(s): {}\nTrigger(s): {:?}\nOutput(s): {:?}\nRecipe(s): {:?}",
            self.name,
            self.trigger_file.as_deref().unwrap_or("-"),
            self.trigger_paths,
            self.outputs,
            self.recipes
        )
    }

    fn ensure_free<V>(
        &self,
        field: &'static str,
        existing: &BTreeMap<String, V>,
        key: &str,
    ) -> Result<(), MeowError> {
        if existing.contains_key(key) {
            return Err(MeowError::DuplicateField {
                pattern: self.name.clone(),
                field,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Inputs and outputs reach the recipe as variables named after
    /// themselves.
    fn bind_variable(&mut self, name: &str) {
        self.variables
            .insert(name.to_string(), Value::String(name.to_string()));
    }

    fn check_trigger_path(&self, path: &str) -> Option<ValidationError> {
        if path.is_empty() {
            return Some(ValidationError::EmptyTriggerPath(self.name.clone()));
        }

        Regex::new(path)
            .err()
            .map(|e| ValidationError::InvalidTriggerPath {
                pattern: self.name.clone(),
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

impl TryFrom<PatternRecord> for Pattern {
    type Error = MeowError;

    fn try_from(record: PatternRecord) -> Result<Self, Self::Error> {
        Pattern::from_record(record)
    }
}

impl From<Pattern> for PatternRecord {
    fn from(pattern: Pattern) -> Self {
        pattern.to_record()
    }
}
