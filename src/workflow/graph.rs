//! Emergent Workflow Graph
//!
//! Patterns never name each other. The workflow emerges from paths: if an
//! output of pattern A would trigger pattern B, then A is an ancestor of B.
//! [`build_workflow`] derives these relationships for a whole collection of
//! patterns.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use meow::workflow::{build_workflow, Pattern};
//!
//! let mut a = Pattern::new("A").unwrap();
//! a.add_single_input("infile", r"in/.*\.txt", None).unwrap();
//! a.add_output("r", "mid/result.txt").unwrap();
//!
//! let mut b = Pattern::new("B").unwrap();
//! b.add_single_input("infile", r"mid/result\.txt", None).unwrap();
//!
//! let patterns: BTreeMap<String, Pattern> =
//!     [a, b].into_iter().map(|p| (p.name().to_string(), p)).collect();
//!
//! let graph = build_workflow(&patterns, None).unwrap();
//! assert!(graph["A"].descendants.contains_key("B"));
//! assert!(graph["B"].workflow_inputs.is_empty());
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Index;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::error::MeowError;
use super::matcher::{MatchDescriptor, TriggerMatcher};
use super::pattern::Pattern;
use super::validator::check_patterns;

/// Derived view of one pattern inside the workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct WorkflowNode {
    /// Patterns whose outputs trigger this one
    pub ancestors: BTreeMap<String, MatchDescriptor>,
    /// Patterns triggered by this one's outputs
    pub descendants: BTreeMap<String, MatchDescriptor>,
    /// Trigger file -> trigger paths, removed once an ancestor satisfies it
    pub workflow_inputs: BTreeMap<String, Vec<String>>,
    /// Output name -> output path
    pub workflow_outputs: BTreeMap<String, String>,
}

impl WorkflowNode {
    fn for_pattern(pattern: &Pattern) -> Self {
        let mut workflow_inputs = BTreeMap::new();
        if let Some(trigger_file) = pattern.trigger_file() {
            workflow_inputs.insert(trigger_file.to_string(), pattern.trigger_paths().to_vec());
        }

        Self {
            ancestors: BTreeMap::new(),
            descendants: BTreeMap::new(),
            workflow_inputs,
            workflow_outputs: pattern.outputs().clone(),
        }
    }
}

/// Name-keyed collection of workflow nodes.
///
/// Built fresh by [`build_workflow`] and never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: BTreeMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    pub fn get(&self, name: &str) -> Option<&WorkflowNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> &BTreeMap<String, WorkflowNode> {
        &self.nodes
    }

    pub fn into_nodes(self) -> BTreeMap<String, WorkflowNode> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All `(upstream, downstream)` edges in name order.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.nodes
            .iter()
            .flat_map(|(name, node)| {
                node.descendants
                    .keys()
                    .map(move |child| (name.clone(), child.clone()))
            })
            .collect()
    }

    /// Patterns with no ancestors (entry points).
    pub fn root_patterns(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.ancestors.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Patterns with no descendants (exit points).
    pub fn leaf_patterns(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.descendants.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Patterns whose own outputs re-trigger them.
    pub fn self_loops(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(name, node)| node.descendants.contains_key(name.as_str()))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// True if every descendant edge has a matching ancestor edge and
    /// vice versa.
    pub fn is_consistent(&self) -> bool {
        let forward = self.nodes.iter().all(|(name, node)| {
            node.descendants.keys().all(|child| {
                self.nodes
                    .get(child)
                    .map_or(false, |c| c.ancestors.contains_key(name))
            })
        });

        let backward = self.nodes.iter().all(|(name, node)| {
            node.ancestors.keys().all(|parent| {
                self.nodes
                    .get(parent)
                    .map_or(false, |p| p.descendants.contains_key(name))
            })
        });

        forward && backward
    }

    /// Orders patterns so every ancestor comes before its descendants.
    ///
    /// Uses Kahn's algorithm. Fails with [`MeowError::CyclicWorkflow`]
    /// naming the patterns left on a cycle, self-loops included.
    pub fn topological_order(&self) -> Result<Vec<String>, MeowError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.ancestors.len()))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut sorted_order = Vec::with_capacity(self.nodes.len());

        while let Some(current) = queue.pop_front() {
            sorted_order.push(current.to_string());

            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for child in node.descendants.keys() {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        if sorted_order.len() != self.nodes.len() {
            let placed: BTreeSet<&str> = sorted_order.iter().map(String::as_str).collect();
            let cyclic = self
                .nodes
                .keys()
                .filter(|name| !placed.contains(name.as_str()))
                .cloned()
                .collect();
            return Err(MeowError::CyclicWorkflow(cyclic));
        }

        debug!("Topological order: {:?}", sorted_order);
        Ok(sorted_order)
    }
}

impl Index<&str> for WorkflowGraph {
    type Output = WorkflowNode;

    fn index(&self, name: &str) -> &WorkflowNode {
        &self.nodes[name]
    }
}

/// Builds the emergent workflow from a name-keyed pattern collection.
///
/// Every trigger path of every pattern is compared with every output of
/// every pattern, the pattern itself included. On a match the two nodes are
/// linked both ways and the downstream trigger file is dropped from its
/// `workflow_inputs`, since a prior step now provides it.
///
/// When several outputs match the same pair of patterns, the descriptor of
/// the last one in name order is kept.
///
/// `root_prefix` is the vgrid the patterns live in. Without it matches are
/// still attempted against the `{VGRID}` placeholder and marked provisional.
///
/// # Errors
///
/// Returns [`MeowError::Validation`] listing every structurally invalid
/// pattern. No partial graph is produced.
pub fn build_workflow(
    patterns: &BTreeMap<String, Pattern>,
    root_prefix: Option<&str>,
) -> Result<WorkflowGraph, MeowError> {
    check_patterns(patterns)?;

    info!(
        "Building workflow from {} patterns (vgrid: {})",
        patterns.len(),
        root_prefix.unwrap_or("unknown")
    );

    let mut nodes: BTreeMap<String, WorkflowNode> = patterns
        .values()
        .map(|pattern| (pattern.name().to_string(), WorkflowNode::for_pattern(pattern)))
        .collect();

    let mut edge_count = 0;
    for downstream in patterns.values() {
        for trigger_path in downstream.trigger_paths() {
            let matcher = TriggerMatcher::new(trigger_path, root_prefix);

            for upstream in patterns.values() {
                for (output_name, output_value) in upstream.outputs() {
                    let Some(found) =
                        matcher.match_output(upstream.name(), output_name, output_value)
                    else {
                        continue;
                    };

                    debug!(
                        "'{}' output '{}' ({}) triggers '{}' via {:?} match on '{}'",
                        upstream.name(),
                        output_name,
                        output_value,
                        downstream.name(),
                        found.kind,
                        matcher.absolute()
                    );

                    if upstream.name() == downstream.name() {
                        warn!(
                            "Pattern '{}' is triggered by its own output '{}'",
                            downstream.name(),
                            output_name
                        );
                    }

                    link(&mut nodes, upstream.name(), downstream, found.descriptor);
                    edge_count += 1;
                }
            }
        }
    }

    let graph = WorkflowGraph { nodes };
    info!(
        "Workflow built: {} patterns, {} matches, {} edges",
        graph.len(),
        edge_count,
        graph.edges().len()
    );
    Ok(graph)
}

fn link(
    nodes: &mut BTreeMap<String, WorkflowNode>,
    upstream: &str,
    downstream: &Pattern,
    descriptor: MatchDescriptor,
) {
    if let Some(node) = nodes.get_mut(upstream) {
        node.descendants
            .insert(downstream.name().to_string(), descriptor.clone());
    }

    if let Some(node) = nodes.get_mut(downstream.name()) {
        node.ancestors.insert(upstream.to_string(), descriptor);
        if let Some(trigger_file) = downstream.trigger_file() {
            node.workflow_inputs.remove(trigger_file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::error::ValidationError;

    fn pattern(name: &str, triggers: &[&str], outputs: &[(&str, &str)]) -> Pattern {
        let mut pattern = Pattern::new(name).unwrap();
        pattern
            .add_gathering_input(
                "infile",
                triggers.iter().map(|t| t.to_string()).collect(),
                None,
            )
            .unwrap();
        for (output_name, value) in outputs {
            pattern.add_output(*output_name, *value).unwrap();
        }
        pattern
    }

    fn collection(patterns: Vec<Pattern>) -> BTreeMap<String, Pattern> {
        patterns
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect()
    }

    #[test]
    fn test_linear_pair() {
        let patterns = collection(vec![
            pattern("A", &[r"in/.*\.txt"], &[("r", "mid/result.txt")]),
            pattern("B", &[r"mid/result\.txt"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();

        assert_eq!(graph["A"].descendants.keys().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(graph["B"].ancestors.keys().collect::<Vec<_>>(), vec!["A"]);
        assert!(graph["B"].workflow_inputs.is_empty());
        assert_eq!(
            graph["A"].workflow_inputs["infile"],
            vec![r"in/.*\.txt".to_string()]
        );
        assert_eq!(graph["A"].workflow_outputs["r"], "mid/result.txt");
        assert!(graph["A"].ancestors.is_empty());
        assert!(graph["B"].descendants.is_empty());

        let descriptor = &graph["B"].ancestors["A"];
        assert_eq!(descriptor.output_pattern, "A");
        assert_eq!(descriptor.output_file, "r");
        assert_eq!(descriptor.value, "mid/result.txt");
        assert_eq!(descriptor.filename, "result.txt");
        assert!(descriptor.provisional);
    }

    #[test]
    fn test_linear_pair_with_root() {
        let patterns = collection(vec![
            pattern("A", &[r"in/.*\.txt"], &[("r", "mid/result.txt")]),
            pattern("B", &[r"mid/result\.txt"], &[]),
        ]);

        let graph = build_workflow(&patterns, Some("test")).unwrap();

        assert!(graph["A"].descendants.contains_key("B"));
        assert!(!graph["B"].ancestors["A"].provisional);
    }

    #[test]
    fn test_star_output_links_through_wildcard() {
        let patterns = collection(vec![
            pattern("C", &["src/.*"], &[("o", "out/*")]),
            pattern("D", &["out/.*"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();

        assert!(graph["C"].descendants.contains_key("D"));
        assert!(graph["D"].ancestors.contains_key("C"));
    }

    #[test]
    fn test_keyword_output_links_through_wildcard() {
        let patterns = collection(vec![
            pattern("up", &[r"raw/.*\.txt"], &[("o", "out/{FILENAME}")]),
            pattern("down", &[r"out/.*\.txt"], &[]),
        ]);

        let graph = build_workflow(&patterns, Some("vg")).unwrap();
        assert!(graph["up"].descendants.contains_key("down"));
    }

    #[test]
    fn test_pattern_without_outputs_has_no_descendants() {
        let patterns = collection(vec![
            pattern("A", &["in/.*"], &[]),
            pattern("B", &["in/.*"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();
        assert!(graph.edges().is_empty());
        assert_eq!(graph.root_patterns(), vec!["A", "B"]);
        assert_eq!(graph.leaf_patterns(), vec!["A", "B"]);
    }

    #[test]
    fn test_invalid_pattern_rejected_without_graph() {
        let mut patterns = collection(vec![pattern("A", &["in/.*"], &[("o", "x/y")])]);
        patterns.insert("B".to_string(), Pattern::new("B").unwrap());

        let err = build_workflow(&patterns, None).unwrap_err();
        let errors = err.validation_errors();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MissingTriggerPaths(name) if name == "B")));
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let mut patterns = BTreeMap::new();
        patterns.insert("other".to_string(), pattern("A", &["in/.*"], &[]));

        assert!(matches!(
            build_workflow(&patterns, None),
            Err(MeowError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_collection() {
        let graph = build_workflow(&BTreeMap::new(), None).unwrap();
        assert!(graph.is_empty());
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let patterns = collection(vec![
            pattern("A", &["in/.*"], &[("r", "mid/a.txt")]),
            pattern("B", &["mid/.*"], &[("r", "final/b.txt")]),
            pattern("C", &["final/.*"], &[]),
        ]);

        let first = build_workflow(&patterns, Some("vg")).unwrap();
        let second = build_workflow(&patterns, Some("vg")).unwrap();

        assert_eq!(first.edges(), second.edges());
        assert_eq!(first, second);
    }

    #[test]
    fn test_views_are_consistent() {
        let patterns = collection(vec![
            pattern("A", &["in/.*"], &[("r", "mid/a.txt"), ("s", "side/a.txt")]),
            pattern("B", &["mid/.*"], &[("r", "final/b.txt")]),
            pattern("C", &["final/.*", "side/.*"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();

        assert!(graph.is_consistent());
        assert_eq!(
            graph.edges(),
            vec![
                ("A".to_string(), "B".to_string()),
                ("A".to_string(), "C".to_string()),
                ("B".to_string(), "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_last_matching_output_wins() {
        let patterns = collection(vec![
            pattern("A", &["in/.*"], &[("first", "mid/1.txt"), ("second", "mid/2.txt")]),
            pattern("B", &["mid/.*"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();

        assert_eq!(graph["B"].ancestors.len(), 1);
        assert_eq!(graph["B"].ancestors["A"].output_file, "second");
        assert_eq!(graph["A"].descendants["B"].output_file, "second");
    }

    #[test]
    fn test_multiple_ancestors() {
        let patterns = collection(vec![
            pattern("A", &["in/a/.*"], &[("r", "mid/a.txt")]),
            pattern("B", &["in/b/.*"], &[("r", "mid/b.txt")]),
            pattern("C", &["mid/.*"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();

        assert_eq!(graph["C"].ancestors.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(graph.root_patterns(), vec!["A", "B"]);
        assert_eq!(graph.leaf_patterns(), vec!["C"]);
    }

    #[test]
    fn test_self_loop_is_recorded() {
        let patterns = collection(vec![pattern("loop", &["data/.*"], &[("o", "data/next.txt")])]);

        let graph = build_workflow(&patterns, None).unwrap();

        assert_eq!(graph.self_loops(), vec!["loop"]);
        assert!(graph["loop"].ancestors.contains_key("loop"));
        assert!(graph["loop"].workflow_inputs.is_empty());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_topological_order() {
        let patterns = collection(vec![
            pattern("C", &["final/.*"], &[]),
            pattern("A", &["in/.*"], &[("r", "mid/a.txt")]),
            pattern("B", &["mid/.*"], &[("r", "final/b.txt")]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();
        assert_eq!(graph.topological_order().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_topological_order_reports_cycle() {
        let patterns = collection(vec![
            pattern("A", &["a/.*"], &[("r", "b/x.txt")]),
            pattern("B", &["b/.*"], &[("r", "a/x.txt")]),
            pattern("C", &["in/.*"], &[]),
        ]);

        let graph = build_workflow(&patterns, None).unwrap();
        match graph.topological_order() {
            Err(MeowError::CyclicWorkflow(names)) => assert_eq!(names, vec!["A", "B"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_serializes_as_map() {
        let patterns = collection(vec![pattern("A", &["in/.*"], &[])]);
        let graph = build_workflow(&patterns, None).unwrap();

        let json = serde_json::to_value(&graph).unwrap();
        assert!(json["A"]["workflow_inputs"]["infile"].is_array());
    }
}
