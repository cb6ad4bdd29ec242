//! Output/Trigger Path Matching
//!
//! Decides whether an output written by one pattern would trigger another
//! pattern. Two tests are attempted and either one is sufficient:
//!
//! 1. **Direct**: the trigger path, qualified with the vgrid root, is used
//!    as a regular expression and matched against the start of the output
//!    path, both as declared and qualified the same way (prefix semantics,
//!    not full-string equality).
//! 2. **Wildcard**: if the output contains magic keywords or `*`, each of
//!    those is replaced by `.*` and the resulting expression is matched
//!    against the start of the qualified trigger path, read as plain text.
//!
//! When the vgrid root is unknown the `{VGRID}` placeholder stands in for
//! it and the match is marked provisional.

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::keywords::{basename, contains_magic, expand_magic, KEYWORD_VGRID};

/// Records which upstream output satisfied a downstream trigger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MatchDescriptor {
    /// Pattern that writes the output
    pub output_pattern: String,
    /// Output name within that pattern
    pub output_file: String,
    /// Output path as declared
    pub value: String,
    /// Last segment of the declared output path
    pub filename: String,
    /// True if the vgrid root was unknown when matching
    #[serde(default)]
    pub provisional: bool,
}

/// Which of the two tests succeeded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Direct,
    Wildcard,
    Both,
}

impl MatchKind {
    fn from_flags(direct: bool, wildcard: bool) -> Option<Self> {
        match (direct, wildcard) {
            (true, true) => Some(MatchKind::Both),
            (true, false) => Some(MatchKind::Direct),
            (false, true) => Some(MatchKind::Wildcard),
            (false, false) => None,
        }
    }

    pub fn via_direct(self) -> bool {
        matches!(self, MatchKind::Direct | MatchKind::Both)
    }

    pub fn via_wildcard(self) -> bool {
        matches!(self, MatchKind::Wildcard | MatchKind::Both)
    }
}

/// A successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMatch {
    pub kind: MatchKind,
    pub descriptor: MatchDescriptor,
}

/// A trigger path prepared for matching against many outputs.
#[derive(Debug, Clone)]
pub struct TriggerMatcher {
    root: Option<String>,
    /// Qualified trigger as plain text
    literal: String,
    /// Anchored expression for the direct test
    regex: Option<Regex>,
}

impl TriggerMatcher {
    /// Qualifies `trigger_path` with the root and compiles it.
    ///
    /// An empty root is treated as unknown.
    pub fn new(trigger_path: &str, root_prefix: Option<&str>) -> Self {
        let root = root_prefix
            .map(|r| r.trim_end_matches('/'))
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let (literal, pattern) = if trigger_path.starts_with('/') {
            (trigger_path.to_string(), trigger_path.to_string())
        } else {
            let root_text = root.as_deref().unwrap_or(KEYWORD_VGRID);
            (
                format!("{}/{}", root_text, trigger_path),
                format!("{}/{}", regex::escape(root_text), trigger_path),
            )
        };

        let regex = match Regex::new(&format!("^(?:{})", pattern)) {
            Ok(regex) => Some(regex),
            Err(e) => {
                debug!("Trigger path '{}' does not compile: {}", trigger_path, e);
                None
            }
        };

        Self {
            root,
            literal,
            regex,
        }
    }

    /// Qualified trigger path used for comparisons.
    pub fn absolute(&self) -> &str {
        &self.literal
    }

    /// True if the root was unknown.
    pub fn is_provisional(&self) -> bool {
        self.root.is_none()
    }

    /// Tests one output of `upstream` against this trigger.
    pub fn match_output(
        &self,
        upstream: &str,
        output_name: &str,
        output_value: &str,
    ) -> Option<PathMatch> {
        let qualified = qualify_output(output_value, self.root.as_deref());

        let direct = self.regex.as_ref().map_or(false, |regex| {
            regex.is_match(output_value) || regex.is_match(&qualified)
        });

        let wildcard = contains_magic(output_value) && self.wildcard_match(output_value);

        let kind = MatchKind::from_flags(direct, wildcard)?;

        Some(PathMatch {
            kind,
            descriptor: MatchDescriptor {
                output_pattern: upstream.to_string(),
                output_file: output_name.to_string(),
                value: output_value.to_string(),
                filename: basename(output_value).to_string(),
                provisional: self.is_provisional(),
            },
        })
    }

    fn wildcard_match(&self, output_value: &str) -> bool {
        let expanded = wildcard_expression(output_value, self.root.as_deref());
        match Regex::new(&format!("^(?:{})", expanded)) {
            Ok(regex) => regex.is_match(&self.literal),
            Err(e) => {
                debug!(
                    "Output expression '{}' does not compile, skipping wildcard test: {}",
                    expanded, e
                );
                false
            }
        }
    }
}

/// Tests whether `output_value` from `upstream` satisfies `trigger_path`.
///
/// # Example
///
/// ```
/// use meow::workflow::matcher::match_output;
///
/// let found = match_output("a", "result", "mid/result.txt", r"mid/result\.txt", None);
/// assert!(found.is_some());
///
/// let found = match_output("a", "result", "other/result.txt", r"mid/.*", Some("test"));
/// assert!(found.is_none());
/// ```
pub fn match_output(
    upstream: &str,
    output_name: &str,
    output_value: &str,
    trigger_path: &str,
    root_prefix: Option<&str>,
) -> Option<PathMatch> {
    TriggerMatcher::new(trigger_path, root_prefix).match_output(upstream, output_name, output_value)
}

/// Places an output path in the same namespace as qualified triggers.
///
/// `{VGRID}` is resolved when the root is known. Outputs that are already
/// rooted are left alone.
fn qualify_output(value: &str, root: Option<&str>) -> String {
    let resolved = match root {
        Some(root) => value.replace(KEYWORD_VGRID, root),
        None => value.to_string(),
    };
    let root_text = root.unwrap_or(KEYWORD_VGRID);

    if is_rooted(&resolved, root_text) {
        resolved
    } else {
        format!("{}/{}", root_text, resolved)
    }
}

fn is_rooted(resolved: &str, root_text: &str) -> bool {
    resolved.starts_with('/')
        || resolved.starts_with(KEYWORD_VGRID)
        || resolved == root_text
        || resolved
            .strip_prefix(root_text)
            .map_or(false, |rest| rest.starts_with('/'))
}

/// Expression for the wildcard test.
///
/// Only tokens written in the output widen to `.*`. A known root, and the
/// prefix added to unrooted outputs, are matched literally.
fn wildcard_expression(value: &str, root: Option<&str>) -> String {
    let root_text = root.unwrap_or(KEYWORD_VGRID);
    let vgrid_expression = match root {
        Some(root) => regex::escape(root),
        None => expand_magic(KEYWORD_VGRID),
    };

    let expanded = value
        .split(KEYWORD_VGRID)
        .map(expand_magic)
        .collect::<Vec<_>>()
        .join(&vgrid_expression);

    let resolved = match root {
        Some(root) => value.replace(KEYWORD_VGRID, root),
        None => value.to_string(),
    };

    if is_rooted(&resolved, root_text) {
        expanded
    } else {
        format!("{}/{}", regex::escape(root_text), expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_trigger_forms() {
        assert_eq!(TriggerMatcher::new("in/.*", Some("test")).absolute(), "test/in/.*");
        assert_eq!(TriggerMatcher::new("in/.*", Some("test/")).absolute(), "test/in/.*");
        assert_eq!(TriggerMatcher::new("in/.*", None).absolute(), "{VGRID}/in/.*");
        assert_eq!(TriggerMatcher::new("in/.*", Some("")).absolute(), "{VGRID}/in/.*");
        assert_eq!(TriggerMatcher::new("/abs/.*", Some("test")).absolute(), "/abs/.*");
    }

    #[test]
    fn test_qualify_output() {
        assert_eq!(qualify_output("mid/x.txt", None), "{VGRID}/mid/x.txt");
        assert_eq!(qualify_output("{VGRID}/mid/x.txt", None), "{VGRID}/mid/x.txt");
        assert_eq!(qualify_output("mid/x.txt", Some("test")), "test/mid/x.txt");
        assert_eq!(qualify_output("test/mid/x.txt", Some("test")), "test/mid/x.txt");
        assert_eq!(qualify_output("{VGRID}/x", Some("test")), "test/x");
        assert_eq!(qualify_output("testing/x", Some("test")), "test/testing/x");
        assert_eq!(qualify_output("/abs/x", Some("test")), "/abs/x");
    }

    #[test]
    fn test_direct_match() {
        let m = match_output("a", "r", "mid/result.txt", r"mid/result\.txt", None).unwrap();

        assert_eq!(m.kind, MatchKind::Direct);
        assert_eq!(
            m.descriptor,
            MatchDescriptor {
                output_pattern: "a".to_string(),
                output_file: "r".to_string(),
                value: "mid/result.txt".to_string(),
                filename: "result.txt".to_string(),
                provisional: true,
            }
        );
    }

    #[test]
    fn test_direct_match_is_prefix_match() {
        let m = match_output("a", "r", "mid/result.txt.bak", r"mid/result\.txt", Some("vg"));
        assert!(m.unwrap().kind.via_direct());
    }

    #[test]
    fn test_direct_match_with_known_root_is_not_provisional() {
        let m = match_output("a", "r", "vg/mid/x.txt", r"mid/.*\.txt", Some("vg")).unwrap();
        assert!(!m.descriptor.provisional);
    }

    #[test]
    fn test_no_match() {
        assert!(match_output("a", "r", "other/result.txt", r"mid/.*", None).is_none());
        assert!(match_output("a", "r", "mid/result.csv", r"mid/.*\.txt", Some("vg")).is_none());
    }

    #[test]
    fn test_keyword_wildcard_match() {
        let m = match_output("a", "r", "out/{FILENAME}", r"out/.*\.txt", None).unwrap();
        assert_eq!(m.kind, MatchKind::Wildcard);
        assert_eq!(m.descriptor.filename, "{FILENAME}");
    }

    #[test]
    fn test_star_alone_qualifies_for_wildcard() {
        let m = match_output("c", "r", "out/*", "out/.*", None).unwrap();
        assert!(m.kind.via_wildcard());
    }

    #[test]
    fn test_wildcard_respects_directory() {
        assert!(match_output("a", "r", "out/{FILENAME}", r"elsewhere/.*\.txt", Some("vg")).is_none());
    }

    #[test]
    fn test_wildcard_respects_directory_without_root() {
        assert!(match_output("a", "r", "out/{FILENAME}", r"elsewhere/out/.*\.txt", None).is_none());
        assert!(match_output("a", "r", "out/{FILENAME}", r"elsewhere/out/.*\.txt", Some("vg")).is_none());

        let m = match_output("a", "r", "out/{FILENAME}", r"out/.*\.txt", None).unwrap();
        assert_eq!(m.kind, MatchKind::Wildcard);
    }

    #[test]
    fn test_written_vgrid_keyword_widens_without_root() {
        let m = match_output("a", "r", "{VGRID}/out/{FILENAME}", r"out/.*\.txt", None).unwrap();
        assert!(m.kind.via_wildcard());
    }

    #[test]
    fn test_wildcard_expression() {
        assert_eq!(wildcard_expression("out/{FILENAME}", None), r"\{VGRID\}/out/.*");
        assert_eq!(wildcard_expression("out/*", Some("my.vg")), r"my\.vg/out/.*");
        assert_eq!(wildcard_expression("{VGRID}/out/*", Some("vg")), "vg/out/.*");
        assert_eq!(wildcard_expression("{VGRID}/out/*", None), ".*/out/.*");
        assert_eq!(wildcard_expression("/abs/{PREFIX}.txt", None), "/abs/.*.txt");
    }

    #[test]
    fn test_declared_output_matched_as_written() {
        let m = TriggerMatcher::new("a|mid/x", Some("vg"))
            .match_output("p", "o", "mid/x.txt")
            .unwrap();
        assert_eq!(m.kind, MatchKind::Direct);
    }

    #[test]
    fn test_vgrid_keyword_resolved_with_root() {
        let m = match_output("a", "r", "{VGRID}/mid/x.txt", r"mid/x\.txt", Some("test")).unwrap();
        assert!(m.kind.via_direct());
    }

    #[test]
    fn test_rooted_output_outside_root_does_not_match() {
        assert!(match_output("a", "r", "/abs/mid/x.txt", r"mid/x\.txt", Some("test")).is_none());
    }

    #[test]
    fn test_invalid_output_expression_is_no_match() {
        assert!(match_output("a", "r", "out/(*", r"in/.*", None).is_none());
    }

    #[test]
    fn test_precompiled_matcher_reused() {
        let matcher = TriggerMatcher::new(r"data/.*\.csv", Some("vg"));
        assert!(matcher.match_output("a", "x", "data/one.csv").is_some());
        assert!(matcher.match_output("b", "y", "data/two.csv").is_some());
        assert!(matcher.match_output("c", "z", "data/three.txt").is_none());
        assert!(!matcher.is_provisional());
    }
}
