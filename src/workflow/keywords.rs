//! Magic Keyword Handling
//!
//! Output paths may embed keywords that are filled in from the triggering
//! file when a job runs:
//!
//! | Keyword       | Value for `test/dir/path/file.txt` in vgrid `test` |
//! |---------------|-----------------------------------------------------|
//! | `{PATH}`      | `test/dir/path/file.txt`                            |
//! | `{REL_PATH}`  | `dir/path/file.txt`                                 |
//! | `{DIR}`       | `test/dir/path`                                     |
//! | `{REL_DIR}`   | `dir/path`                                          |
//! | `{FILENAME}`  | `file.txt`                                          |
//! | `{PREFIX}`    | `file`                                              |
//! | `{EXTENSION}` | `.txt`                                              |
//! | `{VGRID}`     | `test`                                              |
//! | `{JOB}`       | the unique job id                                   |
//!
//! A bare `*` in an output path stands for the triggering file name. For
//! graph construction every keyword and `*` is treated as "anything".

use std::collections::BTreeMap;

use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

pub const KEYWORD_PATH: &str = "{PATH}";
pub const KEYWORD_REL_PATH: &str = "{REL_PATH}";
pub const KEYWORD_DIR: &str = "{DIR}";
pub const KEYWORD_REL_DIR: &str = "{REL_DIR}";
pub const KEYWORD_FILENAME: &str = "{FILENAME}";
pub const KEYWORD_PREFIX: &str = "{PREFIX}";
pub const KEYWORD_VGRID: &str = "{VGRID}";
pub const KEYWORD_EXTENSION: &str = "{EXTENSION}";
pub const KEYWORD_JOB: &str = "{JOB}";

/// Output wildcard standing for the triggering file name.
pub const OUTPUT_WILDCARD: &str = "*";

/// Every keyword recognised in output paths.
pub const TRIGGER_KEYWORDS: &[&str] = &[
    KEYWORD_PATH,
    KEYWORD_REL_PATH,
    KEYWORD_DIR,
    KEYWORD_REL_DIR,
    KEYWORD_FILENAME,
    KEYWORD_PREFIX,
    KEYWORD_VGRID,
    KEYWORD_EXTENSION,
    KEYWORD_JOB,
];

/// Keywords plus the output wildcard.
pub const MAGIC_TOKENS: &[&str] = &[
    KEYWORD_PATH,
    KEYWORD_REL_PATH,
    KEYWORD_DIR,
    KEYWORD_REL_DIR,
    KEYWORD_FILENAME,
    KEYWORD_PREFIX,
    KEYWORD_VGRID,
    KEYWORD_EXTENSION,
    KEYWORD_JOB,
    OUTPUT_WILDCARD,
];

/// Regex fragment each magic token expands to.
const MAGIC_EXPANSION: &str = ".*";

/// Default length of generated job ids.
pub const DEFAULT_JOB_ID_LENGTH: usize = 16;

/// Checks if a value contains any keyword or the `*` wildcard.
pub fn contains_magic(value: &str) -> bool {
    MAGIC_TOKENS.iter().any(|token| value.contains(token))
}

/// Lists the magic tokens present in a value, in declaration order.
///
/// # Example
/// ```
/// use meow::workflow::keywords::magic_tokens_in;
///
/// assert_eq!(magic_tokens_in("{DIR}/out_{FILENAME}"), vec!["{DIR}", "{FILENAME}"]);
/// ```
pub fn magic_tokens_in(value: &str) -> Vec<&'static str> {
    MAGIC_TOKENS
        .iter()
        .copied()
        .filter(|token| value.contains(token))
        .collect()
}

/// Replaces every magic token in `value` with the regex wildcard `.*`.
///
/// Tokens are replaced in a single left-to-right pass, so the `.*`
/// written for one token is never rewritten by another.
///
/// # Example
/// ```
/// use meow::workflow::keywords::expand_magic;
///
/// assert_eq!(expand_magic("out/{FILENAME}"), "out/.*");
/// assert_eq!(expand_magic("{VGRID}/out/*"), ".*/out/.*");
/// ```
pub fn expand_magic(value: &str) -> String {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;

    'scan: while !rest.is_empty() {
        for token in MAGIC_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                expanded.push_str(MAGIC_EXPANSION);
                rest = tail;
                continue 'scan;
            }
        }

        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            expanded.push(ch);
        }
        rest = chars.as_str();
    }

    expanded
}

/// Values derived from one triggering file, used to fill in keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordContext {
    pub path: String,
    pub rel_path: String,
    pub dir: String,
    pub rel_dir: String,
    pub filename: String,
    pub prefix: String,
    pub extension: String,
    pub vgrid: String,
    pub job: String,
}

impl KeywordContext {
    /// Derives all keyword values from the triggering path.
    ///
    /// # Example
    /// ```
    /// use meow::workflow::keywords::KeywordContext;
    ///
    /// let ctx = KeywordContext::new("test/dir/file.txt", "test", "job1");
    /// assert_eq!(ctx.resolve("{REL_DIR}/{PREFIX}.csv"), "dir/file.csv");
    /// ```
    pub fn new(src_path: &str, vgrid: &str, job_id: &str) -> Self {
        let filename = basename(src_path).to_string();
        let dir = dirname(src_path).to_string();

        let vgrid_dir = format!("{}/", vgrid.trim_end_matches('/'));
        let rel_path = src_path
            .strip_prefix(&vgrid_dir)
            .unwrap_or(src_path)
            .to_string();
        let rel_dir = dirname(&rel_path).to_string();

        let (prefix, extension) = split_extension(&filename);

        Self {
            path: src_path.to_string(),
            rel_path,
            dir,
            rel_dir,
            prefix: prefix.to_string(),
            extension: extension.to_string(),
            filename,
            vgrid: vgrid.to_string(),
            job: job_id.to_string(),
        }
    }

    /// Substitutes every keyword in `text` with its concrete value.
    pub fn resolve(&self, text: &str) -> String {
        text.replace(KEYWORD_PATH, &self.path)
            .replace(KEYWORD_REL_PATH, &self.rel_path)
            .replace(KEYWORD_DIR, &self.dir)
            .replace(KEYWORD_REL_DIR, &self.rel_dir)
            .replace(KEYWORD_FILENAME, &self.filename)
            .replace(KEYWORD_PREFIX, &self.prefix)
            .replace(KEYWORD_VGRID, &self.vgrid)
            .replace(KEYWORD_EXTENSION, &self.extension)
            .replace(KEYWORD_JOB, &self.job)
    }

    /// Resolves keywords in every string value of a variables map.
    ///
    /// Non-string values are passed through untouched.
    pub fn resolve_values(&self, values: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        values
            .iter()
            .map(|(name, value)| {
                let resolved = match value {
                    Value::String(s) => Value::String(self.resolve(s)),
                    other => other.clone(),
                };
                (name.clone(), resolved)
            })
            .collect()
    }
}

/// Generates a random alphanumeric job id.
///
/// Uniqueness is not guaranteed but collisions are improbable at the
/// default length.
pub fn generate_job_id(length: usize) -> String {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    debug!("Generated job id {}", id);
    id
}

/// Last path segment.
pub(crate) fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Everything before the last path separator, or empty.
fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Splits `file.txt` into `("file", ".txt")`. Leading dots are not extensions.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 && filename[..index].chars().any(|c| c != '.') => {
            (&filename[..index], &filename[index..])
        }
        _ => (filename, ""),
    }
}
