//! Query file parsing with environment variable substitution.
//!
//! A query file holds one or more YAML documents separated by `---`.
//! Empty documents are skipped.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tagsync_types::{ActivityTypeQuery, TagQuery};

use crate::config::types::{ActivityTypeQueryDoc, TagQueryDoc};
use crate::config::validator;
use crate::error::ConfigError;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// A query kind that can be loaded from a query file.
pub trait QueryDocument: Sized + Clone + PartialEq + Send + Sync + 'static {
    /// Human-readable kind used in log fields.
    const KIND: &'static str;

    /// Parse and validate the documents of one file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed documents and
    /// [`ConfigError::Invalid`] when validation fails.
    fn parse(content: &str, path: &Path) -> Result<Vec<Self>, ConfigError>;
}

impl QueryDocument for TagQuery {
    const KIND: &'static str = "tag";

    fn parse(content: &str, path: &Path) -> Result<Vec<Self>, ConfigError> {
        let docs: Vec<TagQueryDoc> = parse_documents(content, path)?;
        validator::validate_tag_queries(docs)
    }
}

impl QueryDocument for ActivityTypeQuery {
    const KIND: &'static str = "activity_type";

    fn parse(content: &str, path: &Path) -> Result<Vec<Self>, ConfigError> {
        let docs: Vec<ActivityTypeQueryDoc> = parse_documents(content, path)?;
        validator::validate_activity_type_queries(docs)
    }
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming every unset variable.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => result = result.replace(&cap[0], &val),
            Err(_) => missing.push(format!("Missing environment variable: {var_name}")),
        }
    }

    if missing.is_empty() {
        Ok(result)
    } else {
        Err(ConfigError::Invalid(missing))
    }
}

/// Deserialize every non-empty YAML document in `content`.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] on the first malformed document.
pub fn parse_documents<T: DeserializeOwned>(
    content: &str,
    path: &Path,
) -> Result<Vec<T>, ConfigError> {
    let substituted = substitute_env_vars(content)?;
    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&substituted) {
        let doc = Option::<T>::deserialize(document).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        docs.extend(doc);
    }
    Ok(docs)
}

/// Read and parse a query file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
/// whatever [`QueryDocument::parse`] reports.
pub fn load<Q: QueryDocument>(path: &Path) -> Result<Vec<Q>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Q::parse(&content, path)
}
