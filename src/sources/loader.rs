//! Reading specification sources into one merged document.

use super::merge::merge_documents;
use crate::error::{ConfigurationError, value_kind};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One raw input to the merge step.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A YAML or JSON file on disk
    Path(PathBuf),
    /// YAML or JSON text
    Text(String),
    /// An already-parsed document
    Value(Value),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Source::Text(text.into())
    }

    /// Load the source into a value. Empty documents load as `Value::Null`.
    pub fn load(&self) -> Result<Value, ConfigurationError> {
        match self {
            Source::Path(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| ConfigurationError::SourceRead {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                parse_text(&content, &self.to_string())
            }
            Source::Text(text) => parse_text(text, &self.to_string()),
            Source::Value(value) => Ok(value.clone()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Text(_) => write!(f, "<text>"),
            Source::Value(_) => write!(f, "<value>"),
        }
    }
}

impl From<Value> for Source {
    fn from(value: Value) -> Self {
        Source::Value(value)
    }
}

impl From<Map<String, Value>> for Source {
    fn from(map: Map<String, Value>) -> Self {
        Source::Value(Value::Object(map))
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

fn parse_text(text: &str, name: &str) -> Result<Value, ConfigurationError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str::<Value>(text).map_err(|e| ConfigurationError::SourceParse {
        source_name: name.to_string(),
        message: e.to_string(),
    })
}

/// Load every source and merge them in order into one document.
///
/// A later source's top-level keys replace the earlier ones. Sources that load as null are
/// skipped; anything else that is not a mapping is rejected.
pub fn read_sources(sources: &[Source]) -> Result<Map<String, Value>, ConfigurationError> {
    let mut documents = Vec::with_capacity(sources.len());
    for source in sources {
        let value = source.load()?;
        match value {
            Value::Null => {
                warn!(source = %source, "Specification source is empty, skipping");
            }
            Value::Object(map) => documents.push(map),
            other => {
                return Err(ConfigurationError::InvalidSource {
                    source_name: source.to_string(),
                    found: value_kind(&other),
                });
            }
        }
    }

    debug!(count = documents.len(), "Merging specification sources");
    Ok(merge_documents(documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_read_yaml_file_and_override_with_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("runspec.yaml");
        std::fs::write(
            &path,
            r#"
version: 1
kind: build
build:
  image: python:3
  build_steps:
    - pip install numpy
"#,
        )
        .unwrap();

        let merged = read_sources(&[
            Source::path(&path),
            Source::Value(json!({"build": {"image": "python:3.11"}})),
        ])
        .unwrap();

        assert_eq!(merged["version"], json!(1));
        assert_eq!(merged["kind"], json!("build"));
        assert_eq!(merged["build"], json!({"image": "python:3.11"}));
    }

    #[test]
    fn test_json_text_is_accepted() {
        let merged = read_sources(&[Source::text(r#"{"version": 1, "kind": "job"}"#)]).unwrap();
        assert_eq!(merged["kind"], json!("job"));
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let merged = read_sources(&[
            Source::text(""),
            Source::Value(Value::Null),
            Source::text("version: 1"),
        ])
        .unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_no_sources_is_empty_document() {
        assert!(read_sources(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_source_rejected() {
        let err = read_sources(&[Source::text("- a\n- b\n")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidSource {
                found: "a sequence",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_sources(&[Source::path("/nonexistent/runspec.yaml")]).unwrap_err();
        match err {
            ConfigurationError::SourceRead { path, .. } => {
                assert_eq!(path, "/nonexistent/runspec.yaml")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_text_rejected() {
        let err = read_sources(&[Source::text("version: [1, 2")]).unwrap_err();
        assert!(matches!(err, ConfigurationError::SourceParse { .. }));
    }
}
