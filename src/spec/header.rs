//! Header validation: `version` and `kind` are checked before anything else.

use super::catalog::{Section, SectionContract, SpecKind};
use crate::error::{ConfigurationError, SpecError};
use crate::logging::{LogLevel, LoggingConfig};
use crate::schemas::{Backend, Framework, parse_section};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Minimum specification version this crate supports.
pub const MIN_VERSION: i64 = 1;
/// Maximum specification version this crate supports.
pub const MAX_VERSION: i64 = 1;

/// Validated header sections of a specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub version: i64,
    pub kind: SpecKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
}

impl Header {
    /// Log level from the `logging` section, `INFO` when absent.
    pub fn log_level(&self) -> LogLevel {
        self.logging
            .as_ref()
            .map(|logging| logging.level)
            .unwrap_or_default()
    }
}

/// Check `version` and `kind`, returning `(version, kind)`.
///
/// `expected` is the kind the calling engine is bound to.
pub fn validate_version_and_kind(
    document: &Map<String, Value>,
    expected: SpecKind,
) -> Result<(i64, SpecKind), ConfigurationError> {
    let version = check_version(document)?;
    let kind = SpecKind::detect(document)?;
    if kind != expected {
        return Err(ConfigurationError::KindMismatch {
            expected,
            found: kind,
        });
    }
    Ok((version, kind))
}

fn check_version(document: &Map<String, Value>) -> Result<i64, ConfigurationError> {
    let value = document
        .get(Section::Version.as_str())
        .ok_or(ConfigurationError::MissingVersion)?;
    match value.as_i64() {
        Some(version) if (MIN_VERSION..=MAX_VERSION).contains(&version) => Ok(version),
        _ => Err(ConfigurationError::UnsupportedVersion {
            found: value.to_string(),
            min: MIN_VERSION,
            max: MAX_VERSION,
        }),
    }
}

/// Parse the header sections the contract declares.
///
/// Runs after the section catalog check, so every key here is legal for the kind.
pub fn parse_header(
    document: &Map<String, Value>,
    contract: &SectionContract,
    version: i64,
    kind: SpecKind,
) -> Result<Header, SpecError> {
    let mut header = Header {
        version,
        kind,
        tags: None,
        logging: None,
        backend: None,
        framework: None,
    };

    for &section in contract.header {
        let Some(value) = document.get(section.as_str()) else {
            continue;
        };
        match section {
            Section::Tags => header.tags = parse_tags(value)?,
            Section::Logging => header.logging = parse_section(section, value)?,
            Section::Backend => header.backend = parse_section(section, value)?,
            Section::Framework => header.framework = parse_section(section, value)?,
            _ => {}
        }
    }

    Ok(header)
}

/// Tags accept a single string or a sequence of strings; duplicates collapse.
fn parse_tags(value: &Value) -> Result<Option<BTreeSet<String>>, ConfigurationError> {
    let invalid = |message: &str| ConfigurationError::InvalidSection {
        section: Section::Tags,
        message: message.to_string(),
    };
    match value {
        Value::Null => Ok(None),
        Value::String(tag) => Ok(Some(BTreeSet::from([tag.clone()]))),
        Value::Array(items) => {
            let tags = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid("every tag must be a string"))
                })
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(if tags.is_empty() { None } else { Some(tags) })
        }
        _ => Err(invalid("expected a string or a sequence of strings")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_version() {
        let err = validate_version_and_kind(&doc(json!({"kind": "job"})), SpecKind::Job).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingVersion));
    }

    #[test]
    fn test_version_boundaries() {
        for version in [json!(0), json!(2), json!("1"), json!(1.5)] {
            let err = validate_version_and_kind(
                &doc(json!({"version": version, "kind": "job"})),
                SpecKind::Job,
            )
            .unwrap_err();
            assert!(matches!(err, ConfigurationError::UnsupportedVersion { .. }));
        }
        let ok = validate_version_and_kind(&doc(json!({"version": 1, "kind": "job"})), SpecKind::Job);
        assert_eq!(ok.unwrap(), (1, SpecKind::Job));
    }

    #[test]
    fn test_version_checked_before_kind() {
        let err = validate_version_and_kind(&doc(json!({})), SpecKind::Job).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingVersion));
    }

    #[test]
    fn test_kind_errors() {
        let err = validate_version_and_kind(&doc(json!({"version": 1})), SpecKind::Job).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingKind));

        let err = validate_version_and_kind(
            &doc(json!({"version": 1, "kind": "pipeline"})),
            SpecKind::Job,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnsupportedKind { .. }));

        let err = validate_version_and_kind(
            &doc(json!({"version": 1, "kind": "build"})),
            SpecKind::Job,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::KindMismatch {
                expected: SpecKind::Job,
                found: SpecKind::Build
            }
        ));
    }

    #[test]
    fn test_parse_header_sections() {
        let document = doc(json!({
            "version": 1,
            "kind": "experiment",
            "tags": ["vision", "baseline", "vision"],
            "logging": {"level": "DEBUG"},
            "framework": "pytorch",
            "backend": "native",
        }));
        let contract = SpecKind::Experiment.contract();
        let header = parse_header(&document, contract, 1, SpecKind::Experiment).unwrap();
        let tags: Vec<_> = header.tags.clone().unwrap().into_iter().collect();
        assert_eq!(tags, vec!["baseline", "vision"]);
        assert_eq!(header.log_level(), LogLevel::Debug);
        assert_eq!(header.framework, Some(Framework::Pytorch));
        assert_eq!(header.backend, Some(Backend::Native));
    }

    #[test]
    fn test_single_string_tag() {
        let tags = parse_tags(&json!("nightly")).unwrap().unwrap();
        assert!(tags.contains("nightly"));
        assert!(parse_tags(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_default_log_level_is_info() {
        let header = parse_header(
            &doc(json!({"version": 1, "kind": "build", "build": {"image": "x"}})),
            SpecKind::Build.contract(),
            1,
            SpecKind::Build,
        )
        .unwrap();
        assert_eq!(header.log_level(), LogLevel::Info);
    }
}
