//! Structured error types for specification resolution.

use crate::spec::{Section, SpecKind};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Source errors
    SourceRead,
    SourceParse,
    InvalidSource,

    // Header errors
    MissingVersion,
    UnsupportedVersion,
    MissingKind,
    UnsupportedKind,
    KindMismatch,

    // Section shape errors
    UnexpectedSection,
    UnsupportedSection,
    MissingRequiredSection,
    InvalidSection,
    InvalidBuildInput,

    // Variant dispatch errors
    UnknownVariant,
    MultipleVariantSelectors,
    InvalidSelector,
    UnknownField,
    FieldType,
    MissingRequiredField,
    DuplicateVariant,

    // Operator errors
    OperatorReference,
    OperatorType,
    MalformedOperator,
}

/// Document-level failures: sources, headers and section legality.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Could not read specification source `{path}`: {message}")]
    SourceRead { path: String, message: String },

    #[error("Could not parse specification source `{source_name}`: {message}")]
    SourceParse {
        source_name: String,
        message: String,
    },

    #[error("Specification source `{source_name}` must be a mapping, found {found}")]
    InvalidSource {
        source_name: String,
        found: &'static str,
    },

    #[error("The specification `version` must be specified")]
    MissingVersion,

    #[error(
        "The specification version `{found}` is not supported; supported versions are {min} <= v <= {max}"
    )]
    UnsupportedVersion { found: String, min: i64, max: i64 },

    #[error("The specification `kind` must be specified")]
    MissingKind,

    #[error("The specification kind `{found}` is not supported; expected one of: {}", SpecKind::names().join(", "))]
    UnsupportedKind { found: String },

    #[error("A `{expected}` specification cannot be built from a document of kind `{found}`")]
    KindMismatch { expected: SpecKind, found: SpecKind },

    #[error(
        "Unexpected section `{section}` in specification version `{version}`; legal sections are: {}",
        Section::names().join(", ")
    )]
    UnexpectedSection { section: String, version: i64 },

    #[error("Section `{section}` is not supported for specification kind `{kind}`")]
    UnsupportedSection { section: Section, kind: SpecKind },

    #[error("`{section}` is a required section for a `{kind}` specification")]
    MissingRequiredSection { section: Section, kind: SpecKind },

    #[error("Invalid `{section}` section: {message}")]
    InvalidSection { section: Section, message: String },

    #[error("A build specification expects a build config or a mapping, found {found}")]
    InvalidBuildInput { found: &'static str },
}

/// Discriminated-variant dispatch failures.
#[derive(Debug, Error)]
pub enum VariantError {
    #[error("Unknown {family} `{identifier}`; expected one of: {}", .known.join(", "))]
    UnknownVariant {
        family: String,
        identifier: String,
        known: Vec<String>,
    },

    #[error("A {family} selection must name exactly one variant, found: {}", .selectors.join(", "))]
    MultipleVariantSelectors {
        family: String,
        selectors: Vec<String>,
    },

    #[error("Invalid {family} selection: {message}")]
    InvalidSelector { family: String, message: String },

    #[error("Unknown field `{field}` for `{identifier}`")]
    UnknownField { identifier: String, field: String },

    #[error("Field `{field}` of `{identifier}` expects {expected}, found {actual}")]
    FieldType {
        identifier: String,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Field `{field}` is required for `{identifier}`")]
    MissingRequiredField { identifier: String, field: String },

    #[error("Variant `{identifier}` is already registered in the {family} family")]
    DuplicateVariant { family: String, identifier: String },
}

/// Failures while expanding `for` / `if` operators and `{{ ref }}` templates.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("Reference `{reference}` {reason}")]
    Reference { reference: String, reason: String },

    #[error("Reference `{reference}` must resolve to {expected}, found {actual}")]
    Type {
        reference: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Malformed operator: {message}")]
    Malformed { message: String },
}

impl OperatorError {
    pub fn unresolved(reference: &str) -> Self {
        OperatorError::Reference {
            reference: reference.to_string(),
            reason: "cannot be resolved in the current document or scope".to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        OperatorError::Malformed {
            message: message.into(),
        }
    }
}

/// Top-level error returned by every resolution entry point.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error("{error}{}", section_suffix(.section))]
    Operator {
        #[source]
        error: OperatorError,
        section: Option<Section>,
    },
}

fn section_suffix(section: &Option<Section>) -> String {
    match section {
        Some(section) => format!(" (in section `{}`)", section),
        None => String::new(),
    }
}

impl From<OperatorError> for SpecError {
    fn from(error: OperatorError) -> Self {
        SpecError::Operator {
            error,
            section: None,
        }
    }
}

impl SpecError {
    /// Attach the section an operator failure happened in.
    pub fn in_section(self, at: Section) -> Self {
        match self {
            SpecError::Operator {
                error,
                section: None,
            } => SpecError::Operator {
                error,
                section: Some(at),
            },
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SpecError::Configuration(err) => match err {
                ConfigurationError::SourceRead { .. } => ErrorCode::SourceRead,
                ConfigurationError::SourceParse { .. } => ErrorCode::SourceParse,
                ConfigurationError::InvalidSource { .. } => ErrorCode::InvalidSource,
                ConfigurationError::MissingVersion => ErrorCode::MissingVersion,
                ConfigurationError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
                ConfigurationError::MissingKind => ErrorCode::MissingKind,
                ConfigurationError::UnsupportedKind { .. } => ErrorCode::UnsupportedKind,
                ConfigurationError::KindMismatch { .. } => ErrorCode::KindMismatch,
                ConfigurationError::UnexpectedSection { .. } => ErrorCode::UnexpectedSection,
                ConfigurationError::UnsupportedSection { .. } => ErrorCode::UnsupportedSection,
                ConfigurationError::MissingRequiredSection { .. } => {
                    ErrorCode::MissingRequiredSection
                }
                ConfigurationError::InvalidSection { .. } => ErrorCode::InvalidSection,
                ConfigurationError::InvalidBuildInput { .. } => ErrorCode::InvalidBuildInput,
            },
            SpecError::Variant(err) => match err {
                VariantError::UnknownVariant { .. } => ErrorCode::UnknownVariant,
                VariantError::MultipleVariantSelectors { .. } => {
                    ErrorCode::MultipleVariantSelectors
                }
                VariantError::InvalidSelector { .. } => ErrorCode::InvalidSelector,
                VariantError::UnknownField { .. } => ErrorCode::UnknownField,
                VariantError::FieldType { .. } => ErrorCode::FieldType,
                VariantError::MissingRequiredField { .. } => ErrorCode::MissingRequiredField,
                VariantError::DuplicateVariant { .. } => ErrorCode::DuplicateVariant,
            },
            SpecError::Operator { error, .. } => match error {
                OperatorError::Reference { .. } => ErrorCode::OperatorReference,
                OperatorError::Type { .. } => ErrorCode::OperatorType,
                OperatorError::Malformed { .. } => ErrorCode::MalformedOperator,
            },
        }
    }

    /// The section the failure points at, when there is one.
    pub fn section(&self) -> Option<String> {
        match self {
            SpecError::Configuration(err) => match err {
                ConfigurationError::MissingVersion
                | ConfigurationError::UnsupportedVersion { .. } => {
                    Some(Section::Version.to_string())
                }
                ConfigurationError::MissingKind
                | ConfigurationError::UnsupportedKind { .. }
                | ConfigurationError::KindMismatch { .. } => Some(Section::Kind.to_string()),
                ConfigurationError::UnexpectedSection { section, .. } => Some(section.clone()),
                ConfigurationError::UnsupportedSection { section, .. }
                | ConfigurationError::MissingRequiredSection { section, .. }
                | ConfigurationError::InvalidSection { section, .. } => Some(section.to_string()),
                ConfigurationError::InvalidBuildInput { .. } => Some(Section::Build.to_string()),
                _ => None,
            },
            SpecError::Variant(_) => None,
            SpecError::Operator { section, .. } => section.map(|s| s.to_string()),
        }
    }

    /// Render as a serializable diagnostic.
    pub fn diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::new(self.code(), self.to_string());
        match self.section() {
            Some(section) => diagnostic.with_section(section),
            None => diagnostic,
        }
    }
}

/// Serializable form of a [`SpecError`] for user-facing output.
#[derive(Debug, Serialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            section: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Short name of a value's shape, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Result type for specification operations.
pub type Result<T> = std::result::Result<T, SpecError>;
