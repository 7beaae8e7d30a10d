//! Section catalog: which top-level sections each specification kind accepts.
//!
//! The catalog is plain data. Every kind gets one [`SectionContract`]; the
//! engine checks a merged document against it before parsing anything.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Specification kind, selecting the section contract and result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecKind {
    Experiment,
    Group,
    Job,
    Notebook,
    Tensorboard,
    Build,
}

impl SpecKind {
    pub const ALL: [SpecKind; 6] = [
        SpecKind::Experiment,
        SpecKind::Group,
        SpecKind::Job,
        SpecKind::Notebook,
        SpecKind::Tensorboard,
        SpecKind::Build,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecKind::Experiment => "experiment",
            SpecKind::Group => "group",
            SpecKind::Job => "job",
            SpecKind::Notebook => "notebook",
            SpecKind::Tensorboard => "tensorboard",
            SpecKind::Build => "build",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.as_str()).collect()
    }

    /// Read and validate the `kind` declared by a document.
    pub fn detect(document: &Map<String, Value>) -> Result<SpecKind, ConfigurationError> {
        match document.get(Section::Kind.as_str()) {
            None => Err(ConfigurationError::MissingKind),
            Some(Value::String(name)) => name
                .parse()
                .map_err(|_| ConfigurationError::UnsupportedKind {
                    found: name.clone(),
                }),
            Some(other) => Err(ConfigurationError::UnsupportedKind {
                found: other.to_string(),
            }),
        }
    }

    /// The section contract for this kind.
    pub fn contract(&self) -> &'static SectionContract {
        match self {
            SpecKind::Experiment => &EXPERIMENT,
            SpecKind::Group => &GROUP,
            SpecKind::Job => &JOB,
            SpecKind::Notebook => &NOTEBOOK,
            SpecKind::Tensorboard => &TENSORBOARD,
            SpecKind::Build => &BUILD,
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SpecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid kind '{}'. Valid options: {}",
                    s,
                    Self::names().join(", ")
                )
            })
    }
}

/// A legal top-level section, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Version,
    Kind,
    Tags,
    Backend,
    Framework,
    Environment,
    Declarations,
    Logging,
    Hptuning,
    Build,
    Run,
}

impl Section {
    pub const ALL: [Section; 11] = [
        Section::Version,
        Section::Kind,
        Section::Tags,
        Section::Backend,
        Section::Framework,
        Section::Environment,
        Section::Declarations,
        Section::Logging,
        Section::Hptuning,
        Section::Build,
        Section::Run,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Version => "version",
            Section::Kind => "kind",
            Section::Tags => "tags",
            Section::Backend => "backend",
            Section::Framework => "framework",
            Section::Environment => "environment",
            Section::Declarations => "declarations",
            Section::Logging => "logging",
            Section::Hptuning => "hptuning",
            Section::Build => "build",
            Section::Run => "run",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }

    pub fn from_key(key: &str) -> Option<Section> {
        Self::ALL.iter().copied().find(|s| s.as_str() == key)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Section legality rules for one specification kind.
///
/// Invariant: `required ⊆ possible ⊆ Section::ALL` and `header ⊆ possible`.
#[derive(Debug, Clone, Copy)]
pub struct SectionContract {
    pub kind: SpecKind,
    pub required: &'static [Section],
    pub possible: &'static [Section],
    /// Sections parsed into the header before anything else.
    pub header: &'static [Section],
    /// Sections that may carry `for` / `if` operators.
    pub operator: &'static [Section],
}

use Section::*;

const OPERATOR_SECTIONS: &[Section] = &[Build, Run];

static BUILD: SectionContract = SectionContract {
    kind: SpecKind::Build,
    required: &[Version, Kind, Build],
    possible: &[Version, Kind, Tags, Backend, Environment, Logging, Build],
    header: &[Version, Kind, Tags, Backend, Logging],
    operator: OPERATOR_SECTIONS,
};

static NOTEBOOK: SectionContract = SectionContract {
    kind: SpecKind::Notebook,
    required: &[Version, Kind, Build],
    possible: &[Version, Kind, Tags, Backend, Environment, Logging, Build],
    header: &[Version, Kind, Tags, Backend, Logging],
    operator: OPERATOR_SECTIONS,
};

static TENSORBOARD: SectionContract = SectionContract {
    kind: SpecKind::Tensorboard,
    required: &[Version, Kind],
    possible: &[Version, Kind, Tags, Backend, Environment, Logging, Build],
    header: &[Version, Kind, Tags, Backend, Logging],
    operator: OPERATOR_SECTIONS,
};

static JOB: SectionContract = SectionContract {
    kind: SpecKind::Job,
    required: &[Version, Kind, Build, Run],
    possible: &[
        Version,
        Kind,
        Tags,
        Backend,
        Environment,
        Declarations,
        Logging,
        Build,
        Run,
    ],
    header: &[Version, Kind, Tags, Backend, Logging],
    operator: OPERATOR_SECTIONS,
};

static EXPERIMENT: SectionContract = SectionContract {
    kind: SpecKind::Experiment,
    required: &[Version, Kind, Run],
    possible: &[
        Version,
        Kind,
        Tags,
        Backend,
        Framework,
        Environment,
        Declarations,
        Logging,
        Build,
        Run,
    ],
    header: &[Version, Kind, Tags, Backend, Framework, Logging],
    operator: OPERATOR_SECTIONS,
};

static GROUP: SectionContract = SectionContract {
    kind: SpecKind::Group,
    required: &[Version, Kind, Hptuning, Run],
    possible: &Section::ALL,
    header: &[Version, Kind, Tags, Backend, Framework, Logging],
    operator: OPERATOR_SECTIONS,
};

impl SectionContract {
    pub fn is_possible(&self, section: Section) -> bool {
        self.possible.contains(&section)
    }

    pub fn is_required(&self, section: Section) -> bool {
        self.required.contains(&section)
    }

    pub fn is_header(&self, section: Section) -> bool {
        self.header.contains(&section)
    }

    pub fn is_operator(&self, section: Section) -> bool {
        self.operator.contains(&section)
    }

    /// Check a document's top-level keys against this contract.
    ///
    /// Unknown keys are reported first, then legal-but-unsupported ones, then
    /// missing required sections.
    pub fn check(&self, document: &Map<String, Value>, version: i64) -> Result<(), ConfigurationError> {
        if let Some(key) = document.keys().find(|k| Section::from_key(k).is_none()) {
            return Err(ConfigurationError::UnexpectedSection {
                section: key.clone(),
                version,
            });
        }

        for section in Section::ALL {
            if document.contains_key(section.as_str()) && !self.is_possible(section) {
                return Err(ConfigurationError::UnsupportedSection {
                    section,
                    kind: self.kind,
                });
            }
        }

        for &section in self.required {
            if !document.contains_key(section.as_str()) {
                return Err(ConfigurationError::MissingRequiredSection {
                    section,
                    kind: self.kind,
                });
            }
        }

        Ok(())
    }
}
