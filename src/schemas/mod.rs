//! Typed section configs.
//!
//! Each section of a resolved document is parsed into one of these types.
//! Header sections (`backend`, `framework`) live here too; `logging` is in
//! [`crate::logging`].

mod build;
mod environment;
mod hptuning;
mod run;

pub use build::{BuildConfig, EnvVar};
pub use environment::{
    EnvironmentConfig, K8sResources, OutputsConfig, PersistenceConfig, ResourcesConfig,
};
pub use hptuning::{
    EarlyStoppingMetric, GridSearchConfig, HpTuningConfig, MatrixConfig, Optimization,
    RandomSearchConfig,
};
pub use run::{Command, RunConfig};

use crate::error::{ConfigurationError, SpecError, value_kind};
use crate::spec::Section;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Deserialize a section value, reporting failures against the section.
pub fn parse_section<T: DeserializeOwned>(
    section: Section,
    value: &Value,
) -> Result<T, ConfigurationError> {
    serde_json::from_value(value.clone()).map_err(|e| ConfigurationError::InvalidSection {
        section,
        message: e.to_string(),
    })
}

/// Execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Native,
    Other,
}

/// Training framework for experiments and groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Tensorflow,
    Pytorch,
    Mxnet,
    Horovod,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Framework::Tensorflow => "tensorflow",
            Framework::Pytorch => "pytorch",
            Framework::Mxnet => "mxnet",
            Framework::Horovod => "horovod",
        };
        write!(f, "{}", name)
    }
}

/// Composite config built from a specification's parsed sections.
///
/// Header sections are not repeated here; they live on the `Header`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SpecConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declarations: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hptuning: Option<HpTuningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,
}

impl SpecConfig {
    /// Build the config from operator-free section values.
    ///
    /// Takes its own copy of every value; `sections` is left untouched.
    pub fn from_sections(sections: &Map<String, Value>) -> Result<Self, SpecError> {
        let mut config = SpecConfig::default();
        for (key, value) in sections {
            let Some(section) = Section::from_key(key) else {
                continue;
            };
            match section {
                Section::Environment => config.environment = parse_section(section, value)?,
                Section::Declarations => config.declarations = parse_declarations(value)?,
                Section::Hptuning => config.hptuning = parse_hptuning(value)?,
                Section::Build => config.build = parse_section(section, value)?,
                Section::Run => config.run = RunConfig::from_value(value)?,
                _ => {}
            }
        }
        Ok(config)
    }
}

fn parse_declarations(value: &Value) -> Result<Option<Map<String, Value>>, ConfigurationError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.clone())),
        other => Err(ConfigurationError::InvalidSection {
            section: Section::Declarations,
            message: format!("expected a mapping, found {}", value_kind(other)),
        }),
    }
}

fn parse_hptuning(value: &Value) -> Result<Option<HpTuningConfig>, ConfigurationError> {
    let config: Option<HpTuningConfig> = parse_section(Section::Hptuning, value)?;
    if let Some(config) = &config {
        config
            .validate()
            .map_err(|message| ConfigurationError::InvalidSection {
                section: Section::Hptuning,
                message,
            })?;
    }
    Ok(config)
}
