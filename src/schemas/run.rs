//! The `run` section: the command plus optional loss and optimizer selections.

use crate::error::{ConfigurationError, SpecError, value_kind};
use crate::spec::Section;
use crate::variants::{Loss, Optimizer, losses, optimizers};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_section;

/// A command line or a list of steps run in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Line(String),
    Steps(Vec<String>),
}

impl Command {
    pub fn steps(&self) -> Vec<&str> {
        match self {
            Command::Line(line) => vec![line.as_str()],
            Command::Steps(steps) => steps.iter().map(String::as_str).collect(),
        }
    }
}

/// The `run` section.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss: Option<Loss>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<Optimizer>,
}

impl RunConfig {
    const FIELDS: &'static [&'static str] = &["cmd", "loss", "optimizer"];

    /// Parse an operator-free `run` value.
    ///
    /// `loss` and `optimizer` go through their variant families so dispatch
    /// failures surface as variant errors rather than section errors.
    pub fn from_value(value: &Value) -> Result<Option<Self>, SpecError> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) => map,
            other => {
                return Err(invalid(format!("expected a mapping, found {}", value_kind(other))).into());
            }
        };
        if let Some(key) = map.keys().find(|k| !Self::FIELDS.contains(&k.as_str())) {
            return Err(invalid(format!(
                "unknown field `{}`, expected one of: {}",
                key,
                Self::FIELDS.join(", ")
            ))
            .into());
        }

        let cmd = match map.get("cmd") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_section(Section::Run, value)?),
        };
        let loss = match map.get("loss") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(losses::family().make(raw)?),
        };
        let optimizer = match map.get("optimizer") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(optimizers::family().make(raw)?),
        };

        Ok(Some(RunConfig {
            cmd,
            loss,
            optimizer,
        }))
    }
}

fn invalid(message: String) -> ConfigurationError {
    ConfigurationError::InvalidSection {
        section: Section::Run,
        message,
    }
}
