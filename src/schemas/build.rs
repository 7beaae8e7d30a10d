//! The `build` section: the image a run executes in.

use crate::error::ConfigurationError;
use crate::spec::Section;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::parse_section;

/// An environment variable as a `[name, value]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar(pub String, pub Value);

/// The `build` section.
///
/// Serializes to its light form: unset and empty fields are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Base image, e.g. `tensorflow/tensorflow:1.4.1-py3`.
    pub image: String,
    /// Shell steps run on top of the image.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVar>,
    /// Repository to build from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Rebuild without the layer cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nocache: Option<bool>,
}

impl BuildConfig {
    pub const FIELDS: &'static [&'static str] = &[
        "image",
        "build_steps",
        "env_vars",
        "git",
        "ref",
        "commit",
        "branch",
        "nocache",
    ];

    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            build_steps: Vec::new(),
            env_vars: Vec::new(),
            git: None,
            git_ref: None,
            commit: None,
            branch: None,
            nocache: None,
        }
    }

    /// Parse a raw mapping, ignoring keys that are not build fields.
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let known: Map<String, Value> = raw
            .iter()
            .filter(|(key, _)| Self::FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        parse_section(Section::Build, &Value::Object(known))
    }

    /// The minimal raw form of this build.
    pub fn to_light_value(&self) -> Value {
        let mut light = Map::new();
        light.insert("image".to_string(), Value::String(self.image.clone()));
        if !self.build_steps.is_empty() {
            light.insert(
                "build_steps".to_string(),
                Value::Array(self.build_steps.iter().cloned().map(Value::String).collect()),
            );
        }
        if !self.env_vars.is_empty() {
            light.insert(
                "env_vars".to_string(),
                Value::Array(
                    self.env_vars
                        .iter()
                        .map(|EnvVar(name, value)| {
                            Value::Array(vec![Value::String(name.clone()), value.clone()])
                        })
                        .collect(),
                ),
            );
        }
        for (key, value) in [
            ("git", &self.git),
            ("ref", &self.git_ref),
            ("commit", &self.commit),
            ("branch", &self.branch),
        ] {
            if let Some(value) = value {
                light.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(nocache) = self.nocache {
            light.insert("nocache".to_string(), Value::Bool(nocache));
        }
        Value::Object(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_is_required() {
        let err = parse_section::<BuildConfig>(Section::Build, &json!({"build_steps": []}))
            .unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn test_env_vars_are_pairs() {
        let build: BuildConfig = serde_json::from_value(json!({
            "image": "python:3",
            "env_vars": [["LC_ALL", "C.UTF-8"], ["WORKERS", 4]],
            "ref": "v1.2",
        }))
        .unwrap();
        assert_eq!(build.env_vars[1], EnvVar("WORKERS".to_string(), json!(4)));
        assert_eq!(build.git_ref.as_deref(), Some("v1.2"));
    }

    #[test]
    fn test_light_form_matches_serialization() {
        let mut build = BuildConfig::new("python:3");
        build.build_steps.push("pip install numpy".to_string());
        build.nocache = Some(true);
        let light = build.to_light_value();
        assert_eq!(
            light,
            json!({"image": "python:3", "build_steps": ["pip install numpy"], "nocache": true})
        );
        assert_eq!(serde_json::to_value(&build).unwrap(), light);
    }

    #[test]
    fn test_from_raw_drops_unknown_keys() {
        let raw = json!({"image": "python:3", "resources": {"cpu": 1}});
        let build = BuildConfig::from_raw(raw.as_object().unwrap()).unwrap();
        assert_eq!(build, BuildConfig::new("python:3"));

        let strict = serde_json::from_value::<BuildConfig>(raw);
        assert!(strict.is_err());
    }
}
