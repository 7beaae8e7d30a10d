//! The specification engine.
//!
//! Construction runs the whole pipeline once: merge the sources, validate
//! `version` and `kind`, check the section contract, parse the header,
//! expand operators in operator-bearing sections and build the typed
//! config. Any failure aborts construction; a [`Specification`] that exists
//! is fully resolved and never changes. [`Specification::patch`] builds a
//! new one.

use super::catalog::{Section, SectionContract, SpecKind};
use super::header::{Header, MAX_VERSION, parse_header, validate_version_and_kind};
use super::operators::OperatorResolver;
use crate::error::{ConfigurationError, Result, SpecError, value_kind};
use crate::logging::{LogLevel, LoggingConfig};
use crate::schemas::{
    Backend, BuildConfig, EnvironmentConfig, Framework, HpTuningConfig, RunConfig, SpecConfig,
};
use crate::sources::{Source, read_sources};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Input accepted by [`Specification::read`].
#[derive(Debug, Clone)]
pub enum SpecInput {
    /// An already-resolved specification
    Resolved(Box<Specification>),
    /// Raw sources to merge
    Sources(Vec<Source>),
}

impl From<Specification> for SpecInput {
    fn from(spec: Specification) -> Self {
        SpecInput::Resolved(Box::new(spec))
    }
}

impl From<Vec<Source>> for SpecInput {
    fn from(sources: Vec<Source>) -> Self {
        SpecInput::Sources(sources)
    }
}

impl From<Source> for SpecInput {
    fn from(source: Source) -> Self {
        SpecInput::Sources(vec![source])
    }
}

impl From<Value> for SpecInput {
    fn from(value: Value) -> Self {
        SpecInput::Sources(vec![Source::Value(value)])
    }
}

/// Input accepted by the build-specification constructors.
#[derive(Debug, Clone)]
pub enum BuildInput {
    Config(BuildConfig),
    /// A raw mapping; keys that are not build fields are dropped.
    Raw(Value),
}

impl From<BuildConfig> for BuildInput {
    fn from(config: BuildConfig) -> Self {
        BuildInput::Config(config)
    }
}

impl From<Value> for BuildInput {
    fn from(value: Value) -> Self {
        BuildInput::Raw(value)
    }
}

/// A resolved, validated specification bound to one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    sources: Vec<Source>,
    data: Map<String, Value>,
    header: Header,
    parsed_sections: Map<String, Value>,
    config: SpecConfig,
}

impl Specification {
    /// Merge `sources` and resolve them as a `kind` specification.
    pub fn new(kind: SpecKind, sources: impl IntoIterator<Item = Source>) -> Result<Self> {
        let sources: Vec<Source> = sources.into_iter().collect();

        let data = read_sources(&sources)?;
        debug!(%kind, sources = sources.len(), "Merged specification sources");

        let (version, kind) = validate_version_and_kind(&data, kind)?;
        let contract = kind.contract();
        contract.check(&data, version)?;
        debug!(%kind, version, "Specification shape validated");

        let header = parse_header(&data, contract, version, kind)?;
        let parsed_sections = parse_sections(&data, contract)?;
        let config = SpecConfig::from_sections(&parsed_sections)?;
        debug!(%kind, sections = parsed_sections.len(), "Specification resolved");

        Ok(Self {
            sources,
            data,
            header,
            parsed_sections,
            config,
        })
    }

    /// Resolve a single in-memory document.
    pub fn from_value(kind: SpecKind, value: Value) -> Result<Self> {
        Self::new(kind, [Source::Value(value)])
    }

    /// Resolve `input` as a `kind` specification.
    ///
    /// A resolved specification of the same kind is returned as is; one of
    /// another kind goes through the pipeline again from its merged document.
    pub fn read(kind: SpecKind, input: impl Into<SpecInput>) -> Result<Self> {
        match input.into() {
            SpecInput::Resolved(spec) if spec.kind() == kind => Ok(*spec),
            SpecInput::Resolved(spec) => Self::from_value(kind, Value::Object(spec.data)),
            SpecInput::Sources(sources) => Self::new(kind, sources),
        }
    }

    /// A new specification from this one's merged document with `extra`
    /// sources merged on top. `self` is left untouched.
    pub fn patch(&self, extra: impl IntoIterator<Item = Source>) -> Result<Self> {
        let mut sources = vec![Source::Value(Value::Object(self.data.clone()))];
        sources.extend(extra);
        debug!(kind = %self.kind(), extra = sources.len() - 1, "Patching specification");
        Self::new(self.kind(), sources)
    }

    /// Minimal `{version, kind: build, build}` document for a build config.
    pub fn create_specification_document(
        input: impl Into<BuildInput>,
    ) -> Result<Map<String, Value>> {
        let build = match input.into() {
            BuildInput::Config(config) => config.to_light_value(),
            BuildInput::Raw(Value::Object(raw)) => BuildConfig::from_raw(&raw)?.to_light_value(),
            BuildInput::Raw(other) => {
                return Err(ConfigurationError::InvalidBuildInput {
                    found: value_kind(&other),
                }
                .into());
            }
        };

        let mut document = Map::new();
        document.insert(Section::Version.to_string(), Value::from(MAX_VERSION));
        document.insert(
            Section::Kind.to_string(),
            Value::String(SpecKind::Build.to_string()),
        );
        document.insert(Section::Build.to_string(), build);
        Ok(document)
    }

    /// Resolved build specification for a build config.
    pub fn create_specification(input: impl Into<BuildInput>) -> Result<Self> {
        let document = Self::create_specification_document(input)?;
        Self::from_value(SpecKind::Build, Value::Object(document))
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> i64 {
        self.header.version
    }

    pub fn kind(&self) -> SpecKind {
        self.header.kind
    }

    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        self.header.tags.as_ref()
    }

    pub fn logging(&self) -> Option<&LoggingConfig> {
        self.header.logging.as_ref()
    }

    pub fn log_level(&self) -> LogLevel {
        self.header.log_level()
    }

    pub fn backend(&self) -> Option<Backend> {
        self.header.backend
    }

    pub fn framework(&self) -> Option<Framework> {
        self.header.framework
    }

    /// The merged document, before operator expansion.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The merged document as JSON text.
    pub fn raw_data(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }

    /// Every section with its operators expanded.
    pub fn parsed_sections(&self) -> &Map<String, Value> {
        &self.parsed_sections
    }

    pub fn config(&self) -> &SpecConfig {
        &self.config
    }

    pub fn environment(&self) -> Option<&EnvironmentConfig> {
        self.config.environment.as_ref()
    }

    pub fn declarations(&self) -> Option<&Map<String, Value>> {
        self.config.declarations.as_ref()
    }

    pub fn hptuning(&self) -> Option<&HpTuningConfig> {
        self.config.hptuning.as_ref()
    }

    pub fn build(&self) -> Option<&BuildConfig> {
        self.config.build.as_ref()
    }

    pub fn run(&self) -> Option<&RunConfig> {
        self.config.run.as_ref()
    }

    pub fn is_experiment(&self) -> bool {
        self.kind() == SpecKind::Experiment
    }

    pub fn is_group(&self) -> bool {
        self.kind() == SpecKind::Group
    }

    pub fn is_job(&self) -> bool {
        self.kind() == SpecKind::Job
    }

    pub fn is_notebook(&self) -> bool {
        self.kind() == SpecKind::Notebook
    }

    pub fn is_tensorboard(&self) -> bool {
        self.kind() == SpecKind::Tensorboard
    }

    pub fn is_build(&self) -> bool {
        self.kind() == SpecKind::Build
    }
}

/// Copy every section, expanding operators where the contract allows them.
fn parse_sections(
    data: &Map<String, Value>,
    contract: &SectionContract,
) -> Result<Map<String, Value>> {
    let resolver = OperatorResolver::new(data);
    let mut parsed = Map::new();
    for (key, value) in data {
        let resolved = match Section::from_key(key) {
            Some(section) if contract.is_operator(section) => resolver
                .resolve_section(value)
                .map_err(|e| SpecError::from(e).in_section(section))?,
            _ => value.clone(),
        };
        parsed.insert(key.clone(), resolved);
    }
    Ok(parsed)
}
