//! Check subcommand: resolve specification files and summarize them.

use super::load_specification;
use crate::logging::LogLevel;
use crate::schemas::{Backend, Framework};
use crate::spec::{SpecKind, Specification};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Arguments for the check subcommand
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Specification kind; read from the document when omitted
    #[arg(short, long, value_name = "KIND")]
    pub kind: Option<SpecKind>,

    /// Specification files, merged in order
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

/// What `check` reports for a resolved specification.
#[derive(Debug, Serialize)]
pub struct CheckSummary {
    pub kind: SpecKind,
    pub version: i64,
    pub sections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
    pub log_level: LogLevel,
    /// Experiments a group specification schedules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiments: Option<usize>,
}

impl CheckSummary {
    pub fn new(spec: &Specification) -> Self {
        Self {
            kind: spec.kind(),
            version: spec.version(),
            sections: spec.data().keys().cloned().collect(),
            tags: spec.tags().map(|tags| tags.iter().cloned().collect()),
            backend: spec.backend(),
            framework: spec.framework(),
            log_level: spec.log_level(),
            experiments: spec.hptuning().map(|h| match &h.random_search {
                Some(random) => random.n_experiments,
                None => h.suggestion_count(),
            }),
        }
    }
}

pub fn run(args: &CheckArgs) -> anyhow::Result<Value> {
    let spec = load_specification(args.kind, &args.files)?;
    Ok(serde_json::to_value(CheckSummary::new(&spec))?)
}
