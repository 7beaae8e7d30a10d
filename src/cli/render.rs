//! Render subcommand: print resolved specification sections.

use super::load_specification;
use crate::spec::SpecKind;
use clap::Args;
use serde_json::{Value, json};
use std::path::PathBuf;

/// Arguments for the render subcommand
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Specification kind; read from the document when omitted
    #[arg(short, long, value_name = "KIND")]
    pub kind: Option<SpecKind>,

    /// Print the typed header and config instead of the expanded sections
    #[arg(long)]
    pub config: bool,

    /// Specification files, merged in order
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(args: &RenderArgs) -> anyhow::Result<Value> {
    let spec = load_specification(args.kind, &args.files)?;
    if args.config {
        Ok(json!({
            "header": serde_json::to_value(spec.header())?,
            "config": serde_json::to_value(spec.config())?,
        }))
    } else {
        Ok(Value::Object(spec.parsed_sections().clone()))
    }
}
