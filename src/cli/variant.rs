//! Variant subcommand: resolve a variant selection against a built-in family.

use crate::error::SpecError;
use crate::sources::Source;
use crate::variants::VariantRegistry;
use clap::Args;
use serde_json::{Value, json};

/// Arguments for the variant subcommand
#[derive(Args, Debug)]
pub struct VariantArgs {
    /// Variant family: loss or optimizer
    #[arg(value_name = "FAMILY")]
    pub family: String,

    /// Selection as YAML, e.g. `HingeLoss` or `{HuberLoss: {clip: 0.2}}`
    #[arg(value_name = "VALUE")]
    pub value: String,
}

pub fn run(args: &VariantArgs) -> anyhow::Result<Value> {
    let raw = Source::text(args.value.as_str())
        .load()
        .map_err(SpecError::from)?;
    let registry = VariantRegistry::builtin();
    let instance = registry
        .resolve(&args.family, &raw)
        .map_err(SpecError::from)?;
    let minimal = registry
        .reduce(&args.family, &instance)
        .map_err(SpecError::from)?;
    Ok(json!({
        "family": args.family,
        "identifier": instance.identifier,
        "fields": instance.fields,
        "minimal": minimal,
    }))
}
