//! CLI command definitions for runspec
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.
//! Every command produces a JSON value that `main` prints in the selected
//! [`OutputFormat`].

pub mod build;
pub mod check;
pub mod render;
pub mod variant;

use crate::error::{Diagnostic, Result};
use crate::logging::LogTarget;
use crate::sources::{Source, read_sources};
use crate::spec::{SpecKind, Specification};
use build::BuildSpecArgs;
use check::CheckArgs;
use clap::{Parser, Subcommand};
use render::RenderArgs;
use serde::Serialize;
use std::path::PathBuf;
use variant::VariantArgs;

/// Resolve and validate ML run specification files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    /// Output format: yaml (default) or json; also applies to errors
    #[arg(short, long, default_value = "yaml", global = true, value_name = "FORMAT")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve specification files and print a summary
    Check(CheckArgs),

    /// Print the resolved sections (or the typed config) of specification files
    Render(RenderArgs),

    /// Derive a minimal build specification from a build section
    BuildSpec(BuildSpecArgs),

    /// Resolve a loss or optimizer selection
    Variant(VariantArgs),
}

impl Command {
    /// Run the command, producing the value to print.
    ///
    /// Resolution failures come back as a [`crate::error::SpecError`] inside
    /// the `anyhow` error.
    pub fn run(&self) -> anyhow::Result<serde_json::Value> {
        match self {
            Command::Check(args) => check::run(args),
            Command::Render(args) => render::run(args),
            Command::BuildSpec(args) => build::run(args),
            Command::Variant(args) => variant::run(args),
        }
    }
}

/// Output format for results and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format '{}'. Valid options: yaml, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl OutputFormat {
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(value)?),
        })
    }

    /// Errors print as plain text in yaml mode and as an object in json mode.
    pub fn render_diagnostic(&self, diagnostic: &Diagnostic) -> anyhow::Result<String> {
        Ok(match self {
            OutputFormat::Yaml => match &diagnostic.section {
                Some(section) => format!("error[{}]: {}\n", section, diagnostic),
                None => format!("error: {}\n", diagnostic),
            },
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(diagnostic)?),
        })
    }
}

/// Merge `files` in order and resolve them.
///
/// Without an explicit kind, the kind declared by the merged document is used.
pub fn load_specification(kind: Option<SpecKind>, files: &[PathBuf]) -> Result<Specification> {
    let sources: Vec<Source> = files.iter().map(Source::path).collect();
    let kind = match kind {
        Some(kind) => kind,
        None => SpecKind::detect(&read_sources(&sources)?)?,
    };
    Specification::new(kind, sources)
}
