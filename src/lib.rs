//! runspec library
//!
//! Resolves layered YAML run specifications (experiments, groups, jobs,
//! builds, notebooks, tensorboards) into validated, typed configuration.
//! Exported for the CLI and for integration tests.

pub mod cli;
pub mod error;
pub mod logging;
pub mod schemas;
pub mod sources;
pub mod spec;
pub mod variants;
