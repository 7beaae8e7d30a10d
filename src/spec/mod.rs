//! Specification resolution.
//!
//! - [`catalog`]: kinds, sections and the per-kind section contracts
//! - [`header`]: version and kind validation, typed header sections
//! - [`operators`]: `for` / `if` expansion and `{{ ref }}` templates
//! - `engine`: the [`Specification`] pipeline tying them together

pub mod catalog;
mod engine;
pub mod header;
pub mod operators;

pub use catalog::{Section, SectionContract, SpecKind};
pub use engine::{BuildInput, SpecInput, Specification};
pub use header::{Header, MAX_VERSION, MIN_VERSION};
pub use operators::{OperatorNode, OperatorResolver, contains_operators};
