//! Document sources: the merge step in front of the specification engine.
//!
//! Sources are files, text or in-memory values. They are loaded in order and
//! merged per top-level key: a later source's section replaces the earlier
//! one wholesale, and an explicit `null` clears it.

mod loader;
mod merge;

pub use loader::{Source, read_sources};
pub use merge::{merge_document, merge_documents};
