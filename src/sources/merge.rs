//! Merge of specification documents.
//!
//! Later sources win per top-level key: a section from a later source
//! replaces the earlier section wholesale, nested mappings included. An
//! explicit `null` clears the section.

use serde_json::{Map, Value};

/// Merge `overlay` into `base` at top-level granularity.
///
/// - Each key in overlay replaces the same key in base entirely
/// - A `null` in overlay removes the key from base
/// - Keys keep the position they first appeared at
///
/// # Example
/// ```
/// use serde_json::{Map, json};
/// use runspec::sources::merge_document;
///
/// let mut base: Map<String, serde_json::Value> = serde_json::from_value(json!({
///     "build": { "image": "python:3", "nocache": true },
///     "tags": ["a", "b"]
/// })).unwrap();
/// let overlay = serde_json::from_value(json!({
///     "build": { "image": "python:3.11" },
///     "tags": null
/// })).unwrap();
/// merge_document(&mut base, overlay);
/// assert_eq!(serde_json::Value::Object(base), json!({ "build": { "image": "python:3.11" } }));
/// ```
pub fn merge_document(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        if value.is_null() {
            base.shift_remove(&key);
        } else if let Some(slot) = base.get_mut(&key) {
            *slot = value;
        } else {
            base.insert(key, value);
        }
    }
}

/// Merge documents in order, with later documents taking precedence.
pub fn merge_documents(documents: impl IntoIterator<Item = Map<String, Value>>) -> Map<String, Value> {
    documents.into_iter().fold(Map::new(), |mut merged, document| {
        merge_document(&mut merged, document);
        merged
    })
}
