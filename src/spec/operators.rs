//! `for` / `if` operators and `{{ ref }}` templates.
//!
//! Operator-bearing sections may contain, wherever a value is expected:
//!
//! ```yaml
//! build_steps:
//!   - for: pkg
//!     in: extra_packages
//!     do: "pip install {{ pkg }}"
//!   - if: use_gpu
//!     do: pip install cupy
//!     else: pip install numpy
//! ```
//!
//! References are dotted paths looked up in loop bindings (innermost first),
//! then `declarations`, then the top-level sections of the merged document.
//! Only operator-free data can be referenced, so expansion always terminates.

use crate::error::{OperatorError, value_kind};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::trace;

const FOR: &str = "for";
const IN: &str = "in";
const DO: &str = "do";
const IF: &str = "if";
const ELSE: &str = "else";
const DECLARATIONS: &str = "declarations";

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
        .expect("valid template pattern")
});

static WHOLE_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}\s*$")
        .expect("valid template pattern")
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*$").expect("valid reference pattern")
});

static BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid binding pattern"));

/// An operator found in place of a plain value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorNode<'a> {
    /// Yields `body` once per element of `iterable`, with the element bound to `binding`.
    For {
        binding: &'a str,
        iterable: &'a Value,
        body: &'a Value,
    },
    /// Yields `then_body` when `condition` holds, else `else_body` (or nothing).
    If {
        condition: &'a Value,
        then_body: &'a Value,
        else_body: Option<&'a Value>,
    },
}

impl<'a> OperatorNode<'a> {
    /// Recognize an operator mapping. Plain values return `Ok(None)`.
    pub fn parse(value: &'a Value) -> Result<Option<Self>, OperatorError> {
        let Value::Object(map) = value else {
            return Ok(None);
        };

        if map.contains_key(FOR) {
            check_keys(map, FOR, &[FOR, IN, DO], &[FOR, IN, DO])?;
            let binding = match &map[FOR] {
                Value::String(name) if BINDING.is_match(name) => name.as_str(),
                other => {
                    return Err(OperatorError::malformed(format!(
                        "`for` must name a binding, found {}",
                        other
                    )));
                }
            };
            Ok(Some(OperatorNode::For {
                binding,
                iterable: &map[IN],
                body: &map[DO],
            }))
        } else if map.contains_key(IF) {
            check_keys(map, IF, &[IF, DO, ELSE], &[IF, DO])?;
            Ok(Some(OperatorNode::If {
                condition: &map[IF],
                then_body: &map[DO],
                else_body: map.get(ELSE),
            }))
        } else {
            Ok(None)
        }
    }
}

fn check_keys(
    map: &Map<String, Value>,
    operator: &str,
    allowed: &[&str],
    required: &[&str],
) -> Result<(), OperatorError> {
    if let Some(key) = map.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(OperatorError::malformed(format!(
            "unexpected key `{}` in `{}` operator; allowed keys are: {}",
            key,
            operator,
            allowed.join(", ")
        )));
    }
    if let Some(key) = required.iter().find(|k| !map.contains_key(**k)) {
        return Err(OperatorError::malformed(format!(
            "`{}` operator is missing `{}`",
            operator, key
        )));
    }
    Ok(())
}

/// Whether a value still holds operator mappings anywhere inside it.
pub fn contains_operators(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(FOR) || map.contains_key(IF) || map.values().any(contains_operators)
        }
        Value::Array(items) => items.iter().any(contains_operators),
        _ => false,
    }
}

/// Loop bindings, innermost first.
struct Scope<'p> {
    name: &'p str,
    value: Value,
    parent: Option<&'p Scope<'p>>,
}

impl Scope<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.name == name {
                return Some(&current.value);
            }
            scope = current.parent;
        }
        None
    }
}

/// Expands operators against a merged, read-only document.
#[derive(Debug, Clone, Copy)]
pub struct OperatorResolver<'d> {
    document: &'d Map<String, Value>,
}

impl<'d> OperatorResolver<'d> {
    pub fn new(document: &'d Map<String, Value>) -> Self {
        Self { document }
    }

    /// Resolve a whole section value into its operator-free form.
    ///
    /// A root `if` that yields nothing resolves to `null`.
    pub fn resolve_section(&self, value: &Value) -> Result<Value, OperatorError> {
        Ok(self.resolve_slot(value, None)?.unwrap_or(Value::Null))
    }

    /// The plain values a value yields, in textual order.
    ///
    /// A plain value yields itself (rendered); an operator yields zero or
    /// more values.
    pub fn expand(&self, value: &Value) -> Result<Vec<Value>, OperatorError> {
        self.expand_in(value, None)
    }

    fn expand_in(&self, value: &Value, scope: Option<&Scope<'_>>) -> Result<Vec<Value>, OperatorError> {
        match OperatorNode::parse(value)? {
            Some(node) => self.expand_node(node, scope),
            None => Ok(vec![self.resolve_plain(value, scope)?]),
        }
    }

    fn expand_node(
        &self,
        node: OperatorNode<'_>,
        scope: Option<&Scope<'_>>,
    ) -> Result<Vec<Value>, OperatorError> {
        match node {
            OperatorNode::For {
                binding,
                iterable,
                body,
            } => {
                let items = self.iterable(iterable, scope)?;
                trace!(binding, count = items.len(), "Expanding for operator");
                let mut yields = Vec::new();
                for item in items {
                    let child = Scope {
                        name: binding,
                        value: item,
                        parent: scope,
                    };
                    yields.extend(self.expand_in(body, Some(&child))?);
                }
                Ok(yields)
            }
            OperatorNode::If {
                condition,
                then_body,
                else_body,
            } => {
                let holds = self.condition(condition, scope)?;
                trace!(holds, "Evaluating if operator");
                let branch = if holds { Some(then_body) } else { else_body };
                match branch {
                    Some(body) => self.expand_in(body, scope),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    /// Resolve a value sitting in a mapping slot or at a section root.
    ///
    /// `for` becomes a sequence. `if` becomes its single yield, a sequence
    /// when it yields several, or `None` when it yields nothing.
    fn resolve_slot(
        &self,
        value: &Value,
        scope: Option<&Scope<'_>>,
    ) -> Result<Option<Value>, OperatorError> {
        match OperatorNode::parse(value)? {
            Some(node @ OperatorNode::For { .. }) => {
                Ok(Some(Value::Array(self.expand_node(node, scope)?)))
            }
            Some(node @ OperatorNode::If { .. }) => {
                let mut yields = self.expand_node(node, scope)?;
                Ok(match yields.len() {
                    0 => None,
                    1 => yields.pop(),
                    _ => Some(Value::Array(yields)),
                })
            }
            None => self.resolve_plain(value, scope).map(Some),
        }
    }

    fn resolve_plain(&self, value: &Value, scope: Option<&Scope<'_>>) -> Result<Value, OperatorError> {
        match value {
            Value::String(text) => self.render(text, scope),
            Value::Array(items) => {
                // Operators inside a sequence splice their yields in place.
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.extend(self.expand_in(item, scope)?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = Map::new();
                for (key, value) in map {
                    if let Some(value) = self.resolve_slot(value, scope)? {
                        resolved.insert(key.clone(), value);
                    }
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn iterable(&self, value: &Value, scope: Option<&Scope<'_>>) -> Result<Vec<Value>, OperatorError> {
        let (reference, resolved) = match value {
            Value::String(text) => {
                let path = reference_path(text);
                (path.to_string(), self.lookup(path, scope)?)
            }
            Value::Array(_) => (value.to_string(), self.resolve_plain(value, scope)?),
            other => (other.to_string(), other.clone()),
        };
        match resolved {
            Value::Array(items) => Ok(items),
            other => Err(OperatorError::Type {
                reference,
                expected: "a sequence",
                actual: value_kind(&other),
            }),
        }
    }

    fn condition(&self, value: &Value, scope: Option<&Scope<'_>>) -> Result<bool, OperatorError> {
        let (reference, resolved) = match value {
            Value::String(text) => {
                let path = reference_path(text);
                (path.to_string(), self.lookup(path, scope)?)
            }
            other => (other.to_string(), other.clone()),
        };
        truthy(&resolved).ok_or_else(|| OperatorError::Type {
            reference,
            expected: "a boolean-like scalar",
            actual: value_kind(&resolved),
        })
    }

    fn lookup(&self, path: &str, scope: Option<&Scope<'_>>) -> Result<Value, OperatorError> {
        if !REFERENCE.is_match(path) {
            return Err(OperatorError::Reference {
                reference: path.to_string(),
                reason: "is not a valid reference".to_string(),
            });
        }

        let mut segments = path.split('.');
        let Some(head) = segments.next() else {
            return Err(OperatorError::unresolved(path));
        };
        let root = scope
            .and_then(|scope| scope.get(head))
            .or_else(|| {
                self.document
                    .get(DECLARATIONS)
                    .and_then(|declarations| declarations.get(head))
            })
            .or_else(|| self.document.get(head))
            .ok_or_else(|| OperatorError::unresolved(path))?;

        let mut current = root;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| OperatorError::unresolved(path))?;
        }

        if contains_operators(current) {
            return Err(OperatorError::Reference {
                reference: path.to_string(),
                reason: "points at a value that still contains operators".to_string(),
            });
        }
        Ok(current.clone())
    }

    /// Render `{{ ref }}` templates in a string.
    ///
    /// A string that is exactly one template takes the referenced value as is.
    fn render(&self, text: &str, scope: Option<&Scope<'_>>) -> Result<Value, OperatorError> {
        if !text.contains("{{") {
            return Ok(Value::String(text.to_string()));
        }
        if let Some(captures) = WHOLE_TEMPLATE.captures(text) {
            return self.lookup(&captures[1], scope);
        }

        let mut rendered = String::with_capacity(text.len());
        let mut last = 0;
        for captures in TEMPLATE.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            rendered.push_str(literal(&text[last..whole.start()])?);
            match self.lookup(&captures[1], scope)? {
                Value::String(s) => rendered.push_str(&s),
                other => rendered.push_str(&other.to_string()),
            }
            last = whole.end();
        }
        rendered.push_str(literal(&text[last..])?);
        Ok(Value::String(rendered))
    }
}

/// Text between templates; a stray `{{` means a marker that is not a reference.
fn literal(text: &str) -> Result<&str, OperatorError> {
    let Some(start) = text.find("{{") else {
        return Ok(text);
    };
    let marker = &text[start..];
    let marker = match marker.find("}}") {
        Some(end) => &marker[..end + 2],
        None => marker,
    };
    Err(OperatorError::Reference {
        reference: marker.to_string(),
        reason: "is not a valid reference".to_string(),
    })
}

/// Strip an optional `{{ }}` wrapper from a reference.
fn reference_path(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i != 0)
            .or_else(|| n.as_u64().map(|u| u != 0)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
