//! Discriminated-variant dispatch.
//!
//! A section value may select one member of a closed family of typed configs
//! either by bare name or by a single-key mapping of name to parameters:
//!
//! ```yaml
//! loss: HingeLoss
//! loss:
//!   HuberLoss:
//!     clip: 0.2
//! ```
//!
//! A [`VariantFamily`] maps identifiers to [`VariantDescriptor`]s (declared
//! fields, defaults, reduced set and a builder). Resolution validates the
//! parameters against the descriptor and yields a [`VariantInstance`], which
//! the builder turns into the family's sum type. [`VariantFamily::unmake`]
//! goes the other way and produces the minimal raw form.
//!
//! Families are independent: adding one means declaring descriptors, not
//! touching the dispatch code here.

pub mod losses;
pub mod optimizers;
mod registry;

pub use losses::{Loss, LossOptions};
pub use optimizers::{Optimizer, OptimizerOptions};
pub use registry::{ResolveVariant, VariantRegistry};

use crate::error::{VariantError, value_kind};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt;

/// Type of a declared variant field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any number
    Float,
    Int,
    Bool,
    Str,
    /// A layer name, or `[layer, node_index, tensor_index]`
    Tensor,
}

impl FieldKind {
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Float => "a float",
            FieldKind::Int => "an integer",
            FieldKind::Bool => "a boolean",
            FieldKind::Str => "a string",
            FieldKind::Tensor => "a tensor reference",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Float => value.is_number(),
            FieldKind::Int => value.is_i64() || value.is_u64(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Str => value.is_string(),
            FieldKind::Tensor => TensorRef::from_value(value).is_some(),
        }
    }
}

/// One declared field of a variant.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// `None` means the field is required.
    pub default: Option<Value>,
    /// Reduced fields are dropped from the raw form when unset or default.
    pub reduced: bool,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            reduced: false,
        }
    }

    /// A field that defaults to `null`.
    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            default: Some(Value::Null),
            reduced: false,
        }
    }

    pub fn with_default(name: &'static str, kind: FieldKind, default: impl Into<Value>) -> Self {
        Self {
            name,
            kind,
            default: Some(default.into()),
            reduced: false,
        }
    }

    pub fn reduced(mut self) -> Self {
        self.reduced = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.default, Some(Value::Null))
    }

    pub fn is_default(&self, value: &Value) -> bool {
        self.default
            .as_ref()
            .is_some_and(|default| same_value(default, value))
    }

    fn check(&self, identifier: &str, value: &Value) -> Result<(), VariantError> {
        if (value.is_null() && self.is_nullable()) || self.kind.accepts(value) {
            return Ok(());
        }
        Err(VariantError::FieldType {
            identifier: identifier.to_string(),
            field: self.name.to_string(),
            expected: self.kind.describe(),
            actual: value_kind(value),
        })
    }
}

/// Numbers compare by value so that `1` and `1.0` are the same default.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Builds the family's typed value from a validated instance.
pub type Builder<T> = fn(&VariantInstance) -> Result<T, VariantError>;

/// Declaration of one member of a variant family.
pub struct VariantDescriptor<T> {
    pub identifier: &'static str,
    pub fields: Vec<FieldSpec>,
    pub build: Builder<T>,
}

impl<T> VariantDescriptor<T> {
    pub fn new(identifier: &'static str, fields: Vec<FieldSpec>, build: Builder<T>) -> Self {
        Self {
            identifier,
            fields,
            build,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared defaults; required fields are left out.
    pub fn field_defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|f| f.default.clone().map(|d| (f.name.to_string(), d)))
            .collect()
    }
}

impl<T> fmt::Debug for VariantDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantDescriptor")
            .field("identifier", &self.identifier)
            .field("fields", &self.fields)
            .finish()
    }
}

/// A resolved selection: identifier plus every declared field, explicit or defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantInstance {
    pub identifier: String,
    pub fields: Map<String, Value>,
}

impl VariantInstance {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    fn value(&self, field: &str) -> Result<&Value, VariantError> {
        self.fields
            .get(field)
            .ok_or_else(|| VariantError::MissingRequiredField {
                identifier: self.identifier.clone(),
                field: field.to_string(),
            })
    }

    fn type_error(&self, field: &str, kind: FieldKind, value: &Value) -> VariantError {
        VariantError::FieldType {
            identifier: self.identifier.clone(),
            field: field.to_string(),
            expected: kind.describe(),
            actual: value_kind(value),
        }
    }

    pub fn f64(&self, field: &str) -> Result<f64, VariantError> {
        let value = self.value(field)?;
        value
            .as_f64()
            .ok_or_else(|| self.type_error(field, FieldKind::Float, value))
    }

    pub fn i64(&self, field: &str) -> Result<i64, VariantError> {
        let value = self.value(field)?;
        value
            .as_i64()
            .ok_or_else(|| self.type_error(field, FieldKind::Int, value))
    }

    pub fn bool(&self, field: &str) -> Result<bool, VariantError> {
        let value = self.value(field)?;
        value
            .as_bool()
            .ok_or_else(|| self.type_error(field, FieldKind::Bool, value))
    }

    pub fn opt_str(&self, field: &str) -> Result<Option<String>, VariantError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.type_error(field, FieldKind::Str, other)),
        }
    }

    pub fn opt_tensor(&self, field: &str) -> Result<Option<TensorRef>, VariantError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => TensorRef::from_value(value)
                .map(Some)
                .ok_or_else(|| self.type_error(field, FieldKind::Tensor, value)),
        }
    }
}

/// Reference to a layer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorRef {
    Name(String),
    Output {
        layer: String,
        node_index: i64,
        tensor_index: i64,
    },
}

impl TensorRef {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(TensorRef::Name(name.clone())),
            Value::Array(items) => match items.as_slice() {
                [Value::String(layer), node, tensor] => Some(TensorRef::Output {
                    layer: layer.clone(),
                    node_index: node.as_i64()?,
                    tensor_index: tensor.as_i64()?,
                }),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TensorRef::Name(name) => Value::String(name.clone()),
            TensorRef::Output {
                layer,
                node_index,
                tensor_index,
            } => json!([layer, node_index, tensor_index]),
        }
    }
}

/// A typed family member that can be turned back into raw fields.
pub trait Variant {
    fn identifier(&self) -> &'static str;
    fn to_fields(&self) -> Map<String, Value>;
}

/// Identifier → descriptor table for one family of variants.
pub struct VariantFamily<T> {
    name: &'static str,
    descriptors: Vec<VariantDescriptor<T>>,
}

impl<T> VariantFamily<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            descriptors: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a member. Identifiers are unique and case-sensitive.
    pub fn register(&mut self, descriptor: VariantDescriptor<T>) -> Result<(), VariantError> {
        if self.descriptor(descriptor.identifier).is_some() {
            return Err(VariantError::DuplicateVariant {
                family: self.name.to_string(),
                identifier: descriptor.identifier.to_string(),
            });
        }
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn with(mut self, descriptor: VariantDescriptor<T>) -> Result<Self, VariantError> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Identifiers in registration order.
    pub fn identifiers(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.identifier).collect()
    }

    pub fn descriptor(&self, identifier: &str) -> Option<&VariantDescriptor<T>> {
        self.descriptors.iter().find(|d| d.identifier == identifier)
    }

    fn invalid_selector(&self, message: impl Into<String>) -> VariantError {
        VariantError::InvalidSelector {
            family: self.name.to_string(),
            message: message.into(),
        }
    }

    /// Validate a raw selection and fill in defaults.
    pub fn resolve(&self, raw: &Value) -> Result<VariantInstance, VariantError> {
        let empty = Map::new();
        let (identifier, params) = match raw {
            Value::String(identifier) => (identifier.as_str(), &empty),
            Value::Object(selection) => {
                if selection.len() > 1 {
                    return Err(VariantError::MultipleVariantSelectors {
                        family: self.name.to_string(),
                        selectors: selection.keys().cloned().collect(),
                    });
                }
                let Some((identifier, params)) = selection.iter().next() else {
                    return Err(self.invalid_selector("the selection mapping is empty"));
                };
                match params {
                    Value::Object(params) => (identifier.as_str(), params),
                    Value::Null => (identifier.as_str(), &empty),
                    other => {
                        return Err(self.invalid_selector(format!(
                            "parameters of `{}` must be a mapping, found {}",
                            identifier,
                            value_kind(other)
                        )));
                    }
                }
            }
            other => {
                return Err(self.invalid_selector(format!(
                    "expected a name or a single-key mapping, found {}",
                    value_kind(other)
                )));
            }
        };

        let descriptor =
            self.descriptor(identifier)
                .ok_or_else(|| VariantError::UnknownVariant {
                    family: self.name.to_string(),
                    identifier: identifier.to_string(),
                    known: self.identifiers().iter().map(|s| s.to_string()).collect(),
                })?;

        if let Some(field) = params.keys().find(|k| descriptor.field(k).is_none()) {
            return Err(VariantError::UnknownField {
                identifier: identifier.to_string(),
                field: field.clone(),
            });
        }

        let mut fields = Map::new();
        for spec in &descriptor.fields {
            let value = match (params.get(spec.name), &spec.default) {
                (Some(value), _) => {
                    spec.check(identifier, value)?;
                    value.clone()
                }
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(VariantError::MissingRequiredField {
                        identifier: identifier.to_string(),
                        field: spec.name.to_string(),
                    });
                }
            };
            fields.insert(spec.name.to_string(), value);
        }

        Ok(VariantInstance {
            identifier: descriptor.identifier.to_string(),
            fields,
        })
    }

    /// Resolve a raw selection into the family's typed value.
    pub fn make(&self, raw: &Value) -> Result<T, VariantError> {
        let instance = self.resolve(raw)?;
        self.build(&instance)
    }

    /// Run the builder for an already-resolved instance.
    pub fn build(&self, instance: &VariantInstance) -> Result<T, VariantError> {
        let descriptor =
            self.descriptor(&instance.identifier)
                .ok_or_else(|| VariantError::UnknownVariant {
                    family: self.name.to_string(),
                    identifier: instance.identifier.clone(),
                    known: self.identifiers().iter().map(|s| s.to_string()).collect(),
                })?;
        (descriptor.build)(instance)
    }

    /// Minimal raw form of an instance.
    ///
    /// Reduced fields that are unset or default are dropped. When every
    /// remaining field holds its default the bare identifier is returned.
    pub fn reduce(&self, instance: &VariantInstance) -> Value {
        let Some(descriptor) = self.descriptor(&instance.identifier) else {
            let mut selection = Map::new();
            selection.insert(
                instance.identifier.clone(),
                Value::Object(instance.fields.clone()),
            );
            return Value::Object(selection);
        };

        let mut fields = Map::new();
        let mut all_default = true;
        for spec in &descriptor.fields {
            let value = instance
                .fields
                .get(spec.name)
                .cloned()
                .unwrap_or(Value::Null);
            let is_default = spec.is_default(&value);
            if spec.reduced && (value.is_null() || is_default) {
                continue;
            }
            all_default &= is_default;
            fields.insert(spec.name.to_string(), value);
        }

        if all_default {
            Value::String(descriptor.identifier.to_string())
        } else {
            let mut selection = Map::new();
            selection.insert(descriptor.identifier.to_string(), Value::Object(fields));
            Value::Object(selection)
        }
    }
}

impl<T: Variant> VariantFamily<T> {
    /// Minimal raw form of a typed variant.
    pub fn unmake(&self, variant: &T) -> Value {
        self.reduce(&VariantInstance {
            identifier: variant.identifier().to_string(),
            fields: variant.to_fields(),
        })
    }
}

impl<T> fmt::Debug for VariantFamily<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantFamily")
            .field("name", &self.name)
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Activation {
        Relu,
        LeakyRelu { alpha: f64 },
    }

    impl Variant for Activation {
        fn identifier(&self) -> &'static str {
            match self {
                Activation::Relu => "relu",
                Activation::LeakyRelu { .. } => "leaky_relu",
            }
        }

        fn to_fields(&self) -> Map<String, Value> {
            let mut fields = Map::new();
            if let Activation::LeakyRelu { alpha } = self {
                fields.insert("alpha".to_string(), json!(alpha));
            }
            fields
        }
    }

    fn activations() -> VariantFamily<Activation> {
        VariantFamily::new("activation")
            .with(VariantDescriptor::new("relu", vec![], |_| Ok(Activation::Relu)))
            .unwrap()
            .with(VariantDescriptor::new(
                "leaky_relu",
                vec![FieldSpec::with_default("alpha", FieldKind::Float, 0.2)],
                |i| Ok(Activation::LeakyRelu { alpha: i.f64("alpha")? }),
            ))
            .unwrap()
    }

    #[test]
    fn test_families_register_independently() {
        let family = activations();
        assert_eq!(family.identifiers(), vec!["relu", "leaky_relu"]);
        assert_eq!(
            family.make(&json!({"leaky_relu": {"alpha": 0.1}})).unwrap(),
            Activation::LeakyRelu { alpha: 0.1 }
        );
        assert_eq!(family.unmake(&Activation::LeakyRelu { alpha: 0.2 }), json!("leaky_relu"));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let err = activations()
            .with(VariantDescriptor::new("relu", vec![], |_| Ok(Activation::Relu)))
            .unwrap_err();
        assert!(matches!(err, VariantError::DuplicateVariant { .. }));
    }

    #[test]
    fn test_identifiers_are_case_sensitive() {
        let err = activations().resolve(&json!("Relu")).unwrap_err();
        assert!(matches!(err, VariantError::UnknownVariant { .. }));
    }

    #[test]
    fn test_null_parameters_mean_defaults() {
        let instance = activations().resolve(&json!({"leaky_relu": null})).unwrap();
        assert_eq!(instance.fields["alpha"], json!(0.2));
    }

    #[test]
    fn test_selection_shape_errors() {
        let family = activations();
        assert!(matches!(
            family.resolve(&json!({})),
            Err(VariantError::InvalidSelector { .. })
        ));
        assert!(matches!(
            family.resolve(&json!(3)),
            Err(VariantError::InvalidSelector { .. })
        ));
        assert!(matches!(
            family.resolve(&json!({"leaky_relu": [1]})),
            Err(VariantError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_numeric_defaults_compare_by_value() {
        let spec = FieldSpec::with_default("weights", FieldKind::Float, 1.0);
        assert!(spec.is_default(&json!(1)));
        assert!(!spec.is_default(&json!(2)));
    }

    #[test]
    fn test_tensor_refs() {
        assert_eq!(
            TensorRef::from_value(&json!("dense_out")),
            Some(TensorRef::Name("dense_out".to_string()))
        );
        let output = TensorRef::from_value(&json!(["dense", 0, 1])).unwrap();
        assert_eq!(output.to_value(), json!(["dense", 0, 1]));
        assert!(TensorRef::from_value(&json!(["dense", 0])).is_none());
        assert!(TensorRef::from_value(&json!(7)).is_none());
    }
}
