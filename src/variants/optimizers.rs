//! Optimizer family.

use super::{FieldKind, FieldSpec, Variant, VariantDescriptor, VariantFamily, VariantInstance};
use crate::error::VariantError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Family name used in the registry.
pub const FAMILY: &str = "optimizer";

/// Fields shared by every optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerOptions {
    pub learning_rate: f64,
    pub name: Option<String>,
}

impl OptimizerOptions {
    fn from_instance(instance: &VariantInstance) -> Result<Self, VariantError> {
        Ok(Self {
            learning_rate: instance.f64("learning_rate")?,
            name: instance.opt_str("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Optimizer {
    Sgd(OptimizerOptions),
    Momentum {
        options: OptimizerOptions,
        momentum: f64,
        use_nesterov: bool,
    },
    Adam {
        options: OptimizerOptions,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
    },
    Adagrad {
        options: OptimizerOptions,
        initial_accumulator_value: f64,
    },
    RmsProp {
        options: OptimizerOptions,
        decay: f64,
        momentum: f64,
        epsilon: f64,
    },
}

impl Optimizer {
    pub fn options(&self) -> &OptimizerOptions {
        match self {
            Optimizer::Sgd(options)
            | Optimizer::Momentum { options, .. }
            | Optimizer::Adam { options, .. }
            | Optimizer::Adagrad { options, .. }
            | Optimizer::RmsProp { options, .. } => options,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.options().learning_rate
    }
}

impl Variant for Optimizer {
    fn identifier(&self) -> &'static str {
        match self {
            Optimizer::Sgd(_) => "SGD",
            Optimizer::Momentum { .. } => "Momentum",
            Optimizer::Adam { .. } => "Adam",
            Optimizer::Adagrad { .. } => "Adagrad",
            Optimizer::RmsProp { .. } => "RMSProp",
        }
    }

    fn to_fields(&self) -> Map<String, Value> {
        let options = self.options();
        let mut fields = Map::new();
        fields.insert("learning_rate".to_string(), json!(options.learning_rate));
        fields.insert(
            "name".to_string(),
            options.name.clone().map(Value::String).unwrap_or(Value::Null),
        );
        match self {
            Optimizer::Sgd(_) => {}
            Optimizer::Momentum {
                momentum,
                use_nesterov,
                ..
            } => {
                fields.insert("momentum".to_string(), json!(momentum));
                fields.insert("use_nesterov".to_string(), json!(use_nesterov));
            }
            Optimizer::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } => {
                fields.insert("beta1".to_string(), json!(beta1));
                fields.insert("beta2".to_string(), json!(beta2));
                fields.insert("epsilon".to_string(), json!(epsilon));
            }
            Optimizer::Adagrad {
                initial_accumulator_value,
                ..
            } => {
                fields.insert(
                    "initial_accumulator_value".to_string(),
                    json!(initial_accumulator_value),
                );
            }
            Optimizer::RmsProp {
                decay,
                momentum,
                epsilon,
                ..
            } => {
                fields.insert("decay".to_string(), json!(decay));
                fields.insert("momentum".to_string(), json!(momentum));
                fields.insert("epsilon".to_string(), json!(epsilon));
            }
        }
        fields
    }
}

fn optimizer_fields(learning_rate: f64, extra: Vec<FieldSpec>) -> Vec<FieldSpec> {
    let mut fields = vec![FieldSpec::with_default(
        "learning_rate",
        FieldKind::Float,
        learning_rate,
    )];
    fields.extend(extra);
    fields.push(FieldSpec::optional("name", FieldKind::Str).reduced());
    fields
}

fn build_family() -> Result<VariantFamily<Optimizer>, VariantError> {
    VariantFamily::new(FAMILY)
        .with(VariantDescriptor::new("SGD", optimizer_fields(0.01, vec![]), |i| {
            Ok(Optimizer::Sgd(OptimizerOptions::from_instance(i)?))
        }))?
        .with(VariantDescriptor::new(
            "Momentum",
            optimizer_fields(
                0.001,
                vec![
                    FieldSpec::with_default("momentum", FieldKind::Float, 0.9),
                    FieldSpec::with_default("use_nesterov", FieldKind::Bool, false),
                ],
            ),
            |i| {
                Ok(Optimizer::Momentum {
                    options: OptimizerOptions::from_instance(i)?,
                    momentum: i.f64("momentum")?,
                    use_nesterov: i.bool("use_nesterov")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "Adam",
            optimizer_fields(
                0.001,
                vec![
                    FieldSpec::with_default("beta1", FieldKind::Float, 0.9),
                    FieldSpec::with_default("beta2", FieldKind::Float, 0.999),
                    FieldSpec::with_default("epsilon", FieldKind::Float, 1e-8),
                ],
            ),
            |i| {
                Ok(Optimizer::Adam {
                    options: OptimizerOptions::from_instance(i)?,
                    beta1: i.f64("beta1")?,
                    beta2: i.f64("beta2")?,
                    epsilon: i.f64("epsilon")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "Adagrad",
            optimizer_fields(
                0.01,
                vec![FieldSpec::with_default(
                    "initial_accumulator_value",
                    FieldKind::Float,
                    0.1,
                )],
            ),
            |i| {
                Ok(Optimizer::Adagrad {
                    options: OptimizerOptions::from_instance(i)?,
                    initial_accumulator_value: i.f64("initial_accumulator_value")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "RMSProp",
            optimizer_fields(
                0.001,
                vec![
                    FieldSpec::with_default("decay", FieldKind::Float, 0.9),
                    FieldSpec::with_default("momentum", FieldKind::Float, 0.0),
                    FieldSpec::with_default("epsilon", FieldKind::Float, 1e-10),
                ],
            ),
            |i| {
                Ok(Optimizer::RmsProp {
                    options: OptimizerOptions::from_instance(i)?,
                    decay: i.f64("decay")?,
                    momentum: i.f64("momentum")?,
                    epsilon: i.f64("epsilon")?,
                })
            },
        ))
}

static OPTIMIZERS: LazyLock<VariantFamily<Optimizer>> =
    LazyLock::new(|| build_family().expect("optimizer identifiers are unique"));

/// The optimizer family.
pub fn family() -> &'static VariantFamily<Optimizer> {
    &OPTIMIZERS
}

impl Serialize for Optimizer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        family().unmake(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Optimizer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        family().make(&raw).map_err(serde::de::Error::custom)
    }
}
