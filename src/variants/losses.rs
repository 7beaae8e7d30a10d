//! Loss function family.
//!
//! ```yaml
//! loss: MeanSquaredError
//! loss:
//!   HuberLoss:
//!     clip: 0.2
//! ```

use super::{FieldKind, FieldSpec, TensorRef, Variant, VariantDescriptor, VariantFamily, VariantInstance};
use crate::error::VariantError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Family name used in the registry.
pub const FAMILY: &str = "loss";

/// Fields shared by every loss.
#[derive(Debug, Clone, PartialEq)]
pub struct LossOptions {
    /// True values layer; defaults to the labels.
    pub input_layer: Option<TensorRef>,
    /// Network output layer; defaults to the last layer.
    pub output_layer: Option<TensorRef>,
    /// Coefficient applied to the loss.
    pub weights: f64,
    pub name: Option<String>,
    /// Add the loss to the losses collection.
    pub collect: bool,
}

impl Default for LossOptions {
    fn default() -> Self {
        Self {
            input_layer: None,
            output_layer: None,
            weights: 1.0,
            name: None,
            collect: true,
        }
    }
}

impl LossOptions {
    fn from_instance(instance: &VariantInstance) -> Result<Self, VariantError> {
        Ok(Self {
            input_layer: instance.opt_tensor("input_layer")?,
            output_layer: instance.opt_tensor("output_layer")?,
            weights: instance.f64("weights")?,
            name: instance.opt_str("name")?,
            collect: instance.bool("collect")?,
        })
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "input_layer".to_string(),
            self.input_layer
                .as_ref()
                .map(TensorRef::to_value)
                .unwrap_or(Value::Null),
        );
        fields.insert(
            "output_layer".to_string(),
            self.output_layer
                .as_ref()
                .map(TensorRef::to_value)
                .unwrap_or(Value::Null),
        );
        fields.insert("weights".to_string(), json!(self.weights));
        fields.insert(
            "name".to_string(),
            self.name.clone().map(Value::String).unwrap_or(Value::Null),
        );
        fields.insert("collect".to_string(), Value::Bool(self.collect));
        fields
    }
}

/// A configured loss function.
#[derive(Debug, Clone, PartialEq)]
pub enum Loss {
    AbsoluteDifference(LossOptions),
    MeanSquaredError(LossOptions),
    LogLoss {
        options: LossOptions,
        epsilon: f64,
    },
    /// Huber loss for DQN.
    HuberLoss {
        options: LossOptions,
        clip: f64,
    },
    ClippedDeltaLoss {
        options: LossOptions,
        clip_value_min: f64,
        clip_value_max: f64,
    },
    SoftmaxCrossEntropy {
        options: LossOptions,
        label_smoothing: f64,
    },
    SigmoidCrossEntropy {
        options: LossOptions,
        label_smoothing: f64,
    },
    HingeLoss(LossOptions),
    /// Expects unit-normalized predictions and labels.
    CosineDistance {
        options: LossOptions,
        dim: i64,
    },
    PoissonLoss(LossOptions),
    KullbackLeiberDivergence {
        options: LossOptions,
        dim: i64,
    },
}

impl Loss {
    pub fn options(&self) -> &LossOptions {
        match self {
            Loss::AbsoluteDifference(options)
            | Loss::MeanSquaredError(options)
            | Loss::HingeLoss(options)
            | Loss::PoissonLoss(options) => options,
            Loss::LogLoss { options, .. }
            | Loss::HuberLoss { options, .. }
            | Loss::ClippedDeltaLoss { options, .. }
            | Loss::SoftmaxCrossEntropy { options, .. }
            | Loss::SigmoidCrossEntropy { options, .. }
            | Loss::CosineDistance { options, .. }
            | Loss::KullbackLeiberDivergence { options, .. } => options,
        }
    }
}

impl Variant for Loss {
    fn identifier(&self) -> &'static str {
        match self {
            Loss::AbsoluteDifference(_) => "AbsoluteDifference",
            Loss::MeanSquaredError(_) => "MeanSquaredError",
            Loss::LogLoss { .. } => "LogLoss",
            Loss::HuberLoss { .. } => "HuberLoss",
            Loss::ClippedDeltaLoss { .. } => "ClippedDeltaLoss",
            Loss::SoftmaxCrossEntropy { .. } => "SoftmaxCrossEntropy",
            Loss::SigmoidCrossEntropy { .. } => "SigmoidCrossEntropy",
            Loss::HingeLoss(_) => "HingeLoss",
            Loss::CosineDistance { .. } => "CosineDistance",
            Loss::PoissonLoss(_) => "PoissonLoss",
            Loss::KullbackLeiberDivergence { .. } => "KullbackLeiberDivergence",
        }
    }

    fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.options().to_fields();
        match self {
            Loss::LogLoss { epsilon, .. } => {
                fields.insert("epsilon".to_string(), json!(epsilon));
            }
            Loss::HuberLoss { clip, .. } => {
                fields.insert("clip".to_string(), json!(clip));
            }
            Loss::ClippedDeltaLoss {
                clip_value_min,
                clip_value_max,
                ..
            } => {
                fields.insert("clip_value_min".to_string(), json!(clip_value_min));
                fields.insert("clip_value_max".to_string(), json!(clip_value_max));
            }
            Loss::SoftmaxCrossEntropy {
                label_smoothing, ..
            }
            | Loss::SigmoidCrossEntropy {
                label_smoothing, ..
            } => {
                fields.insert("label_smoothing".to_string(), json!(label_smoothing));
            }
            Loss::CosineDistance { dim, .. } | Loss::KullbackLeiberDivergence { dim, .. } => {
                fields.insert("dim".to_string(), json!(dim));
            }
            _ => {}
        }
        fields
    }
}

fn loss_fields(extra: Vec<FieldSpec>) -> Vec<FieldSpec> {
    loss_fields_named(extra, None)
}

fn loss_fields_named(extra: Vec<FieldSpec>, default_name: Option<&'static str>) -> Vec<FieldSpec> {
    let name = match default_name {
        Some(name) => FieldSpec::with_default("name", FieldKind::Str, name),
        None => FieldSpec::optional("name", FieldKind::Str),
    };
    let mut fields = vec![
        FieldSpec::optional("input_layer", FieldKind::Tensor).reduced(),
        FieldSpec::optional("output_layer", FieldKind::Tensor).reduced(),
        FieldSpec::with_default("weights", FieldKind::Float, 1.0),
    ];
    fields.extend(extra);
    fields.push(name.reduced());
    fields.push(FieldSpec::with_default("collect", FieldKind::Bool, true));
    fields
}

fn build_family() -> Result<VariantFamily<Loss>, VariantError> {
    VariantFamily::new(FAMILY)
        .with(VariantDescriptor::new(
            "AbsoluteDifference",
            loss_fields(vec![]),
            |i| Ok(Loss::AbsoluteDifference(LossOptions::from_instance(i)?)),
        ))?
        .with(VariantDescriptor::new(
            "MeanSquaredError",
            loss_fields(vec![]),
            |i| Ok(Loss::MeanSquaredError(LossOptions::from_instance(i)?)),
        ))?
        .with(VariantDescriptor::new(
            "LogLoss",
            loss_fields(vec![FieldSpec::with_default("epsilon", FieldKind::Float, 1e-7)]),
            |i| {
                Ok(Loss::LogLoss {
                    options: LossOptions::from_instance(i)?,
                    epsilon: i.f64("epsilon")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "HuberLoss",
            loss_fields(vec![FieldSpec::with_default("clip", FieldKind::Float, 0.0)]),
            |i| {
                Ok(Loss::HuberLoss {
                    options: LossOptions::from_instance(i)?,
                    clip: i.f64("clip")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "ClippedDeltaLoss",
            loss_fields(vec![
                FieldSpec::with_default("clip_value_min", FieldKind::Float, -1.0),
                FieldSpec::with_default("clip_value_max", FieldKind::Float, 1.0),
            ]),
            |i| {
                Ok(Loss::ClippedDeltaLoss {
                    options: LossOptions::from_instance(i)?,
                    clip_value_min: i.f64("clip_value_min")?,
                    clip_value_max: i.f64("clip_value_max")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "SoftmaxCrossEntropy",
            loss_fields(vec![FieldSpec::with_default(
                "label_smoothing",
                FieldKind::Float,
                0.0,
            )]),
            |i| {
                Ok(Loss::SoftmaxCrossEntropy {
                    options: LossOptions::from_instance(i)?,
                    label_smoothing: i.f64("label_smoothing")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "SigmoidCrossEntropy",
            loss_fields(vec![FieldSpec::with_default(
                "label_smoothing",
                FieldKind::Float,
                0.0,
            )]),
            |i| {
                Ok(Loss::SigmoidCrossEntropy {
                    options: LossOptions::from_instance(i)?,
                    label_smoothing: i.f64("label_smoothing")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "HingeLoss",
            loss_fields(vec![]),
            |i| Ok(Loss::HingeLoss(LossOptions::from_instance(i)?)),
        ))?
        .with(VariantDescriptor::new(
            "CosineDistance",
            loss_fields(vec![FieldSpec::required("dim", FieldKind::Int)]),
            |i| {
                Ok(Loss::CosineDistance {
                    options: LossOptions::from_instance(i)?,
                    dim: i.i64("dim")?,
                })
            },
        ))?
        .with(VariantDescriptor::new(
            "PoissonLoss",
            loss_fields(vec![]),
            |i| Ok(Loss::PoissonLoss(LossOptions::from_instance(i)?)),
        ))?
        .with(VariantDescriptor::new(
            "KullbackLeiberDivergence",
            loss_fields_named(
                vec![FieldSpec::required("dim", FieldKind::Int)],
                Some("KullbackLeiberDivergence"),
            ),
            |i| {
                Ok(Loss::KullbackLeiberDivergence {
                    options: LossOptions::from_instance(i)?,
                    dim: i.i64("dim")?,
                })
            },
        ))
}

static LOSSES: LazyLock<VariantFamily<Loss>> =
    LazyLock::new(|| build_family().expect("loss identifiers are unique"));

/// The loss family.
pub fn family() -> &'static VariantFamily<Loss> {
    &LOSSES
}

impl Serialize for Loss {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        family().unmake(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Loss {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        family().make(&raw).map_err(serde::de::Error::custom)
    }
}
