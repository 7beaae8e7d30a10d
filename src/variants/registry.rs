//! Name-indexed collection of variant families.

use super::{VariantFamily, VariantInstance, losses, optimizers};
use crate::error::VariantError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Untyped view of a variant family.
pub trait ResolveVariant: Send + Sync {
    fn family(&self) -> &'static str;
    fn identifiers(&self) -> Vec<&'static str>;
    fn resolve(&self, raw: &Value) -> Result<VariantInstance, VariantError>;
    fn reduce(&self, instance: &VariantInstance) -> Value;
}

impl<T> ResolveVariant for VariantFamily<T> {
    fn family(&self) -> &'static str {
        self.name()
    }

    fn identifiers(&self) -> Vec<&'static str> {
        VariantFamily::identifiers(self)
    }

    fn resolve(&self, raw: &Value) -> Result<VariantInstance, VariantError> {
        let instance = VariantFamily::resolve(self, raw)?;
        // The typed builder may reject combinations the field checks let through.
        self.build(&instance)?;
        Ok(instance)
    }

    fn reduce(&self, instance: &VariantInstance) -> Value {
        VariantFamily::reduce(self, instance)
    }
}

impl<R: ResolveVariant + ?Sized> ResolveVariant for &'static R {
    fn family(&self) -> &'static str {
        (**self).family()
    }

    fn identifiers(&self) -> Vec<&'static str> {
        (**self).identifiers()
    }

    fn resolve(&self, raw: &Value) -> Result<VariantInstance, VariantError> {
        (**self).resolve(raw)
    }

    fn reduce(&self, instance: &VariantInstance) -> Value {
        (**self).reduce(instance)
    }
}

/// Families indexed by name (`loss`, `optimizer`, ...).
#[derive(Default)]
pub struct VariantRegistry {
    families: BTreeMap<&'static str, Box<dyn ResolveVariant>>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in loss and optimizer families.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.families.insert(losses::FAMILY, Box::new(losses::family()));
        registry
            .families
            .insert(optimizers::FAMILY, Box::new(optimizers::family()));
        registry
    }

    pub fn register(&mut self, family: impl ResolveVariant + 'static) -> Result<(), VariantError> {
        let name = family.family();
        if self.families.contains_key(name) {
            return Err(VariantError::DuplicateVariant {
                family: "registry".to_string(),
                identifier: name.to_string(),
            });
        }
        self.families.insert(name, Box::new(family));
        Ok(())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.families.keys().copied().collect()
    }

    pub fn family(&self, name: &str) -> Option<&dyn ResolveVariant> {
        self.families.get(name).map(|f| f.as_ref())
    }

    fn require(&self, name: &str) -> Result<&dyn ResolveVariant, VariantError> {
        self.family(name).ok_or_else(|| VariantError::UnknownVariant {
            family: "variant family".to_string(),
            identifier: name.to_string(),
            known: self.names().iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Resolve a raw selection against the named family.
    pub fn resolve(&self, family: &str, raw: &Value) -> Result<VariantInstance, VariantError> {
        self.require(family)?.resolve(raw)
    }

    /// Minimal raw form of an instance of the named family.
    pub fn reduce(&self, family: &str, instance: &VariantInstance) -> Result<Value, VariantError> {
        Ok(self.require(family)?.reduce(instance))
    }
}
