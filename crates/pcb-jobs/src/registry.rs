use std::collections::BTreeMap;

use serde_json::Value;

use crate::options::{Configure, Output, Preflight};
use crate::schema::{FieldKind, Schema};
use crate::tree::OptionTree;
use crate::{outputs, preflight, Result};

type OutputFactory = fn(&OptionTree, &str) -> Result<Box<dyn Output>>;
type PreflightFactory = fn(&Value, &str) -> Result<Box<dyn Preflight>>;

fn configure_output<T: Output + Configure + 'static>(
    tree: &OptionTree,
    context: &str,
) -> Result<Box<dyn Output>> {
    Ok(Box::new(T::configure(tree, context)?))
}

/// An output type: its option schema and how to build it from a tree.
#[derive(Debug, Clone, Copy)]
pub struct OutputPrototype {
    pub schema: &'static Schema,
    factory: OutputFactory,
}

impl OutputPrototype {
    pub fn of<T: Output + Configure + 'static>() -> Self {
        Self {
            schema: T::SCHEMA,
            factory: configure_output::<T>,
        }
    }

    pub fn configure(&self, tree: &OptionTree, context: &str) -> Result<Box<dyn Output>> {
        (self.factory)(tree, context)
    }
}

/// A preflight type. Preflight values are plain values, not tables.
#[derive(Debug, Clone, Copy)]
pub struct PreflightPrototype {
    pub kind: FieldKind,
    pub doc: &'static str,
    /// Example value, as written in TOML
    pub example: &'static str,
    factory: PreflightFactory,
}

impl PreflightPrototype {
    pub fn new(
        kind: FieldKind,
        doc: &'static str,
        example: &'static str,
        factory: PreflightFactory,
    ) -> Self {
        Self {
            kind,
            doc,
            example,
            factory,
        }
    }

    pub fn configure(&self, value: &Value, name: &str) -> Result<Box<dyn Preflight>> {
        let context = format!("preflight `{name}`");
        self.kind.check(value, "[preflight]", name)?;
        (self.factory)(value, &context)
    }
}

/// Job types by name.
///
/// Registering a name twice keeps the last registration, which is how
/// extensions replace built-in types. The registry is filled before any
/// configuration is resolved and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    outputs: BTreeMap<String, OutputPrototype>,
    preflights: BTreeMap<String, PreflightPrototype>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in output and preflight.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        outputs::register_builtin(&mut registry);
        preflight::register_builtin(&mut registry);
        registry
    }

    pub fn register_output(&mut self, type_name: impl Into<String>, prototype: OutputPrototype) {
        let type_name = type_name.into();
        log::debug!("Registering output type `{type_name}`");
        if self.outputs.insert(type_name.clone(), prototype).is_some() {
            log::debug!("Output type `{type_name}` replaced");
        }
    }

    pub fn register_preflight(&mut self, name: impl Into<String>, prototype: PreflightPrototype) {
        let name = name.into();
        log::debug!("Registering preflight `{name}`");
        if self.preflights.insert(name.clone(), prototype).is_some() {
            log::debug!("Preflight `{name}` replaced");
        }
    }

    pub fn output(&self, type_name: &str) -> Option<&OutputPrototype> {
        self.outputs.get(type_name)
    }

    pub fn preflight(&self, name: &str) -> Option<&PreflightPrototype> {
        self.preflights.get(name)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &OutputPrototype)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn preflights(&self) -> impl Iterator<Item = (&str, &PreflightPrototype)> {
        self.preflights.iter().map(|(k, v)| (k.as_str(), v))
    }
}
