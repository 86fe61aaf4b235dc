//! Component filters and board variants.
//!
//! A [`Filter`] is an ordered chain of column/regex [`FilterRule`]s. A
//! [`Variant`] combines filters (and optionally a base variant) to decide,
//! for every [`Component`] of a board, whether it is fitted and whether it
//! is included in the output at all. Everything in this crate is pure: the
//! result is a [`Partition`], the components handed in are never mutated.

mod component;
mod filter;
mod rule;
mod variant;

pub use component::{Component, ComponentOverride, apply_overrides};
pub use filter::{Filter, FilterEffect, FilterRef, FilterSpec, MatchedBy, NONE_FILTER};
pub use rule::{FilterRule, RuleOutcome, RuleSpec};
pub use variant::{Partition, Selection, Variant, VariantSet, VariantSpec};

use thiserror::Error;

/// Configuration faults detected while building filters and variants.
///
/// All of these are raised when the configuration is loaded, never while
/// components are being evaluated.
#[derive(Debug, Error)]
pub enum VariantError {
    #[error("Invalid regular expression `{regex}` in filter `{filter}`")]
    InvalidRegex {
        filter: String,
        regex: String,
        #[source]
        source: regex::Error,
    },

    #[error("Filter `{filter}` has a rule without a column")]
    MissingColumn { filter: String },

    #[error("Unknown filter `{name}` in {context}")]
    UnknownFilter { name: String, context: String },

    #[error("Unknown variant `{name}` in {context}")]
    UnknownVariant { name: String, context: String },

    #[error("Variant `base` cycle: {chain}")]
    VariantCycle { chain: String },

    #[error("Duplicate {kind} name `{name}`")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unknown {kind} type `{type_name}` for `{name}`")]
    UnknownType {
        kind: &'static str,
        type_name: String,
        name: String,
    },

    #[error("`{0}` is a reserved filter name")]
    ReservedName(String),

    #[error("Duplicate component reference `{0}`")]
    DuplicateReference(String),
}

pub type Result<T> = std::result::Result<T, VariantError>;
