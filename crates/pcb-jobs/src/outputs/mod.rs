//! Built-in output types.
//!
//! The writers are deliberately small; the interesting part is the variant
//! handling around them, which is shared by every output.

mod board_variant;
mod bom;
mod position;

pub use board_variant::BoardVariantOptions;
pub use bom::{BomColumn, BomOptions};
pub use position::{PositionOptions, Units};

use pcb_variant::{FilterRef, Selection};
use serde::Deserialize;

use crate::registry::{OutputPrototype, Registry};
use crate::schema::{FieldKind, FieldSpec};

pub(crate) const OUTPUT_FIELD: FieldSpec = FieldSpec::new(
    "output",
    FieldKind::String,
    Some("'%f-%i%v.%x'"),
    "Output file name. Expands `%f`, `%i`, `%x`, `%v`, `%I` and `%%`.",
);

pub(crate) const VARIANT_FIELD: FieldSpec = FieldSpec::new(
    "variant",
    FieldKind::String,
    None,
    "Board variant to apply. Defaults to the global variant.",
);

pub(crate) const DNF_FILTER_FIELD: FieldSpec = FieldSpec::new(
    "dnf_filter",
    FieldKind::StringOrList,
    Some("'_none'"),
    "Name of the filter(s) marking components as not fitted.",
);

pub(crate) const TITLE_FIELD: FieldSpec = FieldSpec::new(
    "title",
    FieldKind::String,
    None,
    "Title block text while this output runs. A leading `+` appends to the board title.",
);

pub(crate) fn default_output() -> String {
    "%f-%i%v.%x".to_string()
}

pub(crate) fn default_true() -> bool {
    true
}

/// Options every variant-aware output accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VariantOptions {
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub dnf_filter: FilterRef,
    #[serde(default)]
    pub title: Option<String>,
}

impl VariantOptions {
    pub fn selection(&self) -> Selection {
        Selection {
            variant: self.variant.clone().filter(|v| !v.is_empty()),
            dnf_filter: self.dnf_filter.clone(),
        }
    }
}

pub fn register_builtin(registry: &mut Registry) {
    registry.register_output("bom", OutputPrototype::of::<BomOptions>());
    registry.register_output("position", OutputPrototype::of::<PositionOptions>());
    registry.register_output("board_variant", OutputPrototype::of::<BoardVariantOptions>());
}
