use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Columns that always resolve to the component reference.
const REFERENCE_COLUMNS: &[&str] = &["reference", "ref", "references"];

/// One placeable part of the board.
///
/// `fitted` and `included` are annotations written by filters and variants;
/// a component can be included but not fitted (shown crossed out) or not
/// included at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub reference: String,
    pub fitted: bool,
    pub included: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Component {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            fitted: true,
            included: true,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_fitted(mut self, fitted: bool) -> Self {
        self.fitted = fitted;
        self
    }

    /// Look up a column by name.
    ///
    /// Column names are case-insensitive and `reference`/`ref` always
    /// resolve to the designator.
    pub fn column(&self, name: &str) -> Option<&str> {
        if REFERENCE_COLUMNS
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
        {
            return Some(&self.reference);
        }
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Fitted and included: physically placed in this variant.
    pub fn is_placed(&self) -> bool {
        self.fitted && self.included
    }

    /// Included but not fitted: drawn, but crossed out and without paste.
    pub fn is_dnf(&self) -> bool {
        self.included && !self.fitted
    }
}

/// Per-reference overrides supplied by the user configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitted: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// Apply user overrides to freshly materialised components.
///
/// Overrides naming a reference that is not on the board are reported and
/// otherwise ignored.
pub fn apply_overrides(
    components: &mut [Component],
    overrides: &BTreeMap<String, ComponentOverride>,
) {
    for (reference, over) in overrides {
        let Some(component) = components.iter_mut().find(|c| &c.reference == reference) else {
            log::warn!("Override for unknown component `{reference}` ignored");
            continue;
        };
        if let Some(fitted) = over.fitted {
            component.fitted = fitted;
        }
        for (name, value) in &over.fields {
            component.fields.insert(name.clone(), value.clone());
        }
    }
}
