use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::filter::{Filter, FilterEffect, FilterRef, FilterSpec};
use crate::{Component, Result, VariantError};

const GENERIC: &str = "generic";

fn default_type() -> String {
    GENERIC.to_string()
}

/// A variant as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub comment: String,
    /// Variant applied before this one
    #[serde(default)]
    pub base: Option<String>,
    /// Filter(s) removing components from the output entirely
    #[serde(default)]
    pub exclude_filter: FilterRef,
    /// Filter(s) marking components as not fitted
    #[serde(default)]
    pub dnf_filter: FilterRef,
    /// Text used for the `%v` expansion, defaults to `_<name>`
    #[serde(default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Variant {
    name: String,
    comment: String,
    base: Option<String>,
    exclude_filter: FilterRef,
    dnf_filter: FilterRef,
    file_id: String,
}

impl Variant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }
}

/// What a job asked for: a variant, a DNF filter shortcut, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub variant: Option<String>,
    pub dnf_filter: FilterRef,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.variant.is_none() && self.dnf_filter.is_empty()
    }
}

/// The fitted/included decision for every component of a board.
///
/// Components keep the order they were handed in (the board's declaration
/// order), and references are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    components: Vec<Component>,
    index: HashMap<String, usize>,
    variant: Option<String>,
}

impl Partition {
    pub fn new(components: Vec<Component>) -> Result<Self> {
        let mut index = HashMap::with_capacity(components.len());
        for (i, c) in components.iter().enumerate() {
            if index.insert(c.reference.clone(), i).is_some() {
                return Err(VariantError::DuplicateReference(c.reference.clone()));
            }
        }
        Ok(Self {
            components,
            index,
            variant: None,
        })
    }

    pub fn get(&self, reference: &str) -> Option<&Component> {
        self.index.get(reference).map(|&i| &self.components[i])
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Name of the variant that produced this partition, if any.
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Fitted and included references.
    pub fn fitted_refs(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| c.is_placed())
            .map(|c| c.reference.as_str())
            .collect()
    }

    /// References that are not fitted, including those not included at all.
    pub fn not_fitted_refs(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| !c.is_placed())
            .map(|c| c.reference.as_str())
            .collect()
    }
}

/// All filters and variants declared by a configuration, validated.
#[derive(Debug, Clone, Default)]
pub struct VariantSet {
    filters: BTreeMap<String, Filter>,
    variants: BTreeMap<String, Variant>,
}

impl VariantSet {
    /// Compile filters and variants, checking every cross reference.
    ///
    /// Fails on invalid regexes, duplicate names, unknown filter or base
    /// names and `base` cycles.
    pub fn new(filters: &[FilterSpec], variants: &[VariantSpec]) -> Result<Self> {
        let mut set = VariantSet::default();

        for spec in filters {
            let filter = Filter::from_spec(spec)?;
            if set.filters.insert(spec.name.clone(), filter).is_some() {
                return Err(VariantError::DuplicateName {
                    kind: "filter",
                    name: spec.name.clone(),
                });
            }
        }

        for spec in variants {
            if spec.kind != GENERIC {
                return Err(VariantError::UnknownType {
                    kind: "variant",
                    type_name: spec.kind.clone(),
                    name: spec.name.clone(),
                });
            }
            let variant = Variant {
                name: spec.name.clone(),
                comment: spec.comment.clone(),
                base: spec.base.clone().filter(|b| !b.is_empty()),
                exclude_filter: spec.exclude_filter.clone(),
                dnf_filter: spec.dnf_filter.clone(),
                file_id: spec
                    .file_id
                    .clone()
                    .unwrap_or_else(|| format!("_{}", spec.name)),
            };
            if set.variants.insert(spec.name.clone(), variant).is_some() {
                return Err(VariantError::DuplicateName {
                    kind: "variant",
                    name: spec.name.clone(),
                });
            }
        }

        for variant in set.variants.values() {
            let context = format!("variant `{}`", variant.name);
            set.check_filters(&variant.exclude_filter, &context)?;
            set.check_filters(&variant.dnf_filter, &context)?;
            set.base_chain(&variant.name)?;
        }

        Ok(set)
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.get(name)
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name)
    }

    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.values()
    }

    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    /// Check that every name in a filter reference exists.
    pub fn check_filters(&self, filters: &FilterRef, context: &str) -> Result<()> {
        for name in filters.names() {
            if !self.filters.contains_key(name) {
                return Err(VariantError::UnknownFilter {
                    name: name.clone(),
                    context: context.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check a job's selection against the declared filters and variants.
    pub fn check_selection(&self, selection: &Selection, context: &str) -> Result<()> {
        self.check_filters(&selection.dnf_filter, context)?;
        if let Some(name) = &selection.variant
            && !self.variants.contains_key(name)
        {
            return Err(VariantError::UnknownVariant {
                name: name.clone(),
                context: context.to_string(),
            });
        }
        Ok(())
    }

    /// The `base` chain of a variant, root first, ending with the variant itself.
    fn base_chain(&self, name: &str) -> Result<Vec<&Variant>> {
        let mut chain: Vec<&Variant> = Vec::new();
        let mut current = name;
        loop {
            let Some(variant) = self.variants.get(current) else {
                let context = match chain.last() {
                    Some(child) => format!("`base` of variant `{}`", child.name),
                    None => "variant selection".to_string(),
                };
                return Err(VariantError::UnknownVariant {
                    name: current.to_string(),
                    context,
                });
            };
            if chain.iter().any(|v| v.name == variant.name) {
                let mut names: Vec<&str> = chain.iter().map(|v| v.name.as_str()).collect();
                names.push(&variant.name);
                return Err(VariantError::VariantCycle {
                    chain: names.join(" -> "),
                });
            }
            chain.push(variant);
            match &variant.base {
                Some(base) => current = base,
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    fn apply_filters(&self, filters: &FilterRef, effect: FilterEffect, comps: &mut [Component]) {
        for filter in filters.names().iter().filter_map(|n| self.filters.get(n)) {
            filter.apply(comps, effect);
        }
    }

    /// Resolve a selection against the board's components.
    ///
    /// Returns `None` when the selection asks for nothing, so callers can
    /// hand the result to the transformer unconditionally. The job's own
    /// `dnf_filter` runs first, then the variant's `base` chain root first.
    pub fn resolve(
        &self,
        selection: &Selection,
        components: &[Component],
    ) -> Result<Option<Partition>> {
        if selection.is_empty() {
            return Ok(None);
        }
        let mut comps = components.to_vec();
        self.apply_filters(&selection.dnf_filter, FilterEffect::NotFitted, &mut comps);

        if let Some(name) = &selection.variant {
            for variant in self.base_chain(name)? {
                log::debug!("Applying variant `{}`", variant.name);
                self.apply_filters(&variant.exclude_filter, FilterEffect::NotIncluded, &mut comps);
                self.apply_filters(&variant.dnf_filter, FilterEffect::NotFitted, &mut comps);
            }
        }

        let mut partition = Partition::new(comps)?;
        partition.variant = selection.variant.clone();
        Ok(Some(partition))
    }
}
