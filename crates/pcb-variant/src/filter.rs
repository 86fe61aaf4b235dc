use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::rule::{FilterRule, RuleOutcome, RuleSpec};
use crate::{Component, Result, VariantError};

/// Reserved filter name meaning "no filter at all".
pub const NONE_FILTER: &str = "_none";

const GENERIC: &str = "generic";

fn default_type() -> String {
    GENERIC.to_string()
}

/// A filter as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default)]
    pub comment: String,
    /// References excluded regardless of the rules
    #[serde(default)]
    pub exclude_refs: Vec<String>,
    /// Rules evaluated in order; the first matching rule decides
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilterRefRepr {
    One(String),
    Many(Vec<String>),
}

/// One or more filter names, written as a string or a list of strings.
///
/// Empty names and [`NONE_FILTER`] are dropped, so an empty reference means
/// "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FilterRefRepr")]
pub struct FilterRef(Vec<String>);

impl From<FilterRefRepr> for FilterRef {
    fn from(repr: FilterRefRepr) -> Self {
        match repr {
            FilterRefRepr::One(name) => FilterRef::new([name]),
            FilterRefRepr::Many(names) => FilterRef::new(names),
        }
    }
}

impl FilterRef {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterRef(
            names
                .into_iter()
                .map(Into::into)
                .filter(|n| !n.is_empty() && n != NONE_FILTER)
                .collect(),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What happens to a component a filter matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterEffect {
    /// `fitted = false`
    NotFitted,
    /// `included = false`
    NotIncluded,
}

/// Why a filter matched a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Reference,
    Rule(usize),
}

/// A compiled generic filter: an ordered chain of rules.
#[derive(Debug, Clone)]
pub struct Filter {
    name: String,
    comment: String,
    exclude_refs: BTreeSet<String>,
    rules: Vec<FilterRule>,
}

impl Filter {
    pub fn from_spec(spec: &FilterSpec) -> Result<Self> {
        if spec.name == NONE_FILTER {
            return Err(VariantError::ReservedName(spec.name.clone()));
        }
        if spec.kind != GENERIC {
            return Err(VariantError::UnknownType {
                kind: "filter",
                type_name: spec.kind.clone(),
                name: spec.name.clone(),
            });
        }
        let rules = spec
            .rules
            .iter()
            .map(|r| FilterRule::new(&spec.name, r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: spec.name.clone(),
            comment: spec.comment.clone(),
            exclude_refs: spec.exclude_refs.iter().cloned().collect(),
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Return the first decisive match for a component, if any.
    ///
    /// Abstaining rules and rules that do not match are passed over; the
    /// first match decides and later rules are not consulted.
    pub fn first_match(&self, component: &Component) -> Option<MatchedBy> {
        self.first_match_with(component, &mut |_| {})
    }

    fn first_match_with(
        &self,
        component: &Component,
        on_missing_field: &mut dyn FnMut(&FilterRule),
    ) -> Option<MatchedBy> {
        if self.exclude_refs.contains(&component.reference) {
            return Some(MatchedBy::Reference);
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.skips_missing_field() && component.column(rule.column()).is_none() {
                on_missing_field(rule);
            }
            match rule.evaluate(component) {
                RuleOutcome::Match => return Some(MatchedBy::Rule(index)),
                RuleOutcome::NoMatch | RuleOutcome::Skip => {}
            }
        }
        None
    }

    /// Apply the filter to a component set, in the order given.
    ///
    /// Matched components get `effect`; everything else is left untouched.
    pub fn apply(&self, components: &mut [Component], effect: FilterEffect) {
        let mut warned: BTreeSet<String> = BTreeSet::new();
        for component in components.iter_mut() {
            let matched = self.first_match_with(component, &mut |rule| {
                if warned.insert(rule.column().to_ascii_lowercase()) {
                    log::warn!(
                        "Filter `{}`: no `{}` field in {}, using `match_if_no_field`",
                        self.name,
                        rule.column(),
                        component.reference
                    );
                }
            });
            let Some(matched) = matched else {
                continue;
            };
            log::debug!(
                "Filter `{}` matched {} ({:?}) -> {:?}",
                self.name,
                component.reference,
                matched,
                effect
            );
            match effect {
                FilterEffect::NotFitted => component.fitted = false,
                FilterEffect::NotIncluded => component.included = false,
            }
        }
    }
}
