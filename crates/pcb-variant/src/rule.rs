use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Component, Result, VariantError};

/// A column/regex rule as written in the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RuleSpec {
    /// Name of the column to apply the regular expression to
    #[serde(alias = "field")]
    pub column: String,
    /// Regular expression to match
    #[serde(alias = "regexp")]
    pub regex: String,
    /// Skip this rule if the field doesn't exist
    pub skip_if_no_field: bool,
    /// Match if the field exists, no regex applied. Not affected by `invert`
    pub match_if_field: bool,
    /// Match if the field doesn't exist, no regex applied. Not affected by `invert`
    pub match_if_no_field: bool,
    /// Invert the regex match result
    pub invert: bool,
}

/// Result of evaluating one rule against one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Match,
    NoMatch,
    /// The rule abstained: the column is missing and `skip_if_no_field` is set.
    Skip,
}

impl RuleOutcome {
    fn from_bool(matched: bool) -> Self {
        if matched {
            RuleOutcome::Match
        } else {
            RuleOutcome::NoMatch
        }
    }

    pub fn is_match(self) -> bool {
        self == RuleOutcome::Match
    }
}

/// A compiled rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct FilterRule {
    column: String,
    regex: Regex,
    skip_if_no_field: bool,
    match_if_field: bool,
    match_if_no_field: bool,
    invert: bool,
}

impl FilterRule {
    /// Compile a rule; `filter` names the owning filter for error messages.
    pub fn new(filter: &str, spec: &RuleSpec) -> Result<Self> {
        if spec.column.is_empty() {
            return Err(VariantError::MissingColumn {
                filter: filter.to_string(),
            });
        }
        let regex = Regex::new(&spec.regex).map_err(|source| VariantError::InvalidRegex {
            filter: filter.to_string(),
            regex: spec.regex.clone(),
            source,
        })?;
        Ok(Self {
            column: spec.column.clone(),
            regex,
            skip_if_no_field: spec.skip_if_no_field,
            match_if_field: spec.match_if_field,
            match_if_no_field: spec.match_if_no_field,
            invert: spec.invert,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn skips_missing_field(&self) -> bool {
        self.skip_if_no_field
    }

    /// Evaluate the rule against a component.
    ///
    /// Existence checks (`match_if_field`, `match_if_no_field`) short-circuit
    /// before the regex and are not inverted; an abstention is never inverted.
    pub fn evaluate(&self, component: &Component) -> RuleOutcome {
        let Some(value) = component.column(&self.column) else {
            if self.skip_if_no_field {
                return RuleOutcome::Skip;
            }
            return RuleOutcome::from_bool(self.match_if_no_field);
        };
        if self.match_if_field {
            return RuleOutcome::Match;
        }
        let found = self.regex.is_match(value);
        RuleOutcome::from_bool(found != self.invert)
    }
}
