//! The declarative configuration file, `fab.toml`.
//!
//! ```toml
//! [global]
//! dir = "out"
//! variant = "production"
//!
//! [preflight]
//! ignore_unconnected = true
//!
//! [[filters]]
//! name = "no_tp"
//! exclude_refs = ["TP1"]
//!
//! [[variants]]
//! name = "production"
//! dnf_filter = "no_tp"
//!
//! [[outputs]]
//! name = "bom"
//! type = "bom"
//! dir = "+/bom"
//! options = { columns = [{ field = "Reference" }, { field = "Value" }] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use pcb_variant::{ComponentOverride, FilterSpec, VariantSpec};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{ConfigError, Result};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FabConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    /// Preflight name to value
    #[serde(default)]
    pub preflight: BTreeMap<String, Value>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

impl FabConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default output directory, and the base of `+` prefixed job dirs
    #[serde(default)]
    pub dir: Option<String>,
    /// Variant used by outputs that don't name one
    #[serde(default)]
    pub variant: Option<String>,
    /// Scratch layer receiving relocated drawings
    #[serde(default)]
    pub work_layer: Option<String>,
    /// Per reference overrides applied when components are read from the board
    #[serde(default)]
    pub overrides: BTreeMap<String, ComponentOverride>,
}

/// Which output `disable_run_by_default` names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum DisableTarget {
    #[default]
    Nothing,
    /// `true`: the output named in `extends`
    Extended,
    Output(String),
}

impl<'de> Deserialize<'de> for DisableTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Name(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => DisableTarget::Extended,
            Repr::Flag(false) => DisableTarget::Nothing,
            Repr::Name(name) if name.is_empty() => DisableTarget::Nothing,
            Repr::Name(name) => DisableTarget::Output(name),
        })
    }
}

/// One `[[outputs]]` entry as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Output directory; `+` prefix appends to the global dir
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub comment: String,
    /// Output whose options this one starts from
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default = "default_true")]
    pub run_by_default: bool,
    #[serde(default)]
    pub disable_run_by_default: DisableTarget,
    /// Text for the `%I` expansion
    #[serde(default)]
    pub output_id: String,
    #[serde(default)]
    pub options: Option<Value>,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            dir: None,
            comment: String::new(),
            extends: None,
            run_by_default: true,
            disable_run_by_default: DisableTarget::Nothing,
            output_id: String::new(),
            options: None,
        }
    }

    /// `extends`, with an empty string meaning none.
    pub fn extends(&self) -> Option<&str> {
        self.extends.as_deref().filter(|e| !e.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_config() {
        let config = FabConfig::from_toml(
            r#"
            [global]
            dir = "out"
            variant = "production"
            work_layer = "User.9"

            [global.overrides.R1]
            fitted = false

            [preflight]
            ignore_unconnected = true
            filters = [{ filter = "Unconnected", number = 2, regex = "GND" }]

            [[filters]]
            name = "no_tp"
            exclude_refs = ["TP1"]

            [[filters]]
            name = "no_debug"
            rules = [{ column = "Config", regex = "debug" }]

            [[variants]]
            name = "production"
            dnf_filter = ["no_tp", "no_debug"]

            [[outputs]]
            name = "bom"
            type = "bom"
            dir = "+/bom"

            [outputs.options]
            separator = ";"
            columns = [{ field = "Reference" }, { field = "Value", name = "Val" }]

            [[outputs]]
            name = "bom_debug"
            type = "bom"
            extends = "bom"
            disable_run_by_default = true
            output_id = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.global.variant.as_deref(), Some("production"));
        assert_eq!(config.global.overrides["R1"].fitted, Some(false));
        assert_eq!(config.preflight["ignore_unconnected"], json!(true));
        assert_eq!(config.preflight["filters"][0]["number"], json!(2));
        assert_eq!(config.filters.len(), 2);
        assert_eq!(config.variants[0].dnf_filter.names(), ["no_tp", "no_debug"]);

        let bom = &config.outputs[0];
        assert_eq!(bom.dir.as_deref(), Some("+/bom"));
        assert!(bom.run_by_default);
        assert_eq!(bom.disable_run_by_default, DisableTarget::Nothing);
        assert_eq!(bom.options.as_ref().unwrap()["separator"], json!(";"));

        let debug = &config.outputs[1];
        assert_eq!(debug.extends(), Some("bom"));
        assert_eq!(debug.disable_run_by_default, DisableTarget::Extended);
        assert!(debug.options.is_none());
    }

    #[test]
    fn test_disable_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            d: DisableTarget,
        }
        let parse = |s: &str| toml::from_str::<Wrapper>(s).unwrap().d;
        assert_eq!(parse("d = false"), DisableTarget::Nothing);
        assert_eq!(parse("d = ''"), DisableTarget::Nothing);
        assert_eq!(parse("d = true"), DisableTarget::Extended);
        assert_eq!(parse("d = 'gerbers'"), DisableTarget::Output("gerbers".into()));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(FabConfig::from_toml("[globals]\ndir = 'x'").is_err());
        assert!(
            FabConfig::from_toml("[[outputs]]\nname = 'a'\ntype = 'bom'\nextend = 'b'").is_err()
        );
    }
}
