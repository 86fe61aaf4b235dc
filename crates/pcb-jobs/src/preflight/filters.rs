use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::options::{Preflight, RunContext};
use crate::registry::PreflightPrototype;
use crate::schema::{FieldKind, FieldSpec, Schema};
use crate::{ConfigError, Result};

/// Name of the error filter file, written in the output directory.
pub const FILTER_FILE: &str = "fab_errors.filter";

static ENTRY_SCHEMA: Schema = Schema {
    name: "filter",
    doc: "One error filter",
    fields: &[
        FieldSpec::new(
            "filter",
            FieldKind::String,
            None,
            "Description, for documentation only.",
        ),
        FieldSpec::new(
            "number",
            FieldKind::Integer,
            Some("0"),
            "Error number to match.",
        ),
        FieldSpec::new(
            "regex",
            FieldKind::String,
            None,
            "Regular expression matched against the error text.",
        ),
    ],
    strict: true,
};

/// Ignores ERC/DRC errors of a given number whose text matches `regex`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorFilter {
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub regex: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters(pub Vec<ErrorFilter>);

impl Filters {
    /// One `number,regex` line per filter.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.0 {
            let _ = writeln!(out, "{},{}", entry.number, entry.regex);
        }
        out
    }
}

impl Preflight for Filters {
    fn targets(&self, out_dir: &Path) -> Vec<PathBuf> {
        if self.0.is_empty() {
            return Vec::new();
        }
        vec![out_dir.join(FILTER_FILE)]
    }

    fn run(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        let path = ctx.out_dir.join(FILTER_FILE);
        std::fs::create_dir_all(&ctx.out_dir)
            .with_context(|| format!("Failed to create {}", ctx.out_dir.display()))?;
        std::fs::write(&path, self.render())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Wrote {} error filters to {}", self.0.len(), path.display());
        ctx.filter_file = Some(path);
        Ok(())
    }
}

fn configure(value: &Value, context: &str) -> Result<Box<dyn Preflight>> {
    let entries: Vec<ErrorFilter> =
        serde_json::from_value(value.clone()).map_err(|source| ConfigError::Options {
            context: context.to_string(),
            source,
        })?;
    for (i, entry) in entries.iter().enumerate() {
        if let Err(source) = Regex::new(&entry.regex) {
            return Err(ConfigError::InvalidRegex {
                context: format!("{context}, entry {i}"),
                regex: entry.regex.clone(),
                source,
            });
        }
    }
    Ok(Box::new(Filters(entries)))
}

pub(super) fn prototype() -> PreflightPrototype {
    PreflightPrototype::new(
        FieldKind::TableList(&ENTRY_SCHEMA),
        "A list of entries to filter out ERC/DRC messages.",
        "[{ filter = 'Filter description', number = 10, regex = 'Regular expression to match' }]",
        configure,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn configured(value: Value) -> Result<Box<dyn Preflight>> {
        let prototype = prototype();
        prototype.configure(&value, "filters")
    }

    #[test]
    fn test_writes_filter_file() {
        let dir = tempfile::tempdir().unwrap();
        let preflight = configured(json!([
            {"filter": "Unconnected GND", "number": 2, "regex": "GND"},
            {"number": 5, "regex": "Clearance.*U1"},
        ]))
        .unwrap();
        let mut ctx = RunContext {
            out_dir: dir.path().join("out"),
            ..RunContext::default()
        };
        preflight.run(&mut ctx).unwrap();

        let path = dir.path().join("out").join(FILTER_FILE);
        assert_eq!(ctx.filter_file.as_deref(), Some(path.as_path()));
        assert_eq!(preflight.targets(&ctx.out_dir), vec![path.clone()]);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "2,GND\n5,Clearance.*U1\n");
    }

    #[test]
    fn test_empty_list_declares_nothing() {
        let preflight = configured(json!([])).unwrap();
        assert!(preflight.targets(Path::new("out")).is_empty());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = configured(json!([{"number": 1, "regex": "("}])).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidRegex { ref context, .. } if context == "preflight `filters`, entry 0")
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = configured(json!([{"num": 1}])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown option `num` in [preflight], `filters[0]`"
        );
    }
}
