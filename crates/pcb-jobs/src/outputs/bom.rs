use std::path::{Path, PathBuf};

use anyhow::Context;
use pcb_board::TransformOptions;
use pcb_variant::{Component, Selection};
use serde::Deserialize;

use super::{
    DNF_FILTER_FIELD, OUTPUT_FIELD, TITLE_FIELD, VARIANT_FIELD, VariantOptions, default_output,
};
use crate::expand::FileNamer;
use crate::options::{Configure, JobContext, Output};
use crate::schema::{FieldKind, FieldSpec, Schema};
use crate::tree::OptionTree;
use crate::{ConfigError, Result};

static COLUMN_SCHEMA: Schema = Schema {
    name: "column",
    doc: "One column of the bill of materials",
    fields: &[
        FieldSpec::new(
            "field",
            FieldKind::String,
            None,
            "Component field to list. `References` and `Quantity` are computed per group.",
        ),
        FieldSpec::new(
            "name",
            FieldKind::String,
            None,
            "Column header, defaults to the field name.",
        ),
    ],
    strict: true,
};

static SCHEMA: Schema = Schema {
    name: "bom",
    doc: "Bill of materials in CSV format. Components with equal values in every listed column are grouped in one row.",
    fields: &[
        OUTPUT_FIELD,
        FieldSpec::new(
            "separator",
            FieldKind::String,
            Some("','"),
            "CSV field separator, a single character.",
        ),
        FieldSpec::new(
            "columns",
            FieldKind::TableList(&COLUMN_SCHEMA),
            None,
            "Columns to list. Defaults to References, Value, Footprint and Quantity.",
        ),
        FieldSpec::new(
            "include_dnf",
            FieldKind::Bool,
            Some("false"),
            "Also list components that are not fitted, with `DNF` as quantity.",
        ),
        FieldSpec::new(
            "conf",
            FieldKind::String,
            None,
            "External BoM configuration file. Declared as a dependency of this output.",
        ),
        VARIANT_FIELD,
        DNF_FILTER_FIELD,
        TITLE_FIELD,
    ],
    strict: true,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BomColumn {
    pub field: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl BomColumn {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            name: None,
        }
    }

    pub fn header(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.field)
    }

    fn computed(&self) -> Option<Computed> {
        let field = self.field.to_ascii_lowercase();
        match field.as_str() {
            "references" | "reference" | "ref" => Some(Computed::References),
            "quantity" | "qty" => Some(Computed::Quantity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Computed {
    References,
    Quantity,
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_columns() -> Vec<BomColumn> {
    ["References", "Value", "Footprint", "Quantity"]
        .into_iter()
        .map(BomColumn::new)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BomOptions {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_columns")]
    pub columns: Vec<BomColumn>,
    #[serde(default)]
    pub include_dnf: bool,
    #[serde(default)]
    pub conf: Option<String>,
    #[serde(flatten)]
    pub variant: VariantOptions,
}

/// Components sharing every non-computed column.
struct Group<'a> {
    key: Vec<&'a str>,
    fitted: bool,
    references: Vec<&'a str>,
}

impl BomOptions {
    /// Rows of the BoM: fitted groups first, each group ordered by its
    /// first reference in natural order.
    pub fn rows(&self, components: &[Component]) -> Vec<Vec<String>> {
        let mut listed: Vec<&Component> = components
            .iter()
            .filter(|c| c.included && (c.fitted || self.include_dnf))
            .collect();
        listed.sort_by(|a, b| natord::compare(&a.reference, &b.reference));

        let mut groups: Vec<Group> = Vec::new();
        for component in listed {
            let key: Vec<&str> = self
                .columns
                .iter()
                .filter(|col| col.computed().is_none())
                .map(|col| component.column(&col.field).unwrap_or_default())
                .collect();
            match groups
                .iter_mut()
                .find(|g| g.fitted == component.fitted && g.key == key)
            {
                Some(group) => group.references.push(component.reference.as_str()),
                None => groups.push(Group {
                    key,
                    fitted: component.fitted,
                    references: vec![component.reference.as_str()],
                }),
            }
        }
        groups.sort_by_key(|g| !g.fitted);

        groups
            .iter()
            .map(|group| {
                let mut values = group.key.iter();
                self.columns
                    .iter()
                    .map(|col| match col.computed() {
                        Some(Computed::References) => group.references.join(" "),
                        Some(Computed::Quantity) if group.fitted => {
                            group.references.len().to_string()
                        }
                        Some(Computed::Quantity) => "DNF".to_string(),
                        None => values.next().copied().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}

impl Configure for BomOptions {
    const SCHEMA: &'static Schema = &SCHEMA;

    fn configure(tree: &OptionTree, context: &str) -> Result<Self> {
        let options: BomOptions = SCHEMA.instantiate(tree, context)?;
        if options.separator.len() != 1 {
            return Err(ConfigError::InvalidValue {
                context: context.to_string(),
                key: "separator".to_string(),
                expected: "a single character".to_string(),
                found: format!("`{}`", options.separator),
            });
        }
        if options.columns.is_empty() {
            return Err(ConfigError::InvalidValue {
                context: context.to_string(),
                key: "columns".to_string(),
                expected: "at least one column".to_string(),
                found: "an empty list".to_string(),
            });
        }
        Ok(options)
    }
}

impl Output for BomOptions {
    fn selection(&self) -> Selection {
        self.variant.selection()
    }

    fn transform(&self) -> TransformOptions {
        TransformOptions {
            title: self.variant.title.clone(),
            ..TransformOptions::default()
        }
    }

    fn targets(&self, dir: &Path, namer: &FileNamer) -> Vec<PathBuf> {
        vec![dir.join(namer.expand(&self.output, "bom", "csv"))]
    }

    fn dependencies(&self) -> Vec<PathBuf> {
        self.conf
            .iter()
            .filter(|c| !c.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let target = ctx.targets.first().context("No target for the BoM")?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.separator.as_bytes()[0])
            .from_path(target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        writer.write_record(self.columns.iter().map(BomColumn::header))?;
        let rows = self.rows(ctx.components);
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        log::info!("Wrote {} BoM rows to {}", rows.len(), target.display());
        Ok(())
    }
}
