use std::path::{Path, PathBuf};

use anyhow::Context;
use pcb_board::TransformOptions;
use pcb_variant::Selection;
use serde::Deserialize;

use super::{
    DNF_FILTER_FIELD, OUTPUT_FIELD, TITLE_FIELD, VARIANT_FIELD, VariantOptions, default_output,
    default_true,
};
use crate::expand::FileNamer;
use crate::options::{Configure, JobContext, Output};
use crate::schema::{FieldKind, FieldSpec, Schema};
use crate::tree::OptionTree;
use crate::Result;

static SCHEMA: Schema = Schema {
    name: "board_variant",
    doc: "Board document with the variant applied: not fitted parts crossed out and without paste or glue, excluded parts without fab drawings.",
    fields: &[
        OUTPUT_FIELD,
        FieldSpec::new(
            "cross_dnf",
            FieldKind::Bool,
            Some("true"),
            "Cross out not fitted components on the fab layers.",
        ),
        FieldSpec::new(
            "strip_paste",
            FieldKind::Bool,
            Some("true"),
            "Remove paste and glue of not fitted components.",
        ),
        FieldSpec::new(
            "strip_fab",
            FieldKind::Bool,
            Some("true"),
            "Hide the fab drawings of excluded components.",
        ),
        VARIANT_FIELD,
        DNF_FILTER_FIELD,
        TITLE_FIELD,
    ],
    strict: true,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardVariantOptions {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_true")]
    pub cross_dnf: bool,
    #[serde(default = "default_true")]
    pub strip_paste: bool,
    #[serde(default = "default_true")]
    pub strip_fab: bool,
    #[serde(flatten)]
    pub variant: VariantOptions,
}

impl Configure for BoardVariantOptions {
    const SCHEMA: &'static Schema = &SCHEMA;

    fn configure(tree: &OptionTree, context: &str) -> Result<Self> {
        SCHEMA.instantiate(tree, context)
    }
}

impl Output for BoardVariantOptions {
    fn selection(&self) -> Selection {
        self.variant.selection()
    }

    fn transform(&self) -> TransformOptions {
        TransformOptions {
            cross_dnf: self.cross_dnf,
            strip_paste: self.strip_paste,
            strip_fab: self.strip_fab,
            title: self.variant.title.clone(),
            ..TransformOptions::default()
        }
    }

    fn targets(&self, dir: &Path, namer: &FileNamer) -> Vec<PathBuf> {
        vec![dir.join(namer.expand(&self.output, "variant", "json"))]
    }

    fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let target = ctx.targets.first().context("No target for the board")?;
        std::fs::write(target, ctx.board.to_json()?)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        log::info!("Wrote board variant to {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transform_follows_options() {
        let options = BoardVariantOptions::configure(
            &json!({"strip_fab": false, "title": "+ (assembly)"}),
            "output `variant`",
        )
        .unwrap();
        let transform = options.transform();
        assert!(transform.cross_dnf);
        assert!(transform.strip_paste);
        assert!(!transform.strip_fab);
        assert_eq!(transform.title.as_deref(), Some("+ (assembly)"));
    }
}
