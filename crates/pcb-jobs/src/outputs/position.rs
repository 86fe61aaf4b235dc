use std::path::{Path, PathBuf};

use anyhow::Context;
use pcb_board::{Board, Footprint, Side, TransformOptions};
use pcb_variant::{Component, Selection};
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
    name: "position",
    doc: "Pick and place file in CSV format, fitted components only.",
    fields: &[
        OUTPUT_FIELD,
        FieldSpec::new(
            "units",
            FieldKind::Choice(&["millimeters", "inches"]),
            Some("'millimeters'"),
            "Units for the coordinates.",
        ),
        FieldSpec::new(
            "separate_files_for_front_and_back",
            FieldKind::Bool,
            Some("true"),
            "Generate two files, one per side.",
        ),
        VARIANT_FIELD,
        DNF_FILTER_FIELD,
        TITLE_FIELD,
    ],
    strict: true,
};

const HEADER: [&str; 7] = ["Ref", "Val", "Package", "PosX", "PosY", "Rot", "Side"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Millimeters,
    Inches,
}

impl Units {
    /// Nanometres to this unit, formatted the way KiCad writes positions.
    fn format(self, nm: i64) -> String {
        let value = match self {
            Units::Millimeters => nm as f64 / 1_000_000.0,
            Units::Inches => nm as f64 / 25_400_000.0,
        };
        format!("{value:.4}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PositionOptions {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default)]
    pub units: Units,
    #[serde(default = "default_true")]
    pub separate_files_for_front_and_back: bool,
    #[serde(flatten)]
    pub variant: VariantOptions,
}

impl PositionOptions {
    /// Placed footprints of one side (or both), in natural reference order.
    fn placed<'a>(
        board: &'a Board,
        components: &[Component],
        side: Option<Side>,
    ) -> Vec<&'a Footprint> {
        let mut footprints: Vec<&Footprint> = board
            .footprints
            .iter()
            .filter(|fp| side.is_none_or(|s| fp.side == s))
            .filter(|fp| {
                components
                    .iter()
                    .any(|c| c.reference == fp.reference && c.is_placed())
            })
            .collect();
        footprints.sort_by(|a, b| natord::compare(&a.reference, &b.reference));
        footprints
    }

    pub fn row(&self, fp: &Footprint) -> Vec<String> {
        let side = match fp.side {
            Side::Front => "top",
            Side::Back => "bottom",
        };
        vec![
            fp.reference.clone(),
            fp.value.clone(),
            fp.footprint.clone(),
            self.units.format(fp.position.x),
            // Y grows upwards in position files
            self.units.format(-fp.position.y),
            format!("{:.4}", fp.rotation),
            side.to_string(),
        ]
    }

    fn write(&self, path: &Path, footprints: &[&Footprint]) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(HEADER)?;
        for fp in footprints {
            writer.write_record(self.row(fp))?;
        }
        writer.flush()?;
        log::info!("Wrote {} positions to {}", footprints.len(), path.display());
        Ok(())
    }
}

impl Configure for PositionOptions {
    const SCHEMA: &'static Schema = &SCHEMA;

    fn configure(tree: &OptionTree, context: &str) -> Result<Self> {
        SCHEMA.instantiate(tree, context)
    }
}

impl Output for PositionOptions {
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
        let ids: &[&str] = if self.separate_files_for_front_and_back {
            &["top_pos", "bottom_pos"]
        } else {
            &["both_pos"]
        };
        ids.iter()
            .map(|id| dir.join(namer.expand(&self.output, id, "csv")))
            .collect()
    }

    fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        if self.separate_files_for_front_and_back {
            let [front, back] = ctx.targets else {
                anyhow::bail!("Expected one target per side, got {}", ctx.targets.len());
            };
            self.write(front, &Self::placed(ctx.board, ctx.components, Some(Side::Front)))?;
            self.write(back, &Self::placed(ctx.board, ctx.components, Some(Side::Back)))
        } else {
            let target = ctx.targets.first().context("No target for the position file")?;
            self.write(target, &Self::placed(ctx.board, ctx.components, None))
        }
    }
}
