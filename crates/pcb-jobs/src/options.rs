//! Interfaces between the orchestrator and the concrete job types.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use pcb_board::{Board, TransformOptions};
use pcb_variant::{Component, Partition, Selection, Variant};

use crate::expand::FileNamer;
use crate::schema::Schema;
use crate::tree::OptionTree;
use crate::Result;

/// Typed options built from a flattened option tree.
pub trait Configure: Sized {
    const SCHEMA: &'static Schema;

    fn configure(tree: &OptionTree, context: &str) -> Result<Self>;
}

/// What an output writer gets while its variant is applied to the board.
#[derive(Debug)]
pub struct JobContext<'a> {
    pub job: &'a str,
    /// The board with the variant transformations applied
    pub board: &'a Board,
    /// Components as filtered for this job, in board order
    pub components: &'a [Component],
    pub partition: Option<&'a Partition>,
    pub variant: Option<&'a Variant>,
    pub targets: &'a [PathBuf],
    /// State left by the preflights
    pub run: &'a RunContext,
}

pub trait Output: Debug {
    /// Variant and DNF filter this output asked for.
    fn selection(&self) -> Selection {
        Selection::default()
    }

    /// Board transformations to apply around [`Output::run`].
    fn transform(&self) -> TransformOptions {
        TransformOptions::default()
    }

    /// Files this output writes into `dir`.
    fn targets(&self, dir: &Path, namer: &FileNamer) -> Vec<PathBuf>;

    /// Extra input files, besides the board and the configuration.
    fn dependencies(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn run(&self, ctx: &JobContext) -> anyhow::Result<()>;
}

/// State shared by the preflights of one run.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub out_dir: PathBuf,
    pub ignore_unconnected: bool,
    /// Error filter file written by the `filters` preflight
    pub filter_file: Option<PathBuf>,
}

pub trait Preflight: Debug {
    fn targets(&self, _out_dir: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    fn run(&self, ctx: &mut RunContext) -> anyhow::Result<()>;
}
