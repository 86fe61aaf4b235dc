//! Board document model and the reversible variant transformer.
//!
//! [`BoardDocument`] is the interface the transformer needs from a design
//! document; [`Board`] is the in-memory implementation used by the rest of
//! the workspace. Every transformation returns a typed journal that the
//! matching restore call consumes, so a document always goes back to the
//! exact state it had before a job touched it.

mod board;
mod document;
mod geometry;
mod journal;
mod layer;
mod transform;

pub use board::{Board, Footprint, Graphic, Pad, Side};
pub use document::{BoardDocument, FootprintId, GraphicId, GraphicInfo, PadId};
pub use geometry::{Point, Rect, Shape};
pub use journal::{Edit, EditJournal};
pub use layer::{Layer, LayerSet};
pub use transform::{
    CROSS_WIDTH, CrossJournal, FabJournal, SolderJournal, TitleJournal, TransformOptions,
    VariantEdits, VariantGuard, apply_variant, mark_excluded, restore_fab_layers,
    restore_solder_layers, restore_title, retitle, strip_fab_layers, strip_solder_layers,
    undo_variant, unmark_excluded,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse board: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate component reference `{0}` on the board")]
    DuplicateReference(String),

    #[error("Unknown layer `{0}`")]
    UnknownLayer(String),

    #[error("Invalid layer set encoding `{0}`")]
    InvalidLayerSet(String),

    #[error("No graphic item with id {0}")]
    UnknownGraphic(u64),

    #[error("No pad {index} in footprint #{footprint}")]
    UnknownPad { footprint: usize, index: usize },
}

pub type Result<T> = std::result::Result<T, BoardError>;
