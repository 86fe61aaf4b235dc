use crate::document::{BoardDocument, FootprintId, GraphicId, PadId};
use crate::layer::{Layer, LayerSet};
use crate::Result;

/// One atomic, reversible document edit, holding what is needed to undo it.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// A graphic was added; undo removes it.
    GraphicAdded {
        footprint: FootprintId,
        graphic: GraphicId,
    },
    /// A graphic changed layer; undo puts it back on `previous`.
    GraphicMoved {
        graphic: GraphicId,
        previous: Layer,
    },
    /// A pad's layer set changed; undo restores `previous` verbatim.
    PadLayers { pad: PadId, previous: LayerSet },
    /// The title block text changed.
    Title { previous: String },
}

impl Edit {
    fn undo<D: BoardDocument + ?Sized>(self, doc: &mut D) -> Result<()> {
        match self {
            Edit::GraphicAdded { graphic, .. } => doc.remove_graphic(graphic),
            Edit::GraphicMoved { graphic, previous } => doc.set_graphic_layer(graphic, previous),
            Edit::PadLayers { pad, previous } => doc.set_pad_layers(pad, previous),
            Edit::Title { previous } => {
                doc.set_title(previous);
                Ok(())
            }
        }
    }
}

/// Ordered record of edits, undone last-in first-out.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "a journal must be handed back to undo its edits"]
pub struct EditJournal {
    edits: Vec<Edit>,
}

impl EditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Undo every edit in reverse order, draining the journal.
    ///
    /// Keeps going after a failed edit so the rest of the document is still
    /// restored; the first failure is returned.
    pub fn undo<D: BoardDocument + ?Sized>(mut self, doc: &mut D) -> Result<()> {
        let mut first_err = None;
        while let Some(edit) = self.edits.pop() {
            if let Err(e) = edit.undo(doc) {
                log::error!("Failed to undo board edit: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
