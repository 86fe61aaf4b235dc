//! Reversible variant transformations of a shared board document.
//!
//! Each `apply` call returns a typed journal that only its matching
//! `restore` call accepts. All `apply` calls are no-ops returning an empty
//! journal when there is no partition, so callers never need to check
//! whether a variant was configured.

use std::ops::{Deref, DerefMut};

use pcb_variant::{Component, Partition};

use crate::document::{BoardDocument, FootprintId};
use crate::geometry::{Rect, Shape};
use crate::journal::{Edit, EditJournal};
use crate::layer::{Layer, LayerSet};
use crate::Result;

/// Width of the lines crossing out a not-fitted component, nanometres.
pub const CROSS_WIDTH: i64 = 120_000;

macro_rules! journal_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq)]
        #[must_use = "a journal must be handed back to undo its edits"]
        pub struct $name(EditJournal);

        impl $name {
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn journal(&self) -> &EditJournal {
                &self.0
            }
        }
    };
}

journal_type!(
    /// Crosses drawn over not-fitted components.
    CrossJournal
);
journal_type!(
    /// Paste removed from pads and glue moved off the adhesive layers.
    SolderJournal
);
journal_type!(
    /// Fabrication drawings of excluded components moved away.
    FabJournal
);
journal_type!(
    /// Title block text replaced.
    TitleJournal
);

/// Component the partition holds for a footprint, if any.
fn component_for<'p, D: BoardDocument + ?Sized>(
    doc: &D,
    partition: &'p Partition,
    footprint: FootprintId,
) -> Option<&'p Component> {
    partition.get(doc.reference(footprint))
}

/// Run `edit` with a fresh journal; on failure undo whatever it recorded.
fn journaled<D, F>(doc: &mut D, edit: F) -> Result<EditJournal>
where
    D: BoardDocument + ?Sized,
    F: FnOnce(&mut D, &mut EditJournal) -> Result<()>,
{
    let mut journal = EditJournal::new();
    match edit(doc, &mut journal) {
        Ok(()) => Ok(journal),
        Err(e) => {
            if let Err(undo_err) = journal.undo(doc) {
                log::error!("Rollback after failed board edit also failed: {undo_err}");
            }
            Err(e)
        }
    }
}

/// Cross out every included but not fitted component on the fab layers.
///
/// The cross spans the bounding box of the footprint's drawings (text is
/// ignored) on each fab layer that has any.
pub fn mark_excluded<D: BoardDocument + ?Sized>(
    doc: &mut D,
    partition: Option<&Partition>,
) -> CrossJournal {
    let mut journal = EditJournal::new();
    let Some(partition) = partition else {
        return CrossJournal(journal);
    };
    for footprint in doc.footprints() {
        if !component_for(doc, partition, footprint).is_some_and(Component::is_dnf) {
            continue;
        }
        let graphics = doc.graphics(footprint);
        for fab in [Layer::F_FAB, Layer::B_FAB] {
            let Some(rect) = graphics
                .iter()
                .filter(|g| g.layer == fab)
                .filter_map(|g| g.bbox)
                .reduce(Rect::union)
            else {
                continue;
            };
            let diagonals = [
                (rect.top_left(), rect.bottom_right()),
                (rect.bottom_left(), rect.top_right()),
            ];
            for (start, end) in diagonals {
                let shape = Shape::Line {
                    start,
                    end,
                    width: CROSS_WIDTH,
                };
                let graphic = doc.add_graphic(footprint, fab, shape);
                journal.record(Edit::GraphicAdded { footprint, graphic });
            }
        }
    }
    CrossJournal(journal)
}

pub fn unmark_excluded<D: BoardDocument + ?Sized>(doc: &mut D, journal: CrossJournal) -> Result<()> {
    journal.0.undo(doc)
}

/// Take not-fitted components out of the paste and adhesive layers.
///
/// Paste layers are removed from every pad; a pad left on no layer at all
/// gets the mask layer of its side. Adhesive drawings move to `work_layer`.
pub fn strip_solder_layers<D: BoardDocument + ?Sized>(
    doc: &mut D,
    partition: Option<&Partition>,
    work_layer: Layer,
) -> Result<SolderJournal> {
    let Some(partition) = partition else {
        return Ok(SolderJournal::default());
    };
    let paste: LayerSet = [Layer::F_PASTE, Layer::B_PASTE].into_iter().collect();
    journaled(doc, |doc, journal| {
        for footprint in doc.footprints() {
            if !component_for(doc, partition, footprint).is_some_and(Component::is_dnf) {
                continue;
            }
            for pad in doc.pads(footprint) {
                let previous = doc.pad_layers(pad)?;
                if !previous.intersects(paste) {
                    continue;
                }
                let mut layers = previous;
                layers.remove_all(paste);
                if layers.is_empty() {
                    let mask = if previous.contains(Layer::F_PASTE) {
                        Layer::F_MASK
                    } else {
                        Layer::B_MASK
                    };
                    layers.insert(mask);
                    log::warn!(
                        "Pad with solder paste, but no copper or solder mask aperture in {}",
                        doc.reference(footprint)
                    );
                }
                doc.set_pad_layers(pad, layers)?;
                journal.record(Edit::PadLayers { pad, previous });
            }
            for graphic in doc.graphics(footprint) {
                if graphic.layer == Layer::F_ADHES || graphic.layer == Layer::B_ADHES {
                    doc.set_graphic_layer(graphic.id, work_layer)?;
                    journal.record(Edit::GraphicMoved {
                        graphic: graphic.id,
                        previous: graphic.layer,
                    });
                }
            }
        }
        Ok(())
    })
    .map(SolderJournal)
}

pub fn restore_solder_layers<D: BoardDocument + ?Sized>(
    doc: &mut D,
    journal: SolderJournal,
) -> Result<()> {
    journal.0.undo(doc)
}

/// Move the fab drawings of components not included at all to `work_layer`.
pub fn strip_fab_layers<D: BoardDocument + ?Sized>(
    doc: &mut D,
    partition: Option<&Partition>,
    work_layer: Layer,
) -> Result<FabJournal> {
    let Some(partition) = partition else {
        return Ok(FabJournal::default());
    };
    journaled(doc, |doc, journal| {
        for footprint in doc.footprints() {
            if component_for(doc, partition, footprint).is_none_or(|c| c.included) {
                continue;
            }
            for graphic in doc.graphics(footprint) {
                if graphic.layer == Layer::F_FAB || graphic.layer == Layer::B_FAB {
                    doc.set_graphic_layer(graphic.id, work_layer)?;
                    journal.record(Edit::GraphicMoved {
                        graphic: graphic.id,
                        previous: graphic.layer,
                    });
                }
            }
        }
        Ok(())
    })
    .map(FabJournal)
}

pub fn restore_fab_layers<D: BoardDocument + ?Sized>(doc: &mut D, journal: FabJournal) -> Result<()> {
    journal.0.undo(doc)
}

/// Replace the title block text. A leading `+` appends to the current title.
///
/// `None` or an empty text leaves the title alone.
pub fn retitle<D: BoardDocument + ?Sized>(doc: &mut D, text: Option<&str>) -> TitleJournal {
    let mut journal = EditJournal::new();
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        let previous = doc.title().to_string();
        let title = match text.strip_prefix('+') {
            Some(suffix) => format!("{previous}{suffix}"),
            None => text.to_string(),
        };
        doc.set_title(title);
        journal.record(Edit::Title { previous });
    }
    TitleJournal(journal)
}

pub fn restore_title<D: BoardDocument + ?Sized>(doc: &mut D, journal: TitleJournal) -> Result<()> {
    journal.0.undo(doc)
}

/// Which transformations a job wants applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub cross_dnf: bool,
    pub strip_paste: bool,
    pub strip_fab: bool,
    /// Scratch layer receiving relocated drawings
    pub work_layer: Layer,
    pub title: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            cross_dnf: true,
            strip_paste: true,
            strip_fab: true,
            work_layer: Layer::RESCUE,
            title: None,
        }
    }
}

/// The four journals of one job, undone together.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "variant edits must be undone with `undo_variant`"]
pub struct VariantEdits {
    pub crosses: CrossJournal,
    pub solder: SolderJournal,
    pub fab: FabJournal,
    pub title: TitleJournal,
}

impl VariantEdits {
    pub fn is_empty(&self) -> bool {
        self.crosses.is_empty()
            && self.solder.is_empty()
            && self.fab.is_empty()
            && self.title.is_empty()
    }
}

fn apply_steps<D: BoardDocument + ?Sized>(
    doc: &mut D,
    partition: Option<&Partition>,
    options: &TransformOptions,
    edits: &mut VariantEdits,
) -> Result<()> {
    if options.cross_dnf {
        edits.crosses = mark_excluded(doc, partition);
    }
    if options.strip_paste {
        edits.solder = strip_solder_layers(doc, partition, options.work_layer)?;
    }
    if options.strip_fab {
        edits.fab = strip_fab_layers(doc, partition, options.work_layer)?;
    }
    edits.title = retitle(doc, options.title.as_deref());
    Ok(())
}

/// Apply every transformation a job asked for.
///
/// If a step fails, the steps already applied are undone before the error
/// is returned.
pub fn apply_variant<D: BoardDocument + ?Sized>(
    doc: &mut D,
    partition: Option<&Partition>,
    options: &TransformOptions,
) -> Result<VariantEdits> {
    let mut edits = VariantEdits::default();
    if let Err(e) = apply_steps(doc, partition, options, &mut edits) {
        if let Err(undo_err) = undo_variant(doc, edits) {
            log::error!("Rollback of partial variant edits failed: {undo_err}");
        }
        return Err(e);
    }
    Ok(edits)
}

/// Undo a job's edits, last applied first. Every journal is drained even if
/// one of them fails; the first failure is returned.
pub fn undo_variant<D: BoardDocument + ?Sized>(doc: &mut D, edits: VariantEdits) -> Result<()> {
    let VariantEdits {
        crosses,
        solder,
        fab,
        title,
    } = edits;
    let results = [
        restore_title(doc, title),
        restore_fab_layers(doc, fab),
        restore_solder_layers(doc, solder),
        unmark_excluded(doc, crosses),
    ];
    results.into_iter().collect()
}

/// Holds a document with a variant applied and undoes it when dropped.
///
/// The undo runs on every exit path: explicit [`VariantGuard::finish`],
/// early `?` returns and unwinding panics.
pub struct VariantGuard<'a, D: BoardDocument + ?Sized> {
    doc: &'a mut D,
    edits: Option<VariantEdits>,
}

impl<'a, D: BoardDocument + ?Sized> VariantGuard<'a, D> {
    pub fn apply(
        doc: &'a mut D,
        partition: Option<&Partition>,
        options: &TransformOptions,
    ) -> Result<Self> {
        let edits = apply_variant(doc, partition, options)?;
        Ok(Self {
            doc,
            edits: Some(edits),
        })
    }

    pub fn edits(&self) -> Option<&VariantEdits> {
        self.edits.as_ref()
    }

    /// Undo now and report the outcome.
    pub fn finish(mut self) -> Result<()> {
        match self.edits.take() {
            Some(edits) => undo_variant(&mut *self.doc, edits),
            None => Ok(()),
        }
    }
}

impl<D: BoardDocument + ?Sized> Deref for VariantGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.doc
    }
}

impl<D: BoardDocument + ?Sized> DerefMut for VariantGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.doc
    }
}

impl<D: BoardDocument + ?Sized> Drop for VariantGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(edits) = self.edits.take()
            && let Err(e) = undo_variant(&mut *self.doc, edits)
        {
            log::error!("Failed to restore the board after a job: {e}");
        }
    }
}
