use pcb_variant::Component;

use crate::geometry::{Rect, Shape};
use crate::layer::{Layer, LayerSet};
use crate::Result;

/// Handle to a footprint. Footprints are never added or removed while a
/// document is being transformed, so the index stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FootprintId(pub usize);

/// Handle to a pad of a footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PadId {
    pub footprint: FootprintId,
    pub index: usize,
}

/// Handle to a graphic item; unique within a document for its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphicId(pub u64);

/// Snapshot of one graphic item of a footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicInfo {
    pub id: GraphicId,
    pub layer: Layer,
    /// `None` for text and other items without a graphical outline
    pub bbox: Option<Rect>,
}

/// What the variant transformer needs from a design document.
pub trait BoardDocument {
    /// Footprints in declaration order.
    fn footprints(&self) -> Vec<FootprintId>;

    fn reference(&self, footprint: FootprintId) -> &str;

    /// Components with their field tables, in declaration order.
    fn components(&self) -> Vec<Component>;

    fn graphics(&self, footprint: FootprintId) -> Vec<GraphicInfo>;

    fn graphic_layer(&self, graphic: GraphicId) -> Result<Layer>;

    fn set_graphic_layer(&mut self, graphic: GraphicId, layer: Layer) -> Result<()>;

    fn add_graphic(&mut self, footprint: FootprintId, layer: Layer, shape: Shape) -> GraphicId;

    fn remove_graphic(&mut self, graphic: GraphicId) -> Result<()>;

    fn pads(&self, footprint: FootprintId) -> Vec<PadId>;

    fn pad_layers(&self, pad: PadId) -> Result<LayerSet>;

    fn set_pad_layers(&mut self, pad: PadId, layers: LayerSet) -> Result<()>;

    fn title(&self) -> &str;

    fn set_title(&mut self, title: String);
}
