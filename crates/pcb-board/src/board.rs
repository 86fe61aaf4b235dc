use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use pcb_variant::Component;
use serde::{Deserialize, Serialize};

use crate::document::{BoardDocument, FootprintId, GraphicId, GraphicInfo, PadId};
use crate::geometry::{Point, Shape};
use crate::layer::{Layer, LayerSet};
use crate::{BoardError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Front,
    Back,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    pub number: String,
    pub layers: LayerSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graphic {
    #[serde(skip)]
    pub id: GraphicId,
    pub layer: Layer,
    #[serde(flatten)]
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Footprint {
    pub reference: String,
    #[serde(default)]
    pub value: String,
    /// Library footprint name, e.g. `Resistor_SMD:R_0603_1608Metric`
    #[serde(default)]
    pub footprint: String,
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub position: Point,
    /// Degrees, counter-clockwise
    #[serde(default)]
    pub rotation: f64,
    /// Do-not-populate flag from the design
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dnp: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub pads: Vec<Pad>,
    #[serde(default)]
    pub graphics: Vec<Graphic>,
}

impl Footprint {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            value: String::new(),
            footprint: String::new(),
            side: Side::Front,
            position: Point::default(),
            rotation: 0.0,
            dnp: false,
            fields: BTreeMap::new(),
            pads: Vec::new(),
            graphics: Vec::new(),
        }
    }

    /// Component view of the footprint: `Value` and `Footprint` columns are
    /// always present, `fitted` follows the DNP flag.
    pub fn component(&self) -> Component {
        let mut component = Component::new(&self.reference).with_fitted(!self.dnp);
        component.fields = self.fields.clone();
        component
            .fields
            .entry("Value".to_string())
            .or_insert_with(|| self.value.clone());
        component
            .fields
            .entry("Footprint".to_string())
            .or_insert_with(|| self.footprint.clone());
        component
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBoard {
    #[serde(default)]
    title: String,
    #[serde(default)]
    footprints: Vec<Footprint>,
}

/// In-memory board document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub title: String,
    pub footprints: Vec<Footprint>,
    #[serde(skip)]
    next_graphic: u64,
}

impl Board {
    /// Build a board, assigning graphic handles and checking that
    /// references are unique.
    pub fn new(title: impl Into<String>, footprints: Vec<Footprint>) -> Result<Self> {
        let mut seen = HashSet::new();
        for fp in &footprints {
            if !seen.insert(fp.reference.as_str()) {
                return Err(BoardError::DuplicateReference(fp.reference.clone()));
            }
        }
        let mut footprints = footprints;
        let mut next_graphic = 0;
        for graphic in footprints.iter_mut().flat_map(|fp| fp.graphics.iter_mut()) {
            next_graphic += 1;
            graphic.id = GraphicId(next_graphic);
        }
        Ok(Board {
            title: title.into(),
            footprints,
            next_graphic,
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawBoard = serde_json::from_str(content)?;
        Board::new(raw.title, raw.footprints)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Board::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn footprint(&self, id: FootprintId) -> &Footprint {
        &self.footprints[id.0]
    }

    pub fn find(&self, reference: &str) -> Option<&Footprint> {
        self.footprints.iter().find(|fp| fp.reference == reference)
    }

    fn graphic_mut(&mut self, id: GraphicId) -> Result<&mut Graphic> {
        self.footprints
            .iter_mut()
            .flat_map(|fp| fp.graphics.iter_mut())
            .find(|g| g.id == id)
            .ok_or(BoardError::UnknownGraphic(id.0))
    }

    fn pad_mut(&mut self, pad: PadId) -> Result<&mut Pad> {
        self.footprints
            .get_mut(pad.footprint.0)
            .and_then(|fp| fp.pads.get_mut(pad.index))
            .ok_or(BoardError::UnknownPad {
                footprint: pad.footprint.0,
                index: pad.index,
            })
    }
}

impl BoardDocument for Board {
    fn footprints(&self) -> Vec<FootprintId> {
        (0..self.footprints.len()).map(FootprintId).collect()
    }

    fn reference(&self, footprint: FootprintId) -> &str {
        &self.footprints[footprint.0].reference
    }

    fn components(&self) -> Vec<Component> {
        self.footprints.iter().map(Footprint::component).collect()
    }

    fn graphics(&self, footprint: FootprintId) -> Vec<GraphicInfo> {
        self.footprints[footprint.0]
            .graphics
            .iter()
            .map(|g| GraphicInfo {
                id: g.id,
                layer: g.layer,
                bbox: g.shape.bbox(),
            })
            .collect()
    }

    fn graphic_layer(&self, graphic: GraphicId) -> Result<Layer> {
        self.footprints
            .iter()
            .flat_map(|fp| fp.graphics.iter())
            .find(|g| g.id == graphic)
            .map(|g| g.layer)
            .ok_or(BoardError::UnknownGraphic(graphic.0))
    }

    fn set_graphic_layer(&mut self, graphic: GraphicId, layer: Layer) -> Result<()> {
        self.graphic_mut(graphic)?.layer = layer;
        Ok(())
    }

    fn add_graphic(&mut self, footprint: FootprintId, layer: Layer, shape: Shape) -> GraphicId {
        self.next_graphic += 1;
        let id = GraphicId(self.next_graphic);
        self.footprints[footprint.0]
            .graphics
            .push(Graphic { id, layer, shape });
        id
    }

    fn remove_graphic(&mut self, graphic: GraphicId) -> Result<()> {
        for fp in &mut self.footprints {
            if let Some(pos) = fp.graphics.iter().position(|g| g.id == graphic) {
                fp.graphics.remove(pos);
                return Ok(());
            }
        }
        Err(BoardError::UnknownGraphic(graphic.0))
    }

    fn pads(&self, footprint: FootprintId) -> Vec<PadId> {
        (0..self.footprints[footprint.0].pads.len())
            .map(|index| PadId { footprint, index })
            .collect()
    }

    fn pad_layers(&self, pad: PadId) -> Result<LayerSet> {
        self.footprints
            .get(pad.footprint.0)
            .and_then(|fp| fp.pads.get(pad.index))
            .map(|p| p.layers)
            .ok_or(BoardError::UnknownPad {
                footprint: pad.footprint.0,
                index: pad.index,
            })
    }

    fn set_pad_layers(&mut self, pad: PadId, layers: LayerSet) -> Result<()> {
        self.pad_mut(pad)?.layers = layers;
        Ok(())
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn set_title(&mut self, title: String) {
        self.title = title;
    }
}
