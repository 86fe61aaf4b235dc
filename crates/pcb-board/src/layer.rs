use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::BoardError;

/// A board layer, numbered the way KiCad 9 numbers them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Layer(u8);

/// (id, canonical name, long alias)
static NAMED_LAYERS: &[(u8, &str, Option<&str>)] = &[
    (0, "F.Cu", None),
    (1, "F.Mask", None),
    (2, "B.Cu", None),
    (3, "B.Mask", None),
    (5, "F.SilkS", Some("F.Silkscreen")),
    (7, "B.SilkS", Some("B.Silkscreen")),
    (9, "F.Adhes", Some("F.Adhesive")),
    (11, "B.Adhes", Some("B.Adhesive")),
    (13, "F.Paste", None),
    (15, "B.Paste", None),
    (17, "Dwgs.User", Some("User.Drawings")),
    (19, "Cmts.User", Some("User.Comments")),
    (21, "Eco1.User", Some("User.Eco1")),
    (23, "Eco2.User", Some("User.Eco2")),
    (25, "Edge.Cuts", None),
    (27, "Margin", None),
    (29, "B.CrtYd", Some("B.Courtyard")),
    (31, "F.CrtYd", Some("F.Courtyard")),
    (33, "B.Fab", None),
    (35, "F.Fab", None),
    (37, "Rescue", None),
];

const MAX_INNER: u8 = 30;
const MAX_USER: u8 = 44;

impl Layer {
    pub const F_CU: Layer = Layer(0);
    pub const F_MASK: Layer = Layer(1);
    pub const B_CU: Layer = Layer(2);
    pub const B_MASK: Layer = Layer(3);
    pub const F_SILKS: Layer = Layer(5);
    pub const B_SILKS: Layer = Layer(7);
    pub const F_ADHES: Layer = Layer(9);
    pub const B_ADHES: Layer = Layer(11);
    pub const F_PASTE: Layer = Layer(13);
    pub const B_PASTE: Layer = Layer(15);
    pub const EDGE_CUTS: Layer = Layer(25);
    pub const B_FAB: Layer = Layer(33);
    pub const F_FAB: Layer = Layer(35);
    pub const RESCUE: Layer = Layer(37);

    /// Inner copper layer `In<n>.Cu`, `n` in `1..=30`.
    pub fn inner_copper(n: u8) -> Option<Layer> {
        (1..=MAX_INNER).contains(&n).then(|| Layer(2 + 2 * n))
    }

    /// User layer `User.<n>`, `n` in `1..=44`.
    pub fn user(n: u8) -> Option<Layer> {
        (1..=MAX_USER).contains(&n).then(|| Layer(37 + 2 * n))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    pub fn name(self) -> String {
        if let Some((_, name, _)) = NAMED_LAYERS.iter().find(|(id, _, _)| *id == self.0) {
            return name.to_string();
        }
        if self.0 % 2 == 0 {
            format!("In{}.Cu", (self.0 - 2) / 2)
        } else {
            format!("User.{}", (self.0 - 37) / 2)
        }
    }
}

impl FromStr for Layer {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((id, _, _)) = NAMED_LAYERS
            .iter()
            .find(|(_, name, alias)| *name == s || *alias == Some(s))
        {
            return Ok(Layer(*id));
        }
        let numbered = if let Some(n) = s.strip_prefix("In").and_then(|r| r.strip_suffix(".Cu")) {
            n.parse().ok().and_then(Layer::inner_copper)
        } else if let Some(n) = s.strip_prefix("User.") {
            n.parse().ok().and_then(Layer::user)
        } else {
            None
        };
        numbered.ok_or_else(|| BoardError::UnknownLayer(s.to_string()))
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer({})", self.name())
    }
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A set of layers as a bit mask indexed by layer id.
///
/// The mask round-trips exactly through [`LayerSet::to_hex`] and
/// [`LayerSet::from_hex`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LayerSet(u128);

impl LayerSet {
    pub const fn new() -> Self {
        LayerSet(0)
    }

    pub fn contains(self, layer: Layer) -> bool {
        self.0 & (1 << layer.0) != 0
    }

    pub fn insert(&mut self, layer: Layer) {
        self.0 |= 1 << layer.0;
    }

    pub fn remove(&mut self, layer: Layer) {
        self.0 &= !(1 << layer.0);
    }

    pub fn remove_all(&mut self, other: LayerSet) {
        self.0 &= !other.0;
    }

    pub fn intersects(self, other: LayerSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Layers in id order.
    pub fn iter(self) -> impl Iterator<Item = Layer> {
        (0..128u8)
            .filter(move |id| self.0 & (1 << id) != 0)
            .map(Layer)
    }

    pub fn to_hex(self) -> String {
        format!("{:032x}", self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, BoardError> {
        u128::from_str_radix(hex, 16)
            .map(LayerSet)
            .map_err(|_| BoardError::InvalidLayerSet(hex.to_string()))
    }
}

impl FromIterator<Layer> for LayerSet {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        let mut set = LayerSet::new();
        for layer in iter {
            set.insert(layer);
        }
        set
    }
}

impl fmt::Debug for LayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|l| l.name())).finish()
    }
}

impl Serialize for LayerSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for LayerSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let layers = Vec::<Layer>::deserialize(deserializer)?;
        Ok(layers.into_iter().collect())
    }
}
