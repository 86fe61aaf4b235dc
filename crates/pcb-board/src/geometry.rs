use serde::{Deserialize, Serialize};

/// A point in board coordinates, nanometres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl Rect {
    pub fn from_points(a: Point, b: Point) -> Self {
        Self {
            x1: a.x.min(b.x),
            y1: a.y.min(b.y),
            x2: a.x.max(b.x),
            y2: a.y.max(b.y),
        }
    }

    pub fn union(self, other: Rect) -> Rect {
        Rect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn top_left(self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn bottom_right(self) -> Point {
        Point::new(self.x2, self.y2)
    }

    pub fn bottom_left(self) -> Point {
        Point::new(self.x1, self.y2)
    }

    pub fn top_right(self) -> Point {
        Point::new(self.x2, self.y1)
    }
}

/// Geometry of a footprint graphic item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Line {
        start: Point,
        end: Point,
        width: i64,
    },
    Rect {
        start: Point,
        end: Point,
        width: i64,
    },
    Circle {
        center: Point,
        radius: i64,
        width: i64,
    },
    Polygon {
        points: Vec<Point>,
        width: i64,
    },
    Text {
        text: String,
        at: Point,
    },
}

impl Shape {
    /// Bounding box of the drawing. Text has none: it never contributes to
    /// a component's graphical outline.
    pub fn bbox(&self) -> Option<Rect> {
        match self {
            Shape::Line { start, end, .. } | Shape::Rect { start, end, .. } => {
                Some(Rect::from_points(*start, *end))
            }
            Shape::Circle { center, radius, .. } => Some(Rect {
                x1: center.x.saturating_sub(*radius),
                y1: center.y.saturating_sub(*radius),
                x2: center.x.saturating_add(*radius),
                y2: center.y.saturating_add(*radius),
            }),
            Shape::Polygon { points, .. } => {
                let first = points.first()?;
                Some(
                    points
                        .iter()
                        .fold(Rect::from_points(*first, *first), |r, p| {
                            r.union(Rect::from_points(*p, *p))
                        }),
                )
            }
            Shape::Text { .. } => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Shape::Text { .. })
    }
}
