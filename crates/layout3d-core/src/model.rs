//! In-memory layout library, as handed over by an external layout parser.
//!
//! Coordinates are kept in database units. The core never reads raw layout bytes;
//! it only walks these types.

use crate::geom::Vec2;
use serde::{Deserialize, Serialize};

/// Source layer/datatype pair carried by every non-reference element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerKey {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerKey {
    pub const fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }
}

/// Placement transform of a reference: mirror about local X, then magnify,
/// rotate (degrees, counter-clockwise), then translate by the reference origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strans {
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(default = "unit_magnification")]
    pub magnification: f64,
    #[serde(default)]
    pub angle_deg: f64,
}

fn unit_magnification() -> f64 {
    1.0
}

impl Default for Strans {
    fn default() -> Self {
        Self {
            mirror_x: false,
            magnification: 1.0,
            angle_deg: 0.0,
        }
    }
}

/// End-cap style of a path element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PathType {
    /// Type 0: the outline ends exactly at the centerline endpoints.
    #[default]
    Flush,
    /// Type 1: half-circle caps of radius `width/2`.
    Round,
    /// Type 2: outline extended by `width/2` past each endpoint.
    Square,
    /// Type 4: outline extended by the explicit begin/end extensions.
    Custom,
}

impl PathType {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PathType::Round,
            2 => PathType::Square,
            4 => PathType::Custom,
            _ => PathType::Flush,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub key: LayerKey,
    pub points: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathElement {
    pub key: LayerKey,
    pub points: Vec<Vec2>,
    pub width: f64,
    #[serde(default)]
    pub path_type: PathType,
    #[serde(default)]
    pub begin_extension: Option<f64>,
    #[serde(default)]
    pub end_extension: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub key: LayerKey,
    pub text: String,
    pub position: Vec2,
    #[serde(default)]
    pub strans: Strans,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    pub key: LayerKey,
    pub points: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureRef {
    pub name: String,
    pub origin: Vec2,
    #[serde(default)]
    pub strans: Strans,
}

/// A `columns x rows` lattice of references. `col_corner` and `row_corner` are the
/// lattice endpoints one full span away from `origin` along each axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayRef {
    pub name: String,
    pub columns: u16,
    pub rows: u16,
    pub origin: Vec2,
    pub col_corner: Vec2,
    pub row_corner: Vec2,
    #[serde(default)]
    pub strans: Strans,
}

impl ArrayRef {
    /// Origin of instance `(col, row)`, both zero-based.
    pub fn instance_origin(&self, col: u16, row: u16) -> Vec2 {
        let cols = f64::from(self.columns.max(1));
        let rows = f64::from(self.rows.max(1));
        let i = f64::from(col);
        let j = f64::from(row);
        Vec2::new(
            self.origin.x
                + i * (self.col_corner.x - self.origin.x) / cols
                + j * (self.row_corner.x - self.origin.x) / rows,
            self.origin.y
                + i * (self.col_corner.y - self.origin.y) / cols
                + j * (self.row_corner.y - self.origin.y) / rows,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeometryElement {
    Boundary(Boundary),
    Path(PathElement),
    Text(TextElement),
    Box(Boundary),
    Node(NodeElement),
    StructureRef(StructureRef),
    ArrayRef(ArrayRef),
}

impl GeometryElement {
    pub fn layer_key(&self) -> Option<LayerKey> {
        match self {
            GeometryElement::Boundary(b) | GeometryElement::Box(b) => Some(b.key),
            GeometryElement::Path(p) => Some(p.key),
            GeometryElement::Text(t) => Some(t.key),
            GeometryElement::Node(n) => Some(n.key),
            GeometryElement::StructureRef(_) | GeometryElement::ArrayRef(_) => None,
        }
    }

    /// Name of the referenced structure for SREF/AREF elements.
    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            GeometryElement::StructureRef(r) => Some(&r.name),
            GeometryElement::ArrayRef(a) => Some(&a.name),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            GeometryElement::Boundary(_) => "boundary",
            GeometryElement::Path(_) => "path",
            GeometryElement::Text(_) => "text",
            GeometryElement::Box(_) => "box",
            GeometryElement::Node(_) => "node",
            GeometryElement::StructureRef(_) => "sref",
            GeometryElement::ArrayRef(_) => "aref",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub elements: Vec<GeometryElement>,
}

impl Structure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: GeometryElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default = "default_user_units")]
    pub user_units_per_db_unit: f64,
    pub structures: Vec<Structure>,
}

fn default_user_units() -> f64 {
    1e-3
}

impl Library {
    pub fn new(name: impl Into<String>, structures: Vec<Structure>) -> Self {
        Self {
            name: name.into(),
            user_units_per_db_unit: default_user_units(),
            structures,
        }
    }

    pub fn structure_index(&self, name: &str) -> Option<usize> {
        self.structures.iter().position(|s| s.name == name)
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.name == name)
    }

    /// Structures never referenced by any other structure, in library order.
    pub fn top_structures(&self) -> Vec<&Structure> {
        let mut referenced = std::collections::HashSet::new();
        for s in &self.structures {
            for e in &s.elements {
                if let Some(name) = e.referenced_name() {
                    if name != s.name {
                        referenced.insert(name);
                    }
                }
            }
        }
        self.structures
            .iter()
            .filter(|s| !referenced.contains(s.name.as_str()))
            .collect()
    }
}
