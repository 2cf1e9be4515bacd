use layout3d_core::geom::{BBox2, Polygon2D, Vec2};
use layout3d_core::layers::LayerRule;
use layout3d_core::model::{LayerKey, PathType};
use layout3d_core::report::LayerSummary;

/// Path attributes after placement; lengths already include magnification.
#[derive(Debug, Clone, PartialEq)]
pub struct PathGeometry {
    pub width: f64,
    pub path_type: PathType,
    pub begin_extension: Option<f64>,
    pub end_extension: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Boundaries and boxes: a closed ring.
    Boundary,
    /// A centerline to be widened into an outline.
    Path(PathGeometry),
    /// A text anchor; `points` holds the single placed position.
    Text(String),
}

/// A leaf shape in absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedShape {
    pub kind: ShapeKind,
    pub key: LayerKey,
    pub points: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerExtractionResult {
    pub rule: LayerRule,
    pub polygons: Vec<Polygon2D>,
    pub bbox: BBox2,
    pub total_area: f64,
    pub polygon_count: usize,
}

impl LayerExtractionResult {
    /// Builds the aggregate from scratch so bbox and area always match `polygons`.
    pub fn from_polygons(rule: LayerRule, polygons: Vec<Polygon2D>) -> Self {
        let mut bbox = BBox2::empty();
        let mut total_area = 0.0;
        for p in &polygons {
            bbox = bbox.union(&p.bbox());
            total_area += p.area();
        }
        Self {
            rule,
            polygon_count: polygons.len(),
            polygons,
            bbox,
            total_area,
        }
    }

    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            name: self.rule.name.clone(),
            layer: self.rule.source_layer,
            datatype: self.rule.source_datatype,
            polygon_count: self.polygon_count,
            total_area: self.total_area,
            bbox: self.bbox,
        }
    }
}
