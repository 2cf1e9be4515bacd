use crate::geom::{Vec2, Vec3};
use crate::layers::{LayerRule, Rgb};
use serde::{Deserialize, Serialize};

/// A right prism produced by extruding one layer polygon.
///
/// The first half of `vertices` is the bottom ring and the second half the top ring,
/// both in footprint order. Each face is an index loop into `vertices` whose winding
/// gives an outward normal by the right-hand rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solid3D {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Vec<usize>>,
    pub z_bottom: f64,
    pub z_top: f64,
    pub volume: f64,
    pub material: String,
    pub color: Rgb,
    pub layer_name: String,
    pub source_layer: u16,
    pub source_datatype: u16,
}

impl Solid3D {
    pub fn height(&self) -> f64 {
        self.z_top - self.z_bottom
    }

    /// Number of footprint vertices.
    pub fn ring_len(&self) -> usize {
        self.vertices.len() / 2
    }

    /// The bottom ring projected to the XY plane.
    pub fn footprint(&self) -> Vec<Vec2> {
        self.vertices[..self.ring_len()].iter().map(Vec3::xy).collect()
    }

    /// Copies material, color, and source-layer metadata from a layer rule.
    pub fn with_rule(mut self, rule: &LayerRule) -> Self {
        self.material = rule.material.clone();
        self.color = rule.color;
        self.layer_name = rule.name.clone();
        self.source_layer = rule.source_layer;
        self.source_datatype = rule.source_datatype;
        self
    }

    /// Copies metadata from another solid, keeping this solid's geometry.
    pub fn with_metadata_of(mut self, other: &Solid3D) -> Self {
        self.material = other.material.clone();
        self.color = other.color;
        self.layer_name = other.layer_name.clone();
        self.source_layer = other.source_layer;
        self.source_datatype = other.source_datatype;
        self
    }

    /// Multiplies every coordinate by `factor`; volume scales by its cube.
    pub fn scaled(mut self, factor: f64) -> Self {
        for v in &mut self.vertices {
            v.x *= factor;
            v.y *= factor;
            v.z *= factor;
        }
        self.z_bottom *= factor;
        self.z_top *= factor;
        self.volume *= factor.abs().powi(3);
        self
    }
}
