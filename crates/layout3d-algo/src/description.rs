//! JSON solid description exchanged with external tools.
//!
//! Each record is a prism: a footprint polygon plus a z range and layer metadata.
//! The same document feeds both the STEP backend and the merge kernel.

use crate::error::ExtrusionError;
use crate::extrude::extrude;
use layout3d_core::geom::{Polygon2D, Vec2};
use layout3d_core::layers::Rgb;
use layout3d_core::solid::Solid3D;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRECISION: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidDescription {
    pub format: String,
    pub precision: f64,
    pub units: String,
    pub solids: Vec<SolidRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolidRecord {
    pub polygon: Vec<[f64; 2]>,
    pub z_bottom: f64,
    pub z_top: f64,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub color: Rgb,
    #[serde(default)]
    pub layer_name: String,
    #[serde(default)]
    pub layer: u16,
    #[serde(default)]
    pub datatype: u16,
}

impl SolidDescription {
    pub fn from_solids(solids: &[Solid3D], units: &str) -> Self {
        Self {
            format: "AP214".to_string(),
            precision: DEFAULT_PRECISION,
            units: units.to_string(),
            solids: solids.iter().map(SolidRecord::from_solid).collect(),
        }
    }

    pub fn to_solids(&self) -> Result<Vec<Solid3D>, ExtrusionError> {
        self.solids.iter().map(SolidRecord::to_solid).collect()
    }
}

impl SolidRecord {
    pub fn from_solid(solid: &Solid3D) -> Self {
        Self {
            polygon: solid.footprint().iter().map(|p| [p.x, p.y]).collect(),
            z_bottom: solid.z_bottom,
            z_top: solid.z_top,
            material: solid.material.clone(),
            color: solid.color,
            layer_name: solid.layer_name.clone(),
            layer: solid.source_layer,
            datatype: solid.source_datatype,
        }
    }

    /// Rebuilds the prism. A repeated closing point in `polygon` is tolerated.
    pub fn to_solid(&self) -> Result<Solid3D, ExtrusionError> {
        let ring: Vec<Vec2> = self.polygon.iter().map(|[x, y]| Vec2::new(*x, *y)).collect();
        let polygon =
            Polygon2D::from_ring(&ring).ok_or(ExtrusionError::DegeneratePolygon(ring.len()))?;
        let mut solid = extrude(&polygon, self.z_bottom, self.z_top, true)?;
        solid.material = self.material.clone();
        solid.color = self.color;
        solid.layer_name = self.layer_name.clone();
        solid.source_layer = self.layer;
        solid.source_datatype = self.datatype;
        Ok(solid)
    }
}
