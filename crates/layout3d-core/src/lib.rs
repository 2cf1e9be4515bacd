//! Data model for converting hierarchical mask layouts into 3D solids.

pub mod geom;
pub mod layers;
pub mod model;
pub mod report;
pub mod solid;
