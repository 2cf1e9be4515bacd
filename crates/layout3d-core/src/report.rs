use crate::geom::BBox2;
use serde::{Deserialize, Serialize};

/// A non-fatal condition raised by a degrading stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Stable warning codes.
pub mod codes {
    pub const MALFORMED_SHAPE: &str = "malformed_shape";
    pub const CLIP_FAILED: &str = "clip_failed";
    pub const EXTRUSION_SKIPPED: &str = "extrusion_skipped";
    pub const MERGE_UNAVAILABLE: &str = "merge_unavailable";
    pub const MERGE_FAILED: &str = "merge_failed";
    pub const EXTERNAL_TOOL_FAILED: &str = "external_tool_failed";
    pub const MESH_FALLBACK: &str = "mesh_fallback";
    pub const FACE_TRIANGULATION: &str = "face_triangulation";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenStats {
    pub structures_visited: usize,
    pub references_expanded: usize,
    pub references_truncated: usize,
    pub shapes_emitted: usize,
    pub nodes_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub shapes_processed: usize,
    pub shapes_unmapped: usize,
    pub shapes_filtered: usize,
    pub texts_skipped: usize,
    pub polygons_kept: usize,
    pub polygons_dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub polygons_in: usize,
    pub polygons_out: usize,
    pub polygons_clipped: usize,
    pub clip_failures: usize,
    pub layers_removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub input_count: usize,
    pub output_count: usize,
    pub groups: usize,
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSummary {
    pub name: String,
    pub layer: u16,
    pub datatype: u16,
    pub polygon_count: usize,
    pub total_area: f64,
    pub bbox: BBox2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    StlBinary,
    StlAscii,
    Step,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::StlBinary | OutputFormat::StlAscii => "stl",
            OutputFormat::Step => "step",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub library: String,
    pub flatten: FlattenStats,
    pub extract: ExtractStats,
    pub window: Option<WindowStats>,
    pub layers: Vec<LayerSummary>,
    pub solids_built: usize,
    pub extrusions_skipped: usize,
    pub merge: Option<MergeStats>,
    pub requested_format: OutputFormat,
    pub written_format: OutputFormat,
    pub output: String,
    pub triangles_written: usize,
    pub warnings: Vec<Warning>,
}
