use layout3d_core::layers::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("structure '{parent}' references unknown structure '{name}'")]
    UnresolvedReference { parent: String, name: String },

    #[error("start structure '{0}' not found in library")]
    StartNotFound(String),

    #[error("library '{0}' has no top-level structure")]
    NoTopStructure(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("{kind} on {layer}/{datatype} has {distinct} distinct vertices, need at least 3")]
    TooFewVertices {
        kind: &'static str,
        layer: u16,
        datatype: u16,
        distinct: usize,
    },

    #[error("{kind} on {layer}/{datatype} encloses no area")]
    ZeroArea {
        kind: &'static str,
        layer: u16,
        datatype: u16,
    },

    #[error("path on {layer}/{datatype} has non-positive width {width}")]
    InvalidPathWidth { layer: u16, datatype: u16, width: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtrusionError {
    #[error("polygon has {0} distinct vertices, need at least 3")]
    DegeneratePolygon(usize),

    #[error("invalid z range: z_top {z_top} must be above z_bottom {z_bottom}")]
    InvalidZRange { z_bottom: f64, z_top: f64 },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClipError {
    #[error("window is empty")]
    EmptyWindow,

    #[error("unpaired boundary crossing while splitting polygon")]
    UnpairedCrossing,

    #[error("clipped ring did not close after {0} steps")]
    RingNotClosed(usize),
}

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("merge kernel '{kernel}' does not support {operation}")]
    Unsupported { kernel: String, operation: String },

    #[error("merge kernel failed: {0}")]
    Tool(#[from] ToolError),

    #[error("merge kernel returned invalid solid: {0}")]
    InvalidResult(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("external tool not found: {0}")]
    NotFound(String),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("tool reported success but output {0:?} is missing or empty")]
    MissingOutput(PathBuf),

    #[error("intermediate file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("solid description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} triangles exceed the binary STL limit")]
    TooManyTriangles(usize),

    #[error("formatting mesh text: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Fatal errors of a conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Extrusion(#[from] ExtrusionError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
