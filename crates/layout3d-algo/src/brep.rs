//! B-rep (STEP) output through a swappable backend with mesh fallback.

use crate::description::SolidDescription;
use crate::error::{ToolError, WriteError};
use crate::step_writer::write_step;
use crate::stl::write_stl;
use crate::tool::{self, Scratch};
use layout3d_core::report::{codes, OutputFormat, Warning};
use layout3d_core::solid::Solid3D;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Something that turns a solid description into a STEP file at `output`.
pub trait BrepBackend {
    fn name(&self) -> &str;

    /// Writes the file and returns the path actually written.
    fn invoke(&self, description: &SolidDescription, output: &Path) -> Result<PathBuf, ToolError>;
}

/// Runs `program [args..] <description.json> <output.step>`.
///
/// Succeeds only on exit status 0 with a non-empty output file.
#[derive(Debug, Clone)]
pub struct ExternalStepTool {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub keep_temp: bool,
}

impl ExternalStepTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            keep_temp: false,
        }
    }
}

impl BrepBackend for ExternalStepTool {
    fn name(&self) -> &str {
        "external"
    }

    fn invoke(&self, description: &SolidDescription, output: &Path) -> Result<PathBuf, ToolError> {
        let scratch = Scratch::new(self.keep_temp)?;
        let input = scratch.write_description("solids.json", description)?;

        let mut args = self.args.clone();
        args.push(input.display().to_string());
        args.push(output.display().to_string());
        tool::run(&self.program, &args)?;
        tool::require_output(output)?;
        Ok(output.to_path_buf())
    }
}

/// Built-in writer producing planar-faced AP214 solids.
#[derive(Debug, Clone, Default)]
pub struct NativeStepWriter {
    pub name: String,
}

impl BrepBackend for NativeStepWriter {
    fn name(&self) -> &str {
        "native"
    }

    fn invoke(&self, description: &SolidDescription, output: &Path) -> Result<PathBuf, ToolError> {
        let solids = description
            .to_solids()
            .map_err(|err| ToolError::Backend(err.to_string()))?;
        let text = write_step(&solids, &description.units, &self.name)
            .map_err(|err| ToolError::Backend(format!("{err:#}")))?;
        std::fs::write(output, text)?;
        tool::require_output(output)?;
        Ok(output.to_path_buf())
    }
}

#[derive(Debug, Clone)]
pub struct BrepOutcome {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub triangles: usize,
    pub warnings: Vec<Warning>,
}

/// Writes `solids` through `backend`, falling back to binary STL next to `output`.
///
/// Only a failure of the fallback itself is an error.
pub fn write_brep_with_fallback(
    backend: &dyn BrepBackend,
    solids: &[Solid3D],
    units: &str,
    output: &Path,
) -> Result<BrepOutcome, WriteError> {
    let description = SolidDescription::from_solids(solids, units);
    let err = match backend.invoke(&description, output) {
        Ok(path) => {
            info!(backend = backend.name(), "wrote {path:?}");
            return Ok(BrepOutcome {
                path,
                format: OutputFormat::Step,
                triangles: 0,
                warnings: Vec::new(),
            });
        }
        Err(err) => err,
    };

    let fallback = output.with_extension(OutputFormat::StlBinary.extension());
    warn!(
        backend = backend.name(),
        "B-rep export failed ({err}), writing mesh to {fallback:?}"
    );
    let name = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mesh = write_stl(&fallback, solids, false, &name)?;

    let mut warnings = vec![
        Warning::new(
            codes::EXTERNAL_TOOL_FAILED,
            format!("{} backend: {err}", backend.name()),
        ),
        Warning::new(
            codes::MESH_FALLBACK,
            format!("wrote mesh to {} instead of STEP", fallback.display()),
        ),
    ];
    warnings.extend(mesh.warnings);
    Ok(BrepOutcome {
        path: fallback,
        format: OutputFormat::StlBinary,
        triangles: mesh.triangles,
        warnings,
    })
}
