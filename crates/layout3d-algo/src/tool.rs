//! Synchronous subprocess invocation for external backends.

use crate::description::SolidDescription;
use crate::error::ToolError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info};

/// A scratch directory for intermediate files, removed on drop unless kept.
pub struct Scratch {
    dir: Option<TempDir>,
    keep: bool,
}

impl Scratch {
    pub fn new(keep: bool) -> Result<Self, ToolError> {
        let dir = tempfile::Builder::new().prefix("layout3d-").tempdir()?;
        Ok(Self {
            dir: Some(dir),
            keep,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.path().join(name),
            None => PathBuf::from(name),
        }
    }

    /// Serializes `description` into the scratch directory.
    pub fn write_description(
        &self,
        name: &str,
        description: &SolidDescription,
    ) -> Result<PathBuf, ToolError> {
        let path = self.path(name);
        let json = serde_json::to_string_pretty(description)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if !self.keep {
            return;
        }
        if let Some(dir) = self.dir.take() {
            let kept = dir.keep();
            info!("keeping intermediate files in {kept:?}");
        }
    }
}

/// Runs `program args..` to completion. Success means exit status 0.
pub fn run(program: &Path, args: &[String]) -> Result<(), ToolError> {
    let name = program.display().to_string();
    debug!(program = %name, ?args, "running external tool");
    let output = Command::new(program).args(args).output().map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            ToolError::NotFound(name.clone())
        } else {
            ToolError::Spawn {
                program: name.clone(),
                source: err,
            }
        }
    })?;

    if !output.status.success() {
        return Err(ToolError::ExitStatus {
            program: name,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Fails unless `path` exists and is non-empty.
pub fn require_output(path: &Path) -> Result<(), ToolError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(ToolError::MissingOutput(path.to_path_buf())),
    }
}
