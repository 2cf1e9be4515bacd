use crate::description::{SolidDescription, SolidRecord, DEFAULT_PRECISION};
use crate::error::{KernelError, ToolError};
use crate::extrude::extrude;
use crate::tool::{self, Scratch};
use layout3d_core::geom::Polygon2D;
use layout3d_core::report::{codes, MergeStats, Warning};
use layout3d_core::solid::Solid3D;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOp {
    #[default]
    Union,
    Intersection,
    Difference,
}

impl BooleanOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Intersection => "intersection",
            BooleanOp::Difference => "difference",
        }
    }
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A solid-modeling kernel that combines one group of solids.
pub trait MergeKernel {
    fn name(&self) -> &str;

    fn combine(&self, op: BooleanOp, solids: &[Solid3D]) -> Result<Vec<Solid3D>, KernelError>;
}

/// Unions prisms that share a footprint and touch or overlap vertically.
///
/// Anything else passes through untouched. Only [`BooleanOp::Union`] is supported.
#[derive(Debug, Clone, Copy)]
pub struct PrismStackKernel {
    pub precision: f64,
}

impl Default for PrismStackKernel {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
        }
    }
}

struct Stack {
    first: usize,
    members: usize,
    z_bottom: f64,
    z_top: f64,
}

impl PrismStackKernel {
    fn same_footprint(&self, a: &Solid3D, b: &Solid3D) -> bool {
        a.ring_len() == b.ring_len()
            && a.footprint().iter().zip(b.footprint()).all(|(p, q)| {
                (p.x - q.x).abs() <= self.precision && (p.y - q.y).abs() <= self.precision
            })
    }
}

impl MergeKernel for PrismStackKernel {
    fn name(&self) -> &str {
        "prism-stack"
    }

    fn combine(&self, op: BooleanOp, solids: &[Solid3D]) -> Result<Vec<Solid3D>, KernelError> {
        if op != BooleanOp::Union {
            return Err(KernelError::Unsupported {
                kernel: self.name().to_string(),
                operation: op.to_string(),
            });
        }

        let mut order: Vec<usize> = (0..solids.len()).collect();
        order.sort_by(|&a, &b| solids[a].z_bottom.total_cmp(&solids[b].z_bottom));

        let mut stacks: Vec<Stack> = Vec::new();
        for idx in order {
            let solid = &solids[idx];
            let joined = stacks.iter_mut().find(|s| {
                solid.z_bottom <= s.z_top + self.precision
                    && self.same_footprint(&solids[s.first], solid)
            });
            match joined {
                Some(stack) => {
                    stack.first = stack.first.min(idx);
                    stack.members += 1;
                    stack.z_top = stack.z_top.max(solid.z_top);
                }
                None => stacks.push(Stack {
                    first: idx,
                    members: 1,
                    z_bottom: solid.z_bottom,
                    z_top: solid.z_top,
                }),
            }
        }
        stacks.sort_by_key(|s| s.first);

        stacks
            .into_iter()
            .map(|stack| {
                let first = &solids[stack.first];
                if stack.members == 1 {
                    return Ok(first.clone());
                }
                let footprint = Polygon2D::new(first.footprint());
                extrude(&footprint, stack.z_bottom, stack.z_top, true)
                    .map(|s| s.with_metadata_of(first))
                    .map_err(|err| KernelError::InvalidResult(err.to_string()))
            })
            .collect()
    }
}

/// Delegates to `program [args..] <in.json> <out.json> <operation>`.
///
/// The tool reads a solid description and writes
/// `{ "success": bool, "merged_solids": [..] }` using the same record format.
#[derive(Debug, Clone)]
pub struct ExternalMergeKernel {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub units: String,
    pub keep_temp: bool,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    success: bool,
    #[serde(default)]
    merged_solids: Vec<SolidRecord>,
    #[serde(default)]
    error: Option<String>,
}

impl MergeKernel for ExternalMergeKernel {
    fn name(&self) -> &str {
        "external"
    }

    fn combine(&self, op: BooleanOp, solids: &[Solid3D]) -> Result<Vec<Solid3D>, KernelError> {
        let scratch = Scratch::new(self.keep_temp)?;
        let input = scratch.write_description(
            "merge_input.json",
            &SolidDescription::from_solids(solids, &self.units),
        )?;
        let output = scratch.path("merge_output.json");

        let mut args = self.args.clone();
        args.push(input.display().to_string());
        args.push(output.display().to_string());
        args.push(op.to_string());
        tool::run(&self.program, &args)?;
        tool::require_output(&output)?;

        let text = std::fs::read_to_string(&output).map_err(ToolError::from)?;
        let response: MergeResponse = serde_json::from_str(&text).map_err(ToolError::from)?;
        if !response.success {
            return Err(KernelError::InvalidResult(
                response
                    .error
                    .unwrap_or_else(|| "tool reported failure".to_string()),
            ));
        }
        response
            .merged_solids
            .iter()
            .map(|record| {
                record
                    .to_solid()
                    .map_err(|err| KernelError::InvalidResult(err.to_string()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    pub solids: Vec<Solid3D>,
    pub stats: MergeStats,
    pub warnings: Vec<Warning>,
}

/// Combines solids of the same material with `op`.
///
/// Groups keep the order in which their material first appears. With no kernel, or
/// if the kernel fails on any group, the input comes back unchanged with a warning.
pub fn merge(solids: Vec<Solid3D>, op: BooleanOp, kernel: Option<&dyn MergeKernel>) -> MergeOutput {
    let input_count = solids.len();
    let unchanged = |solids: Vec<Solid3D>, groups: usize, warning: Warning| MergeOutput {
        stats: MergeStats {
            input_count,
            output_count: solids.len(),
            groups,
            applied: false,
        },
        solids,
        warnings: vec![warning],
    };

    let Some(kernel) = kernel else {
        warn!("no merge kernel available, keeping solids unmerged");
        return unchanged(
            solids,
            0,
            Warning::new(codes::MERGE_UNAVAILABLE, "no merge kernel available"),
        );
    };

    let mut group_of: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Solid3D>> = Vec::new();
    for solid in &solids {
        let next = groups.len();
        let g = *group_of.entry(solid.material.clone()).or_insert(next);
        if g == next {
            groups.push(Vec::new());
        }
        groups[g].push(solid.clone());
    }

    let mut merged = Vec::with_capacity(solids.len());
    for group in &groups {
        match kernel.combine(op, group) {
            Ok(result) => merged.extend(result),
            Err(err) => {
                let material = group.first().map(|s| s.material.clone()).unwrap_or_default();
                warn!(kernel = kernel.name(), %material, "merge failed: {err}");
                let count = groups.len();
                return unchanged(
                    solids,
                    count,
                    Warning::new(
                        codes::MERGE_FAILED,
                        format!("{} {op} of material '{material}': {err}", kernel.name()),
                    ),
                );
            }
        }
    }

    debug!(
        kernel = kernel.name(),
        %op,
        before = input_count,
        after = merged.len(),
        "merged solids"
    );
    MergeOutput {
        stats: MergeStats {
            input_count,
            output_count: merged.len(),
            groups: groups.len(),
            applied: true,
        },
        solids: merged,
        warnings: Vec::new(),
    }
}
