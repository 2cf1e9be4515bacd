use crate::error::HierarchyError;
use crate::structs::{FlattenedShape, PathGeometry, ShapeKind};
use layout3d_core::geom::Vec2;
use layout3d_core::model::{GeometryElement, Library, Strans};
use layout3d_core::report::FlattenStats;
use nalgebra::{Matrix3, Point2, Vector2};
use std::collections::HashSet;
use tracing::debug;

/// Homogeneous 2D affine placement accumulated along a reference chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    matrix: Matrix3<f64>,
    magnification: f64,
}

impl Placement {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            magnification: 1.0,
        }
    }

    /// Local placement of one reference: mirror, magnify, rotate, then translate.
    pub fn from_reference(origin: Vec2, strans: &Strans) -> Self {
        let mirror = if strans.mirror_x {
            Matrix3::new_nonuniform_scaling(&Vector2::new(1.0, -1.0))
        } else {
            Matrix3::identity()
        };
        let scale = Matrix3::new_scaling(strans.magnification);
        let rotate = Matrix3::new_rotation(strans.angle_deg.to_radians());
        let translate = Matrix3::new_translation(&Vector2::new(origin.x, origin.y));
        Self {
            matrix: translate * rotate * scale * mirror,
            magnification: strans.magnification.abs(),
        }
    }

    /// Places `child` inside `self`: the child's transform is applied first.
    pub fn then(&self, child: &Placement) -> Self {
        Self {
            matrix: self.matrix * child.matrix,
            magnification: self.magnification * child.magnification,
        }
    }

    pub fn apply(&self, p: Vec2) -> Vec2 {
        let q = self.matrix.transform_point(&Point2::new(p.x, p.y));
        Vec2::new(q.x, q.y)
    }

    pub fn apply_all(&self, points: &[Vec2]) -> Vec<Vec2> {
        points.iter().map(|p| self.apply(*p)).collect()
    }

    pub fn magnification(&self) -> f64 {
        self.magnification
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlattenOutput {
    pub shapes: Vec<FlattenedShape>,
    pub stats: FlattenStats,
}

enum Work {
    Enter {
        structure: usize,
        placement: Placement,
        depth: usize,
    },
    Exit,
}

/// Resolves every reference below the start structure(s) into absolute leaf shapes.
///
/// With no `start`, every top-level structure is flattened in library order.
/// References deeper than `max_depth` are dropped and counted in
/// [`FlattenStats::references_truncated`]; `Some(0)` keeps only the start
/// structures' own shapes.
pub fn flatten(
    library: &Library,
    start: Option<&str>,
    max_depth: Option<usize>,
) -> Result<FlattenOutput, HierarchyError> {
    let roots: Vec<usize> = match start {
        Some(name) => vec![library
            .structure_index(name)
            .ok_or_else(|| HierarchyError::StartNotFound(name.to_string()))?],
        None => {
            if library.structures.is_empty() {
                return Ok(FlattenOutput::default());
            }
            let tops = library.top_structures();
            if tops.is_empty() {
                return Err(HierarchyError::NoTopStructure(library.name.clone()));
            }
            tops.iter()
                .filter_map(|s| library.structure_index(&s.name))
                .collect()
        }
    };

    let mut out = FlattenOutput::default();
    let mut path: Vec<usize> = Vec::new();
    let mut on_path: HashSet<usize> = HashSet::new();
    let mut stack: Vec<Work> = roots
        .into_iter()
        .rev()
        .map(|structure| Work::Enter {
            structure,
            placement: Placement::identity(),
            depth: 0,
        })
        .collect();

    while let Some(work) = stack.pop() {
        let (idx, placement, depth) = match work {
            Work::Exit => {
                if let Some(done) = path.pop() {
                    on_path.remove(&done);
                }
                continue;
            }
            Work::Enter {
                structure,
                placement,
                depth,
            } => (structure, placement, depth),
        };

        let structure = &library.structures[idx];
        path.push(idx);
        on_path.insert(idx);
        stack.push(Work::Exit);
        out.stats.structures_visited += 1;

        let mut children = Vec::new();
        for element in &structure.elements {
            let (name, instances) = match element {
                GeometryElement::StructureRef(r) => (
                    r.name.as_str(),
                    vec![Placement::from_reference(r.origin, &r.strans)],
                ),
                GeometryElement::ArrayRef(a) => {
                    let mut instances = Vec::with_capacity(usize::from(a.columns) * usize::from(a.rows));
                    for col in 0..a.columns {
                        for row in 0..a.rows {
                            instances
                                .push(Placement::from_reference(a.instance_origin(col, row), &a.strans));
                        }
                    }
                    (a.name.as_str(), instances)
                }
                leaf => {
                    emit_leaf(leaf, &placement, &mut out);
                    continue;
                }
            };

            if max_depth.is_some_and(|max| depth >= max) {
                out.stats.references_truncated += instances.len();
                continue;
            }

            let target = library.structure_index(name).ok_or_else(|| {
                HierarchyError::UnresolvedReference {
                    parent: structure.name.clone(),
                    name: name.to_string(),
                }
            })?;

            if on_path.contains(&target) {
                let mut chain: Vec<String> = path
                    .iter()
                    .map(|&i| library.structures[i].name.clone())
                    .collect();
                chain.push(name.to_string());
                return Err(HierarchyError::CircularReference { chain });
            }

            for local in instances {
                out.stats.references_expanded += 1;
                children.push(Work::Enter {
                    structure: target,
                    placement: placement.then(&local),
                    depth: depth + 1,
                });
            }
        }
        stack.extend(children.into_iter().rev());
    }

    debug!(
        shapes = out.shapes.len(),
        structures = out.stats.structures_visited,
        truncated = out.stats.references_truncated,
        "flattened hierarchy"
    );
    Ok(out)
}

fn emit_leaf(element: &GeometryElement, placement: &Placement, out: &mut FlattenOutput) {
    let shape = match element {
        GeometryElement::Boundary(b) | GeometryElement::Box(b) => FlattenedShape {
            kind: ShapeKind::Boundary,
            key: b.key,
            points: placement.apply_all(&b.points),
        },
        GeometryElement::Path(p) => {
            let mag = placement.magnification();
            // Negative widths are absolute and ignore magnification.
            let width = if p.width < 0.0 { -p.width } else { p.width * mag };
            FlattenedShape {
                kind: ShapeKind::Path(PathGeometry {
                    width,
                    path_type: p.path_type,
                    begin_extension: p.begin_extension.map(|e| e * mag),
                    end_extension: p.end_extension.map(|e| e * mag),
                }),
                key: p.key,
                points: placement.apply_all(&p.points),
            }
        }
        GeometryElement::Text(t) => FlattenedShape {
            kind: ShapeKind::Text(t.text.clone()),
            key: t.key,
            points: vec![placement.apply(t.position)],
        },
        GeometryElement::Node(_) => {
            out.stats.nodes_skipped += 1;
            return;
        }
        GeometryElement::StructureRef(_) | GeometryElement::ArrayRef(_) => return,
    };
    out.stats.shapes_emitted += 1;
    out.shapes.push(shape);
}
