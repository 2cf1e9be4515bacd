//! Mesh output: triangulated solids as binary or ASCII STL.

use crate::error::WriteError;
use itertools::Itertools;
use layout3d_core::geom::Vec3;
use layout3d_core::report::{codes, Warning};
use layout3d_core::solid::Solid3D;
use nalgebra::Vector3;
use std::fmt::{self, Write as _};
use std::path::Path;
use tracing::{debug, warn};

const HEADER_LEN: usize = 80;
const RECORD_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub normal: Vector3<f64>,
    pub vertices: [Vector3<f64>; 3],
}

impl Triangle {
    fn new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Self {
        let normal = (b - a).cross(&(c - a));
        let normal = normal.try_normalize(1e-300).unwrap_or_else(Vector3::zeros);
        Self {
            normal,
            vertices: [a, b, c],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TriangleSoup {
    pub triangles: Vec<Triangle>,
    pub warnings: Vec<Warning>,
}

fn to_vector(p: &Vec3) -> Vector3<f64> {
    Vector3::new(p.x, p.y, p.z)
}

/// Newell normal of a planar loop; not normalized.
fn newell_normal(points: &[Vector3<f64>]) -> Vector3<f64> {
    points
        .iter()
        .circular_tuple_windows()
        .fold(Vector3::zeros(), |n, (a, b)| {
            n + Vector3::new(
                (a.y - b.y) * (a.z + b.z),
                (a.z - b.z) * (a.x + b.x),
                (a.x - b.x) * (a.y + b.y),
            )
        })
}

/// True when every corner of the loop turns the same way as `normal`.
fn is_convex(points: &[Vector3<f64>], normal: &Vector3<f64>) -> bool {
    points
        .iter()
        .circular_tuple_windows()
        .all(|(a, b, c)| (b - a).cross(&(c - b)).dot(normal) >= 0.0)
}

fn fan(n: usize) -> Vec<[usize; 3]> {
    (1..n.saturating_sub(1)).map(|i| [0, i, i + 1]).collect()
}

/// Triangle indices into `points` for one planar face loop.
///
/// Triangles and convex quads are fanned. Everything else, including concave quad
/// caps, is ear-clipped in the plane that best preserves its area, and every
/// triangle is wound like the face.
pub fn triangulate_face(points: &[Vector3<f64>]) -> Result<Vec<[usize; 3]>, String> {
    let n = points.len();
    if n < 3 {
        return Err(format!("face has {n} vertices"));
    }
    if n == 3 {
        return Ok(fan(n));
    }

    let normal = newell_normal(points);
    if n == 4 && is_convex(points, &normal) {
        return Ok(fan(n));
    }
    let (u, v) = if normal.z.abs() >= normal.x.abs() && normal.z.abs() >= normal.y.abs() {
        (0, 1)
    } else if normal.y.abs() >= normal.x.abs() {
        (2, 0)
    } else {
        (1, 2)
    };

    let mut flat = Vec::with_capacity(n * 2);
    for p in points {
        flat.push(p[u]);
        flat.push(p[v]);
    }
    let indices = earcutr::earcut(&flat, &[], 2).map_err(|e| format!("{e:?}"))?;
    if indices.len() < 3 {
        return Err("ear clipping produced no triangles".to_string());
    }

    Ok(indices
        .chunks_exact(3)
        .map(|t| {
            let tri = [t[0], t[1], t[2]];
            let tn = (points[tri[1]] - points[tri[0]]).cross(&(points[tri[2]] - points[tri[0]]));
            if tn.dot(&normal) < 0.0 {
                [tri[0], tri[2], tri[1]]
            } else {
                tri
            }
        })
        .collect())
}

/// Triangulates every face of every solid.
///
/// A face that cannot be ear-clipped is fanned instead and reported.
pub fn triangulate(solids: &[Solid3D]) -> TriangleSoup {
    let mut soup = TriangleSoup::default();
    for solid in solids {
        for face in &solid.faces {
            let Some(points) = face
                .iter()
                .map(|&i| solid.vertices.get(i).map(to_vector))
                .collect::<Option<Vec<_>>>()
            else {
                warn!(layer = %solid.layer_name, "face references a missing vertex");
                soup.warnings.push(Warning::new(
                    codes::FACE_TRIANGULATION,
                    format!("layer '{}': face references a missing vertex", solid.layer_name),
                ));
                continue;
            };
            let tris = triangulate_face(&points).unwrap_or_else(|err| {
                warn!(layer = %solid.layer_name, "falling back to fan triangulation: {err}");
                soup.warnings.push(Warning::new(
                    codes::FACE_TRIANGULATION,
                    format!("layer '{}': {err}", solid.layer_name),
                ));
                fan(points.len())
            });
            soup.triangles.extend(
                tris.into_iter()
                    .map(|[a, b, c]| Triangle::new(points[a], points[b], points[c])),
            );
        }
    }
    soup
}

/// Encodes triangles as binary STL.
///
/// Fails when the triangle count does not fit the format's 32-bit counter.
pub fn encode_binary(triangles: &[Triangle], name: &str) -> Result<Vec<u8>, WriteError> {
    let count =
        u32::try_from(triangles.len()).map_err(|_| WriteError::TooManyTriangles(triangles.len()))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + RECORD_LEN * triangles.len());
    let mut header = [b' '; HEADER_LEN];
    let label = format!("layout3d {name}");
    let len = label.len().min(HEADER_LEN);
    header[..len].copy_from_slice(&label.as_bytes()[..len]);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&count.to_le_bytes());

    for tri in triangles {
        for v in std::iter::once(&tri.normal).chain(tri.vertices.iter()) {
            for c in v.iter() {
                buf.extend_from_slice(&(*c as f32).to_le_bytes());
            }
        }
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(buf)
}

/// Encodes triangles as ASCII STL.
pub fn encode_ascii(triangles: &[Triangle], name: &str) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "solid {name}")?;
    for tri in triangles {
        let n = tri.normal;
        writeln!(out, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(out, "    outer loop")?;
        for v in &tri.vertices {
            writeln!(out, "      vertex {:e} {:e} {:e}", v.x, v.y, v.z)?;
        }
        writeln!(out, "    endloop")?;
        writeln!(out, "  endfacet")?;
    }
    writeln!(out, "endsolid {name}")?;
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct MeshSummary {
    pub triangles: usize,
    pub warnings: Vec<Warning>,
}

/// Triangulates `solids` and writes them to `path` as STL.
pub fn write_stl(
    path: &Path,
    solids: &[Solid3D],
    ascii: bool,
    name: &str,
) -> Result<MeshSummary, WriteError> {
    let soup = triangulate(solids);
    let bytes = if ascii {
        encode_ascii(&soup.triangles, name)?.into_bytes()
    } else {
        encode_binary(&soup.triangles, name)?
    };
    std::fs::write(path, bytes).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(triangles = soup.triangles.len(), ascii, "wrote {path:?}");
    Ok(MeshSummary {
        triangles: soup.triangles.len(),
        warnings: soup.warnings,
    })
}
