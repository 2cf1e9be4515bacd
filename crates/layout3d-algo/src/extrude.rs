use crate::error::ExtrusionError;
use layout3d_core::geom::{Polygon2D, Vec3};
use layout3d_core::layers::Rgb;
use layout3d_core::solid::Solid3D;

/// Extrudes `polygon` into a right prism spanning `z_bottom..z_top`.
///
/// With `check_orientation` the ring is first wound counter-clockwise so that the
/// bottom face points to -z, the top face to +z, and side quads outward. The returned
/// solid carries no layer metadata; see [`Solid3D::with_rule`].
pub fn extrude(
    polygon: &Polygon2D,
    z_bottom: f64,
    z_top: f64,
    check_orientation: bool,
) -> Result<Solid3D, ExtrusionError> {
    if polygon.len() < 3 {
        return Err(ExtrusionError::DegeneratePolygon(polygon.len()));
    }
    if !(z_top > z_bottom) {
        return Err(ExtrusionError::InvalidZRange { z_bottom, z_top });
    }

    let ring = if check_orientation {
        polygon.to_ccw()
    } else {
        polygon.clone()
    };
    let n = ring.len();

    let mut vertices = Vec::with_capacity(2 * n);
    vertices.extend(ring.points.iter().map(|p| Vec3::new(p.x, p.y, z_bottom)));
    vertices.extend(ring.points.iter().map(|p| Vec3::new(p.x, p.y, z_top)));

    let mut faces: Vec<Vec<usize>> = Vec::with_capacity(n + 2);
    faces.push((0..n).rev().collect());
    faces.push((n..2 * n).collect());
    for i in 0..n {
        let j = (i + 1) % n;
        faces.push(vec![i, j, n + j, n + i]);
    }

    Ok(Solid3D {
        vertices,
        faces,
        z_bottom,
        z_top,
        volume: ring.area() * (z_top - z_bottom),
        material: String::new(),
        color: Rgb::default(),
        layer_name: String::new(),
        source_layer: 0,
        source_datatype: 0,
    })
}
