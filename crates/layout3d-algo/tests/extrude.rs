mod common;

use approx::assert_relative_eq;
use common::rect_polygon;
use layout3d_algo::error::ExtrusionError;
use layout3d_algo::extrude::extrude;
use layout3d_core::geom::{Polygon2D, Vec2};

#[test]
fn rectangle_prism() {
    let solid = extrude(&rect_polygon(0.0, 0.0, 10.0, 5.0), 0.0, 2.0, true).unwrap();
    assert_eq!(8, solid.vertices.len());
    assert_eq!(6, solid.faces.len());
    assert_relative_eq!(2.0, solid.height());
    assert_relative_eq!(100.0, solid.volume);
}

#[test]
fn triangle_prism() {
    let tri = Polygon2D::new(vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(4.0, 0.0),
        Vec2::new(2.0, 3.0),
    ]);
    let solid = extrude(&tri, 1.0, 5.0, true).unwrap();
    assert_eq!(6, solid.vertices.len());
    assert_eq!(5, solid.faces.len());
    assert_relative_eq!(4.0, solid.height());
    assert_relative_eq!(24.0, solid.volume);
}

#[test]
fn rejects_empty_and_reversed_z_ranges() {
    let p = rect_polygon(0.0, 0.0, 1.0, 1.0);
    assert!(matches!(
        extrude(&p, 3.0, 3.0, true),
        Err(ExtrusionError::InvalidZRange { .. })
    ));
    assert!(matches!(
        extrude(&p, 5.0, 1.0, true),
        Err(ExtrusionError::InvalidZRange { .. })
    ));
}

#[test]
fn rejects_two_vertex_polygon() {
    let line = Polygon2D::new(vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]);
    assert_eq!(
        Err(ExtrusionError::DegeneratePolygon(2)),
        extrude(&line, 0.0, 1.0, true)
    );
}

#[test]
fn clockwise_input_is_wound_counter_clockwise() {
    let cw = Polygon2D::new(rect_polygon(0.0, 0.0, 2.0, 2.0).points.into_iter().rev().collect());
    let solid = extrude(&cw, 0.0, 1.0, true).unwrap();
    let ring = Polygon2D::new(solid.footprint());
    assert!(ring.is_ccw());

    // Top face follows the ring, bottom face runs against it.
    assert_eq!(vec![4, 5, 6, 7], solid.faces[1]);
    assert_eq!(vec![3, 2, 1, 0], solid.faces[0]);
    assert_eq!(vec![0, 1, 5, 4], solid.faces[2]);
    assert_relative_eq!(4.0, solid.volume);
}

#[test]
fn orientation_check_can_be_disabled() {
    let cw = Polygon2D::new(rect_polygon(0.0, 0.0, 2.0, 2.0).points.into_iter().rev().collect());
    let solid = extrude(&cw, 0.0, 1.0, false).unwrap();
    assert!(!Polygon2D::new(solid.footprint()).is_ccw());
    assert_relative_eq!(4.0, solid.volume);
}
