mod common;

use approx::assert_relative_eq;
use common::{rect_polygon, rule};
use layout3d_algo::structs::LayerExtractionResult;
use layout3d_algo::window::{clip_to_window, filter_by_window};
use layout3d_core::geom::{BBox2, Polygon2D, Vec2};

fn window() -> BBox2 {
    BBox2::from_extents([0.0, 0.0, 150.0, 150.0])
}

fn layer(layer: u16, name: &str, polygons: Vec<Polygon2D>) -> LayerExtractionResult {
    LayerExtractionResult::from_polygons(rule(layer, name, 0.0, 1.0), polygons)
}

fn inside(bbox: &BBox2, window: &BBox2) -> bool {
    let eps = 1e-9;
    bbox.min.x >= window.min.x - eps
        && bbox.min.y >= window.min.y - eps
        && bbox.max.x <= window.max.x + eps
        && bbox.max.y <= window.max.y + eps
}

/// A U opening upwards: two 10-wide arms from y=10 to y=30 on a 10-high base.
fn u_shape() -> Polygon2D {
    Polygon2D::new(vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(30.0, 0.0),
        Vec2::new(30.0, 30.0),
        Vec2::new(20.0, 30.0),
        Vec2::new(20.0, 10.0),
        Vec2::new(10.0, 10.0),
        Vec2::new(10.0, 30.0),
        Vec2::new(0.0, 30.0),
    ])
}

#[test]
fn drops_layers_entirely_outside_the_window() {
    let layers = vec![
        layer(1, "near", vec![rect_polygon(10.0, 10.0, 50.0, 50.0), rect_polygon(200.0, 200.0, 250.0, 250.0)]),
        layer(2, "far", vec![rect_polygon(200.0, 200.0, 300.0, 300.0)]),
    ];
    let out = filter_by_window(layers, &window(), false);

    assert_eq!(1, out.layers.len());
    assert_eq!("near", out.layers[0].rule.name);
    assert_eq!(1, out.layers[0].polygon_count);
    assert_relative_eq!(1600.0, out.layers[0].total_area);
    assert_eq!(3, out.stats.polygons_in);
    assert_eq!(1, out.stats.polygons_out);
    assert_eq!(1, out.stats.layers_removed);
}

#[test]
fn keeps_straddling_polygons_unmodified_without_clip() {
    let straddling = rect_polygon(100.0, 100.0, 200.0, 200.0);
    let out = filter_by_window(vec![layer(1, "m1", vec![straddling.clone()])], &window(), false);
    assert_eq!(vec![straddling], out.layers[0].polygons);
    assert_eq!(0, out.stats.polygons_clipped);
}

#[test]
fn touching_the_window_edge_counts_as_overlap() {
    let touching = rect_polygon(150.0, 0.0, 160.0, 10.0);
    let out = filter_by_window(vec![layer(1, "m1", vec![touching])], &window(), false);
    assert_eq!(1, out.layers.len());
}

#[test]
fn clip_cuts_straddling_polygons_to_the_window() {
    let layers = vec![layer(
        1,
        "m1",
        vec![rect_polygon(100.0, 100.0, 200.0, 200.0), rect_polygon(10.0, 10.0, 20.0, 20.0)],
    )];
    let out = filter_by_window(layers, &window(), true);

    let result = &out.layers[0];
    assert_eq!(2, result.polygon_count);
    assert_eq!(1, out.stats.polygons_clipped);
    assert!(result.polygons.iter().all(|p| inside(&p.bbox(), &window())));
    assert_relative_eq!(2500.0 + 100.0, result.total_area, epsilon = 1e-9);
    assert_eq!(Vec2::new(150.0, 150.0), result.bbox.max);
}

#[test]
fn clip_splits_concave_polygons() {
    let cut = BBox2::from_extents([-5.0, 15.0, 35.0, 40.0]);
    let pieces = clip_to_window(&u_shape(), &cut).unwrap();

    assert_eq!(2, pieces.len());
    for piece in &pieces {
        assert!(piece.is_ccw());
        assert!(inside(&piece.bbox(), &cut));
        assert_relative_eq!(150.0, piece.area(), epsilon = 1e-9);
    }
}

#[test]
fn clip_keeps_concave_polygon_in_one_piece_when_connected() {
    let cut = BBox2::from_extents([5.0, -5.0, 40.0, 20.0]);
    let pieces = clip_to_window(&u_shape(), &cut).unwrap();

    assert_eq!(1, pieces.len());
    // Base 25x10 plus the two arm stubs 5x10 and 10x10.
    assert_relative_eq!(250.0 + 50.0 + 100.0, pieces[0].area(), epsilon = 1e-9);
}

#[test]
fn clip_handles_clockwise_input() {
    let cw = Polygon2D::new(rect_polygon(-10.0, -10.0, 10.0, 10.0).points.into_iter().rev().collect());
    let pieces = clip_to_window(&cw, &window()).unwrap();
    assert_eq!(1, pieces.len());
    assert_relative_eq!(100.0, pieces[0].area(), epsilon = 1e-9);
}

#[test]
fn clipping_away_everything_removes_the_layer() {
    let sliver = rect_polygon(150.0, 10.0, 160.0, 20.0);
    let out = filter_by_window(vec![layer(1, "m1", vec![sliver])], &window(), true);
    assert!(out.layers.is_empty());
    assert_eq!(1, out.stats.layers_removed);
    assert!(out.warnings.is_empty());
}
