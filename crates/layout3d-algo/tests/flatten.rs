mod common;

use approx::assert_relative_eq;
use common::{aref, boundary, rect, sref};
use layout3d_algo::error::HierarchyError;
use layout3d_algo::flatten::{flatten, Placement};
use layout3d_algo::structs::ShapeKind;
use layout3d_core::geom::{BBox2, Vec2};
use layout3d_core::model::{
    GeometryElement, LayerKey, Library, PathElement, PathType, Strans, Structure, StructureRef,
    TextElement,
};

fn scenario_library() -> Library {
    let bottom = Structure::new("Bottom").with_element(boundary(1, rect(0.0, 0.0, 10.0, 5.0)));
    let mid = Structure::new("Mid")
        .with_element(sref("Bottom", 0.0, 0.0, 0.0))
        .with_element(sref("Bottom", 100.0, 0.0, 90.0));
    let top = Structure::new("Top")
        .with_element(sref("Mid", 1000.0, 0.0, 0.0))
        .with_element(aref("Bottom", 2, 2, 20.0))
        .with_element(boundary(2, rect(-50.0, -50.0, -40.0, -40.0)));
    Library::new("scenario", vec![bottom, mid, top])
}

#[test]
fn flattens_nested_and_array_references() {
    let lib = scenario_library();
    let out = flatten(&lib, Some("Top"), None).unwrap();

    // 2 through Mid, 4 from the array, 1 of Top's own.
    assert_eq!(7, out.shapes.len());
    assert!(out
        .shapes
        .iter()
        .all(|s| matches!(s.kind, ShapeKind::Boundary)));
    assert_eq!(0, out.stats.references_truncated);
    assert_eq!(1 + 2 + 4, out.stats.references_expanded);
    assert_eq!(1, out.shapes.iter().filter(|s| s.key == LayerKey::new(2, 0)).count());

    let rotated = out
        .shapes
        .iter()
        .map(|s| BBox2::from_points(&s.points))
        .find(|b| b.min.x > 1050.0)
        .expect("rotated instance");
    assert_relative_eq!(1095.0, rotated.min.x, epsilon = 1e-9);
    assert_relative_eq!(1100.0, rotated.max.x, epsilon = 1e-9);
    assert_relative_eq!(0.0, rotated.min.y, epsilon = 1e-9);
    assert_relative_eq!(10.0, rotated.max.y, epsilon = 1e-9);

    let mut array_corners: Vec<(i64, i64)> = out
        .shapes
        .iter()
        .map(|s| BBox2::from_points(&s.points))
        .filter(|b| b.min.x >= 0.0 && b.max.x < 100.0)
        .map(|b| (b.min.x.round() as i64, b.min.y.round() as i64))
        .collect();
    array_corners.sort();
    assert_eq!(vec![(0, 0), (0, 20), (20, 0), (20, 20)], array_corners);
}

#[test]
fn flattens_all_top_structures_by_default() {
    let lib = Library::new(
        "two-tops",
        vec![
            Structure::new("A").with_element(boundary(1, rect(0.0, 0.0, 1.0, 1.0))),
            Structure::new("B").with_element(boundary(1, rect(5.0, 5.0, 6.0, 6.0))),
        ],
    );
    let out = flatten(&lib, None, None).unwrap();
    assert_eq!(2, out.shapes.len());
    assert_eq!(2, out.stats.structures_visited);
}

#[test]
fn self_reference_is_a_cycle() {
    let lib = Library::new(
        "loop",
        vec![Structure::new("A")
            .with_element(boundary(1, rect(0.0, 0.0, 1.0, 1.0)))
            .with_element(sref("A", 10.0, 0.0, 0.0))],
    );
    let err = flatten(&lib, Some("A"), None).unwrap_err();
    assert_eq!(
        HierarchyError::CircularReference {
            chain: vec!["A".to_string(), "A".to_string()]
        },
        err
    );
    assert!(err.to_string().contains("A -> A"));
}

#[test]
fn mutual_reference_is_a_cycle() {
    let lib = Library::new(
        "loop",
        vec![
            Structure::new("Top").with_element(sref("A", 0.0, 0.0, 0.0)),
            Structure::new("A").with_element(sref("B", 0.0, 0.0, 0.0)),
            Structure::new("B").with_element(sref("A", 0.0, 0.0, 0.0)),
        ],
    );
    match flatten(&lib, None, None) {
        Err(HierarchyError::CircularReference { chain }) => {
            assert_eq!(vec!["Top", "A", "B", "A"], chain);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn shared_subcell_is_not_a_cycle() {
    let lib = Library::new(
        "diamond",
        vec![
            Structure::new("Leaf").with_element(boundary(1, rect(0.0, 0.0, 1.0, 1.0))),
            Structure::new("Top")
                .with_element(sref("Leaf", 0.0, 0.0, 0.0))
                .with_element(sref("Leaf", 5.0, 0.0, 0.0)),
        ],
    );
    let out = flatten(&lib, Some("Top"), None).unwrap();
    assert_eq!(2, out.shapes.len());
}

#[test]
fn unresolved_reference_fails() {
    let lib = Library::new(
        "dangling",
        vec![Structure::new("Top").with_element(sref("Missing", 0.0, 0.0, 0.0))],
    );
    assert_eq!(
        Err(HierarchyError::UnresolvedReference {
            parent: "Top".to_string(),
            name: "Missing".to_string()
        }),
        flatten(&lib, None, None).map(|o| o.shapes.len())
    );
}

#[test]
fn unknown_start_structure_fails() {
    let lib = scenario_library();
    assert!(matches!(
        flatten(&lib, Some("Nope"), None),
        Err(HierarchyError::StartNotFound(_))
    ));
}

#[test]
fn max_depth_truncates_references() {
    let lib = scenario_library();

    let own_only = flatten(&lib, Some("Top"), Some(0)).unwrap();
    assert_eq!(1, own_only.shapes.len());
    // One SREF plus four AREF instances.
    assert_eq!(5, own_only.stats.references_truncated);

    let one_level = flatten(&lib, Some("Top"), Some(1)).unwrap();
    assert_eq!(1 + 4, one_level.shapes.len());
    assert_eq!(2, one_level.stats.references_truncated);
}

#[test]
fn deep_hierarchy_does_not_exhaust_the_stack() {
    let depth = 5_000;
    let mut structures = Vec::with_capacity(depth + 1);
    for i in 0..depth {
        structures.push(
            Structure::new(format!("S{i}")).with_element(sref(&format!("S{}", i + 1), 1.0, 0.0, 0.0)),
        );
    }
    structures.push(Structure::new(format!("S{depth}")).with_element(boundary(1, rect(0.0, 0.0, 1.0, 1.0))));
    let lib = Library::new("deep", structures);

    let out = flatten(&lib, Some("S0"), None).unwrap();
    assert_eq!(1, out.shapes.len());
    assert_relative_eq!(depth as f64, out.shapes[0].points[0].x);
}

#[test]
fn placement_mirrors_before_rotating() {
    let strans = Strans {
        mirror_x: true,
        magnification: 2.0,
        angle_deg: 90.0,
    };
    let p = Placement::from_reference(Vec2::new(10.0, 0.0), &strans).apply(Vec2::new(1.0, 1.0));
    // (1,1) -> mirror (1,-1) -> x2 (2,-2) -> rot90 (2,2) -> +(10,0)
    assert_relative_eq!(12.0, p.x, epsilon = 1e-12);
    assert_relative_eq!(2.0, p.y, epsilon = 1e-12);
}

#[test]
fn path_width_follows_magnification_unless_absolute() {
    let path = |width: f64| {
        GeometryElement::Path(PathElement {
            key: LayerKey::new(3, 0),
            points: vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)],
            width,
            path_type: PathType::Flush,
            begin_extension: None,
            end_extension: Some(1.0),
        })
    };
    let lib = Library::new(
        "paths",
        vec![
            Structure::new("Cell").with_element(path(2.0)).with_element(path(-2.0)),
            Structure::new("Top").with_element(GeometryElement::StructureRef(StructureRef {
                name: "Cell".to_string(),
                origin: Vec2::new(0.0, 0.0),
                strans: Strans {
                    magnification: 3.0,
                    ..Strans::default()
                },
            })),
        ],
    );
    let out = flatten(&lib, Some("Top"), None).unwrap();
    let widths: Vec<(f64, Option<f64>)> = out
        .shapes
        .iter()
        .filter_map(|s| match &s.kind {
            ShapeKind::Path(g) => Some((g.width, g.end_extension)),
            _ => None,
        })
        .collect();
    assert_eq!(vec![(6.0, Some(3.0)), (2.0, Some(3.0))], widths);
}

#[test]
fn text_is_placed_and_nodes_are_counted() {
    let lib = Library::new(
        "labels",
        vec![Structure::new("Top")
            .with_element(GeometryElement::Text(TextElement {
                key: LayerKey::new(1, 0),
                text: "VDD".to_string(),
                position: Vec2::new(3.0, 4.0),
                strans: Strans::default(),
            }))
            .with_element(GeometryElement::Node(layout3d_core::model::NodeElement {
                key: LayerKey::new(1, 0),
                points: vec![Vec2::new(0.0, 0.0)],
            }))],
    );
    let out = flatten(&lib, None, None).unwrap();
    assert_eq!(1, out.shapes.len());
    assert_eq!(ShapeKind::Text("VDD".to_string()), out.shapes[0].kind);
    assert_eq!(vec![Vec2::new(3.0, 4.0)], out.shapes[0].points);
    assert_eq!(1, out.stats.nodes_skipped);
}
