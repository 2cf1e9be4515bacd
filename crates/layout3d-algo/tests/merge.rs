mod common;

use approx::assert_relative_eq;
use common::{rect_polygon, rule};
use layout3d_algo::error::KernelError;
use layout3d_algo::extrude::extrude;
use layout3d_algo::merge::{merge, BooleanOp, MergeKernel, PrismStackKernel};
use layout3d_core::report::codes;
use layout3d_core::solid::Solid3D;

fn prism(x0: f64, z_bottom: f64, z_top: f64, layer: u16, name: &str) -> Solid3D {
    extrude(&rect_polygon(x0, 0.0, x0 + 10.0, 10.0), z_bottom, z_top, true)
        .unwrap()
        .with_rule(&rule(layer, name, z_bottom, z_top))
}

fn with_material(mut solid: Solid3D, material: &str) -> Solid3D {
    solid.material = material.to_string();
    solid
}

struct FailingKernel;

impl MergeKernel for FailingKernel {
    fn name(&self) -> &str {
        "failing"
    }

    fn combine(&self, _op: BooleanOp, _solids: &[Solid3D]) -> Result<Vec<Solid3D>, KernelError> {
        Err(KernelError::InvalidResult("boom".to_string()))
    }
}

#[test]
fn stacks_contiguous_prisms_of_one_material() {
    let solids = vec![
        with_material(prism(0.0, 1.0, 2.0, 2, "upper"), "Cu"),
        with_material(prism(0.0, 0.0, 1.0, 1, "lower"), "Cu"),
        with_material(prism(50.0, 0.0, 1.0, 1, "lower"), "Cu"),
    ];
    let out = merge(solids, BooleanOp::Union, Some(&PrismStackKernel::default()));

    assert!(out.stats.applied);
    assert_eq!(3, out.stats.input_count);
    assert_eq!(2, out.stats.output_count);
    assert!(out.warnings.is_empty());

    let stacked = &out.solids[0];
    assert_relative_eq!(0.0, stacked.z_bottom);
    assert_relative_eq!(2.0, stacked.z_top);
    assert_relative_eq!(200.0, stacked.volume);
    // Metadata comes from the first solid in input order.
    assert_eq!("upper", stacked.layer_name);
}

#[test]
fn different_materials_never_merge() {
    let solids = vec![
        with_material(prism(0.0, 0.0, 1.0, 1, "a"), "Cu"),
        with_material(prism(0.0, 1.0, 2.0, 2, "b"), "W"),
    ];
    let out = merge(solids, BooleanOp::Union, Some(&PrismStackKernel::default()));
    assert_eq!(2, out.solids.len());
    assert_eq!(2, out.stats.groups);
}

#[test]
fn separated_prisms_stay_apart() {
    let solids = vec![
        with_material(prism(0.0, 0.0, 1.0, 1, "a"), "Cu"),
        with_material(prism(0.0, 1.5, 2.0, 2, "b"), "Cu"),
    ];
    let out = merge(solids.clone(), BooleanOp::Union, Some(&PrismStackKernel::default()));
    assert_eq!(solids, out.solids);
}

#[test]
fn missing_kernel_returns_input_with_warning() {
    let solids = vec![prism(0.0, 0.0, 1.0, 1, "a"), prism(0.0, 1.0, 2.0, 1, "a")];
    let out = merge(solids.clone(), BooleanOp::Union, None);
    assert_eq!(solids, out.solids);
    assert!(!out.stats.applied);
    assert_eq!(codes::MERGE_UNAVAILABLE, out.warnings[0].code);
}

#[test]
fn unsupported_operation_returns_input_with_warning() {
    let solids = vec![prism(0.0, 0.0, 1.0, 1, "a"), prism(0.0, 1.0, 2.0, 1, "a")];
    let out = merge(solids.clone(), BooleanOp::Difference, Some(&PrismStackKernel::default()));
    assert_eq!(solids, out.solids);
    assert_eq!(codes::MERGE_FAILED, out.warnings[0].code);
    assert!(out.warnings[0].message.contains("difference"));
}

#[test]
fn kernel_failure_returns_input_unchanged() {
    let solids = vec![
        with_material(prism(0.0, 0.0, 1.0, 1, "a"), "Cu"),
        with_material(prism(20.0, 0.0, 1.0, 1, "b"), "W"),
    ];
    let out = merge(solids.clone(), BooleanOp::Union, Some(&FailingKernel));
    assert_eq!(solids, out.solids);
    assert!(!out.stats.applied);
    assert_eq!(1, out.warnings.len());
}
