#![allow(dead_code)]

use layout3d_core::geom::{Polygon2D, Vec2};
use layout3d_core::layers::{LayerRule, LayerStackTable, Rgb};
use layout3d_core::model::{
    ArrayRef, Boundary, GeometryElement, LayerKey, Strans, StructureRef,
};

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Vec2> {
    vec![
        Vec2::new(x0, y0),
        Vec2::new(x1, y0),
        Vec2::new(x1, y1),
        Vec2::new(x0, y1),
    ]
}

pub fn rect_polygon(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon2D {
    Polygon2D::new(rect(x0, y0, x1, y1))
}

pub fn boundary(layer: u16, points: Vec<Vec2>) -> GeometryElement {
    GeometryElement::Boundary(Boundary {
        key: LayerKey::new(layer, 0),
        points,
    })
}

pub fn sref(name: &str, x: f64, y: f64, angle_deg: f64) -> GeometryElement {
    GeometryElement::StructureRef(StructureRef {
        name: name.to_string(),
        origin: Vec2::new(x, y),
        strans: Strans {
            angle_deg,
            ..Strans::default()
        },
    })
}

pub fn aref(name: &str, columns: u16, rows: u16, pitch: f64) -> GeometryElement {
    GeometryElement::ArrayRef(ArrayRef {
        name: name.to_string(),
        columns,
        rows,
        origin: Vec2::new(0.0, 0.0),
        col_corner: Vec2::new(pitch * f64::from(columns), 0.0),
        row_corner: Vec2::new(0.0, pitch * f64::from(rows)),
        strans: Strans::default(),
    })
}

pub fn rule(layer: u16, name: &str, z_bottom: f64, z_top: f64) -> LayerRule {
    LayerRule {
        source_layer: layer,
        source_datatype: 0,
        name: name.to_string(),
        z_bottom,
        z_top,
        material: format!("mat-{name}"),
        color: Rgb::new(0x40, 0x80, 0xC0),
        enabled: true,
    }
}

pub fn table(rules: Vec<LayerRule>) -> LayerStackTable {
    LayerStackTable::new(rules).expect("valid layer stack")
}
