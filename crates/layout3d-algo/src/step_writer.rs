use anyhow::{bail, Result};
use layout3d_core::layers::Rgb;
use layout3d_core::solid::Solid3D;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::fmt::Write;

struct StepWriter {
    next_id: u32,
    lines: Vec<String>,
}

impl StepWriter {
    fn new() -> Self {
        Self {
            next_id: 1,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, entity: String) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.lines.push(format!("#{id}={entity};"));
        id
    }
}

fn escape_step_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Relative tolerance for zero-length edges and flat faces.
const RELATIVE_EPSILON: f64 = 1e-12;

/// Full-precision STEP real: `1.5E0`, `2.E-6`, `0.`.
fn f64_step(v: f64) -> String {
    if !v.is_finite() || v == 0.0 {
        return "0.".to_string();
    }
    let s = format!("{v:.15E}");
    match s.split_once('E') {
        Some((mantissa, exp)) => format!("{}E{exp}", mantissa.trim_end_matches('0')),
        None => s,
    }
}

/// `v` scaled to unit length, or `None` when it is negligible next to `scale`.
fn unit_relative(v: &Vector3<f64>, scale: f64) -> Option<Vector3<f64>> {
    let norm = v.norm();
    if !norm.is_finite() || norm <= RELATIVE_EPSILON * scale {
        return None;
    }
    Some(v / norm)
}

fn id_list(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn length_unit(units: &str) -> &'static str {
    match units.trim().to_ascii_lowercase().as_str() {
        "m" | "meter" | "metre" => "(LENGTH_UNIT()NAMED_UNIT(*)SI_UNIT($,.METRE.))",
        "um" | "micron" | "micrometer" | "micrometre" => {
            "(LENGTH_UNIT()NAMED_UNIT(*)SI_UNIT(.MICRO.,.METRE.))"
        }
        "nm" | "nanometer" | "nanometre" => "(LENGTH_UNIT()NAMED_UNIT(*)SI_UNIT(.NANO.,.METRE.))",
        _ => "(LENGTH_UNIT()NAMED_UNIT(*)SI_UNIT(.MILLI.,.METRE.))",
    }
}

/// Serializes solids as an AP214 STEP file with one `MANIFOLD_SOLID_BREP` per solid.
///
/// Faces become planar `ADVANCED_FACE`s; edges are shared between the two faces
/// that use them. Each solid is styled with its layer color.
pub fn write_step(solids: &[Solid3D], units: &str, name: &str) -> Result<String> {
    if solids.is_empty() {
        bail!("no solids to write");
    }
    let safe_name = match name.trim() {
        "" => "layout3d".to_string(),
        n => escape_step_string(n),
    };

    let mut w = StepWriter::new();

    let app_ctx = w.push(
        "APPLICATION_CONTEXT('core data for automotive mechanical design processes')".to_string(),
    );
    w.push(format!(
        "APPLICATION_PROTOCOL_DEFINITION('international standard','automotive_design',2000,#{app_ctx})"
    ));
    let prod_def_ctx = w.push(format!(
        "PRODUCT_DEFINITION_CONTEXT('part definition',#{app_ctx},'design')"
    ));
    let prod_ctx = w.push(format!("PRODUCT_CONTEXT('',#{app_ctx},'mechanical')"));
    let product = w.push(format!("PRODUCT('{safe_name}','{safe_name}','',(#{prod_ctx}))"));
    let formation = w.push(format!(
        "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE('','',#{product},.MADE.)"
    ));
    let prod_def = w.push(format!("PRODUCT_DEFINITION('','',#{formation},#{prod_def_ctx})"));
    let prod_def_shape = w.push(format!("PRODUCT_DEFINITION_SHAPE('','',#{prod_def})"));

    let extent = solids
        .iter()
        .flat_map(|s| s.vertices.iter())
        .fold(0.0_f64, |m, v| m.max(v.x.abs()).max(v.y.abs()).max(v.z.abs()));
    let accuracy = if extent > 0.0 { (extent * 1e-7).min(1e-6) } else { 1e-6 };

    let len_unit = w.push(length_unit(units).to_string());
    let angle_unit = w.push("(NAMED_UNIT(*)PLANE_ANGLE_UNIT()SI_UNIT($,.RADIAN.))".to_string());
    let solid_unit = w.push("(NAMED_UNIT(*)SOLID_ANGLE_UNIT()SI_UNIT($,.STERADIAN.))".to_string());
    let uncertainty = w.push(format!(
        "UNCERTAINTY_MEASURE_WITH_UNIT(LENGTH_MEASURE({}),#{len_unit},'distance_accuracy_value','')",
        f64_step(accuracy)
    ));
    let ctx = w.push(format!(
        "(GEOMETRIC_REPRESENTATION_CONTEXT(3)GLOBAL_UNCERTAINTY_ASSIGNED_CONTEXT((#{uncertainty}))GLOBAL_UNIT_ASSIGNED_CONTEXT((#{len_unit},#{angle_unit},#{solid_unit}))REPRESENTATION_CONTEXT('',''))"
    ));

    let origin = w.push("CARTESIAN_POINT('',(0.,0.,0.))".to_string());
    let z_dir = w.push("DIRECTION('',(0.,0.,1.))".to_string());
    let x_dir = w.push("DIRECTION('',(1.,0.,0.))".to_string());
    let world = w.push(format!("AXIS2_PLACEMENT_3D('',#{origin},#{z_dir},#{x_dir})"));

    let mut items = vec![world];
    let mut styled = Vec::new();
    for (i, solid) in solids.iter().enumerate() {
        let brep = write_brep(&mut w, solid, i)?;
        items.push(brep);
        styled.push(write_style(&mut w, solid.color, brep));
    }

    let shape_rep = w.push(format!(
        "ADVANCED_BREP_SHAPE_REPRESENTATION('{safe_name}',({}),#{ctx})",
        id_list(&items)
    ));
    w.push(format!(
        "SHAPE_DEFINITION_REPRESENTATION(#{prod_def_shape},#{shape_rep})"
    ));
    w.push(format!(
        "MECHANICAL_DESIGN_GEOMETRIC_PRESENTATION_REPRESENTATION('',({}),#{ctx})",
        id_list(&styled)
    ));

    let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
    let mut out = String::new();
    writeln!(out, "ISO-10303-21;")?;
    writeln!(out, "HEADER;")?;
    writeln!(out, "FILE_DESCRIPTION(('layout3d extruded layout'),'2;1');")?;
    writeln!(
        out,
        "FILE_NAME('{safe_name}.step','{timestamp}',('layout3d'),(''),'layout3d','layout3d','');"
    )?;
    writeln!(out, "FILE_SCHEMA(('AUTOMOTIVE_DESIGN {{1 0 10303 214 1 1 1 1}}'));")?;
    writeln!(out, "ENDSEC;")?;
    writeln!(out, "DATA;")?;
    for line in &w.lines {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "ENDSEC;")?;
    writeln!(out, "END-ISO-10303-21;")?;
    Ok(out)
}

fn write_brep(w: &mut StepWriter, solid: &Solid3D, index: usize) -> Result<u32> {
    let points: Vec<Vector3<f64>> = solid
        .vertices
        .iter()
        .map(|v| Vector3::new(v.x, v.y, v.z))
        .collect();

    let mut point_ids = Vec::with_capacity(points.len());
    let mut vertex_ids = Vec::with_capacity(points.len());
    for p in &points {
        let pid = w.push(format!(
            "CARTESIAN_POINT('',({},{},{}))",
            f64_step(p.x),
            f64_step(p.y),
            f64_step(p.z)
        ));
        point_ids.push(pid);
        vertex_ids.push(w.push(format!("VERTEX_POINT('',#{pid})")));
    }

    // Undirected edge (lo, hi) -> EDGE_CURVE running lo -> hi.
    let mut edges: HashMap<(usize, usize), u32> = HashMap::new();
    let mut face_ids = Vec::with_capacity(solid.faces.len());
    for face in &solid.faces {
        if face.len() < 3 || face.iter().any(|&i| i >= points.len()) {
            bail!("solid {index} has an invalid face {face:?}");
        }

        let mut oriented = Vec::with_capacity(face.len());
        for k in 0..face.len() {
            let (a, b) = (face[k], face[(k + 1) % face.len()]);
            let key = (a.min(b), a.max(b));
            let edge = match edges.get(&key) {
                Some(&id) => id,
                None => {
                    let id = edge_curve(w, &points, &point_ids, &vertex_ids, key)?;
                    edges.insert(key, id);
                    id
                }
            };
            let sense = if a < b { ".T." } else { ".F." };
            oriented.push(w.push(format!("ORIENTED_EDGE('',*,*,#{edge},{sense})")));
        }
        let edge_loop = w.push(format!("EDGE_LOOP('',({}))", id_list(&oriented)));
        let bound = w.push(format!("FACE_OUTER_BOUND('',#{edge_loop},.T.)"));

        let loop_points: Vec<Vector3<f64>> = face.iter().map(|&i| points[i]).collect();
        let Some(normal) = face_normal(&loop_points) else {
            bail!("solid {index} has a degenerate face {face:?}");
        };
        let first_edge = loop_points[1] - loop_points[0];
        let reference = unit_relative(&first_edge, loop_size(&loop_points))
            .unwrap_or_else(|| any_perpendicular(&normal));
        let n_dir = direction(w, &normal);
        let r_dir = direction(w, &reference);
        let placement = w.push(format!(
            "AXIS2_PLACEMENT_3D('',#{},#{n_dir},#{r_dir})",
            point_ids[face[0]]
        ));
        let plane = w.push(format!("PLANE('',#{placement})"));
        face_ids.push(w.push(format!("ADVANCED_FACE('',(#{bound}),#{plane},.T.)")));
    }

    let shell = w.push(format!("CLOSED_SHELL('',({}))", id_list(&face_ids)));
    let label = if solid.layer_name.is_empty() {
        format!("solid_{index}")
    } else {
        format!("{}_{index}", escape_step_string(&solid.layer_name))
    };
    Ok(w.push(format!("MANIFOLD_SOLID_BREP('{label}',#{shell})")))
}

fn edge_curve(
    w: &mut StepWriter,
    points: &[Vector3<f64>],
    point_ids: &[u32],
    vertex_ids: &[u32],
    (lo, hi): (usize, usize),
) -> Result<u32> {
    let delta = points[hi] - points[lo];
    let length = delta.norm();
    let scale = points[lo].norm().max(points[hi].norm());
    let Some(dir) = unit_relative(&delta, scale) else {
        bail!("zero-length edge between vertices {lo} and {hi}");
    };
    let dir_id = direction(w, &dir);
    let vector = w.push(format!("VECTOR('',#{dir_id},{})", f64_step(length)));
    let line = w.push(format!("LINE('',#{},#{vector})", point_ids[lo]));
    Ok(w.push(format!(
        "EDGE_CURVE('',#{},#{},#{line},.T.)",
        vertex_ids[lo], vertex_ids[hi]
    )))
}

fn direction(w: &mut StepWriter, v: &Vector3<f64>) -> u32 {
    w.push(format!(
        "DIRECTION('',({},{},{}))",
        f64_step(v.x),
        f64_step(v.y),
        f64_step(v.z)
    ))
}

/// Largest distance of a loop vertex from the first one.
fn loop_size(points: &[Vector3<f64>]) -> f64 {
    points
        .iter()
        .map(|p| (p - points[0]).norm())
        .fold(0.0, f64::max)
}

/// Newell normal taken about the first vertex, so the flatness test scales with
/// the face instead of its distance from the origin.
fn face_normal(points: &[Vector3<f64>]) -> Option<Vector3<f64>> {
    let origin = points[0];
    let mut n = Vector3::zeros();
    for (k, a) in points.iter().enumerate() {
        let b = points[(k + 1) % points.len()];
        n += (a - origin).cross(&(b - origin));
    }
    let size = loop_size(points);
    unit_relative(&n, size * size)
}

fn any_perpendicular(n: &Vector3<f64>) -> Vector3<f64> {
    let axis = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    n.cross(&axis).normalize()
}

fn write_style(w: &mut StepWriter, color: Rgb, item: u32) -> u32 {
    let [r, g, b] = color.to_unit();
    let colour = w.push(format!(
        "COLOUR_RGB('',{},{},{})",
        f64_step(r),
        f64_step(g),
        f64_step(b)
    ));
    let fill_colour = w.push(format!("FILL_AREA_STYLE_COLOUR('',#{colour})"));
    let fill = w.push(format!("FILL_AREA_STYLE('',(#{fill_colour}))"));
    let fill_area = w.push(format!("SURFACE_STYLE_FILL_AREA(#{fill})"));
    let side = w.push(format!("SURFACE_SIDE_STYLE('',(#{fill_area}))"));
    let usage = w.push(format!("SURFACE_STYLE_USAGE(.BOTH.,#{side})"));
    let assignment = w.push(format!("PRESENTATION_STYLE_ASSIGNMENT((#{usage}))"));
    w.push(format!("STYLED_ITEM('color',(#{assignment}),#{item})"))
}
