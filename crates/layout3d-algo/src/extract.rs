use crate::error::ExtractionError;
use crate::structs::{FlattenedShape, LayerExtractionResult, PathGeometry, ShapeKind};
use layout3d_core::geom::{clean_ring, distinct_count, encloses_area, Polygon2D, Vec2};
use layout3d_core::layers::LayerStackTable;
use layout3d_core::model::PathType;
use layout3d_core::report::{codes, ExtractStats, Warning};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Segments used to approximate each half-circle path cap.
pub const ROUND_CAP_SEGMENTS: usize = 8;

/// Sharp path corners are clamped to this multiple of the half width.
const MITER_LIMIT: f64 = 4.0;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub layer_filter: Option<BTreeSet<u16>>,
    pub datatype_filter: Option<BTreeSet<u16>>,
    pub enabled_only: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            layer_filter: None,
            datatype_filter: None,
            enabled_only: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOutput {
    pub layers: Vec<LayerExtractionResult>,
    pub stats: ExtractStats,
    pub warnings: Vec<Warning>,
}

/// Buckets leaf shapes into per-layer polygons following the layer stack.
///
/// Shapes on unmapped or filtered layers are counted and skipped. Malformed shapes
/// are dropped with a warning. Layers that receive no polygon are omitted; the rest
/// keep the table's order.
pub fn extract(
    shapes: &[FlattenedShape],
    table: &LayerStackTable,
    options: &ExtractOptions,
) -> ExtractOutput {
    let mut out = ExtractOutput::default();
    let mut buckets: Vec<Vec<Polygon2D>> = vec![Vec::new(); table.len()];

    for shape in shapes {
        out.stats.shapes_processed += 1;

        let Some(rule_idx) = table.lookup_index(shape.key) else {
            out.stats.shapes_unmapped += 1;
            continue;
        };
        let rule = &table.rules()[rule_idx];
        let excluded = (options.enabled_only && !rule.enabled)
            || options
                .layer_filter
                .as_ref()
                .is_some_and(|f| !f.contains(&shape.key.layer))
            || options
                .datatype_filter
                .as_ref()
                .is_some_and(|f| !f.contains(&shape.key.datatype));
        if excluded {
            out.stats.shapes_filtered += 1;
            continue;
        }

        match shape_to_polygon(shape) {
            Ok(Some(polygon)) => {
                out.stats.polygons_kept += 1;
                buckets[rule_idx].push(polygon);
            }
            Ok(None) => out.stats.texts_skipped += 1,
            Err(err) => {
                warn!(layer = %rule.name, "dropping shape: {err}");
                out.stats.polygons_dropped += 1;
                out.warnings.push(Warning::new(codes::MALFORMED_SHAPE, err.to_string()));
            }
        }
    }

    for (rule, polygons) in table.rules().iter().zip(buckets) {
        if polygons.is_empty() {
            continue;
        }
        out.layers.push(LayerExtractionResult::from_polygons(rule.clone(), polygons));
    }

    debug!(
        processed = out.stats.shapes_processed,
        kept = out.stats.polygons_kept,
        layers = out.layers.len(),
        "extracted layer polygons"
    );
    out
}

/// Converts one leaf shape into a polygon. Text has no fill and yields `Ok(None)`.
pub fn shape_to_polygon(shape: &FlattenedShape) -> Result<Option<Polygon2D>, ExtractionError> {
    let (kind, ring) = match &shape.kind {
        ShapeKind::Boundary => ("boundary", clean_ring(&shape.points)),
        ShapeKind::Path(geom) => {
            if !(geom.width > 0.0) {
                return Err(ExtractionError::InvalidPathWidth {
                    layer: shape.key.layer,
                    datatype: shape.key.datatype,
                    width: geom.width,
                });
            }
            ("path", clean_ring(&path_outline(&shape.points, geom)))
        }
        ShapeKind::Text(_) => return Ok(None),
    };

    let distinct = distinct_count(&ring);
    if distinct < 3 {
        return Err(ExtractionError::TooFewVertices {
            kind,
            layer: shape.key.layer,
            datatype: shape.key.datatype,
            distinct,
        });
    }
    if !encloses_area(&ring) {
        return Err(ExtractionError::ZeroArea {
            kind,
            layer: shape.key.layer,
            datatype: shape.key.datatype,
        });
    }
    Ok(Some(Polygon2D::new(ring)))
}

/// Widens a centerline into a closed outline `width/2` to each side.
///
/// Returns an empty ring for centerlines with fewer than two distinct points.
pub fn path_outline(centerline: &[Vec2], geom: &PathGeometry) -> Vec<Vec2> {
    let mut pts: Vec<Vec2> = Vec::with_capacity(centerline.len());
    for p in centerline {
        if pts.last().is_some_and(|last: &Vec2| last.approx_eq(p)) {
            continue;
        }
        pts.push(*p);
    }
    if pts.len() < 2 {
        return Vec::new();
    }

    let half = geom.width * 0.5;
    let cap_default = match geom.path_type {
        PathType::Square => half,
        PathType::Flush | PathType::Round | PathType::Custom => 0.0,
    };
    let begin_ext = geom.begin_extension.unwrap_or(cap_default);
    let end_ext = geom.end_extension.unwrap_or(cap_default);
    let round_begin = geom.path_type == PathType::Round && geom.begin_extension.is_none();
    let round_end = geom.path_type == PathType::Round && geom.end_extension.is_none();

    let n = pts.len();
    let d_first = direction(pts[0], pts[1]);
    let d_last = direction(pts[n - 2], pts[n - 1]);
    pts[0] = offset(pts[0], d_first, -begin_ext);
    pts[n - 1] = offset(pts[n - 1], d_last, end_ext);

    let mut left = Vec::with_capacity(n);
    let mut right = Vec::with_capacity(n);
    for i in 0..n {
        let normal = if i == 0 {
            left_normal(d_first)
        } else if i == n - 1 {
            left_normal(d_last)
        } else {
            let n_prev = left_normal(direction(pts[i - 1], pts[i]));
            let n_next = left_normal(direction(pts[i], pts[i + 1]));
            let sum = Vec2::new(n_prev.x + n_next.x, n_prev.y + n_next.y);
            let len = sum.x.hypot(sum.y);
            if len < 1e-12 {
                // The path doubles back on itself.
                n_next
            } else {
                let miter = Vec2::new(sum.x / len, sum.y / len);
                let cos = (miter.x * n_next.x + miter.y * n_next.y).max(1.0 / MITER_LIMIT);
                Vec2::new(miter.x / cos, miter.y / cos)
            }
        };
        left.push(offset(pts[i], normal, half));
        right.push(offset(pts[i], normal, -half));
    }

    let mut ring = Vec::with_capacity(2 * n + 2 * ROUND_CAP_SEGMENTS);
    ring.extend(left.iter().copied());
    if round_end {
        ring.extend(half_circle(pts[n - 1], left_normal(d_last), half));
    }
    ring.extend(right.iter().rev().copied());
    if round_begin {
        let n0 = left_normal(d_first);
        ring.extend(half_circle(pts[0], Vec2::new(-n0.x, -n0.y), half));
    }
    ring
}

/// Interior arc points of a clockwise half circle starting at `center + start_dir * r`.
fn half_circle(center: Vec2, start_dir: Vec2, r: f64) -> impl Iterator<Item = Vec2> {
    let a0 = start_dir.y.atan2(start_dir.x);
    (1..ROUND_CAP_SEGMENTS).map(move |k| {
        let a = a0 - PI * k as f64 / ROUND_CAP_SEGMENTS as f64;
        Vec2::new(center.x + r * a.cos(), center.y + r * a.sin())
    })
}

fn direction(a: Vec2, b: Vec2) -> Vec2 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy);
    if !len.is_finite() || len < 1e-12 {
        return Vec2::new(0.0, 0.0);
    }
    Vec2::new(dx / len, dy / len)
}

fn left_normal(d: Vec2) -> Vec2 {
    Vec2::new(-d.y, d.x)
}

fn offset(p: Vec2, dir: Vec2, dist: f64) -> Vec2 {
    Vec2::new(p.x + dir.x * dist, p.y + dir.y * dist)
}
