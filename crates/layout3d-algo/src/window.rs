use crate::error::ClipError;
use crate::structs::LayerExtractionResult;
use layout3d_core::geom::{BBox2, Polygon2D, Vec2};
use layout3d_core::report::{codes, Warning, WindowStats};
use tracing::{debug, warn};

/// Pieces smaller than this are slivers left over from touching geometry.
const MIN_PIECE_AREA: f64 = 1e-12;

#[derive(Debug, Clone, Default)]
pub struct WindowOutput {
    pub layers: Vec<LayerExtractionResult>,
    pub stats: WindowStats,
    pub warnings: Vec<Warning>,
}

/// Restricts per-layer polygons to `window`.
///
/// Without `clip`, a polygon survives unchanged iff its bounding box overlaps the
/// window (touching counts). With `clip`, overlapping polygons that are not fully
/// inside are replaced by their intersection with the window. Aggregates are rebuilt
/// from the survivors and empty layers are removed.
pub fn filter_by_window(
    layers: Vec<LayerExtractionResult>,
    window: &BBox2,
    clip: bool,
) -> WindowOutput {
    let mut out = WindowOutput::default();

    for layer in layers {
        let mut kept = Vec::with_capacity(layer.polygons.len());
        for polygon in layer.polygons {
            out.stats.polygons_in += 1;
            let bbox = polygon.bbox();
            if !bbox.overlaps(window) {
                continue;
            }
            if !clip || window.contains_box(&bbox) {
                kept.push(polygon);
                continue;
            }
            match clip_to_window(&polygon, window) {
                Ok(pieces) => {
                    out.stats.polygons_clipped += 1;
                    kept.extend(pieces);
                }
                Err(err) => {
                    warn!(layer = %layer.rule.name, "dropping polygon that failed to clip: {err}");
                    out.stats.clip_failures += 1;
                    out.warnings.push(Warning::new(
                        codes::CLIP_FAILED,
                        format!("layer '{}': {err}", layer.rule.name),
                    ));
                }
            }
        }

        out.stats.polygons_out += kept.len();
        if kept.is_empty() {
            out.stats.layers_removed += 1;
            continue;
        }
        out.layers.push(LayerExtractionResult::from_polygons(layer.rule, kept));
    }

    debug!(
        kept = out.stats.polygons_out,
        of = out.stats.polygons_in,
        layers_removed = out.stats.layers_removed,
        "applied window"
    );
    out
}

/// Intersects a simple polygon with an axis-aligned rectangle.
///
/// Concave input may split into several pieces; every piece lies inside the window
/// and is wound counter-clockwise.
pub fn clip_to_window(polygon: &Polygon2D, window: &BBox2) -> Result<Vec<Polygon2D>, ClipError> {
    if window.is_empty() {
        return Err(ClipError::EmptyWindow);
    }
    let bbox = polygon.bbox();
    if !bbox.overlaps(window) {
        return Ok(Vec::new());
    }
    if window.contains_box(&bbox) {
        return Ok(vec![polygon.clone()]);
    }

    let edges = [
        WindowEdge::Left(window.min.x),
        WindowEdge::Right(window.max.x),
        WindowEdge::Bottom(window.min.y),
        WindowEdge::Top(window.max.y),
    ];

    let mut pieces = vec![polygon.to_ccw().points];
    for edge in edges {
        let mut next = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            next.extend(keep_inside(piece, edge)?);
        }
        pieces = next;
    }

    Ok(pieces
        .iter()
        .filter_map(|ring| Polygon2D::from_ring(ring))
        .filter(|p| p.area() > MIN_PIECE_AREA)
        .collect())
}

#[derive(Debug, Clone, Copy)]
enum WindowEdge {
    Left(f64),
    Right(f64),
    Bottom(f64),
    Top(f64),
}

impl WindowEdge {
    /// Signed distance to the edge line, non-negative on the window side.
    fn distance(self, p: Vec2) -> f64 {
        match self {
            WindowEdge::Left(x) => p.x - x,
            WindowEdge::Right(x) => x - p.x,
            WindowEdge::Bottom(y) => p.y - y,
            WindowEdge::Top(y) => y - p.y,
        }
    }

    /// Position of a point along the edge line.
    fn along(self, p: Vec2) -> f64 {
        match self {
            WindowEdge::Left(_) | WindowEdge::Right(_) => p.y,
            WindowEdge::Bottom(_) | WindowEdge::Top(_) => p.x,
        }
    }

    fn snap(self, p: Vec2) -> Vec2 {
        match self {
            WindowEdge::Left(x) | WindowEdge::Right(x) => Vec2::new(x, p.y),
            WindowEdge::Bottom(y) | WindowEdge::Top(y) => Vec2::new(p.x, y),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Vertex(Vec2),
    Enter(Vec2),
    Exit(Vec2),
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    along: f64,
    entering: bool,
    chain: usize,
}

/// Splits a counter-clockwise ring by one window edge and keeps the window side.
///
/// The ring is cut into chains that run from an entering crossing to an exiting
/// one. Crossings sorted along the edge line pair up into the intervals where the
/// polygon covers the line; each pair links an exit to the chain that re-enters
/// there, and following the links closes each output ring.
fn keep_inside(ring: &[Vec2], edge: WindowEdge) -> Result<Vec<Vec<Vec2>>, ClipError> {
    let d: Vec<f64> = ring.iter().map(|p| edge.distance(*p)).collect();
    if d.iter().all(|&v| v >= 0.0) {
        return Ok(vec![ring.to_vec()]);
    }
    if d.iter().all(|&v| v <= 0.0) {
        return Ok(Vec::new());
    }

    let n = ring.len();
    let mut nodes = Vec::with_capacity(n + 4);
    for i in 0..n {
        let j = (i + 1) % n;
        let (a, b) = (ring[i], ring[j]);
        let (a_in, b_in) = (d[i] >= 0.0, d[j] >= 0.0);
        if a_in {
            nodes.push(Node::Vertex(a));
        }
        if a_in != b_in {
            let t = d[i] / (d[i] - d[j]);
            let p = edge.snap(Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t));
            nodes.push(if a_in { Node::Exit(p) } else { Node::Enter(p) });
        }
    }

    let start = nodes
        .iter()
        .position(|node| matches!(node, Node::Enter(_)))
        .ok_or(ClipError::UnpairedCrossing)?;
    nodes.rotate_left(start);

    let mut chains: Vec<Vec<Vec2>> = Vec::new();
    let mut crossings: Vec<Crossing> = Vec::new();
    for node in nodes {
        match node {
            Node::Enter(p) => {
                crossings.push(Crossing {
                    along: edge.along(p),
                    entering: true,
                    chain: chains.len(),
                });
                chains.push(vec![p]);
            }
            Node::Vertex(p) => chains
                .last_mut()
                .ok_or(ClipError::UnpairedCrossing)?
                .push(p),
            Node::Exit(p) => {
                let chain = chains.len().checked_sub(1).ok_or(ClipError::UnpairedCrossing)?;
                chains[chain].push(p);
                crossings.push(Crossing {
                    along: edge.along(p),
                    entering: false,
                    chain,
                });
            }
        }
    }

    if crossings.len() % 2 != 0 {
        return Err(ClipError::UnpairedCrossing);
    }
    crossings.sort_by(|a, b| a.along.total_cmp(&b.along));

    let mut next_chain: Vec<Option<usize>> = vec![None; chains.len()];
    for pair in crossings.chunks_exact(2) {
        let (exit, enter) = match (pair[0].entering, pair[1].entering) {
            (false, true) => (pair[0], pair[1]),
            (true, false) => (pair[1], pair[0]),
            _ => return Err(ClipError::UnpairedCrossing),
        };
        next_chain[exit.chain] = Some(enter.chain);
    }

    let mut visited = vec![false; chains.len()];
    let mut pieces = Vec::new();
    for first in 0..chains.len() {
        if visited[first] {
            continue;
        }
        let mut piece = Vec::new();
        let mut current = first;
        let mut steps = 0;
        loop {
            if visited[current] {
                return Err(ClipError::RingNotClosed(steps));
            }
            visited[current] = true;
            piece.extend_from_slice(&chains[current]);
            steps += 1;
            current = next_chain[current].ok_or(ClipError::UnpairedCrossing)?;
            if current == first {
                break;
            }
        }
        pieces.push(piece);
    }
    Ok(pieces)
}
