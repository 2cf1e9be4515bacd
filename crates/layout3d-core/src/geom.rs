use serde::{Deserialize, Serialize};

/// Tolerance used when deciding whether two layout points coincide.
pub const POINT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < POINT_EPSILON && (self.y - other.y).abs() < POINT_EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl BBox2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Builds a window box from `[xmin, ymin, xmax, ymax]`, swapping reversed bounds.
    pub fn from_extents(extents: [f64; 4]) -> Self {
        let [x0, y0, x1, y1] = extents;
        Self {
            min: Vec2::new(x0.min(x1), y0.min(y1)),
            max: Vec2::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec2::new(f64::INFINITY, f64::INFINITY),
            max: Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Vec2]) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.include_point(*p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn include_point(&mut self, point: Vec2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min: Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Closed-interval overlap: boxes that only touch along an edge or corner overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    pub fn contains_box(&self, other: &Self) -> bool {
        !other.is_empty()
            && other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }

    pub fn width(&self) -> f64 {
        (self.max.x - self.min.x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max.y - self.min.y).max(0.0)
    }
}

/// A closed ring of at least three distinct vertices. The closing edge is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon2D {
    pub points: Vec<Vec2>,
}

impl Polygon2D {
    /// Wraps a ring without cleaning it. Use [`Polygon2D::from_ring`] for raw layout data.
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    /// Drops consecutive duplicates and a repeated closing vertex. Returns `None` when
    /// fewer than three distinct vertices remain or the ring encloses no area.
    pub fn from_ring(points: &[Vec2]) -> Option<Self> {
        let cleaned = clean_ring(points);
        if distinct_count(&cleaned) < 3 || !encloses_area(&cleaned) {
            return None;
        }
        Some(Self { points: cleaned })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shoelace sum halved; positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn bbox(&self) -> BBox2 {
        BBox2::from_points(&self.points)
    }

    /// Multiplies every coordinate by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.points
                .iter()
                .map(|p| Vec2::new(p.x * factor, p.y * factor))
                .collect(),
        )
    }

    /// Returns the same ring wound counter-clockwise.
    pub fn to_ccw(&self) -> Self {
        let mut points = self.points.clone();
        if signed_area(&points) < 0.0 {
            points.reverse();
        }
        Self { points }
    }
}

pub fn signed_area(points: &[Vec2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

/// Number of pairwise distinct vertices, anywhere in the ring.
pub fn distinct_count(points: &[Vec2]) -> usize {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| a.approx_eq(b));
    sorted.len()
}

/// False for rings whose area vanishes next to their bounding box, such as
/// collinear or back-tracking outlines.
pub fn encloses_area(points: &[Vec2]) -> bool {
    let bbox = BBox2::from_points(points);
    signed_area(points).abs() > f64::EPSILON * bbox.width() * bbox.height()
}

pub fn clean_ring(points: &[Vec2]) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::with_capacity(points.len());
    for p in points {
        if !p.x.is_finite() || !p.y.is_finite() {
            continue;
        }
        if out.last().is_some_and(|last| last.approx_eq(p)) {
            continue;
        }
        out.push(*p);
    }
    while out.len() > 1 && out[0].approx_eq(&out[out.len() - 1]) {
        out.pop();
    }
    out
}
