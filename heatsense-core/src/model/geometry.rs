//! Planar geometry primitives
//!
//! Coordinates are expected in a projected CRS with metre units, so areas and
//! distances are computed directly in the plane. Polygons carry an exterior
//! ring only; interior rings are not modelled.

use serde::{Deserialize, Serialize};

/// Areas at or below this value are treated as zero
pub const AREA_EPSILON: f64 = 1e-9;

/// A 2D coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The empty box: the identity for [`BoundingBox::union`]
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.min_x <= self.max_x && self.min_y <= self.max_y)
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Grow the box to include a point
    pub fn expand_to(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Closed-interval overlap test (touching boxes intersect)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(vec![
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ])
    }
}

/// A simple polygon described by its exterior ring
///
/// The ring is stored open: the closing vertex is not repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<Point>,
}

impl Polygon {
    /// Build a polygon, dropping a repeated closing vertex if present
    pub fn new(mut exterior: Vec<Point>) -> Self {
        if exterior.len() > 1 && exterior.first() == exterior.last() {
            exterior.pop();
        }
        Self { exterior }
    }

    pub fn rectangle(bbox: &BoundingBox) -> Self {
        bbox.to_polygon()
    }

    pub fn exterior(&self) -> &[Point] {
        &self.exterior
    }

    /// Exterior ring with the first vertex repeated at the end
    pub fn closed_ring(&self) -> Vec<Point> {
        let mut ring = self.exterior.clone();
        if let Some(first) = self.exterior.first() {
            ring.push(*first);
        }
        ring
    }

    pub fn is_degenerate(&self) -> bool {
        self.exterior.len() < 3 || self.area() <= AREA_EPSILON
    }

    /// Shoelace area; positive for counter-clockwise rings
    pub fn signed_area(&self) -> f64 {
        let n = self.exterior.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.exterior[i];
            let b = self.exterior[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for p in &self.exterior {
            bbox.expand_to(*p);
        }
        bbox
    }

    /// Area-weighted centroid, falling back to the vertex mean for
    /// degenerate rings
    pub fn centroid(&self) -> Option<Point> {
        let n = self.exterior.len();
        if n == 0 {
            return None;
        }
        let signed = self.signed_area();
        if signed.abs() <= AREA_EPSILON {
            let (sx, sy) = self
                .exterior
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            return Some(Point::new(sx / n as f64, sy / n as f64));
        }
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let a = self.exterior[i];
            let b = self.exterior[(i + 1) % n];
            let cross = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * cross;
            cy += (a.y + b.y) * cross;
        }
        let factor = 1.0 / (6.0 * signed);
        Some(Point::new(cx * factor, cy * factor))
    }

    /// Even-odd ray casting test
    pub fn contains_point(&self, p: &Point) -> bool {
        let n = self.exterior.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.exterior[i];
            let b = self.exterior[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Clip against an axis-aligned rectangle (Sutherland-Hodgman)
    ///
    /// Returns `None` when nothing with positive area remains. Concave
    /// polygons split by the rectangle come back as one ring joined along the
    /// rectangle edge; the area is still exact.
    pub fn clip_to_rect(&self, rect: &BoundingBox) -> Option<Polygon> {
        if rect.is_empty() || !self.bounding_box().intersects(rect) {
            return None;
        }

        let mut ring = self.exterior.clone();
        ring = clip_edge(
            &ring,
            |p| p.x >= rect.min_x,
            |a, b| intersect_vertical(a, b, rect.min_x),
        );
        ring = clip_edge(
            &ring,
            |p| p.x <= rect.max_x,
            |a, b| intersect_vertical(a, b, rect.max_x),
        );
        ring = clip_edge(
            &ring,
            |p| p.y >= rect.min_y,
            |a, b| intersect_horizontal(a, b, rect.min_y),
        );
        ring = clip_edge(
            &ring,
            |p| p.y <= rect.max_y,
            |a, b| intersect_horizontal(a, b, rect.max_y),
        );

        let clipped = Polygon::new(ring);
        if clipped.is_degenerate() {
            None
        } else {
            Some(clipped)
        }
    }

    /// Area shared with an axis-aligned rectangle
    pub fn intersection_area_with_rect(&self, rect: &BoundingBox) -> f64 {
        self.clip_to_rect(rect).map(|p| p.area()).unwrap_or(0.0)
    }

    /// Area shared with another simple polygon
    ///
    /// Both shapes are cut into horizontal slabs at every vertex and edge
    /// crossing. No edges cross inside a slab, so the overlap width is linear
    /// in y there and the width at the slab's midline gives its exact area.
    pub fn intersection_area(&self, other: &Polygon) -> f64 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }
        let (a, b) = (self.bounding_box(), other.bounding_box());
        if !a.intersects(&b) {
            return 0.0;
        }
        let (low, high) = (a.min_y.max(b.min_y), a.max_y.min(b.max_y));

        let mut ys: Vec<f64> = self
            .exterior
            .iter()
            .chain(&other.exterior)
            .map(|p| p.y)
            .collect();
        for (p, q) in self.edges() {
            for (r, s) in other.edges() {
                if let Some(y) = crossing_y(p, q, r, s) {
                    ys.push(y);
                }
            }
        }
        ys.push(low);
        ys.push(high);
        ys.retain(|y| *y >= low && *y <= high);
        ys.sort_by(f64::total_cmp);
        ys.dedup();

        ys.windows(2)
            .filter(|w| w[1] > w[0])
            .map(|w| {
                let mid = (w[0] + w[1]) / 2.0;
                let width = overlap_length(&self.spans_at(mid), &other.spans_at(mid));
                width * (w[1] - w[0])
            })
            .sum()
    }

    fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> {
        let n = self.exterior.len();
        (0..n).map(move |i| (&self.exterior[i], &self.exterior[(i + 1) % n]))
    }

    /// Sorted inside intervals of the horizontal line at `y` (even-odd)
    fn spans_at(&self, y: f64) -> Vec<(f64, f64)> {
        let mut xs: Vec<f64> = self
            .edges()
            .filter(|(a, b)| (a.y > y) != (b.y > y))
            .map(|(a, b)| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
            .collect();
        xs.sort_by(f64::total_cmp);
        xs.chunks_exact(2).map(|c| (c[0], c[1])).collect()
    }
}

/// Height at which segments pq and rs cross, if they do
fn crossing_y(p: &Point, q: &Point, r: &Point, s: &Point) -> Option<f64> {
    let (dx1, dy1) = (q.x - p.x, q.y - p.y);
    let (dx2, dy2) = (s.x - r.x, s.y - r.y);
    let denom = dx1 * dy2 - dy1 * dx2;
    if denom.abs() <= f64::EPSILON {
        // Parallel or collinear edges never change order within a slab
        return None;
    }
    let (ex, ey) = (r.x - p.x, r.y - p.y);
    let t = (ex * dy2 - ey * dx2) / denom;
    let u = (ex * dy1 - ey * dx1) / denom;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then(|| p.y + t * dy1)
}

/// Total length shared by two sorted lists of disjoint intervals
fn overlap_length(a: &[(f64, f64)], b: &[(f64, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut total = 0.0;
    while i < a.len() && j < b.len() {
        let start = a[i].0.max(b[j].0);
        let end = a[i].1.min(b[j].1);
        if end > start {
            total += end - start;
        }
        if a[i].1 < b[j].1 {
            i += 1;
        } else {
            j += 1;
        }
    }
    total
}

fn clip_edge<I, X>(points: &[Point], inside: I, intersect: X) -> Vec<Point>
where
    I: Fn(&Point) -> bool,
    X: Fn(&Point, &Point) -> Point,
{
    let mut out = Vec::with_capacity(points.len() + 4);
    let Some(&last) = points.last() else {
        return out;
    };

    let mut prev = last;
    for &current in points {
        let current_in = inside(&current);
        let prev_in = inside(&prev);
        if current_in {
            if !prev_in {
                out.push(intersect(&prev, &current));
            }
            out.push(current);
        } else if prev_in {
            out.push(intersect(&prev, &current));
        }
        prev = current;
    }
    out
}

fn intersect_vertical(a: &Point, b: &Point, x: f64) -> Point {
    let t = (x - a.x) / (b.x - a.x);
    Point::new(x, a.y + t * (b.y - a.y))
}

fn intersect_horizontal(a: &Point, b: &Point, y: f64) -> Point {
    let t = (y - a.y) / (b.y - a.y);
    Point::new(a.x + t * (b.x - a.x), y)
}

/// A collection of polygons treated as one area
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl MultiPolygon {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self(polygons)
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.0
    }

    /// True when no member polygon has positive area
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Polygon::is_degenerate)
    }

    pub fn area(&self) -> f64 {
        self.0.iter().map(Polygon::area).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.0
            .iter()
            .filter(|p| !p.exterior().is_empty())
            .fold(BoundingBox::empty(), |acc, p| acc.union(&p.bounding_box()))
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.0.iter().any(|poly| poly.contains_point(p))
    }

    /// Area-weighted centroid of all members
    pub fn centroid(&self) -> Option<Point> {
        let mut total = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for poly in &self.0 {
            let area = poly.area();
            if area <= AREA_EPSILON {
                continue;
            }
            if let Some(c) = poly.centroid() {
                cx += c.x * area;
                cy += c.y * area;
                total += area;
            }
        }
        if total > AREA_EPSILON {
            Some(Point::new(cx / total, cy / total))
        } else {
            self.0.iter().find_map(Polygon::centroid)
        }
    }

    pub fn clip_to_rect(&self, rect: &BoundingBox) -> MultiPolygon {
        MultiPolygon(
            self.0
                .iter()
                .filter_map(|poly| poly.clip_to_rect(rect))
                .collect(),
        )
    }

    pub fn intersection_area_with_rect(&self, rect: &BoundingBox) -> f64 {
        self.0
            .iter()
            .map(|poly| poly.intersection_area_with_rect(rect))
            .sum()
    }

    /// Area shared with another multipolygon whose members do not overlap
    pub fn intersection_area(&self, other: &MultiPolygon) -> f64 {
        self.0
            .iter()
            .flat_map(|a| other.0.iter().map(move |b| a.intersection_area(b)))
            .sum()
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(polygon: Polygon) -> Self {
        MultiPolygon(vec![polygon])
    }
}
