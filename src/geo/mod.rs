use std::fmt;
use itertools::Itertools;

/// Squared-distance threshold below which two vertices count as the same
/// point when hunting for a shared boundary run. The value is tied to the
/// vertex density and precision of the source map data, so every operation
/// that uses it takes it as a parameter; this is only the default.
pub const DEFAULT_MERGE_SQUARE_DISTANCE: i64 = 25;

/// Hard cap on the total number of coordinates one Shape may hold.
/// `add_coordinate` refuses (returns false) beyond this.
pub const MAX_SHAPE_COORDINATES: usize = 1 << 24;

/// A fixed-point map coordinate. One unit is 1/2³² of a full turn along
/// either axis, so i32 arithmetic on deltas is exact.
///
/// Coord is comparable so polygons have a canonical sort order and so it can
/// key the transient coordinate-index maps built during merges.
#[derive(Clone, Copy, Debug, Hash, Ord, Eq, PartialEq, PartialOrd)]
pub struct Coord {
    pub lat: i32,
    pub lon: i32,
}

impl Coord {
    pub fn new(lat: i32, lon: i32) -> Coord {
        Coord { lat: lat, lon: lon }
    }

    /// Squared planar distance to another coordinate. Two i32 deltas squared
    /// and summed always fit in i64.
    pub fn square_dist_to(&self, other: Coord) -> i64 {
        let dlat = self.lat as i64 - other.lat as i64;
        let dlon = self.lon as i64 - other.lon as i64;
        dlat * dlat + dlon * dlon
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.lat, self.lon)
    }
}

/// Min/max lat/lon of a coordinate set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_lat: i32,
    pub max_lat: i32,
    pub min_lon: i32,
    pub max_lon: i32,
}

impl BoundingBox {
    pub fn empty() -> BoundingBox {
        BoundingBox {
            min_lat: i32::max_value(),
            max_lat: i32::min_value(),
            min_lon: i32::max_value(),
            max_lon: i32::min_value(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }

    pub fn update(&mut self, c: Coord) {
        if c.lat < self.min_lat { self.min_lat = c.lat; }
        if c.lat > self.max_lat { self.max_lat = c.lat; }
        if c.lon < self.min_lon { self.min_lon = c.lon; }
        if c.lon > self.max_lon { self.max_lon = c.lon; }
    }

    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !self.is_empty() && !other.is_empty()
            && self.min_lat <= other.max_lat && other.min_lat <= self.max_lat
            && self.min_lon <= other.max_lon && other.min_lon <= self.max_lon
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.lat >= self.min_lat && c.lat <= self.max_lat
            && c.lon >= self.min_lon && c.lon <= self.max_lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

/// One closed or open boundary: an ordered coordinate sequence, a closed
/// flag and a cached path length.
///
/// A closed polygon does *not* repeat its first coordinate at the end; the
/// closed flag expresses that the last coordinate wraps to the first. All
/// cyclic iteration goes through `cyclic_edges` so the convention lives in
/// one place. An open polygon with one coordinate is a point feature, with
/// two or more a polyline.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub coords: Vec<Coord>,
    pub closed: bool,
    pub length: f64,
}

impl Polygon {
    pub fn new(coords: Vec<Coord>, closed: bool) -> Polygon {
        let mut p = Polygon { coords: coords, closed: closed, length: 0.0 };
        p.update_length();
        p
    }

    /// Consecutive coordinate pairs, wrapping last-to-first when closed.
    pub fn cyclic_edges(&self) -> Vec<(Coord, Coord)> {
        let n = self.coords.len();
        if n < 2 {
            return vec![];
        }
        let mut edges: Vec<(Coord, Coord)> =
            self.coords.iter().cloned().tuple_windows().collect();
        if self.closed {
            edges.push((self.coords[n - 1], self.coords[0]));
        }
        edges
    }

    /// Recomputes the cached path length: the sum of consecutive planar
    /// distances, including the wrap edge when closed. O(n).
    pub fn update_length(&mut self) {
        self.length = self
            .cyclic_edges()
            .iter()
            .map(|&(a, b)| (a.square_dist_to(b) as f64).sqrt())
            .sum();
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for &c in &self.coords {
            bbox.update(c);
        }
        bbox
    }

    /// Returns 2*area, signed. Positive iff the polygon runs
    /// counter-clockwise with lat growing north and lon growing east.
    pub fn signed_area2(&self) -> i64 {
        // https://en.wikipedia.org/wiki/Shoelace_formula
        self.cyclic_edges()
            .iter()
            .map(|&(a, b)| a.lon as i64 * b.lat as i64 - b.lon as i64 * a.lat as i64)
            .sum()
    }

    /// Returns 2*area, unsigned.
    pub fn area2(&self) -> u64 {
        self.signed_area2().abs() as u64
    }

    /// A zero-area polygon is considered Clockwise.
    pub fn winding_order(&self) -> WindingOrder {
        if self.signed_area2() > 0 {
            WindingOrder::CounterClockwise
        } else {
            WindingOrder::Clockwise
        }
    }

    /// Shoelace centroid. Falls back to the vertex mean for zero-area
    /// polygons; None when there are no coordinates at all.
    pub fn centroid(&self) -> Option<Coord> {
        if self.coords.is_empty() {
            return None;
        }

        let a2 = self.signed_area2();
        if a2 == 0 {
            let n = self.coords.len() as i64;
            let lat: i64 = self.coords.iter().map(|c| c.lat as i64).sum();
            let lon: i64 = self.coords.iter().map(|c| c.lon as i64).sum();
            return Some(Coord::new((lat / n) as i32, (lon / n) as i32));
        }

        let mut lat_sum: f64 = 0.0;
        let mut lon_sum: f64 = 0.0;
        for (a, b) in self.cyclic_edges() {
            let cross = a.lon as f64 * b.lat as f64 - b.lon as f64 * a.lat as f64;
            lat_sum += (a.lat as f64 + b.lat as f64) * cross;
            lon_sum += (a.lon as f64 + b.lon as f64) * cross;
        }
        let denom = 3.0 * a2 as f64;
        Some(Coord::new((lat_sum / denom).round() as i32, (lon_sum / denom).round() as i32))
    }

    /// Minimum squared distance from a point to this polygon's *vertex* set.
    ///
    /// This is the closeness proxy the merge engines run on. It is not a
    /// point-to-segment distance: it only holds up when vertex density is
    /// high relative to the tolerance, which is true of the supplier data
    /// this pipeline consumes. `segment_square_dist` exists for callers that
    /// need the real thing.
    pub fn min_vertex_square_dist(&self, c: Coord) -> i64 {
        self.coords
            .iter()
            .map(|&v| v.square_dist_to(c))
            .min()
            .unwrap_or(i64::max_value())
    }

    /// Even-odd point-in-polygon test over this single ring.
    ///
    /// Points exactly on the boundary may land on either side.
    pub fn contains(&self, c: Coord) -> bool {
        self.ray_crossings(c) % 2 == 1
    }

    fn ray_crossings(&self, p: Coord) -> usize {
        // Ray towards +lon; count strict edge crossings with integer-only
        // arithmetic (no division).
        fn crosses(p: Coord, a: Coord, b: Coord) -> bool {
            if (a.lat > p.lat) == (b.lat > p.lat) {
                return false;
            }
            let num = (a.lon as i64 - p.lon as i64) * (b.lat as i64 - a.lat as i64)
                + (p.lat as i64 - a.lat as i64) * (b.lon as i64 - a.lon as i64);
            if b.lat > a.lat { num > 0 } else { num < 0 }
        }

        self.cyclic_edges()
            .iter()
            .filter(|&&(a, b)| crosses(p, a, b))
            .count()
    }

    /// Collapses consecutive duplicate coordinates; on closed polygons also
    /// the wrap duplicate. Applying it twice equals applying it once.
    pub fn remove_identical_coordinates(&mut self) {
        self.coords.dedup();
        if self.closed && self.coords.len() > 1 && self.coords.first() == self.coords.last() {
            self.coords.pop();
        }
    }

    /// The same cyclic sequence starting at `start` instead of 0.
    pub fn rotated(&self, start: usize) -> Polygon {
        let n = self.coords.len();
        let mut coords = Vec::with_capacity(n);
        for k in 0..n {
            coords.push(self.coords[(start + k) % n]);
        }
        Polygon { coords: coords, closed: self.closed, length: self.length }
    }

    /// True iff `other` is the same cyclic coordinate sequence, allowing a
    /// different starting point. Orientation is not normalized away.
    pub fn cyclically_equal(&self, other: &Polygon) -> bool {
        let n = self.coords.len();
        if n != other.coords.len() {
            return false;
        }
        if n == 0 {
            return true;
        }
        (0..n).any(|s| (0..n).all(|k| self.coords[(s + k) % n] == other.coords[k]))
    }
}

/// Squared distance from `p` to the segment `a`-`b`.
pub fn segment_square_dist(p: Coord, a: Coord, b: Coord) -> f64 {
    let ab_lat = (b.lat - a.lat) as f64;
    let ab_lon = (b.lon - a.lon) as f64;
    let ap_lat = (p.lat - a.lat) as f64;
    let ap_lon = (p.lon - a.lon) as f64;

    let len2 = ab_lat * ab_lat + ab_lon * ab_lon;
    if len2 == 0.0 {
        return ap_lat * ap_lat + ap_lon * ap_lon;
    }

    let t = ((ap_lat * ab_lat + ap_lon * ab_lon) / len2).max(0.0).min(1.0);
    let d_lat = ap_lat - t * ab_lat;
    let d_lon = ap_lon - t * ab_lon;
    d_lat * d_lat + d_lon * d_lon
}

/// Maximal runs of `value` in `flags`, treated cyclically: a run touching
/// both ends of the slice is reported once, starting near the end and
/// wrapping. Returns (start, len) pairs in first-occurrence order.
pub fn cyclic_runs(flags: &[bool], value: bool) -> Vec<(usize, usize)> {
    let n = flags.len();
    let mut runs: Vec<(usize, usize)> = vec![];

    let mut i = 0;
    while i < n {
        if flags[i] == value {
            let start = i;
            let mut len = 0;
            while i < n && flags[i] == value {
                len += 1;
                i += 1;
            }
            runs.push((start, len));
        } else {
            i += 1;
        }
    }

    // Join a run ending at n-1 with one starting at 0.
    if runs.len() > 1 {
        let first = runs[0];
        let last = runs[runs.len() - 1];
        if first.0 == 0 && last.0 + last.1 == n {
            runs[0] = (last.0, last.1 + first.1);
            runs.pop();
        }
    }

    runs
}

/// An ordered sequence of Polygons forming one logical feature: a country
/// outline with disjoint parts, a complex shape with holes, or a single
/// line/point feature.
#[derive(Clone, Debug, PartialEq)]
pub struct Shape {
    pub polygons: Vec<Polygon>,
}

impl Shape {
    pub fn new() -> Shape {
        Shape { polygons: vec![] }
    }

    pub fn with_polygons(polygons: Vec<Polygon>) -> Shape {
        Shape { polygons: polygons }
    }

    pub fn nbr_polygons(&self) -> usize {
        self.polygons.len()
    }

    pub fn nbr_coordinates(&self) -> usize {
        self.polygons.iter().map(|p| p.coords.len()).sum()
    }

    /// Appends a coordinate; begins a new polygon first when asked (or when
    /// the shape is still empty). Returns false, appending nothing, when the
    /// shape's coordinate cap is hit.
    pub fn add_coordinate(&mut self, lat: i32, lon: i32, starts_new_polygon: bool) -> bool {
        if self.nbr_coordinates() >= MAX_SHAPE_COORDINATES {
            return false;
        }
        if starts_new_polygon || self.polygons.is_empty() {
            self.polygons.push(Polygon { coords: vec![], closed: false, length: 0.0 });
        }
        let last = self.polygons.last_mut().unwrap();
        last.coords.push(Coord::new(lat, lon));
        true
    }

    pub fn closed(&self, polygon_index: usize) -> Option<bool> {
        self.polygons.get(polygon_index).map(|p| p.closed)
    }

    pub fn set_closed(&mut self, polygon_index: usize, closed: bool) -> bool {
        match self.polygons.get_mut(polygon_index) {
            Some(p) => {
                p.closed = closed;
                true
            }
            None => false,
        }
    }

    pub fn update_length(&mut self, polygon_index: usize) -> bool {
        match self.polygons.get_mut(polygon_index) {
            Some(p) => {
                p.update_length();
                true
            }
            None => false,
        }
    }

    pub fn update_lengths(&mut self) {
        for p in &mut self.polygons {
            p.update_length();
        }
    }

    pub fn remove_identical_coordinates(&mut self) {
        for p in &mut self.polygons {
            p.remove_identical_coordinates();
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for p in &self.polygons {
            for &c in &p.coords {
                bbox.update(c);
            }
        }
        bbox
    }

    /// Union point-in-polygon: inside iff inside an odd number of
    /// constituent polygons. Odd parity supports holes.
    pub fn inside(&self, c: Coord) -> bool {
        let crossings: usize = self.polygons.iter().map(|p| p.ray_crossings(c)).sum();
        crossings % 2 == 1
    }

    pub fn min_vertex_square_dist(&self, c: Coord) -> i64 {
        self.polygons
            .iter()
            .map(|p| p.min_vertex_square_dist(c))
            .min()
            .unwrap_or(i64::max_value())
    }

    /// Deterministic canonical order: descending doubled area, ties broken
    /// by smallest coordinate. Run before serialization and before
    /// country-border matching.
    pub fn sort_polygons(&mut self) {
        self.polygons.sort_by(|a, b| {
            b.area2()
                .cmp(&a.area2())
                .then_with(|| a.coords.iter().min().cmp(&b.coords.iter().min()))
        });
    }

    /// True iff the shape has polygons and every one of them is closed.
    pub fn is_closed(&self) -> bool {
        !self.polygons.is_empty() && self.polygons.iter().all(|p| p.closed)
    }
}
