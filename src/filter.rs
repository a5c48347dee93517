use geo::{segment_square_dist, Coord, Polygon, Shape};

/// Removes vertices that deviate less than `max_square_dist` from the chord
/// of their neighbours, Douglas-Peucker style, while preserving inclusion
/// semantics: every kept vertex is an original vertex, endpoints of open
/// polylines survive, and a closed polygon never drops below three
/// vertices (the original is returned unchanged when it would).
///
/// Unlike the merge engines this runs on true point-to-segment distances;
/// the vertex-distance shortcut would throw away exactly the sparse
/// collinear chains it is supposed to keep decisions about.
pub fn filter_polygon(polygon: &Polygon, max_square_dist: f64) -> Polygon {
    let n = polygon.coords.len();
    if n < 3 {
        return polygon.clone();
    }

    let filtered = if polygon.closed {
        filter_closed(&polygon.coords, max_square_dist)
    } else {
        filter_open(&polygon.coords, max_square_dist)
    };

    if polygon.closed && filtered.len() < 3 {
        warn!("filter: closed polygon of {} coordinates would collapse; keeping it unfiltered", n);
        return polygon.clone();
    }

    let mut result = Polygon::new(filtered, polygon.closed);
    result.update_length();
    result
}

impl Shape {
    /// Filters every polygon in place.
    pub fn filter(&mut self, max_square_dist: f64) {
        for polygon in &mut self.polygons {
            *polygon = filter_polygon(polygon, max_square_dist);
        }
    }
}

fn filter_open(coords: &[Coord], max_square_dist: f64) -> Vec<Coord> {
    let mut keep = vec![false; coords.len()];
    keep[0] = true;
    keep[coords.len() - 1] = true;
    douglas_peucker(coords, &mut keep, 0, coords.len() - 1, max_square_dist);
    collect_kept(coords, &keep)
}

/// A closed ring has no natural endpoints, so anchor at vertex 0 and the
/// vertex farthest from it, simplify both arcs, then sweep away anchors
/// that themselves turned out to be collinear.
fn filter_closed(coords: &[Coord], max_square_dist: f64) -> Vec<Coord> {
    let far = coords
        .iter()
        .enumerate()
        .max_by_key(|&(_, c)| c.square_dist_to(coords[0]))
        .map(|(i, _)| i)
        .unwrap();
    if far == 0 {
        // all coordinates identical
        return vec![coords[0]];
    }

    // close the ring explicitly so both arcs share their endpoints
    let mut extended: Vec<Coord> = coords.to_vec();
    extended.push(coords[0]);

    let mut keep = vec![false; extended.len()];
    keep[0] = true;
    keep[far] = true;
    keep[extended.len() - 1] = true;
    douglas_peucker(&extended, &mut keep, 0, far, max_square_dist);
    douglas_peucker(&extended, &mut keep, far, extended.len() - 1, max_square_dist);

    let mut kept = collect_kept(&extended, &keep);
    kept.pop(); // drop the explicit closing duplicate

    // the two anchors were kept unconditionally; drop them (or any other
    // survivor) if the ring is straight through them
    sweep_collinear(&mut kept, max_square_dist);
    kept
}

fn douglas_peucker(coords: &[Coord], keep: &mut [bool], from: usize, to: usize, max_square_dist: f64) {
    if to <= from + 1 {
        return;
    }

    let mut worst = from + 1;
    let mut worst_dist = -1.0;
    for k in from + 1..to {
        let d = segment_square_dist(coords[k], coords[from], coords[to]);
        if d > worst_dist {
            worst_dist = d;
            worst = k;
        }
    }

    if worst_dist > max_square_dist {
        keep[worst] = true;
        douglas_peucker(coords, keep, from, worst, max_square_dist);
        douglas_peucker(coords, keep, worst, to, max_square_dist);
    }
}

fn collect_kept(coords: &[Coord], keep: &[bool]) -> Vec<Coord> {
    coords
        .iter()
        .zip(keep.iter())
        .filter(|&(_, &k)| k)
        .map(|(&c, _)| c)
        .collect()
}

fn sweep_collinear(ring: &mut Vec<Coord>, max_square_dist: f64) {
    let mut changed = true;
    while changed && ring.len() > 3 {
        changed = false;
        let mut i = 0;
        while i < ring.len() && ring.len() > 3 {
            let len = ring.len();
            let prev = ring[(i + len - 1) % len];
            let next = ring[(i + 1) % len];
            if segment_square_dist(ring[i], prev, next) <= max_square_dist {
                ring.remove(i);
                changed = true;
            } else {
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, Polygon};

    fn coords(v: Vec<(i32, i32)>) -> Vec<Coord> {
        v.into_iter().map(|(lat, lon)| Coord::new(lat, lon)).collect()
    }

    #[test]
    fn straight_chain_collapses_to_endpoints() {
        let line = Polygon::new(
            coords(vec![(0, 0), (0, 10), (0, 21), (0, 30), (0, 40)]),
            false,
        );
        let filtered = filter_polygon(&line, 4.0);
        assert_eq!(coords(vec![(0, 0), (0, 40)]), filtered.coords);
    }

    #[test]
    fn significant_detour_is_kept() {
        let line = Polygon::new(
            coords(vec![(0, 0), (50, 50), (0, 100)]),
            false,
        );
        let filtered = filter_polygon(&line, 4.0);
        assert_eq!(3, filtered.coords.len());
    }

    #[test]
    fn closed_outline_loses_collinear_seam_endpoints() {
        // the 3-wide rectangle outline as interior removal leaves it:
        // corners plus collinear seam endpoints
        let ring = Polygon::new(
            coords(vec![
                (1000, 1000),
                (1000, 0),
                (0, 0),
                (0, 1000),
                (0, 2000),
                (0, 3000),
                (1000, 3000),
                (1000, 2000),
            ]),
            true,
        );
        let filtered = filter_polygon(&ring, 4.0);
        assert_eq!(4, filtered.coords.len());
        let expected = Polygon::new(
            coords(vec![(1000, 0), (0, 0), (0, 3000), (1000, 3000)]),
            true,
        );
        assert!(filtered.cyclically_equal(&expected), "got {:?}", filtered.coords);
    }

    #[test]
    fn closed_polygon_never_drops_below_three() {
        let sliver = Polygon::new(coords(vec![(0, 0), (1, 10), (0, 20)]), true);
        let filtered = filter_polygon(&sliver, 10000.0);
        assert_eq!(sliver.coords, filtered.coords);
    }

    #[test]
    fn interior_removal_then_filter_yields_four_corners() {
        use geo::Shape;
        use interior::remove_inside_coordinates;

        let square = |lat0: i32, lon0: i32| {
            Polygon::new(
                coords(vec![
                    (lat0, lon0),
                    (lat0, lon0 + 1000),
                    (lat0 + 1000, lon0 + 1000),
                    (lat0 + 1000, lon0),
                ]),
                true,
            )
        };
        let shape = Shape::with_polygons(vec![square(0, 0), square(0, 1000), square(0, 2000)]);

        let mut out = remove_inside_coordinates(&shape);
        out.filter(4.0);

        assert_eq!(1, out.nbr_polygons());
        assert_eq!(4, out.polygons[0].coords.len());
    }
}
