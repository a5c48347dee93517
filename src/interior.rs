use geo::{cyclic_runs, Coord, Polygon, Shape};

/// How far (map units) each probe point sits from its edge, perpendicular
/// to it. Shapes with seams thinner than twice this are misclassified; the
/// supplier data this runs on is far coarser than that.
pub const INTERIOR_PROBE_OFFSET: f64 = 2.0;

/// Two test points just off the midpoint of the edge `a`-`b`, one on each
/// side. None for a zero-length edge.
pub fn probe_points(a: Coord, b: Coord) -> Option<(Coord, Coord)> {
    let dlat = (b.lat - a.lat) as f64;
    let dlon = (b.lon - a.lon) as f64;
    let len = (dlat * dlat + dlon * dlon).sqrt();
    if len == 0.0 {
        return None;
    }

    let mid_lat = (a.lat as f64 + b.lat as f64) / 2.0;
    let mid_lon = (a.lon as f64 + b.lon as f64) / 2.0;
    let off_lat = -dlon / len * INTERIOR_PROBE_OFFSET;
    let off_lon = dlat / len * INTERIOR_PROBE_OFFSET;

    Some((
        Coord::new((mid_lat + off_lat).round() as i32, (mid_lon + off_lon).round() as i32),
        Coord::new((mid_lat - off_lat).round() as i32, (mid_lon - off_lon).round() as i32),
    ))
}

/// Rebuilds a multi-polygon shape keeping only its true outer boundary.
///
/// Each edge is probed on both sides: an edge with a probe point outside
/// the whole union lies on the outer boundary, an edge buried inside it is
/// an internal seam between adjacent source polygons. Maximal boundary runs
/// become fragments, and a greedy chaining pass stitches fragments back
/// into closed rings (disjoint islands start new rings). A fragment that
/// matches no chain end is kept as its own polygon rather than failing:
/// supplier data is imperfect and a dangling edge should not kill a
/// generation run.
pub fn remove_inside_coordinates(shape: &Shape) -> Shape {
    let mut work = shape.clone();
    work.remove_identical_coordinates();

    let mut fragments: Vec<Vec<Coord>> = vec![];
    for polygon in &work.polygons {
        collect_boundary_fragments(polygon, &work, &mut fragments);
    }

    let mut result = Shape::new();
    let mut used = vec![false; fragments.len()];

    while let Some(seed) = (0..fragments.len()).find(|&i| !used[i]) {
        used[seed] = true;
        let mut chain = fragments[seed].clone();

        loop {
            if chain.len() > 1 && chain.first() == chain.last() {
                break; // ring closed
            }
            let tail = *chain.last().unwrap();
            let next = (0..fragments.len()).filter(|&j| !used[j]).find_map(|j| {
                if fragments[j][0] == tail {
                    Some((j, false))
                } else if *fragments[j].last().unwrap() == tail {
                    Some((j, true))
                } else {
                    None
                }
            });
            match next {
                Some((j, reverse)) => {
                    used[j] = true;
                    let mut fragment = fragments[j].clone();
                    if reverse {
                        fragment.reverse();
                    }
                    chain.extend_from_slice(&fragment[1..]);
                }
                None => break,
            }
        }

        let closed = chain.len() > 1 && chain.first() == chain.last();
        if closed {
            chain.pop();
        } else {
            warn!("interior removal: boundary fragment starting at {} did not close; keeping it isolated", chain[0]);
        }

        let mut polygon = Polygon::new(chain, closed);
        polygon.remove_identical_coordinates();
        polygon.update_length();
        result.polygons.push(polygon);
    }

    result.sort_polygons();
    result
}

/// Appends `polygon`'s maximal runs of outer-boundary edges to `fragments`.
/// A run of k edges yields a fragment of k+1 coordinates.
fn collect_boundary_fragments(polygon: &Polygon, union: &Shape, fragments: &mut Vec<Vec<Coord>>) {
    let n = polygon.coords.len();
    if n < 3 || !polygon.closed {
        // a line or point feature has no interior to strip
        if !polygon.coords.is_empty() {
            fragments.push(polygon.coords.clone());
        }
        return;
    }

    let boundary: Vec<bool> = polygon
        .cyclic_edges()
        .iter()
        .map(|&(a, b)| match probe_points(a, b) {
            Some((left, right)) => !union.inside(left) || !union.inside(right),
            None => false,
        })
        .collect();

    for (start, len) in cyclic_runs(&boundary, true) {
        let mut fragment = Vec::with_capacity(len + 1);
        for k in 0..=len {
            fragment.push(polygon.coords[(start + k) % n]);
        }
        fragments.push(fragment);
    }
}
