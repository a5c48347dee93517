use std::collections::HashMap;

use geo::{Coord, Polygon, Shape};

/// Outcome of a pairwise polygon merge. `NoMerge` covers the definitional
/// precondition failures (open, too small, disjoint boxes, opposite
/// winding) as well as "no shared boundary": the caller decides whether
/// that is expected. `MultipleTouches` signals a pair whose merge was
/// deferred because the two polygons touch at more than one disjoint
/// location; merging those too early can produce self-intersections, so the
/// global pass retries them once everything else has settled.
#[derive(Debug, Clone, PartialEq)]
pub enum PairMerge {
    Merged(Polygon),
    MultipleTouches,
    NoMerge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum PolyTag {
    A,
    B,
}

/// One maximal shared run between the two polygons: `run` coordinates
/// matching while A steps forward and B steps backward.
#[derive(Debug, Clone, Copy)]
struct Touch {
    a_start: usize,
    b_start: usize,
    run: usize,
}

/// Merges two closed polygons sharing one or more contiguous coordinate
/// runs into a single closed polygon. Seam matching is exact (coordinate
/// equality), unlike the tolerance-based outline engine.
///
/// `others` is the rest of the polygon set being merged; it is consulted
/// only to decide whether a single-point touch is surrounded (and will be
/// absorbed by later merges) or a legitimate self-touching shape to keep.
pub fn merge_two_polygons(
    a: &Polygon,
    b: &Polygon,
    others: &[&Polygon],
    allow_multiple_touches: bool,
) -> PairMerge {
    if !a.closed || !b.closed || a.coords.len() < 3 || b.coords.len() < 3 {
        return PairMerge::NoMerge;
    }
    if !a.bounding_box().overlaps(&b.bounding_box()) {
        return PairMerge::NoMerge;
    }
    if a.winding_order() != b.winding_order() {
        return PairMerge::NoMerge;
    }

    // Equal rings collapse to one of them. Cyclic equality, not a vertex
    // multiset comparison: distinct rings can visit the same vertex set in a
    // different edge order.
    if a.cyclically_equal(b) {
        return PairMerge::Merged(a.clone());
    }

    // Transient map from coordinate value to where it occurs, built fresh
    // for this one call.
    let mut index: HashMap<Coord, Vec<(PolyTag, usize)>> = HashMap::new();
    for (i, &c) in a.coords.iter().enumerate() {
        index.entry(c).or_insert_with(Vec::new).push((PolyTag::A, i));
    }
    for (j, &c) in b.coords.iter().enumerate() {
        index.entry(c).or_insert_with(Vec::new).push((PolyTag::B, j));
    }

    // Rotate A so the walk starts on an unshared coordinate; then no shared
    // run wraps A's array.
    let start = match a.coords.iter().position(|c| !occurs_in_b(&index, c)) {
        Some(i) => i,
        None => {
            warn!("merge: every coordinate of one polygon occurs in the other but the rings differ; not merging");
            return PairMerge::NoMerge;
        }
    };
    let a = a.rotated(start);
    let n = a.coords.len();
    let m = b.coords.len();

    let touches = find_touches(&a, b, &index);
    if touches.is_empty() {
        return PairMerge::NoMerge;
    }
    let multiple = touches.len() >= 2;
    if multiple && !allow_multiple_touches {
        return PairMerge::MultipleTouches;
    }

    // The seam: the first multi-coordinate touch, or a single-point touch
    // that either is surrounded by the rest of the set (it will be absorbed
    // later anyway) or belongs to a multi-touch pair we were told to merge.
    // A lone unsurrounded touch point is a legitimate self-touching shape
    // and must be preserved, not merged through.
    let seam = touches.iter().find(|t| {
        t.run >= 2
            || surrounded_by_other_polys(&a, t.a_start, b, t.b_start, others)
            || (allow_multiple_touches && multiple)
    });
    let seam = match seam {
        Some(&s) => s,
        None => return PairMerge::NoMerge,
    };

    let mut result: Vec<Coord> = Vec::with_capacity(n + m);
    result.extend_from_slice(&a.coords[..seam.a_start + 1]);
    // B's non-shared arc, continuing forward from the seam start.
    for t in 1..=(m - seam.run) {
        result.push(b.coords[(seam.b_start + t) % m]);
    }
    // Back onto A at the far seam endpoint. A single-point seam means that
    // endpoint is the touch coordinate itself, repeated.
    result.extend_from_slice(&a.coords[seam.a_start + seam.run - 1..]);

    let cleaned = match clean_ring(result) {
        Some(coords) => coords,
        None => {
            warn!("merge: result ring collapsed while removing spurs; not merging");
            return PairMerge::NoMerge;
        }
    };

    let mut merged = Polygon::new(cleaned, true);
    merged.update_length();
    PairMerge::Merged(merged)
}

fn occurs_in_b(index: &HashMap<Coord, Vec<(PolyTag, usize)>>, c: &Coord) -> bool {
    index
        .get(c)
        .map(|hits| hits.iter().any(|&(tag, _)| tag == PolyTag::B))
        .unwrap_or(false)
}

/// Scans A (already rotated to an unshared start) for its disjoint touch
/// locations with B. At each shared coordinate the run is extended with A
/// stepping forward and B backward for as long as the coordinates keep
/// matching; overlapping B occurrences pick the longest extension.
fn find_touches(a: &Polygon, b: &Polygon, index: &HashMap<Coord, Vec<(PolyTag, usize)>>) -> Vec<Touch> {
    let n = a.coords.len();
    let m = b.coords.len();
    let mut touches = vec![];

    let mut i = 0;
    while i < n {
        let mut best: Option<Touch> = None;
        if let Some(hits) = index.get(&a.coords[i]) {
            for &(tag, j) in hits {
                if tag != PolyTag::B {
                    continue;
                }
                let mut run = 1;
                while i + run < n && run < m
                    && a.coords[i + run] == b.coords[(j + m - run) % m]
                {
                    run += 1;
                }
                if best.map(|t| run > t.run).unwrap_or(true) {
                    best = Some(Touch { a_start: i, b_start: j, run: run });
                }
            }
        }
        match best {
            Some(touch) => {
                touches.push(touch);
                i += touch.run;
            }
            None => {
                i += 1;
            }
        }
    }

    touches
}

/// True iff the touch point's surrounding edges are all already present in
/// other polygons of the set: both edges incident to the touch coordinate
/// on A, and both on B. When that holds, merging straight through the
/// single touch point is safe because the neighbours sharing those edges
/// will absorb the pinch in later merges.
fn surrounded_by_other_polys(
    a: &Polygon,
    a_idx: usize,
    b: &Polygon,
    b_idx: usize,
    others: &[&Polygon],
) -> bool {
    incident_edges(a, a_idx)
        .iter()
        .chain(incident_edges(b, b_idx).iter())
        .all(|edge| others.iter().any(|p| has_edge(p, *edge)))
}

fn incident_edges(polygon: &Polygon, idx: usize) -> [(Coord, Coord); 2] {
    let n = polygon.coords.len();
    let prev = polygon.coords[(idx + n - 1) % n];
    let here = polygon.coords[idx];
    let next = polygon.coords[(idx + 1) % n];
    [(prev, here), (here, next)]
}

fn has_edge(polygon: &Polygon, (p, q): (Coord, Coord)) -> bool {
    polygon
        .cyclic_edges()
        .iter()
        .any(|&(a, b)| (a == p && b == q) || (a == q && b == p))
}

/// Removes consecutive duplicates and dead-end spurs (X,Y,X back-and-forth
/// runs) from a closed ring, cyclically, until stable. None when the ring
/// collapses below three coordinates.
fn clean_ring(mut coords: Vec<Coord>) -> Option<Vec<Coord>> {
    loop {
        let before = coords.len();

        coords.dedup();
        if coords.len() > 1 && coords.first() == coords.last() {
            coords.pop();
        }

        let mut i = 0;
        while coords.len() >= 3 && i < coords.len() {
            let len = coords.len();
            if coords[i] == coords[(i + 2) % len] {
                // drop the spur tip and the duplicated return coordinate
                let tip = (i + 1) % len;
                let back = (i + 2) % len;
                if back > tip {
                    coords.remove(back);
                    coords.remove(tip);
                } else {
                    coords.remove(tip);
                    coords.remove(back);
                }
                i = 0;
            } else {
                i += 1;
            }
        }

        if coords.len() < 3 {
            return None;
        }
        if coords.len() == before {
            return Some(coords);
        }
    }
}

/// Merges a whole shape's polygons until no further merges are possible.
///
/// Processing order is deterministic (ascending index, lowest-indexed
/// polygon absorbs); this matters because different orders can produce
/// different, though individually valid, groupings in ambiguous multi-touch
/// arrangements. Multi-touch pairs are deferred to a retry pass that only
/// runs when a normal pass stalls. Genuinely disjoint polygons come back as
/// separate polygons in the result.
///
/// Returns None ("no merge performed") for fewer than two polygons or a
/// shape that is not closed, and for pathological inputs that hit the
/// defensive iteration cap.
pub fn merge_polygons(shape: &Shape) -> Option<Shape> {
    let n = shape.polygons.len();
    if n < 2 {
        return None;
    }
    if !shape.is_closed() || shape.polygons.iter().any(|p| p.coords.len() < 3) {
        return None;
    }

    let mut polys: Vec<Option<Polygon>> = shape
        .polygons
        .iter()
        .map(|p| {
            let mut p = p.clone();
            p.remove_identical_coordinates();
            Some(p)
        })
        .collect();

    let mut allow_multi = false;
    let mut scan = 0;
    let max_iterations = n * n + n;
    let mut iterations = 0;

    loop {
        iterations += 1;
        if iterations > max_iterations {
            warn!("merge_polygons: iteration cap {} exceeded over {} polygons; giving up", max_iterations, n);
            return None;
        }

        let base = match (scan..n).find(|&i| polys[i].is_some()) {
            Some(i) => i,
            None => break,
        };
        if (base + 1..n).all(|i| polys[i].is_none()) {
            break;
        }

        let mut merged_any = false;
        let mut deferred_any = false;

        for j in base + 1..n {
            if polys[j].is_none() {
                continue;
            }
            let outcome = {
                let others: Vec<&Polygon> = (0..n)
                    .filter(|&k| k != base && k != j)
                    .filter_map(|k| polys[k].as_ref())
                    .collect();
                merge_two_polygons(
                    polys[base].as_ref().unwrap(),
                    polys[j].as_ref().unwrap(),
                    &others,
                    allow_multi,
                )
            };
            match outcome {
                PairMerge::Merged(mut p) => {
                    p.remove_identical_coordinates();
                    p.update_length();
                    polys[base] = Some(p);
                    polys[j] = None;
                    merged_any = true;
                }
                PairMerge::MultipleTouches => {
                    deferred_any = true;
                }
                PairMerge::NoMerge => {}
            }
        }

        if merged_any {
            allow_multi = false;
            continue;
        }
        if deferred_any && !allow_multi {
            // everything mergeable the safe way is merged; now multi-touch
            // pairs can no longer self-intersect prematurely
            allow_multi = true;
            continue;
        }

        // base is unmergeable with everything after it: leave it as its own
        // polygon and move on
        scan = base + 1;
        allow_multi = false;
    }

    let result: Vec<Polygon> = polys.into_iter().filter_map(|p| p).collect();
    Some(Shape::with_polygons(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use env_logger;
    use geo::{Coord, Polygon, Shape};

    fn ring(coords: Vec<(i32, i32)>) -> Polygon {
        Polygon::new(
            coords.into_iter().map(|(lat, lon)| Coord::new(lat, lon)).collect(),
            true,
        )
    }

    fn square(lat0: i32, lon0: i32, side: i32) -> Polygon {
        ring(vec![
            (lat0, lon0),
            (lat0, lon0 + side),
            (lat0 + side, lon0 + side),
            (lat0 + side, lon0),
        ])
    }

    #[test]
    fn shared_edge_squares_merge() {
        let a = square(0, 0, 10);
        let b = square(0, 10, 10);

        match merge_two_polygons(&a, &b, &[], false) {
            PairMerge::Merged(p) => {
                // 4 + 4 - 2*2 + 2
                assert_eq!(6, p.coords.len());
                let expected = ring(vec![
                    (0, 0),
                    (0, 10),
                    (0, 20),
                    (10, 20),
                    (10, 10),
                    (10, 0),
                ]);
                assert!(p.cyclically_equal(&expected), "got {:?}", p.coords);
                assert!(p.closed);
            }
            other => panic!("expected merge, got {:?}", other),
        }
    }

    #[test]
    fn opposite_winding_is_rejected() {
        let a = square(0, 0, 10);
        let mut b = square(0, 10, 10);
        b.coords.reverse();
        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&a, &b, &[], false));
    }

    #[test]
    fn open_or_tiny_polygons_are_rejected() {
        let mut open = square(0, 0, 10);
        open.closed = false;
        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&open, &square(0, 10, 10), &[], false));

        let tiny = ring(vec![(0, 0), (0, 10)]);
        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&tiny, &square(0, 10, 10), &[], false));
    }

    #[test]
    fn disjoint_boxes_are_rejected() {
        let a = square(0, 0, 10);
        let b = square(1000, 1000, 10);
        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&a, &b, &[], false));
    }

    #[test]
    fn equal_polygons_collapse_to_one() {
        let a = square(0, 0, 10);
        let b = a.rotated(2);
        match merge_two_polygons(&a, &b, &[], false) {
            PairMerge::Merged(p) => assert_eq!(a.coords, p.coords),
            other => panic!("expected merge, got {:?}", other),
        }
    }

    #[test]
    fn same_vertex_set_in_different_edge_order_does_not_collapse() {
        let _ = env_logger::builder().is_test(true).try_init();

        // both CCW over the same five vertices, but A dents the lon=10 edge
        // inward while B dents the lat=0 edge: different rings
        let a = ring(vec![(0, 0), (0, 10), (10, 10), (5, 5), (10, 0)]);
        let b = ring(vec![(0, 0), (5, 5), (0, 10), (10, 10), (10, 0)]);
        assert!(!a.cyclically_equal(&b));

        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&a, &b, &[], false));
    }

    #[test]
    fn lone_touch_point_preserves_self_touch() {
        // two squares meeting only at one corner, nothing else in the set
        let a = square(0, 0, 10);
        let b = square(10, 10, 10);
        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&a, &b, &[], false));
    }

    #[test]
    fn surrounded_touch_point_merges() {
        // 2x2 grid; the diagonal pair meets at the centre, and the other
        // two squares already own every edge around that centre point
        let sw = square(0, 0, 10);
        let se = square(0, 10, 10);
        let nw = square(10, 0, 10);
        let ne = square(10, 10, 10);

        match merge_two_polygons(&sw, &ne, &[&se, &nw], false) {
            PairMerge::Merged(p) => {
                // single-point seam: 4 + 4 - 2*1 + 2, touch coordinate twice
                assert_eq!(8, p.coords.len());
                assert_eq!(2, p.coords.iter().filter(|&&c| c == Coord::new(10, 10)).count());
            }
            other => panic!("expected merge, got {:?}", other),
        }

        // without the neighbours the same pair must not merge
        assert_eq!(PairMerge::NoMerge, merge_two_polygons(&sw, &ne, &[], false));
    }

    #[test]
    fn multi_touch_is_deferred_then_merged() {
        // B touches A at two disjoint single points, (10,0) and (10,10),
        // with its boundary arcing up between them
        let a = square(0, 0, 10);
        let b = ring(vec![(15, 5), (10, 10), (20, 10), (20, 0), (10, 0)]);

        assert_eq!(PairMerge::MultipleTouches, merge_two_polygons(&a, &b, &[], false));

        match merge_two_polygons(&a, &b, &[], true) {
            PairMerge::Merged(p) => {
                // both touch points spliced in: 4 + 5 - 2*1 + 2
                assert_eq!(9, p.coords.len());
                assert_eq!(2, p.coords.iter().filter(|&&c| c == Coord::new(10, 10)).count());
                assert_eq!(2, p.coords.iter().filter(|&&c| c == Coord::new(10, 0)).count());
            }
            other => panic!("expected merge, got {:?}", other),
        }
    }

    #[test]
    fn merge_polygons_folds_a_strip() {
        let shape = Shape::with_polygons(vec![
            square(0, 0, 10),
            square(0, 10, 10),
            square(0, 20, 10),
        ]);

        let merged = merge_polygons(&shape).unwrap();
        assert_eq!(1, merged.nbr_polygons());
        let expected = ring(vec![
            (0, 0),
            (0, 10),
            (0, 20),
            (0, 30),
            (10, 30),
            (10, 20),
            (10, 10),
            (10, 0),
        ]);
        assert!(merged.polygons[0].cyclically_equal(&expected), "got {:?}", merged.polygons[0].coords);
    }

    #[test]
    fn merge_polygons_keeps_disjoint_parts_separate() {
        let shape = Shape::with_polygons(vec![
            square(0, 0, 10),
            square(0, 10, 10),
            square(5000, 5000, 10),
        ]);

        let merged = merge_polygons(&shape).unwrap();
        assert_eq!(2, merged.nbr_polygons());
    }

    #[test]
    fn merge_polygons_rejects_open_or_single() {
        let one = Shape::with_polygons(vec![square(0, 0, 10)]);
        assert_eq!(None, merge_polygons(&one));

        let mut open = Shape::with_polygons(vec![square(0, 0, 10), square(0, 10, 10)]);
        open.polygons[1].closed = false;
        assert_eq!(None, merge_polygons(&open));
    }

    #[test]
    fn merge_polygons_grid_converges() {
        // 2x2 grid: the corner-touch pair waits until edge-share merges
        // absorb the centre pinch
        let shape = Shape::with_polygons(vec![
            square(0, 0, 10),
            square(0, 10, 10),
            square(10, 0, 10),
            square(10, 10, 10),
        ]);

        let merged = merge_polygons(&shape).unwrap();
        assert_eq!(1, merged.nbr_polygons());
        let p = &merged.polygons[0];
        // the 20x20 outline, possibly with collinear seam endpoints kept
        for c in &p.coords {
            assert!(c.lat == 0 || c.lat == 20 || c.lon == 0 || c.lon == 20,
                    "interior coordinate {} left in outline {:?}", c, p.coords);
        }
    }
}
