use std::error;
use std::fmt;

use geo::{cyclic_runs, Coord, Polygon, Shape};

/// Why an outline merge did not happen. None of these are exceptional for
/// non-adjacent polygon pairs; the receiver is left untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineError {
    /// Bounding boxes don't overlap: the polygons can't share a boundary.
    NoOverlap,
    /// No single contiguous shared boundary run was found.
    SeamNotFound,
    /// A polygon is too small to outline, or lies entirely within tolerance
    /// of the other.
    Degenerate,
    /// The defensive pass cap was hit (pathological input).
    TooManyIterations,
}

impl fmt::Display for OutlineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            OutlineError::NoOverlap => write!(f, "bounding boxes do not overlap"),
            OutlineError::SeamNotFound => write!(f, "no contiguous shared boundary run"),
            OutlineError::Degenerate => write!(f, "polygon degenerate for outline merge"),
            OutlineError::TooManyIterations => write!(f, "outline pass cap exceeded"),
        }
    }
}

impl error::Error for OutlineError {}

impl Shape {
    /// Merges `other`'s polygon into this shape's polygon, discarding the
    /// shared internal seam, and leaves the union outline as this shape's
    /// single polygon.
    ///
    /// Both shapes are expected to hold one closed polygon each and to share
    /// exactly one contiguous boundary run, the way two adjacent
    /// administrative areas do. `sq_tolerance` is the squared distance below
    /// which a vertex counts as lying on the other polygon's boundary. Any
    /// topology violating those assumptions yields an Err and an unchanged
    /// receiver, never corruption.
    pub fn add_outline(&mut self, other: &Shape, sq_tolerance: i64) -> Result<(), OutlineError> {
        if !self.bounding_box().overlaps(&other.bounding_box()) {
            return Err(OutlineError::NoOverlap);
        }
        if self.polygons.is_empty() || other.polygons.is_empty() {
            return Err(OutlineError::Degenerate);
        }

        let mut a = self.polygons[0].clone();
        a.remove_identical_coordinates();
        let mut b = other.polygons[0].clone();
        b.remove_identical_coordinates();

        if a.coords.len() < 3 || b.coords.len() < 3 {
            return Err(OutlineError::Degenerate);
        }

        let merged = outline_two(&a, &b, sq_tolerance)?;
        self.polygons = vec![merged];
        Ok(())
    }
}

/// The two-sided seam scan. Classifies every vertex of `a` as close to or
/// far from `b`'s vertex set; a merge needs exactly one cyclic far run (the
/// arc `a` keeps) and exactly one close run of two or more vertices (the
/// seam). Symmetrically for `b`. The far runs, bracketed by their seam
/// endpoints, concatenate into the union outline.
fn outline_two(a: &Polygon, b: &Polygon, sq_tolerance: i64) -> Result<Polygon, OutlineError> {
    let n = a.coords.len();

    let a_close: Vec<bool> = a
        .coords
        .iter()
        .map(|&c| b.min_vertex_square_dist(c) <= sq_tolerance)
        .collect();

    let a_far_runs = cyclic_runs(&a_close, false);
    if a_far_runs.is_empty() {
        warn!("outline merge: every coordinate of the receiver lies within tolerance of the other polygon");
        return Err(OutlineError::Degenerate);
    }
    if a_far_runs.len() != 1 {
        return Err(OutlineError::SeamNotFound);
    }

    let (a_start, a_len) = a_far_runs[0];
    // A real seam needs at least two shared vertices.
    if n - a_len < 2 {
        return Err(OutlineError::SeamNotFound);
    }

    // A's own arc, bracketed by the two seam endpoints adjacent to it.
    let mut result: Vec<Coord> = Vec::with_capacity(n + b.coords.len());
    result.push(a.coords[(a_start + n - 1) % n]);
    for k in 0..a_len {
        result.push(a.coords[(a_start + k) % n]);
    }
    result.push(a.coords[(a_start + a_len) % n]);

    let b_close: Vec<bool> = b
        .coords
        .iter()
        .map(|&c| a.min_vertex_square_dist(c) <= sq_tolerance)
        .collect();

    let b_far_runs = cyclic_runs(&b_close, false);
    if b_far_runs.is_empty() {
        warn!("outline merge: every coordinate of the other polygon lies within tolerance of the receiver");
        return Err(OutlineError::Degenerate);
    }
    if b_far_runs.len() != 1 {
        return Err(OutlineError::SeamNotFound);
    }

    let (b_start, b_len) = b_far_runs[0];
    let m = b.coords.len();
    let mut b_own: Vec<Coord> = (0..b_len).map(|k| b.coords[(b_start + k) % m]).collect();

    // B's own arc continues from the seam endpoint the result currently ends
    // at. Pick the traversal direction whose near end is closer to that
    // endpoint; on a tie the intended direction is ambiguous, so warn and
    // carry on with the forward order.
    let tail = *result.last().unwrap();
    let d_first = tail.square_dist_to(b_own[0]);
    let d_last = tail.square_dist_to(b_own[b_own.len() - 1]);
    if d_first == d_last && b_own.len() > 1 {
        warn!(
            "outline merge: both ends of the other polygon's own arc are {} from the seam \
             endpoint {}; direction ambiguous, merging best-effort",
            d_first, tail
        );
    }
    if d_last < d_first {
        b_own.reverse();
    }
    result.extend(b_own);

    let mut merged = Polygon::new(result, true);
    merged.remove_identical_coordinates();
    merged.update_length();
    Ok(merged)
}

/// The result of an N-ary outline build: the accumulated outline plus the
/// input indices that never connected to it.
#[derive(Debug)]
pub struct OutlineBuild {
    pub shape: Shape,
    pub unmerged: Vec<usize>,
}

/// Iteratively concatenates `shapes` into one connected outline, starting
/// from the first and folding the rest in over repeated passes until a full
/// pass merges nothing more. Unreachable islands are reported in
/// `unmerged`, never silently dropped.
pub fn create_outline(shapes: &[Shape], sq_tolerance: i64) -> Result<OutlineBuild, OutlineError> {
    if shapes.is_empty() {
        return Err(OutlineError::Degenerate);
    }

    let mut result = shapes[0].clone();
    let mut merged = vec![false; shapes.len()];
    merged[0] = true;

    // Every productive pass merges at least one polygon, so more passes than
    // inputs means the loop is not converging.
    let max_passes = shapes.len() + 1;
    let mut passes = 0;

    while merged.iter().any(|&m| !m) {
        passes += 1;
        if passes > max_passes {
            warn!("create_outline: pass cap {} exceeded over {} polygons", max_passes, shapes.len());
            return Err(OutlineError::TooManyIterations);
        }

        let mut merged_any = false;
        for i in 1..shapes.len() {
            if merged[i] {
                continue;
            }
            match result.add_outline(&shapes[i], sq_tolerance) {
                Ok(()) => {
                    merged[i] = true;
                    merged_any = true;
                }
                Err(OutlineError::TooManyIterations) => {
                    return Err(OutlineError::TooManyIterations);
                }
                Err(_) => {} // not adjacent (yet); retry next pass
            }
        }
        if !merged_any {
            break;
        }
    }

    let unmerged: Vec<usize> = (0..shapes.len()).filter(|&i| !merged[i]).collect();
    if !unmerged.is_empty() {
        warn!("create_outline: {} island polygon(s) could not be connected", unmerged.len());
    }

    Ok(OutlineBuild { shape: result, unmerged: unmerged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, Polygon, Shape, DEFAULT_MERGE_SQUARE_DISTANCE};

    fn shape(coords: Vec<(i32, i32)>) -> Shape {
        let coords = coords.into_iter().map(|(lat, lon)| Coord::new(lat, lon)).collect();
        Shape::with_polygons(vec![Polygon::new(coords, true)])
    }

    #[test]
    fn two_triangles_make_a_quadrilateral() {
        let mut a = shape(vec![(0, 0), (10, 0), (10, 10)]);
        let b = shape(vec![(10, 0), (10, 10), (20, 10)]);

        a.add_outline(&b, DEFAULT_MERGE_SQUARE_DISTANCE).unwrap();

        assert_eq!(1, a.nbr_polygons());
        let expected = Polygon::new(
            vec![
                Coord::new(0, 0),
                Coord::new(10, 0),
                Coord::new(20, 10),
                Coord::new(10, 10),
            ],
            true,
        );
        assert!(a.polygons[0].cyclically_equal(&expected), "got {:?}", a.polygons[0].coords);
        assert!(a.polygons[0].closed);
    }

    #[test]
    fn merge_closure_coordinate_count() {
        // shared run of 2 between two squares stacked along lon
        let mut a = shape(vec![(0, 0), (0, 10), (10, 10), (10, 0)]);
        let b = shape(vec![(0, 10), (0, 20), (10, 20), (10, 10)]);
        a.add_outline(&b, DEFAULT_MERGE_SQUARE_DISTANCE).unwrap();

        // count(A) + count(B) - 2*sharedRun + 2
        assert_eq!(4 + 4 - 2 * 2 + 2, a.polygons[0].coords.len());
        // nothing from the seam interior, every own-arc coordinate once
        let expected = Polygon::new(
            vec![
                Coord::new(10, 0),
                Coord::new(0, 0),
                Coord::new(0, 10),
                Coord::new(0, 20),
                Coord::new(10, 20),
                Coord::new(10, 10),
            ],
            true,
        );
        assert!(a.polygons[0].cyclically_equal(&expected), "got {:?}", a.polygons[0].coords);
    }

    #[test]
    fn no_overlap_is_rejected_without_corruption() {
        let mut a = shape(vec![(0, 0), (10, 0), (10, 10)]);
        let before = a.clone();
        let b = shape(vec![(1000, 1000), (1010, 1000), (1010, 1010)]);

        assert_eq!(Err(OutlineError::NoOverlap), a.add_outline(&b, DEFAULT_MERGE_SQUARE_DISTANCE));
        assert_eq!(before, a);
    }

    #[test]
    fn non_adjacent_overlapping_is_seam_not_found() {
        // overlapping bounding boxes, but no vertices anywhere near another
        let mut a = shape(vec![(0, 0), (0, 100), (100, 100), (100, 0)]);
        let before = a.clone();
        let b = shape(vec![(40, 40), (40, 60), (60, 60), (60, 40)]);

        assert_eq!(Err(OutlineError::SeamNotFound), a.add_outline(&b, DEFAULT_MERGE_SQUARE_DISTANCE));
        assert_eq!(before, a);
    }

    #[test]
    fn degenerate_receiver_is_rejected() {
        let mut a = shape(vec![(0, 0), (10, 0)]);
        let b = shape(vec![(10, 0), (10, 10), (20, 10)]);
        assert_eq!(Err(OutlineError::Degenerate), a.add_outline(&b, DEFAULT_MERGE_SQUARE_DISTANCE));
    }

    #[test]
    fn create_outline_folds_a_strip_and_reports_islands() {
        let strip = vec![
            shape(vec![(0, 0), (0, 10), (10, 10), (10, 0)]),
            shape(vec![(0, 10), (0, 20), (10, 20), (10, 10)]),
            shape(vec![(0, 20), (0, 30), (10, 30), (10, 20)]),
            // far-away island
            shape(vec![(5000, 5000), (5000, 5010), (5010, 5010), (5010, 5000)]),
        ];

        let build = create_outline(&strip, DEFAULT_MERGE_SQUARE_DISTANCE).unwrap();
        assert_eq!(vec![3], build.unmerged);
        assert_eq!(1, build.shape.nbr_polygons());

        let expected = Polygon::new(
            vec![
                Coord::new(10, 0),
                Coord::new(0, 0),
                Coord::new(0, 10),
                Coord::new(0, 20),
                Coord::new(0, 30),
                Coord::new(10, 30),
                Coord::new(10, 20),
                Coord::new(10, 10),
            ],
            true,
        );
        assert!(build.shape.polygons[0].cyclically_equal(&expected), "got {:?}", build.shape.polygons[0].coords);
    }

    #[test]
    fn create_outline_retries_until_connected() {
        // the middle square arrives last, so pass one can only merge one
        // neighbor and pass two picks up the rest
        let strip = vec![
            shape(vec![(0, 0), (0, 10), (10, 10), (10, 0)]),
            shape(vec![(0, 20), (0, 30), (10, 30), (10, 20)]),
            shape(vec![(0, 10), (0, 20), (10, 20), (10, 10)]),
        ];

        let build = create_outline(&strip, DEFAULT_MERGE_SQUARE_DISTANCE).unwrap();
        assert!(build.unmerged.is_empty());
        assert_eq!(1, build.shape.nbr_polygons());
        assert_eq!(8, build.shape.polygons[0].coords.len());
    }
}
