//! The periodic lattice index: pure arithmetic over a 2D lattice of chunks.
//!
//! A [`LatticeIndex`] partitions the plane into *chunks*: translated copies
//! of a fundamental axis-aligned footprint, placed at every integer
//! combination of two stride vectors. It answers three questions using only
//! affine arithmetic, with no spatial index:
//!
//! - which chunk contains a point ([`chunk_of`](LatticeIndex::chunk_of)),
//! - which chunks overlap a rectangle
//!   ([`chunks_overlapping`](LatticeIndex::chunks_overlapping)),
//! - which chunks does a ray pass through, in strictly increasing distance
//!   order ([`raycast`](LatticeIndex::raycast)).
//!
//! The index is immutable after construction and safe to share between
//! threads.

use crate::core::bound::ChunkBound;
use crate::core::cell::ChunkCoord;
use crate::geometry::aabb::Aabb;
use crate::geometry::raycast::{unit_lattice_walk, LatticeStep, UnitLatticeWalk};
use nalgebra::Vector2;
use std::collections::VecDeque;
use thiserror::Error;

/// Relative tolerance below which the stride determinant is considered zero.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// The two stride vectors are parallel or zero, so they span no lattice.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("stride vectors {stride_x:?} and {stride_y:?} are linearly dependent (det = {det:e})")]
pub struct DegenerateLatticeError {
    /// First stride vector as supplied.
    pub stride_x: Vector2<f64>,
    /// Second stride vector as supplied.
    pub stride_y: Vector2<f64>,
    /// Determinant of the stride matrix.
    pub det: f64,
}

/// One chunk crossed by a lattice raycast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkHit {
    /// The chunk whose footprint the ray entered.
    pub chunk: ChunkCoord,
    /// Ray parameter at entry into the footprint. Negative when the ray
    /// origin starts inside it.
    pub distance: f64,
}

/// Arithmetic index over the chunk lattice spanned by two stride vectors.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector2;
/// use tessella::core::cell::ChunkCoord;
/// use tessella::core::lattice::LatticeIndex;
/// use tessella::geometry::aabb::Aabb;
///
/// let footprint = Aabb::from_origin_size(Vector2::new(-0.5, -0.5), Vector2::new(1.0, 1.0));
/// let lattice = LatticeIndex::new(
///     Vector2::new(1.0, 0.0),
///     Vector2::new(0.0, 1.0),
///     footprint,
/// )
/// .unwrap();
///
/// assert_eq!(lattice.chunk_of(Vector2::new(0.3, 0.3)), Some(ChunkCoord::new(0, 0)));
/// assert_eq!(lattice.chunk_of(Vector2::new(1.2, 0.3)), Some(ChunkCoord::new(1, 0)));
/// ```
#[derive(Clone, Debug)]
pub struct LatticeIndex {
    stride_x: Vector2<f64>,
    stride_y: Vector2<f64>,
    footprint: Aabb,
    inv_x: Vector2<f64>,
    inv_y: Vector2<f64>,
    rhombus_offsets: Vec<ChunkCoord>,
}

impl LatticeIndex {
    /// Builds an index for the lattice spanned by `stride_x` and `stride_y`,
    /// with `footprint` as the bounds of chunk `(0, 0)`.
    ///
    /// The footprint must contain the geometry that will live in each chunk;
    /// if it does not, point and region queries can silently miss cells.
    /// This is a documented precondition, not a runtime check; the index
    /// has no knowledge of the geometry itself.
    ///
    /// # Errors
    ///
    /// [`DegenerateLatticeError`] when the strides are parallel or zero.
    pub fn new(
        stride_x: Vector2<f64>,
        stride_y: Vector2<f64>,
        footprint: Aabb,
    ) -> Result<Self, DegenerateLatticeError> {
        let det = stride_x.x * stride_y.y - stride_x.y * stride_y.x;
        if det.abs() <= DEGENERACY_TOLERANCE * stride_x.norm() * stride_y.norm() {
            return Err(DegenerateLatticeError {
                stride_x,
                stride_y,
                det,
            });
        }
        // Columns of the inverse of the stride matrix [stride_x | stride_y].
        let inv_x = Vector2::new(stride_y.y, -stride_x.y) / det;
        let inv_y = Vector2::new(-stride_y.x, stride_x.x) / det;

        let mut index = Self {
            stride_x,
            stride_y,
            footprint,
            inv_x,
            inv_y,
            rhombus_offsets: Vec::new(),
        };

        // Every chunk whose footprint could overlap the fundamental rhombus
        // spanned by the strides. The raycast probes exactly this set around
        // each rhombus the ray crosses; an over-approximation is fine.
        let rhombus = Aabb::from_points([
            Vector2::zeros(),
            stride_x,
            stride_x + stride_y,
            stride_y,
        ])
        .unwrap_or(Aabb::new(Vector2::zeros(), Vector2::zeros()));
        index.rhombus_offsets = index
            .chunks_overlapping(rhombus.min, rhombus.max, None)
            .collect();

        Ok(index)
    }

    /// First stride vector.
    #[must_use]
    pub fn stride_x(&self) -> Vector2<f64> {
        self.stride_x
    }

    /// Second stride vector.
    #[must_use]
    pub fn stride_y(&self) -> Vector2<f64> {
        self.stride_y
    }

    /// Bounds of chunk `(0, 0)`.
    #[must_use]
    pub fn footprint(&self) -> Aabb {
        self.footprint
    }

    /// World offset of a chunk: `cx·stride_x + cy·stride_y`.
    #[must_use]
    pub fn chunk_offset(&self, chunk: ChunkCoord) -> Vector2<f64> {
        self.stride_x * f64::from(chunk.x) + self.stride_y * f64::from(chunk.y)
    }

    /// Footprint of a chunk in world space.
    #[must_use]
    pub fn chunk_bounds(&self, chunk: ChunkCoord) -> Aabb {
        self.footprint.translate(self.chunk_offset(chunk))
    }

    /// Maps a world vector to lattice coordinates, where `stride_x` becomes
    /// `(1, 0)` and `stride_y` becomes `(0, 1)`.
    fn to_lattice(&self, v: Vector2<f64>) -> Vector2<f64> {
        self.inv_x * v.x + self.inv_y * v.y
    }

    /// The chunk containing `point`, or `None` when no chunk footprint does
    /// (possible only when the footprints do not cover the plane).
    ///
    /// For a point not exactly on a footprint boundary the answer is unique
    /// whenever the footprints tile the plane. A boundary point may resolve
    /// to either adjacent chunk; the scan order makes the choice
    /// deterministic but callers should not rely on which one.
    #[must_use]
    pub fn chunk_of(&self, point: Vector2<f64>) -> Option<ChunkCoord> {
        self.chunks_overlapping(point, point, None).next()
    }

    /// All chunks whose footprint overlaps the rectangle `[min, max]`,
    /// optionally clipped to `window`.
    ///
    /// Lazy, finite and restartable (the iterator is `Clone`). Returns every
    /// overlapping chunk: boundary-touching false positives are possible,
    /// false negatives are not (modulo floating-point tolerance).
    #[must_use]
    pub fn chunks_overlapping(
        &self,
        min: Vector2<f64>,
        max: Vector2<f64>,
        window: Option<ChunkBound>,
    ) -> ChunksOverlapping {
        // A chunk overlaps [min, max] iff its lattice point lands in the
        // query rectangle dilated by the footprint.
        let min = min - self.footprint.size() - self.footprint.min;
        let max = max - self.footprint.min;

        // Carry the rectangle into lattice space as a center plus two axis
        // images; the result is a (possibly skewed) parallelogram whose
        // integer interior points are the answer.
        let center = self.to_lattice((min + max) / 2.0);
        let axis1 = self.to_lattice(Vector2::new((max.x - min.x) / 2.0, 0.0));
        let axis2 = self.to_lattice(Vector2::new(0.0, (max.y - min.y) / 2.0));

        let s1 = if axis1.x > 0.0 { 1.0 } else { -1.0 };
        let s2 = if axis2.x > 0.0 { 1.0 } else { -1.0 };
        let right = center + axis1 * s1 + axis2 * s2;
        let left = center - axis1 * s1 - axis2 * s2;
        let mut bottom = center - axis1 * s1 + axis2 * s2;
        let mut top = center + axis1 * s1 - axis2 * s2;
        if (axis1.x * axis2.y - axis1.y * axis2.x) * s1 * s2 > 0.0 {
            std::mem::swap(&mut top, &mut bottom);
        }

        #[allow(clippy::cast_possible_truncation)]
        let mut x = left.x.ceil() as i32;
        #[allow(clippy::cast_possible_truncation)]
        let mut max_x = right.x.floor() as i32;
        if let Some(w) = &window {
            x = x.max(w.min.x);
            max_x = max_x.min(w.max.x - 1);
        }

        ChunksOverlapping {
            left,
            right,
            top,
            bottom,
            window,
            x,
            max_x,
            y: 0,
            max_y: -1,
            row_active: false,
        }
    }

    /// All chunks overlapping `chunk`'s own footprint (including itself).
    ///
    /// Evaluated against the chunk-zero bounds and translated afterwards, so
    /// the answer does not degrade with distance from the origin.
    pub fn chunk_intersects(&self, chunk: ChunkCoord) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks_overlapping(self.footprint.min, self.footprint.max, None)
            .map(move |c| c + chunk)
    }

    /// Casts a ray through the chunk lattice.
    ///
    /// Yields one [`ChunkHit`] per chunk whose footprint the ray crosses, in
    /// strictly increasing distance order, until `max_distance` (a ray
    /// parameter; pass a unit `direction` for metric distances) or the edge
    /// of `window`. The sequence is lazy and single-pass; it is finite
    /// whenever `window` is given or `max_distance` is.
    ///
    /// Internally the ray is walked through the fundamental rhombi in
    /// lattice space; for each rhombus interval only the precomputed set of
    /// footprint offsets is slab-tested against the original ray, so total
    /// work is proportional to the chunks actually along the segment.
    #[must_use]
    pub fn raycast(
        &self,
        origin: Vector2<f64>,
        direction: Vector2<f64>,
        max_distance: f64,
        window: Option<ChunkBound>,
    ) -> LatticeRaycast<'_> {
        let walk = unit_lattice_walk(
            self.to_lattice(origin),
            self.to_lattice(direction),
            max_distance,
            window,
        );
        LatticeRaycast {
            index: self,
            origin,
            direction,
            max_distance,
            window,
            walk,
            prev: None,
            first_interval: true,
            batch: VecDeque::new(),
            walk_done: false,
        }
    }
}

/// Restartable iterator over chunks overlapping a rectangle.
///
/// Produced by [`LatticeIndex::chunks_overlapping`]. Scans the image
/// parallelogram row by row; cloning restarts nothing, a clone resumes from
/// the same position, so keep a pristine copy to restart.
#[derive(Clone, Debug)]
pub struct ChunksOverlapping {
    left: Vector2<f64>,
    right: Vector2<f64>,
    top: Vector2<f64>,
    bottom: Vector2<f64>,
    window: Option<ChunkBound>,
    x: i32,
    max_x: i32,
    y: i32,
    max_y: i32,
    row_active: bool,
}

impl ChunksOverlapping {
    /// Interpolated y of the edge `p -> q` at `x`; `vertical` when the edge
    /// has no x extent.
    fn edge_y(x: f64, p: Vector2<f64>, q: Vector2<f64>, vertical: f64) -> f64 {
        if q.x - p.x == 0.0 {
            vertical
        } else {
            (x - p.x) / (q.x - p.x) * (q.y - p.y) + p.y
        }
    }

    fn row_range(&self, x: f64) -> (i32, i32) {
        let lo = Self::edge_y(x, self.left, self.bottom, f64::NEG_INFINITY)
            .max(Self::edge_y(x, self.right, self.bottom, f64::NEG_INFINITY));
        let hi = Self::edge_y(x, self.left, self.top, f64::INFINITY)
            .min(Self::edge_y(x, self.right, self.top, f64::INFINITY));
        #[allow(clippy::cast_possible_truncation)]
        let mut min_y = lo.ceil() as i32;
        #[allow(clippy::cast_possible_truncation)]
        let mut max_y = hi.floor() as i32;
        if let Some(w) = &self.window {
            min_y = min_y.max(w.min.y);
            max_y = max_y.min(w.max.y - 1);
        }
        (min_y, max_y)
    }
}

impl Iterator for ChunksOverlapping {
    type Item = ChunkCoord;

    fn next(&mut self) -> Option<ChunkCoord> {
        loop {
            if self.row_active {
                if self.y <= self.max_y {
                    let chunk = ChunkCoord::new(self.x, self.y);
                    self.y += 1;
                    return Some(chunk);
                }
                self.row_active = false;
                self.x += 1;
            }
            if self.x > self.max_x {
                return None;
            }
            let (min_y, max_y) = self.row_range(f64::from(self.x));
            self.y = min_y;
            self.max_y = max_y;
            self.row_active = true;
        }
    }
}

/// Single-pass iterator over the chunks crossed by a ray, in strictly
/// increasing distance order. Produced by [`LatticeIndex::raycast`].
#[derive(Debug)]
pub struct LatticeRaycast<'a> {
    index: &'a LatticeIndex,
    origin: Vector2<f64>,
    direction: Vector2<f64>,
    max_distance: f64,
    window: Option<ChunkBound>,
    walk: UnitLatticeWalk,
    prev: Option<LatticeStep>,
    first_interval: bool,
    batch: VecDeque<ChunkHit>,
    walk_done: bool,
}

impl LatticeRaycast<'_> {
    /// Collects, sorts and queues every chunk whose footprint entry falls in
    /// the rhombus interval `[t0, t1)`.
    ///
    /// Each chunk's entry distance lands in exactly one interval, so sorting
    /// within the interval gives global monotonic order across intervals.
    fn flush_interval(&mut self, fund: ChunkCoord, t0: f64, t1: f64) {
        debug_assert!(self.batch.is_empty());
        let mut hits: Vec<ChunkHit> = Vec::with_capacity(self.index.rhombus_offsets.len());
        for &offset in &self.index.rhombus_offsets {
            let chunk = fund + offset;
            if let Some(w) = &self.window {
                if !w.contains(chunk) {
                    continue;
                }
            }
            let bounds = self.index.chunk_bounds(chunk);
            let (t_min, t_max) = match bounds.ray_slab(self.origin, self.direction) {
                Some(interval) => interval,
                None => continue,
            };
            if t_max <= 0.0 || t_min > self.max_distance || t_min < t0 || t_min >= t1 {
                continue;
            }
            hits.push(ChunkHit {
                chunk,
                distance: t_min,
            });
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        self.batch.extend(hits);
    }
}

impl Iterator for LatticeRaycast<'_> {
    type Item = ChunkHit;

    fn next(&mut self) -> Option<ChunkHit> {
        loop {
            if let Some(hit) = self.batch.pop_front() {
                return Some(hit);
            }
            if self.walk_done {
                return None;
            }
            match self.walk.next() {
                Some(step) => {
                    if let Some(prev) = self.prev {
                        let t0 = if self.first_interval {
                            f64::NEG_INFINITY
                        } else {
                            prev.distance
                        };
                        self.flush_interval(prev.cell, t0, step.distance);
                        self.first_interval = false;
                    }
                    self.prev = Some(step);
                }
                None => {
                    self.walk_done = true;
                    if let Some(prev) = self.prev.take() {
                        let t0 = if self.first_interval {
                            f64::NEG_INFINITY
                        } else {
                            prev.distance
                        };
                        self.flush_interval(prev.cell, t0, self.max_distance);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_lattice() -> LatticeIndex {
        LatticeIndex::new(
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Aabb::from_origin_size(Vector2::new(-0.5, -0.5), Vector2::new(1.0, 1.0)),
        )
        .unwrap()
    }

    fn skew_lattice() -> LatticeIndex {
        // Hexagonal-flavoured lattice with a footprint covering the rhombus.
        LatticeIndex::new(
            Vector2::new(1.0, 0.0),
            Vector2::new(0.5, 1.0),
            Aabb::from_origin_size(Vector2::new(0.0, 0.0), Vector2::new(1.5, 1.0)),
        )
        .unwrap()
    }

    #[test]
    fn degenerate_strides_are_rejected() {
        let footprint = Aabb::from_origin_size(Vector2::zeros(), Vector2::new(1.0, 1.0));
        let err = LatticeIndex::new(
            Vector2::new(1.0, 2.0),
            Vector2::new(-2.0, -4.0),
            footprint,
        )
        .unwrap_err();
        assert_relative_eq!(err.det, 0.0);

        assert!(LatticeIndex::new(Vector2::zeros(), Vector2::new(0.0, 1.0), footprint).is_err());
    }

    #[test]
    fn chunk_of_resolves_interior_points() {
        let lattice = unit_lattice();
        assert_eq!(lattice.chunk_of(Vector2::new(0.3, 0.3)), Some(ChunkCoord::new(0, 0)));
        assert_eq!(lattice.chunk_of(Vector2::new(1.2, 0.3)), Some(ChunkCoord::new(1, 0)));
        assert_eq!(
            lattice.chunk_of(Vector2::new(-3.7, 12.2)),
            Some(ChunkCoord::new(-4, 12))
        );
    }

    #[test]
    fn chunk_of_boundary_point_resolves_to_an_adjacent_chunk() {
        let lattice = unit_lattice();
        let chunk = lattice.chunk_of(Vector2::new(0.5, 0.3)).unwrap();
        assert!(chunk == ChunkCoord::new(0, 0) || chunk == ChunkCoord::new(1, 0));
        assert!(lattice.chunk_bounds(chunk).contains(Vector2::new(0.5, 0.3)));
    }

    #[test]
    fn chunk_of_skewed_lattice_lands_in_containing_footprint() {
        let lattice = skew_lattice();
        for &(x, y) in &[(0.7, 0.4), (3.1, -2.6), (-5.3, 7.8), (0.01, 0.99)] {
            let p = Vector2::new(x, y);
            let chunk = lattice.chunk_of(p).expect("footprints cover the plane");
            assert!(lattice.chunk_bounds(chunk).contains(p), "point {p:?} chunk {chunk}");
        }
    }

    #[test]
    fn chunks_overlapping_window_yields_full_grid() {
        let lattice = unit_lattice();
        let window = ChunkBound::new(ChunkCoord::new(0, 0), ChunkCoord::new(10, 10));
        let chunks: Vec<_> = lattice
            .chunks_overlapping(
                Vector2::new(-10.0, -10.0),
                Vector2::new(15.0, 15.0),
                Some(window),
            )
            .collect();
        assert_eq!(chunks.len(), 100);
        for x in 0..10 {
            for y in 0..10 {
                assert!(chunks.contains(&ChunkCoord::new(x, y)));
            }
        }
    }

    #[test]
    fn chunks_overlapping_is_restartable() {
        let lattice = unit_lattice();
        let iter = lattice.chunks_overlapping(
            Vector2::new(0.0, 0.0),
            Vector2::new(3.0, 2.0),
            None,
        );
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn chunk_intersects_includes_all_neighbours() {
        let lattice = unit_lattice();
        let around: Vec<_> = lattice.chunk_intersects(ChunkCoord::new(100, -40)).collect();
        // The footprint tiles exactly, so the overlap set is the 3x3
        // neighbourhood (edges and corners touch).
        assert_eq!(around.len(), 9);
        for dx in -1..=1 {
            for dy in -1..=1 {
                assert!(around.contains(&ChunkCoord::new(100 + dx, -40 + dy)));
            }
        }
    }

    #[test]
    fn raycast_crosses_a_window_row_in_order() {
        let lattice = unit_lattice();
        let window = ChunkBound::new(ChunkCoord::new(0, 0), ChunkCoord::new(10, 10));
        let hits: Vec<_> = lattice
            .raycast(
                Vector2::new(-0.5, 0.0),
                Vector2::new(1.0, 0.0),
                10.0,
                Some(window),
            )
            .collect();
        assert_eq!(hits.len(), 10);
        for (i, hit) in hits.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let expected = ChunkCoord::new(i as i32, 0);
            assert_eq!(hit.chunk, expected);
            assert_relative_eq!(hit.distance, i as f64);
        }
    }

    #[test]
    fn raycast_starting_inside_reports_negative_entry() {
        let lattice = unit_lattice();
        let first = lattice
            .raycast(Vector2::new(0.2, 0.1), Vector2::new(1.0, 0.0), 2.0, None)
            .next()
            .unwrap();
        assert_eq!(first.chunk, ChunkCoord::new(0, 0));
        assert!(first.distance < 0.0);
    }

    #[test]
    fn raycast_diagonal_is_strictly_ordered_and_deduplicated() {
        let lattice = skew_lattice();
        let hits: Vec<_> = lattice
            .raycast(
                Vector2::new(0.2, 0.3),
                Vector2::new(0.7, 0.4),
                20.0,
                None,
            )
            .collect();
        assert!(hits.len() > 5);
        for pair in hits.windows(2) {
            assert!(pair[0].distance < pair[1].distance);
        }
        let mut chunks: Vec<_> = hits.iter().map(|h| h.chunk).collect();
        chunks.sort();
        chunks.dedup();
        assert_eq!(chunks.len(), hits.len());
    }
}
