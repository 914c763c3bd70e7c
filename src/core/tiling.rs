//! The periodic tiling: a grid façade over a replicated fundamental domain.
//!
//! [`PeriodicTiling`] composes three immutable pieces built once at
//! construction (the domain topology, the [`LatticeIndex`] and the stitched
//! cross-chunk move table) and answers every grid query by splitting a
//! [`PeriodicCell`] into its domain and chunk components, delegating, and
//! recombining. The shared pieces live behind an `Arc`, so
//! [`bound_by`](PeriodicTiling::bound_by) and
//! [`unbounded`](PeriodicTiling::unbounded) are cheap rebinds of the window,
//! not rebuilds, and sibling views may be read concurrently.

use crate::core::bound::ChunkBound;
use crate::core::cell::{CellDir, CellRotation, ChunkCoord, PeriodicCell};
use crate::core::collections::{SmallBuffer, INLINE_DIRS};
use crate::core::lattice::{ChunkHit, DegenerateLatticeError, LatticeIndex, LatticeRaycast};
use crate::core::stitch::{stitch, Stitched, DEFAULT_TOLERANCE};
use crate::geometry::aabb::Aabb;
use crate::geometry::raycast::RaycastHit;
use crate::topology::domain::{BoundaryEdge, DomainTopology, Move};
use nalgebra::{Matrix3, Vector2};
use ordered_float::NotNan;
use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use thiserror::Error;

/// An operation requiring a finite tiling was invoked without a window.
///
/// Recoverable: apply [`PeriodicTiling::bound_by`] first.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("`{operation}` requires a bounded tiling; apply bound_by first")]
pub struct InfiniteGridError {
    /// The operation that needed a window.
    pub operation: &'static str,
}

/// Immutable state shared by every view of one tiling.
struct SharedState<G: DomainTopology> {
    domain: G,
    lattice: LatticeIndex,
    stitched: Stitched<G::Cell>,
}

/// An infinite (or windowed) tiling built by replicating a fundamental
/// domain over a 2D lattice.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector2;
/// use tessella::core::cell::{CellDir, ChunkCoord};
/// use tessella::core::tiling::PeriodicTiling;
/// use tessella::topology::data_driven::DataDrivenTopology;
///
/// let mut domain = DataDrivenTopology::new();
/// let square = vec![
///     Vector2::new(-0.5, -0.5),
///     Vector2::new(0.5, -0.5),
///     Vector2::new(0.5, 0.5),
///     Vector2::new(-0.5, 0.5),
/// ];
/// let cell = domain.add_cell(square.clone());
/// for i in 0..4u16 {
///     domain.add_boundary_edge(cell, CellDir::new(i), square[i as usize], square[(i as usize + 1) % 4]);
/// }
///
/// let tiling = PeriodicTiling::new(
///     domain,
///     Vector2::new(1.0, 0.0),
///     Vector2::new(0.0, 1.0),
/// )
/// .unwrap();
///
/// let found = tiling.find_cell(Vector2::new(2.2, -0.7)).unwrap();
/// assert_eq!(found.chunk, ChunkCoord::new(2, -1));
///
/// // Moving through the right-hand side crosses into the next chunk.
/// let east = tiling.try_move(found, CellDir::new(1)).unwrap();
/// assert_eq!(east.dest.chunk, ChunkCoord::new(3, -1));
/// ```
pub struct PeriodicTiling<G: DomainTopology> {
    shared: Arc<SharedState<G>>,
    window: Option<ChunkBound>,
}

impl<G: DomainTopology> Clone for PeriodicTiling<G> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            window: self.window,
        }
    }
}

impl<G: DomainTopology> PeriodicTiling<G> {
    /// Builds an unbounded tiling replicating `domain` along `stride_x` and
    /// `stride_y`, deriving the chunk footprint from the domain's own
    /// bounds.
    ///
    /// # Errors
    ///
    /// [`DegenerateLatticeError`] when the strides are parallel or zero.
    pub fn new(
        domain: G,
        stride_x: Vector2<f64>,
        stride_y: Vector2<f64>,
    ) -> Result<Self, DegenerateLatticeError> {
        let footprint = domain.footprint();
        Self::with_footprint(domain, stride_x, stride_y, footprint)
    }

    /// Like [`new`](PeriodicTiling::new) with an explicit chunk footprint.
    ///
    /// The footprint must contain the domain's geometry; see
    /// [`LatticeIndex::new`].
    ///
    /// # Errors
    ///
    /// [`DegenerateLatticeError`] when the strides are parallel or zero.
    pub fn with_footprint(
        domain: G,
        stride_x: Vector2<f64>,
        stride_y: Vector2<f64>,
        footprint: Aabb,
    ) -> Result<Self, DegenerateLatticeError> {
        let lattice = LatticeIndex::new(stride_x, stride_y, footprint)?;
        let stitched = stitch(domain.boundary_edges(), &lattice, DEFAULT_TOLERANCE);
        Ok(Self {
            shared: Arc::new(SharedState {
                domain,
                lattice,
                stitched,
            }),
            window: None,
        })
    }

    /// The fundamental-domain topology.
    #[must_use]
    pub fn domain(&self) -> &G {
        &self.shared.domain
    }

    /// The lattice index underlying spatial queries.
    #[must_use]
    pub fn lattice(&self) -> &LatticeIndex {
        &self.shared.lattice
    }

    /// Boundary edges the stitcher could not pair under the given strides.
    ///
    /// Non-empty means the domain does not tile gaplessly: moves through
    /// these sides will fail. Intentional for decorative tilings, a bug
    /// otherwise; validate after construction if full connectivity
    /// matters.
    #[must_use]
    pub fn unmatched_boundary_edges(&self) -> &[BoundaryEdge<G::Cell>] {
        &self.shared.stitched.unmatched
    }

    /// The current window, or `None` when unbounded.
    #[must_use]
    pub fn bound(&self) -> Option<&ChunkBound> {
        self.window.as_ref()
    }

    /// A view of the same tiling restricted to `bound` (intersected with
    /// any existing window). Shares all construction-time state.
    #[must_use]
    pub fn bound_by(&self, bound: ChunkBound) -> Self {
        let window = match &self.window {
            Some(existing) => existing.intersect(&bound),
            None => bound,
        };
        Self {
            shared: Arc::clone(&self.shared),
            window: Some(window),
        }
    }

    /// The unbounded view of the same tiling. Shares all construction-time
    /// state.
    #[must_use]
    pub fn unbounded(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            window: None,
        }
    }

    /// The tightest window containing `cells`, or `None` for no cells.
    pub fn bound_of_cells<I>(&self, cells: I) -> Option<ChunkBound>
    where
        I: IntoIterator<Item = PeriodicCell<G::Cell>>,
    {
        let mut iter = cells.into_iter();
        let first = iter.next()?;
        let mut min = first.chunk;
        let mut max = first.chunk;
        for cell in iter {
            min = min.min(cell.chunk);
            max = max.max(cell.chunk);
        }
        Some(ChunkBound::new(min, max + ChunkCoord::new(1, 1)))
    }

    /// True when `cell` belongs to this (possibly windowed) tiling.
    #[must_use]
    pub fn is_cell_in_grid(&self, cell: PeriodicCell<G::Cell>) -> bool {
        self.shared.domain.contains(cell.domain)
            && self.window.map_or(true, |w| w.contains(cell.chunk))
    }

    /// World offset of a chunk.
    fn chunk_offset(&self, chunk: ChunkCoord) -> Vector2<f64> {
        self.shared.lattice.chunk_offset(chunk)
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Moves from `cell` through `dir`.
    ///
    /// In-domain adjacency is consulted first; failing that, the stitched
    /// cross-chunk table. `None` means the side has no neighbour at all,
    /// the ordinary outcome at the edge of a windowed tiling or along an
    /// unstitched boundary, not an exceptional one.
    #[must_use]
    pub fn try_move(
        &self,
        cell: PeriodicCell<G::Cell>,
        dir: CellDir,
    ) -> Option<Move<PeriodicCell<G::Cell>>> {
        if let Some(m) = self.shared.domain.try_move(cell.domain, dir) {
            return Some(Move {
                dest: PeriodicCell::new(m.dest, cell.chunk),
                inverse_dir: m.inverse_dir,
                connection: m.connection,
            });
        }
        let entry = self.shared.stitched.moves.get(&(cell.domain, dir))?;
        let dest_chunk = cell.chunk + entry.chunk_delta;
        if let Some(w) = &self.window {
            if !w.contains(dest_chunk) {
                return None;
            }
        }
        Some(Move {
            dest: PeriodicCell::new(entry.dest, dest_chunk),
            inverse_dir: entry.inverse_dir,
            connection: entry.connection,
        })
    }

    /// The direction codes valid at `cell`.
    #[must_use]
    pub fn directions(&self, cell: PeriodicCell<G::Cell>) -> SmallBuffer<CellDir, INLINE_DIRS> {
        self.shared.domain.directions(cell.domain)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The cell containing a world point, or `None` when the point falls in
    /// a geometric gap or outside the window.
    #[must_use]
    pub fn find_cell(&self, point: Vector2<f64>) -> Option<PeriodicCell<G::Cell>> {
        for chunk in self.shared.lattice.chunks_overlapping(point, point, None) {
            let local = point - self.chunk_offset(chunk);
            if let Some(domain_cell) = self.shared.domain.find_cell(local) {
                if let Some(w) = &self.window {
                    if !w.contains(chunk) {
                        return None;
                    }
                }
                return Some(PeriodicCell::new(domain_cell, chunk));
            }
        }
        None
    }

    /// Locates the cell under a full world frame (a homogeneous 2D
    /// transform) and the rotation relating the frame to the cell's
    /// canonical orientation.
    #[must_use]
    pub fn find_cell_in_frame(
        &self,
        frame: &Matrix3<f64>,
    ) -> Option<(PeriodicCell<G::Cell>, CellRotation)> {
        let position = Vector2::new(frame[(0, 2)], frame[(1, 2)]);
        let cell = self.find_cell(position)?;
        let local = Matrix3::new_translation(&-self.chunk_offset(cell.chunk)) * frame;
        let (_, rotation) = self.shared.domain.find_cell_in_frame(&local)?;
        Some((cell, rotation))
    }

    /// Cells whose extent may intersect the rectangle `[min, max]`.
    ///
    /// Approximate as the name says: extras near chunk boundaries are
    /// possible, omissions are not. Lazy; clipped to the window when one is
    /// set.
    pub fn cells_intersecting_approx(
        &self,
        min: Vector2<f64>,
        max: Vector2<f64>,
    ) -> impl Iterator<Item = PeriodicCell<G::Cell>> + '_ {
        self.shared
            .lattice
            .chunks_overlapping(min, max, self.window)
            .flat_map(move |chunk| {
                let offset = self.chunk_offset(chunk);
                self.shared
                    .domain
                    .cells_intersecting(min - offset, max - offset)
                    .map(move |c| PeriodicCell::new(c, chunk))
            })
    }

    /// Casts a ray through the tiling, yielding cell hits in globally
    /// non-decreasing distance order.
    ///
    /// Chunk-level ordering comes from [`LatticeIndex::raycast`]; hits from
    /// a chunk already entered are held in a small merge buffer until no
    /// later chunk can produce an earlier hit, so the buffer is bounded by
    /// the chunks in flight, never by the total. `max_distance` is a ray
    /// parameter; the sequence is lazy and single-pass, finite when a
    /// window is set or `max_distance` is.
    #[must_use]
    pub fn raycast(
        &self,
        origin: Vector2<f64>,
        direction: Vector2<f64>,
        max_distance: f64,
    ) -> TilingRaycast<'_, G> {
        let mut chunks = self
            .shared
            .lattice
            .raycast(origin, direction, max_distance, self.window);
        let next_chunk = chunks.next();
        TilingRaycast {
            shared: &*self.shared,
            origin,
            direction,
            max_distance,
            chunks,
            next_chunk,
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    // ------------------------------------------------------------------
    // Enumeration and indexing (window required)
    // ------------------------------------------------------------------

    /// All cells of the tiling.
    ///
    /// # Errors
    ///
    /// [`InfiniteGridError`] when no window is set.
    pub fn cells(
        &self,
    ) -> Result<impl Iterator<Item = PeriodicCell<G::Cell>> + '_, InfiniteGridError> {
        let window = self.window.ok_or(InfiniteGridError { operation: "cells" })?;
        Ok(self.cells_in_bound(window))
    }

    /// All cells whose chunk lies in `bound`, regardless of the tiling's own
    /// window.
    pub fn cells_in_bound(
        &self,
        bound: ChunkBound,
    ) -> impl Iterator<Item = PeriodicCell<G::Cell>> + '_ {
        bound.iter().flat_map(move |chunk| {
            self.shared
                .domain
                .cells()
                .map(move |c| PeriodicCell::new(c, chunk))
        })
    }

    /// Number of cells in the windowed tiling:
    /// `domain cells x window chunks`.
    ///
    /// # Errors
    ///
    /// [`InfiniteGridError`] when no window is set.
    pub fn index_count(&self) -> Result<usize, InfiniteGridError> {
        let window = self.window.ok_or(InfiniteGridError {
            operation: "index_count",
        })?;
        Ok(self.shared.domain.cell_count() * window.chunk_count())
    }

    /// Dense index of `cell`, composed as
    /// `domain index + domain count x window index of the chunk`.
    ///
    /// # Errors
    ///
    /// [`InfiniteGridError`] when no window is set.
    ///
    /// # Panics
    ///
    /// Panics when `cell` does not belong to the windowed tiling.
    pub fn index(&self, cell: PeriodicCell<G::Cell>) -> Result<usize, InfiniteGridError> {
        let window = self.window.ok_or(InfiniteGridError { operation: "index" })?;
        let domain_index = self
            .shared
            .domain
            .index(cell.domain)
            .expect("cell's domain component is not part of the fundamental domain");
        let window_index = window
            .index_of(cell.chunk)
            .expect("cell's chunk lies outside the tiling window");
        Ok(domain_index + self.shared.domain.cell_count() * window_index)
    }

    /// Inverse of [`index`](PeriodicTiling::index).
    ///
    /// # Errors
    ///
    /// [`InfiniteGridError`] when no window is set.
    ///
    /// # Panics
    ///
    /// Panics when `index` is out of range.
    pub fn cell_by_index(&self, index: usize) -> Result<PeriodicCell<G::Cell>, InfiniteGridError> {
        let window = self.window.ok_or(InfiniteGridError {
            operation: "cell_by_index",
        })?;
        let count = self.shared.domain.cell_count();
        let domain_cell = self
            .shared
            .domain
            .cell_by_index(index % count)
            .expect("index out of range for the fundamental domain");
        let chunk = window
            .chunk_by_index(index / count)
            .expect("index out of range for the tiling window");
        Ok(PeriodicCell::new(domain_cell, chunk))
    }

    // ------------------------------------------------------------------
    // Spatial embedding
    // ------------------------------------------------------------------

    /// World-space center of `cell`.
    #[must_use]
    pub fn cell_center(&self, cell: PeriodicCell<G::Cell>) -> Vector2<f64> {
        self.shared.domain.cell_center(cell.domain) + self.chunk_offset(cell.chunk)
    }

    /// Homogeneous 2D transform carrying cell-local space into world space:
    /// the domain's deformation translated by the chunk offset.
    #[must_use]
    pub fn deformation(&self, cell: PeriodicCell<G::Cell>) -> Matrix3<f64> {
        Matrix3::new_translation(&self.chunk_offset(cell.chunk))
            * self.shared.domain.deformation(cell.domain)
    }
}

/// Heap entry for the raycast merge buffer, ordered by distance with an
/// insertion sequence number as tie-breaker.
struct QueuedHit<C> {
    distance: NotNan<f64>,
    seq: u64,
    hit: RaycastHit<PeriodicCell<C>>,
}

impl<C> PartialEq for QueuedHit<C> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.seq == other.seq
    }
}

impl<C> Eq for QueuedHit<C> {}

impl<C> PartialOrd for QueuedHit<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for QueuedHit<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.distance, self.seq).cmp(&(other.distance, other.seq))
    }
}

/// Single-pass iterator over the cells crossed by a ray, in globally
/// non-decreasing distance order. Produced by [`PeriodicTiling::raycast`].
pub struct TilingRaycast<'a, G: DomainTopology> {
    shared: &'a SharedState<G>,
    origin: Vector2<f64>,
    direction: Vector2<f64>,
    max_distance: f64,
    chunks: LatticeRaycast<'a>,
    next_chunk: Option<ChunkHit>,
    heap: BinaryHeap<Reverse<QueuedHit<G::Cell>>>,
    seq: u64,
}

impl<G: DomainTopology> Iterator for TilingRaycast<'_, G> {
    type Item = RaycastHit<PeriodicCell<G::Cell>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_chunk {
                Some(chunk_hit) => {
                    // A queued hit can be released once no unentered chunk
                    // could produce an earlier one: every hit inside a chunk
                    // is at least as far as the chunk's own entry.
                    if let Some(Reverse(top)) = self.heap.peek() {
                        if top.distance.into_inner() <= chunk_hit.distance {
                            let Reverse(queued) = self.heap.pop()?;
                            return Some(queued.hit);
                        }
                    }
                    let shared = self.shared;
                    let offset = shared.lattice.chunk_offset(chunk_hit.chunk);
                    for hit in
                        shared
                            .domain
                            .raycast(self.origin - offset, self.direction, self.max_distance)
                    {
                        let distance = match NotNan::new(hit.distance) {
                            Ok(d) => d,
                            // NaN distances carry no ordering information.
                            Err(_) => continue,
                        };
                        self.seq += 1;
                        self.heap.push(Reverse(QueuedHit {
                            distance,
                            seq: self.seq,
                            hit: RaycastHit {
                                cell: PeriodicCell::new(hit.cell, chunk_hit.chunk),
                                point: hit.point + offset,
                                dir: hit.dir,
                                distance: hit.distance,
                            },
                        }));
                    }
                    self.next_chunk = self.chunks.next();
                }
                None => {
                    let Reverse(queued) = self.heap.pop()?;
                    return Some(queued.hit);
                }
            }
        }
    }
}
