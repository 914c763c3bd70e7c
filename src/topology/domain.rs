//! The fundamental-domain topology contract.
//!
//! A periodic tiling replicates one finite *fundamental domain* across the
//! plane. Everything the lattice engine needs from that domain (adjacency,
//! point location, raycasting, indexing and the unmatched boundary edges the
//! stitcher pairs up) is consumed through [`DomainTopology`]. How the domain
//! was built (from a mesh, by hand, procedurally) is outside this crate's
//! scope; [`DataDrivenTopology`](crate::topology::data_driven::DataDrivenTopology)
//! is a ready-made table-driven implementation.

use crate::core::cell::{CellDir, CellRotation, Connection};
use crate::core::collections::{SmallBuffer, INLINE_DIRS};
use crate::geometry::aabb::Aabb;
use crate::geometry::raycast::RaycastHit;
use nalgebra::{Matrix3, Vector2};
use std::fmt::Debug;
use std::hash::Hash;

/// Result of a successful move across one cell side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move<C> {
    /// The cell on the far side.
    pub dest: C,
    /// The side of `dest` the move arrives through; moving back through it
    /// returns to the source cell.
    pub inverse_dir: CellDir,
    /// How the two cells attach across the shared side.
    pub connection: Connection,
}

/// A half-edge on the boundary of the fundamental domain: one cell side with
/// no neighbour inside the domain.
///
/// `a -> b` follows the owning cell's winding order, so a neighbouring copy
/// of the domain sees the same geometric edge with the endpoints swapped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryEdge<C> {
    /// Edge start, in domain-local coordinates.
    pub a: Vector2<f64>,
    /// Edge end, in domain-local coordinates.
    pub b: Vector2<f64>,
    /// The cell owning the half-edge.
    pub cell: C,
    /// The side of `cell` the half-edge lies on.
    pub dir: CellDir,
}

/// Contract the lattice engine consumes from a fundamental-domain topology.
///
/// All coordinates are domain-local: the engine translates queries into the
/// local frame of each chunk before delegating, and translates results back.
///
/// Implementations must be internally consistent: `index` and
/// `cell_by_index` are inverse over `0..cell_count()`, `try_move` pairs
/// symmetrically (moving back through `inverse_dir` returns to the source),
/// and `raycast` yields hits in non-decreasing distance order limited to the
/// domain's own footprint.
pub trait DomainTopology {
    /// Opaque cell identifier. The engine never interprets it.
    type Cell: Copy + Eq + Hash + Debug;

    /// Number of cells in the domain.
    fn cell_count(&self) -> usize;

    /// All cells, in canonical (index) order.
    fn cells(&self) -> Box<dyn Iterator<Item = Self::Cell> + '_>;

    /// True when `cell` belongs to this domain.
    fn contains(&self, cell: Self::Cell) -> bool;

    /// The direction codes valid at `cell`.
    fn directions(&self, cell: Self::Cell) -> SmallBuffer<CellDir, INLINE_DIRS>;

    /// The in-domain move leaving `cell` through `dir`, or `None` when that
    /// side has no neighbour inside the domain (a boundary side).
    fn try_move(&self, cell: Self::Cell, dir: CellDir) -> Option<Move<Self::Cell>>;

    /// The cell containing a local point, or `None` when the point lies
    /// outside every cell.
    fn find_cell(&self, point: Vector2<f64>) -> Option<Self::Cell>;

    /// Locates the cell under a full local frame (a homogeneous 2D
    /// transform) and reports the rotation relating the frame to the cell's
    /// canonical orientation.
    ///
    /// The default implementation locates the frame's translation point and
    /// reports [`CellRotation::IDENTITY`]; implementations with a richer
    /// cell-type algebra should override it.
    fn find_cell_in_frame(&self, frame: &Matrix3<f64>) -> Option<(Self::Cell, CellRotation)> {
        let position = Vector2::new(frame[(0, 2)], frame[(1, 2)]);
        self.find_cell(position).map(|c| (c, CellRotation::IDENTITY))
    }

    /// Cells whose extent may intersect the rectangle `[min, max]`.
    /// Approximate: extras near the boundary are allowed, omissions are not.
    fn cells_intersecting(
        &self,
        min: Vector2<f64>,
        max: Vector2<f64>,
    ) -> Box<dyn Iterator<Item = Self::Cell> + '_>;

    /// Dense index of `cell` in `0..cell_count()`, or `None` for a foreign
    /// cell.
    fn index(&self, cell: Self::Cell) -> Option<usize>;

    /// Inverse of [`index`](DomainTopology::index); `None` when out of
    /// range.
    fn cell_by_index(&self, index: usize) -> Option<Self::Cell>;

    /// The unmatched boundary half-edges, for the stitcher.
    fn boundary_edges(&self) -> &[BoundaryEdge<Self::Cell>];

    /// Raycast limited to the domain's own footprint, in non-decreasing
    /// distance order. `max_distance` is a ray-parameter limit.
    fn raycast(
        &self,
        origin: Vector2<f64>,
        direction: Vector2<f64>,
        max_distance: f64,
    ) -> Box<dyn Iterator<Item = RaycastHit<Self::Cell>> + '_>;

    /// Center of `cell` in domain-local coordinates.
    fn cell_center(&self, cell: Self::Cell) -> Vector2<f64>;

    /// Homogeneous 2D transform carrying cell-local space into domain-local
    /// space.
    fn deformation(&self, cell: Self::Cell) -> Matrix3<f64>;

    /// Axis-aligned bounds of the domain's geometry. Used as the default
    /// chunk footprint.
    fn footprint(&self) -> Aabb;
}
