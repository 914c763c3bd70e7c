//! # tessella
//!
//! Periodic planar tilings: replicate one finite *fundamental domain* (a
//! small patch of cells with its own internal topology) indefinitely across
//! the plane along two stride vectors, and query the result as a single
//! coherent grid. Point location, bounding-box enumeration and raycasting
//! all run in time proportional to the cells actually touched, in guaranteed
//! distance order, using nothing but affine arithmetic: no spatial index is
//! ever built and no chunk is materialized.
//!
//! The crate backs procedural-content systems such as tile maps, dungeon
//! layouts and infinite streamed worlds, where a hand-authored patch must repeat
//! seamlessly and queries must stay cheap arbitrarily far from the origin.
//!
//! # Architecture
//!
//! Three pieces compose, leaves first:
//!
//! - [`LatticeIndex`](core::lattice::LatticeIndex): pure arithmetic over
//!   the chunk lattice: which chunk holds a point, which chunks overlap a
//!   rectangle, which chunks does a ray cross and in what order.
//! - [`stitch`](core::stitch::stitch): a one-shot construction pass that
//!   pairs the domain's boundary half-edges with translated copies of
//!   themselves, completing adjacency across chunk seams.
//! - [`PeriodicTiling`](core::tiling::PeriodicTiling): the grid façade;
//!   addresses cells as (domain cell, chunk), delegates in-domain queries to
//!   the [`DomainTopology`](topology::domain::DomainTopology) collaborator
//!   and chunk selection to the lattice index, and consults the stitch
//!   table for cross-seam moves.
//!
//! All three are immutable once built; bounded and unbounded views share
//! them behind an `Arc` and may be read from multiple threads freely.
//!
//! # Quick start
//!
//! Tile the plane with unit squares (one-cell fundamental domain, unit
//! strides) and query it:
//!
//! ```rust
//! use nalgebra::Vector2;
//! use tessella::prelude::*;
//!
//! let mut domain = DataDrivenTopology::new();
//! let square = vec![
//!     Vector2::new(-0.5, -0.5),
//!     Vector2::new(0.5, -0.5),
//!     Vector2::new(0.5, 0.5),
//!     Vector2::new(-0.5, 0.5),
//! ];
//! let cell = domain.add_cell(square.clone());
//! for i in 0..4u16 {
//!     domain.add_boundary_edge(
//!         cell,
//!         CellDir::new(i),
//!         square[i as usize],
//!         square[(i as usize + 1) % 4],
//!     );
//! }
//!
//! let tiling = PeriodicTiling::new(
//!     domain,
//!     Vector2::new(1.0, 0.0),
//!     Vector2::new(0.0, 1.0),
//! )?;
//!
//! // Point location anywhere in the plane.
//! let found = tiling.find_cell(Vector2::new(41.3, -7.2)).unwrap();
//! assert_eq!(found.chunk, ChunkCoord::new(41, -7));
//!
//! // Seamless moves across chunk boundaries.
//! let east = tiling.try_move(found, CellDir::new(1)).unwrap();
//! assert_eq!(east.dest.chunk, ChunkCoord::new(42, -7));
//!
//! // A window makes the tiling finite, enumerable and indexable.
//! let bounded = tiling.bound_by(ChunkBound::new(
//!     ChunkCoord::new(0, 0),
//!     ChunkCoord::new(10, 10),
//! ));
//! assert_eq!(bounded.index_count()?, 100);
//! assert!(tiling.index_count().is_err()); // unbounded views cannot index
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Error handling
//!
//! Fatal geometry (parallel strides) surfaces at construction as
//! [`DegenerateLatticeError`](core::lattice::DegenerateLatticeError).
//! Boundedness violations are recoverable control flow
//! ([`InfiniteGridError`](core::tiling::InfiniteGridError)). A move with no
//! neighbour is an ordinary `None`, the expected state at a window edge.
//! Boundary edges the stitcher cannot pair are reported, logged and
//! otherwise tolerated; see
//! [`PeriodicTiling::unmatched_boundary_edges`](core::tiling::PeriodicTiling::unmatched_boundary_edges).

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Core lattice machinery: cell addressing, windows, the lattice index, the
/// edge stitcher and the periodic tiling façade.
pub mod core {
    pub mod bound;
    pub mod cell;
    /// Collection aliases tuned for the engine's internal tables.
    pub mod collections;
    pub mod lattice;
    pub mod stitch;
    pub mod tiling;
}

/// Geometric primitives: axis-aligned boxes and raycasting.
pub mod geometry {
    pub mod aabb;
    pub mod raycast;
}

/// The fundamental-domain contract and its table-driven implementation.
pub mod topology {
    pub mod data_driven;
    pub mod domain;
}

/// Convenient re-exports of the public surface.
pub mod prelude {
    pub use crate::core::bound::ChunkBound;
    pub use crate::core::cell::{
        CellDir, CellRotation, ChunkCoord, Connection, PeriodicCell,
    };
    pub use crate::core::collections::{FastHashMap, FastHashSet, SmallBuffer};
    pub use crate::core::lattice::{ChunkHit, DegenerateLatticeError, LatticeIndex};
    pub use crate::core::stitch::{Stitched, StitchEntry, StitchTable, DEFAULT_TOLERANCE};
    pub use crate::core::tiling::{InfiniteGridError, PeriodicTiling, TilingRaycast};
    pub use crate::geometry::aabb::Aabb;
    pub use crate::geometry::raycast::{LatticeStep, RaycastHit};
    pub use crate::topology::data_driven::{DataDrivenTopology, DomainCellKey};
    pub use crate::topology::domain::{BoundaryEdge, DomainTopology, Move};
}
