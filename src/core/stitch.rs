//! Boundary-edge stitching: completing adjacency across chunk translations.
//!
//! The fundamental domain's boundary half-edges have no neighbour *inside*
//! the domain, but in the periodic tiling most of them do have one, in an
//! adjacent translated copy. [`stitch`] runs once at construction time: it
//! translates every boundary edge by each nearby chunk offset and matches the
//! translated endpoints against the untranslated edge set, producing a table
//! of cross-chunk moves keyed by `(cell, dir)`.
//!
//! Matching is tolerance-quantized: endpoints are bucketed on a grid of
//! `tolerance`-sized cells (shifted by half a cell when storing, so a probe
//! of the 2x2 bucket neighbourhood finds any vertex within tolerance). A
//! reverse-winding coincidence is a direct attachment; a same-winding
//! coincidence is a mirrored one.

use crate::core::cell::{CellDir, ChunkCoord, Connection};
use crate::core::collections::{fast_hash_map_with_capacity, FastHashMap};
use crate::core::lattice::LatticeIndex;
use crate::topology::domain::BoundaryEdge;
use log::warn;
use nalgebra::Vector2;
use std::fmt::Debug;
use std::hash::Hash;

/// Default endpoint-matching tolerance, in world units.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// One cross-chunk adjacency fact: leaving `(cell, dir)` lands in `dest` of
/// the chunk displaced by `chunk_delta`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StitchEntry<C> {
    /// Destination cell within the fundamental domain.
    pub dest: C,
    /// Chunk displacement of the destination relative to the source.
    pub chunk_delta: ChunkCoord,
    /// The side of `dest` the move arrives through.
    pub inverse_dir: CellDir,
    /// How the two cells attach across the stitched edge.
    pub connection: Connection,
}

/// Cross-chunk move table keyed by `(source cell, direction)`.
pub type StitchTable<C> = FastHashMap<(C, CellDir), StitchEntry<C>>;

/// Output of [`stitch`]: the move table plus every boundary edge that found
/// no partner.
///
/// Unmatched edges mean the domain does not tile the plane gaplessly under
/// the given strides. That may be intentional (decorative, deliberately
/// gappy tilings) so it is not an error, but it is never silent either: the
/// edges are reported here and logged at construction.
#[derive(Clone, Debug)]
pub struct Stitched<C> {
    /// Cross-chunk adjacency, read-only after construction.
    pub moves: StitchTable<C>,
    /// Boundary edges with no partner under any overlapping chunk offset.
    pub unmatched: Vec<BoundaryEdge<C>>,
}

type QuantizedVertex = (i64, i64);

/// Probe offsets covering the 2x2 bucket neighbourhood of a quantized
/// vertex.
const PROBE_OFFSETS: [(i64, i64); 4] = [(0, 0), (0, 1), (1, 0), (1, 1)];

#[allow(clippy::cast_possible_truncation)]
fn quantize(v: Vector2<f64>, tolerance: f64) -> QuantizedVertex {
    ((v.x / tolerance).floor() as i64, (v.y / tolerance).floor() as i64)
}

/// Quantize for *storage*, shifted by half a bucket so that a stored vertex
/// never sits on a bucket boundary relative to the probe grid.
#[allow(clippy::cast_possible_truncation)]
fn quantize_stored(v: Vector2<f64>, tolerance: f64) -> QuantizedVertex {
    (
        (v.x / tolerance + 0.5).floor() as i64,
        (v.y / tolerance + 0.5).floor() as i64,
    )
}

/// Matches the domain's boundary edges against translated copies of
/// themselves, producing the cross-chunk move table.
///
/// Considers every non-zero chunk offset whose footprint overlaps chunk
/// zero's. Each successful match records the move in both directions. Edges
/// still unpartnered afterwards are returned in
/// [`Stitched::unmatched`] and logged via [`log::warn`]; the corresponding
/// directions simply stay absent from the table.
#[must_use]
pub fn stitch<C>(
    edges: &[BoundaryEdge<C>],
    lattice: &LatticeIndex,
    tolerance: f64,
) -> Stitched<C>
where
    C: Copy + Eq + Hash + Debug,
{
    let mut by_endpoints: FastHashMap<(QuantizedVertex, QuantizedVertex), usize> =
        fast_hash_map_with_capacity(edges.len());
    let mut vertex_count: FastHashMap<QuantizedVertex, u32> =
        fast_hash_map_with_capacity(edges.len() * 2);
    for (i, edge) in edges.iter().enumerate() {
        let a = quantize_stored(edge.a, tolerance);
        let b = quantize_stored(edge.b, tolerance);
        by_endpoints.insert((a, b), i);
        *vertex_count.entry(a).or_insert(0) += 1;
        *vertex_count.entry(b).or_insert(0) += 1;
    }

    let mut moves: StitchTable<C> = fast_hash_map_with_capacity(edges.len());

    for chunk in lattice.chunk_intersects(ChunkCoord::ZERO) {
        // Chunk zero is the domain matching itself in place.
        if chunk == ChunkCoord::ZERO {
            continue;
        }
        let offset = lattice.chunk_offset(chunk);
        for moved in edges {
            if moves.contains_key(&(moved.cell, moved.dir)) {
                continue;
            }
            let v1 = quantize(moved.a + offset, tolerance);
            let v2 = quantize(moved.b + offset, tolerance);
            'probe: for o1 in PROBE_OFFSETS {
                let w1 = (v1.0 + o1.0, v1.1 + o1.1);
                // No stored vertex in this bucket: skip the inner probes.
                if !vertex_count.get(&w1).is_some_and(|c| *c > 0) {
                    continue;
                }
                for o2 in PROBE_OFFSETS {
                    let w2 = (v2.0 + o2.0, v2.1 + o2.1);
                    if let Some(&j) = by_endpoints.get(&(w2, w1)) {
                        if link(&mut moves, edges[j], *moved, chunk, Connection::IDENTITY) {
                            break 'probe;
                        }
                    } else if let Some(&j) = by_endpoints.get(&(w1, w2)) {
                        if link(&mut moves, edges[j], *moved, chunk, Connection::MIRRORED) {
                            break 'probe;
                        }
                    }
                }
            }
        }
    }

    let unmatched: Vec<BoundaryEdge<C>> = edges
        .iter()
        .filter(|e| !moves.contains_key(&(e.cell, e.dir)))
        .copied()
        .collect();
    if !unmatched.is_empty() {
        warn!(
            "{} boundary edge(s) have no neighbour under the given strides; \
             moves through them will fail",
            unmatched.len()
        );
    }

    Stitched { moves, unmatched }
}

/// Records the adjacency implied by `moved` (translated into `chunk`)
/// coinciding with the untranslated `target`. Returns false when the target
/// side is already taken.
fn link<C>(
    moves: &mut StitchTable<C>,
    target: BoundaryEdge<C>,
    moved: BoundaryEdge<C>,
    chunk: ChunkCoord,
    connection: Connection,
) -> bool
where
    C: Copy + Eq + Hash + Debug,
{
    if moves.contains_key(&(target.cell, target.dir)) {
        return false;
    }
    moves.insert(
        (target.cell, target.dir),
        StitchEntry {
            dest: moved.cell,
            chunk_delta: chunk,
            inverse_dir: moved.dir,
            connection,
        },
    );
    moves.insert(
        (moved.cell, moved.dir),
        StitchEntry {
            dest: target.cell,
            chunk_delta: -chunk,
            inverse_dir: target.dir,
            connection,
        },
    );
    true
}
