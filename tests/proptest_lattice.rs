//! Property-based tests for the lattice index.
//!
//! Verifies the load-bearing guarantees of the arithmetic core over random
//! inputs, on an orthogonal and on a skewed lattice:
//! - every point resolves to a chunk whose footprint contains it,
//! - point location is unique away from footprint boundaries,
//! - rectangle queries never miss an overlapping chunk,
//! - raycasts are strictly distance-ordered with no repeated chunk.

use nalgebra::Vector2;
use proptest::prelude::*;
use tessella::core::bound::ChunkBound;
use tessella::core::cell::ChunkCoord;
use tessella::core::lattice::LatticeIndex;
use tessella::geometry::aabb::Aabb;

fn unit_lattice() -> LatticeIndex {
    LatticeIndex::new(
        Vector2::new(1.0, 0.0),
        Vector2::new(0.0, 1.0),
        Aabb::from_origin_size(Vector2::new(-0.5, -0.5), Vector2::new(1.0, 1.0)),
    )
    .unwrap()
}

fn skew_lattice() -> LatticeIndex {
    // Footprint covers the fundamental rhombus, so footprints overlap and
    // still cover the plane.
    LatticeIndex::new(
        Vector2::new(1.0, 0.0),
        Vector2::new(0.5, 1.0),
        Aabb::from_origin_size(Vector2::new(0.0, 0.0), Vector2::new(1.5, 1.0)),
    )
    .unwrap()
}

proptest! {
    /// Every point lies inside the footprint of the chunk it resolves to.
    #[test]
    fn prop_point_resolves_to_containing_chunk(
        x in -50.0..50.0f64,
        y in -50.0..50.0f64,
    ) {
        let p = Vector2::new(x, y);
        for lattice in [unit_lattice(), skew_lattice()] {
            let chunk = lattice.chunk_of(p).expect("footprints cover the plane");
            prop_assert!(
                lattice.chunk_bounds(chunk).contains(p),
                "chunk {chunk} does not contain {p:?}"
            );
        }
    }

    /// On an exactly-tiling lattice, a point away from footprint boundaries
    /// belongs to exactly one chunk.
    #[test]
    fn prop_unit_partition_is_unique_off_boundaries(
        x in -50.0..50.0f64,
        y in -50.0..50.0f64,
    ) {
        let boundary_distance = |v: f64| {
            let f = (v + 0.5).fract().abs();
            f.min(1.0 - f)
        };
        prop_assume!(boundary_distance(x) > 1e-6 && boundary_distance(y) > 1e-6);

        let lattice = unit_lattice();
        let p = Vector2::new(x, y);
        #[allow(clippy::cast_possible_truncation)]
        let (rx, ry) = (x.round() as i32, y.round() as i32);
        let mut containing = 0;
        for cx in rx - 1..=rx + 1 {
            for cy in ry - 1..=ry + 1 {
                if lattice.chunk_bounds(ChunkCoord::new(cx, cy)).contains(p) {
                    containing += 1;
                }
            }
        }
        prop_assert_eq!(containing, 1);
        prop_assert_eq!(lattice.chunk_of(p), Some(ChunkCoord::new(rx, ry)));
    }

    /// Rectangle queries report every chunk that strictly overlaps the
    /// rectangle (boundary-touching extras are allowed, misses are not).
    #[test]
    fn prop_chunks_overlapping_has_no_false_negatives(
        min_x in -20.0..20.0f64,
        min_y in -20.0..20.0f64,
        width in 0.0..6.0f64,
        height in 0.0..6.0f64,
    ) {
        let lattice = unit_lattice();
        let min = Vector2::new(min_x, min_y);
        let max = min + Vector2::new(width, height);
        let reported: std::collections::HashSet<ChunkCoord> =
            lattice.chunks_overlapping(min, max, None).collect();

        #[allow(clippy::cast_possible_truncation)]
        let (lo_x, hi_x) = ((min_x - 1.0).floor() as i32, (max.x + 1.0).ceil() as i32);
        #[allow(clippy::cast_possible_truncation)]
        let (lo_y, hi_y) = ((min_y - 1.0).floor() as i32, (max.y + 1.0).ceil() as i32);
        for cx in lo_x..=hi_x {
            for cy in lo_y..=hi_y {
                let chunk = ChunkCoord::new(cx, cy);
                let b = lattice.chunk_bounds(chunk);
                let strictly_overlaps = b.min.x < max.x
                    && b.max.x > min.x
                    && b.min.y < max.y
                    && b.max.y > min.y;
                if strictly_overlaps {
                    prop_assert!(
                        reported.contains(&chunk),
                        "chunk {chunk} overlaps the query but was not reported"
                    );
                }
            }
        }
    }

    /// Raycasts yield strictly increasing distances, never repeat a chunk,
    /// and every reported entry distance matches the chunk's slab interval.
    #[test]
    fn prop_raycast_is_strictly_ordered(
        ox in -10.0..10.0f64,
        oy in -10.0..10.0f64,
        dx in -1.0..1.0f64,
        dy in -1.0..1.0f64,
    ) {
        prop_assume!(dx.abs() + dy.abs() > 1e-3);
        let origin = Vector2::new(ox, oy);
        let direction = Vector2::new(dx, dy);

        for lattice in [unit_lattice(), skew_lattice()] {
            let hits: Vec<_> = lattice.raycast(origin, direction, 25.0, None).collect();
            prop_assert!(!hits.is_empty());

            for pair in hits.windows(2) {
                prop_assert!(
                    pair[0].distance < pair[1].distance,
                    "distances not strictly increasing: {} then {}",
                    pair[0].distance,
                    pair[1].distance
                );
            }

            let mut seen = std::collections::HashSet::new();
            for hit in &hits {
                prop_assert!(seen.insert(hit.chunk), "chunk {} repeated", hit.chunk);
                let (t_min, t_max) = lattice
                    .chunk_bounds(hit.chunk)
                    .ray_slab(origin, direction)
                    .expect("reported chunk must intersect the ray");
                prop_assert!((t_min - hit.distance).abs() < 1e-9);
                prop_assert!(t_max > 0.0);
                prop_assert!(hit.distance <= 25.0);
            }
        }
    }

    /// A windowed raycast reports exactly the in-window subset of the
    /// unwindowed hits that the walk can reach.
    #[test]
    fn prop_windowed_raycast_is_an_in_window_subset(
        ox in -10.0..10.0f64,
        oy in -10.0..10.0f64,
        dx in -1.0..1.0f64,
        dy in -1.0..1.0f64,
    ) {
        prop_assume!(dx.abs() + dy.abs() > 1e-3);
        let origin = Vector2::new(ox, oy);
        let direction = Vector2::new(dx, dy);
        let window = ChunkBound::new(ChunkCoord::new(-5, -5), ChunkCoord::new(5, 5));

        let lattice = unit_lattice();
        let unwindowed: Vec<_> = lattice.raycast(origin, direction, 25.0, None).collect();
        let windowed: Vec<_> = lattice
            .raycast(origin, direction, 25.0, Some(window))
            .collect();

        for hit in &windowed {
            prop_assert!(window.contains(hit.chunk));
            prop_assert!(unwindowed.iter().any(
                |u| u.chunk == hit.chunk && (u.distance - hit.distance).abs() < 1e-12
            ));
        }
    }
}
