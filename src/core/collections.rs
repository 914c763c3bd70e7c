//! Collection aliases tuned for the lattice engine's internal tables.
//!
//! The engine keys its adjacency and stitch tables by small `Copy` values
//! that are never attacker-controlled, so all maps use the fast
//! non-cryptographic `FxHasher`.

use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Fast `HashMap` for internal, trusted-key tables.
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// Fast `HashSet` for internal, trusted-key sets.
pub type FastHashSet<K> = FxHashSet<K>;

/// Inline capacity for per-cell direction buffers.
///
/// Eight sides cover every common polygonal cell (triangle through octagon)
/// without a heap allocation.
pub const INLINE_DIRS: usize = 8;

/// Stack-allocated buffer that spills to the heap past `N` elements.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Creates a [`FastHashMap`] with pre-allocated capacity.
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, FxBuildHasher)
}
