//! Ray casting primitives.
//!
//! [`RaycastHit`] is the hit record shared by every raycasting surface in the
//! crate. [`unit_lattice_walk`] walks a ray through the integer unit-square
//! lattice in strictly increasing distance order; the periodic lattice index
//! reuses it in inverse (lattice) space, where each unit square is the image
//! of one fundamental rhombus.

use crate::core::bound::ChunkBound;
use crate::core::cell::{CellDir, ChunkCoord};
use nalgebra::Vector2;

/// One cell hit by a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit<C> {
    /// The cell the ray entered.
    pub cell: C,
    /// Where the ray entered the cell.
    pub point: Vector2<f64>,
    /// The side through which the ray entered, when known. `None` for the
    /// cell containing the ray origin.
    pub dir: Option<CellDir>,
    /// Ray parameter at entry, in units of the direction vector's length.
    /// Negative when the origin lies inside the cell.
    pub distance: f64,
}

/// One lattice square hit by [`unit_lattice_walk`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeStep {
    /// The unit square entered, named by its min corner.
    pub cell: ChunkCoord,
    /// Ray parameter at entry (0 for the starting square).
    pub distance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StartBorder {
    None,
    X,
    Y,
}

/// Walks the ray `origin + t·direction` through the unit-square lattice.
///
/// Yields the squares in strictly increasing `t` order, starting with the
/// square containing the origin (at distance 0) unless a `bound` is given and
/// the origin lies outside it, in which case the walk starts where the ray
/// enters the bound. Stops after `max_distance` (a ray-parameter limit, so
/// callers wanting metric distances should pass a unit direction) or when the
/// walk leaves the bound.
#[must_use]
pub fn unit_lattice_walk(
    origin: Vector2<f64>,
    direction: Vector2<f64>,
    max_distance: f64,
    bound: Option<ChunkBound>,
) -> UnitLatticeWalk {
    let mut x1 = origin.x;
    let mut y1 = origin.y;
    let dx = direction.x;
    let dy = direction.y;

    let step_x = if dx > 0.0 {
        1
    } else if dx < 0.0 {
        -1
    } else {
        0
    };
    let step_y = if dy > 0.0 {
        1
    } else if dy < 0.0 {
        -1
    } else {
        0
    };
    let idx = (1.0 / dx).abs();
    let idy = (1.0 / dy).abs();

    let mut max_distance = max_distance;
    let mut extra_distance = 0.0;
    let mut border = StartBorder::None;
    let mut dead = false;

    if let Some(b) = &bound {
        // Clip the walk to the segment of the ray inside the bound. For a
        // zero direction component the crossing times degenerate to +-inf
        // depending on which side of the slab the origin sits.
        let (b_min_x, b_max_x) = (f64::from(b.min.x), f64::from(b.max.x));
        let (b_min_y, b_max_y) = (f64::from(b.min.y), f64::from(b.max.y));
        let tx1 = if dx == 0.0 {
            if b_min_x > x1 { f64::INFINITY } else { f64::NEG_INFINITY }
        } else if dx >= 0.0 {
            (b_min_x - x1) / dx
        } else {
            (b_max_x - x1) / dx
        };
        let tx2 = if dx == 0.0 {
            if b_max_x > x1 { f64::INFINITY } else { f64::NEG_INFINITY }
        } else if dx >= 0.0 {
            (b_max_x - x1) / dx
        } else {
            (b_min_x - x1) / dx
        };
        let ty1 = if dy == 0.0 {
            if b_min_y > y1 { f64::INFINITY } else { f64::NEG_INFINITY }
        } else if dy >= 0.0 {
            (b_min_y - y1) / dy
        } else {
            (b_max_y - y1) / dy
        };
        let ty2 = if dy == 0.0 {
            if b_max_y > y1 { f64::INFINITY } else { f64::NEG_INFINITY }
        } else if dy >= 0.0 {
            (b_max_y - y1) / dy
        } else {
            (b_min_y - y1) / dy
        };

        let min_t = tx1.max(ty1);
        let max_t = tx2.min(ty2);
        max_distance = max_distance.min(max_t);

        if min_t > 0.0 {
            // Advance the start to where the ray enters the bound, snapping
            // the crossed coordinate to kill accumulated float error.
            x1 += dx * min_t;
            y1 += dy * min_t;
            max_distance -= min_t;
            extra_distance = min_t;
            if tx1 == min_t {
                border = StartBorder::X;
                x1 = x1.round();
            } else {
                border = StartBorder::Y;
                y1 = y1.round();
            }
        }

        if max_distance < 0.0 || min_t == f64::INFINITY {
            dead = true;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let x = if border == StartBorder::X {
        x1.round() as i32 + if dx > 0.0 { -1 } else { 0 }
    } else {
        x1.floor() as i32
    };
    #[allow(clippy::cast_possible_truncation)]
    let y = if border == StartBorder::Y {
        y1.round() as i32 + if dy > 0.0 { -1 } else { 0 }
    } else {
        y1.floor() as i32
    };

    let tx = (f64::from(x) + if dx >= 0.0 { 1.0 } else { 0.0 } - x1) / dx;
    let ty = (f64::from(y) + if dy >= 0.0 { 1.0 } else { 0.0 } - y1) / dy;

    UnitLatticeWalk {
        bound,
        max_distance,
        extra_distance,
        x,
        y,
        step_x,
        step_y,
        tx,
        ty,
        idx,
        idy,
        emit_start: border == StartBorder::None && !dead,
        done: dead,
    }
}

/// Iterator state for [`unit_lattice_walk`]. Single-pass.
#[derive(Clone, Debug)]
pub struct UnitLatticeWalk {
    bound: Option<ChunkBound>,
    max_distance: f64,
    extra_distance: f64,
    x: i32,
    y: i32,
    step_x: i32,
    step_y: i32,
    tx: f64,
    ty: f64,
    idx: f64,
    idy: f64,
    emit_start: bool,
    done: bool,
}

impl Iterator for UnitLatticeWalk {
    type Item = LatticeStep;

    fn next(&mut self) -> Option<LatticeStep> {
        if self.done {
            return None;
        }
        if self.emit_start {
            self.emit_start = false;
            return Some(LatticeStep {
                cell: ChunkCoord::new(self.x, self.y),
                distance: 0.0,
            });
        }

        let t;
        if self.tx < self.ty {
            if self.tx > self.max_distance {
                self.done = true;
                return None;
            }
            t = self.tx;
            self.x += self.step_x;
            self.tx += self.idx;
            if let Some(b) = &self.bound {
                if self.x >= b.max.x || self.x < b.min.x {
                    self.done = true;
                    return None;
                }
            }
        } else {
            if self.ty > self.max_distance {
                self.done = true;
                return None;
            }
            t = self.ty;
            self.y += self.step_y;
            self.ty += self.idy;
            if let Some(b) = &self.bound {
                if self.y >= b.max.y || self.y < b.min.y {
                    self.done = true;
                    return None;
                }
            }
        }
        if !t.is_finite() {
            // Zero direction: no further crossings exist.
            self.done = true;
            return None;
        }
        Some(LatticeStep {
            cell: ChunkCoord::new(self.x, self.y),
            distance: t + self.extra_distance,
        })
    }
}
