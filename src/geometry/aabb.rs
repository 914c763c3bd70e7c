//! Axis-aligned bounding boxes in the plane.

use nalgebra::Vector2;

/// A 2D axis-aligned box, stored as its min and max corners.
///
/// Containment and overlap tests are inclusive on all sides; the ray slab
/// test in [`ray_slab`](Aabb::ray_slab) instead treats the box as half-open
/// so that a ray travelling exactly along a face shared by two boxes
/// intersects only one of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Bottom-left corner.
    pub min: Vector2<f64>,
    /// Top-right corner.
    pub max: Vector2<f64>,
}

impl Aabb {
    /// Creates a box from its corners. Callers must supply `min <= max`
    /// componentwise.
    #[must_use]
    pub const fn new(min: Vector2<f64>, max: Vector2<f64>) -> Self {
        Self { min, max }
    }

    /// Creates a box from an origin corner and an extent.
    #[must_use]
    pub fn from_origin_size(origin: Vector2<f64>, size: Vector2<f64>) -> Self {
        Self::new(origin, origin + size)
    }

    /// The tight box around a set of points, or `None` for an empty set.
    #[must_use]
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vector2<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min = min.inf(&p);
            max = max.sup(&p);
        }
        Some(Self::new(min, max))
    }

    /// Extent of the box.
    #[must_use]
    pub fn size(&self) -> Vector2<f64> {
        self.max - self.min
    }

    /// Geometric center of the box.
    #[must_use]
    pub fn center(&self) -> Vector2<f64> {
        (self.min + self.max) / 2.0
    }

    /// The box shifted by `offset`.
    #[must_use]
    pub fn translate(&self, offset: Vector2<f64>) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    /// The smallest box containing both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, point: Vector2<f64>) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Inclusive overlap test (boxes touching along a face overlap).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Slab test: the parameter interval `[t_min, t_max)` over which the ray
    /// `origin + t·direction` lies inside the box, or `None` if it never
    /// does.
    ///
    /// The box is treated as half-open (`[min, max)` per axis): a ray running
    /// exactly along the max face of one box and the min face of its
    /// neighbour is attributed to the neighbour only. A degenerate interval
    /// (`t_min >= t_max`, the ray grazing a corner) is reported as a miss.
    /// `t_min` may be negative when the origin is inside the box.
    #[must_use]
    pub fn ray_slab(&self, origin: Vector2<f64>, direction: Vector2<f64>) -> Option<(f64, f64)> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..2 {
            let o = origin[axis];
            let d = direction[axis];
            let lo = self.min[axis];
            let hi = self.max[axis];
            if d == 0.0 {
                if o < lo || o >= hi {
                    return None;
                }
            } else {
                let (t1, t2) = if d > 0.0 {
                    ((lo - o) / d, (hi - o) / d)
                } else {
                    ((hi - o) / d, (lo - o) / d)
                };
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
            }
        }
        if t_min < t_max {
            Some((t_min, t_max))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box_at(x: f64, y: f64) -> Aabb {
        Aabb::from_origin_size(Vector2::new(x, y), Vector2::new(1.0, 1.0))
    }

    #[test]
    fn from_points_is_tight() {
        let aabb = Aabb::from_points([
            Vector2::new(1.0, 4.0),
            Vector2::new(-2.0, 0.5),
            Vector2::new(3.0, 2.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vector2::new(-2.0, 0.5));
        assert_eq!(aabb.max, Vector2::new(3.0, 4.0));
        assert!(Aabb::from_points([]).is_none());
    }

    #[test]
    fn ray_slab_hits_and_misses() {
        let aabb = unit_box_at(2.0, -0.5);
        let (t_min, t_max) = aabb
            .ray_slab(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0))
            .unwrap();
        assert_relative_eq!(t_min, 2.0);
        assert_relative_eq!(t_max, 3.0);
        assert!(aabb
            .ray_slab(Vector2::new(0.0, 2.0), Vector2::new(1.0, 0.0))
            .is_none());
    }

    #[test]
    fn ray_slab_negative_entry_when_origin_inside() {
        let aabb = unit_box_at(-0.5, -0.5);
        let (t_min, t_max) = aabb
            .ray_slab(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0))
            .unwrap();
        assert_relative_eq!(t_min, -0.5);
        assert_relative_eq!(t_max, 0.5);
    }

    #[test]
    fn ray_slab_is_half_open_on_shared_faces() {
        // A horizontal ray along y = 1.0, the face shared by these two boxes,
        // belongs to the upper box only.
        let lower = unit_box_at(0.0, 0.0);
        let upper = unit_box_at(0.0, 1.0);
        let origin = Vector2::new(-1.0, 1.0);
        let dir = Vector2::new(1.0, 0.0);
        assert!(lower.ray_slab(origin, dir).is_none());
        assert!(upper.ray_slab(origin, dir).is_some());
    }

    #[test]
    fn ray_slab_corner_graze_is_a_miss() {
        let aabb = unit_box_at(1.0, 1.0);
        // Diagonal ray through the corner (1, 1) only.
        let hit = aabb.ray_slab(Vector2::new(0.0, 2.0), Vector2::new(1.0, -1.0));
        assert!(hit.is_none());
    }
}
