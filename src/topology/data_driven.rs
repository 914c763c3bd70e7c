//! Table-driven fundamental-domain topology.
//!
//! [`DataDrivenTopology`] implements [`DomainTopology`] from data the caller
//! supplies directly: one polygon per cell, an explicit in-domain move table
//! and an explicit boundary half-edge list. It performs no mesh analysis;
//! pairing interior edges and extracting the boundary belong to whatever
//! produced the tables. What it does provide is the geometric query side of
//! the contract: point-in-polygon location, polygon-entry raycasting and
//! bounding-box enumeration.

use crate::core::cell::{CellDir, CellRotation, Connection};
use crate::core::collections::{FastHashMap, SmallBuffer, INLINE_DIRS};
use crate::geometry::aabb::Aabb;
use crate::geometry::raycast::RaycastHit;
use crate::topology::domain::{BoundaryEdge, DomainTopology, Move};
use nalgebra::{Matrix3, Vector2};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

new_key_type! {
    /// Stable key for a cell of a [`DataDrivenTopology`].
    pub struct DomainCellKey;
}

/// Tolerance below which a ray and a polygon edge are treated as parallel.
const PARALLEL_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Debug)]
struct CellData {
    polygon: Vec<Vector2<f64>>,
    center: Vector2<f64>,
    aabb: Aabb,
}

/// A fundamental domain described by explicit tables.
///
/// # Examples
///
/// ```rust
/// use nalgebra::Vector2;
/// use tessella::core::cell::CellDir;
/// use tessella::topology::data_driven::DataDrivenTopology;
/// use tessella::topology::domain::DomainTopology;
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
/// assert_eq!(domain.cell_count(), 1);
/// assert_eq!(domain.find_cell(Vector2::new(0.2, -0.1)), Some(cell));
/// assert_eq!(domain.boundary_edges().len(), 4);
/// ```
#[derive(Clone, Debug, Default)]
pub struct DataDrivenTopology {
    cells: SlotMap<DomainCellKey, CellData>,
    order: Vec<DomainCellKey>,
    indices: SecondaryMap<DomainCellKey, usize>,
    moves: FastHashMap<(DomainCellKey, CellDir), Move<DomainCellKey>>,
    boundary: Vec<BoundaryEdge<DomainCellKey>>,
    footprint: Option<Aabb>,
}

impl DataDrivenTopology {
    /// Creates an empty domain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell with the given simple polygon (at least three vertices,
    /// in consistent winding order) and returns its key.
    ///
    /// # Panics
    ///
    /// Panics when the polygon has fewer than three vertices.
    pub fn add_cell(&mut self, polygon: Vec<Vector2<f64>>) -> DomainCellKey {
        assert!(polygon.len() >= 3, "cell polygons need at least 3 vertices");
        let aabb = Aabb::from_points(polygon.iter().copied())
            .unwrap_or(Aabb::new(Vector2::zeros(), Vector2::zeros()));
        #[allow(clippy::cast_precision_loss)]
        let center = polygon.iter().copied().sum::<Vector2<f64>>() / polygon.len() as f64;
        let key = self.cells.insert(CellData {
            polygon,
            center,
            aabb,
        });
        self.indices.insert(key, self.order.len());
        self.order.push(key);
        self.footprint = Some(match self.footprint {
            Some(fp) => fp.union(&aabb),
            None => aabb,
        });
        key
    }

    /// Records an in-domain adjacency in both directions: leaving `from`
    /// through `from_dir` arrives in `to` through `to_dir`, and vice versa.
    pub fn link(
        &mut self,
        from: DomainCellKey,
        from_dir: CellDir,
        to: DomainCellKey,
        to_dir: CellDir,
        connection: Connection,
    ) {
        self.moves.insert(
            (from, from_dir),
            Move {
                dest: to,
                inverse_dir: to_dir,
                connection,
            },
        );
        self.moves.insert(
            (to, to_dir),
            Move {
                dest: from,
                inverse_dir: from_dir,
                connection: connection.inverse(),
            },
        );
    }

    /// Declares `(cell, dir)` an unmatched boundary half-edge running
    /// `a -> b` in the cell's winding order.
    pub fn add_boundary_edge(
        &mut self,
        cell: DomainCellKey,
        dir: CellDir,
        a: Vector2<f64>,
        b: Vector2<f64>,
    ) {
        self.boundary.push(BoundaryEdge { a, b, cell, dir });
    }

    fn data(&self, cell: DomainCellKey) -> Option<&CellData> {
        self.cells.get(cell)
    }
}

/// Even-odd point-in-polygon test. Points exactly on an edge resolve to one
/// side or the other depending on the edge's orientation.
fn polygon_contains(polygon: &[Vector2<f64>], point: Vector2<f64>) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let t = (point.y - a.y) / (b.y - a.y);
            if point.x < a.x + t * (b.x - a.x) {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Where the ray first enters the polygon: `(t, entered side)`, with
/// `(0, None)` when the origin already lies inside. `None` when the ray
/// misses entirely.
fn polygon_entry(
    polygon: &[Vector2<f64>],
    origin: Vector2<f64>,
    direction: Vector2<f64>,
) -> Option<(f64, Option<CellDir>)> {
    if polygon_contains(polygon, origin) {
        return Some((0.0, None));
    }
    let mut best: Option<(f64, usize)> = None;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let edge = b - a;
        let denom = direction.perp(&edge);
        if denom.abs() < PARALLEL_TOLERANCE {
            continue;
        }
        let ao = a - origin;
        let t = ao.perp(&edge) / denom;
        let s = ao.perp(&direction) / denom;
        if t >= 0.0 && (0.0..=1.0).contains(&s) && best.is_none_or(|(bt, _)| t < bt) {
            best = Some((t, i));
        }
    }
    #[allow(clippy::cast_possible_truncation)]
    best.map(|(t, i)| (t, Some(CellDir::new(i as u16))))
}

impl DomainTopology for DataDrivenTopology {
    type Cell = DomainCellKey;

    fn cell_count(&self) -> usize {
        self.order.len()
    }

    fn cells(&self) -> Box<dyn Iterator<Item = DomainCellKey> + '_> {
        Box::new(self.order.iter().copied())
    }

    fn contains(&self, cell: DomainCellKey) -> bool {
        self.cells.contains_key(cell)
    }

    fn directions(&self, cell: DomainCellKey) -> SmallBuffer<CellDir, INLINE_DIRS> {
        match self.data(cell) {
            #[allow(clippy::cast_possible_truncation)]
            Some(data) => (0..data.polygon.len() as u16).map(CellDir::new).collect(),
            None => SmallBuffer::new(),
        }
    }

    fn try_move(&self, cell: DomainCellKey, dir: CellDir) -> Option<Move<DomainCellKey>> {
        self.moves.get(&(cell, dir)).copied()
    }

    fn find_cell(&self, point: Vector2<f64>) -> Option<DomainCellKey> {
        self.order.iter().copied().find(|&key| {
            let data = &self.cells[key];
            data.aabb.contains(point) && polygon_contains(&data.polygon, point)
        })
    }

    fn cells_intersecting(
        &self,
        min: Vector2<f64>,
        max: Vector2<f64>,
    ) -> Box<dyn Iterator<Item = DomainCellKey> + '_> {
        let query = Aabb::new(min, max);
        Box::new(
            self.order
                .iter()
                .copied()
                .filter(move |&key| self.cells[key].aabb.intersects(&query)),
        )
    }

    fn index(&self, cell: DomainCellKey) -> Option<usize> {
        self.indices.get(cell).copied()
    }

    fn cell_by_index(&self, index: usize) -> Option<DomainCellKey> {
        self.order.get(index).copied()
    }

    fn boundary_edges(&self) -> &[BoundaryEdge<DomainCellKey>] {
        &self.boundary
    }

    fn raycast(
        &self,
        origin: Vector2<f64>,
        direction: Vector2<f64>,
        max_distance: f64,
    ) -> Box<dyn Iterator<Item = RaycastHit<DomainCellKey>> + '_> {
        let mut hits: Vec<RaycastHit<DomainCellKey>> = Vec::new();
        for &key in &self.order {
            let data = &self.cells[key];
            if let Some((t, dir)) = polygon_entry(&data.polygon, origin, direction) {
                if t <= max_distance {
                    hits.push(RaycastHit {
                        cell: key,
                        point: origin + direction * t,
                        dir,
                        distance: t,
                    });
                }
            }
        }
        hits.sort_by(|x, y| x.distance.total_cmp(&y.distance));
        Box::new(hits.into_iter())
    }

    fn cell_center(&self, cell: DomainCellKey) -> Vector2<f64> {
        self.data(cell).map_or_else(Vector2::zeros, |d| d.center)
    }

    fn deformation(&self, cell: DomainCellKey) -> Matrix3<f64> {
        self.data(cell)
            .map_or_else(Matrix3::identity, |d| Matrix3::new_translation(&d.center))
    }

    fn footprint(&self) -> Aabb {
        self.footprint
            .unwrap_or(Aabb::new(Vector2::zeros(), Vector2::zeros()))
    }

    fn find_cell_in_frame(&self, frame: &Matrix3<f64>) -> Option<(DomainCellKey, CellRotation)> {
        // Rotation recovery needs a cell-type algebra this domain does not
        // carry; report the identity for any frame whose anchor lands in a
        // cell.
        let position = Vector2::new(frame[(0, 2)], frame[(1, 2)]);
        self.find_cell(position).map(|c| (c, CellRotation::IDENTITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(center: Vector2<f64>, half: f64) -> Vec<Vector2<f64>> {
        vec![
            center + Vector2::new(-half, -half),
            center + Vector2::new(half, -half),
            center + Vector2::new(half, half),
            center + Vector2::new(-half, half),
        ]
    }

    fn two_cell_domain() -> (DataDrivenTopology, DomainCellKey, DomainCellKey) {
        let mut domain = DataDrivenTopology::new();
        let a = domain.add_cell(square(Vector2::new(-0.5, 0.0), 0.5));
        let b = domain.add_cell(square(Vector2::new(0.5, 0.0), 0.5));
        // Right side of a (dir 1) meets left side of b (dir 3).
        domain.link(a, CellDir::new(1), b, CellDir::new(3), Connection::IDENTITY);
        (domain, a, b)
    }

    #[test]
    fn point_location_picks_the_containing_cell() {
        let (domain, a, b) = two_cell_domain();
        assert_eq!(domain.find_cell(Vector2::new(-0.7, 0.2)), Some(a));
        assert_eq!(domain.find_cell(Vector2::new(0.9, -0.3)), Some(b));
        assert_eq!(domain.find_cell(Vector2::new(0.0, 2.0)), None);
    }

    #[test]
    fn moves_are_symmetric() {
        let (domain, a, b) = two_cell_domain();
        let m = domain.try_move(a, CellDir::new(1)).unwrap();
        assert_eq!(m.dest, b);
        let back = domain.try_move(m.dest, m.inverse_dir).unwrap();
        assert_eq!(back.dest, a);
        assert_eq!(back.inverse_dir, CellDir::new(1));
        assert!(domain.try_move(a, CellDir::new(0)).is_none());
    }

    #[test]
    fn index_round_trips() {
        let (domain, a, b) = two_cell_domain();
        assert_eq!(domain.cell_count(), 2);
        for cell in [a, b] {
            let i = domain.index(cell).unwrap();
            assert_eq!(domain.cell_by_index(i), Some(cell));
        }
        assert_eq!(domain.cell_by_index(2), None);
    }

    #[test]
    fn raycast_enters_cells_in_order() {
        let (domain, a, b) = two_cell_domain();
        let hits: Vec<_> = domain
            .raycast(Vector2::new(-2.0, 0.1), Vector2::new(1.0, 0.0), 10.0)
            .collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].cell, a);
        assert_relative_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[0].dir, Some(CellDir::new(3)));
        assert_eq!(hits[1].cell, b);
        assert_relative_eq!(hits[1].distance, 2.0);
    }

    #[test]
    fn raycast_from_inside_reports_distance_zero() {
        let (domain, a, _) = two_cell_domain();
        let first = domain
            .raycast(Vector2::new(-0.5, 0.0), Vector2::new(1.0, 0.0), 10.0)
            .next()
            .unwrap();
        assert_eq!(first.cell, a);
        assert_relative_eq!(first.distance, 0.0);
        assert_eq!(first.dir, None);
    }

    #[test]
    fn footprint_covers_all_cells() {
        let (domain, _, _) = two_cell_domain();
        let fp = domain.footprint();
        assert_eq!(fp.min, Vector2::new(-1.0, -0.5));
        assert_eq!(fp.max, Vector2::new(1.0, 0.5));
    }

    #[test]
    fn cells_intersecting_filters_by_extent() {
        let (domain, a, b) = two_cell_domain();
        let hits: Vec<_> = domain
            .cells_intersecting(Vector2::new(-0.9, -0.1), Vector2::new(-0.2, 0.1))
            .collect();
        assert_eq!(hits, vec![a]);
        let all: Vec<_> = domain
            .cells_intersecting(Vector2::new(-2.0, -2.0), Vector2::new(2.0, 2.0))
            .collect();
        assert_eq!(all, vec![a, b]);
    }
}
