//! Grid arrangement.
//!
//! Objects are snapped to a grid whose cell fits the largest object plus a
//! small margin, rounded up to whole centimetres. The grid is shifted so
//! that already placed (fixed) objects cover as few cells as possible,
//! cells touched by fixed objects or disallowed areas are removed, and the
//! remaining cells are filled from the platform centre outward. Objects
//! that do not fit are parked in a column to the right of the platform.
//!
//! Coordinates are scene X (right) and scene Z (front); grid cell `(i, j)`
//! spans `[i, i + 1) x [j, j + 1)` in grid space.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use slicekit_buildvolume::{BuildVolume, MachineShape};
use slicekit_core::{BoundingBox3D, GeometryError, NodeId, Polygon2D, Scene, Vec3};

use crate::error::{ArrangeError, ArrangeResult};
use crate::operation::{OperationBatch, TranslateOperation};

/// Cell sizes are rounded up to a multiple of this (mm)
pub const GRID_PRECISION: f64 = 10.0;

/// Gap added to the largest object on each axis (mm)
pub const DEFAULT_MARGIN: f64 = 1.0;

type Cell = (i64, i64);

/// What the arranger needs to know about the build platform
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    /// Printable box; only X and Z are used.
    pub bounds: BoundingBox3D,
    pub edge_disallowed_size: f32,
    pub disallowed_areas: Vec<Polygon2D>,
    pub shape: MachineShape,
}

impl Platform {
    /// Platform of `width` x `depth` centred on the origin, with no borders
    pub fn new(width: f32, depth: f32, shape: MachineShape) -> Self {
        Self {
            bounds: BoundingBox3D::from_footprint(width, depth, 1.0),
            edge_disallowed_size: 0.0,
            disallowed_areas: Vec::new(),
            shape,
        }
    }

    /// Current state of a built volume
    pub fn from_volume(volume: &BuildVolume) -> ArrangeResult<Self> {
        let bounds = volume.bounding_box().ok_or(ArrangeError::VolumeNotBuilt)?;
        Ok(Self {
            bounds,
            edge_disallowed_size: volume.edge_disallowed_size(),
            disallowed_areas: volume.disallowed_areas().to_vec(),
            shape: volume.shape(),
        })
    }

    pub fn with_edge_disallowed_size(mut self, size: f32) -> Self {
        self.edge_disallowed_size = size;
        self
    }

    pub fn with_disallowed_areas(mut self, areas: Vec<Polygon2D>) -> Self {
        self.disallowed_areas = areas;
        self
    }
}

/// Axis-aligned footprint in (X, Z)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl Rect {
    fn from_box(bbox: &BoundingBox3D) -> Self {
        Self {
            x1: bbox.left() as f64,
            y1: bbox.back() as f64,
            x2: bbox.right() as f64,
            y2: bbox.front() as f64,
        }
    }

    fn from_polygon(polygon: &Polygon2D) -> Option<Self> {
        let (min, max) = polygon.bounds()?;
        Some(Self {
            x1: min.x as f64,
            y1: min.y as f64,
            x2: max.x as f64,
            y2: max.y as f64,
        })
    }

    fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    fn depth(&self) -> f64 {
        self.y2 - self.y1
    }

    fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }
}

/// Scanline event: how far a footprint edge may shift before crossing a
/// grid line, and the weight gained or lost when it does
#[derive(Debug, Clone, Copy)]
struct Event {
    coord: f64,
    change: f64,
}

/// Result of one arrangement pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arrangement {
    /// Translations to apply, as one batch.
    pub batch: OperationBatch,
    /// Objects that got a cell on the platform.
    pub placed: usize,
    /// Objects parked beside the platform.
    pub leftover: usize,
}

impl Arrangement {
    /// `NoEligibleCell` when some objects did not fit
    pub fn error(&self) -> Option<GeometryError> {
        (self.leftover > 0).then_some(GeometryError::NoEligibleCell {
            count: self.leftover,
        })
    }
}

/// Grid arranger for one set of objects
#[derive(Debug, Clone)]
pub struct GridArrange {
    nodes: Vec<(NodeId, Rect)>,
    plate: Rect,
    margin: (f64, f64),
    round_margin: (f64, f64),
    cell: (f64, f64),
    offset: (f64, f64),
    blocked: BTreeSet<Cell>,
    allowed: BTreeSet<Cell>,
    leftover_start: Cell,
}

impl GridArrange {
    /// Prepare the grid for `nodes`, keeping clear of `fixed` nodes and the
    /// platform's disallowed areas
    pub fn new(scene: &Scene, nodes: &[NodeId], platform: &Platform, fixed: &[NodeId]) -> ArrangeResult<Self> {
        let footprint = |id: NodeId| {
            scene
                .bounding_box(id)
                .map(|bbox| (id, Rect::from_box(&bbox)))
                .ok_or(ArrangeError::UnknownNode(id))
        };
        let nodes = nodes.iter().map(|&id| footprint(id)).collect::<ArrangeResult<Vec<_>>>()?;
        let fixed = fixed
            .iter()
            .map(|&id| footprint(id).map(|(_, rect)| rect))
            .collect::<ArrangeResult<Vec<_>>>()?;

        let margin = (DEFAULT_MARGIN, DEFAULT_MARGIN);
        let widest = nodes.iter().map(|(_, r)| r.width()).fold(0.0, f64::max) + margin.0;
        let deepest = nodes.iter().map(|(_, r)| r.depth()).fold(0.0, f64::max) + margin.1;
        let cell = (
            (widest / GRID_PRECISION).ceil() * GRID_PRECISION,
            (deepest / GRID_PRECISION).ceil() * GRID_PRECISION,
        );

        let mut grid = Self {
            nodes,
            plate: Rect::from_box(&platform.bounds),
            margin,
            round_margin: (cell.0 - widest, cell.1 - deepest),
            cell,
            offset: (0.0, 0.0),
            blocked: BTreeSet::new(),
            allowed: BTreeSet::new(),
            leftover_start: (0, 0),
        };
        grid.offset = grid.optimal_offset(platform, &fixed);

        let (lx, ly) = grid.to_grid(
            grid.plate.x2 + 2.0 * grid.cell.0,
            (grid.plate.y1 + grid.plate.y2) * 0.5,
        );
        grid.leftover_start = (lx.floor() as i64, ly.floor() as i64);

        let mut blocked = BTreeSet::new();
        for rect in &fixed {
            blocked.extend(grid.cells_inclusive(rect));
        }
        for rect in platform.disallowed_areas.iter().filter_map(Rect::from_polygon) {
            blocked.extend(grid.cells_inclusive(&rect));
        }

        let mut plate_cells = grid.cells_exclusive(&grid.plate);
        if platform.shape == MachineShape::Elliptic {
            plate_cells.retain(|&cell| grid.cell_under_disc(cell));
        }
        grid.allowed = plate_cells.difference(&blocked).copied().collect();
        grid.blocked = blocked;

        tracing::debug!(
            "Arrange grid {}x{} mm, offset ({:.2}, {:.2}), {} free cells for {} objects",
            grid.cell.0,
            grid.cell.1,
            grid.offset.0,
            grid.offset.1,
            grid.allowed.len(),
            grid.nodes.len()
        );
        Ok(grid)
    }

    /// Cell size (X, Z) in mm
    pub fn cell_size(&self) -> (f64, f64) {
        self.cell
    }

    /// Grid shift relative to the platform's minimum corner
    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    /// Number of cells objects may be placed in
    pub fn free_cells(&self) -> usize {
        self.allowed.len()
    }

    /// Build the translation batch
    pub fn arrange(&self) -> Arrangement {
        let (cx, cy) = self.to_grid(
            (self.plate.x1 + self.plate.x2) * 0.5,
            (self.plate.y1 + self.plate.y2) * 0.5,
        );
        // Measured to the cell's index corner, so on an even grid the cell
        // just past the centre wins.
        let distance = |&(i, j): &Cell| {
            let dx = cx - i as f64;
            let dy = cy - j as f64;
            dx * dx + dy * dy
        };
        let mut sequence: Vec<Cell> = self.allowed.iter().copied().collect();
        sequence.sort_by(|a, b| {
            distance(a)
                .partial_cmp(&distance(b))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        });

        let mut batch = OperationBatch::new("Arrange objects");
        for (&cell, (id, rect)) in sequence.iter().zip(&self.nodes) {
            batch.push(self.move_to_cell(*id, rect, cell));
        }

        let placed = sequence.len().min(self.nodes.len());
        let (lx, mut ly) = self.leftover_start;
        for (id, rect) in &self.nodes[placed..] {
            while self.blocked.contains(&(lx, ly)) {
                ly -= 1;
            }
            batch.push(self.move_to_cell(*id, rect, (lx, ly)));
            ly -= 1;
        }

        let leftover = self.nodes.len() - placed;
        if leftover > 0 {
            tracing::warn!("{} object(s) did not fit on the build plate", leftover);
        }
        Arrangement {
            batch,
            placed,
            leftover,
        }
    }

    fn move_to_cell(&self, id: NodeId, rect: &Rect, (i, j): Cell) -> TranslateOperation {
        let (x, y) = self.to_coord(i as f64 + 0.5, j as f64 + 0.5);
        let (rx, ry) = rect.center();
        TranslateOperation::new(id, Vec3::new((x - rx) as f32, 0.0, (y - ry) as f32))
    }

    fn optimal_offset(&self, platform: &Platform, fixed: &[Rect]) -> (f64, f64) {
        match fixed {
            [] => {
                let edge = platform.edge_disallowed_size as f64;
                (edge, edge)
            }
            [only] => {
                let (nx, ny) = only.center();
                (
                    nx - (0.5 * self.cell.0 + self.plate.x1),
                    ny - (0.5 * self.cell.1 + self.plate.y1),
                )
            }
            many => {
                let mut horizontal = Vec::with_capacity(many.len() * 2);
                let mut vertical = Vec::with_capacity(many.len() * 2);
                let slack = |v: f64, size: f64| (v / size).ceil() * size - v;
                for rect in many {
                    let weight = rect.width() + rect.depth();
                    let (w, d) = self.cell;
                    horizontal.push(Event { coord: slack(rect.x1 - self.plate.x1, w), change: weight });
                    horizontal.push(Event { coord: slack(rect.x2 - self.plate.x1, w), change: -weight });
                    vertical.push(Event { coord: slack(rect.y1 - self.plate.y1, d), change: weight });
                    vertical.push(Event { coord: slack(rect.y2 - self.plate.y1, d), change: -weight });
                }
                let center_x = self.cell.0 - optimal_shift(&mut horizontal, self.cell.0);
                let center_y = self.cell.1 - optimal_shift(&mut vertical, self.cell.1);
                (center_x - 0.5 * self.cell.0, center_y - 0.5 * self.cell.1)
            }
        }
    }

    /// Cells touched by `rect` after shrinking it by half the margins
    fn cells_inclusive(&self, rect: &Rect) -> Vec<Cell> {
        let (hx, hy) = self.half_margins();
        let (x1, y1) = self.to_grid(rect.x1 + hx, rect.y1 + hy);
        let (x2, y2) = self.to_grid(rect.x2 - hx, rect.y2 - hy);
        cell_range(x1.floor(), x2.ceil(), y1.floor(), y2.ceil())
    }

    /// Cells lying inside `rect` grown by half the margins
    fn cells_exclusive(&self, rect: &Rect) -> BTreeSet<Cell> {
        let (hx, hy) = self.half_margins();
        let (x1, y1) = self.to_grid(rect.x1 - hx, rect.y1 - hy);
        let (x2, y2) = self.to_grid(rect.x2 + hx, rect.y2 + hy);
        cell_range(x1.ceil(), x2.floor(), y1.ceil(), y2.floor())
            .into_iter()
            .collect()
    }

    fn half_margins(&self) -> (f64, f64) {
        (
            (self.margin.0 + self.round_margin.0) * 0.5,
            (self.margin.1 + self.round_margin.1) * 0.5,
        )
    }

    fn to_grid(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.plate.x1 - self.offset.0) / self.cell.0,
            (y - self.plate.y1 - self.offset.1) / self.cell.1,
        )
    }

    fn to_coord(&self, i: f64, j: f64) -> (f64, f64) {
        (
            i * self.cell.0 + self.plate.x1 + self.offset.0,
            j * self.cell.1 + self.plate.y1 + self.offset.1,
        )
    }

    /// All four corners inside the ellipse inscribed in the plate
    fn cell_under_disc(&self, (i, j): Cell) -> bool {
        let (left, back) = self.to_coord(i as f64, j as f64);
        let (right, front) = self.to_coord(i as f64 + 1.0, j as f64 + 1.0);
        let (w, d) = (self.plate.width(), self.plate.depth());
        [(left, back), (right, back), (right, front), (left, front)]
            .into_iter()
            .all(|(x, y)| {
                let dx = (x - self.plate.x1) / w * 2.0 - 1.0;
                let dy = (y - self.plate.y1) / d * 2.0 - 1.0;
                dx * dx + dy * dy <= 1.0
            })
    }
}

fn cell_range(x1: f64, x2: f64, y1: f64, y2: f64) -> Vec<Cell> {
    let (x1, x2, y1, y2) = (x1 as i64, x2 as i64, y1 as i64, y2 as i64);
    (x1..x2).flat_map(|i| (y1..y2).map(move |j| (i, j))).collect()
}

/// Shift along one axis that leaves the fewest footprints crossing a grid
/// line, preferring the widest run of such shifts; returns its midpoint
fn optimal_shift(events: &mut [Event], interval: f64) -> f64 {
    events.sort_by(|a, b| a.coord.partial_cmp(&b.coord).unwrap_or(Ordering::Equal));
    let Some(last) = events.last() else {
        return 0.0;
    };

    let mut previous = last.coord - interval;
    let mut current = 0.0;
    let mut best_count = f64::INFINITY;
    let mut best_span = f64::NEG_INFINITY;
    let mut best_offset = 0.0;

    for event in events.iter() {
        let span = event.coord - previous;
        if current < best_count || (current == best_count && span > best_span) {
            best_count = current;
            best_span = span;
            best_offset = event.coord;
        }
        current += event.change;
        previous = event.coord;
    }

    best_offset - best_span * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(scene: &mut Scene, size: f32, x: f32, z: f32) -> NodeId {
        let id = scene.add_object("cube", BoundingBox3D::from_footprint(size, size, size));
        scene.translate(id, Vec3::new(x, 0.0, z));
        id
    }

    fn square() -> Platform {
        Platform::new(200.0, 200.0, MachineShape::Rectangular)
    }

    #[test]
    fn test_cell_size_rounds_up() {
        let mut scene = Scene::new();
        let a = cube(&mut scene, 40.0, 0.0, 0.0);
        let b = cube(&mut scene, 12.0, 0.0, 0.0);
        let grid = GridArrange::new(&scene, &[a, b], &square(), &[]).expect("grid");
        assert_eq!(grid.cell_size(), (50.0, 50.0));
        assert_eq!(grid.free_cells(), 16);
    }

    #[test]
    fn test_offset_without_fixed_nodes_is_edge_size() {
        let mut scene = Scene::new();
        let a = cube(&mut scene, 40.0, 0.0, 0.0);
        let platform = square().with_edge_disallowed_size(3.0);
        let grid = GridArrange::new(&scene, &[a], &platform, &[]).expect("grid");
        assert_eq!(grid.offset(), (3.0, 3.0));
    }

    #[test]
    fn test_single_fixed_node_is_cell_centred() {
        let mut scene = Scene::new();
        let fixed = cube(&mut scene, 40.0, 50.0, 50.0);
        let grid = GridArrange::new(&scene, &[], &square(), &[fixed]).expect("grid");
        assert_eq!(grid.cell_size(), (10.0, 10.0));
        assert_eq!(grid.offset(), (145.0, 145.0));
        let (gx, gy) = grid.to_grid(50.0, 50.0);
        assert!((gx.rem_euclid(1.0) - 0.5).abs() < 1e-9);
        assert!((gy.rem_euclid(1.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_optimal_shift_prefers_widest_gap() {
        // Edges 2 mm and 6 mm before the next grid line on a 10 mm grid.
        // Shifts in (-4, 2] keep the footprint minimal; midpoint -1.
        let mut events = vec![
            Event { coord: 6.0, change: -1.0 },
            Event { coord: 2.0, change: 1.0 },
        ];
        assert!((optimal_shift(&mut events, 10.0) + 1.0).abs() < 1e-9);
        assert_eq!(optimal_shift(&mut [], 10.0), 0.0);
    }

    #[test]
    fn test_disallowed_area_blocks_cells() {
        let mut scene = Scene::new();
        let a = cube(&mut scene, 40.0, 0.0, 0.0);
        let centre = Polygon2D::rectangle(-50.0, -50.0, 50.0, 50.0);
        let platform = square().with_disallowed_areas(vec![centre]);
        let grid = GridArrange::new(&scene, &[a], &platform, &[]).expect("grid");
        assert_eq!(grid.free_cells(), 12);
    }

    #[test]
    fn test_elliptic_drops_corner_cells() {
        let mut scene = Scene::new();
        let a = cube(&mut scene, 40.0, 0.0, 0.0);
        let platform = Platform::new(200.0, 200.0, MachineShape::Elliptic);
        let grid = GridArrange::new(&scene, &[a], &platform, &[]).expect("grid");
        assert_eq!(grid.free_cells(), 4);
    }

    #[test]
    fn test_fill_order_starts_past_the_centre() {
        let mut scene = Scene::new();
        let ids: Vec<NodeId> = (0..4).map(|_| cube(&mut scene, 40.0, 0.0, 0.0)).collect();
        let grid = GridArrange::new(&scene, &ids, &square(), &[]).expect("grid");
        let arrangement = grid.arrange();
        arrangement.batch.apply(&mut scene).expect("apply");

        // Centre is grid point (2, 2). Cell (2, 2) comes first, then the
        // cells at distance 1 in index order.
        let centres: Vec<(i32, i32)> = ids
            .iter()
            .map(|&id| {
                let c = scene.bounding_box(id).expect("node").center();
                (c.x.round() as i32, c.z.round() as i32)
            })
            .collect();
        assert_eq!(centres, vec![(25, 25), (-25, 25), (25, -25), (25, 75)]);
    }

    #[test]
    fn test_unknown_node() {
        let scene = Scene::new();
        assert!(matches!(
            GridArrange::new(&scene, &[NodeId(3)], &square(), &[]),
            Err(ArrangeError::UnknownNode(NodeId(3)))
        ));
    }
}
