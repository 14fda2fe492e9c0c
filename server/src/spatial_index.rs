//! Uniform grid over the arena plane mapping wall segments to the cells
//! their endpoints fall into.
//!
//! Only endpoint cells are registered. Segments are one grid unit long, so
//! any segment a point can touch has an endpoint in the point's cell or one
//! of its eight neighbours, which is exactly the block [`SpatialIndex::nearby`]
//! scans.

use shared::{GridPoint, SegmentInfo, VehicleId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Creation sequence number of a wall segment, unique per server run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub u64);

/// Immutable wall laid down between two adjacent grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallSegment {
    pub id: SegmentId,
    pub owner: VehicleId,
    pub from: GridPoint,
    pub to: GridPoint,
}

impl WallSegment {
    /// Axis-aligned bounds `(min_x, min_z, max_x, max_z)` grown by `padding`.
    pub fn padded_bounds(&self, padding: f32) -> (f32, f32, f32, f32) {
        let min_x = self.from.x.min(self.to.x) as f32 - padding;
        let max_x = self.from.x.max(self.to.x) as f32 + padding;
        let min_z = self.from.z.min(self.to.z) as f32 - padding;
        let max_z = self.from.z.max(self.to.z) as f32 + padding;
        (min_x, min_z, max_x, max_z)
    }

    pub fn contains_padded(&self, x: f32, z: f32, padding: f32) -> bool {
        let (min_x, min_z, max_x, max_z) = self.padded_bounds(padding);
        x >= min_x && x <= max_x && z >= min_z && z <= max_z
    }

    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            id: self.id.0,
            owner: self.owner,
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub col: i32,
    pub row: i32,
}

pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellKey, HashSet<SegmentId>>,
    segments: HashMap<SegmentId, WallSegment>,
    /// Side table of the cells each indexed segment was registered under.
    placements: HashMap<SegmentId, Vec<CellKey>>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            segments: HashMap::new(),
            placements: HashMap::new(),
        }
    }

    pub fn cell_key(&self, x: f32, z: f32) -> CellKey {
        CellKey {
            col: (x / self.cell_size).floor() as i32,
            row: (z / self.cell_size).floor() as i32,
        }
    }

    fn point_key(&self, point: GridPoint) -> CellKey {
        self.cell_key(point.x as f32, point.z as f32)
    }

    /// Cells a segment is registered under: one, or two when its endpoints
    /// straddle a cell border.
    pub fn cells_for(&self, segment: &WallSegment) -> Vec<CellKey> {
        let from = self.point_key(segment.from);
        let to = self.point_key(segment.to);
        if from == to {
            vec![from]
        } else {
            vec![from, to]
        }
    }

    pub fn insert(&mut self, segment: WallSegment) {
        if self.segments.contains_key(&segment.id) {
            return;
        }

        let keys = self.cells_for(&segment);
        for key in &keys {
            self.cells.entry(*key).or_default().insert(segment.id);
        }
        self.placements.insert(segment.id, keys);
        self.segments.insert(segment.id, segment);
    }

    /// Removes a segment from every cell it was registered under. Returns
    /// false when the segment was not indexed.
    pub fn remove(&mut self, id: SegmentId) -> bool {
        let Some(keys) = self.placements.remove(&id) else {
            return false;
        };
        self.segments.remove(&id);

        for key in keys {
            if let Some(cell) = self.cells.get_mut(&key) {
                cell.remove(&id);
                if cell.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
        true
    }

    /// Segments with an endpoint in the 3x3 block of cells around `(x, z)`,
    /// oldest first.
    pub fn nearby(&self, x: f32, z: f32) -> Vec<WallSegment> {
        let center = self.cell_key(x, z);
        let mut found = BTreeSet::new();

        for d_row in -1..=1 {
            for d_col in -1..=1 {
                let key = CellKey {
                    col: center.col + d_col,
                    row: center.row + d_row,
                };
                if let Some(cell) = self.cells.get(&key) {
                    found.extend(cell.iter().copied());
                }
            }
        }

        found
            .into_iter()
            .filter_map(|id| self.segments.get(&id).copied())
            .collect()
    }

    /// Drops every segment owned by `owner`. Scans all occupied cells, so
    /// this belongs on death and removal paths rather than the tick path.
    pub fn clear_owner(&mut self, owner: VehicleId) -> usize {
        let segments = &self.segments;
        let mut removed = HashSet::new();

        self.cells.retain(|_, cell| {
            cell.retain(|id| {
                let owned = segments.get(id).is_some_and(|s| s.owner == owner);
                if owned {
                    removed.insert(*id);
                }
                !owned
            });
            !cell.is_empty()
        });

        for id in &removed {
            self.segments.remove(id);
            self.placements.remove(id);
        }
        removed.len()
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.segments.contains_key(&id)
    }

    /// Cells the segment is currently registered under.
    pub fn placement(&self, id: SegmentId) -> Option<&[CellKey]> {
        self.placements.get(&id).map(Vec::as_slice)
    }

    pub fn cell_contains(&self, key: CellKey, id: SegmentId) -> bool {
        self.cells.get(&key).is_some_and(|cell| cell.contains(&id))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}
