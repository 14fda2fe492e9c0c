//! Ownership of wall segments and per-vehicle trail positions.
//!
//! Every insertion into or removal from the global segment list goes through
//! [`TrailStore`], which keeps the [`SpatialIndex`] in step with it.

use crate::spatial_index::{SegmentId, SpatialIndex, WallSegment};
use shared::{GridPoint, VehicleId};
use std::collections::{HashMap, VecDeque};

pub struct TrailStore {
    index: SpatialIndex,
    /// All live segments, oldest first.
    segments: VecDeque<WallSegment>,
    /// Rendered position history per vehicle, bounded by `max_trail_length`.
    positions: HashMap<VehicleId, VecDeque<GridPoint>>,
    latest: HashMap<VehicleId, SegmentId>,
    max_trail_length: usize,
    next_sequence: u64,
}

impl TrailStore {
    pub fn new(cell_size: f32, max_trail_length: usize) -> Self {
        Self {
            index: SpatialIndex::new(cell_size),
            segments: VecDeque::new(),
            positions: HashMap::new(),
            latest: HashMap::new(),
            max_trail_length,
            next_sequence: 1,
        }
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Starts a fresh position list for a vehicle placed at `start`.
    pub fn begin(&mut self, owner: VehicleId, start: GridPoint) {
        let mut trail = VecDeque::with_capacity(self.max_trail_length.min(64));
        trail.push_back(start);
        self.positions.insert(owner, trail);
    }

    /// Lays a wall from `from` to `to` and records `to` in the owner's trail.
    pub fn append(&mut self, owner: VehicleId, from: GridPoint, to: GridPoint) -> WallSegment {
        let segment = WallSegment {
            id: SegmentId(self.next_sequence),
            owner,
            from,
            to,
        };
        self.next_sequence += 1;

        self.index.insert(segment);
        self.segments.push_back(segment);
        self.latest.insert(owner, segment.id);

        let trail = self.positions.entry(owner).or_default();
        trail.push_back(to);
        while trail.len() > self.max_trail_length {
            trail.pop_front();
        }

        segment
    }

    /// Pops the globally oldest segments while more than
    /// `max_trail_length * vehicle_count` are alive.
    pub fn evict_oldest_if_over_limit(&mut self, vehicle_count: usize) -> Vec<WallSegment> {
        let cap = self.max_trail_length.saturating_mul(vehicle_count.max(1));
        let mut evicted = Vec::new();

        while self.segments.len() > cap {
            let Some(oldest) = self.segments.pop_front() else {
                break;
            };
            self.index.remove(oldest.id);
            if self.latest.get(&oldest.owner) == Some(&oldest.id) {
                self.latest.remove(&oldest.owner);
            }
            evicted.push(oldest);
        }

        evicted
    }

    /// Removes every segment and trail position belonging to `owner`.
    pub fn clear_owner(&mut self, owner: VehicleId) -> usize {
        let removed = self.index.clear_owner(owner);
        self.segments.retain(|s| s.owner != owner);
        self.latest.remove(&owner);
        if let Some(trail) = self.positions.get_mut(&owner) {
            trail.clear();
        }
        removed
    }

    /// Forgets a departed vehicle entirely.
    pub fn remove_owner(&mut self, owner: VehicleId) -> usize {
        let removed = self.clear_owner(owner);
        self.positions.remove(&owner);
        removed
    }

    /// The owner's most recently created segment still alive.
    pub fn latest_segment(&self, owner: VehicleId) -> Option<SegmentId> {
        self.latest.get(&owner).copied()
    }

    pub fn trail(&self, owner: VehicleId) -> Vec<GridPoint> {
        self.positions
            .get(&owner)
            .map(|trail| trail.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn trail_len(&self, owner: VehicleId) -> usize {
        self.positions.get(&owner).map_or(0, VecDeque::len)
    }

    pub fn segments(&self) -> impl Iterator<Item = &WallSegment> {
        self.segments.iter()
    }

    pub fn segments_of(&self, owner: VehicleId) -> impl Iterator<Item = &WallSegment> {
        self.segments.iter().filter(move |s| s.owner == owner)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn max_trail_length(&self) -> usize {
        self.max_trail_length
    }
}
