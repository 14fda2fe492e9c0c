//! Decides whether a candidate grid cell is lethal and whose wall it hit.

use crate::spatial_index::{SegmentId, SpatialIndex};
use shared::{GridPoint, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionOutcome {
    Clear,
    /// Left the arena.
    Boundary,
    Wall {
        owner: VehicleId,
        segment: SegmentId,
    },
}

impl CollisionOutcome {
    pub fn collided(&self) -> bool {
        !matches!(self, CollisionOutcome::Clear)
    }

    pub fn attributed_to(&self) -> Option<VehicleId> {
        match self {
            CollisionOutcome::Wall { owner, .. } => Some(*owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollisionResolver {
    arena_half_size: i32,
    half_thickness: f32,
}

impl CollisionResolver {
    pub fn new(arena_half_size: i32, wall_thickness: f32) -> Self {
        Self {
            arena_half_size,
            half_thickness: wall_thickness / 2.0,
        }
    }

    /// Checks `next` for `vehicle`, whose own newest segment is
    /// `own_latest`. That one segment is skipped; older segments of the same
    /// vehicle are lethal like anyone else's.
    pub fn check(
        &self,
        index: &SpatialIndex,
        vehicle: VehicleId,
        own_latest: Option<SegmentId>,
        next: GridPoint,
    ) -> CollisionOutcome {
        self.check_point(index, vehicle, own_latest, next.x as f32, next.z as f32)
    }

    /// Same test for an arbitrary point on the arena plane.
    pub fn check_point(
        &self,
        index: &SpatialIndex,
        vehicle: VehicleId,
        own_latest: Option<SegmentId>,
        x: f32,
        z: f32,
    ) -> CollisionOutcome {
        let half = self.arena_half_size as f32;
        if x.abs() > half || z.abs() > half {
            return CollisionOutcome::Boundary;
        }

        for segment in index.nearby(x, z) {
            if segment.owner == vehicle && Some(segment.id) == own_latest {
                continue;
            }
            if segment.contains_padded(x, z, self.half_thickness) {
                return CollisionOutcome::Wall {
                    owner: segment.owner,
                    segment: segment.id,
                };
            }
        }

        CollisionOutcome::Clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_index::WallSegment;

    fn wall(id: u64, owner: VehicleId, from: (i32, i32), to: (i32, i32)) -> WallSegment {
        WallSegment {
            id: SegmentId(id),
            owner,
            from: GridPoint::new(from.0, from.1),
            to: GridPoint::new(to.0, to.1),
        }
    }

    fn resolver() -> CollisionResolver {
        CollisionResolver::new(100, 0.2)
    }

    #[test]
    fn test_empty_index_is_clear() {
        let index = SpatialIndex::new(10.0);
        let outcome = resolver().check(&index, 1, None, GridPoint::new(3, 3));
        assert_eq!(outcome, CollisionOutcome::Clear);
        assert!(!outcome.collided());
    }

    #[test]
    fn test_boundary_has_no_attribution() {
        let index = SpatialIndex::new(10.0);
        let outcome = resolver().check(&index, 1, None, GridPoint::new(101, 0));
        assert_eq!(outcome, CollisionOutcome::Boundary);
        assert!(outcome.collided());
        assert_eq!(outcome.attributed_to(), None);

        let edge = resolver().check(&index, 1, None, GridPoint::new(100, -100));
        assert_eq!(edge, CollisionOutcome::Clear);
    }

    #[test]
    fn test_hit_other_vehicles_wall() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(1, 2, (4, 0), (5, 0)));

        let outcome = resolver().check(&index, 1, None, GridPoint::new(5, 0));
        assert_eq!(
            outcome,
            CollisionOutcome::Wall {
                owner: 2,
                segment: SegmentId(1)
            }
        );
        assert_eq!(outcome.attributed_to(), Some(2));
    }

    #[test]
    fn test_other_vehicles_latest_segment_is_lethal() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(7, 2, (0, 0), (1, 0)));

        let outcome = resolver().check(&index, 1, Some(SegmentId(7)), GridPoint::new(1, 0));
        assert_eq!(outcome.attributed_to(), Some(2));
    }

    #[test]
    fn test_own_latest_segment_is_skipped() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(1, 1, (0, 0), (1, 0)));
        index.insert(wall(2, 1, (1, 0), (2, 0)));

        // Vehicle sits at (2, 0) and reverses onto its own newest wall.
        let outcome = resolver().check(&index, 1, Some(SegmentId(2)), GridPoint::new(1, 0));
        // The older wall (0,0)-(1,0) still contains (1, 0).
        assert_eq!(outcome.attributed_to(), Some(1));

        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(2, 1, (1, 0), (2, 0)));
        let outcome = resolver().check(&index, 1, Some(SegmentId(2)), GridPoint::new(1, 0));
        assert_eq!(outcome, CollisionOutcome::Clear);
    }

    #[test]
    fn test_point_beside_wall_is_clear() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(1, 2, (4, 0), (5, 0)));

        let outcome = resolver().check(&index, 1, None, GridPoint::new(5, 1));
        assert_eq!(outcome, CollisionOutcome::Clear);
    }

    #[test]
    fn test_every_point_in_padded_box_collides() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(1, 3, (9, 4), (10, 4)));

        for x in [9, 10] {
            let outcome = resolver().check(&index, 1, None, GridPoint::new(x, 4));
            assert_eq!(outcome.attributed_to(), Some(3));
        }
    }

    #[test]
    fn test_points_between_endpoints_collide() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(1, 2, (4, 0), (5, 0)));
        let resolver = resolver();

        for (x, z) in [(4.5, 0.1), (4.5, -0.1), (3.95, 0.0), (5.05, 0.05)] {
            let outcome = resolver.check_point(&index, 1, None, x, z);
            assert_eq!(outcome.attributed_to(), Some(2), "({}, {})", x, z);
        }

        let outside = resolver.check_point(&index, 1, None, 4.5, 0.2);
        assert_eq!(outside, CollisionOutcome::Clear);

        let edge = resolver.check_point(&index, 1, None, 100.5, 0.0);
        assert_eq!(edge, CollisionOutcome::Boundary);
    }

    #[test]
    fn test_first_match_is_oldest() {
        let mut index = SpatialIndex::new(10.0);
        index.insert(wall(4, 3, (5, 5), (5, 6)));
        index.insert(wall(2, 2, (4, 5), (5, 5)));

        let outcome = resolver().check(&index, 1, None, GridPoint::new(5, 5));
        assert_eq!(
            outcome,
            CollisionOutcome::Wall {
                owner: 2,
                segment: SegmentId(2)
            }
        );
    }
}
