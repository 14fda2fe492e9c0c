//! Best-effort search for a spawn point away from vehicles and walls.

use crate::spatial_index::SpatialIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{GridPoint, Heading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnPoint {
    pub position: GridPoint,
    /// False when the attempt budget ran out and the point is unchecked.
    pub verified: bool,
}

pub struct SpawnPlanner {
    extent: i32,
    safe_distance: f32,
    attempts: u32,
    rng: StdRng,
}

impl SpawnPlanner {
    pub fn new(
        arena_half_size: i32,
        margin: i32,
        safe_distance: f32,
        attempts: u32,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            extent: (arena_half_size - margin).max(0),
            safe_distance,
            attempts,
            rng,
        }
    }

    fn sample(&mut self) -> GridPoint {
        GridPoint::new(
            self.rng.gen_range(-self.extent..=self.extent),
            self.rng.gen_range(-self.extent..=self.extent),
        )
    }

    pub fn random_heading(&mut self) -> Heading {
        Heading::from_quarter_turns(self.rng.gen_range(0..4))
    }

    /// A candidate is safe when every live vehicle and every endpoint of the
    /// walls indexed near it are at least the safe distance away.
    pub fn is_safe(&self, candidate: GridPoint, vehicles: &[GridPoint], index: &SpatialIndex) -> bool {
        if vehicles
            .iter()
            .any(|v| v.distance_to(candidate) < self.safe_distance)
        {
            return false;
        }

        index
            .nearby(candidate.x as f32, candidate.z as f32)
            .iter()
            .all(|segment| {
                segment.from.distance_to(candidate) >= self.safe_distance
                    && segment.to.distance_to(candidate) >= self.safe_distance
            })
    }

    pub fn find_safe_position(&mut self, vehicles: &[GridPoint], index: &SpatialIndex) -> SpawnPoint {
        for _ in 0..self.attempts {
            let candidate = self.sample();
            if self.is_safe(candidate, vehicles, index) {
                return SpawnPoint {
                    position: candidate,
                    verified: true,
                };
            }
        }

        SpawnPoint {
            position: self.sample(),
            verified: false,
        }
    }
}
