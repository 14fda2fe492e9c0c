//! The authoritative simulation step.
//!
//! [`Simulation`] owns the vehicle registry, the trail store and the respawn
//! queue. Every mutation goes through `&mut self`, so callers serialize joins,
//! turn intents, removals and ticks simply by driving it from one task.
//!
//! Turn intents are queued and applied at the start of the next tick, before
//! any vehicle advances. Respawns are scheduled with a due time and applied
//! at the first tick boundary at or after that time.

use crate::collision::{CollisionOutcome, CollisionResolver};
use crate::config::SimConfig;
use crate::spatial_index::WallSegment;
use crate::spawn::SpawnPlanner;
use crate::trail::TrailStore;
use crate::vehicle::Vehicle;
use log::{debug, info, warn};
use shared::{GameEvent, GameSnapshot, GridPoint, Heading, TurnDirection, VehicleId};
use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

/// Result of a join request.
#[derive(Debug, Clone)]
pub struct Joined {
    /// Full state as seen by the joining client.
    pub snapshot: GameSnapshot,
    /// Announcement for the other clients; `None` when the id was already
    /// registered.
    pub announcement: Option<GameEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub events: Vec<GameEvent>,
    /// Segments dropped by the global segment cap during this tick.
    pub evicted: Vec<WallSegment>,
}

pub struct Simulation {
    config: SimConfig,
    tick: u64,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    trails: TrailStore,
    resolver: CollisionResolver,
    planner: SpawnPlanner,
    pending_turns: VecDeque<(VehicleId, TurnDirection)>,
    respawns: BTreeMap<VehicleId, Instant>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let trails = TrailStore::new(config.cell_size, config.max_trail_length);
        let resolver = CollisionResolver::new(config.arena_half_size, config.wall_thickness);
        let planner = SpawnPlanner::new(
            config.arena_half_size,
            config.spawn_margin,
            config.spawn_safe_distance,
            config.spawn_attempts,
            config.rng_seed,
        );

        Self {
            config,
            tick: 0,
            vehicles: BTreeMap::new(),
            trails,
            resolver,
            planner,
            pending_turns: VecDeque::new(),
            respawns: BTreeMap::new(),
        }
    }

    /// Registers a vehicle at a planned spawn point with a random heading.
    pub fn join(&mut self, id: VehicleId, color: String) -> Joined {
        if self.vehicles.contains_key(&id) {
            return self.already_joined(id);
        }

        let spawn = self.plan_spawn(id);
        let heading = self.planner.random_heading();
        self.join_at(id, color, spawn, heading)
    }

    /// Registers a vehicle at an explicit position.
    pub fn join_at(
        &mut self,
        id: VehicleId,
        color: String,
        position: GridPoint,
        heading: Heading,
    ) -> Joined {
        if self.vehicles.contains_key(&id) {
            return self.already_joined(id);
        }

        let vehicle = Vehicle::new(id, color.clone(), position, heading);
        self.trails.begin(id, position);
        self.vehicles.insert(id, vehicle);
        info!(
            "Vehicle {} joined at ({}, {}) facing {:?}",
            id, position.x, position.z, heading
        );

        Joined {
            snapshot: self.snapshot(),
            announcement: Some(GameEvent::VehicleJoined {
                id,
                color,
                position,
                heading,
            }),
        }
    }

    fn already_joined(&self, id: VehicleId) -> Joined {
        debug!("Vehicle {} already registered, returning snapshot", id);
        Joined {
            snapshot: self.snapshot(),
            announcement: None,
        }
    }

    /// Queues a turn for the next tick. Returns false for unknown or dead
    /// vehicles, whose intents are dropped.
    pub fn queue_turn(&mut self, id: VehicleId, direction: TurnDirection) -> bool {
        if !self.vehicles.get(&id).is_some_and(Vehicle::is_alive) {
            return false;
        }
        self.pending_turns.push_back((id, direction));
        true
    }

    /// Removes a vehicle together with its walls, queued turns and any
    /// pending respawn.
    pub fn remove(&mut self, id: VehicleId) -> Option<GameEvent> {
        self.vehicles.remove(&id)?;
        self.pending_turns.retain(|(turn_id, _)| *turn_id != id);
        self.respawns.remove(&id);
        let cleared = self.trails.remove_owner(id);
        info!("Vehicle {} left, cleared {} wall segments", id, cleared);
        Some(GameEvent::VehicleLeft { id })
    }

    /// Runs one simulation step at time `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        self.apply_due_respawns(now, &mut report.events);
        self.apply_pending_turns();

        let ids: Vec<VehicleId> = self
            .vehicles
            .values()
            .filter(|v| v.is_alive())
            .map(|v| v.id)
            .collect();

        for id in ids {
            self.step_vehicle(id, now, &mut report);
        }

        report
    }

    fn step_vehicle(&mut self, id: VehicleId, now: Instant, report: &mut TickReport) {
        let Some(vehicle) = self.vehicles.get(&id) else {
            return;
        };
        let Some(candidate) = vehicle.candidate_position() else {
            return;
        };
        let from = vehicle.position;

        let outcome = self.resolver.check(
            self.trails.index(),
            id,
            self.trails.latest_segment(id),
            candidate,
        );

        if outcome.collided() {
            self.handle_collision(id, outcome, now, &mut report.events);
            return;
        }

        if candidate == from {
            return;
        }

        let segment = self.trails.append(id, from, candidate);
        let heading = match self.vehicles.get_mut(&id) {
            Some(vehicle) => {
                vehicle.commit_move(candidate);
                vehicle.heading
            }
            None => return,
        };

        report.events.push(GameEvent::VehicleMoved {
            id,
            position: candidate,
            heading,
            new_segment: Some(segment.info()),
        });

        let evicted = self.trails.evict_oldest_if_over_limit(self.vehicles.len());
        report.evicted.extend(evicted);
    }

    fn handle_collision(
        &mut self,
        id: VehicleId,
        outcome: CollisionOutcome,
        now: Instant,
        events: &mut Vec<GameEvent>,
    ) {
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.kill();
        }
        self.pending_turns.retain(|(turn_id, _)| *turn_id != id);
        let cleared = self.trails.clear_owner(id);
        self.respawns.insert(id, now + self.config.respawn_delay);

        let attributed_to = outcome.attributed_to();
        match outcome {
            CollisionOutcome::Boundary => info!("Vehicle {} hit the arena boundary", id),
            CollisionOutcome::Wall { owner, .. } if owner == id => {
                info!("Vehicle {} hit its own wall", id)
            }
            CollisionOutcome::Wall { owner, .. } => {
                info!("Vehicle {} hit the wall of vehicle {}", id, owner)
            }
            CollisionOutcome::Clear => {}
        }
        debug!("Cleared {} segments of vehicle {}", cleared, id);

        events.push(GameEvent::VehicleCollided { id, attributed_to });

        if let Some(owner) = attributed_to.filter(|owner| *owner != id) {
            if let Some(scorer) = self.vehicles.get_mut(&owner) {
                let new_score = scorer.award_point();
                events.push(GameEvent::ScoreChanged {
                    id: owner,
                    new_score,
                });
            }
        }
    }

    fn apply_due_respawns(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        let due: Vec<VehicleId> = self
            .respawns
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            self.respawns.remove(&id);
            if !self.vehicles.get(&id).is_some_and(|v| !v.is_alive()) {
                continue;
            }

            let position = self.plan_spawn(id);
            let heading = self.planner.random_heading();
            if let Some(vehicle) = self.vehicles.get_mut(&id) {
                vehicle.respawn(position, heading);
            }
            self.trails.clear_owner(id);
            self.trails.begin(id, position);

            info!(
                "Vehicle {} respawned at ({}, {})",
                id, position.x, position.z
            );
            events.push(GameEvent::VehicleRespawned {
                id,
                position,
                heading,
            });
        }
    }

    fn apply_pending_turns(&mut self) {
        while let Some((id, direction)) = self.pending_turns.pop_front() {
            if let Some(vehicle) = self.vehicles.get_mut(&id) {
                vehicle.turn(direction);
            }
        }
    }

    fn plan_spawn(&mut self, id: VehicleId) -> GridPoint {
        let others: Vec<GridPoint> = self
            .vehicles
            .values()
            .filter(|v| v.id != id && v.is_alive())
            .map(|v| v.position)
            .collect();

        let spawn = self.planner.find_safe_position(&others, self.trails.index());
        if !spawn.verified {
            warn!(
                "No safe spawn found for vehicle {} after {} attempts, using ({}, {})",
                id, self.config.spawn_attempts, spawn.position.x, spawn.position.z
            );
        }
        spawn.position
    }

    /// Full state for a newly joined client.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            tick: self.tick,
            arena_half_size: self.config.arena_half_size,
            vehicles: self
                .vehicles
                .values()
                .map(|v| v.snapshot(self.trails.trail(v.id)))
                .collect(),
            segments: self.trails.segments().map(WallSegment::info).collect(),
        }
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn trails(&self) -> &TrailStore {
        &self.trails
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn respawn_due(&self, id: VehicleId) -> Option<Instant> {
        self.respawns.get(&id).copied()
    }
}
