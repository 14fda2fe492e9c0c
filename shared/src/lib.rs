use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, TAU};

pub const PROTOCOL_VERSION: u32 = 2;

/// Largest UDP payload that fits an IPv4 datagram.
pub const MAX_DATAGRAM_BYTES: usize = 65_507;

/// Target serialized size of one [`Packet::SnapshotChunk`].
pub const SNAPSHOT_CHUNK_BYTES: usize = 16 * 1024;

/// Session id assigned by the server to each connected client.
pub type VehicleId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Join {
        client_version: u32,
        color: String,
    },
    TurnLeft,
    TurnRight,
    Heartbeat,
    Disconnect,

    /// Header of the join snapshot; `chunk_count` chunks follow.
    Joined {
        vehicle_id: VehicleId,
        tick: u64,
        arena_half_size: i32,
        chunk_count: u32,
    },
    SnapshotChunk {
        tick: u64,
        index: u32,
        vehicles: Vec<VehicleSnapshot>,
        segments: Vec<SegmentInfo>,
    },
    Event {
        tick: u64,
        event: GameEvent,
    },
    Disconnected {
        reason: String,
    },
}

/// Integer position on the arena grid. The arena lies in the x/z plane.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridPoint {
    pub x: i32,
    pub z: i32,
}

impl GridPoint {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    pub fn distance_to(self, other: GridPoint) -> f32 {
        let dx = (other.x - self.x) as f32;
        let dz = (other.z - self.z) as f32;
        (dx * dx + dz * dz).sqrt()
    }
}

/// One of the four cardinal headings a vehicle can face.
///
/// The canonical angle is a whole number of quarter turns from `North`.
/// Steps are derived from the angle as `(round(sin), round(cos))`, so
/// `North` moves along +z and `East` along +x.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Heading {
    #[default]
    North,
    East,
    South,
    West,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    pub fn quarter_turns(self) -> u8 {
        match self {
            Heading::North => 0,
            Heading::East => 1,
            Heading::South => 2,
            Heading::West => 3,
        }
    }

    pub fn from_quarter_turns(turns: i32) -> Self {
        Self::ALL[turns.rem_euclid(4) as usize]
    }

    /// Facing angle normalized into `[0, 2π)`.
    pub fn radians(self) -> f32 {
        (self.quarter_turns() as f32 * FRAC_PI_2).rem_euclid(TAU)
    }

    /// Unit grid step `(dx, dz)`; exactly one component is non-zero.
    pub fn step(self) -> (i32, i32) {
        let angle = self.radians();
        (angle.sin().round() as i32, angle.cos().round() as i32)
    }

    /// Left adds a quarter turn to the angle, right subtracts one.
    pub fn turned(self, turn: TurnDirection) -> Self {
        let delta = match turn {
            TurnDirection::Left => 1,
            TurnDirection::Right => -1,
        };
        Self::from_quarter_turns(self.quarter_turns() as i32 + delta)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnDirection {
    Left,
    Right,
}

/// Wire form of a wall segment laid down by a moving vehicle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    pub id: u64,
    pub owner: VehicleId,
    pub from: GridPoint,
    pub to: GridPoint,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub color: String,
    pub position: GridPoint,
    pub heading: Heading,
    pub alive: bool,
    pub score: u32,
    pub trail: Vec<GridPoint>,
}

/// Full state sent to a client when it joins.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct GameSnapshot {
    pub tick: u64,
    pub arena_half_size: i32,
    pub vehicles: Vec<VehicleSnapshot>,
    pub segments: Vec<SegmentInfo>,
}

impl GameSnapshot {
    pub fn vehicle(&self, id: VehicleId) -> Option<&VehicleSnapshot> {
        self.vehicles.iter().find(|v| v.id == id)
    }
}

#[derive(Default)]
struct ChunkBuilder {
    vehicles: Vec<VehicleSnapshot>,
    segments: Vec<SegmentInfo>,
    size: usize,
}

impl ChunkBuilder {
    fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.segments.is_empty()
    }
}

/// Splits a join snapshot into a [`Packet::Joined`] header followed by
/// [`Packet::SnapshotChunk`]s of roughly `budget` bytes each.
///
/// An item larger than the budget gets a chunk of its own. Segments keep
/// their oldest-first order across chunks.
pub fn snapshot_packets(
    vehicle_id: VehicleId,
    snapshot: GameSnapshot,
    budget: usize,
) -> bincode::Result<Vec<Packet>> {
    let GameSnapshot {
        tick,
        arena_half_size,
        vehicles,
        segments,
    } = snapshot;

    let base = bincode::serialized_size(&Packet::SnapshotChunk {
        tick,
        index: 0,
        vehicles: Vec::new(),
        segments: Vec::new(),
    })? as usize;

    let mut done: Vec<ChunkBuilder> = Vec::new();
    let mut current = ChunkBuilder {
        size: base,
        ..ChunkBuilder::default()
    };

    for vehicle in vehicles {
        let item = bincode::serialized_size(&vehicle)? as usize;
        if !current.is_empty() && current.size + item > budget {
            done.push(std::mem::replace(
                &mut current,
                ChunkBuilder {
                    size: base,
                    ..ChunkBuilder::default()
                },
            ));
        }
        current.size += item;
        current.vehicles.push(vehicle);
    }

    for segment in segments {
        let item = bincode::serialized_size(&segment)? as usize;
        if !current.is_empty() && current.size + item > budget {
            done.push(std::mem::replace(
                &mut current,
                ChunkBuilder {
                    size: base,
                    ..ChunkBuilder::default()
                },
            ));
        }
        current.size += item;
        current.segments.push(segment);
    }

    if !current.is_empty() {
        done.push(current);
    }

    let mut packets = Vec::with_capacity(done.len() + 1);
    packets.push(Packet::Joined {
        vehicle_id,
        tick,
        arena_half_size,
        chunk_count: done.len() as u32,
    });
    for (index, chunk) in done.into_iter().enumerate() {
        packets.push(Packet::SnapshotChunk {
            tick,
            index: index as u32,
            vehicles: chunk.vehicles,
            segments: chunk.segments,
        });
    }
    Ok(packets)
}

/// Rebuilds a join snapshot from its header and chunks, in any arrival
/// order.
#[derive(Debug, Default)]
pub struct SnapshotAssembler {
    header: Option<(VehicleId, u64, i32, u32)>,
    chunks: BTreeMap<u32, (u64, Vec<VehicleSnapshot>, Vec<SegmentInfo>)>,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes `Joined` and `SnapshotChunk` packets; anything else is handed
    /// back to the caller.
    pub fn push(&mut self, packet: Packet) -> Option<Packet> {
        match packet {
            Packet::Joined {
                vehicle_id,
                tick,
                arena_half_size,
                chunk_count,
            } => {
                self.header = Some((vehicle_id, tick, arena_half_size, chunk_count));
                self.chunks
                    .retain(|index, (chunk_tick, ..)| *chunk_tick == tick && *index < chunk_count);
                None
            }
            Packet::SnapshotChunk {
                tick,
                index,
                vehicles,
                segments,
            } => {
                let expected = self.header.map_or(true, |(_, header_tick, _, count)| {
                    header_tick == tick && index < count
                });
                if expected {
                    self.chunks.insert(index, (tick, vehicles, segments));
                }
                None
            }
            other => Some(other),
        }
    }

    pub fn is_complete(&self) -> bool {
        match self.header {
            Some((_, _, _, count)) => self.chunks.len() == count as usize,
            None => false,
        }
    }

    /// The joined vehicle id and full snapshot once every chunk has arrived.
    pub fn finish(&mut self) -> Option<(VehicleId, GameSnapshot)> {
        if !self.is_complete() {
            return None;
        }
        let (vehicle_id, tick, arena_half_size, _) = self.header.take()?;

        let mut snapshot = GameSnapshot {
            tick,
            arena_half_size,
            ..GameSnapshot::default()
        };
        for (_, (_, vehicles, segments)) in std::mem::take(&mut self.chunks) {
            snapshot.vehicles.extend(vehicles);
            snapshot.segments.extend(segments);
        }
        Some((vehicle_id, snapshot))
    }
}

/// Outcome events produced by the simulation and delivered to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum GameEvent {
    VehicleJoined {
        id: VehicleId,
        color: String,
        position: GridPoint,
        heading: Heading,
    },
    VehicleMoved {
        id: VehicleId,
        position: GridPoint,
        heading: Heading,
        new_segment: Option<SegmentInfo>,
    },
    VehicleCollided {
        id: VehicleId,
        attributed_to: Option<VehicleId>,
    },
    VehicleRespawned {
        id: VehicleId,
        position: GridPoint,
        heading: Heading,
    },
    ScoreChanged {
        id: VehicleId,
        new_score: u32,
    },
    VehicleLeft {
        id: VehicleId,
    },
}

impl GameEvent {
    pub fn vehicle_id(&self) -> VehicleId {
        match self {
            GameEvent::VehicleJoined { id, .. }
            | GameEvent::VehicleMoved { id, .. }
            | GameEvent::VehicleCollided { id, .. }
            | GameEvent::VehicleRespawned { id, .. }
            | GameEvent::ScoreChanged { id, .. }
            | GameEvent::VehicleLeft { id } => *id,
        }
    }
}
