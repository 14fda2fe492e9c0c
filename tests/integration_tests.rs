//! Integration tests for the arena server
//!
//! These tests drive the simulation through its public API and exercise a
//! live UDP join against a running server.

use bincode::{deserialize, serialize};
use server::config::SimConfig;
use server::network::{Server, ServerMessage};
use server::simulation::Simulation;
use server::vehicle::VehicleState;
use shared::{
    snapshot_packets, GameEvent, GridPoint, Heading, Packet, SnapshotAssembler, TurnDirection,
    MAX_DATAGRAM_BYTES, PROTOCOL_VERSION, SNAPSHOT_CHUNK_BYTES,
};
use std::time::{Duration, Instant};

const STEP: Duration = Duration::from_millis(50);

fn scenario_config() -> SimConfig {
    SimConfig {
        arena_half_size: 100,
        cell_size: 10.0,
        wall_thickness: 0.2,
        max_trail_length: 5,
        respawn_delay: Duration::from_millis(500),
        spawn_safe_distance: 10.0,
        rng_seed: Some(2024),
        ..SimConfig::default()
    }
}

/// SIMULATION SCENARIOS
mod simulation_tests {
    use super::*;

    /// Vehicle B drives into the wall vehicle A just laid down
    #[test]
    fn wall_hit_is_attributed_and_respawns_later() {
        let mut sim = Simulation::new(scenario_config());
        sim.join_at(1, "red".to_string(), GridPoint::new(0, 0), Heading::East);
        sim.join_at(2, "blue".to_string(), GridPoint::new(5, 5), Heading::South);

        let start = Instant::now();
        let mut collided_at = None;
        for i in 0..5 {
            let report = sim.tick(start + STEP * i);
            if report.events.contains(&GameEvent::VehicleCollided {
                id: 2,
                attributed_to: Some(1),
            }) {
                collided_at = Some(i);
            }
        }

        assert_eq!(collided_at, Some(4), "B should die on its fifth step");
        assert_eq!(sim.vehicle(1).unwrap().score, 1);
        assert_eq!(sim.vehicle(2).unwrap().score, 0);
        assert_eq!(sim.vehicle(2).unwrap().state, VehicleState::Dead);

        // Dead until the delay has elapsed, however many ticks run.
        let mut tick = 5;
        while start + STEP * tick < start + STEP * 4 + Duration::from_millis(500) {
            sim.tick(start + STEP * tick);
            assert_eq!(sim.vehicle(2).unwrap().state, VehicleState::Dead);
            tick += 1;
        }

        let walls: Vec<_> = sim.trails().segments_of(1).copied().collect();
        let report = sim.tick(start + STEP * tick);
        let position = report
            .events
            .iter()
            .find_map(|e| match e {
                GameEvent::VehicleRespawned { id: 2, position, .. } => Some(*position),
                _ => None,
            })
            .expect("B should respawn");

        assert!(sim.vehicle(2).unwrap().is_alive());
        for wall in walls {
            assert!(wall.from.distance_to(position) >= 10.0);
            assert!(wall.to.distance_to(position) >= 10.0);
        }
    }

    /// Driving off the arena edge kills without scoring
    #[test]
    fn boundary_collision_scores_nothing() {
        let mut sim = Simulation::new(scenario_config());
        sim.join_at(1, "red".to_string(), GridPoint::new(100, 0), Heading::East);

        let report = sim.tick(Instant::now());
        assert_eq!(
            report.events,
            vec![GameEvent::VehicleCollided {
                id: 1,
                attributed_to: None
            }]
        );
        assert_eq!(sim.vehicle(1).unwrap().score, 0);
        assert_eq!(sim.trails().segment_count(), 0);
    }

    /// Positions stay on the grid and trails stay bounded over a long run
    #[test]
    fn random_play_keeps_invariants() {
        let config = SimConfig {
            arena_half_size: 30,
            spawn_margin: 5,
            spawn_safe_distance: 4.0,
            respawn_delay: Duration::from_millis(100),
            ..scenario_config()
        };
        let mut sim = Simulation::new(config);
        for id in 1..=6 {
            sim.join(id, format!("color-{}", id));
        }

        let start = Instant::now();
        for i in 0..600u32 {
            let id = i % 6 + 1;
            let turn = if i % 7 < 3 {
                TurnDirection::Left
            } else {
                TurnDirection::Right
            };
            if i % 5 == 0 {
                sim.queue_turn(id, turn);
            }

            let report = sim.tick(start + STEP * i);

            for vehicle in sim.vehicles() {
                assert!(sim.trails().trail_len(vehicle.id) <= 5);
                let (dx, dz) = vehicle.heading.step();
                assert_eq!(dx.abs() + dz.abs(), 1);
                if !vehicle.is_alive() {
                    assert_eq!(sim.trails().segments_of(vehicle.id).count(), 0);
                }
            }
            assert!(sim.trails().segment_count() <= 5 * 6);
            assert_eq!(sim.trails().index().len(), sim.trails().segment_count());

            for event in &report.events {
                if let GameEvent::ScoreChanged { id, .. } = event {
                    let victim_attributed = report.events.iter().any(|e| {
                        matches!(e, GameEvent::VehicleCollided { id: victim, attributed_to: Some(owner) }
                            if owner == id && victim != id)
                    });
                    assert!(victim_attributed);
                }
            }
        }
    }

    /// Leaving removes the vehicle and every wall it owned
    #[test]
    fn disconnect_clears_walls() {
        let mut sim = Simulation::new(scenario_config());
        sim.join_at(1, "red".to_string(), GridPoint::new(0, 0), Heading::North);
        sim.join_at(2, "blue".to_string(), GridPoint::new(40, 0), Heading::North);

        let start = Instant::now();
        for i in 0..4 {
            sim.tick(start + STEP * i);
        }
        assert_eq!(sim.trails().segments_of(1).count(), 4);

        assert_eq!(sim.remove(1), Some(GameEvent::VehicleLeft { id: 1 }));
        assert_eq!(sim.trails().segments_of(1).count(), 0);
        assert!(sim.trails().index().nearby(0.0, 2.0).is_empty());
        assert!(!sim.queue_turn(1, TurnDirection::Left));
    }
}

/// NETWORK TESTS
mod network_tests {
    use super::*;

    /// A UDP client joins a running server and receives its snapshot
    #[tokio::test]
    async fn udp_join_receives_snapshot() {
        let config = SimConfig {
            rng_seed: Some(1),
            ..SimConfig::default()
        };
        let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control_handle();

        let client = async move {
            let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let join = Packet::Join {
                client_version: PROTOCOL_VERSION,
                color: "green".to_string(),
            };
            socket
                .send_to(&serialize(&join).unwrap(), server_addr)
                .await
                .unwrap();

            let mut buf = [0u8; 65536];
            let mut assembler = SnapshotAssembler::new();
            let received = tokio::time::timeout(Duration::from_secs(2), async {
                loop {
                    let (len, _) = socket.recv_from(&mut buf).await.unwrap();
                    let packet = deserialize::<Packet>(&buf[..len]).unwrap();
                    // Tick events may interleave with the snapshot.
                    let _ = assembler.push(packet);
                    if let Some(joined) = assembler.finish() {
                        return joined;
                    }
                }
            })
            .await;
            control.send(ServerMessage::Shutdown).unwrap();
            received.expect("server should answer the join")
        };

        // Both futures share this task; run() returns once Shutdown arrives.
        let (run_result, (vehicle_id, snapshot)) = tokio::join!(server.run(), client);
        assert!(run_result.is_ok());

        assert_eq!(vehicle_id, 1);
        assert_eq!(snapshot.vehicle(1).unwrap().color, "green");
        assert_eq!(snapshot.arena_half_size, 100);
    }

    /// A full arena with maximal trails still fits every join packet in a datagram
    #[test]
    fn join_packets_fit_in_datagrams_at_capacity() {
        let config = SimConfig::default();
        let vehicles = config.max_clients as u32;
        let steps = config.max_trail_length as u32 - 1;
        let mut sim = Simulation::new(config);

        for id in 1..=vehicles {
            let x = id as i32 * 6 - 99;
            sim.join_at(id, "c".repeat(32), GridPoint::new(x, -100), Heading::North);
        }
        let start = Instant::now();
        for i in 0..steps {
            sim.tick(start + STEP * i);
        }
        assert!(sim.vehicles().all(|v| v.is_alive()));
        assert_eq!(sim.trails().segment_count(), (vehicles * steps) as usize);

        let snapshot = sim.snapshot();
        let packets = snapshot_packets(1, snapshot.clone(), SNAPSHOT_CHUNK_BYTES).unwrap();
        assert!(packets.len() > 2);

        let mut assembler = SnapshotAssembler::new();
        for packet in packets {
            let bytes = serialize(&packet).unwrap();
            assert!(bytes.len() <= MAX_DATAGRAM_BYTES, "{} bytes", bytes.len());
            assert!(assembler.push(deserialize(&bytes).unwrap()).is_none());
        }
        assert_eq!(assembler.finish(), Some((1, snapshot)));
    }
}
