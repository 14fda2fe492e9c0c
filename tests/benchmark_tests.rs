//! Performance benchmarks for critical simulation paths

use server::collision::CollisionResolver;
use server::config::SimConfig;
use server::simulation::Simulation;
use server::trail::TrailStore;
use shared::{GridPoint, Heading};
use std::time::{Duration, Instant};

/// Lays a long serpentine trail so the index holds many segments.
fn dense_trail_store(rows: i32, length: i32) -> TrailStore {
    let mut store = TrailStore::new(10.0, usize::MAX / 4);
    for row in 0..rows {
        let z = row * 2 - rows;
        for x in -length..length {
            store.append(1 + row as u32 % 8, GridPoint::new(x, z), GridPoint::new(x + 1, z));
        }
    }
    store
}

/// Benchmarks collision queries against a large wall set
#[test]
fn benchmark_collision_queries() {
    let store = dense_trail_store(100, 100);
    let resolver = CollisionResolver::new(1000, 0.2);
    assert_eq!(store.segment_count(), 100 * 200);

    let iterations = 100_000;
    let start = Instant::now();

    let mut hits = 0;
    for i in 0..iterations {
        let x = (i % 200) - 100;
        let z = ((i / 200) % 200) - 100;
        if resolver
            .check(store.index(), 99, None, GridPoint::new(x, z))
            .collided()
        {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Collision queries: {} iterations over {} segments in {:?} ({:.2} μs/iter, {} hits)",
        iterations,
        store.segment_count(),
        duration,
        duration.as_micros() as f64 / iterations as f64,
        hits
    );

    assert!(hits > 0);
    // Should complete in under 5 seconds even in debug builds
    assert!(duration.as_secs() < 5);
}

/// Benchmarks eviction and index maintenance
#[test]
fn benchmark_trail_churn() {
    let mut store = TrailStore::new(10.0, 500);
    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let owner = (i % 4) as u32 + 1;
        let z = owner as i32 * 3;
        let x = i % 400 - 200;
        store.append(owner, GridPoint::new(x, z), GridPoint::new(x + 1, z));
        store.evict_oldest_if_over_limit(4);
    }

    let duration = start.elapsed();
    println!(
        "Trail churn: {} appends in {:?} ({:.2} μs/append)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(store.segment_count(), 2000);
    assert_eq!(store.index().len(), 2000);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks full ticks with many vehicles
#[test]
fn benchmark_simulation_ticks() {
    let config = SimConfig {
        arena_half_size: 500,
        max_trail_length: 300,
        rng_seed: Some(8),
        respawn_delay: Duration::from_millis(200),
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config);
    for id in 1..=32 {
        let z = id as i32 * 20 - 320;
        let heading = if id % 2 == 0 { Heading::East } else { Heading::West };
        sim.join_at(id, format!("c{}", id), GridPoint::new(0, z), heading);
    }

    let ticks = 1_000;
    let base = Instant::now();
    let start = Instant::now();

    for i in 0..ticks {
        sim.tick(base + Duration::from_millis(50) * i);
    }

    let duration = start.elapsed();
    println!(
        "Simulation: {} ticks with {} vehicles in {:?} ({:.2} μs/tick, {} segments)",
        ticks,
        sim.vehicle_count(),
        duration,
        duration.as_micros() as f64 / ticks as f64,
        sim.trails().segment_count()
    );

    assert!(sim.trails().segment_count() <= 300 * 32);
    assert!(duration.as_secs() < 10);
}
