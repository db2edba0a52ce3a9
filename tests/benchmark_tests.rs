//! Performance sanity checks for the hot paths: frame encoding,
//! stream decoding and hit-zone intersection.

use std::time::Instant;

use shared::codec::{Decoder, Encoder};
use shared::combat::{attack_zone, entity_bounds};
use shared::packet::PlayerSnapshot;
use shared::protocol::Direction;

fn snapshot_of(id: u16) -> PlayerSnapshot {
    PlayerSnapshot {
        id,
        x: 100 + id * 40,
        y: 100 + id * 25,
        direction: Direction::Down,
        health: 100,
        max_health: 120,
        level: 3,
        damage: 30,
        experience: 250,
        experience_to_next_level: 350,
        sprite_frame: 1,
        dead: false,
    }
}

/// Benchmarks world-state encoding with a full server.
#[test]
fn benchmark_world_state_encoding() {
    let players: Vec<PlayerSnapshot> = (1..=100).map(snapshot_of).collect();
    let mut encoder = Encoder::new();

    let iterations = 10_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let frame = encoder.encode_world_state(&players).unwrap();
        assert!(!frame.is_empty());
    }
    let duration = start.elapsed();
    println!(
        "World state encoding: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Must leave plenty of headroom inside one 33 ms tick.
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the hot-path movement update encoder.
#[test]
fn benchmark_fast_player_update() {
    let mut encoder = Encoder::new();

    let iterations = 100_000;
    let start = Instant::now();
    for i in 0..iterations {
        let frame = encoder
            .fast_player_update(7, (i % 4000) as u16, (i % 3000) as u16, Direction::Right, 1)
            .unwrap();
        assert!(frame.len() >= 10);
    }
    let duration = start.elapsed();
    println!(
        "Fast player update: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks decoding a stream fed in TCP-sized chunks.
#[test]
fn benchmark_chunked_decoding() {
    let mut encoder = Encoder::new();
    let players: Vec<PlayerSnapshot> = (1..=50).map(snapshot_of).collect();
    let mut stream = Vec::new();
    for _ in 0..100 {
        stream.extend_from_slice(&encoder.encode_world_state(&players).unwrap());
    }

    let iterations = 100;
    let start = Instant::now();
    for _ in 0..iterations {
        let mut decoder = Decoder::new();
        let mut decoded = 0;
        for chunk in stream.chunks(1400) {
            decoded += decoder.decode(chunk).packets.len();
        }
        assert_eq!(decoded, 100);
    }
    let duration = start.elapsed();
    println!(
        "Chunked decoding: {} × {} bytes in {:?} ({:.2} µs/stream)",
        iterations,
        stream.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks hit-zone intersection against a crowded server.
#[test]
fn benchmark_hit_detection() {
    let zone = attack_zone(124, 124, Direction::Right);
    let targets: Vec<_> = (0..100).map(|i| entity_bounds(100 + i * 30, 100)).collect();

    let iterations = 100_000;
    let start = Instant::now();
    let mut hits = 0usize;
    for _ in 0..iterations {
        for target in &targets {
            if zone.intersects(target) {
                hits += 1;
            }
        }
    }
    let duration = start.elapsed();
    println!(
        "Hit detection: {} sweeps × {} targets in {:?} ({:.2} ns/check)",
        iterations,
        targets.len(),
        duration,
        duration.as_nanos() as f64 / (iterations * targets.len()) as f64
    );

    assert!(hits > 0);
    assert!(duration.as_millis() < 2000);
}
