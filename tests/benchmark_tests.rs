//! Performance benchmarks for the movement and reconciliation hot paths

use client::game::ClientGameState;
use server::client_manager::ClientManager;
use server::game::GameState;
use shared::{
    classify_bump, resolve, Direction, EntityState, EntityTraits, FrameRegistry, MoveAction,
    MoveFlags, MoveKey, Occupant, Packet, StateBroadcast, StepKind, TileMap, TilePos, Vector2,
    View, WorldView,
};
use std::time::Instant;

const ARENA: &str = "\
################
#..............#
#..#....D...#..#
#..#........#..#
#..####..####..#
#..............#
################";

/// Static world with no occupants.
struct Arena {
    frames: FrameRegistry,
    tiles: TileMap,
}

impl WorldView for Arena {
    fn frames(&self) -> &FrameRegistry {
        &self.frames
    }

    fn tiles(&self) -> &TileMap {
        &self.tiles
    }

    fn occupants_at(&self, _world_tile: TilePos, _view: View) -> Vec<Occupant> {
        Vec::new()
    }
}

fn arena() -> Arena {
    Arena {
        frames: FrameRegistry::new(),
        tiles: TileMap::parse(ARENA).unwrap(),
    }
}

const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Benchmarks bump classification
#[test]
fn benchmark_bump_classification() {
    let world = arena();
    let traits = EntityTraits::player();

    let iterations = 100_000;
    let start = Instant::now();

    let mut blocked = 0;
    for i in 0..iterations {
        let from = TilePos::new(1 + (i % 14) as i32, 1 + (i % 5) as i32);
        let (x, y) = DIRECTIONS[i % DIRECTIONS.len()];
        let direction = Direction::new(x, y).unwrap();
        if classify_bump(&world, from, direction, 1, &traits, View::Authoritative)
            != shared::BumpType::None
        {
            blocked += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Bump classification: {} iterations in {:?} ({:.2} ns/iter, {} obstructed)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64,
        blocked
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks movement resolution including diagonal slides
#[test]
fn benchmark_movement_resolution() {
    let world = arena();
    let traits = EntityTraits::player();
    let mut state = EntityState::at_world(
        Vector2::new(1.0, 1.0),
        &world.frames,
        View::Authoritative,
    );

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let (x, y) = DIRECTIONS[(i * 7) % DIRECTIONS.len()];
        let flags = MoveFlags::from_direction(Direction::new(x, y).unwrap());
        let resolution = resolve(
            &world,
            &state,
            &flags,
            1,
            &traits,
            View::Authoritative,
            StepKind::Input,
        )
        .unwrap();
        state = resolution.state;
    }

    let duration = start.elapsed();
    println!(
        "Movement resolution: {} steps in {:?} ({:.2} μs/step), {} accepted",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        state.move_number
    );

    assert!(state.is_active());
    // Should complete in under 3 seconds
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks network packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    let game = GameState::from_map(ARENA).unwrap();
    let layout = game.layout_packet();

    let state = EntityState::at_world(
        Vector2::new(3.0, 4.0),
        &FrameRegistry::new(),
        View::Authoritative,
    );
    let broadcast = Packet::StateBroadcast(StateBroadcast::from_state(7, &state));

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = broadcast.encode().unwrap();
        let _decoded = Packet::decode(&bytes).unwrap();
    }
    for _ in 0..iterations / 100 {
        let bytes = layout.encode().unwrap();
        let _decoded = Packet::decode(&bytes).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} broadcasts and {} layouts in {:?}",
        iterations,
        iterations / 100,
        duration
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client prediction and reconciliation with a long queue
#[test]
fn benchmark_client_reconciliation() {
    let mut client = ClientGameState::new(10_000);
    client.handle_layout(&[], TileMap::parse(ARENA).unwrap());
    client.handle_spawn(1, EntityTraits::player());
    client.set_local(1);
    let mut first = StateBroadcast::from_state(
        1,
        &EntityState::at_world(Vector2::new(1.0, 1.0), &FrameRegistry::new(), View::Observed),
    );
    first.reset_queue = true;
    client.reconcile_client(&first);

    let pattern = [MoveKey::Right, MoveKey::Up, MoveKey::Left, MoveKey::Down];
    let iterations = 200;
    let start = Instant::now();

    for i in 0..iterations {
        client.apply_local_action(MoveFlags::from_keys(&[pattern[i % pattern.len()]]));
    }
    let queued = client.pending.len();

    // acknowledge nothing new, forcing a full replay each time
    let ack = StateBroadcast::from_state(1, &client.authoritative_local().unwrap());
    for _ in 0..50 {
        client.reconcile_client(&ack);
    }

    let duration = start.elapsed();
    println!(
        "Client reconciliation: {} predictions, 50 replays of {} actions in {:?}",
        iterations, queued, duration
    );

    assert_eq!(client.pending.len(), queued);
    // Should complete in under 3 seconds
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks the server taking and applying one tick of queued actions
#[test]
fn benchmark_server_action_processing() {
    let open = "\
..................................
..................................
..................................
..................................
..................................
..................................
..................................
..................................
..................................
..................................";
    let mut game = GameState::from_map(open).unwrap();
    let mut clients = ClientManager::new(64, 256);
    let mut entities = Vec::new();

    for i in 0..32u16 {
        let addr = format!("127.0.0.1:{}", 9000 + i).parse().unwrap();
        let client_id = clients.add_client(addr).unwrap();
        let entity = game.spawn(
            Some(client_id),
            EntityTraits::player(),
            Vector2::new(i as f32, 0.0),
        );
        clients.set_entity(client_id, entity);
        entities.push((client_id, entity));
    }
    game.drain_outbox();

    for (client_id, entity) in &entities {
        for sequence in 1..=8 {
            let action = MoveAction::new(
                *entity,
                sequence,
                MoveFlags::from_keys(&[MoveKey::Up]),
            );
            clients.add_action(*client_id, action);
        }
    }

    let start = Instant::now();
    let mut accepted = 0;
    for _ in 0..8 {
        for (client_id, action) in clients.take_tick_actions() {
            if game.apply_server_action(Some(client_id), &action).is_ok() {
                accepted += 1;
            }
        }
        game.end_tick();
        game.drain_outbox();
    }

    let duration = start.elapsed();
    println!(
        "Server processing: {} actions accepted over 8 ticks in {:?}",
        accepted, duration
    );

    assert_eq!(accepted, 32 * 8);
    assert_eq!(clients.pending_count(), 0);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
