//! End-to-end checks against the public API

use glam::DVec2;
use hill_rush::consts::{FRAME_DT, GRAVITY, PIXELS_PER_METER};
use hill_rush::sim::{
    EndReason, FuelConfig, FuelSystem, PhysicsWorld, PickupConfig, PickupSpawner, RunStateManager,
    RunStatus, TerrainConfig, TerrainGenerator, TickInput, VehicleRig, VehicleStats,
};
use hill_rush::{SimConfig, Simulation, StagePreset};

fn boundaries(seed: u32) -> Vec<(f64, f64)> {
    let mut terrain = TerrainGenerator::new(seed, TerrainConfig::default());
    terrain
        .generate_segments(0.0, 1000.0)
        .iter()
        .map(|s| (s.start_x, s.end_x))
        .collect()
}

#[test]
fn test_terrain_same_seed_same_boundaries() {
    let a = boundaries(42);
    let b = boundaries(42);
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn test_throttle_burns_more_than_idle() {
    let config = FuelConfig {
        max_fuel: 100.0,
        ..Default::default()
    };
    let mut throttling = FuelSystem::new(config.clone());
    let mut idle = FuelSystem::new(config);
    throttling.consume(1.0, true, false);
    idle.consume(1.0, false, false);
    assert!(throttling.current() < idle.current());
    assert!(idle.current() < 100.0);
}

#[test]
fn test_long_burn_empties_tank() {
    let mut fuel = FuelSystem::new(FuelConfig {
        max_fuel: 10.0,
        ..Default::default()
    });
    fuel.consume(100.0, true, true);
    assert_eq!(fuel.current(), 0.0);
    assert!(fuel.is_empty());
}

#[test]
fn test_collect_then_cleanup_once() {
    let mut spawner = PickupSpawner::new(123, PickupConfig::default());
    let ids = spawner.spawn_in_range(0.0, 1000.0, |_| 0.0);
    assert!(!ids.is_empty());
    let before = spawner.len();

    let first = ids[0];
    assert!(spawner.collect_pickup(first).is_some());
    assert!(spawner.collect_pickup(first).is_none());

    let removed = spawner.cleanup_collected();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, first);
    assert_eq!(spawner.len(), before - 1);
}

#[test]
fn test_vehicle_gas_then_brake_on_generated_ground() {
    let mut world = PhysicsWorld::new(GRAVITY, PIXELS_PER_METER);
    let mut terrain = TerrainGenerator::new(
        7,
        TerrainConfig {
            min_height_variation: 0.0,
            max_height_variation: 0.0,
            ..Default::default()
        },
    );
    let indices: Vec<i64> = terrain
        .generate_segments(-800.0, 4000.0)
        .iter()
        .map(|s| s.index)
        .collect();
    for index in indices {
        let desc = terrain.segment(index).unwrap().body_desc(0.9);
        let body = world.add_body(desc).unwrap();
        terrain.attach_body(index, body);
    }

    let ground = DVec2::new(400.0, terrain.exact_height_at(400.0));
    let mut rig = VehicleRig::spawn(&mut world, VehicleStats::default(), ground).unwrap();
    for _ in 0..90 {
        world.step(FRAME_DT);
    }
    assert!(rig.is_grounded(&world));

    let start = rig.position(&world).x;
    for _ in 0..60 {
        rig.apply_gas(&mut world, 1.0, FRAME_DT);
        world.step(FRAME_DT);
    }
    assert!(rig.position(&world).x - start > 50.0);
    let after_gas = rig.velocity(&world).x.abs();

    for _ in 0..30 {
        rig.apply_brake(&mut world, 1.0);
        world.step(FRAME_DT);
    }
    assert!(rig.velocity(&world).x.abs() < after_gas);
}

#[test]
fn test_second_crash_is_noop() {
    let mut run = RunStateManager::new(FuelConfig::default(), PIXELS_PER_METER);
    run.start_run(200.0);
    assert!(run.crash());
    assert_eq!(run.status(), RunStatus::Crashed);
    let after_first = run.state().clone();
    assert!(!run.crash());
    assert_eq!(run.state(), &after_first);
    assert_eq!(run.state().end_reason, Some(EndReason::Crash));
}

fn drive(seed: u32, config: SimConfig, frames: usize) -> Simulation {
    let mut sim = Simulation::new(seed, config);
    assert!(sim.start_run());
    for frame in 0..frames {
        sim.apply_input(&TickInput {
            gas: frame % 300 < 260,
            brake: frame % 300 >= 280,
            boost: frame % 120 == 0,
        });
        sim.step(FRAME_DT);
    }
    sim
}

#[test]
fn test_independent_simulations_agree() {
    let a = drive(99, SimConfig::default(), 480);
    let b = drive(99, SimConfig::default(), 480);
    assert_eq!(a.stats(), b.stats());
    assert_eq!(a.vehicle_snapshot(), b.vehicle_snapshot());

    let pa: Vec<_> = a.pickups().live().iter().map(|p| (p.id, p.position)).collect();
    let pb: Vec<_> = b.pickups().live().iter().map(|p| (p.id, p.position)).collect();
    assert_eq!(pa, pb);
}

#[test]
fn test_stages_change_the_world() {
    let moon = Simulation::new(1, SimConfig::for_stage(StagePreset::Moon));
    let base = Simulation::new(1, SimConfig::default());
    assert!(moon.config().world.gravity < base.config().world.gravity);
    assert!(moon.config().terrain.difficulty_ramp > base.config().terrain.difficulty_ramp);
}

#[test]
fn test_run_stats_serialize() {
    let mut sim = drive(3, SimConfig::default(), 120);
    assert!(sim.end_run());
    let json = serde_json::to_string(&sim.stats()).unwrap();
    assert!(json.contains("\"end_reason\":\"Manual\""));
    assert!(sim.snapshot().run.status.is_over());
}
