//! Frame-driven simulation loop
//!
//! [`Simulation::step`] advances one frame in a fixed order:
//! 1. apply control intents (gas, brake, boost policy)
//! 2. burn fuel for the tick
//! 3. step physics exactly once
//! 4. read one vehicle snapshot
//! 5. crash check, then tricks → combo → boost from that snapshot
//! 6. resolve pickup overlaps against the same snapshot
//! 7. stream terrain and pickups ahead, evict behind
//! 8. out-of-fuel policy, camera, particles
//!
//! The loop is the only writer of the physics world.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::particles::{ParticleField, ParticleKind};
use super::physics::PhysicsWorld;
use super::pickups::{PickupKind, PickupSpawner};
use super::run::{EndReason, RunStateManager, RunStats, RunStatus};
use super::state::{Camera, FrameSnapshot, PickupView, SimEvent, TerrainView};
use super::terrain::TerrainGenerator;
use super::tricks::{BoostSystem, ComboSystem, TrickSystem};
use super::vehicle::{VehicleRig, VehicleSnapshot};
use crate::config::SimConfig;

/// Particle stream is derived from the run seed but never shares draws
const PARTICLE_SEED_SALT: u64 = 0x5EED_DA57;

/// Control intents for a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickInput {
    pub gas: bool,
    pub brake: bool,
    /// One-shot boost request
    pub boost: bool,
}

/// One endless run: physics world, streamed content and gameplay state
pub struct Simulation {
    seed: u32,
    config: SimConfig,
    world: PhysicsWorld,
    terrain: TerrainGenerator,
    pickups: PickupSpawner,
    vehicle: Option<VehicleRig>,
    run: RunStateManager,
    tricks: TrickSystem,
    combo: ComboSystem,
    boost: BoostSystem,
    camera: Camera,
    particles: ParticleField,
    input: TickInput,
    time_ms: f64,
    /// Time spent empty and stalled
    stall_ms: f64,
    last_snapshot: Option<VehicleSnapshot>,
    events: Vec<SimEvent>,
}

impl Simulation {
    /// Build an idle simulation. `config` is resolved (stage and upgrades
    /// folded in) here.
    pub fn new(seed: u32, config: SimConfig) -> Self {
        let config = config.resolved();
        let w = &config.world;
        log::info!(
            "Simulation seed={} gravity={:.2} m/s² scale={} px/m",
            seed,
            w.gravity,
            w.pixels_per_meter
        );
        Self {
            seed,
            world: PhysicsWorld::new(w.gravity, w.pixels_per_meter),
            terrain: TerrainGenerator::new(seed, config.terrain.clone()),
            pickups: PickupSpawner::new(seed, config.pickups.clone()),
            vehicle: None,
            run: RunStateManager::new(config.fuel.clone(), w.pixels_per_meter),
            tricks: TrickSystem::new(config.tricks.clone()),
            combo: ComboSystem::new(config.combo.clone()),
            boost: BoostSystem::new(config.boost.clone()),
            camera: Camera::default(),
            particles: ParticleField::new(seed as u64 ^ PARTICLE_SEED_SALT),
            input: TickInput::default(),
            time_ms: 0.0,
            stall_ms: 0.0,
            last_snapshot: None,
            events: Vec::new(),
            config,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Resolved configuration in use
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn time_ms(&self) -> f64 {
        self.time_ms
    }

    pub fn run(&self) -> &RunStateManager {
        &self.run
    }

    pub fn stats(&self) -> RunStats {
        self.run.stats()
    }

    pub fn status(&self) -> RunStatus {
        self.run.status()
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn terrain(&self) -> &TerrainGenerator {
        &self.terrain
    }

    pub fn pickups(&self) -> &PickupSpawner {
        &self.pickups
    }

    pub fn vehicle(&self) -> Option<&VehicleRig> {
        self.vehicle.as_ref()
    }

    /// Snapshot taken after the last physics step
    pub fn vehicle_snapshot(&self) -> Option<VehicleSnapshot> {
        self.last_snapshot
    }

    pub fn tricks(&self) -> &TrickSystem {
        &self.tricks
    }

    pub fn combo(&self) -> &ComboSystem {
        &self.combo
    }

    pub fn boost(&self) -> &BoostSystem {
        &self.boost
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Take every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_gas(&mut self, pressed: bool) {
        self.input.gas = pressed;
    }

    pub fn set_brake(&mut self, pressed: bool) {
        self.input.brake = pressed;
    }

    /// Request a boost; consumed by the next step
    pub fn press_boost(&mut self) {
        self.input.boost = true;
    }

    pub fn apply_input(&mut self, input: &TickInput) {
        self.input.gas = input.gas;
        self.input.brake = input.brake;
        self.input.boost |= input.boost;
    }

    /// Begin a fresh run. Clears whatever the previous run left in the
    /// world and rebuilds it from the seed. Refused while a run is active.
    pub fn start_run(&mut self) -> bool {
        if self.run.is_running() {
            return false;
        }
        self.clear_world();

        let start_x = self.config.world.start_x;
        self.stream_terrain(start_x);
        let ground = DVec2::new(start_x, self.terrain.exact_height_at(start_x));
        self.vehicle = VehicleRig::spawn(&mut self.world, self.config.vehicle.clone(), ground);
        if self.vehicle.is_none() {
            log::warn!("Vehicle could not be built; run not started");
            return false;
        }
        self.stream_pickups(start_x);

        self.run = RunStateManager::new(self.config.fuel.clone(), self.config.world.pixels_per_meter);
        self.run.start_run(start_x);
        self.camera = Camera::default();
        self.camera.snap(ground, &self.config.camera);
        self.last_snapshot = self.vehicle.as_ref().map(|v| v.snapshot(&self.world));
        self.events.push(SimEvent::RunStarted { seed: self.seed });
        true
    }

    /// End the active run by request, banking any open combo
    pub fn end_run(&mut self) -> bool {
        self.finish_run(EndReason::Manual)
    }

    fn clear_world(&mut self) {
        if let Some(vehicle) = self.vehicle.take() {
            vehicle.despawn(&mut self.world);
        }
        for segment in self.terrain.reset() {
            if let Some(body) = segment.body {
                self.world.remove_body(body);
            }
        }
        for pickup in self.pickups.reset() {
            if let Some(body) = pickup.body {
                self.world.remove_body(body);
            }
        }
        self.tricks.reset();
        self.combo.reset();
        self.boost.reset();
        self.particles.clear();
        self.input = TickInput::default();
        self.time_ms = 0.0;
        self.stall_ms = 0.0;
        self.last_snapshot = None;
    }

    /// Advance one frame. `delta_sec` is clamped to the configured max step.
    pub fn step(&mut self, delta_sec: f64) {
        if !(delta_sec > 0.0) {
            return;
        }
        let dt = delta_sec.min(self.config.world.max_step);
        let dt_ms = dt * 1000.0;
        let input = self.input;
        self.input.boost = false;

        let Some(mut vehicle) = self.vehicle.take() else {
            return;
        };
        let running = self.run.is_running();

        // Controls
        let throttle = running && input.gas && !self.run.fuel().is_empty();
        if running {
            self.run.set_gas(input.gas);
            self.run.set_brake(input.brake);
            if input.boost && input.gas && self.boost.start_boost() {
                self.events.push(SimEvent::BoostStarted);
            }
            if !input.gas && self.boost.stop_boost() {
                self.events.push(SimEvent::BoostStopped);
            }
            vehicle.set_power_multiplier(self.boost.power_multiplier());
            if throttle {
                vehicle.apply_gas(&mut self.world, 1.0, dt);
            }
            vehicle.apply_brake(&mut self.world, if input.brake { 1.0 } else { 0.0 });
        }

        // Fuel
        if running {
            let had_reason = self.run.state().end_reason.is_some();
            self.run.consume_fuel(dt);
            self.run.update_time(dt_ms);
            if !had_reason && self.run.state().end_reason == Some(EndReason::OutOfFuel) {
                self.events.push(SimEvent::OutOfFuel);
            }
        }

        // Physics
        self.world.step(dt);
        self.time_ms += dt_ms;
        let snap = vehicle.snapshot(&self.world);
        debug_assert!(snap.position.is_finite(), "vehicle position went non-finite");
        self.last_snapshot = Some(snap);

        if self.run.is_running() {
            self.update_gameplay(&snap, dt_ms);
            self.collect_pickups(&vehicle);
        }

        self.stream_terrain(snap.position.x);
        self.stream_pickups(snap.position.x);
        self.check_out_of_fuel(&snap, dt_ms);

        self.camera
            .follow(snap.position, snap.velocity, &self.config.camera, dt);
        if throttle && snap.grounded {
            self.particles.burst(
                ParticleKind::Dust,
                snap.rear_wheel,
                1,
                PI - 0.3,
                0.8,
                (40.0, 120.0),
            );
        }
        if self.boost.is_boosting() {
            let exhaust = snap.position - DVec2::new(snap.rotation.cos(), snap.rotation.sin()) * 60.0;
            self.particles.burst(
                ParticleKind::Boost,
                exhaust,
                2,
                snap.rotation as f32 + PI,
                0.5,
                (150.0, 260.0),
            );
        }
        self.particles.update(dt as f32);

        self.vehicle = Some(vehicle);
    }

    fn update_gameplay(&mut self, snap: &VehicleSnapshot, dt_ms: f64) {
        self.run.update_position(snap.position.x);

        let touching = snap.grounded || snap.chassis_contact;
        if snap.flipped && touching {
            self.crash(snap);
            return;
        }

        if let Some(trick) = self
            .tricks
            .update(touching, snap.rotation, snap.velocity.y, self.time_ms)
        {
            let points = self.combo.add_trick(trick.value);
            self.boost.charge_from_trick(points);
            self.run.record_combo(self.combo.state().count);
            self.particles.burst(
                ParticleKind::Landing,
                snap.position,
                12,
                FRAC_PI_2,
                PI,
                (60.0, 180.0),
            );
            self.events.push(SimEvent::Trick(trick));
        }

        if let Some(result) = self.combo.update(dt_ms) {
            self.run.add_trick_points(result.points);
            self.events.push(SimEvent::ComboEnded(result));
        }
        if self.boost.update(dt_ms) {
            self.events.push(SimEvent::BoostStopped);
        }
        self.tricks.clear_old_tricks(self.time_ms);
    }

    fn crash(&mut self, snap: &VehicleSnapshot) {
        if !self.run.crash() {
            return;
        }
        if let Some(lost) = self.combo.break_combo() {
            self.events.push(SimEvent::ComboBroken(lost));
        }
        if self.boost.stop_boost() {
            self.events.push(SimEvent::BoostStopped);
        }
        self.particles.burst(
            ParticleKind::Landing,
            snap.position,
            24,
            FRAC_PI_2,
            2.0 * PI,
            (80.0, 260.0),
        );
        self.events.push(SimEvent::Crashed {
            distance: self.run.state().distance,
        });
        self.events.push(SimEvent::RunEnded(self.run.stats()));
    }

    fn finish_run(&mut self, reason: EndReason) -> bool {
        if !self.run.is_running() {
            return false;
        }
        if let Some(result) = self.combo.finish() {
            self.run.add_trick_points(result.points);
            self.events.push(SimEvent::ComboEnded(result));
        }
        if self.boost.stop_boost() {
            self.events.push(SimEvent::BoostStopped);
        }
        self.run.end_run(reason);
        self.events.push(SimEvent::RunEnded(self.run.stats()));
        true
    }

    fn collect_pickups(&mut self, vehicle: &VehicleRig) {
        for id in self.pickups.check_collisions(&self.world, vehicle.chassis()) {
            let Some(pickup) = self.pickups.collect_pickup(id) else {
                continue;
            };
            match pickup.kind {
                PickupKind::Coin => {
                    let value = pickup.value.max(0.0) as u32;
                    self.run.add_coins(value);
                    self.events.push(SimEvent::CoinCollected { id, value });
                    self.particles.burst(
                        ParticleKind::Coin,
                        pickup.position,
                        6,
                        FRAC_PI_2,
                        PI,
                        (40.0, 120.0),
                    );
                }
                PickupKind::Fuel => {
                    let amount = self.run.refill_fuel(pickup.value);
                    self.stall_ms = 0.0;
                    self.events.push(SimEvent::FuelCollected { id, amount });
                    self.particles.burst(
                        ParticleKind::Fuel,
                        pickup.position,
                        10,
                        FRAC_PI_2,
                        PI,
                        (40.0, 140.0),
                    );
                }
            }
        }
        for pickup in self.pickups.cleanup_collected() {
            if let Some(body) = pickup.body {
                self.world.remove_body(body);
            }
        }
    }

    /// Generate terrain around `x` and give new segments their bodies
    fn stream_terrain(&mut self, x: f64) {
        let ahead = self.config.world.terrain_ahead;
        let behind = self.config.world.terrain_behind;
        let friction = self.config.terrain.friction;

        let fresh: Vec<i64> = self
            .terrain
            .generate_segments(x - behind, x + ahead)
            .into_iter()
            .filter(|s| s.body.is_none())
            .map(|s| s.index)
            .collect();
        for index in fresh {
            let Some(desc) = self.terrain.segment(index).map(|s| s.body_desc(friction)) else {
                continue;
            };
            if let Some(body) = self.world.add_body(desc) {
                self.terrain.attach_body(index, body);
            }
        }

        for segment in self.terrain.evict_before(x - behind) {
            if let Some(body) = segment.body {
                self.world.remove_body(body);
            }
        }
    }

    fn stream_pickups(&mut self, x: f64) {
        let ahead = self.config.world.pickups_ahead;
        let behind = self.config.world.pickups_behind;

        let terrain = &mut self.terrain;
        let created = self
            .pickups
            .spawn_in_range(x, x + ahead, |px| terrain.height_at(px));
        for id in created {
            let Some(desc) = self.pickups.get(id).map(|p| p.body_desc()) else {
                continue;
            };
            if let Some(body) = self.world.add_body(desc) {
                self.pickups.attach_body(id, body);
            }
        }

        for pickup in self.pickups.remove_before(x - behind) {
            if let Some(body) = pickup.body {
                self.world.remove_body(body);
            }
        }
    }

    /// End the run once the tank is dry and the vehicle has stalled long
    /// enough
    fn check_out_of_fuel(&mut self, snap: &VehicleSnapshot, dt_ms: f64) {
        let pending = self.run.is_running()
            && self.run.fuel().is_empty()
            && self.run.state().end_reason == Some(EndReason::OutOfFuel);
        if !pending {
            self.stall_ms = 0.0;
            return;
        }
        if snap.velocity.length() < self.config.world.stall_speed {
            self.stall_ms += dt_ms;
        } else {
            self.stall_ms = 0.0;
        }
        if self.stall_ms >= self.config.world.out_of_fuel_grace_ms {
            self.finish_run(EndReason::OutOfFuel);
        }
    }

    /// Read-only view for the renderer
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            time_ms: self.time_ms,
            run: self.run.state().clone(),
            vehicle: self.last_snapshot,
            camera: self.camera,
            terrain: self
                .terrain
                .segments()
                .map(|s| TerrainView {
                    index: s.index,
                    top_vertices: s.top_vertices.clone(),
                })
                .collect(),
            pickups: self
                .pickups
                .live()
                .iter()
                .filter(|p| !p.collected)
                .map(|p| PickupView {
                    id: p.id,
                    kind: p.kind,
                    position: p.position,
                    radius: p.radius,
                })
                .collect(),
            bodies: self.world.body_views(),
            combo: self.combo.state(),
            boost: self.boost.state(),
            recent_tricks: self.tricks.recent_tricks().to_vec(),
            particles: self.particles.particles().to_vec(),
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("seed", &self.seed)
            .field("status", &self.run.status())
            .field("time_ms", &self.time_ms)
            .field("world", &self.world)
            .field("terrain", &self.terrain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FRAME_DT;
    use crate::sim::terrain::TerrainConfig;
    use crate::sim::tricks::{ComboResult, TrickKind};
    use crate::sim::vehicle::{VehicleStats, is_flipped_angle};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{PI, TAU};

    fn flat_config() -> SimConfig {
        SimConfig {
            terrain: TerrainConfig {
                min_height_variation: 0.0,
                max_height_variation: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_idle_until_started() {
        let mut sim = Simulation::new(1, SimConfig::default());
        sim.set_gas(true);
        sim.step(FRAME_DT);
        assert_eq!(sim.status(), RunStatus::Idle);
        assert!(sim.vehicle().is_none());
        assert_eq!(sim.time_ms(), 0.0);
    }

    #[test]
    fn test_start_run_builds_world() {
        let mut sim = Simulation::new(42, SimConfig::default());
        assert!(sim.start_run());
        assert!(!sim.start_run(), "already running");
        assert_eq!(sim.status(), RunStatus::Running);
        assert!(sim.vehicle().is_some());
        assert!(sim.terrain().segments().all(|s| s.body.is_some()));
        assert!(sim.pickups().live().iter().all(|p| p.body.is_some()));
        assert_eq!(sim.drain_events(), vec![SimEvent::RunStarted { seed: 42 }]);
        assert!(sim.drain_events().is_empty());
    }

    #[test]
    fn test_driving_advances_distance_and_burns_fuel() {
        let mut sim = Simulation::new(7, flat_config());
        sim.start_run();
        sim.set_gas(true);
        for _ in 0..180 {
            sim.step(FRAME_DT);
        }
        let state = sim.run().state();
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.distance > 1.0, "distance {}", state.distance);
        assert!(state.fuel < state.max_fuel);
        assert!(state.time_elapsed_sec > 2.9);
    }

    #[test]
    fn test_large_delta_is_clamped() {
        let mut sim = Simulation::new(3, SimConfig::default());
        sim.start_run();
        sim.step(5.0);
        assert!((sim.time_ms() - sim.config().world.max_step * 1000.0).abs() < 1e-9);
        sim.step(-1.0);
        sim.step(f64::NAN);
        assert!((sim.time_ms() - sim.config().world.max_step * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_streaming_keeps_live_set_bounded() {
        let mut sim = Simulation::new(11, flat_config());
        sim.start_run();
        sim.set_gas(true);
        let world = &sim.config().world;
        let max_segments =
            ((world.terrain_ahead + world.terrain_behind) / sim.config().terrain.segment_width)
                .ceil() as usize
                + 2;
        for _ in 0..600 {
            sim.step(FRAME_DT);
            assert!(sim.terrain().segment_count() <= max_segments);
        }
        let x = sim.vehicle_snapshot().unwrap().position.x;
        let behind = sim.config().world.pickups_behind;
        assert!(sim.pickups().live().iter().all(|p| p.position.x >= x - behind - 1.0));
        assert!(sim.terrain().frontier().unwrap() >= x + sim.config().world.terrain_ahead);
    }

    #[test]
    fn test_out_of_fuel_ends_after_stall() {
        let mut config = flat_config();
        config.fuel.max_fuel = 1.0;
        config.pickups.fuel_probability = 0.0;
        let mut sim = Simulation::new(5, config);
        sim.start_run();
        sim.set_gas(true);
        sim.set_brake(true);
        for _ in 0..600 {
            sim.step(FRAME_DT);
        }
        let stats = sim.stats();
        assert_eq!(sim.status(), RunStatus::Completed);
        assert_eq!(stats.end_reason, Some(EndReason::OutOfFuel));
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::OutOfFuel));
        assert!(matches!(events.last(), Some(SimEvent::RunEnded(_))));
    }

    #[test]
    fn test_manual_end_and_restart() {
        let mut sim = Simulation::new(8, SimConfig::default());
        sim.start_run();
        for _ in 0..30 {
            sim.step(FRAME_DT);
        }
        assert!(sim.end_run());
        assert!(!sim.end_run());
        assert_eq!(sim.stats().end_reason, Some(EndReason::Manual));

        assert!(sim.start_run());
        assert_eq!(sim.status(), RunStatus::Running);
        assert_eq!(sim.time_ms(), 0.0);
        assert_eq!(sim.stats().coins, 0);
        // Old content is gone: only fresh terrain, pickups and one rig remain
        assert_eq!(
            sim.world().body_count(),
            sim.terrain().segment_count() + sim.pickups().len() + 3
        );
    }

    #[test]
    fn test_boost_needs_gas_and_charge() {
        let mut sim = Simulation::new(9, flat_config());
        sim.start_run();
        sim.press_boost();
        sim.step(FRAME_DT);
        assert!(!sim.boost().is_boosting());

        sim.boost.add_boost(100.0);
        sim.set_gas(true);
        sim.press_boost();
        sim.step(FRAME_DT);
        assert!(sim.boost().is_boosting());
        assert!(sim.vehicle().unwrap().power_multiplier() > 1.0);

        sim.set_gas(false);
        sim.step(FRAME_DT);
        assert!(!sim.boost().is_boosting());
        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::BoostStarted));
        assert!(events.contains(&SimEvent::BoostStopped));
    }

    #[test]
    fn test_snapshot_reflects_world() {
        let mut sim = Simulation::new(12, SimConfig::default());
        sim.start_run();
        sim.step(FRAME_DT);
        let snap = sim.snapshot();
        assert!(snap.vehicle.is_some());
        assert_eq!(snap.terrain.len(), sim.terrain().segment_count());
        assert_eq!(snap.bodies.len(), sim.world().body_count());
        assert_eq!(snap.run.status, RunStatus::Running);
    }

    fn settled(seed: u32, config: SimConfig) -> Simulation {
        let mut sim = Simulation::new(seed, config);
        sim.start_run();
        for _ in 0..60 {
            sim.step(FRAME_DT);
        }
        sim.drain_events();
        sim
    }

    /// Turn the whole rig over about a point above the chassis
    fn flip_vehicle(sim: &mut Simulation) {
        let rig = sim.vehicle.clone().unwrap();
        let center = sim.world.position(rig.chassis()).unwrap();
        let pivot = center + DVec2::new(0.0, 40.0);
        let [rear, front] = rig.wheels();
        for body in [rig.chassis(), rear, front] {
            let offset = sim.world.position(body).unwrap() - center;
            sim.world.set_pose(body, pivot - offset, PI);
        }
    }

    #[test]
    fn test_landing_upside_down_crashes_and_forfeits_combo() {
        let mut sim = settled(21, flat_config());
        sim.combo.add_trick(100);
        flip_vehicle(&mut sim);

        for _ in 0..180 {
            sim.step(FRAME_DT);
            if sim.status() != RunStatus::Running {
                break;
            }
        }
        assert_eq!(sim.status(), RunStatus::Crashed);
        assert_eq!(sim.stats().end_reason, Some(EndReason::Crash));
        assert_eq!(sim.stats().trick_points, 0);
        assert!(!sim.combo().is_active());

        let events = sim.drain_events();
        assert!(events.contains(&SimEvent::ComboBroken(ComboResult {
            count: 1,
            multiplier: 1,
            points: 100,
        })));
        assert!(events.iter().any(|e| matches!(e, SimEvent::Crashed { .. })));
        assert!(matches!(events.last(), Some(SimEvent::RunEnded(_))));

        // Nothing more happens once the run is over
        for _ in 0..30 {
            sim.step(FRAME_DT);
        }
        assert!(sim.drain_events().is_empty());
    }

    #[test]
    fn test_overlapping_pickups_are_collected() {
        // Only the pickups placed below
        let mut config = flat_config();
        config.pickups.coin_probability = 0.0;
        config.pickups.fuel_probability = 0.0;
        let mut sim = settled(22, config);
        sim.set_gas(true);
        for _ in 0..120 {
            sim.step(FRAME_DT);
        }
        sim.set_gas(false);
        sim.drain_events();

        let at = sim.vehicle_snapshot().unwrap().position;
        let mut placed = Vec::new();
        for kind in [PickupKind::Coin, PickupKind::Fuel] {
            let id = sim.pickups.place(kind, at);
            let desc = sim.pickups.get(id).unwrap().body_desc();
            let body = sim.world.add_body(desc).unwrap();
            sim.pickups.attach_body(id, body);
            placed.push((id, body));
        }
        let coins_before = sim.run().state().coins;
        let fuel_before = sim.run().fuel().current();

        sim.step(FRAME_DT);

        assert_eq!(sim.run().state().coins, coins_before + sim.config().pickups.coin_value);
        assert!(sim.run().fuel().current() > fuel_before);
        for (id, body) in placed {
            assert!(sim.pickups().get(id).is_none());
            assert!(!sim.world().contains(body));
        }
        let events = sim.drain_events();
        assert!(events.iter().any(|e| matches!(e, SimEvent::CoinCollected { value: 1, .. })));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, SimEvent::FuelCollected { amount, .. } if *amount > 0.0))
        );
    }

    #[test]
    fn test_landed_flip_feeds_combo_and_boost() {
        let mut sim = Simulation::new(23, flat_config());
        sim.start_run();
        sim.drain_events();
        let band = VehicleStats::default().flip_band;
        let pose = |rotation: f64, grounded: bool| VehicleSnapshot {
            position: DVec2::new(400.0, 300.0),
            rotation,
            grounded,
            flipped: is_flipped_angle(rotation, band),
            ..Default::default()
        };
        let dt_ms = FRAME_DT * 1000.0;
        let frame = |sim: &mut Simulation, snap: VehicleSnapshot| {
            sim.time_ms += dt_ms;
            sim.update_gameplay(&snap, dt_ms);
        };

        frame(&mut sim, pose(0.0, true));
        for i in 1..=60 {
            let angle = crate::normalize_angle(TAU * i as f64 / 60.0);
            frame(&mut sim, pose(angle, false));
        }
        frame(&mut sim, pose(0.0, true));

        assert_eq!(sim.status(), RunStatus::Running);
        let events = sim.drain_events();
        let trick = events.iter().find_map(|e| match e {
            SimEvent::Trick(trick) => Some(trick.clone()),
            _ => None,
        });
        let trick = trick.expect("landing should score");
        assert_eq!(trick.kind, TrickKind::BackFlip);
        assert_eq!(trick.flips, 1);
        assert_eq!(sim.combo().state().count, 1);
        assert_eq!(sim.combo().state().accumulated_points, trick.value);
        assert_eq!(sim.run().state().best_combo, 1);
        let expected_charge = trick.value as f64 * sim.config().boost.charge_per_point;
        assert_abs_diff_eq!(sim.boost().state().amount, expected_charge, epsilon = 1e-9);

        // Let the window lapse on the ground; the chain banks into the run
        for _ in 0..200 {
            frame(&mut sim, pose(0.0, true));
        }
        assert!(!sim.combo().is_active());
        assert_eq!(sim.run().state().trick_points, trick.value);
        assert!(sim.drain_events().contains(&SimEvent::ComboEnded(ComboResult {
            count: 1,
            multiplier: 1,
            points: trick.value,
        })));
    }
}
