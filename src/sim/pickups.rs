//! Coin and fuel pickups
//!
//! The spawner walks a candidate x forward through a seeded stream. Every
//! candidate always consumes the same draws (spacing, kind roll, height),
//! whether or not it lands inside the requested window, so splitting a
//! range into several calls yields exactly the same pickups.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::physics::{BodyDesc, BodyHandle, BodyShape, CollisionTag, PhysicsWorld};
use super::rng::SeededRng;
use crate::consts::PICKUP_SEED_OFFSET;

/// Spawner tunables (world units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickupConfig {
    pub min_spacing: f64,
    pub max_spacing: f64,
    /// Chance a candidate becomes fuel (rolled first)
    pub fuel_probability: f64,
    /// Chance a candidate becomes coins (band after fuel)
    pub coin_probability: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub coin_value: u32,
    /// Fuel units restored by one can
    pub fuel_amount: f64,
    pub coin_radius: f64,
    pub fuel_radius: f64,
    /// Largest coin cluster
    pub coin_cluster_max: u32,
    pub coin_cluster_spacing: f64,
    /// Divides spacing; above 1 spawns more often
    pub spawn_rate_multiplier: f64,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            min_spacing: 180.0,
            max_spacing: 420.0,
            fuel_probability: 0.08,
            coin_probability: 0.55,
            min_height: 30.0,
            max_height: 90.0,
            coin_value: 1,
            fuel_amount: 35.0,
            coin_radius: 14.0,
            fuel_radius: 20.0,
            coin_cluster_max: 4,
            coin_cluster_spacing: 36.0,
            spawn_rate_multiplier: 1.0,
        }
    }
}

impl PickupConfig {
    pub fn sanitize(&mut self) {
        self.min_spacing = self.min_spacing.max(1.0);
        self.max_spacing = self.max_spacing.max(self.min_spacing);
        self.fuel_probability = self.fuel_probability.clamp(0.0, 1.0);
        self.coin_probability = self.coin_probability.clamp(0.0, 1.0);
        if self.min_height > self.max_height {
            std::mem::swap(&mut self.min_height, &mut self.max_height);
        }
        self.fuel_amount = self.fuel_amount.max(0.0);
        self.coin_radius = self.coin_radius.max(1.0);
        self.fuel_radius = self.fuel_radius.max(1.0);
        self.coin_cluster_max = self.coin_cluster_max.max(1);
        self.coin_cluster_spacing = self.coin_cluster_spacing.max(0.0);
        if !(self.spawn_rate_multiplier > 0.0) {
            self.spawn_rate_multiplier = 1.0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickupKind {
    Coin,
    Fuel,
}

/// Stable pickup identifier, unique within one spawner lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PickupId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub id: PickupId,
    pub kind: PickupKind,
    /// Coins for a coin, fuel units for a can
    pub value: f64,
    pub position: DVec2,
    pub radius: f64,
    pub collected: bool,
    pub body: Option<BodyHandle>,
}

impl Pickup {
    /// Static sensor body, overlapping the chassis only
    pub fn body_desc(&self) -> BodyDesc {
        let mut desc = BodyDesc::fixed(
            self.position,
            BodyShape::Circle {
                radius: self.radius,
            },
            CollisionTag::Pickup,
        );
        desc.sensor = true;
        desc
    }
}

/// Seeded coin/fuel placement with collection bookkeeping
#[derive(Debug, Clone)]
pub struct PickupSpawner {
    config: PickupConfig,
    rng: SeededRng,
    /// Next candidate x, not yet rolled
    next_candidate: Option<f64>,
    frontier: f64,
    pickups: Vec<Pickup>,
    next_id: u32,
}

impl PickupSpawner {
    /// `seed` is the terrain seed; the spawner offsets it internally
    pub fn new(seed: u32, mut config: PickupConfig) -> Self {
        config.sanitize();
        Self {
            config,
            rng: SeededRng::new(seed.wrapping_add(PICKUP_SEED_OFFSET)),
            next_candidate: None,
            frontier: f64::NEG_INFINITY,
            pickups: Vec::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &PickupConfig {
        &self.config
    }

    /// Furthest x spawned through so far
    pub fn frontier(&self) -> Option<f64> {
        self.frontier.is_finite().then_some(self.frontier)
    }

    /// Live pickups, in spawn order
    pub fn live(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn len(&self) -> usize {
        self.pickups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pickups.is_empty()
    }

    pub fn get(&self, id: PickupId) -> Option<&Pickup> {
        self.pickups.iter().find(|p| p.id == id)
    }

    fn spacing_draw(&mut self) -> f64 {
        let c = &self.config;
        let (min, max, rate) = (c.min_spacing, c.max_spacing, c.spawn_rate_multiplier);
        self.rng.draw_range(min, max) / rate
    }

    /// Add one pickup at `position`; the spawn walk places everything
    /// through here
    pub(crate) fn place(&mut self, kind: PickupKind, position: DVec2) -> PickupId {
        let (value, radius) = match kind {
            PickupKind::Coin => (self.config.coin_value as f64, self.config.coin_radius),
            PickupKind::Fuel => (self.config.fuel_amount, self.config.fuel_radius),
        };
        let id = PickupId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pickups.push(Pickup {
            id,
            kind,
            value,
            position,
            radius,
            collected: false,
            body: None,
        });
        id
    }

    /// Spawn pickups for candidates in `[start, end)`, placing each at
    /// `ground(x)` plus a rolled height. Returns the ids created by this call.
    ///
    /// The candidate walk is monotonic: ranges behind the frontier produce
    /// nothing new.
    pub fn spawn_in_range<F>(&mut self, start: f64, end: f64, mut ground: F) -> Vec<PickupId>
    where
        F: FnMut(f64) -> f64,
    {
        let first_new = self.pickups.len();
        if !(end > start) {
            return Vec::new();
        }

        let mut x = match self.next_candidate {
            Some(x) => x,
            None => start.max(0.0) + self.spacing_draw(),
        };
        while x < end {
            let roll = self.rng.draw();
            let height = self
                .rng
                .draw_range(self.config.min_height, self.config.max_height);
            let cluster = if roll >= self.config.fuel_probability
                && roll < self.config.fuel_probability + self.config.coin_probability
            {
                self.rng.draw_int(1, self.config.coin_cluster_max as i64 + 1)
            } else {
                0
            };

            if x >= start {
                if roll < self.config.fuel_probability {
                    let y = ground(x) + height;
                    self.place(PickupKind::Fuel, DVec2::new(x, y));
                } else if cluster > 0 {
                    for k in 0..cluster {
                        let cx = x + k as f64 * self.config.coin_cluster_spacing;
                        let y = ground(cx) + height;
                        self.place(PickupKind::Coin, DVec2::new(cx, y));
                    }
                }
            }
            x += self.spacing_draw();
        }
        self.next_candidate = Some(x);
        self.frontier = self.frontier.max(end);

        let created: Vec<PickupId> = self.pickups[first_new..].iter().map(|p| p.id).collect();
        if !created.is_empty() {
            log::trace!(
                "Spawned {} pickups in [{:.0}, {:.0})",
                created.len(),
                start,
                end
            );
        }
        created
    }

    /// Record the physics body created for a pickup
    pub fn attach_body(&mut self, id: PickupId, body: BodyHandle) {
        if let Some(p) = self.pickups.iter_mut().find(|p| p.id == id) {
            p.body = Some(body);
        }
    }

    /// Uncollected pickups whose collider overlaps the chassis right now
    pub fn check_collisions(&self, world: &PhysicsWorld, chassis: BodyHandle) -> Vec<PickupId> {
        self.pickups
            .iter()
            .filter(|p| !p.collected)
            .filter(|p| p.body.is_some_and(|body| world.intersects(chassis, body)))
            .map(|p| p.id)
            .collect()
    }

    /// Mark a pickup collected. Unknown or already-collected ids yield `None`.
    pub fn collect_pickup(&mut self, id: PickupId) -> Option<Pickup> {
        let pickup = self.pickups.iter_mut().find(|p| p.id == id)?;
        if pickup.collected {
            return None;
        }
        pickup.collected = true;
        log::debug!("Collected {:?} {:?} worth {}", pickup.kind, id, pickup.value);
        Some(pickup.clone())
    }

    /// Drop collected pickups; caller removes their bodies
    pub fn cleanup_collected(&mut self) -> Vec<Pickup> {
        let (collected, live): (Vec<Pickup>, Vec<Pickup>) =
            std::mem::take(&mut self.pickups).into_iter().partition(|p| p.collected);
        self.pickups = live;
        collected
    }

    /// Evict pickups left of `x`; caller removes their bodies
    pub fn remove_before(&mut self, x: f64) -> Vec<Pickup> {
        let (behind, live): (Vec<Pickup>, Vec<Pickup>) = std::mem::take(&mut self.pickups)
            .into_iter()
            .partition(|p| p.position.x < x);
        self.pickups = live;
        behind
    }

    /// Forget every pickup and rewind the stream to its seed
    pub fn reset(&mut self) -> Vec<Pickup> {
        self.rng.reset();
        self.next_candidate = None;
        self.frontier = f64::NEG_INFINITY;
        self.next_id = 0;
        std::mem::take(&mut self.pickups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{FRAME_DT, GRAVITY, PIXELS_PER_METER};

    fn flat(_: f64) -> f64 {
        100.0
    }

    fn layout(spawner: &PickupSpawner) -> Vec<(PickupKind, u64, u64)> {
        spawner
            .live()
            .iter()
            .map(|p| (p.kind, p.position.x.to_bits(), p.position.y.to_bits()))
            .collect()
    }

    #[test]
    fn test_same_seed_same_pickups() {
        let mut a = PickupSpawner::new(123, PickupConfig::default());
        let mut b = PickupSpawner::new(123, PickupConfig::default());
        a.spawn_in_range(0.0, 5000.0, flat);
        b.spawn_in_range(0.0, 5000.0, flat);
        assert_eq!(layout(&a), layout(&b));
        assert!(!a.is_empty());
    }

    #[test]
    fn test_partition_independent() {
        let mut whole = PickupSpawner::new(77, PickupConfig::default());
        whole.spawn_in_range(0.0, 6000.0, flat);
        let mut parts = PickupSpawner::new(77, PickupConfig::default());
        for window in [(0.0, 500.0), (500.0, 2100.0), (2100.0, 6000.0)] {
            parts.spawn_in_range(window.0, window.1, flat);
        }
        assert_eq!(layout(&whole), layout(&parts));
    }

    #[test]
    fn test_behind_frontier_spawns_nothing() {
        let mut spawner = PickupSpawner::new(5, PickupConfig::default());
        spawner.spawn_in_range(0.0, 3000.0, flat);
        let count = spawner.len();
        assert!(spawner.spawn_in_range(0.0, 2000.0, flat).is_empty());
        assert!(spawner.spawn_in_range(800.0, 800.0, flat).is_empty());
        assert_eq!(spawner.len(), count);
        assert_eq!(spawner.frontier(), Some(3000.0));
    }

    #[test]
    fn test_pickups_sit_above_ground() {
        let config = PickupConfig::default();
        let mut spawner = PickupSpawner::new(9, config.clone());
        spawner.spawn_in_range(0.0, 8000.0, flat);
        for p in spawner.live() {
            let lift = p.position.y - 100.0;
            assert!(lift >= config.min_height && lift < config.max_height);
            match p.kind {
                PickupKind::Coin => assert_eq!(p.value, 1.0),
                PickupKind::Fuel => assert_eq!(p.value, config.fuel_amount),
            }
        }
    }

    #[test]
    fn test_probability_bands() {
        let only_fuel = PickupConfig {
            fuel_probability: 1.0,
            coin_probability: 0.0,
            ..Default::default()
        };
        let mut spawner = PickupSpawner::new(1, only_fuel);
        spawner.spawn_in_range(0.0, 5000.0, flat);
        assert!(spawner.live().iter().all(|p| p.kind == PickupKind::Fuel));

        let nothing = PickupConfig {
            fuel_probability: 0.0,
            coin_probability: 0.0,
            ..Default::default()
        };
        let mut spawner = PickupSpawner::new(1, nothing);
        assert!(spawner.spawn_in_range(0.0, 5000.0, flat).is_empty());
    }

    #[test]
    fn test_spawn_rate_multiplier_packs_candidates() {
        let base = PickupConfig {
            fuel_probability: 1.0,
            coin_probability: 0.0,
            ..Default::default()
        };
        let dense = PickupConfig {
            spawn_rate_multiplier: 2.0,
            ..base.clone()
        };
        let mut a = PickupSpawner::new(4, base);
        let mut b = PickupSpawner::new(4, dense);
        a.spawn_in_range(0.0, 20_000.0, flat);
        b.spawn_in_range(0.0, 20_000.0, flat);
        assert!(b.len() > a.len());
    }

    #[test]
    fn test_collect_is_idempotent() {
        let mut spawner = PickupSpawner::new(123, PickupConfig::default());
        let ids = spawner.spawn_in_range(0.0, 1000.0, flat);
        let first = ids[0];
        assert!(spawner.collect_pickup(first).is_some());
        assert!(spawner.collect_pickup(first).is_none());
        assert!(spawner.collect_pickup(PickupId(9999)).is_none());
        let before = spawner.len();
        let cleaned = spawner.cleanup_collected();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].id, first);
        assert_eq!(spawner.len(), before - 1);
        assert!(spawner.get(first).is_none());
    }

    #[test]
    fn test_remove_before() {
        let mut spawner = PickupSpawner::new(31, PickupConfig::default());
        spawner.spawn_in_range(0.0, 6000.0, flat);
        let total = spawner.len();
        let evicted = spawner.remove_before(3000.0);
        assert!(evicted.iter().all(|p| p.position.x < 3000.0));
        assert!(spawner.live().iter().all(|p| p.position.x >= 3000.0));
        assert_eq!(evicted.len() + spawner.len(), total);
    }

    #[test]
    fn test_reset_rewinds_stream() {
        let mut spawner = PickupSpawner::new(64, PickupConfig::default());
        spawner.spawn_in_range(0.0, 4000.0, flat);
        let first = layout(&spawner);
        let dropped = spawner.reset();
        assert_eq!(dropped.len(), first.len());
        assert!(spawner.is_empty());
        assert!(spawner.frontier().is_none());
        spawner.spawn_in_range(0.0, 4000.0, flat);
        assert_eq!(layout(&spawner), first);
        assert_eq!(spawner.live()[0].id, PickupId(0));
    }

    #[test]
    fn test_collision_requires_overlap_and_uncollected() {
        let mut world = PhysicsWorld::new(GRAVITY, PIXELS_PER_METER);
        let config = PickupConfig {
            fuel_probability: 1.0,
            coin_probability: 0.0,
            ..Default::default()
        };
        let mut spawner = PickupSpawner::new(2, config);
        spawner.spawn_in_range(0.0, 3000.0, flat);
        let ids: Vec<PickupId> = spawner.live().iter().map(|p| p.id).collect();
        for id in &ids {
            let desc = spawner.get(*id).unwrap().body_desc();
            let body = world.add_body(desc).unwrap();
            spawner.attach_body(*id, body);
        }

        let target = spawner.get(ids[0]).unwrap().position;
        let chassis = world
            .add_body(BodyDesc::fixed(
                target,
                BodyShape::Box {
                    half_width: 10.0,
                    half_height: 10.0,
                },
                CollisionTag::Chassis,
            ))
            .unwrap();
        world.step(FRAME_DT);

        let hits = spawner.check_collisions(&world, chassis);
        assert_eq!(hits, vec![ids[0]]);
        spawner.collect_pickup(ids[0]);
        assert!(spawner.check_collisions(&world, chassis).is_empty());
    }
}
