//! Tricks, combos and boost
//!
//! Three small state machines fed from the vehicle snapshot each frame:
//! - [`TrickSystem`] watches ground contact and chassis angle, and scores a
//!   trick on the landing edge only
//! - [`ComboSystem`] chains tricks inside an inactivity window into a
//!   multiplier tier
//! - [`BoostSystem`] turns trick points into boost charge
//!
//! Times are milliseconds of simulated time.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::shortest_angle_delta;

// === Tricks ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrickConfig {
    /// Shorter hops are ignored
    pub min_air_ms: f64,
    /// Slack subtracted from a full turn when counting flips (radians)
    pub flip_tolerance: f64,
    pub flip_points: u32,
    /// Rotation at least this large scores a partial rotation
    pub partial_rotation: f64,
    pub partial_points: u32,
    /// Airtime that scores on its own
    pub big_air_ms: f64,
    pub big_air_points: u32,
    /// How long a trick stays in the recent list
    pub display_ms: f64,
}

impl Default for TrickConfig {
    fn default() -> Self {
        Self {
            min_air_ms: 250.0,
            flip_tolerance: 0.35,
            flip_points: 100,
            partial_rotation: PI,
            partial_points: 25,
            big_air_ms: 1200.0,
            big_air_points: 50,
            display_ms: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrickKind {
    /// Nose-up (counter-clockwise) full rotations
    BackFlip,
    /// Nose-down (clockwise) full rotations
    FrontFlip,
    PartialRotation,
    BigAir,
}

impl TrickKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrickKind::BackFlip => "Back Flip",
            TrickKind::FrontFlip => "Front Flip",
            TrickKind::PartialRotation => "Half Spin",
            TrickKind::BigAir => "Big Air",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickRecord {
    pub kind: TrickKind,
    pub value: u32,
    /// Landing time
    pub timestamp_ms: f64,
    pub air_time_ms: f64,
    /// Net signed rotation while airborne (radians)
    pub rotation: f64,
    /// Completed flips (0 for non-flip tricks)
    pub flips: u32,
    /// Vertical speed on touchdown
    pub landing_velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AirPhase {
    start_ms: f64,
    last_angle: f64,
    rotation: f64,
}

/// Scores aerial rotations on the airborne → grounded edge
#[derive(Debug, Clone, Default)]
pub struct TrickSystem {
    config: TrickConfig,
    was_grounded: Option<bool>,
    air: Option<AirPhase>,
    recent: Vec<TrickRecord>,
}

impl TrickSystem {
    pub fn new(config: TrickConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &TrickConfig {
        &self.config
    }

    pub fn is_airborne(&self) -> bool {
        self.air.is_some()
    }

    /// Net rotation of the jump in progress
    pub fn air_rotation(&self) -> f64 {
        self.air.map_or(0.0, |a| a.rotation)
    }

    /// Tricks landed within the display window
    pub fn recent_tricks(&self) -> &[TrickRecord] {
        &self.recent
    }

    /// Feed one frame. Returns a trick only on a scoring landing.
    pub fn update(
        &mut self,
        grounded: bool,
        angle: f64,
        vertical_velocity: f64,
        timestamp_ms: f64,
    ) -> Option<TrickRecord> {
        let was_grounded = self.was_grounded.replace(grounded);

        if let Some(air) = self.air.as_mut() {
            air.rotation += shortest_angle_delta(air.last_angle, angle);
            air.last_angle = angle;
        }

        match (was_grounded, grounded) {
            (Some(true), false) => {
                self.air = Some(AirPhase {
                    start_ms: timestamp_ms,
                    last_angle: angle,
                    rotation: 0.0,
                });
                None
            }
            (_, true) => {
                let air = self.air.take()?;
                let trick = self.classify(air, vertical_velocity, timestamp_ms)?;
                log::debug!(
                    "{} x{} for {} ({:.0} ms air)",
                    trick.kind.as_str(),
                    trick.flips.max(1),
                    trick.value,
                    trick.air_time_ms
                );
                self.recent.push(trick.clone());
                Some(trick)
            }
            _ => None,
        }
    }

    fn classify(&self, air: AirPhase, landing_velocity: f64, now_ms: f64) -> Option<TrickRecord> {
        let c = &self.config;
        let air_time_ms = now_ms - air.start_ms;
        if air_time_ms < c.min_air_ms {
            return None;
        }
        let magnitude = air.rotation.abs();
        let flips = ((magnitude + c.flip_tolerance) / TAU).floor() as u32;

        let (kind, value) = if flips > 0 {
            let kind = if air.rotation > 0.0 {
                TrickKind::BackFlip
            } else {
                TrickKind::FrontFlip
            };
            (kind, c.flip_points.saturating_mul(flips))
        } else if magnitude >= c.partial_rotation {
            (TrickKind::PartialRotation, c.partial_points)
        } else if air_time_ms >= c.big_air_ms {
            (TrickKind::BigAir, c.big_air_points)
        } else {
            return None;
        };

        Some(TrickRecord {
            kind,
            value,
            timestamp_ms: now_ms,
            air_time_ms,
            rotation: air.rotation,
            flips,
            landing_velocity,
        })
    }

    /// Drop display entries older than the display window
    pub fn clear_old_tricks(&mut self, now_ms: f64) {
        let keep = self.config.display_ms;
        self.recent.retain(|t| t.timestamp_ms + keep > now_ms);
    }

    pub fn reset(&mut self) {
        self.was_grounded = None;
        self.air = None;
        self.recent.clear();
    }
}

// === Combos ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    /// Inactivity window after each trick
    pub window_ms: f64,
    /// `[min_count, multiplier]`, ascending by count
    pub tiers: Vec<[u32; 2]>,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            window_ms: 3000.0,
            tiers: vec![[1, 1], [2, 2], [4, 3], [6, 4], [10, 5]],
        }
    }
}

impl ComboConfig {
    /// Multiplier for a chain of `count` tricks (1 when no tier matches)
    pub fn multiplier_for(&self, count: u32) -> u32 {
        self.tiers
            .iter()
            .filter(|[min, _]| count >= *min)
            .map(|[_, mult]| *mult)
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComboState {
    pub count: u32,
    pub multiplier: u32,
    pub accumulated_points: u32,
    pub time_remaining_ms: f64,
    pub max_combo: u32,
}

/// A finished chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboResult {
    pub count: u32,
    pub multiplier: u32,
    pub points: u32,
}

#[derive(Debug, Clone)]
pub struct ComboSystem {
    config: ComboConfig,
    state: ComboState,
}

impl ComboSystem {
    pub fn new(config: ComboConfig) -> Self {
        Self {
            config,
            state: ComboState {
                multiplier: 1,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> ComboState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.count > 0
    }

    /// Chain a trick. Returns the points it was worth after the multiplier.
    pub fn add_trick(&mut self, value: u32) -> u32 {
        let s = &mut self.state;
        s.count += 1;
        s.multiplier = self.config.multiplier_for(s.count).max(s.multiplier);
        let points = value.saturating_mul(s.multiplier);
        s.accumulated_points = s.accumulated_points.saturating_add(points);
        s.time_remaining_ms = self.config.window_ms;
        s.max_combo = s.max_combo.max(s.count);
        points
    }

    /// Tick the inactivity timer; returns the chain once it lapses
    pub fn update(&mut self, delta_ms: f64) -> Option<ComboResult> {
        if !self.is_active() {
            return None;
        }
        self.state.time_remaining_ms -= delta_ms.max(0.0);
        if self.state.time_remaining_ms > 0.0 {
            return None;
        }
        let result = self.take();
        log::debug!(
            "Combo x{} ended: {} tricks, {} points",
            result.multiplier,
            result.count,
            result.points
        );
        Some(result)
    }

    /// End the chain now and keep its points (run completion)
    pub fn finish(&mut self) -> Option<ComboResult> {
        self.is_active().then(|| self.take())
    }

    /// End the chain now and forfeit its points (crash)
    pub fn break_combo(&mut self) -> Option<ComboResult> {
        let lost = self.finish();
        if let Some(lost) = lost {
            log::debug!("Combo broken, {} points lost", lost.points);
        }
        lost
    }

    fn take(&mut self) -> ComboResult {
        let s = &mut self.state;
        let result = ComboResult {
            count: s.count,
            multiplier: s.multiplier,
            points: s.accumulated_points,
        };
        s.count = 0;
        s.multiplier = 1;
        s.accumulated_points = 0;
        s.time_remaining_ms = 0.0;
        result
    }

    /// Full reset, including the high-water mark
    pub fn reset(&mut self) {
        self.state = ComboState {
            multiplier: 1,
            ..Default::default()
        };
    }
}

// === Boost ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    pub max_amount: f64,
    /// Charge needed to start
    pub min_to_start: f64,
    /// Charge burned per second while boosting
    pub drain_per_sec: f64,
    /// Lockout after a boost ends
    pub cooldown_ms: f64,
    pub power_multiplier: f64,
    /// Charge gained per trick point
    pub charge_per_point: f64,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            max_amount: 100.0,
            min_to_start: 20.0,
            drain_per_sec: 35.0,
            cooldown_ms: 1500.0,
            power_multiplier: 1.6,
            charge_per_point: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostState {
    pub amount: f64,
    pub is_boosting: bool,
    pub cooldown_ms: f64,
    pub power_multiplier: f64,
}

impl Default for BoostState {
    fn default() -> Self {
        Self {
            amount: 0.0,
            is_boosting: false,
            cooldown_ms: 0.0,
            power_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoostSystem {
    config: BoostConfig,
    state: BoostState,
}

impl BoostSystem {
    pub fn new(mut config: BoostConfig) -> Self {
        config.max_amount = config.max_amount.max(0.0);
        config.power_multiplier = config.power_multiplier.max(1.0);
        Self {
            config,
            state: BoostState::default(),
        }
    }

    pub fn state(&self) -> BoostState {
        self.state
    }

    pub fn is_boosting(&self) -> bool {
        self.state.is_boosting
    }

    pub fn power_multiplier(&self) -> f64 {
        self.state.power_multiplier
    }

    pub fn add_boost(&mut self, amount: f64) {
        self.state.amount = (self.state.amount + amount.max(0.0)).min(self.config.max_amount);
    }

    /// Convert trick points into charge
    pub fn charge_from_trick(&mut self, points: u32) {
        self.add_boost(points as f64 * self.config.charge_per_point);
    }

    pub fn can_boost(&self) -> bool {
        self.state.amount >= self.config.min_to_start
            && self.state.amount > 0.0
            && !self.state.is_boosting
            && self.state.cooldown_ms <= 0.0
    }

    pub fn start_boost(&mut self) -> bool {
        if !self.can_boost() {
            return false;
        }
        self.state.is_boosting = true;
        self.state.power_multiplier = self.config.power_multiplier;
        log::debug!("Boost on ({:.0} charge)", self.state.amount);
        true
    }

    pub fn stop_boost(&mut self) -> bool {
        if !self.state.is_boosting {
            return false;
        }
        self.state.is_boosting = false;
        self.state.power_multiplier = 1.0;
        self.state.cooldown_ms = self.config.cooldown_ms;
        log::debug!("Boost off ({:.0} charge left)", self.state.amount);
        true
    }

    /// Drain while boosting, otherwise tick the cooldown. Returns true if
    /// the boost ran dry this tick.
    pub fn update(&mut self, delta_ms: f64) -> bool {
        let delta_ms = delta_ms.max(0.0);
        if self.state.is_boosting {
            self.state.amount -= self.config.drain_per_sec * delta_ms / 1000.0;
            if self.state.amount <= 0.0 {
                self.state.amount = 0.0;
                self.stop_boost();
                return true;
            }
        } else if self.state.cooldown_ms > 0.0 {
            self.state.cooldown_ms = (self.state.cooldown_ms - delta_ms).max(0.0);
        }
        false
    }

    pub fn reset(&mut self) {
        self.state = BoostState::default();
    }
}
