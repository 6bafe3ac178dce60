//! Fuel tank and run lifecycle
//!
//! Neither type touches physics. The simulation loop feeds them positions,
//! throttle state and elapsed time, and reads the outcome back through
//! [`RunState`].

use serde::{Deserialize, Serialize};

/// Extra tank capacity per upgrade level
const TANK_GAIN_PER_LEVEL: f64 = 0.10;

/// Tank size and drain rates (units per second)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelConfig {
    pub max_fuel: f64,
    /// Always drained while the engine runs
    pub base_rate: f64,
    /// Extra drain while throttling
    pub throttle_rate: f64,
    /// Extra drain while braking
    pub brake_rate: f64,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            max_fuel: 100.0,
            base_rate: 0.6,
            throttle_rate: 2.2,
            brake_rate: 0.4,
        }
    }
}

impl FuelConfig {
    pub fn sanitize(&mut self) {
        self.max_fuel = self.max_fuel.max(0.0);
        self.base_rate = self.base_rate.max(0.0);
        self.throttle_rate = self.throttle_rate.max(0.0);
        self.brake_rate = self.brake_rate.max(0.0);
    }

    /// Config with the tank upgrade applied (level clamped)
    pub fn with_tank_level(&self, level: u8) -> Self {
        let level = level.min(crate::consts::MAX_UPGRADE_LEVEL) as f64;
        Self {
            max_fuel: self.max_fuel * (1.0 + TANK_GAIN_PER_LEVEL * level),
            ..self.clone()
        }
    }
}

/// Fuel tank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelSystem {
    config: FuelConfig,
    current: f64,
}

impl FuelSystem {
    /// Starts full
    pub fn new(mut config: FuelConfig) -> Self {
        config.sanitize();
        let current = config.max_fuel;
        Self { config, current }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn max_fuel(&self) -> f64 {
        self.config.max_fuel
    }

    pub fn config(&self) -> &FuelConfig {
        &self.config
    }

    /// Fill level in [0, 1]
    pub fn percentage(&self) -> f64 {
        if self.config.max_fuel <= 0.0 {
            0.0
        } else {
            self.current / self.config.max_fuel
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current <= 0.0
    }

    /// Drain for `delta_sec` seconds. Returns the amount actually removed.
    pub fn consume(&mut self, delta_sec: f64, throttling: bool, braking: bool) -> f64 {
        let delta_sec = delta_sec.max(0.0);
        let mut rate = self.config.base_rate;
        if throttling {
            rate += self.config.throttle_rate;
        }
        if braking {
            rate += self.config.brake_rate;
        }
        let drained = (rate * delta_sec).min(self.current);
        self.current -= drained;
        drained
    }

    /// Add fuel up to the tank size. Returns the amount actually added.
    pub fn refill(&mut self, amount: f64) -> f64 {
        let added = amount.max(0.0).min(self.config.max_fuel - self.current);
        self.current += added;
        added
    }

    /// Resize the tank, keeping the fill percentage
    pub fn set_max_fuel(&mut self, max_fuel: f64) {
        let pct = self.percentage();
        self.config.max_fuel = max_fuel.max(0.0);
        self.current = (pct * self.config.max_fuel).clamp(0.0, self.config.max_fuel);
    }

    pub fn reset(&mut self) {
        self.current = self.config.max_fuel;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Crashed,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Crashed => "crashed",
            RunStatus::Completed => "completed",
        }
    }

    /// True once the run can no longer change
    pub fn is_over(&self) -> bool {
        matches!(self, RunStatus::Crashed | RunStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Crash,
    OutOfFuel,
    Manual,
}

/// Everything tracked for a single run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    /// Metres from the start line (never negative)
    pub distance: f64,
    /// Furthest distance reached this run
    pub max_distance: f64,
    pub coins: u32,
    pub trick_points: u32,
    pub best_combo: u32,
    pub time_elapsed_sec: f64,
    pub start_x: f64,
    pub current_x: f64,
    pub fuel: f64,
    pub max_fuel: f64,
    pub gas_pressed: bool,
    pub brake_pressed: bool,
    pub end_reason: Option<EndReason>,
}

/// Persistence-facing summary of a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub distance: f64,
    pub max_distance: f64,
    pub coins: u32,
    pub trick_points: u32,
    pub best_combo: u32,
    pub time_elapsed_sec: f64,
    pub end_reason: Option<EndReason>,
}

/// Run state machine: Idle → Running → {Crashed, Completed}
#[derive(Debug, Clone)]
pub struct RunStateManager {
    state: RunState,
    fuel: FuelSystem,
    pixels_per_meter: f64,
}

impl RunStateManager {
    pub fn new(fuel: FuelConfig, pixels_per_meter: f64) -> Self {
        let fuel = FuelSystem::new(fuel);
        let mut manager = Self {
            state: RunState::default(),
            fuel,
            pixels_per_meter: pixels_per_meter.max(f64::EPSILON),
        };
        manager.sync_fuel();
        manager
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn is_running(&self) -> bool {
        self.state.status == RunStatus::Running
    }

    pub fn fuel(&self) -> &FuelSystem {
        &self.fuel
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            distance: self.state.distance,
            max_distance: self.state.max_distance,
            coins: self.state.coins,
            trick_points: self.state.trick_points,
            best_combo: self.state.best_combo,
            time_elapsed_sec: self.state.time_elapsed_sec,
            end_reason: self.state.end_reason,
        }
    }

    fn sync_fuel(&mut self) {
        self.state.fuel = self.fuel.current();
        self.state.max_fuel = self.fuel.max_fuel();
    }

    /// Idle → Running. Clears every run-scoped counter and fills the tank.
    /// Ignored in any other state.
    pub fn start_run(&mut self, start_x: f64) -> bool {
        if self.state.status != RunStatus::Idle {
            return false;
        }
        self.fuel.reset();
        self.state = RunState {
            status: RunStatus::Running,
            start_x,
            current_x: start_x,
            ..Default::default()
        };
        self.sync_fuel();
        log::info!("Run started at x={:.0} with {:.0} fuel", start_x, self.fuel.current());
        true
    }

    pub fn update_position(&mut self, x: f64) {
        if !self.is_running() {
            return;
        }
        debug_assert!(x.is_finite(), "non-finite vehicle position");
        self.state.current_x = x;
        self.state.distance = ((x - self.state.start_x) / self.pixels_per_meter).max(0.0);
        self.state.max_distance = self.state.max_distance.max(self.state.distance);
    }

    pub fn update_time(&mut self, delta_ms: f64) {
        if self.is_running() {
            self.state.time_elapsed_sec += delta_ms.max(0.0) / 1000.0;
        }
    }

    pub fn add_coins(&mut self, coins: u32) {
        if self.is_running() {
            self.state.coins = self.state.coins.saturating_add(coins);
        }
    }

    pub fn add_trick_points(&mut self, points: u32) {
        if self.is_running() {
            self.state.trick_points = self.state.trick_points.saturating_add(points);
        }
    }

    pub fn record_combo(&mut self, count: u32) {
        if self.is_running() {
            self.state.best_combo = self.state.best_combo.max(count);
        }
    }

    pub fn set_gas(&mut self, pressed: bool) {
        if self.is_running() {
            self.state.gas_pressed = pressed;
        }
    }

    pub fn set_brake(&mut self, pressed: bool) {
        if self.is_running() {
            self.state.brake_pressed = pressed;
        }
    }

    /// Drain fuel for this tick using the current control flags. Records
    /// the out-of-fuel reason once the tank runs dry.
    pub fn consume_fuel(&mut self, delta_sec: f64) -> f64 {
        if !self.is_running() {
            return 0.0;
        }
        let drained = self
            .fuel
            .consume(delta_sec, self.state.gas_pressed, self.state.brake_pressed);
        self.sync_fuel();
        if self.fuel.is_empty() {
            self.out_of_fuel();
        }
        drained
    }

    /// Returns the amount actually added
    pub fn refill_fuel(&mut self, amount: f64) -> f64 {
        if !self.is_running() {
            return 0.0;
        }
        let added = self.fuel.refill(amount);
        self.sync_fuel();
        // A refill before the run ends cancels the pending out-of-fuel
        if added > 0.0 && self.state.end_reason == Some(EndReason::OutOfFuel) {
            self.state.end_reason = None;
        }
        added
    }

    /// Upgrade hook, keeps the fill percentage
    pub fn set_max_fuel(&mut self, max_fuel: f64) {
        self.fuel.set_max_fuel(max_fuel);
        self.sync_fuel();
    }

    /// Records the reason only. Status stays `Running`; the caller ends the
    /// run with [`RunStateManager::end_run`]. Returns true the first time.
    pub fn out_of_fuel(&mut self) -> bool {
        if !self.is_running() || self.state.end_reason.is_some() {
            return false;
        }
        self.state.end_reason = Some(EndReason::OutOfFuel);
        log::info!("Out of fuel at {:.1} m", self.state.distance);
        true
    }

    /// Running → Crashed. No-op in any other state.
    pub fn crash(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state.status = RunStatus::Crashed;
        self.state.end_reason = Some(EndReason::Crash);
        self.state.gas_pressed = false;
        self.state.brake_pressed = false;
        log::info!("Crashed at {:.1} m", self.state.distance);
        true
    }

    /// Running → Completed. No-op in any other state.
    pub fn end_run(&mut self, reason: EndReason) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state.status = RunStatus::Completed;
        self.state.end_reason = Some(reason);
        self.state.gas_pressed = false;
        self.state.brake_pressed = false;
        log::info!(
            "Run ended ({:?}) at {:.1} m after {:.1}s",
            reason,
            self.state.distance,
            self.state.time_elapsed_sec
        );
        true
    }
}
