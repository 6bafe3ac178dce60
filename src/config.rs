//! Simulation configuration
//!
//! Every tunable is a plain serde struct with defaults, so a JSON document
//! only needs the keys it wants to change. Stage and vehicle definitions from
//! outside the core arrive here and are applied verbatim, after basic
//! clamping.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{GRAVITY, MAX_STEP, PIXELS_PER_METER, START_X};
use crate::sim::pickups::PickupConfig;
use crate::sim::run::FuelConfig;
use crate::sim::terrain::TerrainConfig;
use crate::sim::tricks::{BoostConfig, ComboConfig, TrickConfig};
use crate::sim::vehicle::{UpgradeLevels, VehiclePreset, VehicleStats};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// World scale, streaming distances and run-end policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub pixels_per_meter: f64,
    /// Downward gravity in m/s²
    pub gravity: f64,
    /// Largest delta integrated in one step (seconds)
    pub max_step: f64,
    /// Where runs start
    pub start_x: f64,
    /// Terrain kept generated ahead of the vehicle
    pub terrain_ahead: f64,
    /// Terrain kept behind the vehicle before eviction
    pub terrain_behind: f64,
    pub pickups_ahead: f64,
    pub pickups_behind: f64,
    /// Below this speed (px/s) an empty tank counts as stalled
    pub stall_speed: f64,
    /// How long a stalled, empty vehicle may coast before the run ends
    pub out_of_fuel_grace_ms: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pixels_per_meter: PIXELS_PER_METER,
            gravity: GRAVITY,
            max_step: MAX_STEP,
            start_x: START_X,
            terrain_ahead: 2400.0,
            terrain_behind: 1600.0,
            pickups_ahead: 2000.0,
            pickups_behind: 1600.0,
            stall_speed: 20.0,
            out_of_fuel_grace_ms: 2500.0,
        }
    }
}

impl WorldConfig {
    pub fn sanitize(&mut self) {
        if !(self.pixels_per_meter > 0.0) {
            self.pixels_per_meter = PIXELS_PER_METER;
        }
        self.gravity = self.gravity.max(0.0);
        if !(self.max_step > 0.0) {
            self.max_step = MAX_STEP;
        }
        self.terrain_ahead = self.terrain_ahead.max(0.0);
        self.terrain_behind = self.terrain_behind.max(0.0);
        self.pickups_ahead = self.pickups_ahead.max(0.0);
        self.pickups_behind = self.pickups_behind.max(0.0);
        self.stall_speed = self.stall_speed.max(0.0);
        self.out_of_fuel_grace_ms = self.out_of_fuel_grace_ms.max(0.0);
    }
}

/// Follow camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Exponential follow rate (1/s)
    pub follow_rate: f64,
    /// Seconds of velocity to look ahead
    pub look_ahead_time: f64,
    /// Look-ahead never exceeds this (px)
    pub max_look_ahead: f64,
    /// Keep the vehicle below screen centre by this much
    pub vertical_offset: f64,
    pub zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_rate: 6.0,
            look_ahead_time: 0.35,
            max_look_ahead: 220.0,
            vertical_offset: 80.0,
            zoom: 1.0,
        }
    }
}

/// Multipliers a stage applies on top of the base tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageModifiers {
    pub gravity_multiplier: f64,
    pub friction_multiplier: f64,
    pub spawn_rate_multiplier: f64,
    pub difficulty_multiplier: f64,
}

impl Default for StageModifiers {
    fn default() -> Self {
        Self {
            gravity_multiplier: 1.0,
            friction_multiplier: 1.0,
            spawn_rate_multiplier: 1.0,
            difficulty_multiplier: 1.0,
        }
    }
}

/// Built-in stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StagePreset {
    #[default]
    Countryside,
    Desert,
    Arctic,
    Moon,
}

impl StagePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagePreset::Countryside => "Countryside",
            StagePreset::Desert => "Desert",
            StagePreset::Arctic => "Arctic",
            StagePreset::Moon => "Moon",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "countryside" | "country" => Some(StagePreset::Countryside),
            "desert" => Some(StagePreset::Desert),
            "arctic" | "snow" => Some(StagePreset::Arctic),
            "moon" => Some(StagePreset::Moon),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> StageModifiers {
        match self {
            StagePreset::Countryside => StageModifiers::default(),
            StagePreset::Desert => StageModifiers {
                friction_multiplier: 0.75,
                spawn_rate_multiplier: 0.9,
                difficulty_multiplier: 1.2,
                ..Default::default()
            },
            StagePreset::Arctic => StageModifiers {
                friction_multiplier: 0.45,
                spawn_rate_multiplier: 1.1,
                ..Default::default()
            },
            StagePreset::Moon => StageModifiers {
                gravity_multiplier: 0.3,
                friction_multiplier: 0.9,
                spawn_rate_multiplier: 1.2,
                difficulty_multiplier: 1.5,
            },
        }
    }
}

/// Everything a [`crate::Simulation`] is built from
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub stage: StagePreset,
    pub vehicle: VehicleStats,
    pub upgrades: UpgradeLevels,
    pub terrain: TerrainConfig,
    pub pickups: PickupConfig,
    pub fuel: FuelConfig,
    pub tricks: TrickConfig,
    pub combo: ComboConfig,
    pub boost: BoostConfig,
    pub world: WorldConfig,
    pub camera: CameraConfig,
}

impl SimConfig {
    /// Default tuning on the given stage
    pub fn for_stage(stage: StagePreset) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    /// Swap in a built-in vehicle
    pub fn with_vehicle(mut self, preset: VehiclePreset) -> Self {
        self.vehicle = preset.stats();
        self
    }

    pub fn with_upgrades(mut self, upgrades: UpgradeLevels) -> Self {
        self.upgrades = upgrades.clamped();
        self
    }

    /// Parse a (possibly partial) JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: SimConfig = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Basic clamping on every section
    pub fn sanitize(&mut self) {
        self.upgrades = self.upgrades.clamped();
        self.vehicle.sanitize();
        self.terrain.sanitize();
        self.pickups.sanitize();
        self.fuel.sanitize();
        self.world.sanitize();
        self.camera.follow_rate = self.camera.follow_rate.max(0.0);
        self.camera.look_ahead_time = self.camera.look_ahead_time.max(0.0);
        self.camera.max_look_ahead = self.camera.max_look_ahead.max(0.0);
        if !(self.camera.zoom > 0.0) {
            self.camera.zoom = 1.0;
        }
    }

    /// Effective tuning with stage modifiers and upgrades folded in.
    ///
    /// The result carries the neutral stage and no upgrades, so resolving it
    /// again changes nothing.
    pub fn resolved(&self) -> Self {
        let mut out = self.clone();
        out.sanitize();
        let m = out.stage.modifiers();
        out.world.gravity *= m.gravity_multiplier;
        out.terrain.friction *= m.friction_multiplier;
        out.pickups.spawn_rate_multiplier *= m.spawn_rate_multiplier;
        out.terrain.difficulty_ramp *= m.difficulty_multiplier;
        out.vehicle = out.vehicle.with_upgrades(out.upgrades);
        out.fuel = out.fuel.with_tank_level(out.upgrades.fuel_tank);
        out.stage = StagePreset::Countryside;
        out.upgrades = UpgradeLevels::default();
        out.sanitize();
        out
    }
}
