//! Hill Rush - endless physics hill-climbing simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (terrain, vehicle rig, pickups, run state, tricks)
//! - `config`: Data-driven tunables, stage and vehicle presets
//!
//! Rendering, input widgets, audio and persistence are external collaborators.
//! They talk to the core through [`sim::Simulation`] and its read-only
//! [`sim::FrameSnapshot`].

pub mod config;
pub mod sim;

pub use config::{ConfigError, SimConfig, StagePreset};
pub use sim::{Simulation, SimEvent};

/// Default tuning constants
pub mod consts {
    /// Nominal frame delta (60 Hz display refresh)
    pub const FRAME_DT: f64 = 1.0 / 60.0;
    /// Largest delta a single frame may integrate (seconds)
    pub const MAX_STEP: f64 = 0.032;

    /// World units (pixels) per physics metre
    pub const PIXELS_PER_METER: f64 = 30.0;
    /// Gravity in m/s² before stage multipliers
    pub const GRAVITY: f64 = 9.81;

    /// Where the vehicle is placed at the start of every run
    pub const START_X: f64 = 200.0;

    /// Spawner seed = terrain seed + this offset, so the two streams never correlate
    pub const PICKUP_SEED_OFFSET: u32 = 0x9E37_79B9;

    /// Highest level accepted for any upgrade track
    pub const MAX_UPGRADE_LEVEL: u8 = 10;
}

/// Normalize an angle to [0, 2π)
#[inline]
pub fn normalize_angle_positive(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(std::f64::consts::TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= std::f64::consts::TAU {
        0.0
    } else {
        wrapped
    }
}

/// Normalize an angle to [-π, π)
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;
    normalize_angle_positive(angle + PI) - PI
}

/// Shortest signed rotation taking `from` to `to`
#[inline]
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}
