//! Render-facing state: camera, events and the per-frame snapshot
//!
//! Nothing here feeds back into gameplay. Frontends read these types and
//! never mutate the simulation through them.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::particles::Particle;
use super::physics::BodyView;
use super::pickups::{PickupId, PickupKind};
use super::run::{RunState, RunStats};
use super::tricks::{BoostState, ComboResult, ComboState, TrickRecord};
use super::vehicle::VehicleSnapshot;
use crate::config::CameraConfig;

/// Something gameplay-relevant happened this frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    RunStarted { seed: u32 },
    Trick(TrickRecord),
    /// Chain lapsed and its points were banked
    ComboEnded(ComboResult),
    /// Chain lost to a crash
    ComboBroken(ComboResult),
    CoinCollected { id: PickupId, value: u32 },
    FuelCollected { id: PickupId, amount: f64 },
    OutOfFuel,
    Crashed { distance: f64 },
    BoostStarted,
    BoostStopped,
    RunEnded(RunStats),
}

/// Smoothed follow camera with velocity look-ahead
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Camera {
    pub position: DVec2,
    pub zoom: f64,
    look_ahead: f64,
    initialized: bool,
}

impl Camera {
    /// Jump straight to the target (run start)
    pub fn snap(&mut self, target: DVec2, config: &CameraConfig) {
        self.position = DVec2::new(target.x, target.y + config.vertical_offset);
        self.zoom = config.zoom;
        self.look_ahead = 0.0;
        self.initialized = true;
    }

    pub fn follow(&mut self, target: DVec2, velocity: DVec2, config: &CameraConfig, dt: f64) {
        if !self.initialized {
            self.snap(target, config);
            return;
        }
        let wanted = (velocity.x * config.look_ahead_time)
            .clamp(-config.max_look_ahead, config.max_look_ahead);
        let blend = (config.follow_rate * dt).clamp(0.0, 1.0);
        self.look_ahead += (wanted - self.look_ahead) * blend;

        let goal = DVec2::new(target.x + self.look_ahead, target.y + config.vertical_offset);
        self.position = self.position.lerp(goal, blend);
        self.zoom = config.zoom;
    }

    pub fn look_ahead(&self) -> f64 {
        self.look_ahead
    }
}

/// Terrain surface for drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainView {
    pub index: i64,
    pub top_vertices: Vec<DVec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupView {
    pub id: PickupId,
    pub kind: PickupKind,
    pub position: DVec2,
    pub radius: f64,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub time_ms: f64,
    pub run: RunState,
    pub vehicle: Option<VehicleSnapshot>,
    pub camera: Camera,
    pub terrain: Vec<TerrainView>,
    pub pickups: Vec<PickupView>,
    pub bodies: Vec<BodyView>,
    pub combo: ComboState,
    pub boost: BoostState,
    pub recent_tricks: Vec<TrickRecord>,
    #[serde(skip)]
    pub particles: Vec<Particle>,
}
