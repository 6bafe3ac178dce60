//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Frame deltas are clamped to a fixed maximum
//! - Gameplay randomness comes only from seeded mulberry32 streams
//! - Stable iteration order (segment index, pickup id)
//! - No rendering or platform dependencies

pub mod geometry;
pub mod particles;
pub mod physics;
pub mod pickups;
pub mod replay;
pub mod rng;
pub mod run;
pub mod state;
pub mod terrain;
pub mod tick;
pub mod tricks;
pub mod vehicle;

pub use geometry::{EarClipDecomposer, PolygonDecomposer, StripDecomposer};
pub use particles::{Particle, ParticleField, ParticleKind};
pub use physics::{BodyDesc, BodyHandle, BodyShape, CollisionTag, PhysicsWorld};
pub use pickups::{Pickup, PickupConfig, PickupId, PickupKind, PickupSpawner};
pub use replay::{InputFrame, InputTape};
pub use rng::SeededRng;
pub use run::{EndReason, FuelConfig, FuelSystem, RunState, RunStateManager, RunStats, RunStatus};
pub use state::{Camera, FrameSnapshot, PickupView, SimEvent, TerrainView};
pub use terrain::{TerrainConfig, TerrainGenerator, TerrainSegment};
pub use tick::{Simulation, TickInput};
pub use tricks::{
    BoostConfig, BoostState, BoostSystem, ComboConfig, ComboResult, ComboState, ComboSystem,
    TrickConfig, TrickKind, TrickRecord, TrickSystem,
};
pub use vehicle::{UpgradeLevels, VehiclePreset, VehicleRig, VehicleSnapshot, VehicleStats};
