//! Vehicle rig: chassis, two wheels, suspension and axles
//!
//! Built from a [`VehicleStats`] description into the shared [`PhysicsWorld`]:
//! - one box chassis
//! - two circular wheels at ±wheelbase/2, hanging below the chassis corners
//! - a damped spring per wheel (suspension)
//! - a prismatic axle per wheel that pins fore/aft travel and limits bounce
//!
//! Forward is +x. A wheel rolling forward spins clockwise (negative angular
//! velocity).

use std::f64::consts::PI;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::physics::{
    BodyDesc, BodyHandle, BodyShape, CollisionTag, JointDesc, JointHandle, PhysicsWorld,
};
use crate::consts::MAX_UPGRADE_LEVEL;
use crate::normalize_angle_positive;

/// Per-level gain for each upgrade track
const ENGINE_GAIN_PER_LEVEL: f64 = 0.08;
const SUSPENSION_GAIN_PER_LEVEL: f64 = 0.06;
const TIRE_GAIN_PER_LEVEL: f64 = 0.05;

/// Physical and drivetrain description of a vehicle (world units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleStats {
    pub chassis_width: f64,
    pub chassis_height: f64,
    /// kg/m²
    pub chassis_density: f64,
    pub chassis_friction: f64,
    pub wheel_radius: f64,
    pub wheel_density: f64,
    /// Wheelbase as a fraction of chassis width
    pub wheelbase_ratio: f64,
    pub wheel_friction: f64,
    /// Wheel friction while braking hard
    pub brake_friction: f64,

    // === Suspension ===
    pub suspension_rest_length: f64,
    /// Allowed bounce either side of rest length
    pub suspension_travel: f64,
    pub suspension_stiffness: f64,
    pub suspension_damping: f64,

    // === Drivetrain ===
    /// Wheel spin target at full throttle (rad/s)
    pub max_wheel_speed: f64,
    /// Largest change of wheel spin per second (rad/s²)
    pub wheel_acceleration: f64,
    /// Forward push on the chassis at full throttle (px/s²)
    pub drive_assist: f64,
    /// Fraction of wheel spin removed per step at full brake
    pub brake_power: f64,

    // === Damping ===
    pub linear_damping: f64,
    pub angular_damping: f64,

    /// Chassis angles (normalized to [0, 2π)) inside this band count as flipped
    pub flip_band: [f64; 2],
    /// Gap left between wheels and ground at spawn
    pub spawn_clearance: f64,
}

impl Default for VehicleStats {
    fn default() -> Self {
        Self {
            chassis_width: 120.0,
            chassis_height: 40.0,
            chassis_density: 60.0,
            chassis_friction: 0.6,
            wheel_radius: 22.0,
            wheel_density: 30.0,
            wheelbase_ratio: 0.8,
            wheel_friction: 1.0,
            brake_friction: 1.8,

            suspension_rest_length: 18.0,
            suspension_travel: 10.0,
            suspension_stiffness: 300.0,
            suspension_damping: 20.0,

            max_wheel_speed: 45.0,
            wheel_acceleration: 50.0,
            drive_assist: 150.0,
            brake_power: 0.15,

            linear_damping: 0.05,
            angular_damping: 0.3,

            flip_band: [2.0 * PI / 3.0, 4.0 * PI / 3.0],
            spawn_clearance: 6.0,
        }
    }
}

impl VehicleStats {
    pub fn half_width(&self) -> f64 {
        self.chassis_width * 0.5
    }

    pub fn half_height(&self) -> f64 {
        self.chassis_height * 0.5
    }

    pub fn wheelbase(&self) -> f64 {
        self.chassis_width * self.wheelbase_ratio
    }

    /// Chassis-centre height above flat ground at spawn
    pub fn ride_height(&self) -> f64 {
        self.half_height() + self.suspension_rest_length + self.wheel_radius + self.spawn_clearance
    }

    /// Basic clamping only; plausibility is the caller's business
    pub fn sanitize(&mut self) {
        self.chassis_width = self.chassis_width.max(4.0);
        self.chassis_height = self.chassis_height.max(2.0);
        self.wheel_radius = self.wheel_radius.max(1.0);
        self.chassis_density = self.chassis_density.max(0.01);
        self.wheel_density = self.wheel_density.max(0.01);
        self.wheelbase_ratio = self.wheelbase_ratio.clamp(0.1, 1.5);
        self.suspension_rest_length = self.suspension_rest_length.max(1.0);
        self.suspension_travel = self.suspension_travel.clamp(0.0, self.suspension_rest_length);
        self.suspension_stiffness = self.suspension_stiffness.max(0.0);
        self.suspension_damping = self.suspension_damping.max(0.0);
        self.max_wheel_speed = self.max_wheel_speed.max(0.0);
        self.wheel_acceleration = self.wheel_acceleration.max(0.0);
        self.drive_assist = self.drive_assist.max(0.0);
        self.brake_power = self.brake_power.clamp(0.0, 1.0);
        self.wheel_friction = self.wheel_friction.max(0.0);
        self.brake_friction = self.brake_friction.max(0.0);
        self.chassis_friction = self.chassis_friction.max(0.0);
        if self.flip_band[0] > self.flip_band[1] {
            self.flip_band.swap(0, 1);
        }
    }

    /// Stats after applying upgrade levels (clamped to the allowed range)
    pub fn with_upgrades(&self, upgrades: UpgradeLevels) -> Self {
        let upgrades = upgrades.clamped();
        let engine = 1.0 + ENGINE_GAIN_PER_LEVEL * upgrades.engine as f64;
        let suspension = 1.0 + SUSPENSION_GAIN_PER_LEVEL * upgrades.suspension as f64;
        let tires = 1.0 + TIRE_GAIN_PER_LEVEL * upgrades.tires as f64;
        Self {
            max_wheel_speed: self.max_wheel_speed * engine,
            wheel_acceleration: self.wheel_acceleration * engine,
            drive_assist: self.drive_assist * engine,
            suspension_stiffness: self.suspension_stiffness * suspension,
            suspension_damping: self.suspension_damping * suspension,
            wheel_friction: self.wheel_friction * tires,
            brake_friction: self.brake_friction * tires,
            ..self.clone()
        }
    }
}

/// Built-in vehicle definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VehiclePreset {
    #[default]
    Jeep,
    Buggy,
    MonsterTruck,
}

impl VehiclePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehiclePreset::Jeep => "Jeep",
            VehiclePreset::Buggy => "Buggy",
            VehiclePreset::MonsterTruck => "Monster Truck",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jeep" => Some(VehiclePreset::Jeep),
            "buggy" => Some(VehiclePreset::Buggy),
            "monster" | "monstertruck" | "monster truck" | "monster_truck" => {
                Some(VehiclePreset::MonsterTruck)
            }
            _ => None,
        }
    }

    pub fn stats(&self) -> VehicleStats {
        let base = VehicleStats::default();
        match self {
            VehiclePreset::Jeep => base,
            // Light and quick, twitchy in the air
            VehiclePreset::Buggy => VehicleStats {
                chassis_width: 100.0,
                chassis_height: 30.0,
                chassis_density: 45.0,
                wheel_radius: 20.0,
                max_wheel_speed: 55.0,
                wheel_acceleration: 65.0,
                suspension_stiffness: 260.0,
                angular_damping: 0.15,
                ..base
            },
            // Heavy, slow to spin up, big wheels eat bumps
            VehiclePreset::MonsterTruck => VehicleStats {
                chassis_width: 140.0,
                chassis_height: 50.0,
                chassis_density: 70.0,
                wheel_radius: 34.0,
                wheel_density: 25.0,
                suspension_rest_length: 26.0,
                suspension_travel: 16.0,
                max_wheel_speed: 36.0,
                wheel_acceleration: 38.0,
                drive_assist: 180.0,
                angular_damping: 0.5,
                ..base
            },
        }
    }
}

/// Purchased upgrade levels, supplied at run start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeLevels {
    pub engine: u8,
    pub suspension: u8,
    pub tires: u8,
    pub fuel_tank: u8,
}

impl UpgradeLevels {
    /// Every track clamped to `0..=MAX_UPGRADE_LEVEL`
    pub fn clamped(self) -> Self {
        Self {
            engine: self.engine.min(MAX_UPGRADE_LEVEL),
            suspension: self.suspension.min(MAX_UPGRADE_LEVEL),
            tires: self.tires.min(MAX_UPGRADE_LEVEL),
            fuel_tank: self.fuel_tank.min(MAX_UPGRADE_LEVEL),
        }
    }
}

/// True if a chassis angle falls inside the flipped band
pub fn is_flipped_angle(angle: f64, band: [f64; 2]) -> bool {
    let a = normalize_angle_positive(angle);
    a > band[0] && a < band[1]
}

/// Per-frame vehicle readout
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub position: DVec2,
    /// Radians, counter-clockwise from upright
    pub rotation: f64,
    pub velocity: DVec2,
    pub angular_velocity: f64,
    /// At least one wheel touches ground
    pub grounded: bool,
    /// The chassis itself touches ground
    pub chassis_contact: bool,
    pub flipped: bool,
    pub front_wheel: DVec2,
    pub rear_wheel: DVec2,
    /// Mean wheel rotation, for rendering spokes
    pub wheel_rotation: f64,
}

/// A drivable vehicle living in a [`PhysicsWorld`]
#[derive(Debug, Clone)]
pub struct VehicleRig {
    stats: VehicleStats,
    chassis: BodyHandle,
    front_wheel: BodyHandle,
    rear_wheel: BodyHandle,
    front_suspension: JointHandle,
    rear_suspension: JointHandle,
    front_axle: JointHandle,
    rear_axle: JointHandle,
    power_multiplier: f64,
    brake_bite: bool,
}

impl VehicleRig {
    /// Build the rig so its wheels hover just above `ground` (a point on the
    /// ground surface under the chassis centre).
    ///
    /// Returns `None` only if the physics world rejects a body, which the
    /// sanitized stats rule out.
    pub fn spawn(world: &mut PhysicsWorld, mut stats: VehicleStats, ground: DVec2) -> Option<Self> {
        stats.sanitize();
        let center = DVec2::new(ground.x, ground.y + stats.ride_height());
        let hw = stats.half_width();
        let hh = stats.half_height();
        let half_base = stats.wheelbase() * 0.5;
        let rest = stats.suspension_rest_length;

        let mut chassis_desc = BodyDesc::dynamic(
            center,
            BodyShape::Box {
                half_width: hw,
                half_height: hh,
            },
            CollisionTag::Chassis,
        );
        chassis_desc.density = stats.chassis_density;
        chassis_desc.friction = stats.chassis_friction;
        chassis_desc.linear_damping = stats.linear_damping;
        chassis_desc.angular_damping = stats.angular_damping;
        let chassis = world.add_body(chassis_desc)?;

        let wheel = |world: &mut PhysicsWorld, offset: f64| {
            let mut desc = BodyDesc::dynamic(
                DVec2::new(center.x + offset, center.y - hh - rest),
                BodyShape::Circle {
                    radius: stats.wheel_radius,
                },
                CollisionTag::Wheel,
            );
            desc.density = stats.wheel_density;
            desc.friction = stats.wheel_friction;
            desc.linear_damping = stats.linear_damping;
            world.add_body(desc)
        };
        let rear_wheel = wheel(world, -half_base)?;
        let front_wheel = wheel(world, half_base)?;

        let suspension = |mount: DVec2| JointDesc::Spring {
            anchor_a: mount,
            anchor_b: DVec2::ZERO,
            rest_length: rest,
            stiffness: stats.suspension_stiffness,
            damping: stats.suspension_damping,
        };
        let axle = |mount: DVec2| JointDesc::Axle {
            anchor_a: mount,
            anchor_b: DVec2::ZERO,
            travel: [
                -(rest + stats.suspension_travel),
                -(rest - stats.suspension_travel),
            ],
        };

        let rear_mount = DVec2::new(-half_base, -hh);
        let front_mount = DVec2::new(half_base, -hh);
        let rear_suspension = world.add_joint(chassis, rear_wheel, suspension(rear_mount))?;
        let front_suspension = world.add_joint(chassis, front_wheel, suspension(front_mount))?;
        let rear_axle = world.add_joint(chassis, rear_wheel, axle(rear_mount))?;
        let front_axle = world.add_joint(chassis, front_wheel, axle(front_mount))?;

        log::info!(
            "Vehicle spawned at ({:.0}, {:.0}), wheelbase {:.0}",
            center.x,
            center.y,
            stats.wheelbase()
        );

        Some(Self {
            stats,
            chassis,
            front_wheel,
            rear_wheel,
            front_suspension,
            rear_suspension,
            front_axle,
            rear_axle,
            power_multiplier: 1.0,
            brake_bite: false,
        })
    }

    /// Remove every body of the rig (joints go with them)
    pub fn despawn(self, world: &mut PhysicsWorld) {
        world.remove_body(self.front_wheel);
        world.remove_body(self.rear_wheel);
        world.remove_body(self.chassis);
    }

    pub fn stats(&self) -> &VehicleStats {
        &self.stats
    }

    pub fn chassis(&self) -> BodyHandle {
        self.chassis
    }

    /// Rear then front
    pub fn wheels(&self) -> [BodyHandle; 2] {
        [self.rear_wheel, self.front_wheel]
    }

    /// Suspension springs then axles, rear before front
    pub fn joints(&self) -> [JointHandle; 4] {
        [
            self.rear_suspension,
            self.front_suspension,
            self.rear_axle,
            self.front_axle,
        ]
    }

    pub fn power_multiplier(&self) -> f64 {
        self.power_multiplier
    }

    /// Boost hook; values below 1 are treated as 1
    pub fn set_power_multiplier(&mut self, multiplier: f64) {
        self.power_multiplier = multiplier.max(1.0);
    }

    /// Spin the wheels toward the throttle target and push the chassis along
    /// its heading while the wheels have grip.
    pub fn apply_gas(&mut self, world: &mut PhysicsWorld, amount: f64, dt: f64) {
        let amount = amount.clamp(0.0, 1.0);
        if amount <= 0.0 || dt <= 0.0 {
            return;
        }
        let target = -self.stats.max_wheel_speed * amount * self.power_multiplier;
        let max_step = self.stats.wheel_acceleration * self.power_multiplier * dt;
        for wheel in self.wheels() {
            let Some(current) = world.angular_velocity(wheel) else {
                continue;
            };
            let next = current + (target - current).clamp(-max_step, max_step);
            world.set_angular_velocity(wheel, next);
        }

        if self.is_grounded(world) {
            let heading = self.rotation(world);
            let mass: f64 = [self.chassis, self.front_wheel, self.rear_wheel]
                .into_iter()
                .filter_map(|b| world.mass(b))
                .sum();
            let push = mass * self.stats.drive_assist * amount * self.power_multiplier;
            let force = DVec2::new(heading.cos(), heading.sin()) * push;
            world.apply_force(self.chassis, force, dt);
        }
    }

    /// Bleed wheel spin; past half strength the tyres bite harder
    pub fn apply_brake(&mut self, world: &mut PhysicsWorld, amount: f64) {
        let amount = amount.clamp(0.0, 1.0);
        let keep = (1.0 - self.stats.brake_power * amount).clamp(0.0, 1.0);
        for wheel in self.wheels() {
            if let Some(current) = world.angular_velocity(wheel) {
                world.set_angular_velocity(wheel, current * keep);
            }
        }

        let bite = amount > 0.5;
        if bite != self.brake_bite {
            let friction = if bite {
                self.stats.brake_friction
            } else {
                self.stats.wheel_friction
            };
            for wheel in self.wheels() {
                world.set_friction(wheel, friction);
            }
            self.brake_bite = bite;
        }
    }

    pub fn position(&self, world: &PhysicsWorld) -> DVec2 {
        world.position(self.chassis).unwrap_or_default()
    }

    pub fn rotation(&self, world: &PhysicsWorld) -> f64 {
        world.rotation(self.chassis).unwrap_or_default()
    }

    pub fn velocity(&self, world: &PhysicsWorld) -> DVec2 {
        world.linear_velocity(self.chassis).unwrap_or_default()
    }

    pub fn is_flipped(&self, world: &PhysicsWorld) -> bool {
        is_flipped_angle(self.rotation(world), self.stats.flip_band)
    }

    /// Any wheel in contact with ground
    pub fn is_grounded(&self, world: &PhysicsWorld) -> bool {
        self.wheels()
            .into_iter()
            .any(|w| world.is_touching(w, CollisionTag::Ground))
    }

    pub fn chassis_contact(&self, world: &PhysicsWorld) -> bool {
        world.is_touching(self.chassis, CollisionTag::Ground)
    }

    pub fn snapshot(&self, world: &PhysicsWorld) -> VehicleSnapshot {
        let rotation = self.rotation(world);
        let wheel_rotation = self
            .wheels()
            .into_iter()
            .filter_map(|w| world.rotation(w))
            .sum::<f64>()
            * 0.5;
        VehicleSnapshot {
            position: self.position(world),
            rotation,
            velocity: self.velocity(world),
            angular_velocity: world.angular_velocity(self.chassis).unwrap_or_default(),
            grounded: self.is_grounded(world),
            chassis_contact: self.chassis_contact(world),
            flipped: is_flipped_angle(rotation, self.stats.flip_band),
            front_wheel: world.position(self.front_wheel).unwrap_or_default(),
            rear_wheel: world.position(self.rear_wheel).unwrap_or_default(),
            wheel_rotation,
        }
    }
}
