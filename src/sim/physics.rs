//! rapier2d physics integration
//!
//! [`PhysicsWorld`] owns the rapier pipeline and every body in the run.
//! Game code speaks in world units (pixels, y up) and collision tags; this
//! module is the only place that knows about metres, rapier handles and
//! interaction bitmasks.
//!
//! # Determinism
//!
//! rapier2d is compiled with `enhanced-determinism`. With a single writer
//! (the simulation loop) and a stable insertion order the simulation replays
//! bit-identically on the same platform.

use std::collections::HashMap;

use glam::DVec2;
use rapier2d::parry::query;
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

/// What a collider is, from the game's point of view.
///
/// Resolved into rapier interaction groups by [`CollisionTag::interaction_groups`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionTag {
    Ground,
    Chassis,
    Wheel,
    Pickup,
}

impl CollisionTag {
    fn membership(self) -> Group {
        match self {
            CollisionTag::Ground => Group::GROUP_1,
            CollisionTag::Chassis => Group::GROUP_2,
            CollisionTag::Wheel => Group::GROUP_3,
            CollisionTag::Pickup => Group::GROUP_4,
        }
    }

    /// Wheels only touch ground; the chassis touches ground and pickups;
    /// pickups only ever see the chassis.
    fn filter(self) -> Group {
        match self {
            CollisionTag::Ground => Group::GROUP_2 | Group::GROUP_3,
            CollisionTag::Chassis => Group::GROUP_1 | Group::GROUP_4,
            CollisionTag::Wheel => Group::GROUP_1,
            CollisionTag::Pickup => Group::GROUP_2,
        }
    }

    pub fn interaction_groups(self) -> InteractionGroups {
        InteractionGroups::new(self.membership(), self.filter())
    }

    /// Whether two tags are allowed to generate contacts or overlaps
    pub fn interacts_with(self, other: CollisionTag) -> bool {
        self.interaction_groups().test(other.interaction_groups())
    }
}

/// Physics body type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Fully simulated (chassis, wheels)
    Dynamic,
    /// Immovable (terrain, pickups)
    Static,
}

/// Collider shape in world units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyShape {
    Box { half_width: f64, half_height: f64 },
    Circle { radius: f64 },
    /// Convex parts, expressed relative to the body origin
    ConvexParts(Vec<Vec<DVec2>>),
}

/// Everything needed to create one body with one collider
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub position: DVec2,
    pub rotation: f64,
    pub shape: BodyShape,
    pub tag: CollisionTag,
    /// kg/m²
    pub density: f64,
    pub friction: f64,
    pub restitution: f64,
    /// Sensors detect overlaps but never push
    pub sensor: bool,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub ccd: bool,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, position: DVec2, shape: BodyShape, tag: CollisionTag) -> Self {
        Self {
            kind,
            position,
            rotation: 0.0,
            shape,
            tag,
            density: 1.0,
            friction: 0.8,
            restitution: 0.0,
            sensor: false,
            linear_damping: 0.0,
            angular_damping: 0.0,
            ccd: false,
        }
    }

    pub fn fixed(position: DVec2, shape: BodyShape, tag: CollisionTag) -> Self {
        Self::new(BodyKind::Static, position, shape, tag)
    }

    pub fn dynamic(position: DVec2, shape: BodyShape, tag: CollisionTag) -> Self {
        let mut desc = Self::new(BodyKind::Dynamic, position, shape, tag);
        desc.ccd = true;
        desc
    }
}

/// Constraint between two bodies. Anchors are in each body's local frame,
/// world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointDesc {
    /// Damped spring along the line between the anchors
    Spring {
        anchor_a: DVec2,
        anchor_b: DVec2,
        rest_length: f64,
        /// Acceleration-based stiffness (1/s²)
        stiffness: f64,
        /// Acceleration-based damping (1/s)
        damping: f64,
    },
    /// Locks travel along body A's x axis; y travel limited to `travel`
    /// (relative to `anchor_a`, world units). Rotation stays free.
    Axle {
        anchor_a: DVec2,
        anchor_b: DVec2,
        travel: [f64; 2],
    },
}

/// Opaque body handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// Opaque constraint handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointHandle(ImpulseJointHandle);

#[derive(Debug, Clone)]
struct BodyRecord {
    collider: ColliderHandle,
    tag: CollisionTag,
    shape: BodyShape,
}

/// Read-only view of a body for the rendering collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyView {
    pub tag: CollisionTag,
    pub position: DVec2,
    pub rotation: f64,
    pub shape: BodyShape,
}

/// Manages the rapier2d simulation state
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    pixels_per_meter: f64,
    bodies: HashMap<RigidBodyHandle, BodyRecord>,
    collider_tags: HashMap<ColliderHandle, CollisionTag>,
}

impl PhysicsWorld {
    /// Create a world with downward gravity (m/s²) and the given unit scale
    pub fn new(gravity: f64, pixels_per_meter: f64) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, -gravity as Real],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            pixels_per_meter: pixels_per_meter.max(f64::EPSILON),
            bodies: HashMap::new(),
            collider_tags: HashMap::new(),
        }
    }

    pub fn pixels_per_meter(&self) -> f64 {
        self.pixels_per_meter
    }

    #[inline]
    fn to_physics(&self, v: DVec2) -> Vector<Real> {
        vector![
            (v.x / self.pixels_per_meter) as Real,
            (v.y / self.pixels_per_meter) as Real
        ]
    }

    #[inline]
    fn to_physics_point(&self, p: DVec2) -> Point<Real> {
        point![
            (p.x / self.pixels_per_meter) as Real,
            (p.y / self.pixels_per_meter) as Real
        ]
    }

    #[inline]
    fn to_world(&self, v: &Vector<Real>) -> DVec2 {
        DVec2::new(
            v.x as f64 * self.pixels_per_meter,
            v.y as f64 * self.pixels_per_meter,
        )
    }

    fn shared_shape(&self, shape: &BodyShape) -> Option<SharedShape> {
        let scale = self.pixels_per_meter;
        match shape {
            BodyShape::Box {
                half_width,
                half_height,
            } => Some(SharedShape::cuboid(
                (half_width / scale) as Real,
                (half_height / scale) as Real,
            )),
            BodyShape::Circle { radius } => Some(SharedShape::ball((radius / scale) as Real)),
            BodyShape::ConvexParts(parts) => {
                let hulls: Vec<(Isometry<Real>, SharedShape)> = parts
                    .iter()
                    .filter_map(|part| {
                        let points: Vec<Point<Real>> =
                            part.iter().map(|p| self.to_physics_point(*p)).collect();
                        SharedShape::convex_hull(&points).map(|hull| (Isometry::identity(), hull))
                    })
                    .collect();
                if hulls.is_empty() {
                    None
                } else {
                    Some(SharedShape::compound(hulls))
                }
            }
        }
    }

    /// Create a body with a single collider.
    ///
    /// Returns `None` only when the shape is degenerate (no convex part
    /// survived hull construction).
    pub fn add_body(&mut self, desc: BodyDesc) -> Option<BodyHandle> {
        let Some(shape) = self.shared_shape(&desc.shape) else {
            log::warn!("Skipping {:?} body with degenerate shape", desc.tag);
            return None;
        };

        let builder = match desc.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic().ccd_enabled(desc.ccd),
            BodyKind::Static => RigidBodyBuilder::fixed(),
        };
        let rb = builder
            .translation(self.to_physics(desc.position))
            .rotation(desc.rotation as Real)
            .linear_damping(desc.linear_damping as Real)
            .angular_damping(desc.angular_damping as Real)
            .build();
        let body_handle = self.rigid_body_set.insert(rb);

        let collider = ColliderBuilder::new(shape)
            .density(desc.density as Real)
            .friction(desc.friction as Real)
            .restitution(desc.restitution as Real)
            .sensor(desc.sensor)
            .collision_groups(desc.tag.interaction_groups())
            .build();
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);

        self.collider_tags.insert(collider_handle, desc.tag);
        self.bodies.insert(
            body_handle,
            BodyRecord {
                collider: collider_handle,
                tag: desc.tag,
                shape: desc.shape,
            },
        );
        Some(BodyHandle(body_handle))
    }

    /// Remove a body, its collider and any joints attached to it.
    /// Unknown handles are ignored.
    pub fn remove_body(&mut self, handle: BodyHandle) {
        if let Some(record) = self.bodies.remove(&handle.0) {
            self.collider_tags.remove(&record.collider);
            self.rigid_body_set.remove(
                handle.0,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
    }

    /// Attach a constraint between two bodies
    pub fn add_joint(&mut self, a: BodyHandle, b: BodyHandle, desc: JointDesc) -> Option<JointHandle> {
        if !self.bodies.contains_key(&a.0) || !self.bodies.contains_key(&b.0) {
            return None;
        }
        let handle = match desc {
            JointDesc::Spring {
                anchor_a,
                anchor_b,
                rest_length,
                stiffness,
                damping,
            } => {
                let joint = SpringJointBuilder::new(
                    (rest_length / self.pixels_per_meter) as Real,
                    stiffness as Real,
                    damping as Real,
                )
                .spring_model(MotorModel::AccelerationBased)
                .local_anchor1(self.to_physics_point(anchor_a))
                .local_anchor2(self.to_physics_point(anchor_b))
                .build();
                self.impulse_joint_set.insert(a.0, b.0, joint, true)
            }
            JointDesc::Axle {
                anchor_a,
                anchor_b,
                travel,
            } => {
                let scale = self.pixels_per_meter;
                let joint = GenericJointBuilder::new(JointAxesMask::LIN_X)
                    .local_anchor1(self.to_physics_point(anchor_a))
                    .local_anchor2(self.to_physics_point(anchor_b))
                    .limits(
                        JointAxis::LinY,
                        [(travel[0] / scale) as Real, (travel[1] / scale) as Real],
                    )
                    .build();
                self.impulse_joint_set.insert(a.0, b.0, joint, true)
            }
        };
        Some(JointHandle(handle))
    }

    /// Bodies connected by a joint, in insertion order
    pub fn joint_bodies(&self, joint: JointHandle) -> Option<(BodyHandle, BodyHandle)> {
        self.impulse_joint_set
            .get(joint.0)
            .map(|j| (BodyHandle(j.body1), BodyHandle(j.body2)))
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.integration_params.dt = dt as Real;
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains_key(&handle.0)
    }

    pub fn tag(&self, handle: BodyHandle) -> Option<CollisionTag> {
        self.bodies.get(&handle.0).map(|r| r.tag)
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joint_set.len()
    }

    pub fn position(&self, handle: BodyHandle) -> Option<DVec2> {
        self.rigid_body_set
            .get(handle.0)
            .map(|rb| self.to_world(rb.translation()))
    }

    /// Rotation in radians, counter-clockwise
    pub fn rotation(&self, handle: BodyHandle) -> Option<f64> {
        self.rigid_body_set
            .get(handle.0)
            .map(|rb| rb.rotation().angle() as f64)
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<DVec2> {
        self.rigid_body_set
            .get(handle.0)
            .map(|rb| self.to_world(rb.linvel()))
    }

    pub fn angular_velocity(&self, handle: BodyHandle) -> Option<f64> {
        self.rigid_body_set.get(handle.0).map(|rb| rb.angvel() as f64)
    }

    pub fn set_angular_velocity(&mut self, handle: BodyHandle, angvel: f64) {
        if let Some(rb) = self.rigid_body_set.get_mut(handle.0) {
            rb.set_angvel(angvel as Real, true);
        }
    }

    /// Teleport a body and bring it to rest
    #[cfg(test)]
    pub(crate) fn set_pose(&mut self, handle: BodyHandle, position: DVec2, rotation: f64) {
        let translation = self.to_physics(position);
        if let Some(rb) = self.rigid_body_set.get_mut(handle.0) {
            rb.set_position(Isometry::new(translation, rotation as Real), true);
            rb.set_linvel(vector![0.0, 0.0], true);
            rb.set_angvel(0.0, true);
        }
    }

    /// Push a body with a force (world units: kg·px/s²) for one step of `dt`
    pub fn apply_force(&mut self, handle: BodyHandle, force: DVec2, dt: f64) {
        let impulse = self.to_physics(force * dt);
        if let Some(rb) = self.rigid_body_set.get_mut(handle.0) {
            rb.apply_impulse(impulse, true);
        }
    }

    /// Mass in kg
    pub fn mass(&self, handle: BodyHandle) -> Option<f64> {
        self.rigid_body_set.get(handle.0).map(|rb| rb.mass() as f64)
    }

    pub fn friction(&self, handle: BodyHandle) -> Option<f64> {
        let record = self.bodies.get(&handle.0)?;
        self.collider_set
            .get(record.collider)
            .map(|c| c.friction() as f64)
    }

    pub fn set_friction(&mut self, handle: BodyHandle, friction: f64) {
        if let Some(record) = self.bodies.get(&handle.0) {
            if let Some(collider) = self.collider_set.get_mut(record.collider) {
                collider.set_friction(friction.max(0.0) as Real);
            }
        }
    }

    /// True if the body has an active contact with any collider carrying `tag`
    pub fn is_touching(&self, handle: BodyHandle, tag: CollisionTag) -> bool {
        let Some(record) = self.bodies.get(&handle.0) else {
            return false;
        };
        let collider = record.collider;
        self.narrow_phase
            .contact_pairs_with(collider)
            .filter(|pair| pair.has_any_active_contact)
            .any(|pair| {
                let other = if pair.collider1 == collider {
                    pair.collider2
                } else {
                    pair.collider1
                };
                self.collider_tags.get(&other) == Some(&tag)
            })
    }

    /// Exact shape-vs-shape overlap test against current poses
    pub fn intersects(&self, a: BodyHandle, b: BodyHandle) -> bool {
        let (Some(ra), Some(rb)) = (self.bodies.get(&a.0), self.bodies.get(&b.0)) else {
            return false;
        };
        let (Some(ca), Some(cb)) = (
            self.collider_set.get(ra.collider),
            self.collider_set.get(rb.collider),
        ) else {
            return false;
        };
        query::intersection_test(ca.position(), ca.shape(), cb.position(), cb.shape())
            .unwrap_or(false)
    }

    /// Every body, in stable arena order
    pub fn body_views(&self) -> Vec<BodyView> {
        self.rigid_body_set
            .iter()
            .filter_map(|(handle, rb)| {
                let record = self.bodies.get(&handle)?;
                Some(BodyView {
                    tag: record.tag,
                    position: self.to_world(rb.translation()),
                    rotation: rb.rotation().angle() as f64,
                    shape: record.shape.clone(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("bodies", &self.rigid_body_set.len())
            .field("joints", &self.impulse_joint_set.len())
            .field("pixels_per_meter", &self.pixels_per_meter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ground(world: &mut PhysicsWorld) -> BodyHandle {
        world
            .add_body(BodyDesc::fixed(
                DVec2::new(0.0, -20.0),
                BodyShape::Box {
                    half_width: 2000.0,
                    half_height: 20.0,
                },
                CollisionTag::Ground,
            ))
            .unwrap()
    }

    #[test]
    fn test_tag_filtering() {
        use CollisionTag::*;
        assert!(Wheel.interacts_with(Ground));
        assert!(Chassis.interacts_with(Ground));
        assert!(Chassis.interacts_with(Pickup));
        assert!(!Wheel.interacts_with(Chassis));
        assert!(!Wheel.interacts_with(Pickup));
        assert!(!Pickup.interacts_with(Ground));
        assert!(!Pickup.interacts_with(Pickup));
    }

    #[test]
    fn test_unit_round_trip() {
        let mut world = PhysicsWorld::new(9.81, 30.0);
        let handle = world
            .add_body(BodyDesc::fixed(
                DVec2::new(300.0, 150.0),
                BodyShape::Circle { radius: 10.0 },
                CollisionTag::Pickup,
            ))
            .unwrap();
        let pos = world.position(handle).unwrap();
        assert_abs_diff_eq!(pos.x, 300.0, epsilon = 1e-3);
        assert_abs_diff_eq!(pos.y, 150.0, epsilon = 1e-3);
    }

    #[test]
    fn test_dynamic_body_lands_on_ground() {
        let mut world = PhysicsWorld::new(9.81, 30.0);
        ground(&mut world);
        let ball = world
            .add_body(BodyDesc::dynamic(
                DVec2::new(0.0, 100.0),
                BodyShape::Circle { radius: 15.0 },
                CollisionTag::Wheel,
            ))
            .unwrap();
        for _ in 0..180 {
            world.step(1.0 / 60.0);
        }
        let pos = world.position(ball).unwrap();
        assert!(pos.y > 0.0 && pos.y < 30.0, "ball should rest on ground, y={}", pos.y);
        assert!(world.is_touching(ball, CollisionTag::Ground));
    }

    #[test]
    fn test_sensor_overlap_without_push() {
        let mut world = PhysicsWorld::new(9.81, 30.0);
        let mut coin = BodyDesc::fixed(
            DVec2::new(0.0, 0.0),
            BodyShape::Circle { radius: 10.0 },
            CollisionTag::Pickup,
        );
        coin.sensor = true;
        let coin = world.add_body(coin).unwrap();
        let chassis = world
            .add_body(BodyDesc::fixed(
                DVec2::new(5.0, 0.0),
                BodyShape::Box {
                    half_width: 20.0,
                    half_height: 10.0,
                },
                CollisionTag::Chassis,
            ))
            .unwrap();
        let far = world
            .add_body(BodyDesc::fixed(
                DVec2::new(500.0, 0.0),
                BodyShape::Box {
                    half_width: 20.0,
                    half_height: 10.0,
                },
                CollisionTag::Chassis,
            ))
            .unwrap();
        assert!(world.intersects(chassis, coin));
        assert!(!world.intersects(far, coin));
    }

    #[test]
    fn test_remove_body_drops_joints() {
        let mut world = PhysicsWorld::new(9.81, 30.0);
        let a = world
            .add_body(BodyDesc::dynamic(
                DVec2::ZERO,
                BodyShape::Box {
                    half_width: 10.0,
                    half_height: 10.0,
                },
                CollisionTag::Chassis,
            ))
            .unwrap();
        let b = world
            .add_body(BodyDesc::dynamic(
                DVec2::new(0.0, -40.0),
                BodyShape::Circle { radius: 10.0 },
                CollisionTag::Wheel,
            ))
            .unwrap();
        let joint = world
            .add_joint(
                a,
                b,
                JointDesc::Spring {
                    anchor_a: DVec2::new(0.0, -10.0),
                    anchor_b: DVec2::ZERO,
                    rest_length: 30.0,
                    stiffness: 200.0,
                    damping: 10.0,
                },
            )
            .unwrap();
        assert_eq!(world.joint_bodies(joint), Some((a, b)));
        assert_eq!(world.joint_count(), 1);
        world.remove_body(a);
        assert_eq!(world.joint_count(), 0);
        assert!(!world.contains(a));
        // Second removal is a no-op
        world.remove_body(a);
        assert_eq!(world.body_count(), 1);
    }
}
