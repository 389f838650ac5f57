// Copyright 2017 Matthew Plant. This file is part of Kinetic.
//
// Kinetic is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Kinetic is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Kinetic. If not, see <http://www.gnu.org/licenses/>.


use std::f32;

use cgmath::{EuclideanSpace, InnerSpace, Matrix, Matrix3, Point3, Quaternion,
             Rotation, SquareMatrix, Vector3, One, Zero};
use log::warn;
use smallvec::SmallVec;

use crate::collider::*;
use crate::geom::*;

/// A generic physical body that has a mass, a volume, and experiences linear and
/// rotational movement.
///
/// The geometry of a body is given by the colliders it owns. The body origin
/// (`position`) does not need to coincide with its center of mass; linear
/// velocity is the velocity of the center of mass and rotation always pivots
/// around it.
#[derive(Clone, Debug)]
pub struct RigidBody {
    /// Restitution is a measure of how much kinetic energy is retained in a
    /// collision. 100% of kinetic energy retention corresponds to a coefficient
    /// of one.
    pub restitution: f32,
    /// Ratio of the normal impulse a contact can resist tangentially before it
    /// starts sliding.
    pub static_friction: f32,
    /// Ratio of the normal impulse applied tangentially while sliding.
    pub dynamic_friction: f32,
    /// Position of the body origin in world coordinates.
    pub position: Point3<f32>,
    /// Orientation of the body. Assumed to be normalized.
    pub orientation: Quaternion<f32>,
    /// Linear velocity of the center of mass.
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    /// Velocities receiving position correction impulses. They move the body
    /// during the next integration and are then reset.
    pub pseudo_velocity: Vector3<f32>,
    pub pseudo_angular_velocity: Vector3<f32>,
    inv_mass: f32,
    inv_inertia_body: Matrix3<f32>,
    inv_inertia_world: Matrix3<f32>,
    com_local: Point3<f32>,
    com_world: Point3<f32>,
    force: Vector3<f32>,
    torque: Vector3<f32>,
    body_to_world: Isometry,
    world_to_body: Isometry,
    colliders: SmallVec<[Collider; 1]>,
}

impl RigidBody {
    /// Construct an immovable RigidBody at `position` without any colliders.
    /// Call `set_mass` and `calc_inertia` after attaching colliders to make it
    /// dynamic.
    pub fn new(position: Point3<f32>) -> Self {
        let mut body = RigidBody {
            restitution: 0.0,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            position,
            orientation: Quaternion::one(),
            velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
            pseudo_velocity: Vector3::zero(),
            pseudo_angular_velocity: Vector3::zero(),
            inv_mass: 0.0,
            inv_inertia_body: Matrix3::zero(),
            inv_inertia_world: Matrix3::zero(),
            com_local: Point3::origin(),
            com_world: position,
            force: Vector3::zero(),
            torque: Vector3::zero(),
            body_to_world: Isometry::from_disp(position.to_vec()),
            world_to_body: Isometry::from_disp(-position.to_vec()),
            colliders: SmallVec::new(),
        };
        body.calculate_derived_data();
        body
    }

    /// Construct a dynamic body of the given mass from a single collider. The
    /// inertia tensor is computed.
    pub fn dynamic(position: Point3<f32>, mass: f32, collider: Collider) -> Self {
        let mut body = RigidBody::new(position);
        body.set_collider(collider);
        body.set_mass(mass);
        body.calc_inertia();
        body.calculate_derived_data();
        body
    }

    /// Construct an immovable body from a single collider.
    pub fn fixed(position: Point3<f32>, collider: Collider) -> Self {
        let mut body = RigidBody::new(position);
        body.set_collider(collider);
        body.calculate_derived_data();
        body
    }

    /// Sets the mass of the body. Non-positive and infinite masses make the
    /// body immovable.
    pub fn set_mass(&mut self, mass: f32) {
        debug_assert!(!mass.is_nan(), "mass is NaN");
        self.inv_mass = if mass > 0.0 && mass.is_finite() {
            1.0 / mass
        } else {
            0.0
        };
    }

    /// Sets the inverse mass of the body. Zero makes the body immovable.
    pub fn set_inverse_mass(&mut self, inv_mass: f32) {
        debug_assert!(inv_mass >= 0.0, "negative inverse mass {}", inv_mass);
        self.inv_mass = inv_mass.max(0.0);
    }

    pub fn mass(&self) -> f32 {
        if self.inv_mass == 0.0 {
            f32::INFINITY
        } else {
            1.0 / self.inv_mass
        }
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Determines if the body is immovable.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Computes the center of mass and inverse inertia tensor of the body from
    /// its colliders and mass. Must be called after colliders are attached and
    /// the mass is set.
    ///
    /// The mass is distributed over the colliders by volume, and each
    /// collider's tensor is moved to the center of mass with the parallel
    /// axis theorem.
    pub fn calc_inertia(&mut self) {
        let total_volume: f32 = self.colliders.iter().map(|c| c.volume()).sum();
        self.com_local = if total_volume > COLLISION_EPSILON {
            let weighted = self.colliders.iter().fold(Vector3::zero(), |sum, c| {
                sum + c.shape_to_body().disp * c.volume()
            });
            Point3::from_vec(weighted / total_volume)
        } else {
            Point3::origin()
        };

        if self.inv_mass == 0.0 {
            self.inv_inertia_body = Matrix3::zero();
            self.inv_inertia_world = Matrix3::zero();
            return;
        }

        if total_volume <= COLLISION_EPSILON {
            warn!("body at {:?} has no collider volume, rotation is disabled", self.position);
            self.inv_inertia_body = Matrix3::zero();
            self.inv_inertia_world = Matrix3::zero();
            return;
        }

        let mass = 1.0 / self.inv_mass;
        let com = self.com_local.to_vec();
        let tensor = self.colliders.iter()
            .fold(Matrix3::zero(), |tensor_sum, collider| {
                let m = mass * collider.volume() / total_volume;
                let rot = collider.shape_to_body().rotation_matrix();
                let disp = collider.shape_to_body().disp - com;
                let outer_prod = Matrix3::from_cols(
                    disp * disp.x,
                    disp * disp.y,
                    disp * disp.z
                );
                tensor_sum + rot * collider.inertia_tensor(m) * rot.transpose()
                    + (Matrix3::identity() * disp.magnitude2() - outer_prod) * m
            });
        self.inv_inertia_body = match tensor.invert() {
            Some(inv) => inv,
            None => {
                warn!("singular inertia tensor for body at {:?}, rotation is disabled",
                      self.position);
                Matrix3::zero()
            },
        };
        self.update_world_inertia();
    }

    /// Sets the body-local inverse inertia tensor directly.
    pub fn set_inverse_inertia_tensor(&mut self, inv_tensor: Matrix3<f32>) {
        self.inv_inertia_body = inv_tensor;
        self.update_world_inertia();
    }

    #[inline]
    pub fn inverse_inertia_tensor(&self) -> &Matrix3<f32> {
        &self.inv_inertia_body
    }

    /// Inverse inertia tensor oriented in world space, as of the last
    /// `calculate_derived_data`.
    #[inline]
    pub fn inverse_inertia_tensor_world(&self) -> &Matrix3<f32> {
        &self.inv_inertia_world
    }

    /// Center of mass in the body frame.
    #[inline]
    pub fn center_of_mass_local(&self) -> Point3<f32> {
        self.com_local
    }

    /// Center of mass in world coordinates, as of the last
    /// `calculate_derived_data`.
    #[inline]
    pub fn center_of_mass(&self) -> Point3<f32> {
        self.com_world
    }

    #[inline]
    pub fn body_to_world(&self) -> &Isometry {
        &self.body_to_world
    }

    #[inline]
    pub fn world_to_body(&self) -> &Isometry {
        &self.world_to_body
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    pub fn set_orientation(&mut self, orientation: Quaternion<f32>) {
        self.orientation = orientation.normalize();
    }

    fn update_world_inertia(&mut self) {
        let r = Matrix3::from(self.orientation);
        self.inv_inertia_world = r * self.inv_inertia_body * r.transpose();
    }

    /// Rebuilds every value derived from the position and orientation: the
    /// body transforms, the world inverse inertia tensor, the world center of
    /// mass and the world transforms of all colliders. Must run before any
    /// geometric query in a step.
    pub fn calculate_derived_data(&mut self) {
        self.body_to_world = Isometry::new(self.position.to_vec(), self.orientation);
        self.world_to_body = self.body_to_world.inverse();
        self.update_world_inertia();
        self.com_world = self.body_to_world.transform_point(self.com_local);
        let body_to_world = self.body_to_world;
        for collider in self.colliders.iter_mut() {
            collider.calc_derived_data(&body_to_world);
        }
    }

    #[inline]
    pub fn point_to_world(&self, local: Point3<f32>) -> Point3<f32> {
        self.body_to_world.transform_point(local)
    }

    #[inline]
    pub fn point_to_local(&self, world: Point3<f32>) -> Point3<f32> {
        self.world_to_body.transform_point(world)
    }

    #[inline]
    pub fn direction_to_world(&self, local: Vector3<f32>) -> Vector3<f32> {
        self.body_to_world.transform_vector(local)
    }

    #[inline]
    pub fn direction_to_local(&self, world: Vector3<f32>) -> Vector3<f32> {
        self.world_to_body.transform_vector(world)
    }

    /// Velocity of the material point of the body located at `p`.
    pub fn velocity_at_point(&self, p: Point3<f32>) -> Vector3<f32> {
        self.velocity + self.angular_velocity.cross(p - self.com_world)
    }

    /// Pseudo velocity of the material point located at `p`.
    pub fn pseudo_velocity_at_point(&self, p: Point3<f32>) -> Vector3<f32> {
        self.pseudo_velocity + self.pseudo_angular_velocity.cross(p - self.com_world)
    }

    /// Accumulates a force applied at a world point. The force is applied at
    /// the next integration.
    pub fn apply_force(&mut self, force: Vector3<f32>, point: Point3<f32>) {
        self.force += force;
        self.torque += (point - self.com_world).cross(force);
    }

    /// Accumulates a force applied at the center of mass.
    pub fn apply_force_at_center(&mut self, force: Vector3<f32>) {
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: Vector3<f32>) {
        self.torque += torque;
    }

    /// Applies an impulse at a world point. Unlike forces the impulse changes
    /// the velocities immediately.
    pub fn apply_impulse(&mut self, impulse: Vector3<f32>, point: Point3<f32>) {
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia_world * (point - self.com_world).cross(impulse);
    }

    /// Applies a position correction impulse at a world point.
    pub fn apply_pseudo_impulse(&mut self, impulse: Vector3<f32>, point: Point3<f32>) {
        self.pseudo_velocity += impulse * self.inv_mass;
        self.pseudo_angular_velocity +=
            self.inv_inertia_world * (point - self.com_world).cross(impulse);
    }

    #[inline]
    pub fn force(&self) -> Vector3<f32> {
        self.force
    }

    #[inline]
    pub fn torque(&self) -> Vector3<f32> {
        self.torque
    }

    pub fn clear_accumulators(&mut self) {
        self.force = Vector3::zero();
        self.torque = Vector3::zero();
    }

    /// Semi-implicit Euler step of the linear state: the velocity is updated
    /// from the accumulated force first and the new velocity moves the body.
    pub fn integrate_linear(&mut self, dt: f32) {
        self.velocity += self.force * (self.inv_mass * dt);
        self.position += (self.velocity + self.pseudo_velocity) * dt;
        self.pseudo_velocity = Vector3::zero();
    }

    /// Integrates the orientation from the angular velocity. The body origin
    /// is moved so that the rotation pivots around the center of mass.
    pub fn integrate_angular(&mut self, dt: f32) {
        self.angular_velocity += self.inv_inertia_world * self.torque * dt;
        let omega = self.angular_velocity + self.pseudo_angular_velocity;
        self.pseudo_angular_velocity = Vector3::zero();
        if omega.magnitude2() <= COLLISION_EPSILON * COLLISION_EPSILON {
            return;
        }
        let old_rot = self.orientation;
        let spin = Quaternion::from_sv(0.0, omega) * old_rot * (0.5 * dt);
        self.orientation = (old_rot + spin).normalize();

        let arm = self.com_local.to_vec();
        if arm.magnitude2() > COLLISION_EPSILON * COLLISION_EPSILON {
            let com = self.position + old_rot.rotate_vector(arm);
            self.position = com + -self.orientation.rotate_vector(arm);
        }
    }

    /// Attaches a collider and returns its index.
    pub fn add_collider(&mut self, collider: Collider) -> usize {
        let mut collider = collider;
        collider.calc_derived_data(&self.body_to_world);
        if let Some(c) = self.colliders.first() {
            collider.set_body(c.body());
        }
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    /// Replaces every collider of the body with `collider`.
    pub fn set_collider(&mut self, collider: Collider) {
        let body = self.colliders.first().and_then(|c| c.body());
        self.colliders.clear();
        self.add_collider(collider);
        self.colliders[0].set_body(body);
    }

    #[inline]
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    #[inline]
    pub fn colliders_mut(&mut self) -> &mut [Collider] {
        &mut self.colliders
    }

    pub fn collider(&self, i: usize) -> &Collider {
        debug_assert!(i < self.colliders.len(), "collider index {} out of range", i);
        &self.colliders[i]
    }
}
