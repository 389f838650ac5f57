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


use cgmath::{InnerSpace, Matrix, Matrix3, Point3, SquareMatrix, Vector3, Zero};
use serde::{Deserialize, Serialize};

use crate::body::*;
use crate::config::*;
use crate::geom::*;
use crate::pool::BodyHandle;

/// How a contact point was generated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    /// A point of body 0 against a face of body 1. Produced by the box clipping
    /// routine and by every sphere test.
    VertexFace,
    /// The closest points of two crossing box edges.
    EdgeEdge,
    /// A box face resting on a plane, one contact per submerged vertex.
    FaceFace,
    /// A point produced by the generic convex (GJK/EPA) fallback.
    Debug,
}

/// One point of contact between two bodies.
///
/// A contact keeps its point on each body in body-local coordinates as well
/// as in world coordinates. The local points are fixed to the bodies, so the
/// penetration can be recomputed every step from the current transforms
/// without running the narrow phase again.
///
/// The normal points from body 1 toward body 0. Penetration is positive when
/// the bodies overlap and negative when they are separated.
#[derive(Copy, Clone, Debug)]
pub struct Contact {
    /// The two bodies in contact. For face contacts body 0 is the incident
    /// body and body 1 owns the reference face.
    pub bodies: [BodyHandle; 2],
    /// Contact point on each body, in that body's frame.
    pub local_points: [Point3<f32>; 2],
    /// Contact point on each body, in world coordinates.
    pub world_points: [Point3<f32>; 2],
    /// The normal in the frame of body 1.
    pub local_normal: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub penetration: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub restitution: f32,
    /// Orthonormal contact basis. Columns are the normal and two tangents.
    pub basis: Matrix3<f32>,
    /// Velocity of body 1 relative to body 0 at the contact, in contact
    /// coordinates. Positive along the normal when the bodies approach.
    pub relative_velocity: Vector3<f32>,
    /// Change in normal relative velocity the velocity solver aims for.
    pub desired_delta_velocity: f32,
    /// Separating normal velocity requested by restitution.
    restitution_velocity: f32,
    pub kind: ContactKind,
    /// Indices of the features (vertices, edges, faces) that generated the
    /// contact, used to match contacts across steps.
    pub features: [u32; 2],
}

impl Contact {
    /// Builds a contact from world-space points and normal. `normal` must be
    /// unit length and point from `body_b` toward `body_a`.
    pub fn new(
        bodies: [BodyHandle; 2],
        body_a: &RigidBody,
        body_b: &RigidBody,
        point_a: Point3<f32>,
        point_b: Point3<f32>,
        normal: Vector3<f32>,
        penetration: f32,
        kind: ContactKind,
        features: [u32; 2],
    ) -> Self {
        debug_assert!((normal.magnitude2() - 1.0).abs() < 0.001,
                      "contact normal is not unit length: {:?}", normal);
        let [t1, t2] = tangent_basis(normal);
        Contact {
            bodies,
            local_points: [ body_a.point_to_local(point_a), body_b.point_to_local(point_b) ],
            world_points: [ point_a, point_b ],
            local_normal: body_b.direction_to_local(normal),
            normal,
            penetration,
            // Mix friction and restitution values
            static_friction: (body_a.static_friction * body_b.static_friction).sqrt(),
            dynamic_friction: (body_a.dynamic_friction * body_b.dynamic_friction).sqrt(),
            restitution: body_a.restitution.max(body_b.restitution),
            basis: Matrix3::from_cols(normal, t1, t2),
            relative_velocity: Vector3::zero(),
            desired_delta_velocity: 0.0,
            restitution_velocity: 0.0,
            kind,
            features,
        }
    }

    /// Midpoint of the two contact points.
    pub fn point(&self) -> Point3<f32> {
        self.world_points[0] + (self.world_points[1] - self.world_points[0]) * 0.5
    }

    /// Recomputes the world points, the normal and the penetration from the
    /// current body transforms.
    pub fn refresh(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        self.world_points = [
            body_a.point_to_world(self.local_points[0]),
            body_b.point_to_world(self.local_points[1]),
        ];
        self.normal = body_b.direction_to_world(self.local_normal).normalize();
        self.penetration = (self.world_points[1] - self.world_points[0]).dot(self.normal);
    }

    /// Offset of the point on body 0 from the point on body 1 in the contact
    /// plane.
    pub fn tangential_drift(&self) -> Vector3<f32> {
        let d = self.world_points[0] - self.world_points[1];
        d - self.normal * d.dot(self.normal)
    }

    /// Determines if two contacts were generated by the same features of the
    /// same bodies.
    pub fn same_features(&self, other: &Contact) -> bool {
        self.bodies == other.bodies && self.kind == other.kind && self.features == other.features
    }

    /// Determines if two contacts between the same pair of bodies, taken in
    /// either order, have midpoints within `distance` of each other.
    pub fn is_near(&self, other: &Contact, distance: f32) -> bool {
        let same_pair = self.bodies == other.bodies
            || (self.bodies[0] == other.bodies[1] && self.bodies[1] == other.bodies[0]);
        same_pair && (self.point() - other.point()).magnitude2() <= distance * distance
    }

    /// Builds the contact basis, the relative velocity and the desired change
    /// in velocity for this step. Must be called after the contact has been
    /// refreshed and before it is resolved.
    pub fn calculate_internals<Config: PhysicsConfig>(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        let [t1, t2] = tangent_basis(self.normal);
        self.basis = Matrix3::from_cols(self.normal, t1, t2);
        self.relative_velocity = self.contact_velocity(body_a, body_b);
        let closing = self.relative_velocity.x;
        self.restitution_velocity = if closing > Config::RESTITUTION_VELOCITY_LIMIT {
            self.restitution * closing
        } else {
            0.0
        };
        self.desired_delta_velocity = -closing - self.restitution_velocity;
    }

    /// Relative velocity at the contact in contact coordinates.
    fn contact_velocity(&self, body_a: &RigidBody, body_b: &RigidBody) -> Vector3<f32> {
        let v = body_b.velocity_at_point(self.world_points[1])
            - body_a.velocity_at_point(self.world_points[0]);
        self.basis.transpose() * v
    }

    /// Recomputes the relative velocity after other contacts changed the body
    /// velocities, keeping the restitution target of this step.
    pub fn update_velocity_state(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        self.relative_velocity = self.contact_velocity(body_a, body_b);
        self.desired_delta_velocity = -self.relative_velocity.x - self.restitution_velocity;
    }

    /// Matrix converting a unit impulse at the contact into the change in
    /// relative velocity it produces, in contact coordinates. An impulse `j`
    /// applied as `+j` to body 0 and `-j` to body 1 changes the relative
    /// velocity by `-K * j`.
    pub fn impulse_to_velocity(&self, body_a: &RigidBody, body_b: &RigidBody) -> Matrix3<f32> {
        let k = point_impulse_response(body_a, self.world_points[0])
            + point_impulse_response(body_b, self.world_points[1]);
        self.basis.transpose() * k * self.basis
    }

    /// Impulse along the normal alone that produces the desired change in
    /// velocity. Returned in contact coordinates.
    pub fn calculate_frictionless_impulse(&self, body_a: &RigidBody, body_b: &RigidBody) -> Vector3<f32> {
        let k = self.impulse_to_velocity(body_a, body_b);
        let k_nn = k.x.x;
        if k_nn <= COLLISION_EPSILON {
            return Vector3::zero();
        }
        Vector3::new(-self.desired_delta_velocity / k_nn, 0.0, 0.0)
    }

    /// Impulse that produces the desired change in normal velocity and removes
    /// all tangential velocity, limited to the Coulomb friction cone. Returned
    /// in contact coordinates.
    ///
    /// If the tangential part exceeds `static_friction` times the normal
    /// impulse, the contact slides: the tangential part is scaled to exactly
    /// `dynamic_friction` times the normal impulse.
    pub fn calculate_friction_impulse(&self, body_a: &RigidBody, body_b: &RigidBody) -> Vector3<f32> {
        let k = self.impulse_to_velocity(body_a, body_b);
        let k_inv = match k.invert() {
            Some(k_inv) => k_inv,
            None => return self.calculate_frictionless_impulse(body_a, body_b),
        };
        let target = Vector3::new(
            self.desired_delta_velocity,
            -self.relative_velocity.y,
            -self.relative_velocity.z,
        );
        let mut impulse = -(k_inv * target);

        let planar = (impulse.y * impulse.y + impulse.z * impulse.z).sqrt();
        if planar > self.static_friction * impulse.x.abs() {
            let (u1, u2) = (impulse.y / planar, impulse.z / planar);
            let mu = self.dynamic_friction;
            // Normal impulse accounting for the coupling with the sliding
            // friction impulse.
            let mut denom = k.x.x + mu * (k.y.x * u1 + k.z.x * u2);
            if denom <= COLLISION_EPSILON {
                denom = k.x.x;
            }
            if denom <= COLLISION_EPSILON {
                return Vector3::zero();
            }
            let normal = -self.desired_delta_velocity / denom;
            let tangential = mu * normal.abs();
            impulse = Vector3::new(normal, u1 * tangential, u2 * tangential);
        }
        impulse
    }

    /// Applies one velocity impulse to the bodies. Returns the impulse applied
    /// to body 0 in world coordinates (body 1 receives its negation).
    ///
    /// Cached contacts whose bodies have separated are kept by the manifold
    /// but receive no impulse until the bodies touch again.
    pub fn resolve_velocity(&mut self, body_a: &mut RigidBody, body_b: &mut RigidBody) -> Vector3<f32> {
        if self.penetration < 0.0 {
            return Vector3::zero();
        }
        self.update_velocity_state(body_a, body_b);
        if self.desired_delta_velocity >= 0.0 {
            // Already separating fast enough.
            return Vector3::zero();
        }
        let local = if self.static_friction == 0.0 && self.dynamic_friction == 0.0 {
            self.calculate_frictionless_impulse(body_a, body_b)
        } else {
            self.calculate_friction_impulse(body_a, body_b)
        };
        let impulse = self.basis * local;
        body_a.apply_impulse(impulse, self.world_points[0]);
        body_b.apply_impulse(-impulse, self.world_points[1]);
        impulse
    }

    /// Magnitude of the position correction impulse along the normal.
    ///
    /// The target separation speed is `BAUMGARTE * max(penetration - slop, 0)
    /// / dt`. The impulse acts on the pseudo velocities of the bodies, so it
    /// corrects penetration without adding kinetic energy.
    pub fn calc_baumgarte_impulse<Config: PhysicsConfig>(&self, body_a: &RigidBody, body_b: &RigidBody, dt: f32) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }
        let bias = Config::BAUMGARTE * (self.penetration - Config::PENETRATION_SLOP).max(0.0) / dt;
        let separating = (body_a.pseudo_velocity_at_point(self.world_points[0])
                          - body_b.pseudo_velocity_at_point(self.world_points[1])).dot(self.normal);
        let k_nn = self.normal.dot(
            (point_impulse_response(body_a, self.world_points[0])
             + point_impulse_response(body_b, self.world_points[1])) * self.normal
        );
        if k_nn <= COLLISION_EPSILON {
            return 0.0;
        }
        ((bias - separating) / k_nn).max(0.0)
    }

    /// Applies one position correction impulse to the pseudo velocities.
    pub fn resolve_position<Config: PhysicsConfig>(&mut self, body_a: &mut RigidBody, body_b: &mut RigidBody, dt: f32) -> f32 {
        let lambda = self.calc_baumgarte_impulse::<Config>(body_a, body_b, dt);
        if lambda > 0.0 {
            let impulse = self.normal * lambda;
            body_a.apply_pseudo_impulse(impulse, self.world_points[0]);
            body_b.apply_pseudo_impulse(-impulse, self.world_points[1]);
        }
        lambda
    }
}

/// Change in velocity of the material point `p` of a body per unit impulse
/// applied at `p`: `inv_mass * I - [r]x * I_inv * [r]x`.
fn point_impulse_response(body: &RigidBody, p: Point3<f32>) -> Matrix3<f32> {
    let r = skew(p - body.center_of_mass());
    Matrix3::identity() * body.inverse_mass() - r * *body.inverse_inertia_tensor_world() * r
}
