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

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};

use crate::geom::*;
use crate::pool::BodyHandle;
use crate::shape::*;

/// A shape attached to a RigidBody at some offset.
///
/// A collider caches its world transform. All of the world-space queries
/// (axes, vertices, faces, projections and support points) read that cache
/// and are only meaningful after `calc_derived_data` has been called with the
/// current transform of the owning body. Debug builds check this.
#[derive(Clone, Debug)]
pub struct Collider {
    shape: Shape,
    shape_to_body: Isometry,
    body_to_shape: Isometry,
    shape_to_world: Isometry,
    world_to_shape: Isometry,
    /// Owning body. Not an owning reference: the body owns the collider.
    body: Option<BodyHandle>,
    derived: bool,
}

impl Collider {
    /// Creates a collider centered on the body origin.
    pub fn new(shape: Shape) -> Self {
        Collider::with_offset(shape, Isometry::identity())
    }

    /// Creates a collider placed at `shape_to_body` in the body frame.
    pub fn with_offset(shape: Shape, shape_to_body: Isometry) -> Self {
        Collider {
            shape,
            shape_to_body,
            body_to_shape: shape_to_body.inverse(),
            shape_to_world: shape_to_body,
            world_to_shape: shape_to_body.inverse(),
            body: None,
            derived: false,
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Moves the collider relative to its body. The derived world transform
    /// becomes invalid until the next `calc_derived_data`.
    pub fn set_offset(&mut self, shape_to_body: Isometry) {
        self.shape_to_body = shape_to_body;
        self.body_to_shape = shape_to_body.inverse();
        self.derived = false;
    }

    #[inline]
    pub fn shape_to_body(&self) -> &Isometry {
        &self.shape_to_body
    }

    #[inline]
    pub fn body_to_shape(&self) -> &Isometry {
        &self.body_to_shape
    }

    #[inline]
    pub fn shape_to_world(&self) -> &Isometry {
        debug_assert!(self.derived, "collider queried before calc_derived_data");
        &self.shape_to_world
    }

    #[inline]
    pub fn world_to_shape(&self) -> &Isometry {
        debug_assert!(self.derived, "collider queried before calc_derived_data");
        &self.world_to_shape
    }

    /// The body this collider is attached to, if it has been inserted into a
    /// World.
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    pub(crate) fn set_body(&mut self, body: Option<BodyHandle>) {
        self.body = body;
    }

    /// Recomputes the world transform from the transform of the owning body.
    pub fn calc_derived_data(&mut self, body_to_world: &Isometry) {
        self.shape_to_world = body_to_world.concat(&self.shape_to_body);
        self.world_to_shape = self.shape_to_world.inverse();
        self.derived = true;
    }

    /// Determines if the world transform has been computed.
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    pub fn volume(&self) -> f32 {
        self.shape.volume()
    }

    /// Inertia tensor of the shape for mass `m`, about the centroid of the
    /// shape, in the shape's local frame.
    pub fn inertia_tensor(&self, m: f32) -> cgmath::Matrix3<f32> {
        self.shape.tensor(m)
    }

    /// World position of the shape's centroid.
    pub fn center(&self) -> Point3<f32> {
        Point3::from_vec(self.shape_to_world().disp)
    }

    /// Furthest point of the shape along the world direction `dir`, in world
    /// coordinates.
    pub fn support_point(&self, dir: Vector3<f32>) -> Point3<f32> {
        let local_dir = self.world_to_shape().transform_vector(dir);
        self.shape_to_world.transform_point(self.shape.support(local_dir))
    }

    /// Half widths of a box collider.
    pub fn half_extents(&self) -> Vector3<f32> {
        match self.shape {
            Shape::Box { half_extents } => half_extents,
            _ => {
                debug_assert!(false, "half_extents called on a {:?}", self.kind());
                Vector3::new(0.0, 0.0, 0.0)
            },
        }
    }

    /// Radius of a sphere, cylinder, capsule or cone collider.
    pub fn radius(&self) -> f32 {
        match self.shape {
            Shape::Sphere { radius } | Shape::Cylinder { radius, .. }
            | Shape::Capsule { radius, .. } | Shape::Cone { radius, .. } => radius,
            _ => {
                debug_assert!(false, "radius called on a {:?}", self.kind());
                0.0
            },
        }
    }

    /// The bounding plane of a plane collider in world coordinates.
    pub fn world_plane(&self) -> Plane {
        match self.shape {
            Shape::Plane { normal, offset } =>
                Plane { n: normal, d: offset }.transform(self.shape_to_world()),
            _ => {
                debug_assert!(false, "world_plane called on a {:?}", self.kind());
                Plane { n: Vector3::new(0.0, 1.0, 0.0), d: 0.0 }
            },
        }
    }

    /// The `i`th local axis of the collider in world coordinates, for `i` in
    /// 0..3.
    #[inline]
    pub fn axis(&self, i: usize) -> Vector3<f32> {
        debug_assert!(i < 3, "axis index {} out of range", i);
        let mut v = Vector3::new(0.0, 0.0, 0.0);
        v[i] = 1.0;
        self.shape_to_world().transform_vector(v)
    }

    /// The `i`th vertex of a box collider in world coordinates, for `i` in
    /// 0..8. Vertex signs follow `BOX_VERTEX_SIGNS`.
    pub fn vertex(&self, i: usize) -> Point3<f32> {
        debug_assert!(i < 8, "vertex index {} out of range", i);
        let e = self.half_extents();
        let s = BOX_VERTEX_SIGNS[i];
        self.shape_to_world().transform_point(Point3::new(s[0] * e.x, s[1] * e.y, s[2] * e.z))
    }

    /// Outward world normal of face `i` of a box collider. Faces are ordered
    /// +x, -x, +y, -y, +z, -z.
    pub fn face_normal(&self, i: usize) -> Vector3<f32> {
        debug_assert!(i < 6, "face index {} out of range", i);
        let n = self.axis(i / 2);
        if i % 2 == 0 { n } else { -n }
    }

    /// The four world vertices of face `i` of a box collider, wound around the
    /// face.
    pub fn face(&self, i: usize) -> [Point3<f32>; 4] {
        debug_assert!(i < 6, "face index {} out of range", i);
        let e = self.half_extents();
        let a = i / 2;
        let (b, c) = ((a + 1) % 3, (a + 2) % 3);
        let s = if i % 2 == 0 { 1.0 } else { -1.0 };
        let center = self.center() + self.axis(a) * (s * e[a]);
        let u = self.axis(b) * e[b];
        let v = self.axis(c) * e[c];
        [
            center + u + v,
            center + -u + v,
            center + -u + -v,
            center + u + -v,
        ]
    }

    /// Plane of face `i` of a box collider, with its outward normal.
    pub fn face_plane(&self, i: usize) -> Plane {
        let n = self.face_normal(i);
        let a = i / 2;
        let p = self.center() + n * self.half_extents()[a];
        Plane::from_point_normal(p, n)
    }

    /// Projects a box collider onto a world axis and returns the `[min, max]`
    /// interval of the projection.
    pub fn project_onto_axis(&self, axis: Vector3<f32>) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for i in 0..8 {
            let d = self.vertex(i).to_vec().dot(axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min, max)
    }
}

impl From<Shape> for Collider {
    fn from(shape: Shape) -> Self {
        Collider::new(shape)
    }
}
