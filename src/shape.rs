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
use std::f32::consts::PI;

use cgmath::{ElementWise, EuclideanSpace, InnerSpace, Matrix3, Point3, SquareMatrix, Vector3, Zero};
use serde::{Deserialize, Serialize};

use crate::geom::*;

/// Kind of a Shape without its parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Box,
    Sphere,
    Cylinder,
    Capsule,
    Cone,
    Plane,
}

/// The geometry of a collider in its own local frame.
///
/// Every volume is centered on its centroid, and shapes with an axis of
/// symmetry (cylinders, capsules and cones) are aligned along the y axis.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// A box described by its three half widths.
    Box { half_extents: Vector3<f32> },
    Sphere { radius: f32 },
    /// A cylinder of total height `2 * half_height`.
    Cylinder { radius: f32, half_height: f32 },
    /// A sphere swept along a segment of length `2 * half_height`.
    Capsule { radius: f32, half_height: f32 },
    /// A cone of the given base radius and height. The base sits at
    /// `y = -height / 4` and the apex at `y = 3 * height / 4`.
    Cone { radius: f32, height: f32 },
    /// A half-space, solid on the side opposite to its normal. Planes have no
    /// volume and are meant to be attached to immovable bodies.
    Plane { normal: Vector3<f32>, offset: f32 },
}

/// Local vertex signs of a box, in the order returned by `Collider::vertex`.
pub const BOX_VERTEX_SIGNS: [[f32; 3]; 8] = [
    [ -1.0, -1.0, -1.0 ],
    [  1.0, -1.0, -1.0 ],
    [ -1.0,  1.0, -1.0 ],
    [  1.0,  1.0, -1.0 ],
    [ -1.0, -1.0,  1.0 ],
    [  1.0, -1.0,  1.0 ],
    [ -1.0,  1.0,  1.0 ],
    [  1.0,  1.0,  1.0 ],
];

impl Shape {
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Shape::Box { half_extents: Vector3::new(hx, hy, hz) }
    }

    pub fn sphere(radius: f32) -> Self {
        Shape::Sphere { radius }
    }

    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        Shape::Cylinder { radius, half_height }
    }

    pub fn capsule(radius: f32, half_height: f32) -> Self {
        Shape::Capsule { radius, half_height }
    }

    pub fn cone(radius: f32, height: f32) -> Self {
        Shape::Cone { radius, height }
    }

    /// A half-space bounded by the plane through the origin with the given
    /// normal. The normal is normalized.
    pub fn plane(normal: Vector3<f32>, offset: f32) -> Self {
        Shape::Plane { normal: normal.normalize(), offset }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Sphere { .. } => ShapeKind::Sphere,
            Shape::Cylinder { .. } => ShapeKind::Cylinder,
            Shape::Capsule { .. } => ShapeKind::Capsule,
            Shape::Cone { .. } => ShapeKind::Cone,
            Shape::Plane { .. } => ShapeKind::Plane,
        }
    }

    /// Returns the volume of the shape. Planes have none.
    pub fn volume(&self) -> f32 {
        match *self {
            Shape::Box { half_extents: e } => 8.0 * e.x * e.y * e.z,
            Shape::Sphere { radius: r } => 4.0 / 3.0 * PI * r * r * r,
            Shape::Cylinder { radius: r, half_height: h } => PI * r * r * 2.0 * h,
            Shape::Capsule { radius: r, half_height: h } =>
                PI * r * r * 2.0 * h + 4.0 / 3.0 * PI * r * r * r,
            Shape::Cone { radius: r, height: h } => PI * r * r * h / 3.0,
            Shape::Plane { .. } => 0.0,
        }
    }

    /// Returns the point of the shape furthest along `dir`, in local
    /// coordinates. `dir` does not need to be normalized.
    ///
    /// Planes are unbounded and have no support point; asking for one is a
    /// contract violation.
    pub fn support(&self, dir: Vector3<f32>) -> Point3<f32> {
        match *self {
            Shape::Box { half_extents: e } => Point3::new(
                sign(dir.x) * e.x,
                sign(dir.y) * e.y,
                sign(dir.z) * e.z,
            ),
            Shape::Sphere { radius } => Point3::from_vec(normalize_or_y(dir) * radius),
            Shape::Cylinder { radius, half_height } => {
                let radial = radial_support(dir, radius);
                Point3::new(radial.x, sign(dir.y) * half_height, radial.z)
            },
            Shape::Capsule { radius, half_height } => {
                let tip = Vector3::new(0.0, sign(dir.y) * half_height, 0.0);
                Point3::from_vec(tip + normalize_or_y(dir) * radius)
            },
            Shape::Cone { radius, height } => {
                let apex = Point3::new(0.0, 0.75 * height, 0.0);
                let radial = radial_support(dir, radius);
                let rim = Point3::new(radial.x, -0.25 * height, radial.z);
                if apex.to_vec().dot(dir) >= rim.to_vec().dot(dir) {
                    apex
                } else {
                    rim
                }
            },
            Shape::Plane { .. } => {
                debug_assert!(false, "planes have no support point");
                Point3::new(0.0, 0.0, 0.0)
            },
        }
    }

    /// Radius of the smallest sphere centered on the local origin containing
    /// the shape. Infinite for planes.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Box { half_extents } => half_extents.magnitude(),
            Shape::Sphere { radius } => radius,
            Shape::Cylinder { radius, half_height } =>
                (radius * radius + half_height * half_height).sqrt(),
            Shape::Capsule { radius, half_height } => radius + half_height,
            Shape::Cone { radius, height } => {
                let base = (radius * radius + 0.0625 * height * height).sqrt();
                base.max(0.75 * height)
            },
            Shape::Plane { .. } => f32::INFINITY,
        }
    }
}

#[inline(always)]
fn sign(x: f32) -> f32 {
    if x < 0.0 { -1.0 } else { 1.0 }
}

#[inline]
fn normalize_or_y(dir: Vector3<f32>) -> Vector3<f32> {
    let len2 = dir.magnitude2();
    if len2 <= COLLISION_EPSILON * COLLISION_EPSILON {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        dir / len2.sqrt()
    }
}

/// Support of a disk of radius `r` in the xz plane.
#[inline]
fn radial_support(dir: Vector3<f32>, r: f32) -> Vector3<f32> {
    let len = (dir.x * dir.x + dir.z * dir.z).sqrt();
    if len <= COLLISION_EPSILON {
        Vector3::zero()
    } else {
        Vector3::new(dir.x / len * r, 0.0, dir.z / len * r)
    }
}

/// An type that has a moment of inertia.
pub trait Inertia {
    /// Inertia tensor about the centroid, in the local frame, for mass `m`.
    fn tensor(&self, m: f32) -> Matrix3<f32>;
}

impl Inertia for Shape {
    fn tensor(&self, m: f32) -> Matrix3<f32> {
        match *self {
            Shape::Box { half_extents: e } => {
                let e2 = e.mul_element_wise(e);
                Matrix3::from_diagonal(Vector3::new(
                    e2.y + e2.z,
                    e2.x + e2.z,
                    e2.x + e2.y,
                ) * (m / 3.0))
            },
            Shape::Sphere { radius: r } => {
                Matrix3::from_value(0.4 * m * r * r)
            },
            Shape::Cylinder { radius: r, half_height } => {
                let h = 2.0 * half_height;
                let i_x = m * (3.0 * r * r + h * h) / 12.0;
                let i_y = 0.5 * m * r * r;
                Matrix3::from_diagonal(Vector3::new(i_x, i_y, i_x))
            },
            Shape::Capsule { radius: r, half_height } => {
                // Distribute the mass between the hemispheres and cylinder by
                // volume.
                let h = 2.0 * half_height;
                let v_c = PI * r * r * h;
                let v_s = 4.0 / 3.0 * PI * r * r * r;
                let mc = m * v_c / (v_c + v_s);
                let ms = m - mc;
                // Tensor for cylinder
                let ic_x = mc * (3.0 * r * r + h * h) / 12.0;
                let ic_y = 0.5 * mc * r * r;
                // Tensor for two hemispheres shifted to the ends of the
                // cylinder.
                let is_x = ms * (0.4 * r * r + 0.25 * h * h + 0.375 * h * r);
                let is_y = 0.4 * ms * r * r;
                let (i_x, i_y) = (ic_x + is_x, ic_y + is_y);
                Matrix3::from_diagonal(Vector3::new(i_x, i_y, i_x))
            },
            Shape::Cone { radius: r, height: h } => {
                let i_x = m * (0.15 * r * r + 0.0375 * h * h);
                let i_y = 0.3 * m * r * r;
                Matrix3::from_diagonal(Vector3::new(i_x, i_y, i_x))
            },
            Shape::Plane { .. } => Matrix3::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    mod shape {
        use std::f32::consts::PI;

        use approx::assert_relative_eq;
        use cgmath::{Point3, Vector3, Matrix3, SquareMatrix};

        use crate::shape::*;

        #[test]
        fn test_volumes() {
            assert_relative_eq!(Shape::cuboid(0.5, 1.0, 2.0).volume(), 8.0);
            assert_relative_eq!(Shape::sphere(1.0).volume(), 4.0 / 3.0 * PI);
            assert_relative_eq!(Shape::cylinder(1.0, 1.0).volume(), 2.0 * PI);
            assert_relative_eq!(Shape::capsule(1.0, 1.0).volume(), 2.0 * PI + 4.0 / 3.0 * PI);
            assert_relative_eq!(Shape::cone(1.0, 3.0).volume(), PI);
            assert_eq!(Shape::plane(Vector3::new(0.0, 1.0, 0.0), 0.0).volume(), 0.0);
        }

        #[test]
        fn test_tensors() {
            // A unit cube of mass 6 has moments of 1.
            let t = Shape::cuboid(0.5, 0.5, 0.5).tensor(6.0);
            assert_relative_eq!(t, Matrix3::identity(), epsilon = 0.00001);
            let t = Shape::sphere(1.0).tensor(5.0);
            assert_relative_eq!(t, Matrix3::identity() * 2.0, epsilon = 0.00001);
            // A capsule with no cylinder is a sphere.
            let t = Shape::capsule(1.0, 0.0).tensor(5.0);
            assert_relative_eq!(t, Matrix3::identity() * 2.0, epsilon = 0.00001);
            let t = Shape::cylinder(1.0, 1.0).tensor(12.0);
            assert_relative_eq!(t.x.x, 7.0, epsilon = 0.00001);
            assert_relative_eq!(t.y.y, 6.0, epsilon = 0.00001);
        }

        #[test]
        fn test_support() {
            let b = Shape::cuboid(1.0, 2.0, 3.0);
            assert_eq!(b.support(Vector3::new(1.0, -1.0, 0.0)), Point3::new(1.0, -2.0, 3.0));
            let s = Shape::sphere(2.0);
            assert_relative_eq!(s.support(Vector3::new(0.0, 0.0, -5.0)), Point3::new(0.0, 0.0, -2.0));
            let c = Shape::cylinder(1.0, 2.0);
            assert_relative_eq!(c.support(Vector3::new(3.0, 1.0, 0.0)), Point3::new(1.0, 2.0, 0.0));
            let c = Shape::capsule(1.0, 2.0);
            assert_relative_eq!(c.support(Vector3::new(0.0, -1.0, 0.0)), Point3::new(0.0, -3.0, 0.0));
            let c = Shape::cone(1.0, 4.0);
            assert_relative_eq!(c.support(Vector3::new(0.0, 1.0, 0.0)), Point3::new(0.0, 3.0, 0.0));
            assert_relative_eq!(c.support(Vector3::new(1.0, -1.0, 0.0)), Point3::new(1.0, -1.0, 0.0));
        }
    }
}
