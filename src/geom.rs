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


use std::ops::Mul;

use cgmath::{EuclideanSpace, InnerSpace, Matrix3, Point3, Quaternion, Rotation,
             Vector3, One, Zero};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Maximum tolerence for error, i.e. what we consider the x86 floating
/// point epsilon.
pub const COLLISION_EPSILON: f32 = 0.000001;

/// A rigid transformation: a rotation followed by a displacement.
///
/// Used for every frame change in the crate (shape to body, body to world and
/// their inverses). The rotation is assumed to be normalized.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Isometry {
    /// The rotation of the frame. Assumed to be normalized.
    pub rot: Quaternion<f32>,
    /// The displacement of the frame's origin.
    pub disp: Vector3<f32>,
}

impl Isometry {
    pub fn new(disp: Vector3<f32>, rot: Quaternion<f32>) -> Self {
        Isometry { rot, disp }
    }

    pub fn identity() -> Self {
        Isometry {
            rot: Quaternion::one(),
            disp: Vector3::zero(),
        }
    }

    /// An isometry that only translates.
    pub fn from_disp(disp: Vector3<f32>) -> Self {
        Isometry {
            rot: Quaternion::one(),
            disp,
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Point3<f32>) -> Point3<f32> {
        Point3::from_vec(self.rot.rotate_vector(p.to_vec()) + self.disp)
    }

    #[inline]
    pub fn transform_vector(&self, v: Vector3<f32>) -> Vector3<f32> {
        self.rot.rotate_vector(v)
    }

    /// Returns the inverse transformation. Exact because the rotation is
    /// normalized.
    pub fn inverse(&self) -> Self {
        let rot = self.rot.conjugate();
        Isometry {
            rot,
            disp: -rot.rotate_vector(self.disp),
        }
    }

    /// Returns the transformation that applies `rhs` first and then `self`.
    pub fn concat(&self, rhs: &Isometry) -> Self {
        Isometry {
            rot: self.rot * rhs.rot,
            disp: self.rot.rotate_vector(rhs.disp) + self.disp,
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        Matrix3::from(self.rot)
    }
}

impl Default for Isometry {
    fn default() -> Self {
        Isometry::identity()
    }
}

impl Mul for Isometry {
    type Output = Isometry;

    fn mul(self, rhs: Isometry) -> Isometry {
        self.concat(&rhs)
    }
}

/// Planes are a normal vector and a distance.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub n: Vector3<f32>,
    pub d: f32,
}

impl Plane {
    /// Constructs the plane with normal `n` passing through `p`.
    pub fn from_point_normal(p: Point3<f32>, n: Vector3<f32>) -> Self {
        Plane {
            n,
            d: n.dot(p.to_vec()),
        }
    }

    /// Signed distance from the plane, positive on the side `n` points to.
    #[inline]
    pub fn distance(&self, q: Point3<f32>) -> f32 {
        self.n.dot(q.to_vec()) - self.d
    }

    /// Returns closest point on plane to q
    #[inline]
    pub fn project(&self, q: Point3<f32>) -> Point3<f32> {
        q + -self.n * self.distance(q)
    }

    /// Moves the plane into the frame described by `iso`.
    pub fn transform(&self, iso: &Isometry) -> Plane {
        let n = iso.transform_vector(self.n);
        let p = iso.transform_point(Point3::from_vec(self.n * self.d));
        Plane::from_point_normal(p, n)
    }
}

impl From<(Point3<f32>, Point3<f32>, Point3<f32>)> for Plane {
    fn from(p: (Point3<f32>, Point3<f32>, Point3<f32>)) -> Self {
        let (a, b, c) = p;
        let n = (b - a).cross(c - a).normalize();
        Plane {
            n: n,
            d: n.dot(a.to_vec()),
        }
    }
}

#[inline(always)]
pub fn clamp(n: f32, min: f32, max: f32) -> f32 {
    if n < min {
        min
    } else if n > max {
        max
    } else {
        n
    }
}

/// Returns the pair of closest points between two infinite lines, each given
/// by a point and a direction. Directions do not need to be normalized.
///
/// This is a 2x2 solve on the dot products of the directions. If the lines
/// are parallel the solve is singular and the starting points are returned.
pub fn closest_points_on_lines(
    p1: Point3<f32>,
    d1: Vector3<f32>,
    p2: Point3<f32>,
    d2: Vector3<f32>,
) -> (Point3<f32>, Point3<f32>, f32, f32) {
    let r = p1 - p2;
    let a = d1.dot(d1);
    let b = d1.dot(d2);
    let c = d1.dot(r);
    let e = d2.dot(d2);
    let f = d2.dot(r);
    let denom = a * e - b * b;
    if denom.abs() <= COLLISION_EPSILON {
        return (p1, p2, 0.0, 0.0);
    }
    let s = (b * f - c * e) / denom;
    let t = (a * f - b * c) / denom;
    (p1 + d1 * s, p2 + d2 * t, s, t)
}

/// Polygon produced by clipping. Four points are enough for a box face,
/// clipping against four planes adds at most four more.
pub type ClippedPolygon = SmallVec<[Point3<f32>; 8]>;

/// Clips a convex polygon against a plane, keeping the part on the negative
/// side (`plane.distance(p) <= 0`). Sutherland-Hodgman for a single plane.
pub fn clip_polygon(polygon: &[Point3<f32>], plane: &Plane) -> ClippedPolygon {
    let mut out = ClippedPolygon::new();
    if polygon.is_empty() {
        return out;
    }
    let mut prev = polygon[polygon.len() - 1];
    let mut prev_dist = plane.distance(prev);
    for &curr in polygon {
        let curr_dist = plane.distance(curr);
        let prev_inside = prev_dist <= 0.0;
        let curr_inside = curr_dist <= 0.0;
        if prev_inside != curr_inside {
            let t = prev_dist / (prev_dist - curr_dist);
            out.push(prev + (curr - prev) * t);
        }
        if curr_inside {
            out.push(curr);
        }
        prev = curr;
        prev_dist = curr_dist;
    }
    out
}

/// Picks a unit vector perpendicular to `n`, seeded by world X or world Z
/// whichever is less parallel to `n`. Returns the two tangents completing an
/// orthonormal basis with `n`.
pub fn tangent_basis(n: Vector3<f32>) -> [Vector3<f32>; 2] {
    let seed = if n.x.abs() > n.z.abs() {
        Vector3::new(0.0, 0.0, 1.0)
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    };
    let t1 = (seed - n * seed.dot(n)).normalize();
    let t2 = n.cross(t1);
    [t1, t2]
}

/// Skew-symmetric matrix such that `skew(r) * v == r.cross(v)`.
pub fn skew(r: Vector3<f32>) -> Matrix3<f32> {
    Matrix3::new(
        0.0, r.z, -r.y,
        -r.z, 0.0, r.x,
        r.y, -r.x, 0.0,
    )
}
