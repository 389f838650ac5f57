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


//! Generic intersection and penetration queries for convex colliders.
//!
//! Pairs of shapes without a dedicated contact routine fall back on GJK to
//! decide whether the colliders overlap and on EPA to measure by how much.
//! Both algorithms only need support points, which every bounded collider
//! provides.

use std::f32;

use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3, Zero};
use smallvec::SmallVec;

use crate::collider::*;
use crate::geom::*;

/// A point of the Minkowski difference `A - B` along with the points of each
/// collider that produced it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SupportPoint {
    pub w: Vector3<f32>,
    pub a: Point3<f32>,
    pub b: Point3<f32>,
}

impl SupportPoint {
    /// Support point of `a - b` along `dir`.
    pub fn new(a: &Collider, b: &Collider, dir: Vector3<f32>) -> Self {
        let pa = a.support_point(dir);
        let pb = b.support_point(-dir);
        SupportPoint {
            w: pa - pb,
            a: pa,
            b: pb,
        }
    }
}

impl From<SupportPoint> for Point3<f32> {
    fn from(p: SupportPoint) -> Point3<f32> {
        Point3::from_vec(p.w)
    }
}

/// The simplex GJK terminates with. Contains the origin when returned by a
/// successful intersection test.
#[derive(Clone, Debug)]
pub struct Simplex {
    points: SmallVec<[SupportPoint; 4]>,
}

impl Simplex {
    pub fn new() -> Self {
        Simplex { points: SmallVec::new() }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SupportPoint] {
        &self.points
    }

    pub fn push(&mut self, p: SupportPoint) {
        debug_assert!(self.points.len() < 4, "simplex is already a tetrahedron");
        self.points.push(p);
    }

    fn set(&mut self, points: &[SupportPoint]) {
        self.points.clear();
        self.points.extend_from_slice(points);
    }
}

impl Default for Simplex {
    fn default() -> Self {
        Simplex::new()
    }
}

/// Penetration of two overlapping colliders as measured by EPA.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EpaResult {
    /// Unit normal pointing from the second collider toward the first.
    pub normal: Vector3<f32>,
    /// Distance the first collider must move along `normal` to separate.
    pub depth: f32,
    /// Midpoint of the two contact points.
    pub contact_point: Point3<f32>,
    /// Deepest point of the first collider inside the second.
    pub contact_point_a: Point3<f32>,
    /// Deepest point of the second collider inside the first.
    pub contact_point_b: Point3<f32>,
}

/// A source of intersection tests and penetration measurements for pairs of
/// convex colliders.
///
/// Both methods may only be called with colliders whose derived transforms
/// are current.
pub trait ConvexIntersector {
    /// Returns a simplex enclosing the origin of the Minkowski difference if
    /// the colliders overlap.
    fn test_intersection(&self, a: &Collider, b: &Collider) -> Option<Simplex>;

    /// Expands the simplex returned by `test_intersection` into the
    /// penetration of the colliders. `None` means no usable contact.
    fn perform_epa(&self, a: &Collider, b: &Collider, simplex: &Simplex) -> Option<EpaResult>;
}

/// GJK intersection test with an EPA penetration solver.
#[derive(Copy, Clone, Debug)]
pub struct GjkEpa {
    pub max_iterations: usize,
    /// EPA stops once a new support point improves the distance to the
    /// closest face by less than this.
    pub tolerance: f32,
}

impl Default for GjkEpa {
    fn default() -> Self {
        GjkEpa {
            max_iterations: 64,
            tolerance: 0.0001,
        }
    }
}

const DEGENERATE_EPSILON: f32 = 0.0000001;

impl ConvexIntersector for GjkEpa {
    fn test_intersection(&self, a: &Collider, b: &Collider) -> Option<Simplex> {
        let mut simplex = Simplex::new();
        let mut dir = b.center() - a.center();
        if dir.magnitude2() < DEGENERATE_EPSILON {
            dir = Vector3::new(1.0, 0.0, 0.0);
        }

        let first = SupportPoint::new(a, b, dir);
        simplex.push(first);
        dir = -first.w;

        for _ in 0..self.max_iterations {
            if dir.magnitude2() < DEGENERATE_EPSILON {
                // The origin lies on the current simplex.
                return Some(simplex);
            }
            let p = SupportPoint::new(a, b, dir);
            if p.w.dot(dir) < 0.0 {
                return None;
            }
            simplex.push(p);
            if next_simplex(&mut simplex, &mut dir) {
                return Some(simplex);
            }
        }
        None
    }

    fn perform_epa(&self, a: &Collider, b: &Collider, simplex: &Simplex) -> Option<EpaResult> {
        let tetrahedron = promote_to_tetrahedron(a, b, simplex)?;
        let mut polytope: Vec<SupportPoint> = tetrahedron.to_vec();
        let mut faces: Vec<[usize; 3]> = Vec::with_capacity(32);
        let centroid = polytope.iter().fold(Vector3::zero(), |sum, p| sum + p.w) * 0.25;
        for &[i, j, k] in &[ [0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2] ] {
            let n = (polytope[j].w - polytope[i].w).cross(polytope[k].w - polytope[i].w);
            if n.dot(polytope[i].w - centroid) < 0.0 {
                faces.push([i, k, j]);
            } else {
                faces.push([i, j, k]);
            }
        }

        for _ in 0..self.max_iterations {
            let (face, n, dist) = closest_face(&polytope, &faces)?;
            let p = SupportPoint::new(a, b, n);
            let p_dist = p.w.dot(n);
            let closest = faces[face];
            if p_dist - dist < self.tolerance {
                return Some(epa_result(&polytope, closest, n, dist));
            }
            if !expand_polytope(&mut polytope, &mut faces, p) {
                return Some(epa_result(&polytope, closest, n, dist));
            }
        }

        // Out of iterations: report the best face found so far.
        let (face, n, dist) = closest_face(&polytope, &faces)?;
        Some(epa_result(&polytope, faces[face], n, dist))
    }
}

/// Updates the simplex after a point was added and picks the next search
/// direction. Returns true if the simplex encloses the origin.
fn next_simplex(simplex: &mut Simplex, dir: &mut Vector3<f32>) -> bool {
    match simplex.len() {
        2 => line_case(simplex, dir),
        3 => triangle_case(simplex, dir),
        4 => tetrahedron_case(simplex, dir),
        _ => false,
    }
}

/// Direction perpendicular to `ab` pointing toward `ao`.
#[inline]
fn toward(ab: Vector3<f32>, ao: Vector3<f32>) -> Vector3<f32> {
    ab.cross(ao).cross(ab)
}

fn line_case(simplex: &mut Simplex, dir: &mut Vector3<f32>) -> bool {
    let (b, a) = (simplex.points[0], simplex.points[1]);
    let ab = b.w - a.w;
    let ao = -a.w;
    if ab.dot(ao) > 0.0 {
        *dir = toward(ab, ao);
    } else {
        simplex.set(&[ a ]);
        *dir = ao;
    }
    false
}

fn triangle_case(simplex: &mut Simplex, dir: &mut Vector3<f32>) -> bool {
    let (c, b, a) = (simplex.points[0], simplex.points[1], simplex.points[2]);
    let ab = b.w - a.w;
    let ac = c.w - a.w;
    let ao = -a.w;
    let abc = ab.cross(ac);

    if abc.cross(ac).dot(ao) > 0.0 {
        if ac.dot(ao) > 0.0 {
            simplex.set(&[ c, a ]);
            *dir = toward(ac, ao);
        } else {
            simplex.set(&[ b, a ]);
            return line_case(simplex, dir);
        }
    } else if ab.cross(abc).dot(ao) > 0.0 {
        simplex.set(&[ b, a ]);
        return line_case(simplex, dir);
    } else if abc.dot(ao) > 0.0 {
        *dir = abc;
    } else {
        simplex.set(&[ b, c, a ]);
        *dir = -abc;
    }
    false
}

fn tetrahedron_case(simplex: &mut Simplex, dir: &mut Vector3<f32>) -> bool {
    let (d, c, b, a) = (simplex.points[0], simplex.points[1], simplex.points[2], simplex.points[3]);
    let ab = b.w - a.w;
    let ac = c.w - a.w;
    let ad = d.w - a.w;
    let ao = -a.w;

    let abc = ab.cross(ac);
    let acd = ac.cross(ad);
    let adb = ad.cross(ab);

    if abc.dot(ao) > 0.0 {
        simplex.set(&[ c, b, a ]);
        *dir = abc;
        return triangle_case(simplex, dir);
    }
    if acd.dot(ao) > 0.0 {
        simplex.set(&[ d, c, a ]);
        *dir = acd;
        return triangle_case(simplex, dir);
    }
    if adb.dot(ao) > 0.0 {
        simplex.set(&[ b, d, a ]);
        *dir = adb;
        return triangle_case(simplex, dir);
    }
    true
}

/// Grows a degenerate simplex (the shapes only touch, or GJK stopped early)
/// into a tetrahedron with non-zero volume by probing support points along the
/// world axes and the normal of the simplex.
fn promote_to_tetrahedron(a: &Collider, b: &Collider, simplex: &Simplex) -> Option<[SupportPoint; 4]> {
    const AXES: [[f32; 3]; 6] = [
        [ 1.0, 0.0, 0.0 ], [ -1.0, 0.0, 0.0 ],
        [ 0.0, 1.0, 0.0 ], [ 0.0, -1.0, 0.0 ],
        [ 0.0, 0.0, 1.0 ], [ 0.0, 0.0, -1.0 ],
    ];
    let mut points: SmallVec<[SupportPoint; 4]> = SmallVec::new();
    for &p in simplex.points() {
        if extends_rank(&points, p.w) {
            points.push(p);
        }
    }
    if points.is_empty() {
        points.push(SupportPoint::new(a, b, Vector3::new(1.0, 0.0, 0.0)));
    }

    while points.len() < 4 {
        let mut candidates: SmallVec<[Vector3<f32>; 8]> = SmallVec::new();
        match points.len() {
            2 => {
                let edge = points[1].w - points[0].w;
                for axis in AXES.iter() {
                    let perp = edge.cross(Vector3::from(*axis));
                    if perp.magnitude2() > DEGENERATE_EPSILON {
                        candidates.push(perp);
                    }
                }
            },
            3 => {
                let n = (points[1].w - points[0].w).cross(points[2].w - points[0].w);
                candidates.push(n);
                candidates.push(-n);
            },
            _ => candidates.extend(AXES.iter().map(|axis| Vector3::from(*axis))),
        }
        let next = candidates.into_iter()
            .map(|dir| SupportPoint::new(a, b, dir))
            .find(|p| extends_rank(&points, p.w))?;
        points.push(next);
    }
    Some([ points[0], points[1], points[2], points[3] ])
}

/// Determines if `w` is affinely independent of `points`.
fn extends_rank(points: &[SupportPoint], w: Vector3<f32>) -> bool {
    const RANK_EPSILON: f32 = 0.000001;
    match points.len() {
        0 => true,
        1 => (w - points[0].w).magnitude2() > RANK_EPSILON,
        2 => (points[1].w - points[0].w).cross(w - points[0].w).magnitude2() > RANK_EPSILON,
        3 => {
            let n = (points[1].w - points[0].w).cross(points[2].w - points[0].w);
            n.dot(w - points[0].w).abs() > RANK_EPSILON
        },
        _ => false,
    }
}

/// Finds the face of the polytope closest to the origin. Returns its index,
/// outward unit normal and distance from the origin.
fn closest_face(polytope: &[SupportPoint], faces: &[[usize; 3]]) -> Option<(usize, Vector3<f32>, f32)> {
    let mut best: Option<(usize, Vector3<f32>, f32)> = None;
    for (i, &[fa, fb, fc]) in faces.iter().enumerate() {
        let n = (polytope[fb].w - polytope[fa].w).cross(polytope[fc].w - polytope[fa].w);
        let len2 = n.magnitude2();
        if len2 < DEGENERATE_EPSILON * DEGENERATE_EPSILON {
            continue;
        }
        let n = n / len2.sqrt();
        let dist = n.dot(polytope[fa].w);
        match best {
            Some((_, _, best_dist)) if best_dist <= dist => (),
            _ => best = Some((i, n, dist)),
        }
    }
    best
}

/// Adds `p` to the polytope, removing every face it can see and patching the
/// hole with faces connecting its horizon to `p`. Returns false if the
/// visible faces left no horizon to patch.
fn expand_polytope(polytope: &mut Vec<SupportPoint>, faces: &mut Vec<[usize; 3]>, p: SupportPoint) -> bool {
    let new_index = polytope.len();
    polytope.push(p);
    let mut horizon: Vec<[usize; 2]> = Vec::new();
    let mut i = 0;
    while i < faces.len() {
        let [fa, fb, fc] = faces[i];
        let fnorm = (polytope[fb].w - polytope[fa].w).cross(polytope[fc].w - polytope[fa].w);
        if fnorm.dot(p.w - polytope[fa].w) > 0.0 {
            add_horizon_edge(&mut horizon, fa, fb);
            add_horizon_edge(&mut horizon, fb, fc);
            add_horizon_edge(&mut horizon, fc, fa);
            faces.swap_remove(i);
        } else {
            i += 1;
        }
    }
    if horizon.is_empty() {
        return false;
    }
    for [e0, e1] in horizon {
        faces.push([e0, e1, new_index]);
    }
    true
}

/// Adds an edge to the horizon, cancelling it with its reverse if that edge
/// is already present.
fn add_horizon_edge(horizon: &mut Vec<[usize; 2]>, a: usize, b: usize) {
    if let Some(pos) = horizon.iter().position(|e| e[0] == b && e[1] == a) {
        horizon.swap_remove(pos);
    } else {
        horizon.push([a, b]);
    }
}

/// Builds the contact from the face of the polytope closest to the origin.
/// The origin's projection onto the face is interpolated back onto each
/// collider with the same barycentric weights.
fn epa_result(polytope: &[SupportPoint], face: [usize; 3], n: Vector3<f32>, dist: f32) -> EpaResult {
    let (p0, p1, p2) = (polytope[face[0]], polytope[face[1]], polytope[face[2]]);
    let [u, v, w] = barycentric(n * dist, p0.w, p1.w, p2.w);
    let contact_point_a = Point3::from_vec(p0.a.to_vec() * u + p1.a.to_vec() * v + p2.a.to_vec() * w);
    let contact_point_b = Point3::from_vec(p0.b.to_vec() * u + p1.b.to_vec() * v + p2.b.to_vec() * w);
    EpaResult {
        normal: -n,
        depth: dist.max(0.0),
        contact_point: contact_point_a.midpoint(contact_point_b),
        contact_point_a,
        contact_point_b,
    }
}

fn barycentric(p: Vector3<f32>, a: Vector3<f32>, b: Vector3<f32>, c: Vector3<f32>) -> [f32; 3] {
    let (v0, v1, v2) = (b - a, c - a, p - a);
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < DEGENERATE_EPSILON {
        return [ 1.0, 0.0, 0.0 ];
    }
    let v = clamp((d11 * d20 - d01 * d21) / denom, 0.0, 1.0);
    let w = clamp((d00 * d21 - d01 * d20) / denom, 0.0, 1.0 - v);
    [ 1.0 - v - w, v, w ]
}

#[cfg(test)]
mod tests {
    mod gjk {
        use approx::assert_relative_eq;
        use cgmath::{Point3, Vector3};

        use crate::geom::*;
        use crate::gjk::*;
        use crate::shape::*;

        fn placed(shape: Shape, at: Vector3<f32>) -> Collider {
            let mut c = Collider::new(shape);
            c.calc_derived_data(&Isometry::from_disp(at));
            c
        }

        #[test]
        fn test_separated() {
            let a = placed(Shape::sphere(0.5), Vector3::new(0.0, 2.0, 0.0));
            let b = placed(Shape::cuboid(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 0.0));
            assert!(GjkEpa::default().test_intersection(&a, &b).is_none());
        }

        #[test]
        fn test_overlapping_spheres() {
            let a = placed(Shape::sphere(1.0), Vector3::new(0.0, 0.0, 1.5));
            let b = placed(Shape::sphere(1.0), Vector3::new(0.0, 0.0, 0.0));
            let gjk = GjkEpa::default();
            let simplex = gjk.test_intersection(&a, &b).unwrap();
            let result = gjk.perform_epa(&a, &b, &simplex).unwrap();
            assert_relative_eq!(result.depth, 0.5, epsilon = 0.02);
            assert_relative_eq!(result.normal, Vector3::new(0.0, 0.0, 1.0), epsilon = 0.05);
        }

        #[test]
        fn test_cylinder_on_box() {
            let a = placed(Shape::cylinder(0.5, 0.5), Vector3::new(0.0, 0.9, 0.0));
            let b = placed(Shape::cuboid(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 0.0));
            let gjk = GjkEpa::default();
            let simplex = gjk.test_intersection(&a, &b).unwrap();
            let result = gjk.perform_epa(&a, &b, &simplex).unwrap();
            assert_relative_eq!(result.depth, 0.1, epsilon = 0.001);
            assert_relative_eq!(result.normal, Vector3::new(0.0, 1.0, 0.0), epsilon = 0.001);
            // The contact points lie on the cylinder's bottom and the box's top.
            assert_relative_eq!(result.contact_point_a.y, 0.4, epsilon = 0.001);
            assert_relative_eq!(result.contact_point_b.y, 0.5, epsilon = 0.001);
            assert_relative_eq!(result.contact_point.y, 0.45, epsilon = 0.001);
        }

        #[test]
        fn test_degenerate_simplex_is_promoted() {
            let a = placed(Shape::cuboid(0.5, 0.5, 0.5), Vector3::new(0.0, 0.8, 0.0));
            let b = placed(Shape::cuboid(0.5, 0.5, 0.5), Vector3::new(0.0, 0.0, 0.0));
            let mut simplex = Simplex::new();
            simplex.push(SupportPoint::new(&a, &b, Vector3::new(1.0, 1.0, 1.0)));
            // A duplicate point adds nothing.
            simplex.push(SupportPoint::new(&a, &b, Vector3::new(1.0, 1.0, 1.0)));
            let t = promote_to_tetrahedron(&a, &b, &simplex).unwrap();
            let volume = (t[1].w - t[0].w).cross(t[2].w - t[0].w).dot(t[3].w - t[0].w);
            assert!(volume.abs() > 0.001);
            assert_eq!(t[0], simplex.points()[0]);
        }

        fn corner(x: f32, y: f32, z: f32) -> SupportPoint {
            SupportPoint {
                w: Vector3::new(x, y, z),
                a: Point3::new(x, y, z),
                b: Point3::new(0.0, 0.0, 0.0),
            }
        }

        fn unit_tetrahedron() -> Vec<SupportPoint> {
            vec![ corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), corner(0.0, 1.0, 0.0), corner(0.0, 0.0, 1.0) ]
        }

        #[test]
        fn test_expand_polytope() {
            let mut polytope = unit_tetrahedron();
            let mut faces = vec![ [0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3] ];
            assert!(expand_polytope(&mut polytope, &mut faces, corner(1.0, 1.0, 1.0)));
            assert_eq!(polytope.len(), 5);
            // One face replaced by three around the new point.
            assert_eq!(faces.len(), 6);
            assert_eq!(faces.iter().filter(|f| f.contains(&4)).count(), 3);
        }

        #[test]
        fn test_expand_polytope_without_horizon() {
            // Every face is wound inward, so a point inside sees all of them
            // and each edge cancels with its reverse.
            let mut polytope = unit_tetrahedron();
            let mut faces = vec![ [0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2] ];
            assert!(!expand_polytope(&mut polytope, &mut faces, corner(0.25, 0.25, 0.25)));
            assert!(faces.is_empty());
        }

        #[test]
        fn test_barycentric() {
            let w = barycentric(Vector3::new(0.25, 0.25, 0.0),
                                Vector3::new(0.0, 0.0, 0.0),
                                Vector3::new(1.0, 0.0, 0.0),
                                Vector3::new(0.0, 1.0, 0.0));
            assert_relative_eq!(w[0], 0.5);
            assert_relative_eq!(w[1], 0.25);
            assert_relative_eq!(w[2], 0.25);
            let p = Point3::new(0.0, 0.0, 0.0);
            assert_eq!(p.midpoint(Point3::new(2.0, 0.0, 0.0)), Point3::new(1.0, 0.0, 0.0));
        }
    }
}
