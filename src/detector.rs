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


//! Narrow phase contact generation.
//!
//! Boxes, spheres and planes have dedicated routines. Box pairs are handled
//! with the separating axis test, which also picks the contact type: a face
//! axis produces up to eight vertex-face contacts by clipping the incident
//! face against the reference face, a cross product axis produces a single
//! edge-edge contact. Every other pair of shapes goes through a
//! `ConvexIntersector`.

use std::f32;

use cgmath::{InnerSpace, Point3, Vector3};
use log::debug;

use crate::body::*;
use crate::collider::*;
use crate::contact::*;
use crate::geom::*;
use crate::gjk::*;
use crate::manifold::*;
use crate::pool::BodyHandle;
use crate::shape::*;

/// Cross products shorter than this (squared) come from nearly parallel edges
/// and are not tested as separating axes.
pub const SAT_AXIS_EPSILON: f32 = 0.001;

/// How far above the reference face a clipped vertex may lie and still
/// become a contact.
pub const FACE_CONTACT_TOLERANCE: f32 = 0.001;

/// A collider together with the body that owns it.
#[derive(Copy, Clone, Debug)]
pub struct ColliderRef<'a> {
    pub handle: BodyHandle,
    pub body: &'a RigidBody,
    pub collider: &'a Collider,
    /// Index of the collider in the body's collider list.
    pub index: u32,
}

impl<'a> ColliderRef<'a> {
    /// Packs a shape feature index together with the collider index.
    #[inline]
    fn feature(&self, f: u32) -> u32 {
        (self.index << 16) | f
    }
}

/// Builds a contact between `a` and `b` and adds it to the manifold. Returns
/// 1 if the contact was stored and 0 if the manifold was full.
fn emit(
    manifold: &mut Manifold,
    a: &ColliderRef,
    b: &ColliderRef,
    point_a: Point3<f32>,
    point_b: Point3<f32>,
    normal: Vector3<f32>,
    penetration: f32,
    kind: ContactKind,
    features: [u32; 2],
) -> usize {
    let contact = Contact::new(
        [ a.handle, b.handle ],
        a.body, b.body,
        point_a, point_b,
        normal,
        penetration,
        kind,
        [ a.feature(features[0]), b.feature(features[1]) ],
    );
    match manifold.add_contact(contact) {
        Some(_) => 1,
        None => {
            debug!("manifold {:?} full, {:?} contact dropped", manifold.bodies(), kind);
            0
        },
    }
}

/// Generates contacts between pairs of bodies.
#[derive(Clone, Debug, Default)]
pub struct CollisionDetector<I = GjkEpa> {
    intersector: I,
}

impl CollisionDetector<GjkEpa> {
    pub fn new() -> Self {
        CollisionDetector { intersector: GjkEpa::default() }
    }
}

impl<I: ConvexIntersector> CollisionDetector<I> {
    /// Creates a detector that uses `intersector` for shape pairs without a
    /// dedicated routine.
    pub fn with_intersector(intersector: I) -> Self {
        CollisionDetector { intersector }
    }

    pub fn intersector(&self) -> &I {
        &self.intersector
    }

    /// Tests every collider of `a` against every collider of `b` and adds the
    /// contacts found to `manifold`, whose body pair must be `a` and `b` in
    /// that order. Returns the number of contacts added.
    ///
    /// Both bodies must have up to date derived data.
    pub fn detect_collision(&self, a: &RigidBody, b: &RigidBody, manifold: &mut Manifold) -> usize {
        let [ha, hb] = manifold.bodies();
        let mut added = 0;
        for (i, ca) in a.colliders().iter().enumerate() {
            for (j, cb) in b.colliders().iter().enumerate() {
                let ra = ColliderRef { handle: ha, body: a, collider: ca, index: i as u32 };
                let rb = ColliderRef { handle: hb, body: b, collider: cb, index: j as u32 };
                added += self.collide(&ra, &rb, manifold);
            }
        }
        added
    }

    /// Dispatches a pair of colliders to the matching contact routine.
    pub fn collide(&self, a: &ColliderRef, b: &ColliderRef, manifold: &mut Manifold) -> usize {
        debug_assert!(a.collider.is_derived() && b.collider.is_derived(),
                      "collider used before its derived data was computed");
        match (a.collider.kind(), b.collider.kind()) {
            (ShapeKind::Plane, ShapeKind::Plane) => 0,
            (ShapeKind::Plane, _) => plane_contacts(b, a, manifold),
            (_, ShapeKind::Plane) => plane_contacts(a, b, manifold),
            (ShapeKind::Box, ShapeKind::Box) => box_box(a, b, manifold),
            (ShapeKind::Box, ShapeKind::Sphere) => box_sphere(a, b, manifold),
            (ShapeKind::Sphere, ShapeKind::Box) => box_sphere(b, a, manifold),
            (ShapeKind::Sphere, ShapeKind::Sphere) => sphere_sphere(a, b, manifold),
            _ => self.convex_convex(a, b, manifold),
        }
    }

    /// Generic convex pair. Produces at most one contact.
    fn convex_convex(&self, a: &ColliderRef, b: &ColliderRef, manifold: &mut Manifold) -> usize {
        let simplex = match self.intersector.test_intersection(a.collider, b.collider) {
            Some(simplex) => simplex,
            None => return 0,
        };
        let result = match self.intersector.perform_epa(a.collider, b.collider, &simplex) {
            Some(result) => result,
            None => return 0,
        };
        if (result.normal.magnitude2() - 1.0).abs() > 0.001 {
            debug!("discarding EPA result with a degenerate normal {:?}", result.normal);
            return 0;
        }
        emit(manifold, a, b,
             result.contact_point_a, result.contact_point_b,
             result.normal, result.depth,
             ContactKind::Debug, [ 0, 0 ])
    }
}

/// Separating axis test between two boxes.
///
/// The fifteen candidate axes are tested in a fixed order: the face normals
/// of `b`, the face normals of `a`, then the cross products `a_i x b_j` at
/// index `6 + 3i + j`. The axis of least overlap wins, and on an exact tie the
/// earlier axis is kept.
pub fn box_box(a: &ColliderRef, b: &ColliderRef, manifold: &mut Manifold) -> usize {
    let (ca, cb) = (a.collider, b.collider);
    let mut best_overlap = f32::INFINITY;
    let mut best_index = usize::max_value();
    let mut best_axis = Vector3::new(0.0, 0.0, 0.0);

    for index in 0..15 {
        let axis = match index {
            0..=2 => cb.axis(index),
            3..=5 => ca.axis(index - 3),
            _ => ca.axis((index - 6) / 3).cross(cb.axis((index - 6) % 3)),
        };
        if axis.magnitude2() < SAT_AXIS_EPSILON {
            continue;
        }
        let axis = axis.normalize();
        let (min_a, max_a) = ca.project_onto_axis(axis);
        let (min_b, max_b) = cb.project_onto_axis(axis);
        let overlap = (max_a - min_b).min(max_b - min_a);
        if overlap < 0.0 {
            return 0;
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            best_index = index;
            best_axis = axis;
        }
    }

    match best_index {
        0..=2 => box_face_contacts(a, b, best_index, best_overlap, manifold),
        3..=5 => box_face_contacts(b, a, best_index - 3, best_overlap, manifold),
        6..=14 => box_edge_contact(a, b, (best_index - 6) / 3, (best_index - 6) % 3,
                                   best_axis, best_overlap, manifold),
        _ => 0,
    }
}

/// Vertex-face contacts between the face of `reference` along `axis` and the
/// most anti-parallel face of `incident`. The incident body becomes body 0 of
/// every contact.
fn box_face_contacts(
    incident: &ColliderRef,
    reference: &ColliderRef,
    axis: usize,
    overlap: f32,
    manifold: &mut Manifold
) -> usize {
    let (inc, refc) = (incident.collider, reference.collider);

    // Reference face on the side facing the incident box.
    let mut normal = refc.axis(axis);
    let mut ref_face = 2 * axis;
    if normal.dot(inc.center() - refc.center()) < 0.0 {
        normal = -normal;
        ref_face += 1;
    }

    let inc_face = (0..6)
        .min_by(|&i, &j| {
            let (di, dj) = (inc.face_normal(i).dot(normal), inc.face_normal(j).dot(normal));
            di.partial_cmp(&dj).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);

    let mut polygon: ClippedPolygon = inc.face(inc_face).iter().cloned().collect();
    for side in [ (axis + 1) % 3, (axis + 2) % 3 ].iter() {
        for &face in [ 2 * side, 2 * side + 1 ].iter() {
            polygon = clip_polygon(&polygon, &refc.face_plane(face));
        }
    }

    let plane = refc.face_plane(ref_face);
    let mut added = 0;
    for (k, &p) in polygon.iter().enumerate() {
        let depth = -plane.distance(p);
        if depth < -FACE_CONTACT_TOLERANCE {
            continue;
        }
        added += emit(manifold, incident, reference,
                      p, p + normal * depth,
                      normal, overlap,
                      ContactKind::VertexFace,
                      [ (inc_face * 8 + k) as u32, ref_face as u32 ]);
    }
    added
}

/// Single contact between edge `i` of box `a` and edge `j` of box `b` whose
/// cross product is the separating axis.
fn box_edge_contact(
    a: &ColliderRef,
    b: &ColliderRef,
    i: usize,
    j: usize,
    axis: Vector3<f32>,
    overlap: f32,
    manifold: &mut Manifold
) -> usize {
    let (ca, cb) = (a.collider, b.collider);
    let normal = if axis.dot(ca.center() - cb.center()) < 0.0 { -axis } else { axis };
    let (ea, eb) = (ca.half_extents(), cb.half_extents());

    // Midpoints of the two edges facing each other.
    let mut mid_a = ca.center();
    let mut mid_b = cb.center();
    for k in 0..3 {
        if k != i {
            let dir = ca.axis(k);
            mid_a += dir * (-signum(dir.dot(normal)) * ea[k]);
        }
        if k != j {
            let dir = cb.axis(k);
            mid_b += dir * (signum(dir.dot(normal)) * eb[k]);
        }
    }

    let (da, db) = (ca.axis(i), cb.axis(j));
    let (_, _, s, t) = closest_points_on_lines(mid_a, da, mid_b, db);
    let point_a = mid_a + da * clamp(s, -ea[i], ea[i]);
    let point_b = mid_b + db * clamp(t, -eb[j], eb[j]);

    emit(manifold, a, b, point_a, point_b, normal, overlap,
         ContactKind::EdgeEdge, [ i as u32, j as u32 ])
}

#[inline]
fn signum(x: f32) -> f32 {
    if x < 0.0 { -1.0 } else { 1.0 }
}

/// Box against sphere. The box is body 0 and the normal points from the
/// sphere toward the box.
pub fn box_sphere(bx: &ColliderRef, sphere: &ColliderRef, manifold: &mut Manifold) -> usize {
    let (cbox, csph) = (bx.collider, sphere.collider);
    let center = csph.center();
    let radius = csph.radius();
    let e = cbox.half_extents();
    let local = cbox.world_to_shape().transform_point(center);
    let clamped = Point3::new(
        clamp(local.x, -e.x, e.x),
        clamp(local.y, -e.y, e.y),
        clamp(local.z, -e.z, e.z),
    );

    let (closest, normal, penetration) = if clamped != local {
        let closest = cbox.shape_to_world().transform_point(clamped);
        let d = closest - center;
        let dist2 = d.magnitude2();
        if dist2 > radius * radius {
            return 0;
        }
        let dist = dist2.sqrt();
        (closest, d / dist, radius - dist)
    } else {
        // The center is inside the box: push out through the nearest face.
        let mut axis = 0;
        let mut depth = f32::INFINITY;
        for k in 0..3 {
            let d = e[k] - local[k].abs();
            if d < depth {
                depth = d;
                axis = k;
            }
        }
        let s = signum(local[axis]);
        let mut face_point = local;
        face_point[axis] = s * e[axis];
        let outward = cbox.axis(axis) * s;
        (cbox.shape_to_world().transform_point(face_point), -outward, radius + depth)
    };

    emit(manifold, bx, sphere,
         closest, center + normal * radius,
         normal, penetration,
         ContactKind::VertexFace, [ 0, 0 ])
}

/// Sphere against sphere. Coincident centers use +y as the normal.
pub fn sphere_sphere(a: &ColliderRef, b: &ColliderRef, manifold: &mut Manifold) -> usize {
    let (ca, cb) = (a.collider.center(), b.collider.center());
    let (ra, rb) = (a.collider.radius(), b.collider.radius());
    let d = ca - cb;
    let dist2 = d.magnitude2();
    let reach = ra + rb;
    if dist2 > reach * reach {
        return 0;
    }
    let dist = dist2.sqrt();
    let normal = if dist > COLLISION_EPSILON {
        d / dist
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    };
    emit(manifold, a, b,
         ca + -normal * ra, cb + normal * rb,
         normal, reach - dist,
         ContactKind::VertexFace, [ 0, 0 ])
}

/// Contacts of any bounded shape against a plane. The shape is body 0 and
/// the normal is the plane normal.
pub fn plane_contacts(shape: &ColliderRef, plane: &ColliderRef, manifold: &mut Manifold) -> usize {
    let p = plane.collider.world_plane();
    let c = shape.collider;
    match *c.shape() {
        Shape::Sphere { radius } => plane_sphere(shape, plane, &p, c.center(), radius, 0, manifold),
        Shape::Capsule { radius, half_height } => {
            let iso = c.shape_to_world();
            let ends = [
                iso.transform_point(Point3::new(0.0, -half_height, 0.0)),
                iso.transform_point(Point3::new(0.0, half_height, 0.0)),
            ];
            ends.iter().enumerate()
                .map(|(k, &end)| plane_sphere(shape, plane, &p, end, radius, k as u32, manifold))
                .sum()
        },
        Shape::Box { .. } => {
            let mut added = 0;
            for k in 0..8 {
                let v = c.vertex(k);
                if p.distance(v) <= 0.0 {
                    added += emit(manifold, shape, plane,
                                  v, p.project(v),
                                  p.n, -p.distance(v),
                                  ContactKind::FaceFace, [ k as u32, 0 ]);
                }
            }
            added
        },
        Shape::Cylinder { .. } | Shape::Cone { .. } => {
            let deepest = c.support_point(-p.n);
            let dist = p.distance(deepest);
            if dist > 0.0 {
                return 0;
            }
            emit(manifold, shape, plane,
                 deepest, p.project(deepest),
                 p.n, -dist,
                 ContactKind::VertexFace, [ 0, 0 ])
        },
        Shape::Plane { .. } => 0,
    }
}

fn plane_sphere(
    shape: &ColliderRef,
    plane: &ColliderRef,
    p: &Plane,
    center: Point3<f32>,
    radius: f32,
    feature: u32,
    manifold: &mut Manifold
) -> usize {
    let dist = p.distance(center) - radius;
    if dist > 0.0 {
        return 0;
    }
    let deepest = center + -p.n * radius;
    emit(manifold, shape, plane,
         deepest, p.project(deepest),
         p.n, -dist,
         ContactKind::VertexFace, [ feature, 0 ])
}

#[cfg(test)]
mod tests {
    mod detector {
        use approx::assert_relative_eq;
        use cgmath::{Deg, Point3, Quaternion, Rotation3, Vector3};

        use crate::detector::*;
        use crate::pool::*;

        struct Scene {
            bodies: Pool<RigidBody>,
        }

        impl Scene {
            fn new() -> Self {
                Scene { bodies: Pool::new() }
            }

            fn add(&mut self, shape: Shape, at: Point3<f32>, rot: Quaternion<f32>) -> BodyHandle {
                let mut body = RigidBody::dynamic(at, 1.0, Collider::new(shape));
                body.set_orientation(rot);
                body.calculate_derived_data();
                self.bodies.push(body)
            }

            fn add_fixed(&mut self, shape: Shape, at: Point3<f32>) -> BodyHandle {
                self.bodies.push(RigidBody::fixed(at, Collider::new(shape)))
            }

            fn detect(&self, a: BodyHandle, b: BodyHandle) -> Manifold {
                let mut manifold = Manifold::new(a, b);
                CollisionDetector::new().detect_collision(&self.bodies[a], &self.bodies[b], &mut manifold);
                manifold
            }
        }

        fn contact_centroid(manifold: &Manifold) -> Option<Point3<f32>> {
            use cgmath::EuclideanSpace;
            if manifold.is_empty() {
                return None;
            }
            let sum = manifold.contacts().iter()
                .fold(Vector3::new(0.0, 0.0, 0.0), |sum, c| sum + c.point().to_vec());
            Some(Point3::from_vec(sum / manifold.num_contacts() as f32))
        }

        fn upright() -> Quaternion<f32> {
            Quaternion::from_angle_y(Deg(0.0))
        }

        #[test]
        fn test_sphere_sphere() {
            let mut scene = Scene::new();
            let a = scene.add(Shape::sphere(1.0), Point3::new(0.0, 1.5, 0.0), upright());
            let b = scene.add(Shape::sphere(0.75), Point3::new(0.0, 0.0, 0.0), upright());
            let manifold = scene.detect(a, b);
            assert_eq!(manifold.num_contacts(), 1);
            let c = manifold.contact(0);
            assert_eq!(c.bodies, [ a, b ]);
            assert_relative_eq!(c.penetration, 0.25, epsilon = 0.00001);
            assert_relative_eq!(c.normal, Vector3::new(0.0, 1.0, 0.0), epsilon = 0.00001);
            assert_relative_eq!(c.world_points[0], Point3::new(0.0, 0.5, 0.0), epsilon = 0.00001);
            assert_relative_eq!(c.world_points[1], Point3::new(0.0, 0.75, 0.0), epsilon = 0.00001);
        }

        #[test]
        fn test_sphere_sphere_coincident() {
            let mut scene = Scene::new();
            let a = scene.add(Shape::sphere(1.0), Point3::new(2.0, 0.0, 0.0), upright());
            let b = scene.add(Shape::sphere(1.0), Point3::new(2.0, 0.0, 0.0), upright());
            let manifold = scene.detect(a, b);
            assert_eq!(manifold.num_contacts(), 1);
            assert_eq!(manifold.contact(0).normal, Vector3::new(0.0, 1.0, 0.0));
            assert_relative_eq!(manifold.contact(0).penetration, 2.0);
        }

        #[test]
        fn test_sphere_sphere_apart() {
            let mut scene = Scene::new();
            let a = scene.add(Shape::sphere(1.0), Point3::new(0.0, 2.01, 0.0), upright());
            let b = scene.add(Shape::sphere(1.0), Point3::new(0.0, 0.0, 0.0), upright());
            assert!(scene.detect(a, b).is_empty());
        }

        #[test]
        fn test_box_box_flush_stack() {
            let mut scene = Scene::new();
            let a = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 1.0, 0.0), upright());
            let b = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.0, 0.0), upright());
            let manifold = scene.detect(a, b);
            assert_eq!(manifold.num_contacts(), 4);
            for c in manifold.contacts() {
                assert_eq!(c.kind, ContactKind::VertexFace);
                assert_eq!(c.bodies, [ a, b ]);
                assert_relative_eq!(c.normal, Vector3::new(0.0, 1.0, 0.0), epsilon = 0.00001);
                assert_relative_eq!(c.penetration, 0.0, epsilon = 0.00001);
                assert_relative_eq!(c.world_points[0].y, 0.5, epsilon = 0.00001);
            }
            assert_relative_eq!(contact_centroid(&manifold).unwrap(), Point3::new(0.0, 0.5, 0.0),
                                epsilon = 0.00001);
        }

        #[test]
        fn test_box_box_reference_on_second_body() {
            // Both boxes' vertical face axes overlap by the same amount, so the
            // face of the second body is used as the reference and the first
            // body is reported as body 0.
            let mut scene = Scene::new();
            let bottom = scene.add(Shape::cuboid(1.0, 0.5, 1.0), Point3::new(0.0, 0.0, 0.0), upright());
            let top = scene.add(Shape::cuboid(0.25, 0.25, 0.25), Point3::new(0.1, 0.7, 0.0), upright());
            let manifold = scene.detect(bottom, top);
            // The large top face of the bottom box is clipped to the footprint
            // of the small box.
            assert_eq!(manifold.num_contacts(), 4);
            for c in manifold.contacts() {
                assert_eq!(c.bodies, [ bottom, top ]);
                assert_relative_eq!(c.normal, Vector3::new(0.0, -1.0, 0.0), epsilon = 0.00001);
                assert_relative_eq!(c.penetration, 0.05, epsilon = 0.00001);
                assert!(c.world_points[0].x >= -0.15 - 0.00001 && c.world_points[0].x <= 0.35 + 0.00001);
            }
        }

        #[test]
        fn test_box_box_disjoint() {
            let mut scene = Scene::new();
            let a = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(1.1, 0.0, 0.0), upright());
            let b = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.0, 0.0), upright());
            assert!(scene.detect(a, b).is_empty());

            // Separated only along a diagonal.
            let c = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(1.2, 1.2, 0.0),
                              Quaternion::from_angle_z(Deg(45.0)));
            assert!(scene.detect(c, b).is_empty());
        }

        #[test]
        fn test_box_box_edge_edge() {
            let mut scene = Scene::new();
            let a = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 1.4, 0.0),
                              Quaternion::from_angle_x(Deg(45.0)));
            let b = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.0, 0.0),
                              Quaternion::from_angle_z(Deg(45.0)));
            let manifold = scene.detect(a, b);
            assert_eq!(manifold.num_contacts(), 1);
            let c = manifold.contact(0);
            let reach = 0.5 * 2.0f32.sqrt();
            assert_eq!(c.kind, ContactKind::EdgeEdge);
            assert_eq!(c.bodies, [ a, b ]);
            assert_relative_eq!(c.normal, Vector3::new(0.0, 1.0, 0.0), epsilon = 0.0001);
            assert_relative_eq!(c.penetration, 2.0 * reach - 1.4, epsilon = 0.0001);
            assert_relative_eq!(c.world_points[0], Point3::new(0.0, 1.4 - reach, 0.0), epsilon = 0.0001);
            assert_relative_eq!(c.world_points[1], Point3::new(0.0, reach, 0.0), epsilon = 0.0001);
        }

        #[test]
        fn test_box_sphere() {
            let mut scene = Scene::new();
            let sphere = scene.add(Shape::sphere(0.5), Point3::new(0.2, 0.9, 0.0), upright());
            let bx = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.0, 0.0), upright());
            let manifold = scene.detect(sphere, bx);
            assert_eq!(manifold.num_contacts(), 1);
            let c = manifold.contact(0);
            assert_eq!(c.bodies, [ bx, sphere ]);
            assert_relative_eq!(c.normal, Vector3::new(0.0, -1.0, 0.0), epsilon = 0.00001);
            assert_relative_eq!(c.penetration, 0.1, epsilon = 0.00001);
            assert_relative_eq!(c.world_points[0], Point3::new(0.2, 0.5, 0.0), epsilon = 0.00001);
            assert_relative_eq!(c.world_points[1], Point3::new(0.2, 0.4, 0.0), epsilon = 0.00001);
        }

        #[test]
        fn test_box_sphere_center_inside() {
            let mut scene = Scene::new();
            let bx = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.0, 0.0), upright());
            let sphere = scene.add(Shape::sphere(0.5), Point3::new(0.0, 0.3, 0.0), upright());
            let manifold = scene.detect(bx, sphere);
            assert_eq!(manifold.num_contacts(), 1);
            let c = manifold.contact(0);
            assert_relative_eq!(c.normal, Vector3::new(0.0, -1.0, 0.0), epsilon = 0.00001);
            assert_relative_eq!(c.penetration, 0.7, epsilon = 0.00001);
        }

        #[test]
        fn test_box_on_plane() {
            let mut scene = Scene::new();
            let ground = scene.add_fixed(Shape::plane(Vector3::new(0.0, 1.0, 0.0), 0.0),
                                         Point3::new(0.0, 0.0, 0.0));
            let bx = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.45, 0.0), upright());
            let manifold = scene.detect(ground, bx);
            assert_eq!(manifold.num_contacts(), 4);
            for c in manifold.contacts() {
                assert_eq!(c.kind, ContactKind::FaceFace);
                assert_eq!(c.bodies, [ bx, ground ]);
                assert_relative_eq!(c.penetration, 0.05, epsilon = 0.00001);
                assert_relative_eq!(c.world_points[1].y, 0.0, epsilon = 0.00001);
            }
        }

        #[test]
        fn test_capsule_on_plane() {
            let mut scene = Scene::new();
            let capsule = scene.add(Shape::capsule(0.25, 0.5), Point3::new(0.0, 0.7, 0.0), upright());
            let ground = scene.add_fixed(Shape::plane(Vector3::new(0.0, 1.0, 0.0), 0.0),
                                         Point3::new(0.0, 0.0, 0.0));
            let manifold = scene.detect(capsule, ground);
            assert_eq!(manifold.num_contacts(), 1);
            assert_relative_eq!(manifold.contact(0).penetration, 0.05, epsilon = 0.00001);

            // Lying down, both ends touch.
            let lying = scene.add(Shape::capsule(0.25, 0.5), Point3::new(0.0, 0.2, 0.0),
                                  Quaternion::from_angle_z(Deg(90.0)));
            assert_eq!(scene.detect(lying, ground).num_contacts(), 2);
        }

        #[test]
        fn test_planes_never_collide() {
            let mut scene = Scene::new();
            let a = scene.add_fixed(Shape::plane(Vector3::new(0.0, 1.0, 0.0), 0.0), Point3::new(0.0, 0.0, 0.0));
            let b = scene.add_fixed(Shape::plane(Vector3::new(1.0, 0.0, 0.0), 0.0), Point3::new(0.0, 0.0, 0.0));
            assert!(scene.detect(a, b).is_empty());
        }

        #[test]
        fn test_cylinder_on_box_uses_epa() {
            let mut scene = Scene::new();
            let cyl = scene.add(Shape::cylinder(0.5, 0.5), Point3::new(0.0, 0.9, 0.0), upright());
            let bx = scene.add(Shape::cuboid(0.5, 0.5, 0.5), Point3::new(0.0, 0.0, 0.0), upright());
            let manifold = scene.detect(cyl, bx);
            assert_eq!(manifold.num_contacts(), 1);
            let c = manifold.contact(0);
            assert_eq!(c.kind, ContactKind::Debug);
            assert_relative_eq!(c.penetration, 0.1, epsilon = 0.001);
            assert_relative_eq!(c.normal, Vector3::new(0.0, 1.0, 0.0), epsilon = 0.001);
        }
    }
}
