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


use std::collections::HashMap;
use std::marker::PhantomData;

use log::{debug, trace, warn};

use crate::body::*;
use crate::config::*;
use crate::detector::*;
use crate::gjk::*;
use crate::manifold::*;
use crate::pool::*;

/// A set of rigid bodies and the persistent contacts between them.
///
/// Each call to `simulate` runs one complete step:
///
/// 1. gravity is added to the force accumulator of every dynamic body and
///    the derived transforms of all bodies are rebuilt,
/// 2. every pair of bodies that is not static on both sides is run through
///    the narrow phase, in body slot order,
/// 3. the cached manifold of the pair is refreshed and the fresh contacts are
///    merged into it; empty manifolds are dropped,
/// 4. the velocity and position solvers iterate over the manifolds in the
///    order the pairs first came into contact,
/// 5. bodies are integrated and their accumulators cleared.
pub struct World<Config = DefaultPhysConfig, I = GjkEpa>
where
    Config: PhysicsConfig,
    I: ConvexIntersector
{
    settings: WorldSettings,
    bodies: Pool<RigidBody>,
    detector: CollisionDetector<I>,
    manifolds: Vec<Manifold>,
    manifold_index: HashMap<(BodyHandle, BodyHandle), usize>,
    accumulator: f32,
    config: PhantomData<Config>,
}

impl World<DefaultPhysConfig, GjkEpa> {
    /// An empty world with default settings.
    pub fn new() -> Self {
        World::with_detector(WorldSettings::default(), CollisionDetector::new())
    }
}

impl Default for World<DefaultPhysConfig, GjkEpa> {
    fn default() -> Self {
        World::new()
    }
}

impl<Config, I> World<Config, I>
where
    Config: PhysicsConfig,
    I: ConvexIntersector
{
    /// An empty world. The settings are validated.
    pub fn with_settings(settings: WorldSettings, detector: CollisionDetector<I>) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(World::with_detector(settings, detector))
    }

    fn with_detector(settings: WorldSettings, detector: CollisionDetector<I>) -> Self {
        World {
            settings,
            bodies: Pool::new(),
            detector,
            manifolds: Vec::new(),
            manifold_index: HashMap::new(),
            accumulator: 0.0,
            config: PhantomData,
        }
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Replaces the settings if they are valid.
    pub fn set_settings(&mut self, settings: WorldSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Adds a body to the world and returns its handle. The colliders of the
    /// body are linked back to it.
    pub fn insert_body(&mut self, body: RigidBody) -> BodyHandle {
        let handle = self.bodies.push(body);
        let body = &mut self.bodies[handle];
        for collider in body.colliders_mut() {
            collider.set_body(Some(handle));
        }
        body.calculate_derived_data();
        handle
    }

    /// Removes a body and every manifold it takes part in. Returns `None` if
    /// the handle is stale.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let mut body = self.bodies.remove(handle)?;
        for collider in body.colliders_mut() {
            collider.set_body(None);
        }
        let before = self.manifolds.len();
        self.manifolds.retain(|m| !m.involves(handle));
        if self.manifolds.len() != before {
            debug!("removed {} manifold(s) of body {:?}", before - self.manifolds.len(), handle);
            self.rebuild_manifold_index();
        }
        Some(body)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> &Pool<RigidBody> {
        &self.bodies
    }

    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Cached manifolds in the order their pairs first came into contact.
    pub fn manifolds(&self) -> &[Manifold] {
        &self.manifolds
    }

    /// The manifold between two bodies, in either order.
    pub fn manifold(&self, a: BodyHandle, b: BodyHandle) -> Option<&Manifold> {
        self.manifold_index.get(&(a, b))
            .or_else(|| self.manifold_index.get(&(b, a)))
            .map(|&i| &self.manifolds[i])
    }

    pub fn detector(&self) -> &CollisionDetector<I> {
        &self.detector
    }

    /// Runs as many fixed steps as fit in the time accumulated so far plus
    /// `elapsed`, up to `max_substeps`. Returns the number of steps taken.
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        let timestep = self.settings.fixed_timestep;
        self.accumulator += elapsed.max(0.0);
        let mut steps = (self.accumulator / timestep) as u32;
        if steps > self.settings.max_substeps {
            warn!("{} steps needed to catch up, only {} taken", steps, self.settings.max_substeps);
            steps = self.settings.max_substeps;
            self.accumulator = steps as f32 * timestep;
        }
        for _ in 0..steps {
            self.simulate(timestep);
            self.accumulator -= timestep;
        }
        self.accumulator = self.accumulator.max(0.0);
        steps
    }

    /// Fraction of a fixed step left in the accumulator, for interpolating
    /// rendered transforms.
    pub fn interpolation_alpha(&self) -> f32 {
        self.accumulator / self.settings.fixed_timestep
    }

    /// Advances the simulation by `dt` seconds.
    pub fn simulate(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }

        let gravity = self.settings.gravity;
        for (_, body) in self.bodies.iter_mut() {
            if !body.is_static() {
                let weight = gravity * body.mass();
                body.apply_force_at_center(weight);
            }
            body.calculate_derived_data();
        }

        self.update_manifolds();

        for manifold in self.manifolds.iter_mut() {
            manifold.calc_internals::<Config>(&self.bodies);
        }
        for _ in 0..self.settings.velocity_iterations {
            for manifold in self.manifolds.iter_mut() {
                manifold.resolve_velocities(&mut self.bodies);
            }
        }
        for _ in 0..self.settings.position_iterations {
            for manifold in self.manifolds.iter_mut() {
                manifold.resolve_positions::<Config>(&mut self.bodies, dt);
            }
        }

        for (_, body) in self.bodies.iter_mut() {
            body.integrate_linear(dt);
            body.integrate_angular(dt);
            body.clear_accumulators();
            body.calculate_derived_data();
        }

        trace!("step dt={} bodies={} manifolds={} contacts={}",
               dt, self.bodies.len(), self.manifolds.len(),
               self.manifolds.iter().map(Manifold::num_contacts).sum::<usize>());
    }

    /// Runs the narrow phase over every pair and folds the results into the
    /// manifold cache.
    fn update_manifolds(&mut self) {
        let handles: Vec<BodyHandle> = self.bodies.handles().collect();
        for (i, &ha) in handles.iter().enumerate() {
            for &hb in &handles[i + 1..] {
                let (a, b) = (&self.bodies[ha], &self.bodies[hb]);
                if a.is_static() && b.is_static() {
                    continue;
                }
                let mut fresh = Manifold::new(ha, hb);
                self.detector.detect_collision(a, b, &mut fresh);
                let cached = self.manifold_index.get(&(ha, hb)).cloned();
                match cached {
                    Some(idx) => {
                        let manifold = &mut self.manifolds[idx];
                        manifold.refresh_contacts::<Config>(&self.bodies);
                        manifold.merge::<Config, _>(fresh.contacts().iter().cloned());
                    },
                    None if !fresh.is_empty() => {
                        debug!("new manifold {:?} with {} contact(s)", [ha, hb], fresh.num_contacts());
                        self.manifold_index.insert((ha, hb), self.manifolds.len());
                        self.manifolds.push(fresh);
                    },
                    None => (),
                }
            }
        }

        let before = self.manifolds.len();
        self.manifolds.retain(|m| !m.is_empty());
        if self.manifolds.len() != before {
            debug!("{} manifold(s) separated", before - self.manifolds.len());
            self.rebuild_manifold_index();
        }
    }

    fn rebuild_manifold_index(&mut self) {
        self.manifold_index.clear();
        for (i, m) in self.manifolds.iter().enumerate() {
            let [a, b] = m.bodies();
            self.manifold_index.insert((a, b), i);
        }
    }
}

#[cfg(test)]
mod tests {
    mod world {
        use approx::assert_relative_eq;
        use cgmath::{Point3, Vector3};

        use crate::collider::*;
        use crate::shape::*;
        use crate::world::*;

        fn ground_box() -> RigidBody {
            RigidBody::fixed(Point3::new(0.0, 0.0, 0.0), Collider::new(Shape::cuboid(5.0, 0.5, 5.0)))
        }

        fn unit_box(y: f32) -> RigidBody {
            RigidBody::dynamic(Point3::new(0.0, y, 0.0), 1.0, Collider::new(Shape::cuboid(0.5, 0.5, 0.5)))
        }

        #[test]
        fn test_box_rests_on_ground() {
            let mut world = World::new();
            let ground = world.insert_body(ground_box());
            let bx = world.insert_body(unit_box(1.0));
            let dt = 1.0 / 60.0;
            for _ in 0..60 {
                world.simulate(dt);
            }
            let y_after_one_second = world.body(bx).unwrap().position.y;
            for _ in 0..60 {
                world.simulate(dt);
            }
            let body = world.body(bx).unwrap();
            assert!((body.position.y - 1.0).abs() < 0.05, "box at {:?}", body.position);
            assert!((body.position.y - y_after_one_second).abs() < 0.005);
            assert!(body.position.x.abs() < 0.05 && body.position.z.abs() < 0.05);
            // Only the gravity of the last step remains.
            assert!(body.velocity.y.abs() <= 9.81 * dt + 0.01);
            // One contact per corner, whichever box the narrow phase picks as
            // the reference.
            assert_eq!(world.manifold(ground, bx).unwrap().num_contacts(), 4);
            assert_eq!(world.body(ground).unwrap().position, Point3::new(0.0, 0.0, 0.0));
        }

        #[test]
        fn test_lifted_box_falls_freely() {
            let mut world = World::new();
            let ground = world.insert_body(ground_box());
            let bx = world.insert_body(unit_box(1.0));
            let dt = 1.0 / 60.0;
            for _ in 0..60 {
                world.simulate(dt);
            }
            let start = {
                let body = world.body_mut(bx).unwrap();
                body.position.y += 0.15;
                body.velocity = Vector3::new(0.0, 0.0, 0.0);
                body.angular_velocity = Vector3::new(0.0, 0.0, 0.0);
                body.position.y
            };

            world.simulate(dt);
            // The cached contacts survive the gap but must not hold the box up.
            assert!(world.manifold(ground, bx).is_some());
            for _ in 1..5 {
                world.simulate(dt);
            }
            let body = world.body(bx).unwrap();
            assert_relative_eq!(body.velocity.y, -5.0 * 9.81 * dt, epsilon = 0.0001);
            assert_relative_eq!(body.position.y, start - 15.0 * 9.81 * dt * dt, epsilon = 0.0001);
        }

        fn ball(x: f32) -> RigidBody {
            let mut body = RigidBody::dynamic(Point3::new(x, 0.0, 0.0), 1.0, Collider::new(Shape::sphere(0.5)));
            body.static_friction = 0.0;
            body.dynamic_friction = 0.0;
            body
        }

        #[test]
        fn test_manifolds_resolve_in_contact_order() {
            let settings = WorldSettings {
                gravity: Vector3::new(0.0, 0.0, 0.0),
                velocity_iterations: 1,
                ..WorldSettings::default()
            };
            let mut world: World = World::with_settings(settings, CollisionDetector::new()).unwrap();
            let left = world.insert_body(ball(-5.0));
            let middle = world.insert_body(ball(0.0));
            let right = world.insert_body(ball(0.95));
            let dt = 1.0 / 60.0;
            world.simulate(dt);
            assert_eq!(world.manifolds().len(), 1);

            // Bring the left ball in while the middle and right balls still
            // overlap. The left pair comes first in slot order but touched
            // last, so it is resolved second.
            let x = world.body(middle).unwrap().position.x;
            {
                let body = world.body_mut(left).unwrap();
                body.position.x = x - 0.95;
                body.velocity = Vector3::new(1.0, 0.0, 0.0);
            }
            world.body_mut(right).unwrap().velocity = Vector3::new(-1.0, 0.0, 0.0);
            world.simulate(dt);

            assert_eq!(world.manifolds().len(), 2);
            assert_eq!(world.manifolds()[0].bodies(), [ middle, right ]);
            assert_eq!(world.manifolds()[1].bodies(), [ left, middle ]);
            // Middle and right meet at -0.5, then left and middle at 0.25.
            assert_relative_eq!(world.body(left).unwrap().velocity.x, 0.25, epsilon = 0.00001);
            assert_relative_eq!(world.body(middle).unwrap().velocity.x, 0.25, epsilon = 0.00001);
            assert_relative_eq!(world.body(right).unwrap().velocity.x, -0.5, epsilon = 0.00001);
        }

        #[test]
        fn test_sphere_falls_onto_plane() {
            let mut world = World::new();
            world.insert_body(RigidBody::fixed(Point3::new(0.0, 0.0, 0.0),
                                               Collider::new(Shape::plane(Vector3::new(0.0, 1.0, 0.0), 0.0))));
            let ball = world.insert_body(RigidBody::dynamic(Point3::new(0.0, 3.0, 0.0), 1.0,
                                                            Collider::new(Shape::sphere(0.5))));
            for _ in 0..240 {
                world.simulate(1.0 / 60.0);
            }
            let body = world.body(ball).unwrap();
            assert!((body.position.y - 0.5).abs() < 0.05, "ball at {:?}", body.position);
            assert_eq!(world.manifolds().len(), 1);
        }

        #[test]
        fn test_free_fall() {
            let mut world = World::new();
            let bx = world.insert_body(unit_box(10.0));
            world.simulate(0.5);
            let body = world.body(bx).unwrap();
            // Semi-implicit Euler: the velocity is updated before the position.
            assert!((body.velocity.y + 9.81 * 0.5).abs() < 0.0001);
            assert!((body.position.y - (10.0 - 9.81 * 0.25)).abs() < 0.0001);
            assert_eq!(body.force(), Vector3::new(0.0, 0.0, 0.0));
        }

        #[test]
        fn test_remove_body_purges_manifolds() {
            let mut world = World::new();
            let ground = world.insert_body(ground_box());
            let bx = world.insert_body(unit_box(0.95));
            world.simulate(1.0 / 60.0);
            assert_eq!(world.manifolds().len(), 1);

            let removed = world.remove_body(bx).unwrap();
            assert!(removed.colliders()[0].body().is_none());
            assert!(world.manifolds().is_empty());
            assert!(world.manifold(ground, bx).is_none());

            // The stale handle no longer resolves, even once its slot is reused.
            let other = world.insert_body(unit_box(5.0));
            assert_eq!(other.index(), bx.index());
            assert!(world.body(bx).is_none());
            assert!(world.remove_body(bx).is_none());
            assert_eq!(world.body(other).unwrap().colliders()[0].body(), Some(other));
        }

        #[test]
        fn test_static_pairs_are_skipped() {
            let mut world = World::new();
            world.insert_body(ground_box());
            world.insert_body(RigidBody::fixed(Point3::new(0.0, 0.5, 0.0),
                                               Collider::new(Shape::cuboid(0.5, 0.5, 0.5))));
            world.simulate(1.0 / 60.0);
            assert!(world.manifolds().is_empty());
        }

        #[test]
        fn test_advance() {
            let settings = WorldSettings {
                gravity: Vector3::new(0.0, 0.0, 0.0),
                fixed_timestep: 0.01,
                max_substeps: 4,
                ..WorldSettings::default()
            };
            let mut world: World = World::with_settings(settings, CollisionDetector::new()).unwrap();
            assert_eq!(world.advance(0.025), 2);
            assert!((world.interpolation_alpha() - 0.5).abs() < 0.01);
            assert_eq!(world.advance(1.0), 4);
            assert!(world.interpolation_alpha() < 0.01);
            assert_eq!(world.advance(0.0), 0);
        }

        #[test]
        fn test_invalid_settings() {
            let settings = WorldSettings {
                fixed_timestep: 0.0,
                ..WorldSettings::default()
            };
            assert!(World::<DefaultPhysConfig, GjkEpa>::with_settings(settings, CollisionDetector::new()).is_err());
            let mut world = World::new();
            assert!(world.set_settings(WorldSettings { max_substeps: 0, ..WorldSettings::default() }).is_err());
            assert_eq!(*world.settings(), WorldSettings::default());
        }
    }
}
