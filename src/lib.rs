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


//! Rigid-body collision detection and impulse-based contact resolution for
//! 3D video games.
//!
//! # Overview
//!
//! A `World` owns a set of `RigidBody`s, each made of one or more `Collider`s.
//! Every step the world:
//!
//! - refreshes the world transforms of all bodies and colliders,
//! - runs the `CollisionDetector` on every pair of bodies. Boxes, spheres and
//!   planes have dedicated routines (the separating axis test for box pairs),
//!   anything else goes through GJK and EPA,
//! - keeps the contacts of each pair in a persistent `Manifold`. Contacts
//!   store their points in body-local coordinates so that they can be
//!   refreshed from the new transforms and discarded once the bodies drift
//!   apart,
//! - resolves the contacts with sequential impulses, with Coulomb friction
//!   and Baumgarte position correction applied to separate pseudo velocities,
//! - integrates the bodies with semi-implicit Euler.
//!
//! Solver constants are supplied at compile time through the `PhysicsConfig`
//! trait, while `WorldSettings` holds the values that can be changed at run
//! time or loaded from TOML.
//!
//! Bodies are referred to by generation-checked `BodyHandle`s, so a handle to a
//! removed body never resolves to another body.

pub extern crate cgmath;
extern crate smallvec;

mod body;
pub use body::*;

mod collider;
pub use collider::*;

mod config;
pub use config::*;

mod contact;
pub use contact::*;

mod detector;
pub use detector::*;

mod geom;
pub use geom::*;

mod gjk;
pub use gjk::*;

mod manifold;
pub use manifold::*;

mod pool;
pub use pool::*;

mod shape;
pub use shape::*;

mod world;
pub use world::*;
