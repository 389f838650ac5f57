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


use cgmath::InnerSpace;
use log::debug;
use smallvec::SmallVec;

use crate::body::*;
use crate::config::*;
use crate::contact::*;
use crate::pool::*;

/// Maximum number of contacts kept for one pair of bodies.
pub const MAX_CONTACTS: usize = 16;

/// The persistent set of contacts between two bodies.
///
/// Contacts are created by the narrow phase, kept alive across steps by
/// `refresh_contacts` while the bodies stay within the persistence margin, and
/// removed as soon as they drift out of it. Removal swaps the last contact
/// into the freed slot, so the contacts are always stored without gaps but not
/// necessarily in the order they were added.
#[derive(Clone, Debug)]
pub struct Manifold {
    bodies: [BodyHandle; 2],
    contacts: SmallVec<[Contact; MAX_CONTACTS]>,
}

impl Manifold {
    pub fn new(a: BodyHandle, b: BodyHandle) -> Self {
        Manifold {
            bodies: [ a, b ],
            contacts: SmallVec::new(),
        }
    }

    /// The pair of bodies this manifold belongs to.
    pub fn bodies(&self) -> [BodyHandle; 2] {
        self.bodies
    }

    pub fn involves(&self, h: BodyHandle) -> bool {
        self.bodies[0] == h || self.bodies[1] == h
    }

    pub fn num_contacts(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contacts_mut(&mut self) -> &mut [Contact] {
        &mut self.contacts
    }

    pub fn contact(&self, i: usize) -> &Contact {
        debug_assert!(i < self.contacts.len(), "contact index {} out of range", i);
        &self.contacts[i]
    }

    /// Adds a contact and returns its index, or `None` if the manifold is
    /// full. A rejected contact is dropped.
    pub fn add_contact(&mut self, contact: Contact) -> Option<usize> {
        if self.contacts.len() >= MAX_CONTACTS {
            return None;
        }
        debug_assert!(self.involves(contact.bodies[0]) && self.involves(contact.bodies[1]),
                      "contact does not belong to this pair");
        self.contacts.push(contact);
        Some(self.contacts.len() - 1)
    }

    /// Removes the contact at index `i`, moving the last contact into its
    /// place.
    pub fn remove_contact(&mut self, i: usize) -> Contact {
        debug_assert!(i < self.contacts.len(), "contact index {} out of range", i);
        self.contacts.swap_remove(i)
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    /// Recomputes every contact from the current body transforms and discards
    /// those that separated by more than the persistence margin or slid across
    /// the contact plane by more than it. Returns the number removed.
    pub fn refresh_contacts<Config: PhysicsConfig>(&mut self, bodies: &Pool<RigidBody>) -> usize {
        let margin = Config::PERSISTENT_MARGIN;
        let mut removed = 0;
        // Walk backwards so that swap removal only moves contacts that were
        // already visited.
        for i in (0..self.contacts.len()).rev() {
            let keep = {
                let contact = &mut self.contacts[i];
                match (bodies.get(contact.bodies[0]), bodies.get(contact.bodies[1])) {
                    (Some(a), Some(b)) => {
                        contact.refresh(a, b);
                        -contact.penetration <= margin
                            && contact.tangential_drift().magnitude2() <= margin * margin
                    },
                    _ => false,
                }
            };
            if !keep {
                self.remove_contact(i);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("pair {:?}: {} stale contact(s) removed, {} left",
                   self.bodies, removed, self.contacts.len());
        }
        removed
    }

    /// Folds freshly detected contacts into the manifold. A new contact
    /// replaces a cached one generated by the same features, or one lying
    /// within the persistence margin whatever the order of its bodies.
    /// Anything else is appended while there is room.
    ///
    /// Only contacts cached before the call are candidates for replacement,
    /// and each of them is replaced at most once.
    pub fn merge<Config: PhysicsConfig, I>(&mut self, fresh: I)
    where
        I: IntoIterator<Item = Contact>
    {
        let margin = Config::PERSISTENT_MARGIN;
        let cached = self.contacts.len();
        let mut replaced: u32 = 0;
        for new_contact in fresh {
            let free = |i: usize| replaced & (1 << i) == 0;
            let matching = (0..cached)
                .filter(|&i| free(i))
                .find(|&i| self.contacts[i].same_features(&new_contact))
                .or_else(|| (0..cached)
                    .filter(|&i| free(i))
                    .find(|&i| self.contacts[i].is_near(&new_contact, margin)));
            match matching {
                Some(i) => {
                    self.contacts[i] = new_contact;
                    replaced |= 1 << i;
                },
                None => {
                    if self.add_contact(new_contact).is_none() {
                        debug!("pair {:?}: manifold full, contact dropped", self.bodies);
                    }
                },
            }
        }
    }

    /// Prepares every contact for resolution this step.
    pub fn calc_internals<Config: PhysicsConfig>(&mut self, bodies: &Pool<RigidBody>) {
        for contact in self.contacts.iter_mut() {
            if let (Some(a), Some(b)) = (bodies.get(contact.bodies[0]), bodies.get(contact.bodies[1])) {
                contact.calculate_internals::<Config>(a, b);
            }
        }
    }

    /// Applies one velocity impulse per contact, in array order.
    pub fn resolve_velocities(&mut self, bodies: &mut Pool<RigidBody>) {
        for contact in self.contacts.iter_mut() {
            if let Some((a, b)) = bodies.get2_mut(contact.bodies[0], contact.bodies[1]) {
                contact.resolve_velocity(a, b);
            }
        }
    }

    /// Applies one position correction impulse per contact, in array order.
    pub fn resolve_positions<Config: PhysicsConfig>(&mut self, bodies: &mut Pool<RigidBody>, dt: f32) {
        for contact in self.contacts.iter_mut() {
            if let Some((a, b)) = bodies.get2_mut(contact.bodies[0], contact.bodies[1]) {
                contact.resolve_position::<Config>(a, b, dt);
            }
        }
    }

    /// Deepest penetration among the contacts, or `None` if empty.
    pub fn max_penetration(&self) -> Option<f32> {
        self.contacts.iter().map(|c| c.penetration).fold(None, |max, p| match max {
            Some(m) if m >= p => Some(m),
            _ => Some(p),
        })
    }
}
