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


use std::mem;
use std::ops::{Index, IndexMut};
use std::vec::Vec;

use serde::{Deserialize, Serialize};

/// A generation-checked index into a Pool.
///
/// A handle stays valid until the entry it points to is removed. After that
/// the slot may be reused, but the generation no longer matches and every
/// lookup through the old handle fails.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// The slot index of the handle.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Handle referring to a RigidBody owned by a World.
pub type BodyHandle = Handle;

/// Internal storage type used by Pool.
#[derive(Clone)]
pub enum PoolEntry<T> {
    FreeListEnd,
    FreeListPtr {
        next_free: usize,
    },
    Occupied(T)
}

#[derive(Clone)]
struct Slot<T> {
    generation: u32,
    entry: PoolEntry<T>,
}

/// Growable array type that allows items to be removed and inserted without
/// changing the indices of other entries.
#[derive(Clone)]
pub struct Pool<T> {
    len: usize,
    free_list: Option<usize>,
    slots: Vec<Slot<T>>,
}

impl<T> Pool<T> {
    /// Create an empty Pool.
    pub fn new() -> Self {
        Pool {
            len: 0,
            free_list: None,
            slots: Vec::new(),
        }
    }

    /// Determines if the Pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Push a new item to the Pool. Attempts to use spots left empty from
    /// removed items before performing a heap allocation.
    pub fn push(&mut self, item: T) -> Handle {
        self.len += 1;
        if let Some(free_item) = self.free_list {
            let slot = &mut self.slots[free_item];
            self.free_list = match slot.entry {
                PoolEntry::FreeListEnd => None,
                PoolEntry::FreeListPtr{ next_free } => Some(next_free),
                PoolEntry::Occupied(_) => unreachable!(),
            };
            slot.entry = PoolEntry::Occupied(item);
            Handle {
                index: free_item as u32,
                generation: slot.generation,
            }
        } else {
            let i = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                entry: PoolEntry::Occupied(item),
            });
            Handle {
                index: i as u32,
                generation: 0,
            }
        }
    }

    /// Removes the item the handle refers to and adds its slot to the free
    /// list, allowing the spot to be reclaimed later. Returns None if the
    /// handle is stale.
    pub fn remove(&mut self, h: Handle) -> Option<T> {
        if !self.contains(h) {
            return None;
        }
        let i = h.index();
        let new_entry = if let Some(free_item) = self.free_list {
            PoolEntry::FreeListPtr{ next_free: free_item }
        } else {
            PoolEntry::FreeListEnd
        };
        let slot = &mut self.slots[i];
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list = Some(i);
        self.len -= 1;
        match mem::replace(&mut slot.entry, new_entry) {
            PoolEntry::Occupied(item) => Some(item),
            _ => unreachable!(),
        }
    }

    /// Determines if the handle refers to a live entry.
    pub fn contains(&self, h: Handle) -> bool {
        match self.slots.get(h.index()) {
            Some(&Slot{ generation, entry: PoolEntry::Occupied(_) }) => generation == h.generation,
            _ => false,
        }
    }

    pub fn get(&self, h: Handle) -> Option<&T> {
        match self.slots.get(h.index()) {
            Some(&Slot{ generation, entry: PoolEntry::Occupied(ref item) })
                if generation == h.generation => Some(item),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, h: Handle) -> Option<&mut T> {
        match self.slots.get_mut(h.index()) {
            Some(&mut Slot{ generation, entry: PoolEntry::Occupied(ref mut item) })
                if generation == h.generation => Some(item),
            _ => None,
        }
    }

    /// Borrows two distinct entries mutably at the same time. Returns None if
    /// either handle is stale or both refer to the same entry.
    pub fn get2_mut(&mut self, a: Handle, b: Handle) -> Option<(&mut T, &mut T)> {
        if a.index == b.index || !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (lo, hi, swapped) = if a.index() < b.index() {
            (a.index(), b.index(), false)
        } else {
            (b.index(), a.index(), true)
        };
        let (head, tail) = self.slots.split_at_mut(hi);
        let first = match head[lo].entry {
            PoolEntry::Occupied(ref mut item) => item,
            _ => unreachable!(),
        };
        let second = match tail[0].entry {
            PoolEntry::Occupied(ref mut item) => item,
            _ => unreachable!(),
        };
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Number of slots, occupied or not. Every live handle has an index
    /// below this.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates live entries in slot order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (Handle, &'a T)> + 'a {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot.entry {
            PoolEntry::Occupied(ref item) => Some((
                Handle { index: i as u32, generation: slot.generation },
                item,
            )),
            _ => None,
        })
    }

    /// Iterates live entries mutably in slot order.
    pub fn iter_mut<'a>(&'a mut self) -> impl Iterator<Item = (Handle, &'a mut T)> + 'a {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            match slot.entry {
                PoolEntry::Occupied(ref mut item) => Some((
                    Handle { index: i as u32, generation },
                    item,
                )),
                _ => None,
            }
        })
    }

    /// Iterates the handles of live entries in slot order.
    pub fn handles<'a>(&'a self) -> impl Iterator<Item = Handle> + 'a {
        self.iter().map(|(h, _)| h)
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Pool::new()
    }
}

impl<T> Index<Handle> for Pool<T> {
    type Output = T;

    fn index(&self, h: Handle) -> &T {
        match self.get(h) {
            Some(item) => item,
            None => panic!("handle {:?} is not occupied", h),
        }
    }
}

impl<T> IndexMut<Handle> for Pool<T> {
    fn index_mut(&mut self, h: Handle) -> &mut T {
        match self.get_mut(h) {
            Some(item) => item,
            None => panic!("handle {:?} is not occupied", h),
        }
    }
}
