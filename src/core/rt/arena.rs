// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational slot arena.
//!
//! The AR table, the session table and each AR's IOCR list are all small,
//! fixed-capacity collections addressed by handle rather than by pointer (see
//! `DESIGN.md`, "Cyclic graphs"). A handle encodes a slot index plus a
//! generation counter; freeing a slot bumps its generation so a handle taken
//! before the free fails every subsequent lookup instead of aliasing whatever
//! got allocated into the same slot afterwards. This is the same "handle
//! encodes into a small integer, validated at the boundary" idiom the slab
//! allocator uses for buffer pools, applied to long-lived protocol objects
//! instead of byte buffers.

/// Opaque handle into an [`Arena`]. `index` is a dense slot position;
/// `generation` must match the slot's current generation for the handle to
/// resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub index: u16,
    pub generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity arena of generation-checked slots.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Slot {
                generation: 0,
                value: None,
            });
        }
        Self { slots, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert into the first free slot. Returns `None` if the arena is full
    /// (the caller turns this into a resource-exhaustion error, e.g.
    /// `CMRPC / NO_AR_RESOURCES`).
    pub fn insert(&mut self, value: T) -> Option<Handle> {
        let index = self.slots.iter().position(|s| s.value.is_none())?;
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        Some(Handle {
            index: index as u16,
            generation: slot.generation,
        })
    }

    /// Remove the value at `handle`, bumping the slot's generation so stale
    /// handles into the freed slot never resolve again.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.value.take()
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    Handle {
                        index: index as u16,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(move |v| {
                (
                    Handle {
                        index: index as u16,
                        generation,
                    },
                    v,
                )
            })
        })
    }

    /// Find the handle of the first entry matching `pred`, without borrowing
    /// the arena mutably — used by lookups keyed on e.g. an AR UUID.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Handle> {
        self.iter().find(|(_, v)| pred(v)).map(|(h, _)| h)
    }
}
