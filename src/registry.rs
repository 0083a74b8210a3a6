// Copyright 2024 Nathan Hoos
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use crate::errors::FstError;
use crate::types::{FrozenFst, MutableFst};
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard, PoisonError};

// Handle layout: 12 generation bits over 20 slot bits. Slot indices stop one
// short of the mask so no (generation, slot) pair can assemble u32::MAX,
// which is reserved for FST_INVALID_HANDLE.
const SLOT_BITS: u32 = 20;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;
const GENERATION_MASK: u32 = u32::MAX >> SLOT_BITS;
const MAX_SLOTS: usize = SLOT_MASK as usize;

#[derive(Debug)]
pub(crate) enum FstObject {
    Mutable(MutableFst),
    Frozen(FrozenFst),
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<FstObject>,
}

/// Process-wide table of owned transducers.
///
/// Each live object occupies one slot; the handle packs the slot index with
/// the slot's generation tag, so a freed handle stops resolving the moment
/// its slot is tombstoned and keeps failing after the slot is reused.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
}

impl Registry {
    pub fn insert(&mut self, object: FstObject) -> Result<u32, FstError> {
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            return Ok((slot.generation << SLOT_BITS) | index);
        }
        if self.slots.len() >= MAX_SLOTS {
            return Err(FstError::Oom);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        Ok(index)
    }

    fn slot_of(&self, handle: u32) -> Result<&Slot, FstError> {
        let index = (handle & SLOT_MASK) as usize;
        let generation = handle >> SLOT_BITS;
        let slot = self
            .slots
            .get(index)
            .ok_or(FstError::InvalidArg("invalid handle"))?;
        if slot.generation != generation || slot.object.is_none() {
            return Err(FstError::InvalidArg("stale handle"));
        }
        Ok(slot)
    }

    pub fn resolve_mutable(&self, handle: u32) -> Result<&MutableFst, FstError> {
        match self.slot_of(handle)?.object {
            Some(FstObject::Mutable(ref fst)) => Ok(fst),
            _ => Err(FstError::InvalidArg("handle is not a mutable fst")),
        }
    }

    pub fn resolve_frozen(&self, handle: u32) -> Result<&FrozenFst, FstError> {
        match self.slot_of(handle)?.object {
            Some(FstObject::Frozen(ref fst)) => Ok(fst),
            _ => Err(FstError::InvalidArg("handle is not a frozen fst")),
        }
    }

    pub fn resolve_mutable_mut(&mut self, handle: u32) -> Result<&mut MutableFst, FstError> {
        self.slot_of(handle)?;
        let index = (handle & SLOT_MASK) as usize;
        match self.slots[index].object {
            Some(FstObject::Mutable(ref mut fst)) => Ok(fst),
            _ => Err(FstError::InvalidArg("handle is not a mutable fst")),
        }
    }

    /// Lifts a mutable transducer out of its slot for in-place mutation.
    /// The slot stays reserved (same generation) until [`Registry::restore`]
    /// puts the object back; every caller restores on both success and
    /// failure paths.
    pub fn take_mutable(&mut self, handle: u32) -> Result<MutableFst, FstError> {
        self.resolve_mutable(handle)?;
        let index = (handle & SLOT_MASK) as usize;
        match self.slots[index].object.take() {
            Some(FstObject::Mutable(fst)) => Ok(fst),
            _ => Err(FstError::InvalidArg("stale handle")),
        }
    }

    pub fn restore(&mut self, handle: u32, fst: MutableFst) {
        let index = (handle & SLOT_MASK) as usize;
        if let Some(slot) = self.slots.get_mut(index) {
            slot.object = Some(FstObject::Mutable(fst));
        }
    }

    /// Frees the object behind a handle if it exists and has the requested
    /// kind. Double frees and kind confusion are silently ignored, matching
    /// the `void` free functions at the boundary.
    pub fn remove(&mut self, handle: u32, want_mutable: bool) {
        let matches = match self.slot_of(handle) {
            Ok(slot) => matches!(
                (&slot.object, want_mutable),
                (Some(FstObject::Mutable(_)), true) | (Some(FstObject::Frozen(_)), false)
            ),
            Err(_) => false,
        };
        if !matches {
            return;
        }
        let index = handle & SLOT_MASK;
        self.tombstone(index);
    }

    fn tombstone(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.object = None;
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        self.free_slots.push(index);
    }

    /// Releases every live transducer. Slots keep their bumped generations
    /// so handles issued before teardown cannot resolve against objects
    /// created after it.
    pub fn clear(&mut self) -> usize {
        let mut released = 0;
        for index in 0..self.slots.len() as u32 {
            if self.slots[index as usize].object.is_some() {
                self.tombstone(index);
                released += 1;
            }
        }
        released
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.object.is_some()).count()
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));

/// Serialises every boundary call; held for the call's entire duration.
pub(crate) fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}
