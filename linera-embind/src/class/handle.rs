// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Handles to guest-owned class instances.
//!
//! Every handle lives in a slot of a generational arena. Handles cloned from one another point
//! to the same ownership record, a second arena holding the reference count of each guest
//! object. The object is destroyed when the count of its record drops to zero, which also frees
//! the record. Deleting a handle frees its slot, so stale copies of a [`ClassHandle`] are
//! detected by their generation.

use super::PointerType;
use crate::{runtime::GuestPointer, EmbindError};
use std::fmt;

/// A handle to a class instance owned by the guest.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ClassHandle {
    slot: u32,
    generation: u32,
}

impl fmt::Debug for ClassHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ClassHandle({}v{})", self.slot, self.generation)
    }
}

/// The smart pointer wrapping a handle's object.
#[derive(Clone, Debug)]
pub(crate) struct SmartHandle {
    pub(crate) pointer: GuestPointer,
    pub(crate) pointer_type: PointerType,
}

/// The state of a live handle.
#[derive(Clone, Debug)]
pub(crate) struct HandleState {
    pub(crate) pointer: GuestPointer,
    pub(crate) pointer_type: PointerType,
    pub(crate) smart: Option<SmartHandle>,
    pub(crate) record: RecordId,
    pub(crate) delete_scheduled: bool,
    pub(crate) preserve_pointer_on_delete: bool,
}

/// The index of an ownership record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RecordId {
    index: u32,
    generation: u32,
}

#[derive(Default)]
struct HandleSlot {
    generation: u32,
    state: Option<HandleState>,
}

#[derive(Default)]
struct RecordSlot {
    generation: u32,
    count: Option<u32>,
}

/// The arena of class handles and of the ownership records they share.
#[derive(Default)]
pub(crate) struct HandleTable {
    slots: Vec<HandleSlot>,
    free_slots: Vec<u32>,
    records: Vec<RecordSlot>,
    free_records: Vec<u32>,
}

impl HandleTable {
    /// Creates a handle with a fresh ownership record counting one reference.
    pub(crate) fn create(
        &mut self,
        pointer: GuestPointer,
        pointer_type: PointerType,
        smart: Option<SmartHandle>,
    ) -> ClassHandle {
        let record = self.new_record();
        self.insert(HandleState {
            pointer,
            pointer_type,
            smart,
            record,
            delete_scheduled: false,
            preserve_pointer_on_delete: false,
        })
    }

    fn new_record(&mut self) -> RecordId {
        match self.free_records.pop() {
            Some(index) => {
                let entry = &mut self.records[index as usize];
                entry.count = Some(1);
                RecordId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                self.records.push(RecordSlot {
                    generation: 0,
                    count: Some(1),
                });
                RecordId {
                    index: (self.records.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn record_count(&mut self, record: RecordId) -> Option<&mut u32> {
        self.records
            .get_mut(record.index as usize)
            .filter(|entry| entry.generation == record.generation)
            .and_then(|entry| entry.count.as_mut())
    }

    fn free_record(&mut self, record: RecordId) {
        if let Some(entry) = self
            .records
            .get_mut(record.index as usize)
            .filter(|entry| entry.generation == record.generation)
        {
            entry.count = None;
            entry.generation = entry.generation.wrapping_add(1);
            self.free_records.push(record.index);
        }
    }

    fn insert(&mut self, state: HandleState) -> ClassHandle {
        match self.free_slots.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.state = Some(state);
                ClassHandle {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                self.slots.push(HandleSlot {
                    generation: 0,
                    state: Some(state),
                });
                ClassHandle {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    pub(crate) fn get(&self, handle: ClassHandle) -> Result<&HandleState, EmbindError> {
        self.slots
            .get(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.state.as_ref())
            .ok_or(EmbindError::AlreadyDeleted)
    }

    pub(crate) fn get_mut(&mut self, handle: ClassHandle) -> Result<&mut HandleState, EmbindError> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.state.as_mut())
            .ok_or(EmbindError::AlreadyDeleted)
    }

    pub(crate) fn contains(&self, handle: ClassHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Clones a handle, sharing its reference count.
    ///
    /// Handles that preserve their pointer on deletion are returned as is, with one more
    /// reference.
    pub(crate) fn share(&mut self, handle: ClassHandle) -> Result<ClassHandle, EmbindError> {
        let record = self.get(handle)?.record;
        match self.record_count(record) {
            Some(count) => *count += 1,
            // A preserved handle outlives its record, and sharing it starts a new one.
            None => {
                let record = self.new_record();
                self.get_mut(handle)?.record = record;
            }
        }
        let state = self.get(handle)?;
        if state.preserve_pointer_on_delete {
            return Ok(handle);
        }
        let mut copy = state.clone();
        copy.delete_scheduled = false;
        Ok(self.insert(copy))
    }

    /// Drops one reference, returning the state if it was the last one and the guest object
    /// must be destroyed.
    ///
    /// The ownership record is freed with its last reference.
    pub(crate) fn release(&mut self, handle: ClassHandle) -> Result<Option<HandleState>, EmbindError> {
        let record = self.get(handle)?.record;
        let Some(count) = self.record_count(record) else {
            return Ok(None);
        };
        *count -= 1;
        if *count > 0 {
            return Ok(None);
        }
        self.free_record(record);
        Ok(Some(self.get(handle)?.clone()))
    }

    /// The number of handles sharing the ownership record of `handle`.
    pub(crate) fn count(&self, handle: ClassHandle) -> Result<u32, EmbindError> {
        let record = self.get(handle)?.record;
        Ok(self
            .records
            .get(record.index as usize)
            .filter(|entry| entry.generation == record.generation)
            .and_then(|entry| entry.count)
            .unwrap_or(0))
    }

    /// Frees the slot of a deleted handle.
    pub(crate) fn remove(&mut self, handle: ClassHandle) -> Result<HandleState, EmbindError> {
        let entry = self
            .slots
            .get_mut(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .ok_or(EmbindError::AlreadyDeleted)?;
        let state = entry.state.take().ok_or(EmbindError::AlreadyDeleted)?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push(handle.slot);
        Ok(state)
    }

    /// The number of live handles.
    pub(crate) fn live(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    /// The number of ownership records still referenced.
    #[cfg(test)]
    pub(crate) fn live_records(&self) -> usize {
        self.records.len() - self.free_records.len()
    }
}

#[cfg(test)]
#[path = "unit_tests/handle.rs"]
mod tests;
