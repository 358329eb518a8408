// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{EmbindError, Value};

/// The number of handles reserved for the constants `undefined`, `null`, `true` and `false`,
/// plus the unused handle zero.
pub const RESERVED_HANDLES: i32 = 5;

/// A reference-counted table of values handed to the guest as integer handles.
pub(crate) struct EmvalTable {
    slots: Vec<Option<Slot>>,
    free: Vec<i32>,
}

struct Slot {
    value: Value,
    count: u32,
}

impl Default for EmvalTable {
    fn default() -> Self {
        let reserved = [Value::Undefined, Value::Null, Value::Bool(true), Value::Bool(false)];
        let slots = std::iter::once(None)
            .chain(reserved.into_iter().map(|value| Some(Slot { value, count: 1 })))
            .collect();
        EmvalTable {
            slots,
            free: Vec::new(),
        }
    }
}

impl EmvalTable {
    /// Stores `value`, returning a handle with a reference count of one.
    ///
    /// The reserved constants always map to their fixed handles.
    pub(crate) fn to_handle(&mut self, value: Value) -> i32 {
        match value {
            Value::Undefined => 1,
            Value::Null => 2,
            Value::Bool(true) => 3,
            Value::Bool(false) => 4,
            value => {
                let slot = Some(Slot { value, count: 1 });
                match self.free.pop() {
                    Some(handle) => {
                        self.slots[handle as usize] = slot;
                        handle
                    }
                    None => {
                        self.slots.push(slot);
                        (self.slots.len() - 1) as i32
                    }
                }
            }
        }
    }

    fn slot(&self, handle: i32) -> Result<&Slot, EmbindError> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| self.slots.get(index))
            .and_then(Option::as_ref)
            .ok_or(EmbindError::InvalidHandle(handle))
    }

    fn slot_mut(&mut self, handle: i32) -> Result<&mut Slot, EmbindError> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
            .and_then(Option::as_mut)
            .ok_or(EmbindError::InvalidHandle(handle))
    }

    pub(crate) fn get(&self, handle: i32) -> Result<&Value, EmbindError> {
        Ok(&self.slot(handle)?.value)
    }

    pub(crate) fn get_mut(&mut self, handle: i32) -> Result<&mut Value, EmbindError> {
        if handle < RESERVED_HANDLES {
            return Err(EmbindError::InvalidHandle(handle));
        }
        Ok(&mut self.slot_mut(handle)?.value)
    }

    pub(crate) fn incref(&mut self, handle: i32) -> Result<(), EmbindError> {
        if handle >= RESERVED_HANDLES {
            self.slot_mut(handle)?.count += 1;
        }
        Ok(())
    }

    /// Drops a reference, freeing the handle for reuse when it was the last one.
    pub(crate) fn decref(&mut self, handle: i32) -> Result<(), EmbindError> {
        if handle < RESERVED_HANDLES {
            return Ok(());
        }
        let slot = self.slot_mut(handle)?;
        slot.count -= 1;
        if slot.count == 0 {
            self.slots[handle as usize] = None;
            self.free.push(handle);
        }
        Ok(())
    }

    /// The number of live handles, excluding the reserved ones.
    pub(crate) fn count(&self) -> usize {
        self.slots.len() - RESERVED_HANDLES as usize - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn constants_use_reserved_handles() {
        let mut table = EmvalTable::default();
        assert_eq!(table.to_handle(Value::Undefined), 1);
        assert_eq!(table.to_handle(Value::Null), 2);
        assert_eq!(table.to_handle(Value::Bool(true)), 3);
        assert_eq!(table.to_handle(Value::Bool(false)), 4);
        assert_eq!(table.count(), 0);

        table.decref(3).unwrap();
        assert_eq!(table.get(3).unwrap(), &Value::Bool(true));
    }

    #[test]
    fn freed_handles_are_reused_last_in_first_out() {
        let mut table = EmvalTable::default();
        let first = table.to_handle(Value::I32(1));
        let second = table.to_handle(Value::I32(2));
        assert_eq!((first, second), (5, 6));

        table.decref(first).unwrap();
        table.decref(second).unwrap();
        assert_eq!(table.count(), 0);
        assert_matches!(table.get(first), Err(EmbindError::InvalidHandle(5)));

        assert_eq!(table.to_handle(Value::from("a")), second);
        assert_eq!(table.to_handle(Value::from("b")), first);
    }

    #[test]
    fn handles_live_until_the_last_reference_is_dropped() {
        let mut table = EmvalTable::default();
        let handle = table.to_handle(Value::F64(1.5));
        table.incref(handle).unwrap();

        table.decref(handle).unwrap();
        assert_eq!(table.get(handle).unwrap(), &Value::F64(1.5));

        table.decref(handle).unwrap();
        assert_matches!(table.incref(handle), Err(EmbindError::InvalidHandle(_)));
    }
}
