// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A mock guest instance for testing.
//!
//! The memory is a plain byte vector split into a static data region, used for registration
//! payloads such as names and type lists, and a heap served by the `malloc` and `free` exports.
//! Heap allocations are tracked so that tests can assert that every guest allocation made by
//! the engine is eventually released.

use super::{GuestFunction, GuestPointer, Instance, RuntimeError, Signature, WireValue};
use std::{
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

/// First address handed out by the static data region.
const DATA_START: u32 = 16;
/// First address handed out by the heap.
const HEAP_START: u32 = 64 * 1024;
/// Alignment of every allocation.
const ALIGNMENT: u32 = 8;

/// A host closure standing in for a guest function.
pub type MockFunction =
    Rc<dyn Fn(&mut MockInstance, &[WireValue]) -> Result<Vec<WireValue>, RuntimeError>>;

/// A fake guest instance, with its memory, allocator and function table implemented on the
/// host.
pub struct MockInstance {
    memory: Vec<u8>,
    data_top: u32,
    heap_top: u32,
    allocations: BTreeMap<u32, u32>,
    table: Vec<Option<(Signature, MockFunction)>>,
    exports: HashMap<String, MockFunction>,
    type_names: HashMap<i32, String>,
}

impl Default for MockInstance {
    fn default() -> Self {
        MockInstance {
            memory: vec![0; HEAP_START as usize],
            data_top: DATA_START,
            heap_top: HEAP_START,
            allocations: BTreeMap::new(),
            // Index zero is the null function.
            table: vec![None],
            exports: HashMap::new(),
            type_names: HashMap::new(),
        }
    }
}

impl MockInstance {
    /// Adds a function to the indirect function table, returning its index.
    pub fn add_function(
        &mut self,
        signature: Signature,
        function: impl Fn(&mut MockInstance, &[WireValue]) -> Result<Vec<WireValue>, RuntimeError>
            + 'static,
    ) -> u32 {
        let index = self.table.len() as u32;
        self.table.push(Some((signature, Rc::new(function))));
        index
    }

    /// Adds or replaces an exported function.
    pub fn add_export(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&mut MockInstance, &[WireValue]) -> Result<Vec<WireValue>, RuntimeError>
            + 'static,
    ) {
        self.exports.insert(name.into(), Rc::new(function));
    }

    /// Sets the name the `__getTypeName` export reports for `raw_type`.
    pub fn set_type_name(&mut self, raw_type: i32, name: impl Into<String>) {
        self.type_names.insert(raw_type, name.into());
    }

    /// Stores `bytes` in the static data region, returning their address.
    pub fn store_static(&mut self, bytes: &[u8]) -> GuestPointer {
        let location = GuestPointer(self.data_top);
        let end = self.data_top + bytes.len() as u32;
        assert!(end <= HEAP_START, "Mock static data region exhausted");
        self.memory[location.0 as usize..end as usize].copy_from_slice(bytes);
        self.data_top = align(end);
        location
    }

    /// Stores a NUL-terminated copy of `text` in the static data region.
    pub fn store_cstring(&mut self, text: &str) -> GuestPointer {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.store_static(&bytes)
    }

    /// Stores a list of little-endian 32-bit words in the static data region.
    pub fn store_u32_array(&mut self, values: &[u32]) -> GuestPointer {
        let bytes = values
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect::<Vec<_>>();
        self.store_static(&bytes)
    }

    /// Allocates `size` bytes on the heap.
    pub fn malloc(&mut self, size: u32) -> Result<GuestPointer, RuntimeError> {
        let location = self.heap_top;
        let end = location
            .checked_add(size.max(1))
            .ok_or(RuntimeError::AllocationTooLarge)?;
        if end as usize > self.memory.len() {
            self.memory.resize(align(end) as usize * 2, 0);
        }
        self.heap_top = align(end);
        self.allocations.insert(location, size);
        Ok(GuestPointer(location))
    }

    /// Releases a heap allocation.
    pub fn free(&mut self, pointer: GuestPointer) -> Result<(), RuntimeError> {
        self.allocations
            .remove(&pointer.0)
            .map(|_| ())
            .ok_or(RuntimeError::DeallocateNonAllocated(pointer))
    }

    /// Returns `true` if `pointer` is the start of a live heap allocation.
    pub fn is_allocated(&self, pointer: GuestPointer) -> bool {
        self.allocations.contains_key(&pointer.0)
    }

    /// The number of live heap allocations.
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    fn bounds(&self, location: GuestPointer, length: u32) -> Result<(usize, usize), RuntimeError> {
        let start = location.0 as usize;
        let end = start + length as usize;
        if end > self.memory.len() {
            return Err(RuntimeError::OutOfBounds { location, length });
        }
        Ok((start, end))
    }

    fn type_name(&mut self, arguments: &[WireValue]) -> Result<Vec<WireValue>, RuntimeError> {
        let raw_type = single_argument(arguments)?.as_i32()?;
        let name = self
            .type_names
            .get(&raw_type)
            .cloned()
            .unwrap_or_else(|| format!("type {raw_type}"));
        let location = self.malloc(name.len() as u32 + 1)?;
        self.write_memory(location, name.as_bytes())?;
        self.write_memory(location.offset(name.len() as u32), &[0])?;
        Ok(vec![location.into()])
    }
}

impl Instance for MockInstance {
    fn read_memory(&mut self, location: GuestPointer, length: u32) -> Result<Vec<u8>, RuntimeError> {
        let (start, end) = self.bounds(location, length)?;
        Ok(self.memory[start..end].to_vec())
    }

    fn write_memory(&mut self, location: GuestPointer, bytes: &[u8]) -> Result<(), RuntimeError> {
        let (start, end) = self.bounds(location, bytes.len() as u32)?;
        self.memory[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn call_export(
        &mut self,
        name: &str,
        arguments: &[WireValue],
    ) -> Result<Vec<WireValue>, RuntimeError> {
        if let Some(function) = self.exports.get(name).cloned() {
            return function(self, arguments);
        }

        match name {
            "malloc" => {
                let size = single_argument(arguments)?.as_u32()?;
                Ok(vec![self.malloc(size)?.into()])
            }
            "free" => {
                self.free(single_argument(arguments)?.as_pointer()?)?;
                Ok(vec![])
            }
            "__getTypeName" => self.type_name(arguments),
            _ => Err(RuntimeError::FunctionNotFound(name.to_owned())),
        }
    }

    fn call_indirect(
        &mut self,
        function: &GuestFunction,
        arguments: &[WireValue],
    ) -> Result<Vec<WireValue>, RuntimeError> {
        let (signature, body) = self
            .table
            .get(function.index() as usize)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or(RuntimeError::InvalidTableEntry(function.index()))?;

        if &signature != function.signature() {
            return Err(RuntimeError::SignatureMismatch {
                index: function.index(),
                expected: function.signature().to_string(),
                actual: signature.to_string(),
            });
        }
        function.check_arguments(arguments)?;

        let results = body(self, arguments)?;
        let expected = usize::from(signature.result().is_some());
        if results.len() != expected
            || results
                .first()
                .zip(signature.result())
                .is_some_and(|(result, kind)| result.kind() != kind)
        {
            return Err(RuntimeError::Trap(format!(
                "mock function {} returned {results:?} for signature {signature}",
                function.index()
            )));
        }
        Ok(results)
    }
}

fn single_argument(arguments: &[WireValue]) -> Result<WireValue, RuntimeError> {
    match arguments {
        [argument] => Ok(*argument),
        _ => Err(RuntimeError::Trap(format!(
            "expected a single argument, got {}",
            arguments.len()
        ))),
    }
}

fn align(address: u32) -> u32 {
    (address + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}
