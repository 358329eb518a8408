// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The binding engine.
//!
//! The guest describes its types, functions and classes by calling the registration entry
//! points while it initializes. The engine records them and lets the host call into the guest
//! with [`Value`]s, converting them to and from the guest's wire representations.

mod classes;
mod emval;
mod host;
mod introspection;
mod lifecycle;
mod registration;

pub use self::{
    host::ConstantValue,
    introspection::{ClassInfo, EnumInfo, OverloadInfo, PropertyInfo, SymbolInfo},
    lifecycle::{DelayFunction, PendingDeletes},
    registration::{
        ClassFunctionRegistration, ClassPropertyRegistration, ClassRegistration,
        ConstructorRegistration, FieldAccessors, FunctionRegistration, MethodRegistration,
        PropertyRegistration, SmartPointerRegistration,
    },
};
use crate::{
    class::{ClassHandle, ClassTable, HandleTable, RegisteredPointers},
    config::EngineConfig,
    emval::EmvalState,
    registry::TypeRegistry,
    runtime::{GuestFunction, GuestPointer, Instance, RuntimeError, Signature, WireValue},
    symbol::SymbolTable,
    types::{EnumDescriptor, RawTypeId, StructRegistration, TupleRegistration},
    EmbindError, Value,
};
use std::{
    cell::{Ref, RefCell, RefMut},
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

/// The state of an engine.
///
/// Borrows of the state are never held across calls into the guest or into host callbacks,
/// since both may re-enter the engine.
#[derive(Default)]
pub(crate) struct EngineState {
    pub(crate) registry: TypeRegistry,
    pub(crate) symbols: SymbolTable,
    pub(crate) classes: ClassTable,
    pub(crate) registered_pointers: HashMap<RawTypeId, RegisteredPointers>,
    pub(crate) handles: HandleTable,
    pub(crate) deletion_queue: Vec<ClassHandle>,
    pub(crate) delay_function: Option<DelayFunction>,
    pub(crate) emval: EmvalState,
    pub(crate) enums: BTreeMap<String, EnumDescriptor>,
    pub(crate) constants: BTreeMap<String, ConstantValue>,
    pub(crate) tuples: HashMap<RawTypeId, TupleRegistration>,
    pub(crate) structs: HashMap<RawTypeId, StructRegistration>,
}

/// A binding engine for one guest instance.
///
/// Engines are cheap to clone, and clones share the same state.
#[derive(Clone, Default)]
pub struct Engine {
    config: Rc<EngineConfig>,
    state: Rc<RefCell<EngineState>>,
}

impl Engine {
    /// Creates an engine using `config` to locate the guest's exports.
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config: Rc::new(config),
            state: Rc::default(),
        }
    }

    /// The configuration of the engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> Ref<'_, EngineState> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, EngineState> {
        self.state.borrow_mut()
    }

    /// Allocates `size` bytes in the guest.
    pub(crate) fn malloc(
        &self,
        instance: &mut dyn Instance,
        size: u32,
    ) -> Result<GuestPointer, EmbindError> {
        let size = i32::try_from(size).map_err(|_| RuntimeError::AllocationTooLarge)?;
        let results = instance.call_export(&self.config.malloc_export, &[WireValue::I32(size)])?;
        let pointer = results
            .first()
            .ok_or_else(|| EmbindError::Decode("allocator returned nothing".to_owned()))?
            .as_pointer()?;
        if pointer.is_null() {
            return Err(RuntimeError::AllocationFailed(size as u32).into());
        }
        Ok(pointer)
    }

    /// Releases memory allocated in the guest.
    pub(crate) fn free(
        &self,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<(), EmbindError> {
        instance.call_export(&self.config.free_export, &[pointer.into()])?;
        Ok(())
    }

    /// Reads a NUL-terminated string from the guest's memory.
    pub(crate) fn read_string(
        &self,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<String, EmbindError> {
        let bytes = instance.read_cstring(pointer)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Resolves a function pointer of the guest, with the signature described by the string at
    /// `signature`.
    pub(crate) fn require_function(
        &self,
        instance: &mut dyn Instance,
        signature: GuestPointer,
        index: u32,
    ) -> Result<GuestFunction, EmbindError> {
        let descriptor = self.read_string(instance, signature)?;
        let signature = descriptor.parse::<Signature>()?;
        Ok(GuestFunction::new(index, signature))
    }

    /// Like [`Engine::require_function`], but a null function pointer is [`None`].
    pub(crate) fn optional_function(
        &self,
        instance: &mut dyn Instance,
        signature: GuestPointer,
        index: u32,
    ) -> Result<Option<GuestFunction>, EmbindError> {
        if index == 0 {
            return Ok(None);
        }
        self.require_function(instance, signature, index).map(Some)
    }

    /// Calls a public function, or constructs an instance of a public class, by name.
    pub fn call_function(
        &self,
        instance: &mut dyn Instance,
        name: &str,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        let overload = {
            let state = self.state();
            let slot = state
                .symbols
                .get(name)
                .ok_or_else(|| EmbindError::UnknownSymbol(name.to_owned()))?;
            slot.resolve(name, arguments.len())?.clone()
        };
        self.call_overload(instance, overload.callable, None, arguments)
    }
}

#[cfg(test)]
#[path = "unit_tests/engine.rs"]
mod tests;
