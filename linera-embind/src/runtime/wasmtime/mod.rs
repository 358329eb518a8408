// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Support for the [Wasmtime](https://wasmtime.dev) runtime.

mod linker;

pub use self::linker::add_to_linker;
use super::{GuestFunction, GuestPointer, Instance, RuntimeError, WireValue};
use crate::Engine;
use wasmtime::{
    AsContext, AsContextMut, Caller, Extern, Func, Memory, Ref, Store, StoreContext,
    StoreContextMut, Val,
};

/// Store data that exposes the [`Engine`] bound to the guest instance.
pub trait EngineStore {
    /// The engine bound to the guest instance.
    fn engine(&self) -> &Engine;
}

impl EngineStore for Engine {
    fn engine(&self) -> &Engine {
        self
    }
}

/// Necessary data for implementing an entrypoint [`Instance`].
pub struct EntrypointInstance<Data> {
    instance: wasmtime::Instance,
    store: Store<Data>,
    engine: Engine,
}

impl<Data: EngineStore> EntrypointInstance<Data> {
    /// Creates a new [`EntrypointInstance`] with the guest module
    /// [`Instance`][`wasmtime::Instance`] and [`Store`].
    pub fn new(instance: wasmtime::Instance, store: Store<Data>) -> Self {
        let engine = store.data().engine().clone();
        EntrypointInstance {
            instance,
            store,
            engine,
        }
    }

    /// The engine bound to the guest instance.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The store holding the guest instance.
    pub fn store(&self) -> &Store<Data> {
        &self.store
    }

    /// Mutable access to the store holding the guest instance.
    pub fn store_mut(&mut self) -> &mut Store<Data> {
        &mut self.store
    }

    fn load_export(&mut self, name: &str) -> Option<Extern> {
        self.instance.get_export(&mut self.store, name)
    }
}

impl<Data> AsContext for EntrypointInstance<Data> {
    type Data = Data;

    fn as_context(&self) -> StoreContext<Data> {
        self.store.as_context()
    }
}

impl<Data> AsContextMut for EntrypointInstance<Data> {
    fn as_context_mut(&mut self) -> StoreContextMut<Data> {
        self.store.as_context_mut()
    }
}

/// A guest instance seen from inside a host function it called.
pub struct CallerInstance<'caller, Data> {
    caller: Caller<'caller, Data>,
    engine: Engine,
}

impl<'caller, Data: EngineStore> CallerInstance<'caller, Data> {
    /// Creates a new [`CallerInstance`] wrapping the `caller` of a host function.
    pub fn new(caller: Caller<'caller, Data>) -> Self {
        let engine = caller.data().engine().clone();
        CallerInstance { caller, engine }
    }

    /// The engine bound to the guest instance.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn load_export(&mut self, name: &str) -> Option<Extern> {
        self.caller.get_export(name)
    }
}

impl<Data> AsContext for CallerInstance<'_, Data> {
    type Data = Data;

    fn as_context(&self) -> StoreContext<Data> {
        self.caller.as_context()
    }
}

impl<Data> AsContextMut for CallerInstance<'_, Data> {
    fn as_context_mut(&mut self) -> StoreContextMut<Data> {
        self.caller.as_context_mut()
    }
}

/// Implements [`Instance`] for the Wasmtime instance wrappers.
macro_rules! impl_instance {
    ($instance:ty) => {
        impl<Data: EngineStore> Instance for $instance {
            fn read_memory(
                &mut self,
                location: GuestPointer,
                length: u32,
            ) -> Result<Vec<u8>, RuntimeError> {
                let memory = self.memory()?;
                let data = memory.data(&*self);
                let (start, end) = bounds(data.len(), location, length)?;
                Ok(data[start..end].to_vec())
            }

            fn write_memory(
                &mut self,
                location: GuestPointer,
                bytes: &[u8],
            ) -> Result<(), RuntimeError> {
                let memory = self.memory()?;
                let data = memory.data_mut(&mut *self);
                let (start, end) = bounds(data.len(), location, bytes.len() as u32)?;
                data[start..end].copy_from_slice(bytes);
                Ok(())
            }

            fn call_export(
                &mut self,
                name: &str,
                arguments: &[WireValue],
            ) -> Result<Vec<WireValue>, RuntimeError> {
                let function = match self.load_export(name) {
                    Some(Extern::Func(function)) => function,
                    Some(_) => return Err(RuntimeError::UnexpectedExportKind(name.to_owned())),
                    None => return Err(RuntimeError::FunctionNotFound(name.to_owned())),
                };
                self.call_func(function, arguments)
            }

            fn call_indirect(
                &mut self,
                function: &GuestFunction,
                arguments: &[WireValue],
            ) -> Result<Vec<WireValue>, RuntimeError> {
                function.check_arguments(arguments)?;
                let engine = self.engine.clone();
                let table = match self.load_export(&engine.config().function_table_export) {
                    Some(Extern::Table(table)) => table,
                    _ => return Err(RuntimeError::MissingFunctionTable),
                };
                let entry = match table.get(&mut *self, function.index().into()) {
                    Some(Ref::Func(Some(entry))) => entry,
                    _ => return Err(RuntimeError::InvalidTableEntry(function.index())),
                };
                self.call_func(entry, arguments)
            }
        }

        impl<Data: EngineStore> $instance {
            fn memory(&mut self) -> Result<Memory, RuntimeError> {
                let engine = self.engine.clone();
                match self.load_export(&engine.config().memory_export) {
                    Some(Extern::Memory(memory)) => Ok(memory),
                    _ => Err(RuntimeError::MissingMemory),
                }
            }

            fn call_func(
                &mut self,
                function: Func,
                arguments: &[WireValue],
            ) -> Result<Vec<WireValue>, RuntimeError> {
                let parameters = arguments.iter().map(to_val).collect::<Vec<_>>();
                let result_count = function.ty(&*self).results().len();
                let mut results = vec![Val::I32(0); result_count];
                function
                    .call(&mut *self, &parameters, &mut results)
                    .map_err(RuntimeError::Wasmtime)?;
                results.iter().map(from_val).collect()
            }
        }
    };
}

impl_instance!(EntrypointInstance<Data>);
impl_instance!(CallerInstance<'_, Data>);

fn bounds(
    memory_size: usize,
    location: GuestPointer,
    length: u32,
) -> Result<(usize, usize), RuntimeError> {
    let start = location.0 as usize;
    let end = start + length as usize;
    if end > memory_size {
        return Err(RuntimeError::OutOfBounds { location, length });
    }
    Ok((start, end))
}

fn to_val(value: &WireValue) -> Val {
    match *value {
        WireValue::I32(value) => Val::I32(value),
        WireValue::I64(value) => Val::I64(value),
        WireValue::F32(value) => Val::F32(value.to_bits()),
        WireValue::F64(value) => Val::F64(value.to_bits()),
    }
}

fn from_val(value: &Val) -> Result<WireValue, RuntimeError> {
    match value {
        Val::I32(value) => Ok(WireValue::I32(*value)),
        Val::I64(value) => Ok(WireValue::I64(*value)),
        Val::F32(bits) => Ok(WireValue::F32(f32::from_bits(*bits))),
        Val::F64(bits) => Ok(WireValue::F64(f64::from_bits(*bits))),
        other => Err(RuntimeError::Trap(format!(
            "Guest returned an unsupported value {other:?}"
        ))),
    }
}
