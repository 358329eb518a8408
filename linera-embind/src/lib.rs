// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Linera Embind
//!
//! This crate implements the host side of [Embind], the binding protocol of Emscripten. A
//! WebAssembly guest compiled with Emscripten describes its functions, types and classes by
//! calling registration entry points while it initializes. The [`Engine`] records them and lets
//! the host call guest functions, construct guest objects and exchange values with the guest.
//!
//! The guest is reached through the [`Instance`] capability trait, implemented for Wasmtime
//! behind the `wasmtime` feature and by a mock instance behind the `test` feature.
//!
//! [Embind]: https://emscripten.org/docs/porting/connecting_cpp_and_javascript/embind.html

#![deny(missing_docs)]

mod class;
mod config;
mod emval;
mod engine;
mod error;
mod invoker;
mod registry;
mod runtime;
mod symbol;
mod types;
mod value;

#[cfg(with_wasmtime)]
pub use self::runtime::wasmtime;
#[cfg(with_testing)]
pub use self::runtime::{MockFunction, MockInstance};
pub use self::{
    class::{ClassBinding, ClassHandle, ClassInstance},
    config::EngineConfig,
    emval::{HostCallback, HostFunction, HostMethod, HostObject, RESERVED_HANDLES},
    engine::{
        ClassFunctionRegistration, ClassInfo, ClassPropertyRegistration, ClassRegistration,
        ConstantValue, ConstructorRegistration, DelayFunction, Engine, EnumInfo, FieldAccessors,
        FunctionRegistration, MethodRegistration, OverloadInfo, PendingDeletes, PropertyInfo,
        PropertyRegistration, SmartPointerRegistration, SymbolInfo,
    },
    error::EmbindError,
    runtime::{
        GuestFunction, GuestPointer, Instance, RuntimeError, Signature, WireKind, WireValue,
    },
    types::RawTypeId,
    value::{EnumValue, MemoryView, MemoryViewKind, Value},
};
