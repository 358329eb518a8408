// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Code to interface with the guest module instance.

mod error;
mod memory;
#[cfg(with_testing)]
mod test;
mod traits;
#[cfg(with_wasmtime)]
pub mod wasmtime;
mod wire;

#[cfg(with_testing)]
pub use self::test::{MockFunction, MockInstance};
pub use self::{
    error::RuntimeError,
    memory::GuestPointer,
    traits::Instance,
    wire::{GuestFunction, Signature, WireKind, WireValue},
};

#[cfg(test)]
#[path = "unit_tests/wire.rs"]
mod wire_tests;

#[cfg(test)]
#[path = "unit_tests/mock.rs"]
mod mock_tests;
