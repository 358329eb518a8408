// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Common error type for usage of the guest capability surface.

use super::{GuestPointer, WireKind};
use thiserror::Error;

/// Errors that can occur when accessing a guest module instance.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Attempt to call a function not exported from a module.
    #[error("Function `{_0}` could not be found in the module's exports")]
    FunctionNotFound(String),

    /// Attempt to use an export with a name that's used for something other than expected.
    #[error("Export `{_0}` has an unexpected kind")]
    UnexpectedExportKind(String),

    /// The guest module does not export its linear memory.
    #[error("Failed to locate the guest module's memory")]
    MissingMemory,

    /// The guest module does not export its indirect function table.
    #[error("Failed to locate the guest module's indirect function table")]
    MissingFunctionTable,

    /// Attempt to access memory outside of the guest's linear memory.
    #[error("Attempt to access {length} bytes at {location:?}, which is out of bounds")]
    OutOfBounds {
        /// The first address accessed.
        location: GuestPointer,
        /// The number of bytes accessed.
        length: u32,
    },

    /// The indirect function table has no function at the requested index.
    #[error("Indirect function table entry {_0} is not a function")]
    InvalidTableEntry(u32),

    /// A guest function was called with a signature that does not match its type.
    #[error(
        "Guest function {index} has signature {actual}, but it was called as {expected}"
    )]
    SignatureMismatch {
        /// The index of the function in the indirect function table.
        index: u32,
        /// The signature used to call the function.
        expected: String,
        /// The signature the function actually has.
        actual: String,
    },

    /// An argument did not have the wire kind its parameter requires.
    #[error("Expected a {expected:?} wire value, got {actual:?}")]
    WireKindMismatch {
        /// The wire kind required.
        expected: WireKind,
        /// The wire kind received.
        actual: WireKind,
    },

    /// A guest function returned a different number of results than expected.
    #[error("Expected {expected} result(s) from the guest, got {actual}")]
    ResultCountMismatch {
        /// The number of results expected.
        expected: usize,
        /// The number of results received.
        actual: usize,
    },

    /// A signature descriptor string contains an unknown character.
    #[error("Invalid signature descriptor `{_0}`")]
    InvalidSignature(String),

    /// The requested allocation size does not fit in the guest's address space.
    #[error("Requested allocation size is too large")]
    AllocationTooLarge,

    /// The guest allocator returned a null pointer.
    #[error("Guest memory allocation of {_0} bytes failed")]
    AllocationFailed(u32),

    /// Attempt to release an address that's not currently allocated.
    #[error("Attempt to free {_0:?}, which is not allocated")]
    DeallocateNonAllocated(GuestPointer),

    /// The guest trapped while executing a function.
    #[error("Guest trapped: {_0}")]
    Trap(String),

    /// Wasmtime error.
    #[cfg(with_wasmtime)]
    #[error(transparent)]
    Wasmtime(#[from] anyhow::Error),
}
