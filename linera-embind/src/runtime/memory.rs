// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Addresses inside the guest WebAssembly module's linear memory.

use super::WireValue;
use std::fmt;

/// An address for a location in a guest WebAssembly module's memory.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GuestPointer(pub u32);

impl GuestPointer {
    /// The null address.
    pub const NULL: GuestPointer = GuestPointer(0);

    /// Returns `true` if this is the null address.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns a new address that's `bytes` after the current address.
    pub fn offset(&self, bytes: u32) -> Self {
        GuestPointer(self.0.wrapping_add(bytes))
    }

    /// Returns the address of the element at `index` in a contiguous list of `element_size`
    /// sized elements starting at this address.
    pub fn index(&self, index: u32, element_size: u32) -> Self {
        self.offset(index.wrapping_mul(element_size))
    }

    /// Returns the raw address.
    pub fn address(&self) -> u32 {
        self.0
    }
}

impl From<u32> for GuestPointer {
    fn from(address: u32) -> Self {
        GuestPointer(address)
    }
}

impl From<i32> for GuestPointer {
    fn from(address: i32) -> Self {
        GuestPointer(address as u32)
    }
}

impl From<GuestPointer> for WireValue {
    fn from(pointer: GuestPointer) -> Self {
        WireValue::I32(pointer.0 as i32)
    }
}

impl fmt::Display for GuestPointer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:#x}", self.0)
    }
}
