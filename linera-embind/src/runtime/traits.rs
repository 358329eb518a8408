// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The capabilities of a guest module instance that the binding engine relies on.

use super::{GuestFunction, GuestPointer, RuntimeError, WireValue};

/// Maximum number of bytes to scan for the terminator of a guest string.
const MAX_STRING_LENGTH: u32 = 1 << 20;

/// Number of bytes read at once while scanning for a string terminator.
const STRING_CHUNK_SIZE: u32 = 64;

/// An instance of a guest WebAssembly module.
///
/// All guest interaction is synchronous: a call blocks until the guest function returns.
pub trait Instance {
    /// Reads `length` bytes from memory from the provided `location`.
    fn read_memory(&mut self, location: GuestPointer, length: u32) -> Result<Vec<u8>, RuntimeError>;

    /// Writes the `bytes` to memory at the provided `location`.
    fn write_memory(&mut self, location: GuestPointer, bytes: &[u8]) -> Result<(), RuntimeError>;

    /// Calls the function exported by the module with the `name`.
    fn call_export(
        &mut self,
        name: &str,
        arguments: &[WireValue],
    ) -> Result<Vec<WireValue>, RuntimeError>;

    /// Calls the `function` stored in the module's indirect function table.
    fn call_indirect(
        &mut self,
        function: &GuestFunction,
        arguments: &[WireValue],
    ) -> Result<Vec<WireValue>, RuntimeError>;

    /// Reads a NUL-terminated string starting at `location`.
    fn read_cstring(&mut self, location: GuestPointer) -> Result<Vec<u8>, RuntimeError> {
        let mut bytes = Vec::new();
        let mut cursor = location;

        while (bytes.len() as u32) < MAX_STRING_LENGTH {
            let chunk = match self.read_memory(cursor, STRING_CHUNK_SIZE) {
                Ok(chunk) => chunk,
                Err(RuntimeError::OutOfBounds { .. }) => vec![self.read_u8(cursor)?],
                Err(error) => return Err(error),
            };

            if let Some(end) = chunk.iter().position(|byte| *byte == 0) {
                bytes.extend_from_slice(&chunk[..end]);
                return Ok(bytes);
            }

            cursor = cursor.offset(chunk.len() as u32);
            bytes.extend(chunk);
        }

        Err(RuntimeError::OutOfBounds {
            location,
            length: MAX_STRING_LENGTH,
        })
    }

    /// Reads an unsigned byte.
    fn read_u8(&mut self, location: GuestPointer) -> Result<u8, RuntimeError> {
        read_array::<1>(self, location).map(u8::from_le_bytes)
    }

    /// Reads a little-endian unsigned 16-bit integer.
    fn read_u16(&mut self, location: GuestPointer) -> Result<u16, RuntimeError> {
        read_array(self, location).map(u16::from_le_bytes)
    }

    /// Reads a little-endian unsigned 32-bit integer.
    fn read_u32(&mut self, location: GuestPointer) -> Result<u32, RuntimeError> {
        read_array(self, location).map(u32::from_le_bytes)
    }

    /// Reads a little-endian unsigned 64-bit integer.
    fn read_u64(&mut self, location: GuestPointer) -> Result<u64, RuntimeError> {
        read_array(self, location).map(u64::from_le_bytes)
    }

    /// Reads a little-endian 32-bit float.
    fn read_f32(&mut self, location: GuestPointer) -> Result<f32, RuntimeError> {
        read_array(self, location).map(f32::from_le_bytes)
    }

    /// Reads a little-endian 64-bit float.
    fn read_f64(&mut self, location: GuestPointer) -> Result<f64, RuntimeError> {
        read_array(self, location).map(f64::from_le_bytes)
    }

    /// Reads a guest address stored at `location`.
    fn read_pointer(&mut self, location: GuestPointer) -> Result<GuestPointer, RuntimeError> {
        self.read_u32(location).map(GuestPointer)
    }

    /// Writes a little-endian unsigned 32-bit integer.
    fn write_u32(&mut self, location: GuestPointer, value: u32) -> Result<(), RuntimeError> {
        self.write_memory(location, &value.to_le_bytes())
    }
}

fn read_array<const N: usize>(
    instance: &mut (impl Instance + ?Sized),
    location: GuestPointer,
) -> Result<[u8; N], RuntimeError> {
    let bytes = instance.read_memory(location, N as u32)?;
    bytes
        .try_into()
        .map_err(|_| RuntimeError::OutOfBounds {
            location,
            length: N as u32,
        })
}
