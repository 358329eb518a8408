// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Converters for `std::string` and `std::wstring` family types.
//!
//! Both are passed as a pointer to a guest allocation holding a `u32` length followed by the
//! code units and a terminating NUL unit. Allocations received from the guest are released once
//! decoded, and allocations made for the guest are released by the call's destructors.

use super::{mismatch, Destructor, DestructorPolicy, Destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{Instance, RuntimeError, WireValue},
    Engine, EmbindError, Value,
};

/// The size of the length prefix of string allocations.
const LENGTH_PREFIX: u32 = 4;

/// Allocates a length-prefixed, NUL-terminated buffer in the guest holding `units`.
fn store_prefixed(
    engine: &Engine,
    instance: &mut dyn Instance,
    destructors: Destructors<'_>,
    length: u32,
    units: &[u8],
    unit_size: u32,
) -> Result<WireValue, EmbindError> {
    let total = LENGTH_PREFIX
        .checked_add(units.len() as u32)
        .and_then(|total| total.checked_add(unit_size))
        .ok_or(RuntimeError::AllocationTooLarge)?;
    let pointer = engine.malloc(instance, total)?;
    let mut buffer = Vec::with_capacity(total as usize);
    buffer.extend_from_slice(&length.to_le_bytes());
    buffer.extend_from_slice(units);
    buffer.resize(total as usize, 0);
    instance.write_memory(pointer, &buffer)?;
    if let Some(destructors) = destructors {
        destructors.push(Destructor::Free(pointer));
    }
    Ok(pointer.into())
}

/// The narrow string types.
///
/// Only the type named `std::string` holds UTF-8 text; other narrow string types are
/// exchanged as raw bytes.
pub(crate) struct StdStringType {
    raw_type: RawTypeId,
    name: String,
    utf8: bool,
}

impl StdStringType {
    pub(crate) fn new(raw_type: RawTypeId, name: String) -> Self {
        let utf8 = name == "std::string";
        StdStringType {
            raw_type,
            name,
            utf8,
        }
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, EmbindError> {
        match value {
            Value::String(text) if self.utf8 => Ok(text.as_bytes().to_vec()),
            Value::String(text) => text
                .chars()
                .map(|character| {
                    u8::try_from(u32::from(character)).map_err(|_| {
                        EmbindError::Unsupported(format!(
                            "character {character:?} in a byte string"
                        ))
                    })
                })
                .collect(),
            Value::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl RegisteredType for StdStringType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        if self.utf8 {
            "String"
        } else {
            "Vec<u8>"
        }
    }

    fn destructor_policy(&self) -> DestructorPolicy {
        DestructorPolicy::Function
    }

    fn destructor(&self, wire: WireValue) -> Option<Destructor> {
        wire.as_pointer().ok().map(Destructor::Free)
    }

    fn from_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let pointer = wire.as_pointer()?;
        let length = instance.read_u32(pointer)?;
        let bytes = instance.read_memory(pointer.offset(LENGTH_PREFIX), length)?;
        engine.free(instance, pointer)?;
        Ok(if self.utf8 {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Value::Bytes(bytes)
        })
    }

    fn to_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        let bytes = self.encode(value)?;
        store_prefixed(engine, instance, destructors, bytes.len() as u32, &bytes, 1)
    }
}

/// The wide string types, with 2-byte (UTF-16) or 4-byte (UTF-32) code units.
#[derive(Debug)]
pub(crate) struct StdWStringType {
    raw_type: RawTypeId,
    name: String,
    char_size: u32,
}

impl StdWStringType {
    pub(crate) fn new(raw_type: RawTypeId, name: String, char_size: u32) -> Result<Self, EmbindError> {
        if !matches!(char_size, 2 | 4) {
            return Err(EmbindError::Unsupported(format!(
                "wide string type {name} with character size {char_size}"
            )));
        }
        Ok(StdWStringType {
            raw_type,
            name,
            char_size,
        })
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if self.char_size == 2 {
            let units = bytes
                .chunks_exact(2)
                .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
                .take_while(|unit| *unit != 0);
            char::decode_utf16(units)
                .map(|character| character.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        } else {
            bytes
                .chunks_exact(4)
                .map(|unit| u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]))
                .take_while(|unit| *unit != 0)
                .map(|unit| char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
    }

    fn encode(&self, text: &str) -> (u32, Vec<u8>) {
        if self.char_size == 2 {
            let units = text.encode_utf16().collect::<Vec<_>>();
            let bytes = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
            (units.len() as u32, bytes)
        } else {
            let bytes = text
                .chars()
                .flat_map(|character| u32::from(character).to_le_bytes())
                .collect();
            (text.chars().count() as u32, bytes)
        }
    }
}

impl RegisteredType for StdWStringType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "String"
    }

    fn destructor_policy(&self) -> DestructorPolicy {
        DestructorPolicy::Function
    }

    fn destructor(&self, wire: WireValue) -> Option<Destructor> {
        wire.as_pointer().ok().map(Destructor::Free)
    }

    fn from_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let pointer = wire.as_pointer()?;
        let length = instance.read_u32(pointer)?;
        let byte_length = length
            .checked_mul(self.char_size)
            .ok_or_else(|| EmbindError::Decode(format!("wide string of {length} units")))?;
        let bytes = instance.read_memory(pointer.offset(LENGTH_PREFIX), byte_length)?;
        engine.free(instance, pointer)?;
        Ok(Value::String(self.decode(&bytes)))
    }

    fn to_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        let Value::String(text) = value else {
            return Err(mismatch("String", value));
        };
        let (length, bytes) = self.encode(text);
        store_prefixed(engine, instance, destructors, length, &bytes, self.char_size)
    }
}
