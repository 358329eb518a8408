// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the `std::string` and `std::wstring` converters.

use super::{Destructor, RawTypeId, RegisteredType, StdStringType, StdWStringType};
use crate::{
    runtime::{GuestPointer, Instance, MockInstance},
    EmbindError, Engine, Value,
};
use assert_matches::assert_matches;

/// Allocates a length-prefixed buffer in the mock guest, as the guest does for returned strings.
fn allocate_prefixed(instance: &mut MockInstance, length: u32, units: &[u8]) -> GuestPointer {
    let pointer = instance
        .malloc(4 + units.len() as u32 + 4)
        .expect("Failed to allocate string");
    let mut bytes = length.to_le_bytes().to_vec();
    bytes.extend_from_slice(units);
    bytes.extend_from_slice(&[0; 4]);
    instance
        .write_memory(pointer, &bytes)
        .expect("Failed to write string");
    pointer
}

/// Test that strings received from the guest are decoded and their allocation released.
#[test]
fn decode_std_string() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let string = StdStringType::new(RawTypeId(1), "std::string".to_owned());
    let pointer = allocate_prefixed(&mut instance, 5, "héllo".as_bytes());

    let value = string
        .from_wire(&engine, &mut instance, pointer.into())
        .expect("Failed to decode string");

    assert_eq!(value, Value::String("héll".to_owned()));
    assert!(!instance.is_allocated(pointer));
}

/// Test that strings sent to the guest are released by the call's destructors.
#[test]
fn encode_std_string() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let string = StdStringType::new(RawTypeId(1), "std::string".to_owned());
    let mut destructors = Vec::new();

    let wire = string
        .to_wire(
            &engine,
            &mut instance,
            Some(&mut destructors),
            &Value::String("abc".to_owned()),
        )
        .expect("Failed to encode string");
    let pointer = wire.as_pointer().expect("String is not a pointer");

    assert_eq!(instance.read_u32(pointer).expect("Failed to read"), 3);
    assert_eq!(
        instance
            .read_memory(pointer.offset(4), 4)
            .expect("Failed to read"),
        b"abc\0"
    );
    assert_eq!(destructors, vec![Destructor::Free(pointer)]);
    assert_eq!(string.destructor(wire), Some(Destructor::Free(pointer)));

    super::run_destructors(&engine, &mut instance, destructors)
        .expect("Failed to run destructors");
    assert_eq!(instance.live_allocations(), 0);
}

/// Test that byte strings exchange raw bytes and only accept single-byte characters.
#[test]
fn byte_strings() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let bytes = StdStringType::new(RawTypeId(1), "std::basic_string<unsigned char>".to_owned());
    let pointer = allocate_prefixed(&mut instance, 3, &[0, 0xff, 7]);

    assert_eq!(bytes.host_type(), "Vec<u8>");
    assert_eq!(
        bytes
            .from_wire(&engine, &mut instance, pointer.into())
            .expect("Failed to decode"),
        Value::Bytes(vec![0, 0xff, 7])
    );
    bytes
        .to_wire(&engine, &mut instance, None, &Value::String("ÿ".to_owned()))
        .expect("Latin-1 text was rejected");
    assert_matches!(
        bytes.to_wire(&engine, &mut instance, None, &Value::String("€".to_owned())),
        Err(EmbindError::Unsupported(_))
    );
    assert_matches!(
        bytes.to_wire(&engine, &mut instance, None, &Value::I32(1)),
        Err(EmbindError::TypeMismatch { .. })
    );
}

/// Test UTF-16 wide strings, including characters outside the basic plane.
#[test]
fn utf16_strings() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let wide = StdWStringType::new(RawTypeId(1), "std::u16string".to_owned(), 2)
        .expect("Failed to create wide string type");
    let text = "a😀";

    let wire = wide
        .to_wire(&engine, &mut instance, None, &Value::String(text.to_owned()))
        .expect("Failed to encode");
    let pointer = wire.as_pointer().expect("String is not a pointer");

    assert_eq!(instance.read_u32(pointer).expect("Failed to read"), 3);
    assert_eq!(
        wide.from_wire(&engine, &mut instance, wire)
            .expect("Failed to decode"),
        Value::String(text.to_owned())
    );
    assert!(!instance.is_allocated(pointer));
}

/// Test UTF-32 wide strings received from the guest.
#[test]
fn utf32_strings() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let wide = StdWStringType::new(RawTypeId(1), "std::wstring".to_owned(), 4)
        .expect("Failed to create wide string type");
    let units = ['h', 'é']
        .iter()
        .flat_map(|character| u32::from(*character).to_le_bytes())
        .collect::<Vec<_>>();
    let pointer = allocate_prefixed(&mut instance, 2, &units);

    assert_eq!(
        wide.from_wire(&engine, &mut instance, pointer.into())
            .expect("Failed to decode"),
        Value::String("hé".to_owned())
    );
}

/// Test that wide strings only support two and four byte code units.
#[test]
fn reject_unsupported_character_sizes() {
    assert_matches!(
        StdWStringType::new(RawTypeId(1), "std::u8string".to_owned(), 1),
        Err(EmbindError::Unsupported(_))
    );
}
