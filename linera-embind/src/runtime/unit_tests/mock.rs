// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the mock guest instance and the provided [`Instance`] helpers.

use super::{GuestFunction, GuestPointer, Instance, MockInstance, RuntimeError, WireValue};
use assert_matches::assert_matches;

/// Test reading NUL-terminated strings, including one longer than a read chunk.
#[test]
fn read_cstrings() {
    let mut instance = MockInstance::default();
    let short = instance.store_cstring("int");
    let long_text = "x".repeat(200);
    let long = instance.store_cstring(&long_text);

    assert_eq!(instance.read_cstring(short).expect("Failed to read"), b"int");
    assert_eq!(
        instance.read_cstring(long).expect("Failed to read"),
        long_text.as_bytes()
    );
}

/// Test the little-endian integer helpers.
#[test]
fn read_and_write_integers() {
    let mut instance = MockInstance::default();
    let words = instance.store_u32_array(&[1, 0xdead_beef]);

    assert_eq!(instance.read_u32(words).expect("Failed to read"), 1);
    assert_eq!(
        instance.read_pointer(words.offset(4)).expect("Failed to read"),
        GuestPointer(0xdead_beef)
    );

    instance
        .write_u32(words, 0x0102_0304)
        .expect("Failed to write");
    assert_eq!(instance.read_u8(words).expect("Failed to read"), 4);
    assert_eq!(instance.read_u16(words).expect("Failed to read"), 0x0304);
}

/// Test that the allocator tracks live allocations and rejects double frees.
#[test]
fn heap_allocations() {
    let mut instance = MockInstance::default();

    let results = instance
        .call_export("malloc", &[WireValue::I32(16)])
        .expect("Failed to allocate");
    let pointer = results[0].as_pointer().expect("Allocation is not a pointer");

    assert!(instance.is_allocated(pointer));
    assert_eq!(instance.live_allocations(), 1);

    instance
        .call_export("free", &[pointer.into()])
        .expect("Failed to free");

    assert!(!instance.is_allocated(pointer));
    assert_matches!(
        instance.call_export("free", &[pointer.into()]),
        Err(RuntimeError::DeallocateNonAllocated(freed)) if freed == pointer
    );
}

/// Test that memory accesses past the end are rejected.
#[test]
fn out_of_bounds_access() {
    let mut instance = MockInstance::default();

    assert_matches!(
        instance.read_memory(GuestPointer(u32::MAX - 2), 4),
        Err(RuntimeError::OutOfBounds { length: 4, .. })
    );
}

/// Test that `__getTypeName` returns a fresh allocation holding the name.
#[test]
fn type_names() {
    let mut instance = MockInstance::default();
    instance.set_type_name(7, "Point");

    let results = instance
        .call_export("__getTypeName", &[WireValue::I32(7)])
        .expect("Failed to get type name");
    let name = results[0].as_pointer().expect("Name is not a pointer");

    assert_eq!(instance.read_cstring(name).expect("Failed to read"), b"Point");
    assert!(instance.is_allocated(name));
}

/// Test calling functions through the indirect function table.
#[test]
fn indirect_calls() {
    let mut instance = MockInstance::default();
    let index = instance.add_function("iii".parse().expect("Invalid signature"), |_, arguments| {
        let sum = arguments[0].as_i32()? + arguments[1].as_i32()?;
        Ok(vec![WireValue::I32(sum)])
    });

    let add = GuestFunction::new(index, "iii".parse().expect("Invalid signature"));
    assert_eq!(
        instance
            .call_indirect(&add, &[WireValue::I32(2), WireValue::I32(3)])
            .expect("Failed to call"),
        vec![WireValue::I32(5)]
    );

    let mistyped = GuestFunction::new(index, "vii".parse().expect("Invalid signature"));
    assert_matches!(
        instance.call_indirect(&mistyped, &[WireValue::I32(2), WireValue::I32(3)]),
        Err(RuntimeError::SignatureMismatch { .. })
    );

    let missing = GuestFunction::new(index + 1, "v".parse().expect("Invalid signature"));
    assert_matches!(
        instance.call_indirect(&missing, &[]),
        Err(RuntimeError::InvalidTableEntry(_))
    );
}

/// Test that custom exports take precedence over the built-in ones.
#[test]
fn custom_exports() {
    let mut instance = MockInstance::default();
    instance.add_export("malloc", |_, _| Ok(vec![WireValue::I32(0)]));

    assert_eq!(
        instance
            .call_export("malloc", &[WireValue::I32(8)])
            .expect("Failed to call export"),
        vec![WireValue::I32(0)]
    );
    assert_matches!(
        instance.call_export("missing", &[]),
        Err(RuntimeError::FunctionNotFound(name)) if name == "missing"
    );
}
