// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the `void`, `bool`, integer and float converters.

use super::{BigIntType, BoolType, FloatType, IntegerType, RawTypeId, RegisteredType, VoidType};
use crate::{
    runtime::{GuestPointer, MockInstance, WireKind, WireValue},
    EmbindError, Engine, Value,
};
use assert_matches::assert_matches;
use test_case::test_case;

/// Test decoding integer wire words according to the registered size and signedness.
#[test_case(1, -128, -1, Value::I8(-1); "signed byte")]
#[test_case(1, 0, -1, Value::U8(255); "unsigned byte")]
#[test_case(2, -32768, 0x1_8000, Value::I16(i16::MIN); "signed short truncates")]
#[test_case(2, 0, -1, Value::U16(u16::MAX); "unsigned short")]
#[test_case(4, i64::from(i32::MIN), -7, Value::I32(-7); "signed int")]
#[test_case(4, 0, -1, Value::U32(u32::MAX); "unsigned int")]
fn decode_integers(size: u32, min_range: i64, wire: i32, expected: Value) {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let integer = IntegerType::new(RawTypeId(1), "int".to_owned(), size, min_range)
        .expect("Failed to create integer type");

    let value = integer
        .from_wire(&engine, &mut instance, WireValue::I32(wire))
        .expect("Failed to decode integer");

    assert_eq!(value, expected);
}

/// Test that integers only accept host values of their exact representation.
#[test]
fn encode_integers_strictly() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let unsigned = IntegerType::new(RawTypeId(1), "unsigned int".to_owned(), 4, 0)
        .expect("Failed to create integer type");

    assert_eq!(
        unsigned
            .to_wire(&engine, &mut instance, None, &Value::U32(u32::MAX))
            .expect("Failed to encode integer"),
        WireValue::I32(-1)
    );
    assert_matches!(
        unsigned.to_wire(&engine, &mut instance, None, &Value::I32(1)),
        Err(EmbindError::TypeMismatch {
            expected: "u32",
            ..
        })
    );
    assert_matches!(
        unsigned.to_wire(&engine, &mut instance, None, &Value::F64(1.0)),
        Err(EmbindError::TypeMismatch { .. })
    );
}

/// Test that integer sizes other than one, two and four bytes are rejected.
#[test]
fn reject_wide_integers() {
    assert_matches!(
        IntegerType::new(RawTypeId(1), "long long".to_owned(), 8, -1),
        Err(EmbindError::Unsupported(_))
    );
}

/// Test reading integers stored in guest memory with their own width.
#[test]
fn read_integers_from_memory() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let location = instance.store_static(&[0xff, 0xfe, 0x01, 0x02]);
    let byte = IntegerType::new(RawTypeId(1), "signed char".to_owned(), 1, -128)
        .expect("Failed to create integer type");
    let short = IntegerType::new(RawTypeId(2), "unsigned short".to_owned(), 2, 0)
        .expect("Failed to create integer type");

    assert_eq!(
        byte.read_from_pointer(&engine, &mut instance, location)
            .expect("Failed to read byte"),
        Value::I8(-1)
    );
    assert_eq!(
        short
            .read_from_pointer(&engine, &mut instance, location.offset(2))
            .expect("Failed to read short"),
        Value::U16(0x0201)
    );
}

/// Test the conversions of 64-bit integers.
#[test]
fn bigints() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let signed = BigIntType::new(RawTypeId(1), "long long".to_owned(), i64::MIN);
    let unsigned = BigIntType::new(RawTypeId(2), "unsigned long long".to_owned(), 0);

    assert_eq!(signed.native_kind(), Some(WireKind::I64));
    assert_eq!(
        unsigned
            .from_wire(&engine, &mut instance, WireValue::I64(-1))
            .expect("Failed to decode"),
        Value::U64(u64::MAX)
    );
    assert_eq!(
        signed
            .to_wire(&engine, &mut instance, None, &Value::I64(-5))
            .expect("Failed to encode"),
        WireValue::I64(-5)
    );
    assert_matches!(
        signed.to_wire(&engine, &mut instance, None, &Value::U64(5)),
        Err(EmbindError::TypeMismatch { .. })
    );
    assert_eq!(unsigned.wire_to_f64(WireValue::I64(-1)), u64::MAX as f64);

    let location = instance.store_static(&(-2_i64).to_le_bytes());
    assert_eq!(
        signed
            .read_from_pointer(&engine, &mut instance, location)
            .expect("Failed to read"),
        Value::I64(-2)
    );
}

/// Test the conversions of `float` and `double`.
#[test]
fn floats() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let float = FloatType::new(RawTypeId(1), "float".to_owned(), 4).expect("Invalid float");
    let double = FloatType::new(RawTypeId(2), "double".to_owned(), 8).expect("Invalid double");

    assert_eq!(float.native_kind(), Some(WireKind::F32));
    assert_eq!(
        double
            .from_wire(&engine, &mut instance, WireValue::F64(2.5))
            .expect("Failed to decode"),
        Value::F64(2.5)
    );
    assert_eq!(
        float
            .to_wire(&engine, &mut instance, None, &Value::F32(0.5))
            .expect("Failed to encode"),
        WireValue::F32(0.5)
    );
    assert_matches!(
        double.to_wire(&engine, &mut instance, None, &Value::I32(1)),
        Err(EmbindError::TypeMismatch { .. })
    );
    assert_matches!(
        FloatType::new(RawTypeId(3), "long double".to_owned(), 16),
        Err(EmbindError::Unsupported(_))
    );

    let location = instance.store_static(&1.25_f64.to_le_bytes());
    assert_eq!(
        double
            .read_from_pointer(&engine, &mut instance, location)
            .expect("Failed to read"),
        Value::F64(1.25)
    );
}

/// Test that booleans use the registered wire words and accept any truthy value.
#[test]
fn booleans() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let boolean = BoolType::new(RawTypeId(1), "bool".to_owned(), 1, 0);

    assert_eq!(
        boolean
            .to_wire(&engine, &mut instance, None, &Value::Bool(true))
            .expect("Failed to encode"),
        WireValue::I32(1)
    );
    assert_eq!(
        boolean
            .to_wire(&engine, &mut instance, None, &Value::I32(0))
            .expect("Failed to encode"),
        WireValue::I32(0)
    );
    assert_eq!(
        boolean
            .from_wire(&engine, &mut instance, WireValue::I32(7))
            .expect("Failed to decode"),
        Value::Bool(true)
    );

    let location = instance.store_static(&[0]);
    assert_eq!(
        boolean
            .read_from_pointer(&engine, &mut instance, location)
            .expect("Failed to read"),
        Value::Bool(false)
    );
}

/// Test that `void` occupies no space and only accepts `undefined`.
#[test]
fn void() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let void = VoidType::new(RawTypeId(1), "void".to_owned());

    assert_eq!(void.native_kind(), None);
    assert_eq!(void.arg_pack_advance(), 0);
    assert_eq!(
        void.from_wire(&engine, &mut instance, WireValue::I32(3))
            .expect("Failed to decode"),
        Value::Undefined
    );
    assert_matches!(
        void.to_wire(&engine, &mut instance, None, &Value::Null),
        Err(EmbindError::TypeMismatch { .. })
    );
}

/// Test converting the float64 used to transport constants into wire words.
#[test]
fn constants_from_f64() {
    let integer =
        IntegerType::new(RawTypeId(1), "int".to_owned(), 4, -1).expect("Invalid integer");
    let unsigned = BigIntType::new(RawTypeId(2), "unsigned long long".to_owned(), 0);
    let float = FloatType::new(RawTypeId(3), "float".to_owned(), 4).expect("Invalid float");

    assert_eq!(integer.wire_from_f64(-3.0), WireValue::I32(-3));
    assert_eq!(unsigned.wire_from_f64(4.0), WireValue::I64(4));
    assert_eq!(float.wire_from_f64(0.5), WireValue::F32(0.5));
}

/// Test that reads through the mock instance report bounds errors.
#[test]
fn read_out_of_bounds() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let double = FloatType::new(RawTypeId(1), "double".to_owned(), 8).expect("Invalid double");
    let end = GuestPointer(u32::MAX - 4);

    assert_matches!(
        double.read_from_pointer(&engine, &mut instance, end),
        Err(EmbindError::Runtime(_))
    );
}
