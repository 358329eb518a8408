// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for signature descriptors, wire values and guest pointers.

use super::{GuestFunction, GuestPointer, RuntimeError, Signature, WireKind, WireValue};
use assert_matches::assert_matches;
use test_case::test_case;

/// Test parsing signature descriptors into result and parameter kinds.
#[test_case("v", None, &[]; "void without parameters")]
#[test_case("ii", Some(WireKind::I32), &[WireKind::I32]; "int to int")]
#[test_case("vpi", None, &[WireKind::I32, WireKind::I32]; "pointers are integers")]
#[test_case("djf", Some(WireKind::F64), &[WireKind::I64, WireKind::F32]; "mixed kinds")]
fn parse_signature(descriptor: &str, result: Option<WireKind>, parameters: &[WireKind]) {
    let signature = descriptor
        .parse::<Signature>()
        .expect("Failed to parse signature");

    assert_eq!(signature.result(), result);
    assert_eq!(signature.parameters(), parameters);
}

/// Test that malformed descriptors are rejected.
#[test_case(""; "empty")]
#[test_case("ix"; "unknown character")]
#[test_case("iv"; "void parameter")]
fn reject_invalid_signature(descriptor: &str) {
    assert_matches!(
        descriptor.parse::<Signature>(),
        Err(RuntimeError::InvalidSignature(invalid)) if invalid == descriptor
    );
}

/// Test that signatures are displayed with the canonical descriptor characters.
#[test]
fn display_signature() {
    let signature = "vpid".parse::<Signature>().expect("Failed to parse signature");

    assert_eq!(signature.to_string(), "viid");
}

/// Test checking call arguments against a function's parameters.
#[test]
fn check_arguments() {
    let function = GuestFunction::new(7, "vij".parse().expect("Failed to parse signature"));

    function
        .check_arguments(&[WireValue::I32(1), WireValue::I64(2)])
        .expect("Matching arguments were rejected");
    assert_matches!(
        function.check_arguments(&[WireValue::I32(1)]),
        Err(RuntimeError::SignatureMismatch { index: 7, .. })
    );
    assert_matches!(
        function.check_arguments(&[WireValue::I32(1), WireValue::F64(2.0)]),
        Err(RuntimeError::SignatureMismatch { index: 7, .. })
    );
}

/// Test extracting the single result of a call.
#[test]
fn single_result() {
    let returning = GuestFunction::new(1, "ii".parse().expect("Failed to parse signature"));
    let void = GuestFunction::new(2, "vi".parse().expect("Failed to parse signature"));

    assert_eq!(
        returning
            .single_result(vec![WireValue::I32(3)])
            .expect("Failed to extract result"),
        Some(WireValue::I32(3))
    );
    assert_eq!(void.single_result(vec![]).expect("Failed to extract result"), None);
    assert_matches!(
        returning.single_result(vec![]),
        Err(RuntimeError::ResultCountMismatch {
            expected: 1,
            actual: 0
        })
    );
}

/// Test the accessors of wire values.
#[test]
fn wire_value_accessors() {
    assert_eq!(WireValue::I32(-1).as_u32().expect("Not an i32"), u32::MAX);
    assert_eq!(
        WireValue::I32(0x40).as_pointer().expect("Not a pointer"),
        GuestPointer(0x40)
    );
    assert_eq!(WireValue::F32(1.5).to_f64(), 1.5);
    assert_eq!(WireValue::zero(WireKind::I64), WireValue::I64(0));
    assert_matches!(
        WireValue::F64(1.0).as_i32(),
        Err(RuntimeError::WireKindMismatch {
            expected: WireKind::I32,
            actual: WireKind::F64
        })
    );
}

/// Test guest pointer arithmetic.
#[test]
fn guest_pointer_arithmetic() {
    let base = GuestPointer(0x100);

    assert_eq!(base.offset(4), GuestPointer(0x104));
    assert_eq!(base.index(3, 8), GuestPointer(0x118));
    assert!(GuestPointer::NULL.is_null());
    assert!(!base.is_null());
    assert_eq!(WireValue::from(base), WireValue::I32(0x100));
}
