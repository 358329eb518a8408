// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tests for registering and calling free functions.

use assert_matches::assert_matches;
use linera_embind::{
    test::{read_std_string, store_std_string, MockGuest},
    EmbindError, FunctionRegistration, GuestPointer, Value, WireKind, WireValue,
};

/// Test calling a function adding two integers.
#[test_log::test]
fn add_integers() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .register_function("add", types.int, &[types.int, types.int], |_, arguments| {
            let sum = arguments[0].as_i32()? + arguments[1].as_i32()?;
            Ok(Some(WireValue::I32(sum)))
        })
        .expect("Failed to register function");

    let result = guest
        .engine
        .call_function(&mut guest.instance, "add", &[Value::I32(2), Value::I32(3)])
        .expect("Failed to call function");

    assert_eq!(result, Value::I32(5));
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "add", &[Value::I64(2), Value::I32(3)]),
        Err(EmbindError::TypeMismatch {
            expected: "i32",
            ..
        })
    );
}

/// Test that a function registered before its types can only be called once they are
/// registered.
#[test_log::test]
fn deferred_registration() {
    let mut guest = MockGuest::default();
    let int = guest.declare_type("int", Some(WireKind::I32));
    guest
        .register_function("negate", int, &[int], |_, arguments| {
            Ok(Some(WireValue::I32(-arguments[0].as_i32()?)))
        })
        .expect("Failed to register function");

    assert_matches!(
        guest.engine.call_function(&mut guest.instance, "negate", &[Value::I32(4)]),
        Err(EmbindError::UnboundTypes { types, .. }) if types == ["int"]
    );

    let name = guest.cstring("int");
    guest
        .engine
        .embind_register_integer(&mut guest.instance, int, name, 4, i32::MIN, i32::MAX as u32)
        .expect("Failed to register int");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "negate", &[Value::I32(4)])
            .expect("Failed to call function"),
        Value::I32(-4)
    );
}

/// Test that functions with the same name and different numbers of parameters are overloads.
#[test_log::test]
fn overloads() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .register_function("pick", types.int, &[types.int], |_, _| {
            Ok(Some(WireValue::I32(1)))
        })
        .expect("Failed to register first overload");
    guest
        .register_function("pick", types.int, &[types.int, types.int], |_, _| {
            Ok(Some(WireValue::I32(2)))
        })
        .expect("Failed to register second overload");

    let call = |guest: &mut MockGuest, arguments: &[Value]| {
        guest
            .engine
            .call_function(&mut guest.instance, "pick", arguments)
    };

    assert_eq!(
        call(&mut guest, &[Value::I32(0)]).expect("Failed to call"),
        Value::I32(1)
    );
    assert_eq!(
        call(&mut guest, &[Value::I32(0), Value::I32(0)]).expect("Failed to call"),
        Value::I32(2)
    );
    assert_matches!(
        call(&mut guest, &[]),
        Err(EmbindError::NoMatchingOverload { actual: 0, expected, .. }) if expected == [1, 2]
    );
    assert_matches!(
        guest.register_function("pick", types.int, &[types.int], |_, _| Ok(None)),
        Err(EmbindError::DuplicatePublicSymbol(_))
    );
}

/// Test that string arguments and results are released once the call completes.
#[test_log::test]
fn strings_are_released() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .register_function("greet", types.string, &[types.string], |instance, arguments| {
            let name = read_std_string(instance, arguments[0].as_pointer()?)?;
            let greeting = store_std_string(instance, &format!("Hello, {name}!"))?;
            Ok(Some(greeting.into()))
        })
        .expect("Failed to register function");

    let result = guest
        .engine
        .call_function(&mut guest.instance, "greet", &[Value::from("Wasm")])
        .expect("Failed to call function");

    assert_eq!(result, Value::from("Hello, Wasm!"));
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test that arguments already converted are released when a later one is rejected.
#[test_log::test]
fn failed_conversion_releases_arguments() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .register_function("concat", types.void, &[types.string, types.int], |_, _| {
            panic!("The guest function must not be called")
        })
        .expect("Failed to register function");

    assert_matches!(
        guest.engine.call_function(
            &mut guest.instance,
            "concat",
            &[Value::from("text"), Value::F64(1.0)]
        ),
        Err(EmbindError::TypeMismatch {
            expected: "i32",
            actual: _
        })
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test that a result is released even when releasing the arguments fails.
#[test_log::test]
fn result_released_when_cleanup_fails() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .register_function("take", types.string, &[types.string], |instance, arguments| {
            instance.free(arguments[0].as_pointer()?)?;
            Ok(Some(store_std_string(instance, "taken")?.into()))
        })
        .expect("Failed to register function");

    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "take", &[Value::from("argument")]),
        Err(EmbindError::Runtime(_))
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test calling a function with the wrong number of arguments.
#[test_log::test]
fn argument_count() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .register_function("noop", types.void, &[types.bool], |_, _| Ok(None))
        .expect("Failed to register function");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "noop", &[Value::Bool(true)])
            .expect("Failed to call function"),
        Value::Undefined
    );
    assert_matches!(
        guest.engine.call_function(&mut guest.instance, "noop", &[]),
        Err(EmbindError::ArgumentCount {
            actual: 0,
            expected: 1,
            ..
        })
    );
}

/// Test that 64-bit integers and floats cross the boundary unchanged.
#[test_log::test]
fn wide_numbers() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let unsigned = guest
        .register_bigint("unsigned long long", false)
        .expect("Failed to register bigint");
    let float = guest
        .register_float("float", 4)
        .expect("Failed to register float");
    guest
        .register_function("twice", unsigned, &[unsigned], |_, arguments| {
            Ok(Some(WireValue::I64(arguments[0].as_i64()?.wrapping_mul(2))))
        })
        .expect("Failed to register function");
    guest
        .register_function("widen", types.double, &[float], |_, arguments| {
            Ok(Some(WireValue::F64(f64::from(arguments[0].as_f32()?))))
        })
        .expect("Failed to register function");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "twice", &[Value::U64(1 << 40)])
            .expect("Failed to call function"),
        Value::U64(1 << 41)
    );
    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "widen", &[Value::F32(0.25)])
            .expect("Failed to call function"),
        Value::F64(0.25)
    );
}

/// Test that asynchronous functions are rejected.
#[test_log::test]
fn reject_async_functions() {
    let mut guest = MockGuest::default();

    assert_matches!(
        guest.engine.embind_register_function(
            &mut guest.instance,
            FunctionRegistration {
                name: GuestPointer::NULL,
                arg_count: 1,
                arg_types: GuestPointer::NULL,
                signature: GuestPointer::NULL,
                invoker: 0,
                function: 0,
                is_async: true,
            },
        ),
        Err(EmbindError::Unsupported(_))
    );
}
