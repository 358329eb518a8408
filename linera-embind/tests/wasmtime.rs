// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tests for running a guest module with Wasmtime.

#![cfg(with_wasmtime)]

use assert_matches::assert_matches;
use linera_embind::{
    wasmtime::{add_to_linker, EntrypointInstance},
    EmbindError, Engine, EngineConfig, Instance, RuntimeError, Value,
};
use wasmtime::{Linker, Module, Store};

/// A guest exporting an `add` function over `int`, with separate exports to register each.
const GUEST: &str = r#"
(module
  (import "env" "_embind_register_integer"
    (func $register_integer (param i32 i32 i32 i32 i32)))
  (import "env" "_embind_register_function"
    (func $register_function (param i32 i32 i32 i32 i32 i32 i32)))

  (memory (export "memory") 1)
  (table (export "__indirect_function_table") 2 funcref)
  (elem (i32.const 1) $add_invoker)

  (data (i32.const 16) "int\00")
  (data (i32.const 32) "add\00")
  (data (i32.const 48) "iiii\00")
  (data (i32.const 64) "\01\00\00\00\01\00\00\00\01\00\00\00")

  (func $add_invoker (param $target i32) (param $left i32) (param $right i32) (result i32)
    (i32.add (local.get $left) (local.get $right)))

  (func (export "register_int")
    (call $register_integer
      (i32.const 1) (i32.const 16) (i32.const 4)
      (i32.const -2147483648) (i32.const 2147483647)))

  (func (export "register_add")
    (call $register_function
      (i32.const 32) (i32.const 3) (i32.const 64) (i32.const 48)
      (i32.const 1) (i32.const 1) (i32.const 0)))
)
"#;

fn instantiate() -> EntrypointInstance<Engine> {
    let wasm_engine = wasmtime::Engine::default();
    let module = Module::new(&wasm_engine, GUEST).expect("Failed to compile guest module");
    let mut linker = Linker::new(&wasm_engine);
    add_to_linker(&mut linker, &EngineConfig::default()).expect("Failed to link entry points");
    let mut store = Store::new(&wasm_engine, Engine::default());
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("Failed to instantiate guest module");
    EntrypointInstance::new(instance, store)
}

/// Test registering a function through the linked entry points and calling it.
#[test_log::test]
fn call_registered_function() {
    let mut guest = instantiate();
    let engine = guest.engine().clone();

    guest
        .call_export("register_add", &[])
        .expect("Failed to register function");
    assert_matches!(
        engine.call_function(&mut guest, "add", &[Value::I32(1), Value::I32(2)]),
        Err(EmbindError::UnboundTypes { .. })
    );

    guest
        .call_export("register_int", &[])
        .expect("Failed to register int");

    assert_eq!(
        engine
            .call_function(&mut guest, "add", &[Value::I32(40), Value::I32(2)])
            .expect("Failed to call function"),
        Value::I32(42)
    );
    assert_matches!(
        engine.call_function(&mut guest, "add", &[Value::I64(40), Value::I32(2)]),
        Err(EmbindError::TypeMismatch { .. })
    );
}

/// Test that a failed registration traps the guest call that issued it.
#[test_log::test]
fn failed_registration_traps() {
    let mut guest = instantiate();

    guest
        .call_export("register_int", &[])
        .expect("Failed to register int");

    assert_matches!(
        guest.call_export("register_int", &[]),
        Err(RuntimeError::Wasmtime(_))
    );
}
