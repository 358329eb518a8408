// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the engine's helpers to reach into the guest.

use super::Engine;
use crate::{
    runtime::{GuestPointer, MockInstance, RuntimeError, WireKind, WireValue},
    EmbindError, EngineConfig,
};
use assert_matches::assert_matches;

/// Test that allocations go through the configured exports.
#[test]
fn configured_allocator() {
    let engine = Engine::new(EngineConfig {
        malloc_export: "custom_malloc".to_owned(),
        free_export: "custom_free".to_owned(),
        ..EngineConfig::default()
    });
    let mut instance = MockInstance::default();
    instance.add_export("custom_malloc", |_, _| Ok(vec![WireValue::I32(0x40)]));
    instance.add_export("custom_free", |_, arguments| {
        assert_eq!(arguments, [WireValue::I32(0x40)]);
        Ok(vec![])
    });

    let pointer = engine
        .malloc(&mut instance, 16)
        .expect("Failed to allocate");
    assert_eq!(pointer, GuestPointer(0x40));
    engine.free(&mut instance, pointer).expect("Failed to free");
    assert_eq!(instance.live_allocations(), 0);
}

/// Test that a null allocation is reported as a failure.
#[test]
fn failed_allocation() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    instance.add_export("malloc", |_, _| Ok(vec![WireValue::I32(0)]));

    assert_matches!(
        engine.malloc(&mut instance, 8),
        Err(EmbindError::Runtime(RuntimeError::AllocationFailed(8)))
    );
}

/// Test resolving function pointers from their signature descriptors.
#[test]
fn function_pointers() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let signature = instance.store_cstring("vij");

    let function = engine
        .require_function(&mut instance, signature, 3)
        .expect("Failed to resolve function");
    assert_eq!(function.index(), 3);
    assert_eq!(
        function.signature().parameters(),
        [WireKind::I32, WireKind::I64]
    );

    assert!(engine
        .optional_function(&mut instance, signature, 0)
        .expect("Failed to resolve null function")
        .is_none());

    let malformed = instance.store_cstring("q");
    assert_matches!(
        engine.require_function(&mut instance, malformed, 1),
        Err(EmbindError::Runtime(RuntimeError::InvalidSignature(_)))
    );
}

/// Test that calling an unknown symbol fails without reaching into the guest.
#[test]
fn unknown_symbol() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();

    assert_matches!(
        engine.call_function(&mut instance, "missing", &[]),
        Err(EmbindError::UnknownSymbol(name)) if name == "missing"
    );
}

/// Test that clones of an engine share their registrations.
#[test]
fn clones_share_state() {
    let engine = Engine::default();
    let clone = engine.clone();
    let mut instance = MockInstance::default();
    let name = instance.store_cstring("void");

    engine
        .embind_register_void(&mut instance, 1, name)
        .expect("Failed to register void");

    assert_eq!(clone.registered_type_count(), 1);
    assert_eq!(clone.config(), &EngineConfig::default());
}
