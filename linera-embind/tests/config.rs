// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tests for loading the engine configuration.

use linera_embind::{
    test::{store_std_string, MockGuest},
    Engine, EngineConfig, RuntimeError, Value,
};

/// Test that an empty configuration uses the names Emscripten emits.
#[test]
fn defaults() {
    let config: EngineConfig = serde_json::from_str("{}").expect("Failed to parse config");

    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.malloc_export, "malloc");
    assert_eq!(config.free_export, "free");
    assert_eq!(config.type_name_export, "__getTypeName");
    assert_eq!(config.import_module, "env");
}

/// Test that fields use kebab-case names and missing ones keep their defaults.
#[test]
fn partial_configuration() {
    let config: EngineConfig = serde_json::from_str(
        r#"{ "malloc-export": "dlmalloc", "import-module": "embind" }"#,
    )
    .expect("Failed to parse config");

    assert_eq!(config.malloc_export, "dlmalloc");
    assert_eq!(config.import_module, "embind");
    assert_eq!(config.free_export, "free");
    assert_eq!(config.memory_export, "memory");

    let serialized = serde_json::to_value(&config).expect("Failed to serialize config");
    assert_eq!(serialized["function-table-export"], "__indirect_function_table");
}

/// Test that the engine releases guest strings through the configured export.
#[test_log::test]
fn configured_free_export() {
    let config: EngineConfig =
        serde_json::from_str(r#"{ "free-export": "release" }"#).expect("Failed to parse config");
    let mut guest = MockGuest::new(Engine::new(config));
    let string = guest
        .register_std_string("std::string")
        .expect("Failed to register string");
    guest
        .register_function("name", string, &[], |instance, _| {
            Ok(Some(store_std_string(instance, "embind")?.into()))
        })
        .expect("Failed to register function");
    guest.instance.add_export("release", |instance, arguments| {
        instance.free(arguments[0].as_pointer()?)?;
        Ok(vec![])
    });
    guest.instance.add_export("free", |_, _| {
        Err(RuntimeError::Trap("unexpected call to free".to_owned()))
    });

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "name", &[])
            .expect("Failed to call function"),
        Value::from("embind")
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}
