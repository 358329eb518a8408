// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tests for the `emscripten::val` entry points, as called by the guest.

use std::{any::Any, cell::Cell, rc::Rc};

use assert_matches::assert_matches;
use linera_embind::{
    test::{read_std_string, MockGuest, Primitives},
    EmbindError, Engine, GuestPointer, HostFunction, HostMethod, HostObject, Instance, Value,
};

/// Creates a handle to an `int` by reading it from the guest, as `val(int)` does.
fn int_handle(guest: &mut MockGuest, types: Primitives, value: i32) -> i32 {
    let pointer = guest.instance.store_u32_array(&[value as u32]);
    guest
        .engine
        .emval_take_value(&mut guest.instance, types.int, pointer)
        .expect("Failed to take value")
}

fn string_handle(guest: &mut MockGuest, text: &str) -> i32 {
    let pointer = guest.cstring(text);
    guest
        .engine
        .emval_new_cstring(&mut guest.instance, pointer)
        .expect("Failed to create string")
}

/// Converts a handle to an `int`, as `val::as<int>()` does.
fn as_int(guest: &mut MockGuest, types: Primitives, handle: i32) -> f64 {
    let destructors = guest.instance.store_static(&[0xff; 4]);
    let result = guest
        .engine
        .emval_as(&mut guest.instance, handle, types.int, destructors)
        .expect("Failed to convert value");
    assert_eq!(
        guest
            .instance
            .read_u32(destructors)
            .expect("Failed to read destructors"),
        0
    );
    result
}

/// Test setting, reading, testing and deleting object properties.
#[test_log::test]
fn object_properties() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let object = guest.engine.emval_new_object();
    let key = string_handle(&mut guest, "answer");
    let value = int_handle(&mut guest, types, 42);

    guest
        .engine
        .emval_set_property(&mut guest.instance, object, key, value)
        .expect("Failed to set property");
    let read = guest
        .engine
        .emval_get_property(&mut guest.instance, object, key)
        .expect("Failed to get property");

    assert_eq!(as_int(&mut guest, types, read), 42.0);
    assert!(guest
        .engine
        .emval_in(&mut guest.instance, key, object)
        .expect("Failed to test property"));

    assert!(guest
        .engine
        .emval_delete(object, key)
        .expect("Failed to delete property"));
    assert!(!guest
        .engine
        .emval_delete(object, key)
        .expect("Failed to delete property"));
    assert!(!guest
        .engine
        .emval_in(&mut guest.instance, key, object)
        .expect("Failed to test property"));
    assert_eq!(
        guest
            .engine
            .emval_get_property(&mut guest.instance, object, key)
            .expect("Failed to get missing property"),
        1
    );
    assert!(!guest
        .engine
        .emval_delete(value, key)
        .expect("Failed to delete from a number"));
}

/// Test that arrays are indexed by numbers and grow when written past their end.
#[test_log::test]
fn array_elements() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let array = guest.engine.emval_new_array();
    let first = int_handle(&mut guest, types, 0);
    let third = int_handle(&mut guest, types, 2);
    let far = int_handle(&mut guest, types, 5);
    let element = string_handle(&mut guest, "item");

    guest
        .engine
        .emval_set_property(&mut guest.instance, array, third, element)
        .expect("Failed to set element");

    assert_eq!(
        guest
            .engine
            .emval_get_property(&mut guest.instance, array, first)
            .expect("Failed to get element"),
        1
    );
    let read = guest
        .engine
        .emval_get_property(&mut guest.instance, array, third)
        .expect("Failed to get element");
    assert!(guest
        .engine
        .emval_strictly_equals(read, element)
        .expect("Failed to compare"));
    assert!(guest
        .engine
        .emval_in(&mut guest.instance, third, array)
        .expect("Failed to test element"));
    assert!(!guest
        .engine
        .emval_in(&mut guest.instance, far, array)
        .expect("Failed to test element"));
    assert_matches!(
        guest
            .engine
            .emval_get_property(&mut guest.instance, array, far),
        Err(EmbindError::IndexOutOfBounds {
            index: 5,
            length: 3
        })
    );
    assert_matches!(
        guest
            .engine
            .emval_set_property(&mut guest.instance, element, first, element),
        Err(EmbindError::InvalidPropertyKey { .. })
    );
}

/// Test equality, `typeof`, negation and type checks.
#[test_log::test]
fn comparisons_and_checks() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let engine = guest.engine.clone();
    let five = int_handle(&mut guest, types, 5);
    let five_as_double = {
        let pointer = guest.instance.store_static(&5.0f64.to_le_bytes());
        engine
            .emval_take_value(&mut guest.instance, types.double, pointer)
            .expect("Failed to take value")
    };
    let zero = int_handle(&mut guest, types, 0);
    let text = string_handle(&mut guest, "number");
    let empty = string_handle(&mut guest, "");

    assert!(engine.emval_equals(five, five_as_double).expect("Failed to compare"));
    assert!(!engine
        .emval_strictly_equals(five, five_as_double)
        .expect("Failed to compare"));
    assert!(engine.emval_equals(1, 2).expect("Failed to compare"));
    assert!(!engine.emval_strictly_equals(1, 2).expect("Failed to compare"));

    let type_name = engine.emval_typeof(five).expect("Failed to get type");
    assert!(engine
        .emval_strictly_equals(type_name, text)
        .expect("Failed to compare"));

    assert!(engine.emval_not(zero).expect("Failed to negate"));
    assert!(engine.emval_not(empty).expect("Failed to negate"));
    assert!(engine.emval_not(4).expect("Failed to negate"));
    assert!(!engine.emval_not(five).expect("Failed to negate"));

    assert!(engine.emval_is_number(five).expect("Failed to check"));
    assert!(!engine.emval_is_number(text).expect("Failed to check"));
    assert!(engine.emval_is_string(text).expect("Failed to check"));
    assert!(!engine.emval_is_string(2).expect("Failed to check"));
}

/// Test reference counting of handles and that the reserved handles are never freed.
#[test_log::test]
fn handle_lifetimes() {
    let engine = Engine::default();
    assert_eq!(engine.count_emval_handles(), 0);

    let object = engine.emval_new_object();
    assert_eq!(engine.count_emval_handles(), 1);

    engine.emval_incref(object).expect("Failed to add reference");
    engine.emval_release(object).expect("Failed to release");
    assert_eq!(engine.count_emval_handles(), 1);

    engine.emval_release(object).expect("Failed to release");
    assert_eq!(engine.count_emval_handles(), 0);
    assert_matches!(
        engine.emval_release(object),
        Err(EmbindError::InvalidHandle(_))
    );

    for reserved in 1..5 {
        engine.emval_release(reserved).expect("Failed to release");
    }
    assert!(engine.emval_not(1).expect("Failed to read undefined"));
    assert!(!engine.emval_not(3).expect("Failed to read true"));
}

/// Test looking up globals declared by the host, including through interned symbols.
#[test_log::test]
fn globals() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .engine
        .register_emval_symbol("answer", Value::I32(42))
        .expect("Failed to register global");
    assert_matches!(
        guest.engine.register_emval_symbol("answer", Value::Null),
        Err(EmbindError::RegistrationMismatch(_))
    );

    let name = guest.cstring("answer");
    guest
        .engine
        .emval_register_symbol(&mut guest.instance, name)
        .expect("Failed to register symbol");
    guest
        .instance
        .write_memory(name, b"xxxxxx")
        .expect("Failed to overwrite name");

    let global = guest
        .engine
        .emval_get_global(&mut guest.instance, name)
        .expect("Failed to get global");
    assert_eq!(as_int(&mut guest, types, global), 42.0);

    let missing = guest.cstring("missing");
    assert_eq!(
        guest
            .engine
            .emval_get_global(&mut guest.instance, missing)
            .expect("Failed to get global"),
        1
    );

    let all = guest
        .engine
        .emval_get_global(&mut guest.instance, GuestPointer::NULL)
        .expect("Failed to get globals");
    let key = string_handle(&mut guest, "answer");
    let answer = guest
        .engine
        .emval_get_property(&mut guest.instance, all, key)
        .expect("Failed to get property");
    assert_eq!(as_int(&mut guest, types, answer), 42.0);
}

/// Test converting a value that needs a guest allocation, released by its destructors.
#[test_log::test]
fn conversions_with_destructors() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let text = string_handle(&mut guest, "hello");
    let destructors = guest.instance.store_static(&[0; 4]);

    let pointer = guest
        .engine
        .emval_as(&mut guest.instance, text, types.string, destructors)
        .expect("Failed to convert value");
    let pointer = GuestPointer(pointer as u32);
    let list = guest
        .instance
        .read_u32(destructors)
        .expect("Failed to read destructors") as i32;

    assert_ne!(list, 0);
    assert_eq!(guest.instance.live_allocations(), 1);
    assert_eq!(
        guest.instance.read_u32(pointer).expect("Failed to read length"),
        5
    );

    guest
        .engine
        .emval_run_destructors(&mut guest.instance, list)
        .expect("Failed to run destructors");
    assert_eq!(guest.instance.live_allocations(), 0);
    guest
        .engine
        .emval_run_destructors(&mut guest.instance, 0)
        .expect("Failed to skip empty destructors");

    assert_matches!(
        guest.engine.emval_run_destructors(&mut guest.instance, text),
        Err(EmbindError::TypeMismatch { .. })
    );
    assert_matches!(
        guest
            .engine
            .emval_as(&mut guest.instance, text, types.int, destructors),
        Err(EmbindError::TypeMismatch { .. })
    );
}

/// Test calling a host function through a method caller.
#[test_log::test]
fn call_host_functions() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let add = HostFunction::new("add", |_, _, arguments| {
        let sum = arguments
            .iter()
            .map(|argument| match argument {
                Value::I32(value) => Ok(*value),
                other => Err(EmbindError::Host(format!("cannot add {}", other.kind()))),
            })
            .sum::<Result<i32, _>>()?;
        Ok(Value::I32(sum))
    });
    guest
        .engine
        .register_emval_symbol("add", Value::Host(add))
        .expect("Failed to register global");
    let name = guest.cstring("add");
    let function = guest
        .engine
        .emval_get_global(&mut guest.instance, name)
        .expect("Failed to get global");
    let type_name = guest
        .engine
        .emval_typeof(function)
        .expect("Failed to get type");
    let expected = string_handle(&mut guest, "function");
    assert!(guest
        .engine
        .emval_strictly_equals(type_name, expected)
        .expect("Failed to compare"));

    let signature = guest.type_list(&[types.int, types.int, types.int]);
    let caller = guest
        .engine
        .emval_get_method_caller(&mut guest.instance, 3, signature, 0)
        .expect("Failed to get method caller");
    assert_eq!(
        guest
            .engine
            .emval_get_method_caller(&mut guest.instance, 3, signature, 0)
            .expect("Failed to get method caller"),
        caller
    );

    let arguments = guest.instance.store_u32_array(&[2, 0, 3, 0]);
    let destructors = guest.instance.store_static(&[0; 4]);
    let result = guest
        .engine
        .emval_call(&mut guest.instance, caller, function, destructors, arguments)
        .expect("Failed to call host function");
    assert_eq!(result, 5.0);

    let object = guest.engine.emval_new_object();
    assert_matches!(
        guest
            .engine
            .emval_call(&mut guest.instance, caller, object, destructors, arguments),
        Err(EmbindError::NotCallable(_))
    );

    let constructor = guest
        .engine
        .emval_get_method_caller(&mut guest.instance, 3, signature, 1)
        .expect("Failed to get method caller");
    assert_ne!(constructor, caller);
    assert_matches!(
        guest
            .engine
            .emval_call(&mut guest.instance, constructor, function, destructors, arguments),
        Err(EmbindError::NotConstructible(_))
    );
    assert_matches!(
        guest
            .engine
            .emval_call(&mut guest.instance, 99, function, destructors, arguments),
        Err(EmbindError::UnknownMethodCaller(99))
    );
}

/// A host object counting the amounts the guest adds to it.
#[derive(Default)]
struct Tally {
    total: Cell<i32>,
}

impl HostObject for Tally {
    fn type_name(&self) -> &str {
        "Tally"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn methods(&self) -> Vec<HostMethod> {
        vec![
            HostMethod::exported("Add"),
            HostMethod::exported("reset"),
            HostMethod::hidden("audit"),
        ]
    }

    fn map_method(
        &self,
        name: &str,
        _return_type: &str,
        _argument_types: &[String],
    ) -> Result<Option<String>, EmbindError> {
        Ok((name == "clear").then(|| "reset".to_owned()))
    }

    fn call_method(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        name: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, EmbindError> {
        match (name, arguments.as_slice()) {
            ("Add", [Value::I32(amount)]) => {
                self.total.set(self.total.get() + amount);
                Ok(Value::I32(self.total.get()))
            }
            ("reset", _) => {
                self.total.set(0);
                Ok(Value::I32(0))
            }
            _ => Err(EmbindError::Host(format!("unexpected call to {name}"))),
        }
    }

    fn get_property(&self, name: &str) -> Result<Value, EmbindError> {
        match name {
            "total" => Ok(Value::I32(self.total.get())),
            _ => Err(EmbindError::UnknownProperty {
                owner: "Tally".to_owned(),
                property: name.to_owned(),
            }),
        }
    }
}

/// Test calling methods of a host object, found by exact, capitalized or mapped names.
#[test_log::test]
fn call_host_methods() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let tally = Rc::new(Tally::default());
    guest
        .engine
        .register_emval_symbol("tally", Value::Host(tally.clone()))
        .expect("Failed to register global");
    let name = guest.cstring("tally");
    let object = guest
        .engine
        .emval_get_global(&mut guest.instance, name)
        .expect("Failed to get global");

    let signature = guest.type_list(&[types.int, types.int]);
    let caller = guest
        .engine
        .emval_get_method_caller(&mut guest.instance, 2, signature, 0)
        .expect("Failed to get method caller");
    let arguments = guest.instance.store_u32_array(&[4, 0]);
    let destructors = guest.instance.store_static(&[0; 4]);
    let call = |guest: &mut MockGuest, method: &str| {
        let method = guest.cstring(method);
        guest.engine.emval_call_method(
            &mut guest.instance,
            caller,
            object,
            method,
            destructors,
            arguments,
        )
    };

    assert_eq!(call(&mut guest, "add").expect("Failed to call add"), 4.0);
    assert_eq!(call(&mut guest, "Add").expect("Failed to call Add"), 8.0);
    assert_eq!(tally.total.get(), 8);
    assert_eq!(call(&mut guest, "clear").expect("Failed to call clear"), 0.0);
    assert_matches!(
        call(&mut guest, "audit"),
        Err(EmbindError::HostMethodNotExported { method, .. }) if method == "audit"
    );
    assert_matches!(
        call(&mut guest, "missing"),
        Err(EmbindError::HostMethodNotFound { capitalized, .. }) if capitalized == "Missing"
    );

    let key = string_handle(&mut guest, "total");
    let total = guest
        .engine
        .emval_get_property(&mut guest.instance, object, key)
        .expect("Failed to get property");
    assert_eq!(as_int(&mut guest, types, total), 0.0);

    let number = int_handle(&mut guest, types, 1);
    let method = guest.cstring("add");
    assert_matches!(
        guest.engine.emval_call_method(
            &mut guest.instance,
            caller,
            number,
            method,
            destructors,
            arguments
        ),
        Err(EmbindError::HostMethodNotFound { .. })
    );
}

/// Test constructing a value through a host object.
#[test_log::test]
fn construct_host_values() {
    struct Factory;

    impl HostObject for Factory {
        fn type_name(&self) -> &str {
            "Factory"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn construct(
            &self,
            _engine: &Engine,
            _instance: &mut dyn Instance,
            argument_types: &[String],
            arguments: Vec<Value>,
        ) -> Result<Value, EmbindError> {
            let mut built = arguments;
            built.extend(argument_types.iter().map(|name| Value::from(name.as_str())));
            Ok(Value::Array(built))
        }
    }

    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .engine
        .register_emval_symbol("Factory", Value::Host(Rc::new(Factory)))
        .expect("Failed to register global");
    let name = guest.cstring("Factory");
    let factory = guest
        .engine
        .emval_get_global(&mut guest.instance, name)
        .expect("Failed to get global");

    let arg_types = guest.type_list(&[types.int]);
    let arguments = guest.instance.store_u32_array(&[9, 0]);
    let built = guest
        .engine
        .emval_new(&mut guest.instance, factory, 1, arg_types, arguments)
        .expect("Failed to construct");

    let index = int_handle(&mut guest, types, 0);
    let first = guest
        .engine
        .emval_get_property(&mut guest.instance, built, index)
        .expect("Failed to get element");
    assert_eq!(as_int(&mut guest, types, first), 9.0);
    let index = int_handle(&mut guest, types, 1);
    let second = guest
        .engine
        .emval_get_property(&mut guest.instance, built, index)
        .expect("Failed to get element");
    let expected = string_handle(&mut guest, "int");
    assert!(guest
        .engine
        .emval_strictly_equals(second, expected)
        .expect("Failed to compare"));

    let object = guest.engine.emval_new_object();
    assert_matches!(
        guest
            .engine
            .emval_new(&mut guest.instance, object, 1, arg_types, arguments),
        Err(EmbindError::NotConstructible(_))
    );
}

/// Test that values converted to guest strings read back unchanged.
#[test_log::test]
fn strings_round_trip_through_handles() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let text = string_handle(&mut guest, "héllo");
    let destructors = guest.instance.store_static(&[0; 4]);

    let pointer = guest
        .engine
        .emval_as(&mut guest.instance, text, types.string, destructors)
        .expect("Failed to convert value");
    let pointer = GuestPointer(pointer as u32);
    assert_eq!(
        read_std_string(&mut guest.instance, pointer).expect("Failed to read string"),
        "héllo"
    );

    let slot = guest.instance.store_u32_array(&[pointer.0]);
    let taken = guest
        .engine
        .emval_take_value(&mut guest.instance, types.string, slot)
        .expect("Failed to take value");
    assert_eq!(guest.instance.live_allocations(), 0);
    assert!(guest
        .engine
        .emval_strictly_equals(taken, text)
        .expect("Failed to compare"));
}
