// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tests for classes: construction, methods, inheritance, properties and deletion.

use std::{any::Any, cell::Cell, rc::Rc};

use assert_matches::assert_matches;
use linera_embind::{
    test::{allocate_object, ClassTypes, MockGuest, Primitives, OBJECT_HEADER},
    ClassBinding, ClassHandle, ClassInstance, DelayFunction, EmbindError, Instance, Value,
    WireValue,
};

/// Registers a `Counter` class holding an `int` right after the object header.
fn counter_class() -> (MockGuest, Primitives, ClassTypes) {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let counter = guest
        .register_class("Counter", None)
        .expect("Failed to register class");
    guest
        .register_constructor(counter, &[types.int], move |instance, arguments| {
            let object = allocate_object(instance, counter.raw_type, 4)?;
            instance.write_u32(object.offset(OBJECT_HEADER), arguments[0].as_u32()?)?;
            Ok(object)
        })
        .expect("Failed to register constructor");
    guest
        .register_method(counter, "add", types.int, &[types.int], |instance, arguments| {
            let field = arguments[0].as_pointer()?.offset(OBJECT_HEADER);
            let value = instance.read_u32(field)? as i32 + arguments[1].as_i32()?;
            instance.write_u32(field, value as u32)?;
            Ok(Some(WireValue::I32(value)))
        })
        .expect("Failed to register method");
    (guest, types, counter)
}

fn new_counter(guest: &mut MockGuest, start: i32) -> Value {
    guest
        .engine
        .construct(&mut guest.instance, "Counter", &[Value::I32(start)])
        .expect("Failed to construct counter")
}

/// Test constructing an object, calling a method on it and deleting it.
#[test_log::test]
fn construct_call_and_delete() {
    let (mut guest, _, _) = counter_class();
    let counter = new_counter(&mut guest, 10);

    assert_matches!(counter, Value::Class(_));
    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &counter, "add", &[Value::I32(5)])
            .expect("Failed to call method"),
        Value::I32(15)
    );
    assert_eq!(guest.instance.live_allocations(), 1);

    guest
        .engine
        .delete_instance(&mut guest.instance, &counter)
        .expect("Failed to delete counter");

    assert_eq!(guest.instance.live_allocations(), 0);
    assert!(guest.engine.is_deleted(&counter).expect("Not an instance"));
    assert_eq!(guest.engine.live_class_handles(), 0);
    assert_matches!(
        guest
            .engine
            .call_method(&mut guest.instance, &counter, "add", &[Value::I32(1)]),
        Err(EmbindError::DeletedObject(_))
    );
    assert_matches!(
        guest.engine.delete_instance(&mut guest.instance, &counter),
        Err(EmbindError::AlreadyDeleted)
    );
}

/// Test that the class is also exposed as a public symbol that constructs instances.
#[test_log::test]
fn construct_through_symbol() {
    let (mut guest, _, _) = counter_class();

    let counter = guest
        .engine
        .call_function(&mut guest.instance, "Counter", &[Value::I32(1)])
        .expect("Failed to construct through symbol");

    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &counter, "add", &[Value::I32(1)])
            .expect("Failed to call method"),
        Value::I32(2)
    );
    assert_matches!(
        guest.engine.construct(&mut guest.instance, "Counter", &[]),
        Err(EmbindError::ConstructorArity { actual: 0, expected, .. }) if expected == [1]
    );
    assert_matches!(
        guest.engine.construct(&mut guest.instance, "Missing", &[]),
        Err(EmbindError::UnknownClass(_))
    );
    assert_matches!(
        guest
            .engine
            .call_method(&mut guest.instance, &counter, "subtract", &[]),
        Err(EmbindError::UnknownMethod { method, .. }) if method == "subtract"
    );
}

/// Test that constructors are selected by their number of arguments.
#[test_log::test]
fn constructor_overloads() {
    let (mut guest, types, counter) = counter_class();
    guest
        .register_constructor(counter, &[types.int, types.int], move |instance, arguments| {
            let object = allocate_object(instance, counter.raw_type, 4)?;
            let start = arguments[0].as_i32()? * arguments[1].as_i32()?;
            instance.write_u32(object.offset(OBJECT_HEADER), start as u32)?;
            Ok(object)
        })
        .expect("Failed to register second constructor");

    let product = guest
        .engine
        .construct(&mut guest.instance, "Counter", &[Value::I32(3), Value::I32(4)])
        .expect("Failed to construct counter");
    let single = new_counter(&mut guest, 5);

    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &product, "add", &[Value::I32(0)])
            .expect("Failed to call method"),
        Value::I32(12)
    );
    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &single, "add", &[Value::I32(0)])
            .expect("Failed to call method"),
        Value::I32(5)
    );
    assert_matches!(
        guest.engine.construct(&mut guest.instance, "Counter", &[]),
        Err(EmbindError::ConstructorArity { actual: 0, expected, .. }) if expected == [1, 2]
    );
    assert_matches!(
        guest.register_constructor(counter, &[types.int], |_, _| Ok(Default::default())),
        Err(EmbindError::DuplicateConstructor { .. })
    );
}

/// Test that cloned handles share a reference count and the object outlives all but the last.
#[test_log::test]
fn shared_handles() {
    let (mut guest, _, _) = counter_class();
    let counter = new_counter(&mut guest, 0);
    let clone = guest
        .engine
        .clone_instance(&counter)
        .expect("Failed to clone handle");

    assert_eq!(guest.engine.reference_count(&counter).expect("Not an instance"), 2);
    assert!(guest
        .engine
        .is_alias_of(&mut guest.instance, &counter, &clone)
        .expect("Failed to compare handles"));

    guest
        .engine
        .delete_instance(&mut guest.instance, &counter)
        .expect("Failed to delete handle");
    assert_eq!(guest.instance.live_allocations(), 1);
    assert_eq!(guest.engine.reference_count(&clone).expect("Not an instance"), 1);

    guest
        .engine
        .delete_instance(&mut guest.instance, &clone)
        .expect("Failed to delete handle");
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test deferred deletion and the delay function.
#[test_log::test]
fn delete_later() {
    let (mut guest, types, counter) = counter_class();
    guest
        .register_property(counter, "value", types.int, OBJECT_HEADER, false)
        .expect("Failed to register property");
    let notifications = Rc::new(Cell::new(0));
    let notified = notifications.clone();
    let delay_function: DelayFunction = Rc::new(move |pending| {
        assert_eq!(pending.len(), 1);
        notified.set(notified.get() + 1);
        Ok(())
    });
    guest
        .engine
        .set_delay_function(Some(delay_function))
        .expect("Failed to set delay function");

    let first = new_counter(&mut guest, 1);
    let second = new_counter(&mut guest, 2);
    guest.engine.delete_later(&first).expect("Failed to schedule deletion");
    guest.engine.delete_later(&second).expect("Failed to schedule deletion");

    assert_eq!(notifications.get(), 1);
    assert_eq!(guest.engine.pending_deletes(), 2);
    assert_matches!(
        guest.engine.delete_later(&first),
        Err(EmbindError::AlreadyScheduledForDeletion)
    );
    assert_eq!(guest.instance.live_allocations(), 2);

    let deleted = guest
        .engine
        .flush_pending_deletes(&mut guest.instance)
        .expect("Failed to flush deletions");

    assert_eq!(deleted, 2);
    assert_eq!(guest.engine.pending_deletes(), 0);
    assert_eq!(guest.instance.live_allocations(), 0);
    assert_matches!(
        guest
            .engine
            .get_property(&mut guest.instance, &first, "value"),
        Err(EmbindError::DeletedObject(_))
    );
}

/// Test that handles preserved on deletion stay alive after their object is destroyed, without
/// destroying it twice.
#[test_log::test]
fn preserve_pointer_on_delete() {
    let (mut guest, _, _) = counter_class();
    let counter = new_counter(&mut guest, 3);
    guest
        .engine
        .set_preserve_pointer_on_delete(&counter, true)
        .expect("Failed to preserve pointer");

    guest
        .engine
        .delete_instance(&mut guest.instance, &counter)
        .expect("Failed to delete handle");

    assert_eq!(guest.instance.live_allocations(), 0);
    assert!(!guest.engine.is_deleted(&counter).expect("Not an instance"));

    guest
        .engine
        .delete_instance(&mut guest.instance, &counter)
        .expect("Failed to delete preserved handle again");
    assert_eq!(guest.engine.reference_count(&counter).expect("Not an instance"), 0);
}

/// Test that a handle whose destructor fails while flushing stays scheduled for deletion.
#[test_log::test]
fn failed_flush_keeps_handle_queued() {
    let (mut guest, _, _) = counter_class();
    let counter = new_counter(&mut guest, 3);
    guest
        .engine
        .set_preserve_pointer_on_delete(&counter, true)
        .expect("Failed to preserve pointer");
    guest
        .engine
        .delete_instance(&mut guest.instance, &counter)
        .expect("Failed to delete handle");
    let counter = guest
        .engine
        .clone_instance(&counter)
        .expect("Failed to clone preserved handle");
    assert_eq!(guest.engine.reference_count(&counter).expect("Not an instance"), 1);

    guest.engine.delete_later(&counter).expect("Failed to schedule deletion");

    assert_matches!(
        guest.engine.flush_pending_deletes(&mut guest.instance),
        Err(EmbindError::Runtime(_))
    );
    assert_eq!(guest.engine.pending_deletes(), 1);
    assert!(!guest.engine.is_deleted(&counter).expect("Not an instance"));
}

/// Test a derived class registered before its base class.
#[test_log::test]
fn derived_before_base() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let base = guest.declare_class("Base");
    let derived = guest
        .register_class("Derived", Some(base))
        .expect("Failed to register derived class");
    guest
        .register_constructor(derived, &[types.int], move |instance, arguments| {
            let object = allocate_object(instance, derived.raw_type, 4)?;
            instance.write_u32(object.offset(OBJECT_HEADER), arguments[0].as_u32()?)?;
            Ok(object)
        })
        .expect("Failed to register constructor");
    guest
        .register_method(base, "get", types.int, &[], |instance, arguments| {
            let field = arguments[0].as_pointer()?.offset(OBJECT_HEADER);
            Ok(Some(WireValue::I32(instance.read_u32(field)? as i32)))
        })
        .expect("Failed to register base method");

    assert_matches!(
        guest
            .engine
            .construct(&mut guest.instance, "Derived", &[Value::I32(1)]),
        Err(EmbindError::UnboundTypes { types, .. }) if types == ["Base"]
    );

    guest
        .register_declared_class("Base", base, None)
        .expect("Failed to register base class");

    let object = guest
        .engine
        .construct(&mut guest.instance, "Derived", &[Value::I32(9)])
        .expect("Failed to construct derived object");
    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &object, "get", &[])
            .expect("Failed to call inherited method"),
        Value::I32(9)
    );
    guest
        .engine
        .delete_instance(&mut guest.instance, &object)
        .expect("Failed to delete object");
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test that objects returned through a base class pointer are typed as their most derived
/// registered class.
#[test_log::test]
fn polymorphic_results() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let shape = guest
        .register_class("Shape", None)
        .expect("Failed to register base class");
    let square = guest
        .register_class("Square", Some(shape))
        .expect("Failed to register derived class");
    guest
        .register_method(shape, "sides", types.int, &[], |_, _| Ok(Some(WireValue::I32(4))))
        .expect("Failed to register base method");
    guest
        .register_method(square, "area", types.double, &[], |instance, arguments| {
            let side = instance.read_f64(arguments[0].as_pointer()?.offset(OBJECT_HEADER))?;
            Ok(Some(WireValue::F64(side * side)))
        })
        .expect("Failed to register derived method");
    guest
        .register_function("make_square", shape.pointer, &[types.double], move |instance, arguments| {
            let object = allocate_object(instance, square.raw_type, 8)?;
            instance.write_memory(
                object.offset(OBJECT_HEADER),
                &arguments[0].as_f64()?.to_le_bytes(),
            )?;
            Ok(Some(object.into()))
        })
        .expect("Failed to register factory");

    let made = guest
        .engine
        .call_function(&mut guest.instance, "make_square", &[Value::F64(3.0)])
        .expect("Failed to call factory");

    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &made, "area", &[])
            .expect("Failed to call derived method"),
        Value::F64(9.0)
    );
    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &made, "sides", &[])
            .expect("Failed to call inherited method"),
        Value::I32(4)
    );

    let classes = guest.engine.classes();
    let square_info = classes
        .iter()
        .find(|class| class.name == "Square")
        .expect("Missing class");
    assert_eq!(square_info.base.as_deref(), Some("Shape"));
}

/// Test that passing an object of an unrelated class is rejected.
#[test_log::test]
fn incompatible_arguments() {
    let (mut guest, types, counter) = counter_class();
    let other = guest
        .register_class("Other", None)
        .expect("Failed to register class");
    guest
        .register_constructor(other, &[], move |instance, _| {
            Ok(allocate_object(instance, other.raw_type, 0)?)
        })
        .expect("Failed to register constructor");
    guest
        .register_function("peek", types.int, &[counter.pointer], |instance, arguments| {
            let field = arguments[0].as_pointer()?.offset(OBJECT_HEADER);
            Ok(Some(WireValue::I32(instance.read_u32(field)? as i32)))
        })
        .expect("Failed to register function");

    let counter_value = new_counter(&mut guest, 8);
    let other_value = guest
        .engine
        .construct(&mut guest.instance, "Other", &[])
        .expect("Failed to construct");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "peek", &[counter_value])
            .expect("Failed to call function"),
        Value::I32(8)
    );
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "peek", &[other_value]),
        Err(EmbindError::InvalidUpcast { .. })
    );
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "peek", &[Value::I32(1)]),
        Err(EmbindError::NotAnInstance { .. })
    );
}

/// Test instance properties, including read-only ones and inherited ones.
#[test_log::test]
fn properties() {
    let (mut guest, types, counter) = counter_class();
    guest
        .register_property(counter, "value", types.int, OBJECT_HEADER, false)
        .expect("Failed to register property");
    guest
        .register_property(counter, "snapshot", types.int, OBJECT_HEADER, true)
        .expect("Failed to register read-only property");
    let value = new_counter(&mut guest, 7);

    guest
        .engine
        .set_property(&mut guest.instance, &value, "value", &Value::I32(11))
        .expect("Failed to set property");

    assert_eq!(
        guest
            .engine
            .get_property(&mut guest.instance, &value, "snapshot")
            .expect("Failed to get property"),
        Value::I32(11)
    );
    assert_matches!(
        guest
            .engine
            .set_property(&mut guest.instance, &value, "snapshot", &Value::I32(0)),
        Err(EmbindError::ReadOnlyProperty(name)) if name == "Counter.snapshot"
    );
    assert_matches!(
        guest
            .engine
            .get_property(&mut guest.instance, &value, "missing"),
        Err(EmbindError::UnknownProperty { .. })
    );
}

/// Test static methods and static properties, and that static methods are inherited.
#[test_log::test]
fn static_members() {
    let (mut guest, types, counter) = counter_class();
    guest
        .register_class("BigCounter", Some(counter))
        .expect("Failed to register derived class");
    guest
        .register_static_method(counter, "limit", types.int, &[], |_, _| {
            Ok(Some(WireValue::I32(100)))
        })
        .expect("Failed to register static method");
    let field = guest
        .register_static_property(counter, "instances", types.int, false)
        .expect("Failed to register static property");

    assert_eq!(
        guest
            .engine
            .call_static_method(&mut guest.instance, "BigCounter", "limit", &[])
            .expect("Failed to call inherited static method"),
        Value::I32(100)
    );

    guest
        .engine
        .set_static_property(&mut guest.instance, "Counter", "instances", &Value::I32(3))
        .expect("Failed to set static property");
    assert_eq!(guest.instance.read_u32(field).expect("Failed to read field"), 3);
    assert_eq!(
        guest
            .engine
            .get_static_property(&mut guest.instance, "Counter", "instances")
            .expect("Failed to get static property"),
        Value::I32(3)
    );
    assert_matches!(
        guest
            .engine
            .call_static_method(&mut guest.instance, "Counter", "missing", &[]),
        Err(EmbindError::UnknownMethod { .. })
    );
}

/// A host wrapper for `Counter` instances.
struct HostCounter {
    handle: ClassHandle,
}

impl ClassInstance for HostCounter {
    fn class_handle(&self) -> ClassHandle {
        self.handle
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Test that a host binding materializes every handle of its class.
#[test_log::test]
fn host_bindings() {
    let (mut guest, _, _) = counter_class();
    let binding: Rc<dyn ClassBinding> =
        Rc::new(|handle: ClassHandle| -> Rc<dyn ClassInstance> { Rc::new(HostCounter { handle }) });
    guest
        .engine
        .register_class("Counter", binding.clone())
        .expect("Failed to register binding");

    let counter = new_counter(&mut guest, 1);

    let Value::Instance(wrapper) = &counter else {
        panic!("Expected a host wrapper, got {counter:?}");
    };
    assert!(wrapper.as_any().downcast_ref::<HostCounter>().is_some());
    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &counter, "add", &[Value::I32(1)])
            .expect("Failed to call method through wrapper"),
        Value::I32(2)
    );
    assert_matches!(
        guest.engine.register_class("Counter", binding),
        Err(EmbindError::RegistrationMismatch(_))
    );
}
