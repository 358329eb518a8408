// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tests for compound values, enums, constants, memory views and smart pointers.

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use linera_embind::{
    test::{
        allocate_object, allocate_smart_pointer, read_wire, write_wire, ClassTypes, MockField,
        MockGuest, Primitives, OBJECT_HEADER,
    },
    EmbindError, EnumValue, GuestPointer, Instance, MemoryViewKind, Value, WireKind, WireValue,
};

/// Registers a `Point` struct of an `int` at offset zero and a `double` at offset eight.
fn point_struct() -> (MockGuest, Primitives, i32) {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let point = guest
        .register_value_object(
            "Point",
            16,
            &[
                MockField {
                    name: "y",
                    raw_type: types.double,
                    offset: 8,
                },
                MockField {
                    name: "x",
                    raw_type: types.int,
                    offset: 0,
                },
            ],
        )
        .expect("Failed to register value object");
    (guest, types, point)
}

fn point(x: i32, y: f64) -> Value {
    Value::Object(BTreeMap::from([
        ("x".to_owned(), Value::I32(x)),
        ("y".to_owned(), Value::F64(y)),
    ]))
}

/// Test passing a struct to the guest and receiving one back.
#[test_log::test]
fn value_objects() {
    let (mut guest, _, point_type) = point_struct();
    guest
        .register_function("mirror", point_type, &[point_type], |instance, arguments| {
            let input = arguments[0].as_pointer()?;
            let x = read_wire(instance, input, WireKind::I32)?;
            let y = read_wire(instance, input.offset(8), WireKind::F64)?;
            let output = instance.malloc(16)?;
            write_wire(instance, output, WireValue::I32(-x.as_i32()?))?;
            write_wire(instance, output.offset(8), WireValue::F64(-y.as_f64()?))?;
            Ok(Some(output.into()))
        })
        .expect("Failed to register function");

    let result = guest
        .engine
        .call_function(&mut guest.instance, "mirror", &[point(3, 1.5)])
        .expect("Failed to call function");

    assert_eq!(result, point(-3, -1.5));
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test that structs must carry every field and be objects.
#[test_log::test]
fn value_object_errors() {
    let (mut guest, types, point_type) = point_struct();
    guest
        .register_function("consume", types.void, &[point_type], |_, _| Ok(None))
        .expect("Failed to register function");

    let missing_y = Value::Object(BTreeMap::from([("x".to_owned(), Value::I32(1))]));
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "consume", &[missing_y]),
        Err(EmbindError::MissingField(field)) if field == "y"
    );
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "consume", &[Value::I32(1)]),
        Err(EmbindError::TypeMismatch { .. })
    );
    let integer_y = Value::Object(BTreeMap::from([
        ("x".to_owned(), Value::I32(1)),
        ("y".to_owned(), Value::I32(2)),
    ]));
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "consume", &[integer_y]),
        Err(EmbindError::TypeMismatch { .. })
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test passing tuples to the guest and receiving them back.
#[test_log::test]
fn value_arrays() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let pair = guest
        .register_value_array(
            "Pair",
            16,
            &[
                MockField {
                    name: "",
                    raw_type: types.int,
                    offset: 0,
                },
                MockField {
                    name: "",
                    raw_type: types.double,
                    offset: 8,
                },
            ],
        )
        .expect("Failed to register value array");
    guest
        .register_function("double_pair", pair, &[pair], |instance, arguments| {
            let input = arguments[0].as_pointer()?;
            let first = read_wire(instance, input, WireKind::I32)?.as_i32()?;
            let second = read_wire(instance, input.offset(8), WireKind::F64)?.as_f64()?;
            let output = instance.malloc(16)?;
            write_wire(instance, output, WireValue::I32(first * 2))?;
            write_wire(instance, output.offset(8), WireValue::F64(second * 2.0))?;
            Ok(Some(output.into()))
        })
        .expect("Failed to register function");

    let result = guest
        .engine
        .call_function(
            &mut guest.instance,
            "double_pair",
            &[Value::Array(vec![Value::I32(4), Value::F64(0.5)])],
        )
        .expect("Failed to call function");
    assert_eq!(result, Value::Array(vec![Value::I32(8), Value::F64(1.0)]));

    assert_matches!(
        guest.engine.call_function(
            &mut guest.instance,
            "double_pair",
            &[Value::Array(vec![Value::I32(4)])]
        ),
        Err(EmbindError::TupleLength {
            expected: 2,
            actual: 1,
            ..
        })
    );
    assert_matches!(
        guest.engine.call_function(
            &mut guest.instance,
            "double_pair",
            &[Value::Array(vec![Value::I32(4), Value::I32(5)])]
        ),
        Err(EmbindError::TypeMismatch { .. })
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test compound types registered before the types of their fields.
#[test_log::test]
fn compounds_before_their_fields() {
    let mut guest = MockGuest::default();
    let int = guest.declare_type("int", Some(WireKind::I32));
    let double = guest.declare_type("double", Some(WireKind::F64));
    let fields = [
        MockField {
            name: "y",
            raw_type: double,
            offset: 8,
        },
        MockField {
            name: "x",
            raw_type: int,
            offset: 0,
        },
    ];
    let point_type = guest
        .register_value_object("Point", 16, &fields)
        .expect("Failed to register value object");
    let pair = guest
        .register_value_array("Pair", 16, &[fields[1], fields[0]])
        .expect("Failed to register value array");
    guest
        .register_function("to_pair", pair, &[point_type], |instance, arguments| {
            let input = arguments[0].as_pointer()?;
            let output = instance.malloc(16)?;
            let x = read_wire(instance, input, WireKind::I32)?;
            let y = read_wire(instance, input.offset(8), WireKind::F64)?;
            write_wire(instance, output, x)?;
            write_wire(instance, output.offset(8), y)?;
            Ok(Some(output.into()))
        })
        .expect("Failed to register function");

    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "to_pair", &[point(1, 2.0)]),
        Err(EmbindError::UnboundTypes { types, .. })
            if types.len() == 2 && types.iter().all(|name| name == "int" || name == "double")
    );

    let double_name = guest.cstring("double");
    guest
        .engine
        .embind_register_float(&mut guest.instance, double, double_name, 8)
        .expect("Failed to register double");
    let int_name = guest.cstring("int");
    guest
        .engine
        .embind_register_integer(&mut guest.instance, int, int_name, 4, i32::MIN, i32::MAX as u32)
        .expect("Failed to register int");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "to_pair", &[point(7, -0.5)])
            .expect("Failed to call function"),
        Value::Array(vec![Value::I32(7), Value::F64(-0.5)])
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}

fn color(name: &str, value: i64) -> Value {
    Value::Enum(EnumValue {
        enum_name: "Color".to_owned(),
        name: name.to_owned(),
        value,
    })
}

/// Test exchanging enum values, which are matched by name.
#[test_log::test]
fn enums() {
    let mut guest = MockGuest::default();
    let color_type = guest
        .register_enum("Color", &[("Red", 0), ("Green", 1), ("Blue", 2)])
        .expect("Failed to register enum");
    guest
        .register_function("next", color_type, &[color_type], |_, arguments| {
            Ok(Some(WireValue::I32(arguments[0].as_i32()? + 1)))
        })
        .expect("Failed to register function");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "next", &[color("Red", 0)])
            .expect("Failed to call function"),
        color("Green", 1)
    );
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "next", &[color("Blue", 2)]),
        Err(EmbindError::UnknownEnumValue { value, .. }) if value == "3"
    );
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "next", &[color("Purple", 5)]),
        Err(EmbindError::UnknownEnumValue { .. })
    );
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "next", &[Value::I32(0)]),
        Err(EmbindError::TypeMismatch { .. })
    );

    let enums = guest.engine.enums();
    assert_eq!(enums.len(), 1);
    assert_eq!(enums[0].name, "Color");
    assert!(enums[0].is_registered);
    assert_eq!(enums[0].values.get("Blue"), Some(&2));
    assert!(!guest
        .engine
        .symbols()
        .iter()
        .any(|symbol| symbol.name == "Color"));
}

/// Test that enum values declared by the host must match the guest's.
#[test_log::test]
fn host_declared_enums() {
    let mut guest = MockGuest::default();
    guest
        .engine
        .register_enum("Level", [("Low".to_owned(), 0), ("High".to_owned(), 10)])
        .expect("Failed to declare enum");
    assert_matches!(
        guest.register_enum("Level", &[("Low", 0), ("High", 9)]),
        Err(EmbindError::RegistrationMismatch(_))
    );

    let mut guest = MockGuest::default();
    guest
        .register_enum("Level", &[("Low", 0), ("High", 10)])
        .expect("Failed to register enum");
    assert_matches!(
        guest
            .engine
            .register_enum("Level", [("Low".to_owned(), 1), ("High".to_owned(), 10)]),
        Err(EmbindError::RegistrationMismatch(_))
    );
    guest
        .engine
        .register_enum("Level", [("Low".to_owned(), 0), ("High".to_owned(), 10)])
        .expect("Failed to declare matching enum");

    let host_values = guest.engine.enums()[0]
        .host_values
        .clone()
        .expect("Missing host values");
    assert_eq!(host_values.get("High"), Some(&10));
}

/// Test constants, converted to their type once it is registered.
#[test_log::test]
fn constants() {
    let mut guest = MockGuest::default();
    let int = guest.declare_type("int", Some(WireKind::I32));
    guest
        .register_constant("answer", int, 42.0)
        .expect("Failed to register constant");
    assert_eq!(guest.engine.constant("answer"), None);

    let name = guest.cstring("int");
    guest
        .engine
        .embind_register_integer(&mut guest.instance, int, name, 4, i32::MIN, i32::MAX as u32)
        .expect("Failed to register int");
    let double = guest
        .register_float("double", 8)
        .expect("Failed to register double");
    guest
        .register_constant("ratio", double, 0.75)
        .expect("Failed to register constant");

    assert_eq!(guest.engine.constant("answer"), Some(Value::I32(42)));
    assert_eq!(
        guest.engine.constants(),
        BTreeMap::from([
            ("answer".to_owned(), Value::I32(42)),
            ("ratio".to_owned(), Value::F64(0.75)),
        ])
    );
}

/// Test that constants declared by the host must match the guest's.
#[test_log::test]
fn host_declared_constants() {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    guest
        .engine
        .register_constant("limit", Value::I32(7))
        .expect("Failed to declare constant");
    assert_eq!(guest.engine.constant("limit"), Some(Value::I32(7)));
    guest
        .register_constant("limit", types.int, 7.0)
        .expect("Failed to register matching constant");

    guest
        .register_constant("size", types.int, 3.0)
        .expect("Failed to register constant");
    assert_matches!(
        guest.engine.register_constant("size", Value::I32(4)),
        Err(EmbindError::RegistrationMismatch(_))
    );
    assert_matches!(
        guest.register_constant("size", types.int, 3.0),
        Err(EmbindError::RegistrationMismatch(_))
    );
}

/// Test receiving a view over the guest's memory.
#[test_log::test]
fn memory_views() {
    let (mut guest, _) = MockGuest::with_primitives().expect("Failed to register primitives");
    let view_type = guest
        .register_memory_view("emscripten::memory_view<int>", 4)
        .expect("Failed to register memory view");
    let data = guest.instance.store_u32_array(&[1, 2, u32::MAX]);
    let descriptor = guest.instance.store_u32_array(&[3, data.0]);
    guest
        .register_function("view", view_type, &[], move |_, _| {
            Ok(Some(descriptor.into()))
        })
        .expect("Failed to register function");
    guest
        .register_function("take_view", view_type, &[view_type], |_, _| Ok(None))
        .expect("Failed to register function");

    let Value::MemoryView(view) = guest
        .engine
        .call_function(&mut guest.instance, "view", &[])
        .expect("Failed to call function")
    else {
        panic!("Expected a memory view");
    };

    assert_eq!(view.kind, MemoryViewKind::I32);
    assert_eq!(view.address, data);
    assert_eq!(view.byte_length().expect("Invalid view"), 12);
    assert_eq!(
        view.elements(&mut guest.instance)
            .expect("Failed to read view"),
        vec![Value::I32(1), Value::I32(2), Value::I32(-1)]
    );
    assert_matches!(
        guest.engine.call_function(
            &mut guest.instance,
            "take_view",
            &[Value::MemoryView(view)]
        ),
        Err(EmbindError::Unsupported(_))
    );
    assert_matches!(
        guest.register_memory_view("emscripten::memory_view<bool>", 42),
        Err(EmbindError::Unsupported(_))
    );

    let oversized = guest.instance.store_u32_array(&[u32::MAX / 2, data.0]);
    guest
        .register_function("oversized_view", view_type, &[], move |_, _| {
            Ok(Some(oversized.into()))
        })
        .expect("Failed to register function");
    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "oversized_view", &[]),
        Err(EmbindError::Decode(_))
    );
}

/// Registers a `Widget` class with a size field, and `std::shared_ptr<Widget>`.
fn widget_class() -> (MockGuest, Primitives, ClassTypes, i32) {
    let (mut guest, types) = MockGuest::with_primitives().expect("Failed to register primitives");
    let widget = guest
        .register_class("Widget", None)
        .expect("Failed to register class");
    guest
        .register_method(widget, "size", types.int, &[], |instance, arguments| {
            let object = arguments[0].as_pointer()?;
            Ok(Some(WireValue::I32(
                instance.read_u32(object.offset(OBJECT_HEADER))? as i32,
            )))
        })
        .expect("Failed to register method");
    let shared = guest
        .register_smart_pointer("std::shared_ptr<Widget>", widget, 0)
        .expect("Failed to register smart pointer");
    guest
        .register_function("make_widget", shared, &[types.int], move |instance, arguments| {
            let object = allocate_object(instance, widget.raw_type, 4)?;
            instance.write_u32(object.offset(OBJECT_HEADER), arguments[0].as_u32()?)?;
            Ok(Some(allocate_smart_pointer(instance, object)?.into()))
        })
        .expect("Failed to register factory");
    guest
        .register_function("widget_size", types.int, &[shared], |instance, arguments| {
            let object = instance.read_pointer(arguments[0].as_pointer()?)?;
            if object.is_null() {
                return Ok(Some(WireValue::I32(-1)));
            }
            Ok(Some(WireValue::I32(
                instance.read_u32(object.offset(OBJECT_HEADER))? as i32,
            )))
        })
        .expect("Failed to register function");
    (guest, types, widget, shared)
}

/// Test receiving a smart pointer, using it and deleting it.
#[test_log::test]
fn smart_pointers() {
    let (mut guest, _, _, _) = widget_class();
    let widget = guest
        .engine
        .call_function(&mut guest.instance, "make_widget", &[Value::I32(7)])
        .expect("Failed to make widget");

    assert_matches!(widget, Value::Class(_));
    assert_eq!(
        guest
            .engine
            .call_method(&mut guest.instance, &widget, "size", &[])
            .expect("Failed to call method"),
        Value::I32(7)
    );
    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "widget_size", &[widget.clone()])
            .expect("Failed to pass smart pointer"),
        Value::I32(7)
    );
    assert_eq!(guest.instance.live_allocations(), 2);

    guest
        .engine
        .delete_instance(&mut guest.instance, &widget)
        .expect("Failed to delete widget");

    // Only the cell is released, mock smart pointers don't own their object.
    assert_eq!(guest.instance.live_allocations(), 1);
    assert_eq!(guest.engine.live_class_handles(), 0);
}

/// Test that null smart pointers are built for null values and decoded as null.
#[test_log::test]
fn null_smart_pointers() {
    let (mut guest, _, _, shared) = widget_class();
    guest
        .register_function("no_widget", shared, &[], |instance, _| {
            Ok(Some(
                allocate_smart_pointer(instance, GuestPointer::NULL)?.into(),
            ))
        })
        .expect("Failed to register function");

    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "widget_size", &[Value::Null])
            .expect("Failed to pass null"),
        Value::I32(-1)
    );
    assert_eq!(
        guest
            .engine
            .call_function(&mut guest.instance, "no_widget", &[])
            .expect("Failed to call function"),
        Value::Null
    );
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test that a handle without a smart pointer can't be passed as one.
#[test_log::test]
fn raw_pointer_as_smart_pointer() {
    let (mut guest, _, widget, _) = widget_class();
    guest
        .register_function("raw_widget", widget.pointer, &[], move |instance, _| {
            Ok(Some(allocate_object(instance, widget.raw_type, 4)?.into()))
        })
        .expect("Failed to register function");
    let raw = guest
        .engine
        .call_function(&mut guest.instance, "raw_widget", &[])
        .expect("Failed to call function");

    assert_matches!(
        guest
            .engine
            .call_function(&mut guest.instance, "widget_size", &[raw.clone()]),
        Err(EmbindError::RawPointerAsSmartPointer)
    );

    guest
        .engine
        .delete_instance(&mut guest.instance, &raw)
        .expect("Failed to delete widget");
    assert_eq!(guest.instance.live_allocations(), 0);
}

/// Test that public symbols list functions and classes with their overloads.
#[test_log::test]
fn symbols() {
    let (guest, _, _, _) = widget_class();

    let symbols = guest.engine.symbols();
    let names = symbols
        .iter()
        .map(|symbol| symbol.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["Widget", "make_widget", "widget_size"]);

    let factory = &symbols[1];
    assert_eq!(factory.overloads.len(), 1);
    assert_eq!(factory.overloads[0].arg_count, Some(1));
    assert_eq!(factory.overloads[0].result_type, "std::shared_ptr<Widget>");
    assert_eq!(factory.overloads[0].argument_types, ["int"]);
    assert!(factory.overloads[0].is_bound);

    let classes = guest.engine.classes();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, "Widget");
    assert!(classes[0].is_registered);
    assert_eq!(classes[0].methods[0].name, "size");
}
