// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the type registry and deferred registrations.

use super::RegisterOptions;
use crate::{
    runtime::MockInstance,
    types::{IntegerType, RawTypeId, RegisteredType, VoidType},
    EmbindError, Engine,
};
use assert_matches::assert_matches;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

fn integer(raw_type: i32, name: &str) -> Rc<dyn RegisteredType> {
    Rc::new(
        IntegerType::new(RawTypeId(raw_type), name.to_owned(), 4, -1)
            .expect("Failed to create integer type"),
    )
}

/// Test that registrations wait for their dependencies, in any registration order.
#[test]
fn deferred_resolution() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let resolved_names = Rc::new(Cell::new(None));
    let resolved_names_in_continuation = resolved_names.clone();

    engine
        .when_dependent_types_are_resolved(
            &mut instance,
            vec![RawTypeId(10)],
            vec![RawTypeId(2), RawTypeId(1)],
            Box::new(move |_, _, types| {
                let names = types
                    .iter()
                    .map(|registered| registered.name().to_owned())
                    .collect::<Vec<_>>();
                resolved_names_in_continuation.set(Some(names));
                Ok(vec![integer(10, "derived")])
            }),
        )
        .expect("Failed to defer registration");

    assert_eq!(engine.registered_type_count(), 0);
    assert_eq!(
        engine.state().registry.awaited(),
        vec![RawTypeId(1), RawTypeId(2)]
    );

    engine
        .register_type(&mut instance, integer(1, "first"), RegisterOptions::default())
        .expect("Failed to register type");
    assert!(!engine.state().registry.contains(RawTypeId(10)));

    engine
        .register_type(&mut instance, integer(2, "second"), RegisterOptions::default())
        .expect("Failed to register type");

    assert!(engine.state().registry.contains(RawTypeId(10)));
    assert_eq!(
        resolved_names.take(),
        Some(vec!["second".to_owned(), "first".to_owned()])
    );
    assert!(engine.state().registry.awaited().is_empty());
}

/// Test that registrations waiting on the same type resume in the order they were queued, even
/// when one of them fails.
#[test]
fn waiters_resume_in_order() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    let order = Rc::new(RefCell::new(Vec::new()));

    for (produced, name) in [(10, "first"), (11, "failing"), (12, "last")] {
        let order = order.clone();
        engine
            .when_dependent_types_are_resolved(
                &mut instance,
                vec![RawTypeId(produced)],
                vec![RawTypeId(1)],
                Box::new(move |_, _, _| {
                    order.borrow_mut().push(name);
                    if name == "failing" {
                        return Err(EmbindError::RegistrationMismatch(name.to_owned()));
                    }
                    Ok(vec![integer(produced, name)])
                }),
            )
            .expect("Failed to defer registration");
    }

    assert_matches!(
        engine.register_type(&mut instance, integer(1, "int"), RegisterOptions::default()),
        Err(EmbindError::RegistrationMismatch(name)) if name == "failing"
    );
    assert_eq!(*order.borrow(), ["first", "failing", "last"]);
    assert!(engine.state().registry.contains(RawTypeId(10)));
    assert!(!engine.state().registry.contains(RawTypeId(11)));
    assert!(engine.state().registry.contains(RawTypeId(12)));
}

/// Test that registrations whose dependencies are present resolve immediately.
#[test]
fn immediate_resolution() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    engine
        .register_type(&mut instance, integer(1, "int"), RegisterOptions::default())
        .expect("Failed to register type");

    engine
        .when_dependent_types_are_resolved(
            &mut instance,
            vec![RawTypeId(5)],
            vec![RawTypeId(1)],
            Box::new(|_, _, _| Ok(vec![integer(5, "alias")])),
        )
        .expect("Failed to resolve registration");

    assert_eq!(engine.registered_type_count(), 2);
}

/// Test that the continuation must produce one type per produced id.
#[test]
fn mismatched_converter_count() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();

    assert_matches!(
        engine.when_dependent_types_are_resolved(
            &mut instance,
            vec![RawTypeId(5), RawTypeId(6)],
            vec![],
            Box::new(|_, _, _| Ok(vec![integer(5, "only")])),
        ),
        Err(EmbindError::RegistrationMismatch(_))
    );
}

/// Test duplicate and invalid type ids.
#[test]
fn duplicate_and_invalid_types() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    engine
        .register_type(&mut instance, integer(1, "int"), RegisterOptions::default())
        .expect("Failed to register type");

    assert_matches!(
        engine.register_type(&mut instance, integer(1, "long"), RegisterOptions::default()),
        Err(EmbindError::DuplicateType(name)) if name == "long"
    );
    engine
        .register_type(
            &mut instance,
            integer(1, "long"),
            RegisterOptions {
                ignore_duplicates: true,
            },
        )
        .expect("Ignored duplicate was rejected");
    assert_eq!(
        engine
            .state()
            .registry
            .get(RawTypeId(1))
            .expect("Missing type")
            .name(),
        "int"
    );

    assert_matches!(
        engine.register_type(
            &mut instance,
            Rc::new(VoidType::new(RawTypeId(0), "void".to_owned())),
            RegisterOptions::default()
        ),
        Err(EmbindError::InvalidTypeId(_))
    );
}

/// Test that unbound type errors name the missing types behind pending registrations.
#[test]
fn unbound_types_follow_pending_dependencies() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    instance.set_type_name(3, "Missing");
    instance.set_type_name(4, "AlsoMissing");
    engine
        .register_type(&mut instance, integer(1, "int"), RegisterOptions::default())
        .expect("Failed to register type");
    engine
        .when_dependent_types_are_resolved(
            &mut instance,
            vec![RawTypeId(2)],
            vec![RawTypeId(1), RawTypeId(3)],
            Box::new(|_, _, _| Ok(vec![integer(2, "pending")])),
        )
        .expect("Failed to defer registration");

    let error = engine.unbound_type_error(
        &mut instance,
        "Cannot call f",
        &[RawTypeId(1), RawTypeId(2), RawTypeId(4)],
    );

    assert_matches!(
        error,
        EmbindError::UnboundTypes { message, types }
            if message == "Cannot call f" && types == ["Missing", "AlsoMissing"]
    );
    assert_eq!(instance.live_allocations(), 0);
}

/// Test reading type id lists and the message for unknown types.
#[test]
fn type_lists_and_unknown_types() {
    let engine = Engine::default();
    let mut instance = MockInstance::default();
    instance.set_type_name(9, "Unknown");
    let list = instance.store_u32_array(&[1, 9, u32::MAX]);

    assert_eq!(
        engine
            .read_type_ids(&mut instance, 3, list)
            .expect("Failed to read type list"),
        vec![RawTypeId(1), RawTypeId(9), RawTypeId(-1)]
    );
    assert_matches!(
        engine.require_registered_type(&mut instance, RawTypeId(9), "parameter 0"),
        Err(EmbindError::UnknownType { context, type_name })
            if context == "parameter 0" && type_name == "Unknown"
    );
}
