// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the symbol table and overload resolution.

use super::{Callable, Overload, SymbolSlot, SymbolTable};
use crate::{
    types::{RawTypeId, VoidType},
    EmbindError,
};
use assert_matches::assert_matches;
use std::rc::Rc;

/// Creates an overload whose message identifies it.
fn overload(label: &str, arg_count: Option<u32>, class_name: Option<&str>) -> Overload {
    Overload {
        arg_count,
        callable: Callable::Unbound {
            message: label.to_owned(),
            types: vec![RawTypeId(1)],
        },
        result_type: Rc::new(VoidType::new(RawTypeId(0), "void".to_owned())),
        argument_types: Vec::new(),
        class_name: class_name.map(str::to_owned),
    }
}

fn label(overload: &Overload) -> &str {
    match &overload.callable {
        Callable::Unbound { message, .. } => message,
        _ => panic!("Unexpected callable"),
    }
}

/// Test that symbols with different argument counts become an overload table.
#[test]
fn overloads_by_argument_count() {
    let mut symbols = SymbolTable::default();
    symbols
        .expose("f", overload("one", Some(1), None))
        .expect("Failed to expose first overload");
    symbols
        .expose("f", overload("two", Some(2), None))
        .expect("Failed to expose second overload");

    let slot = symbols.get("f").expect("Missing symbol");
    assert_matches!(slot, SymbolSlot::Overloaded(table) if table.len() == 2);
    assert_eq!(label(slot.resolve("f", 1).expect("Unresolved")), "one");
    assert_eq!(label(slot.resolve("f", 2).expect("Unresolved")), "two");
    assert_matches!(
        slot.resolve("f", 3),
        Err(EmbindError::NoMatchingOverload { actual: 3, expected, .. }) if expected == [1, 2]
    );
}

/// Test that a single symbol accepts any number of arguments at resolution.
#[test]
fn single_symbols_resolve_any_count() {
    let mut symbols = SymbolTable::default();
    symbols
        .expose("g", overload("only", Some(1), None))
        .expect("Failed to expose symbol");

    let slot = symbols.get("g").expect("Missing symbol");
    assert_eq!(label(slot.resolve("g", 5).expect("Unresolved")), "only");
}

/// Test that duplicate public symbols are rejected.
#[test]
fn reject_duplicates() {
    let mut symbols = SymbolTable::default();
    symbols
        .expose("f", overload("one", Some(1), None))
        .expect("Failed to expose symbol");
    symbols
        .expose("Point", overload("class", None, None))
        .expect("Failed to expose class symbol");

    assert_matches!(
        symbols.expose("f", overload("again", Some(1), None)),
        Err(EmbindError::DuplicatePublicSymbol(name)) if name == "f"
    );
    assert_matches!(
        symbols.expose("Point", overload("function", Some(0), None)),
        Err(EmbindError::DuplicatePublicSymbol(_))
    );
    assert_matches!(
        symbols.expose("f", overload("class", None, None)),
        Err(EmbindError::DuplicatePublicSymbol(_))
    );
}

/// Test that replacing a resolved overload keeps the other overloads.
#[test]
fn replace_resolved_overload() {
    let mut symbols = SymbolTable::default();
    symbols
        .expose("f", overload("one", Some(1), None))
        .expect("Failed to expose symbol");
    symbols
        .expose("f", overload("two", Some(2), None))
        .expect("Failed to expose symbol");

    symbols
        .replace("f", overload("bound", Some(2), None))
        .expect("Failed to replace symbol");

    let slot = symbols.get("f").expect("Missing symbol");
    assert_eq!(label(slot.resolve("f", 1).expect("Unresolved")), "one");
    assert_eq!(label(slot.resolve("f", 2).expect("Unresolved")), "bound");
    assert_matches!(
        symbols.replace("missing", overload("x", Some(0), None)),
        Err(EmbindError::UnknownSymbol(_))
    );
}

/// Test that a derived class member shadows an inherited member with the same arity.
#[test]
fn install_shadows_inherited_members() {
    let mut symbols = SymbolTable::default();
    let inherited = SymbolSlot::Single(overload("base", Some(1), Some("Base")));

    symbols.install(
        "area",
        Some(inherited.clone()),
        overload("derived", Some(1), Some("Derived")),
        true,
    );
    let slot = symbols.get("area").expect("Missing member");
    assert_matches!(slot, SymbolSlot::Single(member) if label(member) == "derived");

    symbols.install(
        "scale",
        Some(inherited),
        overload("derived", Some(2), Some("Derived")),
        true,
    );
    let slot = symbols.get("scale").expect("Missing member");
    assert_eq!(slot.overloads().len(), 2);
    assert_eq!(label(slot.resolve("scale", 1).expect("Unresolved")), "base");
}

/// Test that installing without shadowing builds an overload table.
#[test]
fn install_overloads() {
    let mut symbols = SymbolTable::default();
    symbols.install("m", None, overload("one", Some(1), Some("A")), false);
    let existing = symbols.get("m").cloned();
    symbols.install("m", existing, overload("other", Some(1), Some("A")), false);

    let slot = symbols.get("m").expect("Missing member");
    assert_matches!(slot, SymbolSlot::Overloaded(table) if table.len() == 1);
    assert_eq!(label(slot.resolve("m", 1).expect("Unresolved")), "other");
    assert!(symbols.contains("m"));
    assert_eq!(symbols.iter().count(), 1);
}
