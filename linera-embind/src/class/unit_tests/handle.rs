// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unit tests for the class handle arena.

use super::HandleTable;
use crate::{
    class::{ClassId, PointerType},
    runtime::GuestPointer,
    types::RawTypeId,
    EmbindError,
};
use assert_matches::assert_matches;

fn pointer_type() -> PointerType {
    PointerType::new(RawTypeId(1), "Thing*".to_owned(), ClassId(0), false, false, false)
}

/// Test that shared handles keep the object alive until the last reference is released.
#[test]
fn shared_reference_count() {
    let mut table = HandleTable::default();
    let handle = table.create(GuestPointer(64), pointer_type(), None);
    let copy = table.share(handle).expect("Failed to share handle");

    assert_ne!(handle, copy);
    assert_eq!(table.live(), 2);
    assert_eq!(table.live_records(), 1);
    assert_eq!(table.get(copy).expect("Missing handle").pointer, GuestPointer(64));
    assert_eq!(table.count(handle).expect("Missing handle"), 2);
    assert_eq!(table.count(copy).expect("Missing handle"), 2);

    assert!(table.release(handle).expect("Failed to release").is_none());
    table.remove(handle).expect("Failed to remove handle");
    assert_eq!(table.count(copy).expect("Missing handle"), 1);

    let released = table
        .release(copy)
        .expect("Failed to release")
        .expect("Last reference not reported");

    assert_eq!(released.pointer, GuestPointer(64));
    assert_eq!(table.count(copy).expect("Missing handle"), 0);
    assert_eq!(table.live_records(), 0);
    assert!(table.release(copy).expect("Failed to release").is_none());
}

/// Test that freed ownership records are reused without reviving old counts.
#[test]
fn reused_records() {
    let mut table = HandleTable::default();
    let first = table.create(GuestPointer(8), pointer_type(), None);
    table
        .get_mut(first)
        .expect("Missing handle")
        .preserve_pointer_on_delete = true;
    assert!(table.release(first).expect("Failed to release").is_some());

    let second = table.create(GuestPointer(16), pointer_type(), None);

    assert_eq!(table.live_records(), 1);
    assert_eq!(table.count(first).expect("Missing handle"), 0);
    assert_eq!(table.count(second).expect("Missing handle"), 1);
    assert!(table.release(first).expect("Failed to release").is_none());
    assert_eq!(table.count(second).expect("Missing handle"), 1);
}

/// Test that reused slots don't resurrect stale handles.
#[test]
fn stale_handles() {
    let mut table = HandleTable::default();
    let first = table.create(GuestPointer(8), pointer_type(), None);
    table.remove(first).expect("Failed to remove handle");

    let second = table.create(GuestPointer(16), pointer_type(), None);

    assert_ne!(first, second);
    assert!(!table.contains(first));
    assert!(table.contains(second));
    assert_matches!(table.get(first), Err(EmbindError::AlreadyDeleted));
    assert_matches!(table.remove(first), Err(EmbindError::AlreadyDeleted));
    assert_eq!(table.live(), 1);
}

/// Test that handles preserving their pointer are shared as themselves.
#[test]
fn preserved_handles_share_themselves() {
    let mut table = HandleTable::default();
    let handle = table.create(GuestPointer(8), pointer_type(), None);
    table
        .get_mut(handle)
        .expect("Missing handle")
        .preserve_pointer_on_delete = true;

    let copy = table.share(handle).expect("Failed to share handle");

    assert_eq!(copy, handle);
    assert_eq!(table.live(), 1);
    assert_eq!(table.count(handle).expect("Missing handle"), 2);
    assert_eq!(table.live_records(), 1);
}
