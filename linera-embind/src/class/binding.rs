// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::ClassHandle;
use std::{any::Any, rc::Rc};

/// A host type that wraps handles of a guest class.
pub trait ClassInstance {
    /// The handle of the wrapped guest object.
    fn class_handle(&self) -> ClassHandle;

    /// Allows downcasting to the concrete host type.
    fn as_any(&self) -> &dyn Any;
}

/// Builds host wrappers for the instances of a guest class.
///
/// When a binding is registered for a class, every handle the engine creates for that class is
/// returned as a [`crate::Value::Instance`] built by the binding.
pub trait ClassBinding {
    /// Wraps a freshly created handle.
    fn materialize(&self, handle: ClassHandle) -> Rc<dyn ClassInstance>;
}

impl<F> ClassBinding for F
where
    F: Fn(ClassHandle) -> Rc<dyn ClassInstance>,
{
    fn materialize(&self, handle: ClassHandle) -> Rc<dyn ClassInstance> {
        self(handle)
    }
}
