// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reference counting, deletion and deferred deletion of class instance handles.

use super::Engine;
use crate::{
    class::{ClassHandle, ClassId, HandleState},
    runtime::{GuestPointer, Instance},
    EmbindError, Value,
};
use std::rc::Rc;
use tracing::debug;

/// A function called when the first handle is scheduled for deferred deletion.
///
/// It receives the means to flush the deletion queue later, typically from an event loop.
pub type DelayFunction = Rc<dyn Fn(PendingDeletes) -> Result<(), EmbindError>>;

/// Access to an engine's queue of handles scheduled for deletion.
#[derive(Clone)]
pub struct PendingDeletes {
    engine: Engine,
}

impl PendingDeletes {
    /// Deletes every scheduled handle, returning how many were deleted.
    pub fn flush(&self, instance: &mut dyn Instance) -> Result<usize, EmbindError> {
        self.engine.flush_pending_deletes(instance)
    }

    /// The number of handles waiting for deletion.
    pub fn len(&self) -> usize {
        self.engine.pending_deletes()
    }

    /// Returns `true` if no handle is waiting for deletion.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn handle_of(value: &Value) -> Result<ClassHandle, EmbindError> {
    value.class_handle().ok_or_else(|| EmbindError::NotAnInstance {
        expected: "class instance".to_owned(),
        actual: value.kind(),
    })
}

impl Engine {
    /// Creates a new handle to the same guest object, sharing its reference count.
    pub fn clone_instance(&self, value: &Value) -> Result<Value, EmbindError> {
        let handle = self.clone_handle(handle_of(value)?)?;
        self.class_value(handle)
    }

    pub(crate) fn clone_handle(&self, handle: ClassHandle) -> Result<ClassHandle, EmbindError> {
        self.state_mut().handles.share(handle)
    }

    /// Deletes a handle, destroying the guest object when it was the last handle to it.
    pub fn delete_instance(
        &self,
        instance: &mut dyn Instance,
        value: &Value,
    ) -> Result<(), EmbindError> {
        self.delete_handle(instance, handle_of(value)?)
    }

    pub(crate) fn delete_handle(
        &self,
        instance: &mut dyn Instance,
        handle: ClassHandle,
    ) -> Result<(), EmbindError> {
        let released = {
            let mut state = self.state_mut();
            let handle_state = state.handles.get(handle)?;
            let preserve = handle_state.preserve_pointer_on_delete;
            if handle_state.delete_scheduled && !preserve {
                return Err(EmbindError::AlreadyScheduledForDeletion);
            }
            let released = state.handles.release(handle)?;
            if !preserve {
                state.handles.remove(handle)?;
            }
            released
        };
        match released {
            Some(released) => self.destroy(instance, released),
            None => Ok(()),
        }
    }

    /// Runs the guest destructor of the object, or of its smart pointer.
    fn destroy(&self, instance: &mut dyn Instance, released: HandleState) -> Result<(), EmbindError> {
        let (function, pointer) = match &released.smart {
            Some(smart) => {
                let Some(smart_pointer) = smart.pointer_type.smart() else {
                    return Ok(());
                };
                (smart_pointer.destructor.clone(), smart.pointer)
            }
            None => {
                let state = self.state();
                let destructor = state
                    .classes
                    .get(released.pointer_type.class())
                    .hooks
                    .destructor
                    .clone();
                let Some(destructor) = destructor else {
                    return Ok(());
                };
                (destructor, released.pointer)
            }
        };
        debug!(%pointer, "Destroying guest object");
        instance.call_indirect(&function, &[pointer.into()])?;
        Ok(())
    }

    /// Schedules a handle for deletion by [`Engine::flush_pending_deletes`], returning the same
    /// handle.
    ///
    /// The delay function, if any, is called when the queue goes from empty to non-empty.
    pub fn delete_later(&self, value: &Value) -> Result<Value, EmbindError> {
        let handle = handle_of(value)?;
        let (first, delay_function) = {
            let mut state = self.state_mut();
            let handle_state = state.handles.get_mut(handle)?;
            if handle_state.delete_scheduled && !handle_state.preserve_pointer_on_delete {
                return Err(EmbindError::AlreadyScheduledForDeletion);
            }
            handle_state.delete_scheduled = true;
            state.deletion_queue.push(handle);
            (state.deletion_queue.len() == 1, state.delay_function.clone())
        };
        if let (true, Some(delay_function)) = (first, delay_function) {
            delay_function(PendingDeletes {
                engine: self.clone(),
            })?;
        }
        Ok(value.clone())
    }

    /// Deletes the handles scheduled with [`Engine::delete_later`], most recently scheduled
    /// first.
    ///
    /// Stops at the first failure. A handle that survives its failed deletion goes back to the
    /// queue.
    pub fn flush_pending_deletes(&self, instance: &mut dyn Instance) -> Result<usize, EmbindError> {
        let mut deleted = 0;
        loop {
            let handle = {
                let mut state = self.state_mut();
                let Some(handle) = state.deletion_queue.pop() else {
                    break;
                };
                if let Ok(handle_state) = state.handles.get_mut(handle) {
                    handle_state.delete_scheduled = false;
                }
                handle
            };
            if let Err(error) = self.delete_handle(instance, handle) {
                let mut state = self.state_mut();
                let state = &mut *state;
                if let Ok(handle_state) = state.handles.get_mut(handle) {
                    handle_state.delete_scheduled = true;
                    state.deletion_queue.push(handle);
                }
                return Err(error);
            }
            deleted += 1;
        }
        if deleted > 0 {
            debug!(deleted, "Flushed pending deletes");
        }
        Ok(deleted)
    }

    /// The number of handles scheduled for deletion.
    pub fn pending_deletes(&self) -> usize {
        self.state().deletion_queue.len()
    }

    /// Sets the function notified when handles start waiting for deletion.
    ///
    /// If handles are already waiting, the function is called right away.
    pub fn set_delay_function(
        &self,
        delay_function: Option<DelayFunction>,
    ) -> Result<(), EmbindError> {
        let pending = {
            let mut state = self.state_mut();
            state.delay_function = delay_function.clone();
            !state.deletion_queue.is_empty()
        };
        match delay_function {
            Some(delay_function) if pending => delay_function(PendingDeletes {
                engine: self.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Returns `true` if the handle was deleted.
    pub fn is_deleted(&self, value: &Value) -> Result<bool, EmbindError> {
        let handle = handle_of(value)?;
        Ok(!self.state().handles.contains(handle))
    }

    /// Returns `true` if both handles refer to the same guest object, even through different
    /// classes of its hierarchy.
    pub fn is_alias_of(
        &self,
        instance: &mut dyn Instance,
        left: &Value,
        right: &Value,
    ) -> Result<bool, EmbindError> {
        let (Some(left), Some(right)) = (left.class_handle(), right.class_handle()) else {
            return Ok(false);
        };
        let left = self.root_object(instance, left)?;
        let right = self.root_object(instance, right)?;
        Ok(left.is_some() && left == right)
    }

    /// The root class of the handle's object, with the object pointer adjusted to it.
    fn root_object(
        &self,
        instance: &mut dyn Instance,
        handle: ClassHandle,
    ) -> Result<Option<(ClassId, GuestPointer)>, EmbindError> {
        let (pointer, class, root) = {
            let state = self.state();
            let Ok(handle_state) = state.handles.get(handle) else {
                return Ok(None);
            };
            let class = handle_state.pointer_type.class();
            let root = state.classes.ancestry(class).last().unwrap_or(class);
            (handle_state.pointer, class, root)
        };
        let pointer = self.upcast_pointer(instance, pointer, class, root)?;
        Ok(Some((root, pointer)))
    }

    /// The number of handles sharing the guest object of this handle.
    pub fn reference_count(&self, value: &Value) -> Result<u32, EmbindError> {
        let handle = handle_of(value)?;
        self.state().handles.count(handle)
    }

    /// The number of live class instance handles.
    pub fn live_class_handles(&self) -> usize {
        self.state().handles.live()
    }

    /// Makes deleting this handle keep it usable, for objects the guest keeps alive itself.
    pub fn set_preserve_pointer_on_delete(
        &self,
        value: &Value,
        preserve: bool,
    ) -> Result<(), EmbindError> {
        let handle = handle_of(value)?;
        self.state_mut().handles.get_mut(handle)?.preserve_pointer_on_delete = preserve;
        Ok(())
    }
}
