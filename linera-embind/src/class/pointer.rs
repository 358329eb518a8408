// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Converters for references, raw pointers and smart pointers to registered classes.

use super::{ClassId, SmartHandle};
use crate::{
    emval::HostFunction,
    runtime::{GuestFunction, GuestPointer, Instance, WireValue},
    types::{Destructor, DestructorPolicy, Destructors, RawTypeId, RegisteredType},
    Engine, EmbindError, Value,
};
use std::rc::Rc;

/// How a smart pointer type shares ownership when built from an object it doesn't already wrap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SharingPolicy {
    /// Only the exact smart pointer type can be passed.
    None,
    /// The object keeps its own reference count.
    Intrusive,
    /// A new smart pointer is created that keeps a cloned handle alive until the guest releases
    /// it.
    ByEmval,
}

impl TryFrom<i32> for SharingPolicy {
    type Error = EmbindError;

    fn try_from(policy: i32) -> Result<Self, Self::Error> {
        match policy {
            0 => Ok(SharingPolicy::None),
            1 => Ok(SharingPolicy::Intrusive),
            2 => Ok(SharingPolicy::ByEmval),
            other => Err(EmbindError::Unsupported(format!("sharing policy {other}"))),
        }
    }
}

/// The guest functions of a smart pointer type.
#[derive(Debug)]
pub(crate) struct SmartPointer {
    pub(crate) pointee: PointerType,
    pub(crate) sharing_policy: SharingPolicy,
    pub(crate) get_pointee: GuestFunction,
    pub(crate) constructor: Option<GuestFunction>,
    pub(crate) share: Option<GuestFunction>,
    pub(crate) destructor: GuestFunction,
}

#[derive(Debug)]
struct PointerTypeInner {
    raw_type: RawTypeId,
    name: String,
    class: ClassId,
    is_reference: bool,
    is_const: bool,
    has_base: bool,
    smart: Option<SmartPointer>,
}

/// A reference, pointer or smart pointer to a registered class.
///
/// Clones refer to the same registered type, and type identity is pointer identity.
#[derive(Clone, Debug)]
pub(crate) struct PointerType(Rc<PointerTypeInner>);

impl PointerType {
    /// Creates the converter for a reference or raw pointer to `class`.
    pub(crate) fn new(
        raw_type: RawTypeId,
        name: String,
        class: ClassId,
        has_base: bool,
        is_reference: bool,
        is_const: bool,
    ) -> Self {
        PointerType(Rc::new(PointerTypeInner {
            raw_type,
            name,
            class,
            is_reference,
            is_const,
            has_base,
            smart: None,
        }))
    }

    /// Creates the converter for a smart pointer wrapping objects of the `smart.pointee` class.
    pub(crate) fn new_smart(raw_type: RawTypeId, name: String, smart: SmartPointer) -> Self {
        PointerType(Rc::new(PointerTypeInner {
            raw_type,
            name,
            class: smart.pointee.class(),
            is_reference: false,
            is_const: false,
            has_base: smart.pointee.0.has_base,
            smart: Some(smart),
        }))
    }

    pub(crate) fn class(&self) -> ClassId {
        self.0.class
    }

    pub(crate) fn is_const(&self) -> bool {
        self.0.is_const
    }

    pub(crate) fn smart(&self) -> Option<&SmartPointer> {
        self.0.smart.as_ref()
    }

    pub(crate) fn same(&self, other: &PointerType) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Extracts the object pointer from a wire pointer, which for smart pointers wraps it.
    fn get_pointee(
        &self,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<GuestPointer, EmbindError> {
        match self.smart() {
            Some(smart) => call_for_pointer(instance, &smart.get_pointee, &[pointer.into()]),
            None => Ok(pointer),
        }
    }

    /// Releases a wire pointer that will not be wrapped in a handle.
    fn release(&self, instance: &mut dyn Instance, pointer: GuestPointer) -> Result<(), EmbindError> {
        if let Some(smart) = self.smart() {
            instance.call_indirect(&smart.destructor, &[pointer.into()])?;
        }
        Ok(())
    }

    fn to_wire_pointer(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<GuestPointer, EmbindError> {
        if let Value::Null = value {
            if self.0.is_reference {
                return Err(EmbindError::NullReference(self.0.name.clone()));
            }
            if let Some(smart) = self.smart() {
                if let Some(constructor) = &smart.constructor {
                    let pointer = call_for_pointer(instance, constructor, &[])?;
                    if let Some(destructors) = destructors {
                        destructors.push(Destructor::Call {
                            function: smart.destructor.clone(),
                            argument: pointer.into(),
                        });
                    }
                    return Ok(pointer);
                }
            }
            return Ok(GuestPointer::NULL);
        }

        let handle = value
            .class_handle()
            .ok_or_else(|| EmbindError::NotAnInstance {
                expected: self.0.name.clone(),
                actual: value.kind(),
            })?;
        let state = engine
            .state()
            .handles
            .get(handle)
            .cloned()
            .map_err(|_| EmbindError::DeletedObject(format!("a pointer of type {}", self.0.name)))?;
        if !self.is_const() && state.pointer_type.is_const() {
            let actual = state
                .smart
                .as_ref()
                .map_or(&state.pointer_type, |smart| &smart.pointer_type);
            return Err(EmbindError::IncompatiblePointer {
                expected: self.0.name.clone(),
                actual: actual.0.name.clone(),
            });
        }
        let pointer = engine.upcast_pointer(
            instance,
            state.pointer,
            state.pointer_type.class(),
            self.class(),
        )?;
        let Some(smart) = self.smart() else {
            return Ok(pointer);
        };
        let Some(handle_smart) = state.smart else {
            return Err(EmbindError::RawPointerAsSmartPointer);
        };
        match smart.sharing_policy {
            SharingPolicy::Intrusive => Ok(handle_smart.pointer),
            _ if handle_smart.pointer_type.same(self) => Ok(handle_smart.pointer),
            SharingPolicy::None => Err(EmbindError::IncompatiblePointer {
                expected: self.0.name.clone(),
                actual: handle_smart.pointer_type.0.name.clone(),
            }),
            SharingPolicy::ByEmval => {
                let share = smart.share.as_ref().ok_or_else(|| {
                    EmbindError::Unsupported(format!("sharing into {} without a share function", self.0.name))
                })?;
                let cloned = engine.clone_handle(handle)?;
                let deleter = HostFunction::new("deleter", move |engine, instance, _| {
                    engine.delete_handle(instance, cloned)?;
                    Ok(Value::Undefined)
                });
                let deleter = engine.emval_handle(Value::Host(deleter));
                let shared =
                    call_for_pointer(instance, share, &[pointer.into(), WireValue::I32(deleter)])?;
                if let Some(destructors) = destructors {
                    destructors.push(Destructor::Call {
                        function: smart.destructor.clone(),
                        argument: shared.into(),
                    });
                }
                Ok(shared)
            }
        }
    }

    fn from_wire_pointer(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        let raw_pointer = self.get_pointee(instance, pointer)?;
        if raw_pointer.is_null() {
            self.release(instance, pointer)?;
            return Ok(Value::Null);
        }

        let default_type = match self.smart() {
            Some(smart) => smart.pointee.clone(),
            None => self.clone(),
        };
        let (pointer_type, object) = match self.dynamic_type(engine, instance, raw_pointer)? {
            Some(dynamic) => dynamic,
            None => (default_type, raw_pointer),
        };
        let smart = self.smart().map(|_| SmartHandle {
            pointer,
            pointer_type: self.clone(),
        });
        let handle = engine
            .state_mut()
            .handles
            .create(object, pointer_type, smart);
        engine.class_value(handle)
    }

    /// Finds the most derived registered type of the object at `raw_pointer`, with the object
    /// pointer adjusted to that type.
    fn dynamic_type(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        raw_pointer: GuestPointer,
    ) -> Result<Option<(PointerType, GuestPointer)>, EmbindError> {
        let get_actual_type = engine
            .state()
            .classes
            .get(self.class())
            .hooks
            .get_actual_type
            .clone();
        let Some(get_actual_type) = get_actual_type else {
            return Ok(None);
        };
        let results = instance.call_indirect(&get_actual_type, &[raw_pointer.into()])?;
        let actual_type = match get_actual_type.single_result(results)? {
            Some(wire) => RawTypeId(wire.as_i32()?),
            None => return Ok(None),
        };
        let target = engine
            .state()
            .registered_pointers
            .get(&actual_type)
            .map(|registered| {
                if self.is_const() {
                    registered.const_pointer.clone()
                } else {
                    registered.pointer.clone()
                }
            });
        let Some(target) = target else {
            return Ok(None);
        };
        Ok(engine
            .downcast_pointer(instance, raw_pointer, self.class(), target.class())?
            .map(|object| (target, object)))
    }
}

/// Calls a guest function returning a pointer.
pub(crate) fn call_for_pointer(
    instance: &mut dyn Instance,
    function: &GuestFunction,
    arguments: &[WireValue],
) -> Result<GuestPointer, EmbindError> {
    let results = instance.call_indirect(function, arguments)?;
    match function.single_result(results)? {
        Some(wire) => Ok(wire.as_pointer()?),
        None => Err(EmbindError::Decode(format!(
            "function {} returned no pointer",
            function.index()
        ))),
    }
}

impl RegisteredType for PointerType {
    fn raw_type(&self) -> RawTypeId {
        self.0.raw_type
    }

    fn name(&self) -> &str {
        &self.0.name
    }

    fn host_type(&self) -> &'static str {
        "ClassHandle"
    }

    fn destructor_policy(&self) -> DestructorPolicy {
        if self.smart().is_none() && !self.0.has_base {
            DestructorPolicy::Trivial
        } else {
            DestructorPolicy::Deferred
        }
    }

    fn from_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        self.from_wire_pointer(engine, instance, wire.as_pointer()?)
    }

    fn to_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        Ok(self
            .to_wire_pointer(engine, instance, destructors, value)?
            .into())
    }

    fn has_delete_object(&self) -> bool {
        true
    }

    fn delete_object(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        value: &Value,
    ) -> Result<(), EmbindError> {
        match value.class_handle() {
            Some(handle) => engine.delete_handle(instance, handle),
            None => Ok(()),
        }
    }

    fn as_pointer(&self) -> Option<&PointerType> {
        Some(self)
    }
}
