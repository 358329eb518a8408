// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire-type converters.
//!
//! Every type the guest registers is represented by a [`RegisteredType`], which converts values
//! between the host representation ([`Value`]) and the wire words and memory layouts used by the
//! guest.

mod any;
mod emval;
mod enumeration;
mod field;
mod memory_view;
mod primitive;
mod string;
mod value_array;
mod value_object;

pub(crate) use self::{
    any::AnyType,
    emval::EmvalType,
    enumeration::{EnumDescriptor, EnumType},
    field::FieldRegistration,
    memory_view::MemoryViewType,
    primitive::{BigIntType, BoolType, FloatType, IntegerType, VoidType},
    string::{StdStringType, StdWStringType},
    value_array::{TupleRegistration, TupleType},
    value_object::{StructRegistration, StructType},
};
use crate::{
    class::PointerType,
    runtime::{GuestFunction, GuestPointer, Instance, WireKind, WireValue},
    Engine, EmbindError, Value,
};
use std::fmt;

/// The number of bytes every non-void argument occupies in a packed argument list.
pub(crate) const GENERIC_WIRE_TYPE_SIZE: u32 = 8;

/// The guest-assigned identifier of a registered type.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RawTypeId(pub i32);

impl From<i32> for RawTypeId {
    fn from(raw_type: i32) -> Self {
        RawTypeId(raw_type)
    }
}

impl fmt::Display for RawTypeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// How the values of a type are cleaned up after a call into the guest.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum DestructorPolicy {
    /// Wire values own nothing.
    Trivial,
    /// Every wire value is released by [`RegisteredType::destructor`].
    Function,
    /// Conversions push their cleanup actions onto a per-call destructor stack.
    Deferred,
}

/// A cleanup action for a wire value handed to the guest.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Destructor {
    /// Release memory obtained from the guest's allocator.
    Free(GuestPointer),
    /// Call a guest function with a single argument.
    Call {
        function: GuestFunction,
        argument: WireValue,
    },
}

impl Destructor {
    pub(crate) fn run(self, engine: &Engine, instance: &mut dyn Instance) -> Result<(), EmbindError> {
        match self {
            Destructor::Free(pointer) => engine.free(instance, pointer),
            Destructor::Call { function, argument } => {
                instance.call_indirect(&function, &[argument])?;
                Ok(())
            }
        }
    }
}

/// The destructor stack of a call, if the call keeps one.
pub(crate) type Destructors<'a> = Option<&'a mut Vec<Destructor>>;

/// Runs `destructors` in reverse order of registration.
pub(crate) fn run_destructors(
    engine: &Engine,
    instance: &mut dyn Instance,
    destructors: Vec<Destructor>,
) -> Result<(), EmbindError> {
    for destructor in destructors.into_iter().rev() {
        destructor.run(engine, instance)?;
    }
    Ok(())
}

/// A type registered by the guest, with the conversions between its host and wire
/// representations.
pub(crate) trait RegisteredType {
    /// The guest's identifier for this type.
    fn raw_type(&self) -> RawTypeId;

    /// The name of the type, as registered by the guest.
    fn name(&self) -> &str;

    /// The host representation, for introspection.
    fn host_type(&self) -> &'static str;

    /// The kind of wire word used to pass values of this type, or [`None`] for `void`.
    fn native_kind(&self) -> Option<WireKind> {
        Some(WireKind::I32)
    }

    /// The space a value of this type occupies in a packed argument list.
    fn arg_pack_advance(&self) -> u32 {
        GENERIC_WIRE_TYPE_SIZE
    }

    fn destructor_policy(&self) -> DestructorPolicy {
        DestructorPolicy::Trivial
    }

    /// The cleanup action for a wire value, for types with [`DestructorPolicy::Function`].
    fn destructor(&self, _wire: WireValue) -> Option<Destructor> {
        None
    }

    /// Converts a wire value received from the guest into a host value.
    fn from_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError>;

    /// Converts a host value into a wire value to send to the guest.
    ///
    /// Owning types register cleanup actions in `destructors` when it is provided.
    fn to_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError>;

    /// Reads a value stored in the guest's memory at `pointer`.
    fn read_from_pointer(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        let wire = WireValue::I32(instance.read_u32(pointer)? as i32);
        self.from_wire(engine, instance, wire)
    }

    /// Returns `true` if values received as emval call arguments must be explicitly released.
    fn has_delete_object(&self) -> bool {
        false
    }

    /// Releases a value received as an emval call argument.
    fn delete_object(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _value: &Value,
    ) -> Result<(), EmbindError> {
        Ok(())
    }

    /// Converts the float64 used to transport constants into a wire value.
    fn wire_from_f64(&self, value: f64) -> WireValue {
        match self.native_kind() {
            Some(WireKind::I32) | None => WireValue::I32(value as i64 as i32),
            Some(WireKind::I64) if value < 0.0 => WireValue::I64(value as i64),
            Some(WireKind::I64) => WireValue::I64(value as u64 as i64),
            Some(WireKind::F32) => WireValue::F32(value as f32),
            Some(WireKind::F64) => WireValue::F64(value),
        }
    }

    /// Converts a wire value into the float64 used by the emval return convention.
    fn wire_to_f64(&self, wire: WireValue) -> f64 {
        wire.to_f64()
    }

    /// Returns the class pointer representation, if this is a class pointer type.
    fn as_pointer(&self) -> Option<&PointerType> {
        None
    }

    /// Returns the enum representation, if this is an enum type.
    fn as_enum(&self) -> Option<&EnumType> {
        None
    }
}

impl fmt::Debug for dyn RegisteredType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RegisteredType")
            .field("raw_type", &self.raw_type())
            .field("name", &self.name())
            .finish()
    }
}

/// Builds the error for a host value of the wrong kind.
pub(crate) fn mismatch(expected: &'static str, value: &Value) -> EmbindError {
    EmbindError::TypeMismatch {
        expected,
        actual: value.kind(),
    }
}

#[cfg(test)]
#[path = "unit_tests/primitive.rs"]
mod primitive_tests;

#[cfg(test)]
#[path = "unit_tests/string.rs"]
mod string_tests;
