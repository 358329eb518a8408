// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Converters for `void`, `bool`, integers, 64-bit integers and floats.

use super::{mismatch, DestructorPolicy, Destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{GuestPointer, Instance, WireKind, WireValue},
    Engine, EmbindError, Value,
};

/// The `void` type, only meaningful as a result type.
pub(crate) struct VoidType {
    raw_type: RawTypeId,
    name: String,
}

impl VoidType {
    pub(crate) fn new(raw_type: RawTypeId, name: String) -> Self {
        VoidType { raw_type, name }
    }
}

impl RegisteredType for VoidType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "()"
    }

    fn native_kind(&self) -> Option<WireKind> {
        None
    }

    fn arg_pack_advance(&self) -> u32 {
        0
    }

    fn destructor_policy(&self) -> DestructorPolicy {
        DestructorPolicy::Deferred
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _wire: WireValue,
    ) -> Result<Value, EmbindError> {
        Ok(Value::Undefined)
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        match value {
            Value::Undefined => Ok(WireValue::I32(0)),
            other => Err(mismatch("()", other)),
        }
    }
}

/// The `bool` type, with the wire words the guest uses for both truth values.
pub(crate) struct BoolType {
    raw_type: RawTypeId,
    name: String,
    true_value: i32,
    false_value: i32,
}

impl BoolType {
    pub(crate) fn new(raw_type: RawTypeId, name: String, true_value: i32, false_value: i32) -> Self {
        BoolType {
            raw_type,
            name,
            true_value,
            false_value,
        }
    }
}

impl RegisteredType for BoolType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "bool"
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        Ok(Value::Bool(wire.as_i32()? != 0))
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        Ok(WireValue::I32(if value.is_truthy() {
            self.true_value
        } else {
            self.false_value
        }))
    }

    fn read_from_pointer(
        &self,
        _engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        Ok(Value::Bool(instance.read_u8(pointer)? != 0))
    }
}

/// Integer types of up to 32 bits.
#[derive(Debug)]
pub(crate) struct IntegerType {
    raw_type: RawTypeId,
    name: String,
    size: u32,
    signed: bool,
}

impl IntegerType {
    /// Creates the converter for an integer registered with `size` bytes.
    ///
    /// The type is unsigned if and only if its minimum value is zero.
    pub(crate) fn new(
        raw_type: RawTypeId,
        name: String,
        size: u32,
        min_range: i64,
    ) -> Result<Self, EmbindError> {
        if !matches!(size, 1 | 2 | 4) {
            return Err(EmbindError::Unsupported(format!(
                "integer type {name} with size {size}"
            )));
        }
        Ok(IntegerType {
            raw_type,
            name,
            size,
            signed: min_range != 0,
        })
    }
}

impl RegisteredType for IntegerType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        match (self.size, self.signed) {
            (1, true) => "i8",
            (1, false) => "u8",
            (2, true) => "i16",
            (2, false) => "u16",
            (_, true) => "i32",
            (_, false) => "u32",
        }
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let value = wire.as_i32()?;
        Ok(match (self.size, self.signed) {
            (1, true) => Value::I8(value as i8),
            (1, false) => Value::U8(value as u8),
            (2, true) => Value::I16(value as i16),
            (2, false) => Value::U16(value as u16),
            (_, true) => Value::I32(value),
            (_, false) => Value::U32(value as u32),
        })
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        let wire = match (self.size, self.signed, value) {
            (1, true, Value::I8(value)) => i32::from(*value),
            (1, false, Value::U8(value)) => i32::from(*value),
            (2, true, Value::I16(value)) => i32::from(*value),
            (2, false, Value::U16(value)) => i32::from(*value),
            (4, true, Value::I32(value)) => *value,
            (4, false, Value::U32(value)) => *value as i32,
            _ => return Err(mismatch(self.host_type(), value)),
        };
        Ok(WireValue::I32(wire))
    }

    fn read_from_pointer(
        &self,
        _engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        Ok(match (self.size, self.signed) {
            (1, true) => Value::I8(instance.read_u8(pointer)? as i8),
            (1, false) => Value::U8(instance.read_u8(pointer)?),
            (2, true) => Value::I16(instance.read_u16(pointer)? as i16),
            (2, false) => Value::U16(instance.read_u16(pointer)?),
            (_, true) => Value::I32(instance.read_u32(pointer)? as i32),
            (_, false) => Value::U32(instance.read_u32(pointer)?),
        })
    }

    fn wire_to_f64(&self, wire: WireValue) -> f64 {
        match (self.signed, wire) {
            (false, WireValue::I32(value)) => f64::from(value as u32),
            (_, wire) => wire.to_f64(),
        }
    }
}

/// The 64-bit integer types.
pub(crate) struct BigIntType {
    raw_type: RawTypeId,
    name: String,
    signed: bool,
}

impl BigIntType {
    /// Creates the converter for a 64-bit integer, unsigned if and only if its minimum value is
    /// zero.
    pub(crate) fn new(raw_type: RawTypeId, name: String, min_range: i64) -> Self {
        BigIntType {
            raw_type,
            name,
            signed: min_range != 0,
        }
    }
}

impl RegisteredType for BigIntType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        if self.signed {
            "i64"
        } else {
            "u64"
        }
    }

    fn native_kind(&self) -> Option<WireKind> {
        Some(WireKind::I64)
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let value = wire.as_i64()?;
        Ok(if self.signed {
            Value::I64(value)
        } else {
            Value::U64(value as u64)
        })
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        match (self.signed, value) {
            (true, Value::I64(value)) => Ok(WireValue::I64(*value)),
            (false, Value::U64(value)) => Ok(WireValue::I64(*value as i64)),
            _ => Err(mismatch(self.host_type(), value)),
        }
    }

    fn read_from_pointer(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        let wire = WireValue::I64(instance.read_u64(pointer)? as i64);
        self.from_wire(engine, instance, wire)
    }

    fn wire_to_f64(&self, wire: WireValue) -> f64 {
        match (self.signed, wire) {
            (false, WireValue::I64(value)) => value as u64 as f64,
            (_, wire) => wire.to_f64(),
        }
    }
}

/// The `float` and `double` types.
#[derive(Debug)]
pub(crate) struct FloatType {
    raw_type: RawTypeId,
    name: String,
    kind: WireKind,
}

impl FloatType {
    pub(crate) fn new(raw_type: RawTypeId, name: String, size: u32) -> Result<Self, EmbindError> {
        let kind = match size {
            4 => WireKind::F32,
            8 => WireKind::F64,
            _ => {
                return Err(EmbindError::Unsupported(format!(
                    "float type {name} with size {size}"
                )))
            }
        };
        Ok(FloatType {
            raw_type,
            name,
            kind,
        })
    }
}

impl RegisteredType for FloatType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        match self.kind {
            WireKind::F32 => "f32",
            _ => "f64",
        }
    }

    fn native_kind(&self) -> Option<WireKind> {
        Some(self.kind)
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        Ok(match self.kind {
            WireKind::F32 => Value::F32(wire.as_f32()?),
            _ => Value::F64(wire.as_f64()?),
        })
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        match (self.kind, value) {
            (WireKind::F32, Value::F32(value)) => Ok(WireValue::F32(*value)),
            (WireKind::F64, Value::F64(value)) => Ok(WireValue::F64(*value)),
            _ => Err(mismatch(self.host_type(), value)),
        }
    }

    fn read_from_pointer(
        &self,
        _engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        Ok(match self.kind {
            WireKind::F32 => Value::F32(instance.read_f32(pointer)?),
            _ => Value::F64(instance.read_f64(pointer)?),
        })
    }
}
