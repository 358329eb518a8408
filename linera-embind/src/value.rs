// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host-side representation of the values exchanged with the guest.

use crate::{
    class::{ClassHandle, ClassInstance},
    emval::HostObject,
    runtime::{GuestPointer, Instance},
    EmbindError,
};
use std::{collections::BTreeMap, fmt, rc::Rc};

/// A host value.
///
/// Numeric variants are exact: each integer or float wire type only accepts and produces the
/// variant with its own width and signedness.
#[derive(Clone, Default)]
pub enum Value {
    /// The absence of a value, returned by functions without a result.
    #[default]
    Undefined,
    /// The null value, also used for null class pointers.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed 8-bit integer.
    I8(i8),
    /// An unsigned 8-bit integer.
    U8(u8),
    /// A signed 16-bit integer.
    I16(i16),
    /// An unsigned 16-bit integer.
    U16(u16),
    /// A signed 32-bit integer.
    I32(i32),
    /// An unsigned 32-bit integer.
    U32(u32),
    /// A signed 64-bit integer.
    I64(i64),
    /// An unsigned 64-bit integer.
    U64(u64),
    /// A 32-bit float.
    F32(f32),
    /// A 64-bit float.
    F64(f64),
    /// A string.
    String(String),
    /// Raw bytes, produced by string types that don't hold UTF-8.
    Bytes(Vec<u8>),
    /// A list of values, used for tuples.
    Array(Vec<Value>),
    /// A map of named values, used for structs.
    Object(BTreeMap<String, Value>),
    /// A view over a region of the guest's memory.
    MemoryView(MemoryView),
    /// A value of a registered enum.
    Enum(EnumValue),
    /// A handle to a class instance owned by the guest.
    Class(ClassHandle),
    /// A class instance materialized through a host binding.
    Instance(Rc<dyn ClassInstance>),
    /// An arbitrary host object.
    Host(Rc<dyn HostObject>),
}

impl Value {
    /// A short name for the kind of this value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::U8(_) => "u8",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "String",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::MemoryView(_) => "memory view",
            Value::Enum(_) => "enum",
            Value::Class(_) | Value::Instance(_) => "class instance",
            Value::Host(_) => "host object",
        }
    }

    /// The handle of a class instance, if this is one.
    pub fn class_handle(&self) -> Option<ClassHandle> {
        match self {
            Value::Class(handle) => Some(*handle),
            Value::Instance(instance) => Some(instance.class_handle()),
            _ => None,
        }
    }

    /// Interprets the value as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::I8(value) => value.into(),
            Value::U8(value) => value.into(),
            Value::I16(value) => value.into(),
            Value::U16(value) => value.into(),
            Value::I32(value) => value.into(),
            Value::U32(value) => value.into(),
            Value::I64(value) => value as f64,
            Value::U64(value) => value as f64,
            Value::F32(value) => value.into(),
            Value::F64(value) => value,
            _ => return None,
        })
    }

    /// Returns `true` for numbers that fit a float64 without loss of kind, excluding 64-bit
    /// integers.
    pub fn is_number(&self) -> bool {
        !matches!(self, Value::I64(_) | Value::U64(_)) && self.as_f64().is_some()
    }

    /// Truthiness used when converting arbitrary values to booleans.
    ///
    /// Undefined, null, `false`, zero, NaN and the empty string are false; everything else is
    /// true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(value) => *value,
            Value::String(value) => !value.is_empty(),
            Value::I64(value) => *value != 0,
            Value::U64(value) => *value != 0,
            other => other
                .as_f64()
                .map_or(true, |number| number != 0.0 && !number.is_nan()),
        }
    }

    /// The name of the value's type, following the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::I64(_) | Value::U64(_) => "bigint",
            Value::String(_) => "string",
            Value::Host(object) if object.is_callable() => "function",
            value if value.is_number() => "number",
            _ => "object",
        }
    }

    /// Loose equality: numbers compare by value across widths, and null equals undefined.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (left, right) if left.is_number() && right.is_number() => left.as_f64() == right.as_f64(),
            (left, right) => left == right,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::I8(left), Value::I8(right)) => left == right,
            (Value::U8(left), Value::U8(right)) => left == right,
            (Value::I16(left), Value::I16(right)) => left == right,
            (Value::U16(left), Value::U16(right)) => left == right,
            (Value::I32(left), Value::I32(right)) => left == right,
            (Value::U32(left), Value::U32(right)) => left == right,
            (Value::I64(left), Value::I64(right)) => left == right,
            (Value::U64(left), Value::U64(right)) => left == right,
            (Value::F32(left), Value::F32(right)) => left == right,
            (Value::F64(left), Value::F64(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Bytes(left), Value::Bytes(right)) => left == right,
            (Value::Array(left), Value::Array(right)) => left == right,
            (Value::Object(left), Value::Object(right)) => left == right,
            (Value::MemoryView(left), Value::MemoryView(right)) => left == right,
            (Value::Enum(left), Value::Enum(right)) => left == right,
            (Value::Class(left), Value::Class(right)) => left == right,
            (Value::Instance(left), Value::Instance(right)) => {
                left.class_handle() == right.class_handle()
            }
            (Value::Host(left), Value::Host(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(formatter, "Undefined"),
            Value::Null => write!(formatter, "Null"),
            Value::Bool(value) => write!(formatter, "Bool({value})"),
            Value::I8(value) => write!(formatter, "I8({value})"),
            Value::U8(value) => write!(formatter, "U8({value})"),
            Value::I16(value) => write!(formatter, "I16({value})"),
            Value::U16(value) => write!(formatter, "U16({value})"),
            Value::I32(value) => write!(formatter, "I32({value})"),
            Value::U32(value) => write!(formatter, "U32({value})"),
            Value::I64(value) => write!(formatter, "I64({value})"),
            Value::U64(value) => write!(formatter, "U64({value})"),
            Value::F32(value) => write!(formatter, "F32({value})"),
            Value::F64(value) => write!(formatter, "F64({value})"),
            Value::String(value) => write!(formatter, "String({value:?})"),
            Value::Bytes(value) => write!(formatter, "Bytes({value:?})"),
            Value::Array(values) => formatter.debug_tuple("Array").field(values).finish(),
            Value::Object(fields) => formatter.debug_tuple("Object").field(fields).finish(),
            Value::MemoryView(view) => formatter.debug_tuple("MemoryView").field(view).finish(),
            Value::Enum(value) => formatter.debug_tuple("Enum").field(value).finish(),
            Value::Class(handle) => formatter.debug_tuple("Class").field(handle).finish(),
            Value::Instance(instance) => formatter
                .debug_tuple("Instance")
                .field(&instance.class_handle())
                .finish(),
            Value::Host(object) => write!(formatter, "Host({})", object.type_name()),
        }
    }
}

macro_rules! impl_from_for_value {
    ($( $type:ty => $variant:ident ),* $(,)?) => {
        $(
            impl From<$type> for Value {
                fn from(value: $type) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<Value> => Array,
    BTreeMap<String, Value> => Object,
    EnumValue => Enum,
    ClassHandle => Class,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<Rc<dyn HostObject>> for Value {
    fn from(object: Rc<dyn HostObject>) -> Self {
        Value::Host(object)
    }
}

/// A value of a registered enum.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnumValue {
    /// The enum type name.
    pub enum_name: String,
    /// The name of the enumerator.
    pub name: String,
    /// The numeric value of the enumerator.
    pub value: i64,
}

/// The element type of a [`MemoryView`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MemoryViewKind {
    /// `int8_t` elements.
    I8,
    /// `uint8_t` elements.
    U8,
    /// `int16_t` elements.
    I16,
    /// `uint16_t` elements.
    U16,
    /// `int32_t` elements.
    I32,
    /// `uint32_t` elements.
    U32,
    /// `float` elements.
    F32,
    /// `double` elements.
    F64,
    /// `int64_t` elements.
    I64,
    /// `uint64_t` elements.
    U64,
}

impl MemoryViewKind {
    /// Maps the guest's data type index to an element kind.
    pub fn from_index(index: u32) -> Option<Self> {
        Some(match index {
            0 => MemoryViewKind::I8,
            1 => MemoryViewKind::U8,
            2 => MemoryViewKind::I16,
            3 => MemoryViewKind::U16,
            4 => MemoryViewKind::I32,
            5 => MemoryViewKind::U32,
            6 => MemoryViewKind::F32,
            7 => MemoryViewKind::F64,
            8 => MemoryViewKind::I64,
            9 => MemoryViewKind::U64,
            _ => return None,
        })
    }

    /// The size of one element in bytes.
    pub fn element_size(&self) -> u32 {
        match self {
            MemoryViewKind::I8 | MemoryViewKind::U8 => 1,
            MemoryViewKind::I16 | MemoryViewKind::U16 => 2,
            MemoryViewKind::I32 | MemoryViewKind::U32 | MemoryViewKind::F32 => 4,
            MemoryViewKind::F64 | MemoryViewKind::I64 | MemoryViewKind::U64 => 8,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Value {
        let mut array = [0; 8];
        array[..bytes.len()].copy_from_slice(bytes);
        let [b0, b1, b2, b3, ..] = array;
        match self {
            MemoryViewKind::I8 => Value::I8(b0 as i8),
            MemoryViewKind::U8 => Value::U8(b0),
            MemoryViewKind::I16 => Value::I16(i16::from_le_bytes([b0, b1])),
            MemoryViewKind::U16 => Value::U16(u16::from_le_bytes([b0, b1])),
            MemoryViewKind::I32 => Value::I32(i32::from_le_bytes([b0, b1, b2, b3])),
            MemoryViewKind::U32 => Value::U32(u32::from_le_bytes([b0, b1, b2, b3])),
            MemoryViewKind::F32 => Value::F32(f32::from_le_bytes([b0, b1, b2, b3])),
            MemoryViewKind::F64 => Value::F64(f64::from_le_bytes(array)),
            MemoryViewKind::I64 => Value::I64(i64::from_le_bytes(array)),
            MemoryViewKind::U64 => Value::U64(u64::from_le_bytes(array)),
        }
    }
}

/// A typed view over a region of the guest's linear memory.
///
/// The view only records where the data lives; nothing is copied until it is read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryView {
    /// The element type.
    pub kind: MemoryViewKind,
    /// The address of the first element.
    pub address: GuestPointer,
    /// The number of elements.
    pub length: u32,
}

impl MemoryView {
    /// The size of the viewed region in bytes.
    pub fn byte_length(&self) -> Result<u32, EmbindError> {
        self.length
            .checked_mul(self.kind.element_size())
            .ok_or_else(|| {
                EmbindError::Decode(format!(
                    "memory view of {} elements exceeds the address space",
                    self.length
                ))
            })
    }

    /// Copies the viewed bytes out of the guest's memory.
    pub fn read_bytes(&self, instance: &mut dyn Instance) -> Result<Vec<u8>, EmbindError> {
        Ok(instance.read_memory(self.address, self.byte_length()?)?)
    }

    /// Reads the viewed elements.
    pub fn elements(&self, instance: &mut dyn Instance) -> Result<Vec<Value>, EmbindError> {
        let bytes = self.read_bytes(instance)?;
        Ok(bytes
            .chunks_exact(self.kind.element_size() as usize)
            .map(|chunk| self.kind.decode(chunk))
            .collect())
    }
}
