// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{mismatch, Destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{GuestPointer, Instance, WireValue},
    value::EnumValue,
    Engine, EmbindError, Value,
};
use std::collections::BTreeMap;

/// The values known for an enum, as registered by the guest and optionally declared by the
/// host.
#[derive(Clone, Debug, Default)]
pub(crate) struct EnumDescriptor {
    pub(crate) raw_type: Option<RawTypeId>,
    pub(crate) guest_values: BTreeMap<String, i64>,
    pub(crate) host_values: Option<BTreeMap<String, i64>>,
}

impl EnumDescriptor {
    pub(crate) fn name_of(&self, value: i64) -> Option<&str> {
        self.guest_values
            .iter()
            .find(|(_, candidate)| **candidate == value)
            .map(|(name, _)| name.as_str())
    }

    /// Checks a guest enumerator against the host declaration, if any.
    pub(crate) fn check_guest_value(
        &self,
        enum_name: &str,
        name: &str,
        value: i64,
    ) -> Result<(), EmbindError> {
        let Some(host_values) = &self.host_values else {
            return Ok(());
        };
        match host_values.get(name) {
            Some(host_value) if *host_value == value => Ok(()),
            Some(host_value) => Err(EmbindError::RegistrationMismatch(format!(
                "enum {enum_name} value {name} is {value} in the guest but {host_value} in the host"
            ))),
            None => Err(EmbindError::RegistrationMismatch(format!(
                "enum {enum_name} value {name} is not declared by the host"
            ))),
        }
    }
}

/// An enum type, exchanged as its underlying integer.
#[derive(Clone, Debug)]
pub(crate) struct EnumType {
    raw_type: RawTypeId,
    name: String,
    size: u32,
    signed: bool,
}

impl EnumType {
    pub(crate) fn new(
        raw_type: RawTypeId,
        name: String,
        size: u32,
        signed: bool,
    ) -> Result<Self, EmbindError> {
        if !matches!(size, 1 | 2 | 4) {
            return Err(EmbindError::Unsupported(format!(
                "enum type {name} with size {size}"
            )));
        }
        Ok(EnumType {
            raw_type,
            name,
            size,
            signed,
        })
    }

    /// Widens a raw integer of the enum's size to its numeric value.
    pub(crate) fn widen(&self, raw: u32) -> i64 {
        match (self.size, self.signed) {
            (1, true) => i64::from(raw as u8 as i8),
            (1, false) => i64::from(raw as u8),
            (2, true) => i64::from(raw as u16 as i16),
            (2, false) => i64::from(raw as u16),
            (_, true) => i64::from(raw as i32),
            (_, false) => i64::from(raw),
        }
    }

    fn decode(&self, engine: &Engine, value: i64) -> Result<Value, EmbindError> {
        let state = engine.state();
        let name = state
            .enums
            .get(&self.name)
            .and_then(|descriptor| descriptor.name_of(value))
            .ok_or_else(|| EmbindError::UnknownEnumValue {
                enum_name: self.name.clone(),
                value: value.to_string(),
            })?;
        Ok(Value::Enum(EnumValue {
            enum_name: self.name.clone(),
            name: name.to_owned(),
            value,
        }))
    }
}

impl RegisteredType for EnumType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "enum"
    }

    fn from_wire(
        &self,
        engine: &Engine,
        _instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let value = self.widen(wire.as_u32()?);
        self.decode(engine, value)
    }

    fn to_wire(
        &self,
        engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        let Value::Enum(enum_value) = value else {
            return Err(mismatch("enum", value));
        };
        let state = engine.state();
        let known = state
            .enums
            .get(&self.name)
            .filter(|_| enum_value.enum_name == self.name)
            .and_then(|descriptor| descriptor.guest_values.get(&enum_value.name));
        match known {
            Some(number) => Ok(WireValue::I32(*number as i32)),
            None => Err(EmbindError::UnknownEnumValue {
                enum_name: self.name.clone(),
                value: format!("{}::{}", enum_value.enum_name, enum_value.name),
            }),
        }
    }

    fn read_from_pointer(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        let raw = match self.size {
            1 => u32::from(instance.read_u8(pointer)?),
            2 => u32::from(instance.read_u16(pointer)?),
            _ => instance.read_u32(pointer)?,
        };
        self.decode(engine, self.widen(raw))
    }

    fn as_enum(&self) -> Option<&EnumType> {
        Some(self)
    }
}
