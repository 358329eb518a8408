// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{mismatch, Destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{Instance, WireValue},
    value::{MemoryView, MemoryViewKind},
    Engine, EmbindError, Value,
};

/// Typed views over the guest's memory, received as a pointer to a `{ length, address }` pair.
pub(crate) struct MemoryViewType {
    raw_type: RawTypeId,
    name: String,
    kind: MemoryViewKind,
}

impl MemoryViewType {
    pub(crate) fn new(raw_type: RawTypeId, name: String, data_type_index: u32) -> Result<Self, EmbindError> {
        let kind = MemoryViewKind::from_index(data_type_index).ok_or_else(|| {
            EmbindError::Unsupported(format!("memory view data type index {data_type_index}"))
        })?;
        Ok(MemoryViewType {
            raw_type,
            name,
            kind,
        })
    }
}

impl RegisteredType for MemoryViewType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "MemoryView"
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let pointer = wire.as_pointer()?;
        let length = instance.read_u32(pointer)?;
        let address = instance.read_pointer(pointer.offset(4))?;
        let view = MemoryView {
            kind: self.kind,
            address,
            length,
        };
        view.byte_length()?;
        Ok(Value::MemoryView(view))
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        match value {
            Value::MemoryView(_) => Err(EmbindError::Unsupported(format!(
                "passing memory view {} to the guest",
                self.name
            ))),
            other => Err(mismatch("MemoryView", other)),
        }
    }
}
