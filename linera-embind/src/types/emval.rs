// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{Destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{Instance, WireValue},
    Engine, EmbindError, Value,
};

/// The `emscripten::val` type, exchanged as a handle into the engine's emval table.
pub(crate) struct EmvalType {
    raw_type: RawTypeId,
    name: String,
}

impl EmvalType {
    pub(crate) fn new(raw_type: RawTypeId, name: String) -> Self {
        EmvalType { raw_type, name }
    }
}

impl RegisteredType for EmvalType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "Value"
    }

    /// Takes ownership of the handle: the value is fetched and the handle released.
    fn from_wire(
        &self,
        engine: &Engine,
        _instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let handle = wire.as_i32()?;
        let value = engine.emval_value(handle)?;
        engine.emval_decref(handle)?;
        Ok(value)
    }

    fn to_wire(
        &self,
        engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        Ok(WireValue::I32(engine.emval_handle(value.clone())))
    }
}
