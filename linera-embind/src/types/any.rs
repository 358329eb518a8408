// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{Destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{Instance, WireValue},
    Engine, EmbindError, Value,
};

/// Stands in for types that are not registered yet, so that unbound symbols can still be
/// described.
pub(crate) struct AnyType;

impl RegisteredType for AnyType {
    fn raw_type(&self) -> RawTypeId {
        RawTypeId(0)
    }

    fn name(&self) -> &str {
        "any"
    }

    fn host_type(&self) -> &'static str {
        "any"
    }

    fn from_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _wire: WireValue,
    ) -> Result<Value, EmbindError> {
        Err(EmbindError::Unsupported("decoding an unbound type".to_owned()))
    }

    fn to_wire(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _destructors: Destructors<'_>,
        _value: &Value,
    ) -> Result<WireValue, EmbindError> {
        Err(EmbindError::Unsupported("encoding an unbound type".to_owned()))
    }
}
