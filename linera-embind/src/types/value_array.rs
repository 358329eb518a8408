// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{
    field::{BoundField, FieldRegistration},
    mismatch, Destructor, DestructorPolicy, Destructors, RawTypeId, RegisteredType,
};
use crate::{
    runtime::{GuestFunction, Instance, WireValue},
    Engine, EmbindError, Value,
};

/// A value tuple whose elements are still being registered.
#[derive(Clone, Debug)]
pub(crate) struct TupleRegistration {
    pub(crate) name: String,
    pub(crate) constructor: GuestFunction,
    pub(crate) destructor: GuestFunction,
    pub(crate) elements: Vec<FieldRegistration>,
}

/// A fixed-size tuple, exchanged as a pointer to a guest object built element by element.
pub(crate) struct TupleType {
    raw_type: RawTypeId,
    name: String,
    constructor: GuestFunction,
    destructor: GuestFunction,
    elements: Vec<BoundField>,
}

impl TupleType {
    pub(crate) fn new(
        raw_type: RawTypeId,
        registration: TupleRegistration,
        elements: Vec<BoundField>,
    ) -> Self {
        TupleType {
            raw_type,
            name: registration.name,
            constructor: registration.constructor,
            destructor: registration.destructor,
            elements,
        }
    }
}

impl RegisteredType for TupleType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "Vec<Value>"
    }

    fn destructor_policy(&self) -> DestructorPolicy {
        DestructorPolicy::Function
    }

    fn destructor(&self, wire: WireValue) -> Option<Destructor> {
        Some(Destructor::Call {
            function: self.destructor.clone(),
            argument: wire,
        })
    }

    fn from_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        wire: WireValue,
    ) -> Result<Value, EmbindError> {
        let pointer = wire.as_pointer()?;
        let values = self
            .elements
            .iter()
            .map(|element| element.read(engine, instance, pointer))
            .collect::<Result<Vec<_>, _>>();
        instance.call_indirect(&self.destructor, &[wire])?;
        Ok(Value::Array(values?))
    }

    fn to_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        let Value::Array(values) = value else {
            return Err(mismatch("Vec<Value>", value));
        };
        if values.len() != self.elements.len() {
            return Err(EmbindError::TupleLength {
                name: self.name.clone(),
                expected: self.elements.len(),
                actual: values.len(),
            });
        }
        let results = instance.call_indirect(&self.constructor, &[])?;
        let wire = self.constructor.single_result(results)?.ok_or_else(|| {
            EmbindError::Decode(format!("constructor of {} returned nothing", self.name))
        })?;
        let pointer = wire.as_pointer()?;
        let written = self
            .elements
            .iter()
            .zip(values)
            .try_for_each(|(element, value)| element.write(engine, instance, pointer, value));
        if let Err(error) = written {
            instance.call_indirect(&self.destructor, &[wire])?;
            return Err(error);
        }
        if let Some(destructors) = destructors {
            destructors.push(Destructor::Call {
                function: self.destructor.clone(),
                argument: wire,
            });
        }
        Ok(wire)
    }
}
