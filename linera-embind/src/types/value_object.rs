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
use std::collections::BTreeMap;

/// A value struct whose fields are still being registered.
#[derive(Clone, Debug)]
pub(crate) struct StructRegistration {
    pub(crate) name: String,
    pub(crate) constructor: GuestFunction,
    pub(crate) destructor: GuestFunction,
    pub(crate) fields: Vec<FieldRegistration>,
}

/// A struct with named fields, exchanged as a pointer to a guest object built field by field.
pub(crate) struct StructType {
    raw_type: RawTypeId,
    name: String,
    constructor: GuestFunction,
    destructor: GuestFunction,
    fields: Vec<BoundField>,
}

impl StructType {
    pub(crate) fn new(
        raw_type: RawTypeId,
        registration: StructRegistration,
        fields: Vec<BoundField>,
    ) -> Self {
        StructType {
            raw_type,
            name: registration.name,
            constructor: registration.constructor,
            destructor: registration.destructor,
            fields,
        }
    }
}

fn field_name(field: &BoundField) -> &str {
    field.name.as_deref().unwrap_or_default()
}

impl RegisteredType for StructType {
    fn raw_type(&self) -> RawTypeId {
        self.raw_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn host_type(&self) -> &'static str {
        "BTreeMap<String, Value>"
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
        let fields = self
            .fields
            .iter()
            .map(|field| {
                let value = field.read(engine, instance, pointer)?;
                Ok((field_name(field).to_owned(), value))
            })
            .collect::<Result<BTreeMap<_, _>, EmbindError>>();
        instance.call_indirect(&self.destructor, &[wire])?;
        Ok(Value::Object(fields?))
    }

    fn to_wire(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        destructors: Destructors<'_>,
        value: &Value,
    ) -> Result<WireValue, EmbindError> {
        let Value::Object(values) = value else {
            return Err(mismatch("BTreeMap<String, Value>", value));
        };
        if let Some(missing) = self
            .fields
            .iter()
            .find(|field| !values.contains_key(field_name(field)))
        {
            return Err(EmbindError::MissingField(field_name(missing).to_owned()));
        }
        let results = instance.call_indirect(&self.constructor, &[])?;
        let wire = self.constructor.single_result(results)?.ok_or_else(|| {
            EmbindError::Decode(format!("constructor of {} returned nothing", self.name))
        })?;
        let pointer = wire.as_pointer()?;
        let written = self
            .fields
            .iter()
            .try_for_each(|field| match values.get(field_name(field)) {
                Some(value) => field.write(engine, instance, pointer, value),
                None => Ok(()),
            });
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
