// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Accessors for the elements of value tuples and the fields of value structs.

use super::{run_destructors, RawTypeId, RegisteredType};
use crate::{
    runtime::{GuestFunction, GuestPointer, Instance, WireValue},
    Engine, EmbindError, Value,
};
use std::rc::Rc;

/// An element or field as registered, before its types are resolved.
#[derive(Clone, Debug)]
pub(crate) struct FieldRegistration {
    /// The field name, or [`None`] for tuple elements.
    pub(crate) name: Option<String>,
    pub(crate) getter_return_type: RawTypeId,
    pub(crate) getter: GuestFunction,
    pub(crate) getter_context: WireValue,
    pub(crate) setter_argument_type: RawTypeId,
    pub(crate) setter: GuestFunction,
    pub(crate) setter_context: WireValue,
}

impl FieldRegistration {
    /// The types a compound type depends on: every getter type, then every setter type.
    pub(crate) fn dependencies(fields: &[FieldRegistration]) -> Vec<RawTypeId> {
        fields
            .iter()
            .map(|field| field.getter_return_type)
            .chain(fields.iter().map(|field| field.setter_argument_type))
            .collect()
    }

    /// Binds `fields` to the types resolved for [`FieldRegistration::dependencies`].
    pub(crate) fn bind(
        fields: Vec<FieldRegistration>,
        types: &[Rc<dyn RegisteredType>],
    ) -> Result<Vec<BoundField>, EmbindError> {
        let count = fields.len();
        if types.len() != 2 * count {
            return Err(EmbindError::Decode(format!(
                "expected {} resolved field types, got {}",
                2 * count,
                types.len()
            )));
        }
        Ok(fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| BoundField {
                name: field.name,
                getter_type: types[index].clone(),
                getter: field.getter,
                getter_context: field.getter_context,
                setter_type: types[count + index].clone(),
                setter: field.setter,
                setter_context: field.setter_context,
            })
            .collect())
    }
}

/// An element or field with resolved types.
pub(crate) struct BoundField {
    pub(crate) name: Option<String>,
    getter_type: Rc<dyn RegisteredType>,
    getter: GuestFunction,
    getter_context: WireValue,
    setter_type: Rc<dyn RegisteredType>,
    setter: GuestFunction,
    setter_context: WireValue,
}

impl BoundField {
    /// Reads the field of the object at `pointer`.
    pub(crate) fn read(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<Value, EmbindError> {
        let results =
            instance.call_indirect(&self.getter, &[self.getter_context, pointer.into()])?;
        let wire = self.getter.single_result(results)?.ok_or_else(|| {
            EmbindError::Decode(format!(
                "getter of {} returned nothing",
                self.getter_type.name()
            ))
        })?;
        self.getter_type.from_wire(engine, instance, wire)
    }

    /// Writes `value` into the field of the object at `pointer`.
    pub(crate) fn write(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
        value: &Value,
    ) -> Result<(), EmbindError> {
        let mut destructors = Vec::new();
        let wire = self
            .setter_type
            .to_wire(engine, instance, Some(&mut destructors), value)?;
        let result = instance.call_indirect(&self.setter, &[self.setter_context, pointer.into(), wire]);
        run_destructors(engine, instance, destructors)?;
        result?;
        Ok(())
    }
}
