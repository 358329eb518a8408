// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Entry points the guest uses to manipulate host values through `emscripten::val` handles.

use super::Engine;
use crate::{
    emval::{capitalize, resolve_method, DestructorList, MethodCaller, MethodCallerKind},
    runtime::{GuestPointer, Instance},
    types::{run_destructors, RawTypeId, RegisteredType},
    EmbindError, Value,
};
use std::{cell::RefCell, rc::Rc};
use tracing::trace;

/// Interprets a key as an array index, if it is a non-negative whole number.
fn array_index(key: &Value) -> Option<usize> {
    if !key.is_number() {
        return None;
    }
    let index = key.as_f64()?;
    (index >= 0.0 && index.fract() == 0.0).then_some(index as usize)
}

impl Engine {
    pub(crate) fn emval_value(&self, handle: i32) -> Result<Value, EmbindError> {
        self.state().emval.table.get(handle).cloned()
    }

    pub(crate) fn emval_handle(&self, value: Value) -> i32 {
        self.state_mut().emval.table.to_handle(value)
    }

    pub(crate) fn emval_decref(&self, handle: i32) -> Result<(), EmbindError> {
        self.state_mut().emval.table.decref(handle)
    }

    /// Adds a reference to a handle.
    pub fn emval_incref(&self, handle: i32) -> Result<(), EmbindError> {
        self.state_mut().emval.table.incref(handle)
    }

    /// Drops a reference to a handle.
    pub fn emval_release(&self, handle: i32) -> Result<(), EmbindError> {
        self.emval_decref(handle)
    }

    /// Reads a value of the type `raw_type` stored at `pointer`, returning a new handle to it.
    pub fn emval_take_value(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        pointer: GuestPointer,
    ) -> Result<i32, EmbindError> {
        let registered =
            self.require_registered_type(instance, RawTypeId(raw_type), "_emval_take_value")?;
        let value = registered.read_from_pointer(self, instance, pointer)?;
        Ok(self.emval_handle(value))
    }

    /// Interns the string at `address`, so later lookups by that address skip reading it.
    pub fn emval_register_symbol(
        &self,
        instance: &mut dyn Instance,
        address: GuestPointer,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, address)?;
        self.state_mut().emval.symbols.insert(address.0, name);
        Ok(())
    }

    /// Reads the string at `address`, using the interned symbol if there is one.
    fn symbol_or_string(
        &self,
        instance: &mut dyn Instance,
        address: GuestPointer,
    ) -> Result<String, EmbindError> {
        let symbol = self.state().emval.symbols.get(&address.0).cloned();
        match symbol {
            Some(symbol) => Ok(symbol),
            None => self.read_string(instance, address),
        }
    }

    /// Returns a handle to the global named by the string at `name`, or to an object holding
    /// every global if `name` is null.
    ///
    /// Unknown globals are `undefined`.
    pub fn emval_get_global(
        &self,
        instance: &mut dyn Instance,
        name: GuestPointer,
    ) -> Result<i32, EmbindError> {
        let value = if name.is_null() {
            Value::Object(self.state().emval.globals.clone())
        } else {
            let name = self.symbol_or_string(instance, name)?;
            let global = self.state().emval.globals.get(&name).cloned();
            global.unwrap_or_default()
        };
        Ok(self.emval_handle(value))
    }

    /// Converts the value of a handle to the type `raw_type`, returning its wire value as a
    /// float.
    ///
    /// A handle to the destructors of the conversion, or zero, is written at `destructors_ref`.
    pub fn emval_as(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
        raw_type: i32,
        destructors_ref: GuestPointer,
    ) -> Result<f64, EmbindError> {
        let return_type =
            self.require_registered_type(instance, RawTypeId(raw_type), "emval::as")?;
        let value = self.emval_value(handle)?;
        self.emval_return_value(instance, &return_type, Some(destructors_ref), &value)
    }

    fn emval_return_value(
        &self,
        instance: &mut dyn Instance,
        return_type: &Rc<dyn RegisteredType>,
        destructors_ref: Option<GuestPointer>,
        value: &Value,
    ) -> Result<f64, EmbindError> {
        if return_type.native_kind().is_none() {
            return Ok(0.0);
        }
        let mut destructors = Vec::new();
        let wire = return_type.to_wire(self, instance, Some(&mut destructors), value)?;
        let list = if destructors.is_empty() {
            0
        } else {
            let list = DestructorList {
                destructors: RefCell::new(destructors),
            };
            self.emval_handle(Value::Host(Rc::new(list)))
        };
        if let Some(destructors_ref) = destructors_ref {
            instance.write_u32(destructors_ref, list as u32)?;
        }
        Ok(return_type.wire_to_f64(wire))
    }

    /// Converts the value of a handle to the 64-bit signed integer type `raw_type`.
    pub fn emval_as_int64(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
        raw_type: i32,
    ) -> Result<i64, EmbindError> {
        let return_type =
            self.require_registered_type(instance, RawTypeId(raw_type), "emval::as")?;
        let value = self.emval_value(handle)?;
        Ok(return_type.to_wire(self, instance, None, &value)?.as_i64()?)
    }

    /// Converts the value of a handle to the 64-bit unsigned integer type `raw_type`, returning
    /// its bits.
    pub fn emval_as_uint64(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
        raw_type: i32,
    ) -> Result<i64, EmbindError> {
        self.emval_as_int64(instance, handle, raw_type)
    }

    /// Runs the destructors stored behind a handle by [`Engine::emval_as`] and releases the
    /// handle.
    pub fn emval_run_destructors(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
    ) -> Result<(), EmbindError> {
        if handle == 0 {
            return Ok(());
        }
        let value = self.emval_value(handle)?;
        let destructors = match &value {
            Value::Host(object) => object
                .as_any()
                .downcast_ref::<DestructorList>()
                .map(|list| list.destructors.take()),
            _ => None,
        }
        .ok_or_else(|| EmbindError::TypeMismatch {
            expected: "destructors",
            actual: value.kind(),
        })?;
        run_destructors(self, instance, destructors)?;
        self.emval_decref(handle)
    }

    /// Returns a handle to a new string read from `pointer`.
    pub fn emval_new_cstring(
        &self,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
    ) -> Result<i32, EmbindError> {
        let string = self.symbol_or_string(instance, pointer)?;
        Ok(self.emval_handle(Value::String(string)))
    }

    /// Returns a handle to a new empty array.
    pub fn emval_new_array(&self) -> i32 {
        self.emval_handle(Value::Array(Vec::new()))
    }

    /// Returns a handle to a new empty object.
    pub fn emval_new_object(&self) -> i32 {
        self.emval_handle(Value::Object(Default::default()))
    }

    /// Reads the property `key` of the value of `handle`, returning a new handle to it.
    ///
    /// Numeric keys index arrays and string keys name fields of objects, host objects and
    /// class instances.
    pub fn emval_get_property(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
        key: i32,
    ) -> Result<i32, EmbindError> {
        let object = self.emval_value(handle)?;
        let key = self.emval_value(key)?;
        let value = self.property_of(instance, &object, &key)?;
        Ok(self.emval_handle(value))
    }

    fn property_of(
        &self,
        instance: &mut dyn Instance,
        object: &Value,
        key: &Value,
    ) -> Result<Value, EmbindError> {
        let invalid_key = || EmbindError::InvalidPropertyKey {
            owner: object.kind(),
            key: key.kind(),
        };
        if let Some(index) = array_index(key) {
            let Value::Array(values) = object else {
                return Err(invalid_key());
            };
            return values
                .get(index)
                .cloned()
                .ok_or(EmbindError::IndexOutOfBounds {
                    index,
                    length: values.len(),
                });
        }
        let Value::String(name) = key else {
            return Err(invalid_key());
        };
        match object {
            Value::Object(fields) => Ok(fields.get(name).cloned().unwrap_or_default()),
            Value::Host(host) => host.get_property(name),
            Value::Class(_) | Value::Instance(_) => self.get_property(instance, object, name),
            _ => Err(invalid_key()),
        }
    }

    /// Writes the property `key` of the value of `handle`.
    ///
    /// Writing past the end of an array extends it with `undefined` values.
    pub fn emval_set_property(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
        key: i32,
        value: i32,
    ) -> Result<(), EmbindError> {
        let key = self.emval_value(key)?;
        let value = self.emval_value(value)?;
        let object = self.emval_value(handle)?;
        let invalid_key = || EmbindError::InvalidPropertyKey {
            owner: object.kind(),
            key: key.kind(),
        };

        if let Some(index) = array_index(&key) {
            let mut state = self.state_mut();
            let Value::Array(values) = state.emval.table.get_mut(handle)? else {
                return Err(invalid_key());
            };
            if index >= values.len() {
                values.resize(index + 1, Value::Undefined);
            }
            values[index] = value;
            return Ok(());
        }
        let Value::String(name) = &key else {
            return Err(invalid_key());
        };
        match &object {
            Value::Object(_) => {
                let mut state = self.state_mut();
                if let Value::Object(fields) = state.emval.table.get_mut(handle)? {
                    fields.insert(name.clone(), value);
                }
                Ok(())
            }
            Value::Host(host) => host.set_property(name, value),
            Value::Class(_) | Value::Instance(_) => {
                self.set_property(instance, &object, name, &value)
            }
            _ => Err(invalid_key()),
        }
    }

    /// Returns `true` if the object of handle `object` has the property `key`.
    pub fn emval_in(
        &self,
        instance: &mut dyn Instance,
        key: i32,
        object: i32,
    ) -> Result<bool, EmbindError> {
        let key = self.emval_value(key)?;
        let object = self.emval_value(object)?;
        Ok(match (&object, &key) {
            (Value::Array(values), key) => array_index(key).is_some_and(|index| index < values.len()),
            (Value::Object(fields), Value::String(name)) => fields.contains_key(name),
            _ => self.property_of(instance, &object, &key).is_ok(),
        })
    }

    /// Removes the property `key` from the object of handle `object`, returning `true` if it was
    /// present.
    pub fn emval_delete(&self, object: i32, key: i32) -> Result<bool, EmbindError> {
        let key = self.emval_value(key)?;
        let Value::String(name) = key else {
            return Ok(false);
        };
        if !matches!(self.emval_value(object)?, Value::Object(_)) {
            return Ok(false);
        }
        let mut state = self.state_mut();
        match state.emval.table.get_mut(object)? {
            Value::Object(fields) => Ok(fields.remove(&name).is_some()),
            _ => Ok(false),
        }
    }

    /// Loose equality of two handles' values.
    pub fn emval_equals(&self, left: i32, right: i32) -> Result<bool, EmbindError> {
        Ok(self.emval_value(left)?.loosely_equals(&self.emval_value(right)?))
    }

    /// Strict equality of two handles' values.
    pub fn emval_strictly_equals(&self, left: i32, right: i32) -> Result<bool, EmbindError> {
        Ok(self.emval_value(left)? == self.emval_value(right)?)
    }

    /// Returns a handle to the name of the value's type.
    pub fn emval_typeof(&self, handle: i32) -> Result<i32, EmbindError> {
        let type_name = self.emval_value(handle)?.type_of();
        Ok(self.emval_handle(Value::from(type_name)))
    }

    /// Returns `true` if the value is falsy.
    pub fn emval_not(&self, handle: i32) -> Result<bool, EmbindError> {
        Ok(!self.emval_value(handle)?.is_truthy())
    }

    /// Returns `true` if the value is a number.
    pub fn emval_is_number(&self, handle: i32) -> Result<bool, EmbindError> {
        Ok(self.emval_value(handle)?.is_number())
    }

    /// Returns `true` if the value is a string.
    pub fn emval_is_string(&self, handle: i32) -> Result<bool, EmbindError> {
        Ok(matches!(self.emval_value(handle)?, Value::String(_)))
    }

    /// Returns the id of a method caller for the signature made of the `arg_count` types at
    /// `arg_types`, the return type first.
    ///
    /// Callers are shared between identical signatures of the same kind.
    pub fn emval_get_method_caller(
        &self,
        instance: &mut dyn Instance,
        arg_count: u32,
        arg_types: GuestPointer,
        kind: i32,
    ) -> Result<i32, EmbindError> {
        let kind = MethodCallerKind::try_from(kind)?;
        let raw_types = self.read_type_ids(instance, arg_count, arg_types)?;
        let mut types = raw_types
            .into_iter()
            .enumerate()
            .map(|(index, raw_type)| {
                self.require_registered_type(instance, raw_type, &format!("argument {index}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if types.is_empty() {
            return Err(EmbindError::Decode(
                "method caller without a return type".to_owned(),
            ));
        }
        let return_type = types.remove(0);
        let signature = MethodCaller::signature_name(return_type.as_ref(), &types);

        let mut state = self.state_mut();
        let emval = &mut state.emval;
        let key = (kind, signature.clone());
        if let Some(id) = emval.caller_ids.get(&key) {
            return Ok(*id);
        }
        let id = emval.callers.len() as i32;
        trace!(id, %signature, ?kind, "New method caller");
        emval.caller_ids.insert(key, id);
        emval.callers.push(Rc::new(MethodCaller {
            signature,
            kind,
            return_type,
            argument_types: types,
        }));
        Ok(id)
    }

    fn method_caller(&self, caller: i32) -> Result<Rc<MethodCaller>, EmbindError> {
        usize::try_from(caller)
            .ok()
            .and_then(|index| self.state().emval.callers.get(index).cloned())
            .ok_or(EmbindError::UnknownMethodCaller(caller))
    }

    /// Reads the packed arguments of a method caller's signature.
    fn read_emval_arguments(
        &self,
        instance: &mut dyn Instance,
        caller: &MethodCaller,
        mut arguments: GuestPointer,
    ) -> Result<Vec<Value>, EmbindError> {
        caller
            .argument_types
            .iter()
            .map(|argument_type| {
                let value = argument_type.read_from_pointer(self, instance, arguments)?;
                arguments = arguments.offset(argument_type.arg_pack_advance());
                Ok(value)
            })
            .collect()
    }

    /// Releases the arguments whose types require an explicit release after a call.
    fn release_emval_arguments(
        &self,
        instance: &mut dyn Instance,
        caller: &MethodCaller,
        arguments: &[Value],
    ) -> Result<(), EmbindError> {
        for (argument_type, argument) in caller.argument_types.iter().zip(arguments) {
            if argument_type.has_delete_object() {
                argument_type.delete_object(self, instance, argument)?;
            }
        }
        Ok(())
    }

    /// Calls the method named by the string at `name` on the value of `handle`.
    pub fn emval_call_method(
        &self,
        instance: &mut dyn Instance,
        caller: i32,
        handle: i32,
        name: GuestPointer,
        destructors_ref: GuestPointer,
        arguments: GuestPointer,
    ) -> Result<f64, EmbindError> {
        self.invoke_emval_method(instance, caller, handle, name, Some(destructors_ref), arguments)
    }

    /// Calls a method whose result is discarded.
    pub fn emval_call_void_method(
        &self,
        instance: &mut dyn Instance,
        caller: i32,
        handle: i32,
        name: GuestPointer,
        arguments: GuestPointer,
    ) -> Result<(), EmbindError> {
        self.invoke_emval_method(instance, caller, handle, name, None, arguments)?;
        Ok(())
    }

    fn invoke_emval_method(
        &self,
        instance: &mut dyn Instance,
        caller: i32,
        handle: i32,
        name: GuestPointer,
        destructors_ref: Option<GuestPointer>,
        arguments: GuestPointer,
    ) -> Result<f64, EmbindError> {
        let caller = self.method_caller(caller)?;
        let object = self.emval_value(handle)?;
        let method = self.symbol_or_string(instance, name)?;
        let arguments = self.read_emval_arguments(instance, &caller, arguments)?;
        trace!(signature = %caller.signature, %method, "Calling host method");

        let result = match &object {
            Value::Host(host) => {
                let resolved = resolve_method(
                    host.as_ref(),
                    &method,
                    caller.return_type.name(),
                    &caller.argument_type_names(),
                )?;
                host.call_method(self, instance, &resolved, arguments.clone())?
            }
            Value::Class(_) | Value::Instance(_) => {
                self.call_method(instance, &object, &method, &arguments)?
            }
            other => {
                return Err(EmbindError::HostMethodNotFound {
                    type_name: other.kind().to_owned(),
                    capitalized: capitalize(&method),
                    method,
                })
            }
        };
        self.release_emval_arguments(instance, &caller, &arguments)?;
        self.emval_return_value(instance, &caller.return_type, destructors_ref, &result)
    }

    /// Calls the value of `handle` as a function, or as a constructor, depending on the kind
    /// of the method caller.
    pub fn emval_call(
        &self,
        instance: &mut dyn Instance,
        caller: i32,
        handle: i32,
        destructors_ref: GuestPointer,
        arguments: GuestPointer,
    ) -> Result<f64, EmbindError> {
        let caller = self.method_caller(caller)?;
        let object = self.emval_value(handle)?;
        let arguments = self.read_emval_arguments(instance, &caller, arguments)?;
        let Value::Host(host) = &object else {
            return Err(EmbindError::NotCallable(object.kind().to_owned()));
        };
        let result = match caller.kind {
            MethodCallerKind::Function => host.call(self, instance, arguments.clone())?,
            MethodCallerKind::Constructor => host.construct(
                self,
                instance,
                &caller.argument_type_names(),
                arguments.clone(),
            )?,
        };
        self.release_emval_arguments(instance, &caller, &arguments)?;
        self.emval_return_value(instance, &caller.return_type, Some(destructors_ref), &result)
    }

    /// Constructs a new value from the value of `handle`, with `arg_count` arguments of the
    /// types listed at `arg_types`.
    pub fn emval_new(
        &self,
        instance: &mut dyn Instance,
        handle: i32,
        arg_count: u32,
        arg_types: GuestPointer,
        arguments: GuestPointer,
    ) -> Result<i32, EmbindError> {
        let object = self.emval_value(handle)?;
        let raw_types = self.read_type_ids(instance, arg_count, arg_types)?;
        let mut names = Vec::with_capacity(raw_types.len());
        let mut values = Vec::with_capacity(raw_types.len());
        let mut cursor = arguments;
        for (index, raw_type) in raw_types.into_iter().enumerate() {
            let argument_type =
                self.require_registered_type(instance, raw_type, &format!("argument {index}"))?;
            values.push(argument_type.read_from_pointer(self, instance, cursor)?);
            cursor = cursor.offset(argument_type.arg_pack_advance());
            names.push(argument_type.name().to_owned());
        }
        let Value::Host(host) = &object else {
            return Err(EmbindError::NotConstructible(object.kind().to_owned()));
        };
        let value = host.construct(self, instance, &names, values)?;
        Ok(self.emval_handle(value))
    }
}
