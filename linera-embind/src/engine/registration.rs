// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registration entry points for types, enums, constants and free functions.
//!
//! The arguments mirror the guest's calling convention: names and signatures are pointers to
//! NUL-terminated strings in the guest's memory, and type lists are pointers to arrays of
//! `u32` type ids.

use super::Engine;
use crate::{
    invoker::GuestInvoker,
    registry::RegisterOptions,
    runtime::{GuestPointer, Instance, WireValue},
    symbol::{Callable, Overload},
    types::{
        AnyType, BigIntType, BoolType, EmvalType, EnumType, FieldRegistration, FloatType,
        IntegerType, MemoryViewType, RawTypeId, RegisteredType, StdStringType, StdWStringType,
        StructRegistration, StructType, TupleRegistration, TupleType, VoidType,
    },
    EmbindError,
};
use std::rc::Rc;
use tracing::debug;

/// A free function registered by the guest.
#[derive(Clone, Copy, Debug)]
pub struct FunctionRegistration {
    /// The function name.
    pub name: GuestPointer,
    /// The number of types in `arg_types`, the result type included.
    pub arg_count: u32,
    /// The result type followed by the parameter types.
    pub arg_types: GuestPointer,
    /// The signature of `invoker`.
    pub signature: GuestPointer,
    /// The function that unpacks the arguments and calls `function`.
    pub invoker: u32,
    /// The bound function, passed to `invoker`.
    pub function: u32,
    /// Whether the function is asynchronous.
    pub is_async: bool,
}

/// A getter and setter pair, for tuple elements, struct fields and class properties.
#[derive(Clone, Copy, Debug)]
pub struct FieldAccessors {
    /// The type returned by the getter.
    pub getter_return_type: i32,
    /// The signature of `getter`.
    pub getter_signature: GuestPointer,
    /// The getter function.
    pub getter: u32,
    /// The context passed to the getter.
    pub getter_context: u32,
    /// The type accepted by the setter.
    pub setter_argument_type: i32,
    /// The signature of `setter`.
    pub setter_signature: GuestPointer,
    /// The setter function, or zero for read-only class properties.
    pub setter: u32,
    /// The context passed to the setter.
    pub setter_context: u32,
}

/// A class registered by the guest.
#[derive(Clone, Copy, Debug)]
pub struct ClassRegistration {
    /// The type id of the class, used for references.
    pub raw_type: i32,
    /// The type id of pointers to the class.
    pub raw_pointer_type: i32,
    /// The type id of const pointers to the class.
    pub raw_const_pointer_type: i32,
    /// The type id of the base class, or zero.
    pub base_class_raw_type: i32,
    /// The signature of `get_actual_type`.
    pub get_actual_type_signature: GuestPointer,
    /// Returns the type id of the most derived class of an object.
    pub get_actual_type: u32,
    /// The signature of `upcast`.
    pub upcast_signature: GuestPointer,
    /// Converts a pointer to the base class, or zero.
    pub upcast: u32,
    /// The signature of `downcast`.
    pub downcast_signature: GuestPointer,
    /// Converts a pointer from the base class, or zero.
    pub downcast: u32,
    /// The class name.
    pub name: GuestPointer,
    /// The signature of `destructor`.
    pub destructor_signature: GuestPointer,
    /// Destroys an object of the class.
    pub destructor: u32,
}

/// A constructor registered for a class.
#[derive(Clone, Copy, Debug)]
pub struct ConstructorRegistration {
    /// The type id of the class.
    pub raw_class_type: i32,
    /// The number of types in `arg_types`, the result type included.
    pub arg_count: u32,
    /// The result type followed by the parameter types.
    pub arg_types: GuestPointer,
    /// The signature of `invoker`.
    pub invoker_signature: GuestPointer,
    /// The function that unpacks the arguments and calls `constructor`.
    pub invoker: u32,
    /// The constructor, passed to `invoker`.
    pub constructor: u32,
}

/// An instance method registered for a class.
#[derive(Clone, Copy, Debug)]
pub struct MethodRegistration {
    /// The type id of the class.
    pub raw_class_type: i32,
    /// The method name.
    pub name: GuestPointer,
    /// The number of types in `arg_types`.
    pub arg_count: u32,
    /// The result type, the receiver type and the parameter types.
    pub arg_types: GuestPointer,
    /// The signature of `invoker`.
    pub invoker_signature: GuestPointer,
    /// The function that unpacks the arguments and calls the method.
    pub invoker: u32,
    /// The method pointer, passed to `invoker`.
    pub context: u32,
    /// Whether the method is pure virtual.
    pub is_pure_virtual: bool,
    /// Whether the method is asynchronous.
    pub is_async: bool,
}

/// A static method registered for a class.
#[derive(Clone, Copy, Debug)]
pub struct ClassFunctionRegistration {
    /// The type id of the class.
    pub raw_class_type: i32,
    /// The method name.
    pub name: GuestPointer,
    /// The number of types in `arg_types`, the result type included.
    pub arg_count: u32,
    /// The result type followed by the parameter types.
    pub arg_types: GuestPointer,
    /// The signature of `invoker`.
    pub invoker_signature: GuestPointer,
    /// The function that unpacks the arguments and calls `function`.
    pub invoker: u32,
    /// The bound function, passed to `invoker`.
    pub function: u32,
    /// Whether the method is asynchronous.
    pub is_async: bool,
}

/// An instance property registered for a class.
#[derive(Clone, Copy, Debug)]
pub struct PropertyRegistration {
    /// The type id of the class.
    pub raw_class_type: i32,
    /// The property name.
    pub name: GuestPointer,
    /// The accessors, called with their context and the object pointer.
    pub accessors: FieldAccessors,
}

/// A static property registered for a class.
#[derive(Clone, Copy, Debug)]
pub struct ClassPropertyRegistration {
    /// The type id of the class.
    pub raw_class_type: i32,
    /// The property name.
    pub name: GuestPointer,
    /// The type of the property.
    pub raw_field_type: i32,
    /// The address of the static field, passed to the accessors.
    pub field_pointer: GuestPointer,
    /// The signature of `getter`.
    pub getter_signature: GuestPointer,
    /// The getter function.
    pub getter: u32,
    /// The signature of `setter`.
    pub setter_signature: GuestPointer,
    /// The setter function, or zero for read-only properties.
    pub setter: u32,
}

/// A smart pointer type registered by the guest.
#[derive(Clone, Copy, Debug)]
pub struct SmartPointerRegistration {
    /// The type id of the smart pointer.
    pub raw_type: i32,
    /// The type id of the class it points to.
    pub raw_pointee_type: i32,
    /// The name of the smart pointer type.
    pub name: GuestPointer,
    /// How ownership is shared: 0 for none, 1 for intrusive and 2 for sharing through emval.
    pub sharing_policy: i32,
    /// The signature of `get_pointee`.
    pub get_pointee_signature: GuestPointer,
    /// Extracts the object pointer.
    pub get_pointee: u32,
    /// The signature of `constructor`.
    pub constructor_signature: GuestPointer,
    /// Creates an empty smart pointer, or zero.
    pub constructor: u32,
    /// The signature of `share`.
    pub share_signature: GuestPointer,
    /// Creates a smart pointer sharing an object with an emval deleter, or zero.
    pub share: u32,
    /// The signature of `destructor`.
    pub destructor_signature: GuestPointer,
    /// Destroys a smart pointer.
    pub destructor: u32,
}

/// Strips the parameter list from a function name such as `foo(int)`.
pub(crate) fn function_name(name: &str) -> &str {
    let name = name.trim();
    match name.find('(') {
        Some(index) => &name[..index],
        None => name,
    }
}

/// Placeholder types describing a symbol whose types are not bound yet.
pub(crate) fn unbound_overload(
    arg_count: u32,
    message: String,
    types: Vec<RawTypeId>,
    class_name: Option<String>,
) -> Overload {
    let any: Rc<dyn RegisteredType> = Rc::new(AnyType);
    Overload {
        arg_count: Some(arg_count),
        callable: Callable::Unbound { message, types },
        result_type: any.clone(),
        argument_types: vec![any; arg_count as usize],
        class_name,
    }
}

impl Engine {
    fn register_simple(
        &self,
        instance: &mut dyn Instance,
        registered: impl RegisteredType + 'static,
    ) -> Result<(), EmbindError> {
        self.register_type(instance, Rc::new(registered), RegisterOptions::default())
    }

    /// Registers the `void` type.
    pub fn embind_register_void(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        self.register_simple(instance, VoidType::new(RawTypeId(raw_type), name))
    }

    /// Registers the `bool` type with the wire words of both truth values.
    pub fn embind_register_bool(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        true_value: i32,
        false_value: i32,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        let registered = BoolType::new(RawTypeId(raw_type), name, true_value, false_value);
        self.register_simple(instance, registered)
    }

    /// Registers an integer type of up to 32 bits.
    ///
    /// The type is unsigned if `min_range` is zero.
    pub fn embind_register_integer(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        size: u32,
        min_range: i32,
        _max_range: u32,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        let registered = IntegerType::new(RawTypeId(raw_type), name, size, min_range.into())?;
        self.register_simple(instance, registered)
    }

    /// Registers a 64-bit integer type.
    pub fn embind_register_bigint(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        _size: u32,
        min_range: i64,
        _max_range: i64,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        self.register_simple(instance, BigIntType::new(RawTypeId(raw_type), name, min_range))
    }

    /// Registers a floating point type.
    pub fn embind_register_float(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        size: u32,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        self.register_simple(instance, FloatType::new(RawTypeId(raw_type), name, size)?)
    }

    /// Registers a narrow string type.
    pub fn embind_register_std_string(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        self.register_simple(instance, StdStringType::new(RawTypeId(raw_type), name))
    }

    /// Registers a wide string type with `char_size` bytes per code unit.
    pub fn embind_register_std_wstring(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        char_size: u32,
        name: GuestPointer,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        let registered = StdWStringType::new(RawTypeId(raw_type), name, char_size)?;
        self.register_simple(instance, registered)
    }

    /// Registers a typed memory view.
    ///
    /// Memory view types may be registered more than once.
    pub fn embind_register_memory_view(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        data_type_index: u32,
        name: GuestPointer,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        let registered = MemoryViewType::new(RawTypeId(raw_type), name, data_type_index)?;
        self.register_type(
            instance,
            Rc::new(registered),
            RegisterOptions {
                ignore_duplicates: true,
            },
        )
    }

    /// Registers the `emscripten::val` type.
    ///
    /// The type may be registered more than once.
    pub fn embind_register_emval(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        self.register_type(
            instance,
            Rc::new(EmvalType::new(RawTypeId(raw_type), name)),
            RegisterOptions {
                ignore_duplicates: true,
            },
        )
    }

    /// Registers a constant, transported as a float and converted once its type is known.
    pub fn embind_register_constant(
        &self,
        instance: &mut dyn Instance,
        name: GuestPointer,
        raw_type: i32,
        value: f64,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            vec![RawTypeId(raw_type)],
            Box::new(move |engine, instance, types| {
                let constant_type = &types[0];
                let wire = constant_type.wire_from_f64(value);
                let value = constant_type.from_wire(engine, instance, wire)?;
                debug!(%name, ?value, "Registered constant");
                let mut state = engine.state_mut();
                let constant = state.constants.entry(name.clone()).or_default();
                constant.set_guest_value(&name, value)?;
                Ok(Vec::new())
            }),
        )
    }

    /// Registers an enum type.
    pub fn embind_register_enum(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        size: u32,
        is_signed: bool,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, name)?;
        let raw_type = RawTypeId(raw_type);
        let registered = EnumType::new(raw_type, name.clone(), size, is_signed)?;
        self.state_mut().enums.entry(name).or_default().raw_type = Some(raw_type);
        self.register_simple(instance, registered)
    }

    /// Registers a value of an enum type.
    pub fn embind_register_enum_value(
        &self,
        instance: &mut dyn Instance,
        raw_enum_type: i32,
        name: GuestPointer,
        value: i32,
    ) -> Result<(), EmbindError> {
        let enum_type = self.require_registered_type(instance, RawTypeId(raw_enum_type), "enum")?;
        let enum_type = enum_type
            .as_enum()
            .ok_or_else(|| EmbindError::UnexpectedTypeKind {
                type_name: enum_type.name().to_owned(),
                expected: "an enum",
            })?;
        let name = self.read_string(instance, name)?;
        let value = enum_type.widen(value as u32);
        let mut state = self.state_mut();
        let descriptor = state
            .enums
            .entry(enum_type.name().to_owned())
            .or_default();
        descriptor.check_guest_value(enum_type.name(), &name, value)?;
        descriptor.guest_values.insert(name, value);
        Ok(())
    }

    /// Registers a free function.
    ///
    /// The function is callable by name once all its types are registered. Functions with the
    /// same name and different numbers of parameters are overloads.
    pub fn embind_register_function(
        &self,
        instance: &mut dyn Instance,
        registration: FunctionRegistration,
    ) -> Result<(), EmbindError> {
        if registration.is_async {
            return Err(EmbindError::Unsupported("asynchronous functions".to_owned()));
        }
        if registration.arg_count == 0 {
            return Err(EmbindError::Decode(
                "function registered without a result type".to_owned(),
            ));
        }
        let arg_types =
            self.read_type_ids(instance, registration.arg_count, registration.arg_types)?;
        let raw_name = self.read_string(instance, registration.name)?;
        let name = function_name(&raw_name).to_owned();
        let invoker = self.require_function(instance, registration.signature, registration.invoker)?;
        let parameter_count = registration.arg_count - 1;

        self.state_mut().symbols.expose(
            &name,
            unbound_overload(
                parameter_count,
                format!("Cannot call {name} due to unbound types"),
                arg_types.clone(),
                None,
            ),
        )?;

        let target = WireValue::I32(registration.function as i32);
        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            arg_types,
            Box::new(move |engine, _instance, types| {
                let (result_type, parameter_types) = split_result(types)?;
                let function = GuestInvoker::craft(
                    name.clone(),
                    result_type.clone(),
                    None,
                    parameter_types.clone(),
                    invoker,
                    target,
                );
                engine.state_mut().symbols.replace(
                    &name,
                    Overload {
                        arg_count: Some(parameter_count),
                        callable: Callable::Invoker(Rc::new(function)),
                        result_type,
                        argument_types: parameter_types,
                        class_name: None,
                    },
                )?;
                Ok(Vec::new())
            }),
        )
    }

    fn field_registration(
        &self,
        instance: &mut dyn Instance,
        name: Option<String>,
        accessors: FieldAccessors,
    ) -> Result<FieldRegistration, EmbindError> {
        Ok(FieldRegistration {
            name,
            getter_return_type: RawTypeId(accessors.getter_return_type),
            getter: self.require_function(instance, accessors.getter_signature, accessors.getter)?,
            getter_context: WireValue::I32(accessors.getter_context as i32),
            setter_argument_type: RawTypeId(accessors.setter_argument_type),
            setter: self.require_function(instance, accessors.setter_signature, accessors.setter)?,
            setter_context: WireValue::I32(accessors.setter_context as i32),
        })
    }

    /// Opens the registration of a value tuple.
    #[allow(clippy::too_many_arguments)]
    pub fn embind_register_value_array(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        constructor_signature: GuestPointer,
        constructor: u32,
        destructor_signature: GuestPointer,
        destructor: u32,
    ) -> Result<(), EmbindError> {
        let registration = TupleRegistration {
            name: self.read_string(instance, name)?,
            constructor: self.require_function(instance, constructor_signature, constructor)?,
            destructor: self.require_function(instance, destructor_signature, destructor)?,
            elements: Vec::new(),
        };
        self.state_mut()
            .tuples
            .insert(RawTypeId(raw_type), registration);
        Ok(())
    }

    /// Adds an element to an open value tuple registration.
    pub fn embind_register_value_array_element(
        &self,
        instance: &mut dyn Instance,
        raw_tuple_type: i32,
        accessors: FieldAccessors,
    ) -> Result<(), EmbindError> {
        let element = self.field_registration(instance, None, accessors)?;
        self.state_mut()
            .tuples
            .get_mut(&RawTypeId(raw_tuple_type))
            .ok_or(EmbindError::UnknownRegistration {
                kind: "value array",
                raw_type: raw_tuple_type,
            })?
            .elements
            .push(element);
        Ok(())
    }

    /// Closes a value tuple registration, registering the tuple once its element types are
    /// known.
    pub fn embind_finalize_value_array(
        &self,
        instance: &mut dyn Instance,
        raw_tuple_type: i32,
    ) -> Result<(), EmbindError> {
        let raw_type = RawTypeId(raw_tuple_type);
        let mut registration = self.state_mut().tuples.remove(&raw_type).ok_or(
            EmbindError::UnknownRegistration {
                kind: "value array",
                raw_type: raw_tuple_type,
            },
        )?;
        let elements = std::mem::take(&mut registration.elements);
        let dependencies = FieldRegistration::dependencies(&elements);
        self.when_dependent_types_are_resolved(
            instance,
            vec![raw_type],
            dependencies,
            Box::new(move |_engine, _instance, types| {
                let elements = FieldRegistration::bind(elements, &types)?;
                let tuple: Rc<dyn RegisteredType> =
                    Rc::new(TupleType::new(raw_type, registration, elements));
                Ok(vec![tuple])
            }),
        )
    }

    /// Opens the registration of a value struct.
    #[allow(clippy::too_many_arguments)]
    pub fn embind_register_value_object(
        &self,
        instance: &mut dyn Instance,
        raw_type: i32,
        name: GuestPointer,
        constructor_signature: GuestPointer,
        constructor: u32,
        destructor_signature: GuestPointer,
        destructor: u32,
    ) -> Result<(), EmbindError> {
        let registration = StructRegistration {
            name: self.read_string(instance, name)?,
            constructor: self.require_function(instance, constructor_signature, constructor)?,
            destructor: self.require_function(instance, destructor_signature, destructor)?,
            fields: Vec::new(),
        };
        self.state_mut()
            .structs
            .insert(RawTypeId(raw_type), registration);
        Ok(())
    }

    /// Adds a field to an open value struct registration.
    pub fn embind_register_value_object_field(
        &self,
        instance: &mut dyn Instance,
        raw_struct_type: i32,
        field_name: GuestPointer,
        accessors: FieldAccessors,
    ) -> Result<(), EmbindError> {
        let field_name = self.read_string(instance, field_name)?;
        let field = self.field_registration(instance, Some(field_name), accessors)?;
        self.state_mut()
            .structs
            .get_mut(&RawTypeId(raw_struct_type))
            .ok_or(EmbindError::UnknownRegistration {
                kind: "value object",
                raw_type: raw_struct_type,
            })?
            .fields
            .push(field);
        Ok(())
    }

    /// Closes a value struct registration, registering the struct once its field types are
    /// known.
    pub fn embind_finalize_value_object(
        &self,
        instance: &mut dyn Instance,
        raw_struct_type: i32,
    ) -> Result<(), EmbindError> {
        let raw_type = RawTypeId(raw_struct_type);
        let mut registration = self.state_mut().structs.remove(&raw_type).ok_or(
            EmbindError::UnknownRegistration {
                kind: "value object",
                raw_type: raw_struct_type,
            },
        )?;
        let fields = std::mem::take(&mut registration.fields);
        let dependencies = FieldRegistration::dependencies(&fields);
        self.when_dependent_types_are_resolved(
            instance,
            vec![raw_type],
            dependencies,
            Box::new(move |_engine, _instance, types| {
                let fields = FieldRegistration::bind(fields, &types)?;
                let object: Rc<dyn RegisteredType> =
                    Rc::new(StructType::new(raw_type, registration, fields));
                Ok(vec![object])
            }),
        )
    }
}

/// Splits resolved callable types into the result type and the parameter types.
pub(crate) fn split_result(
    mut types: Vec<Rc<dyn RegisteredType>>,
) -> Result<(Rc<dyn RegisteredType>, Vec<Rc<dyn RegisteredType>>), EmbindError> {
    if types.is_empty() {
        return Err(EmbindError::Decode("callable without a result type".to_owned()));
    }
    let result_type = types.remove(0);
    Ok((result_type, types))
}
