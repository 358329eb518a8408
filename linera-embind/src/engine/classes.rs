// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registration entry points for classes, and the host operations on classes and their
//! instances.

use super::{
    registration::{
        function_name, split_result, unbound_overload, ClassFunctionRegistration,
        ClassPropertyRegistration, ClassRegistration, ConstructorRegistration, MethodRegistration,
        PropertyRegistration, SmartPointerRegistration,
    },
    Engine,
};
use crate::{
    class::{
        legal_name, Accessor, ClassHooks, ClassId, PointerType, Property, RegisteredPointers,
        SharingPolicy, SmartPointer,
    },
    invoker::GuestInvoker,
    runtime::{Instance, WireValue},
    symbol::{Callable, Overload},
    types::{run_destructors, AnyType, RawTypeId, RegisteredType},
    EmbindError, Value,
};
use std::rc::Rc;
use tracing::{debug, instrument};

/// The class a class type refers to.
fn class_of(class_type: &Rc<dyn RegisteredType>) -> Result<ClassId, EmbindError> {
    class_type
        .as_pointer()
        .map(PointerType::class)
        .ok_or_else(|| EmbindError::UnexpectedTypeKind {
            type_name: class_type.name().to_owned(),
            expected: "a class",
        })
}

impl Engine {
    /// Registers a class, with its reference, pointer and const pointer types.
    ///
    /// The class becomes constructible once its base class, if any, is registered.
    #[instrument(level = "trace", skip_all, fields(raw_type = registration.raw_type))]
    pub fn embind_register_class(
        &self,
        instance: &mut dyn Instance,
        registration: ClassRegistration,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, registration.name)?;
        let hooks = ClassHooks {
            get_actual_type: Some(self.require_function(
                instance,
                registration.get_actual_type_signature,
                registration.get_actual_type,
            )?),
            upcast: self.optional_function(
                instance,
                registration.upcast_signature,
                registration.upcast,
            )?,
            downcast: self.optional_function(
                instance,
                registration.downcast_signature,
                registration.downcast,
            )?,
            destructor: Some(self.require_function(
                instance,
                registration.destructor_signature,
                registration.destructor,
            )?),
        };
        let legal = legal_name(&name);
        let base_raw_type = RawTypeId(registration.base_class_raw_type);
        self.state_mut().symbols.expose(
            &legal,
            Overload {
                arg_count: None,
                callable: Callable::Unbound {
                    message: format!("Cannot construct {name} due to unbound types"),
                    types: vec![base_raw_type],
                },
                result_type: Rc::new(AnyType),
                argument_types: Vec::new(),
                class_name: Some(name.clone()),
            },
        )?;

        let raw_type = RawTypeId(registration.raw_type);
        let raw_pointer_type = RawTypeId(registration.raw_pointer_type);
        let raw_const_pointer_type = RawTypeId(registration.raw_const_pointer_type);
        let needed = if base_raw_type.0 > 0 {
            vec![base_raw_type]
        } else {
            Vec::new()
        };
        self.when_dependent_types_are_resolved(
            instance,
            vec![raw_type, raw_pointer_type, raw_const_pointer_type],
            needed,
            Box::new(move |engine, _instance, types| {
                let base = types.first().map(class_of).transpose()?;
                let mut state = engine.state_mut();
                let id = state.classes.entry(&name);
                let class = state.classes.get_mut(id);
                if let Some(existing) = class.raw_type {
                    return Err(EmbindError::RegistrationMismatch(format!(
                        "could not register class {name}, already registered as raw type {existing}"
                    )));
                }
                class.raw_type = Some(raw_type);
                class.base = base;
                class.hooks = hooks;
                if let Some(base) = base {
                    state.classes.get_mut(base).derived.push(id);
                }

                let has_base = base.is_some();
                let reference = PointerType::new(raw_type, name.clone(), id, has_base, true, false);
                let pointer = PointerType::new(
                    raw_pointer_type,
                    format!("{name}*"),
                    id,
                    has_base,
                    false,
                    false,
                );
                let const_pointer = PointerType::new(
                    raw_const_pointer_type,
                    format!("{name} const*"),
                    id,
                    has_base,
                    false,
                    true,
                );
                state.registered_pointers.insert(
                    raw_type,
                    RegisteredPointers {
                        pointer: pointer.clone(),
                        const_pointer: const_pointer.clone(),
                    },
                );
                state.symbols.replace(
                    &legal,
                    Overload {
                        arg_count: None,
                        callable: Callable::Construct(id),
                        result_type: Rc::new(reference.clone()),
                        argument_types: Vec::new(),
                        class_name: Some(name.clone()),
                    },
                )?;
                debug!(class = %name, "Registered class");
                Ok(vec![
                    Rc::new(reference) as Rc<dyn RegisteredType>,
                    Rc::new(pointer),
                    Rc::new(const_pointer),
                ])
            }),
        )
    }

    /// Registers a constructor of a class.
    #[instrument(level = "trace", skip_all, fields(raw_class_type = registration.raw_class_type))]
    pub fn embind_register_class_constructor(
        &self,
        instance: &mut dyn Instance,
        registration: ConstructorRegistration,
    ) -> Result<(), EmbindError> {
        if registration.arg_count == 0 {
            return Err(EmbindError::Decode(
                "constructor registered without a result type".to_owned(),
            ));
        }
        let arg_types =
            self.read_type_ids(instance, registration.arg_count, registration.arg_types)?;
        let invoker = self.require_function(
            instance,
            registration.invoker_signature,
            registration.invoker,
        )?;
        let target = WireValue::I32(registration.constructor as i32);
        let parameter_count = registration.arg_count - 1;

        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            vec![RawTypeId(registration.raw_class_type)],
            Box::new(move |engine, instance, types| {
                let class = class_of(&types[0])?;
                let class_name = types[0].name().to_owned();
                {
                    let mut state = engine.state_mut();
                    let constructors = &mut state.classes.get_mut(class).constructors;
                    if constructors.contains_key(&parameter_count) {
                        return Err(EmbindError::DuplicateConstructor {
                            class: class_name,
                            arity: parameter_count,
                        });
                    }
                    constructors.insert(
                        parameter_count,
                        Callable::Unbound {
                            message: format!("Cannot construct {class_name} due to unbound types"),
                            types: arg_types.clone(),
                        },
                    );
                }
                engine.when_dependent_types_are_resolved(
                    instance,
                    Vec::new(),
                    arg_types,
                    Box::new(move |engine, _instance, types| {
                        let (result_type, parameter_types) = split_result(types)?;
                        let constructor = GuestInvoker::craft(
                            format!("constructor {class_name}"),
                            result_type,
                            None,
                            parameter_types,
                            invoker,
                            target,
                        );
                        engine
                            .state_mut()
                            .classes
                            .get_mut(class)
                            .constructors
                            .insert(parameter_count, Callable::Invoker(Rc::new(constructor)));
                        Ok(Vec::new())
                    }),
                )?;
                Ok(Vec::new())
            }),
        )
    }

    /// Registers an instance method of a class.
    ///
    /// A method with the name of an inherited method and the same number of parameters
    /// overrides it. Otherwise methods with the same name are overloads.
    #[instrument(level = "trace", skip_all, fields(raw_class_type = registration.raw_class_type))]
    pub fn embind_register_class_function(
        &self,
        instance: &mut dyn Instance,
        registration: MethodRegistration,
    ) -> Result<(), EmbindError> {
        if registration.is_async {
            return Err(EmbindError::Unsupported("asynchronous methods".to_owned()));
        }
        if registration.arg_count < 2 {
            return Err(EmbindError::Decode(
                "method registered without a receiver type".to_owned(),
            ));
        }
        let arg_types =
            self.read_type_ids(instance, registration.arg_count, registration.arg_types)?;
        let raw_name = self.read_string(instance, registration.name)?;
        let name = function_name(&raw_name).to_owned();
        let invoker = self.require_function(
            instance,
            registration.invoker_signature,
            registration.invoker,
        )?;
        let target = WireValue::I32(registration.context as i32);
        let parameter_count = registration.arg_count - 2;
        let is_pure_virtual = registration.is_pure_virtual;

        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            vec![RawTypeId(registration.raw_class_type)],
            Box::new(move |engine, instance, types| {
                let class = class_of(&types[0])?;
                let class_name = types[0].name().to_owned();
                let human_name = format!("{class_name}.{name}");
                {
                    let mut state = engine.state_mut();
                    let inherited = state.classes.find_method(class, &name).cloned();
                    let descriptor = state.classes.get_mut(class);
                    if is_pure_virtual {
                        descriptor.pure_virtual.insert(name.clone());
                    }
                    descriptor.methods.install(
                        &name,
                        inherited,
                        unbound_overload(
                            parameter_count,
                            format!("Cannot call {human_name} due to unbound types"),
                            arg_types.clone(),
                            Some(class_name.clone()),
                        ),
                        true,
                    );
                }
                engine.when_dependent_types_are_resolved(
                    instance,
                    Vec::new(),
                    arg_types,
                    Box::new(move |engine, _instance, types| {
                        let (result_type, mut parameter_types) = split_result(types)?;
                        if parameter_types.is_empty() {
                            return Err(EmbindError::Decode(format!(
                                "{human_name} has no receiver type"
                            )));
                        }
                        let this_type = parameter_types.remove(0);
                        let method = GuestInvoker::craft(
                            human_name,
                            result_type.clone(),
                            Some(this_type),
                            parameter_types.clone(),
                            invoker,
                            target,
                        );
                        engine.state_mut().classes.get_mut(class).methods.replace(
                            &name,
                            Overload {
                                arg_count: Some(parameter_count),
                                callable: Callable::Invoker(Rc::new(method)),
                                result_type,
                                argument_types: parameter_types,
                                class_name: Some(class_name),
                            },
                        )?;
                        Ok(Vec::new())
                    }),
                )?;
                Ok(Vec::new())
            }),
        )
    }

    /// Registers a static method of a class.
    ///
    /// Once bound, the method is also installed on the already registered derived classes
    /// that have no static method with that name. Only the first such method reaches a derived
    /// class: later overloads are not propagated.
    #[instrument(level = "trace", skip_all, fields(raw_class_type = registration.raw_class_type))]
    pub fn embind_register_class_class_function(
        &self,
        instance: &mut dyn Instance,
        registration: ClassFunctionRegistration,
    ) -> Result<(), EmbindError> {
        if registration.is_async {
            return Err(EmbindError::Unsupported("asynchronous methods".to_owned()));
        }
        if registration.arg_count == 0 {
            return Err(EmbindError::Decode(
                "static method registered without a result type".to_owned(),
            ));
        }
        let arg_types =
            self.read_type_ids(instance, registration.arg_count, registration.arg_types)?;
        let raw_name = self.read_string(instance, registration.name)?;
        let name = function_name(&raw_name).to_owned();
        let invoker = self.require_function(
            instance,
            registration.invoker_signature,
            registration.invoker,
        )?;
        let target = WireValue::I32(registration.function as i32);
        let parameter_count = registration.arg_count - 1;

        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            vec![RawTypeId(registration.raw_class_type)],
            Box::new(move |engine, instance, types| {
                let class = class_of(&types[0])?;
                let class_name = types[0].name().to_owned();
                let human_name = format!("{class_name}.{name}");
                {
                    let mut state = engine.state_mut();
                    let static_methods = &mut state.classes.get_mut(class).static_methods;
                    let existing = static_methods.get(&name).cloned();
                    static_methods.install(
                        &name,
                        existing,
                        unbound_overload(
                            parameter_count,
                            format!("Cannot call {human_name} due to unbound types"),
                            arg_types.clone(),
                            Some(class_name.clone()),
                        ),
                        false,
                    );
                }
                engine.when_dependent_types_are_resolved(
                    instance,
                    Vec::new(),
                    arg_types,
                    Box::new(move |engine, _instance, types| {
                        let (result_type, parameter_types) = split_result(types)?;
                        let function = GuestInvoker::craft(
                            human_name,
                            result_type.clone(),
                            None,
                            parameter_types.clone(),
                            invoker,
                            target,
                        );
                        let overload = Overload {
                            arg_count: Some(parameter_count),
                            callable: Callable::Invoker(Rc::new(function)),
                            result_type,
                            argument_types: parameter_types,
                            class_name: Some(class_name),
                        };
                        let mut state = engine.state_mut();
                        state
                            .classes
                            .get_mut(class)
                            .static_methods
                            .replace(&name, overload.clone())?;
                        let derived = state.classes.get(class).derived.clone();
                        for derived in derived {
                            let static_methods = &mut state.classes.get_mut(derived).static_methods;
                            if !static_methods.contains(&name) {
                                static_methods.install(&name, None, overload.clone(), false);
                            }
                        }
                        Ok(Vec::new())
                    }),
                )?;
                Ok(Vec::new())
            }),
        )
    }

    /// Registers an instance property of a class.
    ///
    /// The property is read-only if no setter is given.
    #[instrument(level = "trace", skip_all, fields(raw_class_type = registration.raw_class_type))]
    pub fn embind_register_class_property(
        &self,
        instance: &mut dyn Instance,
        registration: PropertyRegistration,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, registration.name)?;
        let accessors = registration.accessors;
        let getter =
            self.require_function(instance, accessors.getter_signature, accessors.getter)?;
        let setter =
            self.optional_function(instance, accessors.setter_signature, accessors.setter)?;
        let getter_type = RawTypeId(accessors.getter_return_type);
        let setter_type = RawTypeId(accessors.setter_argument_type);

        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            vec![RawTypeId(registration.raw_class_type)],
            Box::new(move |engine, instance, types| {
                let class = class_of(&types[0])?;
                let human_name = format!("{}.{name}", types[0].name());
                let read_only = setter.is_none();
                let needed = if read_only {
                    vec![getter_type]
                } else {
                    vec![getter_type, setter_type]
                };
                engine.state_mut().classes.get_mut(class).properties.insert(
                    name.clone(),
                    Property::Unbound {
                        message: format!("Cannot access {human_name} due to unbound types"),
                        types: [getter_type, setter_type]
                            .into_iter()
                            .filter(|raw_type| raw_type.0 > 0)
                            .collect(),
                        read_only,
                    },
                );
                engine.when_dependent_types_are_resolved(
                    instance,
                    Vec::new(),
                    needed,
                    Box::new(move |engine, _instance, types| {
                        let getter = Accessor {
                            function: getter,
                            context: WireValue::I32(accessors.getter_context as i32),
                            field_type: types[0].clone(),
                        };
                        let setter = setter.zip(types.get(1)).map(|(function, field_type)| {
                            Accessor {
                                function,
                                context: WireValue::I32(accessors.setter_context as i32),
                                field_type: field_type.clone(),
                            }
                        });
                        engine
                            .state_mut()
                            .classes
                            .get_mut(class)
                            .properties
                            .insert(name, Property::Bound { getter, setter });
                        Ok(Vec::new())
                    }),
                )?;
                Ok(Vec::new())
            }),
        )
    }

    /// Registers a static property of a class, backed by a field in the guest's memory.
    #[instrument(level = "trace", skip_all, fields(raw_class_type = registration.raw_class_type))]
    pub fn embind_register_class_class_property(
        &self,
        instance: &mut dyn Instance,
        registration: ClassPropertyRegistration,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, registration.name)?;
        let getter =
            self.require_function(instance, registration.getter_signature, registration.getter)?;
        let setter =
            self.optional_function(instance, registration.setter_signature, registration.setter)?;
        let field_type = RawTypeId(registration.raw_field_type);
        let context = WireValue::from(registration.field_pointer);

        self.when_dependent_types_are_resolved(
            instance,
            Vec::new(),
            vec![RawTypeId(registration.raw_class_type)],
            Box::new(move |engine, instance, types| {
                let class = class_of(&types[0])?;
                let human_name = format!("{}.{name}", types[0].name());
                engine
                    .state_mut()
                    .classes
                    .get_mut(class)
                    .static_properties
                    .insert(
                        name.clone(),
                        Property::Unbound {
                            message: format!("Cannot access {human_name} due to unbound types"),
                            types: vec![field_type],
                            read_only: setter.is_none(),
                        },
                    );
                engine.when_dependent_types_are_resolved(
                    instance,
                    Vec::new(),
                    vec![field_type],
                    Box::new(move |engine, _instance, types| {
                        let field_type = types[0].clone();
                        let getter = Accessor {
                            function: getter,
                            context,
                            field_type: field_type.clone(),
                        };
                        let setter = setter.map(|function| Accessor {
                            function,
                            context,
                            field_type,
                        });
                        engine
                            .state_mut()
                            .classes
                            .get_mut(class)
                            .static_properties
                            .insert(name, Property::Bound { getter, setter });
                        Ok(Vec::new())
                    }),
                )?;
                Ok(Vec::new())
            }),
        )
    }

    /// Registers a smart pointer type wrapping instances of a class.
    #[instrument(level = "trace", skip_all, fields(raw_type = registration.raw_type))]
    pub fn embind_register_smart_ptr(
        &self,
        instance: &mut dyn Instance,
        registration: SmartPointerRegistration,
    ) -> Result<(), EmbindError> {
        let name = self.read_string(instance, registration.name)?;
        let sharing_policy = SharingPolicy::try_from(registration.sharing_policy)?;
        let get_pointee = self.require_function(
            instance,
            registration.get_pointee_signature,
            registration.get_pointee,
        )?;
        let constructor = self.optional_function(
            instance,
            registration.constructor_signature,
            registration.constructor,
        )?;
        let share =
            self.optional_function(instance, registration.share_signature, registration.share)?;
        let destructor = self.require_function(
            instance,
            registration.destructor_signature,
            registration.destructor,
        )?;
        let raw_type = RawTypeId(registration.raw_type);

        self.when_dependent_types_are_resolved(
            instance,
            vec![raw_type],
            vec![RawTypeId(registration.raw_pointee_type)],
            Box::new(move |_engine, _instance, types| {
                let pointee = types[0].as_pointer().cloned().ok_or_else(|| {
                    EmbindError::UnexpectedTypeKind {
                        type_name: types[0].name().to_owned(),
                        expected: "a class",
                    }
                })?;
                let smart_pointer = PointerType::new_smart(
                    raw_type,
                    name,
                    SmartPointer {
                        pointee,
                        sharing_policy,
                        get_pointee,
                        constructor,
                        share,
                        destructor,
                    },
                );
                Ok(vec![Rc::new(smart_pointer) as Rc<dyn RegisteredType>])
            }),
        )
    }

    pub(crate) fn call_overload(
        &self,
        instance: &mut dyn Instance,
        callable: Callable,
        this: Option<&Value>,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        match callable {
            Callable::Unbound { message, types } => {
                Err(self.unbound_type_error(instance, &message, &types))
            }
            Callable::Invoker(invoker) => invoker.invoke(self, instance, this, arguments),
            Callable::Construct(class) => self.construct_class(instance, class, arguments),
        }
    }

    /// Constructs an instance of the class named `class_name`.
    pub fn construct(
        &self,
        instance: &mut dyn Instance,
        class_name: &str,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        let class = self
            .state()
            .classes
            .find(class_name)
            .filter(|class| self.state().classes.get(*class).raw_type.is_some());
        match class {
            Some(class) => self.construct_class(instance, class, arguments),
            None => {
                let legal = legal_name(class_name);
                if !self.state().symbols.contains(&legal) {
                    return Err(EmbindError::UnknownClass(class_name.to_owned()));
                }
                self.call_function(instance, &legal, arguments)
            }
        }
    }

    fn construct_class(
        &self,
        instance: &mut dyn Instance,
        class: ClassId,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        let constructor = {
            let state = self.state();
            let descriptor = state.classes.get(class);
            if descriptor.constructors.is_empty() {
                return Err(EmbindError::NoConstructor(descriptor.name.clone()));
            }
            u32::try_from(arguments.len())
                .ok()
                .and_then(|count| descriptor.constructors.get(&count))
                .cloned()
                .ok_or_else(|| EmbindError::ConstructorArity {
                    class: descriptor.name.clone(),
                    actual: arguments.len(),
                    expected: descriptor.constructors.keys().copied().collect(),
                })?
        };
        self.call_overload(instance, constructor, None, arguments)
    }

    /// Calls a method on a class instance.
    pub fn call_method(
        &self,
        instance: &mut dyn Instance,
        this: &Value,
        name: &str,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        let handle = this.class_handle().ok_or_else(|| EmbindError::NotAnInstance {
            expected: "class instance".to_owned(),
            actual: this.kind(),
        })?;
        let method = {
            let state = self.state();
            let class = state
                .handles
                .get(handle)
                .map_err(|_| EmbindError::DeletedObject(format!("\"this\" of {name}")))?
                .pointer_type
                .class();
            let class_name = &state.classes.get(class).name;
            let slot = state.classes.find_method(class, name).ok_or_else(|| {
                EmbindError::UnknownMethod {
                    class: class_name.clone(),
                    method: name.to_owned(),
                }
            })?;
            slot.resolve(&format!("{class_name}.{name}"), arguments.len())?
                .callable
                .clone()
        };
        self.call_overload(instance, method, Some(this), arguments)
    }

    /// Calls a static method of the class named `class_name`.
    pub fn call_static_method(
        &self,
        instance: &mut dyn Instance,
        class_name: &str,
        name: &str,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        let method = {
            let state = self.state();
            let class = state.classes.require(class_name)?;
            let slot = state
                .classes
                .get(class)
                .static_methods
                .get(name)
                .ok_or_else(|| EmbindError::UnknownMethod {
                    class: class_name.to_owned(),
                    method: name.to_owned(),
                })?;
            slot.resolve(&format!("{class_name}.{name}"), arguments.len())?
                .callable
                .clone()
        };
        self.call_overload(instance, method, None, arguments)
    }

    /// Reads a property of a class instance.
    pub fn get_property(
        &self,
        instance: &mut dyn Instance,
        this: &Value,
        name: &str,
    ) -> Result<Value, EmbindError> {
        let (owner, human_name, property) = self.find_property(this, name, "getter")?;
        match property {
            Property::Unbound { message, types, .. } => {
                Err(self.unbound_type_error(instance, &message, &types))
            }
            Property::Bound { getter, .. } => {
                let pointer =
                    self.validate_this(instance, this, owner, &format!("{human_name} getter"))?;
                self.read_accessor(instance, &getter, &[pointer.into()])
            }
        }
    }

    /// Writes a property of a class instance.
    pub fn set_property(
        &self,
        instance: &mut dyn Instance,
        this: &Value,
        name: &str,
        value: &Value,
    ) -> Result<(), EmbindError> {
        let (owner, human_name, property) = self.find_property(this, name, "setter")?;
        match property {
            Property::Unbound {
                read_only: true, ..
            }
            | Property::Bound { setter: None, .. } => {
                Err(EmbindError::ReadOnlyProperty(human_name))
            }
            Property::Unbound { message, types, .. } => {
                Err(self.unbound_type_error(instance, &message, &types))
            }
            Property::Bound {
                setter: Some(setter),
                ..
            } => {
                let pointer =
                    self.validate_this(instance, this, owner, &format!("{human_name} setter"))?;
                self.write_accessor(instance, &setter, &[pointer.into()], value)
            }
        }
    }

    fn find_property(
        &self,
        this: &Value,
        name: &str,
        accessor: &str,
    ) -> Result<(ClassId, String, Property), EmbindError> {
        let handle = this.class_handle().ok_or_else(|| EmbindError::NotAnInstance {
            expected: "class instance".to_owned(),
            actual: this.kind(),
        })?;
        let state = self.state();
        let class = state
            .handles
            .get(handle)
            .map_err(|_| EmbindError::DeletedObject(format!("\"this\" of {name} {accessor}")))?
            .pointer_type
            .class();
        let (owner, property) = state.classes.find_property(class, name).ok_or_else(|| {
            EmbindError::UnknownProperty {
                owner: state.classes.get(class).name.clone(),
                property: name.to_owned(),
            }
        })?;
        let human_name = format!("{}.{name}", state.classes.get(owner).name);
        Ok((owner, human_name, property.clone()))
    }

    /// Reads a static property of the class named `class_name`.
    pub fn get_static_property(
        &self,
        instance: &mut dyn Instance,
        class_name: &str,
        name: &str,
    ) -> Result<Value, EmbindError> {
        match self.find_static_property(class_name, name)? {
            Property::Unbound { message, types, .. } => {
                Err(self.unbound_type_error(instance, &message, &types))
            }
            Property::Bound { getter, .. } => self.read_accessor(instance, &getter, &[]),
        }
    }

    /// Writes a static property of the class named `class_name`.
    pub fn set_static_property(
        &self,
        instance: &mut dyn Instance,
        class_name: &str,
        name: &str,
        value: &Value,
    ) -> Result<(), EmbindError> {
        match self.find_static_property(class_name, name)? {
            Property::Unbound {
                read_only: true, ..
            }
            | Property::Bound { setter: None, .. } => Err(EmbindError::ReadOnlyProperty(
                format!("{class_name}.{name}"),
            )),
            Property::Unbound { message, types, .. } => {
                Err(self.unbound_type_error(instance, &message, &types))
            }
            Property::Bound {
                setter: Some(setter),
                ..
            } => self.write_accessor(instance, &setter, &[], value),
        }
    }

    fn find_static_property(&self, class_name: &str, name: &str) -> Result<Property, EmbindError> {
        let state = self.state();
        let class = state.classes.require(class_name)?;
        state
            .classes
            .get(class)
            .static_properties
            .get(name)
            .cloned()
            .ok_or_else(|| EmbindError::UnknownProperty {
                owner: class_name.to_owned(),
                property: name.to_owned(),
            })
    }

    fn read_accessor(
        &self,
        instance: &mut dyn Instance,
        getter: &Accessor,
        arguments: &[WireValue],
    ) -> Result<Value, EmbindError> {
        let mut wire_arguments = vec![getter.context];
        wire_arguments.extend_from_slice(arguments);
        let results = instance.call_indirect(&getter.function, &wire_arguments)?;
        let wire = getter.function.single_result(results)?.ok_or_else(|| {
            EmbindError::Decode(format!("getter of {} returned nothing", getter.field_type.name()))
        })?;
        getter.field_type.from_wire(self, instance, wire)
    }

    fn write_accessor(
        &self,
        instance: &mut dyn Instance,
        setter: &Accessor,
        arguments: &[WireValue],
        value: &Value,
    ) -> Result<(), EmbindError> {
        let mut destructors = Vec::new();
        let wire = setter
            .field_type
            .to_wire(self, instance, Some(&mut destructors), value)?;
        let mut wire_arguments = vec![setter.context];
        wire_arguments.extend_from_slice(arguments);
        wire_arguments.push(wire);
        let result = instance.call_indirect(&setter.function, &wire_arguments);
        run_destructors(self, instance, destructors)?;
        result?;
        Ok(())
    }
}
