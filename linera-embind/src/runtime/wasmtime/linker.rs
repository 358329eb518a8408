// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Links the guest-facing entry points of an [`Engine`] as Wasmtime host functions.
//!
//! Every host function recovers the engine from the store data, so the same [`Linker`] can
//! instantiate any number of guests.

use super::{CallerInstance, EngineStore};
use crate::{
    runtime::Instance, ClassFunctionRegistration, ClassPropertyRegistration, ClassRegistration,
    ConstructorRegistration, EmbindError, Engine, EngineConfig, FieldAccessors,
    FunctionRegistration, MethodRegistration, PropertyRegistration, SmartPointerRegistration,
};
use wasmtime::{Caller, Linker};

/// Runs `operation` on the engine of the calling guest, turning failures into traps.
fn with_engine<Data, Output>(
    caller: Caller<'_, Data>,
    operation: impl FnOnce(&Engine, &mut dyn Instance) -> Result<Output, EmbindError>,
) -> anyhow::Result<Output>
where
    Data: EngineStore + 'static,
{
    let mut instance = CallerInstance::new(caller);
    let engine = instance.engine().clone();
    Ok(operation(&engine, &mut instance)?)
}

/// Wraps an engine operation as a host function with the listed guest parameters.
macro_rules! link {
    (
        $linker:ident, $module:ident, $name:literal,
        |$engine:ident, $instance:ident $(, $parameter:ident : $type:ty)*| $body:expr
    ) => {
        $linker.func_wrap(
            $module,
            $name,
            |caller: Caller<'_, Data>, $( $parameter: $type ),*| {
                with_engine(caller, |$engine, $instance| $body)
            },
        )?;
    };
}

/// Adds the registration and emval entry points to `linker`, under the import module named in
/// `config`.
pub fn add_to_linker<Data>(linker: &mut Linker<Data>, config: &EngineConfig) -> anyhow::Result<()>
where
    Data: EngineStore + 'static,
{
    let module = config.import_module.as_str();
    link_type_registration(linker, module)?;
    link_compound_registration(linker, module)?;
    link_class_registration(linker, module)?;
    link_emval(linker, module)?;
    Ok(())
}

fn link_type_registration<Data>(linker: &mut Linker<Data>, module: &str) -> anyhow::Result<()>
where
    Data: EngineStore + 'static,
{
    link!(linker, module, "_embind_register_void",
        |engine, instance, raw_type: i32, name: i32| {
            engine.embind_register_void(instance, raw_type, name.into())
        });
    link!(linker, module, "_embind_register_bool",
        |engine, instance, raw_type: i32, name: i32, true_value: i32, false_value: i32| {
            engine.embind_register_bool(instance, raw_type, name.into(), true_value, false_value)
        });
    link!(linker, module, "_embind_register_integer",
        |engine, instance, raw_type: i32, name: i32, size: i32, min_range: i32, max_range: i32| {
            engine.embind_register_integer(
                instance,
                raw_type,
                name.into(),
                size as u32,
                min_range,
                max_range as u32,
            )
        });
    link!(linker, module, "_embind_register_bigint",
        |engine, instance, raw_type: i32, name: i32, size: i32, min_range: i64, max_range: i64| {
            engine.embind_register_bigint(
                instance,
                raw_type,
                name.into(),
                size as u32,
                min_range,
                max_range,
            )
        });
    link!(linker, module, "_embind_register_float",
        |engine, instance, raw_type: i32, name: i32, size: i32| {
            engine.embind_register_float(instance, raw_type, name.into(), size as u32)
        });
    link!(linker, module, "_embind_register_std_string",
        |engine, instance, raw_type: i32, name: i32| {
            engine.embind_register_std_string(instance, raw_type, name.into())
        });
    link!(linker, module, "_embind_register_std_wstring",
        |engine, instance, raw_type: i32, char_size: i32, name: i32| {
            engine.embind_register_std_wstring(instance, raw_type, char_size as u32, name.into())
        });
    link!(linker, module, "_embind_register_memory_view",
        |engine, instance, raw_type: i32, data_type_index: i32, name: i32| {
            engine.embind_register_memory_view(
                instance,
                raw_type,
                data_type_index as u32,
                name.into(),
            )
        });
    link!(linker, module, "_embind_register_emval",
        |engine, instance, raw_type: i32, name: i32| {
            engine.embind_register_emval(instance, raw_type, name.into())
        });
    link!(linker, module, "_embind_register_constant",
        |engine, instance, name: i32, raw_type: i32, value: f64| {
            engine.embind_register_constant(instance, name.into(), raw_type, value)
        });
    link!(linker, module, "_embind_register_enum",
        |engine, instance, raw_type: i32, name: i32, size: i32, is_signed: i32| {
            engine.embind_register_enum(instance, raw_type, name.into(), size as u32, is_signed != 0)
        });
    link!(linker, module, "_embind_register_enum_value",
        |engine, instance, raw_enum_type: i32, name: i32, value: i32| {
            engine.embind_register_enum_value(instance, raw_enum_type, name.into(), value)
        });
    link!(linker, module, "_embind_register_function",
        |engine, instance, name: i32, arg_count: i32, arg_types: i32, signature: i32,
            invoker: i32, function: i32, is_async: i32| {
            engine.embind_register_function(
                instance,
                FunctionRegistration {
                    name: name.into(),
                    arg_count: arg_count as u32,
                    arg_types: arg_types.into(),
                    signature: signature.into(),
                    invoker: invoker as u32,
                    function: function as u32,
                    is_async: is_async != 0,
                },
            )
        });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn accessors(
    getter_return_type: i32,
    getter_signature: i32,
    getter: i32,
    getter_context: i32,
    setter_argument_type: i32,
    setter_signature: i32,
    setter: i32,
    setter_context: i32,
) -> FieldAccessors {
    FieldAccessors {
        getter_return_type,
        getter_signature: getter_signature.into(),
        getter: getter as u32,
        getter_context: getter_context as u32,
        setter_argument_type,
        setter_signature: setter_signature.into(),
        setter: setter as u32,
        setter_context: setter_context as u32,
    }
}

fn link_compound_registration<Data>(linker: &mut Linker<Data>, module: &str) -> anyhow::Result<()>
where
    Data: EngineStore + 'static,
{
    link!(linker, module, "_embind_register_value_array",
        |engine, instance, raw_type: i32, name: i32, constructor_signature: i32,
            constructor: i32, destructor_signature: i32, destructor: i32| {
            engine.embind_register_value_array(
                instance,
                raw_type,
                name.into(),
                constructor_signature.into(),
                constructor as u32,
                destructor_signature.into(),
                destructor as u32,
            )
        });
    link!(linker, module, "_embind_register_value_array_element",
        |engine, instance, raw_tuple_type: i32, getter_return_type: i32, getter_signature: i32,
            getter: i32, getter_context: i32, setter_argument_type: i32, setter_signature: i32,
            setter: i32, setter_context: i32| {
            engine.embind_register_value_array_element(
                instance,
                raw_tuple_type,
                accessors(
                    getter_return_type,
                    getter_signature,
                    getter,
                    getter_context,
                    setter_argument_type,
                    setter_signature,
                    setter,
                    setter_context,
                ),
            )
        });
    link!(linker, module, "_embind_finalize_value_array",
        |engine, instance, raw_tuple_type: i32| {
            engine.embind_finalize_value_array(instance, raw_tuple_type)
        });
    link!(linker, module, "_embind_register_value_object",
        |engine, instance, raw_type: i32, name: i32, constructor_signature: i32,
            constructor: i32, destructor_signature: i32, destructor: i32| {
            engine.embind_register_value_object(
                instance,
                raw_type,
                name.into(),
                constructor_signature.into(),
                constructor as u32,
                destructor_signature.into(),
                destructor as u32,
            )
        });
    link!(linker, module, "_embind_register_value_object_field",
        |engine, instance, raw_struct_type: i32, field_name: i32, getter_return_type: i32,
            getter_signature: i32, getter: i32, getter_context: i32, setter_argument_type: i32,
            setter_signature: i32, setter: i32, setter_context: i32| {
            engine.embind_register_value_object_field(
                instance,
                raw_struct_type,
                field_name.into(),
                accessors(
                    getter_return_type,
                    getter_signature,
                    getter,
                    getter_context,
                    setter_argument_type,
                    setter_signature,
                    setter,
                    setter_context,
                ),
            )
        });
    link!(linker, module, "_embind_finalize_value_object",
        |engine, instance, raw_struct_type: i32| {
            engine.embind_finalize_value_object(instance, raw_struct_type)
        });
    Ok(())
}

fn link_class_registration<Data>(linker: &mut Linker<Data>, module: &str) -> anyhow::Result<()>
where
    Data: EngineStore + 'static,
{
    link!(linker, module, "_embind_register_class",
        |engine, instance, raw_type: i32, raw_pointer_type: i32, raw_const_pointer_type: i32,
            base_class_raw_type: i32, get_actual_type_signature: i32, get_actual_type: i32,
            upcast_signature: i32, upcast: i32, downcast_signature: i32, downcast: i32,
            name: i32, destructor_signature: i32, destructor: i32| {
            engine.embind_register_class(
                instance,
                ClassRegistration {
                    raw_type,
                    raw_pointer_type,
                    raw_const_pointer_type,
                    base_class_raw_type,
                    get_actual_type_signature: get_actual_type_signature.into(),
                    get_actual_type: get_actual_type as u32,
                    upcast_signature: upcast_signature.into(),
                    upcast: upcast as u32,
                    downcast_signature: downcast_signature.into(),
                    downcast: downcast as u32,
                    name: name.into(),
                    destructor_signature: destructor_signature.into(),
                    destructor: destructor as u32,
                },
            )
        });
    link!(linker, module, "_embind_register_class_constructor",
        |engine, instance, raw_class_type: i32, arg_count: i32, arg_types: i32,
            invoker_signature: i32, invoker: i32, constructor: i32| {
            engine.embind_register_class_constructor(
                instance,
                ConstructorRegistration {
                    raw_class_type,
                    arg_count: arg_count as u32,
                    arg_types: arg_types.into(),
                    invoker_signature: invoker_signature.into(),
                    invoker: invoker as u32,
                    constructor: constructor as u32,
                },
            )
        });
    link!(linker, module, "_embind_register_class_function",
        |engine, instance, raw_class_type: i32, name: i32, arg_count: i32, arg_types: i32,
            invoker_signature: i32, invoker: i32, context: i32, is_pure_virtual: i32,
            is_async: i32| {
            engine.embind_register_class_function(
                instance,
                MethodRegistration {
                    raw_class_type,
                    name: name.into(),
                    arg_count: arg_count as u32,
                    arg_types: arg_types.into(),
                    invoker_signature: invoker_signature.into(),
                    invoker: invoker as u32,
                    context: context as u32,
                    is_pure_virtual: is_pure_virtual != 0,
                    is_async: is_async != 0,
                },
            )
        });
    link!(linker, module, "_embind_register_class_class_function",
        |engine, instance, raw_class_type: i32, name: i32, arg_count: i32, arg_types: i32,
            invoker_signature: i32, invoker: i32, function: i32, is_async: i32| {
            engine.embind_register_class_class_function(
                instance,
                ClassFunctionRegistration {
                    raw_class_type,
                    name: name.into(),
                    arg_count: arg_count as u32,
                    arg_types: arg_types.into(),
                    invoker_signature: invoker_signature.into(),
                    invoker: invoker as u32,
                    function: function as u32,
                    is_async: is_async != 0,
                },
            )
        });
    link!(linker, module, "_embind_register_class_property",
        |engine, instance, raw_class_type: i32, name: i32, getter_return_type: i32,
            getter_signature: i32, getter: i32, getter_context: i32, setter_argument_type: i32,
            setter_signature: i32, setter: i32, setter_context: i32| {
            engine.embind_register_class_property(
                instance,
                PropertyRegistration {
                    raw_class_type,
                    name: name.into(),
                    accessors: accessors(
                        getter_return_type,
                        getter_signature,
                        getter,
                        getter_context,
                        setter_argument_type,
                        setter_signature,
                        setter,
                        setter_context,
                    ),
                },
            )
        });
    link!(linker, module, "_embind_register_class_class_property",
        |engine, instance, raw_class_type: i32, name: i32, raw_field_type: i32,
            field_pointer: i32, getter_signature: i32, getter: i32, setter_signature: i32,
            setter: i32| {
            engine.embind_register_class_class_property(
                instance,
                ClassPropertyRegistration {
                    raw_class_type,
                    name: name.into(),
                    raw_field_type,
                    field_pointer: field_pointer.into(),
                    getter_signature: getter_signature.into(),
                    getter: getter as u32,
                    setter_signature: setter_signature.into(),
                    setter: setter as u32,
                },
            )
        });
    link!(linker, module, "_embind_register_smart_ptr",
        |engine, instance, raw_type: i32, raw_pointee_type: i32, name: i32, sharing_policy: i32,
            get_pointee_signature: i32, get_pointee: i32, constructor_signature: i32,
            constructor: i32, share_signature: i32, share: i32, destructor_signature: i32,
            destructor: i32| {
            engine.embind_register_smart_ptr(
                instance,
                SmartPointerRegistration {
                    raw_type,
                    raw_pointee_type,
                    name: name.into(),
                    sharing_policy,
                    get_pointee_signature: get_pointee_signature.into(),
                    get_pointee: get_pointee as u32,
                    constructor_signature: constructor_signature.into(),
                    constructor: constructor as u32,
                    share_signature: share_signature.into(),
                    share: share as u32,
                    destructor_signature: destructor_signature.into(),
                    destructor: destructor as u32,
                },
            )
        });
    Ok(())
}

fn link_emval<Data>(linker: &mut Linker<Data>, module: &str) -> anyhow::Result<()>
where
    Data: EngineStore + 'static,
{
    link!(linker, module, "_emval_incref", |engine, _instance, handle: i32| {
        engine.emval_incref(handle)
    });
    link!(linker, module, "_emval_decref", |engine, _instance, handle: i32| {
        engine.emval_release(handle)
    });
    link!(linker, module, "_emval_take_value",
        |engine, instance, raw_type: i32, pointer: i32| {
            engine.emval_take_value(instance, raw_type, pointer.into())
        });
    link!(linker, module, "_emval_register_symbol", |engine, instance, address: i32| {
        engine.emval_register_symbol(instance, address.into())
    });
    link!(linker, module, "_emval_get_global", |engine, instance, name: i32| {
        engine.emval_get_global(instance, name.into())
    });
    link!(linker, module, "_emval_as",
        |engine, instance, handle: i32, raw_type: i32, destructors_ref: i32| {
            engine.emval_as(instance, handle, raw_type, destructors_ref.into())
        });
    link!(linker, module, "_emval_as_int64",
        |engine, instance, handle: i32, raw_type: i32| {
            engine.emval_as_int64(instance, handle, raw_type)
        });
    link!(linker, module, "_emval_as_uint64",
        |engine, instance, handle: i32, raw_type: i32| {
            engine.emval_as_uint64(instance, handle, raw_type)
        });
    link!(linker, module, "_emval_run_destructors", |engine, instance, handle: i32| {
        engine.emval_run_destructors(instance, handle)
    });
    link!(linker, module, "_emval_new_cstring", |engine, instance, pointer: i32| {
        engine.emval_new_cstring(instance, pointer.into())
    });
    link!(linker, module, "_emval_new_array", |engine, _instance| {
        Ok(engine.emval_new_array())
    });
    link!(linker, module, "_emval_new_object", |engine, _instance| {
        Ok(engine.emval_new_object())
    });
    link!(linker, module, "_emval_get_property",
        |engine, instance, handle: i32, key: i32| {
            engine.emval_get_property(instance, handle, key)
        });
    link!(linker, module, "_emval_set_property",
        |engine, instance, handle: i32, key: i32, value: i32| {
            engine.emval_set_property(instance, handle, key, value)
        });
    link!(linker, module, "_emval_in", |engine, instance, key: i32, object: i32| {
        engine.emval_in(instance, key, object).map(i32::from)
    });
    link!(linker, module, "_emval_delete", |engine, _instance, object: i32, key: i32| {
        engine.emval_delete(object, key).map(i32::from)
    });
    link!(linker, module, "_emval_equals", |engine, _instance, left: i32, right: i32| {
        engine.emval_equals(left, right).map(i32::from)
    });
    link!(linker, module, "_emval_strictly_equals",
        |engine, _instance, left: i32, right: i32| {
            engine.emval_strictly_equals(left, right).map(i32::from)
        });
    link!(linker, module, "_emval_typeof", |engine, _instance, handle: i32| {
        engine.emval_typeof(handle)
    });
    link!(linker, module, "_emval_not", |engine, _instance, handle: i32| {
        engine.emval_not(handle).map(i32::from)
    });
    link!(linker, module, "_emval_is_number", |engine, _instance, handle: i32| {
        engine.emval_is_number(handle).map(i32::from)
    });
    link!(linker, module, "_emval_is_string", |engine, _instance, handle: i32| {
        engine.emval_is_string(handle).map(i32::from)
    });
    link!(linker, module, "_emval_get_method_caller",
        |engine, instance, arg_count: i32, arg_types: i32, kind: i32| {
            engine.emval_get_method_caller(instance, arg_count as u32, arg_types.into(), kind)
        });
    link!(linker, module, "_emval_call_method",
        |engine, instance, method_caller: i32, handle: i32, name: i32, destructors_ref: i32,
            arguments: i32| {
            engine.emval_call_method(
                instance,
                method_caller,
                handle,
                name.into(),
                destructors_ref.into(),
                arguments.into(),
            )
        });
    link!(linker, module, "_emval_call_void_method",
        |engine, instance, method_caller: i32, handle: i32, name: i32, arguments: i32| {
            engine.emval_call_void_method(
                instance,
                method_caller,
                handle,
                name.into(),
                arguments.into(),
            )
        });
    link!(linker, module, "_emval_call",
        |engine, instance, method_caller: i32, handle: i32, destructors_ref: i32,
            arguments: i32| {
            engine.emval_call(
                instance,
                method_caller,
                handle,
                destructors_ref.into(),
                arguments.into(),
            )
        });
    link!(linker, module, "_emval_new",
        |engine, instance, handle: i32, arg_count: i32, arg_types: i32, arguments: i32| {
            engine.emval_new(instance, handle, arg_count as u32, arg_types.into(), arguments.into())
        });
    Ok(())
}
