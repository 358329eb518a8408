// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only views of the registry, for tooling that generates host wrappers.

use super::Engine;
use crate::{
    class::{ClassDescriptor, Property},
    symbol::{Callable, Overload, SymbolTable},
    Value,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// A public symbol or class method.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SymbolInfo {
    /// The symbol name.
    pub name: String,
    /// The overloads, ordered by number of arguments.
    pub overloads: Vec<OverloadInfo>,
}

/// One overload of a symbol.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OverloadInfo {
    /// The number of arguments, or [`None`] for class symbols.
    pub arg_count: Option<u32>,
    /// The name of the result type.
    pub result_type: String,
    /// The names of the parameter types.
    pub argument_types: Vec<String>,
    /// Whether every type used by the overload is registered.
    pub is_bound: bool,
}

/// A property of a class or of its instances.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PropertyInfo {
    /// The property name.
    pub name: String,
    /// The name of the property type, once it is registered.
    pub type_name: Option<String>,
    /// Whether the property has no setter.
    pub read_only: bool,
}

/// A class known to the engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ClassInfo {
    /// The class name.
    pub name: String,
    /// The name the class is exposed under.
    pub legal_name: String,
    /// Whether the guest registered the class.
    pub is_registered: bool,
    /// Whether the host attached a binding to the class.
    pub has_binding: bool,
    /// The name of the base class.
    pub base: Option<String>,
    /// The constructors, ordered by number of arguments.
    pub constructors: Vec<OverloadInfo>,
    /// The instance methods declared by the class itself.
    pub methods: Vec<SymbolInfo>,
    /// The static methods.
    pub static_methods: Vec<SymbolInfo>,
    /// The instance properties declared by the class itself.
    pub properties: Vec<PropertyInfo>,
    /// The static properties.
    pub static_properties: Vec<PropertyInfo>,
    /// The pure virtual methods.
    pub pure_virtual_methods: Vec<String>,
}

/// An enum known to the engine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EnumInfo {
    /// The enum name.
    pub name: String,
    /// Whether the guest registered the enum type.
    pub is_registered: bool,
    /// The values registered by the guest.
    pub values: BTreeMap<String, i64>,
    /// The values declared by the host.
    pub host_values: Option<BTreeMap<String, i64>>,
}

fn overload_info(overload: &Overload) -> OverloadInfo {
    let type_names = match &overload.callable {
        Callable::Invoker(invoker) => Some((
            invoker.result_type().name().to_owned(),
            invoker
                .parameter_types()
                .iter()
                .map(|parameter| parameter.name().to_owned())
                .collect(),
        )),
        Callable::Construct(_) => Some((overload.result_type.name().to_owned(), Vec::new())),
        Callable::Unbound { .. } => None,
    };
    let is_bound = type_names.is_some();
    let (result_type, argument_types) = type_names.unwrap_or_else(|| {
        (
            overload.result_type.name().to_owned(),
            overload
                .argument_types
                .iter()
                .map(|argument| argument.name().to_owned())
                .collect(),
        )
    });
    OverloadInfo {
        arg_count: overload.arg_count,
        result_type,
        argument_types,
        is_bound,
    }
}

fn symbol_infos(table: &SymbolTable) -> Vec<SymbolInfo> {
    table
        .iter()
        .map(|(name, slot)| SymbolInfo {
            name: name.clone(),
            overloads: slot.overloads().into_iter().map(overload_info).collect(),
        })
        .collect()
}

fn property_infos(properties: &BTreeMap<String, Property>) -> Vec<PropertyInfo> {
    properties
        .iter()
        .map(|(name, property)| match property {
            Property::Unbound { read_only, .. } => PropertyInfo {
                name: name.clone(),
                type_name: None,
                read_only: *read_only,
            },
            Property::Bound { getter, setter } => PropertyInfo {
                name: name.clone(),
                type_name: Some(getter.field_type.name().to_owned()),
                read_only: setter.is_none(),
            },
        })
        .collect()
}

impl Engine {
    /// The public symbols: free functions and classes.
    pub fn symbols(&self) -> Vec<SymbolInfo> {
        symbol_infos(&self.state().symbols)
    }

    /// The classes registered by the guest or bound by the host.
    pub fn classes(&self) -> Vec<ClassInfo> {
        let state = self.state();
        state
            .classes
            .iter()
            .map(|class| self.class_info(class))
            .collect()
    }

    fn class_info(&self, class: &ClassDescriptor) -> ClassInfo {
        let state = self.state();
        ClassInfo {
            name: class.name.clone(),
            legal_name: class.legal_name.clone(),
            is_registered: class.raw_type.is_some(),
            has_binding: class.binding.is_some(),
            base: class.base.map(|base| state.classes.get(base).name.clone()),
            constructors: class
                .constructors
                .iter()
                .map(|(arity, callable)| match callable {
                    Callable::Invoker(invoker) => OverloadInfo {
                        arg_count: Some(*arity),
                        result_type: invoker.result_type().name().to_owned(),
                        argument_types: invoker
                            .parameter_types()
                            .iter()
                            .map(|parameter| parameter.name().to_owned())
                            .collect(),
                        is_bound: true,
                    },
                    _ => OverloadInfo {
                        arg_count: Some(*arity),
                        result_type: class.name.clone(),
                        argument_types: Vec::new(),
                        is_bound: false,
                    },
                })
                .collect(),
            methods: symbol_infos(&class.methods),
            static_methods: symbol_infos(&class.static_methods),
            properties: property_infos(&class.properties),
            static_properties: property_infos(&class.static_properties),
            pure_virtual_methods: class.pure_virtual.iter().cloned().collect(),
        }
    }

    /// The enums registered by the guest or declared by the host.
    pub fn enums(&self) -> Vec<EnumInfo> {
        self.state()
            .enums
            .iter()
            .map(|(name, descriptor)| EnumInfo {
                name: name.clone(),
                is_registered: descriptor.raw_type.is_some(),
                values: descriptor.guest_values.clone(),
                host_values: descriptor.host_values.clone(),
            })
            .collect()
    }

    /// The values of the constants registered by the guest or declared by the host.
    pub fn constants(&self) -> BTreeMap<String, Value> {
        self.state()
            .constants
            .iter()
            .filter_map(|(name, constant)| Some((name.clone(), constant.value()?.clone())))
            .collect()
    }

    /// The value of the constant named `name`.
    pub fn constant(&self, name: &str) -> Option<Value> {
        self.state()
            .constants
            .get(name)
            .and_then(|constant| constant.value().cloned())
    }
}
