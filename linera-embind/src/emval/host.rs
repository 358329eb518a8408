// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host objects reachable from the guest through emval handles.

use crate::{runtime::Instance, Engine, EmbindError, Value};
use std::{any::Any, fmt, rc::Rc};

/// A method a [`HostObject`] exposes to the guest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostMethod {
    /// The method name.
    pub name: String,
    /// Whether the guest is allowed to call the method.
    pub exported: bool,
}

impl HostMethod {
    /// An exported method.
    pub fn exported(name: impl Into<String>) -> Self {
        HostMethod {
            name: name.into(),
            exported: true,
        }
    }

    /// A method the guest can see but not call.
    pub fn hidden(name: impl Into<String>) -> Self {
        HostMethod {
            name: name.into(),
            exported: false,
        }
    }
}

/// An object implemented by the host, which the guest manipulates through `emscripten::val`.
///
/// All operations are optional. The defaults report that the object does not support them.
pub trait HostObject {
    /// The name of the object's type, used in error messages.
    fn type_name(&self) -> &str;

    /// Allows downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// The methods the object exposes.
    fn methods(&self) -> Vec<HostMethod> {
        Vec::new()
    }

    /// Maps a method name requested by the guest to one of [`HostObject::methods`], for names
    /// that match neither exactly nor after capitalization.
    fn map_method(
        &self,
        _name: &str,
        _return_type: &str,
        _argument_types: &[String],
    ) -> Result<Option<String>, EmbindError> {
        Ok(None)
    }

    /// Calls one of the exposed methods.
    fn call_method(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        name: &str,
        _arguments: Vec<Value>,
    ) -> Result<Value, EmbindError> {
        Err(EmbindError::HostMethodNotFound {
            type_name: self.type_name().to_owned(),
            method: name.to_owned(),
            capitalized: capitalize(name),
        })
    }

    /// Whether the object can be called as a function.
    fn is_callable(&self) -> bool {
        false
    }

    /// Calls the object as a function.
    fn call(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _arguments: Vec<Value>,
    ) -> Result<Value, EmbindError> {
        Err(EmbindError::NotCallable(self.type_name().to_owned()))
    }

    /// Uses the object as a constructor.
    fn construct(
        &self,
        _engine: &Engine,
        _instance: &mut dyn Instance,
        _argument_types: &[String],
        _arguments: Vec<Value>,
    ) -> Result<Value, EmbindError> {
        Err(EmbindError::NotConstructible(self.type_name().to_owned()))
    }

    /// Reads a property.
    fn get_property(&self, name: &str) -> Result<Value, EmbindError> {
        Err(EmbindError::UnknownProperty {
            owner: self.type_name().to_owned(),
            property: name.to_owned(),
        })
    }

    /// Writes a property.
    fn set_property(&self, name: &str, _value: Value) -> Result<(), EmbindError> {
        Err(EmbindError::UnknownProperty {
            owner: self.type_name().to_owned(),
            property: name.to_owned(),
        })
    }
}

impl fmt::Debug for dyn HostObject {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "HostObject({})", self.type_name())
    }
}

/// The signature of host closures exposed as callable objects.
pub type HostCallback = dyn Fn(&Engine, &mut dyn Instance, Vec<Value>) -> Result<Value, EmbindError>;

/// A host closure the guest can call through an emval handle.
pub struct HostFunction {
    name: String,
    callback: Rc<HostCallback>,
}

impl HostFunction {
    /// Wraps `callback` into a callable host object named `name`.
    pub fn new(
        name: impl Into<String>,
        callback: impl Fn(&Engine, &mut dyn Instance, Vec<Value>) -> Result<Value, EmbindError>
            + 'static,
    ) -> Rc<dyn HostObject> {
        Rc::new(HostFunction {
            name: name.into(),
            callback: Rc::new(callback),
        })
    }
}

impl HostObject for HostFunction {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        arguments: Vec<Value>,
    ) -> Result<Value, EmbindError> {
        (self.callback)(engine, instance, arguments)
    }
}

/// Upper-cases the first character of a method name.
pub(crate) fn capitalize(name: &str) -> String {
    let mut characters = name.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

/// Finds the exported host method the guest means by `name`.
///
/// The exact name is tried first, then the capitalized name, then the object's own mapping.
pub(crate) fn resolve_method(
    object: &dyn HostObject,
    name: &str,
    return_type: &str,
    argument_types: &[String],
) -> Result<String, EmbindError> {
    let methods = object.methods();
    let find = |candidate: &str| methods.iter().find(|method| method.name == candidate).cloned();
    let capitalized = capitalize(name);
    let not_found = || EmbindError::HostMethodNotFound {
        type_name: object.type_name().to_owned(),
        method: name.to_owned(),
        capitalized: capitalized.clone(),
    };
    let method = match find(name).or_else(|| find(&capitalized)) {
        Some(method) => method,
        None => {
            let mapped = object
                .map_method(name, return_type, argument_types)?
                .ok_or_else(not_found)?;
            find(&mapped).ok_or_else(not_found)?
        }
    };
    if !method.exported {
        return Err(EmbindError::HostMethodNotExported {
            type_name: object.type_name().to_owned(),
            method: method.name,
        });
    }
    Ok(method.name)
}
