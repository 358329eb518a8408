// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Errors reported by the binding engine.

use crate::runtime::RuntimeError;
use itertools::Itertools;
use thiserror::Error;

/// Errors that can occur while registering or using bindings.
#[derive(Debug, Error)]
pub enum EmbindError {
    /// A type id that can't identify a type.
    #[error("type {_0} must have a positive integer typeid pointer")]
    InvalidTypeId(String),

    /// A type id was registered more than once.
    #[error("cannot register type '{_0}' twice")]
    DuplicateType(String),

    /// A public symbol was registered twice with the same number of arguments.
    #[error("cannot register public name '{_0}' twice")]
    DuplicatePublicSymbol(String),

    /// A class received two constructors taking the same number of arguments.
    #[error(
        "cannot register multiple constructors with identical number of parameters ({arity}) \
        for class '{class}'! Overload resolution is currently only performed using the \
        parameter count, not actual type info!"
    )]
    DuplicateConstructor {
        /// The class name.
        class: String,
        /// The number of parameters.
        arity: u32,
    },

    /// Something was used while some of the types it depends on are not registered yet.
    #[error("{message}: {}", .types.join(", "))]
    UnboundTypes {
        /// What could not be done.
        message: String,
        /// The names of the missing types.
        types: Vec<String>,
    },

    /// A type required right away has not been registered.
    #[error("{context} has unknown type {type_name}")]
    UnknownType {
        /// What required the type.
        context: String,
        /// The name of the type, as reported by the guest.
        type_name: String,
    },

    /// A host value does not have the kind required by a wire type.
    #[error("value must be of type {expected}, is {actual}")]
    TypeMismatch {
        /// The host kind the wire type accepts.
        expected: &'static str,
        /// The host kind received.
        actual: &'static str,
    },

    /// A tuple has the wrong number of elements.
    #[error("incorrect number of tuple elements for {name}: expected={expected}, actual={actual}")]
    TupleLength {
        /// The tuple type name.
        name: String,
        /// The number of elements registered for the tuple.
        expected: usize,
        /// The number of elements received.
        actual: usize,
    },

    /// A struct value lacks one of the registered fields.
    #[error("missing field: \"{_0}\"")]
    MissingField(String),

    /// A value has no counterpart in an enum.
    #[error("could not map enum value {value} of {enum_name}")]
    UnknownEnumValue {
        /// The enum type name.
        enum_name: String,
        /// The value that could not be mapped.
        value: String,
    },

    /// A conversion that the wire type does not support.
    #[error("{_0} is not supported")]
    Unsupported(String),

    /// A null value passed where a reference is required.
    #[error("null is not a valid {_0}")]
    NullReference(String),

    /// A host value that is not a class instance passed where one is required.
    #[error("cannot pass {actual} as a {expected}")]
    NotAnInstance {
        /// The pointer type name.
        expected: String,
        /// The host kind received.
        actual: &'static str,
    },

    /// A class instance passed where an incompatible pointer type is required.
    #[error("cannot convert argument of type {actual} to parameter type {expected}")]
    IncompatiblePointer {
        /// The parameter type name.
        expected: String,
        /// The argument type name.
        actual: String,
    },

    /// A raw pointer passed where a smart pointer is required.
    #[error("passing raw pointer to smart pointer is illegal")]
    RawPointerAsSmartPointer,

    /// An instance could not be converted to a base class.
    #[error("expected null or instance of {expected}, got an instance of {actual}")]
    InvalidUpcast {
        /// The target class name.
        expected: String,
        /// The instance's class name.
        actual: String,
    },

    /// A method or property was used on a value that is not a compatible instance.
    #[error("{name} incompatible with \"this\" of type {actual}")]
    IncompatibleThis {
        /// The human readable member name.
        name: String,
        /// The kind or class of the value received.
        actual: String,
    },

    /// Attempt to delete or clone a handle that was already deleted.
    #[error("class handle already deleted")]
    AlreadyDeleted,

    /// Attempt to delete or schedule a handle that is already scheduled for deletion.
    #[error("object already scheduled for deletion")]
    AlreadyScheduledForDeletion,

    /// A deleted instance was passed to a method, a property or a pointer parameter.
    #[error("cannot pass deleted object as {_0}")]
    DeletedObject(String),

    /// A function was called with the wrong number of arguments.
    #[error("function {name} called with {actual} argument(s), expected {expected} arg(s)")]
    ArgumentCount {
        /// The function name.
        name: String,
        /// The number of arguments received.
        actual: usize,
        /// The number of arguments expected.
        expected: usize,
    },

    /// An overloaded function was called with an argument count that has no overload.
    #[error(
        "function '{name}' called with an invalid number of arguments ({actual}) - expects one \
        of ({})",
        .expected.iter().join(", ")
    )]
    NoMatchingOverload {
        /// The function name.
        name: String,
        /// The number of arguments received.
        actual: usize,
        /// The argument counts of the registered overloads, in ascending order.
        expected: Vec<u32>,
    },

    /// A class has no constructors.
    #[error("{_0} has no accessible constructor")]
    NoConstructor(String),

    /// A class was constructed with an argument count that has no constructor.
    #[error(
        "tried to invoke ctor of {class} with invalid number of parameters ({actual}) - \
        expected ({}) parameters instead",
        .expected.iter().join(" or ")
    )]
    ConstructorArity {
        /// The class name.
        class: String,
        /// The number of arguments received.
        actual: usize,
        /// The argument counts of the registered constructors, in ascending order.
        expected: Vec<u32>,
    },

    /// Attempt to write a property that has no setter.
    #[error("{_0} is a read-only property")]
    ReadOnlyProperty(String),

    /// No public symbol with the requested name.
    #[error("could not find public symbol {_0}")]
    UnknownSymbol(String),

    /// No class with the requested name.
    #[error("could not find class {_0}")]
    UnknownClass(String),

    /// No method with the requested name.
    #[error("could not find method {method} on class {class}")]
    UnknownMethod {
        /// The class name.
        class: String,
        /// The method name.
        method: String,
    },

    /// No property with the requested name.
    #[error("could not find property {property} on {owner}")]
    UnknownProperty {
        /// The class or host type name.
        owner: String,
        /// The property name.
        property: String,
    },

    /// A registration step referenced a value array or value object that was never opened.
    #[error("no open {kind} registration for type id {raw_type}")]
    UnknownRegistration {
        /// Whether it was a value array or a value object.
        kind: &'static str,
        /// The type id.
        raw_type: i32,
    },

    /// A registered type was used as something it is not.
    #[error("{type_name} is not {expected}")]
    UnexpectedTypeKind {
        /// The type name.
        type_name: String,
        /// What the type was expected to be.
        expected: &'static str,
    },

    /// An emval handle that does not refer to a live value.
    #[error("invalid id: {_0}")]
    InvalidHandle(i32),

    /// An emval method caller id that was never handed out.
    #[error("could not call method with ID {_0}")]
    UnknownMethodCaller(i32),

    /// No host method matches the requested name.
    #[error(
        "type {type_name} does not have method name {method} or {capitalized} and it was also \
        not mapped by the host object"
    )]
    HostMethodNotFound {
        /// The host type name.
        type_name: String,
        /// The requested method name.
        method: String,
        /// The capitalized method name.
        capitalized: String,
    },

    /// The matched host method can't be called from the guest.
    #[error("the method name {method} on type {type_name} is not exported")]
    HostMethodNotExported {
        /// The host type name.
        type_name: String,
        /// The matched method name.
        method: String,
    },

    /// The value can't be called as a function.
    #[error("{_0} is not callable")]
    NotCallable(String),

    /// The value can't be used to construct new values.
    #[error("{_0} can not be instantiated")]
    NotConstructible(String),

    /// A property key with an unsupported kind.
    #[error("cannot use {key} as a property key of {owner}")]
    InvalidPropertyKey {
        /// The kind of value being accessed.
        owner: &'static str,
        /// The kind of the key.
        key: &'static str,
    },

    /// An array index past the end of the array.
    #[error("invalid index {index} requested on an array of length {length}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The array length.
        length: usize,
    },

    /// The host and the guest registered conflicting definitions.
    #[error("{_0}")]
    RegistrationMismatch(String),

    /// The guest memory does not contain what the wire protocol requires.
    #[error("malformed guest data: {_0}")]
    Decode(String),

    /// A host object reported a failure.
    #[error("{_0}")]
    Host(String),

    /// Failure while accessing the guest instance.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
