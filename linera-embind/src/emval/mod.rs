// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Support for `emscripten::val`, which gives the guest access to host values through integer
//! handles.

mod host;
mod table;

pub use self::{
    host::{HostCallback, HostFunction, HostMethod, HostObject},
    table::RESERVED_HANDLES,
};
pub(crate) use self::{
    host::{capitalize, resolve_method},
    table::EmvalTable,
};
use crate::{
    types::{Destructor, RegisteredType},
    EmbindError, Value,
};
use std::{
    any::Any,
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

/// The emval state of an engine.
#[derive(Default)]
pub(crate) struct EmvalState {
    pub(crate) table: EmvalTable,
    pub(crate) globals: BTreeMap<String, Value>,
    pub(crate) symbols: HashMap<u32, String>,
    pub(crate) callers: Vec<Rc<MethodCaller>>,
    pub(crate) caller_ids: HashMap<(MethodCallerKind, String), i32>,
}

/// What a method caller does with the value it is invoked on, when no method name is given.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum MethodCallerKind {
    /// Calls the value as a function.
    Function,
    /// Uses the value as a constructor.
    Constructor,
}

impl TryFrom<i32> for MethodCallerKind {
    type Error = EmbindError;

    fn try_from(kind: i32) -> Result<Self, Self::Error> {
        match kind {
            0 => Ok(MethodCallerKind::Function),
            1 => Ok(MethodCallerKind::Constructor),
            other => Err(EmbindError::Unsupported(format!("method caller kind {other}"))),
        }
    }
}

/// The types of a method call signature requested by the guest.
pub(crate) struct MethodCaller {
    pub(crate) signature: String,
    pub(crate) kind: MethodCallerKind,
    pub(crate) return_type: Rc<dyn RegisteredType>,
    pub(crate) argument_types: Vec<Rc<dyn RegisteredType>>,
}

impl MethodCaller {
    /// The name identifying a signature, such as `int_$float_double$`.
    pub(crate) fn signature_name(
        return_type: &dyn RegisteredType,
        argument_types: &[Rc<dyn RegisteredType>],
    ) -> String {
        let arguments = argument_types
            .iter()
            .map(|argument| argument.name())
            .collect::<Vec<_>>()
            .join("_");
        format!("{}_${arguments}$", return_type.name())
    }

    pub(crate) fn argument_type_names(&self) -> Vec<String> {
        self.argument_types
            .iter()
            .map(|argument| argument.name().to_owned())
            .collect()
    }
}

/// Destructors produced while converting a value for the guest, kept alive behind an emval
/// handle until the guest runs them.
#[derive(Default)]
pub(crate) struct DestructorList {
    pub(crate) destructors: RefCell<Vec<Destructor>>,
}

impl HostObject for DestructorList {
    fn type_name(&self) -> &str {
        "destructors"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
