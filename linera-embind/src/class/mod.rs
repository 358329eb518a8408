// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Guest classes and the handles to their instances.

mod binding;
mod handle;
mod pointer;

pub use self::{
    binding::{ClassBinding, ClassInstance},
    handle::ClassHandle,
};
pub(crate) use self::{
    handle::{HandleState, HandleTable, SmartHandle},
    pointer::{call_for_pointer, PointerType, SharingPolicy, SmartPointer},
};
use crate::{
    runtime::{GuestFunction, GuestPointer, Instance, WireValue},
    symbol::{Callable, SymbolSlot, SymbolTable},
    types::{RawTypeId, RegisteredType},
    Engine, EmbindError, Value,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    rc::Rc,
};

/// Index of a class in the engine's class table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct ClassId(usize);

/// The guest functions describing a class.
#[derive(Clone, Default)]
pub(crate) struct ClassHooks {
    pub(crate) get_actual_type: Option<GuestFunction>,
    pub(crate) upcast: Option<GuestFunction>,
    pub(crate) downcast: Option<GuestFunction>,
    pub(crate) destructor: Option<GuestFunction>,
}

/// A getter or setter of a property.
#[derive(Clone)]
pub(crate) struct Accessor {
    pub(crate) function: GuestFunction,
    pub(crate) context: WireValue,
    pub(crate) field_type: Rc<dyn RegisteredType>,
}

/// A property of a class or of its instances.
#[derive(Clone)]
pub(crate) enum Property {
    /// A property whose types are not registered yet.
    Unbound {
        message: String,
        types: Vec<RawTypeId>,
        read_only: bool,
    },
    Bound {
        getter: Accessor,
        setter: Option<Accessor>,
    },
}

/// Everything known about a class.
///
/// Descriptors are created either when the guest registers the class or when the host binds
/// a type to its name, whichever comes first.
#[derive(Default)]
pub(crate) struct ClassDescriptor {
    pub(crate) name: String,
    pub(crate) legal_name: String,
    pub(crate) raw_type: Option<RawTypeId>,
    pub(crate) base: Option<ClassId>,
    pub(crate) derived: Vec<ClassId>,
    pub(crate) hooks: ClassHooks,
    pub(crate) constructors: BTreeMap<u32, Callable>,
    pub(crate) methods: SymbolTable,
    pub(crate) static_methods: SymbolTable,
    pub(crate) properties: BTreeMap<String, Property>,
    pub(crate) static_properties: BTreeMap<String, Property>,
    pub(crate) pure_virtual: BTreeSet<String>,
    pub(crate) binding: Option<Rc<dyn ClassBinding>>,
}

/// The converters registered for a class, indexed by the class's type id.
#[derive(Clone)]
pub(crate) struct RegisteredPointers {
    pub(crate) pointer: PointerType,
    pub(crate) const_pointer: PointerType,
}

#[derive(Default)]
pub(crate) struct ClassTable {
    classes: Vec<ClassDescriptor>,
    by_name: HashMap<String, ClassId>,
}

impl ClassTable {
    pub(crate) fn get(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: ClassId) -> &mut ClassDescriptor {
        &mut self.classes[id.0]
    }

    pub(crate) fn find(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Finds or creates the descriptor of the class called `name`.
    pub(crate) fn entry(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let id = ClassId(self.classes.len());
        self.classes.push(ClassDescriptor {
            name: name.to_owned(),
            legal_name: legal_name(name),
            ..ClassDescriptor::default()
        });
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Finds a class by name, failing if it is unknown.
    pub(crate) fn require(&self, name: &str) -> Result<ClassId, EmbindError> {
        self.find(name)
            .ok_or_else(|| EmbindError::UnknownClass(name.to_owned()))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.iter()
    }

    /// The class itself followed by its base classes, most derived first.
    pub(crate) fn ancestry(&self, id: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        std::iter::successors(Some(id), |current| self.get(*current).base)
    }

    pub(crate) fn is_subclass(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.ancestry(id).any(|current| current == ancestor)
    }

    /// Finds an instance method, looking through base classes.
    pub(crate) fn find_method(&self, id: ClassId, name: &str) -> Option<&SymbolSlot> {
        self.ancestry(id)
            .find_map(|current| self.get(current).methods.get(name))
    }

    /// Finds an instance property, looking through base classes.
    pub(crate) fn find_property(&self, id: ClassId, name: &str) -> Option<(ClassId, &Property)> {
        self.ancestry(id).find_map(|current| {
            self.get(current)
                .properties
                .get(name)
                .map(|property| (current, property))
        })
    }
}

/// Turns a class name into an identifier, replacing every character other than ASCII letters,
/// digits and `_` by `_`, and prefixing names starting with a digit with `_`.
pub(crate) fn legal_name(name: &str) -> String {
    if name.is_empty() {
        return "_unknown".to_owned();
    }
    let legal = name
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || character == '_' {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();
    if legal.starts_with(|character: char| character.is_ascii_digit()) {
        format!("_{legal}")
    } else {
        legal
    }
}

impl Engine {
    /// Adjusts `pointer` from an object of class `from` to its `to` base class.
    pub(crate) fn upcast_pointer(
        &self,
        instance: &mut dyn Instance,
        mut pointer: GuestPointer,
        mut from: ClassId,
        to: ClassId,
    ) -> Result<GuestPointer, EmbindError> {
        while from != to {
            let (upcast, base) = {
                let state = self.state();
                let class = state.classes.get(from);
                match (class.hooks.upcast.clone(), class.base) {
                    (Some(upcast), Some(base)) => (upcast, base),
                    _ => {
                        return Err(EmbindError::InvalidUpcast {
                            expected: state.classes.get(to).name.clone(),
                            actual: class.name.clone(),
                        })
                    }
                }
            };
            pointer = call_for_pointer(instance, &upcast, &[pointer.into()])?;
            from = base;
        }
        Ok(pointer)
    }

    /// Adjusts `pointer` from an object of class `from` to its derived class `to`, or returns
    /// [`None`] if `to` doesn't derive from `from`.
    pub(crate) fn downcast_pointer(
        &self,
        instance: &mut dyn Instance,
        pointer: GuestPointer,
        from: ClassId,
        to: ClassId,
    ) -> Result<Option<GuestPointer>, EmbindError> {
        if from == to {
            return Ok(Some(pointer));
        }
        let (base, downcast) = {
            let state = self.state();
            let class = state.classes.get(to);
            (class.base, class.hooks.downcast.clone())
        };
        let Some(base) = base else {
            return Ok(None);
        };
        let Some(pointer) = self.downcast_pointer(instance, pointer, from, base)? else {
            return Ok(None);
        };
        match downcast {
            Some(downcast) => Ok(Some(call_for_pointer(instance, &downcast, &[pointer.into()])?)),
            None => Ok(None),
        }
    }

    /// Wraps a handle into a value, using the host binding of its class if there is one.
    pub(crate) fn class_value(&self, handle: ClassHandle) -> Result<Value, EmbindError> {
        let binding = {
            let state = self.state();
            let class = state.handles.get(handle)?.pointer_type.class();
            state.classes.get(class).binding.clone()
        };
        Ok(match binding {
            Some(binding) => Value::Instance(binding.materialize(handle)),
            None => Value::Class(handle),
        })
    }

    /// Returns the object pointer of `this` as an instance of `class`, for property accessors.
    pub(crate) fn validate_this(
        &self,
        instance: &mut dyn Instance,
        this: &Value,
        class: ClassId,
        human_name: &str,
    ) -> Result<GuestPointer, EmbindError> {
        let handle = this.class_handle().ok_or_else(|| EmbindError::IncompatibleThis {
            name: human_name.to_owned(),
            actual: this.kind().to_owned(),
        })?;
        let (pointer, from) = {
            let state = self.state();
            let handle_state = state
                .handles
                .get(handle)
                .map_err(|_| EmbindError::DeletedObject(format!("\"this\" of {human_name}")))?;
            let from = handle_state.pointer_type.class();
            if !state.classes.is_subclass(from, class) {
                return Err(EmbindError::IncompatibleThis {
                    name: human_name.to_owned(),
                    actual: state.classes.get(from).name.clone(),
                });
            }
            (handle_state.pointer, from)
        };
        self.upcast_pointer(instance, pointer, from, class)
    }
}
