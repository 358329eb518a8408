// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The registry of guest types and the resolution of registrations waiting for their
//! dependencies.

use crate::{
    runtime::{GuestPointer, Instance, WireValue},
    types::{RawTypeId, RegisteredType},
    Engine, EmbindError,
};
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};
use tracing::{debug, warn};

/// Builds the types produced by a registration from the types it depends on.
pub(crate) type Continuation = Box<
    dyn FnOnce(
        &Engine,
        &mut dyn Instance,
        Vec<Rc<dyn RegisteredType>>,
    ) -> Result<Vec<Rc<dyn RegisteredType>>, EmbindError>,
>;

/// A registration waiting for some of its dependencies.
struct PendingResolution {
    produced: Vec<RawTypeId>,
    resolved: Vec<Option<Rc<dyn RegisteredType>>>,
    remaining: usize,
    continuation: Option<Continuation>,
}

type Waiter = (Rc<RefCell<PendingResolution>>, usize);

#[derive(Default)]
pub(crate) struct TypeRegistry {
    registered: HashMap<RawTypeId, Rc<dyn RegisteredType>>,
    dependencies: HashMap<RawTypeId, Vec<RawTypeId>>,
    awaiting: HashMap<RawTypeId, Vec<Waiter>>,
}

impl TypeRegistry {
    pub(crate) fn get(&self, raw_type: RawTypeId) -> Option<Rc<dyn RegisteredType>> {
        self.registered.get(&raw_type).cloned()
    }

    pub(crate) fn contains(&self, raw_type: RawTypeId) -> bool {
        self.registered.contains_key(&raw_type)
    }

    pub(crate) fn len(&self) -> usize {
        self.registered.len()
    }

    /// The types that are waited on but not registered yet.
    pub(crate) fn awaited(&self) -> Vec<RawTypeId> {
        let mut awaited = self.awaiting.keys().copied().collect::<Vec<_>>();
        awaited.sort();
        awaited
    }

    /// Collects the unregistered types `types` ultimately depend on, following the dependencies
    /// of pending registrations.
    fn unbound_types(&self, types: &[RawTypeId]) -> Vec<RawTypeId> {
        let mut unbound = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = types.iter().rev().copied().collect::<Vec<_>>();
        while let Some(raw_type) = stack.pop() {
            if !seen.insert(raw_type) || self.registered.contains_key(&raw_type) {
                continue;
            }
            match self.dependencies.get(&raw_type) {
                Some(dependencies) => stack.extend(dependencies.iter().rev().copied()),
                None => unbound.push(raw_type),
            }
        }
        unbound
    }
}

/// Options for [`Engine::register_type`].
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RegisterOptions {
    /// Silently keep the first registration of a type registered twice.
    pub(crate) ignore_duplicates: bool,
}

impl Engine {
    /// Registers a type, then resumes the registrations that were waiting for it.
    pub(crate) fn register_type(
        &self,
        instance: &mut dyn Instance,
        registered: Rc<dyn RegisteredType>,
        options: RegisterOptions,
    ) -> Result<(), EmbindError> {
        let raw_type = registered.raw_type();
        let waiters = {
            let mut state = self.state_mut();
            let registry = &mut state.registry;
            if raw_type.0 <= 0 {
                return Err(EmbindError::InvalidTypeId(registered.name().to_owned()));
            }
            if registry.registered.contains_key(&raw_type) {
                if options.ignore_duplicates {
                    return Ok(());
                }
                return Err(EmbindError::DuplicateType(registered.name().to_owned()));
            }
            debug!(%raw_type, name = registered.name(), "Registered type");
            registry.registered.insert(raw_type, registered.clone());
            registry.dependencies.remove(&raw_type);
            registry.awaiting.remove(&raw_type).unwrap_or_default()
        };

        // Every waiter runs, and the first failure is reported once they all have.
        let mut outcome = Ok(());
        for (pending, index) in waiters {
            let ready = {
                let mut pending = pending.borrow_mut();
                pending.resolved[index] = Some(registered.clone());
                pending.remaining -= 1;
                pending.remaining == 0
            };
            if ready {
                let resolution = self.complete_resolution(instance, &pending);
                if outcome.is_ok() {
                    outcome = resolution;
                }
            }
        }
        outcome
    }

    /// Runs `continuation` once every type in `needed` is registered, and registers the types
    /// it returns under the ids in `produced`.
    ///
    /// Runs immediately if nothing is missing.
    pub(crate) fn when_dependent_types_are_resolved(
        &self,
        instance: &mut dyn Instance,
        produced: Vec<RawTypeId>,
        needed: Vec<RawTypeId>,
        continuation: Continuation,
    ) -> Result<(), EmbindError> {
        let pending = {
            let mut state = self.state_mut();
            let registry = &mut state.registry;
            for raw_type in &produced {
                registry.dependencies.insert(*raw_type, needed.clone());
            }
            let resolved = needed
                .iter()
                .map(|raw_type| registry.get(*raw_type))
                .collect::<Vec<_>>();
            let missing = resolved.iter().filter(|entry| entry.is_none()).count();
            let pending = Rc::new(RefCell::new(PendingResolution {
                produced,
                resolved,
                remaining: missing,
                continuation: Some(continuation),
            }));
            for (index, raw_type) in needed.iter().enumerate() {
                if !registry.registered.contains_key(raw_type) {
                    registry
                        .awaiting
                        .entry(*raw_type)
                        .or_default()
                        .push((pending.clone(), index));
                }
            }
            if missing > 0 {
                debug!(?needed, missing, "Registration waiting for dependencies");
                return Ok(());
            }
            pending
        };
        self.complete_resolution(instance, &pending)
    }

    fn complete_resolution(
        &self,
        instance: &mut dyn Instance,
        pending: &Rc<RefCell<PendingResolution>>,
    ) -> Result<(), EmbindError> {
        let (produced, resolved, continuation) = {
            let mut pending = pending.borrow_mut();
            let Some(continuation) = pending.continuation.take() else {
                return Ok(());
            };
            let resolved = std::mem::take(&mut pending.resolved)
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| EmbindError::Decode("incomplete type resolution".to_owned()))?;
            (pending.produced.clone(), resolved, continuation)
        };

        let types = continuation(self, instance, resolved)?;
        if types.len() != produced.len() {
            return Err(EmbindError::RegistrationMismatch(format!(
                "mismatched type converter count: expected {}, got {}",
                produced.len(),
                types.len()
            )));
        }
        for registered in types {
            self.register_type(instance, registered, RegisterOptions::default())?;
        }
        Ok(())
    }

    /// Finds a registered type, failing with a message naming `context` otherwise.
    pub(crate) fn require_registered_type(
        &self,
        instance: &mut dyn Instance,
        raw_type: RawTypeId,
        context: &str,
    ) -> Result<Rc<dyn RegisteredType>, EmbindError> {
        let registered = self.state().registry.get(raw_type);
        match registered {
            Some(registered) => Ok(registered),
            None => Err(EmbindError::UnknownType {
                context: context.to_owned(),
                type_name: self.type_name(instance, raw_type),
            }),
        }
    }

    /// Builds the error for a symbol used before all its types are registered, naming every
    /// missing type.
    pub(crate) fn unbound_type_error(
        &self,
        instance: &mut dyn Instance,
        message: &str,
        types: &[RawTypeId],
    ) -> EmbindError {
        let unbound = self.state().registry.unbound_types(types);
        let types = unbound
            .into_iter()
            .map(|raw_type| self.type_name(instance, raw_type))
            .collect();
        EmbindError::UnboundTypes {
            message: message.to_owned(),
            types,
        }
    }

    /// Asks the guest for the name of a type.
    pub(crate) fn type_name(&self, instance: &mut dyn Instance, raw_type: RawTypeId) -> String {
        match self.read_type_name(instance, raw_type) {
            Ok(name) => name,
            Err(error) => {
                warn!(%raw_type, %error, "Failed to read type name");
                raw_type.to_string()
            }
        }
    }

    fn read_type_name(
        &self,
        instance: &mut dyn Instance,
        raw_type: RawTypeId,
    ) -> Result<String, EmbindError> {
        let results = instance.call_export(
            &self.config().type_name_export,
            &[WireValue::I32(raw_type.0)],
        )?;
        let pointer = results
            .first()
            .ok_or_else(|| EmbindError::Decode("type name export returned nothing".to_owned()))?
            .as_pointer()?;
        let name = self.read_string(instance, pointer)?;
        self.free(instance, pointer)?;
        Ok(name)
    }

    /// Reads a list of `count` type ids stored at `pointer`.
    pub(crate) fn read_type_ids(
        &self,
        instance: &mut dyn Instance,
        count: u32,
        pointer: GuestPointer,
    ) -> Result<Vec<RawTypeId>, EmbindError> {
        (0..count)
            .map(|index| Ok(RawTypeId(instance.read_u32(pointer.index(index, 4))? as i32)))
            .collect()
    }

    /// The types the guest has registered so far.
    pub(crate) fn registered_type_count(&self) -> usize {
        self.state().registry.len()
    }
}

#[cfg(test)]
#[path = "unit_tests/registry.rs"]
mod tests;
