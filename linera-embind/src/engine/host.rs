// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Declarations made by the host, which are matched against the guest's registrations in
//! whichever order both arrive.

use super::Engine;
use crate::{class::ClassBinding, EmbindError, Value};
use std::rc::Rc;
use tracing::warn;

/// A constant, as registered by the guest and optionally declared by the host.
#[derive(Clone, Debug, Default)]
pub struct ConstantValue {
    guest: Option<Value>,
    host: Option<Value>,
}

impl ConstantValue {
    /// The value registered by the guest.
    pub fn guest_value(&self) -> Option<&Value> {
        self.guest.as_ref()
    }

    /// The value declared by the host.
    pub fn host_value(&self) -> Option<&Value> {
        self.host.as_ref()
    }

    /// The value of the constant, preferring the guest's.
    pub fn value(&self) -> Option<&Value> {
        self.guest.as_ref().or(self.host.as_ref())
    }

    pub(crate) fn set_guest_value(&mut self, name: &str, value: Value) -> Result<(), EmbindError> {
        if self.guest.is_some() {
            return Err(EmbindError::RegistrationMismatch(format!(
                "constant {name} is already registered by the guest"
            )));
        }
        self.guest = Some(value);
        self.validate(name)
    }

    pub(crate) fn set_host_value(&mut self, name: &str, value: Value) -> Result<(), EmbindError> {
        if self.host.is_some() {
            return Err(EmbindError::RegistrationMismatch(format!(
                "constant {name} is already registered"
            )));
        }
        self.host = Some(value);
        self.validate(name)
    }

    fn validate(&self, name: &str) -> Result<(), EmbindError> {
        match (&self.guest, &self.host) {
            (Some(guest), Some(host)) if guest != host => {
                warn!(%name, ?guest, ?host, "Constant differs between guest and host");
                Err(EmbindError::RegistrationMismatch(format!(
                    "constant {name} is {guest:?} in the guest but {host:?} in the host"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Engine {
    /// Attaches a host type to the guest class named `name`.
    ///
    /// Every handle later created for the class is materialized through `binding`. The class
    /// does not need to be registered by the guest yet.
    pub fn register_class(
        &self,
        name: &str,
        binding: Rc<dyn ClassBinding>,
    ) -> Result<(), EmbindError> {
        let mut state = self.state_mut();
        let class = state.classes.entry(name);
        let descriptor = state.classes.get_mut(class);
        if descriptor.binding.is_some() {
            return Err(EmbindError::RegistrationMismatch(format!(
                "could not register class {name}, it already has a host binding"
            )));
        }
        descriptor.binding = Some(binding);
        Ok(())
    }

    /// Declares the values of the enum named `name`.
    ///
    /// Values the guest registers must match the declaration, and values it already registered
    /// are checked right away.
    pub fn register_enum(
        &self,
        name: &str,
        values: impl IntoIterator<Item = (String, i64)>,
    ) -> Result<(), EmbindError> {
        let mut state = self.state_mut();
        let descriptor = state.enums.entry(name.to_owned()).or_default();
        if descriptor.host_values.is_some() {
            return Err(EmbindError::RegistrationMismatch(format!(
                "enum {name} is already registered"
            )));
        }
        descriptor.host_values = Some(values.into_iter().collect());
        let mismatch = descriptor
            .guest_values
            .iter()
            .map(|(value_name, value)| descriptor.check_guest_value(name, value_name, *value))
            .find_map(Result::err);
        if let Some(error) = mismatch {
            warn!(%name, %error, "Enum differs between guest and host");
            descriptor.host_values = None;
            return Err(error);
        }
        Ok(())
    }

    /// Declares the value of the constant named `name`, which must match the value the guest
    /// registers.
    pub fn register_constant(&self, name: &str, value: Value) -> Result<(), EmbindError> {
        self.state_mut()
            .constants
            .entry(name.to_owned())
            .or_default()
            .set_host_value(name, value)
    }

    /// Makes `value` reachable from the guest as the global named `name`.
    pub fn register_emval_symbol(&self, name: &str, value: Value) -> Result<(), EmbindError> {
        let mut state = self.state_mut();
        if let Some(existing) = state.emval.globals.get(name) {
            return Err(EmbindError::RegistrationMismatch(format!(
                "could not register symbol {name}, already registered as {}",
                existing.kind()
            )));
        }
        state.emval.globals.insert(name.to_owned(), value);
        Ok(())
    }

    /// The number of live emval handles, not counting the reserved constants.
    pub fn count_emval_handles(&self) -> usize {
        self.state().emval.table.count()
    }
}
