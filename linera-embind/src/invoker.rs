// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calls into guest functions with host values.

use crate::{
    runtime::{GuestFunction, Instance, WireValue},
    types::{run_destructors, Destructor, DestructorPolicy, RegisteredType},
    Engine, EmbindError, Value,
};
use std::rc::Rc;
use tracing::{trace, warn};

/// A guest function bound to the types of its result, receiver and parameters.
///
/// The guest function is called through its invoker entry point: the first wire argument is
/// the target function pointer, followed by the receiver, if any, and the arguments.
#[derive(Debug)]
pub(crate) struct GuestInvoker {
    human_name: String,
    result_type: Rc<dyn RegisteredType>,
    this_type: Option<Rc<dyn RegisteredType>>,
    parameter_types: Vec<Rc<dyn RegisteredType>>,
    function: GuestFunction,
    target: WireValue,
    needs_destructor_stack: bool,
}

impl GuestInvoker {
    pub(crate) fn craft(
        human_name: String,
        result_type: Rc<dyn RegisteredType>,
        this_type: Option<Rc<dyn RegisteredType>>,
        parameter_types: Vec<Rc<dyn RegisteredType>>,
        function: GuestFunction,
        target: WireValue,
    ) -> Self {
        let needs_destructor_stack = this_type
            .iter()
            .chain(&parameter_types)
            .any(|parameter| parameter.destructor_policy() == DestructorPolicy::Deferred);
        GuestInvoker {
            human_name,
            result_type,
            this_type,
            parameter_types,
            function,
            target,
            needs_destructor_stack,
        }
    }

    pub(crate) fn human_name(&self) -> &str {
        &self.human_name
    }

    pub(crate) fn result_type(&self) -> &Rc<dyn RegisteredType> {
        &self.result_type
    }

    pub(crate) fn parameter_types(&self) -> &[Rc<dyn RegisteredType>] {
        &self.parameter_types
    }

    /// Calls the guest function.
    ///
    /// Every wire value produced for the call is released afterwards, also when a conversion
    /// or the call itself fails.
    pub(crate) fn invoke(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        this: Option<&Value>,
        arguments: &[Value],
    ) -> Result<Value, EmbindError> {
        if arguments.len() != self.parameter_types.len() {
            return Err(EmbindError::ArgumentCount {
                name: self.human_name.clone(),
                actual: arguments.len(),
                expected: self.parameter_types.len(),
            });
        }
        trace!(function = %self.human_name, "Invoking guest function");

        let mut stack = self.needs_destructor_stack.then(Vec::new);
        let mut prepared = Vec::with_capacity(arguments.len() + 1);
        let mut wire_arguments = vec![self.target];

        let receiver = self.this_type.as_ref().map(|this_type| {
            let value = this.unwrap_or(&Value::Undefined);
            (this_type, value)
        });
        let parameters = receiver
            .into_iter()
            .chain(self.parameter_types.iter().zip(arguments));
        for (parameter_type, value) in parameters {
            match parameter_type.to_wire(engine, instance, stack.as_mut(), value) {
                Ok(wire) => {
                    prepared.push((parameter_type, wire));
                    wire_arguments.push(wire);
                }
                Err(error) => {
                    self.release(engine, instance, stack, &prepared);
                    return Err(error);
                }
            }
        }

        let results = match instance.call_indirect(&self.function, &wire_arguments) {
            Ok(results) => results,
            Err(error) => {
                self.release(engine, instance, stack, &prepared);
                return Err(error.into());
            }
        };
        match self.decode_result(engine, instance, results) {
            Ok(result) => {
                self.cleanup(engine, instance, stack, &prepared)?;
                Ok(result)
            }
            Err(error) => {
                self.release(engine, instance, stack, &prepared);
                Err(error)
            }
        }
    }

    fn decode_result(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        results: Vec<WireValue>,
    ) -> Result<Value, EmbindError> {
        if self.result_type.native_kind().is_none() {
            return Ok(Value::Undefined);
        }
        let wire = self.function.single_result(results)?.ok_or_else(|| {
            EmbindError::Decode(format!("{} returned no value", self.human_name))
        })?;
        self.result_type.from_wire(engine, instance, wire)
    }

    fn cleanup(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        stack: Option<Vec<Destructor>>,
        prepared: &[(&Rc<dyn RegisteredType>, WireValue)],
    ) -> Result<(), EmbindError> {
        match stack {
            Some(stack) => run_destructors(engine, instance, stack),
            None => {
                for (parameter_type, wire) in prepared {
                    if let Some(destructor) = parameter_type.destructor(*wire) {
                        destructor.run(engine, instance)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Cleans up after a failed call, keeping the original error.
    fn release(
        &self,
        engine: &Engine,
        instance: &mut dyn Instance,
        stack: Option<Vec<Destructor>>,
        prepared: &[(&Rc<dyn RegisteredType>, WireValue)],
    ) {
        if let Err(error) = self.cleanup(engine, instance, stack, prepared) {
            warn!(function = %self.human_name, %error, "Failed to release call arguments");
        }
    }
}
