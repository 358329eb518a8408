// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Values that cross the guest call boundary and the signatures of guest functions.

use super::{GuestPointer, RuntimeError};
use std::{fmt, str::FromStr};

/// The native kind of a value passed to or returned from a guest function.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WireKind {
    /// A 32-bit integer, also used for pointers.
    I32,
    /// A 64-bit integer.
    I64,
    /// A 32-bit float.
    F32,
    /// A 64-bit float.
    F64,
}

impl WireKind {
    /// The character used for this kind in signature descriptors.
    pub fn descriptor(&self) -> char {
        match self {
            WireKind::I32 => 'i',
            WireKind::I64 => 'j',
            WireKind::F32 => 'f',
            WireKind::F64 => 'd',
        }
    }
}

/// A single wire word passed to or returned from a guest function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WireValue {
    /// A 32-bit integer.
    I32(i32),
    /// A 64-bit integer.
    I64(i64),
    /// A 32-bit float.
    F32(f32),
    /// A 64-bit float.
    F64(f64),
}

impl WireValue {
    /// Returns the zero value for a `kind`.
    pub fn zero(kind: WireKind) -> Self {
        match kind {
            WireKind::I32 => WireValue::I32(0),
            WireKind::I64 => WireValue::I64(0),
            WireKind::F32 => WireValue::F32(0.0),
            WireKind::F64 => WireValue::F64(0.0),
        }
    }

    /// Returns the kind of this wire value.
    pub fn kind(&self) -> WireKind {
        match self {
            WireValue::I32(_) => WireKind::I32,
            WireValue::I64(_) => WireKind::I64,
            WireValue::F32(_) => WireKind::F32,
            WireValue::F64(_) => WireKind::F64,
        }
    }

    fn mismatch(&self, expected: WireKind) -> RuntimeError {
        RuntimeError::WireKindMismatch {
            expected,
            actual: self.kind(),
        }
    }

    /// Interprets the wire value as a 32-bit signed integer.
    pub fn as_i32(&self) -> Result<i32, RuntimeError> {
        match self {
            WireValue::I32(value) => Ok(*value),
            _ => Err(self.mismatch(WireKind::I32)),
        }
    }

    /// Interprets the wire value as a 32-bit unsigned integer.
    pub fn as_u32(&self) -> Result<u32, RuntimeError> {
        self.as_i32().map(|value| value as u32)
    }

    /// Interprets the wire value as a guest address.
    pub fn as_pointer(&self) -> Result<GuestPointer, RuntimeError> {
        self.as_u32().map(GuestPointer)
    }

    /// Interprets the wire value as a 64-bit signed integer.
    pub fn as_i64(&self) -> Result<i64, RuntimeError> {
        match self {
            WireValue::I64(value) => Ok(*value),
            _ => Err(self.mismatch(WireKind::I64)),
        }
    }

    /// Interprets the wire value as a 32-bit float.
    pub fn as_f32(&self) -> Result<f32, RuntimeError> {
        match self {
            WireValue::F32(value) => Ok(*value),
            _ => Err(self.mismatch(WireKind::F32)),
        }
    }

    /// Interprets the wire value as a 64-bit float.
    pub fn as_f64(&self) -> Result<f64, RuntimeError> {
        match self {
            WireValue::F64(value) => Ok(*value),
            _ => Err(self.mismatch(WireKind::F64)),
        }
    }

    /// Converts the wire value into a float, the representation used by the emval return
    /// convention.
    pub fn to_f64(&self) -> f64 {
        match *self {
            WireValue::I32(value) => value as f64,
            WireValue::I64(value) => value as f64,
            WireValue::F32(value) => value as f64,
            WireValue::F64(value) => value,
        }
    }
}

/// The parameter and result kinds of a guest function.
///
/// Parsed from the descriptor strings the guest hands over with every function pointer it
/// registers, where the first character describes the result and the remaining characters
/// describe the parameters.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Signature {
    result: Option<WireKind>,
    parameters: Vec<WireKind>,
}

impl Signature {
    /// Creates a new [`Signature`].
    pub fn new(result: Option<WireKind>, parameters: impl Into<Vec<WireKind>>) -> Self {
        Signature {
            result,
            parameters: parameters.into(),
        }
    }

    /// The result kind, or [`None`] for functions that return nothing.
    pub fn result(&self) -> Option<WireKind> {
        self.result
    }

    /// The parameter kinds.
    pub fn parameters(&self) -> &[WireKind] {
        &self.parameters
    }

    /// Checks that `arguments` match the parameter kinds.
    pub fn check_arguments(&self, arguments: &[WireValue]) -> Result<(), RuntimeError> {
        if arguments.len() != self.parameters.len()
            || arguments
                .iter()
                .zip(&self.parameters)
                .any(|(argument, kind)| argument.kind() != *kind)
        {
            let actual = arguments.iter().map(WireValue::kind);
            return Err(RuntimeError::SignatureMismatch {
                index: 0,
                expected: self.to_string(),
                actual: Signature::new(self.result, actual.collect::<Vec<_>>()).to_string(),
            });
        }
        Ok(())
    }
}

impl FromStr for Signature {
    type Err = RuntimeError;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let invalid = || RuntimeError::InvalidSignature(descriptor.to_owned());
        let parse = |character| match character {
            'i' | 'p' => Ok(Some(WireKind::I32)),
            'j' => Ok(Some(WireKind::I64)),
            'f' => Ok(Some(WireKind::F32)),
            'd' => Ok(Some(WireKind::F64)),
            'v' => Ok(None),
            _ => Err(invalid()),
        };

        let mut characters = descriptor.chars();
        let result = parse(characters.next().ok_or_else(invalid)?)?;
        let parameters = characters
            .map(|character| parse(character)?.ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Signature { result, parameters })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result.map_or('v', |kind| kind.descriptor());
        write!(formatter, "{result}")?;
        for parameter in &self.parameters {
            write!(formatter, "{}", parameter.descriptor())?;
        }
        Ok(())
    }
}

/// A reference to a function in the guest's indirect function table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GuestFunction {
    index: u32,
    signature: Signature,
}

impl GuestFunction {
    /// Creates a new [`GuestFunction`] for the table entry at `index`.
    pub fn new(index: u32, signature: Signature) -> Self {
        GuestFunction { index, signature }
    }

    /// The index in the indirect function table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The declared signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Checks that `arguments` match the declared parameters.
    pub fn check_arguments(&self, arguments: &[WireValue]) -> Result<(), RuntimeError> {
        self.signature
            .check_arguments(arguments)
            .map_err(|error| match error {
                RuntimeError::SignatureMismatch {
                    expected, actual, ..
                } => RuntimeError::SignatureMismatch {
                    index: self.index,
                    expected,
                    actual,
                },
                other => other,
            })
    }

    /// Extracts the single result of a call from `results`, or [`None`] if the function returns
    /// nothing.
    pub fn single_result(&self, results: Vec<WireValue>) -> Result<Option<WireValue>, RuntimeError> {
        let expected = usize::from(self.signature.result.is_some());
        if results.len() != expected {
            return Err(RuntimeError::ResultCountMismatch {
                expected,
                actual: results.len(),
            });
        }
        Ok(results.into_iter().next())
    }
}
