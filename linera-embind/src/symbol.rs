// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named, possibly overloaded, callables.
//!
//! Overloads are only distinguished by their number of arguments.

use crate::{
    class::ClassId,
    invoker::GuestInvoker,
    types::{RawTypeId, RegisteredType},
    EmbindError,
};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    rc::Rc,
};

/// What happens when a symbol is called.
#[derive(Clone, Debug)]
pub(crate) enum Callable {
    /// Some types used by the callable are not registered yet.
    Unbound {
        message: String,
        types: Vec<RawTypeId>,
    },
    /// A guest function.
    Invoker(Rc<GuestInvoker>),
    /// The constructors of a class.
    Construct(ClassId),
}

/// One callable registered under a name.
#[derive(Clone, Debug)]
pub(crate) struct Overload {
    /// The number of arguments, or [`None`] for class symbols, which accept any count.
    pub(crate) arg_count: Option<u32>,
    pub(crate) callable: Callable,
    pub(crate) result_type: Rc<dyn RegisteredType>,
    pub(crate) argument_types: Vec<Rc<dyn RegisteredType>>,
    pub(crate) class_name: Option<String>,
}

/// The callables registered under a name.
#[derive(Clone, Debug)]
pub(crate) enum SymbolSlot {
    Single(Overload),
    Overloaded(BTreeMap<u32, Overload>),
}

impl SymbolSlot {
    /// Picks the overload accepting `arg_count` arguments.
    pub(crate) fn resolve(&self, name: &str, arg_count: usize) -> Result<&Overload, EmbindError> {
        match self {
            SymbolSlot::Single(overload) => Ok(overload),
            SymbolSlot::Overloaded(table) => u32::try_from(arg_count)
                .ok()
                .and_then(|count| table.get(&count))
                .ok_or_else(|| EmbindError::NoMatchingOverload {
                    name: name.to_owned(),
                    actual: arg_count,
                    expected: table.keys().copied().collect(),
                }),
        }
    }

    pub(crate) fn overloads(&self) -> Vec<&Overload> {
        match self {
            SymbolSlot::Single(overload) => vec![overload],
            SymbolSlot::Overloaded(table) => table.values().collect(),
        }
    }

    fn into_table(self) -> BTreeMap<u32, Overload> {
        match self {
            SymbolSlot::Single(overload) => overload
                .arg_count
                .map(|count| (count, overload))
                .into_iter()
                .collect(),
            SymbolSlot::Overloaded(table) => table,
        }
    }
}

/// A table of named symbols.
#[derive(Clone, Default)]
pub(crate) struct SymbolTable {
    symbols: BTreeMap<String, SymbolSlot>,
}

impl SymbolTable {
    pub(crate) fn get(&self, name: &str) -> Option<&SymbolSlot> {
        self.symbols.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &SymbolSlot)> {
        self.symbols.iter()
    }

    /// Exposes a public symbol.
    ///
    /// A second symbol with the same name turns the slot into an overload table, unless either
    /// accepts any number of arguments or both accept the same number.
    pub(crate) fn expose(&mut self, name: &str, overload: Overload) -> Result<(), EmbindError> {
        let duplicate = || EmbindError::DuplicatePublicSymbol(name.to_owned());
        match self.symbols.entry(name.to_owned()) {
            Entry::Vacant(entry) => {
                entry.insert(SymbolSlot::Single(overload));
            }
            Entry::Occupied(mut entry) => {
                let count = overload.arg_count.ok_or_else(duplicate)?;
                let slot = entry.get_mut();
                match slot {
                    SymbolSlot::Single(existing) => {
                        let existing_count = existing
                            .arg_count
                            .filter(|existing_count| *existing_count != count)
                            .ok_or_else(duplicate)?;
                        let existing = existing.clone();
                        *slot = SymbolSlot::Overloaded(BTreeMap::from([
                            (existing_count, existing),
                            (count, overload),
                        ]));
                    }
                    SymbolSlot::Overloaded(table) => {
                        if table.contains_key(&count) {
                            return Err(duplicate());
                        }
                        table.insert(count, overload);
                    }
                }
            }
        }
        Ok(())
    }

    /// Installs a class member on top of the member of the same name the class already has or
    /// inherits.
    ///
    /// With `shadow`, a single inherited member from another class with the same number of
    /// arguments is replaced. Otherwise both end up in an overload table, where the new member
    /// replaces any member with the same number of arguments.
    pub(crate) fn install(
        &mut self,
        name: &str,
        existing: Option<SymbolSlot>,
        overload: Overload,
        shadow: bool,
    ) {
        let slot = match existing {
            None => SymbolSlot::Single(overload),
            Some(SymbolSlot::Single(existing))
                if shadow
                    && existing.class_name != overload.class_name
                    && existing.arg_count == overload.arg_count =>
            {
                SymbolSlot::Single(overload)
            }
            Some(existing) => {
                let mut table = existing.into_table();
                if let Some(count) = overload.arg_count {
                    table.insert(count, overload);
                }
                SymbolSlot::Overloaded(table)
            }
        };
        self.symbols.insert(name.to_owned(), slot);
    }

    /// Replaces a symbol once its types are resolved.
    ///
    /// In an overload table, only the overload with the same number of arguments is replaced.
    pub(crate) fn replace(&mut self, name: &str, overload: Overload) -> Result<(), EmbindError> {
        let slot = self
            .symbols
            .get_mut(name)
            .ok_or_else(|| EmbindError::UnknownSymbol(name.to_owned()))?;
        match (slot, overload.arg_count) {
            (SymbolSlot::Overloaded(table), Some(count)) => {
                table.insert(count, overload);
            }
            (slot, _) => *slot = SymbolSlot::Single(overload),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "unit_tests/symbol.rs"]
mod tests;
