// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the names the engine uses to reach into the guest module.

use serde::{Deserialize, Serialize};

/// The guest exports and import module an [`Engine`][`crate::Engine`] relies on.
///
/// The defaults match what Emscripten emits.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// The export used to allocate guest memory.
    pub malloc_export: String,
    /// The export used to release guest memory.
    pub free_export: String,
    /// The export that returns a freshly allocated name for a type id.
    pub type_name_export: String,
    /// The exported linear memory.
    pub memory_export: String,
    /// The exported indirect function table.
    pub function_table_export: String,
    /// The module the registration entry points are imported from.
    pub import_module: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            malloc_export: "malloc".to_owned(),
            free_export: "free".to_owned(),
            type_name_export: "__getTypeName".to_owned(),
            memory_export: "memory".to_owned(),
            function_table_export: "__indirect_function_table".to_owned(),
            import_module: "env".to_owned(),
        }
    }
}
