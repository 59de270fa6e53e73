//! The on-disk module format: a JSON document carrying the module tree and
//! the interned string table in ID order. Reconstructing the table from the
//! ordered dump gives back the same IDs, so names survive a round trip.

use crate::ir::ir_nodes::IrModule;
use crate::messages::errors::{ErrorType, FusionError};
use crate::string_interning::StringTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize)]
pub struct ModuleFile {
    /// Interned strings in StringId order.
    pub strings: Vec<String>,
    pub module: IrModule,
}

pub fn to_json(module: &IrModule, string_table: &StringTable) -> Result<String, FusionError> {
    let file = ModuleFile {
        strings: string_table.iter().map(str::to_string).collect(),
        module: module.clone(),
    };

    serde_json::to_string_pretty(&file)
        .map_err(|e| FusionError::new(format!("Could not serialize module: {e}"), ErrorType::Ir))
}

pub fn from_json(json: &str) -> Result<(IrModule, StringTable), FusionError> {
    let file: ModuleFile = serde_json::from_str(json)
        .map_err(|e| FusionError::new(format!("Malformed module file: {e}"), ErrorType::Ir))?;

    let mut string_table = StringTable::with_capacity(file.strings.len());
    for s in file.strings {
        string_table.get_or_intern(s);
    }

    Ok((file.module, string_table))
}

pub fn load_module(path: &Path) -> Result<(IrModule, StringTable), FusionError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| FusionError::file_error(path, format!("Could not read module: {e}")))?;

    from_json(&raw)
}

pub fn write_module(
    path: &Path,
    module: &IrModule,
    string_table: &StringTable,
) -> Result<(), FusionError> {
    let json = to_json(module, string_table)?;

    std::fs::write(path, json)
        .map_err(|e| FusionError::file_error(path, format!("Could not write module: {e}")))
}
