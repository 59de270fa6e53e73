pub mod settings;
pub mod string_interning;

pub mod messages {
    pub mod dev_logging;
    pub mod display_messages;
    pub mod errors;
}

pub mod ir;
pub mod optimizers;

use crate::ir::ir_nodes::IrModule;
use crate::ir::ir_validation::validate_module;
use crate::ir::serialize;
use crate::messages::errors::FusionError;
use crate::optimizers::function_fusion::{FunctionFusion, FusionSummary};
use crate::settings::{Config, FUSED_OUTPUT_SUFFIX};
use crate::string_interning::StringTable;
use std::path::{Path, PathBuf};

/// Drives one module through load → validate → fuse → validate → write.
///
/// Owns the string table for the module it is working on, so loading a
/// new module resets it. The CLI and the integration tests both go
/// through this rather than wiring the pieces up themselves.
pub struct FusionPipeline {
    config: Config,
    string_table: StringTable,
}

impl FusionPipeline {
    pub fn new(config: Config) -> Self {
        FusionPipeline {
            config,
            string_table: StringTable::new(),
        }
    }

    /// Read and validate a module file, replacing the pipeline's string
    /// table with the one reconstructed from the file.
    pub fn load(&mut self, path: &Path) -> Result<IrModule, FusionError> {
        let (module, string_table) = serialize::load_module(path)?;
        self.string_table = string_table;

        validate_module(&module, &self.string_table)?;

        ir_log!(
            "Loaded module:\n{}",
            crate::ir::ir_display::display_module(&module, &self.string_table)
        );

        Ok(module)
    }

    /// Run the fusion pass to its fixpoint, then re-validate the module
    /// so any rewriting bug surfaces here rather than downstream.
    pub fn fuse(&mut self, module: &mut IrModule) -> Result<FusionSummary, FusionError> {
        let summary = {
            let mut pass = FunctionFusion::new(&mut self.string_table);
            pass.run(module, &self.config)?;
            pass.summary()
        };

        validate_module(module, &self.string_table)?;

        ir_log!(
            "Fused module:\n{}",
            crate::ir::ir_display::display_module(module, &self.string_table)
        );

        Ok(summary)
    }

    pub fn write(&self, path: &Path, module: &IrModule) -> Result<(), FusionError> {
        serialize::write_module(path, module, &self.string_table)
    }

    /// Where the transformed module goes: the configured output path, or
    /// the input path with its extension swapped for `.fused.json`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        if let Some(output) = &self.config.output {
            return output.clone();
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());

        input.with_file_name(format!("{stem}{FUSED_OUTPUT_SUFFIX}"))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn string_table(&self) -> &StringTable {
        &self.string_table
    }

    pub fn string_table_mut(&mut self) -> &mut StringTable {
        &mut self.string_table
    }
}
