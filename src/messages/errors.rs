use crate::ir::ir_display::IrLocation;
use std::path::Path;

/// The final error type surfaced by the pass, the IR tooling and the CLI.
#[derive(Debug)]
pub struct FusionError {
    pub msg: String,

    /// Which part of the module the error is about, when known.
    pub location: IrLocation,

    pub error_type: ErrorType,
}

impl FusionError {
    pub fn new(msg: impl Into<String>, error_type: ErrorType) -> FusionError {
        FusionError {
            msg: msg.into(),
            location: IrLocation::Module,
            error_type,
        }
    }

    pub fn with_location(mut self, location: IrLocation) -> Self {
        self.location = location;
        self
    }

    /// An internal bug in the pass itself, not the user's module.
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        FusionError::new(msg, ErrorType::Compiler)
    }

    /// A malformed or unresolvable module file.
    pub fn ir_error(msg: impl Into<String>, location: IrLocation) -> Self {
        FusionError::new(msg, ErrorType::Ir).with_location(location)
    }

    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        FusionError {
            msg: msg.into(),
            location: IrLocation::File(path.to_path_buf()),
            error_type: ErrorType::File,
        }
    }
}

#[derive(PartialEq, Debug)]
pub enum ErrorType {
    /// Can't find or read a module/config file
    File,

    /// Malformed fuse.toml
    Config,

    /// The input module broke an IR invariant
    Ir,

    /// A callee could not be legalized by the inliner
    Inline,

    /// Internal pass bug (not the user's fault)
    Compiler,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::File => "File Error",
        ErrorType::Config => "Malformed Config",
        ErrorType::Ir => "IR Invariant Violation",
        ErrorType::Inline => "Inline Failure",
        ErrorType::Compiler => "Pass Bug",
    }
}

/// Returns a new FusionError for broken IR invariants in the input module.
///
/// Usage:
/// `return_ir_error!("message", location)`;
#[macro_export]
macro_rules! return_ir_error {
    ($msg:expr, $loc:expr) => {
        return Err($crate::messages::errors::FusionError {
            msg: $msg.into(),
            location: $loc,
            error_type: $crate::messages::errors::ErrorType::Ir,
        })
    };
}

/// Returns a new FusionError for internal contract violations.
/// These indicate a bug in the pass, not in the module being transformed.
#[macro_export]
macro_rules! return_compiler_error {
    ($msg:expr) => {
        return Err($crate::messages::errors::FusionError {
            msg: $msg.into(),
            location: $crate::ir::ir_display::IrLocation::Module,
            error_type: $crate::messages::errors::ErrorType::Compiler,
        })
    };
    ($msg:expr, $loc:expr) => {
        return Err($crate::messages::errors::FusionError {
            msg: $msg.into(),
            location: $loc,
            error_type: $crate::messages::errors::ErrorType::Compiler,
        })
    };
}

/// Returns a new FusionError when a call site cannot be inlined.
#[macro_export]
macro_rules! return_inline_error {
    ($msg:expr, $loc:expr) => {
        return Err($crate::messages::errors::FusionError {
            msg: $msg.into(),
            location: $loc,
            error_type: $crate::messages::errors::ErrorType::Inline,
        })
    };
}
