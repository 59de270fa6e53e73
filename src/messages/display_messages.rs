use crate::ir::ir_display::IrLocation;
use crate::messages::errors::{ErrorType, FusionError, error_type_to_str};
use saying::say;

/// Print a FusionError to the terminal in a readable form.
/// The report itself goes through the pass's writer, not through here.
pub fn print_formatted_error(e: &FusionError) {
    let located = describe_location(&e.location);

    match e.error_type {
        ErrorType::File => {
            say!(Yellow "🏚 Can't find/read file: ", located);
            say!(e.msg.to_owned());
            return;
        }

        ErrorType::Config => {
            say!(Yellow "CONFIG FILE ISSUE - ");
            say!(Dark Yellow "Something in fuse.toml doesn't make sense");
        }

        ErrorType::Ir | ErrorType::Inline => {
            say!(Red error_type_to_str(&e.error_type));
            if !located.is_empty() {
                say!(Dark Magenta located);
            }
        }

        ErrorType::Compiler => {
            say!(Yellow "PASS BUG - ");
            say!(Dark Yellow "function-fusion developer skill issue (not your fault)");
        }
    }

    say!(Red e.msg.to_owned());
}

fn describe_location(location: &IrLocation) -> String {
    match location {
        IrLocation::Module => String::new(),
        IrLocation::Function(f) => format!("in function #{}", f.0),
        IrLocation::Block(f, b) => format!("in function #{}, block b{}", f.0, b.0),
        IrLocation::Statement(f, s) => format!("in function #{}, statement s{}", f.0, s.0),
        IrLocation::File(path) => path.display().to_string(),
    }
}
