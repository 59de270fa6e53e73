use callfuse::FusionPipeline;
use callfuse::ir::interpreter::{Interpreter, IrValue};
use callfuse::ir::ir_display::display_module;
use callfuse::messages::display_messages::print_formatted_error;
use callfuse::settings::{self, PASS_DESCRIPTION, PASS_NAME};
use saying::say;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

enum Command {
    /// Run the fusion pass over a module file and write the result
    Fuse(PathBuf),

    /// Evaluate a function from a module file with literal arguments
    Eval(PathBuf, String, Vec<String>),

    /// Print the readable form of a module file
    Show(PathBuf),

    Help,
}

#[derive(PartialEq, Debug)]
enum Flag {
    /// Suppress the counts report even when the config asks for it
    Quiet,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help(false);
        return;
    }

    let command = match get_command(&args[1..]) {
        Ok(command) => command,
        Err(e) => {
            say!(Red e);
            print_help(true);
            return;
        }
    };

    let flags = get_flags(&args);

    match command {
        Command::Help => print_help(false),
        Command::Fuse(path) => run_fuse(&path, &flags),
        Command::Eval(path, function, raw_args) => run_eval(&path, &function, &raw_args),
        Command::Show(path) => run_show(&path),
    }
}

fn run_fuse(path: &Path, flags: &[Flag]) {
    let config = match settings::load_config(path) {
        Ok(config) => config,
        Err(e) => {
            print_formatted_error(&e);
            return;
        }
    };

    let show_report = config.show_report && !flags.contains(&Flag::Quiet);

    let mut pipeline = FusionPipeline::new(config);

    let mut module = match pipeline.load(path) {
        Ok(module) => module,
        Err(e) => {
            print_formatted_error(&e);
            return;
        }
    };

    let summary = match pipeline.fuse(&mut module) {
        Ok(summary) => summary,
        Err(e) => {
            print_formatted_error(&e);
            return;
        }
    };

    let output = pipeline.output_path(path);
    if let Err(e) = pipeline.write(&output, &module) {
        print_formatted_error(&e);
        return;
    }

    if show_report {
        if let Err(e) = summary.write_report(&mut io::stdout()) {
            say!(Red format!("Could not print the report: {e}"));
        }
    }

    say!(Green "Fused module written to ", output.display().to_string());
}

fn run_eval(path: &Path, function: &str, raw_args: &[String]) {
    let mut pipeline = FusionPipeline::new(settings::Config::default());

    let module = match pipeline.load(path) {
        Ok(module) => module,
        Err(e) => {
            print_formatted_error(&e);
            return;
        }
    };

    let mut args = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        match parse_value(raw) {
            Ok(value) => args.push(value),
            Err(e) => {
                say!(Red e);
                return;
            }
        }
    }

    let mut interpreter = Interpreter::new(&module, pipeline.string_table());
    match interpreter.call_by_name(function, &args) {
        Ok(Some(IrValue::Int(v))) => println!("{v}"),
        Ok(Some(IrValue::Float(v))) => println!("{v}"),
        Ok(Some(IrValue::Bool(v))) => println!("{v}"),
        Ok(None) => {}
        Err(e) => print_formatted_error(&e),
    }
}

fn run_show(path: &Path) {
    let mut pipeline = FusionPipeline::new(settings::Config::default());

    match pipeline.load(path) {
        Ok(module) => print!("{}", display_module(&module, pipeline.string_table())),
        Err(e) => print_formatted_error(&e),
    }
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);

    match command {
        Some("help") => Ok(Command::Help),

        Some("fuse") => match args.get(1) {
            Some(path) if !path.is_empty() => Ok(Command::Fuse(module_path(path)?)),
            _ => Err("'fuse' needs a module file (try 'fuse module.json')".to_string()),
        },

        Some("eval") => {
            let path = match args.get(1) {
                Some(path) if !path.is_empty() => module_path(path)?,
                _ => return Err("'eval' needs a module file and a function name".to_string()),
            };

            let function = match args.get(2) {
                Some(name) if !name.is_empty() && !name.starts_with("--") => name.to_string(),
                _ => return Err("'eval' needs a function name after the module file".to_string()),
            };

            let call_args = args[3..]
                .iter()
                .take_while(|arg| !arg.starts_with("--"))
                .cloned()
                .collect();

            Ok(Command::Eval(path, function, call_args))
        }

        Some("show") => match args.get(1) {
            Some(path) if !path.is_empty() => Ok(Command::Show(module_path(path)?)),
            _ => Err("'show' needs a module file (try 'show module.json')".to_string()),
        },

        _ => Err(format!("Invalid command: '{}'", command.unwrap_or(""))),
    }
}

fn module_path(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);

    let extension = path.extension().and_then(|e| e.to_str());
    if extension != Some(settings::MODULE_FILE_EXTENSION) {
        return Err(format!(
            "'{raw}' doesn't look like a module file (expected a .{} file)",
            settings::MODULE_FILE_EXTENSION
        ));
    }

    Ok(path)
}

fn get_flags(args: &[String]) -> Vec<Flag> {
    let mut flags = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--quiet" => flags.push(Flag::Quiet),
            _ => {}
        }
    }

    flags
}

/// Literal argument forms the `eval` command accepts: int, then float,
/// then bool. Whatever parses first wins; the interpreter type-checks
/// against the function signature afterwards.
fn parse_value(raw: &str) -> Result<IrValue, String> {
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(IrValue::Int(v));
    }

    if let Ok(v) = raw.parse::<f64>() {
        return Ok(IrValue::Float(v));
    }

    match raw {
        "true" => Ok(IrValue::Bool(true)),
        "false" => Ok(IrValue::Bool(false)),
        _ => Err(format!("Can't parse '{raw}' as an int, float or bool")),
    }
}

fn print_help(after_error: bool) {
    if after_error {
        println!();
    }

    println!("{PASS_NAME} - {PASS_DESCRIPTION}");
    println!();
    println!("Commands:");
    println!("  fuse <module.json>                Run the pass and write <module>.fused.json");
    println!("  eval <module.json> <fn> [args..]  Evaluate a function from the module");
    println!("  show <module.json>                Print the module in readable form");
    println!("  help                              Show this message");
    println!();
    println!("Flags:");
    println!("  --quiet                           Don't print the counts report");
}
