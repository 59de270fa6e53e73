use crate::messages::errors::{ErrorType, FusionError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MODULE_FILE_EXTENSION: &str = "json";
pub const CONFIG_FILE_NAME: &str = "fuse.toml";
pub const FUSED_OUTPUT_SUFFIX: &str = ".fused.json";

/// Functions whose name ends with this suffix never take part in a fusion,
/// as either producer or consumer. This is the pass's only behavioral knob.
pub const NO_FUSE_SUFFIX: &str = ".alwaysinline";

/// Appended to every synthesized function name, after the consumer name,
/// producer name and 0-based argument position.
pub const FUSED_NAME_SUFFIX: &str = ".fused";

pub const PASS_NAME: &str = "function-fusion";
pub const PASS_DESCRIPTION: &str = "Clone functions with constant args.";

// Each round can only consume chain shapes the previous round created, so the
// round count is bounded by the longest call chain in the module. Anything
// getting near this cap is a pass bug, not a big module.
pub const MAX_FUSION_ROUNDS: u32 = 64;

/// Hard stop for the test/CLI interpreter so a looping module can't hang a run.
pub const INTERPRETER_STEP_LIMIT: u64 = 1_000_000;

pub const MINIMUM_STRING_TABLE_CAPACITY: usize = 64;

// A rough guess to avoid reallocation in the common case.
// Most modules produce only a handful of fusable chains per round.
pub const LIKELY_CHAINS_PER_ROUND: usize = 8;

/// Optional per-module configuration, read from a `fuse.toml` next to the
/// input module file. Everything has a default so the file can be absent.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where to write the transformed module. Defaults to `<input>.fused.json`.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Print the two-line counts report after the pass.
    #[serde(default = "default_show_report")]
    pub show_report: bool,

    /// Override for the fixpoint round cap.
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

fn default_show_report() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: None,
            show_report: true,
            max_rounds: None,
        }
    }
}

impl Config {
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds.unwrap_or(MAX_FUSION_ROUNDS)
    }
}

/// Load the config next to `module_path`, falling back to defaults when no
/// `fuse.toml` exists there.
pub fn load_config(module_path: &Path) -> Result<Config, FusionError> {
    let config_path = match module_path.parent() {
        Some(dir) => dir.join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    };

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(&config_path)
        .map_err(|e| FusionError::file_error(&config_path, format!("Could not read config: {e}")))?;

    toml::from_str(&raw).map_err(|e| {
        FusionError::new(
            format!("Malformed {CONFIG_FILE_NAME}: {e}"),
            ErrorType::Config,
        )
    })
}
