//! CLI module for the generator
//!
//! ## Commands
//!
//! - `generate <model>` - Run a pass and write the generated sources
//! - `check <model>` - Run a pass and report diagnostics only
//! - `union-ids <model>` - Print the type ids assigned to every union family
//! - `resolve <model> <type> <method>` - Show how each `[Inject]` assignment's type was resolved
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a library error through miette.
    pub fn report(err: impl miette::Diagnostic + Send + Sync + 'static) -> Self {
        Self::failure(format!("{:?}", miette::Report::new(err)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Attribute-driven source generator for Unity C# projects
#[derive(Parser, Debug)]
#[command(name = "derivgen")]
#[command(version = VERSION)]
#[command(about = "Attribute-driven source generator for Unity C# projects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the model's `settings` block.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Tag manager asset (default: ProjectSettings/TagManager.asset next to the model)
    #[arg(long, value_name = "PATH")]
    pub tag_manager: Option<PathBuf>,
    /// Omit `/// <summary>` comments from generated members
    #[arg(long)]
    pub no_docs: bool,
    /// Emit `InstanceIndex` on every tracked type
    #[arg(long)]
    pub always_emit_index: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a generation pass and write the generated sources
    Generate {
        /// Model file (JSON declaration graph)
        #[arg(value_name = "MODEL")]
        model: PathBuf,
        /// Output directory (default: Generated next to the model)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Run a generation pass and report diagnostics without writing files
    Check {
        #[arg(value_name = "MODEL")]
        model: PathBuf,
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Print the type ids assigned to each union family
    UnionIds {
        #[arg(value_name = "MODEL")]
        model: PathBuf,
    },

    /// Show the resolved type of each assignment in an `[Inject]` method
    Resolve {
        #[arg(value_name = "MODEL")]
        model: PathBuf,
        /// Qualified type name, e.g. Game.Player
        #[arg(value_name = "TYPE")]
        type_name: String,
        /// Method name
        #[arg(value_name = "METHOD")]
        method: String,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Generate {
            model,
            output,
            settings,
        } => commands::generate(&model, output.as_deref(), &settings),
        Command::Check { model, settings } => commands::check(&model, &settings),
        Command::UnionIds { model } => commands::union_ids(&model),
        Command::Resolve {
            model,
            type_name,
            method,
        } => commands::resolve(&model, &type_name, &method),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_generate() {
        let cli = Cli::try_parse_from(["derivgen", "generate", "model.json", "-o", "out", "--no-docs"]).unwrap();
        if let Command::Generate { output, settings, .. } = cli.command {
            assert_eq!(output, Some(PathBuf::from("out")));
            assert!(settings.no_docs);
            assert!(!settings.always_emit_index);
        } else {
            panic!("Expected Generate command");
        }
    }

    #[test]
    fn test_cli_parse_check_with_tag_manager() {
        let cli = Cli::try_parse_from(["derivgen", "check", "model.json", "--tag-manager", "Tags.asset"]).unwrap();
        if let Command::Check { settings, .. } = cli.command {
            assert_eq!(settings.tag_manager, Some(PathBuf::from("Tags.asset")));
        } else {
            panic!("Expected Check command");
        }
    }

    #[test]
    fn test_cli_parse_union_ids() {
        let cli = Cli::try_parse_from(["derivgen", "union-ids", "model.json"]).unwrap();
        assert!(matches!(cli.command, Command::UnionIds { .. }));
    }

    #[test]
    fn test_cli_parse_resolve() {
        let cli = Cli::try_parse_from(["derivgen", "resolve", "model.json", "Game.Player", "Init"]).unwrap();
        if let Command::Resolve { type_name, method, .. } = cli.command {
            assert_eq!(type_name, "Game.Player");
            assert_eq!(method, "Init");
        } else {
            panic!("Expected Resolve command");
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["derivgen"]).is_err());
    }
}
