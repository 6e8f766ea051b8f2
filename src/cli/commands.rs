//! Command definitions for the pomodoro-bot binary.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::config::BotConfig;

// ============================================================================
// CLI Structure
// ============================================================================

/// Pomodoro sessions with ambient and notification sounds for chat users
#[derive(Parser, Debug)]
#[command(
    name = "pomodoro-bot",
    version,
    about = "Pomodoro sessions with ambient and notification sounds for chat users",
    long_about = "Runs per-user focus/break cycles driven by chat commands.\n\
                  The console harness reads `<user> <message>` lines from stdin \
                  and plays sounds on the local audio device.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the console chat harness on stdin
    Run(RunArgs),

    /// List the sounds in the sound directory
    Sounds(SoundsArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

/// Configuration source shared by all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "POMODORO_BOT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory scanned for sound files
    #[arg(short, long, env = "POMODORO_BOT_SOUNDS_DIR", value_name = "DIR")]
    pub sounds_dir: Option<PathBuf>,
}

impl ConfigArgs {
    /// Loads the configuration and applies command-line overrides.
    pub fn resolve(&self) -> Result<BotConfig> {
        let mut config = BotConfig::load_or_default(self.config.as_deref())?;
        if let Some(dir) = &self.sounds_dir {
            config.sounds_dir = dir.clone();
        }
        Ok(config)
    }
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Command prefix (overrides the configuration file)
    #[arg(short, long, value_parser = validate_prefix)]
    pub prefix: Option<String>,

    /// Print replies and notifications as JSON lines
    #[arg(long)]
    pub json: bool,

    /// After stdin closes, keep running until every session has ended
    #[arg(short, long)]
    pub wait: bool,
}

impl RunArgs {
    pub fn resolve(&self) -> Result<BotConfig> {
        let mut config = self.config.resolve()?;
        if let Some(prefix) = &self.prefix {
            config.command_prefix = prefix.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Arguments for the sounds command
#[derive(Args, Debug, Clone, Default)]
pub struct SoundsArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print the list as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validates the command prefix.
///
/// - Must not be empty
/// - Must be a single word
fn validate_prefix(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("prefix must not be empty".to_string());
    }
    if s.chars().any(char::is_whitespace) {
        return Err("prefix must be a single word".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Cli Tests
    // ------------------------------------------------------------------------

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["pomodoro-bot"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
        }

        #[test]
        fn test_parse_verbose_flag() {
            let cli = Cli::parse_from(["pomodoro-bot", "-v", "sounds"]);
            assert!(cli.verbose);
            assert!(matches!(cli.command, Some(Commands::Sounds(_))));
        }

        #[test]
        fn test_parse_completions_zsh() {
            let cli = Cli::parse_from(["pomodoro-bot", "completions", "zsh"]);
            match cli.command {
                Some(Commands::Completions { shell }) => {
                    assert_eq!(shell, clap_complete::Shell::Zsh);
                }
                _ => panic!("Expected Completions command"),
            }
        }

        #[test]
        fn test_parse_invalid_subcommand() {
            assert!(Cli::try_parse_from(["pomodoro-bot", "serve"]).is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Run Command Tests
    // ------------------------------------------------------------------------

    mod run_args_tests {
        use super::*;

        fn run_args(args: &[&str]) -> RunArgs {
            let mut argv = vec!["pomodoro-bot", "run"];
            argv.extend_from_slice(args);
            match Cli::parse_from(argv).command {
                Some(Commands::Run(args)) => args,
                _ => panic!("Expected Run command"),
            }
        }

        #[test]
        fn test_parse_run_defaults() {
            let args = run_args(&[]);
            assert!(args.prefix.is_none());
            assert!(!args.json);
            assert!(!args.wait);
        }

        #[test]
        fn test_parse_run_options() {
            let args = run_args(&["--sounds-dir", "/tmp/sounds", "-p", "!tomato", "--json", "-w"]);
            assert_eq!(args.config.sounds_dir, Some(PathBuf::from("/tmp/sounds")));
            assert_eq!(args.prefix.as_deref(), Some("!tomato"));
            assert!(args.json);
            assert!(args.wait);
        }

        #[test]
        fn test_prefix_with_space_rejected() {
            let result = Cli::try_parse_from(["pomodoro-bot", "run", "--prefix", "hey bot"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_overrides_applied() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("config.toml");
            std::fs::write(&path, "command_prefix = \"!focus\"\nsounds_dir = \"/srv/sounds\"\n")
                .unwrap();

            let args = RunArgs {
                config: ConfigArgs {
                    config: Some(path.clone()),
                    sounds_dir: None,
                },
                ..RunArgs::default()
            };
            let config = args.resolve().unwrap();
            assert_eq!(config.command_prefix, "!focus");
            assert_eq!(config.sounds_dir, PathBuf::from("/srv/sounds"));

            let args = RunArgs {
                config: ConfigArgs {
                    config: Some(path),
                    sounds_dir: Some(PathBuf::from("./local")),
                },
                prefix: Some("!tomato".to_string()),
                ..RunArgs::default()
            };
            let config = args.resolve().unwrap();
            assert_eq!(config.command_prefix, "!tomato");
            assert_eq!(config.sounds_dir, PathBuf::from("./local"));
        }

        #[test]
        fn test_missing_config_file_is_error() {
            let args = RunArgs {
                config: ConfigArgs {
                    config: Some(PathBuf::from("/nonexistent/config.toml")),
                    sounds_dir: None,
                },
                ..RunArgs::default()
            };
            assert!(args.resolve().is_err());
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_validate_prefix() {
            assert!(validate_prefix("!pomodoro").is_ok());
            assert!(validate_prefix("").is_err());
            assert!(validate_prefix("a b").is_err());
        }
    }
}
