//! Chat command grammar.
//!
//! A command is a chat message starting with the configured prefix, e.g.
//! `!pomodoro start 50 10`. The words after the prefix are parsed with clap
//! so usage and help text come from the same definitions.

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

// ============================================================================
// Grammar
// ============================================================================

/// Pomodoro bot commands
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "pomodoro",
    no_binary_name = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
pub struct ChatCommand {
    #[command(subcommand)]
    pub action: ChatAction,
}

/// Available chat commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ChatAction {
    /// Start a pomodoro (minutes may be fractional)
    #[command(allow_negative_numbers = true)]
    Start {
        /// Focus length in minutes
        work: Option<String>,
        /// Break length in minutes
        #[arg(value_name = "BREAK")]
        break_minutes: Option<String>,
    },

    /// Stop your pomodoro
    Stop,

    /// Show your pomodoro
    Status,

    /// Choose the sound looped while you focus ("off" for silence)
    Ambient {
        sound: String,
    },

    /// Choose the sound played when a phase ends
    Notify {
        sound: String,
    },

    /// List available sounds
    Sounds,

    /// Show this help
    Help,
}

// ============================================================================
// Parsing
// ============================================================================

/// Result of looking at one chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Not addressed to the bot.
    Ignored,
    Command(ChatAction),
    /// Addressed to the bot but not understood; carries clap's message.
    Invalid(String),
}

/// Parses `text` if it starts with `prefix` as a separate word.
pub fn parse(prefix: &str, text: &str) -> Parsed {
    let mut words = text.split_whitespace();
    if words.next() != Some(prefix) {
        return Parsed::Ignored;
    }

    let args: Vec<&str> = words.collect();
    if args.is_empty() {
        return Parsed::Command(ChatAction::Help);
    }

    let matches = match ChatCommand::command()
        .bin_name(prefix.to_string())
        .try_get_matches_from(args)
    {
        Ok(matches) => matches,
        Err(e) => return Parsed::Invalid(e.to_string()),
    };
    match ChatCommand::from_arg_matches(&matches) {
        Ok(command) => Parsed::Command(command.action),
        Err(e) => Parsed::Invalid(e.to_string()),
    }
}

/// Help text listing every command.
pub fn help_text(prefix: &str) -> String {
    ChatCommand::command()
        .bin_name(prefix.to_string())
        .render_help()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
