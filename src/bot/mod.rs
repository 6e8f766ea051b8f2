//! Chat-facing layer.
//!
//! - `commands`: the `<prefix> <command>` grammar
//! - `service`: start/stop/status/configuration entry points
//! - `handler`: message → service call → reply

pub mod commands;
pub mod handler;
pub mod service;

pub use commands::{ChatAction, ChatCommand, Parsed};
pub use handler::{ChatMessage, CommandHandler};
pub use service::{PomodoroService, AMBIENT_OFF};
