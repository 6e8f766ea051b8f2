//! CLI module for the pomodoro bot.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `harness`: Console chat harness reading stdin
//! - `display`: Output formatting and display logic

pub mod commands;
pub mod display;
pub mod harness;

pub use commands::{Cli, Commands, ConfigArgs, RunArgs, SoundsArgs};
pub use display::Display;
pub use harness::ConsoleHarness;
