//! pomodoro-bot - pomodoro sessions for chat users
//!
//! Each user runs their own cycle:
//! - focus with an optional looping ambient sound
//! - a break announced with a notification sound
//! - a short grace period before the voice connection is released

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio::io::BufReader;

use pomodoro_bot::cli::{Cli, Commands, ConsoleHarness, Display, RunArgs, SoundsArgs};
use pomodoro_bot::sound::{DirectorySoundCatalog, SoundCatalog};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Run(args)) => run(args).await?,
        Some(Commands::Sounds(args)) => list_sounds(&args)?,
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

/// Runs the console harness until stdin closes or Ctrl-C.
async fn run(args: RunArgs) -> Result<()> {
    let config = args.resolve()?;
    tracing::info!(
        prefix = %config.command_prefix,
        sounds_dir = %config.sounds_dir.display(),
        "Starting console harness"
    );

    let harness = ConsoleHarness::from_config(&config, args.json);
    let stdin = BufReader::new(tokio::io::stdin());

    let interrupted = tokio::select! {
        result = async {
            harness.run(stdin).await?;
            if args.wait {
                harness.wait_for_sessions().await;
            }
            Ok::<(), anyhow::Error>(())
        } => {
            result?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted");
            true
        }
    };

    Display::show_shutdown(harness.service().shutdown());
    if interrupted {
        // The blocking stdin reader would otherwise hold the runtime open.
        std::process::exit(0);
    }
    Ok(())
}

/// Prints the sounds available in the configured directory.
fn list_sounds(args: &SoundsArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let catalog = DirectorySoundCatalog::new(config.sounds_dir.clone());
    let sounds = catalog
        .list()
        .with_context(|| format!("Failed to list {}", config.sounds_dir.display()))?;
    Display::show_sounds(catalog.dir(), &sounds, args.json);
    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
