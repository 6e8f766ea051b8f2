//! Console chat harness.
//!
//! Stands in for a chat platform: each input line is `<user> <message>`,
//! replies and session notifications are written to stdout through a
//! [`ConsoleSink`]. Audio goes to the local output device.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::bot::{ChatMessage, CommandHandler, PomodoroService};
use crate::config::BotConfig;
use crate::notify::{ConsoleSink, NotificationSink};
use crate::scheduler::TimerScheduler;
use crate::session::SessionContext;
use crate::sound::{DirectorySoundCatalog, LocalAudioTransport, SoundCatalog, VoiceTransport};
use crate::types::{ChannelRef, NotifyTarget, UserId};

/// Voice channel every console user is considered to be in.
pub const CONSOLE_VOICE_CHANNEL: &str = "local";

/// Notify target for console output.
pub const CONSOLE_TARGET: &str = "console";

/// Authors whose name starts with this are treated as bots.
const BOT_AUTHOR_PREFIX: &str = "bot:";

/// Reads chat lines and feeds them to a [`CommandHandler`].
pub struct ConsoleHarness {
    handler: CommandHandler,
    sink: Arc<dyn NotificationSink>,
}

impl ConsoleHarness {
    #[must_use]
    pub fn new(handler: CommandHandler, sink: Arc<dyn NotificationSink>) -> Self {
        Self { handler, sink }
    }

    /// Builds a harness playing sounds from `config.sounds_dir` on the
    /// local audio device.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn from_config(config: &BotConfig, json: bool) -> Self {
        let sink: Arc<dyn NotificationSink> = Arc::new(ConsoleSink::new(json));
        let catalog: Arc<dyn SoundCatalog> =
            Arc::new(DirectorySoundCatalog::new(config.sounds_dir.clone()));
        let transport: Arc<dyn VoiceTransport> = Arc::new(LocalAudioTransport::new());
        Self::with_collaborators(config, transport, catalog, sink)
    }

    /// Builds a harness on explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: &BotConfig,
        transport: Arc<dyn VoiceTransport>,
        catalog: Arc<dyn SoundCatalog>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let ctx = SessionContext {
            scheduler: TimerScheduler::new(),
            transport,
            catalog,
            sink: Arc::clone(&sink),
            connect_timeout: config.connect_timeout(),
            command_prefix: config.command_prefix.clone(),
        };
        let service = Arc::new(PomodoroService::new(config, ctx));
        let handler = CommandHandler::new(service, config.command_prefix.clone());
        Self::new(handler, sink)
    }

    #[must_use]
    pub fn service(&self) -> &Arc<PomodoroService> {
        self.handler.service()
    }

    /// Splits `<user> <message>` into a chat message. Blank lines yield
    /// `None`.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<ChatMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (author, text) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let author_is_bot = author.starts_with(BOT_AUTHOR_PREFIX);
        Some(ChatMessage {
            author: UserId::from(author),
            author_is_bot,
            voice_channel: ChannelRef::from(CONSOLE_VOICE_CHANNEL),
            reply_to: NotifyTarget::from(CONSOLE_TARGET),
            text: text.trim().to_string(),
        })
    }

    /// Handles one input line, sending any reply to the sink.
    pub async fn handle_line(&self, line: &str) -> bool {
        let Some(message) = Self::parse_line(line) else {
            return false;
        };
        match self.handler.handle(&message).await {
            Some(reply) => {
                self.sink.send(&message.reply_to, &reply);
                true
            }
            None => false,
        }
    }

    /// Processes lines until `input` is exhausted. Returns the number of
    /// lines read.
    pub async fn run<R>(&self, input: R) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut count = 0;
        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            count += 1;
            self.handle_line(&line).await;
        }
        debug!(lines = count, "Input closed");
        Ok(count)
    }

    /// Resolves once no session is registered.
    pub async fn wait_for_sessions(&self) {
        self.service().registry().wait_until_idle().await;
        info!("All sessions finished");
    }
}

// ============================================================================
// Tests
// ============================================================================
