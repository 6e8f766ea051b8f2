//! Per-session playback control.
//!
//! A [`PlaybackController`] owns one voice connection for the lifetime of a
//! session. It loops the ambient sound during focus and plays one-shot
//! notification sounds at phase boundaries.
//!
//! Loop restarts are decided when a playback reports that it finished, not
//! when the playback was started. The completion watcher and every call that
//! changes looping (`stop_loop`, `play_once`, `teardown`) go through the
//! same mutex, and each loop carries a generation number. A completion
//! restarts playback only if its generation is still the active loop, so a
//! completion that races with the focus → break boundary can never bring
//! the ambient sound back.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::catalog::{SoundCatalog, SoundResource};
use super::error::{PlaybackError, SoundError};
use super::transport::{PlaybackDone, PlaybackEnd, VoiceConnection, VoiceTransport};
use crate::types::ChannelRef;

/// Told when a loop could not be restarted, with the sound id. The loop is
/// already cleared when this runs.
pub type LoopFailureHook = Arc<dyn Fn(&str, PlaybackError) + Send + Sync>;

struct ActiveLoop {
    generation: u64,
    sound_id: String,
}

#[derive(Default)]
struct LoopState {
    looping: Option<ActiveLoop>,
    last_generation: u64,
    torn_down: bool,
}

struct PlaybackInner {
    connection: Arc<dyn VoiceConnection>,
    catalog: Arc<dyn SoundCatalog>,
    runtime: Handle,
    state: Mutex<LoopState>,
    on_loop_failure: Mutex<Option<LoopFailureHook>>,
}

impl PlaybackInner {
    fn resolve(&self, sound_id: &str) -> Result<SoundResource, PlaybackError> {
        self.catalog.resolve(sound_id).map_err(|e| {
            debug!("Sound '{}' did not resolve: {}", sound_id, e);
            PlaybackError::MissingResource(sound_id.to_string())
        })
    }

    /// Plays `sound` on the connection. A file that disappeared after it was
    /// resolved counts as a missing sound.
    fn start_playback(&self, sound: &SoundResource) -> Result<PlaybackDone, PlaybackError> {
        self.connection.play(sound).map_err(|e| match e {
            SoundError::NotFound(detail) => {
                debug!("Sound '{}' vanished: {}", sound.id, detail);
                PlaybackError::MissingResource(sound.id.clone())
            }
            other => PlaybackError::Transport(other),
        })
    }

    /// Starts one iteration of the active loop. Caller holds `state`.
    fn play_iteration(
        self: &Arc<Self>,
        sound: &SoundResource,
        generation: u64,
    ) -> Result<(), PlaybackError> {
        let done = self.start_playback(sound)?;
        self.watch_loop(done, generation);
        Ok(())
    }

    fn watch_loop(self: &Arc<Self>, done: PlaybackDone, generation: u64) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.runtime.spawn(async move {
            match done.await {
                Ok(PlaybackEnd::Finished) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.resume_loop(generation);
                    }
                }
                Ok(PlaybackEnd::Interrupted) | Err(_) => {
                    debug!(generation, "Loop playback interrupted");
                }
            }
        });
    }

    fn resume_loop(self: &Arc<Self>, generation: u64) {
        let (sound_id, error) = {
            let mut state = self.state.lock();
            let sound_id = match &state.looping {
                Some(active) if active.generation == generation && !state.torn_down => {
                    active.sound_id.clone()
                }
                _ => {
                    debug!(generation, "Loop no longer active, not restarting");
                    return;
                }
            };

            debug!(generation, "Restarting loop '{}'", sound_id);
            // Resolved again each time: the file may be gone by now.
            let restarted = self
                .resolve(&sound_id)
                .and_then(|sound| self.play_iteration(&sound, generation));
            match restarted {
                Ok(()) => return,
                Err(e) => {
                    state.looping = None;
                    (sound_id, e)
                }
            }
        };

        warn!("Failed to restart ambient loop '{}': {}", sound_id, error);
        let hook = self.on_loop_failure.lock().clone();
        if let Some(hook) = hook {
            hook(&sound_id, error);
        }
    }
}

impl Drop for PlaybackInner {
    fn drop(&mut self) {
        if !self.state.get_mut().torn_down {
            self.connection.close();
        }
    }
}

/// Drives ambient looping and notification sounds on one connection.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<PlaybackInner>,
}

impl PlaybackController {
    /// Opens a voice connection to `channel`.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::Connection` if the transport rejects the
    /// connection or does not answer within `timeout`. Not retried.
    pub async fn connect(
        transport: &dyn VoiceTransport,
        catalog: Arc<dyn SoundCatalog>,
        channel: &ChannelRef,
        timeout: Duration,
    ) -> Result<Self, PlaybackError> {
        let connection = match tokio::time::timeout(timeout, transport.open_connection(channel)).await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                warn!("Voice connection to {} rejected: {}", channel, e);
                return Err(PlaybackError::Connection(e.to_string()));
            }
            Err(_) => {
                warn!("Voice connection to {} timed out", channel);
                return Err(PlaybackError::Connection(format!(
                    "timed out after {}s",
                    timeout.as_secs_f64()
                )));
            }
        };

        info!("Voice connection to {} established", channel);
        Ok(Self::from_connection(connection, catalog))
    }

    /// Wraps an already-open connection.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn from_connection(
        connection: Arc<dyn VoiceConnection>,
        catalog: Arc<dyn SoundCatalog>,
    ) -> Self {
        Self {
            inner: Arc::new(PlaybackInner {
                connection,
                catalog,
                runtime: Handle::current(),
                state: Mutex::new(LoopState::default()),
                on_loop_failure: Mutex::new(None),
            }),
        }
    }

    /// Starts looping `sound_id` until `stop_loop`, `play_once` or
    /// `teardown`.
    ///
    /// # Errors
    ///
    /// `MissingResource` if the sound does not resolve or its file is gone
    /// (nothing plays); `Transport` if the connection refuses to play it.
    pub fn play_loop(&self, sound_id: &str) -> Result<(), PlaybackError> {
        let sound = self.inner.resolve(sound_id)?;

        let mut state = self.inner.state.lock();
        if state.torn_down {
            debug!("Playback torn down, ignoring loop '{}'", sound_id);
            return Ok(());
        }

        state.last_generation += 1;
        let generation = state.last_generation;
        state.looping = Some(ActiveLoop {
            generation,
            sound_id: sound.id.clone(),
        });

        debug!(generation, "Starting loop '{}'", sound.id);
        if let Err(e) = self.inner.play_iteration(&sound, generation) {
            state.looping = None;
            return Err(e);
        }
        Ok(())
    }

    /// Stops any loop and plays `sound_id` once.
    ///
    /// # Errors
    ///
    /// `MissingResource` if the sound does not resolve; the loop is still
    /// stopped and nothing plays.
    pub fn play_once(&self, sound_id: &str) -> Result<(), PlaybackError> {
        let resolved = self.inner.resolve(sound_id);

        let mut state = self.inner.state.lock();
        if state.torn_down {
            debug!("Playback torn down, ignoring '{}'", sound_id);
            return Ok(());
        }
        state.looping = None;
        self.inner.connection.stop_playback();

        let sound = resolved?;
        debug!("Playing '{}' once", sound.id);
        // The one-shot is never restarted, so its completion is not watched.
        let _done = self.inner.start_playback(&sound)?;
        Ok(())
    }

    /// Clears the looping flag and halts playback immediately.
    pub fn stop_loop(&self) {
        let mut state = self.inner.state.lock();
        if state.torn_down {
            return;
        }
        if let Some(active) = state.looping.take() {
            debug!(generation = active.generation, "Stopping loop '{}'", active.sound_id);
        }
        self.inner.connection.stop_playback();
    }

    /// Halts playback and releases the connection.
    ///
    /// Returns `true` the first time; later calls do nothing.
    pub fn teardown(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.torn_down {
            return false;
        }
        state.torn_down = true;
        state.looping = None;
        self.inner.connection.stop_playback();
        self.inner.connection.close();
        info!("Voice connection released");
        true
    }

    /// Returns true while an ambient loop is active.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.inner.state.lock().looping.is_some()
    }

    /// Registers the callback told about failed loop restarts.
    pub fn set_on_loop_failure(&self, hook: LoopFailureHook) {
        *self.inner.on_loop_failure.lock() = Some(hook);
    }

    /// Returns true once `teardown` has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.state.lock().torn_down
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PlaybackController")
            .field(
                "looping",
                &state.looping.as_ref().map(|active| active.sound_id.as_str()),
            )
            .field("torn_down", &state.torn_down)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
