//! Voice/audio transport abstraction.
//!
//! A transport opens outbound audio connections into a voice channel. Each
//! connection plays one sound at a time and reports, through a oneshot
//! channel, how that playback ended.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::catalog::SoundResource;
use super::error::SoundError;
use crate::types::ChannelRef;

/// How a single playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The sound played to its end.
    Finished,
    /// Playback was stopped, replaced, or the connection closed.
    Interrupted,
}

/// Receiver resolved when a playback ends.
///
/// Dropping the sender without a value is equivalent to `Interrupted`.
pub type PlaybackDone = oneshot::Receiver<PlaybackEnd>;

/// One outbound audio connection.
pub trait VoiceConnection: Send + Sync {
    /// Starts playing `sound`, replacing whatever is playing.
    ///
    /// # Errors
    ///
    /// Returns an error if the sound cannot be decoded or the connection is
    /// unusable.
    fn play(&self, sound: &SoundResource) -> Result<PlaybackDone, SoundError>;

    /// Halts current playback, if any.
    fn stop_playback(&self);

    /// Releases the connection. Further `play` calls fail.
    fn close(&self);
}

/// Opens voice connections.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Joins `channel` and returns the outbound connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the connection.
    async fn open_connection(
        &self,
        channel: &ChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, SoundError>;
}

// ============================================================================
// MockVoiceTransport
// ============================================================================

/// A call recorded by [`MockVoiceTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Played(String),
    Stopped,
    Closed,
}

struct InFlight {
    channel: ChannelRef,
    done: oneshot::Sender<PlaybackEnd>,
}

#[derive(Default)]
struct MockShared {
    events: Mutex<Vec<(ChannelRef, TransportEvent)>>,
    in_flight: Mutex<Vec<InFlight>>,
    should_fail_connect: AtomicBool,
    should_fail_play: AtomicBool,
    missing_files: Mutex<HashSet<String>>,
    connect_delay: Mutex<Duration>,
}

impl MockShared {
    fn record(&self, channel: &ChannelRef, event: TransportEvent) {
        self.events.lock().push((channel.clone(), event));
    }

    fn end_playback(&self, channel: &ChannelRef, end: PlaybackEnd) -> usize {
        let ended: Vec<InFlight> = {
            let mut in_flight = self.in_flight.lock();
            let (ended, kept): (Vec<InFlight>, Vec<InFlight>) = in_flight
                .drain(..)
                .partition(|flight| &flight.channel == channel);
            *in_flight = kept;
            ended
        };
        let count = ended.len();
        for flight in ended {
            let _ = flight.done.send(end);
        }
        count
    }
}

/// Recording transport for tests.
///
/// Playbacks never finish on their own; call
/// [`finish_playback`](Self::finish_playback) to simulate a sound reaching
/// its natural end.
#[derive(Clone, Default)]
pub struct MockVoiceTransport {
    shared: Arc<MockShared>,
}

impl MockVoiceTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail_connect(&self, should_fail: bool) {
        self.shared
            .should_fail_connect
            .store(should_fail, Ordering::SeqCst);
    }

    pub fn set_should_fail_play(&self, should_fail: bool) {
        self.shared.should_fail_play.store(should_fail, Ordering::SeqCst);
    }

    /// Makes `play` report the file for `sound_id` as gone, as if it was
    /// deleted after the catalog resolved it.
    pub fn set_file_missing(&self, sound_id: &str, missing: bool) {
        let mut files = self.shared.missing_files.lock();
        if missing {
            files.insert(sound_id.to_string());
        } else {
            files.remove(sound_id);
        }
    }

    /// Delays every `open_connection` call.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.shared.connect_delay.lock() = delay;
    }

    /// All recorded events, across connections.
    #[must_use]
    pub fn events(&self) -> Vec<(ChannelRef, TransportEvent)> {
        self.shared.events.lock().clone()
    }

    /// Events recorded for one channel.
    #[must_use]
    pub fn events_for(&self, channel: &ChannelRef) -> Vec<TransportEvent> {
        self.shared
            .events
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Sound ids played on `channel`, in order.
    #[must_use]
    pub fn played(&self, channel: &ChannelRef) -> Vec<String> {
        self.events_for(channel)
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Played(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Number of times `event` was recorded on `channel`.
    #[must_use]
    pub fn count(&self, channel: &ChannelRef, event: &TransportEvent) -> usize {
        self.events_for(channel)
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    /// Completes in-flight playbacks on `channel` as if they reached their
    /// end. Returns how many were completed.
    pub fn finish_playback(&self, channel: &ChannelRef) -> usize {
        self.shared.end_playback(channel, PlaybackEnd::Finished)
    }
}

#[async_trait]
impl VoiceTransport for MockVoiceTransport {
    async fn open_connection(
        &self,
        channel: &ChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, SoundError> {
        let delay = *self.shared.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.shared.should_fail_connect.load(Ordering::SeqCst) {
            return Err(SoundError::DeviceNotAvailable("Mock failure".to_string()));
        }
        self.shared.record(channel, TransportEvent::Opened);
        Ok(Arc::new(MockConnection {
            channel: channel.clone(),
            shared: Arc::clone(&self.shared),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockConnection {
    channel: ChannelRef,
    shared: Arc<MockShared>,
    closed: AtomicBool,
}

impl VoiceConnection for MockConnection {
    fn play(&self, sound: &SoundResource) -> Result<PlaybackDone, SoundError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SoundError::ConnectionClosed);
        }
        if self.shared.should_fail_play.load(Ordering::SeqCst) {
            return Err(SoundError::StreamError("Mock failure".to_string()));
        }
        if self.shared.missing_files.lock().contains(&sound.id) {
            return Err(SoundError::NotFound(format!(
                "{}: No such file",
                sound.path.display()
            )));
        }
        self.shared.end_playback(&self.channel, PlaybackEnd::Interrupted);

        let (done, rx) = oneshot::channel();
        self.shared.in_flight.lock().push(InFlight {
            channel: self.channel.clone(),
            done,
        });
        self.shared
            .record(&self.channel, TransportEvent::Played(sound.id.clone()));
        Ok(rx)
    }

    fn stop_playback(&self) {
        self.shared.end_playback(&self.channel, PlaybackEnd::Interrupted);
        self.shared.record(&self.channel, TransportEvent::Stopped);
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.end_playback(&self.channel, PlaybackEnd::Interrupted);
        self.shared.record(&self.channel, TransportEvent::Closed);
    }
}
