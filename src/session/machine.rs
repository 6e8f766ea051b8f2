//! Per-user session state machine.
//!
//! `Focus → Break → Draining → (ended)`, each step driven by a single timer
//! from the [`TimerScheduler`]. All transitions run under the session's
//! state mutex and check the lifecycle first, so a timer that fires after
//! `stop` has taken the lock finds the session ended and does nothing.
//!
//! `stop` marks the session ended and takes its pending timers while
//! holding the lock, then cancels them and tears down playback after
//! releasing it. Cancelling waits for a callback that is already running,
//! and that callback blocks on the state mutex until `stop` has released
//! it, so the two never deadlock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::notify::{content, NotificationSink};
use crate::scheduler::{firing_timer_id, TimerHandle, TimerScheduler};
use crate::sound::{PlaybackController, PlaybackError, SoundCatalog, VoiceTransport};
use crate::types::{
    clock_after, minutes_to_duration, ChannelRef, NotifyTarget, SessionPhase, SessionSnapshot,
    UserId,
};

use super::error::SessionError;

/// Delay between the end of the break and releasing the voice connection,
/// so the trailing notification sound can finish.
pub const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Called once when a session ends, with the session id.
pub(crate) type EndHook = Box<dyn FnOnce(Uuid) + Send + 'static>;

// ============================================================================
// Parameters and collaborators
// ============================================================================

/// What a session is started with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub user_id: UserId,
    /// Focus length in (possibly fractional) minutes.
    pub work_minutes: f64,
    /// Break length in (possibly fractional) minutes.
    pub break_minutes: f64,
    pub ambient_sound: Option<String>,
    pub notify_sound: String,
    /// Voice channel the audio connection joins.
    pub channel: ChannelRef,
    /// Where progress messages go.
    pub notify_target: NotifyTarget,
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    pub scheduler: TimerScheduler,
    pub transport: Arc<dyn VoiceTransport>,
    pub catalog: Arc<dyn SoundCatalog>,
    pub sink: Arc<dyn NotificationSink>,
    /// Upper bound on opening the voice connection.
    pub connect_timeout: Duration,
    /// Shown in the "start another round" hint.
    pub command_prefix: String,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Connection open, cycle not begun.
    Connected,
    Running(SessionPhase),
    Ended,
}

struct SessionState {
    lifecycle: Lifecycle,
    pending: Vec<TimerHandle>,
    phase_ends_at: DateTime<Local>,
}

struct SessionInner {
    id: Uuid,
    user_id: UserId,
    work: Duration,
    break_len: Duration,
    work_minutes: f64,
    break_minutes: f64,
    ambient_sound: Option<String>,
    notify_sound: String,
    notify_target: NotifyTarget,
    started_at: DateTime<Local>,
    scheduler: TimerScheduler,
    sink: Arc<dyn NotificationSink>,
    command_prefix: String,
    playback: PlaybackController,
    state: Mutex<SessionState>,
    on_end: Mutex<Option<EndHook>>,
}

/// One user's focus/break cycle and its voice connection.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Opens the voice connection for a new session without starting the
    /// cycle. Nothing is sent or played until [`begin`](Self::begin).
    ///
    /// # Errors
    ///
    /// `InvalidDuration` for non-positive durations (no connection is
    /// attempted); `Connection` if the transport fails or times out.
    pub async fn connect(params: SessionParams, ctx: &SessionContext) -> Result<Self, SessionError> {
        let work = minutes_to_duration(params.work_minutes)?;
        let break_len = minutes_to_duration(params.break_minutes)?;

        let playback = PlaybackController::connect(
            ctx.transport.as_ref(),
            Arc::clone(&ctx.catalog),
            &params.channel,
            ctx.connect_timeout,
        )
        .await
        .map_err(|e| match e {
            PlaybackError::Connection(msg) => SessionError::Connection(msg),
            other => SessionError::Connection(other.to_string()),
        })?;

        let started_at = Local::now();
        let session = Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                user_id: params.user_id,
                work,
                break_len,
                work_minutes: params.work_minutes,
                break_minutes: params.break_minutes,
                ambient_sound: params.ambient_sound,
                notify_sound: params.notify_sound,
                notify_target: params.notify_target,
                started_at,
                scheduler: ctx.scheduler.clone(),
                sink: Arc::clone(&ctx.sink),
                command_prefix: ctx.command_prefix.clone(),
                playback,
                state: Mutex::new(SessionState {
                    lifecycle: Lifecycle::Connected,
                    pending: Vec::new(),
                    phase_ends_at: started_at,
                }),
                on_end: Mutex::new(None),
            }),
        };

        let weak: Weak<SessionInner> = Arc::downgrade(&session.inner);
        session
            .inner
            .playback
            .set_on_loop_failure(Arc::new(move |sound_id: &str, error: PlaybackError| {
                if let Some(inner) = weak.upgrade() {
                    inner.report_playback(Err(error), sound_id);
                }
            }));
        Ok(session)
    }

    /// Connects and begins the cycle in one step.
    pub async fn start(params: SessionParams, ctx: &SessionContext) -> Result<Self, SessionError> {
        let session = Self::connect(params, ctx).await?;
        session.begin();
        Ok(session)
    }

    /// Enters `Focus`: starts the ambient loop, schedules the end of focus
    /// and announces the session. Does nothing unless freshly connected.
    pub fn begin(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if state.lifecycle != Lifecycle::Connected {
            debug!(session_id = %inner.id, "Session not in connected state, not beginning");
            return;
        }

        state.lifecycle = Lifecycle::Running(SessionPhase::Focus);
        state.phase_ends_at = clock_after(Local::now(), inner.work);

        if let Some(ambient) = &inner.ambient_sound {
            inner.report_playback(inner.playback.play_loop(ambient), ambient);
        }

        inner.schedule_transition(&mut state, inner.work, SessionPhase::Focus);

        inner.sink.send(
            &inner.notify_target,
            &content::session_started(
                &inner.user_id,
                inner.work_minutes,
                &state.phase_ends_at,
                inner.ambient_sound.as_deref(),
            ),
        );
        info!(
            session_id = %inner.id,
            user = %inner.user_id,
            work_minutes = inner.work_minutes,
            break_minutes = inner.break_minutes,
            "Focus started"
        );
    }

    /// Ends the session from any state.
    ///
    /// Cancels every pending timer, tears down playback and runs the end
    /// hook (registry removal). Returns `false` if it had already ended; a
    /// natural end still in progress is waited for. No session side effect
    /// happens after this returns.
    pub fn stop(&self) -> bool {
        let inner = &self.inner;
        let pending = {
            let mut state = inner.state.lock();
            if state.lifecycle == Lifecycle::Ended {
                None
            } else {
                state.lifecycle = Lifecycle::Ended;
                Some(std::mem::take(&mut state.pending))
            }
        };
        let Some(pending) = pending else {
            // A natural end may still be releasing the connection.
            inner.playback.teardown();
            return false;
        };

        for handle in &pending {
            handle.cancel();
        }
        inner.playback.teardown();
        info!(session_id = %inner.id, user = %inner.user_id, "Session stopped");
        inner.run_end_hook();
        true
    }

    pub(crate) fn set_on_end(&self, hook: EndHook) {
        *self.inner.on_end.lock() = Some(hook);
    }

    /// Per-session id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    /// Current phase, or `None` before `begin` and after the session ended.
    #[must_use]
    pub fn phase(&self) -> Option<SessionPhase> {
        match self.inner.state.lock().lifecycle {
            Lifecycle::Running(phase) => Some(phase),
            Lifecycle::Connected | Lifecycle::Ended => None,
        }
    }

    /// Returns true once the session has ended (naturally or by `stop`).
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.state.lock().lifecycle == Lifecycle::Ended
    }

    /// Number of scheduled transitions that have neither fired nor been
    /// cancelled.
    #[must_use]
    pub fn pending_timer_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .pending
            .iter()
            .filter(|handle| handle.is_pending())
            .count()
    }

    /// Returns true while the ambient sound is looping.
    #[must_use]
    pub fn is_ambient_looping(&self) -> bool {
        self.inner.playback.is_looping()
    }

    /// Returns true once the voice connection has been released.
    #[must_use]
    pub fn is_connection_released(&self) -> bool {
        self.inner.playback.is_torn_down()
    }

    /// Status view, `None` unless the cycle is running.
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let inner = &self.inner;
        let state = inner.state.lock();
        let Lifecycle::Running(phase) = state.lifecycle else {
            return None;
        };
        Some(SessionSnapshot {
            session_id: inner.id,
            user_id: inner.user_id.clone(),
            phase,
            started_at: inner.started_at,
            phase_ends_at: state.phase_ends_at,
            work_minutes: inner.work_minutes,
            break_minutes: inner.break_minutes,
            ambient_sound: inner.ambient_sound.clone(),
            notify_sound: inner.notify_sound.clone(),
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("user_id", &self.inner.user_id)
            .field("lifecycle", &self.inner.state.lock().lifecycle)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Transitions
// ============================================================================

impl SessionInner {
    /// Schedules the transition out of `from` after `delay`.
    fn schedule_transition(
        self: &Arc<Self>,
        state: &mut SessionState,
        delay: Duration,
        from: SessionPhase,
    ) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = self.scheduler.schedule(delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_timer(from);
            }
        });
        state.pending.push(handle);
    }

    fn on_timer(self: &Arc<Self>, from: SessionPhase) {
        let mut state = self.state.lock();
        if let Some(timer_id) = firing_timer_id() {
            state.pending.retain(|handle| handle.id() != timer_id);
        }

        if state.lifecycle != Lifecycle::Running(from) {
            debug!(session_id = %self.id, phase = %from, "Stale transition ignored");
            return;
        }

        match from {
            SessionPhase::Focus => self.enter_break(&mut state),
            SessionPhase::Break => self.enter_draining(&mut state),
            SessionPhase::Draining => {
                state.lifecycle = Lifecycle::Ended;
                let leftover = std::mem::take(&mut state.pending);
                drop(state);
                self.finish(leftover);
            }
        }
    }

    fn enter_break(self: &Arc<Self>, state: &mut SessionState) {
        state.lifecycle = Lifecycle::Running(SessionPhase::Break);
        state.phase_ends_at = clock_after(Local::now(), self.break_len);

        self.playback.stop_loop();
        self.sink.send(
            &self.notify_target,
            &content::focus_complete(
                &self.user_id,
                self.work_minutes,
                self.break_minutes,
                &state.phase_ends_at,
            ),
        );
        self.play_notify();
        self.schedule_transition(state, self.break_len, SessionPhase::Break);

        info!(session_id = %self.id, user = %self.user_id, "Focus complete, break started");
    }

    fn enter_draining(self: &Arc<Self>, state: &mut SessionState) {
        state.lifecycle = Lifecycle::Running(SessionPhase::Draining);
        state.phase_ends_at = clock_after(Local::now(), DRAIN_GRACE);

        self.sink.send(
            &self.notify_target,
            &content::break_complete(&self.user_id, &self.command_prefix),
        );
        self.play_notify();
        self.schedule_transition(state, DRAIN_GRACE, SessionPhase::Draining);

        info!(session_id = %self.id, user = %self.user_id, "Break complete, draining");
    }

    fn finish(&self, leftover: Vec<TimerHandle>) {
        for handle in &leftover {
            handle.cancel();
        }
        self.playback.teardown();
        info!(session_id = %self.id, user = %self.user_id, "Session finished");
        self.run_end_hook();
    }

    fn play_notify(&self) {
        self.report_playback(self.playback.play_once(&self.notify_sound), &self.notify_sound);
    }

    /// Playback problems never end the session: missing sounds are reported
    /// to the user, transport failures are logged.
    fn report_playback(&self, result: Result<(), PlaybackError>, sound_id: &str) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_missing_resource() => {
                warn!(session_id = %self.id, "Sound '{}' is missing", sound_id);
                self.sink.send(
                    &self.notify_target,
                    &content::missing_sound(&self.user_id, sound_id),
                );
            }
            Err(PlaybackError::Transport(e)) if e.is_device_error() => {
                error!(session_id = %self.id, "Audio output lost while playing '{}': {}", sound_id, e);
            }
            Err(e) => {
                warn!(session_id = %self.id, "Playback of '{}' failed: {}", sound_id, e);
            }
        }
    }

    fn run_end_hook(&self) {
        let hook = self.on_end.lock().take();
        if let Some(hook) = hook {
            hook(self.id);
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        for handle in self.state.get_mut().pending.drain(..) {
            handle.cancel();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotificationSink;
    use crate::sound::{MockSoundCatalog, MockVoiceTransport, TransportEvent};

    struct Fixture {
        ctx: SessionContext,
        transport: MockVoiceTransport,
        catalog: Arc<MockSoundCatalog>,
        sink: Arc<MockNotificationSink>,
    }

    fn fixture() -> Fixture {
        let transport = MockVoiceTransport::new();
        let catalog = Arc::new(MockSoundCatalog::with_sounds(&["lofi", "bell"]));
        let sink = Arc::new(MockNotificationSink::new());
        let ctx = SessionContext {
            scheduler: TimerScheduler::new(),
            transport: Arc::new(transport.clone()),
            catalog: catalog.clone(),
            sink: sink.clone(),
            connect_timeout: Duration::from_secs(5),
            command_prefix: "!pomodoro".to_string(),
        };
        Fixture {
            ctx,
            transport,
            catalog,
            sink,
        }
    }

    fn params(ambient: Option<&str>) -> SessionParams {
        SessionParams {
            user_id: UserId::from("u1"),
            work_minutes: 1.0,
            break_minutes: 1.0,
            ambient_sound: ambient.map(str::to_string),
            notify_sound: "bell".to_string(),
            channel: ChannelRef::from("voice-1"),
            notify_target: NotifyTarget::from("text-1"),
        }
    }

    fn channel() -> ChannelRef {
        ChannelRef::from("voice-1")
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_start_enters_focus() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            assert_eq!(session.phase(), Some(SessionPhase::Focus));
            assert!(session.is_ambient_looping());
            assert_eq!(session.pending_timer_count(), 1);
            assert_eq!(f.sink.count_containing("Pomodoro started"), 1);
            assert_eq!(f.transport.played(&channel()), vec!["lofi"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_full_cycle_timing() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();

            advance(59).await;
            assert_eq!(session.phase(), Some(SessionPhase::Focus));

            advance(2).await;
            assert_eq!(session.phase(), Some(SessionPhase::Break));

            advance(58).await;
            assert_eq!(session.phase(), Some(SessionPhase::Break));

            advance(2).await;
            assert_eq!(session.phase(), Some(SessionPhase::Draining));
            assert!(!session.is_connection_released());

            advance(DRAIN_GRACE.as_secs()).await;
            assert!(session.is_ended());
            assert!(session.is_connection_released());
            assert_eq!(session.pending_timer_count(), 0);
            assert_eq!(f.transport.count(&channel(), &TransportEvent::Closed), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_break_boundary_effects() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            advance(61).await;
            assert!(!session.is_ambient_looping());
            assert_eq!(f.sink.count_containing("minutes are up"), 1);
            assert_eq!(f.transport.played(&channel()), vec!["lofi", "bell"]);

            advance(60).await;
            assert_eq!(f.sink.count_containing("Break is over"), 1);
            assert_eq!(f.transport.played(&channel()), vec!["lofi", "bell", "bell"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_no_ambient_never_plays_during_focus() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();

            advance(30).await;
            assert!(!session.is_ambient_looping());
            assert!(f.transport.played(&channel()).is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_end_hook_runs_once_on_natural_end() {
            let f = fixture();
            let session = Session::connect(params(None), &f.ctx).await.unwrap();
            let ended = Arc::new(Mutex::new(Vec::new()));
            let ended_hook = Arc::clone(&ended);
            session.set_on_end(Box::new(move |id| ended_hook.lock().push(id)));
            session.begin();

            advance(121 + DRAIN_GRACE.as_secs()).await;
            assert_eq!(*ended.lock(), vec![session.id()]);
            assert!(!session.stop());
            assert_eq!(ended.lock().len(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_begin_twice_is_noop() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();
            session.begin();

            assert_eq!(session.pending_timer_count(), 1);
            assert_eq!(f.sink.count_containing("Pomodoro started"), 1);
        }
    }

    mod construction_tests {
        use super::*;

        #[tokio::test]
        async fn test_invalid_duration_never_connects() {
            let f = fixture();
            let mut p = params(None);
            p.work_minutes = 0.0;

            let result = Session::start(p, &f.ctx).await;
            assert!(matches!(result, Err(SessionError::InvalidDuration(_))));
            assert!(f.transport.events().is_empty());
            assert_eq!(f.sink.message_count(), 0);
        }

        #[tokio::test]
        async fn test_connection_failure() {
            let f = fixture();
            f.transport.set_should_fail_connect(true);

            let result = Session::start(params(Some("lofi")), &f.ctx).await;
            assert!(matches!(result, Err(SessionError::Connection(_))));
            assert_eq!(f.sink.message_count(), 0);
        }

        #[tokio::test]
        async fn test_connect_sends_nothing_until_begin() {
            let f = fixture();
            let session = Session::connect(params(Some("lofi")), &f.ctx).await.unwrap();

            assert_eq!(session.phase(), None);
            assert!(session.snapshot().is_none());
            assert_eq!(f.sink.message_count(), 0);
            assert!(f.transport.played(&channel()).is_empty());
        }
    }

    mod stop_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_stop_in_focus_cancels_everything() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            advance(10).await;
            assert!(session.stop());
            let messages_at_stop = f.sink.message_count();

            assert!(session.is_ended());
            assert_eq!(session.pending_timer_count(), 0);
            assert!(session.is_connection_released());

            advance(600).await;
            assert_eq!(f.sink.message_count(), messages_at_stop);
            assert_eq!(f.transport.played(&channel()), vec!["lofi"]);
            assert_eq!(f.transport.count(&channel(), &TransportEvent::Closed), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_in_break_and_draining() {
            for wait in [70, 122] {
                let f = fixture();
                let session = Session::start(params(None), &f.ctx).await.unwrap();

                advance(wait).await;
                let messages = f.sink.message_count();
                assert!(session.stop());

                advance(600).await;
                assert_eq!(f.sink.message_count(), messages);
                assert_eq!(f.transport.count(&channel(), &TransportEvent::Closed), 1);
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_twice_tears_down_once() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();

            assert!(session.stop());
            assert!(!session.stop());
            assert_eq!(f.transport.count(&channel(), &TransportEvent::Closed), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_during_natural_end_releases_connection() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();

            // Ended but not yet torn down, as inside the final transition.
            session.inner.state.lock().lifecycle = Lifecycle::Ended;
            assert!(!session.is_connection_released());

            assert!(!session.stop());
            assert!(session.is_connection_released());
            assert_eq!(f.transport.count(&channel(), &TransportEvent::Closed), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_before_begin() {
            let f = fixture();
            let session = Session::connect(params(Some("lofi")), &f.ctx).await.unwrap();

            assert!(session.stop());
            session.begin();

            assert!(f.transport.played(&channel()).is_empty());
            assert_eq!(f.sink.message_count(), 0);
            assert_eq!(session.pending_timer_count(), 0);
        }
    }

    mod playback_race_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_loop_in_flight_at_boundary_does_not_leak_into_break() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            for _ in 0..3 {
                advance(10).await;
                f.transport.finish_playback(&channel());
            }
            advance(1).await;
            assert_eq!(f.transport.played(&channel()), vec!["lofi"; 4]);

            advance(30).await;
            assert_eq!(session.phase(), Some(SessionPhase::Break));
            assert!(!session.is_ambient_looping());

            // Only the notification sound is still in flight.
            assert_eq!(f.transport.finish_playback(&channel()), 1);
            advance(30).await;

            let played = f.transport.played(&channel());
            assert_eq!(played.iter().filter(|id| *id == "lofi").count(), 4);
            assert_eq!(played.last().map(String::as_str), Some("bell"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_loop_completion_after_stop_does_not_restart() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            f.transport.finish_playback(&channel());
            session.stop();
            advance(1).await;

            assert_eq!(f.transport.played(&channel()), vec!["lofi"]);
        }
    }

    mod missing_resource_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_missing_ambient_warns_and_continues_in_silence() {
            let f = fixture();
            let session = Session::start(params(Some("rain")), &f.ctx).await.unwrap();

            assert_eq!(session.phase(), Some(SessionPhase::Focus));
            assert!(!session.is_ambient_looping());
            assert_eq!(f.sink.count_containing("'rain' is not available"), 1);
            assert_eq!(f.sink.count_containing("Pomodoro started"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_notify_sound_warns_at_each_boundary() {
            let f = fixture();
            f.catalog.remove("bell");
            let session = Session::start(params(None), &f.ctx).await.unwrap();

            advance(121).await;
            assert_eq!(session.phase(), Some(SessionPhase::Draining));
            assert_eq!(f.sink.count_containing("'bell' is not available"), 2);

            advance(DRAIN_GRACE.as_secs()).await;
            assert!(session.is_ended());
        }

        #[tokio::test(start_paused = true)]
        async fn test_ambient_file_gone_mid_focus_warns_once() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            f.catalog.remove("lofi");
            f.transport.finish_playback(&channel());
            advance(1).await;

            assert_eq!(session.phase(), Some(SessionPhase::Focus));
            assert!(!session.is_ambient_looping());
            assert_eq!(f.sink.count_containing("'lofi' is not available"), 1);
            assert_eq!(f.transport.played(&channel()), vec!["lofi"]);

            advance(60).await;
            assert_eq!(session.phase(), Some(SessionPhase::Break));
            assert_eq!(f.sink.count_containing("'lofi' is not available"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_notify_file_gone_after_resolve_warns() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();
            f.transport.set_file_missing("bell", true);

            advance(61).await;
            assert_eq!(session.phase(), Some(SessionPhase::Break));
            assert_eq!(f.sink.count_containing("'bell' is not available"), 1);
            assert!(f.transport.played(&channel()).is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_transport_failure_mid_session_is_not_fatal() {
            let f = fixture();
            let session = Session::start(params(None), &f.ctx).await.unwrap();
            f.transport.set_should_fail_play(true);

            advance(61).await;
            assert_eq!(session.phase(), Some(SessionPhase::Break));
            assert_eq!(f.sink.count_containing("minutes are up"), 1);
        }
    }

    mod snapshot_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_snapshot_tracks_phase() {
            let f = fixture();
            let session = Session::start(params(Some("lofi")), &f.ctx).await.unwrap();

            let snapshot = session.snapshot().unwrap();
            assert_eq!(snapshot.phase, SessionPhase::Focus);
            assert_eq!(snapshot.user_id, UserId::from("u1"));
            assert_eq!(snapshot.ambient_sound.as_deref(), Some("lofi"));
            assert_eq!(snapshot.notify_sound, "bell");
            assert_eq!(snapshot.session_id, session.id());

            advance(61).await;
            assert_eq!(session.snapshot().unwrap().phase, SessionPhase::Break);

            session.stop();
            assert!(session.snapshot().is_none());
        }
    }
}
