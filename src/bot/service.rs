//! Entry points used by the chat command layer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BotConfig;
use crate::session::{
    AudioSettings, AudioSettingsStore, Session, SessionContext, SessionError, SessionParams,
    SessionRegistry,
};
use crate::sound::{SoundCatalog, SoundError};
use crate::types::{validate_minutes, ChannelRef, NotifyTarget, SessionSnapshot, UserId};

/// Keyword that clears the ambient sound.
pub const AMBIENT_OFF: &str = "off";

/// Facade over the registry, the settings store and the sound catalog.
pub struct PomodoroService {
    registry: SessionRegistry,
    settings: AudioSettingsStore,
    catalog: Arc<dyn SoundCatalog>,
    default_work_minutes: f64,
    default_break_minutes: f64,
}

impl PomodoroService {
    #[must_use]
    pub fn new(config: &BotConfig, ctx: SessionContext) -> Self {
        let catalog = Arc::clone(&ctx.catalog);
        Self {
            registry: SessionRegistry::new(ctx),
            settings: AudioSettingsStore::new(config.default_notify_sound.clone()),
            catalog,
            default_work_minutes: config.default_work_minutes,
            default_break_minutes: config.default_break_minutes,
        }
    }

    /// Starts a pomodoro for `user` with their configured sounds.
    ///
    /// Omitted durations fall back to the configured defaults. Durations
    /// are validated here so an invalid request never reaches the registry.
    pub async fn start(
        &self,
        user: &UserId,
        work_minutes: Option<f64>,
        break_minutes: Option<f64>,
        channel: ChannelRef,
        notify_target: NotifyTarget,
    ) -> Result<SessionSnapshot, SessionError> {
        let work_minutes = work_minutes.unwrap_or(self.default_work_minutes);
        let break_minutes = break_minutes.unwrap_or(self.default_break_minutes);
        validate_minutes(work_minutes)?;
        validate_minutes(break_minutes)?;

        let AudioSettings {
            ambient_sound,
            notify_sound,
        } = self.settings.get(user);

        let session = self
            .registry
            .start(SessionParams {
                user_id: user.clone(),
                work_minutes,
                break_minutes,
                ambient_sound,
                notify_sound,
                channel,
                notify_target,
            })
            .await?;

        started_snapshot(&session)
    }

    pub fn stop(&self, user: &UserId) -> Result<(), SessionError> {
        self.registry.stop(user)
    }

    #[must_use]
    pub fn status(&self, user: &UserId) -> Option<SessionSnapshot> {
        self.registry.get(user)
    }

    /// Sets the ambient sound, or clears it with `None`.
    ///
    /// Returns the stored identifier (catalog spelling). Applies to the
    /// next session, not a running one.
    pub fn configure_ambient(
        &self,
        user: &UserId,
        sound_id: Option<&str>,
    ) -> Result<Option<String>, SessionError> {
        let sound = match sound_id {
            Some(sound_id) => Some(self.known_sound(sound_id)?),
            None => None,
        };
        self.settings.set_ambient(user, sound.clone());
        info!(user = %user, ambient = ?sound, "Ambient sound configured");
        Ok(sound)
    }

    /// Sets the notification sound. Returns the stored identifier.
    pub fn configure_notify(&self, user: &UserId, sound_id: &str) -> Result<String, SessionError> {
        let sound = self.known_sound(sound_id)?;
        self.settings.set_notify(user, sound.clone());
        info!(user = %user, notify = %sound, "Notification sound configured");
        Ok(sound)
    }

    /// Identifiers in the sound catalog, sorted.
    pub fn list_available_sounds(&self) -> Result<Vec<String>, SoundError> {
        self.catalog.list()
    }

    #[must_use]
    pub fn settings(&self, user: &UserId) -> AudioSettings {
        self.settings.get(user)
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Stops every running session.
    pub fn shutdown(&self) -> usize {
        self.registry.stop_all()
    }

    fn known_sound(&self, sound_id: &str) -> Result<String, SessionError> {
        match self.catalog.resolve(sound_id) {
            Ok(resource) => Ok(resource.id),
            Err(SoundError::NotFound(_)) => Err(SessionError::UnknownSound(sound_id.to_string())),
            Err(e) => {
                warn!("Sound catalog unavailable: {}", e);
                Err(SessionError::UnknownSound(sound_id.to_string()))
            }
        }
    }
}

/// Status of a session `start` just began. A `stop` that slipped in right
/// after it began counts as aborting the start.
fn started_snapshot(session: &Session) -> Result<SessionSnapshot, SessionError> {
    session
        .snapshot()
        .ok_or_else(|| SessionError::StartAborted(session.user_id().clone()))
}

impl std::fmt::Debug for PomodoroService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PomodoroService")
            .field("registry", &self.registry)
            .field("default_work_minutes", &self.default_work_minutes)
            .field("default_break_minutes", &self.default_break_minutes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::notify::MockNotificationSink;
    use crate::scheduler::TimerScheduler;
    use crate::sound::{MockSoundCatalog, MockVoiceTransport};
    use crate::types::{DurationError, SessionPhase};

    struct Fixture {
        service: PomodoroService,
        transport: MockVoiceTransport,
        sink: Arc<MockNotificationSink>,
    }

    fn fixture() -> Fixture {
        let transport = MockVoiceTransport::new();
        let sink = Arc::new(MockNotificationSink::new());
        let ctx = SessionContext {
            scheduler: TimerScheduler::new(),
            transport: Arc::new(transport.clone()),
            catalog: Arc::new(MockSoundCatalog::with_sounds(&["bell", "chime", "lofi"])),
            sink: sink.clone(),
            connect_timeout: Duration::from_secs(5),
            command_prefix: "!pomodoro".to_string(),
        };
        Fixture {
            service: PomodoroService::new(&BotConfig::default(), ctx),
            transport,
            sink,
        }
    }

    fn user() -> UserId {
        UserId::from("u1")
    }

    async fn start(f: &Fixture, work: Option<f64>, brk: Option<f64>) -> Result<SessionSnapshot, SessionError> {
        f.service
            .start(
                &user(),
                work,
                brk,
                ChannelRef::from("voice"),
                NotifyTarget::from("text"),
            )
            .await
    }

    mod start_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_defaults_fill_missing_durations() {
            let f = fixture();
            let snapshot = start(&f, None, None).await.unwrap();

            assert_eq!(snapshot.work_minutes, 25.0);
            assert_eq!(snapshot.break_minutes, 5.0);
            assert_eq!(snapshot.notify_sound, "bell");
            assert_eq!(snapshot.ambient_sound, None);
        }

        #[tokio::test(start_paused = true)]
        async fn test_only_break_omitted() {
            let f = fixture();
            let snapshot = start(&f, Some(50.0), None).await.unwrap();

            assert_eq!(snapshot.work_minutes, 50.0);
            assert_eq!(snapshot.break_minutes, 5.0);
        }

        #[tokio::test]
        async fn test_invalid_duration_never_reaches_registry() {
            let f = fixture();
            let result = start(&f, Some(0.0), None).await;

            assert_eq!(
                result.err(),
                Some(SessionError::InvalidDuration(DurationError::NotPositive(0.0)))
            );
            assert!(f.transport.events().is_empty());
            assert_eq!(f.service.registry().active_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_uses_configured_sounds() {
            let f = fixture();
            f.service.configure_ambient(&user(), Some("lofi")).unwrap();
            f.service.configure_notify(&user(), "chime").unwrap();

            let snapshot = start(&f, Some(1.0), Some(1.0)).await.unwrap();
            assert_eq!(snapshot.ambient_sound.as_deref(), Some("lofi"));
            assert_eq!(snapshot.notify_sound, "chime");

            tokio::time::sleep(Duration::from_secs(61)).await;
            let played = f.transport.played(&ChannelRef::from("voice"));
            assert_eq!(played, vec!["lofi", "chime"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_stop_right_after_begin_is_aborted_start() {
            let transport = MockVoiceTransport::new();
            let ctx = SessionContext {
                scheduler: TimerScheduler::new(),
                transport: Arc::new(transport.clone()),
                catalog: Arc::new(MockSoundCatalog::with_sounds(&["bell"])),
                sink: Arc::new(MockNotificationSink::new()),
                connect_timeout: Duration::from_secs(5),
                command_prefix: "!pomodoro".to_string(),
            };
            let params = SessionParams {
                user_id: user(),
                work_minutes: 1.0,
                break_minutes: 1.0,
                ambient_sound: None,
                notify_sound: "bell".to_string(),
                channel: ChannelRef::from("voice"),
                notify_target: NotifyTarget::from("text"),
            };
            let session = Session::start(params, &ctx).await.unwrap();
            assert_eq!(
                started_snapshot(&session).unwrap().phase,
                SessionPhase::Focus
            );

            session.stop();
            assert_eq!(
                started_snapshot(&session),
                Err(SessionError::StartAborted(user()))
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_status_and_stop() {
            let f = fixture();
            start(&f, Some(1.0), Some(1.0)).await.unwrap();

            assert_eq!(f.service.status(&user()).unwrap().phase, SessionPhase::Focus);
            f.service.stop(&user()).unwrap();
            assert!(f.service.status(&user()).is_none());
            assert_eq!(
                f.service.stop(&user()),
                Err(SessionError::NoActiveSession(user()))
            );
            assert_eq!(f.sink.count_containing("Pomodoro started"), 1);
        }
    }

    mod settings_tests {
        use super::*;

        #[tokio::test]
        async fn test_unknown_sound_rejected() {
            let f = fixture();

            assert_eq!(
                f.service.configure_ambient(&user(), Some("rain")),
                Err(SessionError::UnknownSound("rain".to_string()))
            );
            assert_eq!(
                f.service.configure_notify(&user(), "gong"),
                Err(SessionError::UnknownSound("gong".to_string()))
            );
            assert_eq!(f.service.settings(&user()).ambient_sound, None);
            assert_eq!(f.service.settings(&user()).notify_sound, "bell");
        }

        #[tokio::test]
        async fn test_ambient_cleared() {
            let f = fixture();
            f.service.configure_ambient(&user(), Some("lofi")).unwrap();

            assert_eq!(f.service.configure_ambient(&user(), None), Ok(None));
            assert_eq!(f.service.settings(&user()).ambient_sound, None);
        }

        #[tokio::test]
        async fn test_list_available_sounds() {
            let f = fixture();
            assert_eq!(
                f.service.list_available_sounds().unwrap(),
                vec!["bell", "chime", "lofi"]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_shutdown_stops_sessions() {
            let f = fixture();
            start(&f, None, None).await.unwrap();

            assert_eq!(f.service.shutdown(), 1);
            assert_eq!(f.service.registry().active_count(), 0);
        }
    }
}
