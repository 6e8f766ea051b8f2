//! Sound playback for pomodoro sessions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  PlaybackController  │ ← one per session
//! └───┬──────────────┬───┘
//!     │              │
//!     ▼              ▼
//! ┌──────────┐  ┌────────────────────┐
//! │  Sound   │  │  VoiceTransport /  │
//! │ Catalog  │  │  VoiceConnection   │
//! └──────────┘  └────────────────────┘
//!  id → file      open / play / stop / close
//! ```
//!
//! - [`SoundCatalog`] resolves identifiers to files (`DirectorySoundCatalog`
//!   scans a directory).
//! - [`VoiceTransport`] opens outbound audio connections
//!   (`LocalAudioTransport` plays on the local output device).
//! - [`PlaybackController`] loops ambient sound and plays one-shot
//!   notification sounds on a single connection.

mod catalog;
mod error;
mod local;
mod playback;
mod transport;

pub use catalog::{DirectorySoundCatalog, MockSoundCatalog, SoundCatalog, SoundResource};
pub use error::{PlaybackError, SoundError};
pub use local::LocalAudioTransport;
pub use playback::PlaybackController;
pub use transport::{
    MockVoiceTransport, PlaybackDone, PlaybackEnd, TransportEvent, VoiceConnection,
    VoiceTransport,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_module_exports() {
        let _: fn(&str) -> DirectorySoundCatalog = |dir| DirectorySoundCatalog::new(dir);
        let _: Arc<dyn SoundCatalog> = Arc::new(MockSoundCatalog::new());
        let _: Arc<dyn VoiceTransport> = Arc::new(MockVoiceTransport::new());
        let _: Arc<dyn VoiceTransport> = Arc::new(LocalAudioTransport::new());
    }

    #[test]
    fn test_sound_resource_constructor() {
        let sound = SoundResource::new("bell", "/sounds/bell.wav");
        assert_eq!(sound.id, "bell");
        assert!(sound.path.ends_with("bell.wav"));
    }
}
