//! Pomodoro sessions.
//!
//! - [`Session`] runs one user's `Focus → Break → Draining` cycle and owns
//!   its timers and voice connection.
//! - [`SessionRegistry`] maps users to sessions, one per user.
//! - [`AudioSettingsStore`] keeps each user's sound choices between
//!   sessions.

mod error;
mod machine;
mod registry;
mod settings;

pub use error::SessionError;
pub use machine::{Session, SessionContext, SessionParams, DRAIN_GRACE};
pub use registry::SessionRegistry;
pub use settings::{AudioSettings, AudioSettingsStore};
