//! User → session map enforcing one session per user.
//!
//! A `start` reserves the user's slot before the voice connection is opened
//! so a second `start` for the same user fails immediately with
//! `AlreadyActive`, and other users are never blocked by a slow connect.
//! The map lock is never held while a session runs its own code.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::SessionError;
use super::machine::{Session, SessionContext, SessionParams};
use crate::types::{SessionSnapshot, UserId};

enum Entry {
    /// Connection being opened. `aborted` is set by a `stop` that arrives
    /// in the meantime.
    Starting { aborted: bool },
    Active(Session),
}

struct RegistryInner {
    ctx: SessionContext,
    sessions: Mutex<HashMap<UserId, Entry>>,
    /// Signalled whenever a removal leaves the map empty.
    idle: Notify,
}

impl RegistryInner {
    /// Removes the user's entry if it still belongs to `session_id`.
    fn remove_if(&self, user: &UserId, session_id: Uuid) {
        let mut sessions = self.sessions.lock();
        if matches!(sessions.get(user), Some(Entry::Active(s)) if s.id() == session_id) {
            sessions.remove(user);
            debug!(user = %user, session_id = %session_id, "Session deregistered");
            self.signal_if_idle(&sessions);
        }
    }

    fn signal_if_idle(&self, sessions: &HashMap<UserId, Entry>) {
        if sessions.is_empty() {
            self.idle.notify_waiters();
        }
    }
}

/// Removes a `Starting` entry if `start` is abandoned before it finishes.
struct Reservation<'a> {
    inner: &'a RegistryInner,
    user: UserId,
    armed: bool,
}

impl Reservation<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut sessions = self.inner.sessions.lock();
        if matches!(sessions.get(&self.user), Some(Entry::Starting { .. })) {
            sessions.remove(&self.user);
            self.inner.signal_if_idle(&sessions);
        }
    }
}

/// Owns every live session.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                ctx,
                sessions: Mutex::new(HashMap::new()),
                idle: Notify::new(),
            }),
        }
    }

    /// Starts a session for `params.user_id`.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if the user has a session (or one is starting);
    ///   the existing session is not touched.
    /// - `InvalidDuration` / `Connection` from construction; nothing is
    ///   registered.
    /// - `StartAborted` if `stop` was called for the user while the
    ///   connection was being opened; the connection is released.
    pub async fn start(&self, params: SessionParams) -> Result<Session, SessionError> {
        let user = params.user_id.clone();
        {
            let mut sessions = self.inner.sessions.lock();
            if sessions.contains_key(&user) {
                return Err(SessionError::AlreadyActive(user));
            }
            sessions.insert(user.clone(), Entry::Starting { aborted: false });
        }
        let mut reservation = Reservation {
            inner: &self.inner,
            user: user.clone(),
            armed: true,
        };

        let session = Session::connect(params, &self.inner.ctx).await?;

        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let hook_user = user.clone();
        session.set_on_end(Box::new(move |session_id| {
            if let Some(inner) = weak.upgrade() {
                inner.remove_if(&hook_user, session_id);
            }
        }));

        let aborted = {
            let mut sessions = self.inner.sessions.lock();
            match sessions.remove(&user) {
                Some(Entry::Starting { aborted: false }) => {
                    sessions.insert(user.clone(), Entry::Active(session.clone()));
                    false
                }
                _ => {
                    self.inner.signal_if_idle(&sessions);
                    true
                }
            }
        };
        reservation.disarm();

        if aborted {
            info!(user = %user, "Start aborted by stop during connect");
            session.stop();
            return Err(SessionError::StartAborted(user));
        }

        session.begin();
        Ok(session)
    }

    /// Stops the user's session.
    ///
    /// A session that is still connecting is marked so its `start` releases
    /// the connection instead of beginning.
    ///
    /// # Errors
    ///
    /// `NoActiveSession` if the user has no session; nothing else happens.
    pub fn stop(&self, user: &UserId) -> Result<(), SessionError> {
        let session = {
            let mut sessions = self.inner.sessions.lock();
            match sessions.remove(user) {
                Some(Entry::Active(session)) => {
                    self.inner.signal_if_idle(&sessions);
                    session
                }
                Some(Entry::Starting { aborted: false }) => {
                    sessions.insert(user.clone(), Entry::Starting { aborted: true });
                    debug!(user = %user, "Stop requested while connecting");
                    return Ok(());
                }
                Some(starting @ Entry::Starting { aborted: true }) => {
                    sessions.insert(user.clone(), starting);
                    return Err(SessionError::NoActiveSession(user.clone()));
                }
                None => return Err(SessionError::NoActiveSession(user.clone())),
            }
        };

        session.stop();
        Ok(())
    }

    /// Status of the user's session. Never mutates.
    #[must_use]
    pub fn get(&self, user: &UserId) -> Option<SessionSnapshot> {
        let session = match self.inner.sessions.lock().get(user) {
            Some(Entry::Active(session)) => session.clone(),
            _ => return None,
        };
        session.snapshot()
    }

    /// Returns true if the user has a running or connecting session.
    #[must_use]
    pub fn is_active(&self, user: &UserId) -> bool {
        matches!(
            self.inner.sessions.lock().get(user),
            Some(Entry::Active(_) | Entry::Starting { aborted: false })
        )
    }

    /// Number of registered sessions, including ones still connecting.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Resolves once no session is registered, including ones still
    /// connecting.
    pub async fn wait_until_idle(&self) {
        loop {
            // Created before the check so a removal in between is not missed.
            let notified = self.inner.idle.notified();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stops every session. Returns how many running sessions were stopped.
    pub fn stop_all(&self) -> usize {
        let sessions: Vec<Session> = {
            let mut map = self.inner.sessions.lock();
            for entry in map.values_mut() {
                if let Entry::Starting { aborted } = entry {
                    *aborted = true;
                }
            }
            let users: Vec<UserId> = map
                .iter()
                .filter(|(_, entry)| matches!(entry, Entry::Active(_)))
                .map(|(user, _)| user.clone())
                .collect();
            let stopped: Vec<Session> = users
                .into_iter()
                .filter_map(|user| match map.remove(&user) {
                    Some(Entry::Active(session)) => Some(session),
                    _ => None,
                })
                .collect();
            self.inner.signal_if_idle(&map);
            stopped
        };

        for session in &sessions {
            session.stop();
        }
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Stopped all sessions");
        }
        sessions.len()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.active_count())
            .finish()
    }
}
