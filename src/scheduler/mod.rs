//! Cancellable single-fire deferred callbacks.
//!
//! Every session transition is driven by a [`TimerHandle`] issued here.
//! Each timer is a tokio task sleeping until its deadline; the callback
//! itself sits in a per-timer slot guarded by a mutex, and both firing and
//! cancelling go through that slot:
//!
//! - firing takes the callback out of the slot and runs it while the slot
//!   is still locked;
//! - cancelling locks the slot, drops the callback if it is still pending
//!   and aborts the sleeping task.
//!
//! So `cancel` either wins (the callback never runs) or returns only after
//! the callback has finished, never in between.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::debug;

/// Boxed timer callback.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    /// Id of the timer whose callback is running on this thread, if any.
    static FIRING: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Returns the id of the timer whose callback is running on this thread.
pub fn firing_timer_id() -> Option<u64> {
    FIRING.with(|firing| firing.get())
}

// ============================================================================
// TimerHandle
// ============================================================================

enum SlotState {
    Pending(TimerCallback),
    Fired,
    Cancelled,
}

struct TimerSlot {
    state: Mutex<SlotState>,
    task: Mutex<Option<AbortHandle>>,
}

/// Handle to one scheduled callback.
///
/// Cloning the handle does not duplicate the timer; all clones refer to the
/// same callback.
#[derive(Clone)]
pub struct TimerHandle {
    id: u64,
    slot: Arc<TimerSlot>,
}

impl TimerHandle {
    /// Returns the scheduler-unique id of this timer.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancels the timer.
    ///
    /// Returns `true` if this call prevented the callback from running, and
    /// `false` if it had already fired or been cancelled. If the callback is
    /// running on another thread, this waits for it to finish. Calling it
    /// from inside the timer's own callback is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        if firing_timer_id() == Some(self.id) {
            return false;
        }

        let mut state = self.slot.state.lock();
        if !matches!(*state, SlotState::Pending(_)) {
            return false;
        }
        *state = SlotState::Cancelled;
        drop(state);

        if let Some(task) = self.slot.task.lock().take() {
            task.abort();
        }
        debug!(timer_id = self.id, "Timer cancelled");
        true
    }

    /// Returns true while the callback has neither fired nor been cancelled.
    pub fn is_pending(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Pending(_))
    }

    /// Returns true once the callback has been run.
    pub fn has_fired(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Fired)
    }

    /// Returns true if the timer was cancelled before firing.
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Cancelled)
    }

    fn fire(&self) {
        let mut state = self.slot.state.lock();
        let callback = match std::mem::replace(&mut *state, SlotState::Fired) {
            SlotState::Pending(callback) => callback,
            other => {
                *state = other;
                return;
            }
        };

        debug!(timer_id = self.id, "Timer fired");
        FIRING.with(|firing| firing.set(Some(self.id)));
        callback();
        FIRING.with(|firing| firing.set(None));
        drop(state);

        self.slot.task.lock().take();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.slot.state.lock() {
            SlotState::Pending(_) => "pending",
            SlotState::Fired => "fired",
            SlotState::Cancelled => "cancelled",
        };
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

// ============================================================================
// TimerScheduler
// ============================================================================

/// Issues cancellable, single-fire deferred callbacks.
#[derive(Clone)]
pub struct TimerScheduler {
    runtime: Handle,
    next_id: Arc<AtomicU64>,
}

impl TimerScheduler {
    /// Creates a scheduler bound to the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    /// Creates a scheduler that spawns its timers on `runtime`.
    ///
    /// `schedule` may then be called from any thread.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Schedules `callback` to run once after `delay`.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TimerHandle {
            id,
            slot: Arc::new(TimerSlot {
                state: Mutex::new(SlotState::Pending(Box::new(callback))),
                task: Mutex::new(None),
            }),
        };

        let firing = handle.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            firing.fire();
        });

        // Only store the abort handle if the timer has not already resolved.
        let mut slot_task = handle.slot.task.lock();
        if handle.is_pending() {
            *slot_task = Some(task.abort_handle());
        }
        drop(slot_task);

        debug!(timer_id = id, delay_ms = delay.as_millis() as u64, "Timer scheduled");
        handle
    }

    /// Cancels `handle`. See [`TimerHandle::cancel`].
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        handle.cancel()
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
