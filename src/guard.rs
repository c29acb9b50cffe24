//! Single-send alert guard.
//!
//! A small state machine enforcing "at most one automatically-triggered
//! notification per cooldown window". The guard owns two states, `Ready` and
//! `AlertSent`, with exactly three transitions:
//!
//! - [`AlertGuard::try_trigger`] — `Ready → AlertSent`, arming a one-shot
//!   reset timer. Concurrent callers race through one mutex; exactly one
//!   observes [`TriggerDecision::Fired`].
//! - [`AlertGuard::reset`] — explicit re-arm, cancelling the pending timer.
//! - Timer expiry — implicit re-arm after the cooldown window.
//!
//! The guard never performs the notification dispatch itself; the caller
//! dispatches after `try_trigger` returns `Fired`, outside the critical
//! section, so dispatcher callbacks re-entering guard logic cannot deadlock.
//! Manual alerts bypass the guard entirely and are handled a level above.
//!
//! Every transition publishes a [`GuardStatus`] projection (sent flag plus
//! time remaining until re-arm) on a `watch` channel for observers to render.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Default cooldown window before the guard re-arms itself.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Outcome of an automatic trigger attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The guard transitioned to `AlertSent`; the caller must dispatch the
    /// notification exactly once.
    Fired,
    /// An alert was already sent this window; the trigger was suppressed.
    Suppressed,
}

/// Observer projection of the guard state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuardStatus {
    /// Whether an automatic alert has been sent this window.
    pub sent: bool,
    /// Time remaining until the guard re-arms, clamped to zero.
    pub remaining: Duration,
}

struct GuardState {
    sent: bool,
    sent_at: Option<Instant>,
    reset_task: Option<JoinHandle<()>>,
}

/// Debounce guard over the automatic notification path.
pub struct AlertGuard {
    state: Arc<Mutex<GuardState>>,
    status_tx: Arc<watch::Sender<GuardStatus>>,
    cooldown: Duration,
}

impl AlertGuard {
    /// Create a guard in the `Ready` state with the given cooldown window.
    pub fn new(cooldown: Duration) -> Self {
        let (status_tx, _) = watch::channel(GuardStatus::default());
        Self {
            state: Arc::new(Mutex::new(GuardState {
                sent: false,
                sent_at: None,
                reset_task: None,
            })),
            status_tx: Arc::new(status_tx),
            cooldown,
        }
    }

    /// Subscribe to guard state transitions.
    pub fn subscribe(&self) -> watch::Receiver<GuardStatus> {
        self.status_tx.subscribe()
    }

    /// Attempt an automatic trigger.
    ///
    /// The state check, transition, timestamp record, and timer re-arm all
    /// happen under one critical section, so no two concurrent callers can
    /// both win. Must be called from within a Tokio runtime (the reset timer
    /// is a spawned task).
    pub fn try_trigger(&self) -> TriggerDecision {
        let mut state = self.state.lock();
        if state.sent {
            debug!("Alert already sent this window; suppressing automatic trigger");
            return TriggerDecision::Suppressed;
        }

        state.sent = true;
        state.sent_at = Some(Instant::now());
        // Cancel-and-reschedule: the timer must never double-fire.
        if let Some(task) = state.reset_task.take() {
            task.abort();
        }
        state.reset_task = Some(self.spawn_reset_timer());
        self.publish(&state);

        TriggerDecision::Fired
    }

    /// Re-arm the guard, cancelling any pending reset timer.
    ///
    /// Called explicitly when the user cancels an in-flight notification or
    /// the dispatcher reports a hard failure, and implicitly by the timer.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if let Some(task) = state.reset_task.take() {
            task.abort();
        }
        state.sent = false;
        state.sent_at = None;
        self.publish(&state);
        debug!("Alert guard re-armed");
    }

    /// Current state projection.
    pub fn status(&self) -> GuardStatus {
        let state = self.state.lock();
        self.project(&state)
    }

    /// Configured cooldown window.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn spawn_reset_timer(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let status_tx = Arc::clone(&self.status_tx);
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let mut state = state.lock();
            state.sent = false;
            state.sent_at = None;
            state.reset_task = None;
            status_tx.send_replace(GuardStatus::default());
            debug!("Alert guard re-armed after cooldown");
        })
    }

    fn project(&self, state: &GuardState) -> GuardStatus {
        let remaining = match (state.sent, state.sent_at) {
            (true, Some(sent_at)) => self.cooldown.saturating_sub(sent_at.elapsed()),
            _ => Duration::ZERO,
        };
        GuardStatus {
            sent: state.sent,
            remaining,
        }
    }

    fn publish(&self, state: &GuardState) {
        self.status_tx.send_replace(self.project(state));
    }
}

impl Drop for AlertGuard {
    fn drop(&mut self) {
        if let Some(task) = self.state.lock().reset_task.take() {
            task.abort();
        }
    }
}
