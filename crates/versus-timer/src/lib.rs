//! Cancellable round timers for Versus rooms.
//!
//! A room has at most two timers in flight: the voting deadline and the
//! reveal window. Neither touches room state. When one expires it posts an
//! event into the room's own command queue, so expiries are handled in the
//! same serial order as client commands.
//!
//! # Stale expiries
//!
//! Aborting a timer task does not recall an expiry that was already queued.
//! Every scheduled timer therefore carries a generation number, and the room
//! asks [`RoundTimer::fire`] whether an expiry is still current before acting
//! on it:
//!
//! ```ignore
//! RoomCommand::TimerFired(fired) => {
//!     if !self.timers.fire(&fired) {
//!         return; // superseded or cancelled
//!     }
//!     match fired.kind { /* ... */ }
//! }
//! ```
//!
//! Timer tasks hold only a weak sender, so a pending timer never keeps a
//! room alive after its last handle is dropped.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace};

/// Which of a room's two timers an expiry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Ends the voting phase.
    VotingDeadline,
    /// Ends the reveal phase and advances to the next level.
    RevealWindow,
}

/// An expiry, delivered through the room's command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    /// Generation assigned when the timer was scheduled.
    pub generation: u64,
}

/// Identifies one scheduled timer so it can be cancelled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub generation: u64,
}

struct Armed {
    generation: u64,
    task: JoinHandle<()>,
}

/// The voting and reveal timers of one room.
///
/// Scheduling a kind that is already armed replaces it. Dropping the
/// `RoundTimer` aborts anything still pending.
pub struct RoundTimer<E: Send + 'static> {
    tx: mpsc::WeakSender<E>,
    voting: Option<Armed>,
    reveal: Option<Armed>,
    next_generation: u64,
}

impl<E: Send + 'static> RoundTimer<E> {
    /// Creates timers that post into the queue behind `tx`.
    pub fn new(tx: &mpsc::Sender<E>) -> Self {
        Self {
            tx: tx.downgrade(),
            voting: None,
            reveal: None,
            next_generation: 0,
        }
    }

    /// Arms `kind` to expire after `delay`.
    ///
    /// `make` turns the expiry into the queue's event type. Any timer of
    /// the same kind that is still pending is cancelled first.
    pub fn schedule_after<F>(&mut self, kind: TimerKind, delay: Duration, make: F) -> TimerToken
    where
        F: FnOnce(TimerFired) -> E + Send + 'static,
    {
        self.cancel_kind(kind);

        self.next_generation += 1;
        let generation = self.next_generation;
        let weak = self.tx.clone();

        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            let Some(tx) = weak.upgrade() else {
                trace!(?kind, generation, "timer expired after its room closed");
                return;
            };
            if tx.send(make(TimerFired { kind, generation })).await.is_err() {
                trace!(?kind, generation, "room queue closed before timer delivery");
            }
        });

        debug!(?kind, generation, delay_ms = delay.as_millis() as u64, "timer armed");
        *self.slot_mut(kind) = Some(Armed { generation, task });
        TimerToken { kind, generation }
    }

    /// Claims an expiry that came out of the queue.
    ///
    /// Returns `true` if it belongs to the currently armed timer of its
    /// kind, which is then disarmed. Returns `false` for expiries that were
    /// superseded or cancelled after they were queued.
    pub fn fire(&mut self, fired: &TimerFired) -> bool {
        let slot = self.slot_mut(fired.kind);
        if slot
            .as_ref()
            .is_some_and(|armed| armed.generation == fired.generation)
        {
            *slot = None;
            return true;
        }
        debug!(
            kind = ?fired.kind,
            generation = fired.generation,
            "ignoring stale timer expiry"
        );
        false
    }

    /// Cancels the timer identified by `token` if it is still armed.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        let slot = self.slot_mut(token.kind);
        if !slot
            .as_ref()
            .is_some_and(|armed| armed.generation == token.generation)
        {
            return false;
        }
        if let Some(armed) = slot.take() {
            armed.task.abort();
        }
        true
    }

    /// Cancels whatever timer of `kind` is armed.
    pub fn cancel_kind(&mut self, kind: TimerKind) -> bool {
        match self.slot_mut(kind).take() {
            Some(armed) => {
                armed.task.abort();
                trace!(?kind, generation = armed.generation, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels both timers.
    pub fn cancel_all(&mut self) {
        self.cancel_kind(TimerKind::VotingDeadline);
        self.cancel_kind(TimerKind::RevealWindow);
    }

    /// Whether a timer of `kind` is waiting to expire or to be claimed.
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::VotingDeadline => self.voting.is_some(),
            TimerKind::RevealWindow => self.reveal.is_some(),
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<Armed> {
        match kind {
            TimerKind::VotingDeadline => &mut self.voting,
            TimerKind::RevealWindow => &mut self.reveal,
        }
    }
}

impl<E: Send + 'static> Drop for RoundTimer<E> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
