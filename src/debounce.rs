//! Debounced auto-run state machine.
//!
//! The machine owns no clock. Scheduling hands out a [`Ticket`]; whoever owns
//! the timer (a tokio sleep, a browser `setTimeout`) presents the ticket back
//! when the delay elapses. Rescheduling or cancelling invalidates earlier
//! tickets, so a stale timer firing is a no-op.

use std::time::Duration;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Handle for one scheduled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending(Ticket),
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    enabled: bool,
    state: DebounceState,
    next_ticket: u64,
}

impl Debouncer {
    pub fn new(delay: Duration, enabled: bool) -> Self {
        Self {
            delay,
            enabled,
            state: DebounceState::Idle,
            next_ticket: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending(_))
    }

    /// An edit happened. Returns the ticket the caller should arm a timer
    /// with, or `None` while auto-run is off.
    pub fn on_edit(&mut self) -> Option<Ticket> {
        if !self.enabled {
            return None;
        }
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.state = DebounceState::Pending(ticket);
        Some(ticket)
    }

    /// The timer for `ticket` elapsed. Returns `true` when the run should
    /// happen; the machine is idle afterwards either way for current tickets.
    pub fn on_timer(&mut self, ticket: Ticket) -> bool {
        match self.state {
            DebounceState::Pending(current) if current == ticket && self.enabled => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop any pending run without firing it.
    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    /// Turning auto-run off cancels a pending run and stops scheduling.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY, true)
    }
}
