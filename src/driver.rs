//! Tokio timer for the auto-run debounce, for native hosts.
//!
//! Everything runs on one task: the caller `select!`s between its own input
//! and [`AutoRunDriver::next_run`], so state transitions stay serialised.

use crate::buffers::BufferKind;
use crate::debounce::Ticket;
use crate::error::Result;
use crate::session::{PreviewFrame, Sandbox};
use crate::storage::KeyValueStore;
use std::time::Duration;
use tokio::time::Instant;

/// A single re-armable deadline.
#[derive(Debug)]
pub struct RunTimer {
    delay: Duration,
    armed: Option<(Instant, Ticket)>,
}

impl RunTimer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, armed: None }
    }

    /// Arm for `ticket`, replacing any earlier deadline.
    pub fn arm(&mut self, ticket: Ticket) {
        self.armed = Some((Instant::now() + self.delay, ticket));
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Resolves with the armed ticket once its deadline passes; never
    /// resolves while disarmed. Cancel-safe.
    pub async fn expired(&mut self) -> Ticket {
        match self.armed {
            Some((deadline, ticket)) => {
                tokio::time::sleep_until(deadline).await;
                self.armed = None;
                ticket
            }
            None => std::future::pending().await,
        }
    }
}

/// A [`Sandbox`] plus the timer its debounce needs.
pub struct AutoRunDriver<S, F> {
    sandbox: Sandbox<S, F>,
    timer: RunTimer,
}

impl<S: KeyValueStore, F: PreviewFrame> AutoRunDriver<S, F> {
    /// Wrap a freshly mounted view, arming the timer if its first run is
    /// already scheduled.
    pub fn new(sandbox: Sandbox<S, F>) -> Self {
        let mut timer = RunTimer::new(sandbox.delay());
        if let Some(ticket) = sandbox.pending() {
            timer.arm(ticket);
        }
        Self { sandbox, timer }
    }

    pub fn edit(&mut self, kind: BufferKind, source: impl Into<String>) -> Result<()> {
        if let Some(ticket) = self.sandbox.edit(kind, source)? {
            self.timer.arm(ticket);
        }
        Ok(())
    }

    pub fn set_auto_run(&mut self, enabled: bool) -> Result<()> {
        self.sandbox.set_auto_run(enabled)?;
        if !enabled {
            self.timer.disarm();
        }
        Ok(())
    }

    /// Restore the default buffers; with auto-run on their run is armed.
    pub fn reset(&mut self) -> Result<()> {
        match self.sandbox.reset()? {
            Some(ticket) => self.timer.arm(ticket),
            None => self.timer.disarm(),
        }
        Ok(())
    }

    /// Manual run; any pending auto-run is dropped.
    pub fn run(&mut self) -> Result<()> {
        self.timer.disarm();
        self.sandbox.run()?;
        Ok(())
    }

    /// Wait for the armed deadline and fire it. `Ok(true)` when a run
    /// happened, `Ok(false)` when the ticket had gone stale.
    pub async fn next_run(&mut self) -> Result<bool> {
        let ticket = self.timer.expired().await;
        self.sandbox.fire(ticket)
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn sandbox(&self) -> &Sandbox<S, F> {
        &self.sandbox
    }

    pub fn sandbox_mut(&mut self) -> &mut Sandbox<S, F> {
        &mut self.sandbox
    }

    pub fn into_inner(self) -> Sandbox<S, F> {
        self.sandbox
    }
}
