//! Message relay: routes inbound sandbox messages into the two logs.
//!
//! Order is arrival order. No deduplication, filtering or rate limiting
//! happens here; a chatty script grows the logs without bound.

use crate::message::{ChannelToken, MessageKind, SandboxMessage};
use serde::{Deserialize, Serialize};

/// Captured output of the current run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleOutput {
    pub console: Vec<String>,
    pub errors: Vec<String>,
}

impl ConsoleOutput {
    pub fn clear(&mut self) {
        self.console.clear();
        self.errors.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.console.is_empty() && self.errors.is_empty()
    }

    pub fn get(&self, kind: MessageKind) -> &[String] {
        match kind {
            MessageKind::Console => &self.console,
            MessageKind::Error => &self.errors,
        }
    }

    fn push(&mut self, kind: MessageKind, text: String) {
        match kind {
            MessageKind::Console => self.console.push(text),
            MessageKind::Error => self.errors.push(text),
        }
    }
}

/// Which senders the relay listens to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginPolicy {
    /// Only messages stamped with the current run's channel token.
    #[default]
    Channel,
    /// Every well-formed message, whoever posted it.
    Any,
}

/// What the relay did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Appended(MessageKind),
    /// Stamped with another channel, or unstamped under [`OriginPolicy::Channel`].
    ForeignChannel,
}

/// Routes messages for one mounted view.
///
/// Every run gets its own token derived from the view token, so a replaced
/// document that keeps posting (timers, late promises) is dropped instead of
/// landing in the next run's logs.
#[derive(Debug, Clone)]
pub struct MessageRelay {
    view: ChannelToken,
    channel: ChannelToken,
    policy: OriginPolicy,
}

impl MessageRelay {
    pub fn new(view: ChannelToken, policy: OriginPolicy) -> Self {
        Self {
            channel: view.clone(),
            view,
            policy,
        }
    }

    /// Switch to the token of run number `run` and return it.
    pub fn begin_run(&mut self, run: u64) -> &ChannelToken {
        self.channel = self.view.for_run(run);
        &self.channel
    }

    /// The token the current run's document stamps on its messages.
    pub fn channel(&self) -> &ChannelToken {
        &self.channel
    }

    pub fn view(&self) -> &ChannelToken {
        &self.view
    }

    pub fn policy(&self) -> OriginPolicy {
        self.policy
    }

    pub fn accepts(&self, message: &SandboxMessage) -> bool {
        match self.policy {
            OriginPolicy::Any => true,
            OriginPolicy::Channel => message.channel.as_ref() == Some(&self.channel),
        }
    }

    /// Append `message` to `output` if the policy admits it.
    pub fn deliver(&self, output: &mut ConsoleOutput, message: &SandboxMessage) -> Delivery {
        if !self.accepts(message) {
            tracing::debug!(
                expected = %self.channel,
                got = ?message.channel,
                "dropping message from foreign channel"
            );
            return Delivery::ForeignChannel;
        }

        let text = message.text();
        tracing::debug!(kind = ?message.kind, %text, "relayed sandbox message");
        output.push(message.kind, text);
        Delivery::Appended(message.kind)
    }
}
