//! The message contract between a sandboxed document and its host.
//!
//! The shim inside the frame posts objects of the shape
//!
//! ```json
//! { "type": "console" | "error", "message": <value>, "channel": "<token>" }
//! ```
//!
//! to its parent. `message` is normalised by the shim into a JSON-safe value
//! before posting; the host turns it into log text with [`describe`].
//!
//! ## String conversion
//!
//! [`describe`] is total and defined as:
//!
//! | value            | text                                          |
//! |------------------|-----------------------------------------------|
//! | string           | the string itself                             |
//! | number           | as `Number.prototype.toString`: plain decimal, exponent form outside `[1e-6, 1e21)` |
//! | boolean          | `true` / `false`                              |
//! | null             | `null`                                        |
//! | missing          | `undefined`                                   |
//! | array / object   | compact JSON, keys in the order they arrived  |
//!
//! Values the shim cannot express as JSON (errors, functions, symbols,
//! bigints, non-finite numbers, cyclic objects) are converted to strings in
//! the frame: errors to their stack, falling back to `String(e)`; the rest to
//! `String(v)`.

use crate::error::{Result, SandboxError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Discriminator of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Console,
    Error,
}

/// Identifies one mounted sandbox view, or one run of it. Stamped on every
/// message by the shim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelToken(String);

impl ChannelToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Token for run number `run` of this view. Documents from earlier runs
    /// carry a different token, so their late messages can be told apart.
    pub fn for_run(&self, run: u64) -> Self {
        Self(format!("{}-{}", self.0, run))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChannelToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ChannelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One message posted by a sandboxed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// `None` when the field was absent (`undefined` in the frame), as opposed
    /// to `Some(Value::Null)`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelToken>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl SandboxMessage {
    pub fn console(message: impl Into<Value>) -> Self {
        Self {
            kind: MessageKind::Console,
            message: Some(message.into()),
            channel: None,
        }
    }

    pub fn error(message: impl Into<Value>) -> Self {
        Self {
            kind: MessageKind::Error,
            message: Some(message.into()),
            channel: None,
        }
    }

    pub fn on_channel(mut self, channel: &ChannelToken) -> Self {
        self.channel = Some(channel.clone());
        self
    }

    /// Parse a message from its JSON text.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| SandboxError::InvalidMessage(e.to_string()))
    }

    /// Interpret an already-decoded value, e.g. the `data` of a message event.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| SandboxError::InvalidMessage(e.to_string()))
    }

    /// The log text this message contributes.
    pub fn text(&self) -> String {
        match &self.message {
            Some(value) => describe(value),
            None => String::from("undefined"),
        }
    }
}

/// Convert a payload into log text. See the module docs for the rules.
pub fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::from("null"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => describe_number(n),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn describe_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => String::from("0"),
        Some(f) if f.abs() >= 1e21 || f.abs() < 1e-6 => exponent_form(f),
        Some(f) if f.fract() == 0.0 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// `1e21` as `1e+21`, `1e-7` as `1e-7`.
fn exponent_form(f: f64) -> String {
    let shortest = format!("{:e}", f);
    match shortest.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => shortest,
    }
}
