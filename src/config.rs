//! Host configuration.

use crate::debounce::DEFAULT_DELAY;
use crate::relay::OriginPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How a composed document reaches the frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    /// Inject the markup as the frame's `srcdoc`.
    #[default]
    SrcDoc,
    /// Navigate the frame to a base64 `data:` URL.
    DataUrl,
}

/// Configuration for a sandbox host
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Quiet period after the last edit before an auto-run fires (default: 300ms)
    pub debounce: Duration,
    /// srcdoc injection or data-URL navigation (default: srcdoc)
    pub load_strategy: LoadStrategy,
    /// Which inbound messages reach the logs (default: this view's channel only)
    pub origin_policy: OriginPolicy,
    /// Where native hosts keep buffers and settings
    pub store_path: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DELAY,
            load_strategy: LoadStrategy::SrcDoc,
            origin_policy: OriginPolicy::Channel,
            store_path: PathBuf::from(".code-sandbox.json"),
        }
    }
}
