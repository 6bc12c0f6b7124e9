//! The three source buffers a user edits.

use crate::error::Result;
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HTML: &str = "<h1>Hello, world!</h1>";
pub const DEFAULT_CSS: &str = "body { font-family: sans-serif; }";
pub const DEFAULT_JS: &str = r#"console.log("Hello, Sandbox!");"#;

/// Which buffer an edit, export or storage key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    Html,
    Css,
    Js,
}

impl BufferKind {
    pub const ALL: [BufferKind; 3] = [BufferKind::Html, BufferKind::Css, BufferKind::Js];

    /// Persistent storage key for this buffer.
    pub fn storage_key(self) -> &'static str {
        match self {
            BufferKind::Html => "sandbox-html",
            BufferKind::Css => "sandbox-css",
            BufferKind::Js => "sandbox-js",
        }
    }

    /// File name used for downloads and on-disk project directories.
    pub fn file_name(self) -> &'static str {
        match self {
            BufferKind::Html => "index.html",
            BufferKind::Css => "styles.css",
            BufferKind::Js => "script.js",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            BufferKind::Html => "text/html",
            BufferKind::Css => "text/css",
            BufferKind::Js => "application/javascript",
        }
    }

    pub fn default_source(self) -> &'static str {
        match self {
            BufferKind::Html => DEFAULT_HTML,
            BufferKind::Css => DEFAULT_CSS,
            BufferKind::Js => DEFAULT_JS,
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferKind::Html => "html",
            BufferKind::Css => "css",
            BufferKind::Js => "js",
        })
    }
}

impl FromStr for BufferKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(BufferKind::Html),
            "css" => Ok(BufferKind::Css),
            "js" | "javascript" => Ok(BufferKind::Js),
            other => Err(format!("unknown buffer '{}': expected html, css or js", other)),
        }
    }
}

/// HTML, CSS and JS sources. The three are independent; nothing here
/// validates one against another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBuffers {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Default for SourceBuffers {
    fn default() -> Self {
        Self {
            html: DEFAULT_HTML.to_string(),
            css: DEFAULT_CSS.to_string(),
            js: DEFAULT_JS.to_string(),
        }
    }
}

impl SourceBuffers {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    pub fn get(&self, kind: BufferKind) -> &str {
        match kind {
            BufferKind::Html => &self.html,
            BufferKind::Css => &self.css,
            BufferKind::Js => &self.js,
        }
    }

    pub fn set(&mut self, kind: BufferKind, source: impl Into<String>) {
        let slot = match kind {
            BufferKind::Html => &mut self.html,
            BufferKind::Css => &mut self.css,
            BufferKind::Js => &mut self.js,
        };
        *slot = source.into();
    }

    /// Load all three buffers, falling back to the default for any key that
    /// is absent or empty.
    pub fn load(store: &impl KeyValueStore) -> Result<Self> {
        let mut buffers = Self::default();
        for kind in BufferKind::ALL {
            if let Some(saved) = store.get(kind.storage_key())? {
                if !saved.is_empty() {
                    buffers.set(kind, saved);
                }
            }
        }
        Ok(buffers)
    }

    /// Mirror one buffer to storage.
    pub fn persist(&self, kind: BufferKind, store: &mut impl KeyValueStore) -> Result<()> {
        store.set(kind.storage_key(), self.get(kind))
    }

    /// Restore defaults and drop the persisted copies.
    pub fn reset(&mut self, store: &mut impl KeyValueStore) -> Result<()> {
        *self = Self::default();
        for kind in BufferKind::ALL {
            store.remove(kind.storage_key())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_load_defaults_when_empty() {
        let store = MemoryStore::new();
        let buffers = SourceBuffers::load(&store).unwrap();
        assert_eq!(buffers, SourceBuffers::default());
    }

    #[test]
    fn test_load_ignores_empty_saved_value() {
        let mut store = MemoryStore::new();
        store.set("sandbox-css", "").unwrap();
        store.set("sandbox-js", "alert(1)").unwrap();

        let buffers = SourceBuffers::load(&store).unwrap();
        assert_eq!(buffers.css, DEFAULT_CSS);
        assert_eq!(buffers.js, "alert(1)");
        assert_eq!(buffers.html, DEFAULT_HTML);
    }

    #[test]
    fn test_persist_writes_only_named_buffer() {
        let mut store = MemoryStore::new();
        let mut buffers = SourceBuffers::default();
        buffers.set(BufferKind::Html, "<p>hi</p>");
        buffers.persist(BufferKind::Html, &mut store).unwrap();

        assert_eq!(store.get("sandbox-html").unwrap().as_deref(), Some("<p>hi</p>"));
        assert_eq!(store.get("sandbox-css").unwrap(), None);
    }

    #[test]
    fn test_reset_removes_keys() {
        let mut store = MemoryStore::new();
        let mut buffers = SourceBuffers::new("a", "b", "c");
        for kind in BufferKind::ALL {
            buffers.persist(kind, &mut store).unwrap();
        }

        buffers.reset(&mut store).unwrap();
        assert_eq!(buffers, SourceBuffers::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("JS".parse::<BufferKind>().unwrap(), BufferKind::Js);
        assert_eq!("javascript".parse::<BufferKind>().unwrap(), BufferKind::Js);
        assert!("python".parse::<BufferKind>().is_err());
    }
}
