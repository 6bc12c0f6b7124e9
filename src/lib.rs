//! # Code Sandbox
//!
//! Core of an HTML/CSS/JS playground: three source buffers are composed into
//! one document, loaded into an isolated frame, and whatever the document
//! logs or throws is relayed back into two ordered logs.
//!
//! ## Pieces
//!
//! - **Composer** ([`compose_document`]): buffers plus a console/error shim
//!   into a single document. Pure, no escaping of user input.
//! - **Frame** ([`PreviewFrame`]): where the document runs. Every run
//!   replaces the frame content wholesale.
//! - **Relay** ([`MessageRelay`]): `{ type, message, channel }` messages into
//!   the console or error log, in arrival order.
//! - **Debounce** ([`Debouncer`]): edits schedule a run 300ms later; newer
//!   edits cancel older schedules.
//!
//! Isolation is whatever the frame gives. This is not a security boundary
//! against hostile code.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use code_sandbox::{BufferKind, MemoryFrame, MemoryStore, Sandbox, SandboxConfig, SandboxMessage};
//!
//! let mut sandbox = Sandbox::mount(&SandboxConfig::default(), MemoryStore::new(), MemoryFrame::new())?;
//! sandbox.edit(BufferKind::Js, "console.log('x')")?;
//! sandbox.run()?;
//!
//! // Later, when the frame posts back:
//! let channel = sandbox.channel().clone();
//! sandbox.receive(&SandboxMessage::console("x").on_channel(&channel));
//! assert_eq!(sandbox.logs().console, vec!["x"]);
//! ```

mod buffers;
mod compose;
mod config;
mod debounce;
#[cfg(not(target_arch = "wasm32"))]
mod driver;
mod error;
mod export;
mod message;
mod relay;
mod session;
mod settings;
mod storage;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use buffers::{BufferKind, SourceBuffers, DEFAULT_CSS, DEFAULT_HTML, DEFAULT_JS};
pub use compose::{compose_document, Document, BASE_STYLE};
pub use config::{LoadStrategy, SandboxConfig};
pub use debounce::{DebounceState, Debouncer, Ticket, DEFAULT_DELAY};
#[cfg(not(target_arch = "wasm32"))]
pub use driver::{AutoRunDriver, RunTimer};
pub use error::{Result, SandboxError};
pub use export::{export_archive, export_file, FileExport, ARCHIVE_NAME};
pub use message::{describe, ChannelToken, MessageKind, SandboxMessage};
pub use relay::{ConsoleOutput, Delivery, MessageRelay, OriginPolicy};
pub use session::{LoadedDocument, MemoryFrame, PreviewFrame, Sandbox};
pub use settings::{FontSize, Settings, SyntaxTheme, Theme};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
