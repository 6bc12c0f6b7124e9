//! The host view: owns every piece of mutable playground state.
//!
//! Buffers, settings, logs and the pending-run state live in [`Sandbox`] and
//! change only through its methods. Frames and storage are injected so the
//! same state machine drives the browser host and native hosts.

use crate::buffers::{BufferKind, SourceBuffers};
use crate::compose::{compose_document, Document};
use crate::config::{LoadStrategy, SandboxConfig};
use crate::debounce::{DebounceState, Debouncer, Ticket};
use crate::error::Result;
use crate::export::{export_archive, export_file, FileExport};
use crate::message::{ChannelToken, SandboxMessage};
use crate::relay::{ConsoleOutput, Delivery, MessageRelay};
use crate::settings::{FontSize, Settings, SyntaxTheme, Theme};
use crate::storage::KeyValueStore;
use tracing::{debug, info};

/// The isolated browsing context a composed document is loaded into.
///
/// `load` replaces the whole content of the frame; whatever the previous
/// document was still doing is discarded with it.
pub trait PreviewFrame {
    fn load(&mut self, document: &Document, strategy: LoadStrategy) -> Result<()>;
}

impl<T: PreviewFrame + ?Sized> PreviewFrame for &mut T {
    fn load(&mut self, document: &Document, strategy: LoadStrategy) -> Result<()> {
        (**self).load(document, strategy)
    }
}

/// One document as it was handed to a [`MemoryFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub strategy: LoadStrategy,
    /// Markup for `SrcDoc`, the `data:` URL for `DataUrl`.
    pub payload: String,
    pub digest: String,
}

/// Frame that keeps what it was given instead of rendering it. Native hosts
/// forward these to whatever renders them.
#[derive(Debug, Default, Clone)]
pub struct MemoryFrame {
    loads: Vec<LoadedDocument>,
}

impl MemoryFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loads(&self) -> &[LoadedDocument] {
        &self.loads
    }

    pub fn latest(&self) -> Option<&LoadedDocument> {
        self.loads.last()
    }

    pub fn drain(&mut self) -> Vec<LoadedDocument> {
        std::mem::take(&mut self.loads)
    }
}

impl PreviewFrame for MemoryFrame {
    fn load(&mut self, document: &Document, strategy: LoadStrategy) -> Result<()> {
        let payload = match strategy {
            LoadStrategy::SrcDoc => document.as_srcdoc().to_string(),
            LoadStrategy::DataUrl => document.to_data_url()?,
        };
        self.loads.push(LoadedDocument {
            strategy,
            payload,
            digest: document.digest(),
        });
        Ok(())
    }
}

/// A mounted playground view.
pub struct Sandbox<S, F> {
    store: S,
    frame: F,
    strategy: LoadStrategy,
    buffers: SourceBuffers,
    settings: Settings,
    output: ConsoleOutput,
    debouncer: Debouncer,
    relay: MessageRelay,
    document: Option<Document>,
    runs: u64,
}

impl<S: KeyValueStore, F: PreviewFrame> Sandbox<S, F> {
    /// Mount a view with a fresh channel token.
    pub fn mount(config: &SandboxConfig, store: S, frame: F) -> Result<Self> {
        Self::mount_on_channel(config, store, frame, ChannelToken::generate())
    }

    /// Mount a view, loading buffers and settings from `store`.
    ///
    /// With auto-run enabled the first run is scheduled immediately, so the
    /// preview fills in one debounce delay after mount.
    pub fn mount_on_channel(
        config: &SandboxConfig,
        store: S,
        frame: F,
        channel: ChannelToken,
    ) -> Result<Self> {
        let buffers = SourceBuffers::load(&store)?;
        let settings = Settings::load(&store)?;
        let mut debouncer = Debouncer::new(config.debounce, settings.auto_run);
        debouncer.on_edit();

        info!(%channel, auto_run = settings.auto_run, "mounted sandbox view");

        Ok(Self {
            store,
            frame,
            strategy: config.load_strategy,
            buffers,
            settings,
            output: ConsoleOutput::default(),
            debouncer,
            relay: MessageRelay::new(channel, config.origin_policy),
            document: None,
            runs: 0,
        })
    }

    /// Replace one buffer, mirror it to storage, and schedule an auto-run.
    ///
    /// Returns the ticket to arm a timer with, or `None` when auto-run is
    /// off.
    pub fn edit(&mut self, kind: BufferKind, source: impl Into<String>) -> Result<Option<Ticket>> {
        self.buffers.set(kind, source);
        self.buffers.persist(kind, &mut self.store)?;
        let ticket = self.debouncer.on_edit();
        debug!(%kind, scheduled = ticket.is_some(), "buffer edited");
        Ok(ticket)
    }

    /// Compose and load immediately, bypassing the debounce.
    ///
    /// Both logs are cleared before the frame reloads, and the document is
    /// stamped with a fresh run token so the previous one can no longer
    /// write to them.
    pub fn run(&mut self) -> Result<&Document> {
        self.debouncer.cancel();
        self.output.clear();

        let channel = self.relay.begin_run(self.runs + 1);
        let document = compose_document(&self.buffers, channel);
        self.frame.load(&document, self.strategy)?;
        self.runs += 1;

        info!(
            run = self.runs,
            digest = %document.digest(),
            bytes = document.len(),
            strategy = ?self.strategy,
            "reloaded preview"
        );

        let document = self.document.insert(document);
        Ok(&*document)
    }

    /// A debounce timer elapsed. Runs only if `ticket` is still current.
    pub fn fire(&mut self, ticket: Ticket) -> Result<bool> {
        if !self.debouncer.on_timer(ticket) {
            debug!(ticket = ticket.id(), "ignoring stale timer");
            return Ok(false);
        }
        self.run()?;
        Ok(true)
    }

    pub fn set_auto_run(&mut self, enabled: bool) -> Result<()> {
        self.settings.set_auto_run(enabled, &mut self.store)?;
        self.debouncer.set_enabled(enabled);
        Ok(())
    }

    pub fn toggle_auto_run(&mut self) -> Result<bool> {
        let enabled = !self.settings.auto_run;
        self.set_auto_run(enabled)?;
        Ok(enabled)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.settings.set_theme(theme, &mut self.store)
    }

    pub fn set_font_size(&mut self, size: FontSize) -> Result<()> {
        self.settings.set_font_size(size, &mut self.store)
    }

    pub fn set_syntax_theme(&mut self, theme: SyntaxTheme) -> Result<()> {
        self.settings.set_syntax_theme(theme, &mut self.store)
    }

    /// Relay one inbound message into the logs.
    pub fn receive(&mut self, message: &SandboxMessage) -> Delivery {
        self.relay.deliver(&mut self.output, message)
    }

    /// Relay a message from its JSON text. Anything that is not a well-formed
    /// message is ignored.
    pub fn receive_raw(&mut self, raw: &str) -> Option<Delivery> {
        match SandboxMessage::parse(raw) {
            Ok(message) => Some(self.receive(&message)),
            Err(e) => {
                debug!(error = %e, "ignoring malformed message");
                None
            }
        }
    }

    /// Put the default code back, forget the saved copies, and clear logs.
    ///
    /// Counts as an edit of all three buffers: with auto-run on, the default
    /// document is scheduled like any other change.
    pub fn reset(&mut self) -> Result<Option<Ticket>> {
        self.buffers.reset(&mut self.store)?;
        self.output.clear();
        let ticket = self.debouncer.on_edit();
        info!(scheduled = ticket.is_some(), "buffers reset to defaults");
        Ok(ticket)
    }

    pub fn export_file(&self, kind: BufferKind) -> FileExport {
        export_file(&self.buffers, kind)
    }

    pub fn export_archive(&self) -> Result<FileExport> {
        export_archive(&self.buffers)
    }

    pub fn buffers(&self) -> &SourceBuffers {
        &self.buffers
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn logs(&self) -> &ConsoleOutput {
        &self.output
    }

    /// The most recently loaded document.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Token of the current run; messages stamped otherwise are foreign.
    pub fn channel(&self) -> &ChannelToken {
        self.relay.channel()
    }

    /// Ticket of the scheduled run, if one is pending.
    pub fn pending(&self) -> Option<Ticket> {
        match self.debouncer.state() {
            DebounceState::Pending(ticket) => Some(ticket),
            DebounceState::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn delay(&self) -> std::time::Duration {
        self.debouncer.delay()
    }

    pub fn run_count(&self) -> u64 {
        self.runs
    }

    pub fn frame(&self) -> &F {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut F {
        &mut self.frame
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::DEFAULT_HTML;
    use crate::message::MessageKind;
    use crate::relay::OriginPolicy;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn mount(store: MemoryStore) -> Sandbox<MemoryStore, MemoryFrame> {
        Sandbox::mount_on_channel(
            &SandboxConfig::default(),
            store,
            MemoryFrame::new(),
            ChannelToken::from("view-1"),
        )
        .unwrap()
    }

    /// What the shim posts for `console.log(text)`.
    fn console(sandbox: &Sandbox<MemoryStore, MemoryFrame>, text: &str) -> SandboxMessage {
        SandboxMessage::console(text).on_channel(sandbox.channel())
    }

    #[test]
    fn test_mount_loads_persisted_state() {
        let mut store = MemoryStore::new();
        store.set("sandbox-js", "go()").unwrap();
        store.set("autoRun", "false").unwrap();

        let sandbox = mount(store);
        assert_eq!(sandbox.buffers().js, "go()");
        assert_eq!(sandbox.buffers().html, DEFAULT_HTML);
        assert!(!sandbox.settings().auto_run);
        assert!(!sandbox.is_pending());
    }

    #[test]
    fn test_mount_schedules_first_run_when_auto() {
        let mut sandbox = mount(MemoryStore::new());
        let ticket = sandbox.pending().unwrap();
        assert!(sandbox.fire(ticket).unwrap());
        assert_eq!(sandbox.frame().loads().len(), 1);
    }

    #[test]
    fn test_edit_persists_and_schedules() {
        let mut sandbox = mount(MemoryStore::new());
        let ticket = sandbox.edit(BufferKind::Css, "p {}").unwrap();

        assert!(ticket.is_some());
        assert_eq!(sandbox.store().get("sandbox-css").unwrap().as_deref(), Some("p {}"));
        assert_eq!(sandbox.pending(), ticket);
    }

    #[test]
    fn test_console_scenario() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.edit(BufferKind::Html, "<p>hi</p>").unwrap();
        sandbox.edit(BufferKind::Css, "").unwrap();
        sandbox.edit(BufferKind::Js, "console.log('x')").unwrap();
        sandbox.run().unwrap();

        let loaded = sandbox.frame().latest().unwrap();
        assert!(loaded.payload.contains("console.log('x')"));

        let message = console(&sandbox, "x");
        sandbox.receive(&message);

        assert_eq!(sandbox.logs().console, vec!["x"]);
        assert!(sandbox.logs().errors.is_empty());
    }

    #[test]
    fn test_thrown_error_scenario() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.edit(BufferKind::Js, "throw new Error('boom')").unwrap();
        sandbox.run().unwrap();

        let raw = format!(
            r#"{{"type":"error","message":"Error: boom\n    at about:srcdoc:61:7","channel":"{}"}}"#,
            sandbox.channel()
        );
        assert_eq!(sandbox.receive_raw(&raw), Some(Delivery::Appended(MessageKind::Error)));

        assert_eq!(sandbox.logs().errors.len(), 1);
        assert!(sandbox.logs().errors[0].contains("boom"));
        assert!(sandbox.logs().console.is_empty());
    }

    #[test]
    fn test_run_clears_logs_first() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.run().unwrap();
        let message = console(&sandbox, "old");
        sandbox.receive(&message);
        let error = SandboxMessage::error("old").on_channel(sandbox.channel());
        sandbox.receive(&error);
        assert_eq!(sandbox.logs().errors, vec!["old"]);

        sandbox.run().unwrap();
        assert!(sandbox.logs().is_empty());
    }

    #[test]
    fn test_console_calls_keep_order() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.run().unwrap();
        for text in ["1", "2", "3"] {
            let message = console(&sandbox, text);
            sandbox.receive(&message);
        }
        assert_eq!(sandbox.logs().console, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_auto_run_off_suppresses_until_manual_run() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.set_auto_run(false).unwrap();
        assert!(!sandbox.is_pending());

        for i in 0..10 {
            assert_eq!(sandbox.edit(BufferKind::Js, format!("n = {}", i)).unwrap(), None);
        }
        assert!(sandbox.frame().loads().is_empty());

        sandbox.run().unwrap();
        assert_eq!(sandbox.frame().loads().len(), 1);
        assert!(sandbox.frame().latest().unwrap().payload.contains("n = 9"));

        assert!(sandbox.toggle_auto_run().unwrap());
        assert!(sandbox.edit(BufferKind::Js, "n = 10").unwrap().is_some());
        assert_eq!(sandbox.store().get("autoRun").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_manual_run_cancels_pending() {
        let mut sandbox = mount(MemoryStore::new());
        let ticket = sandbox.edit(BufferKind::Html, "<i>x</i>").unwrap().unwrap();
        sandbox.run().unwrap();

        assert!(!sandbox.fire(ticket).unwrap());
        assert_eq!(sandbox.run_count(), 1);
    }

    #[test]
    fn test_foreign_channel_ignored_by_default() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.run().unwrap();

        let stray = SandboxMessage::console("stray").on_channel(&ChannelToken::from("view-2"));
        assert_eq!(sandbox.receive(&stray), Delivery::ForeignChannel);
        assert!(sandbox.receive_raw("{not json").is_none());
        assert!(sandbox.logs().is_empty());
    }

    #[test]
    fn test_previous_run_cannot_reach_new_logs() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.run().unwrap();
        let first = sandbox.channel().clone();
        assert!(sandbox.frame().latest().unwrap().payload.contains(first.as_str()));

        sandbox.run().unwrap();
        assert_ne!(sandbox.channel(), &first);

        let stale = SandboxMessage::console("stale").on_channel(&first);
        assert_eq!(sandbox.receive(&stale), Delivery::ForeignChannel);
        assert!(sandbox.logs().is_empty());

        let fresh = console(&sandbox, "fresh");
        sandbox.receive(&fresh);
        assert_eq!(sandbox.logs().console, vec!["fresh"]);
    }

    #[test]
    fn test_any_origin_policy() {
        let config = SandboxConfig {
            origin_policy: OriginPolicy::Any,
            ..Default::default()
        };
        let mut sandbox = Sandbox::mount(&config, MemoryStore::new(), MemoryFrame::new()).unwrap();
        sandbox.receive(&SandboxMessage::console("anyone"));
        assert_eq!(sandbox.logs().console, vec!["anyone"]);
    }

    #[test]
    fn test_data_url_strategy() {
        let config = SandboxConfig {
            load_strategy: LoadStrategy::DataUrl,
            ..Default::default()
        };
        let mut sandbox = Sandbox::mount(&config, MemoryStore::new(), MemoryFrame::new()).unwrap();
        sandbox.run().unwrap();

        let loaded = sandbox.frame().latest().unwrap();
        assert!(loaded.payload.starts_with("data:text/html;charset=utf-8;base64,"));
        assert_eq!(loaded.digest, sandbox.document().unwrap().digest());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.edit(BufferKind::Html, "<p>mine</p>").unwrap();
        sandbox.run().unwrap();
        let message = console(&sandbox, "x");
        sandbox.receive(&message);

        let ticket = sandbox.reset().unwrap().unwrap();
        assert_eq!(sandbox.buffers(), &SourceBuffers::default());
        assert_eq!(sandbox.store().get("sandbox-html").unwrap(), None);
        assert!(sandbox.logs().is_empty());

        assert_eq!(sandbox.pending(), Some(ticket));
        assert!(sandbox.fire(ticket).unwrap());
        assert_eq!(sandbox.frame().loads().len(), 2);
        let latest = &sandbox.frame().latest().unwrap().payload;
        assert!(latest.contains(DEFAULT_HTML));
        assert!(!latest.contains("<p>mine</p>"));
    }

    #[test]
    fn test_reset_with_auto_run_off_waits_for_manual_run() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.set_auto_run(false).unwrap();
        assert_eq!(sandbox.reset().unwrap(), None);
        assert!(!sandbox.is_pending());
    }

    #[test]
    fn test_settings_persist_through_view() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.set_theme(Theme::Light).unwrap();
        sandbox.set_font_size(FontSize::Small).unwrap();
        sandbox.set_syntax_theme(SyntaxTheme::Monokai).unwrap();

        let reloaded = Settings::load(sandbox.store()).unwrap();
        assert_eq!(reloaded.theme, Theme::Light);
        assert_eq!(reloaded.font_size, FontSize::Small);
        assert_eq!(reloaded.syntax_theme, SyntaxTheme::Monokai);
    }

    #[test]
    fn test_exports_current_buffers() {
        let mut sandbox = mount(MemoryStore::new());
        sandbox.edit(BufferKind::Js, "go()").unwrap();
        assert_eq!(sandbox.export_file(BufferKind::Js).bytes, b"go()");
        assert_eq!(sandbox.export_archive().unwrap().file_name, "sandbox-files.zip");
    }
}
