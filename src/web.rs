//! Browser host, compiled only for `wasm32`.
//!
//! Wires [`Sandbox`] to a real `<iframe>`, `window.localStorage`, the
//! window's `message` event and `setTimeout`. Exported to JS as
//! `WebPlayground`.

use crate::buffers::BufferKind;
use crate::compose::Document;
use crate::config::{LoadStrategy, SandboxConfig};
use crate::debounce::Ticket;
use crate::error::{Result, SandboxError};
use crate::export::FileExport;
use crate::session::{PreviewFrame, Sandbox};
use crate::settings::{FontSize, SyntaxTheme, Theme};
use crate::storage::KeyValueStore;
use js_sys::{Array, Function, Uint8Array};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlAnchorElement, HtmlIFrameElement, MessageEvent, Storage, Window};

/// Attribute set on the preview frame: scripts run, but in their own context.
pub const FRAME_SANDBOX: &str = "allow-scripts allow-same-origin";

fn js_error(context: &str, value: JsValue) -> SandboxError {
    let detail = value.as_string().unwrap_or_else(|| format!("{:?}", value));
    SandboxError::Frame(format!("{}: {}", context, detail))
}

fn to_js(err: SandboxError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| SandboxError::Frame("no global window".into()))
}

/// `window.localStorage` as a [`KeyValueStore`].
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<Self> {
        let storage = window()?
            .local_storage()
            .map_err(|e| SandboxError::StorageUnavailable(format!("{:?}", e)))?
            .ok_or_else(|| SandboxError::StorageUnavailable("localStorage is disabled".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| SandboxError::StorageUnavailable(format!("{:?}", e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| SandboxError::StorageUnavailable(format!("{:?}", e)))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| SandboxError::StorageUnavailable(format!("{:?}", e)))
    }
}

/// The preview `<iframe>`.
pub struct IframeFrame {
    element: HtmlIFrameElement,
}

impl IframeFrame {
    pub fn new(element: HtmlIFrameElement) -> Result<Self> {
        element
            .set_attribute("sandbox", FRAME_SANDBOX)
            .map_err(|e| js_error("setting sandbox attribute", e))?;
        Ok(Self { element })
    }
}

impl PreviewFrame for IframeFrame {
    fn load(&mut self, document: &Document, strategy: LoadStrategy) -> Result<()> {
        match strategy {
            LoadStrategy::SrcDoc => {
                // srcdoc wins over src, so drop any earlier navigation target.
                let _ = self.element.remove_attribute("src");
                self.element.set_srcdoc(document.as_srcdoc());
            }
            LoadStrategy::DataUrl => {
                let _ = self.element.remove_attribute("srcdoc");
                self.element.set_src(&document.to_data_url()?);
            }
        }
        Ok(())
    }
}

/// The window `message` listener. Registered on creation, unregistered on
/// drop.
pub struct MessageListener {
    window: Window,
    callback: Closure<dyn FnMut(MessageEvent)>,
}

impl MessageListener {
    pub fn register(handler: impl FnMut(MessageEvent) + 'static) -> Result<Self> {
        let window = window()?;
        let callback = Closure::<dyn FnMut(MessageEvent)>::new(handler);
        window
            .add_event_listener_with_callback("message", callback.as_ref().unchecked_ref())
            .map_err(|e| js_error("adding message listener", e))?;
        Ok(Self { window, callback })
    }
}

impl Drop for MessageListener {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("message", self.callback.as_ref().unchecked_ref());
    }
}

/// JSON text of a message event's `data`, or `None` when it has no JSON form
/// (`undefined`, functions, cyclic objects). Any page on the window can post,
/// so nothing here may throw.
pub fn message_text(data: &JsValue) -> Option<String> {
    js_sys::JSON::stringify(data).ok()?.as_string()
}

/// Hand `export` to the browser as a download.
pub fn download(export: &FileExport) -> Result<()> {
    let window = window()?;
    let document = window
        .document()
        .ok_or_else(|| SandboxError::Frame("no document".into()))?;

    let parts = Array::new();
    parts.push(&Uint8Array::from(export.bytes.as_slice()));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(&export.content_type);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| js_error("creating blob", e))?;

    let url = web_sys::Url::create_object_url_with_blob(&blob)
        .map_err(|e| js_error("creating object URL", e))?;
    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(|e| js_error("creating anchor", e))?
        .unchecked_into();
    anchor.set_href(&url);
    anchor.set_download(&export.file_name);
    anchor.click();
    let _ = web_sys::Url::revoke_object_url(&url);

    tracing::debug!(file = %export.file_name, bytes = export.bytes.len(), "download triggered");
    Ok(())
}

type WebSandbox = Sandbox<LocalStorageStore, IframeFrame>;

/// JS-facing playground view.
#[wasm_bindgen]
pub struct WebPlayground {
    sandbox: Rc<RefCell<WebSandbox>>,
    timeout: Rc<Cell<Option<i32>>>,
    on_logs: Option<Function>,
    _listener: MessageListener,
}

fn notify(on_logs: &Option<Function>) {
    if let Some(callback) = on_logs {
        let _ = callback.call0(&JsValue::NULL);
    }
}

/// Arm `setTimeout` for `ticket`, clearing the previous handle. A stale
/// timeout that still fires is ignored by the ticket check.
fn arm_timer(
    sandbox: &Rc<RefCell<WebSandbox>>,
    timeout: &Rc<Cell<Option<i32>>>,
    on_logs: &Option<Function>,
    ticket: Ticket,
) -> Result<()> {
    let window = window()?;
    if let Some(handle) = timeout.take() {
        window.clear_timeout_with_handle(handle);
    }

    let delay = sandbox.borrow().delay().as_millis() as i32;
    let sandbox = Rc::clone(sandbox);
    let slot = Rc::clone(timeout);
    let on_logs = on_logs.clone();
    let fire = Closure::once_into_js(move || {
        slot.set(None);
        let Ok(mut view) = sandbox.try_borrow_mut() else {
            return;
        };
        let fired = view.fire(ticket);
        drop(view);
        match fired {
            Ok(true) => notify(&on_logs),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "auto-run failed"),
        }
    });

    let handle = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(fire.unchecked_ref(), delay)
        .map_err(|e| js_error("scheduling run", e))?;
    timeout.set(Some(handle));
    Ok(())
}

#[wasm_bindgen]
impl WebPlayground {
    /// Mount on `frame`. `on_logs` is called whenever the logs change.
    #[wasm_bindgen(constructor)]
    pub fn new(frame: HtmlIFrameElement, on_logs: Option<Function>) -> Result<WebPlayground, JsValue> {
        let config = SandboxConfig::default();
        let store = LocalStorageStore::open().map_err(to_js)?;
        let frame = IframeFrame::new(frame).map_err(to_js)?;
        let sandbox = Rc::new(RefCell::new(
            Sandbox::mount(&config, store, frame).map_err(to_js)?,
        ));

        let relay_target = Rc::clone(&sandbox);
        let relay_notify = on_logs.clone();
        let listener = MessageListener::register(move |event: MessageEvent| {
            let Some(raw) = message_text(&event.data()) else {
                return;
            };
            let delivered = match relay_target.try_borrow_mut() {
                Ok(mut view) => view.receive_raw(&raw).is_some(),
                Err(_) => false,
            };
            if delivered {
                notify(&relay_notify);
            }
        })
        .map_err(to_js)?;

        let timeout = Rc::new(Cell::new(None));
        let pending = sandbox.borrow().pending();
        if let Some(ticket) = pending {
            arm_timer(&sandbox, &timeout, &on_logs, ticket).map_err(to_js)?;
        }

        Ok(WebPlayground {
            sandbox,
            timeout,
            on_logs,
            _listener: listener,
        })
    }

    pub fn source(&self, kind: &str) -> Result<String, JsValue> {
        let kind: BufferKind = kind.parse().map_err(|e: String| JsValue::from_str(&e))?;
        Ok(self.sandbox.borrow().buffers().get(kind).to_string())
    }

    pub fn edit(&self, kind: &str, source: &str) -> Result<(), JsValue> {
        let kind: BufferKind = kind.parse().map_err(|e: String| JsValue::from_str(&e))?;
        let ticket = self.sandbox.borrow_mut().edit(kind, source).map_err(to_js)?;
        if let Some(ticket) = ticket {
            arm_timer(&self.sandbox, &self.timeout, &self.on_logs, ticket).map_err(to_js)?;
        }
        Ok(())
    }

    pub fn run(&self) -> Result<(), JsValue> {
        self.clear_timer();
        self.sandbox.borrow_mut().run().map_err(to_js)?;
        notify(&self.on_logs);
        Ok(())
    }

    #[wasm_bindgen(js_name = setAutoRun)]
    pub fn set_auto_run(&self, enabled: bool) -> Result<(), JsValue> {
        self.sandbox.borrow_mut().set_auto_run(enabled).map_err(to_js)?;
        if !enabled {
            self.clear_timer();
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = autoRun)]
    pub fn auto_run(&self) -> bool {
        self.sandbox.borrow().settings().auto_run
    }

    #[wasm_bindgen(js_name = toggleTheme)]
    pub fn toggle_theme(&self) -> Result<String, JsValue> {
        let mut view = self.sandbox.borrow_mut();
        let theme = view.settings().theme.toggled();
        view.set_theme(theme).map_err(to_js)?;
        Ok(theme.as_str().to_string())
    }

    #[wasm_bindgen(js_name = setTheme)]
    pub fn set_theme(&self, theme: &str) -> Result<(), JsValue> {
        let theme = Theme::parse(theme).ok_or_else(|| JsValue::from_str("unknown theme"))?;
        self.sandbox.borrow_mut().set_theme(theme).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setFontSize)]
    pub fn set_font_size(&self, size: &str) -> Result<u8, JsValue> {
        let size = FontSize::parse(size).ok_or_else(|| JsValue::from_str("unknown font size"))?;
        self.sandbox.borrow_mut().set_font_size(size).map_err(to_js)?;
        Ok(size.editor_px())
    }

    #[wasm_bindgen(js_name = setSyntaxTheme)]
    pub fn set_syntax_theme(&self, theme: &str) -> Result<(), JsValue> {
        let theme =
            SyntaxTheme::parse(theme).ok_or_else(|| JsValue::from_str("unknown syntax theme"))?;
        self.sandbox.borrow_mut().set_syntax_theme(theme).map_err(to_js)
    }

    pub fn reset(&self) -> Result<(), JsValue> {
        let ticket = self.sandbox.borrow_mut().reset().map_err(to_js)?;
        match ticket {
            Some(ticket) => {
                arm_timer(&self.sandbox, &self.timeout, &self.on_logs, ticket).map_err(to_js)?
            }
            None => self.clear_timer(),
        }
        notify(&self.on_logs);
        Ok(())
    }

    #[wasm_bindgen(js_name = consoleLogs)]
    pub fn console_logs(&self) -> Array {
        self.sandbox
            .borrow()
            .logs()
            .console
            .iter()
            .map(|line| JsValue::from_str(line))
            .collect()
    }

    #[wasm_bindgen(js_name = errorLogs)]
    pub fn error_logs(&self) -> Array {
        self.sandbox
            .borrow()
            .logs()
            .errors
            .iter()
            .map(|line| JsValue::from_str(line))
            .collect()
    }

    /// Download one buffer (`html`, `css`, `js`) or everything (`zip`).
    pub fn download(&self, what: &str) -> Result<(), JsValue> {
        let view = self.sandbox.borrow();
        let export = match what {
            "zip" => view.export_archive().map_err(to_js)?,
            kind => {
                let kind: BufferKind = kind.parse().map_err(|e: String| JsValue::from_str(&e))?;
                view.export_file(kind)
            }
        };
        download(&export).map_err(to_js)
    }
}

impl WebPlayground {
    fn clear_timer(&self) {
        if let Some(handle) = self.timeout.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
    }
}

impl Drop for WebPlayground {
    fn drop(&mut self) {
        self.clear_timer();
    }
}
