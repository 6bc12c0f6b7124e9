//! Document composer.
//!
//! Builds one self-contained HTML document from the three source buffers and
//! a console/error interception shim. User input is concatenated verbatim: no
//! sanitising, escaping or validation. Isolation is the frame's job.

use crate::buffers::SourceBuffers;
use crate::error::Result;
use crate::message::ChannelToken;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Rule applied before the user CSS so an empty stylesheet still renders
/// legibly on a white page.
pub const BASE_STYLE: &str =
    "body { margin:0;padding:1rem;background:#fff;color:#000;font-family:sans-serif; }";

/// Global the shim installs for the user-script `catch` block.
const REPORT_HOOK: &str = "__sandboxReport";

const DATA_URL_PREFIX: &str = "data:text/html;charset=utf-8;base64,";

/// A composed document, ready to be loaded into a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    source: String,
}

impl Document {
    /// Raw markup, suitable for a frame's `srcdoc`.
    pub fn as_srcdoc(&self) -> &str {
        &self.source
    }

    pub fn into_string(self) -> String {
        self.source
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Encode as a `data:` URL a frame can navigate to.
    ///
    /// The body is base64 so any document (quotes, `#`, `%`, non-ASCII)
    /// survives; the result is checked to parse as a URL.
    pub fn to_data_url(&self) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.source.as_bytes());
        let data_url = format!("{}{}", DATA_URL_PREFIX, encoded);
        url::Url::parse(&data_url)?;
        Ok(data_url)
    }

    /// Short SHA-256 fingerprint, for logs and protocol headers.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.source.as_bytes());
        let hex = format!("{:x}", hash);
        hex[..16].to_string()
    }
}

/// Compose the document for `buffers`, tagging every relayed message with
/// `channel`.
///
/// Pure: equal inputs give byte-identical output.
pub fn compose_document(buffers: &SourceBuffers, channel: &ChannelToken) -> Document {
    let shim = shim_script(channel);
    let source = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
{base}
{css}
</style>
</head>
<body>
{html}
<script>
{shim}
</script>
<script>
try {{
{js}
}} catch (e) {{ window.{hook}(e); }}
</script>
</body>
</html>
"#,
        base = BASE_STYLE,
        css = buffers.css,
        html = buffers.html,
        shim = shim,
        js = buffers.js,
        hook = REPORT_HOOK,
    );
    Document { source }
}

/// The interception shim. Redirects console calls and uncaught errors to
/// `postMessage` on the parent window, normalising payloads as documented in
/// [`crate::message`].
fn shim_script(channel: &ChannelToken) -> String {
    // A JSON string literal is also a valid JS string literal.
    let channel_literal =
        serde_json::to_string(channel.as_str()).unwrap_or_else(|_| String::from("\"\""));

    format!(
        r#"(function () {{
  var channel = {channel};
  var post = function (type, value) {{
    window.parent.postMessage({{ type: type, message: value, channel: channel }}, '*');
  }};
  var errorText = function (e) {{
    if (e && e.stack) return String(e.stack);
    return String(e);
  }};
  var normalize = function (v) {{
    if (v instanceof Error) return errorText(v);
    switch (typeof v) {{
      case 'string':
      case 'boolean':
        return v;
      case 'number':
        return isFinite(v) ? v : String(v);
      case 'undefined':
      case 'function':
      case 'symbol':
      case 'bigint':
        return String(v);
    }}
    if (v === null) return null;
    try {{
      var json = JSON.stringify(v);
      return json === undefined ? String(v) : JSON.parse(json);
    }} catch (_) {{
      return String(v);
    }}
  }};
  var text = function (v) {{
    var n = normalize(v);
    return typeof n === 'string' ? n : JSON.stringify(n);
  }};
  var forward = function (type) {{
    return function () {{
      var args = Array.prototype.slice.call(arguments);
      post(type, args.length === 1 ? normalize(args[0]) : args.map(text).join(' '));
    }};
  }};
  console.log = forward('console');
  console.info = forward('console');
  console.warn = forward('console');
  console.error = forward('error');
  window.{hook} = function (e) {{ post('error', errorText(e)); }};
  window.addEventListener('error', function (event) {{
    post('error', event.error ? errorText(event.error) : String(event.message));
  }});
  window.addEventListener('unhandledrejection', function (event) {{
    post('error', errorText(event.reason));
  }});
}})();"#,
        channel = channel_literal,
        hook = REPORT_HOOK,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn token() -> ChannelToken {
        ChannelToken::from("test-channel")
    }

    #[test]
    fn test_parts_land_in_place() {
        let buffers = SourceBuffers::new("<p>hi</p>", "p { color: red; }", "console.log('x')");
        let doc = compose_document(&buffers, &token());
        let src = doc.as_srcdoc();

        let style_start = src.find("<style>").unwrap();
        let style_end = src.find("</style>").unwrap();
        let style = &src[style_start..style_end];
        assert!(style.contains(BASE_STYLE));
        assert!(style.contains("p { color: red; }"));
        // User CSS follows the base rule so it can override it.
        assert!(style.find(BASE_STYLE).unwrap() < style.find("p { color").unwrap());

        let body_start = src.find("<body>").unwrap();
        assert!(src[body_start..].contains("<p>hi</p>"));

        let try_block = src.find("try {\nconsole.log('x')\n}").unwrap();
        assert!(try_block > src.find("console.log = forward('console')").unwrap());
    }

    #[test]
    fn test_shim_carries_channel() {
        let doc = compose_document(&SourceBuffers::default(), &token());
        assert!(doc.as_srcdoc().contains(r#"var channel = "test-channel";"#));
        assert!(doc.as_srcdoc().contains("window.__sandboxReport = function"));
    }

    #[test]
    fn test_sync_throw_reported_once() {
        let buffers = SourceBuffers::new("", "", "throw new Error('boom')");
        let doc = compose_document(&buffers, &token());
        let src = doc.as_srcdoc();

        // The user script is caught in place, so window 'error' never sees it.
        let user = "<script>\ntry {\nthrow new Error('boom')\n} catch (e) { window.__sandboxReport(e); }\n</script>";
        assert!(src.contains(user));

        let shim_start = src.find("<script>").unwrap();
        let shim_end = src[shim_start..].find("</script>").unwrap() + shim_start;
        let shim = &src[shim_start..shim_end];
        assert_eq!(shim.matches("window.addEventListener(").count(), 2);
        let listeners = &shim[shim.find("window.addEventListener(").unwrap()..];
        assert_eq!(listeners.matches("post('error'").count(), 2);
        assert_eq!(shim.matches("window.__sandboxReport = function").count(), 1);
    }

    #[test]
    fn test_input_is_not_escaped() {
        let buffers = SourceBuffers::new("<b>&amp;</b><script>1</script>", "", "");
        let doc = compose_document(&buffers, &token());
        assert!(doc.as_srcdoc().contains("<b>&amp;</b><script>1</script>"));
    }

    #[test]
    fn test_data_url_roundtrips_document() {
        let buffers = SourceBuffers::new("<p>100% #1 ünïcode</p>", "", "");
        let doc = compose_document(&buffers, &token());
        let url = doc.to_data_url().unwrap();

        let encoded = url.strip_prefix(DATA_URL_PREFIX).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), doc.as_srcdoc());
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = compose_document(&SourceBuffers::default(), &token());
        let b = compose_document(&SourceBuffers::new("x", "", ""), &token());
        assert_eq!(a.digest().len(), 16);
        assert_ne!(a.digest(), b.digest());
    }

    proptest! {
        #[test]
        fn compose_is_deterministic(html in ".*", css in ".*", js in ".*") {
            let buffers = SourceBuffers::new(html, css, js);
            let first = compose_document(&buffers, &token());
            let second = compose_document(&buffers.clone(), &token());
            prop_assert_eq!(first, second);
        }
    }
}
