//! Code Sandbox CLI
//!
//! Compose a project directory into a preview document:
//!   code-sandbox compose --dir ./project [--data-url]
//!
//! Write download artifacts:
//!   code-sandbox export --dir ./project --kind zip --out ./dist
//!
//! Server mode (persistent host, reads commands from stdin):
//!   code-sandbox serve --store ./.code-sandbox.json
//!
//! Protocol (server mode):
//!   Request (stdin, one JSON object per line):
//!     {"op":"edit","kind":"js","source":"console.log('x')"}
//!     {"op":"run"}
//!     {"op":"auto_run","enabled":false}
//!     {"op":"message","data":{"type":"console","message":"x","channel":"..."}}
//!     {"op":"logs"}
//!     {"op":"reset"}
//!     {"op":"export","what":"zip","dir":"./dist"}
//!
//!   Response (stdout):
//!     Status:Ok
//!     Kind:document
//!     Digest:3f2a9c0d1e4b5a67
//!     Channel:5b1e0c9a7d2f4e3a8c6b9d0e1f2a3b4c-1
//!     Length:1234
//!
//!     <!DOCTYPE html>...
//!
//!   Debounced runs produce a `document` response on their own when the
//!   timer fires. `message` commands must carry the `Channel` of the latest
//!   document. Logs go to stderr.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use anyhow::{anyhow, Context, Result};
    use clap::{Parser, Subcommand};
    use code_sandbox::{
        compose_document, AutoRunDriver, BufferKind, ChannelToken, FileStore, LoadStrategy,
        MemoryFrame, OriginPolicy, Sandbox, SandboxConfig, SandboxMessage, SourceBuffers,
    };
    use serde::Deserialize;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tokio::io::AsyncBufReadExt;
    use tracing_subscriber::EnvFilter;

    /// HTML/CSS/JS playground host
    #[derive(Parser, Debug)]
    #[command(name = "code-sandbox")]
    #[command(author, version, about, long_about = None)]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    #[derive(Subcommand, Debug)]
    enum Commands {
        /// Print the composed preview document for a project directory
        Compose {
            /// Directory holding index.html, styles.css and script.js
            #[arg(long, default_value = ".")]
            dir: PathBuf,

            /// Print a data: URL instead of raw markup
            #[arg(long)]
            data_url: bool,

            /// Channel token stamped on relayed messages (random if omitted)
            #[arg(long)]
            channel: Option<String>,
        },

        /// Write one buffer, or all three zipped, as download artifacts
        Export {
            #[arg(long, default_value = ".")]
            dir: PathBuf,

            /// html, css, js or zip
            #[arg(long, default_value = "zip")]
            kind: String,

            /// Output directory
            #[arg(long, default_value = ".")]
            out: PathBuf,
        },

        /// Run a persistent host speaking the stdin/stdout protocol
        Serve {
            /// Key-value file for buffers and settings
            #[arg(long)]
            store: Option<PathBuf>,

            /// Debounce delay in milliseconds
            #[arg(long, default_value_t = 300)]
            delay_ms: u64,

            /// Emit data: URLs instead of raw markup
            #[arg(long)]
            data_url: bool,

            /// Accept messages from any channel
            #[arg(long)]
            any_origin: bool,
        },
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "op", rename_all = "snake_case")]
    enum Command {
        Edit { kind: BufferKind, source: String },
        Run,
        AutoRun { enabled: bool },
        Message { data: serde_json::Value },
        Logs,
        Reset,
        Export { what: String, dir: PathBuf },
    }

    type ServerDriver = AutoRunDriver<FileStore, MemoryFrame>;

    /// Read a project directory; missing files fall back to the defaults.
    fn load_dir(dir: &Path) -> Result<SourceBuffers> {
        let mut buffers = SourceBuffers::default();
        for kind in BufferKind::ALL {
            let path = dir.join(kind.file_name());
            match std::fs::read_to_string(&path) {
                Ok(source) => buffers.set(kind, source),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(anyhow!("Failed to read '{}': {}", path.display(), e)),
            }
        }
        Ok(buffers)
    }

    fn run_compose(dir: &Path, data_url: bool, channel: Option<String>) -> Result<()> {
        let buffers = load_dir(dir)?;
        let channel = channel.map(ChannelToken::from).unwrap_or_else(ChannelToken::generate);
        let document = compose_document(&buffers, &channel);

        tracing::info!(%channel, digest = %document.digest(), "composed document");

        if data_url {
            println!("{}", document.to_data_url()?);
        } else {
            print!("{}", document.as_srcdoc());
        }
        Ok(())
    }

    fn export(buffers: &SourceBuffers, what: &str, out: &Path) -> Result<PathBuf> {
        let artifact = match what {
            "zip" => code_sandbox::export_archive(buffers)?,
            kind => {
                let kind: BufferKind = kind.parse().map_err(|e: String| anyhow!(e))?;
                code_sandbox::export_file(buffers, kind)
            }
        };
        std::fs::create_dir_all(out)
            .with_context(|| format!("Failed to create '{}'", out.display()))?;
        Ok(artifact.write_to(out)?)
    }

    fn run_export(dir: &Path, kind: &str, out: &Path) -> Result<()> {
        let buffers = load_dir(dir)?;
        let path = export(&buffers, kind, out)?;
        println!("{}", path.display());
        Ok(())
    }

    /// Write response in length-prefixed protocol
    fn write_response(
        stdout: &mut std::io::Stdout,
        ok: bool,
        kind: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<()> {
        let status = if ok { "Ok" } else { "Error" };

        writeln!(stdout, "Status:{}", status)?;
        writeln!(stdout, "Kind:{}", kind)?;
        for (name, value) in headers {
            writeln!(stdout, "{}:{}", name, value)?;
        }
        writeln!(stdout, "Length:{}", body.len())?;
        writeln!(stdout)?; // Empty line separator
        write!(stdout, "{}", body)?;
        stdout.flush()?;

        Ok(())
    }

    /// Emit every document the frame received since the last call.
    fn flush_documents(driver: &mut ServerDriver, stdout: &mut std::io::Stdout) -> Result<()> {
        let channel = driver.sandbox().channel().to_string();
        for loaded in driver.sandbox_mut().frame_mut().drain() {
            write_response(
                stdout,
                true,
                "document",
                &[("Digest", loaded.digest.as_str()), ("Channel", channel.as_str())],
                &loaded.payload,
            )?;
        }
        Ok(())
    }

    fn handle_command(
        driver: &mut ServerDriver,
        line: &str,
        stdout: &mut std::io::Stdout,
    ) -> Result<()> {
        let command: Command = match serde_json::from_str(line) {
            Ok(c) => c,
            Err(e) => {
                let error_msg = format!("Invalid command JSON: {}", e);
                return write_response(stdout, false, "error", &[], &error_msg);
            }
        };

        let outcome: Result<()> = match command {
            Command::Edit { kind, source } => driver
                .edit(kind, source)
                .map_err(Into::into)
                .and_then(|()| write_response(stdout, true, "ack", &[], "edited")),
            Command::Run => driver
                .run()
                .map_err(Into::into)
                .and_then(|()| flush_documents(driver, stdout)),
            Command::AutoRun { enabled } => driver
                .set_auto_run(enabled)
                .map_err(Into::into)
                .and_then(|()| write_response(stdout, true, "ack", &[], &enabled.to_string())),
            Command::Message { data } => {
                let body = match SandboxMessage::from_value(data) {
                    Ok(message) => format!("{:?}", driver.sandbox_mut().receive(&message)),
                    Err(e) => {
                        tracing::debug!(error = %e, "ignoring malformed message");
                        String::from("Ignored")
                    }
                };
                write_response(stdout, true, "ack", &[], &body)
            }
            Command::Logs => serde_json::to_string(driver.sandbox().logs())
                .map_err(Into::into)
                .and_then(|json| write_response(stdout, true, "logs", &[], &json)),
            Command::Reset => driver
                .reset()
                .map_err(Into::into)
                .and_then(|()| write_response(stdout, true, "ack", &[], "reset")),
            Command::Export { what, dir } => export(driver.sandbox().buffers(), &what, &dir)
                .and_then(|path| {
                    write_response(stdout, true, "export", &[], &path.display().to_string())
                }),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => write_response(stdout, false, "error", &[], &e.to_string()),
        }
    }

    async fn run_server(config: SandboxConfig) -> Result<()> {
        let store = FileStore::open(&config.store_path)
            .with_context(|| format!("Failed to open store '{}'", config.store_path.display()))?;
        let sandbox = Sandbox::mount(&config, store, MemoryFrame::new())?;
        let mut driver = AutoRunDriver::new(sandbox);

        let mut stdout = std::io::stdout();
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

        tracing::info!(
            channel = %driver.sandbox().channel(),
            store = %config.store_path.display(),
            "server ready, reading from stdin"
        );

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        // EOF - stdin closed, exit gracefully
                        break;
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    handle_command(&mut driver, line, &mut stdout)?;
                }
                fired = driver.next_run() => {
                    match fired {
                        Ok(true) => flush_documents(&mut driver, &mut stdout)?,
                        Ok(false) => {}
                        Err(e) => write_response(&mut stdout, false, "error", &[], &e.to_string())?,
                    }
                }
            }
        }

        tracing::info!("server shutting down");
        Ok(())
    }

    pub async fn main() -> Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();

        let cli = Cli::parse();

        match cli.command {
            Commands::Compose {
                dir,
                data_url,
                channel,
            } => run_compose(&dir, data_url, channel),
            Commands::Export { dir, kind, out } => run_export(&dir, &kind, &out),
            Commands::Serve {
                store,
                delay_ms,
                data_url,
                any_origin,
            } => {
                let mut config = SandboxConfig {
                    debounce: Duration::from_millis(delay_ms),
                    ..Default::default()
                };
                if let Some(store) = store {
                    config.store_path = store;
                }
                if data_url {
                    config.load_strategy = LoadStrategy::DataUrl;
                }
                if any_origin {
                    config.origin_policy = OriginPolicy::Any;
                }
                run_server(config).await
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tempfile::tempdir;

        #[test]
        fn test_load_dir_falls_back_to_defaults() {
            let dir = tempdir().unwrap();
            std::fs::write(dir.path().join("script.js"), "go()").unwrap();

            let buffers = load_dir(dir.path()).unwrap();
            assert_eq!(buffers.js, "go()");
            assert_eq!(buffers.html, code_sandbox::DEFAULT_HTML);
        }

        #[test]
        fn test_export_writes_artifact() {
            let dir = tempdir().unwrap();
            let out = dir.path().join("dist");
            let path = export(&SourceBuffers::default(), "zip", &out).unwrap();
            assert_eq!(path, out.join("sandbox-files.zip"));
            assert!(path.exists());

            assert!(export(&SourceBuffers::default(), "txt", &out).is_err());
        }

        #[test]
        fn test_command_shapes() {
            let edit: Command =
                serde_json::from_str(r#"{"op":"edit","kind":"css","source":"p{}"}"#).unwrap();
            assert!(matches!(edit, Command::Edit { kind: BufferKind::Css, .. }));

            let toggle: Command = serde_json::from_str(r#"{"op":"auto_run","enabled":false}"#).unwrap();
            assert!(matches!(toggle, Command::AutoRun { enabled: false }));

            assert!(serde_json::from_str::<Command>(r#"{"op":"explode"}"#).is_err());
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
