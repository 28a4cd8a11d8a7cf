//! Process-global plugin surface: engine startup, session creation and the
//! commands that target whichever session holds focus.
//!
//! All engine work is marshalled onto the [`UiThread`] queue; the async
//! methods here are what the host framework's message handler calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::engine::{BrowserConfig, EngineBackend, EngineConfig};
use crate::errors::{BridgeError, CommandError};
use crate::registry::SessionRegistry;
use crate::session::{BrowserSession, CommandOutput, SessionId};
use crate::ui::UiThread;

pub struct WebviewPlugin {
    engine: Arc<dyn EngineBackend>,
    ui: Arc<UiThread>,
    registry: Arc<SessionRegistry>,
    started: AtomicBool,
}

impl WebviewPlugin {
    pub fn new(engine: Arc<dyn EngineBackend>) -> Self {
        Self {
            engine,
            ui: Arc::new(UiThread::spawn()),
            registry: SessionRegistry::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<BrowserSession>> {
        self.registry.get(id)
    }

    /// Handle a process-global command.
    pub async fn handle_global_command(
        &self,
        method: &str,
        args: &Value,
    ) -> Result<Value, CommandError> {
        match method {
            "startCEF" => self.start_engine(args).await,
            "createBrowser" => self.create_browser(args).await,
            "setComposition" => {
                let text = required_text(args)?;
                self.with_focused(move |session| session.ime_set_composition(&text))
                    .await
            }
            "commitText" => {
                let text = required_text(args)?;
                self.with_focused(move |session| session.ime_commit_text(&text))
                    .await
            }
            "finishComposingText" => {
                self.with_focused(|session| session.ime_finish_composing_text())
                    .await
            }
            "cancelComposition" => {
                self.with_focused(|session| session.ime_cancel_composition())
                    .await
            }
            _ => Err(CommandError::NotImplemented),
        }
    }

    /// Handle a command addressed to one session. Synchronous commands are
    /// answered from the UI-thread job; engine-deferred completions
    /// (`printToPDF`) are awaited here, off the queue.
    pub async fn handle_browser_command(
        &self,
        id: SessionId,
        method: &str,
        args: &Value,
    ) -> Result<Value, CommandError> {
        let session = self
            .session(id)
            .ok_or(CommandError::UnknownBrowser(id.0))?;
        let method = method.to_string();
        let args = args.clone();

        let output = self
            .ui
            .call(move || session.handle_command(&method, &args))
            .await??;

        match output {
            CommandOutput::Value(value) => Ok(value),
            CommandOutput::PendingBool(done) => {
                let ok = done.await.map_err(|_| BridgeError::ReplyDropped)?;
                Ok(Value::Bool(ok))
            }
        }
    }

    /// Dispose every session and stop the UI thread.
    pub async fn shutdown(&self) {
        let registry = self.registry.clone();
        let _ = self
            .ui
            .call(move || {
                for session in registry.sessions() {
                    session.dispose();
                }
            })
            .await;
        self.ui.shutdown();
    }

    /// Start the engine at most once per plugin lifetime. Later calls are
    /// no-ops.
    async fn start_engine(&self, args: &Value) -> Result<Value, CommandError> {
        if self.started.swap(true, Ordering::SeqCst) {
            log::debug!("engine already started, ignoring");
            return Ok(Value::Null);
        }

        let config = EngineConfig {
            cache_path: args
                .get("cachePath")
                .and_then(Value::as_str)
                .map(str::to_string),
            root_cache_path: args
                .get("rootCachePath")
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        let engine = self.engine.clone();
        let result = self.ui.call(move || engine.start(&config)).await?;
        if let Err(err) = result {
            self.started.store(false, Ordering::SeqCst);
            return Err(BridgeError::Engine(err.to_string()).into());
        }
        Ok(Value::Null)
    }

    /// Create a session. The session handle (and its texture, unless
    /// headless) exists immediately; the engine confirms asynchronously via
    /// the after-created callback.
    async fn create_browser(&self, args: &Value) -> Result<Value, CommandError> {
        let browser_id = args
            .get("browserID")
            .and_then(Value::as_i64)
            .ok_or(CommandError::MissingArgument("browserID"))? as i32;
        let headless = args
            .get("headless")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let dpi = args.get("dpi").and_then(Value::as_f64).unwrap_or(1.0);

        let id = SessionId(browser_id);
        let session = BrowserSession::new(id, dpi, &self.registry);
        self.registry.insert(session.clone());

        let texture = if headless {
            None
        } else {
            Some(session.frame().attach())
        };

        let engine = self.engine.clone();
        let result = self
            .ui
            .call(move || {
                engine.create_browser(
                    BrowserConfig {
                        browser_id,
                        headless,
                        dpi,
                    },
                    session,
                )
            })
            .await?;
        if let Err(err) = result {
            self.registry.remove(id);
            return Err(BridgeError::Engine(err.to_string()).into());
        }

        Ok(texture.map(|t| json!(t)).unwrap_or(Value::Null))
    }

    /// Run `f` against the focused session on the UI thread; a no-op when no
    /// session holds focus.
    async fn with_focused<F>(&self, f: F) -> Result<Value, CommandError>
    where
        F: FnOnce(&BrowserSession) -> Result<(), CommandError> + Send + 'static,
    {
        let registry = self.registry.clone();
        self.ui
            .call(move || match registry.focused() {
                Some(session) => f(&session),
                None => Ok(()),
            })
            .await??;
        Ok(Value::Null)
    }
}

fn required_text(args: &Value) -> Result<String, CommandError> {
    args.as_str()
        .map(str::to_string)
        .ok_or(CommandError::MissingArgument("text"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::null::NullEngine;
    use crate::engine::EngineClient;
    use std::sync::atomic::AtomicUsize;

    /// Loopback engine that counts start calls.
    struct CountingEngine {
        inner: NullEngine,
        starts: AtomicUsize,
    }

    impl CountingEngine {
        fn new() -> Self {
            Self {
                inner: NullEngine::new(),
                starts: AtomicUsize::new(0),
            }
        }
    }

    impl EngineBackend for CountingEngine {
        fn start(&self, config: &EngineConfig) -> anyhow::Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.inner.start(config)
        }

        fn create_browser(
            &self,
            config: BrowserConfig,
            client: Arc<dyn EngineClient>,
        ) -> anyhow::Result<()> {
            self.inner.create_browser(config, client)
        }
    }

    fn plugin() -> WebviewPlugin {
        WebviewPlugin::new(Arc::new(NullEngine::new()))
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let engine = Arc::new(CountingEngine::new());
        let plugin = WebviewPlugin::new(engine.clone());

        plugin
            .handle_global_command("startCEF", &json!({ "cachePath": "/tmp/cache" }))
            .await
            .unwrap();
        plugin
            .handle_global_command("startCEF", &json!({}))
            .await
            .unwrap();

        assert_eq!(engine.starts.load(Ordering::SeqCst), 1);
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn create_browser_returns_a_texture_unless_headless() {
        let plugin = plugin();
        plugin
            .handle_global_command("startCEF", &json!({}))
            .await
            .unwrap();

        let texture = plugin
            .handle_global_command("createBrowser", &json!({ "browserID": 1 }))
            .await
            .unwrap();
        assert!(texture.is_i64());

        let none = plugin
            .handle_global_command(
                "createBrowser",
                &json!({ "browserID": 2, "headless": true, "dpi": 2.0 }),
            )
            .await
            .unwrap();
        assert!(none.is_null());

        assert_eq!(plugin.registry().len(), 2);
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn create_browser_requires_an_id() {
        let plugin = plugin();
        assert!(matches!(
            plugin
                .handle_global_command("createBrowser", &json!({}))
                .await,
            Err(CommandError::MissingArgument("browserID"))
        ));
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn browser_commands_require_a_known_session() {
        let plugin = plugin();
        assert!(matches!(
            plugin
                .handle_browser_command(SessionId(9), "reload", &Value::Null)
                .await,
            Err(CommandError::UnknownBrowser(9))
        ));
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn browser_commands_are_dispatched_on_the_queue() {
        let plugin = plugin();
        plugin
            .handle_global_command("createBrowser", &json!({ "browserID": 1 }))
            .await
            .unwrap();

        plugin
            .handle_browser_command(SessionId(1), "loadUrl", &json!("https://example.com/"))
            .await
            .unwrap();

        // printToPDF resolves through the deferred completion path.
        let ok = plugin
            .handle_browser_command(
                SessionId(1),
                "printToPDF",
                &json!({ "path": "/tmp/page.pdf" }),
            )
            .await
            .unwrap();
        assert_eq!(ok, Value::Bool(true));
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_commands_are_rejected() {
        let plugin = plugin();
        assert!(matches!(
            plugin.handle_global_command("frobnicate", &Value::Null).await,
            Err(CommandError::NotImplemented)
        ));
        plugin.shutdown().await;
    }

    #[tokio::test]
    async fn ime_commands_without_focus_are_no_ops() {
        let plugin = plugin();
        plugin
            .handle_global_command("createBrowser", &json!({ "browserID": 1 }))
            .await
            .unwrap();

        // No session holds focus yet.
        let out = plugin
            .handle_global_command("commitText", &json!("こんにちは"))
            .await
            .unwrap();
        assert!(out.is_null());

        assert!(matches!(
            plugin.handle_global_command("setComposition", &Value::Null).await,
            Err(CommandError::MissingArgument("text"))
        ));

        // Focused session receives them without error.
        plugin
            .handle_browser_command(SessionId(1), "focus", &Value::Null)
            .await
            .unwrap();
        plugin
            .handle_global_command("setComposition", &json!("こん"))
            .await
            .unwrap();
        plugin.shutdown().await;
    }
}
