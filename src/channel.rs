//! Correlation of host-issued `evaluateJavaScript` calls with their
//! asynchronous cross-process responses.
//!
//! `execute` dispatches a tagged request into the engine's render process and
//! returns immediately. The response resolves the matching pending entry
//! exactly once and is forwarded to the host via the session's event stream,
//! keyed by the original correlation id. Outstanding entries are explicitly
//! failed at session teardown and on render process death; there is no
//! timeout.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::engine::{BrowserHost, ProcessId, ProcessMessage};
use crate::events::{EventEmitter, SessionEvent};

/// Wire name of the request message sent to the render process.
pub const EVALUATE_JS: &str = "evaluateJavaScript";
/// Wire name of the tagged response message.
pub const EVALUATE_JS_RESPONSE: &str = "evaluateJavaScriptResponse";

/// Typed correlation table: request id → one pending completion, resolved
/// through the session's event emitter.
pub struct AsyncChannelBridge {
    emitter: Arc<EventEmitter>,
    pending: Mutex<HashSet<Uuid>>,
}

impl AsyncChannelBridge {
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self {
            emitter,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Dispatch a script evaluation into the render process. Returns the
    /// fresh correlation id; the completion event carries the same id.
    pub fn execute(&self, host: &dyn BrowserHost, payload: serde_json::Value) -> Uuid {
        let id = Uuid::new_v4();
        self.pending.lock().unwrap().insert(id);

        host.send_process_message(
            ProcessId::Renderer,
            ProcessMessage {
                name: EVALUATE_JS.to_string(),
                payload: serde_json::json!({ "id": id, "payload": payload }),
            },
        );
        id
    }

    /// Resolve one tagged response. A response whose id was never issued, or
    /// was already resolved, is dropped.
    pub fn on_response(&self, payload: &serde_json::Value) {
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let Some(id) = id else {
            log::warn!("script response without a valid correlation id, dropping");
            return;
        };

        if !self.pending.lock().unwrap().remove(&id) {
            log::warn!("script response for unknown request {}, dropping", id);
            return;
        }

        let error = payload
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let result = match error {
            Some(_) => None,
            None => Some(payload.get("result").cloned().unwrap_or_default()),
        };

        self.emitter.emit(SessionEvent::JavaScriptResult { id, result, error });
    }

    /// Fail every outstanding request with the given reason. Returns how many
    /// were failed.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<Uuid> = self.pending.lock().unwrap().drain().collect();
        for id in &drained {
            self.emitter.emit(SessionEvent::JavaScriptResult {
                id: *id,
                result: None,
                error: Some(reason.to_string()),
            });
        }
        drained.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::null::NullEngine;
    use crate::engine::{BrowserConfig, EngineBackend, PdfPrintSettings};
    use crate::input::{MouseButton, MouseEvent};
    use tokio::sync::oneshot;
    use url::Url;

    /// Host that swallows process messages so requests stay pending.
    struct SilentHost;

    impl BrowserHost for SilentHost {
        fn load_url(&self, _url: &Url) {}
        fn go_back(&self) {}
        fn go_forward(&self) {}
        fn reload(&self) {}
        fn stop_load(&self) {}
        fn set_focus(&self, _focus: bool) {}
        fn was_resized(&self) {}
        fn notify_screen_info_changed(&self) {}
        fn invalidate(&self) {}
        fn set_zoom_level(&self, _level: f64) {}
        fn zoom_level(&self) -> f64 {
            0.0
        }
        fn open_dev_tools(&self) {}
        fn send_mouse_click(
            &self,
            _event: MouseEvent,
            _button: MouseButton,
            _up: bool,
            _click_count: u32,
        ) {
        }
        fn send_mouse_move(&self, _event: MouseEvent, _leave: bool) {}
        fn send_mouse_wheel(&self, _event: MouseEvent, _delta_x: i32, _delta_y: i32) {}
        fn drag_target_drag_over(&self, _event: MouseEvent) {}
        fn drag_target_drop(&self, _event: MouseEvent) {}
        fn drag_source_system_drag_ended(&self) {}
        fn ime_set_composition(&self, _text: &str) {}
        fn ime_commit_text(&self, _text: &str) {}
        fn ime_finish_composing_text(&self) {}
        fn ime_cancel_composition(&self) {}
        fn send_process_message(&self, _target: ProcessId, _message: ProcessMessage) {}
        fn print_to_pdf(
            &self,
            _path: &str,
            _settings: PdfPrintSettings,
            _done: oneshot::Sender<bool>,
        ) {
        }
        fn close(&self, _force: bool) {}
    }

    fn response_for(id: Uuid, result: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "id": id, "result": result })
    }

    #[test]
    fn response_resolves_pending_request_exactly_once() {
        let emitter = Arc::new(EventEmitter::new());
        let mut rx = emitter.attach();
        let bridge = AsyncChannelBridge::new(emitter);

        let id = bridge.execute(&SilentHost, serde_json::json!("1 + 1"));
        assert_eq!(bridge.pending_count(), 1);

        bridge.on_response(&response_for(id, serde_json::json!(2)));
        assert_eq!(bridge.pending_count(), 0);

        match rx.try_recv().unwrap() {
            SessionEvent::JavaScriptResult { id: got, result, error } => {
                assert_eq!(got, id);
                assert_eq!(result, Some(serde_json::json!(2)));
                assert!(error.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }

        // A duplicate response is dropped.
        bridge.on_response(&response_for(id, serde_json::json!(3)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn response_for_unissued_id_is_dropped() {
        let emitter = Arc::new(EventEmitter::new());
        let mut rx = emitter.attach();
        let bridge = AsyncChannelBridge::new(emitter);

        bridge.on_response(&response_for(Uuid::new_v4(), serde_json::json!(null)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_responses_carry_no_result() {
        let emitter = Arc::new(EventEmitter::new());
        let mut rx = emitter.attach();
        let bridge = AsyncChannelBridge::new(emitter);

        let id = bridge.execute(&SilentHost, serde_json::json!("throw 1"));
        bridge.on_response(&serde_json::json!({ "id": id, "error": "Uncaught 1" }));

        match rx.try_recv().unwrap() {
            SessionEvent::JavaScriptResult { result, error, .. } => {
                assert!(result.is_none());
                assert_eq!(error.as_deref(), Some("Uncaught 1"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn fail_all_yields_one_failure_per_outstanding_request() {
        let emitter = Arc::new(EventEmitter::new());
        let mut rx = emitter.attach();
        let bridge = AsyncChannelBridge::new(emitter);

        let mut issued: Vec<Uuid> = (0..3)
            .map(|i| bridge.execute(&SilentHost, serde_json::json!(format!("job {}", i))))
            .collect();

        assert_eq!(bridge.fail_all("render process terminated"), 3);
        assert_eq!(bridge.pending_count(), 0);

        for _ in 0..3 {
            match rx.try_recv().unwrap() {
                SessionEvent::JavaScriptResult { id, result, error } => {
                    let pos = issued.iter().position(|x| *x == id).expect("unknown id");
                    issued.remove(pos);
                    assert!(result.is_none());
                    assert_eq!(error.as_deref(), Some("render process terminated"));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(issued.is_empty());
        assert!(rx.try_recv().is_err());

        // Nothing left to fail on a second pass.
        assert_eq!(bridge.fail_all("again"), 0);
    }

    /// Round-trip through the loopback engine's fake render process.
    #[test]
    fn null_engine_echoes_evaluation_payload() {
        use crate::registry::SessionRegistry;
        use crate::session::{BrowserSession, SessionId};

        let registry = SessionRegistry::new();
        let session = BrowserSession::new(SessionId(7), 1.0, &registry);
        let mut rx = session.events().attach();

        NullEngine::new()
            .create_browser(
                BrowserConfig {
                    browser_id: 7,
                    headless: true,
                    dpi: 1.0,
                },
                session.clone(),
            )
            .unwrap();
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::BrowserCreated)));

        let id = session.evaluate_javascript(serde_json::json!("2 + 2")).unwrap();
        match rx.try_recv().unwrap() {
            SessionEvent::JavaScriptResult { id: got, result, error } => {
                assert_eq!(got, id);
                assert_eq!(result, Some(serde_json::json!("2 + 2")));
                assert!(error.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
