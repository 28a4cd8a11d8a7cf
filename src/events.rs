//! Session event types and the per-session event sink.
//!
//! Every engine-originated notification the host can observe flows through
//! [`EventEmitter`] as a [`SessionEvent`]. Events are delivered in the order
//! the engine produced them, on a single per-session stream. If no sink is
//! attached the event is dropped, never buffered; hosts must attach before
//! relying on a given event.

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use std::sync::Mutex;

/// One engine-originated notification, tagged with its wire name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "camelCase")]
pub enum SessionEvent {
    // ****************************************
    // ** Lifecycle
    /// The engine confirmed browser creation; the session is now active.
    BrowserCreated,
    /// The script/render process died. Every pending script evaluation has
    /// already been failed; the host decides whether to recreate the session.
    RenderProcessTerminated { status: i32 },

    // ****************************************
    // ** Navigation / page state
    TitleChanged(String),
    UrlChanged(String),
    LoadingProgressChanged(f64),
    LoadingStateChanged(bool),
    LoadStart(String),
    LoadEnd(i32),
    #[serde(rename_all = "camelCase")]
    LoadError {
        error_code: i32,
        error_text: String,
        failed_url: String,
    },

    // ****************************************
    // ** View / input
    CursorChanged(i32),
    ScrollOffsetChanged { x: f64, y: f64 },
    ImeCompositionPositionChanged { x: i32, y: i32 },

    // ****************************************
    // ** Scripting
    /// Completion of a host-issued `evaluateJavaScript` call, keyed by the
    /// correlation id handed out when the call was dispatched.
    JavaScriptResult {
        id: Uuid,
        result: Option<serde_json::Value>,
        error: Option<String>,
    },
}

/// Ordered per-session event sink.
pub struct EventEmitter {
    sink: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            sink: Mutex::new(None),
        }
    }

    /// Attach a sink, replacing any previous one. No delivery guarantee spans
    /// a detach/reattach.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sink.lock().unwrap() = Some(tx);
        rx
    }

    pub fn detach(&self) {
        *self.sink.lock().unwrap() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    /// Push an event to the attached sink, or drop it when none is attached.
    pub fn emit(&self, event: SessionEvent) {
        let mut guard = self.sink.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    // Receiver was dropped without an explicit detach.
                    *guard = None;
                }
            }
            None => {
                log::debug!("no event sink attached, dropping {:?}", event);
            }
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_sink_drops_event() {
        let emitter = EventEmitter::new();
        emitter.emit(SessionEvent::TitleChanged("hello".into()));
        assert!(!emitter.is_attached());

        // An event emitted before attach is not replayed afterwards.
        let mut rx = emitter.attach();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.attach();

        emitter.emit(SessionEvent::LoadStart("https://a.example/".into()));
        emitter.emit(SessionEvent::LoadingProgressChanged(0.5));
        emitter.emit(SessionEvent::LoadEnd(200));

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::LoadStart("https://a.example/".into())
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::LoadingProgressChanged(0.5)
        );
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::LoadEnd(200));
    }

    #[test]
    fn reattach_replaces_previous_sink() {
        let emitter = EventEmitter::new();
        let mut first = emitter.attach();
        let mut second = emitter.attach();

        emitter.emit(SessionEvent::LoadingStateChanged(true));
        assert!(first.try_recv().is_err());
        assert_eq!(
            second.try_recv().unwrap(),
            SessionEvent::LoadingStateChanged(true)
        );
    }

    #[test]
    fn dropped_receiver_detaches_sink() {
        let emitter = EventEmitter::new();
        let rx = emitter.attach();
        drop(rx);

        emitter.emit(SessionEvent::LoadEnd(404));
        assert!(!emitter.is_attached());
    }

    #[test]
    fn load_error_serializes_with_wire_field_names() {
        let ev = SessionEvent::LoadError {
            error_code: -105,
            error_text: "NAME_NOT_RESOLVED".into(),
            failed_url: "https://nx.example/".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "loadError");
        assert_eq!(json["value"]["errorCode"], -105);
        assert_eq!(json["value"]["errorText"], "NAME_NOT_RESOLVED");
        assert_eq!(json["value"]["failedUrl"], "https://nx.example/");
    }
}
