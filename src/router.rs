//! Per-session routing of script-originated queries to host logic.
//!
//! Script content issues a query; the router forwards the payload verbatim to
//! the single registered host handler. Interpretation of the payload is the
//! host's responsibility. Only single-shot (non-persistent) queries are used.

use std::sync::Mutex;

use tokio::sync::oneshot;

/// Failure reply to a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub code: i32,
    pub message: String,
}

/// Outcome of one query, delivered back toward the engine.
pub type QueryReply = Result<String, QueryFailure>;

/// Exactly-once completion handle for a query. Consuming `self` on both
/// resolution paths makes double-resolution unrepresentable.
pub struct QueryResponder {
    reply: oneshot::Sender<QueryReply>,
}

impl QueryResponder {
    /// Build a responder and the receiver the engine adapter waits on.
    pub fn channel() -> (Self, oneshot::Receiver<QueryReply>) {
        let (tx, rx) = oneshot::channel();
        (Self { reply: tx }, rx)
    }

    pub fn success(self, response: impl Into<String>) {
        let _ = self.reply.send(Ok(response.into()));
    }

    pub fn failure(self, code: i32, message: impl Into<String>) {
        let _ = self.reply.send(Err(QueryFailure {
            code,
            message: message.into(),
        }));
    }
}

type QueryHandler = Box<dyn Fn(&str, QueryResponder) + Send + Sync + 'static>;

/// One router per session. Registered when the session is created and
/// de-registered synchronously at teardown, so no query can be delivered
/// afterwards.
pub struct MessageRouter {
    handler: Mutex<Option<QueryHandler>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            handler: Mutex::new(None),
        }
    }

    /// Install the host handler, replacing any previous one.
    pub fn set_handler(&self, handler: impl Fn(&str, QueryResponder) + Send + Sync + 'static) {
        *self.handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Remove the handler. Takes effect synchronously.
    pub fn clear_handler(&self) {
        *self.handler.lock().unwrap() = None;
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    /// Forward one query to the registered handler. Returns false when no
    /// handler is registered (the query stays unhandled engine-side).
    pub fn on_query(&self, request: &str, responder: QueryResponder) -> bool {
        let guard = self.handler.lock().unwrap();
        match guard.as_ref() {
            Some(handler) => {
                handler(request, responder);
                true
            }
            None => {
                log::debug!("query received with no handler registered, ignoring");
                false
            }
        }
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn query_payload_is_forwarded_verbatim() {
        let router = MessageRouter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        router.set_handler(move |request, responder| {
            seen2.lock().unwrap().push(request.to_string());
            responder.success("");
        });

        let (responder, mut rx) = QueryResponder::channel();
        assert!(router.on_query(r#"{"cmd":"ping"}"#, responder));
        assert_eq!(*seen.lock().unwrap(), vec![r#"{"cmd":"ping"}"#.to_string()]);
        assert_eq!(rx.try_recv().unwrap(), Ok(String::new()));
    }

    #[test]
    fn no_query_delivered_after_teardown() {
        let router = MessageRouter::new();
        router.set_handler(|_, responder| responder.success("handled"));
        router.clear_handler();

        let (responder, mut rx) = QueryResponder::channel();
        assert!(!router.on_query("late", responder));
        // The responder was dropped unresolved.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn responder_failure_carries_code_and_message() {
        let (responder, mut rx) = QueryResponder::channel();
        responder.failure(404, "no such thing");
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(QueryFailure {
                code: 404,
                message: "no such thing".into()
            })
        );
    }
}
