//! Process-wide session registry and the single-focus invariant.
//!
//! At most one session is focused at any time. Instead of ad hoc shared
//! state, the registry owns the `focused` id and enforces exclusivity
//! centrally: focusing one session drops focus from the previous holder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::session::{BrowserSession, SessionId};

struct RegistryInner {
    sessions: HashMap<SessionId, Arc<BrowserSession>>,
    focused: Option<SessionId>,
}

pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                focused: None,
            }),
        })
    }

    pub fn insert(&self, session: Arc<BrowserSession>) {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session.id(), session);
    }

    /// Remove a session, dropping focus if it held it. Called once the
    /// engine confirms close.
    pub fn remove(&self, id: SessionId) -> Option<Arc<BrowserSession>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.focused == Some(id) {
            inner.focused = None;
        }
        inner.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<BrowserSession>> {
        self.inner.lock().unwrap().sessions.get(&id).cloned()
    }

    pub fn sessions(&self) -> Vec<Arc<BrowserSession>> {
        self.inner.lock().unwrap().sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().sessions.is_empty()
    }

    /// The session currently holding focus, if any.
    pub fn focused(&self) -> Option<Arc<BrowserSession>> {
        let inner = self.inner.lock().unwrap();
        inner.focused.and_then(|id| inner.sessions.get(&id).cloned())
    }

    pub fn focused_id(&self) -> Option<SessionId> {
        self.inner.lock().unwrap().focused
    }

    /// Make `id` the focused session, dropping focus from the previous
    /// holder. The new holder has already forwarded focus to its engine.
    pub(crate) fn set_focused(&self, id: SessionId) {
        let previous = {
            let mut inner = self.inner.lock().unwrap();
            if inner.focused == Some(id) {
                return;
            }
            let previous = inner.focused.and_then(|prev| inner.sessions.get(&prev).cloned());
            inner.focused = Some(id);
            previous
        };

        if let Some(prev) = previous {
            prev.drop_focus();
        }
    }

    /// Clear focus, but only when `id` still holds it.
    pub(crate) fn clear_focused(&self, id: SessionId) {
        let mut inner = self.inner.lock().unwrap();
        if inner.focused == Some(id) {
            inner.focused = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::null::NullEngine;
    use crate::engine::{BrowserConfig, EngineBackend};

    fn active_session(registry: &Arc<SessionRegistry>, id: i32) -> Arc<BrowserSession> {
        let session = BrowserSession::new(SessionId(id), 1.0, registry);
        registry.insert(session.clone());
        NullEngine::new()
            .create_browser(
                BrowserConfig {
                    browser_id: id,
                    headless: true,
                    dpi: 1.0,
                },
                session.clone(),
            )
            .unwrap();
        session
    }

    #[test]
    fn focus_is_exclusive_across_sessions() {
        let registry = SessionRegistry::new();
        let a = active_session(&registry, 1);
        let b = active_session(&registry, 2);
        let c = active_session(&registry, 3);

        a.focus().unwrap();
        assert!(a.is_focused());
        assert_eq!(registry.focused_id(), Some(SessionId(1)));

        b.focus().unwrap();
        assert!(b.is_focused());
        assert!(!a.is_focused());
        assert!(!c.is_focused());
        assert_eq!(registry.focused_id(), Some(SessionId(2)));
    }

    #[test]
    fn unfocus_leaves_no_session_focused() {
        let registry = SessionRegistry::new();
        let a = active_session(&registry, 1);
        let _b = active_session(&registry, 2);

        a.focus().unwrap();
        a.unfocus().unwrap();
        assert!(registry.focused().is_none());
        assert!(!a.is_focused());
    }

    #[test]
    fn unfocus_by_non_holder_keeps_focus() {
        let registry = SessionRegistry::new();
        let a = active_session(&registry, 1);
        let b = active_session(&registry, 2);

        a.focus().unwrap();
        b.unfocus().unwrap(); // b never held focus
        assert_eq!(registry.focused_id(), Some(SessionId(1)));
        assert!(a.is_focused());
    }

    #[test]
    fn removing_focused_session_clears_focus() {
        let registry = SessionRegistry::new();
        let a = active_session(&registry, 1);
        a.focus().unwrap();

        registry.remove(SessionId(1));
        assert!(registry.focused().is_none());
        assert!(registry.is_empty());
    }
}
