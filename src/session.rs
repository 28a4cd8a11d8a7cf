//! Per-browser session state: lifecycle, focus, input translation and the
//! command surface the host drives it through.

use std::fmt;

pub mod browser;
pub mod commands;

pub use browser::BrowserSession;
pub use commands::CommandOutput;

/// Host-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub i32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forward-only session lifecycle.
///
/// `Active` is entered when the engine confirms creation and hands over the
/// browser host handle. `Closing` on dispose; `Closed` only after the
/// engine's own close confirmation. Engine callbacks received in
/// `Closing`/`Closed` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Closing,
    Closed,
}
