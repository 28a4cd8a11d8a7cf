pub mod channel;
pub mod engine;
pub mod errors;
pub mod events;
pub mod frame;
pub mod input;
pub mod plugin;
pub mod registry;
pub mod router;
pub mod session;
pub mod ui;

pub use errors::{BridgeError, CommandError};
pub use plugin::WebviewPlugin;
pub use session::{SessionId, SessionState};
