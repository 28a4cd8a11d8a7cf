/// Errors produced while dispatching a host command.
///
/// None of these terminate a session; they are returned to the caller as the
/// command response. Only an explicit `dispose` (or the engine's own close
/// sequence) ends a session.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Command issued before the engine confirmed browser creation.
    #[error("browser not ready yet")]
    NotReady,

    /// A required command argument is missing.
    #[error("{0} is required")]
    MissingArgument(&'static str),

    /// A command argument has the wrong shape or type.
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// Unknown command name.
    #[error("not implemented")]
    NotImplemented,

    /// No session is registered under the given browser id.
    #[error("no browser with id {0}")]
    UnknownBrowser(i32),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Internal bridge failures (task queue, engine seam).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("engine ui task queue is closed")]
    QueueClosed,

    #[error("reply channel dropped before completion")]
    ReplyDropped,

    #[error("engine error: {0}")]
    Engine(String),
}
