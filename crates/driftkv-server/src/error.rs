/// Errors from server startup and the accept loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Engine(#[from] driftkv_engine::EngineError),

    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
