/// Errors from parsing or rendering protocol lines.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The request line contained no tokens.
    #[error("empty request line")]
    EmptyLine,

    /// The first token is not a known command.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// A command received the wrong number of arguments.
    #[error("{command} expects {expected} argument(s), got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },

    /// An escape sequence was truncated or not valid hex.
    #[error("invalid escape sequence at byte {pos}")]
    BadEscape { pos: usize },

    /// BATCHPUT key and value lists differ in length.
    #[error("batch length mismatch: {keys} key(s), {values} value(s)")]
    BatchMismatch { keys: usize, values: usize },

    /// A line exceeded the protocol's size cap.
    #[error("line of {size} bytes exceeds maximum of {max}")]
    LineTooLong { size: usize, max: usize },

    /// A range response line is missing its key/value separator.
    #[error("malformed range line")]
    MalformedRangeLine,
}

/// Result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
