/// Errors from store command execution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The key holds a value of a different type than the command expects.
    #[error("WRONGTYPE operation against key {key} holding the wrong kind of value")]
    WrongType { key: String },

    /// A value or argument that must be an integer is not one.
    #[error("value is not an integer or out of range: {0:?}")]
    NotInteger(String),

    /// A value or argument that must be a float is not one.
    #[error("value is not a valid float: {0:?}")]
    NotFloat(String),

    /// The command was given the wrong number of arguments.
    #[error("wrong number of arguments for '{command}'")]
    Arity { command: String },

    /// Malformed arguments or a command-specific failure.
    #[error("{command}: {message}")]
    Command { command: String, message: String },

    /// The backend does not implement this command.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// The reply does not have the shape the caller expected.
    #[error("unexpected reply: expected {expected}, got {found}")]
    UnexpectedReply {
        expected: &'static str,
        found: String,
    },

    /// Connection or transport failure reported by the client.
    #[error("transport error: {0}")]
    Transport(String),

    /// An internal lock was poisoned by a panicking thread.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    /// Create a command error with a name and message.
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
