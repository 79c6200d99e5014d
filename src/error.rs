//! Error types for session-hub.

use thiserror::Error;

use crate::session::LifecycleState;

/// Broad classification of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Driver wiring is wrong: unknown name, duplicate, missing backend.
    Configuration,
    /// A lifecycle method was called in the wrong state.
    State,
    /// A looked-up attribute or id does not exist or is malformed.
    NotFound,
    /// The underlying storage failed.
    Backend,
}

/// Main error type for session-hub operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No driver is registered under the given name.
    #[error("driver not found: {0}")]
    DriverNotFound(String),

    /// No default driver has been selected yet.
    #[error("no default driver selected")]
    NoDefaultDriver,

    /// A driver with the given name is already registered.
    #[error("driver already exists: {0}")]
    DriverExists(String),

    /// The storage backend required by a driver is missing or disabled.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A reserved cache key that a session id could also take.
    #[error("index key collides with the session id alphabet: {0:?}")]
    InvalidIndexKey(String),

    /// The host session engine is disabled.
    #[error("session engine is disabled")]
    EngineDisabled,

    /// The session store has not been opened yet.
    #[error("session store is not initialized")]
    NotInitialized,

    /// A session is already active.
    #[error("session already active")]
    AlreadyActive,

    /// The operation needs an active session.
    #[error("no active session")]
    NotActive,

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// The session name cannot change while a session is active.
    #[error("cannot change session name while a session is active")]
    NameLocked,

    /// The host engine refused to start the session.
    #[error("session start failed: {0}")]
    StartFailed(String),

    /// Attribute with the given key is not set.
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    /// Attribute exists but does not hold a sequence.
    #[error("attribute is not a sequence: {0}")]
    NotASequence(String),

    /// String is not a valid session id.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// Storage backend error.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl SessionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use SessionError::*;
        match self {
            DriverNotFound(_)
            | NoDefaultDriver
            | DriverExists(_)
            | BackendUnavailable(_)
            | InvalidIndexKey(_) => ErrorKind::Configuration,
            EngineDisabled
            | NotInitialized
            | AlreadyActive
            | NotActive
            | InvalidStateTransition { .. }
            | NameLocked
            | StartFailed(_) => ErrorKind::State,
            AttributeNotFound(_) | NotASequence(_) | InvalidSessionId(_) => ErrorKind::NotFound,
            Backend(_) | Io(_) | Serialization(_) | LockPoisoned => ErrorKind::Backend,
        }
    }
}

/// Convenience Result type for session-hub operations.
pub type Result<T> = std::result::Result<T, SessionError>;
