use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Cause handed over by user code, kept as is so callers can downcast it back to their own type.
pub type UserError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Cause handed to [crate::Canceller::cancel] (or returned) by a user callback.
    #[error("Cancelled - {0}")]
    Cancelled(UserError),

    /// The run was cancelled without a cause.
    #[error("mapreduce cancelled with nil")]
    CancelledWithNil,

    /// A user callback panicked, carries the panic payload.
    #[error("Panic - {0}")]
    Panic(String),

    /// The reducer completed without writing a value.
    #[error("reduce not writing value")]
    ReduceNoOutput,

    #[error("Join Error - {0}")]
    Join(String),

    #[error("Config Error - {0}")]
    Config(String),
}

impl Error {
    /// Wraps a user error (or a plain message) as a cancellation cause.
    pub fn cancelled(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Cancelled(Arc::from(cause.into()))
    }

    /// Returns the user error behind [Error::Cancelled] if it is of type `E`.
    pub fn user_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Error::Cancelled(cause) => cause.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// User causes compare by identity, two distinct errors are never equal even if their messages
/// are.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Cancelled(a), Error::Cancelled(b)) => Arc::ptr_eq(a, b),
            (Error::CancelledWithNil, Error::CancelledWithNil)
            | (Error::ReduceNoOutput, Error::ReduceNoOutput) => true,
            (Error::Panic(a), Error::Panic(b))
            | (Error::Join(a), Error::Join(b))
            | (Error::Config(a), Error::Config(b)) => a == b,
            _ => false,
        }
    }
}
