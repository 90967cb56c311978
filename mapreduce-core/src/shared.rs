use std::any::Any;

use tokio::task::JoinError;

use crate::{Error, Result};

/// Collapses the outcome of a task running a user callback into the callback's own result. A
/// panic inside the task becomes [Error::Panic] carrying the panic payload.
pub(crate) fn callback_outcome(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(Error::Panic(panic_message(e.into_panic()))),
        Err(e) => Err(Error::Join(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
