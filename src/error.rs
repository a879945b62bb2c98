use std::{io, result, time::Duration};
use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The os refused to create the thread. The `Thread` is left unstarted.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    /// The thread attributes could not be set up.
    #[error("invalid thread attributes: {0}")]
    Attr(#[source] io::Error),

    /// `pthread_join` reported a failure. The `Thread` still counts as joined.
    #[error("failed to join thread: {0}")]
    Join(#[source] io::Error),

    /// A signal cut the sleep short.
    #[error("sleep interrupted with {remaining:?} left")]
    Interrupted { remaining: Duration },

    #[error("sleep failed: {0}")]
    Sleep(#[source] io::Error),
}

impl Error {
    /// The raw os error code behind this error, if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Spawn(e) | Self::Attr(e) | Self::Join(e) | Self::Sleep(e) => e.raw_os_error(),
            Self::Interrupted { .. } => Some(libc::EINTR),
        }
    }
}
