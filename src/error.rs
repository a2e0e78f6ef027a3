use crate::{config, store};
use std::error::Error as StdError;
use std::fmt;

/// Errors that abort the summarize step.
///
/// Backend failures are not represented here; they are folded into the
/// stored summary instead.
#[derive(Debug)]
pub enum Error {
    /// The step could not be configured.
    Config(config::Error),
    /// The interim result could not be read or written back.
    Storage(store::Error),
    /// Failed to start the async runtime.
    Runtime(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "configuration: {}", err),
            Error::Storage(err) => write!(f, "storage: {}", err),
            Error::Runtime(err) => write!(f, "runtime: {}", err),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Storage(err) => Some(err),
            Error::Runtime(err) => Some(err),
        }
    }
}

impl From<config::Error> for Error {
    fn from(err: config::Error) -> Self {
        Error::Config(err)
    }
}

impl From<store::Error> for Error {
    fn from(err: store::Error) -> Self {
        Error::Storage(err)
    }
}
