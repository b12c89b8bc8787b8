//! Client engine for signed, asynchronously-dispatched commands.
//!
//! Callers build a [`signpost_types::Command`], sign it with an
//! [`signpost_types::Identity`], and hand it to an [`Engine`] that assigns a
//! correlation id, registers the request, and sends the frame through a
//! caller-supplied [`Transport`]. The transport's delivery task feeds
//! complete response frames back via [`Engine::handle_frame`], which
//! resolves the matching request: waking a blocked waiter, invoking a
//! completion callback, or parking the result for a later poll.

pub mod classifier;
pub mod engine;
pub mod metrics;
pub mod transport;

pub use classifier::ErrorKind;
pub use engine::{Engine, EngineConfig, Mode, Outcome};
pub use metrics::MetricsSnapshot;
pub use transport::{Transport, TransportError};

use signpost_types::{canonical, command};
use std::time::Duration;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("canonical encoding failed: {0}")]
    Encoding(canonical::Error),
    #[error("invalid key or signature material: {0}")]
    Crypto(String),
    #[error("command rejected before dispatch: {0}")]
    Command(command::Error),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("timed out waiting for response to {id} after {waited:?}")]
    Timeout { id: u64, waited: Duration },
    #[error("rejected by backend ({kind:?}, token {token}): {detail}")]
    Rejected {
        kind: ErrorKind,
        token: String,
        detail: String,
    },
    #[error("no blocking wait registered for id {0}")]
    UnknownWaiter(u64),
    #[error("response channel closed")]
    ChannelClosed,
}

impl From<command::Error> for Error {
    fn from(err: command::Error) -> Self {
        match err {
            command::Error::Canonical(inner) => Error::Encoding(inner),
            other => Error::Command(other),
        }
    }
}

impl From<canonical::Error> for Error {
    fn from(err: canonical::Error) -> Self {
        Error::Encoding(err)
    }
}

impl From<signpost_types::identity::Error> for Error {
    fn from(err: signpost_types::identity::Error) -> Self {
        Error::Crypto(err.to_string())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
