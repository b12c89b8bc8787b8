//! Transport seam.
//!
//! The engine never performs network I/O itself. A transport collaborator
//! delivers outbound frames and, from its own delivery task, calls
//! [`crate::Engine::handle_frame`] for every complete response frame.
//! Framing, TLS, and reconnection all live behind this trait.

use bytes::Bytes;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("send failed: {0}")]
    Io(String),
}

/// Outbound half of the transport collaborator.
///
/// `send` may block briefly (e.g. on socket backpressure); that latency is
/// attributed to the caller's dispatch, not hidden behind a queue.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        frame: Bytes,
    ) -> impl Future<Output = std::result::Result<(), TransportError>> + Send;
}
