//! Correlation engine: id assignment, dispatch, and response demultiplexing.
//!
//! One `Engine` per client connection. Multiple caller tasks may dispatch
//! and wait concurrently; exactly one delivery task (owned by the transport
//! collaborator) feeds frames into [`Engine::handle_frame`]. All shared
//! state lives behind the engine's own locks; there are no process-wide
//! singletons.

use crate::{
    classifier,
    metrics::Metrics,
    transport::Transport,
    Error, Result,
};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use signpost_types::{wire::Response, wire::Status, Command, Identity, SignedCommand};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Ids are drawn from `0..2^63` so they always fit a signed 64-bit integer
/// on the wire.
const ID_SPACE: u64 = 1 << 63;

/// The resolution of a single dispatched command.
pub type Outcome = Result<Value>;

type Callback = Box<dyn FnOnce(u64, Outcome) + Send + 'static>;

/// Completion mode for a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The caller will block on [`Engine::wait`].
    Blocking,
    /// The caller polls [`Engine::try_take`] (or registered a callback).
    FireAndForget,
}

enum Completion {
    /// Per-request wakeup for a blocked waiter.
    Waiter(oneshot::Sender<Outcome>),
    /// Invoked from the delivery task on resolution.
    Callback(Callback),
    /// Result parked for a later poll.
    Poll,
}

struct PendingRequest {
    issued: Instant,
    completion: Completion,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Timeout applied by [`Engine::execute_default`].
    pub default_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Signed command dispatch and correlation engine.
pub struct Engine<T: Transport> {
    transport: Arc<T>,
    config: EngineConfig,
    /// In-flight requests by correlation id. The single piece of state the
    /// dispatch paths and the delivery task contend on.
    pending: Mutex<HashMap<u64, PendingRequest>>,
    /// Parked receivers for blocking dispatches, claimed by `wait`.
    waiters: Mutex<HashMap<u64, oneshot::Receiver<Outcome>>>,
    /// Resolved fire-and-forget outcomes awaiting pickup.
    completed: Mutex<HashMap<u64, Outcome>>,
    metrics: Metrics,
}

impl<T: Transport> Engine<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            pending: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
            metrics: Metrics::default(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Draw a fresh id and register the request under one lock acquisition,
    /// so two concurrent dispatches can never share an id. The retry loop is
    /// unbounded: with 63 bits of id space, a busy table is astronomically
    /// unlikely to collide more than once.
    fn register(&self, completion: Completion) -> u64 {
        let mut rng = rand::thread_rng();
        let mut pending = self.pending.lock();
        let id = loop {
            let candidate = rng.gen_range(0..ID_SPACE);
            if !pending.contains_key(&candidate) {
                break candidate;
            }
        };
        pending.insert(
            id,
            PendingRequest {
                issued: Instant::now(),
                completion,
            },
        );
        id
    }

    fn remove(&self, id: u64) {
        self.pending.lock().remove(&id);
        self.waiters.lock().remove(&id);
    }

    /// Dispatch a signed command. Returns the correlation id on success; on
    /// a transport failure the registration is removed before the error
    /// surfaces, so nothing leaks into the table.
    pub async fn dispatch(&self, signed: &SignedCommand, mode: Mode) -> Result<u64> {
        let (completion, receiver) = match mode {
            Mode::Blocking => {
                let (tx, rx) = oneshot::channel();
                (Completion::Waiter(tx), Some(rx))
            }
            Mode::FireAndForget => (Completion::Poll, None),
        };
        self.dispatch_inner(signed, completion, receiver).await
    }

    /// Fire-and-forget dispatch whose resolution invokes `callback` (from
    /// the delivery task) instead of being parked for polling.
    pub async fn dispatch_with_callback<F>(&self, signed: &SignedCommand, callback: F) -> Result<u64>
    where
        F: FnOnce(u64, Outcome) + Send + 'static,
    {
        self.dispatch_inner(signed, Completion::Callback(Box::new(callback)), None)
            .await
    }

    async fn dispatch_inner(
        &self,
        signed: &SignedCommand,
        completion: Completion,
        receiver: Option<oneshot::Receiver<Outcome>>,
    ) -> Result<u64> {
        let id = self.register(completion);
        if let Some(receiver) = receiver {
            self.waiters.lock().insert(id, receiver);
        }

        let frame = match signed.to_frame(id) {
            Ok(frame) => frame,
            Err(err) => {
                self.remove(id);
                return Err(err.into());
            }
        };

        if let Err(err) = self.transport.send(frame).await {
            self.remove(id);
            return Err(Error::Transport(err));
        }
        self.metrics.record_dispatched();
        Ok(id)
    }

    /// Block until the response for `id` arrives or `timeout` elapses.
    ///
    /// `Duration::ZERO` waits indefinitely. On timeout the registration is
    /// removed, so a response arriving afterwards is discarded by the
    /// demultiplexer; the timeout is terminal and retries are the caller's
    /// business.
    pub async fn wait(&self, id: u64, timeout: Duration) -> Result<Value> {
        let receiver = self
            .waiters
            .lock()
            .remove(&id)
            .ok_or(Error::UnknownWaiter(id))?;

        if timeout.is_zero() {
            return receiver.await.map_err(|_| Error::ChannelClosed)?;
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                self.metrics.record_timeout();
                debug!(id, ?timeout, "wait timed out; request discarded");
                Err(Error::Timeout { id, waited: timeout })
            }
        }
    }

    /// Sign, dispatch, and wait for the result.
    pub async fn execute(
        &self,
        command: &Command,
        identity: &Identity,
        timeout: Duration,
    ) -> Result<Value> {
        let signed = command.sign(identity)?;
        let id = self.dispatch(&signed, Mode::Blocking).await?;
        self.wait(id, timeout).await
    }

    /// [`Engine::execute`] with the configured default timeout.
    pub async fn execute_default(&self, command: &Command, identity: &Identity) -> Result<Value> {
        self.execute(command, identity, self.config.default_timeout)
            .await
    }

    /// Sign and dispatch fire-and-forget; the outcome is picked up later via
    /// [`Engine::try_take`].
    pub async fn submit(&self, command: &Command, identity: &Identity) -> Result<u64> {
        let signed = command.sign(identity)?;
        self.dispatch(&signed, Mode::FireAndForget).await
    }

    /// Poll for the outcome of a fire-and-forget dispatch. Returns the
    /// outcome at most once; subsequent polls for the same id see `None`.
    pub fn try_take(&self, id: u64) -> Option<Outcome> {
        self.completed.lock().remove(&id)
    }

    /// Demultiplex one response frame.
    ///
    /// Called by the transport collaborator's delivery task for every
    /// complete frame. Never panics and never propagates errors: a stalled
    /// delivery task would stall every other in-flight response. Duplicate,
    /// late, and unknown-id frames are logged and dropped; removal of the
    /// pending record on first resolution is what makes resolution
    /// exactly-once.
    pub fn handle_frame(&self, frame: &[u8]) {
        let response = match Response::from_frame(frame) {
            Ok(response) => response,
            Err(err) => {
                self.metrics.record_malformed();
                warn!(error = %err, len = frame.len(), "dropping malformed response frame");
                return;
            }
        };
        let id = response.id;

        let outcome: Outcome = match response.status {
            Status::Ok => Ok(response.payload),
            Status::Null => Ok(Value::Null),
            Status::Bad { token, detail } => Err(Error::Rejected {
                kind: classifier::classify(&token),
                token,
                detail,
            }),
        };

        let Some(request) = self.pending.lock().remove(&id) else {
            self.metrics.record_late_drop();
            debug!(id, "dropping response with no pending request");
            return;
        };

        self.metrics
            .record_resolved(request.issued.elapsed(), outcome.is_err());

        match request.completion {
            Completion::Waiter(sender) => {
                if sender.send(outcome).is_err() {
                    // Waiter raced a timeout between reap and delivery.
                    debug!(id, "waiter gone before delivery");
                }
            }
            Completion::Callback(callback) => callback(id, outcome),
            Completion::Poll => {
                self.completed.lock().insert(id, outcome);
            }
        }
    }
}
