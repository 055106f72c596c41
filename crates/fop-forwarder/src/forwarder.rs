use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use fop_core::config::Config;
use fop_core::engine::EngineHandle;
use fop_core::events::UiEvent;

use crate::debounce::{Debouncer, DEFAULT_WINDOW};
use crate::error::ForwarderError;
use crate::sink::Sink;
use crate::snapshot::{Identity, Payload, Snapshot};

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub identity: Identity,
    pub queue_capacity: usize,
    pub debounce: Duration,
}

impl ForwarderConfig {
    pub fn from_config(config: &Config, fop: &str) -> Self {
        Self {
            identity: Identity {
                competition_name: config.competition.name.clone(),
                fop_name: fop.to_string(),
                update_key: config.remote.update_key.clone(),
                labels: config.labels.clone(),
            },
            queue_capacity: config.remote.queue_capacity,
            debounce: DEFAULT_WINDOW,
        }
    }
}

// ─── Forwarder ─────────────────────────────────────────────────────────────

/// Mirrors one platform to a [`Sink`].
///
/// A subscriber task folds UI events into a [`Snapshot`] and queues the
/// payloads that pass the debouncer; a worker task drains the queue. The
/// engine never waits on the network: a full queue drops the payload.
pub struct Forwarder {
    fop: String,
    subscriber: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl Forwarder {
    pub fn spawn<S: Sink>(engine: &EngineHandle, config: ForwarderConfig, sink: Arc<S>) -> Self {
        let fop = engine.name().to_string();
        let mut events = engine.subscribe();
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        let worker = tokio::spawn(deliver(fop.clone(), rx, sink));

        let engine = engine.clone();
        let mut relay = Relay {
            fop: fop.clone(),
            snapshot: Snapshot::new(config.identity),
            debouncer: Debouncer::new(config.debounce),
            tx,
        };
        let subscriber = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    received = events.recv() => match received {
                        Ok(event) => relay.forward(&event),
                        Err(RecvError::Lagged(missed)) => {
                            warn!(fop = %relay.fop, missed, "forwarder lagged behind engine");
                            let payload = relay.snapshot.update_payload();
                            relay.enqueue(payload);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = engine.closed() => {
                        while let Ok(event) = events.try_recv() {
                            relay.forward(&event);
                        }
                        break;
                    }
                }
            }
            debug!(fop = %relay.fop, "forwarder subscriber finished");
        });

        info!(fop = %fop, "forwarder started");
        Self {
            fop,
            subscriber,
            worker,
        }
    }

    pub fn fop(&self) -> &str {
        &self.fop
    }

    /// Wait until the engine has closed and every queued payload was attempted.
    pub async fn join(self) {
        if let Err(e) = self.subscriber.await {
            warn!(fop = %self.fop, error = %e, "forwarder subscriber failed");
        }
        if let Err(e) = self.worker.await {
            warn!(fop = %self.fop, error = %e, "forwarder worker failed");
        }
    }

    pub fn abort(&self) {
        self.subscriber.abort();
        self.worker.abort();
    }
}

struct Relay {
    fop: String,
    snapshot: Snapshot,
    debouncer: Debouncer,
    tx: mpsc::Sender<Payload>,
}

impl Relay {
    fn forward(&mut self, event: &UiEvent) {
        for payload in self.snapshot.apply(event) {
            if self.debouncer.admit(&payload, Instant::now()) {
                self.enqueue(payload);
            }
        }
    }

    fn enqueue(&self, payload: Payload) {
        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => {
                warn!(fop = %self.fop, channel = %p.channel, "{}", ForwarderError::QueueFull);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(fop = %self.fop, "{}", ForwarderError::Closed);
            }
        }
    }
}

async fn deliver<S: Sink>(fop: String, mut rx: mpsc::Receiver<Payload>, sink: Arc<S>) {
    while let Some(payload) = rx.recv().await {
        match sink.push(&payload).await {
            Ok(()) => {}
            Err(e @ ForwarderError::Status { .. }) => {
                error!(fop = %fop, channel = %payload.channel, "{e}");
            }
            Err(e) => {
                warn!(fop = %fop, channel = %payload.channel, error = %e, "mirror unreachable");
            }
        }
    }
    debug!(fop = %fop, "forwarder worker finished");
}
