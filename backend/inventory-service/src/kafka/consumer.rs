//! Inventory consumer loop
//!
//! Pulls batches from an [`EventSource`], decodes and handles each event in
//! delivery order, and commits the batch once every event has been dealt
//! with. Failures are contained per event. Transport errors trigger a
//! resubscribe with bounded exponential backoff; when the budget runs out
//! the loop parks in `Faulted` for external supervision.

use super::source::{EventSource, RawEvent};
use crate::error::ProcessingError;
use crate::events::{self, DecodedEvent};
use crate::metrics;
use crate::services::EventHandler;
use resilience::{Backoff, RetryConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Stopped,
    Running,
    /// Reconnect budget exhausted; no longer receiving
    Faulted,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Stopped => "stopped",
            ConsumerState::Running => "running",
            ConsumerState::Faulted => "faulted",
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ConsumerState::Stopped => 0,
            ConsumerState::Running => 1,
            ConsumerState::Faulted => 2,
        }
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self, ConsumerState::Faulted)
    }
}

pub struct InventoryConsumer<S> {
    source: S,
    handler: Arc<EventHandler>,
    reconnect: RetryConfig,
    state: watch::Sender<ConsumerState>,
}

enum Exit {
    Shutdown,
    Closed,
    Transport(String),
}

impl<S: EventSource> InventoryConsumer<S> {
    pub fn new(source: S, handler: Arc<EventHandler>, reconnect: RetryConfig) -> Self {
        let (state, _) = watch::channel(ConsumerState::Stopped);
        Self {
            source,
            handler,
            reconnect,
            state,
        }
    }

    /// Subscribe to state transitions (read by `/health`)
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConsumerState) {
        metrics::set_consumer_state(next.code());
        self.state.send_replace(next);
        info!(state = next.as_str(), "Consumer state changed");
    }

    /// Run until `shutdown` resolves, the source closes, or reconnects are exhausted.
    /// Returns the final state.
    pub async fn run<F>(mut self, shutdown: F) -> ConsumerState
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut backoff = Backoff::new(self.reconnect.clone());

        loop {
            let subscribed = tokio::select! {
                _ = &mut shutdown => None,
                result = self.source.subscribe() => Some(result),
            };
            let Some(subscribed) = subscribed else {
                return self.finish(ConsumerState::Stopped);
            };

            let cause = match subscribed {
                Ok(()) => {
                    self.set_state(ConsumerState::Running);
                    match self.consume(&mut shutdown, &mut backoff).await {
                        Exit::Shutdown => {
                            info!("Shutdown requested, stopping consumer");
                            return self.finish(ConsumerState::Stopped);
                        }
                        Exit::Closed => {
                            info!("Event source closed");
                            return self.finish(ConsumerState::Stopped);
                        }
                        Exit::Transport(cause) => cause,
                    }
                }
                Err(e) => e.to_string(),
            };

            let Some(delay) = backoff.next_delay() else {
                error!(
                    error = %cause,
                    attempts = backoff.attempt(),
                    "Reconnect budget exhausted, consumer faulted"
                );
                return self.finish(ConsumerState::Faulted);
            };

            error!(
                error = %cause,
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Event source error, reconnecting"
            );

            tokio::select! {
                _ = &mut shutdown => return self.finish(ConsumerState::Stopped),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn finish(&self, state: ConsumerState) -> ConsumerState {
        self.set_state(state);
        state
    }

    async fn consume<F>(&mut self, shutdown: &mut std::pin::Pin<&mut F>, backoff: &mut Backoff) -> Exit
    where
        F: Future<Output = ()>,
    {
        loop {
            let next = tokio::select! {
                _ = shutdown.as_mut() => return Exit::Shutdown,
                next = self.source.next_batch() => next,
            };

            let batch = match next {
                Ok(Some(batch)) => batch,
                Ok(None) => return Exit::Closed,
                Err(e) => return Exit::Transport(e.to_string()),
            };

            backoff.reset();
            metrics::observe_batch_size(batch.len());
            for raw in &batch {
                process_raw(&self.handler, raw).await;
            }

            if let Err(e) = self.source.commit(&batch).await {
                warn!(error = %e, size = batch.len(), "Failed to commit batch, events may be redelivered");
            }
        }
    }
}

async fn process_raw(handler: &EventHandler, raw: &RawEvent) {
    let decoded = match events::decode(&raw.payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            log_event_failure(raw, "undecoded", &e);
            metrics::record_event("undecoded", e.kind());
            return;
        }
    };

    let DecodedEvent {
        event,
        rejected_items,
    } = decoded;

    for rejected in &rejected_items {
        warn!(
            partition = raw.partition,
            offset = raw.offset,
            event = event.name(),
            item = rejected.index,
            reason = %rejected.reason,
            "Skipping malformed cart item"
        );
        metrics::record_quantity_adjustment("malformed_event");
    }

    match handler.process(&event).await {
        Ok(report) => metrics::record_event(event.name(), report.outcome(rejected_items.len())),
        Err(e) => {
            log_event_failure(raw, event.name(), &e);
            metrics::record_event(event.name(), e.kind());
        }
    }
}

fn log_event_failure(raw: &RawEvent, event: &str, err: &ProcessingError) {
    if err.is_policy_rejection() {
        warn!(
            partition = raw.partition,
            offset = raw.offset,
            event,
            kind = err.kind(),
            error = %err,
            "Dropping event"
        );
    } else {
        error!(
            partition = raw.partition,
            offset = raw.offset,
            event,
            kind = err.kind(),
            error = %err,
            "Failed to process event"
        );
    }
}
