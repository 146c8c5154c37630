use std::sync::Arc;

use tokio::sync::broadcast;

use crate::engine::notifier::{BroadcastSink, EventSink};
use crate::models::event::DomainEvent;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Store,
    pub events_tx: broadcast::Sender<DomainEvent>,
    pub event_sink: Arc<dyn EventSink>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);
        let event_sink = Arc::new(BroadcastSink::new(events_tx.clone()));

        Self {
            store: Store::new(),
            events_tx,
            event_sink,
            metrics: Metrics::new(),
        }
    }

    /// Replaces the outbound event sink, e.g. with an external broadcaster.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }
}
