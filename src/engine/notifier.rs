use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::event::DomainEvent;
use crate::models::notification::{Notification, NotificationKind};
use crate::state::AppState;

/// Outbound real-time channel. Delivery is best-effort.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<(), AppError>;
}

pub struct BroadcastSink {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<DomainEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &DomainEvent) -> Result<(), AppError> {
        if self.tx.send(event.clone()).is_err() {
            debug!(event = event.name(), "no websocket subscribers for event");
        }
        Ok(())
    }
}

/// Hands `event` to the sink. Failures are logged and dropped; persisted
/// state is the source of truth.
pub fn emit(state: &AppState, event: DomainEvent) {
    match state.event_sink.publish(&event) {
        Ok(()) => {
            state
                .metrics
                .events_total
                .with_label_values(&["published"])
                .inc();
        }
        Err(err) => {
            state
                .metrics
                .events_total
                .with_label_values(&["dropped"])
                .inc();
            warn!(event = event.name(), error = %err, "event broadcast failed; dropping");
        }
    }
}

pub fn notify_user(
    state: &AppState,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
) {
    state
        .store
        .push_notification(Notification::new(user_id, kind, title, message));
}
