//! Logging consumer for the event bus.
//!
//! External delivery (email, chat) is handled outside this service; the
//! logger keeps a structured trail of every event in the application log.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::AutopilotEvent;

pub struct EventLogger;

impl EventLogger {
    /// Log events until the bus closes or `cancel` fires.
    pub async fn run(mut receiver: broadcast::Receiver<AutopilotEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event logger stopping");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => Self::log(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, logger shutting down");
                        break;
                    }
                },
            }
        }
    }

    fn log(event: &AutopilotEvent) {
        tracing::info!(
            event_type = %event.event_type,
            site_id = %event.site_id,
            source_type = event.source_entity_type.as_deref().unwrap_or("-"),
            source_id = ?event.source_entity_id,
            payload = %event.payload,
            "Autopilot event",
        );
    }
}
