//! Build log publication
//!
//! [`LogSink`] is the executor's one outlet for progress: numbered log
//! lines plus typed lifecycle events. The production sink publishes over
//! the message bus; tests collect in memory.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::warn;

use crate::models::events::{BuildEvent, LogLine};
use crate::mqtt::client::BusPublisher;

/// Where the executor's output goes
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Emit one line of build output
    async fn line(&self, text: &str);

    /// Emit a lifecycle event (also mirrored as its sentinel log line)
    async fn event(&self, event: BuildEvent);
}

/// Bus-backed sink. Owns the sequence counter for one build run; lifecycle
/// events go to the status topic as typed variants and are mirrored into
/// the log stream as sentinel lines.
pub struct BuildLogger {
    publisher: BusPublisher,
    deployment_id: String,
    seq: AtomicU64,
}

impl BuildLogger {
    pub fn new(publisher: BusPublisher, deployment_id: String) -> Self {
        Self {
            publisher,
            deployment_id,
            seq: AtomicU64::new(0),
        }
    }

    /// Flush and release the bus connection. Must run on every exit path.
    pub async fn close(self) {
        self.publisher.close().await;
    }
}

#[async_trait]
impl LogSink for BuildLogger {
    /// Delivery is best-effort: a bus hiccup is logged locally and the
    /// build carries on.
    async fn line(&self, text: &str) {
        let line = LogLine {
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            log: text.to_string(),
        };
        if let Err(e) = self.publisher.publish_line(&self.deployment_id, &line).await {
            warn!("Failed to publish log line: {}", e);
        }
    }

    async fn event(&self, event: BuildEvent) {
        self.line(&event.sentinel()).await;
        if let Err(e) = self.publisher.publish_event(&event).await {
            warn!("Failed to publish build event: {}", e);
        }
    }
}
