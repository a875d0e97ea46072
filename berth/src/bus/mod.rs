//! In-process log fan-out
//!
//! One lazily-created broadcast channel per stream key. Publishing is
//! fire-and-forget: no subscribers means the payload is dropped, and a slow
//! subscriber lags and loses the oldest retained payloads without slowing
//! the publisher or its peers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Default per-subscriber queue depth
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Build the bus key for a deployment's log stream
pub fn logs_channel(deployment_id: &str) -> String {
    format!("logs:{}", deployment_id)
}

/// Build the bus key for a deployment's status stream
pub fn status_channel(deployment_id: &str) -> String {
    format!("status:{}", deployment_id)
}

/// Channel-keyed publish/subscribe bus for raw payload strings
pub struct LogBus {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl LogBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a payload to a channel. Never blocks and never fails: with no
    /// live subscribers the payload is discarded, there is no backlog.
    pub async fn publish(&self, channel: &str, payload: String) {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(sender) => sender.send(payload).unwrap_or(0),
                None => 0,
            }
        };

        if delivered == 0 {
            // Nobody was listening; drop any idle sender so channels for
            // finished deployments do not accumulate.
            let mut channels = self.channels.write().await;
            if let Some(sender) = channels.get(channel) {
                if sender.receiver_count() == 0 {
                    channels.remove(channel);
                    debug!("Pruned idle channel {}", channel);
                }
            }
        }
    }

    /// Subscribe to a channel, creating it when absent. The receiver sees
    /// only payloads published after this call returns.
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        match channels.get(channel) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                channels.insert(channel.to_string(), sender);
                receiver
            }
        }
    }

    /// Number of live subscribers on a channel
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = LogBus::new();
        bus.publish("logs:x", "line 1".to_string()).await;

        // Joining afterwards must not replay anything.
        let mut rx = bus.subscribe("logs:x").await;
        bus.publish("logs:x", "line 2".to_string()).await;

        assert_eq!(rx.recv().await.unwrap(), "line 2");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delivery_in_publish_order() {
        let bus = LogBus::new();
        let mut rx = bus.subscribe("logs:x").await;

        for i in 0..10 {
            bus.publish("logs:x", format!("line {}", i)).await;
        }

        for i in 0..10 {
            assert_eq!(rx.recv().await.unwrap(), format!("line {}", i));
        }
    }

    #[tokio::test]
    async fn test_subscribers_are_isolated() {
        let bus = LogBus::new();
        let mut rx_a = bus.subscribe("logs:x").await;
        let rx_b = bus.subscribe("logs:x").await;

        // Dropping one subscriber must not affect the other.
        drop(rx_b);
        bus.publish("logs:x", "still here".to_string()).await;
        assert_eq!(rx_a.recv().await.unwrap(), "still here");
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let bus = LogBus::new();
        let mut rx_x = bus.subscribe("logs:x").await;
        let mut rx_y = bus.subscribe("logs:y").await;

        bus.publish("logs:x", "for x".to_string()).await;
        bus.publish("logs:y", "for y".to_string()).await;

        assert_eq!(rx_x.recv().await.unwrap(), "for x");
        assert_eq!(rx_y.recv().await.unwrap(), "for y");
        assert!(rx_x.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest() {
        let bus = LogBus::with_capacity(4);
        let mut rx = bus.subscribe("logs:x").await;

        for i in 0..10 {
            bus.publish("logs:x", format!("line {}", i)).await;
        }

        // The receiver lagged: it is told how much it missed, then resumes
        // from the oldest retained payload.
        match rx.recv().await {
            Err(RecvError::Lagged(missed)) => assert_eq!(missed, 6),
            other => panic!("expected lag, got {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap(), "line 6");
    }

    #[tokio::test]
    async fn test_idle_channel_pruned() {
        let bus = LogBus::new();
        let rx = bus.subscribe("logs:x").await;
        drop(rx);

        bus.publish("logs:x", "into the void".to_string()).await;
        assert_eq!(bus.subscriber_count("logs:x").await, 0);
    }
}
