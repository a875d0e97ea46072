//! Bus ingest worker
//!
//! The API server's side of the log relay: one wildcard subscription
//! covers every deployment. Log payloads are forwarded verbatim to the
//! in-process fan-out for viewers; typed status events additionally drive
//! the persisted lifecycle, so the orchestrator never parses sentinel
//! strings out of log text.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bus::{logs_channel, status_channel, LogBus};
use crate::errors::BerthError;
use crate::models::deployment::DeploymentStatus;
use crate::models::events::BuildEvent;
use crate::mqtt::client::{BusAddress, BusClient, BusMessage};
use crate::mqtt::topics::Topics;
use crate::store::DeploymentStore;

/// Ingest worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Broker address
    pub bus_address: BusAddress,

    /// Reconnect delay on failure
    pub reconnect_delay: Duration,

    /// Max consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            bus_address: BusAddress::default(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
        }
    }
}

/// Run the ingest worker until shutdown
pub async fn run(
    options: &Options,
    bus: Arc<LogBus>,
    store: Arc<dyn DeploymentStore>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    if !options.bus_address.is_configured() {
        info!("Bus host not configured, ingest worker will not start.");
        return;
    }

    info!("Ingest worker starting...");
    let mut reconnect_attempts = 0;

    loop {
        let client_id = format!("berth-api-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let mut client = match BusClient::connect(&options.bus_address, &client_id) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to create bus client: {}", e);
                return;
            }
        };

        if let Err(e) = client.subscribe_streams().await {
            error!("Failed to subscribe to bus streams: {}", e);
        } else {
            reconnect_attempts = 0;

            loop {
                tokio::select! {
                    _ = &mut shutdown_signal => {
                        info!("Ingest worker shutting down...");
                        let _ = client.disconnect().await;
                        return;
                    }
                    polled = client.poll() => {
                        match polled {
                            Ok(Some(message)) => {
                                handle_message(&message, bus.as_ref(), store.as_ref()).await;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!("Bus connection lost: {}, reconnecting...", e);
                                break;
                            }
                        }
                    }
                }
            }
        }

        reconnect_attempts += 1;
        if reconnect_attempts >= options.max_reconnect_attempts {
            error!("Max bus reconnect attempts reached, giving up");
            return;
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Ingest worker shutting down...");
                return;
            }
            _ = tokio::time::sleep(options.reconnect_delay) => {}
        }
    }
}

async fn handle_message(message: &BusMessage, bus: &LogBus, store: &dyn DeploymentStore) {
    let Some(deployment_id) = Topics::parse_deployment_id(&message.topic) else {
        warn!("Ignoring message on unexpected topic: {}", message.topic);
        return;
    };

    if Topics::is_logs_topic(&message.topic) {
        bus.publish(&logs_channel(&deployment_id), message.text()).await;
        return;
    }

    if Topics::is_status_topic(&message.topic) {
        match message.parse_json::<BuildEvent>() {
            Ok(event) => {
                if let Err(e) = apply_status_event(store, &event).await {
                    warn!("Could not apply status event for {}: {}", deployment_id, e);
                }
                bus.publish(&status_channel(&deployment_id), message.text()).await;
            }
            Err(e) => warn!("Undecodable status event on {}: {}", message.topic, e),
        }
    }
}

/// Map a typed build event onto the persisted lifecycle.
///
/// READY means "artifacts published", so it fires on `upload_complete`;
/// `complete` only marks the end of the build command and is informational.
pub async fn apply_status_event(
    store: &dyn DeploymentStore,
    event: &BuildEvent,
) -> Result<(), BerthError> {
    let status = match event {
        BuildEvent::Started { .. } => DeploymentStatus::InProgress,
        BuildEvent::Failed { .. } => DeploymentStatus::Failed,
        BuildEvent::UploadComplete { .. } => DeploymentStatus::Ready,
        BuildEvent::Complete { .. } => return Ok(()),
    };

    store.update_status(event.deployment_id(), status).await
}
