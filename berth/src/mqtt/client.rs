//! MQTT client wrappers for the log bus
//!
//! Two usage shapes: the API server owns a [`BusClient`] and polls it for
//! incoming publishes; the builder owns a [`BusPublisher`] whose event loop
//! runs on a background task so publishes are flushed while the build does
//! its work.

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::BerthError;
use crate::models::events::{BuildEvent, LogLine};
use crate::mqtt::topics::Topics;

/// Broker address
#[derive(Debug, Clone)]
pub struct BusAddress {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Optional path to a PEM-encoded CA certificate for broker verification.
    /// When `None` and `use_tls` is `true`, the system certificate store is used.
    pub ca_cert_path: Option<String>,
}

impl Default for BusAddress {
    fn default() -> Self {
        Self {
            host: "".to_string(),
            port: 1883,
            use_tls: false,
            ca_cert_path: None,
        }
    }
}

impl BusAddress {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

fn build_options(address: &BusAddress, client_id: &str) -> Result<MqttOptions, BerthError> {
    if address.host.is_empty() {
        return Err(BerthError::BusError("bus host is not configured".to_string()));
    }

    let mut options = MqttOptions::new(client_id, &address.host, address.port);
    options.set_keep_alive(std::time::Duration::from_secs(30));

    if address.use_tls {
        use rumqttc::{TlsConfiguration, Transport};
        use rustls::ClientConfig;
        use std::sync::Arc;

        let mut root_cert_store = rustls::RootCertStore::empty();

        if let Some(ref ca_path) = address.ca_cert_path {
            let ca_pem = std::fs::read(ca_path)
                .map_err(|e| BerthError::BusError(format!("Failed to read CA cert {ca_path}: {e}")))?;
            let mut cursor = std::io::Cursor::new(ca_pem);
            for cert in rustls_pemfile::certs(&mut cursor).flatten() {
                let _ = root_cert_store.add(cert);
            }
        } else {
            for cert in rustls_native_certs::load_native_certs().unwrap_or_default() {
                let _ = root_cert_store.add(cert);
            }
        }

        let client_config = ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        options.set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(
            Arc::new(client_config),
        )));
    }

    Ok(options)
}

/// Polling-side client used by the API server's ingest worker
pub struct BusClient {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl BusClient {
    pub fn connect(address: &BusAddress, client_id: &str) -> Result<Self, BerthError> {
        let options = build_options(address, client_id)?;
        let (client, eventloop) = AsyncClient::new(options, 64);
        Ok(Self { client, eventloop })
    }

    /// Subscribe to every deployment's log and status topics
    pub async fn subscribe_streams(&mut self) -> Result<(), BerthError> {
        self.client
            .subscribe(Topics::logs_wildcard(), QoS::AtMostOnce)
            .await
            .map_err(|e| BerthError::BusError(e.to_string()))?;
        self.client
            .subscribe(Topics::status_wildcard(), QoS::AtMostOnce)
            .await
            .map_err(|e| BerthError::BusError(e.to_string()))?;
        info!(
            "Subscribed to {} and {}",
            Topics::logs_wildcard(),
            Topics::status_wildcard()
        );
        Ok(())
    }

    /// Poll for the next incoming publish
    pub async fn poll(&mut self) -> Result<Option<BusMessage>, BerthError> {
        match self.eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!("Received bus message on topic: {}", publish.topic);
                Ok(Some(BusMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                }))
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Bus connected");
                Ok(None)
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                debug!("Subscription acknowledged");
                Ok(None)
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Bus poll error: {}", e);
                Err(BerthError::BusError(e.to_string()))
            }
        }
    }

    pub async fn disconnect(&mut self) -> Result<(), BerthError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BerthError::BusError(e.to_string()))?;
        Ok(())
    }
}

/// Publishing-side client used by the builder.
///
/// The event loop is spawned onto a background task; [`BusPublisher::close`]
/// disconnects and waits for it so queued publishes are flushed before the
/// process exits.
pub struct BusPublisher {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl BusPublisher {
    pub fn connect(address: &BusAddress, client_id: &str) -> Result<Self, BerthError> {
        let options = build_options(address, client_id)?;
        let (client, mut eventloop) = AsyncClient::new(options, 64);

        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => info!("Bus connected"),
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Bus event loop stopped: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self { client, driver })
    }

    /// Publish one log line. Fire-and-forget: QoS 0, no delivery guarantee.
    pub async fn publish_line(&self, deployment_id: &str, line: &LogLine) -> Result<(), BerthError> {
        let payload = serde_json::to_vec(line)?;
        self.client
            .publish(Topics::logs(deployment_id), QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| BerthError::BusError(e.to_string()))
    }

    /// Publish a typed lifecycle event on the status topic
    pub async fn publish_event(&self, event: &BuildEvent) -> Result<(), BerthError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(
                Topics::status(event.deployment_id()),
                QoS::AtMostOnce,
                false,
                payload,
            )
            .await
            .map_err(|e| BerthError::BusError(e.to_string()))
    }

    /// Disconnect and wait for the event loop to drain outstanding publishes
    pub async fn close(self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Bus disconnect failed: {}", e);
            self.driver.abort();
            return;
        }

        let drained =
            tokio::time::timeout(std::time::Duration::from_secs(5), self.driver).await;
        if drained.is_err() {
            warn!("Bus event loop did not drain within 5s");
        }
    }
}

/// One message received from the bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Parse payload as JSON
    pub fn parse_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, BerthError> {
        serde_json::from_slice(&self.payload).map_err(|e| BerthError::BusError(e.to_string()))
    }

    /// Payload as (lossy) UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
