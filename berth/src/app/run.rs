//! Main run loop for the API service

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::bus::LogBus;
use crate::errors::BerthError;
use crate::orchestrator::DeploymentService;
use crate::server::serve::{serve_api, serve_stream};
use crate::server::state::{ServerState, StreamState};
use crate::store::{DeploymentStore, MemoryStore};
use crate::workers::ingest;

/// Run the API service: orchestrator REST surface, log stream socket and
/// the bus ingest worker
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BerthError> {
    info!("Initializing berth API service...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start API service: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), BerthError> {
    let bus = Arc::new(LogBus::new());
    let store: Arc<dyn DeploymentStore> = Arc::new(MemoryStore::new());

    let objects = options.storage.build()?;
    let runner = options.substrate.build(substrate_pass_env(options))?;

    let service = Arc::new(DeploymentService::new(
        store.clone(),
        objects,
        runner,
        options.preview_domain.clone(),
    ));

    init_ingest_worker(options, bus.clone(), store, shutdown_manager, shutdown_tx.subscribe())?;
    init_api_server(options, service, shutdown_manager, shutdown_tx.subscribe()).await?;
    init_stream_server(options, bus, shutdown_manager, shutdown_tx.subscribe()).await?;

    Ok(())
}

/// Bus and storage wiring every spawned build task inherits
fn substrate_pass_env(options: &AppOptions) -> Vec<(String, String)> {
    let mut env = Vec::new();

    let bus = &options.ingest.bus_address;
    if bus.is_configured() {
        env.push(("BERTH_MQTT_HOST".to_string(), bus.host.clone()));
        env.push(("BERTH_MQTT_PORT".to_string(), bus.port.to_string()));
        if bus.use_tls {
            env.push(("BERTH_MQTT_TLS".to_string(), "true".to_string()));
        }
        if let Some(ca) = &bus.ca_cert_path {
            env.push(("BERTH_MQTT_CA_CERT".to_string(), ca.clone()));
        }
    }

    env.extend(options.storage.task_environment());
    env
}

fn init_ingest_worker(
    options: &AppOptions,
    bus: Arc<LogBus>,
    store: Arc<dyn DeploymentStore>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BerthError> {
    info!("Initializing ingest worker...");

    let ingest_options = options.ingest.clone();
    let ingest_handle = tokio::spawn(async move {
        ingest::run(
            &ingest_options,
            bus,
            store,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_ingest_worker_handle(ingest_handle)?;
    Ok(())
}

async fn init_api_server(
    options: &AppOptions,
    service: Arc<DeploymentService>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BerthError> {
    info!("Initializing API server...");

    let state = Arc::new(ServerState::new(service));
    let handle = serve_api(&options.server.host, options.server.api_port, state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_api_server_handle(handle)?;
    Ok(())
}

async fn init_stream_server(
    options: &AppOptions,
    bus: Arc<LogBus>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BerthError> {
    info!("Initializing log stream server...");

    let state = Arc::new(StreamState::new(bus));
    let handle = serve_stream(
        &options.server.host,
        options.server.stream_port,
        state,
        async move {
            let _ = shutdown_rx.recv().await;
        },
    )
    .await?;

    shutdown_manager.with_stream_server_handle(handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    ingest_worker_handle: Option<JoinHandle<()>>,
    api_server_handle: Option<JoinHandle<Result<(), BerthError>>>,
    stream_server_handle: Option<JoinHandle<Result<(), BerthError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            ingest_worker_handle: None,
            api_server_handle: None,
            stream_server_handle: None,
        }
    }

    pub fn with_ingest_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), BerthError> {
        if self.ingest_worker_handle.is_some() {
            return Err(BerthError::ShutdownError("ingest_handle already set".to_string()));
        }
        self.ingest_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_api_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), BerthError>>,
    ) -> Result<(), BerthError> {
        if self.api_server_handle.is_some() {
            return Err(BerthError::ShutdownError("api_handle already set".to_string()));
        }
        self.api_server_handle = Some(handle);
        Ok(())
    }

    pub fn with_stream_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), BerthError>>,
    ) -> Result<(), BerthError> {
        if self.stream_server_handle.is_some() {
            return Err(BerthError::ShutdownError("stream_handle already set".to_string()));
        }
        self.stream_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), BerthError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), BerthError> {
        info!("Shutting down berth API service...");

        // 1. Ingest worker
        if let Some(handle) = self.ingest_worker_handle.take() {
            handle.await.map_err(|e| BerthError::ShutdownError(e.to_string()))?;
        }

        // 2. API server
        if let Some(handle) = self.api_server_handle.take() {
            handle.await.map_err(|e| BerthError::ShutdownError(e.to_string()))??;
        }

        // 3. Log stream server
        if let Some(handle) = self.stream_server_handle.take() {
            handle.await.map_err(|e| BerthError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
