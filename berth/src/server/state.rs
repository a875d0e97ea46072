//! Shared server state

use std::sync::Arc;

use crate::bus::LogBus;
use crate::orchestrator::DeploymentService;

/// State handed to the API handlers
pub struct ServerState {
    pub service: Arc<DeploymentService>,
}

impl ServerState {
    pub fn new(service: Arc<DeploymentService>) -> Self {
        Self { service }
    }
}

/// State handed to the log stream socket handlers
pub struct StreamState {
    pub bus: Arc<LogBus>,
}

impl StreamState {
    pub fn new(bus: Arc<LogBus>) -> Self {
        Self { bus }
    }
}
