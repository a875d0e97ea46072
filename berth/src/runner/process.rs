//! Local-process substrate adapter
//!
//! Spawns the builder binary directly; the development analog of a
//! container task. The child is detached — a reaper task waits on it only
//! to collect the exit status.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::BerthError;
use crate::runner::{BuildTask, TaskRunner};

pub struct ProcessRunner {
    builder_bin: PathBuf,
    /// Extra environment forwarded to every build (bus and storage wiring)
    pass_env: Vec<(String, String)>,
}

impl ProcessRunner {
    pub fn new(builder_bin: PathBuf, pass_env: Vec<(String, String)>) -> Self {
        Self { builder_bin, pass_env }
    }
}

#[async_trait]
impl TaskRunner for ProcessRunner {
    async fn submit(&self, task: &BuildTask) -> Result<(), BerthError> {
        let mut cmd = Command::new(&self.builder_bin);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        for (key, value) in task.environment() {
            cmd.env(key, value);
        }
        for (key, value) in &self.pass_env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            BerthError::UpstreamError(format!(
                "failed to spawn builder {}: {}",
                self.builder_bin.display(),
                e
            ))
        })?;

        info!("Submitted build task for {}", task.deployment_id);

        let deployment_id = task.deployment_id.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!("Builder for {} exited: {}", deployment_id, status),
                Err(e) => warn!("Failed to reap builder for {}: {}", deployment_id, e),
            }
        });

        Ok(())
    }
}
