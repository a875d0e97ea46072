//! Build executor
//!
//! Runs inside the ephemeral build task: clone the repository, run the
//! install/build chain while streaming its output to the log bus one line
//! at a time, then mirror the output directory into object storage. A
//! failing build is terminal for the run — whatever lines were produced are
//! flushed, the failure event is published, nothing is retried.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::BerthError;
use crate::models::events::BuildEvent;
use crate::object::ObjectStore;
use crate::runner::DEFAULT_OUTPUT_DIR;

pub mod commands;
pub mod git;
pub mod publish;
pub mod stream;
pub mod upload;

use publish::LogSink;
use stream::LineFramer;

/// Build parameters, read from the task environment set by the substrate
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub deployment_id: String,
    pub git_url: String,
    pub framework: Option<String>,
    pub install_command: Option<String>,
    pub build_command: Option<String>,
    pub output_dir: String,
}

impl BuildContext {
    /// Read the task environment (`DEPLOYMENT_ID`, `GIT_REPOSITORY_URL`, ...)
    pub fn from_env() -> Result<Self, BerthError> {
        let deployment_id = env::var("DEPLOYMENT_ID")
            .map_err(|_| BerthError::ConfigError("DEPLOYMENT_ID is required".to_string()))?;
        let git_url = env::var("GIT_REPOSITORY_URL")
            .map_err(|_| BerthError::ConfigError("GIT_REPOSITORY_URL is required".to_string()))?;

        Ok(Self {
            deployment_id,
            git_url,
            framework: env::var("FRAMEWORK").ok(),
            install_command: env::var("INSTALL_COMMAND").ok(),
            build_command: env::var("BUILD_COMMAND").ok(),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
        })
    }
}

/// Run one build end to end, publishing lifecycle events along the way.
///
/// The caller closes the logger afterwards regardless of the outcome.
pub async fn run(
    ctx: &BuildContext,
    logger: &dyn LogSink,
    objects: &dyn ObjectStore,
    workspace: &Path,
) -> Result<(), BerthError> {
    logger
        .event(BuildEvent::Started {
            deployment_id: ctx.deployment_id.clone(),
        })
        .await;

    match execute(ctx, logger, objects, workspace).await {
        Ok(()) => Ok(()),
        Err(e) => {
            logger
                .event(BuildEvent::Failed {
                    deployment_id: ctx.deployment_id.clone(),
                    error: e.to_string(),
                })
                .await;
            Err(e)
        }
    }
}

async fn execute(
    ctx: &BuildContext,
    logger: &dyn LogSink,
    objects: &dyn ObjectStore,
    workspace: &Path,
) -> Result<(), BerthError> {
    let repo_dir = workspace.join("source");
    git::clone_repository(&ctx.git_url, &repo_dir).await?;
    logger.line(&format!("cloned {}", ctx.git_url)).await;

    let commands = commands::resolve(
        ctx.framework.as_deref(),
        ctx.install_command.as_deref(),
        ctx.build_command.as_deref(),
    );
    logger.line(&format!("running: {}", commands.shell_line())).await;

    let status = run_build_command(&commands.shell_line(), &repo_dir, logger).await?;
    if !status.success() {
        return Err(BerthError::BuildError(format!(
            "build command failed: {}",
            status
        )));
    }

    logger
        .event(BuildEvent::Complete {
            deployment_id: ctx.deployment_id.clone(),
        })
        .await;

    let output_dir = repo_dir.join(&ctx.output_dir);
    if !output_dir.is_dir() {
        return Err(BerthError::BuildError(format!(
            "output directory '{}' not found after build",
            ctx.output_dir
        )));
    }

    let uploaded = upload::upload_dir(objects, logger, &ctx.deployment_id, &output_dir).await?;
    logger.line(&format!("published {} files", uploaded)).await;

    logger
        .event(BuildEvent::UploadComplete {
            deployment_id: ctx.deployment_id.clone(),
        })
        .await;

    info!("Build for {} finished", ctx.deployment_id);
    Ok(())
}

/// Run the install/build chain, forwarding every complete output line
async fn run_build_command(
    shell_line: &str,
    repo_dir: &PathBuf,
    logger: &dyn LogSink,
) -> Result<std::process::ExitStatus, BerthError> {
    let mut child = Command::new("bash")
        .arg("-c")
        .arg(shell_line)
        .current_dir(repo_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BerthError::BuildError(format!("failed to start build command: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BerthError::BuildError("build stdout unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| BerthError::BuildError("build stderr unavailable".to_string()))?;

    // Both pipes feed one ordered queue of complete lines.
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let out_pump = tokio::spawn(pump_lines(stdout, tx.clone()));
    let err_pump = tokio::spawn(pump_lines(stderr, tx));

    while let Some(line) = rx.recv().await {
        if !line.trim().is_empty() {
            logger.line(&line).await;
        }
    }

    let _ = out_pump.await;
    let _ = err_pump.await;

    let status = child
        .wait()
        .await
        .map_err(|e| BerthError::BuildError(format!("failed to wait for build: {}", e)))?;
    Ok(status)
}

/// Read raw chunks from one pipe and emit framed lines
async fn pump_lines<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncReadExt + Unpin,
{
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            }
            Err(_) => break,
        }
    }

    if let Some(tail) = framer.flush() {
        let _ = tx.send(tail).await;
    }
}
