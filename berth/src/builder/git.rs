//! Repository checkout

use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::errors::BerthError;

/// Clone a repository into `target_dir`. Shallow: build inputs only, no
/// history.
pub async fn clone_repository(repo_url: &str, target_dir: &Path) -> Result<(), BerthError> {
    info!("Cloning {} into {}", repo_url, target_dir.display());

    let status = Command::new("git")
        .args(["clone", "--depth", "1", repo_url])
        .arg(target_dir)
        .status()
        .await
        .map_err(|e| BerthError::BuildError(format!("failed to run git clone: {}", e)))?;

    if !status.success() {
        return Err(BerthError::BuildError(format!(
            "git clone of {} failed: {}",
            repo_url, status
        )));
    }

    info!("Clone complete");
    Ok(())
}
