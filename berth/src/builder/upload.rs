//! Artifact upload
//!
//! Walks the build's output directory and mirrors every regular file into
//! object storage under the deployment's prefix. Upload is best-effort per
//! file: a failed key is reported in the log stream and skipped, the run is
//! not aborted. Nothing is cleared beforehand — keys from an earlier build
//! that the new build does not produce stay behind.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use crate::builder::publish::LogSink;
use crate::errors::BerthError;
use crate::object::{output_prefix, ObjectStore};

/// Collect every regular file under `root`, depth-first, sorted for a
/// stable upload order
pub async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, BerthError> {
    let mut stack = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = stack.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Object key for a file relative to the output root
fn key_for(deployment_id: &str, root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("{}/{}", output_prefix(deployment_id), parts.join("/")))
}

/// Upload the output tree. Returns how many files made it.
pub async fn upload_dir(
    objects: &dyn ObjectStore,
    logger: &dyn LogSink,
    deployment_id: &str,
    output_dir: &Path,
) -> Result<usize, BerthError> {
    let files = collect_files(output_dir).await?;
    let mut uploaded = 0;

    for file in &files {
        let Some(key) = key_for(deployment_id, output_dir, file) else {
            continue;
        };
        let content_type = mime_guess::from_path(file)
            .first_or_octet_stream()
            .to_string();

        logger.line(&format!("uploading {}", key)).await;

        let body = match fs::read(file).await {
            Ok(body) => body,
            Err(e) => {
                logger
                    .line(&format!("upload failed for {}: {}", key, e))
                    .await;
                continue;
            }
        };

        match objects.put(&key, body, &content_type).await {
            Ok(()) => uploaded += 1,
            Err(e) => {
                logger
                    .line(&format!("upload failed for {}: {}", key, e))
                    .await;
            }
        }
    }

    info!("Uploaded {}/{} files for {}", uploaded, files.len(), deployment_id);
    Ok(uploaded)
}
