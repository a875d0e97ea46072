//! Wire types carried over the log bus

use serde::{Deserialize, Serialize};

/// One line of build output.
///
/// `seq` increases monotonically within a deployment's stream; lines are
/// ephemeral and never persisted, so a late subscriber simply starts at
/// whatever sequence number is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub seq: u64,
    pub log: String,
}

/// Typed lifecycle event published by the builder on the status channel.
///
/// The orchestrator's ingest worker drives status transitions from these
/// variants instead of pattern-matching sentinel strings out of the log
/// stream; the human-readable sentinels are still mirrored into the log
/// channel for viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BuildEvent {
    Started { deployment_id: String },
    Complete { deployment_id: String },
    Failed { deployment_id: String, error: String },
    UploadComplete { deployment_id: String },
}

impl BuildEvent {
    pub fn deployment_id(&self) -> &str {
        match self {
            BuildEvent::Started { deployment_id }
            | BuildEvent::Complete { deployment_id }
            | BuildEvent::Failed { deployment_id, .. }
            | BuildEvent::UploadComplete { deployment_id } => deployment_id,
        }
    }

    /// The sentinel line mirrored into the log stream for this event
    pub fn sentinel(&self) -> String {
        match self {
            BuildEvent::Started { .. } => "BUILD_STARTED".to_string(),
            BuildEvent::Complete { .. } => "BUILD_COMPLETE".to_string(),
            BuildEvent::Failed { error, .. } => format!("BUILD_FAILED: {}", error),
            BuildEvent::UploadComplete { .. } => "UPLOAD_COMPLETE".to_string(),
        }
    }
}
