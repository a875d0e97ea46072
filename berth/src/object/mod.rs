//! Object storage port
//!
//! Build artifacts live in an external key-addressed blob store under
//! `outputs/{deploymentId}/...`. The store itself is out of scope; the port
//! covers exactly what the platform needs: put a blob, drop a prefix.

use async_trait::async_trait;

use crate::errors::BerthError;

mod fs;
mod http;

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;

/// Key prefix holding one deployment's artifact tree
pub fn output_prefix(deployment_id: &str) -> String {
    format!("outputs/{}", deployment_id)
}

/// Blob storage port
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write one object. Overwrites silently; individual keys from an
    /// earlier build of the same deployment are replaced, never cleared
    /// wholesale.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BerthError>;

    /// Delete every object under a prefix. Deleting a prefix that holds
    /// nothing is a no-op, not an error.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), BerthError>;
}
