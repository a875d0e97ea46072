//! Deployment record storage
//!
//! The database behind the API is an external collaborator; this module
//! specifies the port and ships the in-memory adapter the services and
//! tests run against.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::BerthError;
use crate::models::deployment::{Deployment, DeploymentStatus};

/// Persistence port for deployment records
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Insert a new record. Fails with `Conflict` when the id or the
    /// human-chosen name is already held by a live record.
    async fn insert(&self, deployment: Deployment) -> Result<(), BerthError>;

    async fn get(&self, id: &str) -> Result<Option<Deployment>, BerthError>;

    async fn list(&self) -> Result<Vec<Deployment>, BerthError>;

    /// Update the status of a record; `NotFound` when absent
    async fn update_status(&self, id: &str, status: DeploymentStatus) -> Result<(), BerthError>;

    /// Remove a record and retire its id forever; `NotFound` when absent
    async fn remove(&self, id: &str) -> Result<(), BerthError>;

    /// Whether an id was ever assigned, including to since-deleted records
    async fn is_taken(&self, id: &str) -> Result<bool, BerthError>;
}

/// In-memory deployment store
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, Deployment>,
    /// Every id ever issued; ids are never reused after deletion so a
    /// recreated project cannot collide with old artifacts or log channels.
    issued_ids: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn insert(&self, deployment: Deployment) -> Result<(), BerthError> {
        let mut inner = self.inner.write().await;

        if inner.records.contains_key(&deployment.id) {
            return Err(BerthError::Conflict(format!(
                "deployment id '{}' already exists",
                deployment.id
            )));
        }
        if inner.records.values().any(|d| d.name == deployment.name) {
            return Err(BerthError::Conflict(format!(
                "deployment name '{}' is already in use",
                deployment.name
            )));
        }

        inner.issued_ids.insert(deployment.id.clone());
        inner.records.insert(deployment.id.clone(), deployment);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Deployment>, BerthError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Deployment>, BerthError> {
        let inner = self.inner.read().await;
        let mut records: Vec<Deployment> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn update_status(&self, id: &str, status: DeploymentStatus) -> Result<(), BerthError> {
        let mut inner = self.inner.write().await;
        match inner.records.get_mut(id) {
            Some(record) => {
                record.status = status;
                Ok(())
            }
            None => Err(BerthError::NotFound(format!("deployment '{}'", id))),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), BerthError> {
        let mut inner = self.inner.write().await;
        match inner.records.remove(id) {
            Some(_) => Ok(()),
            None => Err(BerthError::NotFound(format!("deployment '{}'", id))),
        }
    }

    async fn is_taken(&self, id: &str) -> Result<bool, BerthError> {
        let inner = self.inner.read().await;
        Ok(inner.issued_ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::SourceRef;

    fn deployment(id: &str, name: &str) -> Deployment {
        Deployment::new(
            id.to_string(),
            name.to_string(),
            SourceRef {
                git_url: "https://github.com/acme/site".to_string(),
                framework: None,
                install_command: None,
                build_command: None,
            },
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        store.insert(deployment("acme-site", "acme site")).await.unwrap();

        let record = store.get("acme-site").await.unwrap().unwrap();
        assert_eq!(record.status, DeploymentStatus::NotStarted);
        assert_eq!(record.name, "acme site");
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let store = MemoryStore::new();
        store.insert(deployment("acme-site", "acme site")).await.unwrap();

        let err = store.insert(deployment("acme-site-2", "acme site")).await.unwrap_err();
        assert!(matches!(err, BerthError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_removed_id_stays_taken() {
        let store = MemoryStore::new();
        store.insert(deployment("acme-site", "acme site")).await.unwrap();
        store.remove("acme-site").await.unwrap();

        assert!(store.get("acme-site").await.unwrap().is_none());
        assert!(store.is_taken("acme-site").await.unwrap());

        // The name is free again, the id is not.
        store.insert(deployment("acme-site-9f2c", "acme site")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_status_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .update_status("ghost", DeploymentStatus::Queued)
            .await
            .unwrap_err();
        assert!(matches!(err, BerthError::NotFound(_)));
    }
}
