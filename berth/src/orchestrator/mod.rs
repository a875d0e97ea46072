//! Deployment orchestrator
//!
//! Owns the deployment lifecycle: create a record, queue a build on the
//! substrate, delete artifacts and record together. Status transitions past
//! QUEUED are applied by the ingest worker from the builder's typed events.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};
use url::Url;

use crate::errors::BerthError;
use crate::models::deployment::{
    generated_slug, slugify, suffixed_slug, Deployment, DeploymentStatus, SourceRef, MIN_NAME_LEN,
};
use crate::object::{output_prefix, ObjectStore};
use crate::runner::{BuildTask, TaskRunner};
use crate::store::DeploymentStore;

/// Create request as accepted from the API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeployment {
    pub name: Option<String>,
    #[serde(rename = "gitURL")]
    pub git_url: String,
    pub framework: Option<String>,
    pub install_command: Option<String>,
    pub build_command: Option<String>,
}

/// What `start` hands back to the caller
#[derive(Debug, Clone)]
pub struct StartReceipt {
    pub deployment_id: String,
    pub url: String,
}

pub struct DeploymentService {
    store: Arc<dyn DeploymentStore>,
    objects: Arc<dyn ObjectStore>,
    runner: Arc<dyn TaskRunner>,
    preview_domain: String,
}

impl DeploymentService {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        objects: Arc<dyn ObjectStore>,
        runner: Arc<dyn TaskRunner>,
        preview_domain: String,
    ) -> Self {
        Self {
            store,
            objects,
            runner,
            preview_domain,
        }
    }

    /// Create a deployment record in NOT_STARTED
    pub async fn create(&self, request: CreateDeployment) -> Result<Deployment, BerthError> {
        validate_git_url(&request.git_url)?;

        let (id, name) = self.allocate_id(request.name.as_deref()).await?;

        let deployment = Deployment::new(
            id,
            name,
            SourceRef {
                git_url: request.git_url,
                framework: request.framework,
                install_command: request.install_command,
                build_command: request.build_command,
            },
        );

        self.store.insert(deployment.clone()).await?;
        info!("Created deployment {}", deployment.id);
        Ok(deployment)
    }

    /// Queue a build for a deployment.
    ///
    /// The QUEUED status is persisted before submission, so a crash in
    /// between leaves a visibly stuck record instead of an untracked build.
    /// A second start while a build is live is rejected.
    pub async fn start(&self, id: &str) -> Result<StartReceipt, BerthError> {
        let deployment = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| BerthError::NotFound(format!("deployment '{}'", id)))?;

        if deployment.status.is_live() {
            return Err(BerthError::Conflict(format!(
                "deployment '{}' already has a build in flight",
                id
            )));
        }

        self.store.update_status(id, DeploymentStatus::Queued).await?;

        let task = BuildTask::for_deployment(&deployment);
        if let Err(e) = self.runner.submit(&task).await {
            error!("Build submission for {} failed: {}", id, e);
            // Never leave a record QUEUED for a task the substrate refused.
            if let Err(revert) = self.store.update_status(id, DeploymentStatus::Failed).await {
                error!("Failed to mark {} as failed: {}", id, revert);
            }
            return Err(e);
        }

        info!("Queued build for {}", id);
        Ok(StartReceipt {
            deployment_id: id.to_string(),
            url: format!("http://{}.{}", id, self.preview_domain),
        })
    }

    /// Delete a deployment: artifacts first, then the record.
    ///
    /// When prefix deletion fails the record is kept so the caller can
    /// retry; a prefix that is already empty deletes cleanly.
    pub async fn delete(&self, id: &str) -> Result<(), BerthError> {
        if self.store.get(id).await?.is_none() {
            return Err(BerthError::NotFound(format!("deployment '{}'", id)));
        }

        self.objects.delete_prefix(&output_prefix(id)).await.map_err(|e| {
            error!("Artifact deletion for {} failed: {}", id, e);
            BerthError::UpstreamError(format!("failed to delete artifacts for '{}': {}", id, e))
        })?;

        self.store.remove(id).await?;
        info!("Deleted deployment {}", id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Deployment, BerthError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| BerthError::NotFound(format!("deployment '{}'", id)))
    }

    pub async fn list(&self) -> Result<Vec<Deployment>, BerthError> {
        self.store.list().await
    }

    /// Pick the deployment id. A fresh name maps to its own slug; a name
    /// whose slug was retired by a deleted deployment gets a random suffix,
    /// so ids never collide across the lifetime of the system.
    async fn allocate_id(&self, name: Option<&str>) -> Result<(String, String), BerthError> {
        let (base, display_name) = match name {
            Some(name) => {
                let trimmed = name.trim();
                if trimmed.len() < MIN_NAME_LEN {
                    return Err(BerthError::ValidationError(format!(
                        "name must be at least {} characters",
                        MIN_NAME_LEN
                    )));
                }
                let slug = slugify(trimmed);
                if slug.len() < MIN_NAME_LEN {
                    return Err(BerthError::ValidationError(
                        "name must contain at least 3 letters or digits".to_string(),
                    ));
                }
                (slug, trimmed.to_string())
            }
            None => {
                let slug = generated_slug();
                (slug.clone(), slug)
            }
        };

        if !self.store.is_taken(&base).await? {
            return Ok((base, display_name));
        }

        // Live holder of the slug: that is a name collision. A retired slug
        // means the record is gone but the id must stay unique forever.
        if self.store.get(&base).await?.is_some() {
            return Err(BerthError::Conflict(format!(
                "deployment name '{}' is already in use",
                display_name
            )));
        }

        for _ in 0..5 {
            let candidate = suffixed_slug(&base);
            if !self.store.is_taken(&candidate).await? {
                return Ok((candidate, display_name));
            }
        }

        Err(BerthError::Internal(format!(
            "could not allocate a unique id for '{}'",
            base
        )))
    }
}

fn validate_git_url(raw: &str) -> Result<(), BerthError> {
    let url = Url::parse(raw)
        .map_err(|_| BerthError::ValidationError(format!("invalid gitURL: {}", raw)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BerthError::ValidationError(format!(
            "gitURL must be http(s): {}",
            raw
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::FsObjectStore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRunner {
        submissions: AtomicUsize,
        fail: bool,
    }

    impl FakeRunner {
        fn new(fail: bool) -> Self {
            Self {
                submissions: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl TaskRunner for FakeRunner {
        async fn submit(&self, _task: &BuildTask) -> Result<(), BerthError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BerthError::UpstreamError("substrate unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct FailingObjects;

    #[async_trait]
    impl ObjectStore for FailingObjects {
        async fn put(&self, _: &str, _: Vec<u8>, _: &str) -> Result<(), BerthError> {
            Err(BerthError::StorageError("down".to_string()))
        }

        async fn delete_prefix(&self, _: &str) -> Result<(), BerthError> {
            Err(BerthError::StorageError("down".to_string()))
        }
    }

    fn service(runner: Arc<dyn TaskRunner>) -> (DeploymentService, Arc<MemoryStore>, tempfile::TempDir) {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let objects = Arc::new(FsObjectStore::new(dir.path()));
        let service = DeploymentService::new(
            store.clone(),
            objects,
            runner,
            "localhost:8000".to_string(),
        );
        (service, store, dir)
    }

    fn create_request(name: Option<&str>) -> CreateDeployment {
        CreateDeployment {
            name: name.map(str::to_string),
            git_url: "https://github.com/acme/site".to_string(),
            framework: None,
            install_command: None,
            build_command: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_slug_and_not_started() {
        let (service, _, _dir) = service(Arc::new(FakeRunner::new(false)));

        let deployment = service.create(create_request(Some("Acme Site"))).await.unwrap();
        assert_eq!(deployment.id, "acme-site");
        assert_eq!(deployment.status, DeploymentStatus::NotStarted);
        assert!(deployment.id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[tokio::test]
    async fn test_create_rejects_short_name_and_bad_url() {
        let (service, store, _dir) = service(Arc::new(FakeRunner::new(false)));

        let err = service.create(create_request(Some("ab"))).await.unwrap_err();
        assert!(matches!(err, BerthError::ValidationError(_)));

        let mut request = create_request(Some("acme-site"));
        request.git_url = "not a url".to_string();
        let err = service.create(request).await.unwrap_err();
        assert!(matches!(err, BerthError::ValidationError(_)));

        // Neither attempt left a record behind.
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_duplicate_name_conflicts() {
        let (service, store, _dir) = service(Arc::new(FakeRunner::new(false)));

        service.create(create_request(Some("acme-site"))).await.unwrap();
        let err = service.create(create_request(Some("acme-site"))).await.unwrap_err();
        assert!(matches!(err, BerthError::Conflict(_)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recreate_after_delete_gets_fresh_id() {
        let (service, _, _dir) = service(Arc::new(FakeRunner::new(false)));

        let first = service.create(create_request(Some("acme-site"))).await.unwrap();
        service.delete(&first.id).await.unwrap();

        let second = service.create(create_request(Some("acme-site"))).await.unwrap();
        assert_ne!(second.id, first.id);
        assert!(second.id.starts_with("acme-site-"));
    }

    #[tokio::test]
    async fn test_start_persists_queued_before_submit() {
        let runner = Arc::new(FakeRunner::new(false));
        let (service, store, _dir) = service(runner.clone());

        let deployment = service.create(create_request(Some("acme-site"))).await.unwrap();
        let receipt = service.start(&deployment.id).await.unwrap();

        assert_eq!(receipt.url, "http://acme-site.localhost:8000");
        assert_eq!(runner.submissions.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get(&deployment.id).await.unwrap().unwrap().status,
            DeploymentStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_start_failure_marks_failed_not_queued() {
        let (service, store, _dir) = service(Arc::new(FakeRunner::new(true)));

        let deployment = service.create(create_request(Some("acme-site"))).await.unwrap();
        let err = service.start(&deployment.id).await.unwrap_err();
        assert!(matches!(err, BerthError::UpstreamError(_)));
        assert_eq!(
            store.get(&deployment.id).await.unwrap().unwrap().status,
            DeploymentStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_second_start_while_live_conflicts() {
        let runner = Arc::new(FakeRunner::new(false));
        let (service, _, _dir) = service(runner.clone());

        let deployment = service.create(create_request(Some("acme-site"))).await.unwrap();
        service.start(&deployment.id).await.unwrap();

        let err = service.start(&deployment.id).await.unwrap_err();
        assert!(matches!(err, BerthError::Conflict(_)));
        assert_eq!(runner.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_unknown_deployment() {
        let (service, _, _dir) = service(Arc::new(FakeRunner::new(false)));
        let err = service.start("ghost").await.unwrap_err();
        assert!(matches!(err, BerthError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_with_empty_prefix_succeeds() {
        let (service, store, _dir) = service(Arc::new(FakeRunner::new(false)));

        let deployment = service.create(create_request(Some("acme-site"))).await.unwrap();
        // No build ever ran, so the prefix holds nothing.
        service.delete(&deployment.id).await.unwrap();
        assert!(store.get(&deployment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_keeps_record_when_artifacts_undeletable() {
        let store = Arc::new(MemoryStore::new());
        let service = DeploymentService::new(
            store.clone(),
            Arc::new(FailingObjects),
            Arc::new(FakeRunner::new(false)),
            "localhost:8000".to_string(),
        );

        let deployment = service.create(create_request(Some("acme-site"))).await.unwrap();
        let err = service.delete(&deployment.id).await.unwrap_err();
        assert!(matches!(err, BerthError::UpstreamError(_)));
        assert!(store.get(&deployment.id).await.unwrap().is_some());
    }
}
