//! HTTP request handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::deployment::{Deployment, DeploymentStatus};
use crate::orchestrator::CreateDeployment;
use crate::server::error::ApiError;
use crate::server::state::ServerState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "berth-api".to_string(),
    })
}

/// Deployment record as exposed to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResponse {
    pub id: String,
    pub deployment_id: String,
    pub name: String,
    #[serde(rename = "gitURL")]
    pub git_url: String,
    pub framework: Option<String>,
    pub sub_domain: String,
    pub status: DeploymentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Deployment> for DeploymentResponse {
    fn from(d: Deployment) -> Self {
        Self {
            id: d.id.clone(),
            deployment_id: d.id.clone(),
            name: d.name,
            git_url: d.source.git_url,
            framework: d.source.framework,
            sub_domain: d.id,
            status: d.status,
            created_at: d.created_at,
        }
    }
}

/// Create a deployment record
pub async fn create_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateDeployment>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state.service.create(request).await?;
    Ok((StatusCode::CREATED, Json(DeploymentResponse::from(deployment))))
}

/// List all deployments
pub async fn list_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deployments = state.service.list().await?;
    let records: Vec<DeploymentResponse> =
        deployments.into_iter().map(DeploymentResponse::from).collect();
    Ok(Json(records))
}

/// Fetch one deployment
pub async fn get_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deployment = state.service.get(&id).await?;
    Ok(Json(DeploymentResponse::from(deployment)))
}

/// Start response
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub url: String,
}

/// Queue a build for a deployment
pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.service.start(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            status: "queued".to_string(),
            url: receipt.url,
        }),
    ))
}

/// Delete response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Delete a deployment and its artifacts
pub async fn delete_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.delete(&id).await?;
    Ok(Json(DeleteResponse {
        message: "deployment deleted".to_string(),
    }))
}
