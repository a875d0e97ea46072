//! Edge router
//!
//! Resolves the first label of the request's Host header to that
//! deployment's artifact prefix and forwards the request there. The router
//! never checks whether the artifact exists — the origin's own not-found
//! response passes through unmodified.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Client;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::errors::BerthError;

/// Edge router configuration
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    pub host: String,
    pub port: u16,
    /// Prefix every subdomain resolves under, e.g.
    /// `https://bucket.example.com/outputs/`
    pub content_base_url: String,
}

struct ProxyState {
    client: Client,
    content_base_url: String,
}

/// Extract the routing subdomain: the first label of the host header,
/// with any port stripped
pub fn extract_subdomain(host: &str) -> Option<&str> {
    let host = host.split(':').next()?;
    let label = host.split('.').next()?;
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

/// Compute the upstream URL for a request path. The bare root resolves to
/// the site's index document.
pub fn build_target(content_base_url: &str, subdomain: &str, path_and_query: &str) -> String {
    let base = content_base_url.trim_end_matches('/');
    let path = match path_and_query {
        "/" | "" => "/index.html",
        other => other,
    };
    format!("{}/{}{}", base, subdomain, path)
}

/// Build the router: a health probe that bypasses proxying, and a fallback
/// that forwards everything else
pub fn proxy_router(client: Client, content_base_url: String) -> Router {
    let state = Arc::new(ProxyState {
        client,
        content_base_url,
    });

    Router::new()
        .route("/health", get(health_handler))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "msg": "ok" }))
}

async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let Some(host) = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "missing host header").into_response();
    };

    let Some(subdomain) = extract_subdomain(host) else {
        return (StatusCode::BAD_REQUEST, "unroutable host header").into_response();
    };
    let subdomain = subdomain.to_string();

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = build_target(&state.content_base_url, &subdomain, path_and_query);
    debug!("Proxying {} -> {}", host, target);

    match forward(&state.client, request, &target).await {
        Ok(response) => response,
        Err(e) => {
            error!("Proxy request to {} failed: {}", target, e);
            (StatusCode::BAD_GATEWAY, "upstream unreachable").into_response()
        }
    }
}

async fn forward(client: &Client, request: Request, target: &str) -> Result<Response, BerthError> {
    let (parts, body) = request.into_parts();

    let mut upstream = client
        .request(parts.method, target)
        .headers(strip_hop_headers(&parts.headers));

    // Only wire a streaming body where one can exist.
    if has_body(&parts.headers) {
        upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let origin_response = upstream.send().await?;

    let mut response = Response::builder().status(origin_response.status());
    if let Some(headers) = response.headers_mut() {
        for (name, value) in strip_hop_headers(origin_response.headers()).iter() {
            headers.insert(name, value.clone());
        }
    }

    response
        .body(Body::from_stream(origin_response.bytes_stream()))
        .map_err(|e| BerthError::ServerError(e.to_string()))
}

fn has_body(headers: &HeaderMap<HeaderValue>) -> bool {
    headers.contains_key(header::CONTENT_LENGTH) || headers.contains_key(header::TRANSFER_ENCODING)
}

/// Drop hop-by-hop headers; Host in particular is rewritten by the client
/// to the origin's own (changeOrigin semantics)
fn strip_hop_headers(headers: &HeaderMap<HeaderValue>) -> HeaderMap<HeaderValue> {
    const HOP_HEADERS: [&str; 8] = [
        "host",
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "transfer-encoding",
    ];

    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if !HOP_HEADERS.contains(&name.as_str()) {
            out.insert(name, value.clone());
        }
    }
    out
}

/// Bind and serve the edge router
pub async fn serve(
    options: &ProxyOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), BerthError>>, BerthError> {
    let client = Client::builder().build()?;
    let app = proxy_router(client, options.content_base_url.clone());

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting edge router on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BerthError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| BerthError::ServerError(e.to_string()))
    });

    Ok(handle)
}
