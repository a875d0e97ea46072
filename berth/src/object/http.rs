//! HTTP blob gateway adapter
//!
//! Targets filer-style gateways (e.g. a SeaweedFS filer or an internal
//! artifact proxy) that accept `PUT {base}/{bucket}/{key}` and
//! `DELETE {base}/{bucket}/{prefix}/?recursive=true`.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use crate::errors::BerthError;
use crate::object::ObjectStore;

pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    region: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, region: Option<String>) -> Result<Self, BerthError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            region,
        })
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), BerthError> {
        let url = self.url_for(key);
        debug!("PUT {}", url);

        let mut request = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(region) = &self.region {
            request = request.header("X-Storage-Region", region);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(BerthError::StorageError(format!(
                "put {} failed: {}",
                key,
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), BerthError> {
        let url = format!("{}/?recursive=true", self.url_for(prefix.trim_end_matches('/')));
        debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await?;
        // A missing prefix deletes to the same end state.
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }
        Err(BerthError::StorageError(format!(
            "delete prefix {} failed: {}",
            prefix,
            response.status()
        )))
    }
}
