//! The operations client contract (C6): posts the aggregated trigger list to
//! the runtime's operations endpoint. [`HttpOperationsClient`] is the one
//! concrete implementation this crate ships; callers may substitute their
//! own, which is why it's consumed entirely through the [`OperationsClient`]
//! trait.

use async_trait::async_trait;
use url::Url;

use crate::errors::{Error, Result};

#[async_trait]
pub trait OperationsClient: Send + Sync {
    async fn post(&self, relative_path: &str, json_body: serde_json::Value) -> Result<()>;
}

/// A thin `reqwest` wrapper around a base URL. `relative_path` is joined
/// onto the base (e.g. `/operations/settriggers`).
pub struct HttpOperationsClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpOperationsClient {
    pub fn new(base_url: Url) -> Self {
        HttpOperationsClient {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl OperationsClient for HttpOperationsClient {
    async fn post(&self, relative_path: &str, json_body: serde_json::Value) -> Result<()> {
        let url = self
            .base_url
            .join(relative_path.trim_start_matches('/'))
            .map_err(|e| Error::Operations {
                path: relative_path.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(path = relative_path, body_len = json_body.to_string().len(), "posting to operations endpoint");

        let response = self
            .client
            .post(url)
            .json(&json_body)
            .send()
            .await
            .map_err(|e| Error::Operations {
                path: relative_path.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Operations {
                path: relative_path.to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        Ok(())
    }
}
