//! Remote document service: the trait the controllers talk to and its HTTP
//! implementation.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET`  | `/file/parse/{owner}/{document_id}` | return stored content, or parse and store it |
//! | `POST` | `/query/{owner}/{document_id}` | answer a question with `{query, top_k}` |
//!
//! Status mapping:
//! - 2xx with a JSON body → `Ok`
//! - 2xx with an unreadable body → [`ErrorKind::RemoteFailure`](crate::error::ErrorKind::RemoteFailure)
//! - 404 → [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound)
//! - other non-2xx → `RemoteFailure` with the server's `detail` when present
//! - no response (connect error, timeout) → `TransportFailure`
//!
//! Timeouts are enforced by the `reqwest` client, never by the controllers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::models::{ParsePayload, QueryRequest, QueryResponse};

/// Operations the controllers consume from the remote service.
///
/// Implemented over HTTP by [`HttpDocumentService`]; tests substitute
/// scripted in-memory implementations.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Return parsed content for the document, parsing it server-side if
    /// it has not been parsed yet.
    async fn get_or_parse(
        &self,
        owner: &str,
        document_id: &str,
    ) -> std::result::Result<ParsePayload, ServiceError>;

    /// Ask a question about the document.
    async fn query(
        &self,
        owner: &str,
        document_id: &str,
        request: &QueryRequest,
    ) -> std::result::Result<QueryResponse, ServiceError>;
}

/// [`DocumentService`] over HTTP/JSON.
pub struct HttpDocumentService {
    client: reqwest::Client,
    base: Url,
}

impl HttpDocumentService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base = Url::parse(config.base_url.trim())
            .with_context(|| format!("Invalid service base URL: {}", config.base_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Service base URL cannot be a base: {}", config.base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, base })
    }

    /// Join percent-encoded path segments onto the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn get_or_parse(
        &self,
        owner: &str,
        document_id: &str,
    ) -> std::result::Result<ParsePayload, ServiceError> {
        let url = self.endpoint(&["file", "parse", owner, document_id]);
        debug!(%url, "get-or-parse request");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        read_json(response).await
    }

    async fn query(
        &self,
        owner: &str,
        document_id: &str,
        request: &QueryRequest,
    ) -> std::result::Result<QueryResponse, ServiceError> {
        let url = self.endpoint(&["query", owner, document_id]);
        debug!(%url, top_k = request.top_k, "query request");

        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, ServiceError> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await?;
        return serde_json::from_str(&body)
            .map_err(|e| ServiceError::remote(format!("invalid response body: {}", e)));
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::from_status(
        status.as_u16(),
        &body,
        status.canonical_reason().unwrap_or(""),
    ))
}
