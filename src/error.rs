//! Error taxonomy for calls against the remote document service.
//!
//! Every failure the controllers can observe is folded into a single
//! [`ServiceError`] carrying an [`ErrorKind`] tag and a human-readable
//! detail string. The detail is taken from the server's `{"detail": ...}`
//! body when one is present, otherwise from the transport.
//!
//! | Kind | Meaning | Surfaced to the caller? |
//! |------|---------|-------------------------|
//! | [`ErrorKind::NotFound`] | content not parsed yet (HTTP 404) | no, consumed by the acquisition retry |
//! | [`ErrorKind::RemoteFailure`] | any other non-2xx, or an unreadable 2xx body | yes |
//! | [`ErrorKind::TransportFailure`] | no response (connect error, timeout) | yes |
//! | [`ErrorKind::PreconditionUnmet`] | missing owner, document id, or query | no, silently ignored |

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    RemoteFailure,
    TransportFailure,
    PreconditionUnmet,
}

/// A tagged service error: `{kind, detail}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{detail}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    pub fn remote(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteFailure, detail)
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportFailure, detail)
    }

    pub fn precondition(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionUnmet, detail)
    }

    /// `PreconditionUnmet` unless both owner and document id are present.
    pub fn require_identity(owner: &str, document_id: &str) -> Result<(), Self> {
        if owner.trim().is_empty() {
            return Err(Self::precondition("owner is missing"));
        }
        if document_id.trim().is_empty() {
            return Err(Self::precondition("document id is missing"));
        }
        Ok(())
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Build an error from a non-2xx HTTP response.
    ///
    /// `body` is the raw response body. If it is a JSON object with a string
    /// `detail` (or `message`) field, that text becomes the detail; otherwise
    /// `fallback` (usually the status reason phrase) is used.
    pub fn from_status(status: u16, body: &str, fallback: &str) -> Self {
        let detail = extract_detail(body).unwrap_or_else(|| {
            if fallback.is_empty() {
                format!("request failed with HTTP {}", status)
            } else {
                fallback.to_string()
            }
        });
        if status == 404 {
            Self::not_found(detail)
        } else {
            Self::remote(detail)
        }
    }
}

/// Pull a server-provided message out of an error body.
fn extract_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"].iter().find_map(|key| {
        json.get(*key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::remote(format!("invalid response body: {}", err))
        } else {
            Self::transport(format!("network error: {}", err))
        }
    }
}
