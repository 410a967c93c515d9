//! Content acquisition: fetch a document's parsed content, or have the
//! service parse it on demand.
//!
//! # State machine
//!
//! ```text
//!            resolve()
//!   Idle ───────────────▶ Loading ──get-or-parse──▶ Ready(content)
//!                            │
//!                            ├── 404 ──retry once──▶ Ready | Failed
//!                            │
//!                            └── other error ─────▶ Failed(error)
//! ```
//!
//! The 404 retry is a single explicit step: the second request is the one
//! that makes the service parse and store the document. A retry answer that
//! only says "already been parsed" without content is reported as `Failed`
//! with a hint to reopen the view; the controller never loops on it.
//!
//! Every call takes a generation ticket. When a newer `resolve` starts
//! while an older one is still waiting on the network, the older result is
//! dropped instead of overwriting state. A call whose future is dropped
//! mid-flight leaves `Failed` ("request cancelled") behind, not `Loading`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::DocumentService;
use crate::error::{ErrorKind, ServiceError};
use crate::models::{AcquisitionState, DocumentContent, ParsePayload};

const STORED_MARKER: &str = "stored successfully";
const ALREADY_PARSED_MARKER: &str = "already been parsed";

const CANCELLED_DETAIL: &str = "request cancelled";

/// Reported when the retry claims the document is parsed but carries no content.
pub const ALREADY_PARSED_HINT: &str = "File already parsed, but initial fetch failed. Try refreshing.";

pub struct ContentAcquisitionController {
    service: Arc<dyn DocumentService>,
    state: watch::Sender<AcquisitionState>,
    generation: AtomicU64,
}

impl ContentAcquisitionController {
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        let (state, _) = watch::channel(AcquisitionState::Idle);
        Self {
            service,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AcquisitionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AcquisitionState {
        self.state.borrow().clone()
    }

    /// Resolve the parsed content for `(owner, document_id)`.
    ///
    /// Returns the state as it stands once this call is done. If the call
    /// was superseded, that is whatever the newer call has written so far.
    /// With an empty owner or document id nothing happens.
    pub async fn resolve(&self, owner: &str, document_id: &str) -> AcquisitionState {
        if let Err(err) = ServiceError::require_identity(owner, document_id) {
            debug!(kind = ?err.kind, "{}, waiting before acquiring content", err);
            return self.state();
        }

        let mut ticket = 0;
        self.state.send_modify(|state| {
            ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = AcquisitionState::Loading;
        });
        debug!(owner, document_id, ticket, "acquiring content");
        let mut guard = LoadingGuard {
            controller: self,
            ticket,
            armed: true,
        };

        let outcome = self.acquire(owner, document_id).await;

        let applied = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *state = match &outcome {
                Ok(content) => AcquisitionState::Ready(content.clone()),
                Err(err) => AcquisitionState::Failed(err.clone()),
            };
            true
        });
        guard.armed = false;

        if !applied {
            debug!(owner, document_id, ticket, "discarding superseded acquisition result");
            return self.state();
        }

        match &outcome {
            Ok(content) => info!(
                owner,
                document_id,
                chunks = content.chunks.len(),
                chars = content.stats.char_count,
                "content ready"
            ),
            Err(err) => warn!(owner, document_id, kind = ?err.kind, "content acquisition failed: {}", err),
        }
        self.state()
    }

    async fn acquire(
        &self,
        owner: &str,
        document_id: &str,
    ) -> Result<DocumentContent, ServiceError> {
        match self.service.get_or_parse(owner, document_id).await {
            Ok(payload) => Ok(DocumentContent::from_payload(payload)),
            Err(err) if err.is_not_found() => {
                info!(owner, document_id, "content not found, requesting parse");
                match self.service.get_or_parse(owner, document_id).await {
                    Ok(payload) => accept_parse_result(payload, document_id),
                    // Not-found never leaves the controller as its own kind.
                    Err(retry_err) if retry_err.is_not_found() => {
                        Err(ServiceError::new(ErrorKind::RemoteFailure, retry_err.detail))
                    }
                    Err(retry_err) => Err(retry_err),
                }
            }
            Err(err) => Err(err),
        }
    }
}

/// Moves a dropped `resolve` out of `Loading`, unless a newer call owns the state.
struct LoadingGuard<'a> {
    controller: &'a ContentAcquisitionController,
    ticket: u64,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let ticket = self.ticket;
        let generation = &self.controller.generation;
        let reset = self.controller.state.send_if_modified(|state| {
            if generation.load(Ordering::SeqCst) != ticket || !state.is_loading() {
                return false;
            }
            *state = AcquisitionState::Failed(ServiceError::transport(CANCELLED_DETAIL));
            true
        });
        if reset {
            debug!(ticket, "acquisition dropped before completion");
        }
    }
}

/// Interpret the answer to the parse-triggering retry.
fn accept_parse_result(
    payload: ParsePayload,
    document_id: &str,
) -> Result<DocumentContent, ServiceError> {
    if payload.has_content() || payload.message_contains(STORED_MARKER) {
        return Ok(DocumentContent::from_payload(payload));
    }
    if payload.message_contains(ALREADY_PARSED_MARKER) {
        return Err(ServiceError::remote(ALREADY_PARSED_HINT));
    }
    let detail = payload
        .detail
        .or(payload.message)
        .unwrap_or_else(|| format!("Failed to parse document {}.", document_id));
    Err(ServiceError::remote(detail))
}
