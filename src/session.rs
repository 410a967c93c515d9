//! One open document view: the owner identity, the document id, and the
//! two controllers that work on them.
//!
//! The owner is injected by whoever established the login and is never
//! changed for the life of the session.

use anyhow::Result;
use std::sync::Arc;

use crate::acquisition::ContentAcquisitionController;
use crate::client::{DocumentService, HttpDocumentService};
use crate::config::Config;
use crate::conversation::{ConversationController, SubmitOutcome, DEFAULT_TOP_K};
use crate::models::AcquisitionState;

/// The `(owner, document_id)` key a session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub owner: String,
    pub document_id: String,
}

impl SessionIdentity {
    pub fn new(owner: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            document_id: document_id.into(),
        }
    }

    /// Both parts are present.
    pub fn is_complete(&self) -> bool {
        !self.owner.trim().is_empty() && !self.document_id.trim().is_empty()
    }
}

pub struct DocumentSession {
    identity: SessionIdentity,
    acquisition: ContentAcquisitionController,
    conversation: ConversationController,
}

impl DocumentSession {
    pub fn new(identity: SessionIdentity, service: Arc<dyn DocumentService>) -> Self {
        Self::with_top_k(identity, service, DEFAULT_TOP_K)
    }

    pub fn with_top_k(
        identity: SessionIdentity,
        service: Arc<dyn DocumentService>,
        top_k: usize,
    ) -> Self {
        Self {
            identity,
            acquisition: ContentAcquisitionController::new(service.clone()),
            conversation: ConversationController::with_top_k(service, top_k),
        }
    }

    /// Session against the HTTP service described by `config`.
    pub fn connect(config: &Config, identity: SessionIdentity) -> Result<Self> {
        let service = HttpDocumentService::new(&config.service)?;
        Ok(Self::with_top_k(identity, Arc::new(service), config.query.top_k))
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn acquisition(&self) -> &ContentAcquisitionController {
        &self.acquisition
    }

    pub fn conversation(&self) -> &ConversationController {
        &self.conversation
    }

    /// Acquire the document's content.
    pub async fn open(&self) -> AcquisitionState {
        self.acquisition
            .resolve(&self.identity.owner, &self.identity.document_id)
            .await
    }

    /// Chat is offered once acquisition has reached Ready or Failed.
    pub fn chat_available(&self) -> bool {
        self.identity.is_complete() && self.acquisition.state().is_terminal()
    }

    pub async fn ask(&self, query: &str) -> SubmitOutcome {
        self.conversation
            .submit(&self.identity.owner, &self.identity.document_id, query)
            .await
    }
}
