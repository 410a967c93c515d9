//! Core data models shared by the controllers.
//!
//! Two families live here: the normalized types the controllers expose
//! ([`DocumentContent`], [`ChatTurn`], the two state types), and the wire
//! payloads exchanged with the remote service ([`ParsePayload`],
//! [`QueryRequest`], [`QueryResponse`]). Wire payloads are lenient: every
//! field the service may omit is optional and unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A contiguous slice of a document's text, the unit of retrieval and citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
}

/// Derived metrics about a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentStats {
    pub char_count: usize,
    pub chunk_count: usize,
    pub avg_chunk_size: f64,
}

impl ContentStats {
    /// Compute stats locally from text and chunks.
    ///
    /// Character counts are Unicode scalar values, not bytes.
    pub fn derive(raw_text: &str, chunks: &[Chunk]) -> Self {
        let chunk_count = chunks.len();
        let avg_chunk_size = if chunk_count == 0 {
            0.0
        } else {
            let total: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
            total as f64 / chunk_count as f64
        };
        Self {
            char_count: raw_text.chars().count(),
            chunk_count,
            avg_chunk_size,
        }
    }
}

/// Parsed content of one document, normalized from a [`ParsePayload`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentContent {
    pub raw_text: String,
    pub chunks: Vec<Chunk>,
    pub stats: ContentStats,
}

impl DocumentContent {
    /// Normalize a service payload.
    ///
    /// Bare-string chunks get their positional index. Stats supplied by the
    /// service are kept field by field; any missing field is derived.
    pub fn from_payload(payload: ParsePayload) -> Self {
        let raw_text = payload.raw_text.unwrap_or_default();
        let chunks: Vec<Chunk> = payload
            .chunks
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(pos, wire)| wire.into_chunk(pos))
            .collect();

        let derived = ContentStats::derive(&raw_text, &chunks);
        let stats = match payload.stats {
            Some(remote) => ContentStats {
                char_count: remote.char_count.unwrap_or(derived.char_count),
                chunk_count: remote.chunk_count.unwrap_or(derived.chunk_count),
                avg_chunk_size: remote.avg_chunk_size.unwrap_or(derived.avg_chunk_size),
            },
            None => derived,
        };

        Self {
            raw_text,
            chunks,
            stats,
        }
    }
}

/// Lifecycle of content acquisition for one document view.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Loading,
    Ready(DocumentContent),
    Failed(ServiceError),
}

impl AcquisitionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// `Ready` or `Failed`: the point at which chat may be offered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }

    pub fn content(&self) -> Option<&DocumentContent> {
        match self {
            Self::Ready(content) => Some(content),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A reference from an assistant answer back to a chunk that supports it.
///
/// The excerpt is copied so the transcript stays valid if the document is
/// re-chunked later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    pub sources: Vec<SourceCitation>,
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sources: Vec::new(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, sources: Vec<SourceCitation>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            sources,
            at: Utc::now(),
        }
    }
}

/// Chat state for one document view. The transcript is append-only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationState {
    pub transcript: Vec<ChatTurn>,
    pub pending: bool,
    pub last_error: Option<ServiceError>,
}

// ============ Wire payloads ============

/// Body of a successful `GET /file/parse/{owner}/{id}`.
///
/// The service returns either stored content, a status message, or both.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParsePayload {
    pub raw_text: Option<String>,
    pub chunks: Option<Vec<WireChunk>>,
    pub stats: Option<WireStats>,
    pub message: Option<String>,
    pub detail: Option<String>,
}

impl ParsePayload {
    pub fn has_content(&self) -> bool {
        self.raw_text.is_some() || self.chunks.is_some()
    }

    pub fn message_contains(&self, needle: &str) -> bool {
        self.message.as_deref().is_some_and(|m| m.contains(needle))
    }
}

/// A chunk as sent by the service: a bare string or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireChunk {
    Text(String),
    Object {
        text: String,
        #[serde(default, alias = "chunk_index")]
        index: Option<usize>,
    },
}

impl WireChunk {
    fn into_chunk(self, position: usize) -> Chunk {
        match self {
            WireChunk::Text(text) => Chunk {
                text,
                index: position,
            },
            WireChunk::Object { text, index } => Chunk {
                text,
                index: index.unwrap_or(position),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireStats {
    pub char_count: Option<usize>,
    pub chunk_count: Option<usize>,
    pub avg_chunk_size: Option<f64>,
}

/// Body of `POST /query/{owner}/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub query: String,
    pub top_k: usize,
}

/// Successful answer from the query service.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub source_chunks: Vec<SourceCitation>,
}
