//! # Ragnarok Client
//!
//! Talk to an uploaded document through a remote retrieval service.
//!
//! A [`session::DocumentSession`] is opened for one `(owner, document_id)`
//! pair. It first acquires the document's parsed content (fetching what the
//! service has stored, or having it parse the document on demand) and then
//! runs a multi-turn conversation whose answers carry citations back into
//! the document's chunks.
//!
//! ## Architecture
//!
//! ```text
//!          ┌─────────────────────────────────┐
//!          │         DocumentSession         │
//!          │      (owner, document_id)       │
//!          │  ┌─────────────┐ ┌───────────┐  │
//!          │  │ Acquisition │ │   Chat    │  │
//!          │  └──────┬──────┘ └─────┬─────┘  │
//!          └─────────┼──────────────┼────────┘
//!                    ▼              ▼
//!          ┌─────────────────────────────────┐
//!          │     DocumentService (HTTP)      │
//!          │   /file/parse        /query     │
//!          └─────────────────────────────────┘
//! ```
//!
//! Both controllers publish their state on `tokio::sync::watch` channels so
//! a front end (the `rgk` CLI here) can follow them without owning them.
//!
//! ## Quick Start
//!
//! ```bash
//! rgk --owner alice view 42 --chunks
//! rgk --owner alice ask 42 "What is the deadline?"
//! rgk --owner alice chat 42 --transcript chat.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`acquisition`] | Fetch-or-parse content controller |
//! | [`conversation`] | Serialized question/answer controller |
//! | [`session`] | Per-document scope owning both controllers |
//! | [`client`] | Service trait and HTTP implementation |
//! | [`models`] | Content, chat, and wire types |
//! | [`error`] | Tagged service errors |
//! | [`config`] | TOML configuration parsing |
//! | [`progress`] | Stderr progress reporting |
//! | [`view`] | `rgk view` command |
//! | [`chat`] | `rgk ask` / `rgk chat` commands |
//! | [`export`] | Transcript export |

pub mod acquisition;
pub mod chat;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod export;
pub mod models;
pub mod progress;
pub mod session;
pub mod view;
