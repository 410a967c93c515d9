//! Progress reporting for content acquisition and chat turns.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.
//! Reporters are fed by watcher tasks that follow a controller's state
//! channel and translate transitions into [`ProgressEvent`]s.

use std::io::Write;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::models::{AcquisitionState, ConversationState};

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Content is being fetched or parsed.
    Loading { document_id: String },
    /// Content is available.
    Ready {
        document_id: String,
        chunks: usize,
        chars: usize,
    },
    /// Content could not be acquired.
    Failed {
        document_id: String,
        message: String,
    },
    /// A question is waiting for its answer.
    Thinking,
    /// An answer arrived with this many citations.
    Answered { sources: usize },
    /// The question failed.
    ChatFailed { message: String },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "document 42  ready  1,234 chars / 9 chunks".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Loading { document_id } => {
                format!("document {}  loading or parsing content...\n", document_id)
            }
            ProgressEvent::Ready {
                document_id,
                chunks,
                chars,
            } => format!(
                "document {}  ready  {} chars / {} chunks\n",
                document_id,
                format_number(*chars as u64),
                format_number(*chunks as u64)
            ),
            ProgressEvent::Failed {
                document_id,
                message,
            } => format!("document {}  failed  {}\n", document_id, message),
            ProgressEvent::Thinking => "thinking...\n".to_string(),
            ProgressEvent::Answered { sources } => format!("answered  {} sources\n", sources),
            ProgressEvent::ChatFailed { message } => format!("chat error  {}\n", message),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Loading { document_id } => serde_json::json!({
                "event": "progress",
                "document_id": document_id,
                "phase": "loading"
            }),
            ProgressEvent::Ready {
                document_id,
                chunks,
                chars,
            } => serde_json::json!({
                "event": "progress",
                "document_id": document_id,
                "phase": "ready",
                "chunks": chunks,
                "chars": chars
            }),
            ProgressEvent::Failed {
                document_id,
                message,
            } => serde_json::json!({
                "event": "progress",
                "document_id": document_id,
                "phase": "failed",
                "message": message
            }),
            ProgressEvent::Thinking => serde_json::json!({
                "event": "chat",
                "phase": "thinking"
            }),
            ProgressEvent::Answered { sources } => serde_json::json!({
                "event": "chat",
                "phase": "answered",
                "sources": sources
            }),
            ProgressEvent::ChatFailed { message } => serde_json::json!({
                "event": "chat",
                "phase": "failed",
                "message": message
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}

/// Map an acquisition state to the event it should produce, if any.
pub fn acquisition_event(document_id: &str, state: &AcquisitionState) -> Option<ProgressEvent> {
    match state {
        AcquisitionState::Idle => None,
        AcquisitionState::Loading => Some(ProgressEvent::Loading {
            document_id: document_id.to_string(),
        }),
        AcquisitionState::Ready(content) => Some(ProgressEvent::Ready {
            document_id: document_id.to_string(),
            chunks: content.chunks.len(),
            chars: content.stats.char_count,
        }),
        AcquisitionState::Failed(err) => Some(ProgressEvent::Failed {
            document_id: document_id.to_string(),
            message: err.detail.clone(),
        }),
    }
}

/// Map a conversation change to an event, given whether a request was pending before.
pub fn conversation_event(was_pending: bool, state: &ConversationState) -> Option<ProgressEvent> {
    match (was_pending, state.pending) {
        (false, true) => Some(ProgressEvent::Thinking),
        (true, false) => Some(match &state.last_error {
            Some(err) => ProgressEvent::ChatFailed {
                message: err.detail.clone(),
            },
            None => ProgressEvent::Answered {
                sources: state
                    .transcript
                    .last()
                    .map(|turn| turn.sources.len())
                    .unwrap_or(0),
            },
        }),
        _ => None,
    }
}

/// Follow acquisition state until it turns terminal or the controller goes away.
pub fn watch_acquisition(
    document_id: String,
    mut rx: watch::Receiver<AcquisitionState>,
    reporter: Arc<dyn ProgressReporter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let (event, terminal) = {
                let state = rx.borrow_and_update();
                (acquisition_event(&document_id, &state), state.is_terminal())
            };
            if let Some(event) = event {
                reporter.report(event);
            }
            if terminal {
                break;
            }
        }
    })
}

/// Follow conversation state until the controller goes away.
pub fn watch_conversation(
    mut rx: watch::Receiver<ConversationState>,
    reporter: Arc<dyn ProgressReporter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut was_pending = rx.borrow().pending;
        while rx.changed().await.is_ok() {
            let (event, pending) = {
                let state = rx.borrow_and_update();
                (conversation_event(was_pending, &state), state.pending)
            };
            was_pending = pending;
            if let Some(event) = event {
                reporter.report(event);
            }
        }
    })
}

/// Wait for a watcher task. Returns false, with a warning, if it panicked.
pub async fn join_watcher(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(err) => {
            warn!("progress reporter stopped: {}", err);
            false
        }
    }
}
