//! Multi-turn chat against one document.
//!
//! Submissions are strictly serialized: while an answer is pending, further
//! submissions are rejected without touching state. The user's turn is
//! appended before the request goes out, so it survives a failed request.
//! A failed request sets `last_error` and adds nothing else to the
//! transcript, so every assistant turn is a real answer.
//! Dropping a `submit` future before it completes still clears `pending`.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::DocumentService;
use crate::error::ServiceError;
use crate::models::{ChatTurn, ConversationState, QueryRequest};

pub const DEFAULT_TOP_K: usize = 5;

/// What happened to a call to [`ConversationController::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Precondition unmet (blank query, missing identity, or already pending).
    Rejected,
    /// An assistant turn was appended.
    Answered,
    /// The request failed; see `last_error`.
    Failed,
}

pub struct ConversationController {
    service: Arc<dyn DocumentService>,
    state: watch::Sender<ConversationState>,
    top_k: usize,
}

impl ConversationController {
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        Self::with_top_k(service, DEFAULT_TOP_K)
    }

    pub fn with_top_k(service: Arc<dyn DocumentService>, top_k: usize) -> Self {
        let (state, _) = watch::channel(ConversationState::default());
        Self {
            service,
            state,
            top_k: top_k.max(1),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    pub async fn submit(&self, owner: &str, document_id: &str, query: &str) -> SubmitOutcome {
        let query = query.trim();
        let precondition = if query.is_empty() {
            Err(ServiceError::precondition("query is empty"))
        } else {
            ServiceError::require_identity(owner, document_id)
        };
        if let Err(err) = precondition {
            debug!(kind = ?err.kind, "ignoring submission: {}", err);
            return SubmitOutcome::Rejected;
        }

        // Pending check and user-turn append must be one step.
        let accepted = self.state.send_if_modified(|state| {
            if state.pending {
                return false;
            }
            state.transcript.push(ChatTurn::user(query));
            state.pending = true;
            state.last_error = None;
            true
        });
        if !accepted {
            let err = ServiceError::precondition("a query is already pending");
            debug!(owner, document_id, kind = ?err.kind, "ignoring submission: {}", err);
            return SubmitOutcome::Rejected;
        }

        let mut guard = PendingGuard {
            state: &self.state,
            armed: true,
        };

        let request = QueryRequest {
            query: query.to_string(),
            top_k: self.top_k,
        };
        let result = self.service.query(owner, document_id, &request).await;

        let mut outcome = SubmitOutcome::Answered;
        self.state.send_modify(|state| {
            match result {
                Ok(response) => {
                    info!(
                        owner,
                        document_id,
                        sources = response.source_chunks.len(),
                        "answer received"
                    );
                    state
                        .transcript
                        .push(ChatTurn::assistant(response.answer, response.source_chunks));
                }
                Err(err) => {
                    warn!(owner, document_id, kind = ?err.kind, "query failed: {}", err);
                    state.last_error = Some(err);
                    outcome = SubmitOutcome::Failed;
                }
            }
            state.pending = false;
        });
        guard.armed = false;
        outcome
    }
}

/// Clears `pending` when a submission is dropped before its answer is recorded.
struct PendingGuard<'a> {
    state: &'a watch::Sender<ConversationState>,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let reset = self.state.send_if_modified(|state| {
            let was_pending = state.pending;
            state.pending = false;
            was_pending
        });
        if reset {
            debug!("submission dropped before an answer arrived");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ServiceError};
    use crate::models::{ParsePayload, QueryResponse, Role, SourceCitation};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct ScriptedQueries {
        replies: Mutex<VecDeque<Result<QueryResponse, ServiceError>>>,
        seen: Mutex<Vec<(String, usize)>>,
        gate: Option<(Notify, Notify)>,
        calls: AtomicUsize,
    }

    impl ScriptedQueries {
        fn new(replies: Vec<Result<QueryResponse, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
                gate: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn gated(replies: Vec<Result<QueryResponse, ServiceError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
                gate: Some((Notify::new(), Notify::new())),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DocumentService for ScriptedQueries {
        async fn get_or_parse(&self, _: &str, _: &str) -> Result<ParsePayload, ServiceError> {
            unreachable!("conversation never fetches content")
        }

        async fn query(&self, _: &str, _: &str, request: &QueryRequest) -> Result<QueryResponse, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((request.query.clone(), request.top_k));
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::remote("script exhausted")))
        }
    }

    fn answer(text: &str, sources: Vec<SourceCitation>) -> QueryResponse {
        QueryResponse {
            answer: text.to_string(),
            source_chunks: sources,
        }
    }

    #[tokio::test]
    async fn successful_submit_appends_user_then_assistant() {
        let svc = ScriptedQueries::new(vec![Ok(answer(
            "42",
            vec![SourceCitation { chunk_index: 1, text: "world".into() }],
        ))]);
        let ctl = ConversationController::new(svc.clone());

        let outcome = ctl.submit("alice", "42", "What is the deadline?").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        let state = ctl.state();
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.transcript[0].role, Role::User);
        assert_eq!(state.transcript[0].text, "What is the deadline?");
        assert!(state.transcript[0].sources.is_empty());
        assert_eq!(state.transcript[1].role, Role::Assistant);
        assert_eq!(state.transcript[1].text, "42");
        assert_eq!(
            state.transcript[1].sources,
            vec![SourceCitation { chunk_index: 1, text: "world".into() }]
        );
        assert!(!state.pending);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn query_is_trimmed_and_sent_with_top_k() {
        let svc = ScriptedQueries::new(vec![Ok(answer("ok", vec![]))]);
        let ctl = ConversationController::with_top_k(svc.clone(), 3);

        ctl.submit("alice", "42", "  when?  \n").await;

        assert_eq!(ctl.state().transcript[0].text, "when?");
        assert_eq!(*svc.seen.lock().unwrap(), vec![("when?".to_string(), 3)]);
    }

    #[tokio::test]
    async fn default_top_k_is_five() {
        let svc = ScriptedQueries::new(vec![Ok(answer("ok", vec![]))]);
        let ctl = ConversationController::new(svc.clone());
        ctl.submit("alice", "42", "q").await;
        assert_eq!(svc.seen.lock().unwrap()[0].1, 5);
    }

    #[tokio::test]
    async fn failed_submit_keeps_only_user_turn() {
        let svc = ScriptedQueries::new(vec![Err(ServiceError::remote(
            "An internal error occurred while processing the query.",
        ))]);
        let ctl = ConversationController::new(svc);

        let outcome = ctl.submit("alice", "42", "What is the deadline?").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        let state = ctl.state();
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].role, Role::User);
        assert!(!state.pending);
        let err = state.last_error.expect("error recorded");
        assert_eq!(err.kind, ErrorKind::RemoteFailure);
    }

    #[tokio::test]
    async fn next_submission_clears_last_error() {
        let svc = ScriptedQueries::new(vec![
            Err(ServiceError::transport("network error")),
            Ok(answer("fine now", vec![])),
        ]);
        let ctl = ConversationController::new(svc);

        ctl.submit("alice", "42", "first").await;
        assert!(ctl.state().last_error.is_some());

        ctl.submit("alice", "42", "second").await;
        let state = ctl.state();
        assert!(state.last_error.is_none());
        let texts: Vec<&str> = state.transcript.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "fine now"]);
    }

    #[tokio::test]
    async fn blank_query_leaves_state_unchanged() {
        let svc = ScriptedQueries::new(vec![]);
        let ctl = ConversationController::new(svc.clone());

        assert_eq!(ctl.submit("alice", "42", "").await, SubmitOutcome::Rejected);
        assert_eq!(ctl.submit("alice", "42", "   \t\n").await, SubmitOutcome::Rejected);

        assert_eq!(ctl.state(), ConversationState::default());
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let svc = ScriptedQueries::new(vec![]);
        let ctl = ConversationController::new(svc.clone());

        assert_eq!(ctl.submit("", "42", "q").await, SubmitOutcome::Rejected);
        assert_eq!(ctl.submit("alice", "", "q").await, SubmitOutcome::Rejected);
        assert!(ctl.state().transcript.is_empty());
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_while_pending_is_a_no_op() {
        let svc = ScriptedQueries::gated(vec![Ok(answer("first answer", vec![]))]);
        let ctl = Arc::new(ConversationController::new(svc.clone()));

        let first = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.submit("alice", "42", "first").await })
        };
        let (entered, release) = svc.gate.as_ref().unwrap();
        entered.notified().await;

        let during = ctl.state();
        assert!(during.pending);
        assert_eq!(during.transcript.len(), 1);

        assert_eq!(ctl.submit("alice", "42", "second").await, SubmitOutcome::Rejected);
        assert_eq!(ctl.state().transcript.len(), 1);
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);

        release.notify_one();
        assert_eq!(first.await.unwrap(), SubmitOutcome::Answered);

        let state = ctl.state();
        assert!(!state.pending);
        let texts: Vec<&str> = state.transcript.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "first answer"]);
    }

    #[tokio::test]
    async fn dropped_submit_clears_pending() {
        let svc = ScriptedQueries::gated(vec![Ok(answer("late answer", vec![]))]);
        let ctl = ConversationController::new(svc.clone());

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), ctl.submit("alice", "42", "first")).await;
        assert!(timed_out.is_err());

        let state = ctl.state();
        assert!(!state.pending);
        assert_eq!(state.transcript.len(), 1);
        assert!(state.last_error.is_none());

        let (_, release) = svc.gate.as_ref().unwrap();
        release.notify_one();
        assert_eq!(ctl.submit("alice", "42", "second").await, SubmitOutcome::Answered);
        let texts: Vec<String> = ctl.state().transcript.into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["first", "second", "late answer"]);
    }

    #[tokio::test]
    async fn subscribers_see_pending_transitions() {
        let svc = ScriptedQueries::new(vec![Ok(answer("a", vec![]))]);
        let ctl = ConversationController::new(svc);
        let mut rx = ctl.subscribe();

        ctl.submit("alice", "42", "q").await;

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.transcript.len(), 2);
        assert!(!seen.pending);
    }
}
