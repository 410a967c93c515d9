//! `rgk ask` and `rgk chat`: question answering against one document.
//!
//! Both commands acquire the document first and only then offer the chat.
//! A failed acquisition is reported but does not block questions, since the
//! query service works from whatever the server has stored.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::conversation::SubmitOutcome;
use crate::export::write_transcript;
use crate::models::{AcquisitionState, ChatTurn, SourceCitation};
use crate::progress::{join_watcher, watch_conversation, ProgressMode};
use crate::session::{DocumentSession, SessionIdentity};
use crate::view::acquire;

const EXCERPT_CHARS: usize = 160;

#[derive(Serialize)]
struct AnswerOutput<'a> {
    answer: &'a str,
    sources: &'a [SourceCitation],
}

/// Open the session and report how acquisition ended.
async fn open_for_chat(
    config: &Config,
    identity: SessionIdentity,
    progress: ProgressMode,
) -> Result<DocumentSession> {
    let (session, state) = acquire(config, identity, progress).await?;
    if let AcquisitionState::Failed(err) = &state {
        eprintln!("Initial load/parse error: {}", err);
    }
    if !session.chat_available() {
        bail!("owner and document id are required");
    }
    Ok(session)
}

pub async fn run_ask(
    config: &Config,
    identity: SessionIdentity,
    query: &str,
    progress: ProgressMode,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let session = open_for_chat(config, identity, progress).await?;
    let watcher = watch_conversation(session.conversation().subscribe(), progress.reporter());

    let outcome = session.ask(query).await;
    let state = session.conversation().state();
    drop(session);
    join_watcher(watcher).await;

    match outcome {
        SubmitOutcome::Answered => {
            if let Some(turn) = state.transcript.last() {
                if json {
                    let out = AnswerOutput {
                        answer: &turn.text,
                        sources: &turn.sources,
                    };
                    println!("{}", serde_json::to_string_pretty(&out)?);
                } else {
                    print_answer(turn);
                }
            }
            Ok(())
        }
        SubmitOutcome::Failed => {
            let detail = state
                .last_error
                .map(|e| e.detail)
                .unwrap_or_else(|| "Failed to get an answer.".to_string());
            bail!("Chat error: {}", detail)
        }
        SubmitOutcome::Rejected => bail!("query was rejected"),
    }
}

pub async fn run_chat(
    config: &Config,
    identity: SessionIdentity,
    transcript: Option<&Path>,
    progress: ProgressMode,
) -> Result<()> {
    let session = open_for_chat(config, identity, progress).await?;
    if let Some(content) = session.acquisition().state().content() {
        eprintln!(
            "Loaded document {} ({} chunks). Ask something about the document, /quit to exit.",
            session.identity().document_id,
            content.chunks.len()
        );
    }

    let watcher = watch_conversation(session.conversation().subscribe(), progress.reporter());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("you> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == "/quit" || line == "/exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match session.ask(line).await {
            SubmitOutcome::Answered => {
                if let Some(turn) = session.conversation().state().transcript.last() {
                    print_answer(turn);
                }
            }
            SubmitOutcome::Failed => {
                if let Some(err) = session.conversation().state().last_error {
                    eprintln!("Chat error: {}", err);
                }
            }
            SubmitOutcome::Rejected => {}
        }
    }

    if let Some(path) = transcript {
        let state = session.conversation().state();
        write_transcript(Some(path), session.identity(), &state.transcript)?;
    }

    drop(session);
    join_watcher(watcher).await;
    Ok(())
}

fn print_answer(turn: &ChatTurn) {
    println!("{}", turn.text);
    if !turn.sources.is_empty() {
        println!();
        println!("--- Sources ({}) ---", turn.sources.len());
        for source in &turn.sources {
            println!("[chunk {}] {}", source.chunk_index, excerpt(&source.text, EXCERPT_CHARS));
        }
    }
    println!();
}

/// Single-line excerpt of at most `max` characters.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}
