//! `rgk view`: acquire a document's content and print a summary.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::{AcquisitionState, DocumentContent};
use crate::progress::{join_watcher, watch_acquisition, ProgressMode};
use crate::session::{DocumentSession, SessionIdentity};

/// What to print besides the stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewOptions {
    pub raw: bool,
    pub chunks: bool,
    pub json: bool,
}

/// Resolve content for the session identity, reporting progress on stderr.
///
/// Returns the terminal state. Progress events are flushed before returning.
pub async fn acquire(
    config: &Config,
    identity: SessionIdentity,
    progress: ProgressMode,
) -> Result<(DocumentSession, AcquisitionState)> {
    let session = DocumentSession::connect(config, identity)?;
    let watcher = watch_acquisition(
        session.identity().document_id.clone(),
        session.acquisition().subscribe(),
        progress.reporter(),
    );
    let state = session.open().await;
    if state.is_terminal() {
        join_watcher(watcher).await;
    } else {
        watcher.abort();
    }
    Ok((session, state))
}

pub async fn run_view(
    config: &Config,
    identity: SessionIdentity,
    options: ViewOptions,
    progress: ProgressMode,
) -> Result<()> {
    let (session, state) = acquire(config, identity, progress).await?;

    match state {
        AcquisitionState::Ready(content) => {
            if options.json {
                println!("{}", serde_json::to_string_pretty(&content)?);
            } else {
                print_content(session.identity(), &content, options);
            }
            Ok(())
        }
        AcquisitionState::Failed(err) => bail!("Initial load/parse error: {}", err),
        AcquisitionState::Idle | AcquisitionState::Loading => {
            bail!("owner and document id are required")
        }
    }
}

pub fn print_content(identity: &SessionIdentity, content: &DocumentContent, options: ViewOptions) {
    println!("--- Document ---");
    println!("document_id:  {}", identity.document_id);
    println!("owner:        {}", identity.owner);
    println!("chars:        {}", content.stats.char_count);
    println!("chunks:       {}", content.stats.chunk_count);
    println!("avg_chunk:    {:.0}", content.stats.avg_chunk_size);
    println!();

    if options.raw {
        println!("--- Raw Text ---");
        if content.raw_text.is_empty() {
            println!("(no raw text available)");
        } else {
            println!("{}", content.raw_text);
        }
        println!();
    }

    if options.chunks {
        println!("--- Chunks ({}) ---", content.chunks.len());
        if content.chunks.is_empty() {
            println!("(no chunks available)");
        }
        for chunk in &content.chunks {
            println!("[chunk {}]", chunk.index);
            println!("{}", chunk.text);
            println!();
        }
    }
}
