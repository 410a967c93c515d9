//! Export a chat transcript as JSON.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;

use crate::models::ChatTurn;
use crate::session::SessionIdentity;

#[derive(Serialize)]
struct TranscriptExport<'a> {
    owner: &'a str,
    document_id: &'a str,
    exported_at: String,
    turns: &'a [ChatTurn],
}

/// Render a transcript as pretty-printed JSON.
pub fn transcript_json(identity: &SessionIdentity, turns: &[ChatTurn]) -> Result<String> {
    let export = TranscriptExport {
        owner: &identity.owner,
        document_id: &identity.document_id,
        exported_at: Utc::now().to_rfc3339(),
        turns,
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Write a transcript to `output`, or to stdout when `output` is `None`.
pub fn write_transcript(
    output: Option<&Path>,
    identity: &SessionIdentity,
    turns: &[ChatTurn],
) -> Result<()> {
    let json = transcript_json(identity, turns)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write transcript: {}", path.display()))?;
            eprintln!("Transcript: {} turns → {}", turns.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
