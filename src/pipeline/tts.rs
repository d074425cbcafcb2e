//! Speech synthesis client
//!
//! Streams the synthesized reply straight to disk: the file is opened on
//! the first body chunk, each chunk is appended as it arrives, and the file
//! is closed when the stream finishes. The reply can be longer than memory
//! comfortably allows on small devices, so it is never buffered whole.

use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Synthesize `text` to a WAV file at `out_path`
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns error on transport failure, a non-success status, an empty
/// response body, or a file write failure.
pub async fn synthesize(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    model: &str,
    voice: &str,
    text: &str,
    out_path: &Path,
) -> Result<u64> {
    tracing::debug!(model, voice, chars = text.len(), "requesting synthesis");

    let mut response = client
        .post(url)
        .bearer_auth(token)
        .json(&SpeechRequest {
            model,
            input: text,
            voice,
            response_format: "wav",
        })
        .send()
        .await?
        .error_for_status()?;

    let mut file: Option<tokio::fs::File> = None;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        let out = match file.as_mut() {
            Some(out) => out,
            None => file.insert(tokio::fs::File::create(out_path).await?),
        };
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    match file {
        Some(mut out) => {
            out.flush().await?;
            tracing::debug!(bytes = written, path = %out_path.display(), "synthesis saved");
            Ok(written)
        }
        None => Err(Error::Upload("synthesis response was empty".to_string())),
    }
}
