//! Speech recognition client
//!
//! Uploads the utterance WAV and folds the streamed event sequence down to
//! the final transcript. The service emits many interim events per request;
//! only the final understanding carries the transcript and intent we act on.

use serde::Deserialize;

use super::stream::StreamingJsonParser;
use crate::{Error, Result};

/// Event type that carries the authoritative transcript
const FINAL_UNDERSTANDING: &str = "FINAL_UNDERSTANDING";

/// One event object from the recognition stream
#[derive(Debug, Deserialize)]
pub struct RecognitionEvent {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub is_final: bool,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub intents: Vec<Intent>,
}

#[derive(Debug, Deserialize)]
pub struct Intent {
    pub name: String,
}

/// Transcript and matched intent from one recognition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptResult {
    pub text: String,
    pub intent: Option<String>,
}

/// Folds a stream of recognition events into the final transcript
///
/// Interim `PARTIAL_TRANSCRIPTION` and non-final understanding events are
/// observed and dropped; the last final understanding wins.
#[derive(Debug, Default)]
pub struct TranscriptCollector {
    result: Option<TranscriptResult>,
}

impl TranscriptCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one event object from the stream
    pub fn absorb(&mut self, value: &serde_json::Value) {
        let event: RecognitionEvent = match serde_json::from_value(value.clone()) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "unrecognized event shape, skipping");
                return;
            }
        };

        if event.kind != FINAL_UNDERSTANDING || !event.is_final {
            tracing::trace!(kind = %event.kind, "interim recognition event");
            return;
        }

        tracing::debug!(text = %event.text, "final transcript");
        self.result = Some(TranscriptResult {
            text: event.text,
            intent: event.intents.into_iter().next().map(|i| i.name),
        });
    }

    /// The final transcript, if one arrived
    #[must_use]
    pub fn finish(self) -> Option<TranscriptResult> {
        self.result
    }
}

/// Recognize the speech in a WAV artifact
///
/// # Errors
///
/// Returns error on transport failure, a non-success status, or when the
/// stream ends without a final transcript.
pub async fn recognize(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    wav_bytes: Vec<u8>,
) -> Result<TranscriptResult> {
    let mut response = client
        .post(url)
        .bearer_auth(token)
        .header(reqwest::header::CONTENT_TYPE, "audio/wav")
        .body(wav_bytes)
        .send()
        .await?
        .error_for_status()?;

    let mut parser = StreamingJsonParser::new();
    let mut collector = TranscriptCollector::new();

    while let Some(chunk) = response.chunk().await? {
        for value in parser.feed_bytes(&chunk) {
            collector.absorb(&value);
        }
    }

    if !parser.is_empty() {
        tracing::debug!(pending = parser.pending_len(), "stream ended mid-object");
    }

    collector
        .finish()
        .ok_or_else(|| Error::Upload("recognition stream had no final transcript".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absorb_all(collector: &mut TranscriptCollector, body: &[u8]) {
        let mut parser = StreamingJsonParser::new();
        for value in parser.feed_bytes(body) {
            collector.absorb(&value);
        }
    }

    #[test]
    fn partial_events_are_ignored() {
        let mut collector = TranscriptCollector::new();
        absorb_all(
            &mut collector,
            br#"{"type":"PARTIAL_TRANSCRIPTION","text":"turn"}
               {"type":"PARTIAL_TRANSCRIPTION","text":"turn on the"}
               {"type":"FINAL_UNDERSTANDING","is_final":true,"text":"turn on the light","intents":[{"name":"lights_on"}]}"#,
        );

        let result = collector.finish().unwrap();
        assert_eq!(result.text, "turn on the light");
        assert_eq!(result.intent.as_deref(), Some("lights_on"));
    }

    #[test]
    fn non_final_understanding_is_ignored() {
        let mut collector = TranscriptCollector::new();
        absorb_all(
            &mut collector,
            br#"{"type":"FINAL_UNDERSTANDING","is_final":false,"text":"turn on"}"#,
        );
        assert!(collector.finish().is_none());
    }

    #[test]
    fn missing_intents_yields_none() {
        let mut collector = TranscriptCollector::new();
        absorb_all(
            &mut collector,
            br#"{"type":"FINAL_UNDERSTANDING","is_final":true,"text":"hello there"}"#,
        );

        let result = collector.finish().unwrap();
        assert_eq!(result.text, "hello there");
        assert_eq!(result.intent, None);
    }

    #[test]
    fn last_final_understanding_wins() {
        let mut collector = TranscriptCollector::new();
        absorb_all(
            &mut collector,
            br#"{"type":"FINAL_UNDERSTANDING","is_final":true,"text":"first"}
               {"type":"FINAL_UNDERSTANDING","is_final":true,"text":"second"}"#,
        );
        assert_eq!(collector.finish().unwrap().text, "second");
    }

    #[test]
    fn empty_stream_has_no_transcript() {
        let collector = TranscriptCollector::new();
        assert!(collector.finish().is_none());
    }
}
