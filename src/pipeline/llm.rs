//! Language model client
//!
//! Sends the transcript as a single-turn request and extracts the first
//! text block of the first output message as the reply.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

/// Ask the language model for a reply to the transcript
///
/// # Errors
///
/// Returns error on transport failure, a non-success status, or a response
/// with no text content.
pub async fn complete(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    model: &str,
    input: &str,
) -> Result<String> {
    tracing::debug!(model, "requesting completion");

    let messages: Vec<OutputMessage> = client
        .post(url)
        .bearer_auth(token)
        .json(&CompletionRequest { model, input })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    extract_reply(messages)
}

fn extract_reply(messages: Vec<OutputMessage>) -> Result<String> {
    messages
        .into_iter()
        .next()
        .and_then(|message| message.content.into_iter().next())
        .map(|part| part.text)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::Parse("completion response had no text content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_is_first_text_block() {
        let messages: Vec<OutputMessage> = serde_json::from_str(
            r#"[{"content":[{"text":"The light is on."},{"text":"ignored"}]}]"#,
        )
        .unwrap();
        assert_eq!(extract_reply(messages).unwrap(), "The light is on.");
    }

    #[test]
    fn empty_output_is_parse_error() {
        let messages: Vec<OutputMessage> = serde_json::from_str("[]").unwrap();
        assert!(matches!(extract_reply(messages), Err(Error::Parse(_))));
    }

    #[test]
    fn message_without_content_is_parse_error() {
        let messages: Vec<OutputMessage> = serde_json::from_str(r#"[{"content":[]}]"#).unwrap();
        assert!(matches!(extract_reply(messages), Err(Error::Parse(_))));
    }

    #[test]
    fn request_serializes_model_and_input() {
        let body = serde_json::to_value(CompletionRequest {
            model: "gpt-4.1",
            input: "what time is it",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model":"gpt-4.1","input":"what time is it"}));
    }
}
