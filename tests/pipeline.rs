//! Pipeline parsing tests: chunked recognition streams through the public
//! parser and collector exactly as the HTTP client would drive them.

use murmur_device::pipeline::{StreamingJsonParser, TranscriptCollector};

/// Drive the parser with arbitrary chunk boundaries and collect transcripts
fn run_stream(chunks: &[&[u8]]) -> (Option<murmur_device::pipeline::TranscriptResult>, usize) {
    let mut parser = StreamingJsonParser::new();
    let mut collector = TranscriptCollector::new();
    for chunk in chunks {
        for value in parser.feed_bytes(chunk) {
            collector.absorb(&value);
        }
    }
    (collector.finish(), parser.pending_len())
}

#[test]
fn back_to_back_objects_in_one_chunk_both_parse() {
    let mut parser = StreamingJsonParser::new();
    let values = parser.feed_bytes(br#"{"type":"PARTIAL_TRANSCRIPTION","text":"hi"}{"type":"PARTIAL_TRANSCRIPTION","text":"hi there"}"#);

    assert_eq!(values.len(), 2);
    assert_eq!(values[0]["text"], "hi");
    assert_eq!(values[1]["text"], "hi there");
    assert!(parser.is_empty());
}

#[test]
fn complete_object_parses_while_truncated_tail_waits() {
    let mut parser = StreamingJsonParser::new();
    let values = parser.feed_bytes(br#"{"type":"PARTIAL_TRANSCRIPTION","text":"hi"}{"type":"FINAL_"#);

    assert_eq!(values.len(), 1);
    assert!(parser.pending_len() > 0);

    // The tail completes on the next chunk
    let values = parser.feed_bytes(br#"UNDERSTANDING","is_final":true,"text":"hi"}"#);
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["type"], "FINAL_UNDERSTANDING");
    assert!(parser.is_empty());
}

#[test]
fn partials_then_final_understanding_yield_the_final_transcript() {
    let (result, pending) = run_stream(&[
        br#"{"type":"PARTIAL_TRANSCRIPTION","text":"turn"}"#,
        br#"{"type":"PARTIAL_TRANSCRIPTION","text":"turn on the"}"#,
        br#"{"type":"FINAL_UNDERSTANDING","is_final":true,"#,
        br#""text":"turn on the light","intents":[{"name":"lights_on"},{"name":"other"}]}"#,
    ]);

    let result = result.expect("no transcript");
    assert_eq!(result.text, "turn on the light");
    assert_eq!(result.intent.as_deref(), Some("lights_on"));
    assert_eq!(pending, 0);
}

#[test]
fn stream_with_only_partials_yields_no_transcript() {
    let (result, _) = run_stream(&[
        br#"{"type":"PARTIAL_TRANSCRIPTION","text":"mumble"}"#,
        br#"{"type":"FINAL_UNDERSTANDING","is_final":false,"text":"mumble"}"#,
    ]);
    assert!(result.is_none());
}

#[test]
fn chunk_boundary_inside_a_string_value() {
    let (result, pending) = run_stream(&[
        br#"{"type":"FINAL_UNDERSTANDING","is_final":true,"text":"what is"#,
        br#" the weather like"}"#,
    ]);

    assert_eq!(result.expect("no transcript").text, "what is the weather like");
    assert_eq!(pending, 0);
}

#[test]
fn empty_final_transcript_is_still_a_transcript() {
    // The pipeline treats empty text as a failed understanding; the parser
    // and collector just report what the service said
    let (result, _) = run_stream(&[br#"{"type":"FINAL_UNDERSTANDING","is_final":true,"text":""}"#]);
    assert_eq!(result.expect("no transcript").text, "");
}
