//! Incremental parser for concatenated JSON response bodies
//!
//! The recognition service streams back a sequence of bare JSON objects with
//! no framing between them, and HTTP chunk boundaries land anywhere,
//! including mid-object. The parser buffers bytes across feeds, slices out
//! each balanced top-level object, and leaves a trailing partial object
//! pending until the rest arrives.

use serde_json::Value;

/// Accumulates response bytes and yields complete top-level JSON objects
#[derive(Debug, Default)]
pub struct StreamingJsonParser {
    buf: Vec<u8>,
}

impl StreamingJsonParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a chunk and return every object completed by it
    ///
    /// Objects that fail to parse after balancing are logged and skipped;
    /// one malformed object never poisons the rest of the stream.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buf.extend_from_slice(chunk);

        let mut values = Vec::new();
        while let Some((start, end)) = next_balanced_object(&self.buf) {
            let object = &self.buf[start..end];
            match serde_json::from_slice(object) {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed object in stream");
                }
            }
            self.buf.drain(..end);
        }
        values
    }

    /// Bytes held back waiting for the rest of a partial object
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the parser holds no partial data
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Locate the first balanced `{...}` span, brace counting with string and
/// escape awareness so braces inside string values don't miscount.
fn next_balanced_object(buf: &[u8]) -> Option<(usize, usize)> {
    let start = buf.iter().position(|&b| b == b'{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in buf.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_objects_in_one_chunk() {
        let mut parser = StreamingJsonParser::new();
        let values = parser.feed_bytes(br#"{"a":1}{"b":2}"#);

        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["a"], 1);
        assert_eq!(values[1]["b"], 2);
        assert!(parser.is_empty());
    }

    #[test]
    fn object_split_across_chunks() {
        let mut parser = StreamingJsonParser::new();
        assert!(parser.feed_bytes(br#"{"text":"turn on"#).is_empty());
        assert!(parser.pending_len() > 0);

        let values = parser.feed_bytes(br#" the light"}"#);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["text"], "turn on the light");
        assert!(parser.is_empty());
    }

    #[test]
    fn complete_then_truncated_yields_one() {
        let mut parser = StreamingJsonParser::new();
        let values = parser.feed_bytes(br#"{"done":true}{"partial":"#);

        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["done"], true);
        assert!(!parser.is_empty());
    }

    #[test]
    fn braces_inside_strings_do_not_split() {
        let mut parser = StreamingJsonParser::new();
        let values = parser.feed_bytes(br#"{"text":"a } b { c"}"#);

        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["text"], "a } b { c");
    }

    #[test]
    fn escaped_quote_inside_string() {
        let mut parser = StreamingJsonParser::new();
        let values = parser.feed_bytes(br#"{"text":"she said \"}\" loudly"}"#);

        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["text"], r#"she said "}" loudly"#);
    }

    #[test]
    fn malformed_object_is_skipped() {
        let mut parser = StreamingJsonParser::new();
        let values = parser.feed_bytes(br#"{"bad" 1}{"good":1}"#);

        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["good"], 1);
        assert!(parser.is_empty());
    }

    #[test]
    fn whitespace_between_objects() {
        let mut parser = StreamingJsonParser::new();
        let values = parser.feed_bytes(b"{\"a\":1}\r\n{\"b\":2}\n");

        assert_eq!(values.len(), 2);
    }
}
