use std::collections::VecDeque;

use futures_util::Stream;
use memchr::memchr_iter;

use crate::error::ProxyError;

/// Prefix carried by backend event lines.
pub const EVENT_PREFIX: &str = "data: ";

/// Terminal sentinel line: consumed, never forwarded.
pub const DONE_LINE: &str = "data: [DONE]";

/// Incremental newline splitter.
///
/// Feed it text chunks arriving in arbitrary byte boundaries and it yields
/// complete lines with trailing whitespace trimmed. Once the terminal
/// sentinel line is seen the splitter is finished: the sentinel itself and
/// everything after it are dropped.
pub struct LineSplitter {
    buffer: String,
    read_offset: usize,
    finished: bool,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            read_offset: 0,
            finished: false,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw text and return any complete lines.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete lines into a caller-provided buffer.
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<String>) {
        if self.finished {
            return;
        }

        self.buffer.push_str(chunk);
        let mut processed_up_to = self.read_offset;
        let bytes = self.buffer.as_bytes();
        let scan_start = processed_up_to;
        for rel_pos in memchr_iter(b'\n', &bytes[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = self.buffer[processed_up_to..line_end].trim_end();
            processed_up_to = line_end + 1;
            if line == DONE_LINE {
                self.finished = true;
                break;
            }
            out.push(line.to_owned());
        }

        if self.finished {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
            return;
        }
        let should_compact = self.read_offset > 0
            && (self.read_offset >= self.buffer.len() / 2 || self.read_offset >= 8 * 1024);
        if should_compact {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep only lines carrying the event prefix, stripped down to the payload.
/// Blank lines and heartbeats return `None` and are silently dropped.
#[must_use]
pub fn decode_event_line(line: &str) -> Option<&str> {
    line.strip_prefix(EVENT_PREFIX)
}

/// Turn a backend response byte stream into a stream of event payload
/// strings.
///
/// Bytes are decoded as UTF-8 with a remainder buffer for multi-byte
/// sequences split across chunks (invalid bytes are skipped), fed through
/// [`LineSplitter`], and filtered through [`decode_event_line`]. The stream
/// ends when the upstream closes or the sentinel is reached. A transport
/// error mid-stream is yielded as one `Err` item and then the stream ends;
/// the caller decides whether that fails the request or merely terminates
/// an in-flight response.
pub fn event_payload_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<String, ProxyError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Debug + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            LineSplitter::new(),
            Vec::<u8>::new(),
            Vec::<String>::new(),
            VecDeque::<String>::new(),
            false,
        ),
        |(mut stream, mut splitter, mut remainder, mut lines, mut pending, mut failed)| async move {
            loop {
                if let Some(payload) = pending.pop_front() {
                    return Some((
                        Ok(payload),
                        (stream, splitter, remainder, lines, pending, failed),
                    ));
                }
                if failed || splitter.is_finished() {
                    return None;
                }

                let bytes = match stream.as_mut().next().await {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(err)) => {
                        failed = true;
                        return Some((
                            Err(ProxyError::Transport(format!(
                                "backend stream failed mid-read: {err:?}"
                            ))),
                            (stream, splitter, remainder, lines, pending, failed),
                        ));
                    }
                    None => return None,
                };

                remainder.extend_from_slice(&bytes);
                loop {
                    match std::str::from_utf8(&remainder) {
                        Ok(text) => {
                            splitter.feed_into(text, &mut lines);
                            remainder.clear();
                            break;
                        }
                        Err(e) => {
                            let valid_up_to = e.valid_up_to();
                            // Safety: valid_up_to is guaranteed to be a valid UTF-8 boundary.
                            let text =
                                unsafe { std::str::from_utf8_unchecked(&remainder[..valid_up_to]) };
                            splitter.feed_into(text, &mut lines);
                            match e.error_len() {
                                // Invalid sequence: skip it so later bytes still decode.
                                Some(invalid_len) => {
                                    remainder.drain(..valid_up_to + invalid_len);
                                }
                                // Incomplete tail: keep it for the next chunk.
                                None => {
                                    remainder.drain(..valid_up_to);
                                    break;
                                }
                            }
                        }
                    }
                }

                for line in lines.drain(..) {
                    if let Some(payload) = decode_event_line(&line) {
                        pending.push_back(payload.to_owned());
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::StreamExt;

    fn split_all(chunks: &[&str]) -> Vec<String> {
        let mut splitter = LineSplitter::new();
        let mut out = Vec::new();
        for chunk in chunks {
            splitter.feed_into(chunk, &mut out);
        }
        out
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let total = "data: {\"a\":1}\nheartbeat\ndata: {\"b\":2}\n";
        let whole = split_all(&[total]);
        // Every split point of the same bytes yields the same line sequence.
        for split_at in 0..total.len() {
            let (left, right) = total.split_at(split_at);
            assert_eq!(split_all(&[left, right]), whole, "split at {split_at}");
        }
        assert_eq!(whole, vec!["data: {\"a\":1}", "heartbeat", "data: {\"b\":2}"]);
    }

    #[test]
    fn test_partial_tail_buffered_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed("data: hel").is_empty());
        let lines = splitter.feed("lo\n");
        assert_eq!(lines, vec!["data: hello"]);
    }

    #[test]
    fn test_sentinel_never_emitted_and_stops_output() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed("data: one\ndata: [DONE]\ndata: after\n");
        assert_eq!(lines, vec!["data: one"]);
        assert!(splitter.is_finished());
        assert!(splitter.feed("data: more\n").is_empty());
    }

    #[test]
    fn test_sentinel_split_across_chunks() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.feed("data: one\ndata: [DO"), vec!["data: one"]);
        assert!(splitter.feed("NE]\ndata: two\n").is_empty());
        assert!(splitter.is_finished());
    }

    #[test]
    fn test_trailing_whitespace_trimmed() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed("data: hi  \r\n");
        assert_eq!(lines, vec!["data: hi"]);
    }

    #[test]
    fn test_sentinel_with_crlf() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed("data: [DONE]\r\n").is_empty());
        assert!(splitter.is_finished());
    }

    #[test]
    fn test_decode_event_line() {
        assert_eq!(decode_event_line("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(decode_event_line(""), None);
        assert_eq!(decode_event_line(": heartbeat"), None);
        assert_eq!(decode_event_line("event: ping"), None);
    }

    #[test]
    fn test_payload_count_bounded_by_line_count() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed("data: a\n\n: comment\ndata: b\nnoise\n");
        let payloads: Vec<&str> = lines.iter().filter_map(|l| decode_event_line(l)).collect();
        assert!(payloads.len() <= lines.len());
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_event_payload_stream_basic() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, std::convert::Infallible>(Bytes::from_static(b"data: one\nda")),
            Ok(Bytes::from_static(b"ta: two\ndata: [DONE]\ndata: three\n")),
        ]);
        let payloads: Vec<String> = event_payload_stream(source)
            .map(|item| item.expect("payload"))
            .collect()
            .await;
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_event_payload_stream_utf8_split_mid_codepoint() {
        // "é" is 0xC3 0xA9; split between the two bytes.
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, std::convert::Infallible>(Bytes::from_static(b"data: caf\xc3")),
            Ok(Bytes::from_static(b"\xa9\n")),
        ]);
        let payloads: Vec<String> = event_payload_stream(source)
            .map(|item| item.expect("payload"))
            .collect()
            .await;
        assert_eq!(payloads, vec!["café"]);
    }

    #[tokio::test]
    async fn test_event_payload_stream_invalid_byte_skipped() {
        // 0xFF can never start a UTF-8 sequence; later lines must still decode.
        let source = futures_util::stream::iter(vec![Ok::<Bytes, std::convert::Infallible>(
            Bytes::from_static(b"data: a\n\xffdata: b\n"),
        )]);
        let payloads: Vec<String> = event_payload_stream(source)
            .map(|item| item.expect("payload"))
            .collect()
            .await;
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_event_payload_stream_invalid_byte_across_chunks() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, std::convert::Infallible>(Bytes::from_static(b"data: a\n\xff")),
            Ok(Bytes::from_static(b"data: b\n")),
        ]);
        let payloads: Vec<String> = event_payload_stream(source)
            .map(|item| item.expect("payload"))
            .collect()
            .await;
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_event_payload_stream_transport_error_yielded_then_ends() {
        let source = futures_util::stream::iter(vec![
            Ok::<Bytes, &str>(Bytes::from_static(b"data: one\n")),
            Err("connection reset"),
            Ok(Bytes::from_static(b"data: two\n")),
        ]);
        let items: Vec<Result<String, ProxyError>> =
            event_payload_stream(source).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().expect("payload"), "one");
        assert!(matches!(items[1], Err(ProxyError::Transport(_))));
    }

    #[tokio::test]
    async fn test_event_payload_stream_upstream_close_without_sentinel() {
        let source = futures_util::stream::iter(vec![Ok::<Bytes, std::convert::Infallible>(
            Bytes::from_static(b"data: only\n"),
        )]);
        let payloads: Vec<String> = event_payload_stream(source)
            .map(|item| item.expect("payload"))
            .collect()
            .await;
        assert_eq!(payloads, vec!["only"]);
    }
}
