use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::Stream;

use super::StreamEvent;

/// Marker that prefixes every payload line inside a frame.
pub const DATA_PREFIX: &str = "data: ";

const FRAME_SEPARATOR: &str = "\n\n";

/// Decodes every complete frame in `previous + chunk`.
///
/// Returns the decoded events in arrival order together with the trailing,
/// not yet terminated segment. The caller passes that remainder back in with
/// the next chunk.
pub fn decode(previous: &str, chunk: &str) -> (Vec<StreamEvent>, String) {
    let mut buffer = String::with_capacity(previous.len() + chunk.len());
    buffer.push_str(previous);
    buffer.push_str(chunk);
    let buffer = buffer.replace("\r\n", "\n");

    let mut frames: Vec<&str> = buffer.split(FRAME_SEPARATOR).collect();
    let remainder = frames.pop().unwrap_or_default().to_string();

    let events = frames.into_iter().flat_map(parse_frame).collect();
    (events, remainder)
}

/// Parses the payload lines of one frame, skipping malformed records.
fn parse_frame(frame: &str) -> Vec<StreamEvent> {
    frame
        .split('\n')
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .filter_map(|payload| {
            let payload = payload.trim();
            match StreamEvent::from_json(payload) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(%err, payload, "Skipping malformed frame payload");
                    None
                }
            }
        })
        .collect()
}

/// Stateful decoder fed with raw network chunks.
///
/// Holds the text remainder between calls, plus any trailing bytes of a
/// UTF-8 sequence that was cut by a chunk boundary.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    remainder: String,
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.take_text(chunk);
        let (events, remainder) = decode(&self.remainder, &text);
        self.remainder = remainder;
        events
    }

    /// Text received but not yet terminated by a blank line.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// Flushes the decoder at end of stream.
    ///
    /// A final frame the backend did not terminate with a blank line is
    /// decoded here instead of being dropped.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut tail = std::mem::take(&mut self.remainder);
        if !self.pending.is_empty() {
            tail.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        tail.replace("\r\n", "\n")
            .split(FRAME_SEPARATOR)
            .flat_map(parse_frame)
            .collect()
    }

    fn take_text(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }
}

/// Adapts a byte stream into a stream of decoded events.
///
/// Transport errors are passed through and end the stream.
pub struct FrameStream<S> {
    inner: S,
    decoder: FrameDecoder,
    queued: VecDeque<StreamEvent>,
    finished: bool,
}

impl<S> FrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            queued: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, B, E> Stream for FrameStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<StreamEvent, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.queued.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.finished {
                return Poll::Ready(None);
            }
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => this.queued.extend(this.decoder.push(chunk.as_ref())),
                Some(Err(err)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.finished = true;
                    this.queued.extend(this.decoder.finish());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::protocol::{PatchOp, RenderItem};

    const TURN_STREAM: &str = concat!(
        "data: {\"type\":\"placeholder\",\"data\":{\"id\":\"placeholder-1\",\"kind\":\"message\",\"role\":\"assistant\",\"text\":\"Thinking…\"}}\n\n",
        "data: {\"type\":\"render\",\"data\":{\"id\":\"msg-1\",\"kind\":\"message\",\"role\":\"assistant\",\"text\":\"שלום\",\"replace_id\":\"placeholder-1\"}}\n\n",
        "data: {\"type\":\"patch\",\"data\":{\"id\":\"msg-1\",\"op\":\"append_text\",\"text\":\" world\"}}\n\n",
        "data: {\"type\":\"done\",\"data\":{}}\n\n",
    );

    fn decode_in_chunks(stream: &[u8], split_at: &[usize]) -> Vec<StreamEvent> {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        let mut start = 0;
        for &end in split_at.iter().chain(std::iter::once(&stream.len())) {
            events.extend(decoder.push(&stream[start..end]));
            start = end;
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn test_decode_returns_remainder() {
        let (events, remainder) = decode("", "data: {\"type\":\"done\"}\n\ndata: {\"ty");
        assert_eq!(events, vec![StreamEvent::Done]);
        assert_eq!(remainder, "data: {\"ty");

        let (events, remainder) = decode(&remainder, "pe\":\"done\"}\n\n");
        assert_eq!(events, vec![StreamEvent::Done]);
        assert_eq!(remainder, "");
    }

    #[test]
    fn test_decode_multiple_frames_in_one_chunk() {
        let (events, remainder) = decode("", TURN_STREAM);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], StreamEvent::Placeholder(_)));
        assert_eq!(events[2], StreamEvent::Patch(PatchOp::append("msg-1", " world")));
        assert_eq!(events[3], StreamEvent::Done);
        assert!(remainder.is_empty());
    }

    #[test]
    fn test_decode_ignores_non_data_lines() {
        let chunk = "event: ignored\nid: 7\n: comment\ndata: {\"type\":\"done\"}\nretry: 10\n\n";
        let (events, _) = decode("", chunk);
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_decode_normalizes_crlf() {
        let chunk = "data: {\"type\":\"render\",\"data\":{\"text\":\"hi\"}}\r\n\r\ndata: {\"type\":\"done\"}\r\n\r\n";
        let (events, remainder) = decode("", chunk);
        assert_eq!(
            events,
            vec![StreamEvent::Render(RenderItem::meta("hi")), StreamEvent::Done]
        );
        assert!(remainder.is_empty());
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let stream = b"data: {\"type\":\"done\"}\r\n\r\n";
        for split in 1..stream.len() {
            assert_eq!(
                decode_in_chunks(stream, &[split]),
                vec![StreamEvent::Done],
                "split at {split}"
            );
        }
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        let chunk = "data: {not json}\n\ndata: {\"type\":\"render\"}\n\ndata: {\"type\":\"done\"}\n\n";
        let (events, remainder) = decode("", chunk);
        assert_eq!(events, vec![StreamEvent::Done]);
        assert!(remainder.is_empty());
    }

    #[test]
    fn test_each_payload_line_is_its_own_record() {
        let chunk = "data: {\"type\":\"done\"}\ndata: {\"type\":\"render\",\"data\":{\"text\":\"x\"}}\n\n";
        let (events, _) = decode("", chunk);
        assert_eq!(
            events,
            vec![StreamEvent::Done, StreamEvent::Render(RenderItem::meta("x"))]
        );
    }

    #[test]
    fn test_frame_split_mid_marker_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert_eq!(decoder.remainder(), "da");
        assert!(decoder.push(b"ta: {\"type\":\"do").is_empty());
        assert_eq!(decoder.push(b"ne\"}\n\n"), vec![StreamEvent::Done]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_every_split_offset_matches_whole_stream() {
        let stream = TURN_STREAM.as_bytes();
        let whole = decode_in_chunks(stream, &[]);
        assert_eq!(whole.len(), 4);

        for split in 1..stream.len() {
            assert_eq!(
                decode_in_chunks(stream, &[split]),
                whole,
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let stream = TURN_STREAM.as_bytes();
        let splits: Vec<usize> = (1..stream.len()).collect();
        assert_eq!(
            decode_in_chunks(stream, &splits),
            decode_in_chunks(stream, &[])
        );
    }

    #[test]
    fn test_finish_decodes_unterminated_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"done\"}\n").is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Done]);
        assert_eq!(decoder.remainder(), "");
    }

    fn mock_byte_stream(
        data: &str,
        chunk_size: usize,
    ) -> impl Stream<Item = Result<bytes::Bytes, std::io::Error>> + Unpin {
        let chunks: Vec<_> = data
            .as_bytes()
            .chunks(chunk_size)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_frame_stream_yields_events_in_order() {
        let mut stream = FrameStream::new(mock_byte_stream(TURN_STREAM, 7));
        let mut types = Vec::new();
        while let Some(event) = stream.next().await {
            types.push(event.expect("valid event").type_name().to_string());
        }
        assert_eq!(types, ["placeholder", "render", "patch", "done"]);
    }

    #[tokio::test]
    async fn test_frame_stream_passes_through_transport_error() {
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"data: {\"type\":\"done\"}\n\n")),
            Err(std::io::Error::other("connection reset")),
            Ok(bytes::Bytes::from_static(b"data: {\"type\":\"done\"}\n\n")),
        ];
        let mut stream = FrameStream::new(futures_util::stream::iter(chunks));

        assert_eq!(stream.next().await.unwrap().unwrap(), StreamEvent::Done);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
