//! Reply framing.
//!
//! The backend streams a plain text body whose first chunk may carry the
//! server-assigned ids as `__IDS__::<user id>::<model id>`. [`ReplyDecoder`]
//! turns that legacy encoding into [`ReplyFrame`]s so the session never deals
//! with control text mixed into reply text.

use futures::{Stream, StreamExt};

use crate::backend::FrameStream;
use crate::error::{BackendError, ProtocolError, SessionError};
use crate::message::MessageId;

/// Prefix of the identity chunk on the wire
pub const IDS_SENTINEL: &str = "__IDS__::";

const IDS_SEPARATOR: &str = "::";

/// One structured unit of a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyFrame {
    /// Server-assigned ids for the pending user message and the in-flight model message
    Identity { user: MessageId, model: MessageId },
    /// Reply text, appended verbatim
    Text(String),
}

impl ReplyFrame {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn identity(user: impl Into<MessageId>, model: impl Into<MessageId>) -> Self {
        Self::Identity {
            user: user.into(),
            model: model.into(),
        }
    }
}

/// Incremental UTF-8 decoder that carries incomplete sequences across chunks.
///
/// Invalid bytes decode to U+FFFD. An incomplete sequence still pending when
/// the stream ends is flushed as a single U+FFFD by [`Utf8Decoder::finish`].
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // incomplete sequence at the end of the chunk
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Converts the legacy chunked body into frames.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    utf8: Utf8Decoder,
    seen_text: bool,
}

impl ReplyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk. Chunks that decode to nothing (e.g. half of a
    /// multi-byte character) yield no frame and do not count as the first chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<ReplyFrame>, ProtocolError> {
        let text = self.utf8.decode(chunk);
        if text.is_empty() {
            return Ok(None);
        }

        let first = !self.seen_text;
        self.seen_text = true;

        if first {
            if let Some(rest) = text.strip_prefix(IDS_SENTINEL) {
                return parse_identity(rest).map(Some);
            }
        }
        Ok(Some(ReplyFrame::Text(text)))
    }

    /// Flush whatever the UTF-8 decoder still holds
    pub fn finish(&mut self) -> Option<ReplyFrame> {
        let tail = self.utf8.finish();
        if tail.is_empty() {
            None
        } else {
            self.seen_text = true;
            Some(ReplyFrame::Text(tail))
        }
    }
}

fn parse_identity(rest: &str) -> Result<ReplyFrame, ProtocolError> {
    let tokens: Vec<&str> = rest.split(IDS_SEPARATOR).map(str::trim).collect();
    match tokens.as_slice() {
        [user, model] if !user.is_empty() && !model.is_empty() => {
            Ok(ReplyFrame::identity(*user, *model))
        }
        _ => Err(ProtocolError::MalformedIdentity(rest.to_string())),
    }
}

/// Adapt a stream of raw body chunks into a [`FrameStream`].
///
/// The stream ends after the first error.
pub fn decode_frames<S, B>(chunks: S) -> FrameStream
where
    S: Stream<Item = Result<B, BackendError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut chunks = Box::pin(chunks);
        let mut decoder = ReplyDecoder::new();
        let mut failed = false;

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => match decoder.feed(bytes.as_ref()) {
                    Ok(Some(frame)) => yield Ok(frame),
                    Ok(None) => {}
                    Err(e) => {
                        failed = true;
                        yield Err(SessionError::Protocol(e));
                        break;
                    }
                },
                Err(e) => {
                    failed = true;
                    yield Err(SessionError::Backend(e));
                    break;
                }
            }
        }

        if !failed {
            if let Some(frame) = decoder.finish() {
                yield Ok(frame);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_split_sequence() {
        let bytes = "café".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 1);

        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(head), "caf");
        assert_eq!(decoder.decode(tail), "é");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_utf8_four_byte_sequence_over_three_chunks() {
        let bytes = "🦀".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..3]), "");
        assert_eq!(decoder.decode(&bytes[3..]), "🦀");
    }

    #[test]
    fn test_utf8_invalid_and_dangling() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.decode(b"\xe2\x82"), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_sentinel_first_chunk() {
        let mut decoder = ReplyDecoder::new();
        assert_eq!(
            decoder.feed(b"__IDS__::u1::m1").unwrap(),
            Some(ReplyFrame::identity("u1", "m1"))
        );
        assert_eq!(
            decoder.feed(b"Hello").unwrap(),
            Some(ReplyFrame::text("Hello"))
        );
    }

    #[test]
    fn test_sentinel_tokens_are_trimmed() {
        let mut decoder = ReplyDecoder::new();
        assert_eq!(
            decoder.feed(b"__IDS__:: u1 ::m1\n").unwrap(),
            Some(ReplyFrame::identity("u1", "m1"))
        );
    }

    #[test]
    fn test_sentinel_only_on_first_chunk() {
        let mut decoder = ReplyDecoder::new();
        decoder.feed(b"Bonjour").unwrap();
        assert_eq!(
            decoder.feed(b"__IDS__::u1::m1").unwrap(),
            Some(ReplyFrame::text("__IDS__::u1::m1"))
        );
    }

    #[test]
    fn test_malformed_sentinel() {
        for wire in ["__IDS__::u1", "__IDS__::u1::", "__IDS__::u1::m1::x", "__IDS__::"] {
            let mut decoder = ReplyDecoder::new();
            assert!(
                matches!(
                    decoder.feed(wire.as_bytes()),
                    Err(ProtocolError::MalformedIdentity(_))
                ),
                "{wire} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_chunk_does_not_consume_first_slot() {
        let mut decoder = ReplyDecoder::new();
        assert_eq!(decoder.feed(b"").unwrap(), None);
        assert_eq!(
            decoder.feed(b"__IDS__::u1::m1").unwrap(),
            Some(ReplyFrame::identity("u1", "m1"))
        );
    }

    #[tokio::test]
    async fn test_decode_frames_stream() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> = vec![
            Ok(b"__IDS__::u1::m1".to_vec()),
            Ok(b"Hello".to_vec()),
            Ok(b" world".to_vec()),
        ];
        let frames: Vec<_> = decode_frames(futures::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(
            frames,
            vec![
                ReplyFrame::identity("u1", "m1"),
                ReplyFrame::text("Hello"),
                ReplyFrame::text(" world"),
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_frames_stops_on_error() {
        let chunks: Vec<Result<Vec<u8>, BackendError>> = vec![
            Ok(b"partial".to_vec()),
            Err(BackendError::Transport("connection reset".into())),
            Ok(b"never".to_vec()),
        ];
        let frames: Vec<_> = decode_frames(futures::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await;

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(matches!(frames[1], Err(SessionError::Backend(_))));
    }
}
