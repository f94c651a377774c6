use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::stream::Stream;

use touchline_core::error::{Result, TouchlineError};

/// Incremental parser for a `text/event-stream` body.
///
/// Events are separated by a blank line; `data:` lines of one event are
/// joined with `\n`. Bytes may arrive split anywhere, including inside a
/// multi-byte character.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    undecoded: Vec<u8>,
}

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every event completed by them.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.undecoded.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.undecoded) {
            Ok(s) => s.len(),
            Err(e) => e.valid_up_to(),
        };
        let rest = self.undecoded.split_off(valid);
        let decoded = std::mem::replace(&mut self.undecoded, rest);
        let text = String::from_utf8_lossy(&decoded).into_owned();
        self.feed(&text)
    }

    /// Feed text and return every event completed by it.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        if chunk.contains('\r') {
            self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(chunk);
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();

            let mut event_type = None;
            let mut data_lines = Vec::new();
            for line in block.lines() {
                if let Some(val) = line.strip_prefix("event:") {
                    event_type = Some(val.trim_start().to_string());
                } else if let Some(val) = line.strip_prefix("data:") {
                    data_lines.push(val.strip_prefix(' ').unwrap_or(val));
                }
            }

            if !data_lines.is_empty() {
                events.push(SseEvent {
                    event_type,
                    data: data_lines.join("\n"),
                });
            }
        }
        events
    }
}

/// Adapts a response byte stream into a stream of SSE events.
///
/// Transport errors are forwarded as [`TouchlineError::LlmStream`].
pub struct SseStream<S> {
    inner: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
}

impl<S> SseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
        }
    }
}

impl<S> Stream for SseStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(bytes)) => this.pending.extend(this.parser.feed_bytes(&bytes)),
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(TouchlineError::LlmStream(e.to_string()))))
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
