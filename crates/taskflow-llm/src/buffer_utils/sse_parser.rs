use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use super::buffering::CircularLineBuffer;
use crate::error::{LlmError, Result};
use crate::StreamEvent;

/// Strategy for turning SSE `data:` payloads into stream events
pub trait SseLineParser: Send {
    /// Parse a data payload into stream events
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>>;

    /// Check if this payload signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

/// Generic SSE parser over any byte stream.
///
/// Only transport errors are fatal. Lines that are not `data:` lines, are not
/// valid UTF-8, or fail to parse are skipped.
pub fn parse_sse_stream<S, E, P>(
    byte_stream: S,
    parser: P,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    P: SseLineParser + 'static,
{
    Box::pin(async_stream::stream! {
        // Trailing newline flushes a final line sent without one
        let tail = futures::stream::once(async { Ok::<Bytes, E>(Bytes::from_static(b"\n")) });
        let mut byte_chunks = Box::pin(byte_stream.chain(tail));
        let mut buffer = CircularLineBuffer::with_capacity(4096);
        let mut finished = false;

        'read: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(&bytes);

                    while let Some(line_result) = buffer.next_line() {
                        let line = match line_result {
                            Ok(line) => line,
                            Err(e) => {
                                tracing::debug!("Skipping SSE line: {}", e);
                                continue;
                            }
                        };

                        if line.is_empty() {
                            continue;
                        }

                        let Some(data) = line
                            .strip_prefix("data: ")
                            .or_else(|| line.strip_prefix("data:"))
                        else {
                            continue;
                        };

                        if parser.is_done_marker(data) {
                            finished = true;
                            yield Ok(StreamEvent::Done { finish_reason: None });
                            break 'read;
                        }

                        match parser.parse_data_line(data) {
                            Ok(events) => {
                                for event in events {
                                    yield Ok(event);
                                }
                            }
                            Err(e) => tracing::debug!("Ignoring malformed SSE payload: {}", e),
                        }
                    }
                }
                Err(e) => {
                    finished = true;
                    yield Err(LlmError::Stream(e.to_string()));
                    break 'read;
                }
            }
        }

        // Upstream closed without the terminator
        if !finished {
            yield Ok(StreamEvent::Done { finish_reason: None });
        }
    })
}
