//! SSE stream parsing for OpenAI-compatible streaming responses.
//!
//! Network chunks do not align with SSE lines, so bytes are buffered until a
//! full line is available. A `data: [DONE]` line ends the stream.

use futures::{future, stream, Stream, StreamExt};

use civic_core::{Error, Result, TokenStream};

use super::types::ChatCompletionChunk;

/// Outcome of parsing one SSE line.
#[derive(Debug, PartialEq)]
enum SseLine {
    Content(String),
    Done,
    Skip,
    Invalid(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();

    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        // event:, id:, retry: fields carry nothing we use
        return SseLine::Skip;
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            if content.is_empty() {
                SseLine::Skip
            } else {
                SseLine::Content(content)
            }
        }
        Err(e) => SseLine::Invalid(format!("Failed to parse SSE chunk: {}", e)),
    }
}

#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
    finished: bool,
}

impl LineBuffer {
    /// Append bytes and parse every complete line.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            match parse_sse_line(&text) {
                SseLine::Content(c) => out.push(Ok(c)),
                SseLine::Done => {
                    self.finished = true;
                    self.pending.clear();
                    break;
                }
                SseLine::Skip => {}
                SseLine::Invalid(msg) => out.push(Err(Error::Inference(msg))),
            }
        }
        out
    }
}

/// Parse an SSE byte stream into content fragments.
pub fn parse_sse_stream<E>(
    bytes: impl Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
) -> TokenStream
where
    E: std::fmt::Display + Send + 'static,
{
    let fragments = bytes
        .scan(LineBuffer::default(), |buffer, chunk| {
            if buffer.finished {
                return future::ready(None);
            }
            let items = match chunk {
                Ok(bytes) => buffer.feed(&bytes),
                Err(e) => vec![Err(Error::Inference(format!("Stream error: {}", e)))],
            };
            future::ready(Some(stream::iter(items)))
        })
        .flatten();

    Box::pin(fragments)
}
