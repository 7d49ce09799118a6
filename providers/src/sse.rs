//! Incremental decoding of `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder`] buffers them and yields the
//! `data:` payload of each complete event. Events are separated by a blank line
//! (`\n\n` or `\r\n\r\n`). Comment-only and `event:`-only frames carry no payload
//! and are skipped.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum SseError {
    #[error("SSE buffer exceeded {limit} bytes")]
    Overflow { limit: usize },
    #[error("invalid UTF-8 in SSE stream")]
    InvalidUtf8,
}

#[derive(Debug)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
    limit: usize,
}

impl SseDecoder {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Append a network chunk. Fails once the unconsumed backlog exceeds the limit.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<(), SseError> {
        self.pending.extend_from_slice(chunk);
        if self.pending.len() > self.limit {
            return Err(SseError::Overflow { limit: self.limit });
        }
        Ok(())
    }

    /// Next complete event's payload, or `None` until more bytes arrive.
    pub(crate) fn next_payload(&mut self) -> Option<Result<String, SseError>> {
        loop {
            let (end, separator) = event_end(&self.pending)?;
            let frame: Vec<u8> = self.pending.drain(..end + separator).take(end).collect();

            let Ok(frame) = std::str::from_utf8(&frame) else {
                return Some(Err(SseError::InvalidUtf8));
            };
            if let Some(payload) = data_payload(frame) {
                return Some(Ok(payload));
            }
        }
    }
}

/// Offset and separator length of the first event boundary.
fn event_end(bytes: &[u8]) -> Option<(usize, usize)> {
    bytes.iter().enumerate().find_map(|(i, _)| {
        let rest = &bytes[i..];
        if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

/// Join the `data:` lines of one frame with `\n`.
fn data_payload(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
