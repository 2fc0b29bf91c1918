//! JSON-RPC framing codec.
//!
//! The build server protocol uses `Content-Length: N\r\n\r\n{json}` framing over
//! stdin/stdout. [`FrameDecoder`] accumulates bytes as they arrive and yields complete
//! bodies; [`encode_frame`] produces a single buffer holding header and body.

use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

/// Maximum frame size (4 MiB) to prevent unbounded memory allocation.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Characters of an offending message echoed into logs.
const PREVIEW_LIMIT: usize = 2048;

#[derive(Debug, Error)]
pub enum InvalidMessageReason {
    #[error("failed to decode message headers")]
    DecodeHeader,
    #[error("failed to read Content-Length header")]
    ContentLength,
    #[error("Content-Length {0} exceeds maximum {max}", max = MAX_FRAME_BYTES)]
    FrameTooLarge(usize),
    #[error("failed to decode message body: {0}")]
    DecodeBody(#[source] serde_json::Error),
}

/// A frame or body that could not be turned into a message.
///
/// Carries the offending bytes; `Display` only echoes a bounded preview of them.
#[derive(Debug, Error)]
#[error("Invalid message (reason={reason}): {}", Preview(.data))]
pub struct InvalidMessageError {
    pub reason: InvalidMessageReason,
    pub data: Vec<u8>,
}

impl InvalidMessageError {
    #[must_use]
    pub fn new(reason: InvalidMessageReason, data: Vec<u8>) -> Self {
        Self { reason, data }
    }
}

struct Preview<'a>(&'a [u8]);

impl fmt::Display for Preview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(self.0);
        let total = text.chars().count();
        if total <= PREVIEW_LIMIT {
            return f.write_str(&text);
        }
        let head: String = text.chars().take(PREVIEW_LIMIT).collect();
        write!(f, "{head}...(truncated {} chars)", total - PREVIEW_LIMIT)
    }
}

/// Incremental decoder for Content-Length framed messages.
///
/// Bytes are appended with [`extend`](Self::extend) as they are read; complete bodies are
/// taken with [`next_frame`](Self::next_frame). Several frames may be buffered at once and
/// a frame may span any number of reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Body bytes of a rejected oversized frame still to be skipped.
    discard: usize,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes received but not yet consumed by a complete frame.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Extract the next complete body.
    ///
    /// Returns `Ok(None)` when more bytes are needed. On `Err` the malformed header has
    /// already been consumed, so the caller may keep calling to reach later frames.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, InvalidMessageError> {
        if self.discard > 0 {
            let skipped = self.discard.min(self.buffer.len());
            self.buffer.drain(..skipped);
            self.discard -= skipped;
            if self.discard > 0 {
                return Ok(None);
            }
        }

        let Some(separator) = find_separator(&self.buffer) else {
            return Ok(None);
        };
        let body_start = separator + HEADER_SEPARATOR.len();

        let content_length = match parse_content_length(&self.buffer[..separator]) {
            Ok(len) => len,
            Err(reason) => {
                let header: Vec<u8> = self.buffer.drain(..body_start).collect();
                return Err(InvalidMessageError::new(reason, header));
            }
        };

        if content_length > MAX_FRAME_BYTES {
            let header: Vec<u8> = self.buffer.drain(..body_start).collect();
            self.discard = content_length;
            return Err(InvalidMessageError::new(
                InvalidMessageReason::FrameTooLarge(content_length),
                header,
            ));
        }

        let frame_end = body_start + content_length;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let body = self.buffer[body_start..frame_end].to_vec();
        self.buffer.drain(..frame_end);
        Ok(Some(body))
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_SEPARATOR.len())
        .position(|window| window == HEADER_SEPARATOR)
}

fn parse_content_length(header: &[u8]) -> Result<usize, InvalidMessageReason> {
    let text = std::str::from_utf8(header).map_err(|_| InvalidMessageReason::DecodeHeader)?;
    for line in text.split("\r\n") {
        // Header names are case-insensitive; other headers (e.g. Content-Type) are ignored.
        if let Some((key, value)) = line.split_once(':')
            && key.trim().eq_ignore_ascii_case("Content-Length")
        {
            return value
                .trim()
                .parse()
                .map_err(|_| InvalidMessageReason::ContentLength);
        }
    }
    Err(InvalidMessageReason::ContentLength)
}

/// Serialize `message` and prepend its `Content-Length` header.
pub fn encode_frame<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(message).context("serializing JSON-RPC frame")?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}
