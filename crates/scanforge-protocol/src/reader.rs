//! Cursor over a tagged-field payload.
//!
//! Structured payloads are `(token, value)` sequences in arbitrary order.
//! `TokenReader` walks one payload, handing each recognized token to the
//! caller and skipping anything it does not recognize by scanning forward
//! byte-by-byte until the next recognized token lines up. Skipped spans are
//! logged and otherwise ignored, which is what keeps old drivers working
//! against newer firmware.

use bytes::Bytes;
use scanforge_core::{Quad, Result};
use tracing::debug;

use crate::format;
use crate::token::PAD;

/// Single-pass reader over one structured payload.
pub struct TokenReader<'a> {
    rest: &'a [u8],
    full_len: usize,
}

impl<'a> TokenReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        TokenReader {
            rest: data,
            full_len: data.len(),
        }
    }

    /// Byte offset of the cursor from the start of the payload.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.full_len - self.rest.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Advance to the next recognized token and consume it.
    ///
    /// Unrecognized bytes are skipped one at a time until a token the
    /// `recognized` predicate accepts lines up. Returns `None` at end of
    /// input or at a NUL token, the explicit terminator of NUL-padded
    /// areas.
    pub fn next_token(&mut self, recognized: impl Fn(Quad) -> bool) -> Option<Quad> {
        let mut skip_start: Option<usize> = None;
        loop {
            if self.rest.len() < 4 {
                self.note_skip(skip_start, self.offset() + self.rest.len());
                self.rest = &self.rest[self.rest.len()..];
                return None;
            }
            let quad = Quad::new([self.rest[0], self.rest[1], self.rest[2], self.rest[3]]);
            if quad == PAD {
                self.note_skip(skip_start, self.offset());
                return None;
            }
            if recognized(quad) {
                self.note_skip(skip_start, self.offset());
                self.rest = &self.rest[4..];
                return Some(quad);
            }
            if skip_start.is_none() {
                skip_start = Some(self.offset());
            }
            self.rest = &self.rest[1..];
        }
    }

    fn note_skip(&self, skip_start: Option<usize>, end: usize) {
        if let Some(start) = skip_start {
            debug!(
                from = start,
                to = end,
                "skipped unrecognized bytes in tagged payload"
            );
        }
    }

    /// Read a raw four-byte value quad.
    pub fn quad(&mut self) -> Result<Quad> {
        let quad = Quad::from_slice(self.rest)?;
        self.rest = &self.rest[4..];
        Ok(quad)
    }

    /// Read any numeric representation.
    pub fn numeric(&mut self) -> Result<i32> {
        format::get_numeric(&mut self.rest)
    }

    /// Read a numeric that must be non-negative.
    pub fn positive(&mut self) -> Result<u32> {
        format::get_positive(&mut self.rest)
    }

    /// Read a hexadecimal field.
    pub fn hexadecimal(&mut self) -> Result<i64> {
        format::get_hexadecimal(&mut self.rest)
    }

    /// Read a length-prefixed blob.
    pub fn blob(&mut self) -> Result<Bytes> {
        format::get_blob(&mut self.rest)
    }

    /// Whether the cursor sits on a blob length marker.
    ///
    /// Lets codecs with optional-value tokens (the color matrix) decide
    /// between "token alone" and "token + blob" without consuming input.
    #[must_use]
    pub fn peek_blob(&self) -> bool {
        self.rest.first() == Some(&format::MARKER_HEX)
    }

    /// Read a blob and interpret it as a trimmed text string.
    ///
    /// Device strings are space- or NUL-padded ASCII; anything beyond that
    /// is replaced, not rejected.
    pub fn string_blob(&mut self) -> Result<String> {
        let raw = self.blob()?;
        let text = String::from_utf8_lossy(&raw);
        Ok(text.trim_end_matches(['\0', ' ']).to_string())
    }
}

/// Split a blob into its four-byte tokens, ignoring a ragged tail.
#[must_use]
pub fn blob_quads(data: &[u8]) -> Vec<Quad> {
    data.chunks_exact(4)
        .map(|c| Quad::new([c[0], c[1], c[2], c[3]]))
        .collect()
}
