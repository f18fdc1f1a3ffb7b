//! Per-reply status decoding and validation.
//!
//! Every reply block embeds a NUL-padded status area of tagged fields. The
//! decoder rebuilds a fresh [`Status`] per reply; nothing is ever merged
//! across replies. Validation is deliberately separate from decoding: a
//! malformed combination is reported as a [`Violation`] for the state
//! machine to log, never as a decode failure, because the device has
//! already moved on and the session has to keep tracking it.

use std::fmt;

use scanforge_core::{Quad, Result, Side};
use tracing::warn;

use crate::reader::TokenReader;
use crate::token::status as tag;

/// Size hints carried by page-start and page-end markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Pixels per scan line.
    pub width: u32,
    /// Trailing pad bytes per scan line.
    pub padding: u32,
    /// Scan line count.
    pub height: u32,
}

/// Decoded status area of one reply.
///
/// Fields the device did not send stay `None`/empty; absence means
/// absence, not a default. Only the error list may legally repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    /// `(part, what)` error entries, in wire order. May repeat.
    pub errors: Vec<(Quad, Quad)>,
    /// Not-ready reason, if the device is not ready.
    pub not_ready: Option<Quad>,
    /// A new image starts in this reply's payload.
    pub page_start: Option<ImageSize>,
    /// The current image ends with this reply's payload.
    pub page_end: Option<ImageSize>,
    /// Images remaining in the device buffer.
    pub images_left: Option<u32>,
    /// Side the current image belongs to.
    pub side: Option<Side>,
    /// Attention flag, notably cancel confirmation.
    pub attention: Option<Quad>,
    /// Outcome of a parameter-setting request.
    pub parameter_result: Option<Quad>,
    /// Detected document type.
    pub document_type: Option<Quad>,
    /// Tags other than `#err` that appeared more than once.
    ///
    /// Kept for [`Status::validate`]; the last value decoded wins.
    repeated_tags: Vec<Quad>,
}

/// The single most relevant aspect of a status, by fixed priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Error(Quad, Quad),
    NotReady(Quad),
    PageStart(ImageSize),
    PageEnd(ImageSize),
    ImagesLeft(u32),
    Side(Side),
    Attention(Quad),
    ParameterResult(Quad),
    DocumentType(Quad),
}

/// A rule the device's status combination broke.
///
/// Violations are diagnostics, not errors: the machine logs them and
/// carries on with the higher-priority interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Page start and page end in the same reply.
    PageStartAndEnd,
    /// A parameter result on a request that sets no parameters.
    UnexpectedParameterResult { request: Quad },
    /// A tag other than `#err` appeared more than once.
    RepeatedTag { tag: Quad },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::PageStartAndEnd => {
                write!(f, "page start and page end in the same reply")
            }
            Violation::UnexpectedParameterResult { request } => {
                write!(f, "parameter result on non-parameter request {}", request)
            }
            Violation::RepeatedTag { tag } => {
                write!(f, "status tag {} repeated", tag)
            }
        }
    }
}

impl Status {
    /// Decode one status area.
    ///
    /// Unknown tokens are skipped; repeated tags other than `#err` keep the
    /// last value and are reported by [`Status::validate`].
    pub fn decode(area: &[u8]) -> Result<Status> {
        let mut status = Status::default();
        let mut reader = TokenReader::new(area);

        while let Some(token) = reader.next_token(is_status_tag) {
            match token {
                tag::ERROR => {
                    let part = reader.quad()?;
                    let what = reader.quad()?;
                    status.errors.push((part, what));
                }
                tag::NOT_READY => {
                    status.note_repeat(token, status.not_ready.is_some());
                    status.not_ready = Some(reader.quad()?);
                }
                tag::PAGE_START => {
                    status.note_repeat(token, status.page_start.is_some());
                    status.page_start = Some(decode_image_size(&mut reader)?);
                }
                tag::PAGE_END => {
                    status.note_repeat(token, status.page_end.is_some());
                    status.page_end = Some(decode_image_size(&mut reader)?);
                }
                tag::IMAGES_LEFT => {
                    status.note_repeat(token, status.images_left.is_some());
                    status.images_left = Some(reader.positive()?);
                }
                tag::SIDE => {
                    status.note_repeat(token, status.side.is_some());
                    let value = reader.quad()?;
                    status.side = match value {
                        tag::SID_FACE => Some(Side::Face),
                        tag::SID_REAR => Some(Side::Rear),
                        other => {
                            warn!(side = %other, "unrecognized side indicator");
                            None
                        }
                    };
                }
                tag::ATTENTION => {
                    status.note_repeat(token, status.attention.is_some());
                    status.attention = Some(reader.quad()?);
                }
                tag::PARAMETER_RESULT => {
                    status.note_repeat(token, status.parameter_result.is_some());
                    status.parameter_result = Some(reader.quad()?);
                }
                tag::DOCUMENT_TYPE => {
                    status.note_repeat(token, status.document_type.is_some());
                    status.document_type = Some(reader.quad()?);
                }
                _ => unreachable!("recognizer admitted an unhandled tag"),
            }
        }

        Ok(status)
    }

    fn note_repeat(&mut self, tag: Quad, already_set: bool) {
        if already_set && !self.repeated_tags.contains(&tag) {
            self.repeated_tags.push(tag);
        }
    }

    /// The highest-priority aspect present:
    /// error > not-ready > page-start > page-end > images-left > side >
    /// attention > parameter-result > document-type.
    #[must_use]
    pub fn condition(&self) -> Option<Condition> {
        if let Some(&(part, what)) = self.errors.first() {
            return Some(Condition::Error(part, what));
        }
        if let Some(reason) = self.not_ready {
            return Some(Condition::NotReady(reason));
        }
        if let Some(size) = self.page_start {
            return Some(Condition::PageStart(size));
        }
        if let Some(size) = self.page_end {
            return Some(Condition::PageEnd(size));
        }
        if let Some(count) = self.images_left {
            return Some(Condition::ImagesLeft(count));
        }
        if let Some(side) = self.side {
            return Some(Condition::Side(side));
        }
        if let Some(attention) = self.attention {
            return Some(Condition::Attention(attention));
        }
        if let Some(result) = self.parameter_result {
            return Some(Condition::ParameterResult(result));
        }
        self.document_type.map(Condition::DocumentType)
    }

    /// Whether the device asked to be polled again.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self.not_ready,
            Some(tag::NRD_BUSY) | Some(tag::NRD_WARMING_UP)
        )
    }

    /// Whether another client holds the device.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.not_ready == Some(tag::NRD_RESERVED)
    }

    /// Whether the device confirmed a cancellation.
    #[must_use]
    pub fn is_cancel_attention(&self) -> bool {
        self.attention == Some(tag::ATN_CANCELLED)
    }

    /// Whether the error list names the given condition anywhere.
    #[must_use]
    pub fn has_error(&self, what: Quad) -> bool {
        self.errors.iter().any(|&(_, w)| w == what)
    }

    /// Cross-field validation against the request this reply answers.
    #[must_use]
    pub fn validate(&self, request: Quad) -> Vec<Violation> {
        use crate::token::request as req;

        let mut violations = Vec::new();
        if self.page_start.is_some() && self.page_end.is_some() {
            violations.push(Violation::PageStartAndEnd);
        }
        let parameter_request =
            matches!(request, req::SET_PARAMETERS | req::SET_PARAMETERS_FLIP);
        if self.parameter_result.is_some() && !parameter_request {
            violations.push(Violation::UnexpectedParameterResult { request });
        }
        for &tag in &self.repeated_tags {
            violations.push(Violation::RepeatedTag { tag });
        }
        violations
    }
}

fn is_status_tag(q: Quad) -> bool {
    matches!(
        q,
        tag::ERROR
            | tag::NOT_READY
            | tag::PAGE_START
            | tag::PAGE_END
            | tag::IMAGES_LEFT
            | tag::SIDE
            | tag::ATTENTION
            | tag::PARAMETER_RESULT
            | tag::DOCUMENT_TYPE
    )
}

fn decode_image_size(reader: &mut TokenReader<'_>) -> Result<ImageSize> {
    Ok(ImageSize {
        width: reader.positive()?,
        padding: reader.positive()?,
        height: reader.positive()?,
    })
}
