//! The host-facing record format.
//!
//! Every request and reply is one fixed 16-byte header plus payload, all
//! header fields big-endian:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬─────────────┐
//! │    id    │   type   │  error   │   size   │   payload   │
//! │  u32 BE  │  u32 BE  │  u32 BE  │  i32 BE  │ `size` bytes│
//! └──────────┴──────────┴──────────┴──────────┴─────────────┘
//! ```
//!
//! `id` names the device handle the record concerns. Requests carry a
//! zero `error` field; replies answer with [`STATUS_OK`] or [`STATUS_NG`].

use bytes::Bytes;

use crate::error::{BridgeError, Result};

/// Header size of every record.
pub const RECORD_HEADER_SIZE: usize = 16;

/// Reply status: request handled.
pub const STATUS_OK: u32 = 0;

/// Reply status: request failed.
pub const STATUS_NG: u32 = 1;

/// Request types a host may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RequestKind {
    /// Claim a device; the payload is a UTF-8 device spec.
    Open = 1,
    /// Release a device handle.
    Close = 2,
    /// Relay protocol bytes to the device behind the handle.
    Native = 3,
}

impl RequestKind {
    /// Decode a request type field.
    ///
    /// # Errors
    /// Returns `BridgeError::UnknownKind` for anything unrecognized.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            1 => Ok(RequestKind::Open),
            2 => Ok(RequestKind::Close),
            3 => Ok(RequestKind::Native),
            other => Err(BridgeError::UnknownKind(other)),
        }
    }
}

/// One framed record, request or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRecord {
    /// Device handle id the record concerns.
    pub id: u32,
    /// Request type field, see [`RequestKind`].
    pub kind: u32,
    /// Zero on requests; OK/NG on replies.
    pub error: u32,
    pub payload: Bytes,
}

impl BridgeRecord {
    /// Build a request record.
    #[must_use]
    pub fn request(id: u32, kind: RequestKind, payload: Bytes) -> Self {
        BridgeRecord {
            id,
            kind: kind as u32,
            error: 0,
            payload,
        }
    }

    /// Build the reply to a request.
    #[must_use]
    pub fn reply(request: &BridgeRecord, status: u32, payload: Bytes) -> Self {
        BridgeRecord {
            id: request.id,
            kind: request.kind,
            error: status,
            payload,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error == STATUS_OK
    }
}
