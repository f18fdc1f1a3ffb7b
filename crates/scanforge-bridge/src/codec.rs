//! Tokio codec for the host record stream.
//!
//! A thin [`Decoder`]/[`Encoder`] pair over [`BridgeRecord`], usable with
//! `tokio_util::codec::Framed` on whatever local stream the host connects
//! through. Payload sizes are bounded to keep a misbehaving host from
//! ballooning the buffer.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::BridgeError;
use crate::message::{BridgeRecord, RECORD_HEADER_SIZE};

/// Default maximum record payload (16 MB). Image chunks pass through
/// NATIVE records, so the limit is sized for them, not for control
/// traffic.
const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Codec framing [`BridgeRecord`]s on a byte stream.
#[derive(Debug)]
pub struct BridgeCodec {
    max_payload: usize,
}

impl BridgeCodec {
    #[must_use]
    pub fn new() -> Self {
        BridgeCodec {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Codec with a custom payload bound.
    #[must_use]
    pub fn with_max_payload(max_payload: usize) -> Self {
        BridgeCodec { max_payload }
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = BridgeRecord;
    type Error = BridgeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < RECORD_HEADER_SIZE {
            return Ok(None);
        }

        // peek the size before committing to the header
        let size = i32::from_be_bytes([src[12], src[13], src[14], src[15]]);
        if size < 0 {
            return Err(BridgeError::NegativeSize(size));
        }
        let size = size as usize;
        if size > self.max_payload {
            return Err(BridgeError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        if src.len() < RECORD_HEADER_SIZE + size {
            src.reserve(RECORD_HEADER_SIZE + size - src.len());
            return Ok(None);
        }

        let id = src.get_u32();
        let kind = src.get_u32();
        let error = src.get_u32();
        let _size = src.get_i32();
        let payload = src.split_to(size).freeze();

        trace!(id, kind, error, size, "decoded bridge record");
        Ok(Some(BridgeRecord {
            id,
            kind,
            error,
            payload,
        }))
    }
}

impl Encoder<BridgeRecord> for BridgeCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: BridgeRecord, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_payload {
            return Err(BridgeError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.max_payload,
            });
        }
        dst.reserve(RECORD_HEADER_SIZE + item.payload.len());
        dst.put_u32(item.id);
        dst.put_u32(item.kind);
        dst.put_u32(item.error);
        dst.put_i32(item.payload.len() as i32);
        dst.put_slice(&item.payload);
        Ok(())
    }
}
