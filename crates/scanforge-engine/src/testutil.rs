//! Shared helpers for building scripted device replies in tests.

use scanforge_core::Quad;
use scanforge_core::constants::{REPLY_BLOCK_SIZE, STATUS_AREA_SIZE};
use scanforge_protocol::Header;

/// Build a 64-byte reply block plus optional payload.
pub(crate) fn reply_block(code: Quad, payload: &[u8], status: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(REPLY_BLOCK_SIZE + payload.len());
    block.extend_from_slice(&Header::new(code, payload.len() as u32).unwrap().encode());
    assert!(status.len() <= STATUS_AREA_SIZE);
    block.extend_from_slice(status);
    block.resize(REPLY_BLOCK_SIZE, 0);
    block.extend_from_slice(payload);
    block
}
