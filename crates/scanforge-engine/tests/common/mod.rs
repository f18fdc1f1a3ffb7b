//! Shared fixtures for scripting a mock device.

use bytes::{BufMut, BytesMut};

use scanforge_channel::MockChannel;
use scanforge_core::Quad;
use scanforge_core::constants::{REPLY_BLOCK_SIZE, STATUS_AREA_SIZE};
use scanforge_protocol::token::{request, source, status as tag};
use scanforge_protocol::{Header, format};

/// Build a 64-byte reply block plus optional payload.
pub fn reply_block(code: Quad, payload: &[u8], status: &[u8]) -> Vec<u8> {
    let mut block = Vec::with_capacity(REPLY_BLOCK_SIZE + payload.len());
    block.extend_from_slice(&Header::new(code, payload.len() as u32).unwrap().encode());
    assert!(status.len() <= STATUS_AREA_SIZE);
    block.extend_from_slice(status);
    block.resize(REPLY_BLOCK_SIZE, 0);
    block.extend_from_slice(payload);
    block
}

/// Incremental builder for a status area.
#[derive(Default)]
pub struct StatusArea {
    buf: BytesMut,
}

impl StatusArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(mut self, part: Quad, what: Quad) -> Self {
        self.buf.put_slice(tag::ERROR.as_bytes());
        self.buf.put_slice(part.as_bytes());
        self.buf.put_slice(what.as_bytes());
        self
    }

    pub fn page_start(mut self, width: i32, height: i32) -> Self {
        self.buf.put_slice(tag::PAGE_START.as_bytes());
        format::put_numeric(&mut self.buf, width).unwrap();
        format::put_numeric(&mut self.buf, 0).unwrap();
        format::put_numeric(&mut self.buf, height).unwrap();
        self
    }

    pub fn page_end(mut self, width: i32, height: i32) -> Self {
        self.buf.put_slice(tag::PAGE_END.as_bytes());
        format::put_numeric(&mut self.buf, width).unwrap();
        format::put_numeric(&mut self.buf, 0).unwrap();
        format::put_numeric(&mut self.buf, height).unwrap();
        self
    }

    pub fn side(mut self, side: Quad) -> Self {
        self.buf.put_slice(tag::SIDE.as_bytes());
        self.buf.put_slice(side.as_bytes());
        self
    }

    pub fn attention(mut self, value: Quad) -> Self {
        self.buf.put_slice(tag::ATTENTION.as_bytes());
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Queue the negotiation replies [`scanforge_engine::Scanner::open`]
/// consumes: information, capabilities, parameters, and the flip-side
/// blocks when the ADF advertises duplex.
pub fn script_open(channel: &mut MockChannel, adf_flags: &[u8], params_payload: &[u8]) {
    let mut info = BytesMut::new();
    info.put_slice(source::ADF.as_bytes());
    format::put_blob(&mut info, adf_flags).unwrap();

    channel.queue(&reply_block(request::INFORMATION, &info, &[]));
    channel.queue(&reply_block(request::CAPABILITIES, &[], &[]));
    channel.queue(&reply_block(request::GET_PARAMETERS, params_payload, &[]));

    if adf_flags
        .chunks_exact(4)
        .any(|c| c == source::FLAG_DUPLEX.as_bytes())
    {
        channel.queue(&reply_block(request::CAPABILITIES_FLIP, &[], &[]));
        channel.queue(&reply_block(request::GET_PARAMETERS_FLIP, &[], &[]));
    }
}

/// Parameter payload selecting the ADF with the given option flags and an
/// optional page count.
pub fn adf_params(flags: &[u8], page_count: Option<i32>) -> Vec<u8> {
    use scanforge_protocol::token::parameter as par;

    let mut buf = BytesMut::new();
    buf.put_slice(source::ADF.as_bytes());
    format::put_blob(&mut buf, flags).unwrap();
    if let Some(pages) = page_count {
        buf.put_slice(par::PAGE_COUNT.as_bytes());
        format::put_numeric(&mut buf, pages).unwrap();
    }
    buf.to_vec()
}
