//! Scripted in-memory channel for engine tests.
//!
//! The mock plays the device's half of a conversation: tests queue the
//! bytes the device would send, run the engine, and afterwards inspect
//! everything the engine wrote. Reads drain the queued bytes in order, so
//! one queued reply block followed by a payload behaves exactly like a
//! device streaming both.

use bytes::{Bytes, BytesMut};
use scanforge_core::{Error, Result};

use crate::Channel;

/// In-memory [`Channel`] driven by a pre-scripted device side.
#[derive(Debug, Default)]
pub struct MockChannel {
    inbound: BytesMut,
    sent: Vec<Bytes>,
    fail_next_send: bool,
    fail_next_recv: bool,
}

impl MockChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes the device will "send" on subsequent reads.
    pub fn queue(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Everything the engine sent, one entry per `send` call.
    #[must_use]
    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    /// All sent bytes concatenated, for coarse assertions.
    #[must_use]
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sent.iter().flat_map(|b| b.iter().copied()).collect()
    }

    /// Bytes queued but not yet consumed by the engine.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.inbound.len()
    }

    /// Make the next `send` fail with a broken-pipe transport error.
    pub fn fail_next_send(&mut self) {
        self.fail_next_send = true;
    }

    /// Make the next `recv` fail with a broken-pipe transport error.
    pub fn fail_next_recv(&mut self) {
        self.fail_next_recv = true;
    }
}

impl Channel for MockChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_next_send {
            self.fail_next_send = false;
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        self.sent.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.fail_next_recv {
            self.fail_next_recv = false;
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        if self.inbound.len() < buf.len() {
            return Err(Error::Truncated {
                expected: buf.len(),
                actual: self.inbound.len(),
            });
        }
        let chunk = self.inbound.split_to(buf.len());
        buf.copy_from_slice(&chunk);
        Ok(())
    }
}
