//! Byte-channel abstraction between the protocol engine and a device.
//!
//! The engine does not know how bytes reach the scanner. USB bulk pipes,
//! network sockets, and test fixtures all sit behind the [`Channel`] trait:
//! a half-duplex byte pipe with no framing of its own; the protocol codecs
//! impose all structure. Requests and replies on one channel strictly
//! alternate, and a channel is owned by exactly one session at a time;
//! exclusivity is enforced by ownership, not by runtime locking.
//!
//! All trait methods are native `async fn` (Edition 2024); transports that
//! need it can still hold their own state machines internally.

#![allow(async_fn_in_trait)]

pub mod mock;

pub use mock::MockChannel;

use scanforge_core::Result;

/// Half-duplex byte pipe to one device.
///
/// `send` must transmit the whole buffer or fail; `recv` must fill the
/// whole buffer or fail. Transport failures are fatal to the session: the
/// engine never retries a channel operation.
pub trait Channel {
    /// Transmit `data` in full.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Fill `buf` in full from the device.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<()>;
}
