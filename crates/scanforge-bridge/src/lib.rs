//! Host IPC bridge.
//!
//! A host application talks to the engine through framed records on a
//! local byte stream: a fixed 16-byte header plus payload. The bridge
//! frames those records ([`codec`]), keeps a registry of open device
//! handles, and routes NATIVE payload bytes to whichever protocol machine
//! the handle was opened as, the compound engine or the legacy handshake
//! predictor ([`router`]).

#![allow(async_fn_in_trait)]

pub mod codec;
pub mod error;
pub mod message;
pub mod router;

pub use codec::BridgeCodec;
pub use error::{BridgeError, Result};
pub use message::{BridgeRecord, RequestKind, STATUS_NG, STATUS_OK};
pub use router::{Bridge, Connector, Generation};
