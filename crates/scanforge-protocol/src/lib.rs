//! Wire codecs for the ESC/I compound scanner protocol.
//!
//! Everything on the wire is built from a small set of primitives: fixed
//! four-byte tokens ([`scanforge_core::Quad`]), four interchangeable numeric
//! encodings plus a length-prefixed blob ([`format`]), and a 12-byte
//! header envelope ([`header`]). Structured payloads (device information,
//! capabilities, scan parameters, hardware status) are sequences of
//! `(token, value)` pairs in arbitrary order, decoded by the codecs in this
//! crate with forward-compatible skipping of unknown tokens.

pub mod caps;
pub mod format;
pub mod header;
pub mod hwstatus;
pub mod info;
pub mod mechanics;
pub mod params;
pub mod reader;
pub mod status;
pub mod token;

pub use caps::{Capabilities, Constraint};
pub use header::Header;
pub use hwstatus::HardwareStatus;
pub use info::{Information, SourceInfo};
pub use mechanics::MechanicsAction;
pub use params::{ColorMatrix, Parameters};
pub use reader::TokenReader;
pub use status::{ImageSize, Status, Violation};
