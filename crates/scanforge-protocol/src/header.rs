//! The 12-byte request/reply envelope.

use bytes::{BufMut, BytesMut};
use scanforge_core::constants::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use scanforge_core::{Error, Quad, Result};
use std::fmt;

/// One request or reply envelope: a code token and the byte count of the
/// payload that follows.
///
/// On the wire the size travels as eight uppercase hexadecimal digits, so
/// the envelope is always exactly [`HEADER_SIZE`] bytes:
///
/// ```text
/// ┌──────────┬──────────────────────┐
/// │   code   │         size         │
/// │ 4 bytes  │  8 uppercase hex     │
/// └──────────┴──────────────────────┘
/// ```
///
/// # Examples
///
/// ```
/// use scanforge_protocol::Header;
/// use scanforge_core::Quad;
///
/// let hdr = Header::new(Quad::new(*b"INFO"), 0x140).unwrap();
/// let wire = hdr.encode();
/// assert_eq!(&wire[..], b"INFO00000140");
///
/// let back = Header::decode(&wire).unwrap();
/// assert_eq!(back, hdr);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Request code, or the echoed code in a reply.
    pub code: Quad,

    /// Payload size in bytes.
    pub size: u32,
}

impl Header {
    /// Create a header, validating the size range.
    ///
    /// # Errors
    /// Returns `Error::OutOfRange` if `size` exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn new(code: Quad, size: u32) -> Result<Self> {
        if size > MAX_PAYLOAD_SIZE {
            return Err(Error::OutOfRange {
                value: size.into(),
                format: "header size",
            });
        }
        Ok(Header { code, size })
    }

    /// Encode to the 12-byte wire form.
    #[must_use]
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.put_slice(self.code.as_bytes());
        buf.put_slice(format!("{:08X}", self.size).as_bytes());
        buf
    }

    /// Decode from the first 12 bytes of `raw`.
    ///
    /// # Errors
    /// Returns `Error::Truncated` on short input, `Error::InvalidFormat` on
    /// non-hex size digits, and `Error::OutOfRange` if the decoded size
    /// exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                expected: HEADER_SIZE,
                actual: raw.len(),
            });
        }
        let code = Quad::from_slice(raw)?;
        let mut size: u64 = 0;
        for &b in &raw[4..HEADER_SIZE] {
            let digit = match b {
                b'0'..=b'9' => u64::from(b - b'0'),
                b'A'..=b'F' => u64::from(b - b'A' + 10),
                _ => {
                    return Err(Error::InvalidFormat {
                        message: format!("invalid size digit {:#04x} in header", b),
                    });
                }
            };
            size = size * 16 + digit;
        }
        if size > u64::from(MAX_PAYLOAD_SIZE) {
            return Err(Error::OutOfRange {
                value: size as i64,
                format: "header size",
            });
        }
        Ok(Header {
            code,
            size: size as u32,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.code, self.size)
    }
}
