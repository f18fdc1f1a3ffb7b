use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::{Result, error::Error};

/// Four-byte protocol token.
///
/// The compound protocol spells every request code, status tag, and
/// enumerated value as a fixed four-byte token, loosely mnemonic and
/// usually printable (`"ADF "`, `"#err"`). Tokens are opaque: the engine
/// compares them for equality and never interprets individual bytes.
///
/// # Examples
///
/// ```
/// use scanforge_core::Quad;
///
/// const ADF: Quad = Quad::new(*b"ADF ");
/// assert_eq!(ADF.to_string(), "ADF ");
/// assert_eq!(ADF.as_bytes(), b"ADF ");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad([u8; 4]);

impl Quad {
    /// Create a token from its four raw bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Quad(bytes)
    }

    /// Get the raw token bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Read a token from the front of a byte slice.
    ///
    /// # Errors
    /// Returns `Error::Truncated` if fewer than four bytes are available.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::Truncated {
                expected: 4,
                actual: bytes.len(),
            });
        }
        Ok(Quad([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Whether all four bytes are printable ASCII.
    #[must_use]
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| (0x20..0x7f).contains(b))
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            for b in self.0 {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            for b in self.0 {
                write!(f, "\\x{:02X}", b)?;
            }
            Ok(())
        }
    }
}

impl fmt::Debug for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quad({})", self)
    }
}

impl From<[u8; 4]> for Quad {
    fn from(bytes: [u8; 4]) -> Self {
        Quad(bytes)
    }
}

/// Sheet side an image belongs to during duplex acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Front of the sheet, scanned by the face sensor.
    Face,
    /// Back of the sheet, scanned by the rear sensor on the flip pass.
    Rear,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Face => write!(f, "face"),
            Side::Rear => write!(f, "rear"),
        }
    }
}

/// Document source a scan reads from.
///
/// Exactly one source is selected in a parameter set at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Automatic document feeder.
    Adf,
    /// Transparency unit.
    Tpu,
    /// Flatbed glass.
    Flatbed,
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Adf => write!(f, "ADF"),
            DocumentSource::Tpu => write!(f, "TPU"),
            DocumentSource::Flatbed => write!(f, "flatbed"),
        }
    }
}

/// Classified hard device fault.
///
/// Produced when a reply's error list names a condition that cannot be
/// retried away. `rank()` orders simultaneous faults for surfacing:
/// authentication and permission problems outrank mechanical faults,
/// and a plain media-out ranks last because it usually just means the
/// feeder ran empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Device requires authentication before use.
    AuthenticationRequired,
    /// Account lacks permission to use the device.
    PermissionRequired,
    /// A cover or carrier unit is open.
    CoverOpen,
    /// Media jammed in the transport path.
    MediaJam,
    /// Two or more sheets were fed together.
    DoubleFeed,
    /// Lamp failed to reach operating condition.
    LampFault,
    /// Transport or carriage lock is engaged.
    LockFault,
    /// Document detection sensor failure.
    SensorFault,
    /// Battery too low to operate.
    BatteryLow,
    /// Unspecified hardware error reported by the device.
    DeviceError,
    /// No media present in the selected source.
    MediaOut,
}

impl Fault {
    /// Precedence rank, lower is more urgent.
    ///
    /// authentication > permission > any other hard fault > plain media-out.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Fault::AuthenticationRequired => 0,
            Fault::PermissionRequired => 1,
            Fault::MediaOut => 3,
            _ => 2,
        }
    }

    /// Human-readable description used in surfaced errors.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Fault::AuthenticationRequired => "device requires authentication",
            Fault::PermissionRequired => "not permitted to use this device",
            Fault::CoverOpen => "a cover is open",
            Fault::MediaJam => "media jammed in the transport path",
            Fault::DoubleFeed => "multiple sheets fed together",
            Fault::LampFault => "lamp failure",
            Fault::LockFault => "transport lock is engaged",
            Fault::SensorFault => "document detection failure",
            Fault::BatteryLow => "battery too low to operate",
            Fault::DeviceError => "device reported a hardware error",
            Fault::MediaOut => "no media in the document source",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Cooperative cancellation token.
///
/// The session owns one of these and checks it only at defined suspension
/// points (before issuing the next request). Anything may hold a clone and
/// request cancellation; a signal handler, if the host installs one, merely
/// calls [`CancelToken::cancel`].
///
/// # Examples
///
/// ```
/// use scanforge_core::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
///
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag so the token can be reused for another batch.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
