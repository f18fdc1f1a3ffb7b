//! Protocol-level constants shared by every scanforge crate.
//!
//! The compound protocol exchanges a fixed 12-byte header per request and a
//! fixed 64-byte reply block per reply. Sizes, numeric format ranges, and
//! the busy-poll bounds are centralized here so the codecs and the state
//! machines agree on them.

// ============================================================================
// Wire envelope
// ============================================================================

/// Request/reply header size: 4-byte token + 8 uppercase-hex size digits.
pub const HEADER_SIZE: usize = 12;

/// Fixed reply block size: header plus the status area.
pub const REPLY_BLOCK_SIZE: usize = 64;

/// Status area size inside a reply block, NUL-padded tagged fields.
pub const STATUS_AREA_SIZE: usize = REPLY_BLOCK_SIZE - HEADER_SIZE;

/// Largest payload size expressible in a header (7 hex digits of headroom;
/// the eighth digit is always zero on the wire).
pub const MAX_PAYLOAD_SIZE: u32 = 0x0FFF_FFFF;

// ============================================================================
// Numeric format ranges
// ============================================================================

/// Upper bound of the 3-digit decimal format.
pub const DECIMAL_MAX: i32 = 999;

/// Upper bound of the 7-digit integer format.
pub const INTEGER_MAX: i32 = 9_999_999;

/// Lower bound of the 6-digit negative integer format.
pub const INTEGER_MIN: i32 = -999_999;

/// Upper bound of the 7-digit hexadecimal format.
pub const HEX_MAX: i64 = 0x0FFF_FFFF;

// ============================================================================
// Busy polling
// ============================================================================

/// Delay between busy polls, in milliseconds.
///
/// Warming-up and busy conditions are transient; the compound machine
/// re-issues the pending request after this delay rather than surfacing
/// the condition.
pub const BUSY_POLL_DELAY_MS: u64 = 500;

/// Number of busy polls before the condition is treated as terminal.
///
/// 16 polls at [`BUSY_POLL_DELAY_MS`] gives a device roughly eight seconds
/// to come out of warm-up before `Error::ForeverBusy` is raised.
pub const BUSY_POLL_LIMIT: u32 = 16;

// ============================================================================
// Legacy handshake bytes
// ============================================================================

/// Positive acknowledgement in the legacy byte-opcode generation.
pub const ACK: u8 = 0x06;

/// Negative acknowledgement in the legacy byte-opcode generation.
pub const NAK: u8 = 0x15;

/// Escape byte introducing every legacy two-byte command.
pub const ESC: u8 = 0x1b;

/// Form-feed, the single-byte legacy eject command.
pub const FF: u8 = 0x0c;

// ============================================================================
// Status area limits
// ============================================================================

/// Most `(part, what)` error pairs a status area can physically carry.
///
/// Each error entry is 12 bytes (`#err` + two quads) and the area is 52
/// bytes, so anything past four entries cannot be well-formed.
pub const MAX_STATUS_ERRORS: usize = 4;
