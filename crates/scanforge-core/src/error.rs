use thiserror::Error;

use crate::types::Fault;

#[derive(Error, Debug)]
pub enum Error {
    // Codec errors
    #[error("invalid wire format: {message}")]
    InvalidFormat { message: String },

    #[error("value {value} not representable as {format}")]
    OutOfRange { value: i64, format: &'static str },

    #[error("truncated field: needed {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    // Protocol errors
    #[error("protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("device rejected request {request} as unknown")]
    UnknownRequest { request: String },

    #[error("request {request} not valid in the current device state")]
    InvalidRequest { request: String },

    // Device conditions
    #[error("device still busy after {attempts} polls")]
    ForeverBusy { attempts: u32 },

    #[error("device is in use by another client")]
    DeviceInUse,

    #[error("device fault: {0}")]
    DeviceFault(Fault),

    #[error("device rejected the parameter set")]
    ParametersRejected,

    // Session errors
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("session already finished")]
    SessionFinished,

    // Bridge/reference data errors
    #[error("malformed record: {message}")]
    MalformedRecord { message: String },

    // IO errors
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error ends the session (everything except the soft
    /// conditions the compound machine retries internally).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::UnknownRequest { .. } | Error::InvalidRequest { .. })
    }
}
