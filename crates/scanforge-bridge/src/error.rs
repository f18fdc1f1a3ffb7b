use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("record payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("record declares a negative payload size {0}")]
    NegativeSize(i32),

    #[error("unknown request type {0}")]
    UnknownKind(u32),

    #[error("no open handle with id {0}")]
    UnknownHandle(u32),

    #[error("handle id {0} is already open")]
    DuplicateHandle(u32),

    #[error("unusable device spec: {0}")]
    BadDeviceSpec(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] scanforge_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
