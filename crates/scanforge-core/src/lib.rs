pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{CancelToken, DocumentSource, Fault, Quad, Side};
