//! Reference-data file loader.
//!
//! A reference file seeds negotiated state from disk instead of the wire:
//! a flat sequence of (header, payload) records in the exact envelope
//! format the protocol uses, so captured device traffic can be replayed
//! as-is. Recognized record codes are the negotiation requests
//! (information, capabilities, parameters) plus `NAME` records carrying a
//! raw-USB-product-string → marketing-name substitution pair.

use std::path::Path;

use scanforge_core::constants::HEADER_SIZE;
use scanforge_core::{Error, Quad, Result};
use tracing::warn;

use scanforge_protocol::token::request;
use scanforge_protocol::{Capabilities, Header, Information, Parameters, TokenReader};

/// Record code of a name substitution entry.
const NAME_RECORD: Quad = Quad::new(*b"NAME");

/// Parsed contents of one reference file.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub information: Option<Information>,
    pub capabilities: Option<Capabilities>,
    pub capabilities_flip: Option<Capabilities>,
    pub parameters: Option<Parameters>,
    pub parameters_flip: Option<Parameters>,
    /// Raw product string → marketing name pairs.
    pub names: Vec<(String, String)>,
}

impl ReferenceData {
    /// Parse a reference file image.
    ///
    /// Records with unrecognized codes are skipped with a warning so a
    /// newer file still loads on an older engine. A record that cannot be
    /// framed at all (short header or truncated payload) is a hard error:
    /// nothing after it can be trusted.
    pub fn parse(raw: &[u8]) -> Result<ReferenceData> {
        let mut data = ReferenceData::default();
        let mut rest = raw;

        while !rest.is_empty() {
            if rest.len() < HEADER_SIZE {
                return Err(Error::MalformedRecord {
                    message: format!("{} trailing bytes, expected a record header", rest.len()),
                });
            }
            let header = Header::decode(rest)?;
            rest = &rest[HEADER_SIZE..];

            let size = header.size as usize;
            if rest.len() < size {
                return Err(Error::MalformedRecord {
                    message: format!(
                        "record {} claims {} payload bytes, {} available",
                        header.code,
                        size,
                        rest.len()
                    ),
                });
            }
            let (payload, tail) = rest.split_at(size);
            rest = tail;

            match header.code {
                request::INFORMATION => data.information = Some(Information::decode(payload)?),
                request::CAPABILITIES => data.capabilities = Some(Capabilities::decode(payload)?),
                request::CAPABILITIES_FLIP => {
                    data.capabilities_flip = Some(Capabilities::decode(payload)?);
                }
                request::GET_PARAMETERS => data.parameters = Some(Parameters::decode(payload)?),
                request::GET_PARAMETERS_FLIP => {
                    data.parameters_flip = Some(Parameters::decode(payload)?);
                }
                NAME_RECORD => {
                    let mut reader = TokenReader::new(payload);
                    let raw_name = reader.string_blob()?;
                    let marketing = reader.string_blob()?;
                    data.names.push((raw_name, marketing));
                }
                other => {
                    warn!(code = %other, size, "skipping unrecognized reference record");
                }
            }
        }

        Ok(data)
    }

    /// Read and parse a reference file.
    pub fn load(path: impl AsRef<Path>) -> Result<ReferenceData> {
        let raw = std::fs::read(path)?;
        Self::parse(&raw)
    }

    /// Marketing name for a raw USB product string, if the file maps it.
    #[must_use]
    pub fn marketing_name(&self, raw: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|(from, _)| from == raw)
            .map(|(_, to)| to.as_str())
    }
}
