//! Device information block codec.
//!
//! The information block is read once per connection and describes what the
//! device is: which document sources it has and what they can do, geometry
//! limits, identification strings, and the vendor extensions it accepts.

use scanforge_core::{DocumentSource, Quad, Result};

use crate::reader::{TokenReader, blob_quads};
use crate::token::{info as tag, source};

/// What one document source can do, as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// Raw capability flag quads, in wire order.
    pub flags: Vec<Quad>,
}

impl SourceInfo {
    #[must_use]
    pub fn supports_duplex(&self) -> bool {
        self.flags.contains(&source::FLAG_DUPLEX)
    }

    /// Whether the source detects the page end during the scan, which
    /// forces the wait-for-page-end delivery policy.
    #[must_use]
    pub fn detects_page_end(&self) -> bool {
        self.flags.contains(&source::FLAG_PAGE_END_DETECT)
    }

    #[must_use]
    pub fn can_load(&self) -> bool {
        self.flags.contains(&source::FLAG_LOAD)
    }

    #[must_use]
    pub fn can_eject(&self) -> bool {
        self.flags.contains(&source::FLAG_EJECT)
    }
}

/// Static device description.
///
/// Absent fields stay `None`: a device that does not report a serial
/// number has no serial number as far as the engine is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Information {
    pub adf: Option<SourceInfo>,
    pub tpu: Option<SourceInfo>,
    pub flatbed: Option<SourceInfo>,
    /// Maximum image extent in pixels, width then height.
    pub max_image: Option<(u32, u32)>,
    /// Number of push buttons on the device, if any.
    pub push_buttons: Option<u32>,
    pub product: Option<String>,
    pub version: Option<String>,
    /// Device-side image buffer size in bytes.
    pub buffer_size: Option<u32>,
    /// Extension request codes the device accepts.
    pub extensions: Vec<Quad>,
    /// The device truncates trailing data at the detected media end, which
    /// forces the wait-for-page-end delivery policy.
    pub truncates_at_media_end: bool,
    pub serial: Option<String>,
}

impl Information {
    /// Decode an information payload.
    pub fn decode(payload: &[u8]) -> Result<Information> {
        let mut info = Information::default();
        let mut reader = TokenReader::new(payload);

        while let Some(token) = reader.next_token(is_info_tag) {
            match token {
                source::ADF => {
                    info.adf = Some(SourceInfo {
                        flags: blob_quads(&reader.blob()?),
                    });
                }
                source::TPU => {
                    info.tpu = Some(SourceInfo {
                        flags: blob_quads(&reader.blob()?),
                    });
                }
                source::FLATBED => {
                    info.flatbed = Some(SourceInfo {
                        flags: blob_quads(&reader.blob()?),
                    });
                }
                tag::MAX_IMAGE => {
                    let width = reader.positive()?;
                    let height = reader.positive()?;
                    info.max_image = Some((width, height));
                }
                tag::PUSH_BUTTON => info.push_buttons = Some(reader.positive()?),
                tag::PRODUCT => info.product = Some(reader.string_blob()?),
                tag::VERSION => info.version = Some(reader.string_blob()?),
                tag::BUFFER_SIZE => info.buffer_size = Some(reader.positive()?),
                tag::EXTENSIONS => info.extensions = blob_quads(&reader.blob()?),
                tag::TRUNCATES => info.truncates_at_media_end = true,
                tag::SERIAL => info.serial = Some(reader.string_blob()?),
                _ => unreachable!("recognizer admitted an unhandled tag"),
            }
        }

        Ok(info)
    }

    /// Description of the given source, if the device has it.
    #[must_use]
    pub fn source(&self, source: DocumentSource) -> Option<&SourceInfo> {
        match source {
            DocumentSource::Adf => self.adf.as_ref(),
            DocumentSource::Tpu => self.tpu.as_ref(),
            DocumentSource::Flatbed => self.flatbed.as_ref(),
        }
    }
}

fn is_info_tag(q: Quad) -> bool {
    matches!(
        q,
        source::ADF | source::TPU | source::FLATBED
    ) || matches!(
        q,
        tag::MAX_IMAGE
            | tag::PUSH_BUTTON
            | tag::PRODUCT
            | tag::VERSION
            | tag::BUFFER_SIZE
            | tag::EXTENSIONS
            | tag::TRUNCATES
            | tag::SERIAL
    )
}
