//! Scan parameter codec.
//!
//! Parameters are the values currently in effect. Two instances live in a
//! session: one for the front (or both sides) and one for the flip side of
//! a duplex pass. Encoding writes only the fields that are set; decoding
//! leaves absent fields unset. Nothing is ever defaulted here; defaults
//! are a policy question for the layers above.

use bytes::{BufMut, Bytes, BytesMut};
use scanforge_core::{DocumentSource, Error, Quad, Result};
use tracing::warn;

use crate::format;
use crate::reader::{TokenReader, blob_quads};
use crate::token::{parameter as par, source};

/// Color correction matrix selection.
///
/// The identity matrix has a dedicated wire form: the `CMX ` token alone,
/// with no blob. Anything else travels as an opaque coefficient blob the
/// engine never interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorMatrix {
    /// Identity; colors pass through untouched.
    Unit,
    /// Device-specific coefficient blob, carried opaque.
    Custom(Bytes),
}

/// Currently-set scan parameter values.
///
/// At most one of `adf`/`tpu`/`flatbed` may be set; [`Parameters::validate`]
/// enforces exactly-one for a full parameter set about to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    /// ADF selected, with its option flags (duplex, page-end detect, ...).
    pub adf: Option<Vec<Quad>>,
    /// TPU selected, with its option flags.
    pub tpu: Option<Vec<Quad>>,
    /// Flatbed selected, with its option flags.
    pub flatbed: Option<Vec<Quad>>,

    pub color_mode: Option<Quad>,
    pub format: Option<Quad>,
    pub jpeg_quality: Option<i32>,
    pub threshold: Option<i32>,
    pub dither: Option<Quad>,
    pub gamma_mode: Option<Quad>,
    /// Opaque gamma table blob, carried untouched.
    pub gamma_table: Option<Bytes>,
    pub color_matrix: Option<ColorMatrix>,
    pub sharpness: Option<i32>,
    pub mirroring: Option<bool>,
    pub buffer_size: Option<u32>,
    /// Images to acquire; 0 means scan until the source runs empty.
    pub page_count: Option<u32>,
    pub resolution_main: Option<u32>,
    pub resolution_sub: Option<u32>,
    pub crop: Option<bool>,
    /// Acquisition rectangle: offset-x, offset-y, width, height.
    pub acquisition: Option<[u32; 4]>,
    pub fill_color: Option<Quad>,
    /// Border fill widths: left, right, top, bottom.
    pub fill_area: Option<[u32; 4]>,
    pub quiet: Option<bool>,
    pub lamination: Option<bool>,
}

impl Parameters {
    /// Decode a parameter payload.
    pub fn decode(payload: &[u8]) -> Result<Parameters> {
        let mut params = Parameters::default();
        let mut reader = TokenReader::new(payload);

        while let Some(token) = reader.next_token(is_params_tag) {
            match token {
                source::ADF => params.adf = Some(blob_quads(&reader.blob()?)),
                source::TPU => params.tpu = Some(blob_quads(&reader.blob()?)),
                source::FLATBED => params.flatbed = Some(blob_quads(&reader.blob()?)),
                par::COLOR_MODE => params.color_mode = Some(reader.quad()?),
                par::FORMAT => params.format = Some(reader.quad()?),
                par::JPEG_QUALITY => params.jpeg_quality = Some(reader.numeric()?),
                par::THRESHOLD => params.threshold = Some(reader.numeric()?),
                par::DITHER => params.dither = Some(reader.quad()?),
                par::GAMMA_MODE => params.gamma_mode = Some(reader.quad()?),
                par::GAMMA_TABLE => params.gamma_table = Some(reader.blob()?),
                par::COLOR_MATRIX => {
                    // a blob marker right after the token means a custom
                    // matrix; any other continuation means identity
                    params.color_matrix = if reader.peek_blob() {
                        Some(ColorMatrix::Custom(reader.blob()?))
                    } else {
                        Some(ColorMatrix::Unit)
                    };
                }
                par::SHARPNESS => params.sharpness = Some(reader.numeric()?),
                par::MIRRORING => params.mirroring = decode_switch(reader.quad()?),
                par::BUFFER_SIZE => params.buffer_size = Some(reader.positive()?),
                par::PAGE_COUNT => params.page_count = Some(reader.positive()?),
                par::RESOLUTION_MAIN => params.resolution_main = Some(reader.positive()?),
                par::RESOLUTION_SUB => params.resolution_sub = Some(reader.positive()?),
                par::CROP => params.crop = decode_switch(reader.quad()?),
                par::ACQUISITION => params.acquisition = Some(decode_rect(&mut reader)?),
                par::FILL_COLOR => params.fill_color = Some(reader.quad()?),
                par::FILL_AREA => params.fill_area = Some(decode_rect(&mut reader)?),
                par::QUIET => params.quiet = decode_switch(reader.quad()?),
                par::LAMINATION => params.lamination = decode_switch(reader.quad()?),
                _ => unreachable!("recognizer admitted an unhandled token"),
            }
        }

        Ok(params)
    }

    /// Encode the set fields, omitting everything unset.
    ///
    /// The identity color matrix goes out as the bare `CMX ` token.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        for (token, flags) in [
            (source::ADF, &self.adf),
            (source::TPU, &self.tpu),
            (source::FLATBED, &self.flatbed),
        ] {
            if let Some(flags) = flags {
                buf.put_slice(token.as_bytes());
                let mut raw = Vec::with_capacity(flags.len() * 4);
                for quad in flags {
                    raw.extend_from_slice(quad.as_bytes());
                }
                format::put_blob(buf, &raw)?;
            }
        }

        put_quad(buf, par::COLOR_MODE, self.color_mode);
        put_quad(buf, par::FORMAT, self.format);
        put_numeric_field(buf, par::JPEG_QUALITY, self.jpeg_quality)?;
        put_numeric_field(buf, par::THRESHOLD, self.threshold)?;
        put_quad(buf, par::DITHER, self.dither);
        put_quad(buf, par::GAMMA_MODE, self.gamma_mode);
        if let Some(table) = &self.gamma_table {
            buf.put_slice(par::GAMMA_TABLE.as_bytes());
            format::put_blob(buf, table)?;
        }
        match &self.color_matrix {
            Some(ColorMatrix::Unit) => buf.put_slice(par::COLOR_MATRIX.as_bytes()),
            Some(ColorMatrix::Custom(raw)) => {
                buf.put_slice(par::COLOR_MATRIX.as_bytes());
                format::put_blob(buf, raw)?;
            }
            None => {}
        }
        put_numeric_field(buf, par::SHARPNESS, self.sharpness)?;
        put_switch(buf, par::MIRRORING, self.mirroring);
        put_positive_field(buf, par::BUFFER_SIZE, self.buffer_size)?;
        put_positive_field(buf, par::PAGE_COUNT, self.page_count)?;
        put_positive_field(buf, par::RESOLUTION_MAIN, self.resolution_main)?;
        put_positive_field(buf, par::RESOLUTION_SUB, self.resolution_sub)?;
        put_switch(buf, par::CROP, self.crop);
        if let Some(rect) = self.acquisition {
            buf.put_slice(par::ACQUISITION.as_bytes());
            put_rect(buf, rect)?;
        }
        put_quad(buf, par::FILL_COLOR, self.fill_color);
        if let Some(rect) = self.fill_area {
            buf.put_slice(par::FILL_AREA.as_bytes());
            put_rect(buf, rect)?;
        }
        put_switch(buf, par::QUIET, self.quiet);
        put_switch(buf, par::LAMINATION, self.lamination);
        Ok(())
    }

    /// The selected document source, if any.
    #[must_use]
    pub fn source(&self) -> Option<DocumentSource> {
        if self.adf.is_some() {
            Some(DocumentSource::Adf)
        } else if self.tpu.is_some() {
            Some(DocumentSource::Tpu)
        } else if self.flatbed.is_some() {
            Some(DocumentSource::Flatbed)
        } else {
            None
        }
    }

    /// Select a document source, clearing any previously selected one.
    pub fn set_source(&mut self, source: DocumentSource, flags: Vec<Quad>) {
        self.adf = None;
        self.tpu = None;
        self.flatbed = None;
        match source {
            DocumentSource::Adf => self.adf = Some(flags),
            DocumentSource::Tpu => self.tpu = Some(flags),
            DocumentSource::Flatbed => self.flatbed = Some(flags),
        }
    }

    /// Whether the selected source scans both sheet sides.
    #[must_use]
    pub fn is_duplex(&self) -> bool {
        self.adf
            .as_ref()
            .is_some_and(|flags| flags.contains(&source::FLAG_DUPLEX))
    }

    /// Check the exactly-one-source invariant of a full parameter set.
    ///
    /// # Errors
    /// Returns `Error::ProtocolViolation` when zero or several sources are
    /// selected.
    pub fn validate(&self) -> Result<()> {
        let count = [&self.adf, &self.tpu, &self.flatbed]
            .iter()
            .filter(|s| s.is_some())
            .count();
        if count != 1 {
            return Err(Error::ProtocolViolation {
                message: format!("expected exactly one document source, found {}", count),
            });
        }
        Ok(())
    }
}

fn decode_switch(value: Quad) -> Option<bool> {
    match value {
        par::ON => Some(true),
        par::OFF => Some(false),
        other => {
            warn!(value = %other, "unrecognized switch value, leaving unset");
            None
        }
    }
}

fn decode_rect(reader: &mut TokenReader<'_>) -> Result<[u32; 4]> {
    Ok([
        reader.positive()?,
        reader.positive()?,
        reader.positive()?,
        reader.positive()?,
    ])
}

fn put_rect(buf: &mut BytesMut, rect: [u32; 4]) -> Result<()> {
    for value in rect {
        format::put_numeric(buf, value as i32)?;
    }
    Ok(())
}

fn put_quad(buf: &mut BytesMut, token: Quad, value: Option<Quad>) {
    if let Some(value) = value {
        buf.put_slice(token.as_bytes());
        buf.put_slice(value.as_bytes());
    }
}

fn put_switch(buf: &mut BytesMut, token: Quad, value: Option<bool>) {
    put_quad(
        buf,
        token,
        value.map(|on| if on { par::ON } else { par::OFF }),
    );
}

fn put_numeric_field(buf: &mut BytesMut, token: Quad, value: Option<i32>) -> Result<()> {
    if let Some(value) = value {
        buf.put_slice(token.as_bytes());
        format::put_numeric(buf, value)?;
    }
    Ok(())
}

fn put_positive_field(buf: &mut BytesMut, token: Quad, value: Option<u32>) -> Result<()> {
    if let Some(value) = value {
        buf.put_slice(token.as_bytes());
        format::put_numeric(buf, value as i32)?;
    }
    Ok(())
}

fn is_params_tag(q: Quad) -> bool {
    matches!(q, source::ADF | source::TPU | source::FLATBED)
        || matches!(
            q,
            par::COLOR_MODE
                | par::FORMAT
                | par::JPEG_QUALITY
                | par::THRESHOLD
                | par::DITHER
                | par::GAMMA_MODE
                | par::GAMMA_TABLE
                | par::COLOR_MATRIX
                | par::SHARPNESS
                | par::MIRRORING
                | par::BUFFER_SIZE
                | par::PAGE_COUNT
                | par::RESOLUTION_MAIN
                | par::RESOLUTION_SUB
                | par::CROP
                | par::ACQUISITION
                | par::FILL_COLOR
                | par::FILL_AREA
                | par::QUIET
                | par::LAMINATION
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn full_set() -> Parameters {
        let mut params = Parameters::default();
        params.set_source(DocumentSource::Adf, vec![source::FLAG_DUPLEX]);
        params.color_mode = Some(par::COL_COLOR_24);
        params.format = Some(par::FMT_JPEG);
        params.jpeg_quality = Some(85);
        params.gamma_mode = Some(par::GMM_GAMMA_22);
        params.color_matrix = Some(ColorMatrix::Unit);
        params.sharpness = Some(-1);
        params.buffer_size = Some(262_144);
        params.page_count = Some(0);
        params.resolution_main = Some(300);
        params.resolution_sub = Some(300);
        params.acquisition = Some([0, 0, 2550, 3500]);
        params.quiet = Some(true);
        params
    }

    #[test]
    fn test_round_trip() {
        let params = full_set();
        let mut buf = BytesMut::new();
        params.encode(&mut buf).unwrap();

        let decoded = Parameters::decode(&buf).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_unit_matrix_is_token_alone() {
        let mut params = Parameters::default();
        params.color_matrix = Some(ColorMatrix::Unit);

        let mut buf = BytesMut::new();
        params.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], par::COLOR_MATRIX.as_bytes());

        let decoded = Parameters::decode(&buf).unwrap();
        assert_eq!(decoded.color_matrix, Some(ColorMatrix::Unit));
    }

    #[test]
    fn test_custom_matrix_round_trip() {
        let raw = Bytes::from_static(&[0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90]);
        let mut params = Parameters::default();
        params.color_matrix = Some(ColorMatrix::Custom(raw.clone()));

        let mut buf = BytesMut::new();
        params.encode(&mut buf).unwrap();
        let decoded = Parameters::decode(&buf).unwrap();
        assert_eq!(decoded.color_matrix, Some(ColorMatrix::Custom(raw)));
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let params = Parameters::default();
        let mut buf = BytesMut::new();
        params.encode(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_set_source_is_exclusive() {
        let mut params = Parameters::default();
        params.set_source(DocumentSource::Flatbed, vec![]);
        params.set_source(DocumentSource::Adf, vec![source::FLAG_DUPLEX]);

        assert_eq!(params.source(), Some(DocumentSource::Adf));
        assert!(params.flatbed.is_none());
        assert!(params.is_duplex());
        params.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_one_source() {
        let params = Parameters::default();
        assert!(params.validate().is_err());

        let mut both = Parameters::default();
        both.adf = Some(vec![]);
        both.flatbed = Some(vec![]);
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_source_only_subset_equality() {
        // a subset reply carrying only the source field equals a Parameters
        // constructed with just that field
        let mut expected = Parameters::default();
        expected.adf = Some(vec![source::FLAG_DUPLEX]);

        let mut buf = BytesMut::new();
        expected.encode(&mut buf).unwrap();
        let decoded = Parameters::decode(&buf).unwrap();

        assert_eq!(decoded, expected);
        assert_eq!(decoded.source(), Some(DocumentSource::Adf));
    }
}
