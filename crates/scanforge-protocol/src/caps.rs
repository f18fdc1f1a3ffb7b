//! Capability block codec.
//!
//! Capabilities describe the value space of every scan parameter as either
//! an inclusive range or an enumerated list. The device reports one block
//! for both sides and, on duplex hardware, a second block restricting the
//! flip side. The driver may also send a capability block back to restrict
//! what the device offers.

use bytes::{BufMut, BytesMut};
use scanforge_core::{Error, Quad, Result};

use crate::format;
use crate::reader::{TokenReader, blob_quads};
use crate::token::{capability, parameter as par, source};

/// Value space of one scan parameter.
///
/// Every use site matches all three shapes; there is no downcasting and no
/// fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Inclusive numeric range.
    Range { lower: i32, upper: i32 },
    /// Enumerated numeric values.
    Numbers(Vec<i32>),
    /// Enumerated token values.
    Tokens(Vec<Quad>),
}

impl Constraint {
    /// Whether a numeric value is inside this constraint.
    #[must_use]
    pub fn allows_number(&self, value: i32) -> bool {
        match self {
            Constraint::Range { lower, upper } => (*lower..=*upper).contains(&value),
            Constraint::Numbers(values) => values.contains(&value),
            Constraint::Tokens(_) => false,
        }
    }

    /// Whether a token value is inside this constraint.
    #[must_use]
    pub fn allows_token(&self, token: Quad) -> bool {
        match self {
            Constraint::Range { .. } | Constraint::Numbers(_) => false,
            Constraint::Tokens(tokens) => tokens.contains(&token),
        }
    }
}

/// Which value shape a parameter token carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Number,
    Token,
}

fn value_kind(token: Quad) -> Option<ValueKind> {
    match token {
        par::COLOR_MODE
        | par::FORMAT
        | par::DITHER
        | par::GAMMA_MODE
        | par::GAMMA_TABLE
        | par::COLOR_MATRIX
        | par::MIRRORING
        | par::CROP
        | par::FILL_COLOR
        | par::QUIET
        | par::LAMINATION => Some(ValueKind::Token),
        par::JPEG_QUALITY
        | par::THRESHOLD
        | par::SHARPNESS
        | par::BUFFER_SIZE
        | par::PAGE_COUNT
        | par::RESOLUTION_MAIN
        | par::RESOLUTION_SUB
        | par::ACQUISITION
        | par::FILL_AREA => Some(ValueKind::Number),
        _ => None,
    }
}

/// Constrainable value space for every scan parameter.
///
/// Absent fields mean the device does not expose that parameter at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Source option flags the device supports per source.
    pub adf: Option<Vec<Quad>>,
    pub tpu: Option<Vec<Quad>>,
    pub flatbed: Option<Vec<Quad>>,

    pub color_modes: Option<Constraint>,
    pub formats: Option<Constraint>,
    pub jpeg_quality: Option<Constraint>,
    pub threshold: Option<Constraint>,
    pub dither: Option<Constraint>,
    pub gamma_modes: Option<Constraint>,
    pub gamma_tables: Option<Constraint>,
    pub color_matrices: Option<Constraint>,
    pub sharpness: Option<Constraint>,
    pub mirroring: Option<Constraint>,
    pub buffer_size: Option<Constraint>,
    pub page_count: Option<Constraint>,
    pub resolution_main: Option<Constraint>,
    pub resolution_sub: Option<Constraint>,
    pub crop: Option<Constraint>,
    pub acquisition: Option<Constraint>,
    pub fill_color: Option<Constraint>,
    pub fill_area: Option<Constraint>,
    pub quiet: Option<Constraint>,
    pub lamination: Option<Constraint>,
}

impl Capabilities {
    /// Decode a capability payload.
    pub fn decode(payload: &[u8]) -> Result<Capabilities> {
        let mut caps = Capabilities::default();
        let mut reader = TokenReader::new(payload);

        while let Some(token) = reader.next_token(is_caps_tag) {
            match token {
                source::ADF => caps.adf = Some(blob_quads(&reader.blob()?)),
                source::TPU => caps.tpu = Some(blob_quads(&reader.blob()?)),
                source::FLATBED => caps.flatbed = Some(blob_quads(&reader.blob()?)),
                _ => {
                    let kind = value_kind(token)
                        .expect("recognizer admitted an unhandled parameter token");
                    let constraint = decode_constraint(&mut reader, kind)?;
                    *caps
                        .field_mut(token)
                        .expect("parameter token without a capability field") = Some(constraint);
                }
            }
        }

        Ok(caps)
    }

    /// Encode the present fields, in a fixed field order.
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

        for (token, constraint) in self.fields() {
            if let Some(constraint) = constraint {
                buf.put_slice(token.as_bytes());
                encode_constraint(buf, constraint)?;
            }
        }
        Ok(())
    }

    /// The constraint registered for a parameter token, if any.
    #[must_use]
    pub fn constraint(&self, token: Quad) -> Option<&Constraint> {
        self.fields()
            .into_iter()
            .find(|(t, _)| *t == token)
            .and_then(|(_, c)| c.as_ref())
    }

    /// Remove a parameter from the advertised value space.
    ///
    /// Used by per-model profiles to blank out capabilities the firmware
    /// advertises but the model cannot actually honor.
    pub fn clear(&mut self, token: Quad) {
        if let Some(field) = self.field_mut(token) {
            *field = None;
        }
    }

    fn fields(&self) -> [(Quad, &Option<Constraint>); 20] {
        [
            (par::COLOR_MODE, &self.color_modes),
            (par::FORMAT, &self.formats),
            (par::JPEG_QUALITY, &self.jpeg_quality),
            (par::THRESHOLD, &self.threshold),
            (par::DITHER, &self.dither),
            (par::GAMMA_MODE, &self.gamma_modes),
            (par::GAMMA_TABLE, &self.gamma_tables),
            (par::COLOR_MATRIX, &self.color_matrices),
            (par::SHARPNESS, &self.sharpness),
            (par::MIRRORING, &self.mirroring),
            (par::BUFFER_SIZE, &self.buffer_size),
            (par::PAGE_COUNT, &self.page_count),
            (par::RESOLUTION_MAIN, &self.resolution_main),
            (par::RESOLUTION_SUB, &self.resolution_sub),
            (par::CROP, &self.crop),
            (par::ACQUISITION, &self.acquisition),
            (par::FILL_COLOR, &self.fill_color),
            (par::FILL_AREA, &self.fill_area),
            (par::QUIET, &self.quiet),
            (par::LAMINATION, &self.lamination),
        ]
    }

    fn field_mut(&mut self, token: Quad) -> Option<&mut Option<Constraint>> {
        Some(match token {
            par::COLOR_MODE => &mut self.color_modes,
            par::FORMAT => &mut self.formats,
            par::JPEG_QUALITY => &mut self.jpeg_quality,
            par::THRESHOLD => &mut self.threshold,
            par::DITHER => &mut self.dither,
            par::GAMMA_MODE => &mut self.gamma_modes,
            par::GAMMA_TABLE => &mut self.gamma_tables,
            par::COLOR_MATRIX => &mut self.color_matrices,
            par::SHARPNESS => &mut self.sharpness,
            par::MIRRORING => &mut self.mirroring,
            par::BUFFER_SIZE => &mut self.buffer_size,
            par::PAGE_COUNT => &mut self.page_count,
            par::RESOLUTION_MAIN => &mut self.resolution_main,
            par::RESOLUTION_SUB => &mut self.resolution_sub,
            par::CROP => &mut self.crop,
            par::ACQUISITION => &mut self.acquisition,
            par::FILL_COLOR => &mut self.fill_color,
            par::FILL_AREA => &mut self.fill_area,
            par::QUIET => &mut self.quiet,
            par::LAMINATION => &mut self.lamination,
            _ => return None,
        })
    }
}

fn is_caps_tag(q: Quad) -> bool {
    matches!(q, source::ADF | source::TPU | source::FLATBED) || value_kind(q).is_some()
}

fn decode_constraint(reader: &mut TokenReader<'_>, kind: ValueKind) -> Result<Constraint> {
    let shape = reader.quad()?;
    match shape {
        capability::RANGE => {
            let lower = reader.numeric()?;
            let upper = reader.numeric()?;
            Ok(Constraint::Range { lower, upper })
        }
        capability::LIST => {
            let count = reader.positive()? as usize;
            match kind {
                ValueKind::Number => {
                    let mut values = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(reader.numeric()?);
                    }
                    Ok(Constraint::Numbers(values))
                }
                ValueKind::Token => {
                    let mut values = Vec::with_capacity(count);
                    for _ in 0..count {
                        values.push(reader.quad()?);
                    }
                    Ok(Constraint::Tokens(values))
                }
            }
        }
        other => Err(Error::InvalidFormat {
            message: format!("expected RANG or LIST constraint, got {}", other),
        }),
    }
}

fn encode_constraint(buf: &mut BytesMut, constraint: &Constraint) -> Result<()> {
    match constraint {
        Constraint::Range { lower, upper } => {
            buf.put_slice(capability::RANGE.as_bytes());
            format::put_numeric(buf, *lower)?;
            format::put_numeric(buf, *upper)?;
        }
        Constraint::Numbers(values) => {
            buf.put_slice(capability::LIST.as_bytes());
            format::put_numeric(buf, values.len() as i32)?;
            for value in values {
                format::put_numeric(buf, *value)?;
            }
        }
        Constraint::Tokens(values) => {
            buf.put_slice(capability::LIST.as_bytes());
            format::put_numeric(buf, values.len() as i32)?;
            for value in values {
                buf.put_slice(value.as_bytes());
            }
        }
    }
    Ok(())
}
