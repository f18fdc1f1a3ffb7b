//! Transient hardware status codec.
//!
//! Unlike [`crate::info::Information`], which is read once per connection,
//! the hardware status block reflects the device right now: what media the
//! sensors see, per-source error conditions, focus, buttons, battery.

use scanforge_core::{Quad, Result};
use tracing::warn;

use crate::reader::TokenReader;
use crate::token::{hw as tag, parameter as par};

/// Snapshot of the device's transient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareStatus {
    /// Detected media size per source, as `(source, size)` quad pairs.
    pub media: Vec<(Quad, Quad)>,
    /// Error conditions per source, as `(part, what)` quad pairs.
    pub errors: Vec<(Quad, Quad)>,
    /// Focus position, negative values being below the glass plane.
    pub focus: Option<i32>,
    /// Push button states as a bit field.
    pub push_buttons: Option<u32>,
    /// Separation (single-feed) mode engaged.
    pub separation: Option<bool>,
    /// Battery state quad.
    pub battery: Option<Quad>,
    /// Card inserted in the card slot.
    pub card_slot: Option<bool>,
}

impl HardwareStatus {
    /// Decode a hardware status payload.
    pub fn decode(payload: &[u8]) -> Result<HardwareStatus> {
        let mut hw = HardwareStatus::default();
        let mut reader = TokenReader::new(payload);

        while let Some(token) = reader.next_token(is_hw_tag) {
            match token {
                tag::MEDIA_SIZE => hw.media = quad_pairs(&reader.blob()?),
                tag::ERROR => hw.errors = quad_pairs(&reader.blob()?),
                tag::FOCUS => hw.focus = Some(reader.numeric()?),
                tag::PUSH_BUTTON => {
                    hw.push_buttons = Some(reader.hexadecimal()? as u32);
                }
                tag::SEPARATION => hw.separation = decode_switch(reader.quad()?),
                tag::BATTERY => hw.battery = Some(reader.quad()?),
                tag::CARD_SLOT => hw.card_slot = decode_switch(reader.quad()?),
                _ => unreachable!("recognizer admitted an unhandled tag"),
            }
        }

        Ok(hw)
    }

    /// Detected media size for a source, if the device reported one.
    #[must_use]
    pub fn media_size(&self, source: Quad) -> Option<Quad> {
        self.media
            .iter()
            .find(|&&(s, _)| s == source)
            .map(|&(_, size)| size)
    }

    /// Whether a specific button in the bit field is pressed.
    #[must_use]
    pub fn button_pressed(&self, index: u32) -> bool {
        self.push_buttons
            .is_some_and(|bits| bits & (1 << index) != 0)
    }
}

fn decode_switch(value: Quad) -> Option<bool> {
    match value {
        par::ON => Some(true),
        par::OFF => Some(false),
        other => {
            warn!(value = %other, "unrecognized switch value in hardware status");
            None
        }
    }
}

fn quad_pairs(data: &[u8]) -> Vec<(Quad, Quad)> {
    data.chunks_exact(8)
        .map(|c| {
            (
                Quad::new([c[0], c[1], c[2], c[3]]),
                Quad::new([c[4], c[5], c[6], c[7]]),
            )
        })
        .collect()
}

fn is_hw_tag(q: Quad) -> bool {
    matches!(
        q,
        tag::MEDIA_SIZE
            | tag::ERROR
            | tag::FOCUS
            | tag::PUSH_BUTTON
            | tag::SEPARATION
            | tag::BATTERY
            | tag::CARD_SLOT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format;
    use crate::token::{err, source};
    use bytes::{BufMut, BytesMut};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_hardware_status() {
        let mut buf = BytesMut::new();
        buf.put_slice(tag::MEDIA_SIZE.as_bytes());
        let mut media = Vec::new();
        media.extend_from_slice(source::ADF.as_bytes());
        media.extend_from_slice(tag::SIZE_A4.as_bytes());
        media.extend_from_slice(source::FLATBED.as_bytes());
        media.extend_from_slice(tag::SIZE_UNKNOWN.as_bytes());
        format::put_blob(&mut buf, &media).unwrap();

        buf.put_slice(tag::ERROR.as_bytes());
        let mut errors = Vec::new();
        errors.extend_from_slice(err::PART_ADF.as_bytes());
        errors.extend_from_slice(err::WHAT_COVER_OPEN.as_bytes());
        format::put_blob(&mut buf, &errors).unwrap();

        buf.put_slice(tag::FOCUS.as_bytes());
        format::put_numeric(&mut buf, -20).unwrap();

        buf.put_slice(tag::PUSH_BUTTON.as_bytes());
        format::put_hexadecimal(&mut buf, 0b101).unwrap();

        buf.put_slice(tag::BATTERY.as_bytes());
        buf.put_slice(tag::BAT_LOW.as_bytes());

        let hw = HardwareStatus::decode(&buf).unwrap();
        assert_eq!(hw.media_size(source::ADF), Some(tag::SIZE_A4));
        assert_eq!(hw.media_size(source::FLATBED), Some(tag::SIZE_UNKNOWN));
        assert_eq!(hw.media_size(source::TPU), None);
        assert_eq!(hw.errors, vec![(err::PART_ADF, err::WHAT_COVER_OPEN)]);
        assert_eq!(hw.focus, Some(-20));
        assert!(hw.button_pressed(0));
        assert!(!hw.button_pressed(1));
        assert!(hw.button_pressed(2));
        assert_eq!(hw.battery, Some(tag::BAT_LOW));
        assert_eq!(hw.separation, None);
    }

    #[test]
    fn test_empty_payload() {
        let hw = HardwareStatus::decode(&[]).unwrap();
        assert_eq!(hw, HardwareStatus::default());
        assert!(!hw.button_pressed(0));
    }
}
