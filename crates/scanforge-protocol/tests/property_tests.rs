//! Property-based tests for the wire format primitives.
//!
//! These tests use proptest to generate random in-range values and verify
//! the codec contracts: encode∘decode is identity, encoded sizes keep their
//! alignment guarantees, and out-of-range values fail to encode instead of
//! wrapping or clamping.

use bytes::{BufMut, BytesMut};
use proptest::prelude::*;

use scanforge_core::Quad;
use scanforge_protocol::format;
use scanforge_protocol::{Header, Status};

/// Strategy for values the decimal format covers.
fn decimal_value() -> impl Strategy<Value = i32> {
    0i32..=999
}

/// Strategy for values the integer format covers.
fn integer_value() -> impl Strategy<Value = i32> {
    -999_999i32..=9_999_999
}

/// Strategy for values the hexadecimal format covers.
fn hexadecimal_value() -> impl Strategy<Value = i64> {
    0i64..=0x0FFF_FFFF
}

/// Strategy for valid header sizes.
fn header_size() -> impl Strategy<Value = u32> {
    0u32..=0x0FFF_FFFF
}

/// Strategy for printable token bytes.
fn token() -> impl Strategy<Value = Quad> {
    prop::array::uniform4(0x20u8..0x7f).prop_map(Quad::new)
}

proptest! {
    /// Property: decimal round-trips for every in-range value.
    #[test]
    fn prop_decimal_roundtrip(value in decimal_value()) {
        let mut buf = BytesMut::new();
        format::put_decimal(&mut buf, value).unwrap();
        prop_assert_eq!(buf.len(), 4);
        prop_assert_eq!(format::get_decimal(&mut &buf[..]).unwrap(), value);
    }

    /// Property: integer round-trips for every in-range value.
    #[test]
    fn prop_integer_roundtrip(value in integer_value()) {
        let mut buf = BytesMut::new();
        format::put_integer(&mut buf, value).unwrap();
        prop_assert_eq!(buf.len(), 8);
        prop_assert_eq!(format::get_integer(&mut &buf[..]).unwrap(), value);
    }

    /// Property: hexadecimal round-trips for every in-range value.
    #[test]
    fn prop_hexadecimal_roundtrip(value in hexadecimal_value()) {
        let mut buf = BytesMut::new();
        format::put_hexadecimal(&mut buf, value).unwrap();
        prop_assert_eq!(buf.len(), 8);
        prop_assert_eq!(format::get_hexadecimal(&mut &buf[..]).unwrap(), value);
    }

    /// Property: the generic numeric encoder always produces something the
    /// generic decoder reads back unchanged.
    #[test]
    fn prop_numeric_roundtrip(value in integer_value()) {
        let mut buf = BytesMut::new();
        format::put_numeric(&mut buf, value).unwrap();
        prop_assert_eq!(format::get_numeric(&mut &buf[..]).unwrap(), value);
    }

    /// Property: out-of-range decimals fail encode and leave the buffer
    /// untouched; nothing is truncated to fit.
    #[test]
    fn prop_decimal_out_of_range_fails(value in 1000i32..) {
        let mut buf = BytesMut::new();
        prop_assert!(format::put_decimal(&mut buf, value).is_err());
        prop_assert!(buf.is_empty());
    }

    /// Property: blobs round-trip for any byte content and the encoded
    /// data-plus-padding stays a multiple of four bytes.
    #[test]
    fn prop_blob_roundtrip(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut buf = BytesMut::new();
        format::put_blob(&mut buf, &data).unwrap();
        prop_assert_eq!((buf.len() - 8) % 4, 0);

        let decoded = format::get_blob(&mut &buf[..]).unwrap();
        prop_assert_eq!(&decoded[..], &data[..]);
    }

    /// Property: headers round-trip for any token and valid size.
    #[test]
    fn prop_header_roundtrip(code in token(), size in header_size()) {
        let hdr = Header::new(code, size).unwrap();
        let wire = hdr.encode();
        prop_assert_eq!(wire.len(), 12);
        prop_assert_eq!(Header::decode(&wire).unwrap(), hdr);
    }

    /// Property: an unknown token injected between two known status fields
    /// never disturbs them and attributes nothing to itself.
    #[test]
    fn prop_status_skips_unknown_token(noise in token()) {
        use scanforge_protocol::token::status as tag;

        // avoid generating a quad that happens to be a real status tag
        prop_assume!(
            !matches!(
                noise,
                tag::ERROR | tag::NOT_READY | tag::PAGE_START | tag::PAGE_END
                    | tag::IMAGES_LEFT | tag::SIDE | tag::ATTENTION
                    | tag::PARAMETER_RESULT | tag::DOCUMENT_TYPE
            )
        );

        let mut buf = BytesMut::new();
        buf.put_slice(tag::IMAGES_LEFT.as_bytes());
        format::put_numeric(&mut buf, 2).unwrap();
        buf.put_slice(noise.as_bytes());
        buf.put_slice(tag::DOCUMENT_TYPE.as_bytes());
        buf.put_slice(tag::TYP_STANDARD.as_bytes());

        let status = Status::decode(&buf).unwrap();
        prop_assert_eq!(status.images_left, Some(2));
        prop_assert_eq!(status.document_type, Some(tag::TYP_STANDARD));
    }
}
