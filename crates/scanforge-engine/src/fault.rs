//! Classification of reply error lists into hard faults.
//!
//! A reply's `#err` entries name a location and a condition. This module
//! maps conditions onto the [`Fault`] taxonomy and picks the one to
//! surface when several arrive together: authentication problems first,
//! then permission, then any mechanical fault, and a plain media-out last
//! because it usually just means the feeder ran empty.

use scanforge_core::{Fault, Quad};
use tracing::debug;

use scanforge_protocol::token::err;

/// Map one error condition quad onto the fault taxonomy.
///
/// Unrecognized conditions become [`Fault::DeviceError`]: an unknown
/// hard error is still a hard error.
#[must_use]
pub fn fault_of(what: Quad) -> Fault {
    match what {
        err::WHAT_AUTH_REQUIRED => Fault::AuthenticationRequired,
        err::WHAT_PERMISSION => Fault::PermissionRequired,
        err::WHAT_COVER_OPEN => Fault::CoverOpen,
        err::WHAT_MEDIA_JAM => Fault::MediaJam,
        err::WHAT_DOUBLE_FEED => Fault::DoubleFeed,
        err::WHAT_LAMP_FAULT => Fault::LampFault,
        err::WHAT_LOCK => Fault::LockFault,
        err::WHAT_SENSOR_FAULT => Fault::SensorFault,
        err::WHAT_BATTERY_LOW => Fault::BatteryLow,
        err::WHAT_MEDIA_OUT => Fault::MediaOut,
        _ => Fault::DeviceError,
    }
}

/// Pick the fault to surface from a reply's error list.
///
/// Returns `None` for an empty list. With several entries, the lowest
/// [`Fault::rank`] wins; ties keep wire order.
#[must_use]
pub fn classify(errors: &[(Quad, Quad)]) -> Option<Fault> {
    let fault = errors
        .iter()
        .map(|&(_, what)| fault_of(what))
        .min_by_key(Fault::rank)?;
    debug!(?fault, entries = errors.len(), "classified device errors");
    Some(fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_list_is_no_fault() {
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn test_single_condition() {
        let errors = vec![(err::PART_ADF, err::WHAT_MEDIA_JAM)];
        assert_eq!(classify(&errors), Some(Fault::MediaJam));
    }

    #[test]
    fn test_authentication_outranks_everything() {
        let errors = vec![
            (err::PART_ADF, err::WHAT_MEDIA_JAM),
            (err::PART_DEVICE, err::WHAT_AUTH_REQUIRED),
            (err::PART_DEVICE, err::WHAT_PERMISSION),
        ];
        assert_eq!(classify(&errors), Some(Fault::AuthenticationRequired));
    }

    #[test]
    fn test_media_out_ranks_last() {
        let errors = vec![
            (err::PART_ADF, err::WHAT_MEDIA_OUT),
            (err::PART_ADF, err::WHAT_COVER_OPEN),
        ];
        assert_eq!(classify(&errors), Some(Fault::CoverOpen));
    }

    #[test]
    fn test_unknown_condition_is_device_error() {
        let errors = vec![(err::PART_DEVICE, Quad::new(*b"WAT "))];
        assert_eq!(classify(&errors), Some(Fault::DeviceError));
    }
}
