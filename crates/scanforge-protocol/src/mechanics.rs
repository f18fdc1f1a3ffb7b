//! Mechanical action request payloads.
//!
//! Mechanics requests ask the device to move something: feed or eject a
//! sheet, run a cleaning or calibration cycle, adjust focus, or
//! re-initialize. They are encode-only; the reply carries nothing but the
//! usual status area.

use bytes::{BufMut, BytesMut};
use scanforge_core::Result;

use crate::format;
use crate::token::mech;

/// One mechanical action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanicsAction {
    /// Feed a sheet into the scan position.
    AdfLoad,
    /// Eject the current sheet.
    AdfEject,
    /// Run the feeder cleaning cycle.
    AdfClean,
    /// Run the feeder calibration cycle.
    AdfCalibrate,
    /// Autofocus.
    FocusAuto,
    /// Move focus to an explicit position.
    FocusManual(i32),
    /// Re-initialize the device.
    Initialize,
}

impl MechanicsAction {
    /// Encode the request payload for this action.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            MechanicsAction::AdfLoad => put_adf(buf, mech::ADF_LOAD),
            MechanicsAction::AdfEject => put_adf(buf, mech::ADF_EJECT),
            MechanicsAction::AdfClean => put_adf(buf, mech::ADF_CLEAN),
            MechanicsAction::AdfCalibrate => put_adf(buf, mech::ADF_CALIBRATE),
            MechanicsAction::FocusAuto => {
                buf.put_slice(mech::FOCUS.as_bytes());
                buf.put_slice(mech::FOCUS_AUTO.as_bytes());
            }
            MechanicsAction::FocusManual(position) => {
                buf.put_slice(mech::FOCUS.as_bytes());
                buf.put_slice(mech::FOCUS_MANUAL.as_bytes());
                format::put_numeric(buf, *position)?;
            }
            MechanicsAction::Initialize => buf.put_slice(mech::INITIALIZE.as_bytes()),
        }
        Ok(())
    }
}

fn put_adf(buf: &mut BytesMut, action: scanforge_core::Quad) {
    buf.put_slice(mech::ADF.as_bytes());
    buf.put_slice(action.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adf_actions() {
        let mut buf = BytesMut::new();
        MechanicsAction::AdfEject.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], b"ADF EJCT");
    }

    #[test]
    fn test_focus_manual_carries_position() {
        let mut buf = BytesMut::new();
        MechanicsAction::FocusManual(-40).encode(&mut buf).unwrap();
        assert_eq!(&buf[..8], b"FCS MANU");
        assert_eq!(&buf[8..], b"i-000040");
    }

    #[test]
    fn test_initialize_is_bare_token() {
        let mut buf = BytesMut::new();
        MechanicsAction::Initialize.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], b"INI ");
    }
}
