//! Token vocabulary of the compound protocol.
//!
//! Tokens are grouped per functional area, one flat constant set each.
//! The groups are dictionaries, nothing more: codecs match on the constants
//! and treat anything unrecognized as "skip and log". Each group exposes a
//! `name()` lookup used in diagnostics so traces read `#pst (page start)`
//! instead of raw bytes.

use scanforge_core::Quad;

/// Four NUL bytes: padding inside a status area, terminates a field scan.
pub const PAD: Quad = Quad::new([0, 0, 0, 0]);

/// Request codes sent by the driver, echoed back in reply headers.
pub mod request {
    use scanforge_core::Quad;

    /// Release the connection; the only way out of a compound session.
    pub const FINISH: Quad = Quad::new(*b"FIN ");
    /// Abort the current acquisition.
    pub const CANCEL: Quad = Quad::new(*b"CAN ");
    /// Fetch the static device information block.
    pub const INFORMATION: Quad = Quad::new(*b"INFO");
    /// Fetch/restrict capabilities for both sides.
    pub const CAPABILITIES: Quad = Quad::new(*b"CAPA");
    /// Fetch/restrict capabilities for the flip side only.
    pub const CAPABILITIES_FLIP: Quad = Quad::new(*b"CAPB");
    /// Set scan parameters for both sides.
    pub const SET_PARAMETERS: Quad = Quad::new(*b"PARA");
    /// Set scan parameters for the flip side only.
    pub const SET_PARAMETERS_FLIP: Quad = Quad::new(*b"PARB");
    /// Get scan parameters for both sides, full or token subset.
    pub const GET_PARAMETERS: Quad = Quad::new(*b"RESA");
    /// Get scan parameters for the flip side only.
    pub const GET_PARAMETERS_FLIP: Quad = Quad::new(*b"RESB");
    /// Fetch transient hardware status.
    pub const STATUS: Quad = Quad::new(*b"STAT");
    /// Run a mechanics action (feeder motion, focus, initialize).
    pub const MECHANICS: Quad = Quad::new(*b"MECH");
    /// Start image acquisition.
    pub const START_SCAN: Quad = Quad::new(*b"TRDT");
    /// Fetch the next chunk of image data.
    pub const IMAGE: Quad = Quad::new(*b"IMG ");
    /// Run a vendor extension payload.
    pub const EXTENSION: Quad = Quad::new(*b"EXT0");

    /// Reply-only code: the device did not recognize the request.
    pub const UNKNOWN: Quad = Quad::new(*b"UNKN");
    /// Reply-only code: the request is not valid in the current state.
    pub const INVALID: Quad = Quad::new(*b"INVD");

    pub fn name(code: Quad) -> Option<&'static str> {
        Some(match code {
            FINISH => "finish",
            CANCEL => "cancel",
            INFORMATION => "get information",
            CAPABILITIES => "capabilities",
            CAPABILITIES_FLIP => "capabilities (flip side)",
            SET_PARAMETERS => "set parameters",
            SET_PARAMETERS_FLIP => "set parameters (flip side)",
            GET_PARAMETERS => "get parameters",
            GET_PARAMETERS_FLIP => "get parameters (flip side)",
            STATUS => "hardware status",
            MECHANICS => "mechanics",
            START_SCAN => "start scan",
            IMAGE => "image data",
            EXTENSION => "extension",
            UNKNOWN => "unknown request",
            INVALID => "invalid request",
            _ => return None,
        })
    }
}

/// Tags of the per-reply status area.
pub mod status {
    use scanforge_core::Quad;

    /// Error entry: followed by a part quad and a what quad. May repeat.
    pub const ERROR: Quad = Quad::new(*b"#err");
    /// Device not ready: followed by a reason quad.
    pub const NOT_READY: Quad = Quad::new(*b"#nrd");
    /// Page start: followed by width, padding, height numerics.
    pub const PAGE_START: Quad = Quad::new(*b"#pst");
    /// Page end: followed by width, padding, height numerics.
    pub const PAGE_END: Quad = Quad::new(*b"#pen");
    /// Images left to transfer: followed by a count.
    pub const IMAGES_LEFT: Quad = Quad::new(*b"#lft");
    /// Side the current image belongs to.
    pub const SIDE: Quad = Quad::new(*b"#sid");
    /// Attention flag, notably cancel confirmation.
    pub const ATTENTION: Quad = Quad::new(*b"#atn");
    /// Result of a parameter-setting request.
    pub const PARAMETER_RESULT: Quad = Quad::new(*b"#par");
    /// Detected document type.
    pub const DOCUMENT_TYPE: Quad = Quad::new(*b"#typ");

    // not-ready reasons
    pub const NRD_NONE: Quad = Quad::new(*b"NONE");
    pub const NRD_BUSY: Quad = Quad::new(*b"BUSY");
    pub const NRD_WARMING_UP: Quad = Quad::new(*b"WUP ");
    pub const NRD_RESERVED: Quad = Quad::new(*b"RSVD");

    // attention values
    pub const ATN_NONE: Quad = Quad::new(*b"NONE");
    pub const ATN_CANCELLED: Quad = Quad::new(*b"CAN ");

    // parameter results
    pub const PAR_OK: Quad = Quad::new(*b"OK  ");
    pub const PAR_FAIL: Quad = Quad::new(*b"FAIL");
    pub const PAR_LOST: Quad = Quad::new(*b"LOST");

    // sides
    pub const SID_FACE: Quad = Quad::new(*b"FACE");
    pub const SID_REAR: Quad = Quad::new(*b"REAR");

    // document types
    pub const TYP_STANDARD: Quad = Quad::new(*b"STD ");
    pub const TYP_CARRIER_SHEET: Quad = Quad::new(*b"CRST");

    pub fn name(tag: Quad) -> Option<&'static str> {
        Some(match tag {
            ERROR => "error",
            NOT_READY => "not ready",
            PAGE_START => "page start",
            PAGE_END => "page end",
            IMAGES_LEFT => "images left",
            SIDE => "side",
            ATTENTION => "attention",
            PARAMETER_RESULT => "parameter result",
            DOCUMENT_TYPE => "document type",
            _ => return None,
        })
    }
}

/// Error location and condition quads used in `#err` entries and in the
/// hardware status error list.
pub mod err {
    use scanforge_core::Quad;

    // parts
    pub const PART_DEVICE: Quad = Quad::new(*b"DEV ");
    pub const PART_ADF: Quad = Quad::new(*b"ADF ");
    pub const PART_TPU: Quad = Quad::new(*b"TPU ");
    pub const PART_FLATBED: Quad = Quad::new(*b"FB  ");

    // conditions
    pub const WHAT_COVER_OPEN: Quad = Quad::new(*b"OPN ");
    pub const WHAT_MEDIA_JAM: Quad = Quad::new(*b"PJ  ");
    pub const WHAT_MEDIA_OUT: Quad = Quad::new(*b"PE  ");
    pub const WHAT_DEVICE_ERROR: Quad = Quad::new(*b"ERR ");
    pub const WHAT_LAMP_FAULT: Quad = Quad::new(*b"LTF ");
    pub const WHAT_LOCK: Quad = Quad::new(*b"LOCK");
    pub const WHAT_DOUBLE_FEED: Quad = Quad::new(*b"DFED");
    pub const WHAT_SENSOR_FAULT: Quad = Quad::new(*b"DTCL");
    pub const WHAT_AUTH_REQUIRED: Quad = Quad::new(*b"AUTH");
    pub const WHAT_PERMISSION: Quad = Quad::new(*b"PERM");
    pub const WHAT_BATTERY_LOW: Quad = Quad::new(*b"BTLO");

    pub fn name(what: Quad) -> Option<&'static str> {
        Some(match what {
            WHAT_COVER_OPEN => "cover open",
            WHAT_MEDIA_JAM => "media jam",
            WHAT_MEDIA_OUT => "media out",
            WHAT_DEVICE_ERROR => "device error",
            WHAT_LAMP_FAULT => "lamp fault",
            WHAT_LOCK => "lock engaged",
            WHAT_DOUBLE_FEED => "double feed",
            WHAT_SENSOR_FAULT => "sensor fault",
            WHAT_AUTH_REQUIRED => "authentication required",
            WHAT_PERMISSION => "permission required",
            WHAT_BATTERY_LOW => "battery low",
            _ => return None,
        })
    }
}

/// Document source tokens and per-source option flags.
pub mod source {
    use scanforge_core::Quad;

    pub const ADF: Quad = Quad::new(*b"ADF ");
    pub const TPU: Quad = Quad::new(*b"TPU ");
    pub const FLATBED: Quad = Quad::new(*b"FB  ");

    /// Duplex scanning supported/selected.
    pub const FLAG_DUPLEX: Quad = Quad::new(*b"DPLX");
    /// Source detects the page end during the scan.
    pub const FLAG_PAGE_END_DETECT: Quad = Quad::new(*b"PEDT");
    /// Source supports an explicit load action.
    pub const FLAG_LOAD: Quad = Quad::new(*b"LOAD");
    /// Source supports an explicit eject action.
    pub const FLAG_EJECT: Quad = Quad::new(*b"EJCT");
}

/// Tags of the device information block.
pub mod info {
    use scanforge_core::Quad;

    /// Maximum image extent: two positive numerics, width then height.
    pub const MAX_IMAGE: Quad = Quad::new(*b"IMX ");
    /// Push button count.
    pub const PUSH_BUTTON: Quad = Quad::new(*b"PB  ");
    /// Product name blob.
    pub const PRODUCT: Quad = Quad::new(*b"PRD ");
    /// Firmware version blob.
    pub const VERSION: Quad = Quad::new(*b"VER ");
    /// Device-side buffer size.
    pub const BUFFER_SIZE: Quad = Quad::new(*b"DSZ ");
    /// Supported extension request codes, as a blob of quads.
    pub const EXTENSIONS: Quad = Quad::new(*b"EXT ");
    /// Flag: the device truncates trailing data at the detected media end.
    pub const TRUNCATES: Quad = Quad::new(*b"DLS ");
    /// Serial number blob.
    pub const SERIAL: Quad = Quad::new(*b"SN  ");
}

/// Scan parameter tokens, shared by the capability and parameter codecs.
pub mod parameter {
    use scanforge_core::Quad;

    pub const COLOR_MODE: Quad = Quad::new(*b"COL ");
    pub const FORMAT: Quad = Quad::new(*b"FMT ");
    pub const JPEG_QUALITY: Quad = Quad::new(*b"JPG ");
    pub const THRESHOLD: Quad = Quad::new(*b"THR ");
    pub const DITHER: Quad = Quad::new(*b"DTH ");
    pub const GAMMA_MODE: Quad = Quad::new(*b"GMM ");
    pub const GAMMA_TABLE: Quad = Quad::new(*b"GMT ");
    pub const COLOR_MATRIX: Quad = Quad::new(*b"CMX ");
    pub const SHARPNESS: Quad = Quad::new(*b"SFL ");
    pub const MIRRORING: Quad = Quad::new(*b"MRR ");
    pub const BUFFER_SIZE: Quad = Quad::new(*b"BSZ ");
    pub const PAGE_COUNT: Quad = Quad::new(*b"PAG ");
    pub const RESOLUTION_MAIN: Quad = Quad::new(*b"RSM ");
    pub const RESOLUTION_SUB: Quad = Quad::new(*b"RSS ");
    pub const CROP: Quad = Quad::new(*b"CRP ");
    pub const ACQUISITION: Quad = Quad::new(*b"ACQ ");
    pub const FILL_COLOR: Quad = Quad::new(*b"FLC ");
    pub const FILL_AREA: Quad = Quad::new(*b"FLA ");
    pub const QUIET: Quad = Quad::new(*b"QIT ");
    pub const LAMINATION: Quad = Quad::new(*b"LAM ");

    // color modes
    pub const COL_COLOR_24: Quad = Quad::new(*b"C024");
    pub const COL_COLOR_48: Quad = Quad::new(*b"C048");
    pub const COL_MONO_8: Quad = Quad::new(*b"M008");
    pub const COL_MONO_1: Quad = Quad::new(*b"M001");

    // transfer formats
    pub const FMT_RAW: Quad = Quad::new(*b"RAW ");
    pub const FMT_JPEG: Quad = Quad::new(*b"JPG ");

    // dither patterns
    pub const DTH_NONE: Quad = Quad::new(*b"NONE");
    pub const DTH_PATTERN_A: Quad = Quad::new(*b"MIDA");
    pub const DTH_PATTERN_B: Quad = Quad::new(*b"MIDB");

    // gamma modes
    pub const GMM_LINEAR: Quad = Quad::new(*b"UG10");
    pub const GMM_GAMMA_18: Quad = Quad::new(*b"UG18");
    pub const GMM_GAMMA_22: Quad = Quad::new(*b"UG22");

    // color matrix selector listed in capabilities
    pub const CMX_UNIT: Quad = Quad::new(*b"UNIT");

    // border fill colors
    pub const FLC_WHITE: Quad = Quad::new(*b"WH  ");
    pub const FLC_BLACK: Quad = Quad::new(*b"BK  ");

    // boolean values
    pub const ON: Quad = Quad::new(*b"ON  ");
    pub const OFF: Quad = Quad::new(*b"OFF ");

    pub fn name(token: Quad) -> Option<&'static str> {
        Some(match token {
            COLOR_MODE => "color mode",
            FORMAT => "transfer format",
            JPEG_QUALITY => "jpeg quality",
            THRESHOLD => "threshold",
            DITHER => "dither",
            GAMMA_MODE => "gamma mode",
            GAMMA_TABLE => "gamma table",
            COLOR_MATRIX => "color matrix",
            SHARPNESS => "sharpness",
            MIRRORING => "mirroring",
            BUFFER_SIZE => "buffer size",
            PAGE_COUNT => "page count",
            RESOLUTION_MAIN => "main resolution",
            RESOLUTION_SUB => "sub resolution",
            CROP => "crop",
            ACQUISITION => "acquisition area",
            FILL_COLOR => "border fill color",
            FILL_AREA => "border fill area",
            QUIET => "quiet mode",
            LAMINATION => "lamination",
            _ => return None,
        })
    }
}

/// Capability constraint sub-tokens.
pub mod capability {
    use scanforge_core::Quad;

    /// Inclusive range: two numerics follow, lower then upper.
    pub const RANGE: Quad = Quad::new(*b"RANG");
    /// Enumerated list: a positive count then that many values.
    pub const LIST: Quad = Quad::new(*b"LIST");
}

/// Tags of the transient hardware status block.
pub mod hw {
    use scanforge_core::Quad;

    /// Detected media size per source: blob of (source, size) quad pairs.
    pub const MEDIA_SIZE: Quad = Quad::new(*b"PSZ ");
    /// Errors per source: blob of (part, what) quad pairs.
    pub const ERROR: Quad = Quad::new(*b"ERR ");
    /// Focus position.
    pub const FOCUS: Quad = Quad::new(*b"FCS ");
    /// Push button bit field, hexadecimal.
    pub const PUSH_BUTTON: Quad = Quad::new(*b"PB  ");
    /// Separation (single-feed) mode.
    pub const SEPARATION: Quad = Quad::new(*b"SEP ");
    /// Battery state.
    pub const BATTERY: Quad = Quad::new(*b"BAT ");
    /// Card slot state.
    pub const CARD_SLOT: Quad = Quad::new(*b"CSL ");

    // media sizes
    pub const SIZE_A3: Quad = Quad::new(*b"A3  ");
    pub const SIZE_A4: Quad = Quad::new(*b"A4  ");
    pub const SIZE_A5: Quad = Quad::new(*b"A5  ");
    pub const SIZE_B4: Quad = Quad::new(*b"B4  ");
    pub const SIZE_B5: Quad = Quad::new(*b"B5  ");
    pub const SIZE_LETTER: Quad = Quad::new(*b"LT  ");
    pub const SIZE_LEGAL: Quad = Quad::new(*b"LG  ");
    pub const SIZE_POSTCARD: Quad = Quad::new(*b"PC  ");
    pub const SIZE_UNKNOWN: Quad = Quad::new(*b"UNKN");

    // battery states
    pub const BAT_OK: Quad = Quad::new(*b"OK  ");
    pub const BAT_LOW: Quad = Quad::new(*b"LOW ");
}

/// Mechanics action tokens.
pub mod mech {
    use scanforge_core::Quad;

    /// Feeder motion: followed by one of the action quads below.
    pub const ADF: Quad = Quad::new(*b"ADF ");
    /// Focus motion: followed by `AUTO`, or `MANU` and a position.
    pub const FOCUS: Quad = Quad::new(*b"FCS ");
    /// Re-initialize the device.
    pub const INITIALIZE: Quad = Quad::new(*b"INI ");

    pub const ADF_LOAD: Quad = Quad::new(*b"LOAD");
    pub const ADF_EJECT: Quad = Quad::new(*b"EJCT");
    pub const ADF_CLEAN: Quad = Quad::new(*b"CLEN");
    pub const ADF_CALIBRATE: Quad = Quad::new(*b"CALB");

    pub const FOCUS_AUTO: Quad = Quad::new(*b"AUTO");
    pub const FOCUS_MANUAL: Quad = Quad::new(*b"MANU");
}
