//! Per-model default overrides.
//!
//! Some models need corrections the firmware does not apply itself: a
//! different gamma exponent, a color profile matrix, a saner transfer
//! buffer default, or capabilities that are advertised but broken. These
//! used to be per-model subclasses upstream; here they are plain data
//! records selected by product name at session open.

use scanforge_core::Quad;
use scanforge_protocol::token::parameter as par;
use scanforge_protocol::{Capabilities, Parameters};
use tracing::debug;

/// Constructor-time overrides for one device model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    /// Product name as reported in the information block.
    pub product: &'static str,
    /// Gamma exponent correction, if the model needs one.
    pub gamma_exponent: Option<f64>,
    /// 3×3 color profile matrix, row major, if the model needs one.
    pub color_profile: Option<[[f64; 3]; 3]>,
    /// Transfer buffer size to use instead of the firmware default.
    pub buffer_size: Option<u32>,
    /// Parameter tokens to blank from the advertised capabilities.
    pub disabled_capabilities: &'static [Quad],
}

impl ModelProfile {
    /// Apply this profile to freshly negotiated state.
    pub fn apply(&self, caps: &mut Capabilities, params: &mut Parameters) {
        for &token in self.disabled_capabilities {
            caps.clear(token);
        }
        if let Some(size) = self.buffer_size {
            if params.buffer_size.is_none() {
                params.buffer_size = Some(size);
            }
        }
        debug!(product = self.product, "applied model profile");
    }
}

/// Select the profile for a product name, if one exists.
#[must_use]
pub fn lookup(product: &str) -> Option<&'static ModelProfile> {
    PROFILES.iter().find(|p| p.product == product)
}

static PROFILES: &[ModelProfile] = &[
    // quality-engineering overrides collected from field reports; models
    // not listed here run with firmware defaults
    ModelProfile {
        product: "PX-1400",
        gamma_exponent: Some(1.8),
        color_profile: None,
        buffer_size: Some(262_144),
        disabled_capabilities: &[],
    },
    ModelProfile {
        product: "PX-870",
        gamma_exponent: None,
        color_profile: Some([
            [1.0231, -0.0176, -0.0055],
            [-0.0143, 1.0217, -0.0074],
            [-0.0022, -0.0411, 1.0433],
        ]),
        buffer_size: None,
        disabled_capabilities: &[par::LAMINATION],
    },
    ModelProfile {
        product: "DS-560W",
        gamma_exponent: None,
        color_profile: None,
        buffer_size: Some(65_536),
        // firmware advertises threshold control it does not honor in
        // color modes
        disabled_capabilities: &[par::THRESHOLD],
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scanforge_protocol::Constraint;

    #[test]
    fn test_lookup_known_product() {
        let profile = lookup("PX-1400").unwrap();
        assert_eq!(profile.buffer_size, Some(262_144));
    }

    #[test]
    fn test_lookup_unknown_product() {
        assert!(lookup("UNLISTED-9000").is_none());
    }

    #[test]
    fn test_apply_disables_capabilities() {
        let profile = lookup("DS-560W").unwrap();

        let mut caps = Capabilities::default();
        caps.threshold = Some(Constraint::Range {
            lower: 0,
            upper: 255,
        });
        let mut params = Parameters::default();

        profile.apply(&mut caps, &mut params);
        assert!(caps.threshold.is_none());
        assert_eq!(params.buffer_size, Some(65_536));
    }

    #[test]
    fn test_apply_keeps_explicit_buffer_size() {
        let profile = lookup("PX-1400").unwrap();

        let mut caps = Capabilities::default();
        let mut params = Parameters::default();
        params.buffer_size = Some(4096);

        profile.apply(&mut caps, &mut params);
        assert_eq!(params.buffer_size, Some(4096));
    }
}
