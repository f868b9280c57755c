//! Compile-time shader feature switches.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Switches that select shader variants. Each one becomes a
    /// `#define` in front of the shader source.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderFeatures: u32 {
        /// Primitive may have a non axis-aligned transform.
        const TRANSFORM = 1 << 0;
        /// Primitive is masked by a clip task.
        const CLIP = 1 << 1;
        /// Gradients are dithered.
        const DITHERING = 1 << 2;
        /// YUV uses the Rec.601 matrix.
        const YUV_REC601 = 1 << 3;
        /// YUV uses the Rec.709 matrix.
        const YUV_REC709 = 1 << 4;
        /// YUV planes are interleaved in one texture.
        const INTERLEAVED_Y_CB_CR = 1 << 5;
        /// YUV is NV12 (Y plane plus interleaved CbCr plane).
        const NV12 = 1 << 6;
        /// Target is Direct3D 11 (HLSL data layout).
        const DX11 = 1 << 7;
    }
}

const DEFINES: [(ShaderFeatures, &str); 8] = [
    (ShaderFeatures::TRANSFORM, "WR_FEATURE_TRANSFORM"),
    (ShaderFeatures::CLIP, "WR_FEATURE_CLIP"),
    (ShaderFeatures::DITHERING, "WR_FEATURE_DITHERING"),
    (ShaderFeatures::YUV_REC601, "WR_FEATURE_YUV_REC601"),
    (ShaderFeatures::YUV_REC709, "WR_FEATURE_YUV_REC709"),
    (ShaderFeatures::INTERLEAVED_Y_CB_CR, "WR_FEATURE_INTERLEAVED_Y_CB_CR"),
    (ShaderFeatures::NV12, "WR_FEATURE_NV12"),
    (ShaderFeatures::DX11, "WR_DX11"),
];

/// Pairs that cannot be enabled together.
const EXCLUSIVE: [(ShaderFeatures, ShaderFeatures); 2] = [
    (ShaderFeatures::YUV_REC601, ShaderFeatures::YUV_REC709),
    (ShaderFeatures::INTERLEAVED_Y_CB_CR, ShaderFeatures::NV12),
];

impl ShaderFeatures {
    /// Preprocessor name of a single flag.
    #[must_use]
    pub fn define_name(self) -> Option<&'static str> {
        DEFINES
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, name)| *name)
    }

    /// Reject mutually exclusive combinations.
    ///
    /// # Errors
    ///
    /// [`Error::ConflictingFeatures`] naming the first clashing pair.
    pub fn validate(self) -> Result<Self> {
        for (a, b) in EXCLUSIVE {
            if self.contains(a | b) {
                return Err(Error::ConflictingFeatures(
                    a.define_name().unwrap_or_default(),
                    b.define_name().unwrap_or_default(),
                ));
            }
        }
        Ok(self)
    }

    /// Define names of every enabled flag, in bit order.
    #[must_use]
    pub fn defines(self) -> Vec<&'static str> {
        self.iter().filter_map(Self::define_name).collect()
    }

    /// `#define` lines to put in front of a shader.
    #[must_use]
    pub fn prefix(self) -> String {
        self.defines()
            .into_iter()
            .map(|name| format!("#define {name}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flag_has_a_define() {
        for flag in ShaderFeatures::all().iter() {
            assert!(flag.define_name().is_some(), "{flag:?}");
        }
    }

    #[test]
    fn defines_match_switches() {
        let features = ShaderFeatures::CLIP | ShaderFeatures::DITHERING;
        assert_eq!(features.defines(), ["WR_FEATURE_CLIP", "WR_FEATURE_DITHERING"]);
        assert_eq!(
            features.prefix(),
            "#define WR_FEATURE_CLIP\n#define WR_FEATURE_DITHERING\n"
        );
        assert!(ShaderFeatures::empty().prefix().is_empty());
    }

    #[test]
    fn exclusive_pairs_are_rejected() {
        assert!(matches!(
            (ShaderFeatures::YUV_REC601 | ShaderFeatures::YUV_REC709).validate(),
            Err(Error::ConflictingFeatures("WR_FEATURE_YUV_REC601", "WR_FEATURE_YUV_REC709"))
        ));
        assert!((ShaderFeatures::NV12 | ShaderFeatures::INTERLEAVED_Y_CB_CR)
            .validate()
            .is_err());
        assert!((ShaderFeatures::NV12 | ShaderFeatures::YUV_REC709 | ShaderFeatures::CLIP)
            .validate()
            .is_ok());
    }
}
