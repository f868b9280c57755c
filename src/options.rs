//! Renderer configuration.

use crate::error::Result;
use crate::features::ShaderFeatures;
use crate::types::ColorF;

/// Settings shared by the packers and the backends.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererOptions {
    /// Device pixels per layer unit, uploaded as `uDevicePixelRatio`.
    pub device_pixel_ratio: f32,
    /// Feature switches compiled into every program.
    pub features: ShaderFeatures,
    /// Row limit of each data texture.
    pub max_cache_rows: usize,
    /// Color the render target is cleared to.
    pub clear_color: ColorF,
    /// Whether gradients are dithered. Toggles
    /// [`ShaderFeatures::DITHERING`].
    pub enable_dithering: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            features: ShaderFeatures::empty(),
            max_cache_rows: 1024,
            clear_color: ColorF::TRANSPARENT,
            enable_dithering: true,
        }
    }
}

impl RendererOptions {
    /// Set the device pixel ratio.
    #[must_use]
    pub fn with_device_pixel_ratio(mut self, device_pixel_ratio: f32) -> Self {
        self.device_pixel_ratio = device_pixel_ratio;
        self
    }

    /// Add feature switches.
    #[must_use]
    pub fn with_features(mut self, features: ShaderFeatures) -> Self {
        self.features |= features;
        self
    }

    /// Features with the dithering toggle applied, validated.
    ///
    /// # Errors
    ///
    /// Fails if mutually exclusive features are enabled.
    pub fn shader_features(&self) -> Result<ShaderFeatures> {
        let mut features = self.features;
        features.set(ShaderFeatures::DITHERING, self.enable_dithering);
        features.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dithering_toggle_wins() {
        let mut options = RendererOptions::default().with_features(ShaderFeatures::CLIP);
        assert_eq!(
            options.shader_features().unwrap(),
            ShaderFeatures::CLIP | ShaderFeatures::DITHERING
        );
        options.enable_dithering = false;
        options.features |= ShaderFeatures::DITHERING;
        assert_eq!(options.shader_features().unwrap(), ShaderFeatures::CLIP);
    }

    #[test]
    fn conflicts_surface_as_errors() {
        let options = RendererOptions::default()
            .with_features(ShaderFeatures::YUV_REC601 | ShaderFeatures::YUV_REC709);
        assert!(options.shader_features().is_err());
    }
}
