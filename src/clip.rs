//! Per-fragment clip masking against the A8 mask atlas.

use image::GrayImage;

use crate::records::ClipArea;
use crate::types::{Point, TexelQuad};

/// The varyings `write_clip` hands to the fragment stage.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClipVaryings {
    /// `vClipMaskUv`: normalized uv plus atlas layer.
    pub uv: [f32; 3],
    /// `vClipMaskUvBounds`: normalized `(p0.xy, p1.xy)` of the mask.
    pub uv_bounds: TexelQuad,
}

/// An 8-bit mask array texture, one image per layer, all the same size.
#[derive(Clone, Debug)]
pub struct ClipMaskAtlas {
    layers: Vec<GrayImage>,
    width: u32,
    height: u32,
}

impl ClipMaskAtlas {
    /// An atlas with `layer_count` cleared layers.
    #[must_use]
    pub fn new(width: u32, height: u32, layer_count: usize) -> Self {
        Self {
            layers: vec![GrayImage::new(width, height); layer_count.max(1)],
            width,
            height,
        }
    }

    /// Texture size, like `textureSize(sCacheA8, 0).xy`.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of array layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Mutable access to one layer, for the clip tasks that render masks.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut GrayImage> {
        self.layers.get_mut(index)
    }

    /// All layers, for upload.
    #[must_use]
    pub fn layers(&self) -> &[GrayImage] {
        &self.layers
    }

    /// Nearest-texel lookup at a normalized uv, clamped to the edge, as a
    /// unit float.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn sample(&self, uv: [f32; 3]) -> f32 {
        let layer_index = uv[2].round().max(0.0) as usize;
        let Some(layer) = self.layers.get(layer_index) else {
            return 0.0;
        };
        let texel = |coord: f32, size: u32| {
            ((coord * size as f32).floor().max(0.0) as u32).min(size.saturating_sub(1))
        };
        let pixel = layer.get_pixel(texel(uv[0], self.width), texel(uv[1], self.height));
        f32::from(pixel.0[0]) / 255.0
    }
}

/// Mask coordinates for a fragment at `global_pos` (device pixels).
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn write_clip(global_pos: Point, area: &ClipArea, mask_size: (u32, u32)) -> ClipVaryings {
    let (w, h) = (mask_size.0 as f32, mask_size.1 as f32);
    let [bx0, by0, bx1, by1] = area.task_bounds.0;
    let [ox, oy, layer, _] = area.screen_origin_target_index.0;
    let u = global_pos.x + bx0 - ox;
    let v = global_pos.y + by0 - oy;
    ClipVaryings {
        uv: [u / w, v / h, layer],
        uv_bounds: TexelQuad::new(bx0 / w, by0 / h, bx1 / w, by1 / h),
    }
}

/// Clip coverage for a fragment.
///
/// Zero-area bounds, which is what the unclipped sentinel produces, pass
/// without sampling, whether they collapse to a point or a line. Fragments
/// outside the bounds are fully clipped.
#[must_use]
pub fn do_clip(varyings: &ClipVaryings, atlas: &ClipMaskAtlas) -> f32 {
    let [x0, y0, x1, y1] = varyings.uv_bounds.0;
    if x0 >= x1 || y0 >= y1 {
        return 1.0;
    }
    let [u, v, _] = varyings.uv;
    let inside = x0 <= u && y0 <= v && u <= x1 && v <= y1;
    if inside {
        atlas.sample(varyings.uv)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RenderTaskData;
    use crate::types::RectWithSize;
    use image::Luma;
    use lyon::math::point;

    fn atlas_with_square() -> ClipMaskAtlas {
        let mut atlas = ClipMaskAtlas::new(64, 64, 2);
        if let Some(layer) = atlas.layer_mut(1) {
            for y in 16..32 {
                for x in 16..32 {
                    layer.put_pixel(x, y, Luma([255]));
                }
            }
            layer.put_pixel(20, 20, Luma([51]));
        }
        atlas
    }

    #[test]
    fn sentinel_area_always_passes() {
        let atlas = ClipMaskAtlas::new(4, 4, 1);
        let varyings = write_clip(point(100.0, 100.0), &ClipArea::NONE, atlas.size());
        assert_eq!(do_clip(&varyings, &atlas), 1.0);
    }

    #[test]
    fn zero_area_bounds_pass_without_sampling() {
        // An empty layer would clip anything it was sampled for.
        let atlas = ClipMaskAtlas::new(4, 4, 1);
        for bounds in [
            TexelQuad::new(0.25, 0.1, 0.25, 0.9),
            TexelQuad::new(0.1, 0.5, 0.9, 0.5),
            TexelQuad::new(0.75, 0.75, 0.25, 0.25),
        ] {
            let varyings = ClipVaryings {
                uv: [0.25, 0.5, 0.0],
                uv_bounds: bounds,
            };
            assert_eq!(do_clip(&varyings, &atlas), 1.0, "bounds {bounds:?}");
        }
    }

    #[test]
    fn mask_is_read_relative_to_the_task() {
        let atlas = atlas_with_square();
        // Mask occupies target pixels 16..32 of layer 1 and covers screen
        // pixels 200..216.
        let area = ClipArea::from(RenderTaskData::clip(
            RectWithSize::new(16.0, 16.0, 16.0, 16.0),
            point(200.0, 200.0),
            1.0,
            RectWithSize::zero(),
        ));
        let inside = write_clip(point(208.5, 208.5), &area, atlas.size());
        assert_eq!(do_clip(&inside, &atlas), 1.0);
        let dim = write_clip(point(204.5, 204.5), &area, atlas.size());
        assert!((do_clip(&dim, &atlas) - 0.2).abs() < 1e-6);
        let outside = write_clip(point(150.0, 208.0), &area, atlas.size());
        assert_eq!(do_clip(&outside, &atlas), 0.0);
    }
}
