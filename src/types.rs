//! Basic value types shared by the packer, the fetchers and the backends.

use bytemuck::{Pod, Zeroable};
use lyon::geom::euclid;
use lyon::math::{point, size};

pub use lyon::math::{Point, Size, Vector};

/// A 4×4 layer transform, using the row-vector convention of euclid.
///
/// Its 16 floats in `to_array()` order are exactly the four columns the
/// shaders see as a GLSL `mat4`.
pub type LayerTransform = euclid::default::Transform3D<f32>;

/// One RGBA32F texel: the unit of storage in every data texture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TexelQuad(pub [f32; 4]);

impl TexelQuad {
    /// All zeros.
    pub const ZERO: Self = Self([0.0; 4]);

    /// Build from four components.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self([x, y, z, w])
    }

    /// Compare bit patterns, so NaN payloads and signed zeros count.
    #[must_use]
    pub fn bits_eq(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// `.xy` swizzle as a point.
    #[must_use]
    pub fn xy(&self) -> Point {
        point(self.0[0], self.0[1])
    }

    /// `.zw` swizzle as a point.
    #[must_use]
    pub fn zw(&self) -> Point {
        point(self.0[2], self.0[3])
    }
}

impl From<[f32; 4]> for TexelQuad {
    fn from(v: [f32; 4]) -> Self {
        Self(v)
    }
}

impl From<ColorF> for TexelQuad {
    fn from(c: ColorF) -> Self {
        Self([c.r, c.g, c.b, c.a])
    }
}

impl From<RectWithSize> for TexelQuad {
    fn from(r: RectWithSize) -> Self {
        Self([r.p0.x, r.p0.y, r.size.width, r.size.height])
    }
}

/// A rectangle as the shaders store it: origin and size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RectWithSize {
    /// Top-left corner.
    pub p0: Point,
    /// Extent.
    pub size: Size,
}

impl RectWithSize {
    /// Build from origin and size components.
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            p0: point(x, y),
            size: size(width, height),
        }
    }

    /// The empty rectangle at the origin.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Bottom-right corner.
    #[must_use]
    pub fn p1(&self) -> Point {
        self.p0 + self.size.to_vector()
    }

    /// Decode from a `(p0.xy, size.wh)` quad.
    #[must_use]
    pub fn from_quad(q: TexelQuad) -> Self {
        Self::new(q.0[0], q.0[1], q.0[2], q.0[3])
    }

    /// Encode as a `(p0.xy, p1.xy)` quad, the endpoint form used by clip
    /// bounds and sub-rects.
    #[must_use]
    pub fn to_endpoints(&self) -> TexelQuad {
        let p1 = self.p1();
        TexelQuad::new(self.p0.x, self.p0.y, p1.x, p1.y)
    }

    /// Whether the rectangle covers no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }
}

/// A straight-alpha float color.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ColorF {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl ColorF {
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Build from components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color channels multiplied by alpha.
    #[must_use]
    pub fn premultiplied(self) -> Self {
        Self::new(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    /// Decode from a quad.
    #[must_use]
    pub fn from_quad(q: TexelQuad) -> Self {
        Self::new(q.0[0], q.0[1], q.0[2], q.0[3])
    }

    /// Components as an array.
    #[must_use]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Component-wise linear interpolation, GLSL `mix`.
    #[must_use]
    pub fn mix(self, other: Self, t: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }
}

/// Per-frame uniforms every primitive program reads.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameUniforms {
    /// `uTransform`: device pixels to clip space.
    pub transform: LayerTransform,
    /// `uDevicePixelRatio`.
    pub device_pixel_ratio: f32,
}

impl FrameUniforms {
    /// Orthographic projection for a render target of `width × height`
    /// device pixels, origin top-left.
    #[must_use]
    pub fn ortho(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        let transform = LayerTransform::ortho(0.0, width, height, 0.0, -1_000_000.0, 1_000_000.0);
        Self {
            transform,
            device_pixel_ratio,
        }
    }
}

/// GLSL `mat4 * vec4` for a transform stored in column order.
#[must_use]
pub fn transform_vec4(m: &LayerTransform, v: [f32; 4]) -> [f32; 4] {
    let a = m.to_array();
    let mut out = [0.0; 4];
    for (row, slot) in out.iter_mut().enumerate() {
        *slot = (0..4).map(|col| a[4 * col + row] * v[col]).sum();
    }
    out
}

/// Split a transform into the four column quads it is stored as.
#[must_use]
pub fn transform_to_quads(m: &LayerTransform) -> [TexelQuad; 4] {
    let a = m.to_array();
    [
        TexelQuad::new(a[0], a[1], a[2], a[3]),
        TexelQuad::new(a[4], a[5], a[6], a[7]),
        TexelQuad::new(a[8], a[9], a[10], a[11]),
        TexelQuad::new(a[12], a[13], a[14], a[15]),
    ]
}

/// Rebuild a transform from four column quads.
#[must_use]
pub fn transform_from_quads(q: &[TexelQuad]) -> LayerTransform {
    let mut a = [0.0; 16];
    for (col, quad) in q.iter().take(4).enumerate() {
        a[4 * col..4 * col + 4].copy_from_slice(&quad.0);
    }
    LayerTransform::from_array(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_vec4_matches_euclid() {
        let m = LayerTransform::translation(10.0, -4.0, 0.0).then_scale(2.0, 3.0, 1.0);
        let out = transform_vec4(&m, [1.0, 2.0, 0.0, 1.0]);
        let expected = m.transform_point2d_homogeneous(point(1.0, 2.0));
        assert!((out[0] - expected.x).abs() < 1e-6);
        assert!((out[1] - expected.y).abs() < 1e-6);
        assert!((out[3] - expected.w).abs() < 1e-6);
        assert!((out[0] - 22.0).abs() < 1e-6);
        assert!((out[1] + 6.0).abs() < 1e-6);
    }

    #[test]
    fn transform_quads_are_columns() {
        let m = LayerTransform::translation(5.0, 6.0, 7.0);
        let quads = transform_to_quads(&m);
        // Translation lives in the fourth column.
        assert_eq!(quads[3], TexelQuad::new(5.0, 6.0, 7.0, 1.0));
        assert_eq!(transform_from_quads(&quads), m);
    }

    #[test]
    fn rect_endpoints() {
        let r = RectWithSize::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(r.to_endpoints(), TexelQuad::new(1.0, 2.0, 4.0, 6.0));
        assert_eq!(RectWithSize::from_quad(TexelQuad::from(r)), r);
        assert!(RectWithSize::zero().is_empty());
    }

    #[test]
    fn premultiply_scales_color_only() {
        let c = ColorF::new(1.0, 0.5, 0.25, 0.5).premultiplied();
        assert_eq!(c, ColorF::new(0.5, 0.25, 0.125, 0.5));
    }
}
