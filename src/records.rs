//! Record types stored in the data textures and their quad encodings.
//!
//! Every record implements [`GpuRecord`], which ties it to its
//! [`RecordLayout`] and provides both directions of the encoding. The field
//! order in `write_gpu_blocks` / `read_gpu_blocks` must follow the layout;
//! the tests below check each pair against it.

use crate::error::{Error, Result};
use crate::layout::{self, RecordLayout};
use crate::types::{
    transform_from_quads, transform_to_quads, transform_vec4, ColorF, LayerTransform, Point,
    RectWithSize, Size, TexelQuad,
};

/// A fixed-size record with a known quad layout.
pub trait GpuRecord: Sized {
    /// Canonical layout of the record.
    const LAYOUT: &'static RecordLayout;

    /// Quads this record occupies.
    const VECS: usize = Self::LAYOUT.vecs();

    /// Append exactly [`Self::VECS`] quads to `out`.
    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>);

    /// Decode from exactly [`Self::VECS`] quads.
    fn read_gpu_blocks(quads: &[TexelQuad]) -> Self;
}

/// Pack a small enum tag into a float component.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn pack_as_float(value: u32) -> f32 {
    value as f32
}

/// A scroll/transform layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackedLayer {
    /// Layer to world.
    pub transform: LayerTransform,
    /// World to layer; always the true inverse of `transform`.
    pub inv_transform: LayerTransform,
    /// Clip rect in layer space.
    pub local_clip_rect: RectWithSize,
}

impl PackedLayer {
    /// Build a layer, computing the inverse on the host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingularTransform`] if `transform` has no inverse.
    pub fn new(transform: LayerTransform, local_clip_rect: RectWithSize) -> Result<Self> {
        let inv_transform = transform.inverse().ok_or(Error::SingularTransform)?;
        Ok(Self {
            transform,
            inv_transform,
            local_clip_rect,
        })
    }

    /// Identity layer with the given clip.
    #[must_use]
    pub fn identity(local_clip_rect: RectWithSize) -> Self {
        Self {
            transform: LayerTransform::identity(),
            inv_transform: LayerTransform::identity(),
            local_clip_rect,
        }
    }
}

impl GpuRecord for PackedLayer {
    const LAYOUT: &'static RecordLayout = &layout::LAYER;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.extend_from_slice(&transform_to_quads(&self.transform));
        out.extend_from_slice(&transform_to_quads(&self.inv_transform));
        out.push(self.local_clip_rect.into());
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            transform: transform_from_quads(&q[0..4]),
            inv_transform: transform_from_quads(&q[4..8]),
            local_clip_rect: RectWithSize::from_quad(q[8]),
        }
    }
}

/// A layer that also carries the corners of its clip rect in world space.
///
/// Consumers that test coverage against the layer's screen footprint read
/// the corners directly instead of transforming the clip rect per vertex.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackedLayerWithScreenVertices {
    /// The canonical nine quads.
    pub layer: PackedLayer,
    /// `local_clip_rect` corners through `transform`, homogeneous, in
    /// unit-quad order: top-left, top-right, bottom-left, bottom-right.
    pub screen_vertices: [TexelQuad; 4],
}

impl PackedLayerWithScreenVertices {
    /// Project the corners of `layer`'s clip rect.
    #[must_use]
    pub fn new(layer: PackedLayer) -> Self {
        let rect = layer.local_clip_rect;
        let (p0, p1) = (rect.p0, rect.p1());
        let screen_vertices = [(p0.x, p0.y), (p1.x, p0.y), (p0.x, p1.y), (p1.x, p1.y)]
            .map(|(x, y)| TexelQuad(transform_vec4(&layer.transform, [x, y, 0.0, 1.0])));
        Self {
            layer,
            screen_vertices,
        }
    }
}

impl From<PackedLayer> for PackedLayerWithScreenVertices {
    fn from(layer: PackedLayer) -> Self {
        Self::new(layer)
    }
}

impl GpuRecord for PackedLayerWithScreenVertices {
    const LAYOUT: &'static RecordLayout = &layout::LAYER_WITH_SCREEN_VERTICES;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        self.layer.write_gpu_blocks(out);
        out.extend_from_slice(&self.screen_vertices);
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            layer: PackedLayer::read_gpu_blocks(&q[0..9]),
            screen_vertices: [q[9], q[10], q[11], q[12]],
        }
    }
}

/// Raw render task record. How the three quads are read depends on whether
/// the task is used as an alpha batch target or as a clip mask.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RenderTaskData {
    /// The three quads.
    pub data: [TexelQuad; 3],
}

impl RenderTaskData {
    /// An alpha-batch target region.
    #[must_use]
    pub fn alpha_batch(
        target_origin: Point,
        size: Size,
        screen_origin: Point,
        target_layer_index: f32,
    ) -> Self {
        Self {
            data: [
                TexelQuad::new(target_origin.x, target_origin.y, size.width, size.height),
                TexelQuad::new(screen_origin.x, screen_origin.y, target_layer_index, 0.0),
                TexelQuad::ZERO,
            ],
        }
    }

    /// A clip mask region. `task_bounds` is in target pixels; `inner_rect`
    /// is the area known to be fully inside the clip.
    #[must_use]
    pub fn clip(
        task_bounds: RectWithSize,
        screen_origin: Point,
        target_index: f32,
        inner_rect: RectWithSize,
    ) -> Self {
        Self {
            data: [
                task_bounds.to_endpoints(),
                TexelQuad::new(screen_origin.x, screen_origin.y, target_index, 0.0),
                inner_rect.to_endpoints(),
            ],
        }
    }

    /// Target region of an alpha-batch task as origin and size.
    #[must_use]
    pub fn target_rect(&self) -> RectWithSize {
        RectWithSize::from_quad(self.data[0])
    }
}

impl GpuRecord for RenderTaskData {
    const LAYOUT: &'static RecordLayout = &layout::RENDER_TASK;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.extend_from_slice(&self.data);
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            data: [q[0], q[1], q[2]],
        }
    }
}

/// Render task read as an alpha batch target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AlphaBatchTask {
    /// Where the task's region sits on screen.
    pub screen_space_origin: Point,
    /// Where the task's region sits in its render target.
    pub render_target_origin: Point,
    /// Region size.
    pub size: Size,
    /// Array layer of the render target.
    pub render_target_layer_index: f32,
}

impl From<RenderTaskData> for AlphaBatchTask {
    fn from(task: RenderTaskData) -> Self {
        let [data0, data1, _] = task.data;
        Self {
            render_target_origin: data0.xy(),
            size: Size::new(data0.0[2], data0.0[3]),
            screen_space_origin: data1.xy(),
            render_target_layer_index: data1.0[2],
        }
    }
}

/// Render task read as a clip mask area.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClipArea {
    /// `(p0.xy, p1.xy)` of the mask in its target.
    pub task_bounds: TexelQuad,
    /// `(screen_origin.xy, target_index, 0)`.
    pub screen_origin_target_index: TexelQuad,
    /// `(p0.xy, p1.xy)` of the fully-inside region.
    pub inner_rect: TexelQuad,
}

impl ClipArea {
    /// The all-pass area returned for the sentinel clip index.
    pub const NONE: Self = Self {
        task_bounds: TexelQuad::ZERO,
        screen_origin_target_index: TexelQuad::ZERO,
        inner_rect: TexelQuad::ZERO,
    };
}

impl From<RenderTaskData> for ClipArea {
    fn from(task: RenderTaskData) -> Self {
        let [task_bounds, screen_origin_target_index, inner_rect] = task.data;
        Self {
            task_bounds,
            screen_origin_target_index,
            inner_rect,
        }
    }
}

/// Local rect and local clip rect of a primitive.
///
/// Stored as the header at a primitive's resource-cache address, and in the
/// legacy per-primitive geometry table.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PrimitiveGeometry {
    /// Primitive bounds in layer space.
    pub local_rect: RectWithSize,
    /// Primitive clip in layer space.
    pub local_clip_rect: RectWithSize,
}

impl PrimitiveGeometry {
    /// Geometry whose clip is its own rect.
    #[must_use]
    pub fn unclipped(local_rect: RectWithSize) -> Self {
        Self {
            local_rect,
            local_clip_rect: local_rect,
        }
    }

    fn write(&self, out: &mut Vec<TexelQuad>) {
        out.push(self.local_rect.into());
        out.push(self.local_clip_rect.into());
    }

    fn read(q: &[TexelQuad]) -> Self {
        Self {
            local_rect: RectWithSize::from_quad(q[0]),
            local_clip_rect: RectWithSize::from_quad(q[1]),
        }
    }
}

impl GpuRecord for PrimitiveGeometry {
    const LAYOUT: &'static RecordLayout = &layout::PRIM_HEADER;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        self.write(out);
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self::read(q)
    }
}

/// Table entry wrapper for the legacy geometry table, which shares the
/// header's encoding but lives in its own texture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TableGeometry(pub PrimitiveGeometry);

impl GpuRecord for TableGeometry {
    const LAYOUT: &'static RecordLayout = &layout::PRIM_GEOMETRY;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        self.0.write(out);
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self(PrimitiveGeometry::read(q))
    }
}

/// Solid color rectangle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RectanglePrimitive {
    /// Premultiplied color.
    pub color: ColorF,
}

impl GpuRecord for RectanglePrimitive {
    const LAYOUT: &'static RecordLayout = &layout::RECTANGLE;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(self.color.into());
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            color: ColorF::from_quad(q[0]),
        }
    }
}

/// Text run header; its glyphs follow it in the cache.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextRunPrimitive {
    /// Premultiplied color.
    pub color: ColorF,
}

impl GpuRecord for TextRunPrimitive {
    const LAYOUT: &'static RecordLayout = &layout::TEXT_RUN;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(self.color.into());
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            color: ColorF::from_quad(q[0]),
        }
    }
}

/// Placement of one glyph relative to its run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlyphPrimitive {
    /// Offset from the run origin.
    pub offset: Point,
}

impl GpuRecord for GlyphPrimitive {
    const LAYOUT: &'static RecordLayout = &layout::GLYPH;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(TexelQuad::new(self.offset.x, self.offset.y, 0.0, 0.0));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self { offset: q[0].xy() }
    }
}

/// Region of a texture-cache page, in texels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResourceRect {
    /// Top-left texel.
    pub uv0: Point,
    /// Bottom-right texel.
    pub uv1: Point,
}

impl GpuRecord for ResourceRect {
    const LAYOUT: &'static RecordLayout = &layout::RESOURCE_RECT;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(TexelQuad::new(self.uv0.x, self.uv0.y, self.uv1.x, self.uv1.y));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            uv0: q[0].xy(),
            uv1: q[0].zw(),
        }
    }
}

/// YUV image; the planes are bound to `sColor0..2`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct YuvImagePrimitive {
    /// Stretch size in layer space.
    pub size: Size,
}

impl GpuRecord for YuvImagePrimitive {
    const LAYOUT: &'static RecordLayout = &layout::YUV_IMAGE;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(TexelQuad::new(self.size.width, self.size.height, 0.0, 0.0));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            size: Size::new(q[0].0[0], q[0].0[1]),
        }
    }
}

/// Tiled image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImagePrimitive {
    /// Size of one tile in layer space.
    pub stretch_size: Size,
    /// Gap between tiles.
    pub tile_spacing: Size,
    /// Sub-rect of the source image, endpoint form.
    pub sub_rect: RectWithSize,
}

impl GpuRecord for ImagePrimitive {
    const LAYOUT: &'static RecordLayout = &layout::IMAGE;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(TexelQuad::new(
            self.stretch_size.width,
            self.stretch_size.height,
            self.tile_spacing.width,
            self.tile_spacing.height,
        ));
        out.push(self.sub_rect.to_endpoints());
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        let [sx, sy, tx, ty] = q[0].0;
        let [x0, y0, x1, y1] = q[1].0;
        Self {
            stretch_size: Size::new(sx, sy),
            tile_spacing: Size::new(tx, ty),
            sub_rect: RectWithSize::new(x0, y0, x1 - x0, y1 - y0),
        }
    }
}

/// How a gradient continues outside `[0, 1]`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExtendMode {
    /// Clamp to the end colors.
    Clamp = 0,
    /// Wrap around.
    Repeat = 1,
}

impl ExtendMode {
    fn from_float(value: f32) -> Self {
        if value >= 0.5 {
            Self::Repeat
        } else {
            Self::Clamp
        }
    }
}

/// One color stop of an aligned gradient.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientStop {
    /// Straight-alpha color.
    pub color: ColorF,
    /// Position along the gradient line, `[0, 1]`.
    pub offset: f32,
}

impl GpuRecord for GradientStop {
    const LAYOUT: &'static RecordLayout = &layout::GRADIENT_STOP;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(self.color.premultiplied().into());
        out.push(TexelQuad::new(self.offset, 0.0, 0.0, 0.0));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            color: ColorF::from_quad(q[0]),
            offset: q[1].0[0],
        }
    }
}

/// Linear gradient header.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientPrimitive {
    /// Start of the gradient line.
    pub start_point: Point,
    /// End of the gradient line.
    pub end_point: Point,
    /// Tile size.
    pub tile_size: Size,
    /// Tile repeat counts.
    pub tile_repeat: Size,
    /// Extend mode.
    pub extend_mode: ExtendMode,
}

impl GpuRecord for GradientPrimitive {
    const LAYOUT: &'static RecordLayout = &layout::GRADIENT;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(TexelQuad::new(
            self.start_point.x,
            self.start_point.y,
            self.end_point.x,
            self.end_point.y,
        ));
        out.push(TexelQuad::new(
            self.tile_size.width,
            self.tile_size.height,
            self.tile_repeat.width,
            self.tile_repeat.height,
        ));
        out.push(TexelQuad::new(
            pack_as_float(self.extend_mode as u32),
            0.0,
            0.0,
            0.0,
        ));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            start_point: q[0].xy(),
            end_point: q[0].zw(),
            tile_size: Size::new(q[1].0[0], q[1].0[1]),
            tile_repeat: Size::new(q[1].0[2], q[1].0[3]),
            extend_mode: ExtendMode::from_float(q[2].0[0]),
        }
    }
}

/// Radial gradient header.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RadialGradientPrimitive {
    /// Center of the start circle.
    pub start_center: Point,
    /// Center of the end circle.
    pub end_center: Point,
    /// Radius of the start circle.
    pub start_radius: f32,
    /// Radius of the end circle.
    pub end_radius: f32,
    /// Horizontal to vertical radius ratio.
    pub ratio_xy: f32,
    /// Extend mode.
    pub extend_mode: ExtendMode,
    /// Tile size.
    pub tile_size: Size,
    /// Tile repeat counts.
    pub tile_repeat: Size,
}

impl GpuRecord for RadialGradientPrimitive {
    const LAYOUT: &'static RecordLayout = &layout::RADIAL_GRADIENT;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(TexelQuad::new(
            self.start_center.x,
            self.start_center.y,
            self.end_center.x,
            self.end_center.y,
        ));
        out.push(TexelQuad::new(
            self.start_radius,
            self.end_radius,
            self.ratio_xy,
            pack_as_float(self.extend_mode as u32),
        ));
        out.push(TexelQuad::new(
            self.tile_size.width,
            self.tile_size.height,
            self.tile_repeat.width,
            self.tile_repeat.height,
        ));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        let [start_radius, end_radius, ratio_xy, extend] = q[1].0;
        Self {
            start_center: q[0].xy(),
            end_center: q[0].zw(),
            start_radius,
            end_radius,
            ratio_xy,
            extend_mode: ExtendMode::from_float(extend),
            tile_size: Size::new(q[2].0[0], q[2].0[1]),
            tile_repeat: Size::new(q[2].0[2], q[2].0[3]),
        }
    }
}

/// Box shadow.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoxShadowPrimitive {
    /// Rect the shadow is cast from.
    pub src_rect: RectWithSize,
    /// Shadow rect after offset and spread.
    pub bs_rect: RectWithSize,
    /// Premultiplied color.
    pub color: ColorF,
    /// Corner radius.
    pub border_radius: f32,
    /// Size of the blurred edge.
    pub edge_size: f32,
    /// Blur radius.
    pub blur_radius: f32,
    /// Inset shadow.
    pub inverted: bool,
}

impl GpuRecord for BoxShadowPrimitive {
    const LAYOUT: &'static RecordLayout = &layout::BOX_SHADOW;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        out.push(self.src_rect.into());
        out.push(self.bs_rect.into());
        out.push(self.color.into());
        out.push(TexelQuad::new(
            self.border_radius,
            self.edge_size,
            self.blur_radius,
            if self.inverted { 1.0 } else { 0.0 },
        ));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        let [border_radius, edge_size, blur_radius, inverted] = q[3].0;
        Self {
            src_rect: RectWithSize::from_quad(q[0]),
            bs_rect: RectWithSize::from_quad(q[1]),
            color: ColorF::from_quad(q[2]),
            border_radius,
            edge_size,
            blur_radius,
            inverted: inverted > 0.5,
        }
    }
}

/// Border edge style codes as the border shaders read them.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BorderStyle {
    /// No border.
    None = 0,
    /// Solid line.
    Solid = 1,
    /// Two lines.
    Double = 2,
    /// Dots.
    Dotted = 3,
    /// Dashes.
    Dashed = 4,
    /// Hidden.
    Hidden = 5,
    /// Carved.
    Groove = 6,
    /// Raised.
    Ridge = 7,
    /// Embedded.
    Inset = 8,
    /// Embossed.
    Outset = 9,
}

impl BorderStyle {
    const ALL: [Self; 10] = [
        Self::None,
        Self::Solid,
        Self::Double,
        Self::Dotted,
        Self::Dashed,
        Self::Hidden,
        Self::Groove,
        Self::Ridge,
        Self::Inset,
        Self::Outset,
    ];

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_float(value: f32) -> Self {
        let index = value.round().max(0.0) as usize;
        Self::ALL.get(index).copied().unwrap_or(Self::None)
    }
}

/// Four-sided border. Sides and corners are ordered top/left first, matching
/// the radii packing `(tl, tr)`, `(br, bl)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BorderPrimitive {
    /// Style per side: left, top, right, bottom.
    pub style: [BorderStyle; 4],
    /// Width per side.
    pub widths: [f32; 4],
    /// Premultiplied color per side.
    pub colors: [ColorF; 4],
    /// Corner radii: top-left, top-right, bottom-right, bottom-left.
    pub radii: [Size; 4],
}

impl GpuRecord for BorderPrimitive {
    const LAYOUT: &'static RecordLayout = &layout::BORDER;

    fn write_gpu_blocks(&self, out: &mut Vec<TexelQuad>) {
        let [s0, s1, s2, s3] = self.style.map(|s| pack_as_float(s as u32));
        out.push(TexelQuad::new(s0, s1, s2, s3));
        out.push(TexelQuad(self.widths));
        out.extend(self.colors.iter().map(|c| TexelQuad::from(*c)));
        let [tl, tr, br, bl] = self.radii;
        out.push(TexelQuad::new(tl.width, tl.height, tr.width, tr.height));
        out.push(TexelQuad::new(br.width, br.height, bl.width, bl.height));
    }

    fn read_gpu_blocks(q: &[TexelQuad]) -> Self {
        Self {
            style: q[0].0.map(BorderStyle::from_float),
            widths: q[1].0,
            colors: [
                ColorF::from_quad(q[2]),
                ColorF::from_quad(q[3]),
                ColorF::from_quad(q[4]),
                ColorF::from_quad(q[5]),
            ],
            radii: [
                Size::new(q[6].0[0], q[6].0[1]),
                Size::new(q[6].0[2], q[6].0[3]),
                Size::new(q[7].0[0], q[7].0[1]),
                Size::new(q[7].0[2], q[7].0[3]),
            ],
        }
    }
}

/// Encode a record into a fresh quad vector.
#[must_use]
pub fn encode<T: GpuRecord>(record: &T) -> Vec<TexelQuad> {
    let mut out = Vec::with_capacity(T::VECS);
    record.write_gpu_blocks(&mut out);
    debug_assert_eq!(out.len(), T::VECS, "{} wrote the wrong quad count", T::LAYOUT.name);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lyon::math::{point, size};

    fn assert_round_trip<T: GpuRecord + PartialEq + std::fmt::Debug>(record: T) {
        let quads = encode(&record);
        assert_eq!(quads.len(), T::LAYOUT.vecs(), "{}", T::LAYOUT.name);
        assert_eq!(T::read_gpu_blocks(&quads), record, "{}", T::LAYOUT.name);
    }

    #[test]
    fn every_record_writes_its_layout_width() {
        assert_round_trip(PackedLayer::identity(RectWithSize::new(0.0, 0.0, 10.0, 10.0)));
        assert_round_trip(RenderTaskData::alpha_batch(
            point(1.0, 2.0),
            size(3.0, 4.0),
            point(5.0, 6.0),
            7.0,
        ));
        assert_round_trip(PrimitiveGeometry::unclipped(RectWithSize::new(1.0, 1.0, 2.0, 2.0)));
        assert_round_trip(TableGeometry(PrimitiveGeometry::unclipped(RectWithSize::zero())));
        assert_round_trip(RectanglePrimitive {
            color: ColorF::WHITE,
        });
        assert_round_trip(TextRunPrimitive {
            color: ColorF::BLACK,
        });
        assert_round_trip(GlyphPrimitive {
            offset: point(3.5, -2.0),
        });
        assert_round_trip(ResourceRect {
            uv0: point(0.0, 0.0),
            uv1: point(16.0, 16.0),
        });
        assert_round_trip(YuvImagePrimitive {
            size: size(640.0, 480.0),
        });
        assert_round_trip(ImagePrimitive {
            stretch_size: size(32.0, 32.0),
            tile_spacing: size(2.0, 2.0),
            sub_rect: RectWithSize::new(0.0, 0.0, 16.0, 8.0),
        });
        assert_round_trip(GradientPrimitive {
            start_point: point(0.0, 0.0),
            end_point: point(100.0, 0.0),
            tile_size: size(100.0, 100.0),
            tile_repeat: size(1.0, 1.0),
            extend_mode: ExtendMode::Repeat,
        });
        assert_round_trip(RadialGradientPrimitive {
            start_center: point(50.0, 50.0),
            end_center: point(50.0, 50.0),
            start_radius: 0.0,
            end_radius: 50.0,
            ratio_xy: 1.0,
            extend_mode: ExtendMode::Clamp,
            tile_size: size(100.0, 100.0),
            tile_repeat: size(1.0, 1.0),
        });
        assert_round_trip(BoxShadowPrimitive {
            src_rect: RectWithSize::new(10.0, 10.0, 50.0, 50.0),
            bs_rect: RectWithSize::new(12.0, 12.0, 50.0, 50.0),
            color: ColorF::new(0.0, 0.0, 0.0, 0.5),
            border_radius: 4.0,
            edge_size: 6.0,
            blur_radius: 3.0,
            inverted: true,
        });
        assert_round_trip(BorderPrimitive {
            style: [
                BorderStyle::Solid,
                BorderStyle::Dashed,
                BorderStyle::Dotted,
                BorderStyle::Outset,
            ],
            widths: [1.0, 2.0, 3.0, 4.0],
            colors: [ColorF::WHITE, ColorF::BLACK, ColorF::TRANSPARENT, ColorF::WHITE],
            radii: [size(1.0, 2.0), size(3.0, 4.0), size(5.0, 6.0), size(7.0, 8.0)],
        });
    }

    #[test]
    fn screen_vertices_follow_the_layer_transform() {
        let transform = LayerTransform::scale(2.0, 3.0, 1.0)
            .then_translate(lyon::geom::euclid::default::Vector3D::new(5.0, 7.0, 0.0));
        let layer = PackedLayer::new(transform, RectWithSize::new(1.0, 1.0, 10.0, 20.0)).unwrap();
        let wide = PackedLayerWithScreenVertices::from(layer);
        assert_eq!(
            wide.screen_vertices,
            [
                TexelQuad::new(7.0, 10.0, 0.0, 1.0),
                TexelQuad::new(27.0, 10.0, 0.0, 1.0),
                TexelQuad::new(7.0, 70.0, 0.0, 1.0),
                TexelQuad::new(27.0, 70.0, 0.0, 1.0),
            ]
        );
        let quads = encode(&wide);
        assert_eq!(quads.len(), layout::VECS_PER_LAYER_WITH_SCREEN_VERTICES);
        // The first nine quads are the plain layer, so both forms share a prefix.
        assert_eq!(quads[..9], encode(&layer)[..]);
        assert_eq!(PackedLayerWithScreenVertices::read_gpu_blocks(&quads), wide);
    }

    #[test]
    fn gradient_stop_is_premultiplied_on_write() {
        let stop = GradientStop {
            color: ColorF::new(1.0, 1.0, 1.0, 0.5),
            offset: 0.25,
        };
        let decoded = GradientStop::read_gpu_blocks(&encode(&stop));
        assert_eq!(decoded.color, ColorF::new(0.5, 0.5, 0.5, 0.5));
        assert!((decoded.offset - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn singular_layer_is_rejected() {
        let flat = LayerTransform::scale(0.0, 1.0, 1.0);
        assert!(matches!(
            PackedLayer::new(flat, RectWithSize::zero()),
            Err(Error::SingularTransform)
        ));
        let layer = PackedLayer::new(
            LayerTransform::translation(4.0, 5.0, 0.0),
            RectWithSize::zero(),
        )
        .unwrap();
        assert_eq!(
            layer.transform.then(&layer.inv_transform),
            LayerTransform::identity()
        );
    }

    #[test]
    fn clip_task_stores_endpoints() {
        let task = RenderTaskData::clip(
            RectWithSize::new(10.0, 20.0, 30.0, 40.0),
            point(100.0, 200.0),
            2.0,
            RectWithSize::new(12.0, 22.0, 5.0, 5.0),
        );
        let area = ClipArea::from(task);
        assert_eq!(area.task_bounds, TexelQuad::new(10.0, 20.0, 40.0, 60.0));
        assert_eq!(area.screen_origin_target_index, TexelQuad::new(100.0, 200.0, 2.0, 0.0));
        assert_eq!(area.inner_rect, TexelQuad::new(12.0, 22.0, 17.0, 27.0));
    }
}
