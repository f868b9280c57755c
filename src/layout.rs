//! Layout constants and addressing shared by the host packer and the shaders.
//!
//! Everything a shader needs to locate a record lives here: the texture row
//! width, the per-record quad counts, the two addressing conventions and the
//! field descriptions of every record. The shader text in [`crate::shaders`]
//! is generated from these same values, so the two sides cannot drift apart.

use static_assertions::const_assert_eq;

/// Maximum row width, in texels, of every data texture.
pub const MAX_VERTEX_TEXTURE_WIDTH: usize = 1024;

/// Clip task index that means "no clip applied".
pub const CLIP_TASK_SENTINEL: i32 = i32::MAX;

/// Quads in a packed layer: transform, inverse transform, local clip rect.
pub const VECS_PER_LAYER: usize = 9;
/// Quads in the extended layer form that also carries four screen vertices.
pub const VECS_PER_LAYER_WITH_SCREEN_VERTICES: usize = 13;
/// Quads in a render task record.
pub const VECS_PER_RENDER_TASK: usize = 3;
/// Quads in the primitive header (local rect, local clip rect).
pub const VECS_PER_PRIM_HEADER: usize = 2;
/// Quads in the legacy per-primitive geometry table entry.
pub const VECS_PER_PRIM_GEOM: usize = 2;
/// Quads in a rectangle payload.
pub const VECS_PER_RECTANGLE: usize = 1;
/// Quads in a text run payload, not counting its glyphs.
pub const VECS_PER_TEXT_RUN: usize = 1;
/// Quads in one glyph.
pub const VECS_PER_GLYPH: usize = 1;
/// Quads in a texture-cache resource rectangle.
pub const VECS_PER_RESOURCE_RECT: usize = 1;
/// Quads in a YUV image payload.
pub const VECS_PER_YUV_IMAGE: usize = 1;
/// Quads in an image payload.
pub const VECS_PER_IMAGE: usize = 2;
/// Quads in one aligned-gradient stop.
pub const VECS_PER_GRADIENT_STOP: usize = 2;
/// Quads in a linear gradient payload, not counting its stops or table.
pub const VECS_PER_GRADIENT: usize = 3;
/// Quads in a radial gradient payload, not counting its table.
pub const VECS_PER_RADIAL_GRADIENT: usize = 3;
/// Quads in a box shadow payload.
pub const VECS_PER_BOX_SHADOW: usize = 4;
/// Quads in a border payload.
pub const VECS_PER_BORDER: usize = 8;

/// Number of interpolated entries in a gradient lookup table.
pub const GRADIENT_ENTRIES: usize = 128;
/// Entries in a full gradient table: first stop, ramp, last stop.
pub const GRADIENT_DATA_SIZE: usize = GRADIENT_ENTRIES + 2;
/// Quads occupied by a full gradient table (two colors per entry).
pub const VECS_PER_GRADIENT_DATA: usize = 2 * GRADIENT_DATA_SIZE;

/// Record widths that have a dedicated fetch function.
pub const FETCH_WIDTHS: [usize; 5] = [1, 2, 3, 4, 8];

/// A texel coordinate inside a data texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TexelCoord {
    /// Column.
    pub u: usize,
    /// Row.
    pub v: usize,
}

/// Number of records of `vecs_per_item` quads that fit in one table row.
#[must_use]
pub const fn items_per_row(vecs_per_item: usize) -> usize {
    MAX_VERTEX_TEXTURE_WIDTH / vecs_per_item
}

/// Row width of a typed table whose records are `vecs_per_item` wide.
///
/// Trailing texels that could only hold part of a record are cut off, so a
/// record never wraps onto the next row.
#[must_use]
pub const fn table_width(vecs_per_item: usize) -> usize {
    MAX_VERTEX_TEXTURE_WIDTH - (MAX_VERTEX_TEXTURE_WIDTH % vecs_per_item)
}

/// Typed-table addressing: the first texel of record `index`.
#[must_use]
pub const fn fetch_uv(index: usize, vecs_per_item: usize) -> TexelCoord {
    let per_row = items_per_row(vecs_per_item);
    TexelCoord {
        u: vecs_per_item * (index % per_row),
        v: index / per_row,
    }
}

/// Generic resource-cache addressing, where every address is one quad.
#[must_use]
pub const fn resource_cache_uv(address: usize) -> TexelCoord {
    TexelCoord {
        u: address % MAX_VERTEX_TEXTURE_WIDTH,
        v: address / MAX_VERTEX_TEXTURE_WIDTH,
    }
}

/// The two addressing conventions a data texture can use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// One texture per entity type; indices count whole records.
    Table {
        /// Quads per record.
        vecs_per_item: usize,
    },
    /// One shared texture; addresses count single quads.
    ResourceCache,
}

impl Addressing {
    /// Texel holding the first quad of the record at `index`.
    #[must_use]
    pub const fn uv(self, index: usize) -> TexelCoord {
        match self {
            Self::Table { vecs_per_item } => fetch_uv(index, vecs_per_item),
            Self::ResourceCache => resource_cache_uv(index),
        }
    }

    /// Width of the texture rows this addressing produces.
    #[must_use]
    pub const fn row_width(self) -> usize {
        match self {
            Self::Table { vecs_per_item } => table_width(vecs_per_item),
            Self::ResourceCache => MAX_VERTEX_TEXTURE_WIDTH,
        }
    }
}

/// Shape of one field inside a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A single quad.
    Vec4,
    /// Four quads, one per matrix column.
    Mat4,
    /// `n` quads.
    Vec4Array(usize),
}

impl FieldKind {
    /// Quads this field occupies.
    #[must_use]
    pub const fn quads(self) -> usize {
        match self {
            Self::Vec4 => 1,
            Self::Mat4 => 4,
            Self::Vec4Array(n) => n,
        }
    }
}

/// A named field in a record layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Field {
    /// Member name in the generated shader struct.
    pub name: &'static str,
    /// Shape of the member.
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field { name, kind }
}

/// Texture a record is stored in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordSource {
    /// A typed table bound to the named sampler.
    Table(SamplerSlot),
    /// The shared resource cache.
    ResourceCache,
}

/// Canonical layout of one record type.
///
/// This is the only place field order is written down; the GLSL and HLSL
/// declarations and the Rust encoders all follow it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Struct name in shader code.
    pub name: &'static str,
    /// Name of the generated fetch function.
    pub fetch_fn: &'static str,
    /// `VECS_PER_*` define emitted for this record.
    pub vecs_define: &'static str,
    /// Where the record lives.
    pub source: RecordSource,
    /// Fields in storage order.
    pub fields: &'static [Field],
}

impl RecordLayout {
    /// Total quads occupied by the record.
    #[must_use]
    pub const fn vecs(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].kind.quads();
            i += 1;
        }
        total
    }

    /// Addressing used to find this record.
    #[must_use]
    pub const fn addressing(&self) -> Addressing {
        match self.source {
            RecordSource::Table(_) => Addressing::Table {
                vecs_per_item: self.vecs(),
            },
            RecordSource::ResourceCache => Addressing::ResourceCache,
        }
    }
}

/// Packed layer.
pub const LAYER: RecordLayout = RecordLayout {
    name: "Layer",
    fetch_fn: "fetch_layer",
    vecs_define: "VECS_PER_LAYER",
    source: RecordSource::Table(SamplerSlot::Layers),
    fields: &[
        field("transform", FieldKind::Mat4),
        field("inv_transform", FieldKind::Mat4),
        field("local_clip_rect", FieldKind::Vec4),
    ],
};

/// Packed layer followed by its clip rect projected to world space.
pub const LAYER_WITH_SCREEN_VERTICES: RecordLayout = RecordLayout {
    name: "LayerWithScreenVertices",
    fetch_fn: "fetch_layer_with_screen_vertices",
    vecs_define: "VECS_PER_LAYER_WITH_SCREEN_VERTICES",
    source: RecordSource::Table(SamplerSlot::Layers),
    fields: &[
        field("transform", FieldKind::Mat4),
        field("inv_transform", FieldKind::Mat4),
        field("local_clip_rect", FieldKind::Vec4),
        field("screen_vertices", FieldKind::Vec4Array(4)),
    ],
};

/// Render task.
pub const RENDER_TASK: RecordLayout = RecordLayout {
    name: "RenderTaskData",
    fetch_fn: "fetch_render_task",
    vecs_define: "VECS_PER_RENDER_TASK",
    source: RecordSource::Table(SamplerSlot::RenderTasks),
    fields: &[
        field("data0", FieldKind::Vec4),
        field("data1", FieldKind::Vec4),
        field("data2", FieldKind::Vec4),
    ],
};

/// Per-primitive geometry in the legacy table indexed by global primitive id.
pub const PRIM_GEOMETRY: RecordLayout = RecordLayout {
    name: "PrimitiveGeometry",
    fetch_fn: "fetch_prim_geometry",
    vecs_define: "VECS_PER_PRIM_GEOM",
    source: RecordSource::Table(SamplerSlot::PrimGeometry),
    fields: &[
        field("local_rect", FieldKind::Vec4),
        field("local_clip_rect", FieldKind::Vec4),
    ],
};

/// Primitive header stored at the primitive's base address.
pub const PRIM_HEADER: RecordLayout = RecordLayout {
    name: "PrimitiveHeader",
    fetch_fn: "fetch_prim_header",
    vecs_define: "VECS_PER_PRIM_HEADER",
    source: RecordSource::ResourceCache,
    fields: &[
        field("local_rect", FieldKind::Vec4),
        field("local_clip_rect", FieldKind::Vec4),
    ],
};

/// Solid rectangle.
pub const RECTANGLE: RecordLayout = RecordLayout {
    name: "Rectangle",
    fetch_fn: "fetch_rectangle",
    vecs_define: "VECS_PER_RECTANGLE",
    source: RecordSource::ResourceCache,
    fields: &[field("color", FieldKind::Vec4)],
};

/// Text run header.
pub const TEXT_RUN: RecordLayout = RecordLayout {
    name: "TextRun",
    fetch_fn: "fetch_text_run",
    vecs_define: "VECS_PER_TEXT_RUN",
    source: RecordSource::ResourceCache,
    fields: &[field("color", FieldKind::Vec4)],
};

/// One glyph of a text run.
pub const GLYPH: RecordLayout = RecordLayout {
    name: "Glyph",
    fetch_fn: "fetch_glyph_data",
    vecs_define: "VECS_PER_GLYPH",
    source: RecordSource::ResourceCache,
    fields: &[field("offset", FieldKind::Vec4)],
};

/// Rectangle inside a texture-cache page.
pub const RESOURCE_RECT: RecordLayout = RecordLayout {
    name: "ResourceRect",
    fetch_fn: "fetch_resource_rect",
    vecs_define: "VECS_PER_RESOURCE_RECT",
    source: RecordSource::ResourceCache,
    fields: &[field("uv_rect", FieldKind::Vec4)],
};

/// YUV image.
pub const YUV_IMAGE: RecordLayout = RecordLayout {
    name: "YuvImage",
    fetch_fn: "fetch_yuv_image",
    vecs_define: "VECS_PER_YUV_IMAGE",
    source: RecordSource::ResourceCache,
    fields: &[field("size", FieldKind::Vec4)],
};

/// Image.
pub const IMAGE: RecordLayout = RecordLayout {
    name: "Image",
    fetch_fn: "fetch_image",
    vecs_define: "VECS_PER_IMAGE",
    source: RecordSource::ResourceCache,
    fields: &[
        field("stretch_size_and_tile_spacing", FieldKind::Vec4),
        field("sub_rect", FieldKind::Vec4),
    ],
};

/// Aligned gradient stop.
pub const GRADIENT_STOP: RecordLayout = RecordLayout {
    name: "GradientStop",
    fetch_fn: "fetch_gradient_stop",
    vecs_define: "VECS_PER_GRADIENT_STOP",
    source: RecordSource::ResourceCache,
    fields: &[
        field("color", FieldKind::Vec4),
        field("offset", FieldKind::Vec4),
    ],
};

/// Linear gradient.
pub const GRADIENT: RecordLayout = RecordLayout {
    name: "Gradient",
    fetch_fn: "fetch_gradient",
    vecs_define: "VECS_PER_GRADIENT",
    source: RecordSource::ResourceCache,
    fields: &[
        field("start_end_point", FieldKind::Vec4),
        field("tile_size_repeat", FieldKind::Vec4),
        field("extend_mode", FieldKind::Vec4),
    ],
};

/// Radial gradient.
pub const RADIAL_GRADIENT: RecordLayout = RecordLayout {
    name: "RadialGradient",
    fetch_fn: "fetch_radial_gradient",
    vecs_define: "VECS_PER_RADIAL_GRADIENT",
    source: RecordSource::ResourceCache,
    fields: &[
        field("start_end_center", FieldKind::Vec4),
        field("start_end_radius_ratio_xy_extend_mode", FieldKind::Vec4),
        field("tile_size_repeat", FieldKind::Vec4),
    ],
};

/// Box shadow.
pub const BOX_SHADOW: RecordLayout = RecordLayout {
    name: "BoxShadow",
    fetch_fn: "fetch_boxshadow",
    vecs_define: "VECS_PER_BOX_SHADOW",
    source: RecordSource::ResourceCache,
    fields: &[
        field("src_rect", FieldKind::Vec4),
        field("bs_rect", FieldKind::Vec4),
        field("color", FieldKind::Vec4),
        field("border_radius_edge_size_blur_radius_inverted", FieldKind::Vec4),
    ],
};

/// Border.
pub const BORDER: RecordLayout = RecordLayout {
    name: "Border",
    fetch_fn: "fetch_border",
    vecs_define: "VECS_PER_BORDER",
    source: RecordSource::ResourceCache,
    fields: &[
        field("style", FieldKind::Vec4),
        field("widths", FieldKind::Vec4),
        field("colors", FieldKind::Vec4Array(4)),
        field("radii", FieldKind::Vec4Array(2)),
    ],
};

/// Every record layout, in the order shader declarations are emitted.
pub const ALL_RECORDS: [&RecordLayout; 16] = [
    &LAYER,
    &LAYER_WITH_SCREEN_VERTICES,
    &RENDER_TASK,
    &PRIM_GEOMETRY,
    &PRIM_HEADER,
    &RECTANGLE,
    &TEXT_RUN,
    &GLYPH,
    &RESOURCE_RECT,
    &YUV_IMAGE,
    &IMAGE,
    &GRADIENT_STOP,
    &GRADIENT,
    &RADIAL_GRADIENT,
    &BOX_SHADOW,
    &BORDER,
];

const_assert_eq!(LAYER.vecs(), VECS_PER_LAYER);
const_assert_eq!(RENDER_TASK.vecs(), VECS_PER_RENDER_TASK);
const_assert_eq!(PRIM_GEOMETRY.vecs(), VECS_PER_PRIM_GEOM);
const_assert_eq!(PRIM_HEADER.vecs(), VECS_PER_PRIM_HEADER);
const_assert_eq!(RECTANGLE.vecs(), VECS_PER_RECTANGLE);
const_assert_eq!(TEXT_RUN.vecs(), VECS_PER_TEXT_RUN);
const_assert_eq!(GLYPH.vecs(), VECS_PER_GLYPH);
const_assert_eq!(RESOURCE_RECT.vecs(), VECS_PER_RESOURCE_RECT);
const_assert_eq!(YUV_IMAGE.vecs(), VECS_PER_YUV_IMAGE);
const_assert_eq!(IMAGE.vecs(), VECS_PER_IMAGE);
const_assert_eq!(GRADIENT_STOP.vecs(), VECS_PER_GRADIENT_STOP);
const_assert_eq!(GRADIENT.vecs(), VECS_PER_GRADIENT);
const_assert_eq!(RADIAL_GRADIENT.vecs(), VECS_PER_RADIAL_GRADIENT);
const_assert_eq!(BOX_SHADOW.vecs(), VECS_PER_BOX_SHADOW);
const_assert_eq!(BORDER.vecs(), VECS_PER_BORDER);
const_assert_eq!(LAYER_WITH_SCREEN_VERTICES.vecs(), VECS_PER_LAYER_WITH_SCREEN_VERTICES);
const_assert_eq!(VECS_PER_LAYER_WITH_SCREEN_VERTICES, VECS_PER_LAYER + 4);

/// Every texture binding a primitive program can see.
///
/// The discriminant is both the GL texture unit and the wgpu binding index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SamplerSlot {
    /// Content texture 0.
    Color0 = 0,
    /// Content texture 1.
    Color1 = 1,
    /// Content texture 2.
    Color2 = 2,
    /// Ordered-dither pattern.
    Dither = 3,
    /// 8-bit clip mask atlas.
    CacheA8 = 4,
    /// RGBA8 render task cache.
    CacheRgba8 = 5,
    /// Layer table.
    Layers = 6,
    /// Render task table.
    RenderTasks = 7,
    /// Legacy primitive geometry table.
    PrimGeometry = 8,
    /// Shared resource cache.
    ResourceCache = 9,
}

impl SamplerSlot {
    /// All slots in unit order.
    pub const ALL: [Self; 10] = [
        Self::Color0,
        Self::Color1,
        Self::Color2,
        Self::Dither,
        Self::CacheA8,
        Self::CacheRgba8,
        Self::Layers,
        Self::RenderTasks,
        Self::PrimGeometry,
        Self::ResourceCache,
    ];

    /// Sampler name in shader code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Color0 => "sColor0",
            Self::Color1 => "sColor1",
            Self::Color2 => "sColor2",
            Self::Dither => "sDither",
            Self::CacheA8 => "sCacheA8",
            Self::CacheRgba8 => "sCacheRGBA8",
            Self::Layers => "sLayers",
            Self::RenderTasks => "sRenderTasks",
            Self::PrimGeometry => "sPrimGeometry",
            Self::ResourceCache => "sResourceCache",
        }
    }

    /// Texture unit / binding index.
    #[must_use]
    pub const fn unit(self) -> u32 {
        self as u32
    }

    /// Whether the slot is an array texture indexed by render target layer.
    #[must_use]
    pub const fn is_array(self) -> bool {
        matches!(self, Self::CacheA8 | Self::CacheRgba8)
    }

    /// Whether the slot holds float data read with `texelFetch`.
    #[must_use]
    pub const fn is_data_texture(self) -> bool {
        matches!(
            self,
            Self::Layers | Self::RenderTasks | Self::PrimGeometry | Self::ResourceCache
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_one_addressing_degenerates_to_resource_cache() {
        for address in [0, 1, 1023, 1024, 1025, 5000] {
            assert_eq!(fetch_uv(address, 1), resource_cache_uv(address));
        }
        assert_eq!(resource_cache_uv(1025), TexelCoord { u: 1, v: 1 });
    }

    #[test]
    fn layers_wrap_after_a_full_row() {
        // 1024 / 9 = 113 layers per row, 1017 texels used.
        assert_eq!(items_per_row(VECS_PER_LAYER), 113);
        assert_eq!(table_width(VECS_PER_LAYER), 1017);
        assert_eq!(fetch_uv(112, VECS_PER_LAYER), TexelCoord { u: 1008, v: 0 });
        assert_eq!(fetch_uv(113, VECS_PER_LAYER), TexelCoord { u: 0, v: 1 });

        // 1024 / 13 = 78 extended layers per row.
        let wide = LAYER_WITH_SCREEN_VERTICES.addressing();
        assert_eq!(wide.row_width(), 1014);
        assert_eq!(wide.uv(77), TexelCoord { u: 1001, v: 0 });
        assert_eq!(wide.uv(78), TexelCoord { u: 0, v: 1 });
    }

    #[test]
    fn record_tables_use_the_declared_widths() {
        assert_eq!(
            LAYER.addressing(),
            Addressing::Table {
                vecs_per_item: VECS_PER_LAYER
            }
        );
        assert_eq!(RECTANGLE.addressing(), Addressing::ResourceCache);
        assert_eq!(Addressing::ResourceCache.row_width(), MAX_VERTEX_TEXTURE_WIDTH);
    }

    #[test]
    fn every_fetch_width_has_a_record() {
        for width in FETCH_WIDTHS {
            assert!(
                ALL_RECORDS.iter().any(|r| r.vecs() == width),
                "no record uses width {width}"
            );
        }
    }

    #[test]
    fn sampler_units_are_unique() {
        let mut units: Vec<u32> = SamplerSlot::ALL.iter().map(|s| s.unit()).collect();
        units.dedup();
        assert_eq!(units.len(), SamplerSlot::ALL.len());
        assert_eq!(SamplerSlot::ResourceCache.name(), "sResourceCache");
    }
}
