//! Frozen data textures and the fetch functions that read records back.
//!
//! [`CacheTexture`] is what a [`GpuCacheBuilder`](crate::allocator::GpuCacheBuilder)
//! or [`GpuTable`](crate::allocator::GpuTable) turns into once a frame has
//! been packed. It has no mutating methods. The functions in this module
//! read it the same way the generated shader code reads the GPU copy:
//! point sampling at `(u + i, v)` with the addressing of the record's
//! layout.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;

use crate::layout::{self, TexelCoord, CLIP_TASK_SENTINEL};
use crate::records::{
    AlphaBatchTask, ClipArea, GlyphPrimitive, GpuRecord, PackedLayer,
    PackedLayerWithScreenVertices, PrimitiveGeometry, RenderTaskData, TableGeometry,
};
use crate::types::TexelQuad;

/// An immutable RGBA32F data texture.
///
/// Rows are always fully populated; trailing texels of the last row are
/// zero. Every texel read is counted so callers can check which textures a
/// code path touched.
#[derive(Debug)]
pub struct CacheTexture {
    label: &'static str,
    width: usize,
    texels: Vec<TexelQuad>,
    reads: AtomicUsize,
}

impl CacheTexture {
    /// Freeze `texels` into rows of `width`, zero-padding the last row.
    pub(crate) fn from_texels(
        label: &'static str,
        width: usize,
        mut texels: Vec<TexelQuad>,
    ) -> Self {
        debug_assert!(width > 0 && width <= layout::MAX_VERTEX_TEXTURE_WIDTH);
        let rows = texels.len().div_ceil(width).max(1);
        texels.resize(rows * width, TexelQuad::ZERO);
        Self {
            label,
            width,
            texels,
            reads: AtomicUsize::new(0),
        }
    }

    /// Debug label, also used as the GL/wgpu object label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Row width in texels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.texels.len() / self.width
    }

    /// All texels, row-major.
    #[must_use]
    pub fn texels(&self) -> &[TexelQuad] {
        &self.texels
    }

    /// Raw bytes for upload as `RGBA32F`.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Texels read through this texture so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Read one texel. Coordinates outside the texture read as zero.
    #[must_use]
    pub fn texel_fetch(&self, coord: TexelCoord) -> TexelQuad {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if coord.u >= self.width || coord.v >= self.rows() {
            trace!(
                "{}: read outside texture at ({}, {}), size {}x{}",
                self.label,
                coord.u,
                coord.v,
                self.width,
                self.rows()
            );
            return TexelQuad::ZERO;
        }
        self.texels[coord.v * self.width + coord.u]
    }

    /// Read `N` consecutive texels starting at `coord`, like a run of
    /// `texelFetch(.., uv + ivec2(i, 0), 0)`.
    #[must_use]
    pub fn fetch_row<const N: usize>(&self, coord: TexelCoord) -> [TexelQuad; N] {
        std::array::from_fn(|i| {
            self.texel_fetch(TexelCoord {
                u: coord.u.saturating_add(i),
                v: coord.v,
            })
        })
    }
}

fn cache_uv(address: i32) -> TexelCoord {
    match usize::try_from(address) {
        Ok(address) => layout::resource_cache_uv(address),
        Err(_) => {
            trace!("negative resource cache address {address}");
            TexelCoord {
                u: usize::MAX,
                v: usize::MAX,
            }
        }
    }
}

/// One quad at `address` in the resource cache.
#[must_use]
pub fn fetch_1(cache: &CacheTexture, address: i32) -> TexelQuad {
    cache.texel_fetch(cache_uv(address))
}

/// Two consecutive quads at `address` in the resource cache.
#[must_use]
pub fn fetch_2(cache: &CacheTexture, address: i32) -> [TexelQuad; 2] {
    cache.fetch_row(cache_uv(address))
}

/// Three consecutive quads at `address` in the resource cache.
#[must_use]
pub fn fetch_3(cache: &CacheTexture, address: i32) -> [TexelQuad; 3] {
    cache.fetch_row(cache_uv(address))
}

/// Four consecutive quads at `address` in the resource cache.
#[must_use]
pub fn fetch_4(cache: &CacheTexture, address: i32) -> [TexelQuad; 4] {
    cache.fetch_row(cache_uv(address))
}

/// Eight consecutive quads at `address` in the resource cache.
#[must_use]
pub fn fetch_8(cache: &CacheTexture, address: i32) -> [TexelQuad; 8] {
    cache.fetch_row(cache_uv(address))
}

/// Fetch and decode any record using its layout's addressing.
///
/// For typed tables `index` counts whole records; for the resource cache it
/// is a quad address.
#[must_use]
pub fn fetch_record<T: GpuRecord>(texture: &CacheTexture, index: i32) -> T {
    let coord = match usize::try_from(index) {
        Ok(index) => T::LAYOUT.addressing().uv(index),
        Err(_) => cache_uv(index),
    };
    let quads: Vec<TexelQuad> = (0..T::VECS)
        .map(|i| {
            texture.texel_fetch(TexelCoord {
                u: coord.u.saturating_add(i),
                v: coord.v,
            })
        })
        .collect();
    T::read_gpu_blocks(&quads)
}

/// Layer `index` from the layer table.
#[must_use]
pub fn fetch_layer(layers: &CacheTexture, index: i32) -> PackedLayer {
    fetch_record(layers, index)
}

/// Layer `index` from a table of layers packed with their screen vertices.
#[must_use]
pub fn fetch_layer_with_screen_vertices(
    layers: &CacheTexture,
    index: i32,
) -> PackedLayerWithScreenVertices {
    fetch_record(layers, index)
}

/// Render task `index` from the render task table.
#[must_use]
pub fn fetch_render_task(render_tasks: &CacheTexture, index: i32) -> RenderTaskData {
    fetch_record(render_tasks, index)
}

/// Render task `index` read as an alpha batch target.
#[must_use]
pub fn fetch_alpha_batch_task(render_tasks: &CacheTexture, index: i32) -> AlphaBatchTask {
    fetch_render_task(render_tasks, index).into()
}

/// Render task `index` read as a clip area.
///
/// [`CLIP_TASK_SENTINEL`] returns [`ClipArea::NONE`] without touching the
/// texture.
#[must_use]
pub fn fetch_clip_area(render_tasks: &CacheTexture, index: i32) -> ClipArea {
    if index == CLIP_TASK_SENTINEL {
        return ClipArea::NONE;
    }
    fetch_render_task(render_tasks, index).into()
}

/// Legacy per-primitive geometry by global primitive id.
#[must_use]
pub fn fetch_prim_geometry(prim_geometry: &CacheTexture, global_prim_id: i32) -> PrimitiveGeometry {
    fetch_record::<TableGeometry>(prim_geometry, global_prim_id).0
}

/// The header at a primitive's base address.
#[must_use]
pub fn fetch_prim_header(cache: &CacheTexture, prim_address: i32) -> PrimitiveGeometry {
    let [local_rect, local_clip_rect] = fetch_2(cache, prim_address);
    PrimitiveGeometry::read_gpu_blocks(&[local_rect, local_clip_rect])
}

/// Glyph `glyph_index` of the text run whose payload starts at `run_address`.
///
/// Address arithmetic wraps like a shader `int`.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn fetch_glyph(cache: &CacheTexture, run_address: i32, glyph_index: i32) -> GlyphPrimitive {
    let address = run_address
        .wrapping_add(layout::VECS_PER_TEXT_RUN as i32)
        .wrapping_add(glyph_index);
    GlyphPrimitive::read_gpu_blocks(&[fetch_1(cache, address)])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layout::MAX_VERTEX_TEXTURE_WIDTH;

    fn counting(len: usize) -> CacheTexture {
        #[expect(clippy::cast_precision_loss)]
        let texels = (0..len)
            .map(|i| TexelQuad::new(i as f32, 0.0, 0.0, 1.0))
            .collect();
        CacheTexture::from_texels("test", MAX_VERTEX_TEXTURE_WIDTH, texels)
    }

    #[test]
    fn last_row_is_zero_padded() {
        let tex = counting(1030);
        assert_eq!(tex.rows(), 2);
        assert_eq!(tex.texels().len(), 2048);
        assert_eq!(tex.texels()[1030], TexelQuad::ZERO);
        assert_eq!(tex.as_bytes().len(), 2048 * 16);
    }

    #[test]
    fn fixed_fetches_read_consecutive_quads() {
        let tex = counting(2048);
        assert_eq!(fetch_1(&tex, 1025).0[0], 1025.0);
        let quads = fetch_8(&tex, 1030);
        for (i, q) in quads.iter().enumerate() {
            assert_eq!(q.0[0], (1030 + i) as f32);
        }
        assert_eq!(tex.read_count(), 9);
    }

    #[test]
    fn out_of_range_reads_are_zero() {
        let tex = counting(4);
        assert_eq!(fetch_1(&tex, 5000), TexelQuad::ZERO);
        assert_eq!(fetch_1(&tex, -1), TexelQuad::ZERO);
        // Reading past the row end does not wrap to the next row.
        assert_eq!(fetch_2(&tex, 1023)[1], TexelQuad::ZERO);
        assert_eq!(fetch_8(&tex, i32::MIN), [TexelQuad::ZERO; 8]);
    }

    #[test]
    fn glyph_address_wraps_instead_of_overflowing() {
        let tex = counting(4);
        let glyph = fetch_glyph(&tex, i32::MAX - 1, i32::MAX);
        assert_eq!(glyph, GlyphPrimitive::read_gpu_blocks(&[TexelQuad::ZERO]));
        assert_eq!(tex.read_count(), 1);
    }

    #[test]
    fn extended_layers_are_found_on_the_next_row() {
        use crate::allocator::GpuTable;
        use crate::types::{LayerTransform, RectWithSize};

        let mut table = GpuTable::<PackedLayerWithScreenVertices>::new(4);
        for i in 0..80 {
            let clip = RectWithSize::new(0.0, 0.0, 10.0, 10.0);
            #[expect(clippy::cast_precision_loss)]
            let transform = LayerTransform::translation(i as f32, 0.0, 0.0);
            let layer = PackedLayer::new(transform, clip).unwrap();
            table.push(&layer.into()).unwrap();
        }
        let tex = table.finish();
        assert_eq!(tex.rows(), 2);
        let layer = fetch_layer_with_screen_vertices(&tex, 79);
        assert_eq!(layer.layer.transform, LayerTransform::translation(79.0, 0.0, 0.0));
        assert_eq!(layer.screen_vertices[3], TexelQuad::new(89.0, 10.0, 0.0, 1.0));
        assert_eq!(tex.read_count(), layout::VECS_PER_LAYER_WITH_SCREEN_VERTICES);
    }

    #[test]
    fn sentinel_clip_skips_the_texture() {
        let tasks = counting(3);
        assert_eq!(fetch_clip_area(&tasks, CLIP_TASK_SENTINEL), ClipArea::NONE);
        assert_eq!(tasks.read_count(), 0);
        let _ = fetch_clip_area(&tasks, 0);
        assert_eq!(tasks.read_count(), 3);
    }
}
