//! Host-side packers that fill the data textures for one frame.
//!
//! [`GpuCacheBuilder`] fills the shared resource cache, where addresses count
//! single quads. [`GpuTable`] fills a typed table, where indices count whole
//! records. Both are consumed by `finish()`, which hands back a frozen
//! [`CacheTexture`]; nothing can be written after that point.

use std::marker::PhantomData;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::fetch::CacheTexture;
use crate::layout::{self, SamplerSlot, MAX_VERTEX_TEXTURE_WIDTH};
use crate::options::RendererOptions;
use crate::records::{
    GlyphPrimitive, GpuRecord, PackedLayer, PrimitiveGeometry, RenderTaskData, TableGeometry,
    TextRunPrimitive,
};
use crate::types::TexelQuad;

/// Largest row count whose addresses still fit the shaders' `int`.
#[expect(clippy::cast_sign_loss)]
const MAX_ADDRESSABLE_ROWS: usize = i32::MAX as usize / MAX_VERTEX_TEXTURE_WIDTH;

/// A quad address in the resource cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuCacheAddress(u32);

impl GpuCacheAddress {
    /// The address as the shaders see it.
    #[must_use]
    #[expect(clippy::cast_possible_wrap)]
    pub fn as_int(self) -> i32 {
        // Bounded by MAX_ADDRESSABLE_ROWS.
        self.0 as i32
    }

    /// Address `quads` further on.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub fn offset(self, quads: usize) -> Self {
        Self(self.0 + quads as u32)
    }

    /// The address of the type-specific payload of a primitive whose header
    /// starts here.
    #[must_use]
    pub fn specific(self) -> Self {
        self.offset(layout::VECS_PER_PRIM_HEADER)
    }
}

/// A record index in a typed table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuTableIndex(u32);

impl GpuTableIndex {
    /// The index as the shaders see it.
    #[must_use]
    #[expect(clippy::cast_possible_wrap)]
    pub fn as_int(self) -> i32 {
        self.0 as i32
    }
}

/// Appends quads for one contiguous block.
pub struct GpuBlockWriter<'a> {
    quads: &'a mut Vec<TexelQuad>,
}

impl GpuBlockWriter<'_> {
    /// Append a record.
    pub fn push<T: GpuRecord>(&mut self, record: &T) {
        record.write_gpu_blocks(self.quads);
    }

    /// Append a raw quad.
    pub fn push_quad(&mut self, quad: impl Into<TexelQuad>) {
        self.quads.push(quad.into());
    }

    /// Quads written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }
}

/// Packs blocks into the shared resource cache.
///
/// A block never straddles two rows: if it does not fit in what is left of
/// the current row, the row is padded with zeros and the block starts on
/// the next one. Blocks wider than a row are rejected.
#[derive(Debug)]
pub struct GpuCacheBuilder {
    quads: Vec<TexelQuad>,
    scratch: Vec<TexelQuad>,
    max_rows: usize,
}

impl GpuCacheBuilder {
    /// An empty cache that may grow to `max_rows` rows.
    #[must_use]
    pub fn new(max_rows: usize) -> Self {
        Self {
            quads: Vec::new(),
            scratch: Vec::new(),
            max_rows: max_rows.min(MAX_ADDRESSABLE_ROWS),
        }
    }

    /// Quads used so far, padding included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    /// Whether nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Write a single record as its own block.
    ///
    /// # Errors
    ///
    /// Fails if the cache is full.
    pub fn push<T: GpuRecord>(&mut self, record: &T) -> Result<GpuCacheAddress> {
        self.push_block(|w| w.push(record))
    }

    /// Write one contiguous block built by `write`.
    ///
    /// # Errors
    ///
    /// Fails if the block is wider than a row or the cache is full.
    pub fn push_block(
        &mut self,
        write: impl FnOnce(&mut GpuBlockWriter<'_>),
    ) -> Result<GpuCacheAddress> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        write(&mut GpuBlockWriter {
            quads: &mut scratch,
        });
        let result = self.allocate(&scratch);
        self.scratch = scratch;
        result
    }

    /// Write a primitive header followed by its payload.
    ///
    /// # Errors
    ///
    /// Fails if the cache is full.
    pub fn push_primitive<T: GpuRecord>(
        &mut self,
        geometry: &PrimitiveGeometry,
        payload: &T,
    ) -> Result<GpuCacheAddress> {
        self.push_block(|w| {
            w.push(geometry);
            w.push(payload);
        })
    }

    /// Write a text run: header, run color, then one quad per glyph.
    ///
    /// # Errors
    ///
    /// Fails if the run does not fit in one row or the cache is full.
    pub fn push_text_run(
        &mut self,
        geometry: &PrimitiveGeometry,
        run: &TextRunPrimitive,
        glyphs: &[GlyphPrimitive],
    ) -> Result<GpuCacheAddress> {
        self.push_block(|w| {
            w.push(geometry);
            w.push(run);
            for glyph in glyphs {
                w.push(glyph);
            }
        })
    }

    fn allocate(&mut self, block: &[TexelQuad]) -> Result<GpuCacheAddress> {
        let len = block.len();
        if len > MAX_VERTEX_TEXTURE_WIDTH {
            return Err(Error::RecordTooWide(len));
        }

        let used = self.quads.len() % MAX_VERTEX_TEXTURE_WIDTH;
        let padding = if used + len > MAX_VERTEX_TEXTURE_WIDTH {
            MAX_VERTEX_TEXTURE_WIDTH - used
        } else {
            0
        };
        let start = self.quads.len() + padding;
        let requested = (start + len).div_ceil(MAX_VERTEX_TEXTURE_WIDTH);
        if requested > self.max_rows {
            return Err(Error::CacheFull {
                requested,
                max_rows: self.max_rows,
            });
        }
        let address = u32::try_from(start).map_err(|_| Error::CacheFull {
            requested,
            max_rows: self.max_rows,
        })?;

        if padding > 0 {
            trace!(
                "resource cache: padding {padding} quads to start row {}",
                start / MAX_VERTEX_TEXTURE_WIDTH
            );
            self.quads.resize(start, TexelQuad::ZERO);
        }
        self.quads.extend_from_slice(block);
        trace!("resource cache: {len} quads at {start}");
        Ok(GpuCacheAddress(address))
    }

    /// Freeze the cache.
    #[must_use]
    pub fn finish(self) -> CacheTexture {
        CacheTexture::from_texels(
            SamplerSlot::ResourceCache.name(),
            MAX_VERTEX_TEXTURE_WIDTH,
            self.quads,
        )
    }
}

/// Packs records of one type into a typed table.
///
/// The row width is the largest multiple of the record width that fits in
/// [`MAX_VERTEX_TEXTURE_WIDTH`], so records are simply appended.
#[derive(Debug)]
pub struct GpuTable<T: GpuRecord> {
    quads: Vec<TexelQuad>,
    len: usize,
    max_rows: usize,
    _record: PhantomData<T>,
}

impl<T: GpuRecord> GpuTable<T> {
    /// An empty table that may grow to `max_rows` rows.
    #[must_use]
    pub fn new(max_rows: usize) -> Self {
        Self {
            quads: Vec::new(),
            len: 0,
            max_rows: max_rows.min(MAX_ADDRESSABLE_ROWS),
            _record: PhantomData,
        }
    }

    /// Records in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a record.
    ///
    /// # Errors
    ///
    /// Fails if the table is full.
    pub fn push(&mut self, record: &T) -> Result<GpuTableIndex> {
        let requested = (self.len + 1).div_ceil(layout::items_per_row(T::VECS));
        if requested > self.max_rows {
            return Err(Error::CacheFull {
                requested,
                max_rows: self.max_rows,
            });
        }
        let index = u32::try_from(self.len).map_err(|_| Error::CacheFull {
            requested,
            max_rows: self.max_rows,
        })?;
        record.write_gpu_blocks(&mut self.quads);
        self.len += 1;
        trace!("{}: record {index}", T::LAYOUT.name);
        Ok(GpuTableIndex(index))
    }

    /// Freeze the table.
    #[must_use]
    pub fn finish(self) -> CacheTexture {
        let label = match T::LAYOUT.source {
            layout::RecordSource::Table(slot) => slot.name(),
            layout::RecordSource::ResourceCache => T::LAYOUT.name,
        };
        CacheTexture::from_texels(label, layout::table_width(T::VECS), self.quads)
    }
}

/// All packers for one frame.
#[derive(Debug)]
pub struct GpuFrameBuilder {
    /// `sLayers`.
    pub layers: GpuTable<PackedLayer>,
    /// `sRenderTasks`.
    pub render_tasks: GpuTable<RenderTaskData>,
    /// `sPrimGeometry`, only read by the legacy instance layout.
    pub prim_geometry: GpuTable<TableGeometry>,
    /// `sResourceCache`.
    pub resource_cache: GpuCacheBuilder,
}

impl GpuFrameBuilder {
    /// Empty packers sized by `options`.
    #[must_use]
    pub fn new(options: &RendererOptions) -> Self {
        let rows = options.max_cache_rows;
        Self {
            layers: GpuTable::new(rows),
            render_tasks: GpuTable::new(rows),
            prim_geometry: GpuTable::new(rows),
            resource_cache: GpuCacheBuilder::new(rows),
        }
    }

    /// Freeze every texture.
    #[must_use]
    pub fn finish(self) -> GpuFrame {
        let frame = GpuFrame {
            layers: self.layers.finish(),
            render_tasks: self.render_tasks.finish(),
            prim_geometry: self.prim_geometry.finish(),
            resource_cache: self.resource_cache.finish(),
        };
        debug!(
            "frame frozen: {} layer rows, {} render task rows, {} geometry rows, {} cache rows",
            frame.layers.rows(),
            frame.render_tasks.rows(),
            frame.prim_geometry.rows(),
            frame.resource_cache.rows()
        );
        frame
    }
}

/// The frozen data textures of one frame.
#[derive(Debug)]
pub struct GpuFrame {
    /// `sLayers`.
    pub layers: CacheTexture,
    /// `sRenderTasks`.
    pub render_tasks: CacheTexture,
    /// `sPrimGeometry`.
    pub prim_geometry: CacheTexture,
    /// `sResourceCache`.
    pub resource_cache: CacheTexture,
}

impl GpuFrame {
    /// Each data texture with the slot it is bound to.
    #[must_use]
    pub fn textures(&self) -> [(SamplerSlot, &CacheTexture); 4] {
        [
            (SamplerSlot::Layers, &self.layers),
            (SamplerSlot::RenderTasks, &self.render_tasks),
            (SamplerSlot::PrimGeometry, &self.prim_geometry),
            (SamplerSlot::ResourceCache, &self.resource_cache),
        ]
    }
}
