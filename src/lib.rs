//! GPU resource-cache packing, addressing and primitive loading for
//! tile-based 2D renderers.
//!
//! Per-frame primitive data is packed on the host into `RGBA32F` data
//! textures, each texel holding one four-float "texel-quad". Shaders find
//! records in those textures through two addressing conventions: typed
//! tables indexed by record ([`layout::fetch_uv`]) and a shared resource
//! cache addressed by quad ([`layout::resource_cache_uv`]). This crate
//! provides:
//!
//! - **Layout** ([`layout`]): the row width, per-record quad counts and field
//!   order. The GLSL and HLSL declarations are generated from it
//!   ([`shaders`]), so the packer and the shaders always agree.
//! - **Packing** ([`GpuFrameBuilder`]): typed tables for layers and render
//!   tasks, and a resource cache that never splits a record across rows.
//! - **Fetching** ([`fetch`], [`load_primitive`]): reference
//!   implementations of the shader-side fetch and primitive assembly, used
//!   by the tests and handy for debugging captures.
//! - **Vertex and fragment helpers** ([`geometry`], [`clip`], [`gradient`]):
//!   snapping, clamping, transformed-edge antialiasing, clip masking,
//!   gradient tables and dithering.
//! - **Backends**: [`GlCacheRenderer`] issues instanced draws through
//!   [glow]; the `wgpu` feature adds texture upload and binding layouts.
//!
//! # Example
//!
//! ```
//! use gpu_prim_cache::{
//!     load_primitive, ColorF, GpuFrameBuilder, PackedLayer, PrimitiveGeometry,
//!     PrimitiveInstance, RectWithSize, RectanglePrimitive, RenderTaskData, RendererOptions,
//! };
//! use lyon::math::{point, size};
//!
//! # fn main() -> gpu_prim_cache::Result<()> {
//! let mut frame = GpuFrameBuilder::new(&RendererOptions::default());
//! let screen = RectWithSize::new(0.0, 0.0, 100.0, 100.0);
//! let layer = frame.layers.push(&PackedLayer::identity(screen))?;
//! let task = frame.render_tasks.push(&RenderTaskData::alpha_batch(
//!     point(0.0, 0.0),
//!     size(100.0, 100.0),
//!     point(0.0, 0.0),
//!     0.0,
//! ))?;
//! let prim = frame.resource_cache.push_primitive(
//!     &PrimitiveGeometry::unclipped(RectWithSize::new(10.0, 10.0, 50.0, 20.0)),
//!     &RectanglePrimitive { color: ColorF::WHITE },
//! )?;
//! let frame = frame.finish();
//!
//! let instance = PrimitiveInstance::new(prim.as_int(), task.as_int(), layer.as_int(), 0);
//! let loaded = load_primitive(&frame, &instance);
//! assert_eq!(loaded.local_rect, RectWithSize::new(10.0, 10.0, 50.0, 20.0));
//! # Ok(())
//! # }
//! ```
//!
//! # Safety
//!
//! The GL backend requires a valid, current OpenGL context. Its methods are
//! `unsafe` because they issue raw GL calls.
//!
//! [glow]: https://docs.rs/glow

mod allocator;
pub mod clip;
mod error;
mod features;
pub mod fetch;
pub mod geometry;
pub mod gradient;
pub mod layout;
mod loader;
mod options;
pub mod records;
#[cfg(feature = "glow")]
mod render;
pub mod shaders;
mod types;
#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub use allocator::{
    GpuBlockWriter, GpuCacheAddress, GpuCacheBuilder, GpuFrame, GpuFrameBuilder, GpuTable,
    GpuTableIndex,
};
pub use error::{Error, Result};
pub use features::ShaderFeatures;
pub use fetch::CacheTexture;
pub use loader::{
    load_primitive, InstanceAttributes, LegacyInstanceAttributes, Primitive, PrimitiveInstance,
};
pub use options::RendererOptions;
pub use records::{
    AlphaBatchTask, ClipArea, GpuRecord, GradientPrimitive, GradientStop, PackedLayer,
    PackedLayerWithScreenVertices, PrimitiveGeometry, RectanglePrimitive, RenderTaskData,
};
#[cfg(feature = "glow")]
pub use render::{FrameBindings, GlCacheRenderer, GlFrameTextures};
pub use shaders::{ProgramKind, ShaderSource};
pub use types::{
    transform_from_quads, transform_to_quads, transform_vec4, ColorF, FrameUniforms,
    LayerTransform, Point, RectWithSize, Size, TexelQuad, Vector,
};
