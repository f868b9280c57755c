//! OpenGL backend: owns the GL objects, uploads frame data, and issues
//! instanced draws.

use std::sync::Arc;

use glow::{HasContext, PixelUnpackData};
use log::{debug, info};

use crate::{
    allocator::GpuFrame,
    clip::ClipMaskAtlas,
    error::{Error, Result},
    features::ShaderFeatures,
    gradient,
    layout::SamplerSlot,
    loader::{InstanceAttributes, PrimitiveInstance},
    options::RendererOptions,
    shaders::{self, ProgramKind, ShaderSource},
    types::FrameUniforms,
};

/// GL internal format for the float data textures.
#[expect(clippy::cast_possible_wrap)]
const RGBA32F_INTERNAL_FORMAT: i32 = glow::RGBA32F as i32;

/// GL internal format for single-channel masks and the dither pattern.
#[expect(clippy::cast_possible_wrap)]
const R8_INTERNAL_FORMAT: i32 = glow::R8 as i32;

/// Unit quad corners, drawn as a triangle strip.
const UNIT_QUAD: [[f32; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
];

/// Convert a size to `i32` for GL API calls.
fn gl_size(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Gl(format!("dimension {value} exceeds i32::MAX")))
}

/// Cached uniform locations for one primitive program.
struct ProgramUniforms {
    /// `uTransform`: device pixels to clip space.
    transform: glow::UniformLocation,
    /// `uDevicePixelRatio`: used for snapping and device positions.
    device_pixel_ratio: glow::UniformLocation,
}

/// A linked program and its uniforms.
struct LoadedProgram {
    kind: ProgramKind,
    program: glow::Program,
    uniforms: ProgramUniforms,
}

/// The data textures of one frame, uploaded by
/// [`GlCacheRenderer::upload_frame`].
///
/// Each upload owns its own GL textures, so several frames can be resident
/// at once. Release them with [`GlCacheRenderer::release_frame`].
#[derive(Debug)]
pub struct GlFrameTextures {
    textures: Vec<(SamplerSlot, glow::Texture)>,
}

/// Texture unit each uploaded texture is bound to.
fn texture_units<T: Copy>(textures: &[(SamplerSlot, T)]) -> impl Iterator<Item = (u32, T)> + '_ {
    textures
        .iter()
        .map(|(slot, texture)| (glow::TEXTURE0 + slot.unit(), *texture))
}

/// What a draw call reads: one uploaded frame and the per-target uniforms.
///
/// Bindings are passed explicitly to every draw; nothing is inherited from
/// a previous call.
#[derive(Copy, Clone, Debug)]
pub struct FrameBindings<'a> {
    /// Data textures of the frame being drawn.
    pub textures: &'a GlFrameTextures,
    /// Projection and device pixel ratio of the target being drawn.
    pub uniforms: &'a FrameUniforms,
}

/// Draws primitives out of a [`GpuFrame`] with the generated programs.
///
/// # Example
///
/// ```no_run
/// # use gpu_prim_cache::{GlCacheRenderer, RendererOptions, GpuFrameBuilder, FrameBindings,
/// #     FrameUniforms, ProgramKind};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) -> gpu_prim_cache::Result<()> {
/// let options = RendererOptions::default();
/// let renderer = unsafe { GlCacheRenderer::new(gl, options.clone()) }?;
///
/// let frame = GpuFrameBuilder::new(&options).finish();
/// let uniforms = FrameUniforms::ortho(800.0, 600.0, 1.0);
/// unsafe {
///     let textures = renderer.upload_frame(&frame)?;
///     let bindings = FrameBindings {
///         textures: &textures,
///         uniforms: &uniforms,
///     };
///     renderer.draw(ProgramKind::Rectangle, &[], bindings)?;
///     renderer.release_frame(textures);
///     renderer.destroy();
/// }
/// # Ok(())
/// # }
/// ```
pub struct GlCacheRenderer {
    /// The OpenGL context.
    gl: Arc<glow::Context>,

    options: RendererOptions,

    /// Features every program was compiled with.
    features: ShaderFeatures,

    programs: Vec<LoadedProgram>,

    /// `sCacheA8` array texture.
    clip_masks: glow::Texture,

    /// `sDither` pattern, uploaded once.
    dither: glow::Texture,

    /// Vertex array with the unit quad and the instance attributes.
    vao: glow::VertexArray,
    /// Static unit-quad positions.
    quad_vbo: glow::Buffer,
    /// Streaming per-instance data.
    instance_vbo: glow::Buffer,
}

impl GlCacheRenderer {
    /// Create a renderer, compiling every [`ProgramKind`] with the features
    /// from `options`.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid. The caller must ensure
    /// that [`destroy`](Self::destroy) is called before the context is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Fails on conflicting or unsupported features, on shader compile or
    /// link errors, if a required uniform is missing, or if a GL object
    /// cannot be created.
    pub unsafe fn new(gl: Arc<glow::Context>, options: RendererOptions) -> Result<Self> {
        let features = options.shader_features()?;

        let mut programs = Vec::with_capacity(ProgramKind::ALL.len());
        for kind in ProgramKind::ALL {
            let source = ShaderSource::build(kind, features)?;
            let program = unsafe { shaders::compile_program(&gl, &source) }?;
            let uniforms = unsafe { Self::program_uniforms(&gl, program) }?;
            debug!("linked {} with {:?}", kind.name(), features);
            programs.push(LoadedProgram {
                kind,
                program,
                uniforms,
            });
        }

        let clip_masks = unsafe { gl.create_texture() }?;
        let dither = unsafe { gl.create_texture() }?;

        let (vao, quad_vbo, instance_vbo) = unsafe {
            let vao = gl.create_vertex_array()?;
            let quad_vbo = gl.create_buffer()?;
            let instance_vbo = gl.create_buffer()?;

            gl.bind_vertex_array(Some(vao));

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(quad_vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&UNIT_QUAD),
                glow::STATIC_DRAW,
            );
            gl.enable_vertex_attrib_array(0);
            // 12-byte vertices.
            #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            gl.vertex_attrib_pointer_f32(
                0,
                3,
                glow::FLOAT,
                false,
                std::mem::size_of::<[f32; 3]>() as i32,
                0,
            );

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(instance_vbo));
            // 32-byte instances, two ivec4 halves.
            #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let stride = std::mem::size_of::<InstanceAttributes>() as i32;
            for (location, offset) in [(1, 0), (2, 16)] {
                gl.enable_vertex_attrib_array(location);
                gl.vertex_attrib_pointer_i32(location, 4, glow::INT, stride, offset);
                gl.vertex_attrib_divisor(location, 1);
            }

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            (vao, quad_vbo, instance_vbo)
        };

        let renderer = Self {
            gl,
            options,
            features,
            programs,
            clip_masks,
            dither,
            vao,
            quad_vbo,
            instance_vbo,
        };

        unsafe {
            renderer.upload_dither()?;
            renderer.upload_clip_masks(&ClipMaskAtlas::new(1, 1, 1))?;
        }

        info!(
            "GL cache renderer ready: {} programs, features {:?}",
            renderer.programs.len(),
            renderer.features
        );
        Ok(renderer)
    }

    /// Look up the uniforms every program must expose and point each
    /// sampler at its fixed texture unit.
    unsafe fn program_uniforms(
        gl: &glow::Context,
        program: glow::Program,
    ) -> Result<ProgramUniforms> {
        unsafe {
            let transform = gl
                .get_uniform_location(program, "uTransform")
                .ok_or(Error::MissingUniform("uTransform"))?;
            let device_pixel_ratio = gl
                .get_uniform_location(program, "uDevicePixelRatio")
                .ok_or(Error::MissingUniform("uDevicePixelRatio"))?;

            gl.use_program(Some(program));
            // Samplers the program never reads are optimized out.
            for slot in SamplerSlot::ALL {
                if let Some(location) = gl.get_uniform_location(program, slot.name()) {
                    #[expect(clippy::cast_possible_wrap)]
                    gl.uniform_1_i32(Some(&location), slot.unit() as i32);
                }
            }
            gl.use_program(None);

            Ok(ProgramUniforms {
                transform,
                device_pixel_ratio,
            })
        }
    }

    /// The options this renderer was created with.
    #[must_use]
    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// The features compiled into every program.
    #[must_use]
    pub fn features(&self) -> ShaderFeatures {
        self.features
    }

    /// Upload the data textures of `frame` into new GL textures.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Fails if a texture dimension does not fit GL's `i32` sizes or a
    /// texture cannot be created.
    pub unsafe fn upload_frame(&self, frame: &GpuFrame) -> Result<GlFrameTextures> {
        let gl = &self.gl;
        let mut uploaded = GlFrameTextures {
            textures: Vec::with_capacity(4),
        };
        for (slot, texture) in frame.textures() {
            let (width, height) = match (gl_size(texture.width()), gl_size(texture.rows())) {
                (Ok(width), Ok(height)) => (width, height),
                (Err(err), _) | (_, Err(err)) => {
                    unsafe { self.release_frame(uploaded) };
                    return Err(err);
                }
            };
            let gl_texture = match unsafe { gl.create_texture() } {
                Ok(gl_texture) => gl_texture,
                Err(err) => {
                    unsafe { self.release_frame(uploaded) };
                    return Err(err.into());
                }
            };
            uploaded.textures.push((slot, gl_texture));
            unsafe {
                gl.bind_texture(glow::TEXTURE_2D, Some(gl_texture));
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    RGBA32F_INTERNAL_FORMAT,
                    width,
                    height,
                    0,
                    glow::RGBA,
                    glow::FLOAT,
                    PixelUnpackData::Slice(Some(texture.as_bytes())),
                );
                Self::set_nearest_tex_params(gl, glow::TEXTURE_2D);
            }
            debug!("uploaded {} ({}x{})", slot.name(), width, height);
        }
        unsafe { gl.bind_texture(glow::TEXTURE_2D, None) };
        Ok(uploaded)
    }

    /// Delete the GL textures of an uploaded frame.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new). No draw may still be reading `textures`.
    pub unsafe fn release_frame(&self, textures: GlFrameTextures) {
        for (_, texture) in textures.textures {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    /// Upload the clip mask atlas as an 8-bit array texture.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Fails if a dimension does not fit GL's `i32` sizes.
    pub unsafe fn upload_clip_masks(&self, atlas: &ClipMaskAtlas) -> Result<()> {
        let (width, height) = atlas.size();
        let layers = atlas.layers();
        let pixels: Vec<u8> = layers
            .iter()
            .flat_map(|layer| layer.as_raw().iter().copied())
            .collect();
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D_ARRAY, Some(self.clip_masks));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_3d(
                glow::TEXTURE_2D_ARRAY,
                0,
                R8_INTERNAL_FORMAT,
                gl_size(width as usize)?,
                gl_size(height as usize)?,
                gl_size(layers.len())?,
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(&pixels)),
            );
            Self::set_nearest_tex_params(gl, glow::TEXTURE_2D_ARRAY);
            gl.bind_texture(glow::TEXTURE_2D_ARRAY, None);
        }
        Ok(())
    }

    /// Upload the 8×8 ordered-dither pattern.
    unsafe fn upload_dither(&self) -> Result<()> {
        let pattern = gradient::dither_texture();
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.dither));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                R8_INTERNAL_FORMAT,
                gl_size(pattern.width() as usize)?,
                gl_size(pattern.height() as usize)?,
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pattern.as_raw())),
            );
            Self::set_nearest_tex_params(gl, glow::TEXTURE_2D);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        Ok(())
    }

    /// Nearest filtering, clamped. Data textures must never be filtered.
    unsafe fn set_nearest_tex_params(gl: &glow::Context, target: u32) {
        // GL constant values are small enough that the cast is always safe.
        #[expect(clippy::cast_possible_wrap)]
        unsafe {
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        }
    }

    /// Clear the bound framebuffer to the configured clear color.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    pub unsafe fn clear(&self) {
        let [r, g, b, a] = self.options.clear_color.to_array();
        unsafe {
            self.gl.clear_color(r, g, b, a);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// Draw `instances` with `kind`, reading from `bindings`.
    ///
    /// Each instance is a unit quad that the vertex stage places using the
    /// packed primitive data. Blending is premultiplied-alpha.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new). `bindings.textures` must come from this
    /// renderer's [`upload_frame`](Self::upload_frame) and not have been
    /// released.
    ///
    /// # Errors
    ///
    /// Fails if the instance count does not fit GL's `i32` sizes.
    pub unsafe fn draw(
        &self,
        kind: ProgramKind,
        instances: &[PrimitiveInstance],
        bindings: FrameBindings<'_>,
    ) -> Result<()> {
        if instances.is_empty() {
            return Ok(());
        }
        let Some(loaded) = self.programs.iter().find(|p| p.kind == kind) else {
            return Err(Error::Unsupported("program was not compiled"));
        };
        let count = gl_size(instances.len())?;
        let attributes: Vec<InstanceAttributes> =
            instances.iter().map(PrimitiveInstance::to_attributes).collect();

        let gl = &self.gl;
        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::ONE, glow::ONE_MINUS_SRC_ALPHA);

            gl.use_program(Some(loaded.program));
            gl.uniform_matrix_4_f32_slice(
                Some(&loaded.uniforms.transform),
                false,
                &bindings.uniforms.transform.to_array(),
            );
            gl.uniform_1_f32(
                Some(&loaded.uniforms.device_pixel_ratio),
                bindings.uniforms.device_pixel_ratio,
            );

            for (unit, texture) in texture_units(&bindings.textures.textures) {
                gl.active_texture(unit);
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            }
            gl.active_texture(glow::TEXTURE0 + SamplerSlot::CacheA8.unit());
            gl.bind_texture(glow::TEXTURE_2D_ARRAY, Some(self.clip_masks));
            gl.active_texture(glow::TEXTURE0 + SamplerSlot::Dither.unit());
            gl.bind_texture(glow::TEXTURE_2D, Some(self.dither));
            gl.active_texture(glow::TEXTURE0);

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.instance_vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&attributes),
                glow::STREAM_DRAW,
            );
            gl.draw_arrays_instanced(glow::TRIANGLE_STRIP, 0, 4, count);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.use_program(None);
            gl.disable(glow::BLEND);
        }
        Ok(())
    }

    /// Delete all GL resources owned by this renderer.
    ///
    /// # Safety
    ///
    /// Must be called with the same GL context that was used to create the
    /// renderer, and must be called exactly once.
    pub unsafe fn destroy(&self) {
        let gl = &self.gl;
        unsafe {
            for loaded in &self.programs {
                gl.delete_program(loaded.program);
            }
            gl.delete_texture(self.clip_masks);
            gl.delete_texture(self.dither);
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.quad_vbo);
            gl.delete_buffer(self.instance_vbo);
        }
    }
}
